//! Mover notification endpoint
//!
//! Decodes whichever payload shape arrived, then runs the staged pipeline
//! for the named file. Status codes:
//!
//! | Outcome | Status |
//! |---|---|
//! | Pipeline completed | `200` |
//! | Payload could not be decoded | `400` |
//! | File not in the input folder | `409` |
//! | A pipeline step failed | `500` |

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use hyper::StatusCode;
use tracing::{info, warn};

use drivestage_core::domain::decode_notice;
use drivestage_core::usecases::{PipelineError, RunPipelineUseCase};

use crate::metrics::MetricsRegistry;
use crate::server::{InboundRequest, Reply, RequestHandler};

pub const PROCESSED_MESSAGE: &str = "File processed successfully";

/// `POST /` handler for the mover role
pub struct MoverEndpoint {
    pipeline: RunPipelineUseCase,
    metrics: Arc<MetricsRegistry>,
}

impl MoverEndpoint {
    pub fn new(pipeline: RunPipelineUseCase, metrics: Arc<MetricsRegistry>) -> Self {
        Self { pipeline, metrics }
    }

    fn record(&self, outcome: &str, step: &str, started: Instant) {
        self.metrics
            .record_pipeline_run(outcome, step, started.elapsed().as_secs_f64());
        self.metrics.record_notice(self.role(), outcome);
    }
}

#[async_trait]
impl RequestHandler for MoverEndpoint {
    fn role(&self) -> &'static str {
        "mover"
    }

    async fn handle(&self, request: InboundRequest) -> Reply {
        let notice = match decode_notice(&request.body) {
            Ok(notice) => notice,
            Err(e) => {
                warn!(error = %e, "Undecodable payload");
                self.metrics.record_notice(self.role(), "invalid");
                return Reply::text(StatusCode::BAD_REQUEST, format!("Invalid payload: {e}"));
            }
        };
        info!(
            file_id = %notice.file_id,
            name = notice.file_name.as_deref().unwrap_or(""),
            source = %notice.source,
            "Notice received"
        );

        let started = Instant::now();
        match self.pipeline.execute(&notice.file_id).await {
            Ok(run) => {
                self.record("success", "", started);
                info!(
                    run_id = %run.run_id(),
                    file_id = %notice.file_id,
                    "File processed"
                );
                Reply::ok(PROCESSED_MESSAGE)
            }
            Err(e @ PipelineError::NotInInputFolder { .. }) => {
                self.record("rejected", "", started);
                warn!(file_id = %notice.file_id, reason = %e, "File rejected");
                Reply::text(StatusCode::CONFLICT, e.to_string())
            }
            Err(e) => {
                // The use case has already logged the failure with its chain.
                let step = e.step().map(|s| s.name()).unwrap_or("");
                self.record("failed", step, started);
                Reply::text(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("Error processing file: {e}"),
                )
            }
        }
    }
}
