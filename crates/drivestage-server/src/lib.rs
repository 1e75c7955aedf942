//! drivestage Server - HTTP endpoints for the watcher and mover roles
//!
//! Provides:
//! - `HttpServer`: hyper HTTP/1 server with graceful shutdown
//! - `Router`: `POST /`, `GET /healthz` and `GET /metrics` dispatch
//! - `WatcherEndpoint`: change-channel notifications relayed to the mover
//! - `MoverEndpoint`: inbound notices run through the staged pipeline
//! - `MetricsRegistry`: Prometheus counters and histograms

pub mod metrics;
pub mod mover;
pub mod server;
pub mod watcher;

pub use metrics::{MeteredRelay, MetricsRegistry};
pub use mover::MoverEndpoint;
pub use server::{HttpServer, InboundRequest, Reply, RequestHandler, Router};
pub use watcher::WatcherEndpoint;
