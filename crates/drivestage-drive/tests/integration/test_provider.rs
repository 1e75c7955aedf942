//! Integration tests for DriveStorageProvider driving the core use cases

use std::sync::Arc;

use drivestage_core::config::OutputMode;
use drivestage_core::domain::{PipelineStage, StageFolders};
use drivestage_core::ports::IStorageProvider;
use drivestage_core::usecases::{MoveFileUseCase, PipelineError, RunPipelineUseCase, SimulatedProcessor};
use drivestage_drive::provider::DriveStorageProvider;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use crate::common::{self, file_id, folder_id};

fn folders() -> StageFolders {
    StageFolders::new(folder_id("I"), folder_id("S"), folder_id("O"))
}

#[tokio::test]
async fn test_get_file_converts_record() {
    let (server, client) = common::setup_drive_mock().await;
    common::mount_get_file(&server, "F1", "a.txt", &["I"]).await;
    let provider = DriveStorageProvider::new(client);

    let record = provider.get_file(&file_id("F1")).await.unwrap();

    assert_eq!(record.name(), "a.txt");
    assert_eq!(record.current_parent(), Some(&folder_id("I")));
    assert_eq!(record.mime_type(), Some("text/plain"));
}

#[tokio::test]
async fn test_move_file_through_drive() {
    let (server, client) = common::setup_drive_mock().await;
    common::mount_get_file(&server, "F1", "a.txt", &["I"]).await;
    Mock::given(method("PATCH"))
        .and(path("/drive/v3/files/F1"))
        .and(query_param("removeParents", "I"))
        .and(query_param("addParents", "S"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(common::drive_file_json("F1", "a.txt", &["S"])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let usecase = MoveFileUseCase::new(Arc::new(DriveStorageProvider::new(client)));
    let outcome = usecase.execute(&file_id("F1"), &folder_id("S")).await.unwrap();

    assert_eq!(outcome.record().parents(), &[folder_id("S")]);
}

#[tokio::test]
async fn test_pipeline_rejects_file_outside_input_without_patch() {
    let (server, client) = common::setup_drive_mock().await;
    common::mount_get_file(&server, "F2", "b.txt", &["Other"]).await;
    Mock::given(method("PATCH"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let usecase = RunPipelineUseCase::new(
        Arc::new(DriveStorageProvider::new(client)),
        Arc::new(SimulatedProcessor::new(std::time::Duration::ZERO)),
        folders(),
        OutputMode::Move,
    );

    let err = usecase.execute(&file_id("F2")).await.unwrap_err();
    assert!(matches!(err, PipelineError::NotInInputFolder { .. }));
}

#[tokio::test]
async fn test_pipeline_move_mode_against_drive() {
    let (server, client) = common::setup_drive_mock().await;

    // Metadata reads see the file move I -> S -> O.
    Mock::given(method("GET"))
        .and(path("/drive/v3/files/F1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(common::drive_file_json("F1", "a.txt", &["I"])),
        )
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/drive/v3/files/F1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(common::drive_file_json("F1", "a.txt", &["S"])),
        )
        .mount(&server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/drive/v3/files/F1"))
        .and(query_param("removeParents", "I"))
        .and(query_param("addParents", "S"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(common::drive_file_json("F1", "a.txt", &["S"])),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/drive/v3/files/F1"))
        .and(query_param("removeParents", "S"))
        .and(query_param("addParents", "O"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(common::drive_file_json("F1", "a.txt", &["O"])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let usecase = RunPipelineUseCase::new(
        Arc::new(DriveStorageProvider::new(client)),
        Arc::new(SimulatedProcessor::new(std::time::Duration::ZERO)),
        folders(),
        OutputMode::Move,
    );

    let run = usecase.execute(&file_id("F1")).await.expect("pipeline failed");
    assert_eq!(run.stage(), PipelineStage::AtOutput);
}
