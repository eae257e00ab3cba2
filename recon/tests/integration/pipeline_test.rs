use recon::bulk::memory::{MemoryExportJobClient, ScriptedExport};
use recon::error::ErrorKind;
use recon::output::OUTPUT_HEADER;
use recon::pipeline::ReconciliationPipeline;
use recon::test_utils::export::{legacy_export, migrated_export, split_into_chunks};
use recon::test_utils::pipeline::{
    TEST_DATASET, TEST_LEGACY_DATASET, create_pipeline, test_client, test_config,
};
use recon_config::shared::DatasetMapping;
use recon_telemetry::tracing::init_test_tracing;
use std::time::Duration;

fn legacy_rows() -> String {
    legacy_export(&[("a1", "u1"), ("a2", "u2"), ("a3", "u3"), ("a2", "u9")])
}

fn migrated_rows() -> String {
    migrated_export(&[("m1", "a1"), ("m2", "a2"), ("m3", "gone"), ("m4", "a3")])
}

fn read_output(dir: &tempfile::TempDir) -> String {
    std::fs::read_to_string(dir.path().join(format!("{TEST_DATASET}.csv"))).unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn reconciles_migrated_records_with_their_legacy_owners() {
    init_test_tracing();

    let dir = tempfile::tempdir().unwrap();
    let client = test_client(
        ScriptedExport::from_text(&legacy_rows()),
        ScriptedExport::from_text(&migrated_rows()),
    )
    .await;

    let report = create_pipeline(dir.path(), client.clone())
        .run(TEST_DATASET)
        .await
        .unwrap();

    assert_eq!(report.legacy_records, 3);
    assert_eq!(report.migrated_records, 4);
    assert_eq!(report.matched, 3);
    assert_eq!(report.unmatched, 1);
    assert_eq!(report.output_path, dir.path().join("cgcloud__Fund__c.csv"));

    insta::assert_snapshot!(read_output(&dir), @r#"
    "Id","CreatedById"
    "m1","u1"
    "m2","u9"
    "m3",undefined
    "m4","u3"
    "#);
}

#[tokio::test(flavor = "multi_thread")]
async fn issues_exactly_two_queries_legacy_first() {
    init_test_tracing();

    let dir = tempfile::tempdir().unwrap();
    let client = test_client(
        ScriptedExport::from_text(&legacy_rows()),
        ScriptedExport::from_text(&migrated_rows()),
    )
    .await;

    create_pipeline(dir.path(), client.clone())
        .run(TEST_DATASET)
        .await
        .unwrap();

    assert_eq!(
        client.submitted_queries().await,
        vec![
            format!("select Id,CreatedById from {TEST_LEGACY_DATASET}"),
            format!("select Id,Origin_Id__c from {TEST_DATASET} where Origin_Id__c !=null"),
        ]
    );

    let files: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
    assert_eq!(files.len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn chunk_boundaries_do_not_change_the_output() {
    init_test_tracing();

    let whole_dir = tempfile::tempdir().unwrap();
    let client = test_client(
        ScriptedExport::from_text(&legacy_rows()),
        ScriptedExport::from_text(&migrated_rows()),
    )
    .await;
    create_pipeline(whole_dir.path(), client)
        .run(TEST_DATASET)
        .await
        .unwrap();
    let expected = read_output(&whole_dir);

    for size in [1, 5, 13] {
        let dir = tempfile::tempdir().unwrap();
        let client = test_client(
            ScriptedExport::from_chunks(split_into_chunks(&legacy_rows(), size)),
            ScriptedExport::from_chunks(split_into_chunks(&migrated_rows(), size)),
        )
        .await;

        create_pipeline(dir.path(), client)
            .run(TEST_DATASET)
            .await
            .unwrap();

        assert_eq!(read_output(&dir), expected, "chunk size {size}");
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn output_does_not_depend_on_which_stream_finishes_first() {
    init_test_tracing();

    let slow = Duration::from_millis(20);
    let mut outputs = Vec::new();

    for legacy_is_slow in [true, false] {
        let legacy = ScriptedExport::from_chunks(split_into_chunks(&legacy_rows(), 8));
        let migrated = ScriptedExport::from_chunks(split_into_chunks(&migrated_rows(), 8));
        let (legacy, migrated) = if legacy_is_slow {
            (legacy.with_chunk_delay(slow), migrated)
        } else {
            (legacy, migrated.with_chunk_delay(slow))
        };

        let dir = tempfile::tempdir().unwrap();
        create_pipeline(dir.path(), test_client(legacy, migrated).await)
            .run(TEST_DATASET)
            .await
            .unwrap();
        outputs.push(read_output(&dir));
    }

    assert_eq!(outputs[0], outputs[1]);
}

#[tokio::test(flavor = "multi_thread")]
async fn unsupported_dataset_issues_no_queries() {
    init_test_tracing();

    let dir = tempfile::tempdir().unwrap();
    let client = MemoryExportJobClient::new();

    let err = create_pipeline(dir.path(), client.clone())
        .run("Unknown__c")
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::UnsupportedDataset);
    let detail = err.detail().unwrap();
    assert!(detail.lines().any(|name| name == "cgcloud__Fund__c"));
    assert_eq!(detail.lines().count(), 7);
    assert!(client.submitted_queries().await.is_empty());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn stalled_stream_times_out_without_output() {
    init_test_tracing();

    let dir = tempfile::tempdir().unwrap();
    let client = test_client(
        ScriptedExport::from_text(&legacy_rows()),
        ScriptedExport::from_text(&migrated_rows()).stalled(),
    )
    .await;

    let err = create_pipeline(dir.path(), client)
        .run(TEST_DATASET)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::IngestionTimeout);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn stream_failure_is_reported_without_output() {
    init_test_tracing();

    let dir = tempfile::tempdir().unwrap();
    let client = test_client(
        ScriptedExport::from_text(&legacy_rows()).failing(),
        ScriptedExport::from_text(&migrated_rows()).stalled(),
    )
    .await;

    let err = create_pipeline(dir.path(), client)
        .run(TEST_DATASET)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::StreamReadFailed);
    assert_eq!(err.detail(), Some("connection reset by peer"));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn rejected_submission_stops_the_run() {
    init_test_tracing();

    let dir = tempfile::tempdir().unwrap();
    let client = test_client(
        ScriptedExport::from_text(&legacy_rows()),
        ScriptedExport::from_text(&migrated_rows()).rejected(),
    )
    .await;

    let err = create_pipeline(dir.path(), client.clone())
        .run(TEST_DATASET)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::JobSubmissionRejected);
    assert_eq!(client.submitted_queries().await.len(), 2);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn every_migrated_record_is_accounted_for() {
    init_test_tracing();

    let dir = tempfile::tempdir().unwrap();
    let migrated: Vec<(String, String)> = (0..500)
        .map(|i| (format!("m{i}"), format!("a{}", i % 7)))
        .collect();
    let migrated: Vec<(&str, &str)> = migrated
        .iter()
        .map(|(id, origin)| (id.as_str(), origin.as_str()))
        .collect();
    let client = test_client(
        ScriptedExport::from_text(&legacy_export(&[("a0", "u0"), ("a3", "u3")])),
        ScriptedExport::from_chunks(split_into_chunks(&migrated_export(&migrated), 64)),
    )
    .await;

    let report = create_pipeline(dir.path(), client)
        .run(TEST_DATASET)
        .await
        .unwrap();

    let output = read_output(&dir);
    assert!(output.starts_with(OUTPUT_HEADER));
    assert_eq!(output.lines().count(), 501);
    assert_eq!(report.matched + report.unmatched, 500);
    assert_eq!(report.matched, 143);
}

#[tokio::test(flavor = "multi_thread")]
async fn configured_datasets_can_be_reconciled() {
    init_test_tracing();

    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.output.missing_owner_placeholder = String::new();
    config.datasets = vec![DatasetMapping::new("Custom__c", "Legacy_Custom__c")];

    let client = MemoryExportJobClient::new()
        .with_export(
            "Legacy_Custom__c",
            ScriptedExport::from_text(&legacy_export(&[("l1", "owner")])),
        )
        .await
        .with_export(
            "Custom__c",
            ScriptedExport::from_text(&migrated_export(&[("c1", "l1"), ("c2", "l2")])),
        )
        .await;

    ReconciliationPipeline::new(config, client)
        .run("Custom__c")
        .await
        .unwrap();

    assert_eq!(
        std::fs::read_to_string(dir.path().join("Custom__c.csv")).unwrap(),
        "\"Id\",\"CreatedById\"\n\"c1\",\"owner\"\n\"c2\","
    );
}
