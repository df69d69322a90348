//! Job lifecycle across the queued and inline paths.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use common::{BrokenQueue, FixedInference, LowercasePreprocessor, TestHarness, TimeoutInference};
use mailtriage::content::{remove_temp_file, ContentSource};
use mailtriage::pipeline::{NoopProgress, PipelineStage};
use mailtriage::providers::{Category, Inference};
use mailtriage::queue::QueueHealthCheck;
use mailtriage::service::{ServiceError, Submission};
use mailtriage::store::{JobRecord, JobStatus, JobStore, NewJob, StoreError};

const REPORT_REQUEST: &str = "Preciso do relatório até sexta";
const REVIEW_NOTICE: &str = "Relatório enviado, revisar antes da reunião de terça";

fn assert_fields_atomic(job: &JobRecord) {
    assert_eq!(
        job.category.is_some(),
        job.generated_reply.is_some(),
        "category and reply must be set together: {:?}",
        job
    );
}

#[test]
fn test_inline_text_submission_completes() {
    let harness = TestHarness::new();
    let pipeline = harness.pipeline(
        Arc::new(LowercasePreprocessor),
        Arc::new(FixedInference::produtivo()),
    );
    let service = harness.inline_service(pipeline);

    let outcome = service
        .submit_job("owner-1", Submission::Text(REVIEW_NOTICE.to_string()))
        .unwrap();
    assert!(!outcome.queued);
    assert_eq!(outcome.status, JobStatus::Completed);
    assert_eq!(outcome.generated_reply.as_deref(), Some("Obrigado, vamos revisar."));

    let job = harness.job(&outcome.job_id);
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.category, Some(Category::Produtivo));
    assert_eq!(job.confidence, Some(0.9));
    assert_eq!(job.generated_reply.as_deref(), Some("Obrigado, vamos revisar."));
    assert!(job.completed_at.is_some());
    assert!(job.error.is_none());
    assert_fields_atomic(&job);
}

#[test]
fn test_inference_timeout_marks_failed_with_null_fields() {
    let harness = TestHarness::new();
    let pipeline = harness.pipeline(Arc::new(LowercasePreprocessor), Arc::new(TimeoutInference));
    let service = harness.inline_service(pipeline.clone());

    let err = service
        .submit_job("owner-1", Submission::Text(REPORT_REQUEST.to_string()))
        .unwrap_err();
    let job_id = match err {
        ServiceError::Pipeline { job_id, source } => {
            assert_eq!(source.stage(), PipelineStage::Inference);
            job_id
        }
        other => panic!("expected pipeline failure, got {:?}", other),
    };

    let job = harness.job(&job_id);
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.category.is_none());
    assert!(job.generated_reply.is_none());
    assert!(job.confidence.is_none());
    assert!(job.error.unwrap().contains("Inference unavailable"));
    assert_eq!(pipeline.metrics().snapshot().failed, 1);
}

#[test]
fn test_upload_deleted_before_run_fails_cleanly() {
    let harness = TestHarness::new();
    let pipeline = harness.pipeline(
        Arc::new(LowercasePreprocessor),
        Arc::new(FixedInference::produtivo()),
    );
    let job = harness
        .store
        .create(NewJob {
            owner_id: "owner-1".to_string(),
            original_text: "convite".to_string(),
            file_reference: Some("convite.txt".to_string()),
        })
        .unwrap();
    let path = harness
        .uploads()
        .store(b"convite", Some("convite.txt"))
        .unwrap();
    std::fs::remove_file(&path).unwrap();

    let err = pipeline
        .run(&job.id, ContentSource::Upload(path), 15, &NoopProgress)
        .unwrap_err();
    assert_eq!(err.stage(), PipelineStage::ContentLoad);

    let stored = harness.job(&job.id);
    assert_eq!(stored.status, JobStatus::Failed);
    assert!(stored.category.is_none());
    assert_fields_atomic(&stored);
}

#[test]
fn test_status_is_monotonic() {
    let harness = TestHarness::new();
    let pipeline = harness.pipeline(
        Arc::new(LowercasePreprocessor),
        Arc::new(FixedInference::produtivo()),
    );
    let service = harness.inline_service(pipeline);
    let outcome = service
        .submit_job("owner-1", Submission::Text(REPORT_REQUEST.to_string()))
        .unwrap();

    let late = harness.store.mark_failed(&outcome.job_id, "late failure");
    assert!(matches!(
        late,
        Err(StoreError::AlreadyTerminal {
            status: JobStatus::Completed,
            ..
        })
    ));
    let again = harness.store.mark_completed(
        &outcome.job_id,
        &Inference::new(Category::Improdutivo, None, "Outra".to_string()),
    );
    assert!(matches!(again, Err(StoreError::AlreadyTerminal { .. })));

    let job = harness.job(&outcome.job_id);
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.category, Some(Category::Produtivo));
    assert!(job.error.is_none());
}

#[test]
fn test_uploads_removed_after_success_and_failure() {
    let harness = TestHarness::new();
    let ok = harness.inline_service(harness.pipeline(
        Arc::new(LowercasePreprocessor),
        Arc::new(FixedInference::produtivo()),
    ));
    let failing = harness.inline_service(
        harness.pipeline(Arc::new(LowercasePreprocessor), Arc::new(TimeoutInference)),
    );

    let file = || Submission::File {
        bytes: REPORT_REQUEST.as_bytes().to_vec(),
        filename: Some("pedido.txt".to_string()),
    };
    ok.submit_job("owner-1", file()).unwrap();
    failing.submit_job("owner-1", file()).unwrap_err();

    assert_eq!(harness.upload_count(), 0);
    assert_eq!(harness.count(JobStatus::Completed), 1);
    assert_eq!(harness.count(JobStatus::Failed), 1);
}

#[test]
fn test_cleanup_is_idempotent() {
    let harness = TestHarness::new();
    let path = harness.uploads().store(b"x", None).unwrap();

    assert!(remove_temp_file(&path).unwrap());
    assert!(!remove_temp_file(&path).unwrap());
    assert!(!remove_temp_file(&path).unwrap());
}

#[test]
fn test_queued_job_completes_on_worker() {
    let harness = TestHarness::new();
    let inference = Arc::new(FixedInference::produtivo());
    let pipeline = harness.pipeline(Arc::new(LowercasePreprocessor), inference.clone());
    let pool = harness.worker_pool(pipeline.clone());
    let service = harness.queued_service(pipeline, pool.clone());

    let outcome = service
        .submit_job(
            "owner-1",
            Submission::File {
                bytes: REPORT_REQUEST.as_bytes().to_vec(),
                filename: Some("pedido.txt".to_string()),
            },
        )
        .unwrap();
    assert!(outcome.queued);
    assert!(outcome.task_id.is_some());
    assert_ne!(outcome.task_id.as_deref(), Some(outcome.job_id.as_str()));
    assert_eq!(outcome.status, JobStatus::Processing);
    assert!(outcome.category.is_none());

    let job = harness.wait_terminal(&outcome.job_id);
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.original_text, REPORT_REQUEST);
    assert_fields_atomic(&job);

    pool.drain();
    pool.wait();
    assert_eq!(harness.upload_count(), 0);
    assert_eq!(inference.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_fallback_is_transparent() {
    // Same input through a working queue and a broken one
    let harness = TestHarness::new();
    let pipeline = harness.pipeline(
        Arc::new(LowercasePreprocessor),
        Arc::new(FixedInference::produtivo()),
    );
    let pool = harness.worker_pool(pipeline.clone());
    let queued = harness.queued_service(pipeline.clone(), pool.clone());
    let broken_queue = Arc::new(BrokenQueue::new());
    let fallback = harness.queued_service(pipeline, broken_queue.clone());

    let via_queue = queued
        .submit_job("owner-1", Submission::Text(REPORT_REQUEST.to_string()))
        .unwrap();
    let via_fallback = fallback
        .submit_job("owner-1", Submission::Text(REPORT_REQUEST.to_string()))
        .unwrap();
    assert!(via_queue.queued);
    assert!(!via_fallback.queued);

    // Unhealthy queues are not even tried
    assert!(!broken_queue.check().is_healthy());
    assert_eq!(broken_queue.attempts.load(Ordering::SeqCst), 0);
    assert_eq!(fallback.dispatcher().fallback_count(), 1);

    let a = harness.wait_terminal(&via_queue.job_id);
    let b = harness.job(&via_fallback.job_id);
    assert_eq!(a.status, b.status);
    assert_eq!(a.category, b.category);
    assert_eq!(a.confidence, b.confidence);
    assert_eq!(a.generated_reply, b.generated_reply);
    assert_eq!(a.original_text, b.original_text);

    pool.shutdown();
    pool.wait();
}

#[test]
fn test_stopped_pool_falls_back_inline() {
    let harness = TestHarness::new();
    let pipeline = harness.pipeline(
        Arc::new(LowercasePreprocessor),
        Arc::new(FixedInference::produtivo()),
    );
    let pool = harness.worker_pool(pipeline.clone());
    pool.shutdown();
    pool.wait();
    let service = harness.queued_service(pipeline, pool);

    let outcome = service
        .submit_job("owner-1", Submission::Text(REPORT_REQUEST.to_string()))
        .unwrap();
    assert!(!outcome.queued);
    assert_eq!(outcome.status, JobStatus::Completed);
    assert_eq!(harness.job(&outcome.job_id).status, JobStatus::Completed);
}

#[test]
fn test_jobs_listed_newest_first_per_owner() {
    let harness = TestHarness::new();
    let service = harness.inline_service(harness.pipeline(
        Arc::new(LowercasePreprocessor),
        Arc::new(FixedInference::produtivo()),
    ));
    for text in ["primeiro", "segundo", "terceiro"] {
        service
            .submit_job("owner-1", Submission::Text(text.to_string()))
            .unwrap();
    }
    service
        .submit_job("owner-2", Submission::Text("outro".to_string()))
        .unwrap();

    let texts: Vec<String> = service
        .list_jobs("owner-1")
        .unwrap()
        .into_iter()
        .map(|job| job.original_text)
        .collect();
    assert_eq!(texts, vec!["terceiro", "segundo", "primeiro"]);
    assert!(service.list_jobs("owner-3").unwrap().is_empty());
}
