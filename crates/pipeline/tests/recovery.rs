//! Startup recovery and worker dispatch.

mod common;

use std::sync::Arc;
use std::time::Duration;

use lunara_core::quota::MembershipTier;
use lunara_db::models::status::GenerationJobStatus;
use lunara_pipeline::recovery::{recover_jobs, RecoverySummary};
use lunara_pipeline::{GenerationWorker, JobQueue};
use tokio_util::sync::CancellationToken;

use common::*;

const USER: i64 = 11;

#[tokio::test]
async fn recovery_restarts_resumes_and_interrupts() {
    let h = Harness::with_config(MockProvider::happy(), test_config(10));
    h.store.seed_user(USER, MembershipTier::Pro, 1000);
    h.store
        .insert_job(staged_job(1, USER, GenerationJobStatus::Pending, None, 0));
    h.store.insert_job(staged_job(
        2,
        USER,
        GenerationJobStatus::Polling,
        Some(OPERATION_NAME),
        4,
    ));
    h.store
        .insert_job(staged_job(3, USER, GenerationJobStatus::Processing, None, 0));
    let mut done = staged_job(4, USER, GenerationJobStatus::Completed, None, 0);
    done.video_url = Some("/media/videos/old.mp4".into());
    done.progress = 100;
    h.store.insert_job(done);

    let (queue, mut rx) = JobQueue::channel();
    let summary = recover_jobs(h.store.as_ref(), &queue).await.unwrap();
    assert_eq!(
        summary,
        RecoverySummary {
            restarted: 1,
            resumed: 1,
            interrupted: 1,
        }
    );

    drop(queue);
    let mut queued = Vec::new();
    while let Some(id) = rx.recv().await {
        queued.push(id);
    }
    queued.sort();
    assert_eq!(queued, [1, 2, 3]);

    // The resumed job is polled next, so it takes the only scripted answer.
    h.runner.run(2).await;
    let resumed = h.job(2);
    assert_eq!(resumed.status(), GenerationJobStatus::Completed);
    assert_eq!(resumed.poll_attempts, 5);
    assert_eq!(h.provider.submit_calls.load(std::sync::atomic::Ordering::SeqCst), 0);

    h.runner.run(3).await;
    let interrupted = h.job(3);
    assert_eq!(interrupted.error_code.as_deref(), Some("INTERRUPTED"));
    assert_eq!(interrupted.progress, 10);
    assert_terminal_invariants(&interrupted);

    assert_eq!(h.job(4).video_url.as_deref(), Some("/media/videos/old.mp4"));
}

#[tokio::test]
async fn resumed_job_keeps_counting_toward_ceiling() {
    let h = Harness::with_config(
        MockProvider::new(SubmitScript::Accept, vec![], FetchScript::Status(500)),
        test_config(6),
    );
    h.store.insert_job(staged_job(
        8,
        USER,
        GenerationJobStatus::Polling,
        Some(OPERATION_NAME),
        4,
    ));

    h.runner.run(8).await;

    let job = h.job(8);
    assert_eq!(job.error_code.as_deref(), Some("TIMEOUT"));
    assert_eq!(job.poll_attempts, 6);
    assert_eq!(h.provider.polls(), 2);
}

#[tokio::test]
async fn downloading_job_resumes_without_stepping_back_to_polling() {
    let h = Harness::with_config(MockProvider::happy(), test_config(5));
    h.store.seed_user(USER, MembershipTier::Pro, 1000);
    let mut staged = staged_job(
        9,
        USER,
        GenerationJobStatus::Downloading,
        Some(OPERATION_NAME),
        5,
    );
    staged.progress = 85;
    h.store.insert_job(staged);
    let mut rx = h.events.subscribe();

    h.runner.run(9).await;

    let job = h.job(9);
    assert_eq!(job.status(), GenerationJobStatus::Completed);
    assert_eq!(job.poll_attempts, 5);
    assert_terminal_invariants(&job);
    assert_eq!(h.provider.polls(), 1);
    assert_eq!(h.provider.fetches(), 1);
    assert_eq!(h.store.media().len(), 1);

    let mut statuses = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let Some(status) = event.payload["status"].as_str() {
            statuses.push(status.to_string());
        }
    }
    assert!(!statuses.iter().any(|s| s == "polling"), "{statuses:?}");
}

#[tokio::test]
async fn downloading_job_whose_operation_vanished_fails() {
    let h = Harness::with_config(
        MockProvider::new(
            SubmitScript::Accept,
            vec![PollScript::Fail(404)],
            FetchScript::Status(500),
        ),
        test_config(5),
    );
    h.store.insert_job(staged_job(
        10,
        USER,
        GenerationJobStatus::Downloading,
        Some(OPERATION_NAME),
        2,
    ));

    h.runner.run(10).await;

    let job = h.job(10);
    assert_eq!(job.status(), GenerationJobStatus::Failed);
    assert_ne!(job.error_code.as_deref(), Some("TIMEOUT"));
    assert_eq!(job.poll_attempts, 2);
    assert_eq!(h.provider.polls(), 1);
    assert_eq!(h.provider.fetches(), 0);
    assert_terminal_invariants(&job);
}

#[tokio::test]
async fn exhausted_polling_job_gets_one_final_status_check() {
    let h = Harness::with_config(MockProvider::happy(), test_config(4));
    h.store.seed_user(USER, MembershipTier::Pro, 1000);
    h.store.insert_job(staged_job(
        12,
        USER,
        GenerationJobStatus::Polling,
        Some(OPERATION_NAME),
        4,
    ));

    h.runner.run(12).await;

    let job = h.job(12);
    assert_eq!(job.status(), GenerationJobStatus::Completed);
    assert_eq!(job.poll_attempts, 4);
    assert_eq!(h.provider.polls(), 1);
}

#[tokio::test]
async fn exhausted_polling_job_still_running_times_out() {
    let h = Harness::with_config(
        MockProvider::new(SubmitScript::Accept, vec![], FetchScript::Status(500)),
        test_config(4),
    );
    h.store.insert_job(staged_job(
        13,
        USER,
        GenerationJobStatus::Polling,
        Some(OPERATION_NAME),
        4,
    ));

    h.runner.run(13).await;

    let job = h.job(13);
    assert_eq!(job.error_code.as_deref(), Some("TIMEOUT"));
    assert_eq!(job.poll_attempts, 4);
    assert_eq!(h.provider.polls(), 1);
    assert_terminal_invariants(&job);
}

#[tokio::test]
async fn worker_runs_queued_jobs_and_drains() {
    let h = Harness::new(MockProvider::happy());
    h.store.seed_user(USER, MembershipTier::Free, 100);
    let Harness {
        store,
        runner,
        media_dir: _media_dir,
        ..
    } = h;

    let (queue, rx) = JobQueue::channel();
    store.insert_job(staged_job(21, USER, GenerationJobStatus::Pending, None, 0));
    queue.enqueue(21).unwrap();
    drop(queue);

    let worker = GenerationWorker::new(Arc::new(runner));
    worker.run(rx, CancellationToken::new()).await;
    assert!(worker.drain(Duration::from_secs(5)).await);

    let job = store.job(21).unwrap();
    assert_eq!(job.status(), GenerationJobStatus::Completed);
    assert_eq!(worker.in_flight(), 0);
}

#[tokio::test]
async fn cancelled_worker_stops_consuming() {
    let h = Harness::new(MockProvider::happy());
    let (_queue, rx) = JobQueue::channel();
    let worker = GenerationWorker::new(Arc::new(h.runner));

    let cancel = CancellationToken::new();
    cancel.cancel();
    worker.run(rx, cancel).await;
    assert!(worker.drain(Duration::from_millis(100)).await);
}
