// ABOUTME: Integration tests for the generation orchestrator lifecycle
// ABOUTME: Covers completion, downstream failure, submission errors, retries and cancellation

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use common::{completed, failed, fast_config, orchestrator, running, wait_for_terminal, ScriptedBackend};
use droneguide_tasks::{TaskError, TaskStatus};
use droneguide_visualize::{BackendError, GenerationError, OrchestratorConfig};

#[tokio::test(start_paused = true)]
async fn test_generation_runs_to_completion_with_monotonic_progress() {
    let backend = Arc::new(ScriptedBackend::with_progress(vec![
        running(10),
        running(40),
        running(30),
        running(85),
        completed(),
    ]));
    let orchestrator = orchestrator(backend.clone(), fast_config());

    let task = orchestrator
        .start_generation("drone frame", Some("user-1"), Some("proj-1"))
        .await
        .unwrap();
    assert_eq!(task.status, TaskStatus::Running);

    let (finished, seen) = wait_for_terminal(orchestrator.store(), &task.task_id).await;
    assert_eq!(finished.status, TaskStatus::Completed);
    assert_eq!(finished.progress, 100);
    assert!(seen.windows(2).all(|pair| pair[0] <= pair[1]), "progress regressed: {:?}", seen);

    let image = orchestrator.store().fetch_result(&task.task_id).unwrap();
    assert!(!image.is_empty());
    assert_eq!(backend.fetch_calls.load(Ordering::SeqCst), 1);
    assert_eq!(orchestrator.active_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_downstream_failure_marks_task_failed() {
    let backend = Arc::new(ScriptedBackend::with_progress(vec![
        running(20),
        failed("CUDA out of memory"),
    ]));
    let orchestrator = orchestrator(backend.clone(), fast_config());

    let task = orchestrator
        .start_generation("drone frame", None, None)
        .await
        .unwrap();
    let (finished, _) = wait_for_terminal(orchestrator.store(), &task.task_id).await;

    assert_eq!(finished.status, TaskStatus::Failed);
    assert_eq!(finished.error.as_deref(), Some("CUDA out of memory"));
    assert_eq!(backend.fetch_calls.load(Ordering::SeqCst), 0);

    // The driver stopped polling once the task failed
    let calls = backend.progress_calls.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(backend.progress_calls.load(Ordering::SeqCst), calls);
}

#[tokio::test(start_paused = true)]
async fn test_rejected_submission_leaves_no_task() {
    let backend = Arc::new(ScriptedBackend::failing_submit(BackendError::Busy));
    let orchestrator = orchestrator(backend, fast_config());

    let result = orchestrator.start_generation("drone frame", None, None).await;
    assert!(matches!(result, Err(GenerationError::Submit(BackendError::Busy))));
    assert!(orchestrator.store().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_blank_prompt_is_rejected_before_submission() {
    let backend = Arc::new(ScriptedBackend::with_progress(vec![]));
    let orchestrator = orchestrator(backend, fast_config());

    let result = orchestrator.start_generation("   ", None, None).await;
    assert!(matches!(result, Err(GenerationError::Validation(_))));
    assert!(orchestrator.store().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_transient_poll_errors_are_tolerated() {
    let backend = Arc::new(ScriptedBackend::with_progress(vec![
        Err(BackendError::Timeout),
        Err(BackendError::Timeout),
        running(60),
        Err(BackendError::Timeout),
        completed(),
    ]));
    let orchestrator = orchestrator(backend, fast_config());

    let task = orchestrator
        .start_generation("drone frame", None, None)
        .await
        .unwrap();
    let (finished, _) = wait_for_terminal(orchestrator.store(), &task.task_id).await;
    assert_eq!(finished.status, TaskStatus::Completed);
}

#[tokio::test(start_paused = true)]
async fn test_repeated_poll_errors_fail_the_task() {
    let backend = Arc::new(ScriptedBackend::with_progress(vec![
        Err(BackendError::Timeout),
        Err(BackendError::Timeout),
        Err(BackendError::Timeout),
    ]));
    let orchestrator = orchestrator(backend, fast_config());

    let task = orchestrator
        .start_generation("drone frame", None, None)
        .await
        .unwrap();
    let (finished, _) = wait_for_terminal(orchestrator.store(), &task.task_id).await;

    assert_eq!(finished.status, TaskStatus::Failed);
    assert!(finished
        .error
        .unwrap()
        .starts_with("Lost contact with image service"));
}

#[tokio::test(start_paused = true)]
async fn test_lost_remote_task_fails_immediately() {
    let backend = Arc::new(ScriptedBackend::with_progress(vec![Err(
        BackendError::NotFound("remote-1".to_string()),
    )]));
    let orchestrator = orchestrator(backend, fast_config());

    let task = orchestrator
        .start_generation("drone frame", None, None)
        .await
        .unwrap();
    let (finished, _) = wait_for_terminal(orchestrator.store(), &task.task_id).await;
    assert_eq!(finished.status, TaskStatus::Failed);
}

#[tokio::test(start_paused = true)]
async fn test_unretrievable_image_fails_the_task() {
    let backend = Arc::new(
        ScriptedBackend::with_progress(vec![completed()])
            .with_image(Err(BackendError::InvalidResponse("not an image".to_string()))),
    );
    let orchestrator = orchestrator(backend, fast_config());

    let task = orchestrator
        .start_generation("drone frame", None, None)
        .await
        .unwrap();
    let (finished, _) = wait_for_terminal(orchestrator.store(), &task.task_id).await;

    assert_eq!(finished.status, TaskStatus::Failed);
    assert!(finished.error.unwrap().contains("Failed to retrieve generated image"));
    assert!(matches!(
        orchestrator.store().fetch_result(&task.task_id),
        Err(TaskError::Failed(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_unresponsive_progress_checks_fail_the_task() {
    let backend = Arc::new(ScriptedBackend::stalled());
    let orchestrator = orchestrator(backend.clone(), fast_config());

    let task = orchestrator
        .start_generation("drone frame", None, None)
        .await
        .unwrap();
    let (finished, _) = wait_for_terminal(orchestrator.store(), &task.task_id).await;

    assert_eq!(finished.status, TaskStatus::Failed);
    assert!(finished
        .error
        .unwrap()
        .contains("did not respond in time"));
    assert_eq!(backend.progress_calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn test_unresponsive_image_download_fails_the_task() {
    let backend = Arc::new(ScriptedBackend::with_progress(vec![completed()]).stalling_fetch());
    let orchestrator = orchestrator(backend.clone(), fast_config());

    let task = orchestrator
        .start_generation("drone frame", None, None)
        .await
        .unwrap();
    let (finished, _) = wait_for_terminal(orchestrator.store(), &task.task_id).await;

    assert_eq!(finished.status, TaskStatus::Failed);
    let error = finished.error.unwrap();
    assert!(error.contains("Failed to retrieve generated image"));
    assert!(error.contains("did not respond in time"));
    assert_eq!(backend.fetch_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_generation_exceeding_budget_times_out() {
    let backend = Arc::new(ScriptedBackend::with_progress(vec![]));
    let config = OrchestratorConfig {
        max_duration: Duration::from_secs(10),
        ..fast_config()
    };
    let orchestrator = orchestrator(backend, config);

    let task = orchestrator
        .start_generation("drone frame", None, None)
        .await
        .unwrap();
    let (finished, _) = wait_for_terminal(orchestrator.store(), &task.task_id).await;

    assert_eq!(finished.status, TaskStatus::Failed);
    assert!(finished.error.unwrap().contains("timed out"));
}

#[tokio::test(start_paused = true)]
async fn test_cancel_stops_driver_and_fails_task() {
    let backend = Arc::new(ScriptedBackend::with_progress(vec![]));
    let orchestrator = orchestrator(backend.clone(), fast_config());

    let task = orchestrator
        .start_generation("drone frame", None, None)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_secs(5)).await;

    let cancelled = orchestrator.cancel(&task.task_id).unwrap();
    assert_eq!(cancelled.status, TaskStatus::Failed);
    assert_eq!(cancelled.error.as_deref(), Some("Generation cancelled"));
    assert_eq!(orchestrator.active_count(), 0);

    let calls = backend.progress_calls.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(backend.progress_calls.load(Ordering::SeqCst), calls);

    assert!(matches!(
        orchestrator.cancel(&task.task_id),
        Err(GenerationError::Task(TaskError::Finished { .. }))
    ));
}
