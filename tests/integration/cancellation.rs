//! Session deadline and cancellation tests.
//!
//! When a session is cancelled every unfinished task ends as
//! `SessionCancelled`, while results already recorded are kept.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use weave::core::task::FailureReason;
use weave::orchestration::{CoordinatorConfig, OverrideSet, RetryPolicy};
use weave::DelegationRequest;

use crate::fixtures::{
    fast_config, orchestrator, orchestrator_with, standard_registry, Script, ScriptedExecutor,
};

/// Test: A session deadline cancels running tasks but keeps finished ones.
///
/// Given: Three siblings, one fast and two that never finish
/// When: The 200ms session deadline elapses
/// Then: The fast sibling keeps its result; the others are cancelled
#[tokio::test]
async fn test_session_deadline_cancels_running_tasks() {
    let executor = Arc::new(
        ScriptedExecutor::new()
            .script("implementation", Script::hang())
            .script("testing", Script::hang()),
    );
    let config = CoordinatorConfig {
        session_deadline: Some(Duration::from_millis(200)),
        ..fast_config()
    };
    let request = DelegationRequest::new(
        "research the topic and also implement the parser and also test the suite",
    );

    let started = Instant::now();
    let result = orchestrator_with(standard_registry(), config)
        .run(&request, &OverrideSet::empty(), executor.clone())
        .await
        .unwrap();

    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(!result.success());
    assert_eq!(result.results().len(), 3);

    let mut cancelled = 0;
    for task in result.results() {
        match task.agent_id().map(|a| a.as_str()) {
            Some("researcher") => {
                assert!(task.success());
                assert!(!task.output().is_null());
            }
            _ => {
                assert_eq!(task.failure(), Some(&FailureReason::SessionCancelled));
                assert_eq!(task.failure().unwrap().to_string(), "session cancelled");
                assert!(task.started_at().is_some());
                cancelled += 1;
            }
        }
    }
    assert_eq!(cancelled, 2);
    assert_eq!(executor.call_count(), 3);
}

/// Test: External cancellation stops a chain mid-flight.
///
/// Given: A chain whose first stage never finishes
/// When: The caller cancels after 100ms
/// Then: Every task is cancelled and later stages never start
#[tokio::test]
async fn test_external_cancel_stops_chain() {
    let executor = Arc::new(ScriptedExecutor::new().script("research", Script::hang()));
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let result = orchestrator(standard_registry())
        .run_with_cancel(
            &DelegationRequest::new("research the format then implement the parser"),
            &OverrideSet::empty(),
            executor.clone(),
            cancel,
        )
        .await
        .unwrap();

    assert!(!result.success());
    assert!(result
        .results()
        .iter()
        .all(|r| r.failure() == Some(&FailureReason::SessionCancelled)));
    assert_eq!(result.results()[1].attempts(), 0);
    assert_eq!(executor.call_count(), 1);
    assert_eq!(executor.calls_for("implementation"), 0);
}

/// Test: A token cancelled before the run starts nothing.
#[tokio::test]
async fn test_precancelled_session_invokes_no_agent() {
    let executor = Arc::new(ScriptedExecutor::new());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = orchestrator(standard_registry())
        .run_with_cancel(
            &DelegationRequest::new("research the format and also implement the parser"),
            &OverrideSet::empty(),
            executor.clone(),
            cancel,
        )
        .await
        .unwrap();

    assert!(!result.success());
    assert_eq!(result.results().len(), 2);
    assert!(result
        .results()
        .iter()
        .all(|r| r.failure() == Some(&FailureReason::SessionCancelled)));
    assert_eq!(executor.call_count(), 0);
    assert_eq!(result.overall_confidence(), 0.0);
}

/// Test: Cancellation interrupts a retry backoff.
///
/// Given: A flaky agent and a 10s backoff between attempts
/// When: The session is cancelled during the backoff
/// Then: The session ends promptly with no second attempt
#[tokio::test]
async fn test_cancel_interrupts_backoff() {
    let executor = Arc::new(ScriptedExecutor::new().script("research", Script::flaky(1)));
    let config = CoordinatorConfig {
        retry: RetryPolicy::new()
            .with_max_retries(3)
            .with_initial_delay(Duration::from_secs(10))
            .with_max_delay(Duration::from_secs(10)),
        ..fast_config()
    };
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let result = orchestrator_with(standard_registry(), config)
        .run_with_cancel(
            &DelegationRequest::new("research the market"),
            &OverrideSet::empty(),
            executor.clone(),
            cancel,
        )
        .await
        .unwrap();

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(
        result.results()[0].failure(),
        Some(&FailureReason::SessionCancelled)
    );
    assert_eq!(executor.call_count(), 1);
}
