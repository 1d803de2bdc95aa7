//! Concurrency and ordering tests.
//!
//! Independent tasks should overlap in time; dependent tasks must never
//! start before their dependencies finish.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use weave::core::score::Complexity;
use weave::core::task::PlannedTask;
use weave::orchestration::{
    CoordinatorConfig, DelegationEngine, ExecutionCoordinator, OverrideSet,
};
use weave::DelegationRequest;

use crate::fixtures::{
    fast_config, orchestrator, orchestrator_with, standard_registry, Script, ScriptedExecutor,
};

const STEP: Duration = Duration::from_millis(150);

/// Test: Independent siblings run in parallel.
///
/// Given: Three independent tasks that each take 150ms
/// When: The session runs with the default pool
/// Then: Wall time is close to one task, not the sum of three
#[tokio::test]
async fn test_independent_tasks_overlap() {
    let executor = Arc::new(
        ScriptedExecutor::new()
            .script("research", Script::succeed().after(STEP))
            .script("implementation", Script::succeed().after(STEP))
            .script("testing", Script::succeed().after(STEP)),
    );
    let request = DelegationRequest::new(
        "research the protocol and also implement the codec and also test the framing",
    );

    let started = Instant::now();
    let result = orchestrator(standard_registry())
        .run(&request, &OverrideSet::empty(), executor.clone())
        .await
        .unwrap();
    let elapsed = started.elapsed();

    assert!(result.success());
    assert_eq!(executor.call_count(), 3);
    assert!(elapsed >= STEP);
    assert!(
        elapsed < STEP * 2,
        "independent tasks should overlap, took {:?}",
        elapsed
    );
}

/// Test: A concurrency cap of one serializes siblings.
///
/// Given: Two independent 150ms tasks and max_concurrency = 1
/// When: The session runs
/// Then: Wall time is at least the sum of both tasks
#[tokio::test]
async fn test_concurrency_cap_serializes_siblings() {
    let executor = Arc::new(
        ScriptedExecutor::new()
            .script("research", Script::succeed().after(STEP))
            .script("implementation", Script::succeed().after(STEP)),
    );
    let config = CoordinatorConfig {
        max_concurrency: Some(1),
        ..fast_config()
    };

    let started = Instant::now();
    let result = orchestrator_with(standard_registry(), config)
        .run(
            &DelegationRequest::new("research the protocol and also implement the codec"),
            &OverrideSet::empty(),
            executor,
        )
        .await
        .unwrap();

    assert!(result.success());
    assert!(started.elapsed() >= STEP * 2);
}

/// Test: Dependents start only after their dependency finished.
///
/// Given: A three-stage chain with slow stages
/// When: The session runs
/// Then: Each stage's start is at or after the previous stage's finish
#[tokio::test]
async fn test_dependents_start_after_dependencies_finish() {
    let executor = Arc::new(
        ScriptedExecutor::new()
            .script("research", Script::succeed().after(Duration::from_millis(50)))
            .script("implementation", Script::succeed().after(Duration::from_millis(50))),
    );
    let request =
        DelegationRequest::new("research the format then implement the parser then test the parser");

    let result = orchestrator(standard_registry())
        .run(&request, &OverrideSet::empty(), executor)
        .await
        .unwrap();

    assert!(result.success());
    let results = result.results();
    assert_eq!(results.len(), 3);
    for pair in results.windows(2) {
        let finished = pair[0].finished_at();
        let started = pair[1].started_at().unwrap();
        assert!(started >= finished, "{} started before {} finished", pair[1].task_id(), pair[0].task_id());
    }
}

/// Test: A diamond waits for both branches.
///
/// Given: A → {B, C} → D built directly as planned tasks
/// When: The plan is delegated and executed
/// Then: B and C overlap, and D starts after both finish
#[tokio::test]
async fn test_diamond_joins_both_branches() {
    let registry = standard_registry();
    let a = PlannedTask::new("research-1", "research the API", "research", Complexity::new(3), vec![]);
    let b = PlannedTask::new(
        "implementation-2",
        "implement the client",
        "implementation",
        Complexity::new(3),
        vec![a.id],
    );
    let c = PlannedTask::new(
        "implementation-3",
        "implement the server",
        "implementation",
        Complexity::new(3),
        vec![a.id],
    );
    let d = PlannedTask::new(
        "testing-4",
        "test the round trip",
        "testing",
        Complexity::new(3),
        vec![b.id, c.id],
    );
    let tasks = vec![a.clone(), b.clone(), c.clone(), d.clone()];

    let plan = DelegationEngine::new(registry)
        .delegate(&tasks, &OverrideSet::empty())
        .unwrap();
    let executor = Arc::new(
        ScriptedExecutor::new().script("implementation", Script::succeed().after(STEP)),
    );

    let started = Instant::now();
    let results = ExecutionCoordinator::new(fast_config())
        .execute(&plan, executor.clone(), CancellationToken::new())
        .await
        .unwrap();
    let elapsed = started.elapsed();

    assert_eq!(results.len(), 4);
    assert!(results.iter().all(|r| r.success()));
    assert_eq!(results[0].task_id(), a.id);
    assert_eq!(results[3].task_id(), d.id);
    assert!(elapsed < STEP * 2, "branches should overlap, took {:?}", elapsed);

    let by_id = |id| results.iter().find(|r| r.task_id() == id).unwrap();
    let join_start = by_id(d.id).started_at().unwrap();
    assert!(join_start >= by_id(b.id).finished_at());
    assert!(join_start >= by_id(c.id).finished_at());
}
