//! End-to-end session tests.
//!
//! Each test drives a request through decomposition, delegation, execution
//! and aggregation, and checks the final `OrchestrationResult`.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use weave::config::Config;
use weave::core::task::TaskStatus;
use weave::orchestration::{
    AgentOverride, CapabilityRegistry, CoordinatorEvent, ExecutionCoordinator, Orchestrator,
    OverrideSet,
};
use weave::DelegationRequest;

use crate::fixtures::{
    fast_config, orchestrator, profile, standard_registry, Script, ScriptedExecutor,
};

/// Test: A three-stage chain runs every stage on the matching agent.
///
/// Given: Research, implementation and testing agents
/// When: A "research then implement then test" request is run
/// Then: Each stage succeeds on its agent, in dependency order, and the
///       overall confidence weights the heavier middle stage more
#[tokio::test]
async fn test_chain_runs_on_matching_agents_in_order() {
    let executor = Arc::new(ScriptedExecutor::new());
    let request = DelegationRequest::new(
        "research caching options then implement the cache with an eviction policy then test the cache",
    );

    let result = orchestrator(standard_registry())
        .run(&request, &OverrideSet::empty(), executor.clone())
        .await
        .unwrap();

    assert!(result.success());
    assert_eq!(result.delegations().len(), 3);
    assert!(result.unassigned().is_empty());

    let agents: Vec<&str> = result
        .delegations()
        .iter()
        .map(|d| d.assigned_agent().as_str())
        .collect();
    assert_eq!(agents, vec!["researcher", "coder", "tester"]);

    let called: Vec<String> = executor.calls().iter().map(|c| c.task_name.clone()).collect();
    assert_eq!(called, vec!["research-1", "implementation-2", "testing-3"]);

    for result in result.results() {
        assert_eq!(result.status(), TaskStatus::Succeeded);
        assert_eq!(result.attempts(), 1);
        assert!(result.output().get("agent").is_some());
    }

    let complexities: Vec<u8> = result
        .delegations()
        .iter()
        .map(|d| d.estimated_complexity().value())
        .collect();
    assert_eq!(complexities, vec![3, 4, 3]);

    let achieved: Vec<(f64, f64)> = result
        .delegations()
        .iter()
        .map(|d| {
            let confidence = result
                .result_for(&d.task_id())
                .and_then(|r| r.confidence_achieved())
                .unwrap()
                .value();
            (d.estimated_complexity().weight(), confidence)
        })
        .collect();
    let expected = (achieved[0].0 * achieved[0].1
        + achieved[1].0 * achieved[1].1
        + achieved[2].0 * achieved[2].1)
        / (achieved[0].0 + achieved[1].0 + achieved[2].0);
    let unweighted = (achieved[0].1 + achieved[1].1 + achieved[2].1) / 3.0;

    assert!((result.overall_confidence() - expected).abs() < 1e-9);
    assert!((result.overall_confidence() - unweighted).abs() > 1e-6);
}

/// Test: Overall confidence is the complexity-weighted mean.
///
/// Given: A chain whose tasks succeed with their delegation confidence
/// When: The session is aggregated
/// Then: overall_confidence = Σ(weight × confidence) / Σ(weight)
#[tokio::test]
async fn test_overall_confidence_is_complexity_weighted() {
    let executor = Arc::new(ScriptedExecutor::new());
    let request = DelegationRequest::new(
        "research the options then implement the caching layer for every service",
    );

    let result = orchestrator(standard_registry())
        .run(&request, &OverrideSet::empty(), executor)
        .await
        .unwrap();

    assert!(result.success());
    let (weighted, weights) = result
        .delegations()
        .iter()
        .map(|d| {
            let achieved = result
                .result_for(&d.task_id())
                .and_then(|r| r.confidence_achieved())
                .unwrap()
                .value();
            let weight = d.estimated_complexity().weight();
            (weight * achieved, weight)
        })
        .fold((0.0, 0.0), |(s, w), (x, y)| (s + x, w + y));

    assert!((result.overall_confidence() - weighted / weights).abs() < 1e-9);
    assert!(result.overall_confidence() >= 0.70);
    assert!(result.overall_confidence() <= 0.95);
}

/// Test: Delegation confidences stay in bounds.
///
/// Given: Agents with baselines spanning the allowed range
/// When: A request is delegated
/// Then: Every delegation confidence is within [0.70, 0.95]
#[tokio::test]
async fn test_delegation_confidences_are_bounded() {
    let executor = Arc::new(ScriptedExecutor::new().script("testing", Script::succeed().with_confidence(1.4)));
    let request = DelegationRequest::new("research the API and also test the client");

    let result = orchestrator(standard_registry())
        .run(&request, &OverrideSet::empty(), executor)
        .await
        .unwrap();

    for delegation in result.delegations() {
        let confidence = delegation.confidence().value();
        assert!((0.70..=0.95).contains(&confidence), "{}", confidence);
    }
    for task in result.results() {
        let achieved = task.confidence_achieved().unwrap().value();
        assert!((0.70..=0.95).contains(&achieved), "{}", achieved);
    }
}

/// Test: A user override beats a higher-scoring agent.
///
/// Given: A strong researcher and a weaker in-house researcher
/// When: An override routes "research" to the in-house agent
/// Then: The override wins and the delegation explains why
#[tokio::test]
async fn test_override_beats_higher_scorer() {
    let registry = Arc::new(
        CapabilityRegistry::from_profiles([
            profile("researcher", "research", 0.95),
            profile("custom-researcher", "research", 0.75),
        ])
        .unwrap(),
    );
    let overrides = OverrideSet::new(vec![AgentOverride::new(
        "research",
        "custom-researcher",
        "in-house research agent knows our domain",
        "alice",
    )])
    .unwrap();
    let executor = Arc::new(ScriptedExecutor::new());

    let result = orchestrator(registry)
        .run(&DelegationRequest::new("research the market"), &overrides, executor.clone())
        .await
        .unwrap();

    assert!(result.success());
    let delegation = &result.delegations()[0];
    assert_eq!(delegation.assigned_agent().as_str(), "custom-researcher");
    assert!(delegation.reasoning().starts_with("override:"));
    assert_eq!(delegation.confidence().value(), 0.75);
    assert_eq!(executor.calls()[0].agent.as_str(), "custom-researcher");
}

/// Test: An override naming an unknown agent falls back to scoring.
#[tokio::test]
async fn test_override_for_unknown_agent_is_ignored() {
    let overrides = OverrideSet::new(vec![AgentOverride::new(
        "research",
        "ghost",
        "left the team",
        "bob",
    )])
    .unwrap();

    let result = orchestrator(standard_registry())
        .run(
            &DelegationRequest::new("research the market"),
            &overrides,
            Arc::new(ScriptedExecutor::new()),
        )
        .await
        .unwrap();

    assert!(result.success());
    assert_eq!(result.delegations()[0].assigned_agent().as_str(), "researcher");
}

/// Test: Lifecycle events stream while the session runs.
///
/// Given: A coordinator with an event channel
/// When: A two-stage chain runs
/// Then: Ready, start and success events arrive per task, then AllTasksFinished
#[tokio::test]
async fn test_lifecycle_events_are_emitted() {
    let (tx, mut rx) = mpsc::channel(64);
    let orchestrator = Orchestrator::new(standard_registry())
        .with_coordinator(ExecutionCoordinator::new(fast_config()).with_events(tx));

    let result = orchestrator
        .run(
            &DelegationRequest::new("research the API then implement the client"),
            &OverrideSet::empty(),
            Arc::new(ScriptedExecutor::new()),
        )
        .await
        .unwrap();
    assert!(result.success());

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }

    let started = events
        .iter()
        .filter(|e| matches!(e, CoordinatorEvent::TaskStarted { .. }))
        .count();
    let succeeded = events
        .iter()
        .filter(|e| matches!(e, CoordinatorEvent::TaskSucceeded { .. }))
        .count();
    let ready = events
        .iter()
        .filter(|e| matches!(e, CoordinatorEvent::TaskReady { .. }))
        .count();
    assert_eq!(ready, 2);
    assert_eq!(started, 2);
    assert_eq!(succeeded, 2);
    assert_eq!(events.last(), Some(&CoordinatorEvent::AllTasksFinished));
}

/// Test: A session configured from a TOML file.
///
/// Given: A weave.toml declaring agents, limits and an override
/// When: The config is loaded and drives an orchestrator
/// Then: The declared agents and override are used
#[tokio::test]
async fn test_session_from_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("weave.toml");
    std::fs::write(
        &path,
        r#"
[execution]
pool_size = 2
task_timeout_secs = 5
max_retries = 0

[[agents]]
id = "researcher"

[[agents.capabilities]]
name = "research"
min_complexity = 1
max_complexity = 7
baseline = 0.95

[[agents]]
id = "coder"

[[agents.capabilities]]
name = "implementation"
min_complexity = 1
max_complexity = 7
baseline = 0.95

[[agents]]
id = "security-coder"

[[agents.capabilities]]
name = "implementation"
min_complexity = 1
max_complexity = 7
baseline = 0.80

[[overrides]]
pattern = "auth"
agent = "security-coder"
reasoning = "auth code needs a security review"
user = "alice"
"#,
    )
    .unwrap();

    let config = Config::load_from(&path).unwrap();
    let registry = config.build_registry().unwrap();
    let overrides = config.override_set().unwrap();
    let orchestrator = Orchestrator::from_config(&config, registry);
    assert_eq!(orchestrator.registry().len(), 3);

    let executor = Arc::new(ScriptedExecutor::new());
    let result = orchestrator
        .run(
            &DelegationRequest::new("research token formats then implement the auth module"),
            &overrides,
            executor.clone(),
        )
        .await
        .unwrap();

    assert!(result.success());
    let agents: Vec<&str> = result
        .delegations()
        .iter()
        .map(|d| d.assigned_agent().as_str())
        .collect();
    assert_eq!(agents, vec!["researcher", "security-coder"]);
    assert_eq!(executor.call_count(), 2);
}

/// Test: The aggregated result serializes to JSON.
#[tokio::test]
async fn test_result_serializes_to_json() {
    let executor = Arc::new(
        ScriptedExecutor::new().script("research", Script::succeed().after(Duration::from_millis(5))),
    );
    let result = orchestrator(standard_registry())
        .run(
            &DelegationRequest::new("research the API then implement the client"),
            &OverrideSet::empty(),
            executor,
        )
        .await
        .unwrap();

    let json: serde_json::Value = serde_json::from_str(&result.to_json().unwrap()).unwrap();
    assert_eq!(json["success"], serde_json::Value::Bool(true));
    assert_eq!(json["results"].as_array().unwrap().len(), 2);
    assert_eq!(json["delegations"].as_array().unwrap().len(), 2);
}
