//! Integration test suite for weave.
//!
//! These tests exercise whole sessions from request to aggregated result,
//! including parallel execution, failure propagation and cancellation.
//! They verify that all components work together correctly.
//!
//! # Test Categories
//!
//! - `orchestration_e2e`: Full session tests
//! - `parallel_execution`: Concurrency and ordering guarantees
//! - `failure_handling`: Unassignable tasks, retries, timeouts, cycles
//! - `cancellation`: Session deadlines and external cancellation
//!
//! # CI Compatibility
//!
//! Agents are scripted in-process executors; no external services are
//! contacted.

mod fixtures;

mod cancellation;
mod orchestration_e2e;
mod parallel_execution;
