//! Structured logging for orchestration sessions.
//!
//! Log levels:
//! - ERROR: Failures that prevent a session from producing a result
//! - WARN: Task failures, timeouts, skipped overrides
//! - INFO: Session lifecycle (decomposition, delegation, completion)
//! - DEBUG: Per-task scoring and dispatch traces
//! - TRACE: Very detailed traces
//!
//! Debug mode can be enabled with `init(true)` or the `WEAVE_DEBUG=1` env
//! var. `WEAVE_LOG` (falling back to `RUST_LOG`) overrides the filter.

use tracing_subscriber::EnvFilter;

/// Env var that enables debug-level logging.
pub const DEBUG_ENV: &str = "WEAVE_DEBUG";
/// Env var holding a full filter directive.
pub const FILTER_ENV: &str = "WEAVE_LOG";

/// Install the global fmt subscriber.
///
/// Safe to call more than once; later calls are ignored.
pub fn init(debug: bool) {
    let filter = build_filter(debug || env_debug());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// Whether `WEAVE_DEBUG` requests debug logging.
pub fn env_debug() -> bool {
    std::env::var(DEBUG_ENV)
        .map(|v| is_truthy(&v))
        .unwrap_or(false)
}

fn is_truthy(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}

/// Default directive for the given mode.
pub fn default_directive(debug: bool) -> &'static str {
    if debug {
        "weave=debug,warn"
    } else {
        "weave=info,warn"
    }
}

fn build_filter(debug: bool) -> EnvFilter {
    std::env::var(FILTER_ENV)
        .or_else(|_| std::env::var("RUST_LOG"))
        .ok()
        .and_then(|directive| EnvFilter::try_new(directive).ok())
        .unwrap_or_else(|| EnvFilter::new(default_directive(debug)))
}
