//! Splits a free-form request into dependent subtasks.
//!
//! Prose is cut into *stages* on sequencing connectors ("then", "after
//! that", sentence breaks...) and each stage into *siblings* on parallel
//! connectors ("and also", "as well as", ";"...). Every task depends on all
//! tasks of the previous stage; siblings are independent. Numbered lists
//! become chains and bullet lists become independent tasks.
//!
//! Each fragment gets a structural confidence from how clearly its intent
//! can be read. If the mean falls below the threshold the request is
//! rejected as ambiguous and the caller may resubmit with constraints.

use crate::core::request::{Constraints, DelegationRequest};
use crate::core::score::Complexity;
use crate::core::task::{PlannedTask, TaskId};
use crate::error::{Error, Result};
use crate::orchestration::registry::CapabilityRegistry;
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::{Arc, LazyLock};
use tracing::{debug, info};

/// Minimum structural confidence for a request to be split.
pub const DEFAULT_DECOMPOSITION_THRESHOLD: f64 = 0.70;

/// Default upper bound on subtasks per request.
pub const DEFAULT_MAX_SUBTASKS: usize = 16;

/// Capability tag for fragments with no recognizable intent.
pub const GENERAL_CAPABILITY: &str = "general";

static SEQUENCE_SPLIT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:\.\s+|[,;]?\s+(?:and\s+then|then|after\s+that|afterwards|followed\s+by|finally)\b[,:]?\s*)",
    )
    .expect("SEQUENCE_SPLIT is a compile-time constant")
});

static PARALLEL_SPLIT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:\s*;\s*|,?\s+(?:and\s+also|as\s+well\s+as|in\s+parallel\s+with|alongside|while\s+also)\s+)")
        .expect("PARALLEL_SPLIT is a compile-time constant")
});

static NUMBERED_ITEM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*\d+[.)]\s+(.+)$").expect("NUMBERED_ITEM is a compile-time constant")
});

static BULLET_ITEM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*[-*•]\s+(.+)$").expect("BULLET_ITEM is a compile-time constant")
});

/// Verb stems that reveal a fragment's intent, checked in word order.
const INTENT_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "research",
        &["research", "investigat", "explor", "analy", "study", "compare", "evaluat"],
    ),
    (
        "implementation",
        &["implement", "build", "create", "write", "code", "develop", "add", "refactor", "fix"],
    ),
    ("testing", &["test", "verify", "validat", "qa"]),
    ("review", &["review", "audit", "inspect"]),
    ("documentation", &["document", "docs", "summariz", "explain"]),
    ("deployment", &["deploy", "release", "ship", "publish"]),
    ("search", &["search", "find", "locate", "lookup", "grep"]),
    ("filesystem", &["file", "files", "directory", "folder"]),
];

const HEAVY_WORDS: &[&str] = &[
    "complex",
    "entire",
    "full",
    "complete",
    "comprehensive",
    "architecture",
    "system",
    "migrate",
    "redesign",
];

const LIGHT_WORDS: &[&str] = &["simple", "quick", "small", "minor", "trivial", "typo"];

/// Structural confidence of a fragment whose intent was recognized.
const RECOGNIZED_CONFIDENCE: f64 = 1.0;
/// Fragment with no recognized intent but filled in by a capability hint.
const HINTED_CONFIDENCE: f64 = 0.9;
/// Fragment long enough to be a plausible instruction.
const DESCRIPTIVE_CONFIDENCE: f64 = 0.75;
/// Fragment too short to act on.
const TERSE_CONFIDENCE: f64 = 0.4;

/// Tasks produced for one request.
#[derive(Debug, Clone)]
pub struct Decomposition {
    /// Planned tasks, dependencies first.
    pub tasks: Vec<PlannedTask>,
    /// Mean structural confidence of the split.
    pub confidence: f64,
}

impl Decomposition {
    /// Dependency edges as `(dependency, dependent)` pairs.
    pub fn edges(&self) -> Vec<(TaskId, TaskId)> {
        self.tasks
            .iter()
            .flat_map(|t| t.dependencies.iter().map(move |d| (*d, t.id)))
            .collect()
    }
}

#[derive(Debug)]
struct Fragment {
    text: String,
    capability: String,
    confidence: f64,
    complexity: Complexity,
}

/// Turns a request into planned tasks with dependency edges.
#[derive(Debug, Clone)]
pub struct TaskDecomposer {
    registry: Arc<CapabilityRegistry>,
    threshold: f64,
    max_subtasks: usize,
}

impl TaskDecomposer {
    pub fn new(registry: Arc<CapabilityRegistry>) -> Self {
        Self {
            registry,
            threshold: DEFAULT_DECOMPOSITION_THRESHOLD,
            max_subtasks: DEFAULT_MAX_SUBTASKS,
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_max_subtasks(mut self, max_subtasks: usize) -> Self {
        self.max_subtasks = max_subtasks;
        self
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Split a request into planned tasks.
    ///
    /// # Errors
    /// - `AmbiguousDecomposition` when structural confidence is below the
    ///   threshold (including empty requests)
    /// - `Validation` when the split exceeds the subtask limit
    pub fn decompose(&self, request: &DelegationRequest) -> Result<Decomposition> {
        let default_constraints = Constraints::default();
        let constraints = request.constraints().unwrap_or(&default_constraints);

        let mut stages = split_stages(request.query());
        if constraints.sequential {
            stages = stages.into_iter().flatten().map(|f| vec![f]).collect();
        }

        let total: usize = stages.iter().map(Vec::len).sum();
        if total == 0 {
            return Err(Error::AmbiguousDecomposition {
                confidence: 0.0,
                threshold: self.threshold,
            });
        }

        let limit = constraints
            .max_subtasks
            .map_or(self.max_subtasks, |m| m.min(self.max_subtasks));
        if total > limit {
            return Err(Error::Validation(format!(
                "request splits into {} subtasks, limit is {}",
                total, limit
            )));
        }

        let known = self.registry.capability_names();
        let hint = constraints
            .capability_hint
            .as_deref()
            .map(|h| h.trim().to_lowercase())
            .filter(|h| !h.is_empty());

        let analyzed: Vec<Vec<Fragment>> = stages
            .into_iter()
            .map(|stage| {
                stage
                    .into_iter()
                    .map(|text| analyze(text, &known, hint.as_deref()))
                    .collect()
            })
            .collect();

        let confidence = analyzed
            .iter()
            .flatten()
            .map(|f| f.confidence)
            .sum::<f64>()
            / total as f64;

        if confidence < self.threshold {
            info!(
                confidence,
                threshold = self.threshold,
                "Request too ambiguous to decompose"
            );
            return Err(Error::AmbiguousDecomposition {
                confidence,
                threshold: self.threshold,
            });
        }

        let mut tasks = Vec::with_capacity(total);
        let mut previous_stage: Vec<TaskId> = Vec::new();
        for stage in analyzed {
            let mut current_stage = Vec::with_capacity(stage.len());
            for fragment in stage {
                let name = format!("{}-{}", fragment.capability, tasks.len() + 1);
                let task = PlannedTask::new(
                    &name,
                    &fragment.text,
                    &fragment.capability,
                    fragment.complexity,
                    previous_stage.clone(),
                );
                debug!(
                    task = %name,
                    capability = %task.capability,
                    complexity = %task.complexity,
                    dependencies = task.dependencies.len(),
                    "Planned task"
                );
                current_stage.push(task.id);
                tasks.push(task);
            }
            previous_stage = current_stage;
        }

        info!(tasks = tasks.len(), confidence, "Decomposed request");
        Ok(Decomposition { tasks, confidence })
    }
}

/// Cut a query into ordered stages of independent fragments.
fn split_stages(query: &str) -> Vec<Vec<String>> {
    let lines: Vec<&str> = query.lines().filter(|l| !l.trim().is_empty()).collect();

    let numbered: Vec<String> = list_items(&lines, &NUMBERED_ITEM);
    if numbered.len() >= 2 {
        return numbered.into_iter().map(|item| vec![item]).collect();
    }
    let bullets: Vec<String> = list_items(&lines, &BULLET_ITEM);
    if bullets.len() >= 2 {
        return vec![bullets];
    }

    let prose = lines.join(" ");
    SEQUENCE_SPLIT
        .split(&prose)
        .map(|segment| {
            PARALLEL_SPLIT
                .split(segment)
                .map(clean_fragment)
                .filter(|f| !f.is_empty())
                .collect::<Vec<_>>()
        })
        .filter(|stage| !stage.is_empty())
        .collect()
}

fn list_items(lines: &[&str], pattern: &Regex) -> Vec<String> {
    lines
        .iter()
        .filter_map(|line| pattern.captures(line))
        .filter_map(|caps| caps.get(1))
        .map(|m| clean_fragment(m.as_str()))
        .filter(|f| !f.is_empty())
        .collect()
}

fn clean_fragment(raw: &str) -> String {
    let trimmed = raw
        .trim()
        .trim_matches(|c: char| matches!(c, '.' | ',' | ';' | ':' | '!' | '?'))
        .trim();
    let lower = trimmed.to_lowercase();
    for prefix in ["and ", "also ", "then "] {
        if lower.starts_with(prefix) {
            return trimmed[prefix.len()..].trim().to_string();
        }
    }
    trimmed.to_string()
}

fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '-' || c == '_'))
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn keyword_matches(word: &str, keyword: &str) -> bool {
    word == keyword || (keyword.len() >= 4 && word.starts_with(keyword))
}

fn analyze(text: String, known: &BTreeSet<String>, hint: Option<&str>) -> Fragment {
    let words = words(&text);
    let complexity = estimate_complexity(&words);

    let recognized = words
        .iter()
        .find(|w| known.contains(w.as_str()))
        .cloned()
        .or_else(|| {
            words.iter().find_map(|word| {
                INTENT_KEYWORDS
                    .iter()
                    .find(|(_, stems)| stems.iter().any(|k| keyword_matches(word, k)))
                    .map(|(capability, _)| capability.to_string())
            })
        });

    let (capability, confidence) = match (recognized, hint) {
        (Some(capability), _) => (capability, RECOGNIZED_CONFIDENCE),
        (None, Some(hint)) => (hint.to_string(), HINTED_CONFIDENCE),
        (None, None) if words.len() >= 3 => (GENERAL_CAPABILITY.to_string(), DESCRIPTIVE_CONFIDENCE),
        (None, None) => (GENERAL_CAPABILITY.to_string(), TERSE_CONFIDENCE),
    };

    Fragment {
        text,
        capability,
        confidence,
        complexity,
    }
}

/// Longer fragments and words like "entire" or "redesign" raise the
/// estimate; "quick" or "typo" lower it.
fn estimate_complexity(words: &[String]) -> Complexity {
    let mut score = 3 + (words.len() / 5) as i32;
    if words.iter().any(|w| HEAVY_WORDS.contains(&w.as_str())) {
        score += 2;
    }
    if words.iter().any(|w| LIGHT_WORDS.contains(&w.as_str())) {
        score -= 1;
    }
    Complexity::new(score.clamp(1, 10) as u8)
}
