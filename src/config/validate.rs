//! Manifest linting with unknown field detection.
//!
//! Works on the raw JSON so typos that serde would silently ignore (every
//! struct is `#[serde(default)]`) still surface, with a suggestion.

use serde_json::{Map, Value};
use std::collections::HashSet;

/// Known top-level manifest field names.
const KNOWN_TOP_LEVEL: &[&str] = &["logging", "startup", "services"];

const KNOWN_LOGGING: &[&str] = &["format", "level", "file"];

const KNOWN_STARTUP: &[&str] = &[
    "dependency_health_threshold",
    "init_timeout_secs",
    "readiness_timeout_ms",
    "liveness_attempts",
    "max_passes",
    "pass_delay_ms",
    "unwired_custom_liveness_passes",
    "event_buffer",
];

const KNOWN_SERVICE: &[&str] = &[
    "id",
    "name",
    "dependencies",
    "optional_dependencies",
    "command",
    "liveness",
    "readiness",
    "traffic",
    "priority",
];

/// A validation diagnostic.
#[derive(Debug)]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    pub path: String,
    pub message: String,
}

#[derive(Debug, PartialEq)]
pub enum DiagnosticLevel {
    Ok,
    Warn,
    Error,
}

impl Diagnostic {
    fn new(level: DiagnosticLevel, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            path: path.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prefix = match self.level {
            DiagnosticLevel::Ok => "[OK]",
            DiagnosticLevel::Warn => "[WARN]",
            DiagnosticLevel::Error => "[ERROR]",
        };
        if self.path.is_empty() {
            write!(f, "{} {}", prefix, self.message)
        } else {
            write!(f, "{} {}: {}", prefix, self.path, self.message)
        }
    }
}

/// Simple Levenshtein distance for "did you mean?" suggestions.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// Suggest the closest known field name (if distance <= 3).
pub fn suggest_field(unknown: &str, known: &[&str]) -> Option<String> {
    known
        .iter()
        .map(|k| (k, levenshtein(unknown, k)))
        .filter(|(_, d)| *d <= 3)
        .min_by_key(|(_, d)| *d)
        .map(|(k, _)| format!("did you mean '{}'?", k))
}

/// Push an error for every key of `obj` not in `known`. Returns how many.
fn check_keys(
    obj: &Map<String, Value>,
    known: &[&str],
    prefix: &str,
    diagnostics: &mut Vec<Diagnostic>,
) -> usize {
    let known_set: HashSet<&str> = known.iter().copied().collect();
    let mut unknown = 0;
    for key in obj.keys() {
        if known_set.contains(key.as_str()) {
            continue;
        }
        unknown += 1;
        let message = match suggest_field(key, known) {
            Some(suggestion) => format!("Unknown field '{}' ({})", key, suggestion),
            None => format!("Unknown field '{}'", key),
        };
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };
        diagnostics.push(Diagnostic::new(DiagnosticLevel::Error, path, message));
    }
    unknown
}

/// Validate a raw JSON manifest against known field names.
pub fn validate_config(raw: &Value) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    let Some(obj) = raw.as_object() else {
        diagnostics.push(Diagnostic::new(
            DiagnosticLevel::Error,
            "",
            "Manifest must be a JSON object",
        ));
        return diagnostics;
    };

    diagnostics.push(Diagnostic::new(DiagnosticLevel::Ok, "", "Valid JSON"));

    let mut unknown = check_keys(obj, KNOWN_TOP_LEVEL, "", &mut diagnostics);
    if let Some(logging) = obj.get("logging").and_then(Value::as_object) {
        unknown += check_keys(logging, KNOWN_LOGGING, "logging", &mut diagnostics);
    }
    if let Some(startup) = obj.get("startup").and_then(Value::as_object) {
        unknown += check_keys(startup, KNOWN_STARTUP, "startup", &mut diagnostics);
    }

    let services = obj
        .get("services")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    for (i, service) in services.iter().enumerate() {
        let prefix = format!("services[{}]", i);
        let Some(service) = service.as_object() else {
            diagnostics.push(Diagnostic::new(
                DiagnosticLevel::Error,
                prefix,
                "Service must be a JSON object",
            ));
            continue;
        };
        unknown += check_keys(service, KNOWN_SERVICE, &prefix, &mut diagnostics);

        let liveness_kind = service
            .get("liveness")
            .and_then(|l| l.get("kind"))
            .and_then(Value::as_str);
        match liveness_kind {
            Some("custom") => diagnostics.push(Diagnostic::new(
                DiagnosticLevel::Warn,
                format!("{}.liveness", prefix),
                "Custom liveness has no hook in a manifest; startup.unwired_custom_liveness_passes decides the outcome",
            )),
            None if !service.contains_key("command") => diagnostics.push(Diagnostic::new(
                DiagnosticLevel::Warn,
                format!("{}.liveness", prefix),
                "No liveness check and no command; the service is always considered alive",
            )),
            _ => {}
        }
    }

    if services.is_empty() {
        diagnostics.push(Diagnostic::new(
            DiagnosticLevel::Warn,
            "services",
            "No services declared",
        ));
    }

    if unknown == 0 {
        diagnostics.push(Diagnostic::new(
            DiagnosticLevel::Ok,
            "",
            "All fields recognized",
        ));
    }

    diagnostics
}
