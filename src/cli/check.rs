//! Manifest check command handler.

use std::path::Path;

use anyhow::{bail, Context, Result};

use startgate::config::validate::{validate_config, DiagnosticLevel};
use startgate::config::Config;
use startgate::graph::{build_dag, topological_sort, validate_dag};

/// Lint the manifest, then check the graph it describes.
pub(crate) fn cmd_check(path: &Path) -> Result<()> {
    println!("Manifest: {}", path.display());

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read manifest {}", path.display()))?;

    let raw: serde_json::Value = match serde_json::from_str(&content) {
        Ok(v) => v,
        Err(e) => {
            println!("[ERROR] Invalid JSON: {}", e);
            bail!("Manifest is not valid JSON");
        }
    };

    let diagnostics = validate_config(&raw);
    for diag in &diagnostics {
        println!("{}", diag);
    }
    let mut errors = diagnostics
        .iter()
        .filter(|d| d.level == DiagnosticLevel::Error)
        .count();
    let warnings = diagnostics
        .iter()
        .filter(|d| d.level == DiagnosticLevel::Warn)
        .count();

    let mut config = Config::from_json_str(&content).context("Failed to parse manifest")?;
    config.apply_env_overrides();

    let problems = config.problems();
    for problem in &problems {
        println!("[ERROR] {}", problem);
    }
    errors += problems.len();

    if problems.is_empty() {
        let dag = build_dag(config.build_nodes()?);
        let validation = validate_dag(&dag);
        if validation.is_valid() {
            match topological_sort(&dag) {
                Ok(order) => println!("[OK] Startup order: {}", order.join(", ")),
                Err(e) => {
                    println!("[ERROR] {}", e);
                    errors += 1;
                }
            }
        } else {
            for cycle in &validation.cycles {
                println!("[ERROR] Cycle: {}", cycle.join(" -> "));
            }
            errors += validation.cycles.len();
        }
    }

    if errors == 0 && warnings == 0 {
        println!("\nManifest looks good!");
    } else {
        println!("\nFound {} error(s), {} warning(s)", errors, warnings);
    }

    if errors > 0 {
        bail!("Manifest check failed");
    }
    Ok(())
}
