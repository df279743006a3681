//! Shared CLI helpers used across multiple command handlers.

use std::path::Path;

use anyhow::{bail, Context, Result};

use startgate::config::Config;
use startgate::graph::{build_dag, validate_dag, DependencyDag};

/// Load and validate the manifest at `path`.
pub(crate) fn load_manifest(path: &Path) -> Result<Config> {
    let config = Config::load_from_path(path)
        .with_context(|| format!("Failed to load manifest {}", path.display()))?;
    config.validate().context("Invalid manifest")?;
    Ok(config)
}

/// Build the dependency graph and reject it if it has cycles.
pub(crate) fn load_graph(config: &Config) -> Result<DependencyDag> {
    let nodes = config
        .build_nodes()
        .context("Failed to build services from manifest")?;
    let dag = build_dag(nodes);

    let validation = validate_dag(&dag);
    if !validation.is_valid() {
        let cycles: Vec<String> = validation
            .cycles
            .iter()
            .map(|cycle| cycle.join(" -> "))
            .collect();
        bail!("Dependency cycle(s): {}", cycles.join("; "));
    }
    Ok(dag)
}
