//! Startup order command handler.

use std::path::Path;

use anyhow::Result;

use startgate::graph::topological_sort;

use super::common::{load_graph, load_manifest};

/// Print the order services would be attempted in.
pub(crate) fn cmd_order(path: &Path, json: bool) -> Result<()> {
    let config = load_manifest(path)?;
    let dag = load_graph(&config)?;
    let order = topological_sort(&dag)?;

    if json {
        println!("{}", serde_json::to_string(&order)?);
    } else {
        for (i, id) in order.iter().enumerate() {
            println!("{:>3}. {}", i + 1, id);
        }
    }
    Ok(())
}
