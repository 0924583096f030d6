//! Status command - per-project index summary.

use clap::Args;

use codecontext_search::{ProjectStatus, Result};

use super::{resolve_root, AppContext};
use crate::GlobalOptions;

/// Arguments for the status command
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Show one project (default: all)
    #[arg(long)]
    project: Option<String>,
}

pub async fn execute(args: StatusArgs, global: &GlobalOptions) -> Result<()> {
    let root = resolve_root(None)?;
    let context = AppContext::build(global, &root)?;
    let registry = context.registry();

    let targets: Vec<String> = match args.project.or_else(|| global.project.clone()) {
        Some(project) => vec![registry.resolve(&project).await?.project_id],
        None => registry
            .list()
            .await?
            .into_iter()
            .map(|p| p.project_id)
            .collect(),
    };

    if targets.is_empty() {
        println!("No indexed projects.");
        return Ok(());
    }
    for project in targets {
        let status = registry.status(&project).await?;
        print_status(&status);
    }
    Ok(())
}

fn print_status(status: &ProjectStatus) {
    println!("project: {}", status.project_id);
    println!("  points: {}", status.points);
    match &status.state {
        Some(state) => {
            println!("  files: {}", state.total_files);
            println!("  objects: {}", state.total_objects);
            println!("  documents: {}", state.total_documents);
            println!("  relationships: {}", state.relationships.len());
            println!("  last indexed: {}", format_epoch(state.last_indexed));
        }
        None => {
            println!("  state: not committed (interrupted run; re-index to repair)");
        }
    }
}

/// Render unix seconds without pulling in a date crate.
fn format_epoch(seconds: u64) -> String {
    if seconds == 0 {
        return "never".to_string();
    }
    format!("{} (unix)", seconds)
}
