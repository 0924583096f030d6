//! Project management commands: list-projects and delete-project.

use std::io::Write;

use clap::Args;

use codecontext_search::Result;

use super::{resolve_root, AppContext};
use crate::GlobalOptions;

/// Arguments for delete-project
#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// Project to delete
    name: String,

    /// Skip the confirmation prompt
    #[arg(long, short = 'y')]
    yes: bool,
}

pub async fn list(global: &GlobalOptions) -> Result<()> {
    let root = resolve_root(None)?;
    let context = AppContext::build(global, &root)?;
    let projects = context.registry().list().await?;

    if projects.is_empty() {
        println!("No indexed projects.");
        return Ok(());
    }
    for project in projects {
        println!("{}\t{}", project.project_id, project.collection);
    }
    Ok(())
}

pub async fn delete(args: DeleteArgs, global: &GlobalOptions) -> Result<()> {
    let root = resolve_root(None)?;
    let context = AppContext::build(global, &root)?;
    let registry = context.registry();

    // Resolve first so an unknown name fails with suggestions.
    let info = registry.resolve(&args.name).await?;

    if !args.yes && !confirm(&format!("Delete project '{}' and its index?", info.project_id)) {
        println!("Aborted.");
        return Ok(());
    }

    registry.delete(&info.project_id).await?;
    println!("Deleted project '{}'.", info.project_id);
    Ok(())
}

fn confirm(prompt: &str) -> bool {
    print!("{} [y/N] ", prompt);
    if std::io::stdout().flush().is_err() {
        return false;
    }
    let mut answer = String::new();
    if std::io::stdin().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}
