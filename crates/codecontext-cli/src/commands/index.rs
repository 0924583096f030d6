//! Index command - full and incremental project sync.

use std::path::PathBuf;

use clap::Args;
use tokio_util::sync::CancellationToken;

use codecontext_search::{ProjectIndexer, Result};

use super::{project_id, resolve_root, AppContext};
use crate::progress;
use crate::GlobalOptions;

/// Arguments for the index command
#[derive(Args, Debug)]
pub struct IndexArgs {
    /// Project directory (default: current directory)
    path: Option<PathBuf>,

    /// Re-index only files changed since the last run
    #[arg(long)]
    incremental: bool,

    /// Drop the existing index before indexing
    #[arg(long)]
    force: bool,
}

pub async fn execute(args: IndexArgs, global: &GlobalOptions) -> Result<()> {
    let root = resolve_root(args.path)?;
    let context = AppContext::build(global, &root)?;
    let project = project_id(global, &root);
    let collection = context.collection(&project);

    if args.force && context.store.collection_exists(&collection).await? {
        let spinner = progress::spinner(&format!("Dropping index for '{}'", project), global.quiet);
        context.store.drop_collection(&collection).await?;
        progress::finish_spinner(spinner, "Existing index dropped");
    }

    let indexer = ProjectIndexer::new(
        context.store.clone(),
        context.provider.clone(),
        &context.config,
        project.clone(),
        root.clone(),
        collection,
    );

    // Ctrl-C cancels; the run commits no state and resumes incrementally.
    let cancel = CancellationToken::new();
    let cancel_on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel_on_signal.cancel();
        }
    });

    let mode = if args.incremental { "incremental" } else { "full" };
    let spinner = progress::spinner(
        &format!("Indexing '{}' ({} sync)", project, mode),
        global.quiet,
    );
    let report = if args.incremental {
        indexer.incremental_sync(&cancel).await
    } else {
        indexer.full_sync(&cancel).await
    };
    let report = match report {
        Ok(report) => report,
        Err(error) => {
            progress::finish_spinner_error(spinner, "Indexing failed");
            return Err(error);
        }
    };
    progress::finish_spinner(
        spinner,
        &format!(
            "Indexed {} files ({} objects, {} documents, {} relationships)",
            report.files_indexed, report.objects, report.documents, report.relationships
        ),
    );

    if !global.quiet {
        println!(
            "project: {}\nfiles indexed: {}\nfiles skipped: {}\nfiles deleted: {}\nobjects: {}\ndocuments: {}\nrelationships: {}",
            project,
            report.files_indexed,
            report.files_skipped,
            report.files_deleted,
            report.objects,
            report.documents,
            report.relationships,
        );
        if !report.errors.is_empty() {
            println!("errors ({}):", report.errors.len());
            for error in &report.errors {
                println!("  {}: {}", error.file_path, error.message);
            }
        }
    }
    let _ = context.provider.close().await;
    Ok(())
}
