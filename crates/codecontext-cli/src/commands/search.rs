//! Search command - the five-stage retrieval pipeline from the shell.

use clap::{Args, ValueEnum};
use tokio_util::sync::CancellationToken;

use codecontext_core::Bm25fConfig;
use codecontext_search::{
    build_records, render_json, render_text, ExpandOptions, Result, Retriever, RetrieverConfig,
    SearchFilters,
};

use super::{project_id, resolve_root, AppContext};
use crate::GlobalOptions;

/// Output format
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Arguments for the search command
#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Search query
    query: String,

    /// Filter by language (python, javascript, typescript, rust, go, java, kotlin, markdown, ...)
    #[arg(long, short = 'l')]
    language: Option<String>,

    /// Filter by object type (class, method, function, heading, config_key, ...)
    #[arg(long, short = 't', value_name = "TYPE")]
    r#type: Option<String>,

    /// Filter by file path substring
    #[arg(long, short = 'f')]
    file: Option<String>,

    /// Maximum number of results
    #[arg(long, short = 'n', default_value = "10")]
    limit: usize,

    /// Output format
    #[arg(long, short = 'o', value_enum, default_value = "text")]
    format: OutputFormat,

    /// Expanded fields, comma-separated
    /// (signature,snippet,content,parent,relationships,complexity,impact,all)
    #[arg(long, short = 'e')]
    expand: Option<String>,
}

pub async fn execute(args: SearchArgs, global: &GlobalOptions) -> Result<()> {
    // User error, caught before any store or embedder call.
    if args.query.trim().is_empty() {
        return Err(codecontext_search::SearchError::EmptyQuery);
    }

    let root = resolve_root(None)?;
    let context = AppContext::build(global, &root)?;
    let project = project_id(global, &root);

    // Fail with suggestions before touching the embedder.
    let registry = context.registry();
    let info = registry.resolve(&project).await?;

    let expand = match &args.expand {
        Some(fields) => ExpandOptions::parse(fields)?,
        None => ExpandOptions::default(),
    };
    let filters = SearchFilters {
        language: args.language.clone(),
        object_type: args.r#type.clone(),
        file_path: args.file.clone(),
    };

    let bm25f = Bm25fConfig {
        k1: context.config.search.bm25_k1,
        b: context.config.search.bm25_b,
        avg_dl: context.config.search.bm25_avg_dl,
        ..Bm25fConfig::default()
    };
    let retriever = Retriever::new(
        context.store.clone(),
        context.provider.clone(),
        bm25f,
        RetrieverConfig::from(&context.config.search),
    );

    let cancel = CancellationToken::new();
    let cancel_on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel_on_signal.cancel();
        }
    });

    let results = retriever
        .search(&info.collection, &args.query, args.limit, &filters, &cancel)
        .await?;

    let records = build_records(&results, &expand);
    match args.format {
        OutputFormat::Text => print!("{}", render_text(&records)),
        OutputFormat::Json => println!("{}", render_json(&records)?),
    }
    let _ = context.provider.close().await;
    Ok(())
}
