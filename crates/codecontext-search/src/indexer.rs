//! Indexing pipeline.
//!
//! Full sync: discover → parse (parallel) → extract relationships →
//! embed (length-sorted batches inside the provider) → BM25F encode →
//! upsert per file → commit `IndexState` once at the end.
//!
//! Incremental sync parses the whole tree (cheap) but re-embeds and
//! re-upserts only files that are new, changed by checksum, or whose
//! relationship neighborhood changed; deleted files' points are removed.
//! Ids are deterministic, so an interrupted run is repaired by simply
//! running again.

use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use rayon::prelude::*;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use codecontext_config::ContextConfig;
use codecontext_core::{
    content_checksum, extract_relationships, parse_config, parse_markdown, Bm25fConfig,
    Bm25fEncoder, ChunkConfig, CodeObject, DiscoveredFile, DiscoveryConfig, DocumentNode, Field,
    FileChecksum, FileDiscovery, FileKind, IndexState, ParsedFile, Relationship,
    RelationshipGraph, SourceParser, SymbolReference, Tokenizer,
};

use crate::embeddings::{EmbeddingProvider, InstructionType};
use crate::error::{Result, SearchError};
use crate::schema::{IndexPoint, PointPayload};
use crate::store::VectorStore;

/// Upsert batch size per store call.
const UPSERT_BATCH: usize = 128;

/// Cap on text length sent to the embedder.
const MAX_EMBED_CHARS: usize = 8000;

/// One file's failure, reported in the summary.
#[derive(Debug, Clone)]
pub struct IndexFileError {
    pub file_path: String,
    pub message: String,
}

/// Summary of a sync run.
#[derive(Debug, Clone, Default)]
pub struct IndexReport {
    pub files_indexed: usize,
    pub files_skipped: usize,
    pub files_deleted: usize,
    pub objects: usize,
    pub documents: usize,
    pub relationships: usize,
    pub errors: Vec<IndexFileError>,
}

/// Output of parsing one file.
struct ParsedUnit {
    file: DiscoveredFile,
    checksum: String,
    objects: Vec<CodeObject>,
    documents: Vec<DocumentNode>,
    relationships: Vec<Relationship>,
    references: Vec<SymbolReference>,
}

/// Indexer for one project.
pub struct ProjectIndexer {
    store: Arc<dyn VectorStore>,
    provider: Arc<dyn EmbeddingProvider>,
    encoder: Bm25fEncoder,
    tokenizer: Tokenizer,
    project_id: String,
    project_path: PathBuf,
    collection: String,
    discovery: DiscoveryConfig,
    chunking: ChunkConfig,
    parallel_workers: usize,
}

impl ProjectIndexer {
    pub fn new(
        store: Arc<dyn VectorStore>,
        provider: Arc<dyn EmbeddingProvider>,
        config: &ContextConfig,
        project_id: impl Into<String>,
        project_path: impl Into<PathBuf>,
        collection: impl Into<String>,
    ) -> Self {
        let tokenizer = Tokenizer::new();
        let bm25f = Bm25fConfig {
            k1: config.search.bm25_k1,
            b: config.search.bm25_b,
            avg_dl: config.search.bm25_avg_dl,
            ..Bm25fConfig::default()
        };
        Self {
            store,
            provider,
            encoder: Bm25fEncoder::new(bm25f, tokenizer.clone()),
            tokenizer,
            project_id: project_id.into(),
            project_path: project_path.into(),
            collection: collection.into(),
            discovery: DiscoveryConfig {
                include_patterns: config.indexing.include_patterns.clone(),
                exclude_patterns: config.indexing.exclude_patterns.clone(),
                max_file_size: config.max_file_size(),
                follow_links: false,
            },
            chunking: ChunkConfig {
                max_chunk_size: config.indexing.max_chunk_size,
                min_chunk_size: config.indexing.min_chunk_size,
                overlap_words: config.indexing.chunk_overlap_words,
            },
            parallel_workers: config.indexing.parallel_workers,
        }
    }

    /// Index everything, replacing stale points for vanished files.
    pub async fn full_sync(&self, cancel: &CancellationToken) -> Result<IndexReport> {
        let prior = self.store.get_state(&self.collection).await.unwrap_or(None);
        self.sync(prior, false, cancel).await
    }

    /// Re-index only what changed since the last committed state.
    pub async fn incremental_sync(&self, cancel: &CancellationToken) -> Result<IndexReport> {
        match self.store.get_state(&self.collection).await.unwrap_or(None) {
            Some(prior) => self.sync(Some(prior), true, cancel).await,
            None => {
                info!("no prior state for '{}', running full sync", self.project_id);
                self.sync(None, false, cancel).await
            }
        }
    }

    async fn sync(
        &self,
        prior: Option<IndexState>,
        incremental: bool,
        cancel: &CancellationToken,
    ) -> Result<IndexReport> {
        let mut report = IndexReport::default();

        // Discover.
        let discovery = FileDiscovery::new(self.discovery.clone());
        let (files, skips) = discovery
            .discover(&self.project_path)
            .map_err(|e| SearchError::Indexing(e.to_string()))?;
        report.files_skipped = skips.unknown_type + skips.too_large + skips.binary;
        info!(
            project = %self.project_id,
            files = files.len(),
            skipped = report.files_skipped,
            "discovery complete"
        );
        if cancel.is_cancelled() {
            return Err(SearchError::Cancelled);
        }

        self.store
            .ensure_collection(&self.collection, self.provider.dimension())
            .await?;

        // Parse everything in parallel; failures skip the file.
        let chunking = self.chunking.clone();
        let workers = self.parallel_workers;
        let cancel_parse = cancel.clone();
        let (units, errors): (Vec<ParsedUnit>, Vec<IndexFileError>) =
            tokio::task::spawn_blocking(move || parse_files(files, &chunking, workers, &cancel_parse))
                .await
                .map_err(|e| SearchError::Indexing(format!("parser pool panicked: {}", e)))?;
        report.errors = errors;
        if cancel.is_cancelled() {
            return Err(SearchError::Cancelled);
        }

        // Cross-file relationship extraction over the whole batch.
        let all_objects: Vec<CodeObject> =
            units.iter().flat_map(|u| u.objects.iter().cloned()).collect();
        let all_documents: Vec<DocumentNode> =
            units.iter().flat_map(|u| u.documents.iter().cloned()).collect();
        let intra: Vec<Relationship> = units
            .iter()
            .flat_map(|u| u.relationships.iter().cloned())
            .collect();
        let references: Vec<SymbolReference> = units
            .iter()
            .flat_map(|u| u.references.iter().cloned())
            .collect();
        let graph = extract_relationships(&all_objects, &all_documents, intra, &references);
        report.relationships = graph.forward_edges().len();
        debug!(edges = report.relationships, "relationship extraction complete");

        // Decide which files need their points rewritten.
        let dirty = self.dirty_files(&units, prior.as_ref(), incremental, &graph);

        // Remove points for deleted files (and modified, before re-upsert).
        let current_paths: BTreeSet<&str> =
            units.iter().map(|u| u.file.relative_path.as_str()).collect();
        if let Some(prior_state) = &prior {
            for path in prior_state.file_checksums.keys() {
                if !current_paths.contains(path.as_str()) {
                    self.store.delete_by_file(&self.collection, path).await?;
                    report.files_deleted += 1;
                }
            }
        }
        for unit in units.iter().filter(|u| dirty.contains(&u.file.relative_path)) {
            let previously_known = prior
                .as_ref()
                .is_some_and(|s| s.file_checksums.contains_key(&unit.file.relative_path));
            if previously_known {
                // Clear stale ids before the fresh batch for this file.
                self.store
                    .delete_by_file(&self.collection, &unit.file.relative_path)
                    .await?;
            }
        }
        if cancel.is_cancelled() {
            return Err(SearchError::Cancelled);
        }

        // Embed + encode + upsert, one file batch at a time.
        for unit in &units {
            report.objects += unit.objects.len();
            report.documents += unit.documents.len();
            if !dirty.contains(&unit.file.relative_path) {
                continue;
            }
            if cancel.is_cancelled() {
                return Err(SearchError::Cancelled);
            }
            match self.index_unit(unit, &graph).await {
                Ok(()) => report.files_indexed += 1,
                Err(SearchError::Cancelled) => return Err(SearchError::Cancelled),
                Err(error) => {
                    warn!(file = %unit.file.relative_path, %error, "file failed, skipping");
                    report.errors.push(IndexFileError {
                        file_path: unit.file.relative_path.clone(),
                        message: error.to_string(),
                    });
                }
            }
        }

        if cancel.is_cancelled() {
            return Err(SearchError::Cancelled);
        }

        // Single atomic state commit at the end of the run.
        let state = IndexState {
            project_id: self.project_id.clone(),
            project_path: self.project_path.display().to_string(),
            total_files: units.len(),
            total_objects: report.objects,
            total_documents: report.documents,
            last_indexed: unix_now(),
            file_checksums: units
                .iter()
                .map(|u| {
                    (
                        u.file.relative_path.clone(),
                        FileChecksum {
                            file_path: u.file.relative_path.clone(),
                            checksum: u.checksum.clone(),
                            last_indexed: unix_now(),
                        },
                    )
                })
                .collect(),
            relationships: graph.forward_edges(),
        };
        self.store.put_state(&self.collection, state).await?;

        info!(
            project = %self.project_id,
            indexed = report.files_indexed,
            skipped = report.files_skipped,
            deleted = report.files_deleted,
            objects = report.objects,
            documents = report.documents,
            "sync complete"
        );
        Ok(report)
    }

    /// Files whose points must be rewritten this run.
    ///
    /// Full sync: everything. Incremental: added and checksum-modified
    /// files, plus unchanged files whose per-file edge set differs from the
    /// committed one (their payloads embed relationship summaries).
    fn dirty_files(
        &self,
        units: &[ParsedUnit],
        prior: Option<&IndexState>,
        incremental: bool,
        graph: &RelationshipGraph,
    ) -> BTreeSet<String> {
        let Some(prior) = prior else {
            return units.iter().map(|u| u.file.relative_path.clone()).collect();
        };
        if !incremental {
            return units.iter().map(|u| u.file.relative_path.clone()).collect();
        }

        let mut dirty = BTreeSet::new();
        for unit in units {
            match prior.file_checksums.get(&unit.file.relative_path) {
                None => {
                    dirty.insert(unit.file.relative_path.clone());
                }
                Some(prior_checksum) if prior_checksum.checksum != unit.checksum => {
                    dirty.insert(unit.file.relative_path.clone());
                }
                Some(_) => {}
            }
        }

        // Edge signatures per file, old vs new.
        let new_edges = edges_by_file(&graph.forward_edges());
        let old_edges = edges_by_file(&prior.relationships);
        for unit in units {
            let path = unit.file.relative_path.as_str();
            if dirty.contains(path) {
                continue;
            }
            if new_edges.get(path) != old_edges.get(path) {
                debug!(file = path, "relationship neighborhood changed");
                dirty.insert(path.to_string());
            }
        }
        dirty
    }

    /// Embed, encode and upsert one file's entities as a single batch.
    async fn index_unit(&self, unit: &ParsedUnit, graph: &RelationshipGraph) -> Result<()> {
        let mut texts = Vec::new();
        let mut instructions = Vec::new();

        for object in &unit.objects {
            texts.push(embed_text_for_object(object));
            instructions.push(InstructionType::NL2CODE_PASSAGE);
        }
        for node in &unit.documents {
            texts.push(truncate_chars(&node.content, MAX_EMBED_CHARS));
            instructions.push(InstructionType::DOCUMENT_PASSAGE);
        }
        if texts.is_empty() {
            return Ok(());
        }

        // One instruction type per batch request.
        let mut dense: Vec<Vec<f32>> = vec![Vec::new(); texts.len()];
        for instruction in [InstructionType::NL2CODE_PASSAGE, InstructionType::DOCUMENT_PASSAGE] {
            let indices: Vec<usize> = instructions
                .iter()
                .enumerate()
                .filter(|(_, i)| **i == instruction)
                .map(|(index, _)| index)
                .collect();
            if indices.is_empty() {
                continue;
            }
            let batch: Vec<String> = indices.iter().map(|&i| texts[i].clone()).collect();
            let vectors = self.provider.embed(batch, instruction).await?;
            for (&index, vector) in indices.iter().zip(vectors) {
                dense[index] = vector;
            }
        }

        let language = match unit.file.kind {
            FileKind::Source(language) => language.as_str().to_string(),
            FileKind::Markdown => "markdown".to_string(),
            FileKind::Config(format) => format.as_str().to_string(),
        };

        let mut points = Vec::with_capacity(texts.len());
        let mut vectors = dense.into_iter();
        for object in &unit.objects {
            let payload = PointPayload::from_code_object(
                object,
                &self.project_id,
                graph.outgoing(&object.id),
                graph.incoming(&object.id),
                &self.tokenizer,
            );
            let sparse = self.encoder.encode_document(&[
                (Field::Name, object.name.as_str()),
                (Field::QualifiedName, object.qualified_name.as_str()),
                (Field::Signature, object.signature.as_str()),
                (Field::Docstring, object.docstring.as_str()),
                (Field::Content, object.content.as_str()),
                (Field::Filename, object.file_name()),
                (Field::FilePath, object.file_path.as_str()),
            ]);
            let vector = vectors.next().unwrap_or_default();
            points.push(IndexPoint::new(vector, sparse, payload));
        }
        for node in &unit.documents {
            let payload = PointPayload::from_document_node(
                node,
                &self.project_id,
                &language,
                graph.outgoing(&node.id),
                graph.incoming(&node.id),
                &self.tokenizer,
            );
            let file_name = node.file_path.rsplit('/').next().unwrap_or(&node.file_path);
            let sparse = self.encoder.encode_document(&[
                (Field::Content, node.content.as_str()),
                (Field::Filename, file_name),
                (Field::FilePath, node.file_path.as_str()),
            ]);
            let vector = vectors.next().unwrap_or_default();
            points.push(IndexPoint::new(vector, sparse, payload));
        }

        for batch in points.chunks(UPSERT_BATCH) {
            self.store.upsert(&self.collection, batch.to_vec()).await?;
        }
        Ok(())
    }
}

/// Parse every discovered file, splitting work across a bounded pool.
fn parse_files(
    files: Vec<DiscoveredFile>,
    chunking: &ChunkConfig,
    workers: usize,
    cancel: &CancellationToken,
) -> (Vec<ParsedUnit>, Vec<IndexFileError>) {
    let parse_one = |file: DiscoveredFile| -> Option<std::result::Result<ParsedUnit, IndexFileError>> {
        if cancel.is_cancelled() {
            return None;
        }
        let source = match std::fs::read_to_string(&file.path) {
            Ok(source) => source,
            Err(error) => {
                return Some(Err(IndexFileError {
                    file_path: file.relative_path.clone(),
                    message: error.to_string(),
                }))
            }
        };
        let checksum = content_checksum(source.as_bytes());
        let unit = match file.kind {
            FileKind::Source(language) => {
                match SourceParser::parse(language, &file.relative_path, &source) {
                    Ok(ParsedFile { objects, relationships, references }) => ParsedUnit {
                        file,
                        checksum,
                        objects,
                        documents: Vec::new(),
                        relationships,
                        references,
                    },
                    Err(error) => {
                        return Some(Err(IndexFileError {
                            file_path: file.relative_path.clone(),
                            message: error.to_string(),
                        }))
                    }
                }
            }
            FileKind::Markdown => {
                let documents = parse_markdown(&file.relative_path, &source, chunking);
                ParsedUnit {
                    file,
                    checksum,
                    objects: Vec::new(),
                    documents,
                    relationships: Vec::new(),
                    references: Vec::new(),
                }
            }
            FileKind::Config(format) => {
                match parse_config(format, &file.relative_path, &source) {
                    Ok(documents) => ParsedUnit {
                        file,
                        checksum,
                        objects: Vec::new(),
                        documents,
                        relationships: Vec::new(),
                        references: Vec::new(),
                    },
                    Err(error) => {
                        return Some(Err(IndexFileError {
                            file_path: file.relative_path.clone(),
                            message: error.to_string(),
                        }))
                    }
                }
            }
        };
        Some(Ok(unit))
    };

    let results: Vec<std::result::Result<ParsedUnit, IndexFileError>> = if workers == 1 {
        files.into_iter().filter_map(parse_one).collect()
    } else {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers) // 0 = one per core
            .build();
        match pool {
            Ok(pool) => pool.install(|| files.into_par_iter().filter_map(parse_one).collect()),
            Err(_) => files.into_iter().filter_map(parse_one).collect(),
        }
    };

    let mut units = Vec::new();
    let mut errors = Vec::new();
    for result in results {
        match result {
            Ok(unit) => units.push(unit),
            Err(error) => errors.push(error),
        }
    }
    // Parallel collection order is nondeterministic; restore path order.
    units.sort_by(|a, b| a.file.relative_path.cmp(&b.file.relative_path));
    (units, errors)
}

/// Edge signature per file: every forward edge touching it, sorted.
fn edges_by_file(edges: &[Relationship]) -> HashMap<String, BTreeSet<String>> {
    let mut map: HashMap<String, BTreeSet<String>> = HashMap::new();
    for edge in edges {
        let signature = format!(
            "{}|{}|{}",
            edge.source_id,
            edge.target_id,
            edge.relation_type.as_str()
        );
        map.entry(edge.source.file_path.clone())
            .or_default()
            .insert(signature.clone());
        map.entry(edge.target.file_path.clone())
            .or_default()
            .insert(signature);
    }
    map
}

/// Name, signature and docstring lead the embedded text; content follows.
fn embed_text_for_object(object: &CodeObject) -> String {
    let mut text = String::new();
    text.push_str(&object.qualified_name);
    text.push('\n');
    if !object.signature.is_empty() {
        text.push_str(&object.signature);
        text.push('\n');
    }
    if !object.docstring.is_empty() {
        text.push_str(&object.docstring);
        text.push('\n');
    }
    text.push_str(&object.content);
    truncate_chars(&text, MAX_EMBED_CHARS)
}

fn truncate_chars(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    text.chars().take(max).collect()
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::HashProvider;
    use crate::store::MemoryStore;
    use std::path::Path;

    fn write(dir: &Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn indexer(store: Arc<MemoryStore>, root: &Path) -> ProjectIndexer {
        let config = ContextConfig::default();
        ProjectIndexer::new(
            store,
            Arc::new(HashProvider::new(64)),
            &config,
            "shop",
            root,
            "codecontext_shop",
        )
    }

    fn seed_project(root: &Path) {
        write(
            root,
            "src/orders.py",
            "class OrderService:\n    \"\"\"Coordinates orders.\"\"\"\n\n    def process(self, cart):\n        return charge(cart.total)\n",
        );
        write(
            root,
            "src/payments.py",
            "def charge(amount):\n    return gateway_submit(amount)\n",
        );
        write(root, "docs/orders.md", "# Orders\n\nOrderService handles checkout.\n");
    }

    #[tokio::test]
    async fn test_full_sync_counts_and_state() {
        let temp = tempfile::TempDir::new().unwrap();
        seed_project(temp.path());
        let store = Arc::new(MemoryStore::new());
        let report = indexer(store.clone(), temp.path())
            .full_sync(&CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.files_indexed, 3);
        assert!(report.objects >= 3);
        assert!(report.documents >= 2);
        assert!(report.errors.is_empty());

        let state = store.get_state("codecontext_shop").await.unwrap().unwrap();
        assert_eq!(state.project_id, "shop");
        assert_eq!(state.total_files, 3);
        assert!(state.file_checksums.contains_key("src/orders.py"));
        // CALLS edge across files survived into the committed graph.
        assert!(state
            .relationships
            .iter()
            .any(|r| r.relation_type == codecontext_core::RelationType::Calls));

        let points = store.count("codecontext_shop").await.unwrap();
        assert_eq!(points, report.objects + report.documents);
    }

    #[tokio::test]
    async fn test_incremental_noop_rewrites_nothing() {
        let temp = tempfile::TempDir::new().unwrap();
        seed_project(temp.path());
        let store = Arc::new(MemoryStore::new());
        let idx = indexer(store.clone(), temp.path());
        idx.full_sync(&CancellationToken::new()).await.unwrap();

        let report = idx.incremental_sync(&CancellationToken::new()).await.unwrap();
        assert_eq!(report.files_indexed, 0);
        assert_eq!(report.files_deleted, 0);
    }

    #[tokio::test]
    async fn test_incremental_modified_file() {
        let temp = tempfile::TempDir::new().unwrap();
        seed_project(temp.path());
        let store = Arc::new(MemoryStore::new());
        let idx = indexer(store.clone(), temp.path());
        idx.full_sync(&CancellationToken::new()).await.unwrap();
        let before = store.count("codecontext_shop").await.unwrap();

        write(
            temp.path(),
            "src/payments.py",
            "def charge(amount):\n    return gateway_submit(amount)\n\ndef refund(amount):\n    return gateway_submit(-amount)\n",
        );
        let report = idx.incremental_sync(&CancellationToken::new()).await.unwrap();
        assert!(report.files_indexed >= 1);

        // New function appears exactly once.
        let after = store.count("codecontext_shop").await.unwrap();
        assert_eq!(after, before + 1);

        let state = store.get_state("codecontext_shop").await.unwrap().unwrap();
        assert_ne!(
            state.file_checksums["src/payments.py"].checksum,
            "",
        );
    }

    #[tokio::test]
    async fn test_incremental_deleted_file() {
        let temp = tempfile::TempDir::new().unwrap();
        seed_project(temp.path());
        let store = Arc::new(MemoryStore::new());
        let idx = indexer(store.clone(), temp.path());
        idx.full_sync(&CancellationToken::new()).await.unwrap();

        std::fs::remove_file(temp.path().join("docs/orders.md")).unwrap();
        let report = idx.incremental_sync(&CancellationToken::new()).await.unwrap();
        assert_eq!(report.files_deleted, 1);

        let state = store.get_state("codecontext_shop").await.unwrap().unwrap();
        assert!(!state.file_checksums.contains_key("docs/orders.md"));
    }

    #[tokio::test]
    async fn test_incremental_equivalence_with_full() {
        // Incremental after a mutation reaches the same point set as a
        // from-scratch full sync of the final tree.
        let temp_a = tempfile::TempDir::new().unwrap();
        let temp_b = tempfile::TempDir::new().unwrap();
        seed_project(temp_a.path());
        seed_project(temp_b.path());

        let store_a = Arc::new(MemoryStore::new());
        let idx_a = indexer(store_a.clone(), temp_a.path());
        idx_a.full_sync(&CancellationToken::new()).await.unwrap();
        write(temp_a.path(), "src/payments.py", "def charge(amount):\n    return amount\n");
        idx_a.incremental_sync(&CancellationToken::new()).await.unwrap();

        write(temp_b.path(), "src/payments.py", "def charge(amount):\n    return amount\n");
        let store_b = Arc::new(MemoryStore::new());
        indexer(store_b.clone(), temp_b.path())
            .full_sync(&CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            store_a.count("codecontext_shop").await.unwrap(),
            store_b.count("codecontext_shop").await.unwrap()
        );
        let state_a = store_a.get_state("codecontext_shop").await.unwrap().unwrap();
        let state_b = store_b.get_state("codecontext_shop").await.unwrap().unwrap();
        let checksums_a: Vec<_> = state_a.file_checksums.values().map(|c| &c.checksum).collect();
        let checksums_b: Vec<_> = state_b.file_checksums.values().map(|c| &c.checksum).collect();
        assert_eq!(checksums_a, checksums_b);
        assert_eq!(state_a.relationships.len(), state_b.relationships.len());
    }

    #[tokio::test]
    async fn test_cancellation_commits_no_state() {
        let temp = tempfile::TempDir::new().unwrap();
        seed_project(temp.path());
        let store = Arc::new(MemoryStore::new());
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = indexer(store.clone(), temp.path()).full_sync(&cancel).await;
        assert!(matches!(result, Err(SearchError::Cancelled)));
        assert!(store.get_state("codecontext_shop").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_parse_error_skips_file() {
        let temp = tempfile::TempDir::new().unwrap();
        write(temp.path(), "ok.py", "x = 1\n");
        write(temp.path(), "bad.json", "{broken");
        let store = Arc::new(MemoryStore::new());
        let report = indexer(store, temp.path())
            .full_sync(&CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].file_path.contains("bad.json"));
        assert_eq!(report.files_indexed, 1);
    }
}
