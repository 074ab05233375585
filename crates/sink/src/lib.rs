// crates/sink/src/lib.rs
//! Result sink: the searchable store of result documents.
//!
//! Uses Tantivy (embedded Rust search engine). Each indexed repository is one
//! document: exact-match `repo_id` for idempotent replacement, full-text
//! `name` and `readme` fields for search, and the whole serialized result
//! document stored for retrieval.
//!
//! `put` is delete-by-term followed by add and commit, so writing the same
//! repository twice keeps exactly one document; at-least-once delivery
//! upstream relies on this.

use std::path::Path;
use std::sync::Mutex;

use tantivy::collector::TopDocs;
use tantivy::query::QueryParser;
use tantivy::schema::{Field, Schema, Value, FAST, STORED, STRING, TEXT};
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term};
use tracing::{debug, info};

use dex_core::ResultDocument;

/// Errors that can occur against the sink.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("Tantivy error: {0}")]
    Tantivy(#[from] tantivy::TantivyError),

    #[error("Query parse error: {0}")]
    QueryParse(#[from] tantivy::query::QueryParserError),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Build the sink schema.
///
/// Fields:
/// - `repo_id`: STRING | STORED — exact match, delete-by-repo
/// - `name`: TEXT | STORED — full-text over the repository name
/// - `url`: STRING | STORED — exact match
/// - `common_language`: STRING | STORED — filterable
/// - `readme`: TEXT — full-text body, not stored (the document field has it)
/// - `document`: STORED — the serialized result document, verbatim
/// - `processed`: i64, FAST | STORED — range queries, sorting
pub fn build_schema() -> Schema {
    let mut schema_builder = Schema::builder();

    schema_builder.add_text_field("repo_id", STRING | STORED);
    schema_builder.add_text_field("name", TEXT | STORED);
    schema_builder.add_text_field("url", STRING | STORED);
    schema_builder.add_text_field("common_language", STRING | STORED);
    schema_builder.add_text_field("readme", TEXT);
    schema_builder.add_text_field("document", STORED);
    schema_builder.add_i64_field("processed", FAST | STORED);

    schema_builder.build()
}

/// The result sink, holding a Tantivy index, reader, writer, and pre-resolved
/// field handles.
pub struct ResultSink {
    index: Index,
    reader: IndexReader,
    /// `IndexWriter` needs `&mut self`; the mutex lets `put` take `&self`.
    writer: Mutex<IndexWriter>,

    repo_id_field: Field,
    name_field: Field,
    url_field: Field,
    common_language_field: Field,
    readme_field: Field,
    document_field: Field,
    processed_field: Field,
}

impl ResultSink {
    /// Open or create the sink index at the given directory path.
    pub fn open(path: &Path) -> Result<Self, SinkError> {
        std::fs::create_dir_all(path)?;

        let schema = build_schema();
        let index = match Index::open_in_dir(path) {
            Ok(idx) => {
                info!(path = %path.display(), "opened existing result sink");
                idx
            }
            Err(_) => {
                info!(path = %path.display(), "creating new result sink");
                Index::create_in_dir(path, schema.clone())?
            }
        };

        Self::from_index(index)
    }

    /// Create a sink entirely in RAM. Useful for tests.
    pub fn open_in_ram() -> Result<Self, SinkError> {
        let schema = build_schema();
        Self::from_index(Index::create_in_ram(schema))
    }

    fn from_index(index: Index) -> Result<Self, SinkError> {
        let schema = index.schema();
        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::OnCommitWithDelay)
            .try_into()?;

        // 50MB writer heap — plenty for one document per put.
        let writer = index.writer(50_000_000)?;

        let field = |name: &str| {
            schema
                .get_field(name)
                .unwrap_or_else(|_| panic!("schema missing {name} field"))
        };

        Ok(Self {
            repo_id_field: field("repo_id"),
            name_field: field("name"),
            url_field: field("url"),
            common_language_field: field("common_language"),
            readme_field: field("readme"),
            document_field: field("document"),
            processed_field: field("processed"),
            index,
            reader,
            writer: Mutex::new(writer),
        })
    }

    /// Probe the sink: can we obtain a fresh searcher?
    pub fn ping(&self) -> Result<(), SinkError> {
        self.reader.reload()?;
        let _ = self.reader.searcher();
        Ok(())
    }

    /// Write the result document for a repository, replacing any previous
    /// one. Idempotent on `repo_id`.
    pub fn put(&self, repo_id: i64, document: &ResultDocument) -> Result<(), SinkError> {
        let serialized = serde_json::to_string(document)?;
        let key = repo_id.to_string();

        let mut writer = self.writer.lock().map_err(|e| {
            SinkError::Io(std::io::Error::other(format!("writer lock poisoned: {e}")))
        })?;

        writer.delete_term(Term::from_field_text(self.repo_id_field, &key));
        writer.add_document(doc!(
            self.repo_id_field => key.as_str(),
            self.name_field => document.repository.name.as_str(),
            self.url_field => document.repository.url.as_str(),
            self.common_language_field => document.repository.languages.common.language.as_str(),
            self.readme_field => document.text.readme.as_deref().unwrap_or_default(),
            self.document_field => serialized.as_str(),
            self.processed_field => document.processed.timestamp(),
        ))?;
        writer.commit()?;

        debug!(repo_id, "result document written to sink");
        Ok(())
    }

    /// Full-text search over names and readmes. Returns serialized result
    /// documents, best match first.
    pub fn search(&self, query: &str, limit: usize) -> Result<Vec<String>, SinkError> {
        self.reader.reload()?;
        let searcher = self.reader.searcher();

        let parser = QueryParser::for_index(&self.index, vec![self.name_field, self.readme_field]);
        let parsed = parser.parse_query(query)?;
        let top = searcher.search(&parsed, &TopDocs::with_limit(limit.max(1)))?;

        let mut documents = Vec::with_capacity(top.len());
        for (_score, addr) in top {
            let retrieved: TantivyDocument = searcher.doc(addr)?;
            if let Some(raw) = retrieved
                .get_first(self.document_field)
                .and_then(|v| v.as_str())
            {
                documents.push(raw.to_string());
            }
        }
        Ok(documents)
    }

    /// Number of documents currently searchable.
    pub fn len(&self) -> Result<u64, SinkError> {
        self.reader.reload()?;
        Ok(self.reader.searcher().num_docs())
    }

    pub fn is_empty(&self) -> Result<bool, SinkError> {
        Ok(self.len()? == 0)
    }
}
