//! Minimal retrieval-augmented answering over a handful of local documents.
//!
//! Documents are embedded once into an in-memory [`VectorIndex`]. A question
//! is embedded, the closest documents by cosine similarity become the
//! context, and the model is told to answer from that context only.

use std::cmp::Ordering;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::backend::{EmbeddingBackend, LlmRequest};
use crate::config::LlmConfig;
use crate::error::Result;
use crate::exec_ctx::ExecCtx;
use crate::prompt::render;
use crate::stages::dispatch;
use crate::PipelineError;

/// Documents joined into the answer context.
pub const DEFAULT_TOP_K: usize = 3;

const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

const ANSWER_TEMPLATE: &str = "You are a helpful assistant. Use ONLY the context below to answer the question.

Context:
{context}

Question: {question}

If the answer is not in the context, say you don't know.
";

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Where the text came from (usually a file path).
    pub source: String,
    pub text: String,
}

impl Document {
    pub fn new(source: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            text: text.into(),
        }
    }
}

/// Read each path as UTF-8 text. Missing files are skipped with a warning;
/// any other read error is returned.
pub fn load_documents<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<Document>> {
    let mut documents = Vec::with_capacity(paths.len());
    for path in paths {
        let path = path.as_ref();
        if !path.exists() {
            warn!(path = %path.display(), "document not found, skipping");
            continue;
        }
        let text = std::fs::read_to_string(path)?;
        documents.push(Document::new(path.display().to_string(), text));
    }
    Ok(documents)
}

/// Cosine similarity between two vectors. 0.0 for mismatched, empty or
/// zero-norm input.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

/// Documents paired with their embeddings.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    documents: Vec<Document>,
    embeddings: Vec<Vec<f32>>,
}

impl VectorIndex {
    /// Pair documents with precomputed embeddings (same order, same length).
    pub fn new(documents: Vec<Document>, embeddings: Vec<Vec<f32>>) -> Result<Self> {
        if documents.is_empty() {
            return Err(PipelineError::InvalidConfig(
                "no documents to index".to_string(),
            ));
        }
        if documents.len() != embeddings.len() {
            return Err(PipelineError::Other(format!(
                "{} documents but {} embeddings",
                documents.len(),
                embeddings.len()
            )));
        }
        Ok(Self {
            documents,
            embeddings,
        })
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Top `k` documents by similarity to `query`, best first. Ties keep
    /// insertion order.
    pub fn nearest(&self, query: &[f32], k: usize) -> Vec<(&Document, f32)> {
        let mut scored: Vec<(&Document, f32)> = self
            .documents
            .iter()
            .zip(&self.embeddings)
            .map(|(doc, embedding)| (doc, cosine_similarity(query, embedding)))
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        scored.truncate(k);
        scored
    }
}

/// Question answering over an indexed corpus.
pub struct Rag {
    ctx: ExecCtx,
    embedder: Arc<dyn EmbeddingBackend>,
    embedding_model: String,
    index: VectorIndex,
    top_k: usize,
    llm: LlmConfig,
}

impl Rag {
    const NAME: &'static str = "rag";

    /// Embed `documents` and build the index.
    ///
    /// Fails with `InvalidConfig` when `documents` is empty.
    pub async fn build(
        ctx: ExecCtx,
        embedder: Arc<dyn EmbeddingBackend>,
        embedding_model: impl Into<String>,
        documents: Vec<Document>,
    ) -> Result<Self> {
        if documents.is_empty() {
            return Err(PipelineError::InvalidConfig(
                "no documents loaded".to_string(),
            ));
        }
        let embedding_model = embedding_model.into();
        let texts: Vec<String> = documents.iter().map(|d| d.text.clone()).collect();
        let embeddings = embedder
            .embed(&ctx.client, &ctx.base_url, &embedding_model, &texts)
            .await?;
        info!(documents = documents.len(), model = %embedding_model, "corpus indexed");

        Ok(Self {
            ctx,
            embedder,
            embedding_model,
            index: VectorIndex::new(documents, embeddings)?,
            top_k: DEFAULT_TOP_K,
            llm: LlmConfig::default().with_temperature(0.2),
        })
    }

    pub fn with_top_k(mut self, k: usize) -> Self {
        self.top_k = k.max(1);
        self
    }

    pub fn with_config(mut self, llm: LlmConfig) -> Self {
        self.llm = llm;
        self
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    /// Embed `query` and return the `k` most similar documents.
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<(&Document, f32)>> {
        let vectors = self
            .embedder
            .embed(
                &self.ctx.client,
                &self.ctx.base_url,
                &self.embedding_model,
                &[query.to_string()],
            )
            .await?;
        let query_vector = vectors
            .into_iter()
            .next()
            .ok_or_else(|| PipelineError::Other("embedding backend returned no vector".into()))?;
        Ok(self.index.nearest(&query_vector, k))
    }

    /// Answer `question` from the top documents only.
    pub async fn answer(&self, question: &str) -> Result<String> {
        let hits = self.search(question, self.top_k).await?;
        debug!(
            sources = ?hits.iter().map(|(d, _)| d.source.as_str()).collect::<Vec<_>>(),
            "retrieved context"
        );

        let context = hits
            .iter()
            .map(|(doc, _)| doc.text.as_str())
            .collect::<Vec<_>>()
            .join(CONTEXT_SEPARATOR);
        let prompt = render(
            ANSWER_TEMPLATE,
            &[("context", context.as_str()), ("question", question)],
        );

        let request = LlmRequest::user(&self.ctx.model, prompt, self.llm.clone());
        let response = dispatch(&self.ctx, Self::NAME, &request).await?;
        Ok(response.text)
    }
}
