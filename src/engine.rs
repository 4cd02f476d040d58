//! End-to-end orchestration: ensure an index exists for the adapter's
//! corpus, classify the query, expand it, retrieve candidate refs, and
//! read progressively into a grounded answer.
//!
//! Concurrent builds for the same store key are deduplicated: the first
//! caller runs the build, later callers await the same cell and receive
//! the same `Arc<Index>`. The in-flight entry clears when the build
//! settles, success or failure.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;

use crate::adapter::{combine_content_hashes, RetrievalContext, SourceAdapter};
use crate::chunk::ChunkOptions;
use crate::classify::classify_query;
use crate::config::CoreConfig;
use crate::error::{Error, Result};
use crate::expand::{expand_query_terms, ExpandOptions};
use crate::indexer::build_index;
use crate::model::ModelProvider;
use crate::models::{Answer, Chunk, Document, Index, RetrievalCandidate, UsedRef};
use crate::progress::{
    NoProgress, ProgressReporter, RetrievalEvent, RetrievalPhase, RetrievalTelemetry,
};
use crate::reader::{read_and_answer, ReadRequest};
use crate::retrieve::{lexical_candidates, pick_refs};
use crate::store::IndexStore;

/// Result of ensuring an index: the (possibly cached) index and whether
/// this call actually built it.
#[derive(Debug)]
pub struct BuildOutcome {
    pub index: Arc<Index>,
    pub built: bool,
}

/// Candidates for callers that stop short of answering.
pub struct RefsOutcome {
    pub ref_ids: Vec<String>,
    pub rationale: Option<String>,
    pub candidates: Vec<RetrievalCandidate>,
    pub index: Arc<Index>,
}

type InflightCell = Arc<OnceCell<Arc<Index>>>;

pub struct Engine {
    store: Arc<IndexStore>,
    provider: Arc<dyn ModelProvider>,
    reporter: Arc<dyn ProgressReporter>,
    inflight: Mutex<HashMap<String, InflightCell>>,
}

impl Engine {
    pub fn new(store: Arc<IndexStore>, provider: Arc<dyn ModelProvider>) -> Self {
        Self {
            store,
            provider,
            reporter: Arc::new(NoProgress),
            inflight: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Ensure an up-to-date index for the adapter's corpus.
    ///
    /// Emits progress for the store key through the configured reporter.
    /// Fails with [`Error::NoDocuments`] when the adapter enumerates
    /// nothing, and with [`Error::Aborted`] on cancellation.
    pub async fn ask_whole_corpus(
        &self,
        adapter: &dyn SourceAdapter,
        ctx: &RetrievalContext,
        config: &CoreConfig,
        cancel: &CancellationToken,
    ) -> Result<BuildOutcome> {
        ensure_live(cancel)?;
        let index_key = adapter.index_key(ctx);

        let docs = adapter.list_documents(ctx).await?;
        ensure_live(cancel)?;
        if docs.is_empty() {
            return Err(Error::NoDocuments(index_key));
        }

        let hashes: Vec<String> = docs.iter().map(|d| adapter.content_hash(d)).collect();
        let content_hash = if hashes.len() == 1 {
            hashes[0].clone()
        } else {
            combine_content_hashes(&hashes)
        };
        // every phase reports under the same key
        let store_key = format!("{}:{}", index_key, content_hash);
        self.progress(&store_key, RetrievalPhase::Start);

        if let Some(index) = self.store.load(&store_key).await {
            ensure_live(cancel)?;
            self.progress(&store_key, RetrievalPhase::Done);
            return Ok(BuildOutcome {
                index: Arc::new(index),
                built: false,
            });
        }

        let cell = {
            let mut inflight = self.inflight.lock().unwrap();
            inflight
                .entry(store_key.clone())
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone()
        };

        let mut ran = false;
        let result = cell
            .get_or_try_init(|| async {
                ran = true;
                self.build(adapter, ctx, config, cancel, &docs, &store_key, &content_hash)
                    .await
                    .map(Arc::new)
            })
            .await
            .cloned();

        // settle: nothing later should join a finished build
        self.inflight.lock().unwrap().remove(&store_key);

        let index = result?;
        if !ran {
            self.progress(&store_key, RetrievalPhase::Done);
        }
        Ok(BuildOutcome { index, built: ran })
    }

    async fn build(
        &self,
        adapter: &dyn SourceAdapter,
        _ctx: &RetrievalContext,
        config: &CoreConfig,
        cancel: &CancellationToken,
        docs: &[Document],
        store_key: &str,
        content_hash: &str,
    ) -> Result<Index> {
        let opts = ChunkOptions {
            max_chunk_chars: config.chunking.max_chunk_chars,
            overlap_chars: config.chunking.overlap_chars,
            min_chunk_chars: config.chunking.min_chunk_chars,
        };

        self.progress(store_key, RetrievalPhase::Chunking);
        let mut corpus: Vec<(Document, Vec<Chunk>)> = Vec::with_capacity(docs.len());
        for doc in docs {
            ensure_live(cancel)?;
            let chunks = adapter.chunk_document(doc, &opts).await?;
            corpus.push((doc.clone(), chunks));
        }
        ensure_live(cancel)?;

        self.progress(store_key, RetrievalPhase::BuildingIndex);
        let index = build_index(store_key, content_hash, &corpus, &config.index);

        // an aborted build must leave the store untouched
        ensure_live(cancel)?;
        self.progress(store_key, RetrievalPhase::Saving);
        self.store.save(&index).await;

        self.progress(store_key, RetrievalPhase::Done);
        Ok(index)
    }

    /// Retrieve candidate refs without reading or answering.
    pub async fn retrieve_refs(
        &self,
        adapter: &dyn SourceAdapter,
        ctx: &RetrievalContext,
        query: &str,
        config: &CoreConfig,
        cancel: &CancellationToken,
    ) -> Result<RefsOutcome> {
        let (outcome, _, _) = self
            .classify_and_retrieve(adapter, ctx, query, config, cancel)
            .await?;
        Ok(outcome)
    }

    /// Full pipeline: ensure index, classify, expand, retrieve, read,
    /// answer. Emits telemetry when `config.debug` is set.
    pub async fn answer_with_retrieval(
        &self,
        adapter: &dyn SourceAdapter,
        ctx: &RetrievalContext,
        query: &str,
        config: &CoreConfig,
        cancel: &CancellationToken,
    ) -> Result<Answer> {
        let started = Instant::now();
        let (outcome, scoped_ctx, mut telemetry) = self
            .classify_and_retrieve(adapter, ctx, query, config, cancel)
            .await?;

        let req = ReadRequest {
            adapter,
            ctx: &scoped_ctx,
            query,
            index: &outcome.index,
            ref_ids: &outcome.ref_ids,
        };
        let mut answer = read_and_answer(
            &req,
            &config.reading,
            &config.chunking,
            self.provider.as_ref(),
            cancel,
        )
        .await?;

        answer.disclaimers = self
            .collect_disclaimers(adapter, &scoped_ctx, &answer.used_refs)
            .await?;

        if config.debug {
            telemetry.total_ms = started.elapsed().as_millis();
            self.reporter.emit(&RetrievalEvent::Telemetry(telemetry));
        }
        Ok(answer)
    }

    async fn classify_and_retrieve(
        &self,
        adapter: &dyn SourceAdapter,
        ctx: &RetrievalContext,
        query: &str,
        config: &CoreConfig,
        cancel: &CancellationToken,
    ) -> Result<(RefsOutcome, RetrievalContext, RetrievalTelemetry)> {
        let mut telemetry = RetrievalTelemetry::default();

        let t = Instant::now();
        let traits = classify_query(query);
        telemetry.cls_ms = t.elapsed().as_millis();

        // adapters see the classifier's advisory flags
        let mut scoped_ctx = ctx.clone();
        scoped_ctx.traits = Some(traits.clone());

        let build = self
            .ask_whole_corpus(adapter, &scoped_ctx, config, cancel)
            .await?;
        let index = build.index;

        let t = Instant::now();
        let expanded = if config.retrieval.expand_synonyms {
            let opts = ExpandOptions {
                use_llm: config.retrieval.use_llm,
                limit: 8,
                provider: Some(self.provider.as_ref()),
            };
            expand_query_terms(query, &index, &opts).await
        } else {
            Vec::new()
        };
        telemetry.syn_ms = t.elapsed().as_millis();
        telemetry.expanded = expanded.clone();
        ensure_live(cancel)?;

        let t = Instant::now();
        let candidates = lexical_candidates(query, &expanded, &index, config.retrieval.top_m);
        telemetry.lex_ms = t.elapsed().as_millis();
        telemetry.candidate_count = candidates.len();

        // an explicit "top N" in the query only tightens the ref count
        let rerank_k = traits
            .explicit_limit
            .map_or(config.retrieval.rerank_k, |limit| {
                config.retrieval.rerank_k.min(limit)
            });

        let t = Instant::now();
        let (ref_ids, rationale) = pick_refs(
            query,
            &candidates,
            rerank_k,
            config.retrieval.use_llm,
            Some(self.provider.as_ref()),
        )
        .await;
        telemetry.rr_ms = t.elapsed().as_millis();
        ensure_live(cancel)?;

        Ok((
            RefsOutcome {
                ref_ids,
                rationale,
                candidates,
                index,
            },
            scoped_ctx,
            telemetry,
        ))
    }

    /// Union of adapter disclaimers over the documents the answer
    /// actually cites, deduplicated in first-seen order.
    async fn collect_disclaimers(
        &self,
        adapter: &dyn SourceAdapter,
        ctx: &RetrievalContext,
        cited: &[UsedRef],
    ) -> Result<Vec<String>> {
        if cited.is_empty() {
            return Ok(Vec::new());
        }
        let docs = adapter.list_documents(ctx).await?;
        let mut out: Vec<String> = Vec::new();
        for doc in &docs {
            if !cited.iter().any(|r| r.doc_id == doc.id) {
                continue;
            }
            for disclaimer in adapter.capture_disclaimers(doc) {
                if !out.contains(&disclaimer) {
                    out.push(disclaimer);
                }
            }
        }
        Ok(out)
    }

    fn progress(&self, key: &str, phase: RetrievalPhase) {
        self.reporter.emit(&RetrievalEvent::Progress {
            key: key.to_string(),
            phase,
            percent: phase.percent(),
        });
    }
}

fn ensure_live(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(Error::Aborted);
    }
    Ok(())
}
