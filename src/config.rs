//! Engine configuration.
//!
//! Every option has a default, so an empty config file (or none at all)
//! yields a working setup. Option names are camelCase on the wire to
//! match the host's settings surface.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Summary budget and shape of a built index.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IndexConfig {
    pub max_tokens: usize,
    pub global_synopsis_tokens: usize,
    pub per_section_tokens: usize,
    pub per_chunk_summary_tokens: usize,
    pub max_sections: usize,
    pub max_chunk_summaries: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            max_tokens: 4000,
            global_synopsis_tokens: 450,
            per_section_tokens: 160,
            per_chunk_summary_tokens: 140,
            max_sections: 10,
            max_chunk_summaries: 12,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChunkingConfig {
    pub max_chunk_chars: usize,
    pub overlap_chars: usize,
    pub min_chunk_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chunk_chars: 12_000,
            overlap_chars: 500,
            min_chunk_chars: 1_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetrievalConfig {
    /// Lexical candidate pool size.
    pub top_m: usize,
    /// Final ref count after the (optional) rerank.
    pub rerank_k: usize,
    #[serde(rename = "useLLM")]
    pub use_llm: bool,
    pub expand_synonyms: bool,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_m: 12,
            rerank_k: 4,
            use_llm: false,
            expand_synonyms: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReadingConfig {
    pub k_max: usize,
    pub per_chunk_token_cap: usize,
    pub reserve_answer_tokens: usize,
}

impl Default for ReadingConfig {
    fn default() -> Self {
        Self {
            k_max: 3,
            per_chunk_token_cap: 1400,
            reserve_answer_tokens: 800,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoreConfig {
    pub max_entries: usize,
    pub ttl_hours: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_entries: 20,
            ttl_hours: 168,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CoreConfig {
    pub index: IndexConfig,
    pub chunking: ChunkingConfig,
    pub retrieval: RetrievalConfig,
    pub reading: ReadingConfig,
    pub store: StoreConfig,
    /// Emit telemetry events with stage timings.
    pub debug: bool,
}

impl CoreConfig {
    /// Reject configs that would make the pipeline degenerate.
    pub fn validate(&self) -> Result<()> {
        if self.index.max_tokens == 0 {
            return Err(Error::InvalidConfig("index.maxTokens must be > 0".into()));
        }
        if self.chunking.max_chunk_chars == 0 {
            return Err(Error::InvalidConfig(
                "chunking.maxChunkChars must be > 0".into(),
            ));
        }
        if self.chunking.overlap_chars >= self.chunking.max_chunk_chars {
            return Err(Error::InvalidConfig(
                "chunking.overlapChars must be smaller than maxChunkChars".into(),
            ));
        }
        if self.retrieval.top_m == 0 || self.retrieval.rerank_k == 0 {
            return Err(Error::InvalidConfig(
                "retrieval.topM and retrieval.rerankK must be > 0".into(),
            ));
        }
        if self.retrieval.rerank_k > self.retrieval.top_m {
            return Err(Error::InvalidConfig(
                "retrieval.rerankK cannot exceed topM".into(),
            ));
        }
        if self.reading.k_max == 0 || self.reading.per_chunk_token_cap == 0 {
            return Err(Error::InvalidConfig(
                "reading.kMax and reading.perChunkTokenCap must be > 0".into(),
            ));
        }
        if self.store.max_entries == 0 {
            return Err(Error::InvalidConfig("store.maxEntries must be > 0".into()));
        }
        Ok(())
    }
}

/// Load and validate a TOML config file. Missing sections take their
/// defaults.
pub fn load_config(path: &std::path::Path) -> Result<CoreConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| Error::InvalidConfig(format!("cannot read {}: {}", path.display(), e)))?;
    let config: CoreConfig = toml::from_str(&raw)
        .map_err(|e| Error::InvalidConfig(format!("cannot parse {}: {}", path.display(), e)))?;
    config.validate()?;
    Ok(config)
}
