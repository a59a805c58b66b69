//! Recognized options (§6) for search and indexing.

use std::collections::HashMap;
use std::path::PathBuf;

/// Which lanes a search draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchMode {
    /// Dense + lexical.
    #[default]
    Text,
    /// Vision only; results are keyed by page, not chunk.
    Vision,
    /// Dense + lexical + vision when the catalog has pages, else behaves
    /// as [`SearchMode::Text`].
    Hybrid,
}

/// How chunk-lane scores are combined in [`SearchMode::Text`].
///
/// `hybrid` mode always uses RRF regardless of this setting (§4.11).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FusionMode {
    /// Reciprocal Rank Fusion, `k_rrf = 60`.
    #[default]
    ReciprocalRankFusion,
    /// The historical weighted blend `0.6 · dense_sim + 0.4 · lex_sim_norm`.
    WeightedBlend,
}

/// Resolves the catalog root directory, defaulting to `~/.retrieval-skill`.
#[must_use]
pub fn default_catalog_root() -> PathBuf {
    std::env::var_os("CATALOG_ROOT").map_or_else(
        || {
            let home = std::env::var_os("HOME").map_or_else(|| PathBuf::from("."), PathBuf::from);
            home.join(".retrieval-skill")
        },
        PathBuf::from,
    )
}

/// Options governing a single search call.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Number of fused results to return.
    pub top_k: usize,
    /// Minimum final score a result must clear to be kept.
    pub threshold: f32,
    /// Which lanes to draw from.
    pub mode: SearchMode,
    /// How chunk lanes are combined in `text` mode.
    pub fusion_mode: FusionMode,
    /// Weight of the recency boost in the final score, `w_r ∈ [0,1]`.
    pub recency_weight: f32,
    /// Recency half-life, in days.
    pub half_life_days: f32,
    /// Key-equals metadata filters applied to chunk lanes.
    pub filters: HashMap<String, String>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            top_k: 10,
            threshold: 0.0,
            mode: SearchMode::default(),
            fusion_mode: FusionMode::default(),
            recency_weight: 0.15,
            half_life_days: 90.0,
            filters: HashMap::new(),
        }
    }
}

impl SearchOptions {
    /// Starts a builder with defaults.
    #[must_use]
    pub fn builder() -> SearchOptionsBuilder {
        SearchOptionsBuilder::default()
    }
}

/// Builder for [`SearchOptions`].
#[derive(Debug, Default)]
pub struct SearchOptionsBuilder {
    options: SearchOptions,
}

impl SearchOptionsBuilder {
    /// Sets the number of fused results to return.
    #[must_use]
    pub const fn top_k(mut self, top_k: usize) -> Self {
        self.options.top_k = top_k;
        self
    }

    /// Sets the minimum final score.
    #[must_use]
    pub const fn threshold(mut self, threshold: f32) -> Self {
        self.options.threshold = threshold;
        self
    }

    /// Sets which lanes to draw from.
    #[must_use]
    pub const fn mode(mut self, mode: SearchMode) -> Self {
        self.options.mode = mode;
        self
    }

    /// Sets the chunk-lane fusion strategy.
    #[must_use]
    pub const fn fusion_mode(mut self, fusion_mode: FusionMode) -> Self {
        self.options.fusion_mode = fusion_mode;
        self
    }

    /// Sets the recency boost weight.
    #[must_use]
    pub const fn recency_weight(mut self, weight: f32) -> Self {
        self.options.recency_weight = weight;
        self
    }

    /// Sets the recency half-life, in days.
    #[must_use]
    pub const fn half_life_days(mut self, days: f32) -> Self {
        self.options.half_life_days = days;
        self
    }

    /// Adds a key-equals metadata filter.
    #[must_use]
    pub fn filter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.filters.insert(key.into(), value.into());
        self
    }

    /// Builds the options.
    #[must_use]
    pub fn build(self) -> SearchOptions {
        self.options
    }
}

/// Options governing an indexing run, distinct from search-time options.
#[derive(Debug, Clone)]
pub struct IndexingOptions {
    /// Target character budget per chunk (§4.2).
    pub chunk_char_budget: usize,
    /// Overlap, in characters, between sentence-split fragments of an
    /// oversized paragraph.
    pub chunk_overlap: usize,
    /// How many page images are embedded per `embed_images` call (§4.7).
    pub vision_batch_size: usize,
    /// How many concurrent `embed_documents` calls one indexing run may
    /// have in flight (§5, default 1).
    pub embed_fan_out: usize,
    /// Page-count threshold above which the vision lane pre-filters
    /// candidates instead of scoring every page (§4.10).
    pub vision_full_scan_threshold: usize,
}

impl Default for IndexingOptions {
    fn default() -> Self {
        Self {
            chunk_char_budget: 2_000,
            chunk_overlap: 64,
            vision_batch_size: 2,
            embed_fan_out: 1,
            vision_full_scan_threshold: 5_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_options_defaults_match_spec() {
        let opts = SearchOptions::default();
        assert_eq!(opts.top_k, 10);
        assert_eq!(opts.recency_weight, 0.15);
        assert_eq!(opts.half_life_days, 90.0);
        assert_eq!(opts.mode, SearchMode::Text);
    }

    #[test]
    fn builder_overrides_defaults() {
        let opts = SearchOptions::builder()
            .top_k(25)
            .mode(SearchMode::Hybrid)
            .fusion_mode(FusionMode::WeightedBlend)
            .filter("lang", "en")
            .build();
        assert_eq!(opts.top_k, 25);
        assert_eq!(opts.mode, SearchMode::Hybrid);
        assert_eq!(opts.fusion_mode, FusionMode::WeightedBlend);
        assert_eq!(opts.filters.get("lang"), Some(&"en".to_string()));
    }
}
