//! Build configuration for the HNSW index.
//!
//! All parameters are validated up front and frozen before construction
//! starts; nothing here can change once [`crate::HnswIndex::build`] has been
//! called.

use std::thread;

use crate::error::{IndexError, Result};

/// Metric used for every distance computation in the index.
///
/// All metrics return a dissimilarity score where lower means closer. `Dot`
/// negates the inner product so the ordering convention holds uniformly.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DistanceKind {
    /// `1 - cosine_similarity`, with per-vector norms cached at ingestion.
    Angular,
    /// Squared Euclidean distance (no square root; only order matters).
    L2,
    /// Negated inner product, for un-normalised relevance scoring.
    Dot,
}

impl DistanceKind {
    /// Stable single-byte tag used in the persisted file header.
    #[must_use]
    pub(crate) const fn tag(self) -> u8 {
        match self {
            Self::Angular => 0,
            Self::L2 => 1,
            Self::Dot => 2,
        }
    }

    pub(crate) const fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::Angular),
            1 => Some(Self::L2),
            2 => Some(Self::Dot),
            _ => None,
        }
    }
}

/// Policy deciding which candidate edges survive pruning to a degree cap.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NeighbourPolicy {
    /// Keep the `k` closest candidates. Simple but geometrically clustered.
    Naive,
    /// Algorithm 4 from the HNSW paper: keep a candidate only when it is
    /// closer to the query than to every already-kept neighbour.
    Heuristic,
    /// [`NeighbourPolicy::Heuristic`], padding any shortfall from the
    /// rejected candidates in ascending distance order.
    HeuristicSaveRemains,
}

/// Optional second-pass graph consolidation applied after the initial build.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PostProcessing {
    /// No action. Recommended above roughly ten million vectors.
    Skip,
    /// Build a second graph in reverse insertion order and merge its layer-0
    /// edges into the primary graph. Roughly doubles build cost; recommended
    /// below roughly ten million vectors.
    MergeLevel0,
}

/// Immutable build parameters for the HNSW graph.
///
/// # Examples
/// ```
/// use maguro_core::HnswConfig;
///
/// let config = HnswConfig::new(16, 200)
///     .expect("parameters must be valid")
///     .with_n_threads(4)
///     .with_rng_seed(7);
/// assert_eq!(config.m(), 16);
/// assert_eq!(config.m0(), 32);
/// ```
#[derive(Clone, Debug)]
pub struct HnswConfig {
    m: usize,
    m0: usize,
    ef_construction: usize,
    n_threads: usize,
    neighbour_policy: NeighbourPolicy,
    post_processing: PostProcessing,
    rng_seed: u64,
    max_level: usize,
}

impl HnswConfig {
    /// Creates a configuration with explicit neighbour fan-out and build
    /// search width; `m0` defaults to `2 * m`.
    ///
    /// # Errors
    /// Returns [`IndexError::InvalidConfig`] when `m` is zero or when
    /// `ef_construction` is smaller than `m`.
    pub fn new(m: usize, ef_construction: usize) -> Result<Self> {
        if m == 0 {
            return Err(IndexError::InvalidConfig {
                reason: "m must be greater than zero".into(),
            });
        }
        if ef_construction < m {
            return Err(IndexError::InvalidConfig {
                reason: format!("ef_construction ({ef_construction}) must be >= m ({m})"),
            });
        }
        Ok(Self {
            m,
            m0: m.saturating_mul(2),
            ef_construction,
            n_threads: default_thread_count(),
            neighbour_policy: NeighbourPolicy::Heuristic,
            post_processing: PostProcessing::Skip,
            rng_seed: 0x5EED_CAFE,
            max_level: 32,
        })
    }

    /// Overrides the layer-0 degree cap.
    ///
    /// # Errors
    /// Returns [`IndexError::InvalidConfig`] when `m0` is zero.
    pub fn with_m0(mut self, m0: usize) -> Result<Self> {
        if m0 == 0 {
            return Err(IndexError::InvalidConfig {
                reason: "m0 must be greater than zero".into(),
            });
        }
        self.m0 = m0;
        Ok(self)
    }

    /// Overrides the build thread count.
    ///
    /// Zero is normalised to one; single-threaded builds with a fixed seed
    /// are reproducible.
    #[must_use]
    pub fn with_n_threads(mut self, n_threads: usize) -> Self {
        self.n_threads = n_threads.max(1);
        self
    }

    /// Selects the neighbour-selection policy.
    #[must_use]
    pub fn with_neighbour_policy(mut self, policy: NeighbourPolicy) -> Self {
        self.neighbour_policy = policy;
        self
    }

    /// Selects the post-processing pass applied after the initial build.
    #[must_use]
    pub fn with_post_processing(mut self, post: PostProcessing) -> Self {
        self.post_processing = post;
        self
    }

    /// Seeds the level-assignment RNG to make builds reproducible.
    #[must_use]
    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng_seed = seed;
        self
    }

    /// Caps the maximum layer that will be sampled for new nodes.
    #[must_use]
    pub fn with_max_level(mut self, max_level: usize) -> Self {
        self.max_level = max_level;
        self
    }

    /// Returns the degree cap for layers above zero.
    #[must_use]
    pub fn m(&self) -> usize {
        self.m
    }

    /// Returns the layer-0 degree cap.
    #[must_use]
    pub fn m0(&self) -> usize {
        self.m0
    }

    /// Returns the construction search breadth.
    #[must_use]
    pub fn ef_construction(&self) -> usize {
        self.ef_construction
    }

    /// Returns the build thread count.
    #[must_use]
    pub fn n_threads(&self) -> usize {
        self.n_threads
    }

    /// Returns the configured neighbour-selection policy.
    #[must_use]
    pub fn neighbour_policy(&self) -> NeighbourPolicy {
        self.neighbour_policy
    }

    /// Returns the configured post-processing pass.
    #[must_use]
    pub fn post_processing(&self) -> PostProcessing {
        self.post_processing
    }

    /// Returns the RNG seed used for level assignment.
    #[must_use]
    pub fn rng_seed(&self) -> u64 {
        self.rng_seed
    }

    pub(crate) fn max_level(&self) -> usize {
        self.max_level
    }

    /// Returns the degree cap for the given layer (`m0` at layer 0).
    pub(crate) fn cap_for_level(&self, level: usize) -> usize {
        if level == 0 { self.m0 } else { self.m }
    }
}

impl Default for HnswConfig {
    fn default() -> Self {
        Self::new(12, 100).expect("default parameters must be valid")
    }
}

fn default_thread_count() -> usize {
    thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get)
}
