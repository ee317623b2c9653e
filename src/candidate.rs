use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::geo::Point;

/// Identifier of one map shard (a regional map file in the original data
/// layout). Shards load and unload independently at runtime.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct ShardId(pub u32);

/// Stable identity of a feature: the shard it lives in plus its index inside
/// that shard. Ordering is lexicographic (shard first), which groups features
/// of the same shard together when a batch is sorted by id.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct FeatureId {
    pub shard: ShardId,
    pub index: u32,
}

impl FeatureId {
    pub fn new(shard: ShardId, index: u32) -> Self {
        Self { shard, index }
    }
}

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.shard.0, self.index)
    }
}

/// Half-open range of query token positions.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
pub struct TokenRange {
    pub begin: usize,
    pub end: usize,
}

impl TokenRange {
    pub fn new(begin: usize, end: usize) -> Self {
        Self { begin, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.begin)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// How the query tokens matched a candidate, as reported by the upstream
/// matcher. `innermost` covers the tokens matched against the feature's own
/// name rather than an enclosing region's; `matched_count` counts all matched
/// tokens; `all_tokens_matched` is set when the whole query was consumed.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize,
)]
pub struct TokenMatch {
    pub innermost: TokenRange,
    pub matched_count: usize,
    pub all_tokens_matched: bool,
}

impl TokenMatch {
    pub fn innermost_count(&self) -> usize {
        self.innermost.len()
    }
}

/// Orders two token-match descriptors by richness: more innermost tokens
/// first, then more matched tokens, then the earlier innermost range. `Less`
/// means the left descriptor is the better match. Used both as the dedup
/// tie-break (which duplicate to keep) and as the distance-order tie-break.
pub fn token_match_order(a: &TokenMatch, b: &TokenMatch) -> Ordering {
    b.innermost_count()
        .cmp(&a.innermost_count())
        .then_with(|| b.matched_count.cmp(&a.matched_count))
        .then_with(|| a.innermost.begin.cmp(&b.innermost.begin))
}

/// One pre-ranking candidate.
///
/// Candidates arrive from the matcher carrying only identity, token-match
/// data, and the `exact_match`/`relaxed` flags; `center`, `rank`,
/// `popularity`, and `distance_to_pivot` are filled by the enrichment stage.
/// A missing center stays `None` when no geometry source could resolve it, in
/// which case only the approximate pivot distance is available.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: FeatureId,
    pub center: Option<Point>,
    pub rank: u8,
    pub popularity: u8,
    pub exact_match: bool,
    pub distance_to_pivot: f64,
    pub tokens: TokenMatch,
    pub relaxed: bool,
}

impl Candidate {
    /// A fresh, unenriched candidate as produced by the matcher.
    pub fn new(id: FeatureId, tokens: TokenMatch, exact_match: bool, relaxed: bool) -> Self {
        Self {
            id,
            center: None,
            rank: 0,
            popularity: 0,
            exact_match,
            distance_to_pivot: f64::MAX,
            tokens,
            relaxed,
        }
    }

    /// True when the candidate is an exact match that consumed every query
    /// token. This is the signal the exact-match selection order keys on.
    pub fn matches_everything(&self) -> bool {
        self.exact_match && self.tokens.all_tokens_matched
    }
}
