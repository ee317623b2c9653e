use std::sync::Arc;

use crate::candidate::ShardId;
use crate::geo::Point;

/// Per-feature score in the 0..=255 range used by both rank tables.
pub type Score = u8;

/// The two per-shard score tables the enrichment stage reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankTableKind {
    /// Static search relevance rank.
    SearchRank,
    /// Popularity derived from usage signals.
    Popularity,
}

/// Read access to the currently loaded map shards.
///
/// `shard` returns `None` when the shard is not loaded (deleted, or mid
/// reload). The pipeline treats that as a soft condition and substitutes
/// neutral scores, so implementations must not block waiting for a reload.
pub trait DataSource: Send + Sync {
    fn shard(&self, id: ShardId) -> Option<Arc<dyn ShardReader>>;
}

/// A handle to one loaded shard. The enrichment stage holds at most one of
/// these at a time and drops it before acquiring the next, so implementations
/// can pin resources per handle without unbounded buildup.
pub trait ShardReader: Send + Sync {
    /// Loads one of the score tables; `None` when the shard was built without
    /// that section.
    fn rank_table(&self, kind: RankTableKind) -> Option<Box<dyn RankTable>>;

    /// Loads the feature center table; `None` when the section is absent.
    fn center_table(&self) -> Option<Box<dyn CenterTable>>;
}

/// A loaded score table, indexed by in-shard feature index.
pub trait RankTable: Send + Sync {
    fn get(&self, index: u32) -> Score;
}

/// Neutral stand-in used when a shard or one of its tables is unavailable.
pub struct DummyRankTable;

impl RankTable for DummyRankTable {
    fn get(&self, _index: u32) -> Score {
        0
    }
}

/// A loaded center table. Lookup takes `&mut self` since implementations
/// typically decode geometry lazily and cache it.
pub trait CenterTable: Send {
    fn get(&mut self, index: u32) -> Option<Point>;
}
