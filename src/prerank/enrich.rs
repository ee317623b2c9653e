use crate::candidate::{Candidate, ShardId};
use crate::editor::{EditOverlay, FeatureStatus};
use crate::errors::GeorankError;
use crate::estimator::DistanceEstimator;
use crate::geo::{self, Point};
use crate::source::{CenterTable, DataSource, DummyRankTable, RankTable, RankTableKind, ShardReader};

/// Counters from one enrichment pass, for the cycle log line.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EnrichStats {
    pub shards_visited: usize,
    pub dead_shards: usize,
    pub from_editor: usize,
    pub estimated: usize,
}

struct ShardTables {
    shard: ShardId,
    ranks: Box<dyn RankTable>,
    popularity: Box<dyn RankTable>,
    centers: Option<Box<dyn CenterTable>>,
}

impl ShardTables {
    fn acquire(source: &dyn DataSource, shard: ShardId, stats: &mut EnrichStats) -> Self {
        match source.shard(shard) {
            Some(reader) => {
                stats.shards_visited += 1;
                Self::from_reader(shard, reader.as_ref())
            }
            None => {
                stats.dead_shards += 1;
                tracing::debug!(shard = shard.0, "Shard unavailable, using neutral scores");
                Self {
                    shard,
                    ranks: Box::new(DummyRankTable),
                    popularity: Box::new(DummyRankTable),
                    centers: None,
                }
            }
        }
    }

    fn from_reader(shard: ShardId, reader: &dyn ShardReader) -> Self {
        let ranks = reader.rank_table(RankTableKind::SearchRank).unwrap_or_else(|| {
            tracing::debug!(shard = shard.0, "Search rank table missing, using neutral scores");
            Box::new(DummyRankTable)
        });
        let popularity = reader.rank_table(RankTableKind::Popularity).unwrap_or_else(|| {
            tracing::debug!(shard = shard.0, "Popularity table missing, using neutral scores");
            Box::new(DummyRankTable)
        });
        let centers = reader.center_table();
        if centers.is_none() {
            tracing::debug!(shard = shard.0, "Center table missing");
        }
        Self {
            shard,
            ranks,
            popularity,
            centers,
        }
    }
}

/// Fills `rank`, `popularity`, `center`, and `distance_to_pivot` on every
/// candidate.
///
/// Sorts the batch by feature id so candidates of one shard are contiguous,
/// then loads each shard's tables exactly once; at most one shard's tables are
/// held at a time, and the previous shard's are dropped before the next is
/// acquired. An unloaded shard or missing table degrades to neutral scores.
///
/// Center resolution tries the shard's center table, then the edit overlay
/// for locally created features, then falls back to the approximate distance
/// estimator, which fills `distance_to_pivot` and leaves `center` unset. A
/// created feature without overlay geometry breaks the overlay contract and
/// aborts with an error.
pub fn fill_missing_fields(
    results: &mut [Candidate],
    source: &dyn DataSource,
    editor: &dyn EditOverlay,
    estimator: &mut dyn DistanceEstimator,
    pivot: Point,
    scale: i32,
) -> Result<EnrichStats, GeorankError> {
    results.sort_unstable_by_key(|c| c.id);

    let mut stats = EnrichStats::default();
    let mut tables: Option<ShardTables> = None;
    let mut reference_set = false;

    for c in results.iter_mut() {
        if tables.as_ref().map_or(true, |t| t.shard != c.id.shard) {
            // Release the previous shard before touching the next one.
            drop(tables.take());
            tables = Some(ShardTables::acquire(source, c.id.shard, &mut stats));
        }
        let Some(tables) = tables.as_mut() else {
            continue;
        };

        c.rank = tables.ranks.get(c.id.index);
        c.popularity = tables.popularity.get(c.id.index);

        let mut center = tables.centers.as_mut().and_then(|t| t.get(c.id.index));
        if center.is_none() && editor.feature_status(c.id) == FeatureStatus::Created {
            let edited = editor.edited_geometry(c.id).ok_or_else(|| {
                GeorankError::Invariant(format!(
                    "created feature {} has no geometry in the edit overlay",
                    c.id
                ))
            })?;
            stats.from_editor += 1;
            center = Some(edited);
        }

        match center {
            Some(p) => {
                c.center = Some(p);
                c.distance_to_pivot = geo::distance_on_earth(pivot, p);
            }
            None => {
                if !reference_set {
                    estimator.set_reference(pivot, scale);
                    reference_set = true;
                }
                c.distance_to_pivot = estimator.distance_to(c.id);
                stats.estimated += 1;
                tracing::debug!(feature = %c.id, "Center unresolved, estimated pivot distance");
            }
        }
    }

    if stats.estimated > 0 {
        tracing::warn!(
            count = stats.estimated,
            "Candidates without a resolvable center fell back to estimated distances"
        );
    }
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::{FeatureId, TokenMatch};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct FakeShard {
        ranks: HashMap<u32, u8>,
        popularity: HashMap<u32, u8>,
        centers: HashMap<u32, Point>,
        with_rank_table: bool,
        with_center_table: bool,
    }

    impl FakeShard {
        fn new() -> Self {
            Self {
                ranks: HashMap::new(),
                popularity: HashMap::new(),
                centers: HashMap::new(),
                with_rank_table: true,
                with_center_table: true,
            }
        }
    }

    struct MapTable(HashMap<u32, u8>);

    impl RankTable for MapTable {
        fn get(&self, index: u32) -> u8 {
            self.0.get(&index).copied().unwrap_or(0)
        }
    }

    struct MapCenters(HashMap<u32, Point>);

    impl CenterTable for MapCenters {
        fn get(&mut self, index: u32) -> Option<Point> {
            self.0.get(&index).copied()
        }
    }

    impl ShardReader for FakeShard {
        fn rank_table(&self, kind: RankTableKind) -> Option<Box<dyn RankTable>> {
            if !self.with_rank_table {
                return None;
            }
            let map = match kind {
                RankTableKind::SearchRank => self.ranks.clone(),
                RankTableKind::Popularity => self.popularity.clone(),
            };
            Some(Box::new(MapTable(map)))
        }

        fn center_table(&self) -> Option<Box<dyn CenterTable>> {
            if !self.with_center_table {
                return None;
            }
            Some(Box::new(MapCenters(self.centers.clone())))
        }
    }

    struct FakeSource {
        shards: HashMap<u32, Arc<FakeShard>>,
        loads: AtomicUsize,
    }

    impl FakeSource {
        fn new() -> Self {
            Self {
                shards: HashMap::new(),
                loads: AtomicUsize::new(0),
            }
        }
    }

    impl DataSource for FakeSource {
        fn shard(&self, id: ShardId) -> Option<Arc<dyn ShardReader>> {
            self.loads.fetch_add(1, Ordering::Relaxed);
            self.shards
                .get(&id.0)
                .map(|s| Arc::clone(s) as Arc<dyn ShardReader>)
        }
    }

    #[derive(Default)]
    struct ScriptedEditor {
        created: HashMap<FeatureId, Option<Point>>,
    }

    impl EditOverlay for ScriptedEditor {
        fn feature_status(&self, id: FeatureId) -> FeatureStatus {
            if self.created.contains_key(&id) {
                FeatureStatus::Created
            } else {
                FeatureStatus::Untouched
            }
        }

        fn edited_geometry(&self, id: FeatureId) -> Option<Point> {
            self.created.get(&id).copied().flatten()
        }
    }

    struct FakeEstimator {
        distance: f64,
        reference_calls: usize,
    }

    impl DistanceEstimator for FakeEstimator {
        fn set_reference(&mut self, _pivot: Point, _scale: i32) {
            self.reference_calls += 1;
        }

        fn distance_to(&mut self, _id: FeatureId) -> f64 {
            self.distance
        }

        fn clear(&mut self) {}
    }

    fn cand(shard: u32, index: u32) -> Candidate {
        Candidate::new(
            FeatureId::new(ShardId(shard), index),
            TokenMatch::default(),
            false,
            false,
        )
    }

    fn pivot() -> Point {
        Point::from_lat_lon(52.5, 13.4)
    }

    fn run(
        results: &mut [Candidate],
        source: &FakeSource,
        editor: &ScriptedEditor,
        estimator: &mut FakeEstimator,
    ) -> EnrichStats {
        fill_missing_fields(results, source, editor, estimator, pivot(), 17).unwrap()
    }

    #[test]
    fn test_fills_scores_and_distances() {
        let mut source = FakeSource::new();
        let mut shard = FakeShard::new();
        shard.ranks.insert(7, 42);
        shard.popularity.insert(7, 9);
        let center = Point::from_lat_lon(52.51, 13.41);
        shard.centers.insert(7, center);
        source.shards.insert(1, Arc::new(shard));

        let mut results = vec![cand(1, 7)];
        let mut estimator = FakeEstimator { distance: 0.0, reference_calls: 0 };
        let stats = run(&mut results, &source, &ScriptedEditor::default(), &mut estimator);

        assert_eq!(results[0].rank, 42);
        assert_eq!(results[0].popularity, 9);
        assert_eq!(results[0].center, Some(center));
        let expected = geo::distance_on_earth(pivot(), center);
        assert!((results[0].distance_to_pivot - expected).abs() < 1e-9);
        assert_eq!(stats.shards_visited, 1);
        assert_eq!(stats.dead_shards, 0);
        assert_eq!(estimator.reference_calls, 0);
    }

    #[test]
    fn test_sorts_by_id_and_loads_each_shard_once() {
        let mut source = FakeSource::new();
        source.shards.insert(1, Arc::new(FakeShard::new()));
        source.shards.insert(2, Arc::new(FakeShard::new()));

        // Interleaved shards; enrichment must group them.
        let mut results = vec![cand(2, 5), cand(1, 9), cand(2, 1), cand(1, 3)];
        let mut estimator = FakeEstimator { distance: 1.0, reference_calls: 0 };
        run(&mut results, &source, &ScriptedEditor::default(), &mut estimator);

        assert_eq!(source.loads.load(Ordering::Relaxed), 2);
        let ids: Vec<(u32, u32)> = results.iter().map(|c| (c.id.shard.0, c.id.index)).collect();
        assert_eq!(ids, vec![(1, 3), (1, 9), (2, 1), (2, 5)]);
    }

    #[test]
    fn test_dead_shard_degrades_to_neutral_scores() {
        let source = FakeSource::new();
        let mut results = vec![cand(3, 1)];
        let mut estimator = FakeEstimator { distance: 777.0, reference_calls: 0 };
        let stats = run(&mut results, &source, &ScriptedEditor::default(), &mut estimator);

        assert_eq!(results[0].rank, 0);
        assert_eq!(results[0].popularity, 0);
        assert_eq!(results[0].center, None);
        assert_eq!(results[0].distance_to_pivot, 777.0);
        assert_eq!(stats.dead_shards, 1);
        assert_eq!(stats.estimated, 1);
    }

    #[test]
    fn test_missing_rank_tables_do_not_hide_centers() {
        let mut source = FakeSource::new();
        let mut shard = FakeShard::new();
        shard.with_rank_table = false;
        let center = Point::from_lat_lon(52.49, 13.39);
        shard.centers.insert(4, center);
        source.shards.insert(1, Arc::new(shard));

        let mut results = vec![cand(1, 4)];
        let mut estimator = FakeEstimator { distance: 0.0, reference_calls: 0 };
        run(&mut results, &source, &ScriptedEditor::default(), &mut estimator);

        assert_eq!(results[0].rank, 0);
        assert_eq!(results[0].center, Some(center));
    }

    #[test]
    fn test_created_feature_takes_center_from_overlay() {
        let mut source = FakeSource::new();
        source.shards.insert(1, Arc::new(FakeShard::new()));

        let id = FeatureId::new(ShardId(1), 100);
        let edited = Point::from_lat_lon(52.6, 13.3);
        let mut editor = ScriptedEditor::default();
        editor.created.insert(id, Some(edited));

        let mut results = vec![cand(1, 100)];
        let mut estimator = FakeEstimator { distance: 0.0, reference_calls: 0 };
        let stats = run(&mut results, &source, &editor, &mut estimator);

        assert_eq!(results[0].center, Some(edited));
        assert_eq!(stats.from_editor, 1);
        assert_eq!(stats.estimated, 0);
    }

    #[test]
    fn test_created_feature_without_geometry_is_an_error() {
        let mut source = FakeSource::new();
        source.shards.insert(1, Arc::new(FakeShard::new()));

        let id = FeatureId::new(ShardId(1), 100);
        let mut editor = ScriptedEditor::default();
        editor.created.insert(id, None);

        let mut results = vec![cand(1, 100)];
        let mut estimator = FakeEstimator { distance: 0.0, reference_calls: 0 };
        let err = fill_missing_fields(
            &mut results,
            &source,
            &editor,
            &mut estimator,
            pivot(),
            17,
        )
        .unwrap_err();
        assert!(matches!(err, GeorankError::Invariant(_)));
    }

    #[test]
    fn test_estimator_reference_is_set_once_per_pass() {
        let source = FakeSource::new();
        let mut results = vec![cand(1, 1), cand(1, 2), cand(2, 1)];
        let mut estimator = FakeEstimator { distance: 5.0, reference_calls: 0 };
        let stats = run(&mut results, &source, &ScriptedEditor::default(), &mut estimator);

        assert_eq!(stats.estimated, 3);
        assert_eq!(estimator.reference_calls, 1);
        assert!(results.iter().all(|c| c.distance_to_pivot == 5.0));
        assert!(results.iter().all(|c| c.center.is_none()));
    }

    #[test]
    fn test_empty_batch_is_a_no_op() {
        let source = FakeSource::new();
        let mut results: Vec<Candidate> = Vec::new();
        let mut estimator = FakeEstimator { distance: 0.0, reference_calls: 0 };
        let stats = run(&mut results, &source, &ScriptedEditor::default(), &mut estimator);
        assert_eq!(stats, EnrichStats::default());
        assert_eq!(estimator.reference_calls, 0);
    }
}
