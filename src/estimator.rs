use crate::candidate::FeatureId;
use crate::geo::Point;

/// Approximate pivot-distance oracle, the last-resort geometry source.
///
/// When neither shard data nor the edit overlay can produce a center, the
/// enrichment stage asks the estimator for a rough distance instead. Lookups
/// must be cheap relative to a full geometry decode; implementations cache
/// aggressively, hence `&mut self` throughout.
pub trait DistanceEstimator: Send {
    /// Re-anchors the estimator on a pivot at a given zoom scale. Called
    /// lazily, at most once per enrichment pass, and only if the pass actually
    /// hits a candidate with no resolvable center.
    fn set_reference(&mut self, pivot: Point, scale: i32);

    /// Estimated distance in meters from the current reference to the
    /// feature. Must return a finite value for any id.
    fn distance_to(&mut self, id: FeatureId) -> f64;

    /// Drops cached state. Called from `PreRanker::clear_caches` between
    /// unrelated sessions.
    fn clear(&mut self);
}
