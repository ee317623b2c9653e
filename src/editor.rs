use crate::candidate::FeatureId;
use crate::geo::Point;

/// Lifecycle of a feature with respect to local user edits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FeatureStatus {
    /// No local edit touches this feature.
    #[default]
    Untouched,
    /// Created locally; exists only in the overlay, never in shard data.
    Created,
    /// Exists in shard data with local modifications.
    Modified,
    /// Locally deleted.
    Deleted,
}

/// Read access to the local edit overlay.
///
/// The enrichment stage consults the overlay when shard data has no geometry
/// for a candidate: a `Created` feature's center lives only here.
/// `edited_geometry` must return `Some` for every `Created` feature; the
/// pipeline treats a violation as a contract error and aborts the update.
pub trait EditOverlay: Send + Sync {
    fn feature_status(&self, id: FeatureId) -> FeatureStatus;

    fn edited_geometry(&self, id: FeatureId) -> Option<Point>;
}

/// Overlay with no edits, for hosts without an editor.
pub struct NoEdits;

impl EditOverlay for NoEdits {
    fn feature_status(&self, _id: FeatureId) -> FeatureStatus {
        FeatureStatus::Untouched
    }

    fn edited_geometry(&self, _id: FeatureId) -> Option<Point> {
        None
    }
}
