use crate::candidate::Candidate;

/// Downstream consumer of pre-ranked candidate batches.
///
/// The pre-ranker pushes into this seam at the end of every update cycle:
/// first the surviving batch (possibly empty), then the cycle boundary
/// notification. `on_session_finished` fires exactly once per session, from
/// `PreRanker::finish`.
pub trait Ranker: Send {
    /// Receives the candidates that survived one update cycle. Batches are
    /// deduplicated by feature id within a cycle but may repeat ids across
    /// cycles; cross-cycle merging is the ranker's concern.
    fn add_batch(&mut self, batch: Vec<Candidate>);

    /// Signals that an update cycle completed. `last_update` marks the
    /// terminal cycle of the session.
    fn notify_update_boundary(&mut self, last_update: bool);

    /// Signals the end of the session. `cancelled` is true when the search
    /// was aborted rather than run to completion.
    fn on_session_finished(&mut self, cancelled: bool);
}
