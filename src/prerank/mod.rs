pub mod enrich;
pub mod relax;
pub mod select;
pub mod sweep;

use std::collections::HashSet;
use std::mem;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::candidate::{token_match_order, Candidate, FeatureId};
use crate::editor::EditOverlay;
use crate::errors::GeorankError;
use crate::estimator::DistanceEstimator;
use crate::geo::{Point, Rect};
use crate::ranker::Ranker;
use crate::source::DataSource;

use select::Comparator;
use sweep::NearbySweeper;

/// Default per-cycle cap on candidates forwarded to the ranker.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Default cap on candidates accepted over a whole session.
pub const DEFAULT_RESULT_LIMIT: usize = 400;

/// Fixed additive term of the sweep priority, reserved for a filter-pass
/// signal that is currently disabled. It shifts every priority equally and
/// never discriminates between candidates.
const SWEEP_PRIORITY_BONUS: u32 = 2;

/// Where a session stands in its lifecycle.
///
/// The mid-update state is not representable here: `update` takes `&mut
/// self`, so a session can never be observed mid-cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Uninitialized,
    Initialized,
    Finished,
}

/// Query parameters for one search session, accepted at `init`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Params {
    /// Currently visible map area.
    pub viewport: Rect,
    /// User position, when known.
    pub position: Option<Point>,
    /// Reference point for all distance computations.
    pub pivot: Point,
    /// Zoom scale handed to the approximate distance estimator.
    pub scale: i32,
    /// Number of tokens in the query.
    pub num_query_tokens: usize,
    /// Per-cycle cap on candidates forwarded to the ranker.
    pub batch_size: usize,
    /// Total candidates accepted across the session; once this many results
    /// have been sent, further ingested candidates are dropped.
    pub limit: usize,
    /// Minimum on-map separation between viewport results, per axis, in
    /// projected units. Non-positive disables the sweep.
    pub min_distance_between_results: Point,
    /// Category-style query ("cafe", "atm") rather than a name lookup.
    pub categorical_request: bool,
    /// Restrict this session's cycles to candidates inside the viewport.
    pub viewport_search: bool,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            viewport: Rect::new(Point::new(-180.0, -180.0), Point::new(180.0, 180.0)),
            position: None,
            pivot: Point::new(0.0, 0.0),
            scale: 17,
            num_query_tokens: 0,
            batch_size: DEFAULT_BATCH_SIZE,
            limit: DEFAULT_RESULT_LIMIT,
            min_distance_between_results: Point::new(0.0, 0.0),
            categorical_request: false,
            viewport_search: false,
        }
    }
}

/// The candidate pre-ranking pipeline.
///
/// Sits between the matcher and the ranker: the matcher `ingest`s raw
/// candidates as it finds them, the host calls `update` once per cycle, and
/// each cycle enriches, deduplicates, filters, and caps the working set
/// before handing the survivors to the injected [`Ranker`]. All collaborators
/// are injected; the pre-ranker itself performs no I/O.
///
/// One instance serves one session at a time; `init` starts (or restarts) a
/// session. The previous-emission set survives `init` on purpose: flicker
/// suppression spans the consecutive viewport sessions of one map screen, and
/// only `clear_caches` discards it.
pub struct PreRanker {
    source: Arc<dyn DataSource>,
    editor: Arc<dyn EditOverlay>,
    estimator: Box<dyn DistanceEstimator>,
    ranker: Box<dyn Ranker>,

    phase: SessionPhase,
    session_id: Uuid,
    params: Params,

    results: Vec<Candidate>,
    relaxed: Vec<Candidate>,
    prev_emit: HashSet<FeatureId>,
    curr_emit: HashSet<FeatureId>,
    num_sent: usize,
    have_fully_matched: bool,
}

impl PreRanker {
    pub fn new(
        source: Arc<dyn DataSource>,
        editor: Arc<dyn EditOverlay>,
        estimator: Box<dyn DistanceEstimator>,
        ranker: Box<dyn Ranker>,
    ) -> Self {
        Self {
            source,
            editor,
            estimator,
            ranker,
            phase: SessionPhase::Uninitialized,
            session_id: Uuid::nil(),
            params: Params::default(),
            results: Vec::new(),
            relaxed: Vec::new(),
            prev_emit: HashSet::new(),
            curr_emit: HashSet::new(),
            num_sent: 0,
            have_fully_matched: false,
        }
    }

    /// Starts a session: resets counters, working and relaxation sets, and
    /// the current-emission set, and stores the query parameters. Valid in
    /// any phase; an unfinished previous session is simply abandoned.
    pub fn init(&mut self, params: Params) {
        self.session_id = Uuid::new_v4();
        self.params = params;
        self.phase = SessionPhase::Initialized;
        self.results.clear();
        self.relaxed.clear();
        self.curr_emit.clear();
        self.num_sent = 0;
        self.have_fully_matched = false;
        tracing::debug!(
            session = %self.session_id,
            batch_size = self.params.batch_size,
            limit = self.params.limit,
            viewport_search = self.params.viewport_search,
            categorical = self.params.categorical_request,
            num_query_tokens = self.params.num_query_tokens,
            "Pre-ranker session initialized"
        );
    }

    /// Adds one raw candidate to the working set. Dropped silently once the
    /// session limit has been sent.
    pub fn emplace(&mut self, candidate: Candidate) -> Result<(), GeorankError> {
        self.ensure_initialized("emplace")?;
        if self.is_full() {
            tracing::trace!(feature = %candidate.id, "Session limit reached, dropping candidate");
            return Ok(());
        }
        self.have_fully_matched |= candidate.tokens.all_tokens_matched;
        self.results.push(candidate);
        Ok(())
    }

    /// Adds a batch of raw candidates to the working set.
    pub fn ingest(&mut self, batch: Vec<Candidate>) -> Result<(), GeorankError> {
        self.ensure_initialized("ingest")?;
        for candidate in batch {
            self.emplace(candidate)?;
        }
        Ok(())
    }

    /// Runs one update cycle over the working set and emits the surviving
    /// batch to the ranker.
    ///
    /// Stage order: relaxation split/merge, field enrichment, dedup by
    /// feature id, the viewport containment filter and nearby sweep (viewport
    /// sessions only), then top-K union selection when the set still exceeds
    /// the batch cap. The ranker always receives `add_batch` (possibly empty)
    /// followed by the cycle boundary notification. On the terminal cycle the
    /// current-emission set ages into the previous-emission set.
    pub fn update(&mut self, last_update: bool) -> Result<(), GeorankError> {
        self.ensure_initialized("update")?;
        let started = Instant::now();
        let ingested = self.results.len();

        relax::filter_relaxed(&mut self.results, &mut self.relaxed, last_update);
        let stats = enrich::fill_missing_fields(
            &mut self.results,
            self.source.as_ref(),
            self.editor.as_ref(),
            self.estimator.as_mut(),
            self.params.pivot,
            self.params.scale,
        )?;
        self.filter();

        self.num_sent += self.results.len();
        let batch = mem::take(&mut self.results);
        tracing::debug!(
            session = %self.session_id,
            ingested,
            sent = batch.len(),
            total_sent = self.num_sent,
            deferred = self.relaxed.len(),
            shards = stats.shards_visited,
            dead_shards = stats.dead_shards,
            estimated = stats.estimated,
            last_update,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Update cycle complete"
        );
        self.ranker.add_batch(batch);
        self.ranker.notify_update_boundary(last_update);

        if last_update && !self.curr_emit.is_empty() {
            mem::swap(&mut self.prev_emit, &mut self.curr_emit);
        }
        Ok(())
    }

    /// Ends the session and tells the ranker whether it was cancelled. No
    /// further updates are valid until the next `init`.
    pub fn finish(&mut self, cancelled: bool) -> Result<(), GeorankError> {
        self.ensure_initialized("finish")?;
        self.phase = SessionPhase::Finished;
        tracing::debug!(
            session = %self.session_id,
            cancelled,
            total_sent = self.num_sent,
            "Pre-ranker session finished"
        );
        self.ranker.on_session_finished(cancelled);
        Ok(())
    }

    /// Drops the estimator's cached state and both emission-history sets.
    /// Called between unrelated sessions so flicker suppression does not leak
    /// across them.
    pub fn clear_caches(&mut self) -> Result<(), GeorankError> {
        if self.phase == SessionPhase::Uninitialized {
            return Err(GeorankError::invalid_phase("clear_caches", self.phase));
        }
        self.estimator.clear();
        self.prev_emit.clear();
        self.curr_emit.clear();
        Ok(())
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Results sent to the ranker so far in this session.
    pub fn num_sent_results(&self) -> usize {
        self.num_sent
    }

    /// True once any ingested candidate matched every query token.
    pub fn have_fully_matched_result(&self) -> bool {
        self.have_fully_matched
    }

    /// True once the session limit has been sent; further candidates are
    /// dropped at ingestion.
    pub fn is_full(&self) -> bool {
        self.num_sent >= self.params.limit
    }

    pub fn batch_size(&self) -> usize {
        self.params.batch_size
    }

    fn ensure_initialized(&self, operation: &'static str) -> Result<(), GeorankError> {
        if self.phase != SessionPhase::Initialized {
            return Err(GeorankError::invalid_phase(operation, self.phase));
        }
        Ok(())
    }

    fn filter(&mut self) {
        dedup_by_identity(&mut self.results);

        if self.params.viewport_search {
            self.filter_for_viewport();
        }

        if self.results.len() <= self.params.batch_size {
            return;
        }

        let orders: Vec<Comparator> = if self.params.categorical_request {
            let position_in_viewport = self
                .params
                .position
                .map_or(false, |p| self.params.viewport.contains(p));
            let detailed_scale = self.params.viewport.diagonal_meters()
                < 2.0 * select::PEDESTRIAN_RADIUS_METERS;
            vec![select::categorical(
                position_in_viewport,
                detailed_scale,
                self.params.viewport,
            )]
        } else {
            vec![
                select::by_distance(),
                select::by_rank_and_popularity(),
                select::by_exact_match(),
            ]
        };

        self.results = select::select_top_union(
            mem::take(&mut self.results),
            self.params.batch_size,
            &orders,
        );
    }

    fn filter_for_viewport(&mut self) {
        let viewport = self.params.viewport;
        let num_query_tokens = self.params.num_query_tokens;
        let before = self.results.len();

        self.results.retain(|c| {
            let Some(center) = c.center else {
                tracing::debug!(feature = %c.id, "Dropping viewport candidate without a center");
                return false;
            };
            if !viewport.contains(center) {
                return false;
            }
            c.tokens.matched_count + 1 >= num_query_tokens
        });

        let eps = self.params.min_distance_between_results;
        let mut sweeper = NearbySweeper::new(eps.x, eps.y);
        for (i, c) in self.results.iter().enumerate() {
            if let Some(center) = c.center {
                sweeper.add(center.x, center.y, i, sweep_priority(c, &self.prev_emit));
            }
        }
        let mut keep = vec![false; self.results.len()];
        for i in sweeper.sweep() {
            keep[i] = true;
        }
        self.results = mem::take(&mut self.results)
            .into_iter()
            .enumerate()
            .filter_map(|(i, c)| keep[i].then_some(c))
            .collect();

        for c in &self.results {
            self.curr_emit.insert(c.id);
        }
        tracing::debug!(
            session = %self.session_id,
            before,
            kept = self.results.len(),
            "Viewport filter applied"
        );
    }
}

/// Removes duplicate feature ids from the working set, keeping the candidate
/// with the richer token match per id. The sort is stable, so among fully
/// tied duplicates the earliest ingested one survives.
fn dedup_by_identity(results: &mut Vec<Candidate>) {
    results.sort_by(|a, b| {
        a.id.cmp(&b.id)
            .then_with(|| token_match_order(&a.tokens, &b.tokens))
    });
    results.dedup_by_key(|c| c.id);
}

/// Sweep priority of a viewport candidate. Candidates emitted in the previous
/// cycle get a floor of 3 so panning does not blink them away in favor of a
/// new neighbor with marginally better scores.
fn sweep_priority(c: &Candidate, prev_emit: &HashSet<FeatureId>) -> u32 {
    let exact = u32::from(c.exact_match);
    let previous = if prev_emit.contains(&c.id) { 3 } else { 0 };
    u32::from(c.rank)
        .max(u32::from(c.popularity))
        .max(exact)
        .max(previous)
        + SWEEP_PRIORITY_BONUS
}
