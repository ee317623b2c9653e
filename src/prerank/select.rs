use std::cmp::Ordering;

use crate::candidate::{token_match_order, Candidate};
use crate::geo::Rect;

/// Walking-scale radius in meters. A viewport whose diagonal is under twice
/// this is treated as detailed scale by the categorical order.
pub const PEDESTRIAN_RADIUS_METERS: f64 = 2500.0;

/// A total order over candidates. Every order built here ends in a feature-id
/// tie-break, so selection results never depend on input permutation.
pub type Comparator = Box<dyn Fn(&Candidate, &Candidate) -> Ordering>;

// --- Selection orders ---

/// Nearest to the pivot first; ties go to the richer token match.
pub fn by_distance() -> Comparator {
    Box::new(|a, b| {
        a.distance_to_pivot
            .total_cmp(&b.distance_to_pivot)
            .then_with(|| token_match_order(&a.tokens, &b.tokens))
            .then_with(|| a.id.cmp(&b.id))
    })
}

fn rank_popularity(a: &Candidate, b: &Candidate) -> Ordering {
    b.rank
        .cmp(&a.rank)
        .then_with(|| b.popularity.cmp(&a.popularity))
        .then_with(|| a.distance_to_pivot.total_cmp(&b.distance_to_pivot))
}

/// Highest rank first, then popularity, then pivot distance.
pub fn by_rank_and_popularity() -> Comparator {
    Box::new(|a, b| rank_popularity(a, b).then_with(|| a.id.cmp(&b.id)))
}

/// Exact matches that consumed the whole query first, then the
/// rank-and-popularity order among equals.
pub fn by_exact_match() -> Comparator {
    Box::new(|a, b| {
        b.matches_everything()
            .cmp(&a.matches_everything())
            .then_with(|| rank_popularity(a, b))
            .then_with(|| a.id.cmp(&b.id))
    })
}

/// Order for category searches ("cafe", "atm"), where token match quality
/// carries no signal.
///
/// With the user standing inside the viewport, plain pivot distance wins. At
/// detailed scale, candidates visible in the viewport come before off-screen
/// ones. Popularity settles the rest. Candidates without a resolved center
/// count as off-screen.
pub fn categorical(position_in_viewport: bool, detailed_scale: bool, viewport: Rect) -> Comparator {
    Box::new(move |a, b| {
        if position_in_viewport {
            return a
                .distance_to_pivot
                .total_cmp(&b.distance_to_pivot)
                .then_with(|| a.id.cmp(&b.id));
        }
        let visibility = if detailed_scale {
            let a_inside = a.center.map_or(false, |c| viewport.contains(c));
            let b_inside = b.center.map_or(false, |c| viewport.contains(c));
            b_inside.cmp(&a_inside)
        } else {
            Ordering::Equal
        };
        visibility
            .then_with(|| b.popularity.cmp(&a.popularity))
            .then_with(|| a.id.cmp(&b.id))
    })
}

// --- Top-K union ---

/// Keeps the union of the K best candidates under each order.
///
/// Runs a linear-time partial selection per order over an index arena (the
/// candidates themselves never move until the final materialization), marks
/// each order's K best in a keep mask, and emits the retained candidates in
/// their input order. The result can hold up to `cap * orders.len()`
/// candidates and is never truncated further, so no order's K best is ever
/// sacrificed to another's.
///
/// When the input already fits the cap (or no orders are given) the input is
/// returned unchanged.
pub fn select_top_union(
    candidates: Vec<Candidate>,
    cap: usize,
    orders: &[Comparator],
) -> Vec<Candidate> {
    if cap == 0 {
        return Vec::new();
    }
    if candidates.len() <= cap || orders.is_empty() {
        return candidates;
    }

    let mut keep = vec![false; candidates.len()];
    let mut scratch: Vec<usize> = Vec::with_capacity(candidates.len());
    for order in orders {
        scratch.clear();
        scratch.extend(0..candidates.len());
        let (best, nth, _) = scratch
            .select_nth_unstable_by(cap - 1, |a, b| order(&candidates[*a], &candidates[*b]));
        for &i in best.iter() {
            keep[i] = true;
        }
        keep[*nth] = true;
    }

    candidates
        .into_iter()
        .enumerate()
        .filter_map(|(i, c)| keep[i].then_some(c))
        .collect()
}
