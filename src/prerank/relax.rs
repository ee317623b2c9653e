use std::mem;

use crate::candidate::Candidate;

/// Routes relaxed-match candidates around the per-cycle selection.
///
/// On a non-terminal cycle, candidates flagged `relaxed` move from `results`
/// into `buffer` so they cannot crowd out confident matches mid-session. On
/// the terminal cycle the buffer drains back into `results` and everything
/// competes one final time. No candidate is ever dropped here; relative order
/// within each group is preserved.
pub fn filter_relaxed(results: &mut Vec<Candidate>, buffer: &mut Vec<Candidate>, last_update: bool) {
    if last_update {
        results.append(buffer);
        return;
    }
    let (confident, deferred): (Vec<_>, Vec<_>) =
        mem::take(results).into_iter().partition(|c| !c.relaxed);
    *results = confident;
    buffer.extend(deferred);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::{FeatureId, ShardId, TokenMatch};

    fn cand(index: u32, relaxed: bool) -> Candidate {
        Candidate::new(
            FeatureId::new(ShardId(0), index),
            TokenMatch::default(),
            false,
            relaxed,
        )
    }

    fn indices(v: &[Candidate]) -> Vec<u32> {
        v.iter().map(|c| c.id.index).collect()
    }

    #[test]
    fn test_non_terminal_defers_relaxed() {
        let mut results = vec![cand(0, false), cand(1, true), cand(2, false), cand(3, true)];
        let mut buffer = vec![cand(9, true)];
        filter_relaxed(&mut results, &mut buffer, false);
        assert_eq!(indices(&results), vec![0, 2]);
        assert_eq!(indices(&buffer), vec![9, 1, 3]);
    }

    #[test]
    fn test_terminal_merges_buffer_back() {
        let mut results = vec![cand(0, false)];
        let mut buffer = vec![cand(1, true), cand(2, true)];
        filter_relaxed(&mut results, &mut buffer, true);
        assert_eq!(indices(&results), vec![0, 1, 2]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_terminal_keeps_relaxed_from_final_batch() {
        let mut results = vec![cand(0, true), cand(1, false)];
        let mut buffer = Vec::new();
        filter_relaxed(&mut results, &mut buffer, true);
        assert_eq!(indices(&results), vec![0, 1]);
    }

    #[test]
    fn test_nothing_is_lost_across_cycles() {
        let mut results = vec![cand(0, true), cand(1, false), cand(2, true)];
        let mut buffer = Vec::new();
        filter_relaxed(&mut results, &mut buffer, false);
        let mut next = vec![cand(3, true)];
        filter_relaxed(&mut next, &mut buffer, false);
        filter_relaxed(&mut next, &mut buffer, true);
        assert_eq!(indices(&next), vec![0, 2, 3]);
    }
}
