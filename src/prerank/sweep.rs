use std::collections::HashMap;

struct SweepPoint {
    x: f64,
    y: f64,
    index: usize,
    priority: u32,
}

/// Suppresses near-duplicate points so clustered candidates do not crowd the
/// result list.
///
/// Points are accumulated with a payload index and a priority, then `sweep`
/// keeps a subset such that no two retained points are within the closed
/// per-axis epsilon rectangle of each other (`|dx| <= eps_x && |dy| <=
/// eps_y`), and every dropped point is within that rectangle of some retained
/// point. Selection is greedy from the highest priority down, so a dropped
/// point always lost to a neighbor of equal or higher priority; priority ties
/// go to the earlier payload index. Greedy suppression is an approximation of
/// optimal decluttering, which is all map display needs.
///
/// A non-positive or non-finite epsilon on either axis disables suppression
/// and `sweep` retains every point.
pub struct NearbySweeper {
    eps_x: f64,
    eps_y: f64,
    points: Vec<SweepPoint>,
}

impl NearbySweeper {
    pub fn new(eps_x: f64, eps_y: f64) -> Self {
        Self {
            eps_x,
            eps_y,
            points: Vec::new(),
        }
    }

    pub fn add(&mut self, x: f64, y: f64, index: usize, priority: u32) {
        self.points.push(SweepPoint {
            x,
            y,
            index,
            priority,
        });
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Runs the suppression and returns the retained payload indices in
    /// ascending order.
    pub fn sweep(mut self) -> Vec<usize> {
        if !(self.eps_x > 0.0 && self.eps_x.is_finite())
            || !(self.eps_y > 0.0 && self.eps_y.is_finite())
        {
            let mut all: Vec<usize> = self.points.iter().map(|p| p.index).collect();
            all.sort_unstable();
            return all;
        }

        self.points
            .sort_unstable_by(|a, b| b.priority.cmp(&a.priority).then(a.index.cmp(&b.index)));

        // Retained points bucketed on a uniform grid with cell size
        // (eps_x, eps_y); any conflicting point lies in the 3x3 neighborhood.
        let mut grid: HashMap<(i64, i64), Vec<(f64, f64)>> = HashMap::new();
        let mut retained = Vec::new();

        for p in &self.points {
            let cx = (p.x / self.eps_x).floor() as i64;
            let cy = (p.y / self.eps_y).floor() as i64;

            let mut conflicts = false;
            'scan: for dx in -1..=1i64 {
                for dy in -1..=1i64 {
                    let cell = (cx.saturating_add(dx), cy.saturating_add(dy));
                    if let Some(bucket) = grid.get(&cell) {
                        for &(qx, qy) in bucket {
                            if (p.x - qx).abs() <= self.eps_x && (p.y - qy).abs() <= self.eps_y {
                                conflicts = true;
                                break 'scan;
                            }
                        }
                    }
                }
            }

            if !conflicts {
                grid.entry((cx, cy)).or_default().push((p.x, p.y));
                retained.push(p.index);
            }
        }

        retained.sort_unstable();
        retained
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sweep_points(eps: f64, points: &[(f64, f64, u32)]) -> Vec<usize> {
        let mut sweeper = NearbySweeper::new(eps, eps);
        for (i, &(x, y, priority)) in points.iter().enumerate() {
            sweeper.add(x, y, i, priority);
        }
        sweeper.sweep()
    }

    #[test]
    fn test_empty_sweep() {
        let sweeper = NearbySweeper::new(1.0, 1.0);
        assert!(sweeper.is_empty());
        assert_eq!(sweeper.sweep(), Vec::<usize>::new());
    }

    #[test]
    fn test_far_apart_points_all_retained() {
        let retained = sweep_points(1.0, &[(0.0, 0.0, 5), (10.0, 0.0, 1), (0.0, 10.0, 3)]);
        assert_eq!(retained, vec![0, 1, 2]);
    }

    #[test]
    fn test_higher_priority_wins_regardless_of_insertion_order() {
        let retained = sweep_points(1.0, &[(0.0, 0.0, 1), (0.5, 0.5, 9)]);
        assert_eq!(retained, vec![1]);
    }

    #[test]
    fn test_epsilon_bounds_are_closed() {
        // Exactly epsilon apart on one axis conflicts.
        let retained = sweep_points(1.0, &[(0.0, 0.0, 5), (1.0, 0.0, 1)]);
        assert_eq!(retained, vec![0]);
        // Just beyond does not.
        let retained = sweep_points(1.0, &[(0.0, 0.0, 5), (1.0 + 1e-9, 0.0, 1)]);
        assert_eq!(retained, vec![0, 1]);
    }

    #[test]
    fn test_rectangular_not_euclidean() {
        // Diagonal neighbor at (eps, eps) is inside the closed rectangle even
        // though its Euclidean distance exceeds eps.
        let retained = sweep_points(1.0, &[(0.0, 0.0, 5), (1.0, 1.0, 1)]);
        assert_eq!(retained, vec![0]);
    }

    #[test]
    fn test_priority_tie_keeps_earlier_index() {
        let retained = sweep_points(1.0, &[(0.2, 0.2, 7), (0.4, 0.4, 7)]);
        assert_eq!(retained, vec![0]);
    }

    #[test]
    fn test_greedy_chain() {
        // a and c are far apart; b conflicts with both. Highest priority
        // first: a retained, b dropped against a, c retained.
        let retained = sweep_points(1.0, &[(0.0, 0.0, 9), (0.9, 0.0, 5), (1.8, 0.0, 1)]);
        assert_eq!(retained, vec![0, 2]);
    }

    #[test]
    fn test_every_dropped_point_is_near_a_retained_one() {
        let points: Vec<(f64, f64, u32)> = (0..40)
            .map(|i| {
                let x = (i as f64 * 0.37).sin() * 5.0;
                let y = (i as f64 * 0.73).cos() * 5.0;
                (x, y, (i % 7) as u32)
            })
            .collect();
        let eps = 0.8;
        let retained = sweep_points(eps, &points);
        assert!(!retained.is_empty());
        for (i, &(x, y, _)) in points.iter().enumerate() {
            if retained.contains(&i) {
                continue;
            }
            let covered = retained.iter().any(|&r| {
                let (rx, ry, _) = points[r];
                (x - rx).abs() <= eps && (y - ry).abs() <= eps
            });
            assert!(covered, "dropped point {} has no retained neighbor", i);
        }
        // And no two retained points conflict with each other.
        for (a, &ra) in retained.iter().enumerate() {
            for &rb in &retained[a + 1..] {
                let (ax, ay, _) = points[ra];
                let (bx, by, _) = points[rb];
                assert!(
                    (ax - bx).abs() > eps || (ay - by).abs() > eps,
                    "retained points {} and {} conflict",
                    ra,
                    rb
                );
            }
        }
    }

    #[test]
    fn test_negative_coordinates() {
        let retained = sweep_points(1.0, &[(-3.0, -3.0, 5), (-3.5, -3.5, 1), (-8.0, -3.0, 2)]);
        assert_eq!(retained, vec![0, 2]);
    }

    #[test]
    fn test_degenerate_epsilon_disables_suppression() {
        for eps in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let mut sweeper = NearbySweeper::new(eps, eps);
            sweeper.add(0.0, 0.0, 0, 1);
            sweeper.add(0.0, 0.0, 1, 9);
            assert_eq!(sweeper.sweep(), vec![0, 1], "eps = {}", eps);
        }
    }

    #[test]
    fn test_indices_ascending_even_when_priorities_interleave() {
        let retained = sweep_points(
            0.5,
            &[(0.0, 0.0, 1), (5.0, 0.0, 9), (10.0, 0.0, 4), (15.0, 0.0, 7)],
        );
        assert_eq!(retained, vec![0, 1, 2, 3]);
    }
}
