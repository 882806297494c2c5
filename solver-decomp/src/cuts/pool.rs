//! Cut pool shared across nodes.
//!
//! Manages the cuts generated during price-and-cut, including:
//! - Cut storage and parallel-duplicate detection
//! - Activity tracking from master duals
//! - Periodic cleanup of slack cuts

use std::collections::HashSet;

use crate::model::Row;

/// Status of a cut in the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CutStatus {
    /// Cut is worth separating again.
    Active,

    /// Cut stayed slack too long; kept for reactivation.
    Inactive,

    /// Cut has been permanently removed.
    Deleted,
}

/// A cut with pool metadata.
#[derive(Debug, Clone)]
pub struct PooledCut {
    /// The cut row over original indices.
    pub row: Row,

    /// Unique ID in the pool.
    pub id: usize,

    /// Current status.
    pub status: CutStatus,

    /// Number of times this cut was binding (dual > tol).
    pub times_binding: usize,

    /// Number of consecutive iterations where cut was slack.
    pub slack_count: usize,

    /// Iteration when cut was added.
    pub added_iter: usize,

    /// Last iteration when cut was binding.
    pub last_binding_iter: usize,
}

/// Cut pool settings.
#[derive(Debug, Clone)]
pub struct CutPoolSettings {
    /// Maximum cuts to keep in pool.
    pub max_cuts: usize,

    /// Deactivate cuts after this many consecutive slack iterations.
    pub max_slack_count: usize,

    /// How often to run cleanup (in iterations).
    pub cleanup_freq: usize,

    /// Minimum activity ratio to keep a cut active.
    pub min_activity_ratio: f64,
}

impl Default for CutPoolSettings {
    fn default() -> Self {
        Self {
            max_cuts: 10000,
            max_slack_count: 50,
            cleanup_freq: 100,
            min_activity_ratio: 0.01,
        }
    }
}

/// Statistics for the cut pool.
#[derive(Debug, Default, Clone)]
pub struct CutPoolStats {
    /// Total cuts added.
    pub total_added: usize,

    /// Total cuts removed.
    pub total_removed: usize,

    /// Current active cuts.
    pub active_cuts: usize,

    /// Peak pool size.
    pub peak_size: usize,
}

/// Cut pool for managing generated cuts.
pub struct CutPool {
    cuts: Vec<PooledCut>,
    next_id: usize,
    iteration: usize,
    settings: CutPoolSettings,
    stats: CutPoolStats,
}

impl CutPool {
    /// Create a new cut pool.
    pub fn new(settings: CutPoolSettings) -> Self {
        Self {
            cuts: Vec::new(),
            next_id: 0,
            iteration: 0,
            settings,
            stats: CutPoolStats::default(),
        }
    }

    /// Add a cut to the pool.
    ///
    /// Returns the cut ID and whether it's a duplicate.
    pub fn add(&mut self, row: Row) -> (usize, bool) {
        if let Some(pooled) = self
            .cuts
            .iter()
            .find(|p| p.status != CutStatus::Deleted && is_parallel_duplicate(&row, &p.row))
        {
            return (pooled.id, true);
        }

        let id = self.next_id;
        self.next_id += 1;

        self.cuts.push(PooledCut {
            row,
            id,
            status: CutStatus::Active,
            times_binding: 0,
            slack_count: 0,
            added_iter: self.iteration,
            last_binding_iter: self.iteration,
        });
        self.stats.total_added += 1;
        self.stats.active_cuts += 1;
        self.stats.peak_size = self.stats.peak_size.max(self.cuts.len());

        (id, false)
    }

    /// Non-deleted cuts violated by `x` by more than `tol`, most violated first.
    pub fn violated(&self, x: &[f64], tol: f64) -> Vec<(usize, Row)> {
        let mut found: Vec<(f64, usize, Row)> = self
            .cuts
            .iter()
            .filter(|p| p.status != CutStatus::Deleted)
            .filter(|p| p.row.max_index().map_or(true, |j| j < x.len()))
            .filter_map(|p| {
                let v = p.row.violation(x);
                (v > tol).then(|| (v, p.id, p.row.clone()))
            })
            .collect();
        found.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));
        found.into_iter().map(|(_, id, row)| (id, row)).collect()
    }

    /// Update cut activity based on dual values.
    ///
    /// `dual_values` maps cut ID to its dual value in the master solution.
    pub fn update_activity(&mut self, dual_values: &[(usize, f64)]) {
        self.iteration += 1;

        let binding: HashSet<usize> = dual_values
            .iter()
            .filter(|(_, dual)| dual.abs() > 1e-8)
            .map(|&(id, _)| id)
            .collect();

        for pooled in &mut self.cuts {
            if pooled.status == CutStatus::Deleted {
                continue;
            }

            if binding.contains(&pooled.id) {
                pooled.times_binding += 1;
                pooled.slack_count = 0;
                pooled.last_binding_iter = self.iteration;
            } else if pooled.status == CutStatus::Active {
                pooled.slack_count += 1;
            }
        }

        if self.settings.cleanup_freq > 0 && self.iteration % self.settings.cleanup_freq == 0 {
            self.cleanup();
        }
    }

    /// Deactivate slack cuts.
    fn cleanup(&mut self) {
        for pooled in &mut self.cuts {
            if pooled.status != CutStatus::Active {
                continue;
            }

            if pooled.slack_count >= self.settings.max_slack_count {
                pooled.status = CutStatus::Inactive;
                self.stats.active_cuts -= 1;
                continue;
            }

            let age = self.iteration - pooled.added_iter + 1;
            let activity_ratio = pooled.times_binding as f64 / age as f64;
            if age > 10 && activity_ratio < self.settings.min_activity_ratio {
                pooled.status = CutStatus::Inactive;
                self.stats.active_cuts -= 1;
            }
        }

        if self.cuts.len() > 2 * self.settings.max_cuts {
            self.compact();
        }
    }

    /// Remove deleted cuts from storage.
    fn compact(&mut self) {
        let before = self.cuts.len();
        self.cuts.retain(|c| c.status != CutStatus::Deleted);
        log::debug!("cut pool: compacted {} deleted cuts", before - self.cuts.len());
    }

    /// Get active cuts.
    pub fn active_cuts(&self) -> impl Iterator<Item = &PooledCut> {
        self.cuts.iter().filter(|c| c.status == CutStatus::Active)
    }

    /// Get a cut by ID.
    pub fn get(&self, id: usize) -> Option<&PooledCut> {
        self.cuts.iter().find(|c| c.id == id)
    }

    /// Mark a cut as deleted.
    pub fn delete(&mut self, id: usize) {
        if let Some(pooled) = self.cuts.iter_mut().find(|c| c.id == id) {
            if pooled.status == CutStatus::Deleted {
                return;
            }
            if pooled.status == CutStatus::Active {
                self.stats.active_cuts -= 1;
            }
            pooled.status = CutStatus::Deleted;
            self.stats.total_removed += 1;
        }
    }

    /// Reactivate an inactive cut.
    pub fn activate(&mut self, id: usize) -> bool {
        match self.cuts.iter_mut().find(|c| c.id == id) {
            Some(pooled) if pooled.status == CutStatus::Inactive => {
                pooled.status = CutStatus::Active;
                pooled.slack_count = 0;
                self.stats.active_cuts += 1;
                true
            }
            _ => false,
        }
    }

    /// Get pool statistics.
    pub fn stats(&self) -> &CutPoolStats {
        &self.stats
    }

    /// Number of cuts in pool (including inactive).
    pub fn len(&self) -> usize {
        self.cuts.len()
    }

    /// Check if pool is empty.
    pub fn is_empty(&self) -> bool {
        self.cuts.is_empty()
    }

    /// Number of active cuts.
    pub fn num_active(&self) -> usize {
        self.stats.active_cuts
    }

    /// Current iteration.
    pub fn iteration(&self) -> usize {
        self.iteration
    }
}

impl Default for CutPool {
    fn default() -> Self {
        Self::new(CutPoolSettings::default())
    }
}

/// Two rows are duplicates if their coefficients are parallel and the
/// normalized bounds agree.
fn is_parallel_duplicate(a: &Row, b: &Row) -> bool {
    let a_norm = a.coefs.iter().map(|&(_, v)| v * v).sum::<f64>().sqrt();
    let b_norm = b.coefs.iter().map(|&(_, v)| v * v).sum::<f64>().sqrt();
    if a_norm < 1e-10 || b_norm < 1e-10 {
        return a_norm < 1e-10 && b_norm < 1e-10;
    }

    // Sparse dot product over sorted coefficients.
    let (mut i, mut k, mut dot) = (0, 0, 0.0);
    while i < a.coefs.len() && k < b.coefs.len() {
        let (ja, va) = a.coefs[i];
        let (jb, vb) = b.coefs[k];
        if ja == jb {
            dot += va * vb;
            i += 1;
            k += 1;
        } else if ja < jb {
            i += 1;
        } else {
            k += 1;
        }
    }

    // Same direction only: an antiparallel row bounds the other side.
    if dot / (a_norm * b_norm) <= 0.9999 {
        return false;
    }
    let same = |x: f64, y: f64| {
        if x.is_infinite() || y.is_infinite() {
            x == y
        } else {
            (x / a_norm - y / b_norm).abs() < 1e-8
        }
    };
    same(a.lb, b.lb) && same(a.ub, b.ub)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_cut(coefs: Vec<(usize, f64)>, rhs: f64) -> Row {
        Row::le(coefs, rhs)
    }

    #[test]
    fn test_pool_add_and_get() {
        let mut pool = CutPool::new(CutPoolSettings::default());

        let (id1, dup1) = pool.add(make_cut(vec![(0, 1.0), (1, 2.0)], 3.0));
        let (id2, dup2) = pool.add(make_cut(vec![(0, 4.0), (1, 5.0)], 6.0));

        assert!(!dup1);
        assert!(!dup2);
        assert_ne!(id1, id2);
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.num_active(), 2);
        assert!(pool.get(id2).is_some());
    }

    #[test]
    fn test_duplicate_detection() {
        let mut pool = CutPool::new(CutPoolSettings::default());

        let (id1, dup1) = pool.add(make_cut(vec![(0, 1.0), (3, 2.0)], 3.0));
        let (id2, dup2) = pool.add(make_cut(vec![(3, 2.0), (0, 1.0)], 3.0)); // Same cut
        let (id3, dup3) = pool.add(make_cut(vec![(0, 2.0), (3, 4.0)], 6.0)); // Parallel
        let (_, dup4) = pool.add(Row::ge(vec![(0, 1.0), (3, 2.0)], 3.0)); // Other side

        assert!(!dup1);
        assert!(dup2);
        assert!(dup3);
        assert!(!dup4);
        assert_eq!(id1, id2);
        assert_eq!(id1, id3);
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_violated_sorted_by_violation() {
        let mut pool = CutPool::default();
        let (small, _) = pool.add(make_cut(vec![(0, 1.0)], 0.9));
        let (large, _) = pool.add(make_cut(vec![(1, 1.0)], 0.5));
        pool.add(make_cut(vec![(2, 1.0)], 5.0));

        let found = pool.violated(&[1.0, 1.0, 1.0], 1e-6);
        let ids: Vec<usize> = found.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![large, small]);

        pool.delete(large);
        assert_eq!(pool.violated(&[1.0, 1.0, 1.0], 1e-6).len(), 1);
        assert_eq!(pool.stats().total_removed, 1);
    }

    #[test]
    fn test_activity_tracking() {
        let mut pool = CutPool::new(CutPoolSettings {
            max_slack_count: 3,
            cleanup_freq: 1,
            ..Default::default()
        });

        let (id, _) = pool.add(make_cut(vec![(0, 1.0), (1, 2.0)], 3.0));

        for _ in 0..2 {
            pool.update_activity(&[]);
        }
        assert_eq!(pool.get(id).unwrap().slack_count, 2);
        assert_eq!(pool.get(id).unwrap().status, CutStatus::Active);

        // Third slack iteration reaches the limit
        pool.update_activity(&[]);
        assert_eq!(pool.get(id).unwrap().status, CutStatus::Inactive);
        assert_eq!(pool.num_active(), 0);

        assert!(pool.activate(id));
        assert!(!pool.activate(id));
        assert_eq!(pool.num_active(), 1);
    }

    #[test]
    fn test_cut_binding() {
        let mut pool = CutPool::new(CutPoolSettings::default());
        let (id, _) = pool.add(make_cut(vec![(0, 1.0), (1, 2.0)], 3.0));

        pool.update_activity(&[(id, 0.5)]);
        assert_eq!(pool.get(id).unwrap().times_binding, 1);
        assert_eq!(pool.get(id).unwrap().slack_count, 0);

        pool.update_activity(&[]);
        assert_eq!(pool.get(id).unwrap().times_binding, 1);
        assert_eq!(pool.get(id).unwrap().slack_count, 1);

        // Binding again resets the slack count
        pool.update_activity(&[(id, -0.1)]);
        assert_eq!(pool.get(id).unwrap().times_binding, 2);
        assert_eq!(pool.get(id).unwrap().slack_count, 0);
    }
}
