//! Sparse ranged constraint rows.

/// A sparse row `lb <= a^T x <= ub`.
///
/// Used for master coupling rows, block rows and cuts. Infinite bounds mark
/// one-sided rows.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// (index, coefficient) pairs, sorted by index, no duplicates.
    pub coefs: Vec<(usize, f64)>,

    /// Lower bound (may be -inf).
    pub lb: f64,

    /// Upper bound (may be +inf).
    pub ub: f64,

    /// Optional name for debugging.
    pub name: Option<String>,
}

impl Row {
    /// Create a ranged row. Coefficients are sorted and duplicates summed.
    pub fn new(coefs: Vec<(usize, f64)>, lb: f64, ub: f64) -> Self {
        Self {
            coefs: canonicalize(coefs),
            lb,
            ub,
            name: None,
        }
    }

    /// `a^T x <= rhs`.
    pub fn le(coefs: Vec<(usize, f64)>, rhs: f64) -> Self {
        Self::new(coefs, f64::NEG_INFINITY, rhs)
    }

    /// `a^T x >= rhs`.
    pub fn ge(coefs: Vec<(usize, f64)>, rhs: f64) -> Self {
        Self::new(coefs, rhs, f64::INFINITY)
    }

    /// `a^T x == rhs`.
    pub fn eq(coefs: Vec<(usize, f64)>, rhs: f64) -> Self {
        Self::new(coefs, rhs, rhs)
    }

    /// Attach a name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Display name (falls back to the row position).
    pub fn label(&self, index: usize) -> String {
        self.name.clone().unwrap_or_else(|| format!("r{}", index))
    }

    /// Compute a^T x.
    pub fn activity(&self, x: &[f64]) -> f64 {
        self.coefs.iter().map(|&(j, a)| a * x[j]).sum()
    }

    /// Amount by which x violates the row (zero or positive).
    pub fn violation(&self, x: &[f64]) -> f64 {
        let act = self.activity(x);
        (self.lb - act).max(act - self.ub).max(0.0)
    }

    /// Check if row is violated by more than tolerance.
    pub fn is_violated(&self, x: &[f64], tol: f64) -> bool {
        self.violation(x) > tol
    }

    /// Whether the row is an equality.
    pub fn is_equality(&self) -> bool {
        self.lb == self.ub
    }

    /// Largest referenced index, if any.
    pub fn max_index(&self) -> Option<usize> {
        self.coefs.last().map(|&(j, _)| j)
    }

    /// Check if row has valid data (nonzero, finite coefficients, consistent bounds).
    pub fn is_valid(&self) -> bool {
        let has_nonzero = self.coefs.iter().any(|&(_, a)| a.abs() > 1e-12);
        let all_finite = self.coefs.iter().all(|&(_, a)| a.is_finite());
        let bounds_ok = !self.lb.is_nan()
            && !self.ub.is_nan()
            && self.lb <= self.ub
            && self.lb < f64::INFINITY
            && self.ub > f64::NEG_INFINITY;
        has_nonzero && all_finite && bounds_ok
    }

    /// Scale the row so that ||a||_inf = 1.
    pub fn normalize(&mut self) {
        let max_coef = self
            .coefs
            .iter()
            .map(|&(_, a)| a.abs())
            .fold(0.0_f64, f64::max);

        if max_coef > 1e-12 {
            for (_, a) in &mut self.coefs {
                *a /= max_coef;
            }
            self.lb /= max_coef;
            self.ub /= max_coef;
        }
    }
}

/// Sort by index, merge duplicates, drop explicit zeros.
pub(crate) fn canonicalize(mut coefs: Vec<(usize, f64)>) -> Vec<(usize, f64)> {
    coefs.sort_by_key(|&(j, _)| j);
    let mut out: Vec<(usize, f64)> = Vec::with_capacity(coefs.len());
    for (j, a) in coefs {
        match out.last_mut() {
            Some(last) if last.0 == j => last.1 += a,
            _ => out.push((j, a)),
        }
    }
    out.retain(|&(_, a)| a != 0.0);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_violation() {
        // x0 + x1 <= 1
        let row = Row::le(vec![(0, 1.0), (1, 1.0)], 1.0);

        assert!(!row.is_violated(&[0.5, 0.5], 1e-6));
        assert!(row.is_violated(&[0.6, 0.6], 1e-6));
        assert!((row.violation(&[0.6, 0.6]) - 0.2).abs() < 1e-10);

        // 1 <= x0 <= 2
        let ranged = Row::new(vec![(0, 1.0)], 1.0, 2.0);
        assert!((ranged.violation(&[0.25]) - 0.75).abs() < 1e-12);
        assert_eq!(ranged.violation(&[1.5]), 0.0);
    }

    #[test]
    fn test_canonical_coefficients() {
        let row = Row::eq(vec![(3, 1.0), (1, 2.0), (3, -1.0), (1, 0.5)], 0.0);
        assert_eq!(row.coefs, vec![(1, 2.5)]);
        assert!(row.is_equality());
        assert_eq!(row.max_index(), Some(1));
    }

    #[test]
    fn test_row_normalization() {
        let mut row = Row::le(vec![(0, 2.0), (1, 4.0)], 6.0);
        row.normalize();

        assert!((row.coefs[0].1 - 0.5).abs() < 1e-10);
        assert!((row.coefs[1].1 - 1.0).abs() < 1e-10);
        assert!((row.ub - 1.5).abs() < 1e-10);
        assert_eq!(row.lb, f64::NEG_INFINITY);
    }

    #[test]
    fn test_validity() {
        assert!(Row::ge(vec![(0, 1.0)], 0.0).is_valid());
        assert!(!Row::ge(vec![], 0.0).is_valid());
        assert!(!Row::new(vec![(0, 1.0)], 2.0, 1.0).is_valid());
        assert!(!Row::le(vec![(0, f64::NAN)], 1.0).is_valid());
    }
}
