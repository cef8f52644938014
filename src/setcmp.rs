//! Two-sample tests over a two-group multiset.
//!
//! Each test emits, at every position where all groups have at least one
//! iterator in play, an approximate two-sided p-value comparing the groups'
//! value vectors (absent slots contribute their input's default). Positions
//! with too few samples, zero variance or NaN values emit NaN.

use statrs::distribution::{ContinuousCDF, FisherSnedecor, Normal, StudentsT};

use crate::error::{Result, SignalError};
use crate::interval::Interval;
use crate::multiset::Multiset;
use crate::signal::SignalIter;

/// Collect one group's slot values; `None` when any value is NaN.
fn group_values(multi: &Multiset, g: usize) -> Option<Vec<f64>> {
    let values: Vec<f64> = (0..multi.group(g).count())
        .map(|i| multi.value_or_default(g, i))
        .collect();
    if values.iter().any(|v| v.is_nan()) {
        None
    } else {
        Some(values)
    }
}

/// Mean and population variance (divides by N) of one group's values.
fn mean_and_population_var(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let ss = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>();
    (mean, ss / n)
}

/// Advance the multiset to the next position where every group is in play.
/// Returns false once the multiset is exhausted.
fn align_groups(multi: &mut Multiset) -> Result<bool> {
    loop {
        if multi.is_done() {
            return Ok(false);
        }
        if (0..multi.count()).all(|g| multi.inplay(g)) {
            return Ok(true);
        }
        multi.pop()?;
    }
}

/// Welch's unequal-variances t-test.
pub struct TTest {
    multi: Multiset,
}

impl TTest {
    pub fn new(multi: Multiset) -> Result<Self> {
        if multi.count() != 2 {
            return Err(SignalError::Command(format!(
                "the t-test needs exactly 2 sets, got {}",
                multi.count()
            )));
        }
        if multi.group(0).count() < 3 || multi.group(1).count() < 3 {
            return Err(SignalError::Command(
                "the t-test needs at least 3 tracks per set to estimate variance".to_string(),
            ));
        }
        Ok(Self { multi })
    }

    fn p_value(&self) -> f64 {
        let (Some(a), Some(b)) = (group_values(&self.multi, 0), group_values(&self.multi, 1))
        else {
            return f64::NAN;
        };
        let (n1, n2) = (a.len() as f64, b.len() as f64);
        let (mean1, var1) = mean_and_population_var(&a);
        let (mean2, var2) = mean_and_population_var(&b);
        if var1 + var2 == 0.0 {
            return f64::NAN;
        }

        let se = var1 / n1 + var2 / n2;
        let t = (mean1 - mean2).abs() / se.sqrt();

        // Welch-Satterthwaite degrees of freedom.
        let nu = se * se
            / (var1 * var1 / (n1 * n1 * (n1 - 1.0)) + var2 * var2 / (n2 * n2 * (n2 - 1.0)));

        match StudentsT::new(0.0, 1.0, nu) {
            Ok(dist) => 2.0 * (1.0 - dist.cdf(t)),
            Err(_) => f64::NAN,
        }
    }
}

impl SignalIter for TTest {
    fn next_interval(&mut self) -> Result<Option<Interval>> {
        if !align_groups(&mut self.multi)? {
            return Ok(None);
        }
        let iv = Interval::new(
            self.multi.chrom().clone(),
            self.multi.start(),
            self.multi.finish(),
            self.p_value(),
        );
        self.multi.pop()?;
        Ok(Some(iv))
    }

    fn seek(&mut self, chrom: &str, start: u64, finish: u64) -> Result<()> {
        self.multi.seek(chrom, start, finish)
    }

    fn default_value(&self) -> f64 {
        f64::NAN
    }
}

/// One-way analysis-of-variance F-test across the groups.
pub struct FTest {
    multi: Multiset,
}

impl FTest {
    pub fn new(multi: Multiset) -> Result<Self> {
        let groups = multi.count();
        if groups < 2 {
            return Err(SignalError::Command(
                "the F-test needs at least 2 sets".to_string(),
            ));
        }
        let total: usize = (0..groups).map(|g| multi.group(g).count()).sum();
        if total <= groups {
            return Err(SignalError::Command(
                "the F-test needs more tracks than sets".to_string(),
            ));
        }
        Ok(Self { multi })
    }

    fn p_value(&self) -> f64 {
        let groups = self.multi.count();
        let mut all: Vec<Vec<f64>> = Vec::with_capacity(groups);
        for g in 0..groups {
            match group_values(&self.multi, g) {
                Some(values) => all.push(values),
                None => return f64::NAN,
            }
        }
        let total: usize = all.iter().map(Vec::len).sum();
        let grand = all.iter().flatten().sum::<f64>() / total as f64;

        let mut between = 0.0;
        let mut within = 0.0;
        for values in &all {
            let n = values.len() as f64;
            let mean = values.iter().sum::<f64>() / n;
            between += n * (mean - grand) * (mean - grand);
            within += values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>();
        }

        let df_between = (groups - 1) as f64;
        let df_within = (total - groups) as f64;
        let ms_within = within / df_within;
        if ms_within == 0.0 {
            return f64::NAN;
        }
        let f = (between / df_between) / ms_within;

        match FisherSnedecor::new(df_between, df_within) {
            Ok(dist) => 2.0 * (1.0 - dist.cdf(f)),
            Err(_) => f64::NAN,
        }
    }
}

impl SignalIter for FTest {
    fn next_interval(&mut self) -> Result<Option<Interval>> {
        if !align_groups(&mut self.multi)? {
            return Ok(None);
        }
        let iv = Interval::new(
            self.multi.chrom().clone(),
            self.multi.start(),
            self.multi.finish(),
            self.p_value(),
        );
        self.multi.pop()?;
        Ok(Some(iv))
    }

    fn seek(&mut self, chrom: &str, start: u64, finish: u64) -> Result<()> {
        self.multi.seek(chrom, start, finish)
    }

    fn default_value(&self) -> f64 {
        f64::NAN
    }
}

/// Mann-Whitney U (Wilcoxon rank-sum) with average-rank ties and the
/// normal approximation.
pub struct MannWhitney {
    multi: Multiset,
    table: Vec<(f64, bool)>,
    mu: f64,
    sigma: f64,
}

impl MannWhitney {
    pub fn new(multi: Multiset) -> Result<Self> {
        if multi.count() != 2 {
            return Err(SignalError::Command(format!(
                "the Mann-Whitney U test needs exactly 2 sets, got {}",
                multi.count()
            )));
        }
        let n1 = multi.group(0).count();
        let n2 = multi.group(1).count();
        if n1 == 0 || n2 == 0 {
            return Err(SignalError::Command(
                "the Mann-Whitney U test needs two non-empty sets".to_string(),
            ));
        }
        let (n1f, n2f) = (n1 as f64, n2 as f64);
        Ok(Self {
            multi,
            table: Vec::with_capacity(n1 + n2),
            mu: n1f * n2f / 2.0,
            sigma: (n1f * n2f * (n1f + n2f + 1.0) / 12.0).sqrt(),
        })
    }

    fn p_value(&mut self) -> f64 {
        let (Some(a), Some(b)) = (group_values(&self.multi, 0), group_values(&self.multi, 1))
        else {
            return f64::NAN;
        };
        let n1 = a.len() as f64;

        self.table.clear();
        self.table.extend(a.iter().map(|&v| (v, false)));
        self.table.extend(b.iter().map(|&v| (v, true)));
        self.table
            .sort_unstable_by(|x, y| x.0.partial_cmp(&y.0).expect("no NaN after check"));

        // Rank sum of the first group, ties averaged.
        let mut r1 = 0.0;
        let mut index = 0;
        while index < self.table.len() {
            let mut run_end = index + 1;
            while run_end < self.table.len() && self.table[run_end].0 == self.table[index].0 {
                run_end += 1;
            }
            // Ranks are 1-based: positions index..run_end share the mean.
            let rank = (index + 1 + run_end) as f64 / 2.0;
            let group1_in_run = self.table[index..run_end]
                .iter()
                .filter(|(_, second)| !second)
                .count() as f64;
            r1 += rank * group1_in_run;
            index = run_end;
        }

        let u1 = r1 - n1 * (n1 + 1.0) / 2.0;
        if self.sigma == 0.0 {
            return f64::NAN;
        }
        let z = (u1 - self.mu).abs() / self.sigma;
        match Normal::new(0.0, 1.0) {
            Ok(dist) => 2.0 * (1.0 - dist.cdf(z)),
            Err(_) => f64::NAN,
        }
    }
}

impl SignalIter for MannWhitney {
    fn next_interval(&mut self) -> Result<Option<Interval>> {
        if !align_groups(&mut self.multi)? {
            return Ok(None);
        }
        let value = self.p_value();
        let iv = Interval::new(
            self.multi.chrom().clone(),
            self.multi.start(),
            self.multi.finish(),
            value,
        );
        self.multi.pop()?;
        Ok(Some(iv))
    }

    fn seek(&mut self, chrom: &str, start: u64, finish: u64) -> Result<()> {
        self.multi.seek(chrom, start, finish)
    }

    fn default_value(&self) -> f64 {
        f64::NAN
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::multiplexer::testutil::mux;
    use crate::signal::Cursor;

    fn two_sets(
        a: &[&[(&str, u64, u64, f64)]],
        b: &[&[(&str, u64, u64, f64)]],
    ) -> Multiset {
        Multiset::new(vec![mux(a, false), mux(b, false)]).unwrap()
    }

    #[test]
    fn test_ttest_identical_groups() {
        let set = two_sets(
            &[
                &[("chr1", 1, 5, 2.0)],
                &[("chr1", 1, 5, 4.0)],
                &[("chr1", 1, 5, 6.0)],
            ],
            &[
                &[("chr1", 1, 5, 2.0)],
                &[("chr1", 1, 5, 4.0)],
                &[("chr1", 1, 5, 6.0)],
            ],
        );
        let mut t = Cursor::from_iter(TTest::new(set).unwrap()).unwrap();
        let out = t.drain().unwrap();
        // Equal means: t = 0, p = 1.
        assert!((out[0].value - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_ttest_pinned_p_value() {
        // Groups {1,2,3} and {2,3,4}: population variances 2/3, standard
        // error 2/3, t = 1.5, Welch-Satterthwaite nu = 4, and
        // 2(1 - CDF_t(1.5, 4)) = 0.208 exactly.
        let set = two_sets(
            &[
                &[("chr1", 1, 5, 1.0)],
                &[("chr1", 1, 5, 2.0)],
                &[("chr1", 1, 5, 3.0)],
            ],
            &[
                &[("chr1", 1, 5, 2.0)],
                &[("chr1", 1, 5, 3.0)],
                &[("chr1", 1, 5, 4.0)],
            ],
        );
        let mut t = Cursor::from_iter(TTest::new(set).unwrap()).unwrap();
        let out = t.drain().unwrap();
        assert!((out[0].value - 0.208).abs() < 1e-6);
    }

    #[test]
    fn test_ttest_separated_groups() {
        let set = two_sets(
            &[
                &[("chr1", 1, 5, 1.0)],
                &[("chr1", 1, 5, 1.1)],
                &[("chr1", 1, 5, 0.9)],
            ],
            &[
                &[("chr1", 1, 5, 9.0)],
                &[("chr1", 1, 5, 9.1)],
                &[("chr1", 1, 5, 8.9)],
            ],
        );
        let mut t = Cursor::from_iter(TTest::new(set).unwrap()).unwrap();
        let out = t.drain().unwrap();
        assert!(out[0].value < 0.01);
    }

    #[test]
    fn test_ttest_zero_variance_is_nan() {
        let set = two_sets(
            &[
                &[("chr1", 1, 5, 2.0)],
                &[("chr1", 1, 5, 2.0)],
                &[("chr1", 1, 5, 2.0)],
            ],
            &[
                &[("chr1", 1, 5, 5.0)],
                &[("chr1", 1, 5, 5.0)],
                &[("chr1", 1, 5, 5.0)],
            ],
        );
        let mut t = Cursor::from_iter(TTest::new(set).unwrap()).unwrap();
        assert!(t.drain().unwrap()[0].value.is_nan());
    }

    #[test]
    fn test_ttest_requires_three_tracks_per_set() {
        let set = two_sets(
            &[&[("chr1", 1, 5, 2.0)], &[("chr1", 1, 5, 3.0)]],
            &[&[("chr1", 1, 5, 5.0)], &[("chr1", 1, 5, 6.0)]],
        );
        assert!(TTest::new(set).is_err());
    }

    #[test]
    fn test_ttest_skips_one_sided_positions() {
        // Group 1 only covers [1,5); group 2 only [10,15). No position has
        // both groups in play, so the output is empty.
        let set = two_sets(
            &[
                &[("chr1", 1, 5, 1.0)],
                &[("chr1", 1, 5, 2.0)],
                &[("chr1", 1, 5, 3.0)],
            ],
            &[
                &[("chr1", 10, 15, 3.0)],
                &[("chr1", 10, 15, 4.0)],
                &[("chr1", 10, 15, 5.0)],
            ],
        );
        let mut t = Cursor::from_iter(TTest::new(set).unwrap()).unwrap();
        assert!(t.drain().unwrap().is_empty());
    }

    #[test]
    fn test_ftest_equal_means_formula_edge() {
        let set = two_sets(
            &[&[("chr1", 1, 5, 1.0)], &[("chr1", 1, 5, 3.0)]],
            &[&[("chr1", 1, 5, 1.0)], &[("chr1", 1, 5, 3.0)]],
        );
        let mut f = Cursor::from_iter(FTest::new(set).unwrap()).unwrap();
        let out = f.drain().unwrap();
        // F = 0 at equal group means; the emitted value is 2(1 - CDF(0)).
        assert!((out[0].value - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_ftest_separated_groups() {
        let set = two_sets(
            &[
                &[("chr1", 1, 5, 1.0)],
                &[("chr1", 1, 5, 1.2)],
                &[("chr1", 1, 5, 0.8)],
            ],
            &[
                &[("chr1", 1, 5, 20.0)],
                &[("chr1", 1, 5, 20.2)],
                &[("chr1", 1, 5, 19.8)],
            ],
        );
        let mut f = Cursor::from_iter(FTest::new(set).unwrap()).unwrap();
        assert!(f.drain().unwrap()[0].value < 0.01);
    }

    #[test]
    fn test_mwu_identical_groups() {
        let set = two_sets(
            &[&[("chr1", 1, 5, 1.0)], &[("chr1", 1, 5, 2.0)]],
            &[&[("chr1", 1, 5, 1.0)], &[("chr1", 1, 5, 2.0)]],
        );
        let mut m = Cursor::from_iter(MannWhitney::new(set).unwrap()).unwrap();
        let out = m.drain().unwrap();
        // U = mu under perfect symmetry (ties averaged), so p = 1.
        assert!((out[0].value - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_mwu_separated_groups() {
        let set = two_sets(
            &[
                &[("chr1", 1, 5, 1.0)],
                &[("chr1", 1, 5, 2.0)],
                &[("chr1", 1, 5, 3.0)],
            ],
            &[
                &[("chr1", 1, 5, 10.0)],
                &[("chr1", 1, 5, 11.0)],
                &[("chr1", 1, 5, 12.0)],
            ],
        );
        let mut m = Cursor::from_iter(MannWhitney::new(set).unwrap()).unwrap();
        let out = m.drain().unwrap();
        assert!(out[0].value < 0.1);
    }

    #[test]
    fn test_mwu_nan_propagates() {
        let set = two_sets(
            &[&[("chr1", 1, 5, f64::NAN)], &[("chr1", 1, 5, 2.0)]],
            &[&[("chr1", 1, 5, 1.0)], &[("chr1", 1, 5, 2.0)]],
        );
        let mut m = Cursor::from_iter(MannWhitney::new(set).unwrap()).unwrap();
        assert!(m.drain().unwrap()[0].value.is_nan());
    }
}
