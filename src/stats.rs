//! Single-pass terminal statistics.
//!
//! An [`Integrator`] owns a list of accumulators, updates every one of them
//! with each interval of a single pass over its source, and publishes one
//! scalar per accumulator on exhaustion. The interval weight is its length
//! in bases throughout. [`Pearson`] and [`NdPearson`] are the two-input
//! variants consuming a multiplexer and a multiset respectively.

use crate::error::{Result, SignalError};
use crate::interval::{Chrom, Interval};
use crate::multiplexer::Multiplexer;
use crate::multiset::Multiset;
use crate::signal::{Cursor, SignalIter};

/// Which scalar a single-input integrator computes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StatKind {
    Auc,
    Span,
    Mean,
    Max,
    Min,
    /// Sample variance (divides by N-1).
    Variance,
    StdDev,
    Cv,
    /// Squared magnitude of the DFT at one wavelength.
    Energy { wavelength: u32 },
}

/// Accumulator state for one statistic.
#[derive(Debug, Clone)]
pub enum StatAcc {
    Auc {
        total: f64,
    },
    Span {
        total: f64,
    },
    Mean {
        sum: f64,
        span: f64,
    },
    Max {
        best: f64,
    },
    Min {
        best: f64,
    },
    Variance {
        kind: StatKind,
        t: f64,
        sum: f64,
        count: f64,
    },
    Energy {
        wavelength: f64,
        real: f64,
        im: f64,
        offset: u64,
        last_chrom: Option<Chrom>,
        last_finish: u64,
    },
}

impl StatAcc {
    pub fn new(kind: StatKind) -> Self {
        match kind {
            StatKind::Auc => StatAcc::Auc { total: 0.0 },
            StatKind::Span => StatAcc::Span { total: 0.0 },
            StatKind::Mean => StatAcc::Mean { sum: 0.0, span: 0.0 },
            StatKind::Max => StatAcc::Max { best: f64::NAN },
            StatKind::Min => StatAcc::Min { best: f64::NAN },
            StatKind::Variance | StatKind::StdDev | StatKind::Cv => StatAcc::Variance {
                kind,
                t: 0.0,
                sum: 0.0,
                count: 0.0,
            },
            StatKind::Energy { wavelength } => StatAcc::Energy {
                wavelength: wavelength as f64,
                real: 0.0,
                im: 0.0,
                offset: 0,
                last_chrom: None,
                last_finish: 0,
            },
        }
    }

    pub fn update(&mut self, iv: &Interval) {
        let weight = iv.len() as f64;
        match self {
            StatAcc::Auc { total } => {
                if !iv.value.is_nan() {
                    *total += weight * iv.value;
                }
            }
            StatAcc::Span { total } => {
                if !iv.value.is_nan() {
                    *total += weight;
                }
            }
            StatAcc::Mean { sum, span } => {
                if !iv.value.is_nan() {
                    *sum += weight * iv.value;
                    *span += weight;
                }
            }
            StatAcc::Max { best } => {
                if !iv.value.is_nan() && (best.is_nan() || iv.value > *best) {
                    *best = iv.value;
                }
            }
            StatAcc::Min { best } => {
                if !iv.value.is_nan() && (best.is_nan() || iv.value < *best) {
                    *best = iv.value;
                }
            }
            StatAcc::Variance { t, sum, count, .. } => {
                if iv.value.is_nan() {
                    return;
                }
                weighted_variance_update(t, sum, count, iv.value, weight);
            }
            StatAcc::Energy {
                wavelength,
                real,
                im,
                offset,
                last_chrom,
                last_finish,
            } => {
                if last_chrom
                    .as_deref()
                    .is_some_and(|c| c != iv.chrom.as_ref())
                {
                    // Concatenate chromosomes: keep the phase running from
                    // the end of the previous one.
                    *offset += *last_finish;
                }
                *last_chrom = Some(iv.chrom.clone());
                *last_finish = iv.finish;
                let tau = 2.0 * std::f64::consts::PI / *wavelength;
                for p in (*offset + iv.start)..(*offset + iv.finish) {
                    let phase = -(p as f64) * tau;
                    *real += phase.cos() * iv.value;
                    *im += phase.sin() * iv.value;
                }
            }
        }
    }

    pub fn result(&self) -> f64 {
        match self {
            StatAcc::Auc { total } | StatAcc::Span { total } => *total,
            StatAcc::Mean { sum, span } => {
                if *span > 0.0 {
                    sum / span
                } else {
                    f64::NAN
                }
            }
            StatAcc::Max { best } | StatAcc::Min { best } => *best,
            StatAcc::Variance { kind, t, sum, count } => {
                if *count <= 1.0 {
                    return f64::NAN;
                }
                let var = t / (count - 1.0);
                match kind {
                    StatKind::Variance => var,
                    StatKind::StdDev => var.sqrt(),
                    _ => var.sqrt() / (sum / count),
                }
            }
            StatAcc::Energy { real, im, .. } => real * real + im * im,
        }
    }
}

/// One block of the Welford-Chan weighted update: fold a run of `weight`
/// bases at `value` into the running sum of squares about the mean.
#[inline]
fn weighted_variance_update(t: &mut f64, sum: &mut f64, count: &mut f64, value: f64, weight: f64) {
    if *count > 0.0 {
        let old_mean = *sum / *count;
        let new_mean = *sum / (*count + weight);
        let delta_t =
            old_mean * new_mean - new_mean * 2.0 * value + *count / (*count + weight) * value * value;
        *t += delta_t * weight;
    }
    *count += weight;
    *sum += weight * value;
}

/// A pass-through iterator feeding a list of accumulators.
///
/// The source streams through unchanged, so integrators compose with any
/// downstream consumer; once the source is exhausted, `results` holds one
/// scalar per requested statistic, in order.
pub struct Integrator {
    source: Cursor,
    accs: Vec<StatAcc>,
}

impl Integrator {
    pub fn new(source: Cursor, kinds: &[StatKind]) -> Self {
        Self {
            source,
            accs: kinds.iter().map(|&k| StatAcc::new(k)).collect(),
        }
    }

    pub fn results(&self) -> Vec<f64> {
        self.accs.iter().map(StatAcc::result).collect()
    }

    /// Drain the source and return the finished statistics.
    pub fn run(&mut self) -> Result<Vec<f64>> {
        while self.next_interval()?.is_some() {}
        Ok(self.results())
    }
}

impl SignalIter for Integrator {
    fn next_interval(&mut self) -> Result<Option<Interval>> {
        match self.source.take_head()? {
            Some(iv) => {
                for acc in &mut self.accs {
                    acc.update(&iv);
                }
                Ok(Some(iv))
            }
            None => Ok(None),
        }
    }

    fn seek(&mut self, chrom: &str, start: u64, finish: u64) -> Result<()> {
        self.source.seek(chrom, start, finish)
    }

    fn default_value(&self) -> f64 {
        self.source.default_value()
    }
}

/// Weighted Pearson correlation of a 2-wide multiplexer.
pub struct Pearson {
    multi: Multiplexer,
    count: f64,
    sum_x: f64,
    sum_y: f64,
    t_xx: f64,
    t_xy: f64,
    t_yy: f64,
}

impl Pearson {
    pub fn new(multi: Multiplexer) -> Result<Self> {
        if multi.count() != 2 {
            return Err(SignalError::Command(format!(
                "pearson needs exactly 2 inputs, got {}",
                multi.count()
            )));
        }
        Ok(Self {
            multi,
            count: 0.0,
            sum_x: 0.0,
            sum_y: 0.0,
            t_xx: 0.0,
            t_xy: 0.0,
            t_yy: 0.0,
        })
    }

    fn update(&mut self, x: f64, y: f64, weight: f64) {
        if self.count > 0.0 {
            let old_mean_x = self.sum_x / self.count;
            let new_mean_x = self.sum_x / (self.count + weight);
            let old_mean_y = self.sum_y / self.count;
            let new_mean_y = self.sum_y / (self.count + weight);
            let ratio = self.count / (self.count + weight);

            self.t_xy +=
                (new_mean_x * old_mean_y + ratio * x * y - new_mean_x * y - new_mean_y * x) * weight;
            self.t_xx += (new_mean_x * (old_mean_x - 2.0 * x) + ratio * x * x) * weight;
            self.t_yy += (new_mean_y * (old_mean_y - 2.0 * y) + ratio * y * y) * weight;
        }
        self.count += weight;
        self.sum_x += x * weight;
        self.sum_y += y * weight;
    }

    /// Drain the multiplexer and return the correlation; 0 when either
    /// side's sum of squares vanishes.
    pub fn run(&mut self) -> Result<f64> {
        while !self.multi.is_done() {
            let x = self.multi.value_or_default(0);
            let y = self.multi.value_or_default(1);
            let weight = self.multi.span() as f64;
            self.update(x, y, weight);
            self.multi.pop()?;
        }
        let denominator = self.t_xx * self.t_yy;
        if denominator != 0.0 && !denominator.is_nan() {
            Ok(self.t_xy / denominator.sqrt())
        } else {
            Ok(0.0)
        }
    }
}

/// N-dimensional Pearson correlation of two multisets of equal rank:
/// each aligned position contributes one R-vector sample per side, summed
/// over dimensions by the same pairwise update.
pub struct NdPearson {
    multi: Multiset,
    rank: usize,
    count: f64,
    sum_x: Vec<f64>,
    sum_y: Vec<f64>,
    t_xx: f64,
    t_xy: f64,
    t_yy: f64,
}

impl NdPearson {
    pub fn new(multi: Multiset) -> Result<Self> {
        if multi.count() != 2 {
            return Err(SignalError::Command(format!(
                "ndpearson needs exactly 2 sets, got {}",
                multi.count()
            )));
        }
        let rank = multi.group(0).count();
        if multi.group(1).count() != rank {
            return Err(SignalError::Command(format!(
                "ndpearson sets must have the same number of tracks, got {} and {}",
                rank,
                multi.group(1).count()
            )));
        }
        Ok(Self {
            multi,
            rank,
            count: 0.0,
            sum_x: vec![0.0; rank],
            sum_y: vec![0.0; rank],
            t_xx: 0.0,
            t_xy: 0.0,
            t_yy: 0.0,
        })
    }

    pub fn run(&mut self) -> Result<f64> {
        while !self.multi.is_done() {
            let weight = self.multi.span() as f64;
            let ratio = self.count / (self.count + weight);
            for dim in 0..self.rank {
                let x = self.multi.value_or_default(0, dim);
                let y = self.multi.value_or_default(1, dim);
                if self.count > 0.0 {
                    let old_mean_x = self.sum_x[dim] / self.count;
                    let new_mean_x = self.sum_x[dim] / (self.count + weight);
                    let old_mean_y = self.sum_y[dim] / self.count;
                    let new_mean_y = self.sum_y[dim] / (self.count + weight);

                    self.t_xy += (new_mean_x * old_mean_y + ratio * x * y
                        - new_mean_x * y
                        - new_mean_y * x)
                        * weight;
                    self.t_xx += (new_mean_x * (old_mean_x - 2.0 * x) + ratio * x * x) * weight;
                    self.t_yy += (new_mean_y * (old_mean_y - 2.0 * y) + ratio * y * y) * weight;
                }
                self.sum_x[dim] += x * weight;
                self.sum_y[dim] += y * weight;
            }
            self.count += weight;
            self.multi.pop()?;
        }
        let denominator = self.t_xx * self.t_yy;
        if denominator != 0.0 && !denominator.is_nan() {
            Ok(self.t_xy / denominator.sqrt())
        } else {
            Ok(0.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::multiplexer::testutil::mux;
    use crate::multiplexer::Multiplexer;
    use crate::multiset::Multiset;
    use crate::signal::testutil::cursor;

    fn run_stat(data: &[(&str, u64, u64, f64)], kind: StatKind) -> f64 {
        let mut integrator = Integrator::new(cursor(data), &[kind]);
        integrator.run().unwrap()[0]
    }

    #[test]
    fn test_auc() {
        let auc = run_stat(&[("chr1", 1, 4, 2.0), ("chr1", 10, 12, 3.0)], StatKind::Auc);
        assert_eq!(auc, 12.0);
    }

    #[test]
    fn test_auc_skips_nan() {
        let auc = run_stat(
            &[("chr1", 1, 4, 2.0), ("chr1", 5, 50, f64::NAN)],
            StatKind::Auc,
        );
        assert_eq!(auc, 6.0);
    }

    #[test]
    fn test_span() {
        let span = run_stat(
            &[("chr1", 1, 4, 2.0), ("chr1", 5, 8, f64::NAN), ("chr2", 1, 3, 0.0)],
            StatKind::Span,
        );
        assert_eq!(span, 5.0);
    }

    #[test]
    fn test_weighted_mean() {
        // 3 bases at 2 and 1 base at 6: (6 + 6) / 4.
        let mean = run_stat(&[("chr1", 1, 4, 2.0), ("chr1", 4, 5, 6.0)], StatKind::Mean);
        assert_eq!(mean, 3.0);
    }

    #[test]
    fn test_extrema_skip_nan() {
        let data = &[
            ("chr1", 1, 4, 2.0),
            ("chr1", 4, 6, f64::NAN),
            ("chr1", 6, 8, -5.0),
        ];
        assert_eq!(run_stat(data, StatKind::Max), 2.0);
        assert_eq!(run_stat(data, StatKind::Min), -5.0);
    }

    #[test]
    fn test_extrema_empty_is_nan() {
        assert!(run_stat(&[], StatKind::Max).is_nan());
    }

    #[test]
    fn test_sample_variance_matches_per_base() {
        // Bases: 2 2 2 5 5 -> mean 3.2, SS 10.8, sample variance 2.7.
        let var = run_stat(
            &[("chr1", 1, 4, 2.0), ("chr1", 4, 6, 5.0)],
            StatKind::Variance,
        );
        assert!((var - 2.7).abs() < 1e-9);

        let sd = run_stat(
            &[("chr1", 1, 4, 2.0), ("chr1", 4, 6, 5.0)],
            StatKind::StdDev,
        );
        assert!((sd - 2.7f64.sqrt()).abs() < 1e-9);

        let cv = run_stat(&[("chr1", 1, 4, 2.0), ("chr1", 4, 6, 5.0)], StatKind::Cv);
        assert!((cv - 2.7f64.sqrt() / 3.2).abs() < 1e-9);
    }

    #[test]
    fn test_variance_single_base_is_nan() {
        assert!(run_stat(&[("chr1", 1, 2, 4.0)], StatKind::Variance).is_nan());
    }

    #[test]
    fn test_energy_single_base_unit() {
        // One unit base: real^2 + im^2 = cos^2 + sin^2 = 1, any wavelength.
        let energy = run_stat(
            &[("chr1", 5, 6, 1.0)],
            StatKind::Energy { wavelength: 7 },
        );
        assert!((energy - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_energy_full_period_cancels() {
        // A constant signal over a full period sums to zero phase mass.
        let energy = run_stat(
            &[("chr1", 1, 9, 1.0)],
            StatKind::Energy { wavelength: 8 },
        );
        assert!(energy < 1e-18);
    }

    #[test]
    fn test_multiple_stats_single_pass() {
        let mut integrator = Integrator::new(
            cursor(&[("chr1", 1, 4, 2.0), ("chr1", 10, 12, 3.0)]),
            &[StatKind::Auc, StatKind::Mean, StatKind::Span],
        );
        let res = integrator.run().unwrap();
        assert_eq!(res, vec![12.0, 2.4, 5.0]);
    }

    fn pearson_of(a: &[(&str, u64, u64, f64)], b: &[(&str, u64, u64, f64)]) -> f64 {
        let multi = mux(&[a, b], false);
        Pearson::new(multi).unwrap().run().unwrap()
    }

    #[test]
    fn test_pearson_perfect_correlation() {
        let a = [("chr1", 1, 3, 1.0), ("chr1", 3, 5, 2.0)];
        let r = pearson_of(&a, &a);
        assert!((r - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_pearson_anti_correlation() {
        let a = [("chr1", 1, 3, 1.0), ("chr1", 3, 5, 2.0)];
        let b = [("chr1", 1, 3, 2.0), ("chr1", 3, 5, 1.0)];
        let r = pearson_of(&a, &b);
        assert!((r + 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_pearson_zero_denominator() {
        // A flat track has zero sum of squares about its mean.
        let a = [("chr1", 1, 5, 3.0)];
        let b = [("chr1", 1, 3, 1.0), ("chr1", 3, 5, 2.0)];
        assert_eq!(pearson_of(&a, &b), 0.0);
    }

    #[test]
    fn test_pearson_requires_two_inputs() {
        let multi: Multiplexer = mux(&[&[("chr1", 1, 3, 1.0)]], false);
        assert!(Pearson::new(multi).is_err());
    }

    #[test]
    fn test_ndpearson_identical_sets() {
        let a = mux(
            &[&[("chr1", 1, 3, 1.0), ("chr1", 3, 5, 4.0)], &[("chr1", 1, 5, 2.0)]],
            false,
        );
        let b = mux(
            &[&[("chr1", 1, 3, 1.0), ("chr1", 3, 5, 4.0)], &[("chr1", 1, 5, 2.0)]],
            false,
        );
        let set = Multiset::new(vec![a, b]).unwrap();
        let r = NdPearson::new(set).unwrap().run().unwrap();
        assert!((r - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_ndpearson_rank_mismatch() {
        let a = mux(&[&[("chr1", 1, 3, 1.0)]], false);
        let b = mux(&[&[("chr1", 1, 3, 1.0)], &[("chr1", 1, 3, 2.0)]], false);
        let set = Multiset::new(vec![a, b]).unwrap();
        assert!(NdPearson::new(set).is_err());
    }
}
