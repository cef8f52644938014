//! Reducers: collapse each multiplexer record into a single-valued
//! interval.
//!
//! A reducer reads the K aligned slots at every position (absent slots
//! contribute their input's default value), combines them with one rule,
//! and exposes the result as an ordinary signal stream. NaN absorbs through
//! every rule. The stream's own default value is the same rule applied to
//! the inputs' defaults.

use crate::error::{Result, SignalError};
use crate::interval::Interval;
use crate::multiplexer::Multiplexer;
use crate::signal::SignalIter;

/// The value-combining rule of a symmetric reducer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReduceOp {
    Sum,
    Product,
    Mean,
    Min,
    Max,
    /// Population variance (divides by K).
    Variance,
    StdDev,
    /// Bernoulli entropy of the positive-count fraction.
    Entropy,
    /// Coefficient of variation: stddev / mean.
    Cv,
    Median,
}

impl ReduceOp {
    /// Combine the K slot values. `vals` is scratch space and may be
    /// reordered.
    fn combine(self, vals: &mut [f64]) -> f64 {
        if vals.iter().any(|v| v.is_nan()) {
            return f64::NAN;
        }
        let k = vals.len() as f64;
        match self {
            ReduceOp::Sum => vals.iter().sum(),
            ReduceOp::Product => vals.iter().product(),
            ReduceOp::Mean => vals.iter().sum::<f64>() / k,
            ReduceOp::Min => vals.iter().cloned().fold(f64::INFINITY, f64::min),
            ReduceOp::Max => vals.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
            ReduceOp::Variance | ReduceOp::StdDev | ReduceOp::Cv => {
                if vals.len() < 2 {
                    return f64::NAN;
                }
                let mean = vals.iter().sum::<f64>() / k;
                let var = vals.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / k;
                match self {
                    ReduceOp::Variance => var,
                    ReduceOp::StdDev => var.sqrt(),
                    _ => {
                        if mean == 0.0 {
                            f64::NAN
                        } else {
                            var.sqrt() / mean
                        }
                    }
                }
            }
            ReduceOp::Entropy => {
                let positive = vals.iter().filter(|&&v| v > 0.0).count();
                if positive == 0 || positive == vals.len() {
                    0.0
                } else {
                    let p = positive as f64 / k;
                    -p * p.ln() - (1.0 - p) * (1.0 - p).ln()
                }
            }
            ReduceOp::Median => {
                vals.sort_unstable_by(|a, b| a.partial_cmp(b).expect("no NaN after check"));
                vals[vals.len() / 2]
            }
        }
    }
}

/// A symmetric reducer over a multiplexer.
pub struct Reduce {
    multi: Multiplexer,
    op: ReduceOp,
    default_value: f64,
    scratch: Vec<f64>,
}

impl Reduce {
    pub fn new(multi: Multiplexer, op: ReduceOp) -> Self {
        let mut defaults = multi.default_values().to_vec();
        let default_value = op.combine(&mut defaults);
        Self {
            multi,
            op,
            default_value,
            scratch: Vec::with_capacity(defaults.len()),
        }
    }
}

impl SignalIter for Reduce {
    fn next_interval(&mut self) -> Result<Option<Interval>> {
        if self.multi.is_done() {
            return Ok(None);
        }
        self.scratch.clear();
        for i in 0..self.multi.count() {
            self.scratch.push(self.multi.value_or_default(i));
        }
        let value = self.op.combine(&mut self.scratch);
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
        self.default_value
    }
}

/// Pass through one input's slot, skipping positions where it is absent.
pub struct Select {
    multi: Multiplexer,
    index: usize,
    default_value: f64,
}

impl Select {
    pub fn new(multi: Multiplexer, index: usize) -> Result<Self> {
        if index >= multi.count() {
            return Err(SignalError::Command(format!(
                "select index {index} out of range for {} inputs",
                multi.count()
            )));
        }
        let default_value = multi.default_values()[index];
        Ok(Self {
            multi,
            index,
            default_value,
        })
    }
}

impl SignalIter for Select {
    fn next_interval(&mut self) -> Result<Option<Interval>> {
        loop {
            if self.multi.is_done() {
                return Ok(None);
            }
            if !self.multi.inplay(self.index) {
                self.multi.pop()?;
                continue;
            }
            let iv = Interval::new(
                self.multi.chrom().clone(),
                self.multi.start(),
                self.multi.finish(),
                self.multi.values()[self.index],
            );
            self.multi.pop()?;
            return Ok(Some(iv));
        }
    }

    fn seek(&mut self, chrom: &str, start: u64, finish: u64) -> Result<()> {
        self.multi.seek(chrom, start, finish)
    }

    fn default_value(&self) -> f64 {
        self.default_value
    }
}

/// Two-input reducer: slot 0 is the region mask, slot 1 the data. Emits the
/// data value (or its default) across slot 0's support in trim mode, or
/// across every aligned position otherwise.
pub struct FillIn {
    multi: Multiplexer,
    trim: bool,
    default_value: f64,
}

impl FillIn {
    pub fn new(multi: Multiplexer, trim: bool) -> Result<Self> {
        if multi.count() != 2 {
            return Err(SignalError::Command(format!(
                "the fill-in operator needs exactly 2 inputs, got {}",
                multi.count()
            )));
        }
        let default_value = multi.default_values()[1];
        Ok(Self {
            multi,
            trim,
            default_value,
        })
    }
}

impl SignalIter for FillIn {
    fn next_interval(&mut self) -> Result<Option<Interval>> {
        if self.multi.is_done() {
            return Ok(None);
        }
        if self.trim {
            while !self.multi.inplay(0) {
                self.multi.pop()?;
                if self.multi.is_done() {
                    return Ok(None);
                }
            }
        }
        let iv = Interval::new(
            self.multi.chrom().clone(),
            self.multi.start(),
            self.multi.finish(),
            self.multi.value_or_default(1),
        );
        self.multi.pop()?;
        Ok(Some(iv))
    }

    fn seek(&mut self, chrom: &str, start: u64, finish: u64) -> Result<()> {
        self.multi.seek(chrom, start, finish)
    }

    fn default_value(&self) -> f64 {
        self.default_value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::multiplexer::testutil::mux;
    use crate::signal::Cursor;

    fn reduce(inputs: &[&[(&str, u64, u64, f64)]], op: ReduceOp) -> Vec<Interval> {
        reduce_strict(inputs, op, false)
    }

    fn reduce_strict(
        inputs: &[&[(&str, u64, u64, f64)]],
        op: ReduceOp,
        strict: bool,
    ) -> Vec<Interval> {
        Cursor::from_iter(Reduce::new(mux(inputs, strict), op))
            .unwrap()
            .drain()
            .unwrap()
    }

    #[test]
    fn test_sum_alignment() {
        let out = reduce(&[&[("chr1", 1, 5, 2.0)], &[("chr1", 3, 7, 3.0)]], ReduceOp::Sum);
        assert_eq!(out, vec![
            Interval::new("chr1", 1, 3, 2.0),
            Interval::new("chr1", 3, 5, 5.0),
            Interval::new("chr1", 5, 7, 3.0),
        ]);
    }

    #[test]
    fn test_product_with_defaults() {
        let out = reduce(
            &[&[("chr1", 1, 10, 4.0)], &[("chr1", 5, 8, 0.5)]],
            ReduceOp::Product,
        );
        assert_eq!(out, vec![
            Interval::new("chr1", 1, 5, 0.0),
            Interval::new("chr1", 5, 8, 2.0),
            Interval::new("chr1", 8, 10, 0.0),
        ]);
    }

    #[test]
    fn test_product_strict() {
        let out = reduce_strict(
            &[&[("chr1", 1, 10, 4.0)], &[("chr1", 5, 8, 0.5)]],
            ReduceOp::Product,
            true,
        );
        assert_eq!(out, vec![Interval::new("chr1", 5, 8, 2.0)]);
    }

    #[test]
    fn test_mean() {
        let out = reduce(
            &[
                &[("chr1", 1, 3, 2.0), ("chr1", 3, 5, 4.0)],
                &[("chr1", 1, 5, 8.0)],
            ],
            ReduceOp::Mean,
        );
        assert_eq!(out, vec![
            Interval::new("chr1", 1, 3, 5.0),
            Interval::new("chr1", 3, 5, 6.0),
        ]);
    }

    #[test]
    fn test_min_mean_max_pointwise_order() {
        let inputs: &[&[(&str, u64, u64, f64)]] = &[
            &[("chr1", 1, 6, 2.0)],
            &[("chr1", 2, 8, 7.0)],
            &[("chr1", 4, 9, -1.0)],
        ];
        let mins = reduce(inputs, ReduceOp::Min);
        let means = reduce(inputs, ReduceOp::Mean);
        let maxs = reduce(inputs, ReduceOp::Max);
        for ((lo, mid), hi) in mins.iter().zip(&means).zip(&maxs) {
            assert!(lo.value <= mid.value);
            assert!(mid.value <= hi.value);
        }
    }

    #[test]
    fn test_singleton_reducers_are_identity() {
        let data: &[&[(&str, u64, u64, f64)]] = &[&[("chr1", 1, 5, 3.5), ("chr1", 7, 9, -2.0)]];
        for op in [
            ReduceOp::Sum,
            ReduceOp::Product,
            ReduceOp::Mean,
            ReduceOp::Min,
            ReduceOp::Max,
            ReduceOp::Median,
        ] {
            let out = reduce(data, op);
            assert_eq!(out, vec![
                Interval::new("chr1", 1, 5, 3.5),
                Interval::new("chr1", 7, 9, -2.0),
            ]);
        }
    }

    #[test]
    fn test_variance_divides_by_k() {
        // Values 2 and 4: population variance is 1, not 2.
        let out = reduce(
            &[&[("chr1", 1, 5, 2.0)], &[("chr1", 1, 5, 4.0)]],
            ReduceOp::Variance,
        );
        assert_eq!(out[0].value, 1.0);
    }

    #[test]
    fn test_stddev_and_cv() {
        let out = reduce(
            &[&[("chr1", 1, 5, 2.0)], &[("chr1", 1, 5, 4.0)]],
            ReduceOp::StdDev,
        );
        assert_eq!(out[0].value, 1.0);

        let out = reduce(
            &[&[("chr1", 1, 5, 2.0)], &[("chr1", 1, 5, 4.0)]],
            ReduceOp::Cv,
        );
        assert!((out[0].value - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_cv_zero_mean_is_nan() {
        let out = reduce(
            &[&[("chr1", 1, 5, 2.0)], &[("chr1", 1, 5, -2.0)]],
            ReduceOp::Cv,
        );
        assert!(out[0].value.is_nan());
    }

    #[test]
    fn test_entropy_edges_and_mixed() {
        // All positive -> 0.
        let out = reduce(
            &[&[("chr1", 1, 5, 1.0)], &[("chr1", 1, 5, 2.0)]],
            ReduceOp::Entropy,
        );
        assert_eq!(out[0].value, 0.0);

        // One of two positive -> ln 2.
        let out = reduce(
            &[&[("chr1", 1, 5, 1.0)], &[("chr1", 1, 5, 0.0)]],
            ReduceOp::Entropy,
        );
        assert!((out[0].value - std::f64::consts::LN_2).abs() < 1e-12);
    }

    #[test]
    fn test_median_picks_upper_middle() {
        let out = reduce(
            &[
                &[("chr1", 1, 5, 1.0)],
                &[("chr1", 1, 5, 9.0)],
                &[("chr1", 1, 5, 4.0)],
                &[("chr1", 1, 5, 6.0)],
            ],
            ReduceOp::Median,
        );
        // Sorted: 1 4 6 9; index 4/2 = 2 -> 6.
        assert_eq!(out[0].value, 6.0);
    }

    #[test]
    fn test_nan_absorbs() {
        let out = reduce(
            &[&[("chr1", 1, 5, f64::NAN)], &[("chr1", 1, 5, 4.0)]],
            ReduceOp::Sum,
        );
        assert!(out[0].value.is_nan());
    }

    #[test]
    fn test_select_skips_absent() {
        let m = mux(&[&[("chr1", 1, 5, 2.0)], &[("chr1", 3, 7, 3.0)]], false);
        let mut s = Cursor::from_iter(Select::new(m, 1).unwrap()).unwrap();
        let out = s.drain().unwrap();
        assert_eq!(out, vec![
            Interval::new("chr1", 3, 5, 3.0),
            Interval::new("chr1", 5, 7, 3.0),
        ]);
    }

    #[test]
    fn test_fill_in_trim() {
        let m = mux(
            &[&[("chr1", 10, 20, 1.0)], &[("chr1", 12, 15, 5.0)]],
            false,
        );
        let mut s = Cursor::from_iter(FillIn::new(m, true).unwrap()).unwrap();
        let out = s.drain().unwrap();
        assert_eq!(out, vec![
            Interval::new("chr1", 10, 12, 0.0),
            Interval::new("chr1", 12, 15, 5.0),
            Interval::new("chr1", 15, 20, 0.0),
        ]);
    }

    #[test]
    fn test_fill_in_requires_two_inputs() {
        let m = mux(&[&[("chr1", 1, 5, 1.0)]], false);
        assert!(FillIn::new(m, false).is_err());
    }
}
