//! Per-interval transforms over a single upstream stream.
//!
//! Each operator consumes its upstream through a [`Cursor`] and emits
//! intervals with the same coordinates and a transformed value (or, for the
//! coordinate operators, transformed coordinates and the same value). The
//! `default_value` of the output is the input's default passed through the
//! same value rule, and NaN absorbs through every arithmetic rule.

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::config::PipelineOptions;
use crate::error::{Result, SignalError};
use crate::interval::{Chrom, Interval};
use crate::signal::{Cursor, SignalIter};

/// Sign of a value: -1, 0 or 1; NaN absorbs.
#[inline]
fn sign(v: f64) -> f64 {
    if v.is_nan() {
        f64::NAN
    } else if v > 0.0 {
        1.0
    } else if v < 0.0 {
        -1.0
    } else {
        0.0
    }
}

//////////////////////////////////////////////////////
// Value transforms
//////////////////////////////////////////////////////

/// Multiply every value by a constant.
pub struct Scale {
    source: Cursor,
    factor: f64,
    default_value: f64,
}

impl Scale {
    pub fn new(source: Cursor, factor: f64) -> Self {
        let default_value = source.default_value() * factor;
        Self {
            source,
            factor,
            default_value,
        }
    }
}

impl SignalIter for Scale {
    fn next_interval(&mut self) -> Result<Option<Interval>> {
        Ok(self.source.take_head()?.map(|mut iv| {
            iv.value *= self.factor;
            iv
        }))
    }

    fn seek(&mut self, chrom: &str, start: u64, finish: u64) -> Result<()> {
        self.source.seek(chrom, start, finish)
    }

    fn default_value(&self) -> f64 {
        self.default_value
    }

    fn overlaps(&self) -> bool {
        self.source.overlaps()
    }
}

/// Add a constant to every value.
pub struct Offset {
    source: Cursor,
    offset: f64,
    default_value: f64,
}

impl Offset {
    pub fn new(source: Cursor, offset: f64) -> Self {
        let default_value = source.default_value() + offset;
        Self {
            source,
            offset,
            default_value,
        }
    }
}

impl SignalIter for Offset {
    fn next_interval(&mut self) -> Result<Option<Interval>> {
        Ok(self.source.take_head()?.map(|mut iv| {
            iv.value += self.offset;
            iv
        }))
    }

    fn seek(&mut self, chrom: &str, start: u64, finish: u64) -> Result<()> {
        self.source.seek(chrom, start, finish)
    }

    fn default_value(&self) -> f64 {
        self.default_value
    }

    fn overlaps(&self) -> bool {
        self.source.overlaps()
    }
}

/// How a [`MapValue`] operator transforms each value.
#[derive(Debug, Clone, Copy)]
pub enum ValueFn {
    Abs,
    Floor,
    /// Truncation toward zero.
    ToInt,
    /// Sign in {-1, 0, 1}.
    Unit,
    /// log(v) / ln(base); NaN when v <= 0.
    Log { base_log: f64 },
    /// base^v.
    Exp { base_log: f64 },
    /// v^k; NaN when v <= 0 and k < 0.
    Pow { exponent: f64 },
}

impl ValueFn {
    pub fn natural_log() -> Self {
        ValueFn::Log { base_log: 1.0 }
    }

    pub fn log(base: f64) -> Self {
        ValueFn::Log {
            base_log: base.ln(),
        }
    }

    pub fn natural_exp() -> Self {
        ValueFn::Exp { base_log: 1.0 }
    }

    pub fn exp(base: f64) -> Self {
        ValueFn::Exp {
            base_log: base.ln(),
        }
    }

    fn apply(self, v: f64) -> f64 {
        match self {
            ValueFn::Abs => v.abs(),
            ValueFn::Floor => v.floor(),
            ValueFn::ToInt => v.trunc(),
            ValueFn::Unit => sign(v),
            ValueFn::Log { base_log } => {
                if v <= 0.0 || v.is_nan() {
                    f64::NAN
                } else {
                    v.ln() / base_log
                }
            }
            ValueFn::Exp { base_log } => (v * base_log).exp(),
            ValueFn::Pow { exponent } => {
                if v.is_nan() || (v <= 0.0 && exponent < 0.0) {
                    f64::NAN
                } else {
                    v.powf(exponent)
                }
            }
        }
    }

    /// Default propagation: the same rule as the value, except unit, whose
    /// gaps are by definition signless.
    fn apply_default(self, d: f64) -> f64 {
        match self {
            ValueFn::Unit => 0.0,
            _ => self.apply(d),
        }
    }
}

/// Apply a [`ValueFn`] to every value.
pub struct MapValue {
    source: Cursor,
    f: ValueFn,
    default_value: f64,
}

impl MapValue {
    pub fn new(source: Cursor, f: ValueFn) -> Self {
        let default_value = f.apply_default(source.default_value());
        Self {
            source,
            f,
            default_value,
        }
    }
}

impl SignalIter for MapValue {
    fn next_interval(&mut self) -> Result<Option<Interval>> {
        Ok(self.source.take_head()?.map(|mut iv| {
            iv.value = self.f.apply(iv.value);
            iv
        }))
    }

    fn seek(&mut self, chrom: &str, start: u64, finish: u64) -> Result<()> {
        self.source.seek(chrom, start, finish)
    }

    fn default_value(&self) -> f64 {
        self.default_value
    }

    fn overlaps(&self) -> bool {
        self.source.overlaps()
    }
}

/// Replace the stream's default value, leaving intervals untouched.
pub struct DefaultValue {
    source: Cursor,
    default_value: f64,
}

impl DefaultValue {
    pub fn new(source: Cursor, default_value: f64) -> Self {
        Self {
            source,
            default_value,
        }
    }
}

impl SignalIter for DefaultValue {
    fn next_interval(&mut self) -> Result<Option<Interval>> {
        self.source.take_head()
    }

    fn seek(&mut self, chrom: &str, start: u64, finish: u64) -> Result<()> {
        self.source.seek(chrom, start, finish)
    }

    fn default_value(&self) -> f64 {
        self.default_value
    }

    fn overlaps(&self) -> bool {
        self.source.overlaps()
    }
}

//////////////////////////////////////////////////////
// Threshold filters
//////////////////////////////////////////////////////

/// Comparison used by [`Filter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Gt,
    Gte,
    Lt,
    Lte,
}

impl FilterOp {
    fn keeps(self, v: f64, threshold: f64) -> bool {
        if v.is_nan() {
            return false;
        }
        match self {
            FilterOp::Gt => v > threshold,
            FilterOp::Gte => v >= threshold,
            FilterOp::Lt => v < threshold,
            FilterOp::Lte => v <= threshold,
        }
    }
}

/// Pass intervals whose value survives a threshold test; gaps default to 0.
pub struct Filter {
    source: Cursor,
    op: FilterOp,
    threshold: f64,
}

impl Filter {
    pub fn new(source: Cursor, op: FilterOp, threshold: f64) -> Self {
        Self {
            source,
            op,
            threshold,
        }
    }
}

impl SignalIter for Filter {
    fn next_interval(&mut self) -> Result<Option<Interval>> {
        while let Some(iv) = self.source.take_head()? {
            if self.op.keeps(iv.value, self.threshold) {
                return Ok(Some(iv));
            }
        }
        Ok(None)
    }

    fn seek(&mut self, chrom: &str, start: u64, finish: u64) -> Result<()> {
        self.source.seek(chrom, start, finish)
    }

    fn default_value(&self) -> f64 {
        0.0
    }

    fn overlaps(&self) -> bool {
        self.source.overlaps()
    }
}

/// Pass the stream through, failing on the first non-zero value.
pub struct IsZero {
    source: Cursor,
}

impl IsZero {
    pub fn new(source: Cursor) -> Self {
        Self { source }
    }
}

impl SignalIter for IsZero {
    fn next_interval(&mut self) -> Result<Option<Interval>> {
        match self.source.take_head()? {
            Some(iv) => {
                if iv.value != 0.0 {
                    return Err(SignalError::NonZero {
                        chrom: iv.chrom.to_string(),
                        start: iv.start,
                        value: iv.value,
                    });
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

    fn overlaps(&self) -> bool {
        self.source.overlaps()
    }
}

//////////////////////////////////////////////////////
// Coordinate transforms
//////////////////////////////////////////////////////

/// Expand every interval by a margin on each side, clamped at position 1.
///
/// Expansion can make previously disjoint intervals overlap, so the output
/// advertises `overlaps = true`.
pub struct Extend {
    source: Cursor,
    margin: u64,
}

impl Extend {
    pub fn new(source: Cursor, margin: u64) -> Self {
        Self { source, margin }
    }
}

impl SignalIter for Extend {
    fn next_interval(&mut self) -> Result<Option<Interval>> {
        Ok(self.source.take_head()?.map(|mut iv| {
            iv.start = iv.start.saturating_sub(self.margin).max(1);
            iv.finish += self.margin;
            iv
        }))
    }

    fn seek(&mut self, chrom: &str, start: u64, finish: u64) -> Result<()> {
        self.source.seek(chrom, start, finish)
    }

    fn default_value(&self) -> f64 {
        self.source.default_value()
    }

    fn overlaps(&self) -> bool {
        true
    }
}

/// Shift every interval toward position 1 by a fixed amount.
///
/// Intervals pushed entirely below position 1 are dropped; intervals
/// straddling it are clamped.
pub struct ShiftPos {
    source: Cursor,
    shift: u64,
}

impl ShiftPos {
    pub fn new(source: Cursor, shift: u64) -> Self {
        Self { source, shift }
    }
}

impl SignalIter for ShiftPos {
    fn next_interval(&mut self) -> Result<Option<Interval>> {
        while let Some(iv) = self.source.take_head()? {
            if iv.finish.saturating_sub(self.shift) <= 1 {
                continue;
            }
            let mut iv = iv;
            iv.start = iv.start.saturating_sub(self.shift).max(1);
            iv.finish -= self.shift;
            return Ok(Some(iv));
        }
        Ok(None)
    }

    fn seek(&mut self, chrom: &str, start: u64, finish: u64) -> Result<()> {
        self.source.seek(chrom, start, finish)
    }

    fn default_value(&self) -> f64 {
        self.source.default_value()
    }

    fn overlaps(&self) -> bool {
        self.source.overlaps()
    }
}

//////////////////////////////////////////////////////
// Structural operators
//////////////////////////////////////////////////////

/// Coalesce adjacent intervals carrying the same value.
pub struct Compress {
    source: Cursor,
}

impl Compress {
    pub fn new(source: Cursor) -> Self {
        Self { source }
    }
}

impl SignalIter for Compress {
    fn next_interval(&mut self) -> Result<Option<Interval>> {
        let mut iv = match self.source.take_head()? {
            Some(iv) => iv,
            None => return Ok(None),
        };
        while let Some(next) = self.source.head() {
            if iv.continues(next) {
                iv.finish = next.finish;
                self.source.advance()?;
            } else {
                break;
            }
        }
        Ok(Some(iv))
    }

    fn seek(&mut self, chrom: &str, start: u64, finish: u64) -> Result<()> {
        self.source.seek(chrom, start, finish)
    }

    fn default_value(&self) -> f64 {
        self.source.default_value()
    }
}

/// Collapse runs of overlapping intervals into their hull, with value 1.
///
/// This is the operator implicitly applied to any stream whose `overlaps`
/// flag is set before it reaches a computation that assumes non-overlap.
pub struct Union {
    source: Cursor,
}

impl Union {
    pub fn new(source: Cursor) -> Self {
        Self { source }
    }
}

impl SignalIter for Union {
    fn next_interval(&mut self) -> Result<Option<Interval>> {
        let mut hull = match self.source.take_head()? {
            Some(iv) => iv,
            None => return Ok(None),
        };
        hull.value = 1.0;
        while let Some(next) = self.source.head() {
            if *next.chrom == *hull.chrom && next.start < hull.finish {
                hull.finish = hull.finish.max(next.finish);
                self.source.advance()?;
            } else {
                break;
            }
        }
        Ok(Some(hull))
    }

    fn seek(&mut self, chrom: &str, start: u64, finish: u64) -> Result<()> {
        self.source.seek(chrom, start, finish)
    }

    fn default_value(&self) -> f64 {
        self.source.default_value()
    }
}

/// Emit the multiplicity of overlapping intervals at each position.
///
/// The endpoint bookkeeping is a sorted counting multiset of pending
/// finishes with a running depth.
pub struct Coverage {
    source: Cursor,
    ends: BTreeMap<u64, u32>,
    chrom: Option<Chrom>,
    finish: u64,
    depth: i64,
}

impl Coverage {
    pub fn new(source: Cursor) -> Self {
        Self {
            source,
            ends: BTreeMap::new(),
            chrom: None,
            finish: 0,
            depth: 0,
        }
    }

    fn close_ends_at(&mut self, pos: u64) {
        while let Some((&end, &count)) = self.ends.first_key_value() {
            if end == pos {
                self.depth -= count as i64;
                self.ends.remove(&end);
            } else {
                break;
            }
        }
    }
}

impl SignalIter for Coverage {
    fn next_interval(&mut self) -> Result<Option<Interval>> {
        if !self.source.is_done() {
            self.close_ends_at(self.finish);
            if self.depth < 0 {
                return Err(SignalError::NegativeDepth {
                    chrom: self.chrom.as_deref().unwrap_or("?").to_string(),
                    pos: self.finish,
                });
            }

            let start = if self.depth > 0 {
                self.finish
            } else {
                let head = self.source.head().expect("source not done");
                self.chrom = Some(head.chrom.clone());
                head.start
            };
            let chrom = self.chrom.clone().expect("chromosome set");

            while let Some(head) = self.source.head() {
                if *head.chrom == *chrom && head.start == start {
                    *self.ends.entry(head.finish).or_insert(0) += 1;
                    self.depth += 1;
                    self.source.advance()?;
                } else {
                    break;
                }
            }

            let min_end = *self
                .ends
                .first_key_value()
                .expect("at least one interval in play")
                .0;
            self.finish = match self.source.head() {
                Some(head) if *head.chrom == *chrom && head.start < min_end => head.start,
                _ => min_end,
            };
            Ok(Some(Interval::new(
                chrom,
                start,
                self.finish,
                self.depth as f64,
            )))
        } else if !self.ends.is_empty() {
            let start = self.finish;
            self.close_ends_at(start);
            if self.depth < 0 {
                return Err(SignalError::NegativeDepth {
                    chrom: self.chrom.as_deref().unwrap_or("?").to_string(),
                    pos: start,
                });
            }
            if self.depth > 0 {
                self.finish = *self.ends.first_key_value().expect("depth > 0").0;
                Ok(Some(Interval::new(
                    self.chrom.clone().expect("chromosome set"),
                    start,
                    self.finish,
                    self.depth as f64,
                )))
            } else {
                Ok(None)
            }
        } else {
            Ok(None)
        }
    }

    fn seek(&mut self, chrom: &str, start: u64, finish: u64) -> Result<()> {
        self.ends.clear();
        self.chrom = None;
        self.finish = 0;
        self.depth = 0;
        self.source.seek(chrom, start, finish)
    }

    fn default_value(&self) -> f64 {
        0.0
    }
}

//////////////////////////////////////////////////////
// Concatenation
//////////////////////////////////////////////////////

/// Sequential concatenation of several track files.
///
/// Each file is opened when the previous one is exhausted; content at or
/// before the last emitted position is skipped so the output stays sorted.
/// Seek is not supported.
pub struct Cat {
    paths: Vec<PathBuf>,
    options: PipelineOptions,
    index: usize,
    current: Option<Cursor>,
    last: Option<Interval>,
}

impl Cat {
    pub fn new(paths: Vec<PathBuf>, options: PipelineOptions) -> Result<Self> {
        if paths.is_empty() {
            return Err(SignalError::Command(
                "nothing to concatenate".to_string(),
            ));
        }
        let first = Cursor::new(crate::readers::open_track(&paths[0], options)?)?;
        Ok(Self {
            paths,
            options,
            index: 0,
            current: Some(first),
            last: None,
        })
    }
}

impl SignalIter for Cat {
    fn next_interval(&mut self) -> Result<Option<Interval>> {
        loop {
            if let Some(cursor) = self.current.as_mut() {
                while let Some(mut iv) = cursor.take_head()? {
                    if let Some(last) = &self.last {
                        match iv.chrom.as_ref().cmp(last.chrom.as_ref()) {
                            std::cmp::Ordering::Less => continue,
                            std::cmp::Ordering::Equal => {
                                if iv.finish <= last.finish {
                                    continue;
                                }
                                if iv.start < last.finish {
                                    iv.start = last.finish;
                                }
                            }
                            std::cmp::Ordering::Greater => {}
                        }
                    }
                    self.last = Some(iv.clone());
                    return Ok(Some(iv));
                }
            }
            self.index += 1;
            if self.index >= self.paths.len() {
                self.current = None;
                return Ok(None);
            }
            self.current = Some(Cursor::new(crate::readers::open_track(
                &self.paths[self.index],
                self.options,
            )?)?);
        }
    }

    fn seek(&mut self, _chrom: &str, _start: u64, _finish: u64) -> Result<()> {
        Err(SignalError::SeekUnsupported("a concatenation of files"))
    }

    fn default_value(&self) -> f64 {
        0.0
    }

    fn overlaps(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::testutil::cursor;
    use crate::signal::{Cursor, MemoryIter};

    #[test]
    fn test_scale() {
        let mut s = Cursor::from_iter(Scale::new(
            cursor(&[("chr1", 1, 5, 2.0), ("chr1", 7, 9, -1.0)]),
            3.0,
        ))
        .unwrap();
        let out = s.drain().unwrap();
        assert_eq!(out[0].value, 6.0);
        assert_eq!(out[1].value, -3.0);
    }

    #[test]
    fn test_scale_composes() {
        // scale(k2, scale(k1, s)) == scale(k1*k2, s)
        let a = Cursor::from_iter(Scale::new(
            Cursor::from_iter(Scale::new(cursor(&[("chr1", 1, 5, 2.0)]), 2.0)).unwrap(),
            5.0,
        ))
        .unwrap()
        .drain()
        .unwrap();
        let b = Cursor::from_iter(Scale::new(cursor(&[("chr1", 1, 5, 2.0)]), 10.0))
            .unwrap()
            .drain()
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_scale_nan_absorbs() {
        let mut s = Cursor::from_iter(Scale::new(cursor(&[("chr1", 1, 5, f64::NAN)]), 3.0)).unwrap();
        assert!(s.drain().unwrap()[0].value.is_nan());
    }

    #[test]
    fn test_offset_default_propagation() {
        let src = cursor(&[("chr1", 1, 5, 2.0)]);
        let s = Offset::new(src, 4.0);
        assert_eq!(s.default_value(), 4.0);
    }

    #[test]
    fn test_unit_is_sign() {
        let mut s = Cursor::from_iter(MapValue::new(
            cursor(&[
                ("chr1", 1, 5, 3.5),
                ("chr1", 5, 9, -0.5),
                ("chr1", 9, 12, 0.0),
            ]),
            ValueFn::Unit,
        ))
        .unwrap();
        let values: Vec<f64> = s.drain().unwrap().iter().map(|iv| iv.value).collect();
        assert_eq!(values, vec![1.0, -1.0, 0.0]);
    }

    #[test]
    fn test_log_of_non_positive_is_nan() {
        let mut s = Cursor::from_iter(MapValue::new(
            cursor(&[("chr1", 1, 5, -2.0), ("chr1", 5, 9, std::f64::consts::E)]),
            ValueFn::natural_log(),
        ))
        .unwrap();
        let out = s.drain().unwrap();
        assert!(out[0].value.is_nan());
        assert!((out[1].value - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_pow_negative_exponent_domain() {
        let mut s = Cursor::from_iter(MapValue::new(
            cursor(&[("chr1", 1, 5, 0.0), ("chr1", 5, 9, 2.0)]),
            ValueFn::Pow { exponent: -1.0 },
        ))
        .unwrap();
        let out = s.drain().unwrap();
        assert!(out[0].value.is_nan());
        assert_eq!(out[1].value, 0.5);
    }

    #[test]
    fn test_filter_gt() {
        let mut s = Cursor::from_iter(Filter::new(
            cursor(&[
                ("chr1", 1, 5, 1.0),
                ("chr1", 5, 9, 3.0),
                ("chr1", 9, 12, 2.0),
            ]),
            FilterOp::Gt,
            2.0,
        ))
        .unwrap();
        let out = s.drain().unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].value, 3.0);
    }

    #[test]
    fn test_filter_gte_keeps_boundary() {
        let mut s = Cursor::from_iter(Filter::new(
            cursor(&[("chr1", 1, 5, 2.0)]),
            FilterOp::Gte,
            2.0,
        ))
        .unwrap();
        assert_eq!(s.drain().unwrap().len(), 1);
    }

    #[test]
    fn test_is_zero_aborts() {
        let mut s =
            Cursor::from_iter(IsZero::new(cursor(&[("chr1", 1, 5, 0.0), ("chr1", 5, 9, 1.0)])))
                .unwrap();
        assert!(s.take_head().unwrap().is_some());
        assert!(s.take_head().is_err());
    }

    #[test]
    fn test_extend_clamps_at_one() {
        let mut s = Cursor::from_iter(Extend::new(cursor(&[("chr1", 2, 5, 1.0)]), 10)).unwrap();
        let out = s.drain().unwrap();
        assert_eq!(out[0].start, 1);
        assert_eq!(out[0].finish, 15);
    }

    #[test]
    fn test_shift_pos_drops_underflow() {
        let mut s = Cursor::from_iter(ShiftPos::new(
            cursor(&[("chr1", 1, 4, 1.0), ("chr1", 10, 20, 2.0)]),
            5,
        ))
        .unwrap();
        let out = s.drain().unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!((out[0].start, out[0].finish), (5, 15));
    }

    #[test]
    fn test_compress_merges_equal_runs() {
        let mut s = Cursor::from_iter(Compress::new(cursor(&[
            ("chr1", 1, 5, 2.0),
            ("chr1", 5, 9, 2.0),
            ("chr1", 9, 12, 3.0),
            ("chr2", 1, 4, 3.0),
        ])))
        .unwrap();
        let out = s.drain().unwrap();
        assert_eq!(out.len(), 3);
        assert_eq!((out[0].start, out[0].finish), (1, 9));
        assert_eq!((out[1].start, out[1].finish), (9, 12));
        assert_eq!(&*out[2].chrom, "chr2");
    }

    #[test]
    fn test_compress_idempotent() {
        let data = &[
            ("chr1", 1, 5, 2.0),
            ("chr1", 5, 9, 2.0),
            ("chr1", 20, 22, 1.0),
        ];
        let once = Cursor::from_iter(Compress::new(cursor(data)))
            .unwrap()
            .drain()
            .unwrap();
        let twice = Cursor::from_iter(Compress::new(
            Cursor::from_iter(Compress::new(cursor(data))).unwrap(),
        ))
        .unwrap()
        .drain()
        .unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_union_hull() {
        let src = MemoryIter::new(vec![
            Interval::new("chr1", 1, 5, 7.0),
            Interval::new("chr1", 3, 8, 7.0),
            Interval::new("chr1", 10, 12, 7.0),
        ])
        .with_overlaps(true);
        let mut s =
            Cursor::from_iter(Union::new(Cursor::from_iter(src).unwrap())).unwrap();
        let out = s.drain().unwrap();
        assert_eq!(out, vec![
            Interval::new("chr1", 1, 8, 1.0),
            Interval::new("chr1", 10, 12, 1.0),
        ]);
    }

    #[test]
    fn test_union_idempotent() {
        let data = vec![
            Interval::new("chr1", 1, 5, 1.0),
            Interval::new("chr1", 3, 8, 1.0),
        ];
        let once = Cursor::from_iter(Union::new(
            Cursor::from_iter(MemoryIter::new(data.clone()).with_overlaps(true)).unwrap(),
        ))
        .unwrap()
        .drain()
        .unwrap();
        let twice = Cursor::from_iter(Union::new(
            Cursor::from_iter(Union::new(
                Cursor::from_iter(MemoryIter::new(data).with_overlaps(true)).unwrap(),
            ))
            .unwrap(),
        ))
        .unwrap()
        .drain()
        .unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_coverage_depth_runs() {
        // Three overlapping alignments [1,5) [3,8) [6,10)
        let src = MemoryIter::new(vec![
            Interval::new("chr1", 1, 5, 1.0),
            Interval::new("chr1", 3, 8, 1.0),
            Interval::new("chr1", 6, 10, 1.0),
        ])
        .with_overlaps(true);
        let mut s = Cursor::from_iter(Coverage::new(Cursor::from_iter(src).unwrap())).unwrap();
        let out = s.drain().unwrap();
        assert_eq!(out, vec![
            Interval::new("chr1", 1, 3, 1.0),
            Interval::new("chr1", 3, 5, 2.0),
            Interval::new("chr1", 5, 6, 1.0),
            Interval::new("chr1", 6, 8, 2.0),
            Interval::new("chr1", 8, 10, 1.0),
        ]);
    }

    #[test]
    fn test_coverage_across_chromosomes() {
        let src = MemoryIter::new(vec![
            Interval::new("chr1", 1, 4, 1.0),
            Interval::new("chr2", 2, 6, 1.0),
            Interval::new("chr2", 2, 8, 1.0),
        ])
        .with_overlaps(true);
        let mut s = Cursor::from_iter(Coverage::new(Cursor::from_iter(src).unwrap())).unwrap();
        let out = s.drain().unwrap();
        assert_eq!(out, vec![
            Interval::new("chr1", 1, 4, 1.0),
            Interval::new("chr2", 2, 6, 2.0),
            Interval::new("chr2", 6, 8, 1.0),
        ]);
    }
}
