//! Per-region evaluation of statistics or profiles.
//!
//! For each region of a region stream, the engine materializes the data
//! stream restricted to that region and runs a list of integrators (or the
//! profile rescaler) over it. Nearby same-chromosome regions are batched
//! into per-base buffers filled by a single pass of the data stream;
//! oversized regions skip buffering entirely and evaluate by seeking the
//! data stream directly.

use std::collections::VecDeque;

use crate::error::Result;
use crate::interval::{Chrom, Interval, Strand};
use crate::signal::{Cursor, SignalIter};
use crate::stats::{StatAcc, StatKind};

/// Regions at least this long are evaluated alone, without buffering.
pub const MAX_BUFFER: u64 = 1_000_000;
/// Cap on the total buffered bases of one batch.
pub const MAX_BUFFER_SUM: u64 = 1_000_000;
/// Largest gap between consecutive regions worth streaming across; past
/// it a fresh seek is cheaper.
pub const MAX_SEEK: u64 = 10;

/// One output row: a region and its computed values.
#[derive(Debug, Clone, PartialEq)]
pub struct ApplyRecord {
    pub chrom: Chrom,
    pub start: u64,
    pub finish: u64,
    pub values: Vec<f64>,
}

/// What to compute per region.
#[derive(Debug, Clone)]
pub enum ApplyMode {
    /// One scalar per statistic. In strict mode only bases the data
    /// actually covers feed the statistics; otherwise gaps contribute the
    /// data stream's default value.
    Stats { kinds: Vec<StatKind>, strict: bool },
    /// A fixed-width profile rescaled from the per-base buffer,
    /// length-weighted, reversed on minus-strand regions.
    Profile { width: usize },
}

impl ApplyMode {
    fn width(&self) -> usize {
        match self {
            ApplyMode::Stats { kinds, .. } => kinds.len(),
            ApplyMode::Profile { width } => *width,
        }
    }
}

enum Payload {
    Buffered { values: Vec<f64>, set: Vec<bool> },
    Oversized,
}

struct RegionBuffer {
    chrom: Chrom,
    start: u64,
    finish: u64,
    strand: Strand,
    payload: Payload,
}

impl RegionBuffer {
    fn new(region: &Interval) -> Self {
        let len = region.len() as usize;
        Self {
            chrom: region.chrom.clone(),
            start: region.start,
            finish: region.finish,
            strand: region.strand,
            payload: Payload::Buffered {
                values: vec![0.0; len],
                set: vec![false; len],
            },
        }
    }

    fn oversized(region: &Interval) -> Self {
        Self {
            chrom: region.chrom.clone(),
            start: region.start,
            finish: region.finish,
            strand: region.strand,
            payload: Payload::Oversized,
        }
    }

    /// Write one data interval into the overlap with this buffer.
    fn push_data(&mut self, iv: &Interval) {
        let Payload::Buffered { values, set } = &mut self.payload else {
            return;
        };
        let from = iv.start.max(self.start);
        let to = iv.finish.min(self.finish);
        for pos in from..to {
            let idx = (pos - self.start) as usize;
            values[idx] = iv.value;
            set[idx] = true;
        }
    }
}

/// The per-region evaluation engine.
pub struct Apply {
    regions: Cursor,
    data: Cursor,
    mode: ApplyMode,
    queue: VecDeque<RegionBuffer>,
}

impl Apply {
    pub fn new(regions: Cursor, data: Cursor, mode: ApplyMode) -> Self {
        Self {
            regions,
            data,
            mode,
            queue: VecDeque::new(),
        }
    }

    /// Number of values per output record.
    pub fn width(&self) -> usize {
        self.mode.width()
    }

    /// Batch the next run of regions into buffers.
    fn create_targets(&mut self) -> Result<()> {
        let first = self
            .regions
            .take_head()?
            .expect("regions checked non-empty");
        if first.len() >= MAX_BUFFER {
            self.queue.push_back(RegionBuffer::oversized(&first));
            return Ok(());
        }

        let mut total = first.len();
        let mut last_finish = first.finish;
        self.queue.push_back(RegionBuffer::new(&first));

        while let Some(region) = self.regions.head() {
            if region.len() >= MAX_BUFFER
                || total + region.len() >= MAX_BUFFER_SUM
                || *region.chrom != *first.chrom
                || region.start > last_finish + MAX_SEEK
            {
                break;
            }
            total += region.len();
            last_finish = last_finish.max(region.finish);
            let buffer = RegionBuffer::new(region);
            self.queue.push_back(buffer);
            self.regions.advance()?;
        }
        Ok(())
    }

    /// Advance to the next region record, or `None` when regions run out.
    pub fn next_record(&mut self) -> Result<Option<ApplyRecord>> {
        if self.queue.is_empty() {
            if self.regions.is_done() {
                return Ok(None);
            }
            self.create_targets()?;
            let head = self.queue.front().expect("batch created");
            if matches!(head.payload, Payload::Buffered { .. }) {
                let chrom = head.chrom.to_string();
                let start = head.start;
                let finish = self.queue.back().expect("batch created").finish;
                self.data.seek(&chrom, start, finish)?;
            }
        }

        // Push data until the head buffer's region is fully covered.
        let head_finish = self.queue.front().expect("non-empty queue").finish;
        let head_chrom = self.queue.front().expect("non-empty queue").chrom.clone();
        if matches!(
            self.queue.front().expect("non-empty queue").payload,
            Payload::Buffered { .. }
        ) {
            loop {
                let Some(iv) = self.data.head() else { break };
                if *iv.chrom != *head_chrom || iv.start >= head_finish {
                    break;
                }
                let iv = iv.clone();
                for buffer in &mut self.queue {
                    if buffer.start >= iv.finish {
                        break;
                    }
                    buffer.push_data(&iv);
                }
                self.data.advance()?;
            }
        }

        let buffer = self.queue.pop_front().expect("non-empty queue");
        let values = self.evaluate(&buffer)?;
        Ok(Some(ApplyRecord {
            chrom: buffer.chrom,
            start: buffer.start,
            finish: buffer.finish,
            values,
        }))
    }

    fn evaluate(&mut self, buffer: &RegionBuffer) -> Result<Vec<f64>> {
        match &self.mode {
            ApplyMode::Stats { kinds, strict } => {
                let mut accs: Vec<StatAcc> = kinds.iter().map(|&k| StatAcc::new(k)).collect();
                let strict = *strict;
                match &buffer.payload {
                    Payload::Buffered { values, set } => {
                        feed_buffer(&mut accs, buffer, values, set, strict, self.data.default_value());
                    }
                    Payload::Oversized => {
                        self.feed_oversized(&mut accs, buffer, strict)?;
                    }
                }
                Ok(accs.iter().map(StatAcc::result).collect())
            }
            ApplyMode::Profile { width } => {
                let width = *width;
                let default = self.data.default_value();
                let bases = match &buffer.payload {
                    Payload::Buffered { values, set } => values
                        .iter()
                        .zip(set)
                        .map(|(&v, &s)| if s { v } else { default })
                        .collect(),
                    Payload::Oversized => self.materialize_oversized(buffer, default)?,
                };
                Ok(rescale(&bases, width, buffer.strand == Strand::Minus))
            }
        }
    }

    /// Run the statistics straight off the data stream, seeking to the
    /// region instead of buffering it.
    fn feed_oversized(
        &mut self,
        accs: &mut [StatAcc],
        buffer: &RegionBuffer,
        strict: bool,
    ) -> Result<()> {
        let default = self.data.default_value();
        self.data
            .seek(&buffer.chrom, buffer.start, buffer.finish)?;
        let mut pos = buffer.start;
        while let Some(iv) = self.data.take_head()? {
            if !strict && iv.start > pos {
                let gap = Interval::new(buffer.chrom.clone(), pos, iv.start, default);
                update_all(accs, &gap);
            }
            update_all(accs, &iv);
            pos = iv.finish;
        }
        if !strict && pos < buffer.finish {
            let gap = Interval::new(buffer.chrom.clone(), pos, buffer.finish, default);
            update_all(accs, &gap);
        }
        Ok(())
    }

    fn materialize_oversized(&mut self, buffer: &RegionBuffer, default: f64) -> Result<Vec<f64>> {
        let mut bases = vec![default; buffer.len()];
        self.data
            .seek(&buffer.chrom, buffer.start, buffer.finish)?;
        while let Some(iv) = self.data.take_head()? {
            for pos in iv.start..iv.finish {
                bases[(pos - buffer.start) as usize] = iv.value;
            }
        }
        Ok(bases)
    }

    pub fn seek(&mut self, chrom: &str, start: u64, finish: u64) -> Result<()> {
        self.queue.clear();
        self.regions.seek(chrom, start, finish)
    }
}

impl RegionBuffer {
    fn len(&self) -> usize {
        (self.finish - self.start) as usize
    }
}

fn update_all(accs: &mut [StatAcc], iv: &Interval) {
    for acc in accs {
        acc.update(iv);
    }
}

/// Feed a completed per-base buffer through the accumulators: set bases one
/// at a time, unset runs as default-valued blocks in loose mode.
fn feed_buffer(
    accs: &mut [StatAcc],
    buffer: &RegionBuffer,
    values: &[f64],
    set: &[bool],
    strict: bool,
    default: f64,
) {
    let mut idx = 0;
    while idx < values.len() {
        if set[idx] {
            let pos = buffer.start + idx as u64;
            let iv = Interval::new(buffer.chrom.clone(), pos, pos + 1, values[idx]);
            update_all(accs, &iv);
            idx += 1;
        } else {
            let run_start = idx;
            while idx < values.len() && !set[idx] {
                idx += 1;
            }
            if !strict {
                let iv = Interval::new(
                    buffer.chrom.clone(),
                    buffer.start + run_start as u64,
                    buffer.start + idx as u64,
                    default,
                );
                update_all(accs, &iv);
            }
        }
    }
}

/// Rescale a per-base buffer into `width` bins with length-weighted
/// averaging.
fn rescale(bases: &[f64], width: usize, reverse: bool) -> Vec<f64> {
    let len = bases.len();
    if len == 0 {
        return vec![f64::NAN; width];
    }
    let mut profile = vec![0.0; width];
    let scale = width as f64 / len as f64;
    for i in 0..len {
        let value = if reverse { bases[len - 1 - i] } else { bases[i] };
        let lo = i as f64 * scale;
        let hi = (i + 1) as f64 * scale;
        let mut from = lo;
        let mut bin = lo.floor() as usize;
        while from < hi - 1e-12 {
            let to = ((bin + 1) as f64).min(hi);
            profile[bin.min(width - 1)] += value * (to - from);
            from = to;
            bin += 1;
        }
    }
    profile
}

/// Adapter exposing a single-statistic apply as an ordinary signal stream.
pub struct ApplySignal {
    inner: Apply,
}

impl ApplySignal {
    pub fn new(inner: Apply) -> Self {
        Self { inner }
    }
}

impl SignalIter for ApplySignal {
    fn next_interval(&mut self) -> Result<Option<Interval>> {
        Ok(self.inner.next_record()?.map(|rec| {
            Interval::new(rec.chrom, rec.start, rec.finish, rec.values[0])
        }))
    }

    fn seek(&mut self, chrom: &str, start: u64, finish: u64) -> Result<()> {
        self.inner.seek(chrom, start, finish)
    }

    fn default_value(&self) -> f64 {
        f64::NAN
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::mask::Trim;
    use crate::signal::testutil::cursor;
    use crate::stats::Integrator;

    fn drain(apply: &mut Apply) -> Vec<ApplyRecord> {
        let mut out = Vec::new();
        while let Some(rec) = apply.next_record().unwrap() {
            out.push(rec);
        }
        out
    }

    #[test]
    fn test_apply_auc_per_region() {
        let regions = cursor(&[("chr1", 1, 5, 0.0), ("chr1", 10, 12, 0.0)]);
        let data = cursor(&[("chr1", 1, 20, 1.0)]);
        let mut apply = Apply::new(
            regions,
            data,
            ApplyMode::Stats {
                kinds: vec![StatKind::Auc],
                strict: true,
            },
        );
        let out = drain(&mut apply);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].values, vec![4.0]);
        assert_eq!(out[1].values, vec![2.0]);
    }

    #[test]
    fn test_apply_auc_consistent_with_trim() {
        let region_data = &[("chr1", 3, 9, 0.0), ("chr1", 15, 30, 0.0)];
        let signal = &[
            ("chr1", 1, 6, 2.0),
            ("chr1", 6, 20, 1.5),
            ("chr1", 25, 40, 3.0),
        ];

        let mut apply = Apply::new(
            cursor(region_data),
            cursor(signal),
            ApplyMode::Stats {
                kinds: vec![StatKind::Auc],
                strict: true,
            },
        );
        let total: f64 = drain(&mut apply)
            .iter()
            .map(|rec| rec.values[0])
            .sum();

        let trimmed = Trim::new(cursor(signal), cursor(region_data));
        let mut integrator = Integrator::new(
            Cursor::from_iter(trimmed).unwrap(),
            &[StatKind::Auc],
        );
        let reference = integrator.run().unwrap()[0];
        assert!((total - reference).abs() < 1e-9);
    }

    #[test]
    fn test_strict_vs_loose_mean() {
        // Region [1,11), data only covers [1,6) with value 4.
        let make = |strict| {
            Apply::new(
                cursor(&[("chr1", 1, 11, 0.0)]),
                cursor(&[("chr1", 1, 6, 4.0)]),
                ApplyMode::Stats {
                    kinds: vec![StatKind::Mean],
                    strict,
                },
            )
        };
        let strict_mean = drain(&mut make(true))[0].values[0];
        let loose_mean = drain(&mut make(false))[0].values[0];
        assert_eq!(strict_mean, 4.0);
        // 5 bases at 4 plus 5 default bases at 0.
        assert_eq!(loose_mean, 2.0);
    }

    #[test]
    fn test_multiple_stats_per_region() {
        let mut apply = Apply::new(
            cursor(&[("chr1", 1, 5, 0.0)]),
            cursor(&[("chr1", 1, 3, 2.0), ("chr1", 3, 5, 6.0)]),
            ApplyMode::Stats {
                kinds: vec![StatKind::Auc, StatKind::Max, StatKind::Min],
                strict: true,
            },
        );
        let out = drain(&mut apply);
        assert_eq!(out[0].values, vec![16.0, 6.0, 2.0]);
    }

    #[test]
    fn test_batching_distant_regions() {
        // Regions far apart trigger separate batches and seeks but the
        // same results.
        let regions = cursor(&[
            ("chr1", 1, 5, 0.0),
            ("chr1", 1_000, 1_004, 0.0),
            ("chr2", 50, 54, 0.0),
        ]);
        let data = cursor(&[
            ("chr1", 1, 2_000, 1.0),
            ("chr2", 1, 100, 2.0),
        ]);
        let mut apply = Apply::new(
            regions,
            data,
            ApplyMode::Stats {
                kinds: vec![StatKind::Auc],
                strict: true,
            },
        );
        let out = drain(&mut apply);
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].values, vec![4.0]);
        assert_eq!(out[1].values, vec![4.0]);
        assert_eq!(out[2].values, vec![8.0]);
    }

    #[test]
    fn test_oversized_region_skips_buffering() {
        let regions = cursor(&[("chr1", 1, 2_000_001, 0.0)]);
        let data = cursor(&[("chr1", 100, 110, 5.0), ("chr1", 1_000_000, 1_000_010, 2.0)]);
        let mut apply = Apply::new(
            regions,
            data,
            ApplyMode::Stats {
                kinds: vec![StatKind::Auc],
                strict: true,
            },
        );
        let out = drain(&mut apply);
        assert_eq!(out[0].values, vec![70.0]);
    }

    #[test]
    fn test_profile_rescaling() {
        // Region of 8 bases, first half 2.0, second half 4.0, width 4.
        let mut apply = Apply::new(
            cursor(&[("chr1", 1, 9, 0.0)]),
            cursor(&[("chr1", 1, 5, 2.0), ("chr1", 5, 9, 4.0)]),
            ApplyMode::Profile { width: 4 },
        );
        let out = drain(&mut apply);
        assert_eq!(out[0].values, vec![2.0, 2.0, 4.0, 4.0]);
    }

    #[test]
    fn test_profile_strand_reversal() {
        let mut regions = vec![Interval::new("chr1", 1, 9, 0.0)];
        regions[0].strand = Strand::Minus;
        let regions =
            Cursor::from_iter(crate::signal::MemoryIter::new(regions)).unwrap();
        let mut apply = Apply::new(
            regions,
            cursor(&[("chr1", 1, 5, 2.0), ("chr1", 5, 9, 4.0)]),
            ApplyMode::Profile { width: 4 },
        );
        let out = drain(&mut apply);
        assert_eq!(out[0].values, vec![4.0, 4.0, 2.0, 2.0]);
    }

    #[test]
    fn test_apply_signal_adapter() {
        let apply = Apply::new(
            cursor(&[("chr1", 1, 5, 0.0), ("chr1", 10, 12, 0.0)]),
            cursor(&[("chr1", 1, 20, 1.0)]),
            ApplyMode::Stats {
                kinds: vec![StatKind::Auc],
                strict: true,
            },
        );
        let mut s = Cursor::from_iter(ApplySignal::new(apply)).unwrap();
        let out = s.drain().unwrap();
        assert_eq!(out, vec![
            Interval::new("chr1", 1, 5, 4.0),
            Interval::new("chr1", 10, 12, 2.0),
        ]);
    }
}
