//! Two-input region operators: a `source` stream filtered or reshaped by a
//! `mask` stream.
//!
//! All four operators run the same two-pointer scan: advance whichever side
//! is on the smaller chromosome, then whichever starts first, until the
//! relationship at the head of both streams is decided.

use crate::error::Result;
use crate::interval::Interval;
use crate::signal::{Cursor, SignalIter};
use std::cmp::Ordering;

/// Pass `source` intervals that intersect at least one `mask` interval.
pub struct Overlap {
    source: Cursor,
    mask: Cursor,
}

impl Overlap {
    pub fn new(source: Cursor, mask: Cursor) -> Self {
        Self { source, mask }
    }
}

impl SignalIter for Overlap {
    fn next_interval(&mut self) -> Result<Option<Interval>> {
        loop {
            let (src, msk) = match (self.source.head(), self.mask.head()) {
                (Some(s), Some(m)) => (s, m),
                _ => return Ok(None),
            };
            match msk.chrom.as_ref().cmp(src.chrom.as_ref()) {
                Ordering::Less => self.mask.advance()?,
                Ordering::Greater => {
                    self.source.advance()?;
                }
                Ordering::Equal => {
                    if msk.finish <= src.start {
                        self.mask.advance()?;
                    } else if src.finish <= msk.start {
                        self.source.advance()?;
                    } else {
                        return self.source.take_head();
                    }
                }
            }
        }
    }

    fn seek(&mut self, chrom: &str, start: u64, finish: u64) -> Result<()> {
        self.source.seek(chrom, start, finish)?;
        self.mask.seek(chrom, start, finish)
    }

    fn default_value(&self) -> f64 {
        self.source.default_value()
    }

    fn overlaps(&self) -> bool {
        self.source.overlaps()
    }
}

/// Pass the intersection of `source` intervals with `mask` intervals,
/// valued from `source`.
pub struct Trim {
    source: Cursor,
    mask: Cursor,
}

impl Trim {
    pub fn new(source: Cursor, mask: Cursor) -> Self {
        Self { source, mask }
    }
}

impl SignalIter for Trim {
    fn next_interval(&mut self) -> Result<Option<Interval>> {
        loop {
            let (src, msk) = match (self.source.head(), self.mask.head()) {
                (Some(s), Some(m)) => (s, m),
                _ => return Ok(None),
            };
            match msk.chrom.as_ref().cmp(src.chrom.as_ref()) {
                Ordering::Less => self.mask.advance()?,
                Ordering::Greater => {
                    self.source.advance()?;
                }
                Ordering::Equal => {
                    if msk.finish <= src.start {
                        self.mask.advance()?;
                    } else if src.finish <= msk.start {
                        self.source.advance()?;
                    } else {
                        let mut piece = src.clone();
                        piece.start = src.start.max(msk.start);
                        piece.finish = src.finish.min(msk.finish);
                        if src.finish <= msk.finish {
                            self.source.advance()?;
                        } else {
                            self.mask.advance()?;
                        }
                        return Ok(Some(piece));
                    }
                }
            }
        }
    }

    fn seek(&mut self, chrom: &str, start: u64, finish: u64) -> Result<()> {
        self.source.seek(chrom, start, finish)?;
        self.mask.seek(chrom, start, finish)
    }

    fn default_value(&self) -> f64 {
        self.source.default_value()
    }

    fn overlaps(&self) -> bool {
        self.source.overlaps()
    }
}

/// Pass `source` intervals that intersect no `mask` interval.
pub struct Noverlap {
    source: Cursor,
    mask: Cursor,
}

impl Noverlap {
    pub fn new(source: Cursor, mask: Cursor) -> Self {
        Self { source, mask }
    }
}

impl SignalIter for Noverlap {
    fn next_interval(&mut self) -> Result<Option<Interval>> {
        loop {
            let (src, msk) = match (self.source.head(), self.mask.head()) {
                (Some(s), Some(m)) => (s, m),
                _ => return self.source.take_head(),
            };
            match msk.chrom.as_ref().cmp(src.chrom.as_ref()) {
                Ordering::Less => self.mask.advance()?,
                Ordering::Greater => return self.source.take_head(),
                Ordering::Equal => {
                    if msk.finish <= src.start {
                        self.mask.advance()?;
                    } else if src.finish <= msk.start {
                        return self.source.take_head();
                    } else {
                        self.source.advance()?;
                    }
                }
            }
        }
    }

    fn seek(&mut self, chrom: &str, start: u64, finish: u64) -> Result<()> {
        self.source.seek(chrom, start, finish)?;
        self.mask.seek(chrom, start, finish)
    }

    fn default_value(&self) -> f64 {
        self.source.default_value()
    }

    fn overlaps(&self) -> bool {
        self.source.overlaps()
    }
}

/// For each `source` interval, emit it valued with the distance in bases to
/// the nearest `mask` interval on the same chromosome: 0 when they touch or
/// overlap, NaN when the chromosome carries no mask interval at all.
pub struct Nearest {
    source: Cursor,
    mask: Cursor,
    prev: Option<Interval>,
}

impl Nearest {
    pub fn new(source: Cursor, mask: Cursor) -> Self {
        Self {
            source,
            mask,
            prev: None,
        }
    }
}

impl SignalIter for Nearest {
    fn next_interval(&mut self) -> Result<Option<Interval>> {
        let src = match self.source.head() {
            Some(s) => s.clone(),
            None => return Ok(None),
        };

        // Keep the last mask interval starting at or before the source.
        while let Some(msk) = self.mask.head() {
            match msk.chrom.as_ref().cmp(src.chrom.as_ref()) {
                Ordering::Less => {
                    self.prev = Some(msk.clone());
                    self.mask.advance()?;
                }
                Ordering::Greater => break,
                Ordering::Equal => {
                    if msk.start <= src.start {
                        self.prev = Some(msk.clone());
                        self.mask.advance()?;
                    } else {
                        break;
                    }
                }
            }
        }

        let mut best: Option<u64> = None;
        if let Some(prev) = &self.prev {
            if *prev.chrom == *src.chrom {
                let d = src.start.saturating_sub(prev.finish);
                best = Some(d);
            }
        }
        if let Some(msk) = self.mask.head() {
            if *msk.chrom == *src.chrom {
                let d = msk.start.saturating_sub(src.finish);
                best = Some(best.map_or(d, |b| b.min(d)));
            }
        }

        let mut out = src;
        out.value = best.map_or(f64::NAN, |d| d as f64);
        self.source.advance()?;
        Ok(Some(out))
    }

    fn seek(&mut self, chrom: &str, start: u64, finish: u64) -> Result<()> {
        self.prev = None;
        self.source.seek(chrom, start, finish)?;
        self.mask.seek(chrom, start, finish)
    }

    fn default_value(&self) -> f64 {
        self.source.default_value()
    }

    fn overlaps(&self) -> bool {
        self.source.overlaps()
    }
}
