//! Operators that carry positional state across intervals: the moving
//! average and the fixed-width binning operator.

use crate::error::{Result, SignalError};
use crate::interval::{Chrom, Interval};
use crate::signal::{Cursor, SignalIter};

/// Moving average over per-base samples, emitted one base at a time.
///
/// A ring buffer of `width` samples feeds a running sum. Entering a
/// chromosome prefills the left half of the window; leaving it drains
/// symmetrically. Gaps between intervals sample as 0. A NaN sample poisons
/// the running sum until it leaves the window, at which point the sum is
/// recomputed from the live entries.
pub struct Smooth {
    source: Cursor,
    width: usize,
    buffer: Vec<f64>,
    sum: f64,
    latest: usize,
    oldest: usize,
    count: usize,
    last_position: u64,
    chrom: Option<Chrom>,
    start: u64,
}

impl Smooth {
    pub fn new(source: Cursor, width: usize) -> Result<Self> {
        if width < 2 {
            return Err(SignalError::Command(format!(
                "cannot smooth over a window of width {width}, must be 2 or more"
            )));
        }
        Ok(Self {
            source,
            width,
            buffer: vec![0.0; width],
            sum: 0.0,
            latest: 0,
            oldest: 0,
            count: 0,
            last_position: 0,
            chrom: None,
            start: 0,
        })
    }

    fn recompute_sum(&self) -> f64 {
        let mut sum = 0.0;
        for k in 1..self.count {
            sum += self.buffer[(self.oldest + k) % self.width];
        }
        sum
    }

    fn erase_one(&mut self) {
        if self.buffer[self.oldest].is_nan() {
            self.sum = self.recompute_sum();
        } else {
            self.sum -= self.buffer[self.oldest];
        }
        self.count -= 1;
        self.oldest = (self.oldest + 1) % self.width;
    }

    fn read_one(&mut self, chrom: &Chrom, position: u64) -> Result<()> {
        while let Some(head) = self.source.head() {
            if *head.chrom == **chrom && head.finish <= position {
                self.source.advance()?;
            } else {
                break;
            }
        }
        if let Some(head) = self.source.head() {
            if *head.chrom == **chrom {
                if head.start <= position {
                    self.buffer[self.latest] = head.value;
                    self.sum += head.value;
                } else {
                    self.buffer[self.latest] = 0.0;
                }
                self.count += 1;
                self.last_position = position;
                self.latest = (self.latest + 1) % self.width;
            }
        }
        Ok(())
    }
}

impl SignalIter for Smooth {
    fn next_interval(&mut self) -> Result<Option<Interval>> {
        let half = (self.width / 2) as u64;

        if self.source.is_done() && self.count == 0 {
            return Ok(None);
        }

        if self.count == 0 {
            // Window ran dry: jump to the next populated location.
            let head = self.source.head().expect("source not done").clone();
            self.chrom = Some(head.chrom.clone());
            if head.start <= half {
                self.start = 1;
                let chrom = head.chrom.clone();
                for i in 0..half {
                    self.read_one(&chrom, self.start + i)?;
                }
            } else {
                self.start = head.start - half;
            }
        } else {
            self.start += 1;
        }

        let chrom = self.chrom.clone().expect("chromosome set");
        self.read_one(&chrom, self.start + half)?;
        let value = self.sum / self.width as f64;

        if self.count == self.width || self.last_position < self.start + half {
            self.erase_one();
        }

        Ok(Some(Interval::new(chrom, self.start, self.start + 1, value)))
    }

    fn seek(&mut self, chrom: &str, start: u64, finish: u64) -> Result<()> {
        self.buffer.fill(0.0);
        self.sum = 0.0;
        self.latest = 0;
        self.oldest = 0;
        self.count = 0;
        self.last_position = 0;
        self.chrom = None;
        self.start = 0;
        self.source.seek(chrom, start, finish)
    }

    fn default_value(&self) -> f64 {
        self.source.default_value()
    }
}

/// Merge the signal into non-overlapping `width`-wide bins on the fixed
/// 1-based grid; each bin carries the covered mass plus the default value
/// over whatever the input left uncovered.
pub struct Bin {
    source: Cursor,
    width: u64,
    default_value: f64,
    chrom: Option<Chrom>,
    finish: u64,
}

impl Bin {
    pub fn new(source: Cursor, width: u64) -> Result<Self> {
        if width < 2 {
            return Err(SignalError::Command(format!(
                "cannot bin over a window of width {width}, must be 2 or more"
            )));
        }
        let default_value = source.default_value() * width as f64;
        Ok(Self {
            source,
            width,
            default_value,
            chrom: None,
            finish: 0,
        })
    }
}

impl SignalIter for Bin {
    fn next_interval(&mut self) -> Result<Option<Interval>> {
        let head = match self.source.head() {
            Some(head) => head.clone(),
            None => return Ok(None),
        };

        let same_chrom = self
            .chrom
            .as_ref()
            .is_some_and(|c| **c == *head.chrom);
        let start = if same_chrom && head.start < self.finish + self.width {
            self.finish
        } else {
            // Round down onto the 1-based grid.
            (head.start - 1) / self.width * self.width + 1
        };
        self.chrom = Some(head.chrom.clone());
        self.finish = start + self.width;

        let mut value = 0.0;
        let mut covered = 0;
        while let Some(h) = self.source.head() {
            if *h.chrom != *head.chrom || h.start >= self.finish {
                break;
            }
            let s = h.start.max(start);
            let f = h.finish.min(self.finish);
            value += (f - s) as f64 * h.value;
            covered += f - s;
            if h.finish > self.finish {
                break;
            }
            self.source.advance()?;
        }

        if covered < self.width {
            value += (self.width - covered) as f64 * self.source.default_value();
        }

        Ok(Some(Interval::new(
            head.chrom.clone(),
            start,
            self.finish,
            value,
        )))
    }

    fn seek(&mut self, chrom: &str, start: u64, finish: u64) -> Result<()> {
        self.chrom = None;
        self.finish = 0;
        self.source.seek(chrom, start, finish)
    }

    fn default_value(&self) -> f64 {
        self.default_value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::testutil::{cursor, cursor_with_default};

    #[test]
    fn test_smooth_flat_signal_plateau() {
        // A constant signal smooths to the same constant in the middle of
        // the window and tapers at the edges.
        let src = cursor(&[("chr1", 1, 11, 4.0)]);
        let mut s = Cursor::from_iter(Smooth::new(src, 4).unwrap()).unwrap();
        let out = s.drain().unwrap();

        assert!(out.iter().all(|iv| iv.len() == 1));
        assert!(out.iter().any(|iv| (iv.value - 4.0).abs() < 1e-12));
        // Taper at the right edge: last emitted value below the plateau.
        assert!(out.last().unwrap().value < 4.0);
    }

    #[test]
    fn test_smooth_gap_samples_zero() {
        let src = cursor(&[("chr1", 1, 3, 2.0), ("chr1", 5, 7, 2.0)]);
        let mut s = Cursor::from_iter(Smooth::new(src, 2).unwrap()).unwrap();
        let out = s.drain().unwrap();
        // The gap at [3,5) drags the average below 2 somewhere.
        assert!(out.iter().any(|iv| iv.value < 2.0));
    }

    #[test]
    fn test_smooth_width_validation() {
        let src = cursor(&[("chr1", 1, 3, 2.0)]);
        assert!(Smooth::new(src, 1).is_err());
    }

    #[test]
    fn test_bin_grid_alignment() {
        let src = cursor(&[("chr1", 3, 7, 1.0)]);
        let mut s = Cursor::from_iter(Bin::new(src, 10).unwrap()).unwrap();
        let out = s.drain().unwrap();
        assert_eq!(out.len(), 1);
        // [3,7) lands in the first 10-wide bin [1,11).
        assert_eq!((out[0].start, out[0].finish), (1, 11));
        assert_eq!(out[0].value, 4.0);
    }

    #[test]
    fn test_bin_sums_overlap_mass() {
        let src = cursor(&[("chr1", 1, 6, 2.0), ("chr1", 6, 21, 3.0)]);
        let mut s = Cursor::from_iter(Bin::new(src, 10).unwrap()).unwrap();
        let out = s.drain().unwrap();
        // Bin [1,11): 5*2 + 5*3 = 25; bin [11,21): 10*3 = 30.
        assert_eq!(out[0].value, 25.0);
        assert_eq!(out[1].value, 30.0);
    }

    #[test]
    fn test_bin_fills_uncovered_with_default() {
        let src = cursor_with_default(&[("chr1", 1, 6, 2.0)], 1.0);
        let mut s = Cursor::from_iter(Bin::new(src, 10).unwrap()).unwrap();
        let out = s.drain().unwrap();
        // 5 covered bases at 2.0 plus 5 default bases at 1.0.
        assert_eq!(out[0].value, 15.0);
    }

    #[test]
    fn test_bin_default_value_scales_by_width() {
        let src = cursor_with_default(&[("chr1", 1, 6, 2.0)], 0.5);
        let b = Bin::new(src, 10).unwrap();
        assert_eq!(b.default_value(), 5.0);
    }
}
