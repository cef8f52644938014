//! Reader computing integer-depth signals from SAM alignments.
//!
//! Two modes: read-start counts (value at p = alignments whose leftmost
//! mapped base is p) and coverage (value at p = alignments whose aligned
//! segments span p). Coverage walks the CIGAR string: match, mismatch and
//! deletion segments contribute, intron skips advance without contributing,
//! and clipped or inserted bases touch no reference position. Pending
//! segment endpoints live in two sorted counting multisets joined by a
//! running depth, which emits the run-length encoded signal directly.

use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{Result, SignalError};
use crate::interval::{Chrom, Interval};
use crate::readers::{publish_chrom, Clipped, RegionClip, SortGuard, TextSource};
use crate::signal::SignalIter;

/// Which depth signal to compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepthMode {
    /// Count alignments by leftmost mapped base.
    ReadStart,
    /// Count alignments covering each base.
    Coverage,
}

struct PendingRead {
    chrom: String,
    pos: u64,
    cigar: String,
}

pub struct SamReader {
    source: TextSource,
    mode: DepthMode,
    pending: Option<PendingRead>,
    guard: SortGuard,
    starts: BTreeMap<u64, u32>,
    ends: BTreeMap<u64, u32>,
    chrom: Option<Chrom>,
    finish: u64,
    depth: i64,
    clip: Option<RegionClip>,
    done: bool,
}

impl SamReader {
    pub fn open(path: &Path, mode: DepthMode) -> Result<Self> {
        let mut reader = Self {
            source: TextSource::open(path)?,
            mode,
            pending: None,
            guard: SortGuard::default(),
            starts: BTreeMap::new(),
            ends: BTreeMap::new(),
            chrom: None,
            finish: 0,
            depth: 0,
            clip: None,
            done: false,
        };
        reader.read_line()?;
        Ok(reader)
    }

    /// Parse the next mapped alignment into `pending`.
    fn read_line(&mut self) -> Result<()> {
        loop {
            let line = match self.source.next_line()? {
                Some(line) => line.to_string(),
                None => {
                    self.pending = None;
                    return Ok(());
                }
            };
            if line.is_empty() || line.starts_with('@') || line.starts_with('#') {
                continue;
            }
            let mut fields = line.split('\t');
            let (_qname, _flag, rname, pos, _mapq, cigar) = (
                fields.next(),
                fields.next(),
                fields.next(),
                fields.next(),
                fields.next(),
                fields.next(),
            );
            let (Some(rname), Some(pos), Some(cigar)) = (rname, pos, cigar) else {
                return Err(self.source.parse_error("truncated alignment line"));
            };
            if rname == "*" {
                continue;
            }
            let pos: u64 = pos.parse().map_err(|_| {
                self.source.parse_error(format!("invalid position '{pos}'"))
            })?;
            self.guard.check(&self.source.display(), rname, pos)?;
            self.pending = Some(PendingRead {
                chrom: rname.to_string(),
                pos,
                cigar: cigar.to_string(),
            });
            return Ok(());
        }
    }

    /// Expand one CIGAR into covered reference segments.
    fn store_read(&mut self, pos: u64, cigar: &str) -> Result<()> {
        if cigar == "*" {
            return Ok(());
        }
        let mut cursor = pos;
        let mut count: u64 = 0;
        for c in cigar.chars() {
            if let Some(digit) = c.to_digit(10) {
                count = count * 10 + digit as u64;
                continue;
            }
            match c {
                'M' | 'X' | '=' | 'D' => {
                    *self.starts.entry(cursor).or_insert(0) += 1;
                    *self.ends.entry(cursor + count).or_insert(0) += 1;
                    cursor += count;
                }
                'N' => cursor += count,
                'I' | 'S' | 'H' | 'P' => {}
                other => {
                    return Err(self.source.parse_error(format!(
                        "unknown CIGAR operation '{other}' in '{cigar}'"
                    )));
                }
            }
            count = 0;
        }
        Ok(())
    }

    /// Pull in reads that may affect the front of the coverage queue.
    fn load_reads_on_chrom(&mut self, chrom: &str) -> Result<()> {
        loop {
            let load = match &self.pending {
                Some(read) if read.chrom == chrom => {
                    let starts_min = self.starts.first_key_value().map(|(&k, _)| k);
                    let ends_min = self.ends.first_key_value().map(|(&k, _)| k);
                    match (starts_min, ends_min) {
                        (Some(s), Some(e)) => read.pos <= s || read.pos <= e,
                        _ => true,
                    }
                }
                _ => false,
            };
            if !load {
                return Ok(());
            }
            let read = self.pending.take().expect("pending checked above");
            self.store_read(read.pos, &read.cigar)?;
            self.read_line()?;
        }
    }

    fn close_ends_at(&mut self, pos: u64) -> Result<()> {
        while let Some((&end, &count)) = self.ends.first_key_value() {
            if end != pos {
                break;
            }
            self.ends.remove(&end);
            self.depth -= count as i64;
            if self.depth < 0 {
                return Err(SignalError::NegativeDepth {
                    chrom: self.chrom.as_deref().unwrap_or("?").to_string(),
                    pos,
                });
            }
        }
        Ok(())
    }

    /// Emit the next constant-depth run on the current chromosome.
    fn step_forward(&mut self, chrom: &Chrom) -> Interval {
        let start = if self.depth > 0 {
            self.finish
        } else {
            *self
                .starts
                .first_key_value()
                .expect("pending start when depth is 0")
                .0
        };

        if let Some((&s, &count)) = self.starts.first_key_value() {
            if s == start {
                self.starts.remove(&s);
                self.depth += count as i64;
            }
        }

        let ends_min = *self.ends.first_key_value().expect("open segment").0;
        self.finish = match self.starts.first_key_value() {
            Some((&s, _)) if s < ends_min => s,
            _ => ends_min,
        };
        Interval::new(chrom.clone(), start, self.finish, self.depth as f64)
    }

    fn next_coverage(&mut self) -> Result<Option<Interval>> {
        // Remaining business on the current chromosome.
        if let Some(chrom) = self.chrom.clone() {
            self.close_ends_at(self.finish)?;
            self.load_reads_on_chrom(&chrom)?;
            if !self.ends.is_empty() {
                return Ok(Some(self.step_forward(&chrom)));
            }
        }

        // Move to the next chromosome with alignments.
        self.depth = 0;
        let next_chrom = match &self.pending {
            Some(read) => read.chrom.clone(),
            None => return Ok(None),
        };
        let chrom = publish_chrom(&mut self.chrom, &next_chrom);
        self.load_reads_on_chrom(&chrom)?;
        if self.ends.is_empty() {
            return Ok(None);
        }
        Ok(Some(self.step_forward(&chrom)))
    }

    fn next_read_start(&mut self) -> Result<Option<Interval>> {
        let Some(read) = &self.pending else {
            return Ok(None);
        };
        let chrom_name = read.chrom.clone();
        let start = read.pos;
        let chrom = publish_chrom(&mut self.chrom, &chrom_name);

        let mut count = 0.0;
        while let Some(read) = &self.pending {
            if read.chrom != chrom_name || read.pos != start {
                break;
            }
            count += 1.0;
            self.read_line()?;
        }
        Ok(Some(Interval::new(chrom, start, start + 1, count)))
    }
}

impl SignalIter for SamReader {
    fn next_interval(&mut self) -> Result<Option<Interval>> {
        if self.done {
            return Ok(None);
        }
        loop {
            let iv = match self.mode {
                DepthMode::Coverage => self.next_coverage()?,
                DepthMode::ReadStart => self.next_read_start()?,
            };
            let Some(iv) = iv else {
                self.done = true;
                return Ok(None);
            };
            match &self.clip {
                None => return Ok(Some(iv)),
                Some(clip) => match clip.apply(iv) {
                    Clipped::Keep(iv) => return Ok(Some(iv)),
                    Clipped::Skip => continue,
                    Clipped::Stop => {
                        self.done = true;
                        return Ok(None);
                    }
                },
            }
        }
    }

    fn seek(&mut self, chrom: &str, start: u64, finish: u64) -> Result<()> {
        self.source.rewind()?;
        self.pending = None;
        self.guard.reset();
        self.starts.clear();
        self.ends.clear();
        self.chrom = None;
        self.finish = 0;
        self.depth = 0;
        self.done = false;
        self.clip = Some(RegionClip {
            chrom: chrom.to_string(),
            start,
            finish,
        });
        self.read_line()
    }

    fn default_value(&self) -> f64 {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::Cursor;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn sam_line(chrom: &str, pos: u64, cigar: &str) -> String {
        format!("read\t0\t{chrom}\t{pos}\t60\t{cigar}\t*\t0\t0\t*\t*\n")
    }

    fn reader_for(lines: &[(&str, u64, &str)], mode: DepthMode) -> Cursor {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "@HD\tVN:1.6\tSO:coordinate\n").unwrap();
        for (chrom, pos, cigar) in lines {
            write!(file, "{}", sam_line(chrom, *pos, cigar)).unwrap();
        }
        file.flush().unwrap();
        let (_, path) = file.keep().unwrap();
        Cursor::from_iter(SamReader::open(&path, mode).unwrap()).unwrap()
    }

    #[test]
    fn test_coverage_overlapping_reads() {
        // Alignments [1,5) [3,8) [6,10).
        let mut c = reader_for(
            &[("chr1", 1, "4M"), ("chr1", 3, "5M"), ("chr1", 6, "4M")],
            DepthMode::Coverage,
        );
        let out = c.drain().unwrap();
        assert_eq!(out, vec![
            Interval::new("chr1", 1, 3, 1.0),
            Interval::new("chr1", 3, 5, 2.0),
            Interval::new("chr1", 5, 6, 1.0),
            Interval::new("chr1", 6, 8, 2.0),
            Interval::new("chr1", 8, 10, 1.0),
        ]);
    }

    #[test]
    fn test_coverage_intron_skip_not_counted() {
        // 3M5N3M: covers [1,4) and [9,12), nothing in between.
        let mut c = reader_for(&[("chr1", 1, "3M5N3M")], DepthMode::Coverage);
        let out = c.drain().unwrap();
        assert_eq!(out, vec![
            Interval::new("chr1", 1, 4, 1.0),
            Interval::new("chr1", 9, 12, 1.0),
        ]);
    }

    #[test]
    fn test_coverage_soft_clip_ignored() {
        // 2S4M: the clip consumes no reference.
        let mut c = reader_for(&[("chr1", 10, "2S4M")], DepthMode::Coverage);
        let out = c.drain().unwrap();
        assert_eq!(out, vec![Interval::new("chr1", 10, 14, 1.0)]);
    }

    #[test]
    fn test_coverage_deletion_counted() {
        // 2M2D2M covers six reference bases in one run.
        let mut c = reader_for(&[("chr1", 1, "2M2D2M")], DepthMode::Coverage);
        let out = c.drain().unwrap();
        assert_eq!(out, vec![Interval::new("chr1", 1, 7, 1.0)]);
    }

    #[test]
    fn test_coverage_across_chromosomes() {
        let mut c = reader_for(
            &[("chr1", 1, "4M"), ("chr2", 5, "3M")],
            DepthMode::Coverage,
        );
        let out = c.drain().unwrap();
        assert_eq!(out, vec![
            Interval::new("chr1", 1, 5, 1.0),
            Interval::new("chr2", 5, 8, 1.0),
        ]);
    }

    #[test]
    fn test_read_start_counts() {
        let mut c = reader_for(
            &[("chr1", 5, "4M"), ("chr1", 5, "6M"), ("chr1", 9, "2M")],
            DepthMode::ReadStart,
        );
        let out = c.drain().unwrap();
        assert_eq!(out, vec![
            Interval::new("chr1", 5, 6, 2.0),
            Interval::new("chr1", 9, 10, 1.0),
        ]);
    }

    #[test]
    fn test_unsorted_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", sam_line("chr1", 9, "2M")).unwrap();
        write!(file, "{}", sam_line("chr1", 5, "4M")).unwrap();
        file.flush().unwrap();
        let (_, path) = file.keep().unwrap();

        let mut reader = SamReader::open(&path, DepthMode::Coverage).unwrap();
        let mut failed = false;
        loop {
            match reader.next_interval() {
                Ok(Some(_)) => continue,
                Ok(None) => break,
                Err(_) => {
                    failed = true;
                    break;
                }
            }
        }
        assert!(failed);
    }

    #[test]
    fn test_bad_cigar_rejected() {
        let mut c = reader_for(&[("chr1", 1, "4Q")], DepthMode::Coverage);
        assert!(c.drain().is_err());
    }

    #[test]
    fn test_seek_restarts_from_top() {
        let mut c = reader_for(
            &[("chr1", 1, "4M"), ("chr1", 3, "5M"), ("chr1", 6, "4M")],
            DepthMode::Coverage,
        );
        c.drain().unwrap();
        c.seek("chr1", 4, 7).unwrap();
        let out = c.drain().unwrap();
        assert_eq!(out, vec![
            Interval::new("chr1", 4, 5, 2.0),
            Interval::new("chr1", 5, 6, 1.0),
            Interval::new("chr1", 6, 7, 2.0),
        ]);
    }
}
