//! Reader for sorted interval lists (BED).
//!
//! Intervals come out with value 1 (or the numeric score column when
//! requested), converted from the 0-based half-open coordinates of the
//! format. Interval lists may legitimately overlap, so the stream
//! advertises `overlaps = true` and is collapsed through the union operator
//! before any computation that assumes non-overlap.

use std::path::Path;

use memchr::memchr;

use crate::error::Result;
use crate::interval::{Chrom, Interval, Strand};
use crate::readers::{publish_chrom, Clipped, RegionClip, SortGuard, TextSource};
use crate::signal::SignalIter;

pub struct BedTrackReader {
    source: TextSource,
    use_score: bool,
    chrom: Option<Chrom>,
    guard: SortGuard,
    clip: Option<RegionClip>,
    done: bool,
}

impl BedTrackReader {
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self {
            source: TextSource::open(path)?,
            use_score: false,
            chrom: None,
            guard: SortGuard::default(),
            clip: None,
            done: false,
        })
    }

    /// Value intervals from the score column instead of 1.
    pub fn with_score(mut self) -> Self {
        self.use_score = true;
        self
    }

    fn read_raw(&mut self) -> Result<Option<Interval>> {
        loop {
            let line = match self.source.next_line()? {
                Some(line) => line.to_string(),
                None => return Ok(None),
            };
            let bytes = line.as_bytes();
            if bytes.is_empty()
                || bytes[0] == b'#'
                || line.starts_with("track")
                || line.starts_with("browser")
            {
                continue;
            }

            // BED3 fields split on the first two tabs; the rest of the
            // line is optional columns.
            let tab1 = memchr(b'\t', bytes)
                .ok_or_else(|| self.source.parse_error("expected at least 3 fields"))?;
            let rest = &line[tab1 + 1..];
            let tab2 = memchr(b'\t', rest.as_bytes())
                .ok_or_else(|| self.source.parse_error("expected at least 3 fields"))?;

            let chrom_name = &line[..tab1];
            let mut fields = rest[tab2 + 1..].split('\t');
            let finish_field = fields
                .next()
                .ok_or_else(|| self.source.parse_error("expected at least 3 fields"))?;

            let start: u64 = rest[..tab2].parse().map_err(|_| {
                self.source
                    .parse_error(format!("invalid start position '{}'", &rest[..tab2]))
            })?;
            let finish: u64 = finish_field.parse().map_err(|_| {
                self.source
                    .parse_error(format!("invalid end position '{finish_field}'"))
            })?;
            if finish < start {
                return Err(self
                    .source
                    .parse_error(format!("start ({start}) > end ({finish})")));
            }
            if finish == start {
                continue;
            }

            let _name = fields.next();
            let score = fields.next();
            let strand = fields
                .next()
                .and_then(|s| s.chars().next())
                .map(Strand::from_char)
                .unwrap_or_default();

            let value = if self.use_score {
                match score {
                    Some(s) => s.parse().map_err(|_| {
                        self.source.parse_error(format!("invalid score '{s}'"))
                    })?,
                    None => {
                        return Err(self.source.parse_error("missing score column"));
                    }
                }
            } else {
                1.0
            };

            // Conversion from 0-based to the engine's 1-based space.
            let mut iv = Interval::new(
                publish_chrom(&mut self.chrom, chrom_name),
                start + 1,
                finish + 1,
                value,
            );
            iv.strand = strand;
            self.guard
                .check(&self.source.display(), &iv.chrom, iv.start)?;
            return Ok(Some(iv));
        }
    }
}

impl SignalIter for BedTrackReader {
    fn next_interval(&mut self) -> Result<Option<Interval>> {
        if self.done {
            return Ok(None);
        }
        loop {
            let Some(iv) = self.read_raw()? else {
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
        self.chrom = None;
        self.guard.reset();
        self.done = false;
        self.clip = Some(RegionClip {
            chrom: chrom.to_string(),
            start,
            finish,
        });
        Ok(())
    }

    fn default_value(&self) -> f64 {
        0.0
    }

    fn overlaps(&self) -> bool {
        true
    }
}
