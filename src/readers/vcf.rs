//! Variant-call leaf: one unit-value interval per record at the call
//! position.

use std::path::Path;

use memchr::memchr;

use crate::error::Result;
use crate::interval::{Chrom, Interval};
use crate::readers::{publish_chrom, Clipped, RegionClip, SortGuard, TextSource};
use crate::signal::SignalIter;

pub struct VcfReader {
    source: TextSource,
    chrom: Option<Chrom>,
    guard: SortGuard,
    clip: Option<RegionClip>,
    done: bool,
}

impl VcfReader {
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self {
            source: TextSource::open(path)?,
            chrom: None,
            guard: SortGuard::default(),
            clip: None,
            done: false,
        })
    }

    fn read_raw(&mut self) -> Result<Option<Interval>> {
        loop {
            let line = match self.source.next_line()? {
                Some(line) => line.to_string(),
                None => return Ok(None),
            };
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let bytes = line.as_bytes();
            let tab1 = memchr(b'\t', bytes)
                .ok_or_else(|| self.source.parse_error("expected CHROM and POS fields"))?;
            let rest = &line[tab1 + 1..];
            let pos_end = memchr(b'\t', rest.as_bytes()).unwrap_or(rest.len());
            let pos_field = &rest[..pos_end];

            let pos: u64 = pos_field.parse().map_err(|_| {
                self.source
                    .parse_error(format!("invalid position '{pos_field}'"))
            })?;

            let chrom_name = &line[..tab1];
            self.guard.check(&self.source.display(), chrom_name, pos)?;
            let chrom = publish_chrom(&mut self.chrom, chrom_name);
            return Ok(Some(Interval::new(chrom, pos, pos + 1, 1.0)));
        }
    }
}

impl SignalIter for VcfReader {
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
