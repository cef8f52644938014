//! Reader for step/graph ASCII tracks (wiggle and bedGraph).
//!
//! Three line formats share one file: `fixedStep` and `variableStep`
//! headers introduce 1-based value lines, and four-column lines are
//! 0-based half-open bedGraph records. The format of each data line is
//! recognized from its field count, so the three can be mixed the way
//! genome browsers emit them.

use std::path::Path;

use rustc_hash::FxHashMap;

use crate::error::Result;
use crate::interval::{Chrom, Interval};
use crate::readers::{publish_chrom, Clipped, RegionClip, SortGuard, TextSource};
use crate::signal::SignalIter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    FixedStep,
    VariableStep,
    Graph,
}

pub struct WigReader {
    source: TextSource,
    mode: Mode,
    step: u64,
    span: u64,
    chrom: Option<Chrom>,
    /// Start of the next fixedStep value line.
    fixed_start: u64,
    guard: SortGuard,
    clip: Option<RegionClip>,
    done: bool,
}

impl WigReader {
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self {
            source: TextSource::open(path)?,
            mode: Mode::Graph,
            step: 1,
            span: 1,
            chrom: None,
            fixed_start: 0,
            guard: SortGuard::default(),
            clip: None,
            done: false,
        })
    }

    fn read_header(&mut self, line: &str, mode: Mode) -> Result<()> {
        let mut fields: FxHashMap<&str, &str> = FxHashMap::default();
        for token in line.split_whitespace().skip(1) {
            let Some((key, value)) = token.split_once('=') else {
                return Err(self.source.parse_error(format!(
                    "malformed header field '{token}'"
                )));
            };
            fields.insert(key, value);
        }

        self.mode = mode;
        self.span = match fields.get("span") {
            Some(s) => s
                .parse()
                .map_err(|_| self.source.parse_error(format!("invalid span '{s}'")))?,
            None => 1,
        };

        let chrom = *fields
            .get("chrom")
            .ok_or_else(|| self.source.parse_error("header missing chrom"))?;
        publish_chrom(&mut self.chrom, chrom);

        if mode == Mode::FixedStep {
            self.fixed_start = match fields.get("start") {
                Some(s) => s
                    .parse()
                    .map_err(|_| self.source.parse_error(format!("invalid start '{s}'")))?,
                None => return Err(self.source.parse_error("fixedStep header missing start")),
            };
            self.step = match fields.get("step") {
                Some(s) => s
                    .parse()
                    .map_err(|_| self.source.parse_error(format!("invalid step '{s}'")))?,
                None => return Err(self.source.parse_error("fixedStep header missing step")),
            };
        }
        Ok(())
    }

    fn parse_value(&self, s: &str) -> Result<f64> {
        s.parse()
            .map_err(|_| self.source.parse_error(format!("invalid value '{s}'")))
    }

    fn parse_pos(&self, s: &str) -> Result<u64> {
        s.parse()
            .map_err(|_| self.source.parse_error(format!("invalid position '{s}'")))
    }

    /// Parse one record from the file, ignoring the seek clip.
    fn read_raw(&mut self) -> Result<Option<Interval>> {
        loop {
            let line = match self.source.next_line()? {
                Some(line) => line.trim_start().to_string(),
                None => return Ok(None),
            };
            let line = line.as_str();
            if line.is_empty()
                || line.starts_with('#')
                || line.starts_with("track")
                || line.starts_with("browser")
            {
                continue;
            }
            if line.starts_with("variableStep") {
                self.read_header(line, Mode::VariableStep)?;
                continue;
            }
            if line.starts_with("fixedStep") {
                self.read_header(line, Mode::FixedStep)?;
                continue;
            }

            let mut fields = line.split_whitespace();
            let (a, b, c, d) = (
                fields.next(),
                fields.next(),
                fields.next(),
                fields.next(),
            );
            if fields.next().is_some() {
                return Err(self.source.parse_error("too many columns"));
            }

            let iv = match (a, b, c, d) {
                (Some(chrom), Some(start), Some(finish), Some(value)) => {
                    self.mode = Mode::Graph;
                    let chrom = publish_chrom(&mut self.chrom, chrom);
                    // bedGraph coordinates are 0-based half-open.
                    let start = self.parse_pos(start)? + 1;
                    let finish = self.parse_pos(finish)? + 1;
                    Interval::new(chrom, start, finish, self.parse_value(value)?)
                }
                (Some(start), Some(value), None, None) => {
                    if self.mode != Mode::VariableStep {
                        return Err(self
                            .source
                            .parse_error(format!("badly formatted wiggle line: {line}")));
                    }
                    let chrom = self.chrom.clone().expect("header sets chrom");
                    let start = self.parse_pos(start)?;
                    Interval::new(chrom, start, start + self.span, self.parse_value(value)?)
                }
                (Some(value), None, None, None) => {
                    if self.mode != Mode::FixedStep {
                        return Err(self
                            .source
                            .parse_error(format!("badly formatted wiggle line: {line}")));
                    }
                    let chrom = self.chrom.clone().expect("header sets chrom");
                    let start = self.fixed_start;
                    self.fixed_start += self.step;
                    Interval::new(chrom, start, start + self.span, self.parse_value(value)?)
                }
                _ => {
                    return Err(self
                        .source
                        .parse_error(format!("badly formatted wiggle line: {line}")))
                }
            };

            if iv.start >= iv.finish {
                return Err(self.source.parse_error(format!(
                    "empty interval {}:{}-{}",
                    iv.chrom, iv.start, iv.finish
                )));
            }
            self.guard
                .check(&self.source.display(), &iv.chrom, iv.start)?;
            return Ok(Some(iv));
        }
    }
}

impl SignalIter for WigReader {
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
        self.mode = Mode::Graph;
        self.step = 1;
        self.span = 1;
        self.chrom = None;
        self.fixed_start = 0;
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
}
