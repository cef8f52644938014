//! Leaf readers: adapt external track formats to the iterator contract.
//!
//! ASCII formats (wiggle/bedGraph, BED interval lists, SAM alignments, VCF
//! variant calls) are parsed here. Indexed binary formats (bigWig, bigBed,
//! BAM, BCF) are external collaborators: [`indexed::TrackDecoder`] is the
//! pull contract they implement, and [`indexed::IndexedReader`] lifts any
//! decoder into the engine behind the buffered producer.

pub mod bed;
pub mod indexed;
pub mod sam;
pub mod vcf;
pub mod wig;

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use crate::config::PipelineOptions;
use crate::error::{Result, SignalError};
use crate::interval::{Chrom, Interval};
use crate::ops::unary::Compress;
use crate::signal::{Cursor, SignalIter};

/// Open a track file, recognizing the format from its suffix.
pub fn open_track(path: &Path, options: PipelineOptions) -> Result<Box<dyn SignalIter>> {
    let name = path.to_string_lossy();
    if name == "-" {
        return Ok(wig_boxed(wig::WigReader::open(path)?)?);
    }
    let lower = name.to_ascii_lowercase();
    if lower.ends_with(".wig") || lower.ends_with(".bg") {
        wig_boxed(wig::WigReader::open(path)?)
    } else if lower.ends_with(".bed") {
        Ok(Box::new(bed::BedTrackReader::open(path)?))
    } else if lower.ends_with(".sam") {
        Ok(Box::new(sam::SamReader::open(path, sam::DepthMode::Coverage)?))
    } else if lower.ends_with(".vcf") {
        Ok(Box::new(vcf::VcfReader::open(path)?))
    } else if lower.ends_with(".bw")
        || lower.ends_with(".bigwig")
        || lower.ends_with(".bb")
        || lower.ends_with(".bigbed")
        || lower.ends_with(".bam")
        || lower.ends_with(".cram")
        || lower.ends_with(".bcf")
    {
        // Indexed binary formats come in through a TrackDecoder; the CLI
        // has none registered.
        let _ = options;
        Err(SignalError::Command(format!(
            "{name}: indexed binary formats need a decoder (see readers::indexed::TrackDecoder)"
        )))
    } else {
        Err(SignalError::Command(format!(
            "could not recognize file format from suffix: {name}"
        )))
    }
}

fn wig_boxed(reader: wig::WigReader) -> Result<Box<dyn SignalIter>> {
    // Wiggle files repeat values base by base; coalesce equal runs on the
    // way in.
    Ok(Box::new(Compress::new(Cursor::from_iter(reader)?)))
}

/// A line-oriented text source, reopenable for seek-by-rewind.
pub(crate) struct TextSource {
    path: PathBuf,
    reader: Option<Box<dyn BufRead>>,
    line: String,
    line_number: usize,
}

impl TextSource {
    pub fn open(path: &Path) -> Result<Self> {
        let mut source = Self {
            path: path.to_path_buf(),
            reader: None,
            line: String::with_capacity(1024),
            line_number: 0,
        };
        source.reader = Some(source.make_reader()?);
        Ok(source)
    }

    fn make_reader(&self) -> Result<Box<dyn BufRead>> {
        if self.is_stdin() {
            Ok(Box::new(io::stdin().lock()))
        } else {
            let file = File::open(&self.path)?;
            Ok(Box::new(BufReader::with_capacity(256 * 1024, file)))
        }
    }

    pub fn is_stdin(&self) -> bool {
        self.path.as_os_str() == "-"
    }

    pub fn display(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }

    pub fn line_number(&self) -> usize {
        self.line_number
    }

    /// Reopen the file from the top.
    pub fn rewind(&mut self) -> Result<()> {
        if self.is_stdin() {
            return Err(SignalError::SeekUnsupported("a stdin stream"));
        }
        self.line_number = 0;
        self.reader = Some(self.make_reader()?);
        Ok(())
    }

    /// Next line with trailing newline removed; `None` at end of file.
    pub fn next_line(&mut self) -> Result<Option<&str>> {
        let Some(reader) = self.reader.as_mut() else {
            return Ok(None);
        };
        self.line.clear();
        let bytes = reader.read_line(&mut self.line)?;
        if bytes == 0 {
            self.reader = None;
            return Ok(None);
        }
        self.line_number += 1;
        Ok(Some(self.line.trim_end_matches(['\n', '\r'])))
    }

    pub fn parse_error(&self, message: impl Into<String>) -> SignalError {
        SignalError::Parse {
            path: self.display(),
            line: self.line_number,
            message: message.into(),
        }
    }
}

/// Running check that records arrive in (chrom, start) order, chromosomes
/// lexicographic.
#[derive(Default)]
pub(crate) struct SortGuard {
    prev_chrom: Option<String>,
    prev_start: u64,
}

impl SortGuard {
    pub fn check(&mut self, path: &str, chrom: &str, start: u64) -> Result<()> {
        if let Some(prev) = &self.prev_chrom {
            let backwards = match prev.as_str().cmp(chrom) {
                std::cmp::Ordering::Less => false,
                std::cmp::Ordering::Equal => start < self.prev_start,
                std::cmp::Ordering::Greater => true,
            };
            if backwards {
                return Err(SignalError::Unsorted {
                    path: path.to_string(),
                    chrom: chrom.to_string(),
                    start,
                    prev_chrom: prev.clone(),
                    prev_start: self.prev_start,
                });
            }
            if prev != chrom {
                self.prev_chrom = Some(chrom.to_string());
            }
        } else {
            self.prev_chrom = Some(chrom.to_string());
        }
        self.prev_start = start;
        Ok(())
    }

    pub fn reset(&mut self) {
        self.prev_chrom = None;
        self.prev_start = 0;
    }
}

/// Outcome of clipping an interval against a seek region.
pub(crate) enum Clipped {
    Keep(Interval),
    Skip,
    Stop,
}

/// The target of the last seek, applied to every decoded interval.
#[derive(Debug, Clone)]
pub(crate) struct RegionClip {
    pub chrom: String,
    pub start: u64,
    pub finish: u64,
}

impl RegionClip {
    pub fn apply(&self, mut iv: Interval) -> Clipped {
        match iv.chrom.as_ref().cmp(self.chrom.as_str()) {
            std::cmp::Ordering::Less => Clipped::Skip,
            std::cmp::Ordering::Greater => Clipped::Stop,
            std::cmp::Ordering::Equal => {
                if iv.finish <= self.start {
                    Clipped::Skip
                } else if iv.start >= self.finish {
                    Clipped::Stop
                } else {
                    iv.start = iv.start.max(self.start);
                    iv.finish = iv.finish.min(self.finish);
                    Clipped::Keep(iv)
                }
            }
        }
    }
}

/// Reuse the current chromosome allocation while the name matches,
/// publishing a fresh one on change.
#[inline]
pub(crate) fn publish_chrom(current: &mut Option<Chrom>, name: &str) -> Chrom {
    match current {
        Some(c) if c.as_ref() == name => c.clone(),
        _ => {
            let fresh: Chrom = name.into();
            *current = Some(fresh.clone());
            fresh
        }
    }
}
