//! The seam for indexed binary formats.
//!
//! Decoders for block-compressed tracks (bigWig, bigBed) and archive
//! formats (BAM, BCF) are external collaborators; [`TrackDecoder`] is the
//! pull contract they implement. [`IndexedReader::spawn`] lifts any decoder
//! into the engine: chromosomes are walked in lexicographic order, each
//! chromosome streams in position order, and decoding runs on a background
//! thread behind the bounded block queue.

use std::sync::{Arc, Mutex};

use crate::buffered::{BufferedIter, DecodeFactory, SeekTarget};
use crate::config::PipelineOptions;
use crate::error::{Result, SignalError};
use crate::interval::Interval;

/// Random-access decoder over one indexed track.
pub trait TrackDecoder: Send + 'static {
    /// Chromosome names present in the index, in lexicographic order.
    fn chromosomes(&mut self) -> Result<Vec<String>>;

    /// Decode intervals overlapping `range` on `chrom` (the entire
    /// chromosome when `range` is `None`), in position order, into `sink`.
    fn decode(
        &mut self,
        chrom: &str,
        range: Option<(u64, u64)>,
        sink: &mut dyn FnMut(Interval) -> Result<()>,
    ) -> Result<()>;

    /// The value implicitly covering unreported gaps.
    fn default_value(&self) -> f64 {
        0.0
    }

    /// Whether decoded intervals may overlap.
    fn overlaps(&self) -> bool {
        false
    }
}

/// Adapter lifting a [`TrackDecoder`] into a buffered leaf iterator.
pub struct IndexedReader;

impl IndexedReader {
    pub fn spawn<D: TrackDecoder>(decoder: D, options: PipelineOptions) -> BufferedIter {
        let default_value = decoder.default_value();
        let overlaps = decoder.overlaps();
        let shared = Arc::new(Mutex::new(decoder));

        let factory: DecodeFactory = Box::new(move |target: Option<&SeekTarget>| {
            let shared = shared.clone();
            let target = target.cloned();
            Box::new(move |sink| {
                let mut decoder = shared
                    .lock()
                    .map_err(|_| SignalError::Command("decoder lock poisoned".to_string()))?;
                match &target {
                    Some(t) => {
                        decoder.decode(&t.chrom, Some((t.start, t.finish)), &mut |iv| {
                            sink.push(iv)
                        })
                    }
                    None => {
                        let mut chroms = decoder.chromosomes()?;
                        chroms.sort_unstable();
                        for chrom in chroms {
                            decoder.decode(&chrom, None, &mut |iv| sink.push(iv))?;
                        }
                        Ok(())
                    }
                }
            })
        });

        BufferedIter::new(factory, default_value, overlaps, options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::Cursor;

    /// In-memory decoder standing in for a block-compressed track.
    struct MemoryDecoder {
        per_chrom: Vec<(String, Vec<(u64, u64, f64)>)>,
    }

    impl TrackDecoder for MemoryDecoder {
        fn chromosomes(&mut self) -> Result<Vec<String>> {
            Ok(self.per_chrom.iter().map(|(c, _)| c.clone()).collect())
        }

        fn decode(
            &mut self,
            chrom: &str,
            range: Option<(u64, u64)>,
            sink: &mut dyn FnMut(Interval) -> Result<()>,
        ) -> Result<()> {
            for (name, intervals) in &self.per_chrom {
                if name != chrom {
                    continue;
                }
                for &(start, finish, value) in intervals {
                    if let Some((from, to)) = range {
                        if finish <= from || start >= to {
                            continue;
                        }
                    }
                    sink(Interval::new(name.as_str(), start, finish, value))?;
                }
            }
            Ok(())
        }
    }

    fn sample_decoder() -> MemoryDecoder {
        MemoryDecoder {
            // Deliberately out of lexicographic order.
            per_chrom: vec![
                ("chr2".to_string(), vec![(1, 5, 3.0)]),
                ("chr1".to_string(), vec![(10, 20, 1.0), (30, 40, 2.0)]),
            ],
        }
    }

    #[test]
    fn test_chromosomes_walked_in_order() {
        let iter = IndexedReader::spawn(sample_decoder(), PipelineOptions::default());
        let mut c = Cursor::from_iter(iter).unwrap();
        let out = c.drain().unwrap();
        assert_eq!(out, vec![
            Interval::new("chr1", 10, 20, 1.0),
            Interval::new("chr1", 30, 40, 2.0),
            Interval::new("chr2", 1, 5, 3.0),
        ]);
    }

    #[test]
    fn test_seek_uses_index() {
        let iter = IndexedReader::spawn(sample_decoder(), PipelineOptions::default());
        let mut c = Cursor::from_iter(iter).unwrap();
        c.seek("chr1", 15, 35).unwrap();
        let out = c.drain().unwrap();
        assert_eq!(out, vec![
            Interval::new("chr1", 15, 20, 1.0),
            Interval::new("chr1", 30, 35, 2.0),
        ]);
    }
}
