//! Background decoding behind a bounded block queue.
//!
//! Expensive leaf decoders run on their own thread and hand fixed-size
//! blocks of intervals to the foreground iterator through a bounded
//! channel. The channel capacity bounds how far the decoder may run ahead;
//! block granularity amortises signalling. A shared kill flag plus dropping
//! the receiver cancels the decoder on seek or teardown, after which the
//! decoder is relaunched with the new target region.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{bounded, Receiver, Sender};
use log::debug;

use crate::config::PipelineOptions;
use crate::error::{Result, SignalError};
use crate::interval::Interval;
use crate::signal::SignalIter;

type Block = Vec<Interval>;

/// Target region of a pending seek.
#[derive(Debug, Clone)]
pub struct SeekTarget {
    pub chrom: String,
    pub start: u64,
    pub finish: u64,
}

/// Where a decode task writes its output.
///
/// `push` fails once the consumer has cancelled the task; the decoder is
/// expected to bail out with the error it is handed.
pub struct BlockSink {
    tx: Sender<Result<Block>>,
    buf: Block,
    block_size: usize,
    kill: Arc<AtomicBool>,
}

impl BlockSink {
    fn cancelled() -> SignalError {
        SignalError::Command("decode task cancelled".to_string())
    }

    pub fn push(&mut self, iv: Interval) -> Result<()> {
        self.buf.push(iv);
        if self.buf.len() >= self.block_size {
            self.flush()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if self.kill.load(Ordering::Acquire) {
            return Err(Self::cancelled());
        }
        if self.buf.is_empty() {
            return Ok(());
        }
        let block = std::mem::replace(&mut self.buf, Vec::with_capacity(self.block_size));
        self.tx
            .send(Ok(block))
            .map_err(|_| Self::cancelled())
    }
}

/// One run of a decoder, producing sorted intervals into the sink.
pub type DecodeTask = Box<dyn FnOnce(&mut BlockSink) -> Result<()> + Send>;

/// Recreates the decode task, optionally restricted to a region.
pub type DecodeFactory = Box<dyn Fn(Option<&SeekTarget>) -> DecodeTask>;

struct Running {
    rx: Receiver<Result<Block>>,
    kill: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

/// A leaf iterator whose decoding runs on a background thread.
pub struct BufferedIter {
    factory: DecodeFactory,
    default_value: f64,
    overlaps: bool,
    options: PipelineOptions,
    state: Option<Running>,
    block: std::vec::IntoIter<Interval>,
    target: Option<SeekTarget>,
    finished: bool,
}

impl BufferedIter {
    pub fn new(
        factory: DecodeFactory,
        default_value: f64,
        overlaps: bool,
        options: PipelineOptions,
    ) -> Self {
        let mut iter = Self {
            factory,
            default_value,
            overlaps,
            options,
            state: None,
            block: Vec::new().into_iter(),
            target: None,
            finished: false,
        };
        if options.eager {
            iter.launch();
        }
        iter
    }

    fn launch(&mut self) {
        debug_assert!(self.state.is_none());
        let (tx, rx) = bounded(self.options.max_head_start);
        let kill = Arc::new(AtomicBool::new(false));
        let task = (self.factory)(self.target.as_ref());
        let mut sink = BlockSink {
            tx,
            buf: Vec::with_capacity(self.options.block_size),
            block_size: self.options.block_size,
            kill: kill.clone(),
        };
        let thread_kill = kill.clone();
        let handle = std::thread::spawn(move || {
            let outcome = task(&mut sink).and_then(|()| sink.flush());
            if let Err(e) = outcome {
                if !thread_kill.load(Ordering::Acquire) {
                    // Forward the failure in-band; the consumer raises it
                    // at its next pull.
                    let _ = sink.tx.send(Err(e));
                }
            }
        });
        debug!("launched background decoder");
        self.state = Some(Running { rx, kill, handle });
        self.finished = false;
    }

    fn kill(&mut self) {
        if let Some(running) = self.state.take() {
            running.kill.store(true, Ordering::Release);
            // Drain so a producer blocked on a full queue wakes up, then
            // drop the receiver and join.
            while running.rx.try_recv().is_ok() {}
            drop(running.rx);
            let _ = running.handle.join();
            debug!("joined background decoder");
        }
        self.block = Vec::new().into_iter();
    }

    /// Clip an interval against the pending seek target. Returns
    /// `Ok(None)` to skip, `Err(())` to stop the stream.
    fn clip(&self, mut iv: Interval) -> std::result::Result<Option<Interval>, ()> {
        let Some(target) = &self.target else {
            return Ok(Some(iv));
        };
        match iv.chrom.as_ref().cmp(target.chrom.as_str()) {
            std::cmp::Ordering::Less => Ok(None),
            std::cmp::Ordering::Greater => Err(()),
            std::cmp::Ordering::Equal => {
                if iv.finish <= target.start {
                    Ok(None)
                } else if iv.start >= target.finish {
                    Err(())
                } else {
                    iv.start = iv.start.max(target.start);
                    iv.finish = iv.finish.min(target.finish);
                    Ok(Some(iv))
                }
            }
        }
    }
}

impl SignalIter for BufferedIter {
    fn next_interval(&mut self) -> Result<Option<Interval>> {
        if self.finished {
            return Ok(None);
        }
        if self.state.is_none() {
            self.launch();
        }
        loop {
            if let Some(iv) = self.block.next() {
                match self.clip(iv) {
                    Ok(Some(iv)) => return Ok(Some(iv)),
                    Ok(None) => continue,
                    Err(()) => {
                        self.kill();
                        self.finished = true;
                        return Ok(None);
                    }
                }
            }
            let running = self.state.as_ref().expect("decoder running");
            match running.rx.recv() {
                Ok(Ok(block)) => {
                    self.block = block.into_iter();
                }
                Ok(Err(e)) => {
                    self.kill();
                    self.finished = true;
                    return Err(e);
                }
                Err(_) => {
                    // Producer closed the channel: stream complete.
                    if let Some(running) = self.state.take() {
                        let _ = running.handle.join();
                    }
                    self.finished = true;
                    return Ok(None);
                }
            }
        }
    }

    fn seek(&mut self, chrom: &str, start: u64, finish: u64) -> Result<()> {
        self.kill();
        self.target = Some(SeekTarget {
            chrom: chrom.to_string(),
            start,
            finish,
        });
        self.launch();
        Ok(())
    }

    fn default_value(&self) -> f64 {
        self.default_value
    }

    fn overlaps(&self) -> bool {
        self.overlaps
    }
}

impl Drop for BufferedIter {
    fn drop(&mut self) {
        self.kill();
    }
}
