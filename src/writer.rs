//! ASCII output: adaptive fixedStep/bedGraph writing, the mid-pipeline
//! tee, paste mode, and the multi-column apply output.
//!
//! The writer switches formats on the fly: runs of short intervals print as
//! `fixedStep` value lines at 1-base resolution, longer intervals as
//! 0-based half-open bedGraph rows. A tee forwards its stream unchanged
//! while a background thread formats blocks of intervals pulled off a
//! bounded channel.

use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::thread::JoinHandle;

use crossbeam_channel::{bounded, Sender};
use log::debug;

use crate::apply::Apply;
use crate::error::{Result, SignalError};
use crate::interval::Interval;
use crate::signal::{Cursor, SignalIter};

const BLOCK_LENGTH: usize = 10_000;
const MAX_OUT_BLOCKS: usize = 2;

/// Interval length below which the writer drops into step mode.
const STEP_ENTER_BELOW: u64 = 2;
/// Interval length above which the writer returns to graph mode.
const GRAPH_ENTER_ABOVE: u64 = 5;

/// Streaming formatter for one output file.
pub struct TrackWriter<W: Write> {
    out: BufWriter<W>,
    itoa_buf: itoa::Buffer,
    ryu_buf: ryu::Buffer,
    force_graph: bool,
    point_mode: bool,
    last_chrom: Option<String>,
    last_finish: u64,
}

impl<W: Write> TrackWriter<W> {
    pub fn new(out: W, force_graph: bool) -> Self {
        Self {
            out: BufWriter::with_capacity(1 << 20, out),
            itoa_buf: itoa::Buffer::new(),
            ryu_buf: ryu::Buffer::new(),
            force_graph,
            point_mode: false,
            last_chrom: None,
            last_finish: 0,
        }
    }

    pub fn write_interval(&mut self, iv: &Interval) -> Result<()> {
        let mut make_header = false;
        if !self.force_graph && iv.len() < STEP_ENTER_BELOW && !self.point_mode {
            self.point_mode = true;
            make_header = true;
        } else if iv.len() > GRAPH_ENTER_ABOVE && self.point_mode {
            self.point_mode = false;
        }

        if self.point_mode {
            let chrom_changed = self.last_chrom.as_deref() != Some(iv.chrom.as_ref());
            if make_header || chrom_changed || iv.start != self.last_finish {
                self.out.write_all(b"fixedStep chrom=")?;
                self.out.write_all(iv.chrom.as_bytes())?;
                self.out.write_all(b" start=")?;
                self.out
                    .write_all(self.itoa_buf.format(iv.start).as_bytes())?;
                self.out.write_all(b" step=1\n")?;
            }
            let value = self.ryu_buf.format(iv.value).to_string();
            for _ in 0..iv.len() {
                self.out.write_all(value.as_bytes())?;
                self.out.write_all(b"\n")?;
            }
        } else {
            // bedGraph rows are 0-based half-open.
            self.out.write_all(iv.chrom.as_bytes())?;
            self.out.write_all(b"\t")?;
            self.out
                .write_all(self.itoa_buf.format(iv.start - 1).as_bytes())?;
            self.out.write_all(b"\t")?;
            self.out
                .write_all(self.itoa_buf.format(iv.finish - 1).as_bytes())?;
            self.out.write_all(b"\t")?;
            self.out
                .write_all(self.ryu_buf.format(iv.value).as_bytes())?;
            self.out.write_all(b"\n")?;
        }

        if self.last_chrom.as_deref() != Some(iv.chrom.as_ref()) {
            self.last_chrom = Some(iv.chrom.to_string());
        }
        self.last_finish = iv.finish;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }
}

pub type BoxedOut = Box<dyn Write + Send>;

struct WriterThread {
    tx: Sender<Vec<Interval>>,
    kill: std::sync::Arc<std::sync::atomic::AtomicBool>,
    handle: JoinHandle<(TrackWriter<BoxedOut>, Result<()>)>,
}

/// Pass-through operator writing its stream to a file as it flows by.
///
/// Formatting runs on a background thread fed blocks through a bounded
/// channel, so the foreground algebra never waits on the disk unless the
/// formatter falls a few blocks behind.
pub struct Tee {
    source: Cursor,
    state: Option<WriterThread>,
    block: Vec<Interval>,
    finalized: bool,
}

impl Tee {
    pub fn new(source: Cursor, out: BoxedOut, force_graph: bool) -> Self {
        let force_graph = force_graph || source.overlaps();
        let mut tee = Self {
            source,
            state: None,
            block: Vec::with_capacity(BLOCK_LENGTH),
            finalized: false,
        };
        tee.launch(TrackWriter::new(out, force_graph));
        tee
    }

    fn launch(&mut self, mut writer: TrackWriter<BoxedOut>) {
        let (tx, rx) = bounded::<Vec<Interval>>(MAX_OUT_BLOCKS);
        let kill = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
        let thread_kill = kill.clone();
        let handle = std::thread::spawn(move || {
            let mut outcome = Ok(());
            for block in rx {
                if thread_kill.load(std::sync::atomic::Ordering::Acquire) {
                    break;
                }
                for iv in &block {
                    if let Err(e) = writer.write_interval(iv) {
                        outcome = Err(e);
                        return (writer, outcome);
                    }
                }
            }
            if outcome.is_ok() {
                outcome = writer.flush();
            }
            (writer, outcome)
        });
        debug!("launched background formatter");
        self.state = Some(WriterThread { tx, kill, handle });
    }

    /// Stop the formatter, discarding anything still queued, and hand the
    /// writer back for relaunch.
    fn kill(&mut self) -> Result<Option<TrackWriter<BoxedOut>>> {
        let Some(state) = self.state.take() else {
            return Ok(None);
        };
        state
            .kill
            .store(true, std::sync::atomic::Ordering::Release);
        drop(state.tx);
        let (writer, outcome) = state
            .handle
            .join()
            .map_err(|_| SignalError::Command("formatter thread panicked".to_string()))?;
        outcome?;
        self.block.clear();
        Ok(Some(writer))
    }

    fn send_block(&mut self) -> Result<()> {
        if self.block.is_empty() {
            return Ok(());
        }
        let block = std::mem::replace(&mut self.block, Vec::with_capacity(BLOCK_LENGTH));
        let state = self.state.as_ref().expect("formatter running");
        if state.tx.send(block).is_err() {
            // The formatter bailed out; join it to surface the error.
            self.kill()?;
            return Err(SignalError::Command(
                "background formatter stopped early".to_string(),
            ));
        }
        Ok(())
    }

    fn finalize(&mut self) -> Result<()> {
        if self.finalized {
            return Ok(());
        }
        self.finalized = true;
        self.send_block()?;
        if let Some(state) = self.state.take() {
            drop(state.tx);
            let (_writer, outcome) = state
                .handle
                .join()
                .map_err(|_| SignalError::Command("formatter thread panicked".to_string()))?;
            outcome?;
        }
        Ok(())
    }
}

impl SignalIter for Tee {
    fn next_interval(&mut self) -> Result<Option<Interval>> {
        match self.source.take_head()? {
            Some(iv) => {
                self.block.push(iv.clone());
                if self.block.len() >= BLOCK_LENGTH {
                    self.send_block()?;
                }
                Ok(Some(iv))
            }
            None => {
                self.finalize()?;
                Ok(None)
            }
        }
    }

    fn seek(&mut self, chrom: &str, start: u64, finish: u64) -> Result<()> {
        let writer = self.kill()?;
        self.source.seek(chrom, start, finish)?;
        if let Some(writer) = writer {
            self.launch(writer);
        }
        self.finalized = false;
        Ok(())
    }

    fn default_value(&self) -> f64 {
        self.source.default_value()
    }

    fn overlaps(&self) -> bool {
        self.source.overlaps()
    }
}

impl Drop for Tee {
    fn drop(&mut self) {
        let _ = self.kill();
    }
}

/// Create the output file, refusing to overwrite an existing one.
pub fn create_output(path: &Path) -> Result<BoxedOut> {
    if path.as_os_str() == "-" {
        return Ok(Box::new(std::io::stdout()));
    }
    let file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::AlreadyExists {
                SignalError::OutputExists(path.to_path_buf())
            } else {
                SignalError::Io(e)
            }
        })?;
    Ok(Box::new(file))
}

/// Stream a signal to a file (or stdout with `-`).
pub fn to_file(source: Cursor, path: &Path, force_graph: bool) -> Result<()> {
    let out = create_output(path)?;
    let mut tee = Cursor::from_iter(Tee::new(source, out, force_graph))?;
    tee.run()
}

/// Append each interval's value to one line of an auxiliary text file.
pub struct Paste<R: std::io::BufRead, W: Write> {
    source: Cursor,
    lines: R,
    out: BufWriter<W>,
    ryu_buf: ryu::Buffer,
}

impl<R: std::io::BufRead, W: Write> Paste<R, W> {
    pub fn new(source: Cursor, lines: R, out: W) -> Self {
        Self {
            source,
            lines,
            out: BufWriter::with_capacity(1 << 20, out),
            ryu_buf: ryu::Buffer::new(),
        }
    }

    fn next_line(&mut self) -> Result<String> {
        let mut line = String::new();
        loop {
            line.clear();
            if self.lines.read_line(&mut line)? == 0 {
                return Err(SignalError::PasteExhausted);
            }
            let trimmed = line.trim_end_matches(['\n', '\r']);
            if trimmed.is_empty()
                || trimmed.starts_with("track")
                || trimmed.starts_with("browser")
            {
                continue;
            }
            return Ok(trimmed.to_string());
        }
    }

    pub fn run(&mut self) -> Result<()> {
        while let Some(iv) = self.source.take_head()? {
            let line = self.next_line()?;
            self.out.write_all(line.as_bytes())?;
            self.out.write_all(b"\t")?;
            self.out
                .write_all(self.ryu_buf.format(iv.value).as_bytes())?;
            self.out.write_all(b"\n")?;
        }
        self.out.flush()?;
        Ok(())
    }
}

/// Print apply records as 0-based rows with one column per value.
pub fn write_apply<W: Write>(apply: &mut Apply, out: W) -> Result<()> {
    let mut out = BufWriter::with_capacity(1 << 20, out);
    let mut itoa_buf = itoa::Buffer::new();
    let mut ryu_buf = ryu::Buffer::new();
    while let Some(rec) = apply.next_record()? {
        out.write_all(rec.chrom.as_bytes())?;
        out.write_all(b"\t")?;
        out.write_all(itoa_buf.format(rec.start - 1).as_bytes())?;
        out.write_all(b"\t")?;
        out.write_all(itoa_buf.format(rec.finish - 1).as_bytes())?;
        for value in &rec.values {
            out.write_all(b"\t")?;
            out.write_all(ryu_buf.format(*value).as_bytes())?;
        }
        out.write_all(b"\n")?;
    }
    out.flush()?;
    Ok(())
}

/// Print a row of terminal statistics.
pub fn write_stats<W: Write>(values: &[f64], out: W) -> Result<()> {
    let mut out = BufWriter::new(out);
    let mut ryu_buf = ryu::Buffer::new();
    for (i, value) in values.iter().enumerate() {
        if i > 0 {
            out.write_all(b"\t")?;
        }
        out.write_all(ryu_buf.format(*value).as_bytes())?;
    }
    out.write_all(b"\n")?;
    out.flush()?;
    Ok(())
}
