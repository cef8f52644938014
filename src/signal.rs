//! The pull contract every signal iterator implements, and the cursor
//! wrapper operators use to consume their upstream.
//!
//! A signal is a finite, sorted, non-overlapping sequence of valued
//! intervals together with a `default_value` covering the gaps in between.
//! Sources whose raw output may overlap (interval lists, variant leaves)
//! set the `overlaps` flag and are passed through the union operator before
//! any computation that assumes non-overlap.

use crate::error::{Result, SignalError};
use crate::interval::Interval;

/// The iterator contract.
///
/// `next_interval` yields intervals in ascending `(chrom, start)` order and
/// returns `Ok(None)` once exhausted. `seek` repositions the stream so the
/// next interval is the first one overlapping `[start, finish)` on `chrom`,
/// with boundary clipping; composite iterators may refuse with
/// [`SignalError::SeekUnsupported`].
pub trait SignalIter {
    fn next_interval(&mut self) -> Result<Option<Interval>>;

    fn seek(&mut self, chrom: &str, start: u64, finish: u64) -> Result<()>;

    /// The value implicitly covering gaps between reported intervals.
    fn default_value(&self) -> f64;

    /// True when the stream may contain overlapping intervals.
    fn overlaps(&self) -> bool {
        false
    }
}

/// A pull cursor over a boxed iterator, holding the current head interval.
///
/// This is how every operator consumes its upstream: peek at `head`, then
/// `advance` once the interval has been used. The cursor owns the iterator
/// and any queues or threads the iterator launched.
pub struct Cursor {
    inner: Box<dyn SignalIter>,
    head: Option<Interval>,
    default_value: f64,
}

impl Cursor {
    /// Wrap an iterator and prime the first interval.
    pub fn new(mut inner: Box<dyn SignalIter>) -> Result<Self> {
        let default_value = inner.default_value();
        let head = inner.next_interval()?;
        Ok(Self {
            inner,
            head,
            default_value,
        })
    }

    pub fn from_iter<I: SignalIter + 'static>(iter: I) -> Result<Self> {
        Self::new(Box::new(iter))
    }

    /// Wrap an iterator, collapsing it through the union operator first if
    /// its `overlaps` flag is set.
    pub fn non_overlapping(inner: Box<dyn SignalIter>) -> Result<Self> {
        if inner.overlaps() {
            Self::from_iter(crate::ops::unary::Union::new(Cursor::new(inner)?))
        } else {
            Self::new(inner)
        }
    }

    #[inline]
    pub fn head(&self) -> Option<&Interval> {
        self.head.as_ref()
    }

    #[inline]
    pub fn is_done(&self) -> bool {
        self.head.is_none()
    }

    #[inline]
    pub fn default_value(&self) -> f64 {
        self.default_value
    }

    pub fn overlaps(&self) -> bool {
        self.inner.overlaps()
    }

    /// Step to the next interval.
    pub fn advance(&mut self) -> Result<()> {
        self.head = self.inner.next_interval()?;
        Ok(())
    }

    /// Take the current head and advance past it.
    pub fn take_head(&mut self) -> Result<Option<Interval>> {
        let head = self.head.take();
        if head.is_some() {
            self.head = self.inner.next_interval()?;
        }
        Ok(head)
    }

    /// Collapse through the union operator if this stream may overlap.
    pub fn into_non_overlapping(self) -> Result<Cursor> {
        if self.overlaps() {
            Cursor::from_iter(crate::ops::unary::Union::new(self))
        } else {
            Ok(self)
        }
    }

    /// Reposition the stream and re-prime the head interval.
    pub fn seek(&mut self, chrom: &str, start: u64, finish: u64) -> Result<()> {
        self.inner.seek(chrom, start, finish)?;
        self.head = self.inner.next_interval()?;
        Ok(())
    }

    /// Drain the stream into a vector.
    pub fn drain(&mut self) -> Result<Vec<Interval>> {
        let mut out = Vec::new();
        while let Some(iv) = self.take_head()? {
            out.push(iv);
        }
        Ok(out)
    }

    /// Drive the stream to completion, discarding intervals.
    pub fn run(&mut self) -> Result<()> {
        while self.take_head()?.is_some() {}
        Ok(())
    }
}

/// An in-memory signal source over a sorted interval list.
///
/// Used by tests throughout the crate and by synthetic pipeline pieces that
/// materialize small streams.
pub struct MemoryIter {
    data: Vec<Interval>,
    pos: usize,
    default_value: f64,
    overlaps: bool,
    target: Option<(String, u64, u64)>,
}

impl MemoryIter {
    pub fn new(data: Vec<Interval>) -> Self {
        Self {
            data,
            pos: 0,
            default_value: 0.0,
            overlaps: false,
            target: None,
        }
    }

    pub fn with_default(mut self, default_value: f64) -> Self {
        self.default_value = default_value;
        self
    }

    pub fn with_overlaps(mut self, overlaps: bool) -> Self {
        self.overlaps = overlaps;
        self
    }
}

impl SignalIter for MemoryIter {
    fn next_interval(&mut self) -> Result<Option<Interval>> {
        while self.pos < self.data.len() {
            let iv = &self.data[self.pos];
            self.pos += 1;
            if let Some((chrom, start, finish)) = &self.target {
                match iv.chrom.as_ref().cmp(chrom.as_str()) {
                    std::cmp::Ordering::Less => continue,
                    std::cmp::Ordering::Greater => return Ok(None),
                    std::cmp::Ordering::Equal => {
                        if iv.finish <= *start {
                            continue;
                        }
                        if iv.start >= *finish {
                            return Ok(None);
                        }
                        let mut clipped = iv.clone();
                        clipped.start = clipped.start.max(*start);
                        clipped.finish = clipped.finish.min(*finish);
                        return Ok(Some(clipped));
                    }
                }
            }
            return Ok(Some(iv.clone()));
        }
        Ok(None)
    }

    fn seek(&mut self, chrom: &str, start: u64, finish: u64) -> Result<()> {
        self.pos = 0;
        self.target = Some((chrom.to_string(), start, finish));
        Ok(())
    }

    fn default_value(&self) -> f64 {
        self.default_value
    }

    fn overlaps(&self) -> bool {
        self.overlaps
    }
}

/// A source with no intervals at all.
pub struct NullIter;

impl SignalIter for NullIter {
    fn next_interval(&mut self) -> Result<Option<Interval>> {
        Ok(None)
    }

    fn seek(&mut self, _chrom: &str, _start: u64, _finish: u64) -> Result<()> {
        Ok(())
    }

    fn default_value(&self) -> f64 {
        0.0
    }
}

/// Guard iterator asserting its upstream is sorted and non-overlapping.
///
/// Used in tests to validate the order invariant on operator outputs.
pub struct OrderCheck {
    source: Cursor,
    last: Option<Interval>,
}

impl OrderCheck {
    pub fn new(source: Cursor) -> Self {
        Self { source, last: None }
    }
}

impl SignalIter for OrderCheck {
    fn next_interval(&mut self) -> Result<Option<Interval>> {
        let iv = match self.source.take_head()? {
            Some(iv) => iv,
            None => return Ok(None),
        };
        if iv.start >= iv.finish {
            return Err(SignalError::Command(format!(
                "empty interval {}:{}-{}",
                iv.chrom, iv.start, iv.finish
            )));
        }
        if let Some(last) = &self.last {
            let ok = match last.chrom.as_ref().cmp(iv.chrom.as_ref()) {
                std::cmp::Ordering::Less => true,
                std::cmp::Ordering::Equal => last.finish <= iv.start,
                std::cmp::Ordering::Greater => false,
            };
            if !ok {
                return Err(SignalError::Command(format!(
                    "out of order output: {} after {}",
                    iv, last
                )));
            }
        }
        self.last = Some(iv.clone());
        Ok(Some(iv))
    }

    fn seek(&mut self, chrom: &str, start: u64, finish: u64) -> Result<()> {
        self.last = None;
        self.source.seek(chrom, start, finish)
    }

    fn default_value(&self) -> f64 {
        self.source.default_value()
    }
}
