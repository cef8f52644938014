//! K-way positional merge.
//!
//! The multiplexer aligns K input streams position by position: each emitted
//! record is the maximal half-open span on which every input's state
//! (in play or absent, and its value) is constant. Two integer-keyed
//! min-heaps track pending starts and pending finishes of the inputs
//! currently on the active chromosome.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::error::Result;
use crate::interval::Chrom;
use crate::signal::Cursor;

/// K-way positional merge over signal cursors.
pub struct Multiplexer {
    inputs: Vec<Cursor>,
    strict: bool,
    starts: BinaryHeap<Reverse<(u64, usize)>>,
    finishes: BinaryHeap<Reverse<(u64, usize)>>,
    inplay: Vec<bool>,
    inplay_count: usize,
    values: Vec<f64>,
    default_values: Vec<f64>,
    chrom: Option<Chrom>,
    start: u64,
    finish: u64,
    done: bool,
}

impl Multiplexer {
    /// Build a multiplexer over cursors. Callers pass cursors already
    /// normalised through [`Cursor::non_overlapping`]; in strict mode only
    /// positions where all K inputs are simultaneously in play are emitted.
    pub fn new(inputs: Vec<Cursor>, strict: bool) -> Result<Self> {
        let count = inputs.len();
        let default_values: Vec<f64> = inputs.iter().map(|c| c.default_value()).collect();
        let mut multi = Self {
            inputs,
            strict,
            starts: BinaryHeap::with_capacity(count),
            finishes: BinaryHeap::with_capacity(count),
            inplay: vec![false; count],
            inplay_count: 0,
            values: default_values.clone(),
            default_values,
            chrom: None,
            start: 0,
            finish: 0,
            done: false,
        };
        multi.pop()?;
        Ok(multi)
    }

    #[inline]
    pub fn count(&self) -> usize {
        self.inputs.len()
    }

    #[inline]
    pub fn is_done(&self) -> bool {
        self.done
    }

    #[inline]
    pub fn chrom(&self) -> &Chrom {
        self.chrom.as_ref().expect("multiplexer not primed")
    }

    #[inline]
    pub fn start(&self) -> u64 {
        self.start
    }

    #[inline]
    pub fn finish(&self) -> u64 {
        self.finish
    }

    #[inline]
    pub fn span(&self) -> u64 {
        self.finish - self.start
    }

    #[inline]
    pub fn inplay(&self, i: usize) -> bool {
        self.inplay[i]
    }

    #[inline]
    pub fn inplay_count(&self) -> usize {
        self.inplay_count
    }

    #[inline]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    #[inline]
    pub fn default_values(&self) -> &[f64] {
        &self.default_values
    }

    /// The value of slot `i` at the current position: the input's value if
    /// in play, its default otherwise.
    #[inline]
    pub fn value_or_default(&self, i: usize) -> f64 {
        if self.inplay[i] {
            self.values[i]
        } else {
            self.default_values[i]
        }
    }

    /// Retire inputs whose interval ends at the current finish, requeueing
    /// them if they continue on the same chromosome.
    fn close_finishing(&mut self) -> Result<()> {
        while let Some(&Reverse((pos, index))) = self.finishes.peek() {
            if pos != self.finish {
                break;
            }
            self.finishes.pop();
            self.inputs[index].advance()?;
            self.inplay[index] = false;
            self.inplay_count -= 1;
            self.values[index] = self.default_values[index];
            if let Some(head) = self.inputs[index].head() {
                if Some(head.chrom.as_ref()) == self.chrom.as_deref() {
                    self.starts.push(Reverse((head.start, index)));
                }
            }
        }
        Ok(())
    }

    /// Move to the lexicographically smallest chromosome any input still
    /// has content on, queueing the starts of every input positioned there.
    fn queue_next_chromosome(&mut self) {
        let mut next: Option<Chrom> = None;
        for cursor in &self.inputs {
            if let Some(head) = cursor.head() {
                if next
                    .as_deref()
                    .map_or(true, |c| head.chrom.as_ref() < c)
                {
                    next = Some(head.chrom.clone());
                }
            }
        }
        let Some(chrom) = next else {
            self.done = true;
            return;
        };
        for (i, cursor) in self.inputs.iter().enumerate() {
            if let Some(head) = cursor.head() {
                if *head.chrom == *chrom {
                    self.starts.push(Reverse((head.start, i)));
                }
            }
        }
        self.chrom = Some(chrom);
    }

    /// Bring inputs starting at the current start into play.
    fn admit_starting(&mut self) {
        while let Some(&Reverse((pos, index))) = self.starts.peek() {
            if pos != self.start {
                break;
            }
            self.starts.pop();
            let head = self.inputs[index].head().expect("queued input has a head");
            self.finishes.push(Reverse((head.finish, index)));
            self.inplay[index] = true;
            self.values[index] = head.value;
            self.inplay_count += 1;
        }
    }

    fn define_finish(&mut self) {
        let mut finish = self
            .finishes
            .peek()
            .map(|&Reverse((pos, _))| pos)
            .expect("at least one input in play");
        if let Some(&Reverse((pending, _))) = self.starts.peek() {
            finish = finish.min(pending);
        }
        self.finish = finish;
    }

    /// One step of the merge; returns true when all K inputs are in play.
    fn pop_core(&mut self) -> Result<bool> {
        self.close_finishing()?;

        if self.starts.is_empty() && self.finishes.is_empty() {
            self.queue_next_chromosome();
        }
        if self.done {
            return Ok(false);
        }

        self.start = if self.inplay_count > 0 {
            self.finish
        } else {
            self.starts
                .peek()
                .map(|&Reverse((pos, _))| pos)
                .expect("pending start on fresh chromosome")
        };

        self.admit_starting();
        self.define_finish();

        Ok(self.inplay_count == self.inputs.len())
    }

    /// Advance to the next aligned position.
    pub fn pop(&mut self) -> Result<()> {
        while !self.done {
            if self.pop_core()? || !self.strict {
                break;
            }
        }
        Ok(())
    }

    /// Drive the merge to completion.
    pub fn run(&mut self) -> Result<()> {
        while !self.done {
            self.pop()?;
        }
        Ok(())
    }

    pub fn seek(&mut self, chrom: &str, start: u64, finish: u64) -> Result<()> {
        self.done = false;
        for cursor in &mut self.inputs {
            cursor.seek(chrom, start, finish)?;
        }
        self.starts.clear();
        self.finishes.clear();
        self.inplay.fill(false);
        self.inplay_count = 0;
        self.values.copy_from_slice(&self.default_values);
        self.chrom = None;
        self.start = 0;
        self.finish = 0;
        self.pop()
    }
}

#[cfg(test)]
pub(crate) mod testutil {
    use super::*;
    use crate::signal::testutil::cursor_with_default;

    /// Build a multiplexer from per-input tuple lists, all with default 0.
    pub fn mux(inputs: &[&[(&str, u64, u64, f64)]], strict: bool) -> Multiplexer {
        let cursors = inputs
            .iter()
            .map(|data| cursor_with_default(data, 0.0))
            .collect();
        Multiplexer::new(cursors, strict).unwrap()
    }

    /// Collect (chrom, start, finish, slot values-or-defaults) records.
    pub fn collect(multi: &mut Multiplexer) -> Vec<(String, u64, u64, Vec<f64>)> {
        let mut out = Vec::new();
        while !multi.is_done() {
            let values = (0..multi.count())
                .map(|i| multi.value_or_default(i))
                .collect();
            out.push((
                multi.chrom().to_string(),
                multi.start(),
                multi.finish(),
                values,
            ));
            multi.pop().unwrap();
        }
        out
    }
}
