//! Merge of K multiplexers: the same positional alignment as the
//! multiplexer, with whole multiplexers in play and one value-vector per
//! slot. Used by the two-sample set comparisons and the n-dimensional
//! Pearson integrator.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::error::Result;
use crate::interval::Chrom;
use crate::multiplexer::Multiplexer;

pub struct Multiset {
    groups: Vec<Multiplexer>,
    starts: BinaryHeap<Reverse<(u64, usize)>>,
    finishes: BinaryHeap<Reverse<(u64, usize)>>,
    inplay: Vec<bool>,
    inplay_count: usize,
    chrom: Option<Chrom>,
    start: u64,
    finish: u64,
    done: bool,
}

impl Multiset {
    pub fn new(groups: Vec<Multiplexer>) -> Result<Self> {
        let count = groups.len();
        let mut multi = Self {
            groups,
            starts: BinaryHeap::with_capacity(count),
            finishes: BinaryHeap::with_capacity(count),
            inplay: vec![false; count],
            inplay_count: 0,
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
        self.groups.len()
    }

    #[inline]
    pub fn is_done(&self) -> bool {
        self.done
    }

    #[inline]
    pub fn chrom(&self) -> &Chrom {
        self.chrom.as_ref().expect("multiset not primed")
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
    pub fn inplay(&self, g: usize) -> bool {
        self.inplay[g]
    }

    #[inline]
    pub fn group(&self, g: usize) -> &Multiplexer {
        &self.groups[g]
    }

    /// The value of slot `i` of group `g` at the current position. An
    /// absent group contributes the defaults of all of its slots.
    #[inline]
    pub fn value_or_default(&self, g: usize, i: usize) -> f64 {
        if self.inplay[g] {
            self.groups[g].value_or_default(i)
        } else {
            self.groups[g].default_values()[i]
        }
    }

    fn close_finishing(&mut self) -> Result<()> {
        while let Some(&Reverse((pos, index))) = self.finishes.peek() {
            if pos != self.finish {
                break;
            }
            self.finishes.pop();
            self.groups[index].pop()?;
            self.inplay[index] = false;
            self.inplay_count -= 1;
            let group = &self.groups[index];
            if !group.is_done() && Some(group.chrom().as_ref()) == self.chrom.as_deref() {
                self.starts.push(Reverse((group.start(), index)));
            }
        }
        Ok(())
    }

    fn queue_next_chromosome(&mut self) {
        let mut next: Option<Chrom> = None;
        for group in &self.groups {
            if !group.is_done()
                && next
                    .as_deref()
                    .map_or(true, |c| group.chrom().as_ref() < c)
            {
                next = Some(group.chrom().clone());
            }
        }
        let Some(chrom) = next else {
            self.done = true;
            return;
        };
        for (i, group) in self.groups.iter().enumerate() {
            if !group.is_done() && *group.chrom().as_ref() == *chrom {
                self.starts.push(Reverse((group.start(), i)));
            }
        }
        self.chrom = Some(chrom);
    }

    fn admit_starting(&mut self) {
        while let Some(&Reverse((pos, index))) = self.starts.peek() {
            if pos != self.start {
                break;
            }
            self.starts.pop();
            self.finishes
                .push(Reverse((self.groups[index].finish(), index)));
            self.inplay[index] = true;
            self.inplay_count += 1;
        }
    }

    pub fn pop(&mut self) -> Result<()> {
        self.close_finishing()?;

        if self.starts.is_empty() && self.finishes.is_empty() {
            self.queue_next_chromosome();
        }
        if self.done {
            return Ok(());
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

        let mut finish = self
            .finishes
            .peek()
            .map(|&Reverse((pos, _))| pos)
            .expect("at least one group in play");
        if let Some(&Reverse((pending, _))) = self.starts.peek() {
            finish = finish.min(pending);
        }
        self.finish = finish;
        Ok(())
    }

    pub fn seek(&mut self, chrom: &str, start: u64, finish: u64) -> Result<()> {
        self.done = false;
        for group in &mut self.groups {
            group.seek(chrom, start, finish)?;
        }
        self.starts.clear();
        self.finishes.clear();
        self.inplay.fill(false);
        self.inplay_count = 0;
        self.chrom = None;
        self.start = 0;
        self.finish = 0;
        self.pop()
    }
}
