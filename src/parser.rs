//! The command grammar: a flat prefix language describing an iterator DAG.
//!
//! Tokens are parsed recursively; each keyword consumes its scalar
//! arguments and then the iterators it operates on. Iterator lists (for the
//! multiplexer forms) run until a `:` token or the end of the program.
//! Anything that is not a keyword is a track file.

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::apply::{Apply, ApplyMode, ApplySignal};
use crate::config::PipelineOptions;
use crate::error::{Result, SignalError};
use crate::multiplexer::Multiplexer;
use crate::multiset::Multiset;
use crate::ops::mask::{Nearest, Noverlap, Overlap, Trim};
use crate::ops::unary::{
    Cat, Compress, Coverage, DefaultValue, Filter, FilterOp, IsZero, MapValue, Offset, Scale,
    ShiftPos, Union, ValueFn,
};
use crate::ops::window::{Bin, Smooth};
use crate::readers::open_track;
use crate::readers::sam::{DepthMode, SamReader};
use crate::reducers::{FillIn, Reduce, ReduceOp, Select};
use crate::setcmp::{FTest, MannWhitney, TTest};
use crate::signal::Cursor;
use crate::stats::{Integrator, NdPearson, Pearson, StatKind};
use crate::writer::{create_output, write_apply, write_stats, Paste, Tee};

/// A fully built program, ready to run against an output sink.
pub enum Program {
    /// Stream intervals to the sink as adaptive wiggle text.
    Stream(Cursor),
    /// Drain an iterator for its side effects (mid-pipeline writes).
    Drain(Cursor),
    /// Run the pass and print one row of statistics.
    StatRow(Integrator, Option<PathBuf>),
    PearsonRow(Pearson, Option<PathBuf>),
    NdPearsonRow(NdPearson, Option<PathBuf>),
    /// Print one row per region.
    ApplyTable(Apply),
    /// Append the value column to the lines of an auxiliary text file.
    PasteRun { lines: PathBuf, source: Cursor },
}

impl Program {
    /// Execute against a sink (stdout in the CLI).
    pub fn execute(self, sink: Box<dyn Write + Send>) -> Result<()> {
        match self {
            Program::Stream(source) => {
                let mut tee = Cursor::from_iter(Tee::new(source, sink, false))?;
                tee.run()
            }
            Program::Drain(mut source) => source.run(),
            Program::StatRow(mut integrator, path) => {
                let values = integrator.run()?;
                write_row(&values, path, sink)
            }
            Program::PearsonRow(mut pearson, path) => {
                let value = pearson.run()?;
                write_row(&[value], path, sink)
            }
            Program::NdPearsonRow(mut ndpearson, path) => {
                let value = ndpearson.run()?;
                write_row(&[value], path, sink)
            }
            Program::ApplyTable(mut apply) => write_apply(&mut apply, sink),
            Program::PasteRun { lines, source } => {
                let reader = std::io::BufReader::new(std::fs::File::open(lines)?);
                Paste::new(source, reader, sink).run()
            }
        }
    }
}

fn write_row(values: &[f64], path: Option<PathBuf>, sink: Box<dyn Write + Send>) -> Result<()> {
    match path {
        Some(path) => write_stats(values, create_output(&path)?),
        None => write_stats(values, sink),
    }
}

/// Parse one statement into a runnable program.
pub fn parse_program(tokens: &[String], options: PipelineOptions) -> Result<Program> {
    let mut parser = Parser::new(tokens, options);
    let program = parser.program()?;
    parser.expect_end()?;
    Ok(program)
}

/// Split a program file into statements: one per line, `#` comments and
/// blank lines skipped.
pub fn statements(text: &str) -> Vec<Vec<String>> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| line.split_whitespace().map(str::to_string).collect())
        .collect()
}

/// What a sub-expression built: most things are plain streams, but the
/// terminal statistics keep their identity so the root can print them.
enum Built {
    Plain(Cursor),
    Stat(Integrator),
    Pear(Pearson),
    NdPear(NdPearson),
    Apply(Apply),
}

impl Built {
    /// Collapse into a stream for use inside a larger expression.
    fn into_cursor(self) -> Result<Cursor> {
        match self {
            Built::Plain(c) => Ok(c),
            Built::Stat(integrator) => Cursor::from_iter(integrator),
            Built::Pear(_) | Built::NdPear(_) => Err(SignalError::Command(
                "pearson/ndpearson only terminate a program".to_string(),
            )),
            Built::Apply(apply) => {
                if apply.width() == 1 {
                    Cursor::from_iter(ApplySignal::new(apply))
                } else {
                    Err(SignalError::Command(
                        "apply with several statistics cannot feed another operator".to_string(),
                    ))
                }
            }
        }
    }
}

struct Parser<'a> {
    tokens: &'a [String],
    pos: usize,
    options: PipelineOptions,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [String], options: PipelineOptions) -> Self {
        Self {
            tokens,
            pos: 0,
            options,
        }
    }

    fn peek(&self) -> Option<&str> {
        self.tokens.get(self.pos).map(String::as_str)
    }

    fn next(&mut self) -> Option<&str> {
        let token = self.tokens.get(self.pos)?;
        self.pos += 1;
        Some(token)
    }

    fn need(&mut self) -> Result<String> {
        match self.tokens.get(self.pos) {
            Some(token) => {
                self.pos += 1;
                Ok(token.clone())
            }
            None => Err(SignalError::Command(
                "unexpected end of command".to_string(),
            )),
        }
    }

    fn need_f64(&mut self) -> Result<f64> {
        let token = self.need()?;
        token
            .parse()
            .map_err(|_| SignalError::Command(format!("expected a number, got '{token}'")))
    }

    fn need_u64(&mut self) -> Result<u64> {
        let token = self.need()?;
        token
            .parse()
            .map_err(|_| SignalError::Command(format!("expected an integer, got '{token}'")))
    }

    fn expect_end(&mut self) -> Result<()> {
        if let Some(token) = self.peek() {
            return Err(SignalError::Command(format!(
                "trailing tokens starting at '{token}'"
            )));
        }
        Ok(())
    }

    fn program(&mut self) -> Result<Program> {
        match self.peek() {
            None => Err(SignalError::Command("empty command".to_string())),
            Some("do") => {
                self.next();
                Ok(Program::Stream(self.iter()?))
            }
            Some("write" | "write_bg" | "print") => {
                // Side-effecting roots drain without echoing to stdout.
                let built = self.iter_built()?;
                Ok(Program::Drain(built.into_cursor()?))
            }
            Some("paste") => {
                self.next();
                let lines = PathBuf::from(self.need()?);
                let source = self.iter()?;
                Ok(Program::PasteRun { lines, source })
            }
            Some(_) => {
                let built = self.iter_built()?;
                Ok(match built {
                    Built::Plain(cursor) => Program::Stream(cursor),
                    Built::Stat(integrator) => Program::StatRow(integrator, None),
                    Built::Pear(pearson) => Program::PearsonRow(pearson, None),
                    Built::NdPear(ndpearson) => Program::NdPearsonRow(ndpearson, None),
                    Built::Apply(apply) => Program::ApplyTable(apply),
                })
            }
        }
    }

    /// Parse an iterator expression into a plain stream.
    fn iter(&mut self) -> Result<Cursor> {
        self.iter_built()?.into_cursor()
    }

    fn iter_built(&mut self) -> Result<Built> {
        let token = self.need()?;
        self.iter_built_token(&token)
    }

    fn iter_built_token(&mut self, token: &str) -> Result<Built> {
        match token {
            // Value transforms over a normalised stream.
            "scale" => {
                let factor = self.need_f64()?;
                Ok(Built::Plain(Cursor::from_iter(Scale::new(
                    self.flat_iter()?,
                    factor,
                ))?))
            }
            "offset" => {
                let amount = self.need_f64()?;
                Ok(Built::Plain(Cursor::from_iter(Offset::new(
                    self.flat_iter()?,
                    amount,
                ))?))
            }
            "abs" => self.map_value(ValueFn::Abs),
            "floor" => self.map_value(ValueFn::Floor),
            "toInt" => self.map_value(ValueFn::ToInt),
            "unit" => self.map_value(ValueFn::Unit),
            "ln" => self.map_value(ValueFn::natural_log()),
            "exp" => self.map_value(ValueFn::natural_exp()),
            "log" => {
                let base = self.need_f64()?;
                self.map_value(ValueFn::log(base))
            }
            "pow" => {
                let exponent = self.need_f64()?;
                self.map_value(ValueFn::Pow { exponent })
            }
            "gt" => self.filter(FilterOp::Gt),
            "gte" => self.filter(FilterOp::Gte),
            "lt" => self.filter(FilterOp::Lt),
            "lte" => self.filter(FilterOp::Lte),
            "default" => {
                let value = self.need_f64()?;
                Ok(Built::Plain(Cursor::from_iter(DefaultValue::new(
                    self.iter()?,
                    value,
                ))?))
            }
            "isZero" => Ok(Built::Plain(Cursor::from_iter(IsZero::new(self.iter()?))?)),
            "compress" => Ok(Built::Plain(Cursor::from_iter(Compress::new(
                self.flat_iter()?,
            ))?)),
            "extend" => {
                let margin = self.need_u64()?;
                Ok(Built::Plain(Cursor::from_iter(
                    crate::ops::unary::Extend::new(self.iter()?, margin),
                )?))
            }
            "shiftPos" => {
                let shift = self.need_u64()?;
                Ok(Built::Plain(Cursor::from_iter(ShiftPos::new(
                    self.flat_iter()?,
                    shift,
                ))?))
            }
            "smooth" => {
                let width = self.need_u64()? as usize;
                Ok(Built::Plain(Cursor::from_iter(Smooth::new(
                    self.flat_iter()?,
                    width,
                )?)?))
            }
            "bin" => {
                let width = self.need_u64()?;
                Ok(Built::Plain(Cursor::from_iter(Bin::new(
                    self.flat_iter()?,
                    width,
                )?)?))
            }
            "coverage" => {
                let source = self.iter()?;
                if source.overlaps() {
                    Ok(Built::Plain(Cursor::from_iter(Coverage::new(source))?))
                } else {
                    Ok(Built::Plain(source))
                }
            }
            "unionize" | "union" => {
                Ok(Built::Plain(Cursor::from_iter(Union::new(self.iter()?))?))
            }

            // Leaves with explicit format hints.
            "sam" => {
                let path = self.need()?;
                Ok(Built::Plain(Cursor::from_iter(SamReader::open(
                    Path::new(&path),
                    DepthMode::Coverage,
                )?)?))
            }
            "read_count" => {
                let path = self.need()?;
                Ok(Built::Plain(Cursor::from_iter(SamReader::open(
                    Path::new(&path),
                    DepthMode::ReadStart,
                )?)?))
            }
            "cat" => {
                let paths = self.path_list()?;
                Ok(Built::Plain(Cursor::from_iter(Cat::new(
                    paths,
                    self.options,
                )?)?))
            }

            // Binary mask operators.
            "overlaps" => {
                let source = self.iter()?;
                let mask = self.iter()?;
                Ok(Built::Plain(Cursor::from_iter(Overlap::new(source, mask))?))
            }
            "trim" => {
                let source = self.iter()?;
                let mask = self.iter()?.into_non_overlapping()?;
                Ok(Built::Plain(Cursor::from_iter(Trim::new(source, mask))?))
            }
            "noverlaps" => {
                let source = self.iter()?;
                let mask = self.iter()?;
                Ok(Built::Plain(Cursor::from_iter(Noverlap::new(source, mask))?))
            }
            "nearest" => {
                let source = self.iter()?;
                let mask = self.iter()?;
                Ok(Built::Plain(Cursor::from_iter(Nearest::new(source, mask))?))
            }

            // Reducer sugar over a 2-way multiplexer.
            "diff" => {
                let (a, b, strict) = self.two_iters()?;
                let b = Cursor::from_iter(Scale::new(b.into_non_overlapping()?, -1.0))?;
                let multi = Multiplexer::new(
                    vec![a.into_non_overlapping()?, b],
                    strict,
                )?;
                Ok(Built::Plain(Cursor::from_iter(Reduce::new(
                    multi,
                    ReduceOp::Sum,
                ))?))
            }
            "ratio" => {
                let (a, b, strict) = self.two_iters()?;
                let b = Cursor::from_iter(MapValue::new(
                    b.into_non_overlapping()?,
                    ValueFn::Pow { exponent: -1.0 },
                ))?;
                let multi = Multiplexer::new(
                    vec![a.into_non_overlapping()?, b],
                    strict,
                )?;
                Ok(Built::Plain(Cursor::from_iter(Reduce::new(
                    multi,
                    ReduceOp::Product,
                ))?))
            }
            "fillIn" => self.fill_in(false),
            "trimFill" => self.fill_in(true),

            // Symmetric reducers.
            "sum" => self.reduce(ReduceOp::Sum),
            "product" | "mult" => self.reduce(ReduceOp::Product),
            "mean" => self.reduce(ReduceOp::Mean),
            "min" => self.reduce(ReduceOp::Min),
            "max" => self.reduce(ReduceOp::Max),
            "var" => self.reduce(ReduceOp::Variance),
            "stddev" => self.reduce(ReduceOp::StdDev),
            "entropy" => self.reduce(ReduceOp::Entropy),
            "CV" => self.reduce(ReduceOp::Cv),
            "median" => self.reduce(ReduceOp::Median),
            "select" => {
                let index = self.need_u64()? as usize;
                let multi = self.multiplexer()?;
                Ok(Built::Plain(Cursor::from_iter(Select::new(multi, index)?)?))
            }

            // Two-sample tests.
            "ttest" => {
                let set = self.multiset()?;
                Ok(Built::Plain(Cursor::from_iter(TTest::new(set)?)?))
            }
            "ftest" => {
                let set = self.multiset()?;
                Ok(Built::Plain(Cursor::from_iter(FTest::new(set)?)?))
            }
            "mwu" | "wilcoxon" => {
                let set = self.multiset()?;
                Ok(Built::Plain(Cursor::from_iter(MannWhitney::new(set)?)?))
            }

            // Terminal statistics.
            "AUC" => self.stat(StatKind::Auc),
            "spanI" => self.stat(StatKind::Span),
            "meanI" => self.stat(StatKind::Mean),
            "maxI" => self.stat(StatKind::Max),
            "minI" => self.stat(StatKind::Min),
            "varI" => self.stat(StatKind::Variance),
            "stddevI" => self.stat(StatKind::StdDev),
            "CVI" => self.stat(StatKind::Cv),
            "energy" => {
                let wavelength = self.need_u64()? as u32;
                self.stat(StatKind::Energy { wavelength })
            }
            "pearson" => {
                let a = self.iter()?.into_non_overlapping()?;
                let b = self.iter()?.into_non_overlapping()?;
                let multi = Multiplexer::new(vec![a, b], false)?;
                Ok(Built::Pear(Pearson::new(multi)?))
            }
            "ndpearson" => {
                let a = self.multiplexer()?;
                let b = self.multiplexer()?;
                Ok(Built::NdPear(NdPearson::new(Multiset::new(vec![a, b])?)?))
            }

            // Regional evaluation.
            "apply" => self.apply(),
            "profile" => {
                let width = self.need_u64()? as usize;
                let regions = self.iter()?;
                let data = self.iter()?.into_non_overlapping()?;
                Ok(Built::Apply(Apply::new(
                    regions,
                    data,
                    ApplyMode::Profile { width },
                )))
            }

            // Output operators.
            "write" => self.tee(false),
            "write_bg" => self.tee(true),
            "print" => {
                let path = self.need()?;
                let path = if path == "-" {
                    None
                } else {
                    Some(PathBuf::from(path))
                };
                match self.iter_built()? {
                    Built::Stat(integrator) => {
                        let program = Program::StatRow(integrator, path);
                        self.run_inline(program)
                    }
                    Built::Pear(pearson) => self.run_inline(Program::PearsonRow(pearson, path)),
                    Built::NdPear(nd) => self.run_inline(Program::NdPearsonRow(nd, path)),
                    _ => Err(SignalError::Command(
                        "print expects a terminal statistic".to_string(),
                    )),
                }
            }

            "seek" => {
                let chrom = self.need()?;
                let start = self.need_u64()?;
                let finish = self.need_u64()?;
                let mut cursor = self.iter()?;
                cursor.seek(&chrom, start, finish + 1)?;
                Ok(Built::Plain(cursor))
            }

            // Anything else is a track file.
            path => Ok(Built::Plain(Cursor::new(open_track(
                Path::new(path),
                self.options,
            )?)?)),
        }
    }

    /// Parse an upstream iterator and normalise it for operators that
    /// assume non-overlapping input.
    fn flat_iter(&mut self) -> Result<Cursor> {
        self.iter()?.into_non_overlapping()
    }

    fn map_value(&mut self, f: ValueFn) -> Result<Built> {
        Ok(Built::Plain(Cursor::from_iter(MapValue::new(
            self.flat_iter()?,
            f,
        ))?))
    }

    fn filter(&mut self, op: FilterOp) -> Result<Built> {
        let threshold = self.need_f64()?;
        Ok(Built::Plain(Cursor::from_iter(Filter::new(
            self.flat_iter()?,
            op,
            threshold,
        ))?))
    }

    fn stat(&mut self, kind: StatKind) -> Result<Built> {
        let source = self.flat_iter()?;
        Ok(Built::Stat(Integrator::new(source, &[kind])))
    }

    fn two_iters(&mut self) -> Result<(Cursor, Cursor, bool)> {
        let mut strict = false;
        if self.peek() == Some("strict") {
            self.next();
            strict = true;
        }
        let a = self.iter()?;
        let b = self.iter()?;
        Ok((a, b, strict))
    }

    fn fill_in(&mut self, trim: bool) -> Result<Built> {
        let (regions, data, strict) = self.two_iters()?;
        let multi = Multiplexer::new(
            vec![regions.into_non_overlapping()?, data.into_non_overlapping()?],
            strict,
        )?;
        Ok(Built::Plain(Cursor::from_iter(FillIn::new(multi, trim)?)?))
    }

    fn reduce(&mut self, op: ReduceOp) -> Result<Built> {
        let multi = self.multiplexer()?;
        Ok(Built::Plain(Cursor::from_iter(Reduce::new(multi, op))?))
    }

    fn tee(&mut self, force_graph: bool) -> Result<Built> {
        let path = self.need()?;
        let source = self.iter()?;
        let out = create_output(Path::new(&path))?;
        Ok(Built::Plain(Cursor::from_iter(Tee::new(
            source,
            out,
            force_graph,
        ))?))
    }

    /// A statistic program nested under `print` may still need draining.
    fn run_inline(&mut self, program: Program) -> Result<Built> {
        program.execute(Box::new(std::io::stdout()))?;
        Ok(Built::Plain(Cursor::from_iter(crate::signal::NullIter)?))
    }

    fn apply(&mut self) -> Result<Built> {
        let kinds = self.stat_list()?;
        let mut strict = true;
        if self.peek() == Some("fillIn") {
            self.next();
            strict = false;
        }
        let regions = self.iter()?;
        let data = self.iter()?.into_non_overlapping()?;
        Ok(Built::Apply(Apply::new(
            regions,
            data,
            ApplyMode::Stats { kinds, strict },
        )))
    }

    fn stat_list(&mut self) -> Result<Vec<StatKind>> {
        let mut kinds = Vec::new();
        loop {
            let kind = match self.peek() {
                Some("AUC") => StatKind::Auc,
                Some("spanI") => StatKind::Span,
                Some("meanI") => StatKind::Mean,
                Some("maxI") => StatKind::Max,
                Some("minI") => StatKind::Min,
                Some("varI") => StatKind::Variance,
                Some("stddevI") => StatKind::StdDev,
                Some("CVI") => StatKind::Cv,
                Some("energy") => {
                    self.next();
                    let wavelength = self.need_u64()? as u32;
                    kinds.push(StatKind::Energy { wavelength });
                    continue;
                }
                _ => break,
            };
            self.next();
            kinds.push(kind);
        }
        if kinds.is_empty() {
            return Err(SignalError::Command(
                "expected a statistic name".to_string(),
            ));
        }
        Ok(kinds)
    }

    /// `multi := iter_list | "map" unop multi | "strict" multi`
    fn multiplexer(&mut self) -> Result<Multiplexer> {
        let (inputs, strict) = self.multi_inputs()?;
        if inputs.is_empty() {
            return Err(SignalError::Command(
                "expected a list of iterators".to_string(),
            ));
        }
        let mut normalised = Vec::with_capacity(inputs.len());
        for cursor in inputs {
            normalised.push(cursor.into_non_overlapping()?);
        }
        Multiplexer::new(normalised, strict)
    }

    fn multi_inputs(&mut self) -> Result<(Vec<Cursor>, bool)> {
        match self.peek() {
            Some("strict") => {
                self.next();
                let (inputs, _) = self.multi_inputs()?;
                Ok((inputs, true))
            }
            Some("map") => {
                self.next();
                let mapper = self.mapper()?;
                let (inputs, strict) = self.multi_inputs()?;
                let mut mapped = Vec::with_capacity(inputs.len());
                for cursor in inputs {
                    mapped.push(mapper(cursor)?);
                }
                Ok((mapped, strict))
            }
            _ => {
                let mut inputs = Vec::new();
                while let Some(token) = self.peek() {
                    if token == ":" {
                        self.next();
                        break;
                    }
                    let token = self.need()?;
                    inputs.push(self.iter_built_token(&token)?.into_cursor()?);
                }
                Ok((inputs, false))
            }
        }
    }

    /// A unary operator applied to every member of a multiplexer list.
    fn mapper(&mut self) -> Result<Box<dyn Fn(Cursor) -> Result<Cursor>>> {
        let token = self.need()?;
        Ok(match token.as_str() {
            "scale" => {
                let factor = self.need_f64()?;
                Box::new(move |c| {
                    Cursor::from_iter(Scale::new(c.into_non_overlapping()?, factor))
                })
            }
            "offset" => {
                let amount = self.need_f64()?;
                Box::new(move |c| {
                    Cursor::from_iter(Offset::new(c.into_non_overlapping()?, amount))
                })
            }
            "abs" => value_mapper(ValueFn::Abs),
            "floor" => value_mapper(ValueFn::Floor),
            "toInt" => value_mapper(ValueFn::ToInt),
            "unit" => value_mapper(ValueFn::Unit),
            "ln" => value_mapper(ValueFn::natural_log()),
            "exp" => value_mapper(ValueFn::natural_exp()),
            "log" => {
                let base = self.need_f64()?;
                value_mapper(ValueFn::log(base))
            }
            "pow" => {
                let exponent = self.need_f64()?;
                value_mapper(ValueFn::Pow { exponent })
            }
            "gt" | "gte" | "lt" | "lte" => {
                let op = match token.as_str() {
                    "gt" => FilterOp::Gt,
                    "gte" => FilterOp::Gte,
                    "lt" => FilterOp::Lt,
                    _ => FilterOp::Lte,
                };
                let threshold = self.need_f64()?;
                Box::new(move |c| {
                    Cursor::from_iter(Filter::new(c.into_non_overlapping()?, op, threshold))
                })
            }
            "default" => {
                let value = self.need_f64()?;
                Box::new(move |c| Cursor::from_iter(DefaultValue::new(c, value)))
            }
            "smooth" => {
                let width = self.need_u64()? as usize;
                Box::new(move |c| {
                    Cursor::from_iter(Smooth::new(c.into_non_overlapping()?, width)?)
                })
            }
            "bin" => {
                let width = self.need_u64()?;
                Box::new(move |c| Cursor::from_iter(Bin::new(c.into_non_overlapping()?, width)?))
            }
            "compress" => {
                Box::new(move |c| Cursor::from_iter(Compress::new(c.into_non_overlapping()?)))
            }
            other => {
                return Err(SignalError::Command(format!(
                    "'{other}' cannot be mapped over an iterator list"
                )))
            }
        })
    }

    fn multiset(&mut self) -> Result<Multiset> {
        let mut groups = Vec::new();
        loop {
            groups.push(self.multiplexer()?);
            match self.peek() {
                Some(_) => continue,
                None => break,
            }
        }
        Multiset::new(groups)
    }

    fn path_list(&mut self) -> Result<Vec<PathBuf>> {
        let mut paths = Vec::new();
        while let Some(token) = self.peek() {
            if token == ":" {
                self.next();
                break;
            }
            paths.push(PathBuf::from(self.need()?));
        }
        if paths.is_empty() {
            return Err(SignalError::Command(
                "expected at least one file to concatenate".to_string(),
            ));
        }
        Ok(paths)
    }
}

fn value_mapper(f: ValueFn) -> Box<dyn Fn(Cursor) -> Result<Cursor>> {
    Box::new(move |c| Cursor::from_iter(MapValue::new(c.into_non_overlapping()?, f)))
}
