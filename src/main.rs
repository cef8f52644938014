//! sigtools: streaming operations on genome-wide signal tracks.
//!
//! Usage: sigtools [OPTIONS] <TOKENS>...

use std::io;
use std::path::PathBuf;
use std::process;

use clap::Parser;
use log::info;

use sigtools::config::PipelineOptions;
use sigtools::error::{Result, SignalError};
use sigtools::parser::{parse_program, statements};

#[derive(Parser)]
#[command(name = "sigtools")]
#[command(version)]
#[command(
    about = "sigtools: streaming iterator algebra for genome-wide numeric signals",
    long_about = None
)]
struct Cli {
    /// Run a file of programs, one statement per line (# for comments)
    #[arg(long, short = 'r', value_name = "FILE", conflicts_with = "program")]
    run: Option<PathBuf>,

    /// Keep background decode threads parked until first use
    #[arg(long)]
    lazy: bool,

    /// Intervals per block on the background queues
    #[arg(long, default_value_t = PipelineOptions::DEFAULT_BLOCK_SIZE)]
    block_size: usize,

    /// Blocks a background producer may run ahead of its consumer
    #[arg(long, default_value_t = PipelineOptions::DEFAULT_MAX_HEAD_START)]
    max_head_start: usize,

    /// The program, e.g.: sum a.wig b.bg  |  AUC scale 2 tracks.bed
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    program: Vec<String>,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let options = PipelineOptions {
        eager: !cli.lazy,
        block_size: cli.block_size,
        max_head_start: cli.max_head_start,
    };

    let result = match &cli.run {
        Some(path) => run_file(path, options),
        None => run_statement(&cli.program, options),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run_statement(tokens: &[String], options: PipelineOptions) -> Result<()> {
    if tokens.is_empty() {
        return Err(SignalError::Command(
            "no program given; see --help".to_string(),
        ));
    }
    info!("running: {}", tokens.join(" "));
    let program = parse_program(tokens, options)?;
    program.execute(Box::new(io::stdout()))
}

fn run_file(path: &PathBuf, options: PipelineOptions) -> Result<()> {
    let text = std::fs::read_to_string(path)?;
    for tokens in statements(&text) {
        run_statement(&tokens, options)?;
    }
    Ok(())
}
