//! cgpevo CLI - evolve, run and inspect CGP programs.

// Allow print in the CLI binary
#![allow(clippy::print_stdout, clippy::print_stderr)]

mod cli;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

/// cgpevo - Cartesian Genetic Programming with ADF compression
#[derive(Parser, Debug)]
#[command(name = "cgpevo")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
enum Commands {
    /// Evolve a regression of y = 3x^2 + 2x - 5 with an island system
    Evolve {
        /// TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Where to save the island system
        #[arg(short, long, default_value = "islands.json")]
        output: PathBuf,

        /// Random seed (overrides the configuration)
        #[arg(short, long)]
        seed: Option<u32>,

        /// Generations (overrides the configuration)
        #[arg(short, long)]
        generations: Option<usize>,

        /// Continue from a saved island system
        #[arg(long)]
        resume: Option<PathBuf>,

        /// Show progress bar
        #[arg(short, long)]
        progress: bool,
    },

    /// Run a saved function (or the fittest individual of a saved population)
    Run {
        /// Saved file
        #[arg(required = true)]
        file: PathBuf,

        /// Sensor values; read from stdin when omitted
        #[arg(allow_hyphen_values = true)]
        sensors: Vec<String>,

        /// Interpreter steps before printing
        #[arg(long, default_value = "1")]
        steps: usize,

        /// Instruction set for bare function files
        #[arg(long, value_enum, default_value = "arithmetic")]
        set: cli::SetArg,
    },

    /// Validate every function in a saved file
    Validate {
        /// Saved file
        #[arg(required = true)]
        file: PathBuf,

        /// Instruction set for bare function files
        #[arg(long, value_enum, default_value = "arithmetic")]
        set: cli::SetArg,
    },

    /// Summarize a saved file
    Inspect {
        /// Saved file
        #[arg(required = true)]
        file: PathBuf,

        /// List every live cell of each champion
        #[arg(long)]
        genes: bool,
    },
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    let result = match args.command {
        Commands::Evolve {
            config,
            output,
            seed,
            generations,
            resume,
            progress,
        } => cli::evolve::execute(config, output, seed, generations, resume, progress),

        Commands::Run {
            file,
            sensors,
            steps,
            set,
        } => cli::run::execute(file, sensors, steps, set),

        Commands::Validate { file, set } => cli::validate::execute(file, set),

        Commands::Inspect { file, genes } => cli::inspect::execute(file, genes),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
