// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # redy
//!
//! Command-line driver for neuron redundancy queries.
//!
//! ## Usage
//! ```bash
//! # Print the layer structure of a network
//! redy inspect --network ./nets/acas.nnet
//!
//! # Evaluate a network, optionally with neurons overridden
//! redy evaluate --network ./nets/acas.nnet --input 0.1,0.2,0,0,0.5 --override 2:7:inactive
//!
//! # Write a solver query: can switching neuron (2, 7) off raise output 0?
//! redy query --network ./nets/acas.nnet --out q.ipq exact --override 2:7:inactive --op lt --output 0
//! ```

mod commands;

use clap::{Args, Parser, Subcommand, ValueEnum};
use redundancy::{CompareOp, NeuronOverride, Phase};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "redy",
    about = "Redundancy analysis for piecewise-linear networks",
    version,
    author
)]
struct Cli {
    /// Path to a TOML analysis configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging (repeat for more: -v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the layer structure and input box of a network.
    Inspect {
        /// Network file (`.nnet` or `.ipq`).
        #[arg(short, long)]
        network: PathBuf,

        /// Emit JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Forward-evaluate a network on one input point.
    Evaluate {
        /// Network file (`.nnet` or `.ipq`).
        #[arg(short, long)]
        network: PathBuf,

        /// Comma-separated input values.
        #[arg(short, long, value_delimiter = ',', allow_hyphen_values = true, required = true)]
        input: Vec<f64>,

        /// Neuron override `layer:neuron:kind` (repeatable).
        #[arg(long = "override")]
        overrides: Vec<NeuronOverride>,

        /// Emit JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Build a redundancy query and write it in the solver's text format.
    Query {
        #[command(flatten)]
        args: QueryArgs,

        #[command(subcommand)]
        kind: QueryKind,
    },
}

/// Options shared by every query kind.
#[derive(Args)]
struct QueryArgs {
    /// Network file (`.nnet` or `.ipq`).
    #[arg(short, long)]
    network: PathBuf,

    /// Output path; the query goes to stdout when omitted.
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// First layer kept by the clip range.
    #[arg(long)]
    first_layer: Option<usize>,

    /// Nodes of each first-layer chain dropped before the cut.
    #[arg(long)]
    first_cut: Option<usize>,

    /// Last layer kept by the clip range.
    #[arg(long)]
    last_layer: Option<usize>,

    /// Nodes of each last-layer chain kept.
    #[arg(long)]
    last_cut: Option<usize>,

    /// Restrict inputs to a sub-box, one digit per input per split round.
    #[arg(long)]
    subspace: Option<String>,

    /// Number of slices per split round.
    #[arg(long, default_value_t = 2)]
    splits: usize,
}

#[derive(Subcommand)]
enum QueryKind {
    /// Can the overrides move an output by epsilon in one direction?
    Exact {
        #[arg(long = "override", required = true)]
        overrides: Vec<NeuronOverride>,

        #[arg(long, value_enum)]
        op: OpArg,

        #[arg(long)]
        output: usize,
    },

    /// Can the overrides make another output beat a winning one?
    Minimum {
        #[arg(long = "override", required = true)]
        overrides: Vec<NeuronOverride>,

        #[arg(long)]
        output: usize,

        #[arg(long)]
        counter: usize,
    },

    /// Original and overridden networks side by side, no constraints.
    Joined {
        #[arg(long = "override", required = true)]
        overrides: Vec<NeuronOverride>,
    },

    /// Is the neuron ever outside the claimed phase?
    State {
        #[arg(long)]
        layer: usize,

        #[arg(long)]
        neuron: usize,

        #[arg(long, value_enum)]
        phase: PhaseArg,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OpArg {
    Gt,
    Lt,
}

impl From<OpArg> for CompareOp {
    fn from(op: OpArg) -> Self {
        match op {
            OpArg::Gt => CompareOp::Gt,
            OpArg::Lt => CompareOp::Lt,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum PhaseArg {
    Active,
    Inactive,
}

impl From<PhaseArg> for Phase {
    fn from(phase: PhaseArg) -> Self {
        match phase {
            PhaseArg::Active => Phase::Active,
            PhaseArg::Inactive => Phase::Inactive,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    commands::init_tracing(cli.verbose);
    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Inspect { network, json } => commands::inspect::execute(network, json),
        Commands::Evaluate {
            network,
            input,
            overrides,
            json,
        } => commands::evaluate::execute(network, input, overrides, json, config),
        Commands::Query { args, kind } => commands::query::execute(args, kind, config),
    }
}
