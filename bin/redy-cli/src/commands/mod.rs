// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Subcommand implementations and the helpers they share.

pub mod evaluate;
pub mod inspect;
pub mod query;

use anyhow::Context;
use net_formats::{load_ipq, load_nnet, ImportContext};
use network_ir::{LayeredNetwork, NodeArena};
use redundancy::AnalysisConfig;
use std::path::Path;
use tracing_subscriber::EnvFilter;

/// Installs the global subscriber. `RUST_LOG` wins over `-v`.
pub fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<AnalysisConfig> {
    match path {
        Some(path) => AnalysisConfig::from_file(path)
            .with_context(|| format!("failed to load config '{}'", path.display())),
        None => Ok(AnalysisConfig::default()),
    }
}

/// Imports `.nnet` or `.ipq` by extension.
pub fn load_network(path: &Path, arena: &mut NodeArena) -> anyhow::Result<LayeredNetwork> {
    let mut ctx = ImportContext::new();
    let network = match path.extension().and_then(|e| e.to_str()) {
        Some("nnet") => load_nnet(path, &mut ctx, arena)?,
        Some("ipq") => load_ipq(path, &mut ctx, arena)?.network,
        _ => anyhow::bail!(
            "unrecognised network file '{}': expected .nnet or .ipq",
            path.display()
        ),
    };
    tracing::info!(path = %path.display(), layers = network.layer_count(), "loaded network");
    Ok(network)
}
