// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `redy query`: builds a redundancy query and writes it as `.ipq` text.
//!
//! ```text
//! load → RedundancyTest → Query → [apply_subspace] → export_query → to_ipq
//! ```

use crate::{QueryArgs, QueryKind};
use anyhow::Context;
use net_formats::export_query;
use network_ir::NodeArena;
use redundancy::{subspace::apply_subspace, AnalysisConfig, ClipRange, RedundancyTest};

/// The configured clip range with any command-line fields laid over it.
fn clip_range(args: &QueryArgs, config: &AnalysisConfig) -> Option<ClipRange> {
    let given = args.first_layer.is_some()
        || args.first_cut.is_some()
        || args.last_layer.is_some()
        || args.last_cut.is_some();
    if !given {
        return None;
    }
    let base = config.clip.unwrap_or_default();
    Some(ClipRange {
        first_layer: args.first_layer.unwrap_or(base.first_layer),
        first_cut: args.first_cut.unwrap_or(base.first_cut),
        last_layer: args.last_layer.or(base.last_layer),
        last_cut: args.last_cut.unwrap_or(base.last_cut),
    })
}

pub fn execute(args: QueryArgs, kind: QueryKind, config: AnalysisConfig) -> anyhow::Result<()> {
    let mut arena = NodeArena::new();
    let net = super::load_network(&args.network, &mut arena)?;
    let range = clip_range(&args, &config);
    let test = RedundancyTest::with_config(net, config)?;

    let query = match kind {
        QueryKind::Exact {
            overrides,
            op,
            output,
        } => test.compared_exact(&overrides, op.into(), output, range.as_ref(), &mut arena)?,
        QueryKind::Minimum {
            overrides,
            output,
            counter,
        } => test.compared_minimum(&overrides, output, counter, range.as_ref(), &mut arena)?,
        QueryKind::Joined { overrides } => test.joined(&overrides, range.as_ref(), &mut arena)?,
        QueryKind::State {
            layer,
            neuron,
            phase,
        } => test.state_check(layer, neuron, phase.into(), range.as_ref(), &mut arena)?,
    };

    if let Some(digits) = &args.subspace {
        apply_subspace(&mut arena, &query, digits, args.splits)
            .with_context(|| format!("invalid subspace '{digits}'"))?;
    }

    let solver_query = export_query(&arena, &query)?;
    let text = solver_query.to_ipq().to_ipq_string();
    match &args.out {
        Some(path) => {
            std::fs::write(path, &text)
                .with_context(|| format!("failed to write '{}'", path.display()))?;
            eprintln!(
                "  wrote {} ({} variables, {} equations, {} relus)",
                path.display(),
                solver_query.num_vars,
                solver_query.equations.len(),
                solver_query.relus.len(),
            );
        }
        None => print!("{text}"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn args() -> QueryArgs {
        QueryArgs {
            network: PathBuf::from("n.nnet"),
            out: None,
            first_layer: None,
            first_cut: None,
            last_layer: None,
            last_cut: None,
            subspace: None,
            splits: 2,
        }
    }

    #[test]
    fn test_clip_range_absent() {
        assert_eq!(clip_range(&args(), &AnalysisConfig::default()), None);
    }

    #[test]
    fn test_clip_range_overlays_config() {
        let config = AnalysisConfig {
            clip: Some(ClipRange {
                first_layer: 2,
                first_cut: 1,
                ..ClipRange::default()
            }),
            ..AnalysisConfig::default()
        };
        let range = clip_range(
            &QueryArgs {
                first_cut: Some(0),
                ..args()
            },
            &config,
        )
        .unwrap();
        assert_eq!(range.first_layer, 2);
        assert_eq!(range.first_cut, 0);
        assert_eq!(range.last_layer, None);
    }
}
