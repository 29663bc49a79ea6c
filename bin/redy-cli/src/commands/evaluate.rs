// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `redy evaluate`: forward evaluation of a network, and of its overridden
//! copy when overrides are given.

use anyhow::Context;
use network_ir::{LayeredNetwork, NodeArena};
use redundancy::{AnalysisConfig, NeuronOverride, RedundancyTest};
use reference_eval::Evaluator;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Serialize)]
struct Evaluation {
    outputs: Vec<f64>,
    valid: bool,
}

#[derive(Serialize)]
struct EvaluateReport {
    input: Vec<f64>,
    original: Evaluation,
    #[serde(skip_serializing_if = "Option::is_none")]
    modified: Option<Evaluation>,
}

fn evaluate(net: &LayeredNetwork, arena: &NodeArena, input: &[f64]) -> anyhow::Result<Evaluation> {
    let query = net.to_query()?;
    let evaluator = Evaluator::from_query(arena, &query)?;
    let (valid, assignment) = evaluator.evaluate_checked(input)?;
    let outputs = evaluator
        .output_values(&assignment)
        .context("some outputs could not be derived from the inputs")?;
    Ok(Evaluation { outputs, valid })
}

pub fn execute(
    network: PathBuf,
    input: Vec<f64>,
    overrides: Vec<NeuronOverride>,
    json: bool,
    config: AnalysisConfig,
) -> anyhow::Result<()> {
    let mut arena = NodeArena::new();
    let net = super::load_network(&network, &mut arena)?;
    let original = evaluate(&net, &arena, &input)?;

    let modified = if overrides.is_empty() {
        None
    } else {
        let test = RedundancyTest::with_config(net, config)?;
        let modi = test.modified(&overrides, None, &mut arena)?;
        Some(evaluate(&modi, &arena, &input)?)
    };

    let report = EvaluateReport {
        input,
        original,
        modified,
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("  Input: {:?}", report.input);
    println!();
    println!("  {:<8} {:>14} {:>14}", "Output", "Original", "Modified");
    println!("  {}", "-".repeat(38));
    for (i, value) in report.original.outputs.iter().enumerate() {
        let other = report
            .modified
            .as_ref()
            .and_then(|m| m.outputs.get(i))
            .map_or_else(|| "-".to_string(), |v| format!("{v:.6}"));
        println!("  {i:<8} {value:>14.6} {other:>14}");
    }
    if !report.original.valid || report.modified.as_ref().is_some_and(|m| !m.valid) {
        println!();
        println!("  warning: the point violates a bound or constraint (rerun with -v for detail)");
    }
    Ok(())
}
