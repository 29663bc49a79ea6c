// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `redy inspect`: layer structure and input box of a network.

use network_ir::{Bounds, NodeArena};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Serialize)]
struct InputReport {
    name: String,
    bounds: Bounds,
}

#[derive(Serialize)]
struct LayerReport {
    index: usize,
    neurons: usize,
    shape: String,
}

#[derive(Serialize)]
struct InspectReport {
    nodes: usize,
    inputs: Vec<InputReport>,
    layers: Vec<LayerReport>,
}

pub fn execute(network: PathBuf, json: bool) -> anyhow::Result<()> {
    let mut arena = NodeArena::new();
    let net = super::load_network(&network, &mut arena)?;

    let report = InspectReport {
        nodes: net.nodes().len(),
        inputs: net
            .inputs()
            .into_iter()
            .map(|id| InputReport {
                name: arena.name(id),
                bounds: arena.bounds(id),
            })
            .collect(),
        layers: net
            .layers
            .iter()
            .enumerate()
            .map(|(index, layer)| LayerReport {
                index,
                neurons: layer.len(),
                shape: layer
                    .first()
                    .map(|chain| {
                        chain
                            .iter()
                            .map(|&id| arena.get(id).kind.name())
                            .collect::<Vec<_>>()
                            .join("+")
                    })
                    .unwrap_or_default(),
            })
            .collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("  Network: {}", network.display());
    println!("  Layers:  {}", report.layers.len());
    println!("  Nodes:   {}", report.nodes);
    println!();

    // ── Layers ─────────────────────────────────────────────────
    println!("  {:<6} {:>8}  {}", "Layer", "Neurons", "Chain");
    println!("  {}", "-".repeat(40));
    for layer in &report.layers {
        println!("  {:<6} {:>8}  {}", layer.index, layer.neurons, layer.shape);
    }
    println!();

    // ── Input box ──────────────────────────────────────────────
    println!("  {:<24} {:>12} {:>12}", "Input", "Lower", "Upper");
    println!("  {}", "-".repeat(50));
    for input in &report.inputs {
        println!(
            "  {:<24} {:>12} {:>12}",
            truncate(&input.name, 24),
            limit(input.bounds.lower),
            limit(input.bounds.upper),
        );
    }
    println!();
    Ok(())
}

fn limit(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.4}"))
}

/// Truncates a string to `max_len` with ellipsis if needed.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len - 3).collect();
        format!("{head}...")
    }
}
