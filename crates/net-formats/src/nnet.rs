// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Import of dense-weight `.nnet` files.
//!
//! # Layout
//! Lines starting with `//` are comments. Every other line is a list of
//! comma-separated values, usually with a trailing comma.
//!
//! ```text
//! numLayers, inputSize, maxLayerSize, <unused>,
//! size0, size1, ..., sizeN,          (numLayers + 1 entries, input first)
//! <unused symmetric flag>,
//! inputMin0, ..., inputMinK,
//! inputMax0, ..., inputMaxK,
//! mean0, ..., meanK, meanOut,
//! range0, ..., rangeK, rangeOut,
//! then, per layer: one weight row per output neuron, then one bias per line
//! ```
//!
//! Input bounds are normalized as `(value - mean) / range`. Hidden neurons
//! become `[Affine, ReLU]` chains; the final layer is affine only.

use crate::{FormatError, ImportContext};
use network_ir::{Bounds, LayeredNetwork, Node, NodeArena};
use std::path::Path;

/// Parsed contents of an `.nnet` file, before any nodes are created.
#[derive(Debug, Clone, PartialEq)]
pub struct NNetFile {
    /// Layer sizes, input layer first.
    pub layer_sizes: Vec<usize>,
    pub input_minimums: Vec<f64>,
    pub input_maximums: Vec<f64>,
    pub means: Vec<f64>,
    pub ranges: Vec<f64>,
    /// `weights[layer][row][col]`, rows are output neurons.
    pub weights: Vec<Vec<Vec<f64>>>,
    /// `biases[layer][row]`.
    pub biases: Vec<Vec<f64>>,
}

/// Iterator over the data rows of an `.nnet` text, tracking line numbers.
struct Rows<'a> {
    lines: std::iter::Enumerate<std::str::Lines<'a>>,
    line: usize,
}

impl<'a> Rows<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            lines: text.lines().enumerate(),
            line: 0,
        }
    }

    /// Next non-comment, non-blank row, split on commas. A trailing empty
    /// field (from the trailing comma) is dropped.
    fn next_row(&mut self, what: &str) -> Result<Vec<&'a str>, FormatError> {
        for (i, raw) in self.lines.by_ref() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with("//") {
                continue;
            }
            self.line = i + 1;
            let mut fields: Vec<&str> = line.split(',').map(str::trim).collect();
            if fields.last().is_some_and(|f| f.is_empty()) {
                fields.pop();
            }
            return Ok(fields);
        }
        Err(FormatError::parse(
            self.line + 1,
            format!("unexpected end of file, expected {what}"),
        ))
    }

    fn floats(&mut self, what: &str, at_least: usize) -> Result<Vec<f64>, FormatError> {
        let row = self.next_row(what)?;
        if row.len() < at_least {
            return Err(FormatError::parse(
                self.line,
                format!("{what}: expected at least {at_least} values, got {}", row.len()),
            ));
        }
        row.iter()
            .map(|f| {
                f.parse::<f64>().map_err(|e| {
                    FormatError::parse(self.line, format!("{what}: invalid number '{f}': {e}"))
                })
            })
            .collect()
    }

    fn sizes(&mut self, what: &str, at_least: usize) -> Result<Vec<usize>, FormatError> {
        let row = self.next_row(what)?;
        if row.len() < at_least {
            return Err(FormatError::parse(
                self.line,
                format!("{what}: expected at least {at_least} values, got {}", row.len()),
            ));
        }
        row.iter()
            .map(|f| {
                f.parse::<usize>().map_err(|e| {
                    FormatError::parse(self.line, format!("{what}: invalid integer '{f}': {e}"))
                })
            })
            .collect()
    }
}

impl NNetFile {
    /// Parses `.nnet` text.
    pub fn parse(text: &str) -> Result<Self, FormatError> {
        let mut rows = Rows::new(text);

        let header = rows.sizes("header", 2)?;
        let (num_layers, input_size) = (header[0], header[1]);

        let size_count = num_layers
            .checked_add(1)
            .ok_or_else(|| FormatError::parse(rows.line, "layer count overflows"))?;
        let layer_sizes = rows.sizes("layer sizes", size_count)?;
        if layer_sizes.len() != size_count {
            return Err(FormatError::parse(
                rows.line,
                format!(
                    "expected {size_count} layer sizes, got {}",
                    layer_sizes.len()
                ),
            ));
        }
        if layer_sizes[0] != input_size {
            return Err(FormatError::parse(
                rows.line,
                format!(
                    "input layer size {} does not match header input size {input_size}",
                    layer_sizes[0]
                ),
            ));
        }

        rows.next_row("symmetric flag")?;

        let input_minimums = rows.floats("input minimums", input_size)?;
        let input_maximums = rows.floats("input maximums", input_size)?;
        let means = rows.floats("means", input_size)?;
        let ranges = rows.floats("ranges", input_size)?;

        // Counts come from the file; vectors grow only as rows are read.
        let mut weights = Vec::new();
        let mut biases = Vec::new();
        for layer in 0..num_layers {
            let (cols, rows_n) = (layer_sizes[layer], layer_sizes[layer + 1]);
            let mut w = Vec::new();
            for _ in 0..rows_n {
                let mut row = rows.floats("weight row", cols)?;
                row.truncate(cols);
                w.push(row);
            }
            let mut b = Vec::new();
            for _ in 0..rows_n {
                b.push(rows.floats("bias", 1)?[0]);
            }
            weights.push(w);
            biases.push(b);
        }

        Ok(Self {
            layer_sizes,
            input_minimums,
            input_maximums,
            means,
            ranges,
            weights,
            biases,
        })
    }

    pub fn input_size(&self) -> usize {
        self.layer_sizes[0]
    }

    /// Normalized `[min, max]` of input `i`.
    pub fn normalized_input_bounds(&self, i: usize) -> (f64, f64) {
        let norm = |v: f64| (v - self.means[i]) / self.ranges[i];
        (norm(self.input_minimums[i]), norm(self.input_maximums[i]))
    }

    /// Creates the nodes of the network in `arena`.
    pub fn build(
        &self,
        ctx: &mut ImportContext,
        arena: &mut NodeArena,
    ) -> Result<LayeredNetwork, FormatError> {
        let prefix = ctx.next_nnet_prefix();
        let last = self.layer_sizes.len() - 1;

        let mut layers = Vec::with_capacity(self.layer_sizes.len());
        let mut input_layer = Vec::with_capacity(self.input_size());
        for i in 0..self.input_size() {
            let (lo, hi) = self.normalized_input_bounds(i);
            let id = arena.push(Node::plain().with_label(format!("{prefix}00_{i:02}")));
            arena.update_limit(id, Some(lo), Some(hi))?;
            input_layer.push(vec![id]);
        }
        layers.push(input_layer);

        for (l, (ws, bs)) in self.weights.iter().zip(&self.biases).enumerate() {
            let l = l + 1;
            let previous: Vec<_> = layers[l - 1]
                .iter()
                .filter_map(|chain: &Vec<_>| chain.last().copied())
                .collect();

            let mut layer = Vec::with_capacity(ws.len());
            for (n, (row, &bias)) in ws.iter().zip(bs).enumerate() {
                let name = format!("{prefix}{l:02}_{n:02}");
                let terms = row.iter().copied().zip(previous.iter().copied()).collect();
                if l == last {
                    let b = arena.push(Node::affine(terms, bias).with_label(name));
                    layer.push(vec![b]);
                } else {
                    let b = arena.push(Node::affine(terms, bias).with_label(format!("{name}_b")));
                    let f = arena.push(
                        Node::relu(b)
                            .with_label(format!("{name}_f"))
                            .with_bounds(Bounds::new(Some(0.0), None)),
                    );
                    layer.push(vec![b, f]);
                }
            }
            layers.push(layer);
        }

        let net = LayeredNetwork::new(layers, arena)?;
        tracing::info!(
            prefix = %prefix,
            layers = net.layer_count(),
            nodes = net.nodes().len(),
            "imported nnet network"
        );
        Ok(net)
    }
}

/// Parses `.nnet` text and builds the network in one step.
pub fn import_nnet(
    text: &str,
    ctx: &mut ImportContext,
    arena: &mut NodeArena,
) -> Result<LayeredNetwork, FormatError> {
    NNetFile::parse(text)?.build(ctx, arena)
}

/// Reads and imports an `.nnet` file from disk.
pub fn load_nnet(
    path: &Path,
    ctx: &mut ImportContext,
    arena: &mut NodeArena,
) -> Result<LayeredNetwork, FormatError> {
    let text = std::fs::read_to_string(path).map_err(|source| FormatError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    import_nnet(&text, ctx, arena)
}
