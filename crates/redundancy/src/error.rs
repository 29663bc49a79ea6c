// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for redundancy analysis.

/// Errors raised while building redundancy queries.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RedundancyError {
    /// A transformation broke, or was asked to break, an IR invariant.
    #[error("ir error: {0}")]
    Ir(#[from] network_ir::IrError),

    /// A neuron override violates the analysis preconditions.
    #[error("invalid override of neuron ({layer}, {neuron}): {detail}")]
    InvalidOverride {
        layer: usize,
        neuron: usize,
        detail: String,
    },

    /// The clip range does not suit the requested query.
    #[error("invalid clip range: {0}")]
    InvalidRange(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}
