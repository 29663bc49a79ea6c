// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for IR construction and structural checks.

use crate::NodeId;

/// Errors that can occur when building or mutating the network IR.
///
/// Every variant signals a broken invariant left behind by an earlier
/// transformation or a malformed input; none of them is retryable.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum IrError {
    /// Narrowing a node's interval would leave it empty.
    #[error("invalid bounds on {node}: lower {lower} > upper {upper}")]
    InvalidBounds { node: String, lower: f64, upper: f64 },

    /// A node, input, output or equation refers outside its owning structure.
    #[error("referential integrity violated: {detail}")]
    ReferentialIntegrity { detail: String },

    /// The graph does not have the layered shape an operation expects.
    #[error("unsupported topology: {0}")]
    UnsupportedTopology(String),

    /// A node kind name was not recognised.
    #[error("unknown node kind '{0}'")]
    UnknownNodeKind(String),

    /// A neuron override name was not one of `active`, `inactive`, `nofunc`.
    #[error("unknown override kind '{0}'; expected 'active', 'inactive' or 'nofunc'")]
    UnknownOverrideKind(String),

    /// A layer, neuron, chain position or output index is out of range.
    #[error("{what} index {index} out of range (limit {limit})")]
    IndexOutOfRange {
        what: &'static str,
        index: usize,
        limit: usize,
    },

    /// An output was asked to beat itself.
    #[error("output {output} and counter output {counter} must differ")]
    SameOutput { output: usize, counter: usize },
}

impl IrError {
    /// Shorthand for a [`IrError::ReferentialIntegrity`] naming the dangling node.
    pub(crate) fn dangling(owner: impl std::fmt::Display, target: NodeId) -> Self {
        Self::ReferentialIntegrity {
            detail: format!("{owner} references {target}, which is not part of the structure"),
        }
    }

    /// Shorthand for [`IrError::IndexOutOfRange`].
    pub fn out_of_range(what: &'static str, index: usize, limit: usize) -> Self {
        Self::IndexOutOfRange { what, index, limit }
    }

    /// Rejects an output paired with itself as its counter output.
    pub fn distinct_outputs(output: usize, counter: usize) -> Result<(), Self> {
        if output == counter {
            return Err(Self::SameOutput { output, counter });
        }
        Ok(())
    }
}
