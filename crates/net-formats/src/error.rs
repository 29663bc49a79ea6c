// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for importing and exporting network formats.

use std::path::PathBuf;

/// Errors that can occur while reading or writing external formats.
#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    /// The file could not be read.
    #[error("failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A line of the input does not match the expected layout.
    #[error("parse error at line {line}: {detail}")]
    Parse { line: usize, detail: String },

    /// A piecewise constraint kind the reconstruction cannot express.
    #[error("unsupported constraint kind '{kind}'")]
    UnsupportedConstraintKind { kind: String },

    /// An equation defines a variable through a zero coefficient.
    #[error("degenerate equation #{equation}: zero coefficient on variable {variable}")]
    DegenerateEquation { equation: usize, variable: usize },

    /// The solver gave up before reaching a definite answer.
    #[error("solver timed out")]
    SolverTimeout,

    /// The imported or exported structure violates an IR invariant.
    #[error("ir error: {0}")]
    Ir(#[from] network_ir::IrError),
}

impl FormatError {
    pub(crate) fn parse(line: usize, detail: impl Into<String>) -> Self {
        Self::Parse {
            line,
            detail: detail.into(),
        }
    }

    pub(crate) fn topology(detail: impl Into<String>) -> Self {
        Self::Ir(network_ir::IrError::UnsupportedTopology(detail.into()))
    }
}
