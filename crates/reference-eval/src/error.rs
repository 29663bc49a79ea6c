// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for lowering and evaluating queries.

/// Errors raised by the reference evaluator.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvalError {
    /// The query contains a node kind the evaluator cannot execute.
    #[error("unsupported constraint kind '{kind}' on node '{node}'")]
    UnsupportedConstraintKind { kind: &'static str, node: String },

    /// Propagation stalled with variables still unassigned.
    #[error("evaluation incomplete: {unassigned} variable(s) unassigned, first '{first}'")]
    IncompleteEvaluation { unassigned: usize, first: String },

    /// Back-substitution would divide by an exactly-zero coefficient.
    #[error("degenerate equation #{equation}: zero coefficient on '{variable}'")]
    DegenerateEquation { equation: usize, variable: String },

    /// An assignment violates a bound, equation or ReLU relation.
    #[error("validation failed: {detail}")]
    ValidationFailure { detail: String },

    /// The number of input values does not match the declared inputs.
    #[error("expected {expected} input value(s), got {actual}")]
    InputSizeMismatch { expected: usize, actual: usize },

    /// The query itself is structurally broken.
    #[error("ir error: {0}")]
    Ir(#[from] network_ir::IrError),
}
