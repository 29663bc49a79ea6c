// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # reference-eval
//!
//! Numerical execution of a [`Query`](network_ir::Query) without the external
//! solver, used to validate transformations and to replay solver witnesses.
//!
//! - [`Evaluator`]: the query lowered into dense bound, constraint and ReLU
//!   tables.
//! - [`Evaluator::forward_evaluate`]: constraint propagation from input
//!   values to a full [`Assignment`].
//! - [`Evaluator::validate`] / [`Evaluator::evaluate_checked`]: raising and
//!   non-raising checks of an assignment against the query.
//!
//! Only affine and ReLU semantics are executable; absolute-value nodes are
//! rejected at lowering time.

mod error;
mod evaluator;
mod lowering;

pub use error::EvalError;
pub use evaluator::{Assignment, TOLERANCE};
pub use lowering::{Constraint, ConstraintKind, Evaluator, ReluRelation};
