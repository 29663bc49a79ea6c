// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # net-formats
//!
//! Adapters between the network IR and external file formats.
//!
//! - [`nnet`]: the fully-connected NNet text format (import only).
//! - [`ipq`]: the solver-native input query format (import and write).
//! - [`solver`]: index-addressed export of a [`network_ir::Query`] plus the
//!   [`Solver`] seam through which an external solver is called.
//!
//! Importers take an [`ImportContext`] so that labels stay unique across all
//! networks imported into one arena.

pub mod context;
pub mod error;
pub mod ipq;
pub mod nnet;
pub mod solver;

pub use context::ImportContext;
pub use error::FormatError;
pub use ipq::{import_ipq, load_ipq, IpqConstraint, IpqEquation, IpqFile, IpqNetwork};
pub use nnet::{import_nnet, load_nnet, NNetFile};
pub use solver::{
    export_query, PiecewisePair, Solver, SolverOutcome, SolverQuery, SolverStatus, VariableTable,
};
