// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # network-ir
//!
//! Intermediate representation for feed-forward, piecewise-linear networks.
//!
//! - [`Node`] / [`NodeKind`]: plain, affine, ReLU and absolute-value units
//!   with a bound interval.
//! - [`NodeArena`]: append-only storage; nodes are addressed by [`NodeId`].
//! - [`Equation`]: linear (in)equality over nodes.
//! - [`LayeredNetwork`]: per-layer, per-neuron chains of nodes.
//! - [`Query`]: flat node set with designated inputs, outputs and equations.
//! - [`Substitution`]: explicit old→new mapping used for every rewrite.
//!
//! # Example
//! ```
//! use network_ir::{LayeredNetwork, Node, NodeArena};
//!
//! let mut arena = NodeArena::new();
//! let x = arena.push(Node::plain().with_label("x"));
//! let h = arena.push(Node::affine(vec![(2.0, x)], -1.0));
//! let r = arena.push(Node::relu(h));
//! let net = LayeredNetwork::new(vec![vec![vec![x]], vec![vec![h, r]]], &arena).unwrap();
//! let dup = net.duplicate(&mut arena, "_dup").unwrap();
//! assert_ne!(net.outputs(), dup.outputs());
//! ```

mod arena;
mod equation;
mod error;
mod network;
mod node;
mod query;

pub use arena::NodeArena;
pub use equation::{Comparator, Equation};
pub use error::IrError;
pub use network::{Chain, Layer, LayeredNetwork};
pub use node::{Bounds, Node, NodeId, NodeKind, Substitution};
pub use query::Query;
