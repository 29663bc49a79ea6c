// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # redundancy
//!
//! Transformations that turn a [`network_ir::LayeredNetwork`] into solver
//! queries about neuron redundancy.
//!
//! - [`clip`]: keep a contiguous layer range, severing its inputs.
//! - [`amend`]: override neuron activations, join an overridden copy onto
//!   the original and build comparison and state-check queries.
//! - [`RedundancyTest`]: the orchestrator composing the two per request.
//! - [`subspace`] and [`relax`]: input-box restriction and ReLU relaxation
//!   helpers for the queries it returns.
//!
//! # Example
//! ```
//! use network_ir::{LayeredNetwork, Node, NodeArena};
//! use redundancy::{NeuronOverride, OverrideKind, RedundancyTest};
//!
//! let mut arena = NodeArena::new();
//! let x = arena.push(Node::plain());
//! let b = arena.push(Node::affine(vec![(1.0, x)], -0.5));
//! let f = arena.push(Node::relu(b));
//! let y = arena.push(Node::affine(vec![(2.0, f)], 0.0));
//! let net = LayeredNetwork::new(vec![vec![vec![x]], vec![vec![b, f]], vec![vec![y]]], &arena).unwrap();
//!
//! let test = RedundancyTest::new(net, 1e-4);
//! let query = test
//!     .joined(&[NeuronOverride::new(1, 0, OverrideKind::Inactive)], None, &mut arena)
//!     .unwrap();
//! assert_eq!(query.outputs().len(), 2);
//! ```

pub mod amend;
pub mod clip;
mod config;
mod error;
mod orchestrator;
pub mod relax;
pub mod subspace;

pub use amend::{CompareOp, JoinedNetworks, OverrideKind, Overrides, Phase};
pub use clip::ClipRange;
pub use config::AnalysisConfig;
pub use error::RedundancyError;
pub use orchestrator::{NeuronOverride, RedundancyTest};

#[cfg(test)]
pub(crate) mod fixtures {
    use network_ir::{Bounds, LayeredNetwork, Node, NodeArena, NodeId};

    /// 2 inputs in [-1, 1] → 2 × [affine, relu] → 2 × [affine, relu] → 1 output.
    pub fn deep(arena: &mut NodeArena) -> LayeredNetwork {
        let x0 = arena.push(Node::plain().with_label("x0").with_bounds(Bounds::new(Some(-1.0), Some(1.0))));
        let x1 = arena.push(Node::plain().with_label("x1").with_bounds(Bounds::new(Some(-1.0), Some(1.0))));
        let mut layers = vec![vec![vec![x0], vec![x1]]];
        let mut prev: Vec<NodeId> = vec![x0, x1];
        for l in 1..3 {
            let mut layer = Vec::new();
            for n in 0..2 {
                let sign = if n == 0 { 1.0 } else { -1.0 };
                let b = arena.push(
                    Node::affine(vec![(1.0, prev[0]), (sign, prev[1])], 0.0)
                        .with_label(format!("h{l}{n}_b")),
                );
                let f = arena.push(
                    Node::relu(b)
                        .with_label(format!("h{l}{n}_f"))
                        .with_bounds(Bounds::new(Some(0.0), None)),
                );
                layer.push(vec![b, f]);
            }
            prev = layer.iter().map(|chain: &Vec<NodeId>| chain[1]).collect();
            layers.push(layer);
        }
        let y = arena.push(Node::affine(vec![(1.0, prev[0]), (2.0, prev[1])], 0.5).with_label("y"));
        layers.push(vec![vec![y]]);
        LayeredNetwork::new(layers, arena).unwrap()
    }
}
