// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Layered view of a feed-forward network.
//!
//! ```text
//! layer 0      layer 1                 layer 2            ...
//! [in0]        [affine, relu]          [affine, relu]
//! [in1]        [affine, relu]          [affine]
//!  ...          ...  ─ chain ─           ...
//! ```
//!
//! Each layer is a list of per-neuron *chains* of one or two nodes. The
//! flattening order (layer-major, then chain-major) is the canonical variable
//! order used by every exporter, and it doubles as the topological order:
//! a node may only reference nodes that come earlier in it.

use crate::{IrError, NodeArena, NodeId, Query, Substitution};
use std::collections::{HashMap, HashSet};

/// The nodes implementing one neuron, head (pre-activation) first.
pub type Chain = Vec<NodeId>;

/// One layer of neuron chains.
pub type Layer = Vec<Chain>;

/// A network as an ordered sequence of layers of neuron chains.
///
/// Node storage lives in a [`NodeArena`]; the network only holds handles.
/// Mutating operations in downstream crates edit `layers` directly and must
/// call [`LayeredNetwork::check_integrity`] afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct LayeredNetwork {
    pub layers: Vec<Layer>,
}

impl LayeredNetwork {
    /// Builds a network and checks its referential integrity.
    pub fn new(layers: Vec<Layer>, arena: &NodeArena) -> Result<Self, IrError> {
        let net = Self { layers };
        net.check_integrity(arena)?;
        Ok(net)
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// Number of neurons in `layer`, or 0 if the layer does not exist.
    pub fn layer_size(&self, layer: usize) -> usize {
        self.layers.get(layer).map_or(0, Vec::len)
    }

    pub fn layer(&self, layer: usize) -> Result<&Layer, IrError> {
        self.layers
            .get(layer)
            .ok_or_else(|| IrError::out_of_range("layer", layer, self.layers.len()))
    }

    pub fn chain(&self, layer: usize, neuron: usize) -> Result<&Chain, IrError> {
        let l = self.layer(layer)?;
        l.get(neuron)
            .ok_or_else(|| IrError::out_of_range("neuron", neuron, l.len()))
    }

    /// All nodes in canonical (layer-major, chain-major) order.
    pub fn nodes(&self) -> Vec<NodeId> {
        self.layers
            .iter()
            .flat_map(|layer| layer.iter().flatten().copied())
            .collect()
    }

    /// Heads of the layer-0 chains.
    pub fn inputs(&self) -> Vec<NodeId> {
        self.layers
            .first()
            .map(|l| l.iter().filter_map(|c| c.first().copied()).collect())
            .unwrap_or_default()
    }

    /// Tails of the last-layer chains.
    pub fn outputs(&self) -> Vec<NodeId> {
        self.layers
            .last()
            .map(|l| l.iter().filter_map(|c| c.last().copied()).collect())
            .unwrap_or_default()
    }

    /// Checks that the network is non-empty, holds no empty chains, contains
    /// each node once, and that every reference points to an earlier node of
    /// this network.
    pub fn check_integrity(&self, arena: &NodeArena) -> Result<(), IrError> {
        if self.layers.is_empty() {
            return Err(IrError::UnsupportedTopology(
                "network contains no layers".into(),
            ));
        }

        let mut position = HashMap::new();
        for (l, layer) in self.layers.iter().enumerate() {
            for (n, chain) in layer.iter().enumerate() {
                if chain.is_empty() {
                    return Err(IrError::UnsupportedTopology(format!(
                        "neuron ({l}, {n}) has an empty chain"
                    )));
                }
                for &id in chain {
                    if arena.try_get(id).is_none() {
                        return Err(IrError::ReferentialIntegrity {
                            detail: format!("{id} does not belong to this arena"),
                        });
                    }
                    let pos = position.len();
                    if position.insert(id, pos).is_some() {
                        return Err(IrError::ReferentialIntegrity {
                            detail: format!("{} appears twice in the network", arena.name(id)),
                        });
                    }
                }
            }
        }

        for (&id, &pos) in &position {
            for target in arena.get(id).referenced_nodes() {
                match position.get(&target) {
                    Some(&tpos) if tpos < pos => {}
                    Some(_) => {
                        return Err(IrError::ReferentialIntegrity {
                            detail: format!(
                                "{} references {}, which does not precede it",
                                arena.name(id),
                                arena.name(target)
                            ),
                        })
                    }
                    None => return Err(IrError::dangling(arena.name(id), target)),
                }
            }
        }
        Ok(())
    }

    /// Makes an isomorphic, identity-disjoint copy of the network.
    ///
    /// Two passes: every node is structurally copied first (still pointing at
    /// the source's inputs), then all copies are rewritten at once through the
    /// old→new table. The topological ordering guarantees every input of a
    /// copy has a copy of its own.
    pub fn duplicate(&self, arena: &mut NodeArena, suffix: &str) -> Result<Self, IrError> {
        let sources = self.nodes();
        let mut table = Substitution::with_capacity(sources.len());
        for &id in &sources {
            let copy = arena.copy_node(id, suffix);
            table.insert(id, copy);
        }
        for &id in &sources {
            let copy = table.apply(id);
            arena.rewrite(copy, &table);
        }

        let layers = self
            .layers
            .iter()
            .map(|layer| {
                layer
                    .iter()
                    .map(|chain| chain.iter().map(|&n| table.apply(n)).collect())
                    .collect()
            })
            .collect();

        tracing::debug!(nodes = sources.len(), suffix, "duplicated network");
        Self::new(layers, arena)
    }

    /// Projects the network to a flat [`Query`]: layer-0 heads as inputs,
    /// last-layer tails as outputs, no equations.
    pub fn to_query(&self) -> Result<Query, IrError> {
        Query::new(self.nodes(), self.inputs(), self.outputs(), Vec::new())
    }

    /// Set of all nodes, for membership checks.
    pub fn node_set(&self) -> HashSet<NodeId> {
        self.nodes().into_iter().collect()
    }

    /// One line per layer with chain shapes, e.g. `[1] 3 neurons: affine+relu x3`.
    pub fn summary(&self, arena: &NodeArena) -> String {
        let mut out = format!(
            "LayeredNetwork: {} layers, {} nodes\n",
            self.layer_count(),
            self.nodes().len()
        );
        for (l, layer) in self.layers.iter().enumerate() {
            let mut shapes: Vec<(String, usize)> = Vec::new();
            for chain in layer {
                let shape = chain
                    .iter()
                    .map(|&id| arena.get(id).kind.name())
                    .collect::<Vec<_>>()
                    .join("+");
                match shapes.iter_mut().find(|(s, _)| *s == shape) {
                    Some((_, count)) => *count += 1,
                    None => shapes.push((shape, 1)),
                }
            }
            let shapes: Vec<String> = shapes
                .into_iter()
                .map(|(s, c)| format!("{s} x{c}"))
                .collect();
            out.push_str(&format!(
                "  [{l}] {} neurons: {}\n",
                layer.len(),
                shapes.join(", ")
            ));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Bounds, Node};

    /// in -> [affine(2x - 1), relu] -> [affine(1h)]
    fn tiny(arena: &mut NodeArena) -> LayeredNetwork {
        let x = arena.push(Node::plain().with_label("x"));
        let b = arena.push(Node::affine(vec![(2.0, x)], -1.0).with_label("h_b"));
        let f = arena.push(
            Node::relu(b)
                .with_label("h_f")
                .with_bounds(Bounds::new(Some(0.0), None)),
        );
        let y = arena.push(Node::affine(vec![(1.0, f)], 0.0).with_label("y"));
        LayeredNetwork::new(vec![vec![vec![x]], vec![vec![b, f]], vec![vec![y]]], arena).unwrap()
    }

    #[test]
    fn test_nodes_canonical_order() {
        let mut arena = NodeArena::new();
        let net = tiny(&mut arena);
        let names: Vec<_> = net.nodes().into_iter().map(|n| arena.name(n)).collect();
        assert_eq!(names, ["x", "h_b", "h_f", "y"]);
    }

    #[test]
    fn test_inputs_outputs() {
        let mut arena = NodeArena::new();
        let net = tiny(&mut arena);
        assert_eq!(arena.name(net.inputs()[0]), "x");
        assert_eq!(arena.name(net.outputs()[0]), "y");
        assert_eq!(net.layer_size(1), 1);
        assert_eq!(net.layer_size(9), 0);
    }

    #[test]
    fn test_check_integrity_dangling() {
        let mut arena = NodeArena::new();
        let stray = arena.push(Node::plain());
        let x = arena.push(Node::plain());
        let y = arena.push(Node::affine(vec![(1.0, stray)], 0.0));
        let err = LayeredNetwork::new(vec![vec![vec![x]], vec![vec![y]]], &arena).unwrap_err();
        assert!(matches!(err, IrError::ReferentialIntegrity { .. }));
    }

    #[test]
    fn test_check_integrity_forward_reference() {
        let mut arena = NodeArena::new();
        let x = arena.push(Node::plain());
        let y = arena.push(Node::affine(vec![(1.0, x)], 0.0));
        // y placed before the node it reads.
        let err = LayeredNetwork::new(vec![vec![vec![y]], vec![vec![x]]], &arena).unwrap_err();
        assert!(matches!(err, IrError::ReferentialIntegrity { .. }));
    }

    #[test]
    fn test_check_integrity_empty() {
        let arena = NodeArena::new();
        assert!(matches!(
            LayeredNetwork::new(vec![], &arena),
            Err(IrError::UnsupportedTopology(_))
        ));
    }

    #[test]
    fn test_duplicate_is_disjoint_and_isomorphic() {
        let mut arena = NodeArena::new();
        let net = tiny(&mut arena);
        let dup = net.duplicate(&mut arena, "_dup").unwrap();

        let src = net.nodes();
        let cpy = dup.nodes();
        assert_eq!(src.len(), cpy.len());
        let map: HashMap<_, _> = src.iter().copied().zip(cpy.iter().copied()).collect();

        for (&s, &c) in src.iter().zip(&cpy) {
            assert!(!src.contains(&c));
            let image: Vec<_> = arena
                .get(s)
                .referenced_nodes()
                .into_iter()
                .map(|r| map[&r])
                .collect();
            assert_eq!(arena.get(c).referenced_nodes(), image);
            assert_eq!(arena.get(c).bounds, arena.get(s).bounds);
        }
        assert_eq!(arena.name(dup.outputs()[0]), "y_dup");
    }

    #[test]
    fn test_duplicate_bounds_are_independent() {
        let mut arena = NodeArena::new();
        let net = tiny(&mut arena);
        let dup = net.duplicate(&mut arena, "").unwrap();
        arena
            .update_limit(dup.inputs()[0], Some(0.0), Some(1.0))
            .unwrap();
        assert_eq!(arena.bounds(net.inputs()[0]), Bounds::UNBOUNDED);
    }

    #[test]
    fn test_to_query() {
        let mut arena = NodeArena::new();
        let net = tiny(&mut arena);
        let q = net.to_query().unwrap();
        assert_eq!(q.nodes().len(), 4);
        assert_eq!(q.inputs(), net.inputs().as_slice());
        assert_eq!(q.outputs(), net.outputs().as_slice());
        assert!(q.equations().is_empty());
    }

    #[test]
    fn test_summary() {
        let mut arena = NodeArena::new();
        let net = tiny(&mut arena);
        let s = net.summary(&arena);
        assert!(s.contains("3 layers"));
        assert!(s.contains("[1] 1 neurons: affine+relu x1"));
    }
}
