// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Append-only node storage.
//!
//! All structures derived from one import (duplicates, clipped slices,
//! joined pairs and the queries built from them) share a single
//! [`NodeArena`]. Nodes are never removed; a node dropped from every
//! structure simply becomes unreachable.

use crate::{Bounds, IrError, Node, NodeId, Substitution};

/// Owner of every [`Node`], addressed by [`NodeId`].
#[derive(Debug, Clone, Default)]
pub struct NodeArena {
    nodes: Vec<Node>,
}

impl NodeArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a node and returns its handle.
    pub fn push(&mut self, node: Node) -> NodeId {
        let id = NodeId::new(self.nodes.len());
        self.nodes.push(node);
        id
    }

    /// Returns the node behind `id`.
    ///
    /// # Panics
    /// If `id` was issued by a different arena.
    pub fn get(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    /// Mutable access to the node behind `id`.
    ///
    /// # Panics
    /// If `id` was issued by a different arena.
    pub fn get_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    /// Returns the node behind `id`, or `None` for a foreign handle.
    pub fn try_get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    /// Pushes a [`Node::structural_copy`] of `id`, appending `suffix` to its label.
    pub fn copy_node(&mut self, id: NodeId, suffix: &str) -> NodeId {
        let mut copy = self.get(id).structural_copy();
        if let Some(label) = copy.label.as_mut() {
            label.push_str(suffix);
        }
        self.push(copy)
    }

    /// Pushes a fresh plain node that inherits the bounds of `id`.
    pub fn sever(&mut self, id: NodeId, label_suffix: &str) -> NodeId {
        let source = self.get(id);
        let mut node = Node::plain().with_bounds(source.bounds);
        node.label = source.label.as_ref().map(|l| format!("{l}{label_suffix}"));
        self.push(node)
    }

    /// Narrows the bounds of `id`. See [`Node::update_limit`].
    pub fn update_limit(
        &mut self,
        id: NodeId,
        lower: Option<f64>,
        upper: Option<f64>,
    ) -> Result<(), IrError> {
        self.get_mut(id).update_limit(lower, upper)
    }

    pub fn bounds(&self, id: NodeId) -> Bounds {
        self.get(id).bounds
    }

    /// Rewrites the references of `id` through `subst`.
    pub fn rewrite(&mut self, id: NodeId, subst: &Substitution) {
        self.get_mut(id).rewrite_references(|n| subst.apply(n));
    }

    /// Label of `id`, falling back to its handle.
    pub fn name(&self, id: NodeId) -> String {
        match &self.get(id).label {
            Some(label) => label.clone(),
            None => id.to_string(),
        }
    }

    /// Number of nodes ever created in this arena.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
