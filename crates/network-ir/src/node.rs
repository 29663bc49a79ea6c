// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Computation nodes of the network IR.
//!
//! A [`Node`] is one scalar unit of a piecewise-linear network: a free value,
//! an affine combination, a ReLU or an absolute value. Nodes never hold
//! references to each other directly; they name their inputs by [`NodeId`]
//! handles into a [`NodeArena`](crate::NodeArena). Identity of a node is the
//! identity of its handle.
//!
//! The set of kinds is closed. Every operation that inspects a node
//! (`referenced_nodes`, `rewrite_references`, the exporters) matches
//! exhaustively on [`NodeKind`], so a new kind cannot silently fall through.

use crate::IrError;
use std::collections::HashMap;
use std::fmt;

/// Stable handle of a node inside a [`NodeArena`](crate::NodeArena).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    /// Position of the node in its arena.
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ── Bounds ─────────────────────────────────────────────────────────

/// A closed interval `[lower, upper]` where either end may be unknown.
#[derive(Debug, Clone, Copy, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct Bounds {
    pub lower: Option<f64>,
    pub upper: Option<f64>,
}

impl Bounds {
    /// The interval with both ends unknown.
    pub const UNBOUNDED: Bounds = Bounds {
        lower: None,
        upper: None,
    };

    pub fn new(lower: Option<f64>, upper: Option<f64>) -> Self {
        Self { lower, upper }
    }

    /// The degenerate interval `[value, value]`.
    pub fn fixed(value: f64) -> Self {
        Self {
            lower: Some(value),
            upper: Some(value),
        }
    }

    /// Returns the pinned value if `lower == upper`.
    pub fn fixed_value(&self) -> Option<f64> {
        match (self.lower, self.upper) {
            (Some(l), Some(u)) if l == u => Some(l),
            _ => None,
        }
    }

    /// Intersection with a proposed interval. Does not check emptiness.
    pub fn intersect(&self, lower: Option<f64>, upper: Option<f64>) -> Bounds {
        let lower = match (self.lower, lower) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        let upper = match (self.upper, upper) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        Bounds { lower, upper }
    }

    /// True if both ends are known and `lower > upper`.
    pub fn is_empty(&self) -> bool {
        matches!((self.lower, self.upper), (Some(l), Some(u)) if l > u)
    }

    /// True if `value` lies within the interval, widened by `tolerance`.
    pub fn contains(&self, value: f64, tolerance: f64) -> bool {
        self.lower.map_or(true, |l| value >= l - tolerance)
            && self.upper.map_or(true, |u| value <= u + tolerance)
    }
}

impl fmt::Display for Bounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let end = |v: Option<f64>, inf: &str| v.map_or_else(|| inf.to_string(), |v| v.to_string());
        write!(f, "[{}, {}]", end(self.lower, "-inf"), end(self.upper, "+inf"))
    }
}

// ── Node kinds ─────────────────────────────────────────────────────

/// The computation a node performs.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// A free value: a network input or a severed link.
    Plain,
    /// `Σ coefficient · input + bias`.
    Affine { terms: Vec<(f64, NodeId)>, bias: f64 },
    /// `max(0, input)`. `relaxed` marks it for external linear relaxation.
    Relu { input: NodeId, relaxed: bool },
    /// `|input|`.
    Abs { input: NodeId },
}

impl NodeKind {
    /// Short name used in diagnostics and listings.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::Affine { .. } => "affine",
            Self::Relu { .. } => "relu",
            Self::Abs { .. } => "abs",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ── Node ───────────────────────────────────────────────────────────

/// A single scalar unit of the network, with its bound interval and label.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    pub bounds: Bounds,
    /// Debug label (e.g. `"nnet0_02_05_f"`). Not used for identity.
    pub label: Option<String>,
}

impl Node {
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            bounds: Bounds::UNBOUNDED,
            label: None,
        }
    }

    pub fn plain() -> Self {
        Self::new(NodeKind::Plain)
    }

    pub fn affine(terms: Vec<(f64, NodeId)>, bias: f64) -> Self {
        Self::new(NodeKind::Affine { terms, bias })
    }

    pub fn relu(input: NodeId) -> Self {
        Self::new(NodeKind::Relu {
            input,
            relaxed: false,
        })
    }

    pub fn abs(input: NodeId) -> Self {
        Self::new(NodeKind::Abs { input })
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_bounds(mut self, bounds: Bounds) -> Self {
        self.bounds = bounds;
        self
    }

    /// Narrows the interval to its intersection with `[lower, upper]`.
    ///
    /// Never widens. On an empty result the node is left untouched and
    /// [`IrError::InvalidBounds`] is returned.
    pub fn update_limit(&mut self, lower: Option<f64>, upper: Option<f64>) -> Result<(), IrError> {
        let narrowed = self.bounds.intersect(lower, upper);
        if narrowed.is_empty() {
            return Err(IrError::InvalidBounds {
                node: self.display_name(),
                lower: narrowed.lower.unwrap_or(f64::NEG_INFINITY),
                upper: narrowed.upper.unwrap_or(f64::INFINITY),
            });
        }
        self.bounds = narrowed;
        Ok(())
    }

    /// Direct structural dependencies, in term order.
    pub fn referenced_nodes(&self) -> Vec<NodeId> {
        match &self.kind {
            NodeKind::Plain => Vec::new(),
            NodeKind::Affine { terms, .. } => terms.iter().map(|&(_, n)| n).collect(),
            NodeKind::Relu { input, .. } | NodeKind::Abs { input } => vec![*input],
        }
    }

    /// Replaces every input reference `n` with `map(n)`.
    pub fn rewrite_references(&mut self, map: impl Fn(NodeId) -> NodeId) {
        match &mut self.kind {
            NodeKind::Plain => {}
            NodeKind::Affine { terms, .. } => {
                for (_, n) in terms.iter_mut() {
                    *n = map(*n);
                }
            }
            NodeKind::Relu { input, .. } | NodeKind::Abs { input } => *input = map(*input),
        }
    }

    /// Same kind, bounds, label and coefficients, referencing the *same* inputs.
    ///
    /// The copy is shallow: callers follow up with a rewrite pass over all
    /// copies using the old→new table to obtain a disjoint graph.
    pub fn structural_copy(&self) -> Node {
        self.clone()
    }

    /// Label if present, otherwise the kind name.
    pub fn display_name(&self) -> String {
        self.label
            .clone()
            .unwrap_or_else(|| format!("<{}>", self.kind.name()))
    }
}

// ── Substitution ───────────────────────────────────────────────────

/// A partial old→new node mapping, identity outside its domain.
///
/// This is the only sanctioned way to redirect references: duplication,
/// clipping, neuron overrides and joins all build one of these and thread
/// it through a single rewrite pass.
#[derive(Debug, Clone, Default)]
pub struct Substitution {
    table: HashMap<NodeId, NodeId>,
}

impl Substitution {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            table: HashMap::with_capacity(capacity),
        }
    }

    pub fn insert(&mut self, from: NodeId, to: NodeId) {
        self.table.insert(from, to);
    }

    /// The image of `id`, or `id` itself if it is not remapped.
    pub fn apply(&self, id: NodeId) -> NodeId {
        self.table.get(&id).copied().unwrap_or(id)
    }

    pub fn get(&self, id: NodeId) -> Option<NodeId> {
        self.table.get(&id).copied()
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// The targets of the mapping, in no particular order.
    pub fn targets(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.table.values().copied()
    }
}

impl FromIterator<(NodeId, NodeId)> for Substitution {
    fn from_iter<I: IntoIterator<Item = (NodeId, NodeId)>>(iter: I) -> Self {
        Self {
            table: iter.into_iter().collect(),
        }
    }
}
