// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Lowering a [`Query`] into dense, index-addressed constraint tables.
//!
//! Every node gets an index in query order. Affine nodes become equality
//! constraints `Σ c·x − self = −bias`, query equations are copied over, and
//! ReLU nodes become `(input, output)` relations. Plain nodes contribute only
//! their bounds.

use crate::EvalError;
use network_ir::{Comparator, NodeArena, NodeId, NodeKind, Query};
use std::collections::HashMap;

/// Comparator of a lowered [`Constraint`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    Eq,
    Ge,
    Le,
}

impl From<Comparator> for ConstraintKind {
    fn from(c: Comparator) -> Self {
        match c {
            Comparator::Eq => Self::Eq,
            Comparator::Ge => Self::Ge,
            Comparator::Le => Self::Le,
        }
    }
}

/// `Σ coefficient · value[index] ⋈ scalar`.
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    pub kind: ConstraintKind,
    pub scalar: f64,
    /// `(index, coefficient)` pairs.
    pub terms: Vec<(usize, f64)>,
}

/// `value[output] = max(0, value[input])`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReluRelation {
    pub input: usize,
    pub output: usize,
}

/// A query lowered for numerical execution.
#[derive(Debug, Clone)]
pub struct Evaluator {
    pub(crate) ids: Vec<NodeId>,
    pub(crate) names: Vec<String>,
    pub(crate) index: HashMap<NodeId, usize>,
    pub(crate) inputs: Vec<usize>,
    pub(crate) outputs: Vec<usize>,
    pub(crate) lower: Vec<Option<f64>>,
    pub(crate) upper: Vec<Option<f64>>,
    pub(crate) constraints: Vec<Constraint>,
    pub(crate) relus: Vec<ReluRelation>,
}

impl Evaluator {
    /// Lowers `query`. Fails on absolute-value nodes, which the evaluator
    /// cannot execute, and on structurally broken queries.
    pub fn from_query(arena: &NodeArena, query: &Query) -> Result<Self, EvalError> {
        query.check_integrity(arena)?;

        let ids = query.nodes().to_vec();
        let index: HashMap<NodeId, usize> =
            ids.iter().enumerate().map(|(i, &id)| (id, i)).collect();
        let names = ids.iter().map(|&id| arena.name(id)).collect();

        let mut lower = Vec::with_capacity(ids.len());
        let mut upper = Vec::with_capacity(ids.len());
        let mut constraints = Vec::new();
        let mut relus = Vec::new();

        for (i, &id) in ids.iter().enumerate() {
            let node = arena.get(id);
            lower.push(node.bounds.lower);
            upper.push(node.bounds.upper);

            match &node.kind {
                NodeKind::Plain => {}
                NodeKind::Affine { terms, bias } => {
                    let mut lowered: Vec<(usize, f64)> =
                        terms.iter().map(|&(c, n)| (index[&n], c)).collect();
                    lowered.push((i, -1.0));
                    constraints.push(Constraint {
                        kind: ConstraintKind::Eq,
                        scalar: -bias,
                        terms: lowered,
                    });
                }
                NodeKind::Relu { input, .. } => relus.push(ReluRelation {
                    input: index[input],
                    output: i,
                }),
                NodeKind::Abs { .. } => {
                    return Err(EvalError::UnsupportedConstraintKind {
                        kind: node.kind.name(),
                        node: arena.name(id),
                    })
                }
            }
        }

        for eq in query.equations() {
            constraints.push(Constraint {
                kind: eq.comparator.into(),
                scalar: eq.scalar,
                terms: eq.terms.iter().map(|&(c, n)| (index[&n], c)).collect(),
            });
        }

        let inputs = query.inputs().iter().map(|n| index[n]).collect();
        let outputs = query.outputs().iter().map(|n| index[n]).collect();

        tracing::debug!(
            variables = ids.len(),
            constraints = constraints.len(),
            relus = relus.len(),
            "lowered query for evaluation"
        );

        Ok(Self {
            ids,
            names,
            index,
            inputs,
            outputs,
            lower,
            upper,
            constraints,
            relus,
        })
    }

    pub fn num_vars(&self) -> usize {
        self.ids.len()
    }

    pub fn index_of(&self, id: NodeId) -> Option<usize> {
        self.index.get(&id).copied()
    }

    pub fn node_at(&self, index: usize) -> Option<NodeId> {
        self.ids.get(index).copied()
    }

    pub fn input_indices(&self) -> &[usize] {
        &self.inputs
    }

    pub fn output_indices(&self) -> &[usize] {
        &self.outputs
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn relus(&self) -> &[ReluRelation] {
        &self.relus
    }

    pub fn lower_bound(&self, index: usize) -> Option<f64> {
        self.lower.get(index).copied().flatten()
    }

    pub fn upper_bound(&self, index: usize) -> Option<f64> {
        self.upper.get(index).copied().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use network_ir::{Bounds, Equation, Node};

    #[test]
    fn test_lowering_tables() {
        let mut arena = NodeArena::new();
        let x = arena.push(Node::plain().with_bounds(Bounds::new(Some(0.0), Some(1.0))));
        let b = arena.push(Node::affine(vec![(2.0, x)], -1.0));
        let f = arena.push(Node::relu(b).with_bounds(Bounds::new(Some(0.0), None)));
        let eq = Equation::new(vec![(1.0, f)], Comparator::Ge, 0.25);
        let q = Query::new([x, b, f], vec![x], vec![f], vec![eq]).unwrap();

        let ev = Evaluator::from_query(&arena, &q).unwrap();
        assert_eq!(ev.num_vars(), 3);
        assert_eq!(ev.input_indices(), &[0]);
        assert_eq!(ev.output_indices(), &[2]);
        assert_eq!(ev.lower_bound(0), Some(0.0));
        assert_eq!(ev.upper_bound(2), None);

        assert_eq!(
            ev.constraints()[0],
            Constraint {
                kind: ConstraintKind::Eq,
                scalar: 1.0,
                terms: vec![(0, 2.0), (1, -1.0)],
            }
        );
        assert_eq!(ev.constraints()[1].kind, ConstraintKind::Ge);
        assert_eq!(ev.relus(), &[ReluRelation { input: 1, output: 2 }]);
        assert_eq!(ev.node_at(1), Some(b));
        assert_eq!(ev.index_of(f), Some(2));
    }

    #[test]
    fn test_abs_is_unsupported() {
        let mut arena = NodeArena::new();
        let x = arena.push(Node::plain());
        let a = arena.push(Node::abs(x).with_label("a"));
        let q = Query::new([x, a], vec![x], vec![a], vec![]).unwrap();
        let err = Evaluator::from_query(&arena, &q).unwrap_err();
        assert_eq!(
            err,
            EvalError::UnsupportedConstraintKind {
                kind: "abs",
                node: "a".into()
            }
        );
    }

    #[test]
    fn test_broken_query_rejected() {
        let mut arena = NodeArena::new();
        let x = arena.push(Node::plain());
        let r = arena.push(Node::relu(x));
        let q = Query::new([r], vec![r], vec![r], vec![]).unwrap();
        assert!(matches!(
            Evaluator::from_query(&arena, &q),
            Err(EvalError::Ir(_))
        ));
    }
}
