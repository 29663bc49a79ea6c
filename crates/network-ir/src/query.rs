// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Flat satisfiability instance: nodes, designated I/O, extra equations.

use crate::{Equation, IrError, NodeArena, NodeId};
use std::collections::HashSet;

/// A self-contained query handed to the solver or the reference evaluator.
///
/// The node list has set semantics: duplicates are dropped on construction,
/// keeping the first occurrence, so iteration order stays deterministic.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    nodes: Vec<NodeId>,
    inputs: Vec<NodeId>,
    outputs: Vec<NodeId>,
    equations: Vec<Equation>,
    members: HashSet<NodeId>,
}

impl Query {
    /// Builds a query, checking that inputs, outputs and every
    /// equation-referenced node are members of `nodes`.
    pub fn new(
        nodes: impl IntoIterator<Item = NodeId>,
        inputs: Vec<NodeId>,
        outputs: Vec<NodeId>,
        equations: Vec<Equation>,
    ) -> Result<Self, IrError> {
        let mut members = HashSet::new();
        let nodes: Vec<NodeId> = nodes.into_iter().filter(|n| members.insert(*n)).collect();

        let mut query = Self {
            nodes,
            inputs,
            outputs,
            equations: Vec::new(),
            members,
        };
        for &n in &query.inputs {
            query.require_member("input", n)?;
        }
        for &n in &query.outputs {
            query.require_member("output", n)?;
        }
        for eq in equations {
            query.push_equation(eq)?;
        }
        Ok(query)
    }

    fn require_member(&self, role: &str, id: NodeId) -> Result<(), IrError> {
        if self.members.contains(&id) {
            Ok(())
        } else {
            Err(IrError::ReferentialIntegrity {
                detail: format!("{role} {id} is not a member of the query"),
            })
        }
    }

    /// Appends an equation after checking its terms are members.
    pub fn push_equation(&mut self, equation: Equation) -> Result<(), IrError> {
        for n in equation.referenced_nodes() {
            self.require_member("equation term", n)?;
        }
        self.equations.push(equation);
        Ok(())
    }

    /// Full structural check: the subset invariants plus every member's own
    /// references staying inside the query.
    pub fn check_integrity(&self, arena: &NodeArena) -> Result<(), IrError> {
        for &id in &self.nodes {
            let node = arena
                .try_get(id)
                .ok_or_else(|| IrError::ReferentialIntegrity {
                    detail: format!("{id} does not belong to this arena"),
                })?;
            for target in node.referenced_nodes() {
                if !self.members.contains(&target) {
                    return Err(IrError::dangling(arena.name(id), target));
                }
            }
        }
        Ok(())
    }

    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    pub fn inputs(&self) -> &[NodeId] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[NodeId] {
        &self.outputs
    }

    pub fn equations(&self) -> &[Equation] {
        &self.equations
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.members.contains(&id)
    }

    /// Short description for logs and the CLI.
    pub fn summary(&self) -> String {
        format!(
            "Query: {} nodes, {} inputs, {} outputs, {} equations",
            self.nodes.len(),
            self.inputs.len(),
            self.outputs.len(),
            self.equations.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Comparator, Node};

    #[test]
    fn test_new_dedups_nodes() {
        let mut arena = NodeArena::new();
        let a = arena.push(Node::plain());
        let b = arena.push(Node::relu(a));
        let q = Query::new([a, b, a, b], vec![a], vec![b], vec![]).unwrap();
        assert_eq!(q.nodes(), &[a, b]);
        q.check_integrity(&arena).unwrap();
    }

    #[test]
    fn test_input_not_member() {
        let mut arena = NodeArena::new();
        let a = arena.push(Node::plain());
        let b = arena.push(Node::plain());
        let err = Query::new([a], vec![b], vec![a], vec![]).unwrap_err();
        assert!(matches!(err, IrError::ReferentialIntegrity { .. }));
    }

    #[test]
    fn test_output_not_member() {
        let mut arena = NodeArena::new();
        let a = arena.push(Node::plain());
        let b = arena.push(Node::plain());
        assert!(Query::new([a], vec![a], vec![b], vec![]).is_err());
    }

    #[test]
    fn test_equation_term_not_member() {
        let mut arena = NodeArena::new();
        let a = arena.push(Node::plain());
        let b = arena.push(Node::plain());
        let eq = Equation::new(vec![(1.0, b)], Comparator::Ge, 0.0);
        assert!(Query::new([a], vec![a], vec![a], vec![eq]).is_err());

        let mut q = Query::new([a], vec![a], vec![a], vec![]).unwrap();
        assert!(q
            .push_equation(Equation::new(vec![(1.0, b)], Comparator::Le, 0.0))
            .is_err());
        assert!(q.equations().is_empty());
    }

    #[test]
    fn test_check_integrity_dangling_reference() {
        let mut arena = NodeArena::new();
        let a = arena.push(Node::plain());
        let b = arena.push(Node::relu(a));
        let q = Query::new([b], vec![b], vec![b], vec![]).unwrap();
        assert!(q.check_integrity(&arena).is_err());
    }

    #[test]
    fn test_summary() {
        let mut arena = NodeArena::new();
        let a = arena.push(Node::plain());
        let q = Query::new([a], vec![a], vec![a], vec![]).unwrap();
        assert_eq!(
            q.summary(),
            "Query: 1 nodes, 1 inputs, 1 outputs, 0 equations"
        );
    }
}
