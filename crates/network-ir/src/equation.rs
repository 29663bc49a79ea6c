// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Linear (in)equalities over nodes.

use crate::{NodeArena, NodeId, Substitution};
use std::fmt;

/// Relation between the left-hand sum and the scalar of an [`Equation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparator {
    Le,
    Eq,
    Ge,
}

impl Comparator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Le => "<=",
            Self::Eq => "=",
            Self::Ge => ">=",
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `Σ coefficient · node ⋈ scalar`.
#[derive(Debug, Clone, PartialEq)]
pub struct Equation {
    pub terms: Vec<(f64, NodeId)>,
    pub comparator: Comparator,
    pub scalar: f64,
}

impl Equation {
    pub fn new(terms: Vec<(f64, NodeId)>, comparator: Comparator, scalar: f64) -> Self {
        Self {
            terms,
            comparator,
            scalar,
        }
    }

    /// Nodes mentioned by the equation, in term order.
    pub fn referenced_nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.terms.iter().map(|&(_, n)| n)
    }

    /// Redirects terms through `subst` when carried across a duplication or join.
    pub fn rewrite_references(&mut self, subst: &Substitution) {
        for (_, n) in self.terms.iter_mut() {
            *n = subst.apply(*n);
        }
    }

    /// Human-readable rendering using node labels.
    pub fn describe(&self, arena: &NodeArena) -> String {
        let lhs: Vec<String> = self
            .terms
            .iter()
            .map(|&(c, n)| format!("{c}*{}", arena.name(n)))
            .collect();
        format!("{} {} {}", lhs.join(" + "), self.comparator, self.scalar)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Node;

    #[test]
    fn test_rewrite_references() {
        let mut arena = NodeArena::new();
        let a = arena.push(Node::plain());
        let b = arena.push(Node::plain());
        let c = arena.push(Node::plain());
        let mut eq = Equation::new(vec![(1.0, a), (-1.0, b)], Comparator::Ge, 0.0);
        let subst: Substitution = [(b, c)].into_iter().collect();
        eq.rewrite_references(&subst);
        assert_eq!(eq.referenced_nodes().collect::<Vec<_>>(), vec![a, c]);
        assert_eq!(eq.terms[1].0, -1.0);
    }

    #[test]
    fn test_describe() {
        let mut arena = NodeArena::new();
        let a = arena.push(Node::plain().with_label("x"));
        let eq = Equation::new(vec![(2.0, a)], Comparator::Le, 1.5);
        assert_eq!(eq.describe(&arena), "2*x <= 1.5");
    }

    #[test]
    fn test_comparator_serde() {
        let json = serde_json::to_string(&Comparator::Ge).unwrap();
        assert_eq!(json, "\"ge\"");
        let back: Comparator = serde_json::from_str("\"le\"").unwrap();
        assert_eq!(back, Comparator::Le);
    }
}
