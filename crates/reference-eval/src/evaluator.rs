// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Forward evaluation by constraint propagation, and assignment validation.
//!
//! Propagation runs two rules to a fixed point:
//!
//! 1. an equality constraint with exactly one unassigned term is solved for
//!    that term;
//! 2. a ReLU relation with a known input and unknown output is applied.
//!
//! Rule 1 is exhausted before rule 2 is tried. A joined or compared query
//! can be over-determined, so a propagated assignment may satisfy the
//! equation that defined a variable while violating another one; that is
//! what [`Evaluator::validate`] is for.

use crate::{ConstraintKind, EvalError, Evaluator};
use network_ir::NodeId;
use std::collections::HashMap;

/// Absolute tolerance for bound and residual checks.
pub const TOLERANCE: f64 = 1e-13;

/// Values indexed like the evaluator's variables; `None` means unassigned.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    values: Vec<Option<f64>>,
}

impl Assignment {
    pub fn get(&self, index: usize) -> Option<f64> {
        self.values.get(index).copied().flatten()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn is_complete(&self) -> bool {
        self.values.iter().all(Option::is_some)
    }

    pub fn unassigned(&self) -> impl Iterator<Item = usize> + '_ {
        self.values
            .iter()
            .enumerate()
            .filter(|(_, v)| v.is_none())
            .map(|(i, _)| i)
    }
}

impl Evaluator {
    /// Propagates `inputs` through the query.
    ///
    /// Fixed variables (`lower == upper`) are seeded after the inputs and
    /// take precedence over them.
    pub fn forward_evaluate(&self, inputs: &[f64]) -> Result<Assignment, EvalError> {
        if inputs.len() != self.inputs.len() {
            return Err(EvalError::InputSizeMismatch {
                expected: self.inputs.len(),
                actual: inputs.len(),
            });
        }

        let mut values: Vec<Option<f64>> = vec![None; self.num_vars()];
        for (&i, &v) in self.inputs.iter().zip(inputs) {
            values[i] = Some(v);
        }
        for (i, value) in values.iter_mut().enumerate() {
            if let (Some(l), Some(u)) = (self.lower[i], self.upper[i]) {
                if l == u {
                    *value = Some(u);
                }
            }
        }

        let mut rounds = 0usize;
        loop {
            rounds += 1;

            let mut fired = false;
            for (ci, c) in self.constraints.iter().enumerate() {
                if c.kind != ConstraintKind::Eq {
                    continue;
                }
                let mut unknown = None;
                let mut unknown_count = 0;
                let mut known_sum = 0.0;
                for &(idx, coeff) in &c.terms {
                    match values[idx] {
                        Some(v) => known_sum += v * coeff,
                        None => {
                            unknown_count += 1;
                            unknown = Some((idx, coeff));
                        }
                    }
                }
                if unknown_count != 1 {
                    continue;
                }
                let Some((idx, coeff)) = unknown else {
                    continue;
                };
                if coeff == 0.0 {
                    return Err(EvalError::DegenerateEquation {
                        equation: ci,
                        variable: self.names[idx].clone(),
                    });
                }
                values[idx] = Some(-(known_sum - c.scalar) / coeff);
                fired = true;
            }
            if fired {
                continue;
            }

            for r in &self.relus {
                if let (Some(x), None) = (values[r.input], values[r.output]) {
                    values[r.output] = Some(x.max(0.0));
                    fired = true;
                }
            }
            if !fired {
                break;
            }
        }

        let assignment = Assignment { values };
        {
            let mut missing = assignment.unassigned();
            if let Some(first) = missing.next() {
                let unassigned = 1 + missing.count();
                return Err(EvalError::IncompleteEvaluation {
                    unassigned,
                    first: self.names[first].clone(),
                });
            }
        }

        tracing::debug!(rounds, variables = self.num_vars(), "forward evaluation complete");
        Ok(assignment)
    }

    /// Checks completeness, bounds, constraint residuals and ReLU relations,
    /// failing on the first violation.
    pub fn validate(&self, assignment: &Assignment) -> Result<(), EvalError> {
        let fail = |detail: String| Err(EvalError::ValidationFailure { detail });

        if assignment.len() != self.num_vars() {
            return fail(format!(
                "assignment has {} variable(s), query has {}",
                assignment.len(),
                self.num_vars()
            ));
        }
        if let Some(i) = assignment.unassigned().next() {
            return fail(format!("'{}' has no value", self.names[i]));
        }
        let value = |i: usize| assignment.values[i].unwrap_or(f64::NAN);

        for i in 0..self.num_vars() {
            let v = value(i);
            if let Some(l) = self.lower[i] {
                if v < l - TOLERANCE {
                    return fail(format!("'{}' = {v} below lower bound {l}", self.names[i]));
                }
            }
            if let Some(u) = self.upper[i] {
                if v > u + TOLERANCE {
                    return fail(format!("'{}' = {v} above upper bound {u}", self.names[i]));
                }
            }
        }

        for (ci, c) in self.constraints.iter().enumerate() {
            let residual: f64 =
                c.terms.iter().map(|&(i, coeff)| value(i) * coeff).sum::<f64>() - c.scalar;
            let ok = match c.kind {
                ConstraintKind::Eq => residual.abs() < TOLERANCE,
                ConstraintKind::Ge => residual >= -TOLERANCE,
                ConstraintKind::Le => residual <= TOLERANCE,
            };
            if !ok {
                return fail(format!(
                    "constraint #{ci} ({:?}) violated with residual {residual}",
                    c.kind
                ));
            }
        }

        for r in &self.relus {
            let (x, y) = (value(r.input), value(r.output));
            if y != x.max(0.0) {
                return fail(format!(
                    "relu '{}' = {y} but input '{}' = {x}",
                    self.names[r.output], self.names[r.input]
                ));
            }
        }

        Ok(())
    }

    /// Forward evaluation followed by [`Evaluator::validate`]; raises on any
    /// violation.
    pub fn evaluate_and_validate(&self, inputs: &[f64]) -> Result<Assignment, EvalError> {
        let assignment = self.forward_evaluate(inputs)?;
        self.validate(&assignment)?;
        Ok(assignment)
    }

    /// Forward evaluation followed by a non-raising validation.
    ///
    /// Propagation failures are still errors; only
    /// [`EvalError::ValidationFailure`] is folded into the boolean.
    pub fn evaluate_checked(&self, inputs: &[f64]) -> Result<(bool, Assignment), EvalError> {
        let assignment = self.forward_evaluate(inputs)?;
        match self.validate(&assignment) {
            Ok(()) => Ok((true, assignment)),
            Err(EvalError::ValidationFailure { detail }) => {
                tracing::debug!(%detail, "assignment does not satisfy the query");
                Ok((false, assignment))
            }
            Err(e) => Err(e),
        }
    }

    /// Builds an assignment from per-node values, e.g. a solver witness.
    /// Nodes missing from `values` stay unassigned.
    pub fn assignment_from_nodes(&self, values: &HashMap<NodeId, f64>) -> Assignment {
        Assignment {
            values: self.ids.iter().map(|id| values.get(id).copied()).collect(),
        }
    }

    /// Value of `id` in `assignment`, if both are known.
    pub fn value_of(&self, assignment: &Assignment, id: NodeId) -> Option<f64> {
        self.index_of(id).and_then(|i| assignment.get(i))
    }

    /// Values of the designated outputs, or `None` if any is unassigned.
    pub fn output_values(&self, assignment: &Assignment) -> Option<Vec<f64>> {
        self.outputs.iter().map(|&i| assignment.get(i)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use network_ir::{Bounds, Comparator, Equation, Node, NodeArena, Query};
    use proptest::prelude::*;

    /// x -> [2x - 1, relu] -> [1 * relu + 0]
    fn scenario_a(arena: &mut NodeArena) -> (Query, NodeId, NodeId, NodeId) {
        let x = arena.push(Node::plain().with_label("x"));
        let b = arena.push(Node::affine(vec![(2.0, x)], -1.0).with_label("b"));
        let f = arena.push(
            Node::relu(b)
                .with_label("f")
                .with_bounds(Bounds::new(Some(0.0), None)),
        );
        let y = arena.push(Node::affine(vec![(1.0, f)], 0.0).with_label("y"));
        let q = Query::new([x, b, f, y], vec![x], vec![y], vec![]).unwrap();
        (q, b, f, y)
    }

    #[test]
    fn test_scenario_a_inactive_phase() {
        let mut arena = NodeArena::new();
        let (q, b, f, y) = scenario_a(&mut arena);
        let ev = Evaluator::from_query(&arena, &q).unwrap();
        let a = ev.evaluate_and_validate(&[0.3]).unwrap();
        assert!((ev.value_of(&a, b).unwrap() - (-0.4)).abs() < 1e-12);
        assert_eq!(ev.value_of(&a, f), Some(0.0));
        assert_eq!(ev.value_of(&a, y), Some(0.0));
    }

    #[test]
    fn test_scenario_a_active_phase() {
        let mut arena = NodeArena::new();
        let (q, b, f, _) = scenario_a(&mut arena);
        let ev = Evaluator::from_query(&arena, &q).unwrap();
        let a = ev.evaluate_and_validate(&[0.7]).unwrap();
        assert!((ev.value_of(&a, b).unwrap() - 0.4).abs() < 1e-12);
        assert!((ev.value_of(&a, f).unwrap() - 0.4).abs() < 1e-12);
        let out = ev.output_values(&a).unwrap();
        assert!((out[0] - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_input_size_mismatch() {
        let mut arena = NodeArena::new();
        let (q, ..) = scenario_a(&mut arena);
        let ev = Evaluator::from_query(&arena, &q).unwrap();
        assert_eq!(
            ev.forward_evaluate(&[0.1, 0.2]).unwrap_err(),
            EvalError::InputSizeMismatch {
                expected: 1,
                actual: 2
            }
        );
    }

    #[test]
    fn test_fixed_variables_are_seeded() {
        let mut arena = NodeArena::new();
        let x = arena.push(Node::plain());
        let z = arena.push(Node::plain().with_bounds(Bounds::fixed(0.0)));
        let y = arena.push(Node::affine(vec![(1.0, x), (5.0, z)], 1.0));
        let q = Query::new([x, z, y], vec![x], vec![y], vec![]).unwrap();
        let ev = Evaluator::from_query(&arena, &q).unwrap();
        let a = ev.evaluate_and_validate(&[2.0]).unwrap();
        assert_eq!(ev.value_of(&a, y), Some(3.0));
    }

    #[test]
    fn test_incomplete_evaluation() {
        let mut arena = NodeArena::new();
        let x = arena.push(Node::plain());
        let free = arena.push(Node::plain().with_label("free"));
        let y = arena.push(Node::affine(vec![(1.0, x), (1.0, free)], 0.0));
        let q = Query::new([x, free, y], vec![x], vec![y], vec![]).unwrap();
        let ev = Evaluator::from_query(&arena, &q).unwrap();
        let err = ev.forward_evaluate(&[1.0]).unwrap_err();
        assert_eq!(
            err,
            EvalError::IncompleteEvaluation {
                unassigned: 2,
                first: "free".into()
            }
        );
    }

    #[test]
    fn test_equation_back_substitution() {
        // post is only defined through an extra equation: post - 0.5*pre = 1.
        let mut arena = NodeArena::new();
        let pre = arena.push(Node::plain());
        let post = arena.push(Node::plain());
        let eq = Equation::new(vec![(1.0, post), (-0.5, pre)], Comparator::Eq, 1.0);
        let q = Query::new([pre, post], vec![pre], vec![post], vec![eq]).unwrap();
        let ev = Evaluator::from_query(&arena, &q).unwrap();
        let a = ev.evaluate_and_validate(&[4.0]).unwrap();
        assert_eq!(ev.value_of(&a, post), Some(3.0));
    }

    #[test]
    fn test_degenerate_equation() {
        let mut arena = NodeArena::new();
        let x = arena.push(Node::plain());
        let y = arena.push(Node::plain().with_label("y"));
        let eq = Equation::new(vec![(1.0, x), (0.0, y)], Comparator::Eq, 1.0);
        let q = Query::new([x, y], vec![x], vec![y], vec![eq]).unwrap();
        let ev = Evaluator::from_query(&arena, &q).unwrap();
        assert_eq!(
            ev.forward_evaluate(&[1.0]).unwrap_err(),
            EvalError::DegenerateEquation {
                equation: 0,
                variable: "y".into()
            }
        );
    }

    #[test]
    fn test_validation_modes() {
        // Propagation satisfies the definitions but violates y >= 1.
        let mut arena = NodeArena::new();
        let x = arena.push(Node::plain());
        let y = arena.push(Node::affine(vec![(1.0, x)], 0.0));
        let eq = Equation::new(vec![(1.0, y)], Comparator::Ge, 1.0);
        let q = Query::new([x, y], vec![x], vec![y], vec![eq]).unwrap();
        let ev = Evaluator::from_query(&arena, &q).unwrap();

        assert!(matches!(
            ev.evaluate_and_validate(&[0.5]),
            Err(EvalError::ValidationFailure { .. })
        ));
        let (valid, a) = ev.evaluate_checked(&[0.5]).unwrap();
        assert!(!valid);
        assert_eq!(ev.value_of(&a, y), Some(0.5));
        let (valid, _) = ev.evaluate_checked(&[2.0]).unwrap();
        assert!(valid);
    }

    #[test]
    fn test_validate_bounds_and_relu() {
        let mut arena = NodeArena::new();
        let (q, b, f, y) = scenario_a(&mut arena);
        let ev = Evaluator::from_query(&arena, &q).unwrap();
        let x = q.inputs()[0];

        let mut values = HashMap::new();
        values.insert(x, 0.7);
        values.insert(b, 0.4);
        values.insert(f, 0.3);
        values.insert(y, 0.3);
        let err = ev.validate(&ev.assignment_from_nodes(&values)).unwrap_err();
        assert!(matches!(err, EvalError::ValidationFailure { .. }));

        values.remove(&y);
        let partial = ev.assignment_from_nodes(&values);
        assert!(!partial.is_complete());
        assert!(ev.validate(&partial).is_err());
    }

    proptest! {
        /// Propagation on a layered affine+ReLU network always completes,
        /// validates, and is deterministic.
        #[test]
        fn prop_layered_network_fully_propagates(
            weights in proptest::collection::vec(-3.0f64..3.0, 12),
            inputs in proptest::collection::vec(-2.0f64..2.0, 2),
        ) {
            let mut arena = NodeArena::new();
            let x0 = arena.push(Node::plain());
            let x1 = arena.push(Node::plain());
            let mut nodes = vec![x0, x1];
            let mut prev = vec![x0, x1];
            for layer in 0..2 {
                let mut next = Vec::new();
                for n in 0..2 {
                    let w = &weights[layer * 6 + n * 3..layer * 6 + n * 3 + 3];
                    let b = arena.push(Node::affine(vec![(w[0], prev[0]), (w[1], prev[1])], w[2]));
                    let f = arena.push(Node::relu(b));
                    nodes.extend([b, f]);
                    next.push(f);
                }
                prev = next;
            }
            let q = Query::new(nodes, vec![x0, x1], prev, vec![]).unwrap();
            let ev = Evaluator::from_query(&arena, &q).unwrap();

            let first = ev.evaluate_and_validate(&inputs).unwrap();
            let second = ev.forward_evaluate(&inputs).unwrap();
            prop_assert!(first.is_complete());
            prop_assert_eq!(first, second);
        }
    }
}
