// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Linear relaxation of a ReLU whose pre-activation lies in `[l, u]`, `l < 0 < u`.
//!
//! The relaxed output is the line through the middle of the triangle
//! relaxation:
//!
//! ```text
//!   post = u/(u−l) · pre − l·u / (2(u−l))
//! ```
//!
//! It is attached to a neuron overridden with `nofunc`, whose free tail then
//! stands in for the ReLU output.

use network_ir::{Comparator, Equation, IrError, LayeredNetwork, NodeArena, NodeId, NodeKind, Query};

/// Worst-case distance between the relaxation and the ReLU on `[lower, upper]`.
pub fn relaxation_error(lower: f64, upper: f64) -> f64 {
    -lower * upper / (2.0 * (upper - lower))
}

/// Value of the relaxation at `pre`.
pub fn relaxation_value(lower: f64, upper: f64, pre: f64) -> f64 {
    upper / (upper - lower) * pre + relaxation_error(lower, upper)
}

/// `post − u/(u−l)·pre = −l·u / (2(u−l))`.
pub fn relaxation_equation(
    pre: NodeId,
    post: NodeId,
    lower: f64,
    upper: f64,
) -> Result<Equation, IrError> {
    if !(lower < upper) {
        return Err(IrError::InvalidBounds {
            node: format!("relaxation of {pre}"),
            lower,
            upper,
        });
    }
    Ok(Equation::new(
        vec![(1.0, post), (-(upper / (upper - lower)), pre)],
        Comparator::Eq,
        relaxation_error(lower, upper),
    ))
}

/// Projects `network` to a query with the relaxation equation of neuron
/// `(layer, neuron)` added. The neuron must have been overridden with
/// `nofunc`, so its chain ends in a free plain node.
pub fn relaxed_query(
    network: &LayeredNetwork,
    layer: usize,
    neuron: usize,
    lower: f64,
    upper: f64,
    arena: &NodeArena,
) -> Result<Query, IrError> {
    let chain = network.chain(layer, neuron)?;
    let (&pre, &post) = match chain.as_slice() {
        [pre, post] if matches!(arena.get(*post).kind, NodeKind::Plain) => (pre, post),
        _ => {
            return Err(IrError::UnsupportedTopology(format!(
                "neuron ({layer}, {neuron}) is not a free-output chain"
            )))
        }
    };
    let mut query = network.to_query()?;
    query.push_equation(relaxation_equation(pre, post, lower, upper)?)?;
    query.check_integrity(arena)?;
    Ok(query)
}

#[cfg(test)]
mod tests {
    use super::*;
    use network_ir::{Bounds, Node};

    #[test]
    fn test_equation_coefficients() {
        let mut arena = NodeArena::new();
        let pre = arena.push(Node::plain());
        let post = arena.push(Node::plain());
        let eq = relaxation_equation(pre, post, -2.0, 2.0).unwrap();
        assert_eq!(eq.terms, vec![(1.0, post), (-0.5, pre)]);
        assert_eq!(eq.comparator, Comparator::Eq);
        assert_eq!(eq.scalar, 0.5);
    }

    #[test]
    fn test_value_matches_equation() {
        let (l, u) = (-7.5, 1.5);
        for pre in [-7.5, -1.0, 0.0, 1.5] {
            let post = relaxation_value(l, u, pre);
            let lhs = post - u / (u - l) * pre;
            assert!((lhs - relaxation_error(l, u)).abs() < 1e-12);
        }
        // The error bound is attained at both ends of the interval.
        let err = relaxation_error(l, u);
        assert!((relaxation_value(l, u, l).abs() - err).abs() < 1e-12);
        assert!((u - relaxation_value(l, u, u) - err).abs() < 1e-12);
    }

    #[test]
    fn test_rejects_empty_interval() {
        let mut arena = NodeArena::new();
        let pre = arena.push(Node::plain());
        let post = arena.push(Node::plain());
        assert!(matches!(
            relaxation_equation(pre, post, 1.0, 1.0),
            Err(IrError::InvalidBounds { .. })
        ));
    }

    #[test]
    fn test_relaxed_query_requires_free_tail() {
        let mut arena = NodeArena::new();
        let x = arena.push(Node::plain());
        let b = arena.push(Node::affine(vec![(1.0, x)], 0.0));
        let r = arena.push(Node::relu(b));
        let free = arena.push(Node::plain().with_bounds(Bounds::new(Some(0.0), None)));
        let y = arena.push(Node::affine(vec![(1.0, free)], 0.0));

        let relu_net = LayeredNetwork::new(vec![vec![vec![x]], vec![vec![b, r]]], &arena).unwrap();
        assert!(relaxed_query(&relu_net, 1, 0, -1.0, 1.0, &arena).is_err());

        let net = LayeredNetwork::new(
            vec![vec![vec![x]], vec![vec![b, free]], vec![vec![y]]],
            &arena,
        )
        .unwrap();
        let q = relaxed_query(&net, 1, 0, -1.0, 1.0, &arena).unwrap();
        assert_eq!(q.equations().len(), 1);
        assert_eq!(q.equations()[0].terms[0], (1.0, free));
    }
}
