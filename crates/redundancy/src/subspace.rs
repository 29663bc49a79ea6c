// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Restricting a query to a sub-box of its input space.
//!
//! A subspace is a digit string. Each group of `inputs.len()` digits is one
//! split round: input `i` keeps the `d`-th of `splits` equal slices of its
//! current interval. Rounds apply in order, so `"01" "10"` on two inputs
//! keeps quarter-width intervals.

use network_ir::{IrError, NodeArena, Query};

/// Narrows the input bounds of `query` to the subspace named by `digits`.
pub fn apply_subspace(
    arena: &mut NodeArena,
    query: &Query,
    digits: &str,
    splits: usize,
) -> Result<(), IrError> {
    let inputs = query.inputs();
    let width = inputs.len();
    if width == 0 || digits.len() % width != 0 {
        return Err(IrError::out_of_range("subspace length", digits.len(), width));
    }
    let parsed = digits
        .chars()
        .enumerate()
        .map(|(pos, c)| {
            c.to_digit(10)
                .map(|d| d as usize)
                .filter(|&d| d < splits)
                .ok_or(IrError::out_of_range("subspace digit", pos, splits))
        })
        .collect::<Result<Vec<_>, _>>()?;

    for round in parsed.chunks(width) {
        for (&input, &d) in inputs.iter().zip(round) {
            let bounds = arena.bounds(input);
            let (Some(lower), Some(upper)) = (bounds.lower, bounds.upper) else {
                return Err(IrError::UnsupportedTopology(format!(
                    "input '{}' needs finite bounds to be split",
                    arena.name(input)
                )));
            };
            let slice = (upper - lower) / splits as f64;
            let from = lower + d as f64 * slice;
            arena.update_limit(input, Some(from), Some(from + slice))?;
        }
    }
    tracing::debug!(rounds = parsed.len() / width, splits, "applied subspace");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use network_ir::{Bounds, Node, NodeId};

    fn two_inputs(arena: &mut NodeArena) -> (Query, NodeId, NodeId) {
        let a = arena.push(Node::plain().with_bounds(Bounds::new(Some(0.0), Some(8.0))));
        let b = arena.push(Node::plain().with_bounds(Bounds::new(Some(-1.0), Some(1.0))));
        let y = arena.push(Node::affine(vec![(1.0, a), (1.0, b)], 0.0));
        let q = Query::new([a, b, y], vec![a, b], vec![y], vec![]).unwrap();
        (q, a, b)
    }

    #[test]
    fn test_single_round() {
        let mut arena = NodeArena::new();
        let (q, a, b) = two_inputs(&mut arena);
        apply_subspace(&mut arena, &q, "10", 2).unwrap();
        assert_eq!(arena.bounds(a), Bounds::new(Some(4.0), Some(8.0)));
        assert_eq!(arena.bounds(b), Bounds::new(Some(-1.0), Some(0.0)));
    }

    #[test]
    fn test_rounds_compose() {
        let mut arena = NodeArena::new();
        let (q, a, _) = two_inputs(&mut arena);
        apply_subspace(&mut arena, &q, "1001", 2).unwrap();
        assert_eq!(arena.bounds(a), Bounds::new(Some(4.0), Some(6.0)));
    }

    #[test]
    fn test_bad_digits() {
        let mut arena = NodeArena::new();
        let (q, _, _) = two_inputs(&mut arena);
        assert!(matches!(
            apply_subspace(&mut arena, &q, "012", 2),
            Err(IrError::IndexOutOfRange { what: "subspace length", .. })
        ));
        assert!(matches!(
            apply_subspace(&mut arena, &q, "02", 2),
            Err(IrError::IndexOutOfRange { what: "subspace digit", index: 1, .. })
        ));
        assert!(apply_subspace(&mut arena, &q, "0x", 2).is_err());
    }

    #[test]
    fn test_unbounded_input() {
        let mut arena = NodeArena::new();
        let a = arena.push(Node::plain());
        let q = Query::new([a], vec![a], vec![a], vec![]).unwrap();
        assert!(matches!(
            apply_subspace(&mut arena, &q, "0", 2),
            Err(IrError::UnsupportedTopology(_))
        ));
    }
}
