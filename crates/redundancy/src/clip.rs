// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Extracting a contiguous range of layers as a standalone network.
//!
//! ```text
//!            first_layer                         last_layer
//!   ... ──▶ [affine, relu] ──▶ ... ──▶ [affine, relu] ──▶ ...
//!                   │                      │
//!        first_cut = 1: relu is          last_cut = 0: chain ends
//!        severed into a fresh plain      at the affine stage
//!        input "<label>_bdr"
//! ```

use network_ir::{IrError, Layer, LayeredNetwork, NodeArena, NodeId, Substitution};
use serde::{Deserialize, Serialize};

/// Which layers (and which chain positions at the two ends) to keep.
///
/// The default keeps the whole network but still severs the inputs, which
/// gives the result its own declared inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClipRange {
    pub first_layer: usize,
    /// Chain position in `first_layer` that becomes the new input.
    pub first_cut: usize,
    /// `None` keeps everything up to the output layer.
    pub last_layer: Option<usize>,
    /// Chains of `last_layer` are truncated after this position.
    pub last_cut: usize,
}

impl Default for ClipRange {
    fn default() -> Self {
        Self {
            first_layer: 0,
            first_cut: 0,
            last_layer: None,
            last_cut: 0,
        }
    }
}

impl ClipRange {
    /// Index of the last retained layer in a network of `layer_count` layers.
    pub fn resolve_last(&self, layer_count: usize) -> usize {
        self.last_layer
            .unwrap_or_else(|| layer_count.saturating_sub(1))
    }

    /// Whether the range runs to the output layer without truncating it.
    pub fn reaches_output(&self, layer_count: usize) -> bool {
        self.resolve_last(layer_count) + 1 == layer_count && self.last_cut == 0
    }
}

/// Clips `network` to `range`.
///
/// Nodes of the retained layers are rewritten in place, so `network` is
/// consumed: clip a [`LayeredNetwork::duplicate`] when the source must stay
/// intact.
pub fn clip(
    network: LayeredNetwork,
    range: &ClipRange,
    arena: &mut NodeArena,
) -> Result<LayeredNetwork, IrError> {
    let count = network.layer_count();
    let last = range.resolve_last(count);
    if last >= count {
        return Err(IrError::out_of_range("last layer", last, count));
    }
    if range.first_layer > last {
        return Err(IrError::out_of_range("first layer", range.first_layer, last + 1));
    }

    let mut layers: Vec<Layer> = network
        .layers
        .into_iter()
        .skip(range.first_layer)
        .take(last - range.first_layer + 1)
        .collect();

    let mut severed = Substitution::new();
    for chain in &mut layers[0] {
        if range.first_cut >= chain.len() {
            return Err(IrError::out_of_range("first cut", range.first_cut, chain.len()));
        }
        let boundary = chain[range.first_cut];
        let input = arena.sever(boundary, "_bdr");
        severed.insert(boundary, input);
        chain.splice(..=range.first_cut, [input]);
    }

    if let Some(tail) = layers.last_mut() {
        for chain in tail.iter_mut() {
            if range.last_cut >= chain.len() {
                return Err(IrError::out_of_range("last cut", range.last_cut, chain.len()));
            }
            chain.truncate(range.last_cut + 1);
        }
    }

    let retained: Vec<NodeId> = layers.iter().flatten().flatten().copied().collect();
    for &id in &retained {
        arena.rewrite(id, &severed);
    }

    tracing::debug!(
        first_layer = range.first_layer,
        last_layer = last,
        severed = severed.len(),
        "clipped network"
    );
    LayeredNetwork::new(layers, arena)
}

/// Duplicates `network` with `suffix` and clips the copy. Requires at least
/// two retained layers.
pub fn duplicate_and_clip(
    network: &LayeredNetwork,
    range: &ClipRange,
    suffix: &str,
    arena: &mut NodeArena,
) -> Result<LayeredNetwork, IrError> {
    let last = range.resolve_last(network.layer_count());
    if range.first_layer >= last {
        return Err(IrError::out_of_range("first layer", range.first_layer, last));
    }
    let copy = network.duplicate(arena, suffix)?;
    clip(copy, range, arena)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::deep;
    use network_ir::{Bounds, NodeKind};

    #[test]
    fn test_default_range_severs_inputs() {
        let mut arena = NodeArena::new();
        let net = deep(&mut arena);
        let clipped = duplicate_and_clip(&net, &ClipRange::default(), "_dup", &mut arena).unwrap();
        assert_eq!(clipped.layer_count(), 4);
        let input = clipped.inputs()[0];
        assert!(matches!(arena.get(input).kind, NodeKind::Plain));
        assert_eq!(arena.name(input), "x0_dup_bdr");
        assert_eq!(arena.bounds(input), Bounds::new(Some(-1.0), Some(1.0)));
        assert!(clipped.node_set().is_disjoint(&net.node_set()));
    }

    #[test]
    fn test_cut_after_relu() {
        let mut arena = NodeArena::new();
        let net = deep(&mut arena);
        let range = ClipRange {
            first_layer: 1,
            first_cut: 1,
            ..ClipRange::default()
        };
        let clipped = duplicate_and_clip(&net, &range, "_dup", &mut arena).unwrap();
        assert_eq!(clipped.layer_count(), 3);
        assert_eq!(clipped.layer_size(0), 2);
        assert!(clipped.layers[0].iter().all(|c| c.len() == 1));

        let input = clipped.inputs()[0];
        assert_eq!(arena.bounds(input), Bounds::new(Some(0.0), None));
        assert_eq!(clipped.to_query().unwrap().inputs().len(), 2);

        // The next layer reads from the severed inputs.
        let head = clipped.chain(1, 0).unwrap()[0];
        assert!(arena.get(head).referenced_nodes().contains(&input));
    }

    #[test]
    fn test_cut_before_relu_keeps_relu() {
        let mut arena = NodeArena::new();
        let net = deep(&mut arena);
        let range = ClipRange {
            first_layer: 1,
            first_cut: 0,
            ..ClipRange::default()
        };
        let clipped = duplicate_and_clip(&net, &range, "_dup", &mut arena).unwrap();
        let chain = clipped.chain(0, 0).unwrap();
        assert_eq!(chain.len(), 2);
        assert_eq!(arena.get(chain[1]).referenced_nodes(), vec![chain[0]]);
        assert!(matches!(arena.get(chain[0]).kind, NodeKind::Plain));
    }

    #[test]
    fn test_truncate_last_layer() {
        let mut arena = NodeArena::new();
        let net = deep(&mut arena);
        let range = ClipRange {
            last_layer: Some(2),
            last_cut: 0,
            ..ClipRange::default()
        };
        let clipped = duplicate_and_clip(&net, &range, "_dup", &mut arena).unwrap();
        assert_eq!(clipped.layer_count(), 3);
        assert!(clipped.layers[2].iter().all(|c| c.len() == 1));
        assert_eq!(arena.name(clipped.outputs()[1]), "h21_b_dup");
    }

    #[test]
    fn test_bad_ranges() {
        let mut arena = NodeArena::new();
        let net = deep(&mut arena);
        let range = ClipRange {
            last_layer: Some(7),
            ..ClipRange::default()
        };
        assert!(matches!(
            duplicate_and_clip(&net, &range, "_dup", &mut arena),
            Err(IrError::IndexOutOfRange { what: "last layer", .. })
        ));

        let range = ClipRange {
            first_layer: 1,
            first_cut: 2,
            ..ClipRange::default()
        };
        assert!(matches!(
            duplicate_and_clip(&net, &range, "_dup", &mut arena),
            Err(IrError::IndexOutOfRange { what: "first cut", .. })
        ));

        let range = ClipRange {
            first_layer: 3,
            ..ClipRange::default()
        };
        assert!(duplicate_and_clip(&net, &range, "_dup", &mut arena).is_err());
    }

    #[test]
    fn test_range_helpers() {
        let r = ClipRange::default();
        assert_eq!(r.resolve_last(4), 3);
        assert!(r.reaches_output(4));
        let r = ClipRange {
            last_layer: Some(2),
            ..ClipRange::default()
        };
        assert!(!r.reaches_output(4));
    }
}
