// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Neuron overrides and the queries that compare an original network with
//! its overridden copy.
//!
//! ```text
//!   original ─────────────[boundary]──────────────▶ outputs
//!                         │ shared prefix (same NodeIds)
//!   modified   (dropped)  └─[overridden tails]────▶ outputs
//! ```
//!
//! [`join`] splices the modified copy onto the original at the first
//! overridden layer, so both tails read from one prefix. The comparison
//! builders then add equations over the two output sets.

use network_ir::{
    Bounds, Comparator, Equation, IrError, Layer, LayeredNetwork, Node, NodeArena, NodeId, Query,
    Substitution,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

// ── Override kinds ─────────────────────────────────────────────

/// What replaces a neuron's activation function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverrideKind {
    /// Identity: the neuron outputs its pre-activation.
    Active,
    /// Constant zero.
    Inactive,
    /// A free value with the old output's bounds, disconnected from its input.
    NoFunc,
}

impl OverrideKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::NoFunc => "nofunc",
        }
    }
}

impl fmt::Display for OverrideKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OverrideKind {
    type Err = IrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            "nofunc" => Ok(Self::NoFunc),
            other => Err(IrError::UnknownOverrideKind(other.to_string())),
        }
    }
}

/// Overrides keyed by `(layer, neuron)`.
pub type Overrides = BTreeMap<(usize, usize), OverrideKind>;

/// Direction asserted by [`compare_exact`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompareOp {
    /// original − modified ≥ ε
    Gt,
    /// modified − original ≥ ε
    Lt,
}

// ── modify ─────────────────────────────────────────────────────

/// Replaces the activation of every overridden neuron.
///
/// The new chain keeps the head (affine stage); its tail is relabelled
/// `<old tail label>_<kind>` and every consumer of the old tail is rewired
/// to it.
pub fn modify(
    network: LayeredNetwork,
    overrides: &Overrides,
    arena: &mut NodeArena,
) -> Result<LayeredNetwork, IrError> {
    let mut layers = network.layers;
    let mut rewired = Substitution::new();

    for (&(l, n), &kind) in overrides {
        let layer_count = layers.len();
        let layer = layers
            .get_mut(l)
            .ok_or(IrError::out_of_range("layer", l, layer_count))?;
        let layer_size = layer.len();
        let chain = layer
            .get_mut(n)
            .ok_or(IrError::out_of_range("neuron", n, layer_size))?;

        let head = chain[0];
        let tail = chain[chain.len() - 1];
        let replacement = match kind {
            OverrideKind::Active => vec![head],
            OverrideKind::Inactive => {
                vec![head, arena.push(Node::plain().with_bounds(Bounds::fixed(0.0)))]
            }
            OverrideKind::NoFunc => {
                let bounds = arena.bounds(tail);
                vec![head, arena.push(Node::plain().with_bounds(bounds))]
            }
        };
        let new_tail = replacement[replacement.len() - 1];
        if let Some(label) = arena.get(tail).label.clone() {
            arena.get_mut(new_tail).label = Some(format!("{label}_{kind}"));
        }
        if new_tail != tail {
            rewired.insert(tail, new_tail);
        }
        *chain = replacement;
    }

    let nodes: Vec<NodeId> = layers.iter().flatten().flatten().copied().collect();
    for &id in &nodes {
        arena.rewrite(id, &rewired);
    }
    tracing::debug!(
        overrides = overrides.len(),
        rewired = rewired.len(),
        "modified network"
    );
    LayeredNetwork::new(layers, arena)
}

// ── join ───────────────────────────────────────────────────────

/// An original network and a modified copy sharing its prefix.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinedNetworks {
    pub original: LayeredNetwork,
    /// Layers `0..boundary` are the original's; from `boundary` on, untouched
    /// neurons of the boundary layer are the original's chains and overridden
    /// ones read from the original's affine stage.
    pub modified: LayeredNetwork,
    pub boundary: usize,
}

impl JoinedNetworks {
    /// All nodes of both networks, original first, shared ones once.
    pub fn nodes(&self) -> Vec<NodeId> {
        let mut nodes = self.original.nodes();
        nodes.extend(self.modified.layers[self.boundary..].iter().flatten().flatten());
        nodes
    }

    /// Joined networks without equations: original outputs, then modified.
    pub fn to_query(&self) -> Result<Query, IrError> {
        let mut outputs = self.original.outputs();
        outputs.extend(self.modified.outputs());
        Query::new(self.nodes(), self.original.inputs(), outputs, Vec::new())
    }
}

/// Splices `modified` onto `original` at the first overridden layer.
///
/// Both networks must have the same shape, as produced by duplicating one
/// source twice. Nodes of `modified` past the boundary are rewritten in place
/// to read from the original, so `modified` is consumed.
pub fn join(
    original: &LayeredNetwork,
    modified: LayeredNetwork,
    overrides: &Overrides,
    arena: &mut NodeArena,
) -> Result<JoinedNetworks, IrError> {
    let boundary = overrides
        .keys()
        .map(|&(l, _)| l)
        .min()
        .ok_or_else(|| IrError::UnsupportedTopology("join needs at least one override".into()))?;
    if boundary >= original.layer_count() {
        return Err(IrError::out_of_range("boundary layer", boundary, original.layer_count()));
    }
    if modified.layer_count() != original.layer_count()
        || modified.layer_size(boundary) != original.layer_size(boundary)
    {
        return Err(IrError::UnsupportedTopology(
            "original and modified networks differ in shape".into(),
        ));
    }

    let mut table = Substitution::new();
    let mut boundary_layer: Layer = Vec::with_capacity(original.layer_size(boundary));
    let mut retained: Vec<NodeId> = Vec::new();
    for (i, (orig, modi)) in original.layers[boundary]
        .iter()
        .zip(&modified.layers[boundary])
        .enumerate()
    {
        if overrides.contains_key(&(boundary, i)) {
            table.insert(modi[0], orig[0]);
            let mut chain = vec![orig[0]];
            chain.extend_from_slice(&modi[1..]);
            retained.extend_from_slice(&modi[1..]);
            boundary_layer.push(chain);
        } else {
            for (&m, &o) in modi.iter().zip(orig) {
                table.insert(m, o);
            }
            table.insert(modi[modi.len() - 1], orig[orig.len() - 1]);
            boundary_layer.push(orig.clone());
        }
    }

    let mut layers: Vec<Layer> = original.layers[..boundary].to_vec();
    layers.push(boundary_layer);
    layers.extend(modified.layers[boundary + 1..].iter().cloned());
    retained.extend(modified.layers[boundary + 1..].iter().flatten().flatten());

    for &id in &retained {
        arena.rewrite(id, &table);
    }

    tracing::debug!(boundary, rewritten = retained.len(), "joined networks");
    Ok(JoinedNetworks {
        original: original.clone(),
        modified: LayeredNetwork::new(layers, arena)?,
        boundary,
    })
}

/// [`join`] as a [`Query`]: every original output, then every modified one.
pub fn joined_query(
    original: &LayeredNetwork,
    modified: LayeredNetwork,
    overrides: &Overrides,
    arena: &mut NodeArena,
) -> Result<Query, IrError> {
    let joined = join(original, modified, overrides, arena)?;
    finish(joined.to_query()?, arena)
}

// ── comparisons ────────────────────────────────────────────────

/// Output tail of `net`'s last layer at `index`.
fn output_of(net: &LayeredNetwork, index: usize) -> Result<NodeId, IrError> {
    let last = net.layer_count().saturating_sub(1);
    let chain = net
        .layer(last)?
        .get(index)
        .ok_or(IrError::out_of_range("output", index, net.layer_size(last)))?;
    Ok(chain[chain.len() - 1])
}

/// `net` with its last layer reduced to the chains at `keep`.
fn keep_outputs(
    net: &LayeredNetwork,
    keep: &[usize],
    arena: &NodeArena,
) -> Result<LayeredNetwork, IrError> {
    let mut layers = net.layers.clone();
    let last = layers.len() - 1;
    let chains = keep
        .iter()
        .map(|&i| {
            layers[last]
                .get(i)
                .cloned()
                .ok_or(IrError::out_of_range("output", i, net.layer_size(last)))
        })
        .collect::<Result<Vec<_>, _>>()?;
    layers[last] = chains;
    LayeredNetwork::new(layers, arena)
}

fn finish(query: Query, arena: &NodeArena) -> Result<Query, IrError> {
    query.check_integrity(arena)?;
    tracing::info!(summary = %query.summary(), "built query");
    Ok(query)
}

/// Asserts that output `output` moves by at least `epsilon` in direction
/// `op` between `original` and `modified`.
///
/// A satisfying assignment is an input on which the override changes the
/// output that way.
pub fn compare_exact(
    original: &LayeredNetwork,
    modified: LayeredNetwork,
    overrides: &Overrides,
    op: CompareOp,
    output: usize,
    epsilon: f64,
    arena: &mut NodeArena,
) -> Result<Query, IrError> {
    let joined = join(original, modified, overrides, arena)?;
    let orig = keep_outputs(&joined.original, &[output], arena)?;
    let modi = keep_outputs(&joined.modified, &[output], arena)?;

    let o = output_of(&orig, 0)?;
    let m = output_of(&modi, 0)?;
    let sign = match op {
        CompareOp::Gt => 1.0,
        CompareOp::Lt => -1.0,
    };
    let equation = Equation::new(vec![(sign, o), (-sign, m)], Comparator::Ge, epsilon);

    let mut nodes = orig.nodes();
    nodes.extend(modi.layers[joined.boundary..].iter().flatten().flatten());
    let query = Query::new(nodes, orig.inputs(), vec![o, m], vec![equation])?;
    finish(query, arena)
}

/// Asserts that `output` wins (is largest by `epsilon`) in the original
/// while `counter_output` beats it by `epsilon` in the modified network.
pub fn compare_minimum(
    original: &LayeredNetwork,
    modified: LayeredNetwork,
    overrides: &Overrides,
    output: usize,
    counter_output: usize,
    epsilon: f64,
    arena: &mut NodeArena,
) -> Result<Query, IrError> {
    IrError::distinct_outputs(output, counter_output)?;
    let joined = join(original, modified, overrides, arena)?;
    let outputs = joined.original.outputs();
    let winner = output_of(&joined.original, output)?;

    let mut equations: Vec<Equation> = outputs
        .iter()
        .enumerate()
        .filter(|&(n, _)| n != output)
        .map(|(_, &other)| Equation::new(vec![(1.0, winner), (-1.0, other)], Comparator::Ge, epsilon))
        .collect();

    let modi = keep_outputs(&joined.modified, &[output, counter_output], arena)?;
    let m_out = output_of(&modi, 0)?;
    let m_counter = output_of(&modi, 1)?;
    equations.push(Equation::new(
        vec![(1.0, m_counter), (-1.0, m_out)],
        Comparator::Ge,
        epsilon,
    ));

    let mut nodes = joined.original.nodes();
    nodes.extend(modi.layers[joined.boundary..].iter().flatten().flatten());
    let mut query_outputs = outputs;
    query_outputs.extend([m_out, m_counter]);
    let query = Query::new(nodes, joined.original.inputs(), query_outputs, equations)?;
    finish(query, arena)
}

// ── state check ────────────────────────────────────────────────

/// Activation phase a neuron is claimed to be stuck in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Active,
    Inactive,
}

/// Asserts the opposite of `phase` on the pre-activation of the single
/// output neuron of `clipped`, whose last layer must be cut at the affine
/// stage.
///
/// | claim    | strict = false | strict = true |
/// |----------|----------------|---------------|
/// | inactive | `vb ≥ ε`       | `vb ≥ −ε`     |
/// | active   | `vb ≤ −ε`      | `vb ≤ ε`      |
///
/// Strict mode has no false positives, non-strict no false negatives.
pub fn state_check(
    clipped: &LayeredNetwork,
    neuron: usize,
    phase: Phase,
    strict: bool,
    epsilon: f64,
    arena: &NodeArena,
) -> Result<Query, IrError> {
    let net = keep_outputs(clipped, &[neuron], arena)?;
    let chain = net.chain(net.layer_count() - 1, 0)?;
    if chain.len() != 1 {
        return Err(IrError::UnsupportedTopology(format!(
            "state check expects a lone pre-activation node, found a chain of {}",
            chain.len()
        )));
    }
    let vb = chain[0];
    let (comparator, scalar) = match (phase, strict) {
        (Phase::Inactive, false) => (Comparator::Ge, epsilon),
        (Phase::Inactive, true) => (Comparator::Ge, -epsilon),
        (Phase::Active, false) => (Comparator::Le, -epsilon),
        (Phase::Active, true) => (Comparator::Le, epsilon),
    };
    let equation = Equation::new(vec![(1.0, vb)], comparator, scalar);
    let query = Query::new(net.nodes(), net.inputs(), vec![vb], vec![equation])?;
    finish(query, arena)
}
