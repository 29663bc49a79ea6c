// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! High-level redundancy queries over one imported network.
//!
//! Every call works on fresh duplicates of the source network, so the source
//! can be queried any number of times:
//!
//! ```text
//!   source ──duplicate+clip──▶ original ─┐
//!          ──duplicate+clip──▶ modified ─┴─ modify ─▶ join / compare ─▶ Query
//! ```
//!
//! Override coordinates are given in the source network's layer numbering;
//! they are shifted by the clip range before use.

use crate::amend::{self, CompareOp, OverrideKind, Overrides, Phase};
use crate::clip::{duplicate_and_clip, ClipRange};
use crate::{AnalysisConfig, RedundancyError};
use network_ir::{LayeredNetwork, NodeArena, Query};
use std::str::FromStr;

/// A neuron and what replaces its activation, written `layer:neuron:kind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct NeuronOverride {
    pub layer: usize,
    pub neuron: usize,
    pub kind: OverrideKind,
}

impl NeuronOverride {
    pub fn new(layer: usize, neuron: usize, kind: OverrideKind) -> Self {
        Self {
            layer,
            neuron,
            kind,
        }
    }
}

impl FromStr for NeuronOverride {
    type Err = RedundancyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').map(str::trim).collect();
        let &[layer, neuron, kind] = parts.as_slice() else {
            return Err(RedundancyError::Config(format!(
                "override '{s}' is not of the form layer:neuron:kind"
            )));
        };
        let index = |v: &str| {
            v.parse::<usize>()
                .map_err(|e| RedundancyError::Config(format!("override '{s}': {e}")))
        };
        Ok(Self {
            layer: index(layer)?,
            neuron: index(neuron)?,
            kind: kind.parse()?,
        })
    }
}

/// Builds redundancy queries for one network.
#[derive(Debug, Clone)]
pub struct RedundancyTest {
    network: LayeredNetwork,
    config: AnalysisConfig,
}

impl RedundancyTest {
    /// Default configuration with the given `epsilon`.
    pub fn new(network: LayeredNetwork, epsilon: f64) -> Self {
        Self {
            network,
            config: AnalysisConfig {
                epsilon,
                ..AnalysisConfig::default()
            },
        }
    }

    pub fn with_config(
        network: LayeredNetwork,
        config: AnalysisConfig,
    ) -> Result<Self, RedundancyError> {
        config.validate()?;
        Ok(Self { network, config })
    }

    pub fn network(&self) -> &LayeredNetwork {
        &self.network
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn epsilon(&self) -> f64 {
        self.config.epsilon
    }

    /// The call's range, else the configured one, else the whole network.
    fn resolve_range(&self, range: Option<&ClipRange>) -> ClipRange {
        range.copied().or(self.config.clip).unwrap_or_default()
    }

    /// Checks `overrides` against the network and `range` and shifts them
    /// into the clipped numbering.
    fn relative_overrides(
        &self,
        overrides: &[NeuronOverride],
        range: &ClipRange,
    ) -> Result<Overrides, RedundancyError> {
        let count = self.network.layer_count();
        let last = range.resolve_last(count);
        let mut relative = Overrides::new();
        for o in overrides {
            let invalid = |detail: String| RedundancyError::InvalidOverride {
                layer: o.layer,
                neuron: o.neuron,
                detail,
            };
            if o.layer < 1 || o.layer + 1 >= count {
                return Err(invalid(format!(
                    "layer must lie strictly between the input layer and output layer {}",
                    count.saturating_sub(1)
                )));
            }
            if o.layer < range.first_layer || o.layer > last {
                return Err(invalid(format!(
                    "layer is outside the clip range {}..={last}",
                    range.first_layer
                )));
            }
            let size = self.network.layer_size(o.layer);
            if o.neuron >= size {
                return Err(invalid(format!("layer has {size} neurons")));
            }
            let key = (o.layer - range.first_layer, o.neuron);
            if relative.insert(key, o.kind).is_some() {
                return Err(invalid("neuron is overridden twice".into()));
            }
        }
        Ok(relative)
    }

    /// Two clipped duplicates, the second with `overrides` applied.
    fn prepare(
        &self,
        overrides: &[NeuronOverride],
        range: Option<&ClipRange>,
        arena: &mut NodeArena,
    ) -> Result<(LayeredNetwork, LayeredNetwork, Overrides), RedundancyError> {
        let range = self.resolve_range(range);
        let relative = self.relative_overrides(overrides, &range)?;
        let original = duplicate_and_clip(&self.network, &range, &self.config.duplicate_suffix, arena)?;
        let modified = duplicate_and_clip(&self.network, &range, &self.config.modified_suffix, arena)?;
        let modified = amend::modify(modified, &relative, arena)?;
        tracing::debug!(
            overrides = relative.len(),
            first_layer = range.first_layer,
            layers = original.layer_count(),
            "prepared working copies"
        );
        Ok((original, modified, relative))
    }

    fn require_output_range(&self, range: &ClipRange) -> Result<(), RedundancyError> {
        if range.reaches_output(self.network.layer_count()) {
            Ok(())
        } else {
            Err(RedundancyError::InvalidRange(
                "this query needs the clip range to end at the untruncated output layer".into(),
            ))
        }
    }

    /// A clipped copy of the network with `overrides` applied.
    pub fn modified(
        &self,
        overrides: &[NeuronOverride],
        range: Option<&ClipRange>,
        arena: &mut NodeArena,
    ) -> Result<LayeredNetwork, RedundancyError> {
        self.modified_pair(overrides, range, arena).map(|(_, m)| m)
    }

    /// The clipped original and the clipped, overridden copy, identity-disjoint.
    pub fn modified_pair(
        &self,
        overrides: &[NeuronOverride],
        range: Option<&ClipRange>,
        arena: &mut NodeArena,
    ) -> Result<(LayeredNetwork, LayeredNetwork), RedundancyError> {
        let (original, modified, _) = self.prepare(overrides, range, arena)?;
        Ok((original, modified))
    }

    /// Query satisfiable iff some input moves output `output` by at least
    /// epsilon in direction `op` when `overrides` are applied.
    pub fn compared_exact(
        &self,
        overrides: &[NeuronOverride],
        op: CompareOp,
        output: usize,
        range: Option<&ClipRange>,
        arena: &mut NodeArena,
    ) -> Result<Query, RedundancyError> {
        let (original, modified, relative) = self.prepare(overrides, range, arena)?;
        Ok(amend::compare_exact(
            &original,
            modified,
            &relative,
            op,
            output,
            self.config.epsilon,
            arena,
        )?)
    }

    /// Query satisfiable iff some input on which `output` wins in the
    /// original lets `counter_output` beat it in the modified network.
    pub fn compared_minimum(
        &self,
        overrides: &[NeuronOverride],
        output: usize,
        counter_output: usize,
        range: Option<&ClipRange>,
        arena: &mut NodeArena,
    ) -> Result<Query, RedundancyError> {
        self.require_output_range(&self.resolve_range(range))?;
        let (original, modified, relative) = self.prepare(overrides, range, arena)?;
        Ok(amend::compare_minimum(
            &original,
            modified,
            &relative,
            output,
            counter_output,
            self.config.epsilon,
            arena,
        )?)
    }

    /// Original and modified networks joined, with no equations.
    pub fn joined(
        &self,
        overrides: &[NeuronOverride],
        range: Option<&ClipRange>,
        arena: &mut NodeArena,
    ) -> Result<Query, RedundancyError> {
        let (original, modified, relative) = self.prepare(overrides, range, arena)?;
        Ok(amend::joined_query(&original, modified, &relative, arena)?)
    }

    /// Query satisfiable iff neuron `(layer, neuron)` is not always in `phase`.
    pub fn state_check(
        &self,
        layer: usize,
        neuron: usize,
        phase: Phase,
        range: Option<&ClipRange>,
        arena: &mut NodeArena,
    ) -> Result<Query, RedundancyError> {
        let range = self.resolve_range(range);
        self.require_output_range(&range)?;
        let to_neuron = ClipRange {
            last_layer: Some(layer),
            last_cut: 0,
            ..range
        };
        let clipped = duplicate_and_clip(
            &self.network,
            &to_neuron,
            &self.config.duplicate_suffix,
            arena,
        )?;
        Ok(amend::state_check(
            &clipped,
            neuron,
            phase,
            self.config.strict_state_check,
            self.config.epsilon,
            arena,
        )?)
    }
}
