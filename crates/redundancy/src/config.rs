// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Analysis configuration loaded from TOML files or constructed programmatically.
//!
//! # TOML Format
//! ```toml
//! epsilon = 1e-4
//! strict_state_check = false
//! duplicate_suffix = "_dup"
//! modified_suffix = "_mod"
//!
//! [clip]
//! first_layer = 2
//! first_cut = 1
//! ```

use crate::{ClipRange, RedundancyError};
use std::path::Path;

/// Settings shared by every query an orchestrator builds.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Margin by which compared values must differ.
    pub epsilon: f64,
    /// State checks with no false positives instead of no false negatives.
    pub strict_state_check: bool,
    /// Clip range applied when a call does not pass its own.
    pub clip: Option<ClipRange>,
    /// Label suffix of the working copy of the original network.
    pub duplicate_suffix: String,
    /// Label suffix of the working copy that gets overridden.
    pub modified_suffix: String,
}

impl AnalysisConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, RedundancyError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            RedundancyError::Config(format!("cannot read config '{}': {e}", path.display()))
        })?;
        Self::from_toml(&content)
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, RedundancyError> {
        let config: Self = toml::from_str(toml_str)
            .map_err(|e| RedundancyError::Config(format!("TOML parse error: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialises configuration to TOML.
    pub fn to_toml(&self) -> Result<String, RedundancyError> {
        toml::to_string_pretty(self)
            .map_err(|e| RedundancyError::Config(format!("TOML serialise error: {e}")))
    }

    /// Rejects a negative or non-finite epsilon and clashing suffixes.
    pub fn validate(&self) -> Result<(), RedundancyError> {
        if !self.epsilon.is_finite() || self.epsilon < 0.0 {
            return Err(RedundancyError::Config(format!(
                "epsilon must be finite and non-negative, got {}",
                self.epsilon
            )));
        }
        if self.duplicate_suffix == self.modified_suffix {
            return Err(RedundancyError::Config(format!(
                "duplicate and modified suffixes are both '{}'",
                self.modified_suffix
            )));
        }
        Ok(())
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            epsilon: 1e-4,
            strict_state_check: false,
            clip: None,
            duplicate_suffix: "_dup".to_string(),
            modified_suffix: "_mod".to_string(),
        }
    }
}
