// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Call-scoped naming state for importers.

/// Hands out distinct label prefixes (`nnet0_`, `nnet1_`, `ipq0_`, ...) so
/// that networks imported within one session never share labels.
///
/// Create one per session and pass it to every importer; there is no
/// process-wide counter.
#[derive(Debug, Default)]
pub struct ImportContext {
    nnet_count: usize,
    ipq_count: usize,
}

impl ImportContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn next_nnet_prefix(&mut self) -> String {
        let prefix = format!("nnet{}_", self.nnet_count);
        self.nnet_count += 1;
        prefix
    }

    pub(crate) fn next_ipq_prefix(&mut self) -> String {
        let prefix = format!("ipq{}_", self.ipq_count);
        self.ipq_count += 1;
        prefix
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefixes_are_per_format_and_increment() {
        let mut ctx = ImportContext::new();
        assert_eq!(ctx.next_nnet_prefix(), "nnet0_");
        assert_eq!(ctx.next_nnet_prefix(), "nnet1_");
        assert_eq!(ctx.next_ipq_prefix(), "ipq0_");

        let mut other = ImportContext::new();
        assert_eq!(other.next_nnet_prefix(), "nnet0_");
    }
}
