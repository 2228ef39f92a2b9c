// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! Holds the configuration of the rewrite engine.

use kterm::rule::TRANSITION;

/// Configuration shared by every operation of a rewriting session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteConf {
    /// Rules carrying one of these attributes are transitions and count as
    /// steps; all other rules are structural. With no tags at all, every rule
    /// is a transition.
    pub transition_tags: Vec<String>,
    /// How deeply function evaluation may nest
    pub max_function_depth: usize,
    /// How many structural steps may be taken in a row
    pub max_structural_steps: usize,
}

impl Default for RewriteConf {
    fn default() -> Self {
        RewriteConf {
            transition_tags: vec![TRANSITION.to_string()],
            max_function_depth: 256,
            max_structural_steps: 10_000,
        }
    }
}
