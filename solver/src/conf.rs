// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! Holds the configuration of feasibility queries.

use std::sync::Arc;
use std::time::Duration;

use crate::basics::{BasicSolver, DeadlineSolver};

/// What to conclude when the decision procedure cannot decide a constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownPolicy {
    /// A constraint is feasible unless it is proven false
    #[default]
    AssumeFeasible,
    /// Fail the query with [`crate::basics::SolverError::Unknown`]
    Fatal,
}

/// What to conclude when a query times out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeoutPolicy {
    /// Fail the query with [`crate::basics::SolverError::Timeout`]
    #[default]
    Fatal,
    /// Treat the constraint as feasible (and an implication as not proven)
    AssumeFeasible,
}

/// Configuration of the decision procedure used by a
/// [`crate::store::ConstraintStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolverConf {
    /// Deadline for each query, if any.
    pub timeout: Option<Duration>,
    #[allow(missing_docs)]
    pub on_unknown: UnknownPolicy,
    #[allow(missing_docs)]
    pub on_timeout: TimeoutPolicy,
    /// Whether to remember the answers to repeated queries.
    pub cache: bool,
}

impl Default for SolverConf {
    fn default() -> Self {
        SolverConf {
            timeout: None,
            on_unknown: UnknownPolicy::default(),
            on_timeout: TimeoutPolicy::default(),
            cache: true,
        }
    }
}

impl SolverConf {
    /// Wrap `backend` according to this configuration.
    pub fn solver(&self, backend: Arc<dyn BasicSolver>) -> Arc<dyn BasicSolver> {
        match self.timeout {
            Some(timeout) => Arc::new(DeadlineSolver::new(backend, timeout)),
            None => backend,
        }
    }

    /// Timeout in milliseconds, for logging.
    pub fn get_timeout_ms(&self) -> Option<u128> {
        self.timeout.map(|t| t.as_millis())
    }
}
