// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! Contains the error type of rewriting operations.

use kterm::sorts::SortError;
use solver::SolverError;
use thiserror::Error;

/// The ways a rewriting operation can fail. Stuck states, infeasible branches
/// and exhausted bounds are ordinary results, not errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RewriteError {
    /// A term given to the engine was not well sorted
    #[error("{0}")]
    Sort(#[from] SortError),
    /// A feasibility query failed
    #[error("{0}")]
    Solver(#[from] SolverError),
    /// Evaluating a function application nested too deeply
    #[allow(missing_docs)]
    #[error("evaluation of {label} exceeded depth {depth}")]
    FunctionDepthExceeded { label: String, depth: usize },
    /// Structural rules kept applying without reaching a normal form
    #[allow(missing_docs)]
    #[error("structural rules did not reach a normal form after {limit} steps")]
    StructuralDivergence { limit: usize },
}
