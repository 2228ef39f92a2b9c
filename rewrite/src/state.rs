// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! Symbolic program states.

use std::fmt;

use kterm::hashmap::HashSet;
use kterm::syntax::{Term, Variable};
use serde::Serialize;
use solver::Constraint;

/// A term together with the constraint restricting its variables. It stands
/// for every instance of the term that satisfies the constraint.
#[derive(PartialEq, Eq, Clone, Debug, Hash, Serialize)]
pub struct ConstrainedTerm {
    #[allow(missing_docs)]
    pub term: Term,
    #[allow(missing_docs)]
    pub constraint: Constraint,
}

impl ConstrainedTerm {
    #[allow(missing_docs)]
    pub fn new(term: Term, constraint: Constraint) -> Self {
        ConstrainedTerm { term, constraint }
    }

    /// An unconstrained state.
    pub fn from_term(term: Term) -> Self {
        Self::new(term, Constraint::top())
    }

    /// The variables of the term and then of the constraint.
    pub fn free_vars(&self) -> HashSet<Variable> {
        let mut vars = self.term.free_vars();
        vars.extend(self.constraint.free_vars());
        vars
    }
}

impl fmt::Display for ConstrainedTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.constraint.is_true() {
            write!(f, "{}", self.term)
        } else {
            write!(f, "{} /\\ {}", self.term, self.constraint)
        }
    }
}
