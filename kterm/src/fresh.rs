// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! The session-wide fresh-name counter.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::syntax::{Sort, Term, Variable};

/// A monotonically increasing counter used to generate fresh names.
///
/// Cloning produces another handle to the same counter, so every component of
/// a rewriting session (matching, unification, proof unrolling) draws from one
/// sequence and names are never reused within the session. Separate sessions
/// create separate counters.
#[derive(Clone, Debug, Default)]
pub struct FreshCounter(Arc<AtomicU64>);

impl FreshCounter {
    /// A new counter starting at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// A new counter whose first value is `start`.
    pub fn starting_at(start: u64) -> Self {
        Self(Arc::new(AtomicU64::new(start)))
    }

    /// Return the current value and advance the counter.
    pub fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst)
    }

    /// The value the next call to [`FreshCounter::next`] will return.
    pub fn value(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }

    /// A fresh variable of the given sort, named after `base`.
    ///
    /// Any previous freshness suffix of `base` is dropped, so renaming a
    /// renamed variable does not grow its name.
    pub fn fresh_variable(&self, base: &Variable) -> Variable {
        let stem = match base.name.rsplit_once('#') {
            Some((stem, n)) if !stem.is_empty() && n.chars().all(|c| c.is_ascii_digit()) => stem,
            _ => &base.name,
        };
        Variable {
            name: format!("{stem}#{}", self.next()),
            sort: base.sort.clone(),
        }
    }

    /// A fresh concrete value of the given sort: the counter value for `Int`,
    /// and a `#n` literal for any other sort.
    pub fn fresh_constant(&self, sort: &Sort) -> Term {
        let n = self.next();
        match sort {
            Sort::Int => Term::int(n),
            _ => Term::token(sort, &format!("#{n}")),
        }
    }
}
