// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! Bounded breadth-first exploration of the symbolic state space.
//!
//! States are explored layer by layer, where a layer holds the states reached
//! by the same number of transitions. Structural successors stay in the layer
//! of the state they came from. Every reached state is kept at most once,
//! comparing terms and simplified constraints structurally.

use std::time::Instant;

use kterm::hashmap::HashSet;
use kterm::subst::Substitution;
use kterm::syntax::*;
use rayon::prelude::*;
use serde::Serialize;
use unify::matches;

use crate::error::RewriteError;
use crate::state::ConstrainedTerm;
use crate::step::{StepEngine, StepMode};

/// Which reached states are candidates for results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum SearchType {
    /// Direct successors of the initial state
    One,
    /// Every reached state, the initial state included
    #[default]
    Star,
    /// Every reached state except the initial state
    Plus,
    /// Reached states with no successor at all, and the instances of
    /// symbolic states that no rule covers
    Final,
}

/// Limits and output format of a search.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SearchConf {
    #[allow(missing_docs)]
    pub search_type: SearchType,
    /// Maximum number of transitions from the initial state. [`SearchType::One`]
    /// always uses 1.
    pub depth: Option<usize>,
    /// Maximum number of results
    pub bound: Option<usize>,
    /// Report the pattern's bindings instead of the matched states
    pub results_as_substitution: bool,
}

/// A term with a side condition, matched against reached states.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    #[allow(missing_docs)]
    pub term: Term,
    #[allow(missing_docs)]
    pub requires: Term,
}

impl Pattern {
    /// A pattern without a side condition.
    pub fn new(term: Term) -> Self {
        Pattern {
            term,
            requires: Term::true_(),
        }
    }

    /// Set the side condition.
    pub fn requires(mut self, requires: Term) -> Self {
        self.requires = requires;
        self
    }

    /// The first way the pattern matches `state` such that the side condition
    /// is feasible together with the state's constraint.
    pub fn first_match(
        &self,
        engine: &StepEngine,
        state: &ConstrainedTerm,
    ) -> Result<Option<Substitution>, RewriteError> {
        let eval = engine.evaluator();
        for theta in matches(&self.term, &state.term) {
            let requires = eval.evaluate(&theta.apply(&self.requires))?;
            let c = state.constraint.conjoin(&requires);
            if engine.store().is_feasible(engine.signature(), &c)? {
                return Ok(Some(theta));
            }
        }
        Ok(None)
    }
}

/// One search result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SearchResult {
    /// A matching state
    State(ConstrainedTerm),
    /// The pattern's bindings for a matching state
    Substitution(Substitution),
}

/// The outcome of a search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchResults {
    /// At most `bound` results, in breadth-first order
    pub results: Vec<SearchResult>,
    /// Number of transitions to the deepest layer explored
    pub depth: usize,
    /// Number of distinct states explored
    pub states: usize,
}

/// Explore the states reachable from `initial` and report those matching
/// `pattern`, one result per state.
pub fn search(
    engine: &StepEngine,
    initial: &ConstrainedTerm,
    pattern: &Pattern,
    conf: &SearchConf,
) -> Result<SearchResults, RewriteError> {
    let sig = engine.signature();
    let max_depth = match conf.search_type {
        SearchType::One => Some(1),
        _ => conf.depth,
    };
    let bound = conf.bound.unwrap_or(usize::MAX);

    let initial = ConstrainedTerm::new(initial.term.clone(), initial.constraint.simplify(sig));
    let mut seen: HashSet<ConstrainedTerm> = HashSet::default();
    seen.insert(initial.clone());
    let mut layer = vec![initial];
    let mut results = vec![];
    let mut current_depth = 0;
    let start_time = Instant::now();

    loop {
        log::debug!(
            "considering new depth: {current_depth}. layer size is {}. seen {} unique states.",
            layer.len(),
            seen.len()
        );
        let at_limit = max_depth.is_some_and(|md| current_depth >= md);

        // close the layer under structural steps and collect the next one
        let mut next = vec![];
        let mut finals = vec![];
        let mut i = 0;
        while i < layer.len() {
            let successors = engine.step(&layer[i], StepMode::Unify)?;
            if conf.search_type == SearchType::Final {
                if successors.is_empty() {
                    finals.push(layer[i].clone());
                } else if let Some(rest) = engine.remainder(&layer[i], &successors)? {
                    finals.push(rest);
                }
            }
            for s in successors {
                if s.transition && at_limit {
                    continue;
                }
                if !seen.insert(s.state.clone()) {
                    continue;
                }
                if s.transition {
                    next.push(s.state);
                } else {
                    layer.push(s.state);
                }
            }
            i += 1;
        }

        let candidates: Vec<&ConstrainedTerm> = match conf.search_type {
            SearchType::Star => layer.iter().collect(),
            SearchType::One | SearchType::Plus => layer
                .iter()
                .enumerate()
                .filter(|(i, _)| current_depth > 0 || *i > 0)
                .map(|(_, state)| state)
                .collect(),
            SearchType::Final => finals.iter().collect(),
        };
        let matched = candidates
            .par_iter()
            .map(|state| -> Result<Option<SearchResult>, RewriteError> {
                Ok(pattern.first_match(engine, state)?.map(|theta| {
                    if conf.results_as_substitution {
                        SearchResult::Substitution(theta)
                    } else {
                        SearchResult::State((*state).clone())
                    }
                }))
            })
            .collect::<Result<Vec<_>, _>>()?;
        results.extend(matched.into_iter().flatten().take(bound - results.len()));

        if results.len() >= bound || next.is_empty() || at_limit {
            break;
        }
        layer = next;
        current_depth += 1;
    }

    log::info!(
        "search found {} results in {}ms, exploring {} states up to depth {current_depth}",
        results.len(),
        start_time.elapsed().as_millis(),
        seen.len()
    );
    Ok(SearchResults {
        results,
        depth: current_depth,
        states: seen.len(),
    })
}
