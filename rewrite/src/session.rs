// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! The operations offered to clients, bundled with the state they share.

use std::sync::Arc;

use kterm::fresh::FreshCounter;
use kterm::rule::{Definition, Rule};
use kterm::subst::Substitution;
use kterm::syntax::*;
use serde::Serialize;
use solver::ConstraintStore;
use unify::matches;

use crate::conf::RewriteConf;
use crate::error::RewriteError;
use crate::prove::{prove, ProofResult, ProveConf};
use crate::search::{search, Pattern, SearchConf, SearchResults};
use crate::state::ConstrainedTerm;
use crate::step::{StepEngine, StepMode};

/// The outcome of concrete execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecuteResult {
    /// Number of transitions taken
    pub steps_taken: usize,
    /// The term reached
    pub term: Term,
}

/// A definition together with the fresh-name counter, constraint store and
/// configuration used by every operation on it. Fresh names never repeat
/// within a session.
pub struct RewriteSession {
    definition: Arc<Definition>,
    store: ConstraintStore,
    counter: FreshCounter,
    conf: RewriteConf,
}

impl RewriteSession {
    /// A session with the default store and configuration.
    pub fn new(definition: Arc<Definition>) -> Self {
        RewriteSession {
            definition,
            store: ConstraintStore::default(),
            counter: FreshCounter::new(),
            conf: RewriteConf::default(),
        }
    }

    /// Replace the constraint store.
    pub fn with_store(mut self, store: ConstraintStore) -> Self {
        self.store = store;
        self
    }

    /// Replace the configuration.
    pub fn with_conf(mut self, conf: RewriteConf) -> Self {
        self.conf = conf;
        self
    }

    #[allow(missing_docs)]
    pub fn definition(&self) -> &Definition {
        &self.definition
    }

    #[allow(missing_docs)]
    pub fn counter(&self) -> &FreshCounter {
        &self.counter
    }

    fn engine(&self) -> StepEngine<'_> {
        StepEngine::new(&self.definition, &self.store, &self.counter, &self.conf)
    }

    fn initial(
        &self,
        engine: &StepEngine,
        term: &Term,
    ) -> Result<ConstrainedTerm, RewriteError> {
        self.definition.signature().check(term)?;
        Ok(ConstrainedTerm::from_term(engine.evaluator().evaluate(term)?))
    }

    /// Apply structural rules until none applies.
    fn normalize(
        &self,
        engine: &StepEngine,
        mut state: ConstrainedTerm,
    ) -> Result<ConstrainedTerm, RewriteError> {
        let limit = self.conf.max_structural_steps;
        for _ in 0..limit {
            match engine.first(&state, StepMode::Match, |r| !engine.is_transition(r))? {
                Some(s) => state = s.state,
                None => return Ok(state),
            }
        }
        Err(RewriteError::StructuralDivergence { limit })
    }

    /// Rewrite `term` by the first applicable rule in definition order until
    /// it is stuck or `depth` transitions were taken. Structural rules are
    /// applied to a normal form before and after each transition and do not
    /// count toward `depth`.
    pub fn execute(
        &self,
        term: &Term,
        depth: Option<usize>,
    ) -> Result<ExecuteResult, RewriteError> {
        let engine = self.engine();
        let mut state = self.normalize(&engine, self.initial(&engine, term)?)?;
        let mut steps_taken = 0;
        while depth.map(|d| steps_taken < d).unwrap_or(true) {
            match engine.first(&state, StepMode::Match, |r| engine.is_transition(r))? {
                Some(s) => {
                    steps_taken += 1;
                    state = self.normalize(&engine, s.state)?;
                }
                None => break,
            }
        }
        log::info!("execution took {steps_taken} steps");
        Ok(ExecuteResult {
            steps_taken,
            term: state.term,
        })
    }

    /// Search the states reachable from `term`, see [`search`].
    pub fn search(
        &self,
        term: &Term,
        pattern: &Pattern,
        conf: &SearchConf,
    ) -> Result<SearchResults, RewriteError> {
        let engine = self.engine();
        let initial = self.initial(&engine, term)?;
        search(&engine, &initial, pattern, conf)
    }

    /// Every way `pattern` matches `term`, with feasible side conditions.
    pub fn match_pattern(
        &self,
        term: &Term,
        pattern: &Pattern,
    ) -> Result<Vec<Substitution>, RewriteError> {
        let engine = self.engine();
        let state = self.initial(&engine, term)?;
        let eval = engine.evaluator();
        let sig = self.definition.signature();
        let mut found = vec![];
        for theta in matches(&pattern.term, &state.term) {
            let requires = eval.evaluate(&theta.apply(&pattern.requires))?;
            if self.store.is_feasible(sig, &state.constraint.conjoin(&requires))? {
                found.push(theta);
            }
        }
        Ok(found)
    }

    /// [`RewriteSession::execute`] followed by
    /// [`RewriteSession::match_pattern`] on the final term.
    pub fn execute_and_match(
        &self,
        term: &Term,
        depth: Option<usize>,
        pattern: &Pattern,
    ) -> Result<(ExecuteResult, Vec<Substitution>), RewriteError> {
        let result = self.execute(term, depth)?;
        let found = self.match_pattern(&result.term, pattern)?;
        Ok((result, found))
    }

    /// Prove the untrusted `claims`, see [`prove`].
    pub fn prove(&self, claims: &[Rule], conf: &ProveConf) -> Result<ProofResult, RewriteError> {
        let sig = self.definition.signature();
        for claim in claims {
            for t in [&claim.lhs, &claim.rhs, &claim.requires, &claim.ensures] {
                sig.check(t)?;
            }
        }
        prove(&self.engine(), claims, conf)
    }
}
