// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! Feasibility and implication queries, with local simplification in front of
//! the decision procedure and an optional answer cache behind it.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use kterm::hashmap::HashMap;
use kterm::sorts::Signature;

use crate::basics::{BasicSolver, SatResp, SolverError};
use crate::conf::{SolverConf, TimeoutPolicy, UnknownPolicy};
use crate::constraint::{negate, Constraint};
use crate::local::LocalSolver;

/// Answers feasibility queries about constraints.
pub struct ConstraintStore {
    solver: Arc<dyn BasicSolver>,
    conf: SolverConf,
    cache: Mutex<HashMap<Constraint, SatResp>>,
}

impl Default for ConstraintStore {
    /// A store backed by [`LocalSolver`] with the default configuration.
    fn default() -> Self {
        Self::new(Arc::new(LocalSolver), SolverConf::default())
    }
}

impl ConstraintStore {
    /// A store querying `backend`, wrapped according to `conf`.
    pub fn new(backend: Arc<dyn BasicSolver>, conf: SolverConf) -> Self {
        ConstraintStore {
            solver: conf.solver(backend),
            conf,
            cache: Mutex::new(HashMap::default()),
        }
    }

    #[allow(missing_docs)]
    pub fn conf(&self) -> &SolverConf {
        &self.conf
    }

    /// Whether `constraint` may be satisfiable. Trivial constraints are
    /// decided locally; an unknown answer counts as feasible unless the
    /// configuration makes it fatal.
    pub fn is_feasible(
        &self,
        sig: &Signature,
        constraint: &Constraint,
    ) -> Result<bool, SolverError> {
        let c = constraint.simplify(sig);
        if c.is_false() {
            return Ok(false);
        }
        if c.is_true() {
            return Ok(true);
        }
        match self.query(sig, &c) {
            Ok(SatResp::Sat) => Ok(true),
            Ok(SatResp::Unsat) => Ok(false),
            Ok(SatResp::Unknown(reason)) => match self.conf.on_unknown {
                UnknownPolicy::AssumeFeasible => Ok(true),
                UnknownPolicy::Fatal => Err(SolverError::Unknown(reason)),
            },
            Err(SolverError::Timeout(_))
                if self.conf.on_timeout == TimeoutPolicy::AssumeFeasible =>
            {
                Ok(true)
            }
            Err(err) => Err(err),
        }
    }

    /// Whether every assignment satisfying `assumption` also satisfies
    /// `conclusion`, i.e. `assumption /\ not conclusion` is unsatisfiable.
    /// Only a definite answer proves the implication.
    pub fn implies(
        &self,
        sig: &Signature,
        assumption: &Constraint,
        conclusion: &Constraint,
    ) -> Result<bool, SolverError> {
        let conclusion = conclusion.simplify(sig);
        if conclusion.is_true() {
            return Ok(true);
        }
        let c = assumption.conjoin(&negate(&conclusion.as_term())).simplify(sig);
        if c.is_false() {
            return Ok(true);
        }
        match self.query(sig, &c) {
            Ok(SatResp::Unsat) => Ok(true),
            Ok(_) => Ok(false),
            Err(SolverError::Timeout(_))
                if self.conf.on_timeout == TimeoutPolicy::AssumeFeasible =>
            {
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }

    fn query(&self, sig: &Signature, c: &Constraint) -> Result<SatResp, SolverError> {
        if self.conf.cache {
            if let Some(resp) = self.cached(c) {
                log::trace!("            cached answer {resp:?} for {c}");
                return Ok(resp);
            }
        }
        let start_time = Instant::now();
        let resp = self.solver.check_sat(sig, c);
        log::debug!(
            "            solver(timeout={}ms) returned {resp:?} after {}ms ({} atoms)",
            self.conf.get_timeout_ms().unwrap_or(0),
            start_time.elapsed().as_millis(),
            c.atoms().len(),
        );
        if let (true, Ok(resp)) = (self.conf.cache, &resp) {
            if let Ok(mut cache) = self.cache.lock() {
                cache.insert(c.clone(), resp.clone());
            }
        }
        resp
    }

    fn cached(&self, c: &Constraint) -> Option<SatResp> {
        self.cache.lock().ok()?.get(c).cloned()
    }

    /// Number of cached answers.
    pub fn cache_len(&self) -> usize {
        self.cache.lock().map_or(0, |cache| cache.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kterm::sorts::labels;
    use kterm::syntax::{Sort, Term};
    use std::time::Duration;

    fn lt(a: Term, b: Term) -> Term {
        Term::app(labels::INT_LT, Sort::Bool, [a, b])
    }

    fn x() -> Term {
        Term::var("X", Sort::Int)
    }

    struct Unknown;

    impl BasicSolver for Unknown {
        fn check_sat(&self, _: &Signature, _: &Constraint) -> Result<SatResp, SolverError> {
            Ok(SatResp::Unknown("no idea".to_string()))
        }
    }

    #[test]
    fn test_feasibility() {
        let _ = pretty_env_logger::try_init();
        let sig = Signature::with_builtins();
        let store = ConstraintStore::default();
        let c = Constraint::from_term(&lt(x(), Term::int(10)));
        assert_eq!(store.is_feasible(&sig, &c), Ok(true));
        assert_eq!(store.cache_len(), 1);
        assert_eq!(store.is_feasible(&sig, &c), Ok(true));
        assert_eq!(store.cache_len(), 1);

        let contradictory = c.conjoin(&lt(Term::int(12), x()));
        assert_eq!(store.is_feasible(&sig, &contradictory), Ok(false));
    }

    #[test]
    fn test_implies() {
        let sig = Signature::with_builtins();
        let store = ConstraintStore::default();
        let c = Constraint::from_term(&lt(x(), Term::int(10)));
        let weaker = Constraint::from_term(&lt(x(), Term::int(11)));
        assert_eq!(store.implies(&sig, &c, &weaker), Ok(true));
        // unknown is not a proof
        assert_eq!(store.implies(&sig, &weaker, &c), Ok(false));
        assert_eq!(store.implies(&sig, &c, &Constraint::top()), Ok(true));
    }

    #[test]
    fn test_unknown_policy() {
        let sig = Signature::with_builtins();
        let c = Constraint::from_term(&lt(x(), Term::int(10)));
        let lenient = ConstraintStore::new(Arc::new(Unknown), SolverConf::default());
        assert_eq!(lenient.is_feasible(&sig, &c), Ok(true));

        let strict = ConstraintStore::new(
            Arc::new(Unknown),
            SolverConf {
                on_unknown: UnknownPolicy::Fatal,
                timeout: Some(Duration::from_secs(10)),
                ..SolverConf::default()
            },
        );
        assert_eq!(
            strict.is_feasible(&sig, &c),
            Err(SolverError::Unknown("no idea".to_string()))
        );
    }
}
