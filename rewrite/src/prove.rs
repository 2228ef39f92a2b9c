// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! Reachability proofs by symbolic execution with guarded coinduction.
//!
//! A claim `lhs => rhs requires P ensures Q` states that every instance of
//! `lhs` satisfying `P` reaches an instance of `rhs` satisfying `Q`. The claim
//! is proved by exploring the symbolic successors of `lhs /\ P`. A branch is
//! closed once its term matches `rhs` with the claim's variables held fixed
//! and its constraint implies `Q`. After at least one semantic step, the
//! claims themselves may be applied as rules, which closes loops.
//!
//! Instances of a branch that no rule covers are stuck, and are reported
//! unless they already are instances of the target.

use kterm::rule::Rule;
use kterm::subst::Substitution;
use kterm::syntax::*;
use serde::Serialize;
use solver::Constraint;
use unify::{matches, matches_with, Unifier};

use crate::error::RewriteError;
use crate::state::ConstrainedTerm;
use crate::step::{StepEngine, StepMode};

/// Limits of a proof.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProveConf {
    /// Maximum number of steps on any branch; a branch reaching it is
    /// reported as a residual state. Unbounded by default.
    pub max_depth: Option<usize>,
}

#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProofStatus {
    Proved,
    NotProved,
}

/// The outcome of proving a set of claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProofResult {
    #[allow(missing_docs)]
    pub status: ProofStatus,
    /// States some branch reached without closing, over all claims
    pub residuals: Vec<ConstrainedTerm>,
}

impl ProofResult {
    #[allow(missing_docs)]
    pub fn is_proved(&self) -> bool {
        self.status == ProofStatus::Proved
    }
}

struct Branch {
    state: ConstrainedTerm,
    /// instantiation of the claim's variables along this branch
    narrowing: Substitution,
    semantic_steps: usize,
    depth: usize,
}

/// Prove every claim that is not trusted, using all claims as hypotheses.
pub fn prove(
    engine: &StepEngine,
    claims: &[Rule],
    conf: &ProveConf,
) -> Result<ProofResult, RewriteError> {
    let mut residuals = vec![];
    for claim in claims.iter().filter(|c| !c.is_trusted()) {
        let remaining = prove_claim(engine, claims, claim, conf)?;
        log::info!("claim {}: {} residual states", claim.label, remaining.len());
        residuals.extend(remaining);
    }
    let status = if residuals.is_empty() {
        ProofStatus::Proved
    } else {
        ProofStatus::NotProved
    };
    Ok(ProofResult { status, residuals })
}

fn prove_claim(
    engine: &StepEngine,
    claims: &[Rule],
    claim: &Rule,
    conf: &ProveConf,
) -> Result<Vec<ConstrainedTerm>, RewriteError> {
    let sig = engine.signature();
    let eval = engine.evaluator();
    let claim = claim.rename_variables(engine.counter());

    let requires = eval.evaluate(&claim.requires)?;
    let initial = ConstrainedTerm::new(
        eval.evaluate(&claim.lhs)?,
        Constraint::from_term(&requires).simplify(sig),
    );
    if !engine.store().is_feasible(sig, &initial.constraint)? {
        log::debug!("claim {} holds vacuously", claim.label);
        return Ok(vec![]);
    }
    let fixed: Vec<Variable> = initial.free_vars().into_iter().collect();

    let mut residuals = vec![];
    let mut work = vec![Branch {
        state: initial,
        narrowing: Substitution::new(),
        semantic_steps: 0,
        depth: 0,
    }];
    while let Some(branch) = work.pop() {
        if reaches_target(engine, &claim, &fixed, &branch.state, &branch.narrowing)? {
            continue;
        }
        if conf.max_depth.is_some_and(|md| branch.depth >= md) {
            log::debug!("depth limit reached at {}", branch.state);
            residuals.push(branch.state);
            continue;
        }

        if branch.semantic_steps > 0 {
            if let Some(state) = apply_claims(engine, claims, &branch.state)? {
                work.push(Branch {
                    state,
                    depth: branch.depth + 1,
                    ..branch
                });
                continue;
            }
        }

        let successors = engine.step(&branch.state, StepMode::Unify)?;
        if successors.is_empty() {
            log::debug!("stuck at {}", branch.state);
            residuals.push(branch.state);
            continue;
        }
        if let Some(rest) = engine.remainder(&branch.state, &successors)? {
            if !reaches_target(engine, &claim, &fixed, &rest, &branch.narrowing)? {
                log::debug!("no rule covers {rest}");
                residuals.push(rest);
            }
        }

        // depth-first, visiting successors in rule order
        for s in successors.into_iter().rev() {
            work.push(Branch {
                narrowing: branch.narrowing.compose(&s.narrowing),
                semantic_steps: branch.semantic_steps + 1,
                depth: branch.depth + 1,
                state: s.state,
            });
        }
    }
    Ok(residuals)
}

/// Rewrite `state` by the first claim that covers all of it: the claim's
/// left-hand side matches the state's term and the state's constraint
/// implies the claim's precondition.
fn apply_claims(
    engine: &StepEngine,
    claims: &[Rule],
    state: &ConstrainedTerm,
) -> Result<Option<ConstrainedTerm>, RewriteError> {
    let sig = engine.signature();
    let eval = engine.evaluator();
    for hypothesis in claims {
        let hypothesis = hypothesis.rename_variables(engine.counter());
        for theta in matches(&hypothesis.lhs, &state.term) {
            let requires = eval.evaluate(&theta.apply(&hypothesis.requires))?;
            let requires = Constraint::from_term(&requires);
            if !engine.store().implies(sig, &state.constraint, &requires)? {
                continue;
            }
            let term = eval.evaluate(&theta.apply(&hypothesis.rhs))?;
            let ensures = eval.evaluate(&theta.apply(&hypothesis.ensures))?;
            let constraint = state.constraint.conjoin(&ensures).simplify(sig);
            if constraint.is_false() {
                continue;
            }
            log::trace!("applied claim {} at {state}", hypothesis.label);
            let constraint = constraint.project(&term.free_vars());
            return Ok(Some(ConstrainedTerm::new(term, constraint)));
        }
    }
    Ok(None)
}

/// Whether `state` is an instance of the claim's right-hand side, with the
/// claim's variables bound as the branch instantiated them, whose constraint
/// implies the claim's postcondition.
///
/// Matching is tried first. Failing that, the right-hand side is unified with
/// the term, and whatever the unifier asks of the state's variables must
/// follow from its constraint.
fn reaches_target(
    engine: &StepEngine,
    claim: &Rule,
    fixed: &[Variable],
    state: &ConstrainedTerm,
    narrowing: &Substitution,
) -> Result<bool, RewriteError> {
    let sig = engine.signature();
    let eval = engine.evaluator();
    let store = engine.store();
    let seed: Substitution = fixed
        .iter()
        .map(|v| (v.clone(), narrowing.apply(&Term::Variable(v.clone()))))
        .collect();
    for theta in matches_with(&claim.rhs, &state.term, seed.clone()) {
        let ensures = eval.evaluate(&theta.apply(&claim.ensures))?;
        if store.implies(sig, &state.constraint, &Constraint::from_term(&ensures))? {
            return Ok(true);
        }
    }

    let target = seed.apply(&claim.rhs);
    let (ts, ss) = (target.sort(), state.term.sort());
    if !ts.accepts(&ss) && !ss.accepts(&ts) {
        return Ok(false);
    }
    let state_vars = state.free_vars();
    let unifier = Unifier::new(sig, engine.counter());
    for u in unifier.unify(&target, &state.term)? {
        let mut obligation = Constraint::top();
        for (v, t) in u.subst.iter().filter(|(v, _)| state_vars.contains(*v)) {
            obligation = obligation.conjoin_eq(&Term::Variable(v.clone()), t);
        }
        for (a, b) in &u.residual {
            obligation = obligation.conjoin_eq(&u.subst.apply(a), &u.subst.apply(b));
        }
        let ensures = eval.evaluate(&u.subst.apply(&seed.apply(&claim.ensures)))?;
        let obligation = obligation.conjoin(&ensures);
        if store.implies(sig, &state.constraint, &obligation)? {
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kterm::fresh::FreshCounter;
    use kterm::rule::{Definition, TRUSTED};
    use kterm::sorts::{labels, LabelDecl, Signature};
    use solver::ConstraintStore;

    use crate::conf::RewriteConf;

    fn cfg(t: Term) -> Term {
        Term::app("cfg", Sort::named("Cfg"), [t])
    }

    fn definition() -> Definition {
        let sig = Signature::with_builtins()
            .with(LabelDecl::constructor("cfg", &[Sort::Int], Sort::named("Cfg")))
            .unwrap();
        let x = Term::var("X", Sort::Int);
        let inc = Rule::new(
            "inc",
            cfg(x.clone()),
            cfg(sig.app(labels::INT_ADD, [x.clone(), Term::int(1)]).unwrap()),
        )
        .requires(sig.app(labels::INT_LT, [x, Term::int(10)]).unwrap())
        .with_attribute("transition");
        Definition::new(sig, vec![inc]).unwrap()
    }

    #[test]
    fn test_concrete_claims() {
        let _ = pretty_env_logger::try_init();
        let def = definition();
        let store = ConstraintStore::default();
        let counter = FreshCounter::new();
        let conf = RewriteConf::default();
        let engine = StepEngine::new(&def, &store, &counter, &conf);

        let good = Rule::new("good", cfg(Term::int(0)), cfg(Term::int(10)));
        let result = prove(&engine, &[good], &ProveConf::default()).unwrap();
        assert!(result.is_proved());
        assert!(result.residuals.is_empty());

        let bad = Rule::new("bad", cfg(Term::int(0)), cfg(Term::int(11)));
        let result = prove(&engine, &[bad], &ProveConf::default()).unwrap();
        assert_eq!(result.status, ProofStatus::NotProved);
        assert_eq!(result.residuals, vec![ConstrainedTerm::from_term(cfg(Term::int(10)))]);
    }

    #[test]
    fn test_depth_limit() {
        let def = definition();
        let store = ConstraintStore::default();
        let counter = FreshCounter::new();
        let conf = RewriteConf::default();
        let engine = StepEngine::new(&def, &store, &counter, &conf);

        let good = Rule::new("good", cfg(Term::int(0)), cfg(Term::int(10)));
        let result = prove(&engine, &[good], &ProveConf { max_depth: Some(3) }).unwrap();
        assert_eq!(result.residuals, vec![ConstrainedTerm::from_term(cfg(Term::int(3)))]);
    }

    #[test]
    fn test_claims_apply_only_when_implied() {
        let def = definition();
        let store = ConstraintStore::default();
        let counter = FreshCounter::new();
        let conf = RewriteConf::default();
        let engine = StepEngine::new(&def, &store, &counter, &conf);
        let sig = def.signature();
        let x = Term::var("X", Sort::Int);

        // the lemma fits some instances of cfg(X + 1) but not all of them
        let lemma = Rule::new("lemma", cfg(x.clone()), cfg(Term::int(42)))
            .requires(sig.app(labels::INT_EQ, [x.clone(), Term::int(3)]).unwrap())
            .with_attribute(TRUSTED);
        let main = Rule::new("main", cfg(x.clone()), cfg(Term::int(10)))
            .requires(sig.app(labels::INT_LE, [x, Term::int(10)]).unwrap());
        let result = prove(&engine, &[lemma, main], &ProveConf::default()).unwrap();
        assert!(result.is_proved(), "residuals: {:?}", result.residuals);
    }

    #[test]
    fn test_trusted_claims_are_assumed() {
        let def = definition();
        let store = ConstraintStore::default();
        let counter = FreshCounter::new();
        let conf = RewriteConf::default();
        let engine = StepEngine::new(&def, &store, &counter, &conf);

        let wrong =
            Rule::new("wrong", cfg(Term::int(0)), cfg(Term::int(20))).with_attribute(TRUSTED);
        let result = prove(&engine, &[wrong], &ProveConf::default()).unwrap();
        assert!(result.is_proved());
    }
}
