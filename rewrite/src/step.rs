// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! Application of rules to constrained terms.
//!
//! A rule applies to a state in one of two ways. Matching holds the state's
//! variables fixed and is used for execution. Unification may also narrow the
//! state's variables, and is used for search and proofs: the narrowing is
//! applied to the successor and reported alongside it.

use kterm::fresh::FreshCounter;
use kterm::rule::{Definition, Rule};
use kterm::sorts::Signature;
use kterm::subst::Substitution;
use kterm::syntax::*;
use solver::constraint::negate;
use solver::{Constraint, ConstraintStore};
use unify::{matches, Unifier};

use crate::conf::RewriteConf;
use crate::error::RewriteError;
use crate::evaluate::Evaluator;
use crate::state::ConstrainedTerm;

/// How a rule's left-hand side is related to the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepMode {
    /// One-way matching; the state's variables are rigid
    Match,
    /// Unification; the state's variables may be instantiated
    Unify,
}

/// One way a rule can rewrite a state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Successor {
    #[allow(missing_docs)]
    pub state: ConstrainedTerm,
    /// Label of the rule that fired
    pub rule: String,
    /// Whether the rule counts as a step
    pub transition: bool,
    /// Instantiation of the rewritten state's variables. Always empty for
    /// [`StepMode::Match`].
    pub narrowing: Substitution,
    /// The instances of the rewritten state this successor covers, over the
    /// rewritten state's variables and the renamed rule's variables
    pub condition: Constraint,
}

/// Applies the rules of a definition within one session.
#[derive(Clone, Copy)]
pub struct StepEngine<'a> {
    def: &'a Definition,
    store: &'a ConstraintStore,
    counter: &'a FreshCounter,
    conf: &'a RewriteConf,
}

impl<'a> StepEngine<'a> {
    #[allow(missing_docs)]
    pub fn new(
        def: &'a Definition,
        store: &'a ConstraintStore,
        counter: &'a FreshCounter,
        conf: &'a RewriteConf,
    ) -> Self {
        StepEngine {
            def,
            store,
            counter,
            conf,
        }
    }

    #[allow(missing_docs)]
    pub fn signature(&self) -> &'a Signature {
        self.def.signature()
    }

    #[allow(missing_docs)]
    pub fn store(&self) -> &'a ConstraintStore {
        self.store
    }

    #[allow(missing_docs)]
    pub fn counter(&self) -> &'a FreshCounter {
        self.counter
    }

    #[allow(missing_docs)]
    pub fn conf(&self) -> &'a RewriteConf {
        self.conf
    }

    /// An evaluator for the definition's function rules.
    pub fn evaluator(&self) -> Evaluator<'a> {
        Evaluator::new(self.def, self.conf.max_function_depth)
    }

    /// Whether firing `rule` counts as a step.
    pub fn is_transition(&self, rule: &Rule) -> bool {
        self.conf.transition_tags.is_empty()
            || self.conf.transition_tags.iter().any(|t| rule.has_attribute(t))
    }

    /// Rules that may apply to `term`. A bare variable can be narrowed to
    /// any left-hand side, so in [`StepMode::Unify`] it gets every rule.
    fn candidates(
        &self,
        term: &Term,
        mode: StepMode,
    ) -> Box<dyn Iterator<Item = &'a Rule> + 'a> {
        let def: &'a Definition = self.def;
        if mode == StepMode::Unify && term.as_variable().is_some() {
            Box::new(def.rules().iter())
        } else {
            Box::new(def.candidates(term))
        }
    }

    /// Every successor of `state` under every candidate rule, in definition
    /// order.
    pub fn step(
        &self,
        state: &ConstrainedTerm,
        mode: StepMode,
    ) -> Result<Vec<Successor>, RewriteError> {
        let mut successors = vec![];
        for rule in self.candidates(&state.term, mode) {
            successors.extend(self.apply_rule(rule, state, mode, usize::MAX)?);
        }
        Ok(successors)
    }

    /// The first successor of `state` under the candidate rules selected by
    /// `filter`, trying rules in definition order.
    pub fn first(
        &self,
        state: &ConstrainedTerm,
        mode: StepMode,
        filter: impl Fn(&Rule) -> bool,
    ) -> Result<Option<Successor>, RewriteError> {
        for rule in self.candidates(&state.term, mode).filter(|&r| filter(r)) {
            if let Some(s) = self.apply_rule(rule, state, mode, 1)?.pop() {
                return Ok(Some(s));
            }
        }
        Ok(None)
    }

    /// Up to `limit` successors of `state` under `rule`, which need not belong
    /// to the definition (proofs apply claims this way). In
    /// [`StepMode::Unify`] the rule is renamed apart first.
    pub fn apply_rule(
        &self,
        rule: &Rule,
        state: &ConstrainedTerm,
        mode: StepMode,
        limit: usize,
    ) -> Result<Vec<Successor>, RewriteError> {
        let mut out = vec![];
        match mode {
            StepMode::Match => {
                for theta in matches(&rule.lhs, &state.term) {
                    let narrowing = Substitution::new();
                    self.finish(rule, state, theta, &[], narrowing, limit, &mut out)?;
                    if out.len() >= limit {
                        break;
                    }
                }
            }
            StepMode::Unify => {
                let (ls, ss) = (rule.lhs.sort(), state.term.sort());
                if !ls.accepts(&ss) && !ss.accepts(&ls) {
                    return Ok(out);
                }
                let rule = rule.rename_variables(self.counter);
                let state_vars = state.free_vars();
                let unifier = Unifier::new(self.signature(), self.counter);
                for u in unifier.unify(&rule.lhs, &state.term)? {
                    let narrowing = u.subst.restrict(|v| state_vars.contains(v));
                    let (theta, residual) = (u.subst, &u.residual);
                    self.finish(&rule, state, theta, residual, narrowing, limit, &mut out)?;
                    if out.len() >= limit {
                        break;
                    }
                }
            }
        }
        if !out.is_empty() {
            log::trace!("{} fired {} time(s) on {}", rule.label, out.len(), state.term);
        }
        Ok(out)
    }

    #[allow(clippy::too_many_arguments)]
    fn finish(
        &self,
        rule: &Rule,
        state: &ConstrainedTerm,
        theta: Substitution,
        residual: &[(Term, Term)],
        narrowing: Substitution,
        limit: usize,
        out: &mut Vec<Successor>,
    ) -> Result<(), RewriteError> {
        let sig = self.signature();
        let eval = self.evaluator();
        for mut theta in eval.lookups(rule, theta)? {
            let mut guard = Constraint::top();
            for (a, b) in residual {
                guard = guard.conjoin_eq(&theta.apply(a), &theta.apply(b));
            }
            let requires = eval.evaluate(&theta.apply(&rule.requires))?;
            let guard = guard.conjoin(&requires);
            let constraint = state.constraint.substitute(&narrowing).and(&guard);
            if !self.store.is_feasible(sig, &constraint)? {
                continue;
            }
            let condition = narrowing
                .iter()
                .fold(Constraint::top(), |c, (v, t)| {
                    c.conjoin_eq(&Term::Variable(v.clone()), t)
                })
                .and(&guard);

            for v in &rule.fresh_constants {
                theta.insert(v.clone(), self.counter.fresh_constant(&v.sort));
            }
            for v in &rule.fresh_variables {
                theta.insert(v.clone(), Term::Variable(self.counter.fresh_variable(v)));
            }
            let term = eval.evaluate(&theta.apply(&rule.rhs))?;
            let ensures = eval.evaluate(&theta.apply(&rule.ensures))?;
            let constraint = constraint.conjoin(&ensures).simplify(sig);
            if constraint.is_false() {
                continue;
            }
            // variables that left the term must not linger in its constraint
            let constraint = constraint.project(&term.free_vars());

            out.push(Successor {
                state: ConstrainedTerm::new(term, constraint),
                rule: rule.label.clone(),
                transition: self.is_transition(rule),
                narrowing: narrowing.clone(),
                condition,
            });
            if out.len() >= limit {
                break;
            }
        }
        Ok(())
    }

    /// The instances of `state` covered by none of `successors`, which must
    /// be all of its successors. These are stuck. Returns `None` when the
    /// successors cover every instance.
    pub fn remainder(
        &self,
        state: &ConstrainedTerm,
        successors: &[Successor],
    ) -> Result<Option<ConstrainedTerm>, RewriteError> {
        let sig = self.signature();
        let mut constraint = state.constraint.clone();
        for s in successors {
            if s.condition.is_true() {
                return Ok(None);
            }
            constraint = constraint.conjoin(&negate(&s.condition.as_term()));
        }
        // a condition with variables of its rule only ever over-approximates
        // the remainder, and so does projecting them away afterwards
        if !self.store.is_feasible(sig, &constraint)? {
            return Ok(None);
        }
        let constraint = constraint.simplify(sig).project(&state.term.free_vars());
        Ok(Some(ConstrainedTerm::new(state.term.clone(), constraint)))
    }
}
