// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! Syntactic unification modulo associative-commutative collections.
//!
//! This is Robinson's algorithm with an occurs check, extended in two ways.
//! Equations that involve applications of function labels cannot be decided
//! syntactically, so they are returned as residual equalities for the
//! constraint store instead of failing. Collections are unified by
//! enumerating partial pairings of their entries; when both sides have a
//! frame, a fresh frame variable from the session counter stands for the
//! entries the two sides share beyond the explicit ones.

use std::collections::VecDeque;
use std::fmt;

use kterm::fresh::FreshCounter;
use kterm::hashmap::HashSet;
use kterm::sorts::{Signature, SortError};
use kterm::subst::Substitution;
use kterm::syntax::*;

use crate::collections::{
    cancel_ground, entry_goals, injections, pairing_key, rebuild, remaining,
};

/// One unifier: a substitution and the equalities it could not solve.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Unification {
    #[allow(missing_docs)]
    pub subst: Substitution,
    /// Equalities between terms headed by function labels, to be decided by
    /// the constraint store
    pub residual: Vec<(Term, Term)>,
}

/// Unification in the context of a signature and a session counter.
#[derive(Clone)]
pub struct Unifier<'a> {
    sig: &'a Signature,
    counter: FreshCounter,
}

impl<'a> Unifier<'a> {
    #[allow(missing_docs)]
    pub fn new(sig: &'a Signature, counter: &FreshCounter) -> Self {
        Unifier {
            sig,
            counter: counter.clone(),
        }
    }

    /// Lazily enumerate the unifiers of `a` and `b`. Terms whose sorts are
    /// incompatible are rejected with an error.
    pub fn unify(&self, a: &Term, b: &Term) -> Result<Unifiers<'a>, SortError> {
        let (sa, sb) = (a.sort(), b.sort());
        if !sa.accepts(&sb) && !sb.accepts(&sa) {
            return Err(SortError::SortMismatch {
                expected: sa,
                found: sb,
                context: "unification".to_string(),
            });
        }
        Ok(Unifiers {
            sig: self.sig,
            counter: self.counter.clone(),
            stack: vec![Task::Run(State {
                subst: Substitution::new(),
                goals: VecDeque::from([(a.clone(), b.clone())]),
                deferred: VecDeque::new(),
                residual: vec![],
            })],
        })
    }
}

/// The lazy sequence of unifiers.
pub struct Unifiers<'a> {
    sig: &'a Signature,
    counter: FreshCounter,
    stack: Vec<Task>,
}

impl fmt::Debug for Unifiers<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unifiers({} pending)", self.stack.len())
    }
}

enum Task {
    Run(State),
    Choose(Choice),
}

#[derive(Clone)]
struct State {
    subst: Substitution,
    goals: VecDeque<(Term, Term)>,
    deferred: VecDeque<(Term, Term)>,
    residual: Vec<(Term, Term)>,
}

enum Outcome {
    Done(Unification),
    Failed,
    Branch(Choice),
}

/// A choice point over the pairings of two unordered collections.
struct Choice {
    base: State,
    kind: CollectionKind,
    left: Vec<Entry>,
    right: Vec<Entry>,
    left_frame: Option<Term>,
    right_frame: Option<Term>,
    pairings: Box<dyn Iterator<Item = (Vec<usize>, Vec<usize>)>>,
    /// pairings already produced, up to exchanging equal entries
    tried: HashSet<Vec<(Entry, Entry)>>,
}

impl Iterator for Unifiers<'_> {
    type Item = Unification;

    fn next(&mut self) -> Option<Unification> {
        while let Some(task) = self.stack.pop() {
            match task {
                Task::Run(state) => match state.run(self.sig) {
                    Outcome::Done(u) => return Some(u),
                    Outcome::Failed => (),
                    Outcome::Branch(choice) => self.stack.push(Task::Choose(choice)),
                },
                Task::Choose(mut choice) => {
                    if let Some(state) = choice.next_state(&self.counter) {
                        self.stack.push(Task::Choose(choice));
                        if let Some(state) = state {
                            self.stack.push(Task::Run(state));
                        }
                    }
                }
            }
        }
        None
    }
}

fn is_interpreted(sig: &Signature, t: &Term) -> bool {
    t.label().is_some_and(|l| sig.is_function(l))
}

impl State {
    fn run(mut self, sig: &Signature) -> Outcome {
        loop {
            while let Some((a, b)) = self.goals.pop_front() {
                if !self.step(sig, a, b) {
                    return Outcome::Failed;
                }
            }
            let Some((a, b)) = self.deferred.pop_front() else {
                let subst = self.subst;
                let residual = self
                    .residual
                    .iter()
                    .map(|(a, b)| (subst.apply(a), subst.apply(b)))
                    .filter(|(a, b)| a != b)
                    .collect();
                return Outcome::Done(Unification { subst, residual });
            };
            match (self.subst.apply(&a), self.subst.apply(&b)) {
                (Term::Collection(c1), Term::Collection(c2)) if c1.kind == c2.kind => {
                    match self.expand(c1, c2) {
                        Expansion::Failed => return Outcome::Failed,
                        Expansion::Continue => (),
                        Expansion::Branch(choice) => return Outcome::Branch(choice),
                    }
                }
                // a frame was bound in the meantime and changed the shape
                (a, b) => self.goals.push_back((a, b)),
            }
        }
    }

    fn step(&mut self, sig: &Signature, a: Term, b: Term) -> bool {
        let (a, b) = (self.subst.apply(&a), self.subst.apply(&b));
        if a == b {
            return true;
        }
        match (a, b) {
            (Term::Variable(v), t) => self.bind(sig, v, t),
            (t, Term::Variable(v)) => self.bind(sig, v, t),
            (a, b) if is_interpreted(sig, &a) || is_interpreted(sig, &b) => {
                self.residual.push((a, b));
                true
            }
            (
                Term::App {
                    label: l1,
                    args: args1,
                    ..
                },
                Term::App {
                    label: l2,
                    args: args2,
                    ..
                },
            ) => {
                if l1 != l2 || args1.len() != args2.len() {
                    return false;
                }
                self.goals.extend(args1.into_iter().zip(args2));
                true
            }
            (Term::Collection(c1), Term::Collection(c2)) if c1.kind == c2.kind => {
                self.deferred
                    .push_back((Term::Collection(c1), Term::Collection(c2)));
                true
            }
            _ => false,
        }
    }

    fn bind(&mut self, sig: &Signature, v: Variable, t: Term) -> bool {
        if !v.sort.accepts(&t.sort()) {
            return match t {
                Term::Variable(w) if w.sort.accepts(&v.sort) => {
                    self.bind(sig, w, Term::Variable(v))
                }
                _ => false,
            };
        }
        if t.contains_var(&v) {
            if is_interpreted(sig, &t) {
                self.residual.push((Term::Variable(v), t));
                return true;
            }
            return false;
        }
        let single: Substitution = [(v, t)].into_iter().collect();
        self.subst = self.subst.compose(&single);
        true
    }

    fn expand(&mut self, c1: Collection, c2: Collection) -> Expansion {
        let kind = c1.kind;
        let f1 = c1.frame.map(|f| *f);
        let f2 = c2.frame.map(|f| *f);

        if kind.is_ordered() {
            let common = c1.entries.len().min(c2.entries.len());
            for (x, y) in c1.entries.iter().zip(&c2.entries) {
                match entry_goals(x, y) {
                    Some(goals) => self.goals.extend(goals),
                    None => return Expansion::Failed,
                }
            }
            let rest1 = c1.entries[common..].to_vec();
            let rest2 = c2.entries[common..].to_vec();
            let goal = match (f1, f2) {
                (f1, Some(f2)) if !rest1.is_empty() => (f2, rebuild(kind, rest1, f1)),
                (Some(f1), f2) if !rest2.is_empty() => (f1, rebuild(kind, rest2, f2)),
                _ if !rest1.is_empty() || !rest2.is_empty() => return Expansion::Failed,
                (None, None) => return Expansion::Continue,
                (Some(f1), None) => (f1, Collection::empty(kind)),
                (None, Some(f2)) => (Collection::empty(kind), f2),
                (Some(f1), Some(f2)) => (f1, f2),
            };
            self.goals.push_back(goal);
            return Expansion::Continue;
        }

        let Some(cancelled) = cancel_ground(&c1.entries, &c2.entries, false) else {
            return Expansion::Failed;
        };
        self.goals.extend(cancelled.goals);
        let (n, m) = (cancelled.left.len(), cancelled.right.len());
        let pairings: Box<dyn Iterator<Item = _>> = match (&f1, &f2) {
            (None, None) if n != m => return Expansion::Failed,
            (None, None) if n == 0 => return Expansion::Continue,
            (None, None) => Box::new(injections(n, m, n, n)),
            // every entry of the side without a frame must be paired
            (Some(_), None) if n > m => return Expansion::Failed,
            (Some(_), None) => Box::new(injections(n, m, n, n)),
            (None, Some(_)) if m > n => return Expansion::Failed,
            (None, Some(_)) => Box::new(injections(n, m, m, m)),
            (Some(f1), Some(f2)) if n == 0 && m == 0 => {
                self.goals.push_back((f1.clone(), f2.clone()));
                return Expansion::Continue;
            }
            (Some(_), Some(_)) => Box::new(injections(n, m, n.min(m), 0)),
        };
        Expansion::Branch(Choice {
            base: self.clone(),
            kind,
            left: cancelled.left,
            right: cancelled.right,
            left_frame: f1,
            right_frame: f2,
            pairings,
            tried: HashSet::default(),
        })
    }
}

enum Expansion {
    Failed,
    Continue,
    Branch(Choice),
}

impl Choice {
    fn next_state(&mut self, counter: &FreshCounter) -> Option<Option<State>> {
        let (chosen_left, chosen_right) = self.pairings.next()?;
        let key = pairing_key(
            chosen_left
                .iter()
                .zip(&chosen_right)
                .map(|(&i, &j)| (&self.left[i], &self.right[j])),
        );
        if !self.tried.insert(key) {
            return Some(None);
        }
        let mut state = self.base.clone();
        for (&i, &j) in chosen_left.iter().zip(&chosen_right) {
            match entry_goals(&self.left[i], &self.right[j]) {
                Some(goals) => state.goals.extend(goals),
                None => return Some(None),
            }
        }
        let rest_left = remaining(&self.left, &chosen_left);
        let rest_right = remaining(&self.right, &chosen_right);
        match (&self.left_frame, &self.right_frame) {
            (None, None) => (),
            (Some(f1), None) => state
                .goals
                .push_back((f1.clone(), rebuild(self.kind, rest_right, None))),
            (None, Some(f2)) => state
                .goals
                .push_back((f2.clone(), rebuild(self.kind, rest_left, None))),
            (Some(f1), Some(f2)) => {
                let shared = Term::Variable(
                    counter.fresh_variable(&Variable::new("Rest", self.kind.sort())),
                );
                state.goals.push_back((
                    f1.clone(),
                    rebuild(self.kind, rest_right, Some(shared.clone())),
                ));
                state
                    .goals
                    .push_back((f2.clone(), rebuild(self.kind, rest_left, Some(shared))));
            }
        }
        Some(Some(state))
    }
}
