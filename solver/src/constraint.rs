// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! Conjunctions of side conditions attached to symbolic states.

use std::collections::VecDeque;
use std::fmt;

use itertools::Itertools;
use kterm::hashmap::HashSet;
use kterm::semantics::eval_builtins;
use kterm::sorts::{labels, Signature};
use kterm::subst::Substitution;
use kterm::syntax::*;
use serde::Serialize;

/// One conjunct of a [`Constraint`].
#[derive(PartialEq, Eq, Clone, Debug, Hash, Serialize)]
pub enum Atom {
    /// Two terms are equal
    Eq(Term, Term),
    /// A boolean term holds
    Holds(Term),
}

impl Atom {
    fn map(&self, f: impl Fn(&Term) -> Term) -> Atom {
        match self {
            Atom::Eq(a, b) => Atom::Eq(f(a), f(b)),
            Atom::Holds(t) => Atom::Holds(f(t)),
        }
    }

    /// The atom as a boolean term.
    pub fn as_term(&self) -> Term {
        match self {
            Atom::Eq(a, b) => Term::app(labels::K_EQ, Sort::Bool, [a, b]),
            Atom::Holds(t) => t.clone(),
        }
    }
}

/// A conjunction of atoms. The empty conjunction is `true`; a constraint
/// known to be contradictory drops its atoms and is `false`.
#[derive(PartialEq, Eq, Clone, Debug, Default, Hash, Serialize)]
pub struct Constraint {
    atoms: Vec<Atom>,
    contradiction: bool,
}

impl Constraint {
    /// The trivially true constraint.
    pub fn top() -> Self {
        Self::default()
    }

    /// The trivially false constraint.
    pub fn bottom() -> Self {
        Constraint {
            atoms: vec![],
            contradiction: true,
        }
    }

    /// The constraint requiring the boolean term `condition`.
    pub fn from_term(condition: &Term) -> Self {
        Self::top().conjoin(condition)
    }

    /// The conjuncts, in the order they were added.
    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    /// Whether this is syntactically `true`.
    pub fn is_true(&self) -> bool {
        !self.contradiction && self.atoms.is_empty()
    }

    /// Whether this is known to be `false`.
    pub fn is_false(&self) -> bool {
        self.contradiction
    }

    fn push(&mut self, atom: Atom) {
        if !self.contradiction && !self.atoms.contains(&atom) {
            self.atoms.push(atom);
        }
    }

    /// Conjoin a boolean term, splitting top-level conjunctions.
    pub fn conjoin(&self, condition: &Term) -> Constraint {
        let mut result = self.clone();
        let mut todo = vec![condition];
        while let Some(t) = todo.pop() {
            match t {
                Term::App { label, args, .. } if label == labels::BOOL_AND && args.len() == 2 => {
                    todo.push(&args[1]);
                    todo.push(&args[0]);
                }
                t if t.is_true() => (),
                t if t.is_false() => return Constraint::bottom(),
                t => result.push(Atom::Holds(t.clone())),
            }
        }
        result
    }

    /// Conjoin the equality `a = b`.
    pub fn conjoin_eq(&self, a: &Term, b: &Term) -> Constraint {
        let mut result = self.clone();
        if a != b {
            result.push(Atom::Eq(a.clone(), b.clone()));
        }
        result
    }

    /// Conjoin every atom of `other`.
    pub fn and(&self, other: &Constraint) -> Constraint {
        if other.contradiction {
            return Constraint::bottom();
        }
        let mut result = self.clone();
        for atom in &other.atoms {
            result.push(atom.clone());
        }
        result
    }

    /// The free variables of every atom, in order of first occurrence.
    pub fn free_vars(&self) -> HashSet<Variable> {
        let mut vars = HashSet::default();
        for atom in &self.atoms {
            match atom {
                Atom::Eq(a, b) => {
                    a.collect_vars(&mut vars);
                    b.collect_vars(&mut vars);
                }
                Atom::Holds(t) => t.collect_vars(&mut vars),
            }
        }
        vars
    }

    /// Apply a substitution to every atom.
    pub fn substitute(&self, subst: &Substitution) -> Constraint {
        if self.contradiction {
            return Constraint::bottom();
        }
        let mut result = Constraint::top();
        for atom in &self.atoms {
            result.push(atom.map(|t| subst.apply(t)));
        }
        result
    }

    /// Eliminate the variables outside `keep`. A variable defined by an
    /// equation is replaced by its definition; any other atom still
    /// mentioning an eliminated variable is dropped. The result is implied
    /// by `self`.
    pub fn project(&self, keep: &HashSet<Variable>) -> Constraint {
        if self.contradiction {
            return Constraint::bottom();
        }
        let mut atoms = self.atoms.clone();
        while let Some((i, v, t)) = atoms
            .iter()
            .enumerate()
            .find_map(|(i, atom)| eliminable(atom, keep).map(|(v, t)| (i, v, t)))
        {
            atoms.remove(i);
            let subst: Substitution = [(v, t)].into_iter().collect();
            atoms = atoms.iter().map(|atom| atom.map(|t| subst.apply(t))).collect();
        }
        let mut result = Constraint::top();
        for atom in atoms {
            let mut vars = HashSet::default();
            match &atom {
                Atom::Eq(a, b) => {
                    a.collect_vars(&mut vars);
                    b.collect_vars(&mut vars);
                }
                Atom::Holds(t) => t.collect_vars(&mut vars),
            }
            if vars.iter().all(|v| keep.contains(v)) {
                result.push(atom);
            }
        }
        result
    }

    /// The whole conjunction as one boolean term.
    pub fn as_term(&self) -> Term {
        if self.contradiction {
            return Term::false_();
        }
        self.atoms
            .iter()
            .map(Atom::as_term)
            .reduce(|a, b| Term::app(labels::BOOL_AND, Sort::Bool, [a, b]))
            .unwrap_or_else(Term::true_)
    }

    /// Solver-free simplification: evaluate builtins, drop tautologies, split
    /// conjunctions, detect equalities between distinct values, and propagate
    /// variables bound to values into the other atoms.
    pub fn simplify(&self, sig: &Signature) -> Constraint {
        let mut current = self.simplify_atoms(sig);
        let mut propagated: HashSet<Variable> = HashSet::default();
        loop {
            if current.contradiction {
                return Constraint::bottom();
            }
            let binding = current.atoms.iter().find_map(|atom| match atom {
                Atom::Eq(Term::Variable(v), t) if is_value(sig, t) && !propagated.contains(v) => {
                    Some((v.clone(), t.clone()))
                }
                _ => None,
            });
            let Some((v, value)) = binding else {
                return current;
            };
            propagated.insert(v.clone());
            let defining = Atom::Eq(Term::Variable(v.clone()), value.clone());
            let subst: Substitution = [(v, value)].into_iter().collect();
            let atoms = current
                .atoms
                .iter()
                .map(|atom| {
                    if *atom == defining {
                        atom.clone()
                    } else {
                        atom.map(|t| subst.apply(t))
                    }
                })
                .collect();
            current = Constraint {
                atoms,
                contradiction: false,
            }
            .simplify_atoms(sig);
        }
    }

    fn simplify_atoms(&self, sig: &Signature) -> Constraint {
        if self.contradiction {
            return Constraint::bottom();
        }
        let mut result = Constraint::top();
        let mut work: VecDeque<Atom> = self.atoms.iter().cloned().collect();
        while let Some(atom) = work.pop_front() {
            match atom {
                Atom::Holds(t) => {
                    let t = eval_builtins(sig, &t);
                    if t.is_true() {
                        continue;
                    }
                    if t.is_false() {
                        return Constraint::bottom();
                    }
                    if let Term::App { label, args, .. } = &t {
                        if label == labels::BOOL_AND && args.len() == 2 {
                            work.push_front(Atom::Holds(args[1].clone()));
                            work.push_front(Atom::Holds(args[0].clone()));
                            continue;
                        }
                    }
                    result.push(Atom::Holds(t));
                }
                Atom::Eq(a, b) => {
                    let (a, b) = (eval_builtins(sig, &a), eval_builtins(sig, &b));
                    if a == b {
                        continue;
                    }
                    match (a.as_bool(), b.as_bool()) {
                        (Some(true), _) => work.push_front(Atom::Holds(b)),
                        (_, Some(true)) => work.push_front(Atom::Holds(a)),
                        (Some(false), _) => work.push_front(Atom::Holds(negate(&b))),
                        (_, Some(false)) => work.push_front(Atom::Holds(negate(&a))),
                        _ if is_value(sig, &a) && is_value(sig, &b) => {
                            return Constraint::bottom()
                        }
                        _ if b.as_variable().is_some() && a.as_variable().is_none() => {
                            result.push(Atom::Eq(b, a))
                        }
                        _ => result.push(Atom::Eq(a, b)),
                    }
                }
            }
        }
        result
    }
}

/// `notBool_(t)`.
pub fn negate(t: &Term) -> Term {
    Term::app(labels::BOOL_NOT, Sort::Bool, [t])
}

/// `v = t` with `v` outside `keep` and not occurring in `t`.
fn eliminable(atom: &Atom, keep: &HashSet<Variable>) -> Option<(Variable, Term)> {
    let Atom::Eq(a, b) = atom else {
        return None;
    };
    [(a, b), (b, a)].into_iter().find_map(|(x, t)| {
        let v = x.as_variable()?;
        (!keep.contains(v) && !t.free_vars().contains(v)).then(|| (v.clone(), t.clone()))
    })
}

/// A ground term with no function applications, whose structure is its value.
fn is_value(sig: &Signature, t: &Term) -> bool {
    t.is_ground() && t.labels().into_iter().all(|l| !sig.is_function(l))
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Atom::Eq(a, b) => write!(f, "{a} == {b}"),
            Atom::Holds(t) => write!(f, "{t}"),
        }
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.contradiction {
            write!(f, "false")
        } else if self.atoms.is_empty() {
            write!(f, "true")
        } else {
            write!(f, "{}", self.atoms.iter().join(" /\\ "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lt(a: Term, b: Term) -> Term {
        Term::app(labels::INT_LT, Sort::Bool, [a, b])
    }

    fn x() -> Term {
        Term::var("X", Sort::Int)
    }

    #[test]
    fn test_conjoin_splits_and() {
        let both = Term::app(
            labels::BOOL_AND,
            Sort::Bool,
            [lt(x(), Term::int(3)), Term::true_()],
        );
        let c = Constraint::top().conjoin(&both);
        assert_eq!(c.atoms(), &[Atom::Holds(lt(x(), Term::int(3)))]);
        assert!(Constraint::top().conjoin(&Term::false_()).is_false());
        assert!(c.conjoin(&Term::true_()) == c);
    }

    #[test]
    fn test_simplify_ground() {
        let sig = Signature::with_builtins();
        let c = Constraint::from_term(&lt(Term::int(1), Term::int(2)));
        assert!(c.simplify(&sig).is_true());
        let c = Constraint::from_term(&lt(Term::int(2), Term::int(1)));
        assert!(c.simplify(&sig).is_false());
        let c = Constraint::top().conjoin_eq(&Term::string("a"), &Term::string("b"));
        assert!(c.simplify(&sig).is_false());
    }

    #[test]
    fn test_simplify_propagates_values() {
        let sig = Signature::with_builtins();
        let c = Constraint::top()
            .conjoin(&lt(x(), Term::int(10)))
            .conjoin_eq(&Term::int(12), &x());
        assert!(c.simplify(&sig).is_false());

        let c = Constraint::top()
            .conjoin(&lt(x(), Term::int(10)))
            .conjoin_eq(&x(), &Term::int(3));
        let s = c.simplify(&sig);
        assert_eq!(s.atoms(), &[Atom::Eq(x(), Term::int(3))]);
    }

    #[test]
    fn test_project() {
        let y = Term::var("Y", Sort::Int);
        let z = Term::var("Z", Sort::Int);
        let keep: HashSet<Variable> = [Variable::new("X", Sort::Int)].into_iter().collect();
        // Y = X + 1 /\ Y < 5 /\ Z < 3 keeps X + 1 < 5
        let c = Constraint::top()
            .conjoin_eq(
                &y,
                &Term::app(labels::INT_ADD, Sort::Int, [x(), Term::int(1)]),
            )
            .conjoin(&lt(y, Term::int(5)))
            .conjoin(&lt(z, Term::int(3)));
        let p = c.project(&keep);
        assert_eq!(
            p.atoms(),
            &[Atom::Holds(lt(
                Term::app(labels::INT_ADD, Sort::Int, [x(), Term::int(1)]),
                Term::int(5)
            ))]
        );
        assert!(p.free_vars().iter().all(|v| keep.contains(v)));
        assert!(Constraint::bottom().project(&keep).is_false());
    }

    #[test]
    fn test_display() {
        let c = Constraint::top()
            .conjoin(&lt(x(), Term::int(10)))
            .conjoin_eq(&x(), &Term::int(3));
        assert_eq!(c.to_string(), "_<Int_(X:Int, 10) /\\ X:Int == 3");
        assert_eq!(Constraint::bottom().to_string(), "false");
    }
}
