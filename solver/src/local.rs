// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! An in-process decision procedure for the constraints the rewriter produces
//! most often.
//!
//! It decides ground constraints by evaluating builtins, and refutes
//! conjunctions of integer bounds and disequalities on single variables
//! (`X +Int 1 <=Int 10`, `X =/=Int 3`).
//! Anything else is answered with [`SatResp::Unknown`].

use num_bigint::BigInt;

use kterm::hashmap::HashMap;
use kterm::sorts::{labels, Signature};
use kterm::syntax::*;

use crate::basics::{BasicSolver, SatResp, SolverError};
use crate::constraint::{Atom, Constraint};

/// Decides constraints using only the builtin hooks.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalSolver;

impl BasicSolver for LocalSolver {
    fn check_sat(&self, sig: &Signature, constraint: &Constraint) -> Result<SatResp, SolverError> {
        let c = constraint.simplify(sig);
        if c.is_false() {
            return Ok(SatResp::Unsat);
        }
        if c.is_true() {
            return Ok(SatResp::Sat);
        }
        let mut bounds = Bounds::default();
        for atom in c.atoms() {
            bounds.add(atom);
        }
        if bounds.is_empty_range() {
            return Ok(SatResp::Unsat);
        }
        Ok(SatResp::Unknown(format!(
            "{} atoms not decidable locally",
            c.atoms().len()
        )))
    }
}

/// Inclusive integer intervals per variable, minus excluded points.
#[derive(Default)]
struct Bounds {
    lower: HashMap<Variable, BigInt>,
    upper: HashMap<Variable, BigInt>,
    excluded: HashMap<Variable, Vec<BigInt>>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Cmp {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

impl Cmp {
    fn from_label(label: &str) -> Option<Cmp> {
        match label {
            labels::INT_LT => Some(Cmp::Lt),
            labels::INT_LE => Some(Cmp::Le),
            labels::INT_GT => Some(Cmp::Gt),
            labels::INT_GE => Some(Cmp::Ge),
            labels::INT_EQ | labels::K_EQ => Some(Cmp::Eq),
            labels::INT_NE | labels::K_NE => Some(Cmp::Ne),
            _ => None,
        }
    }

    /// `a op b` iff `b flip(op) a`
    fn flip(self) -> Cmp {
        match self {
            Cmp::Lt => Cmp::Gt,
            Cmp::Le => Cmp::Ge,
            Cmp::Gt => Cmp::Lt,
            Cmp::Ge => Cmp::Le,
            Cmp::Eq => Cmp::Eq,
            Cmp::Ne => Cmp::Ne,
        }
    }

    /// `not (a op b)` iff `a negate(op) b`
    fn negate(self) -> Cmp {
        match self {
            Cmp::Lt => Cmp::Ge,
            Cmp::Le => Cmp::Gt,
            Cmp::Gt => Cmp::Le,
            Cmp::Ge => Cmp::Lt,
            Cmp::Eq => Cmp::Ne,
            Cmp::Ne => Cmp::Eq,
        }
    }
}

fn int_var(t: &Term) -> Option<Variable> {
    t.as_variable().filter(|v| v.sort == Sort::Int).cloned()
}

/// `X`, `X +Int c`, `c +Int X` or `X -Int c`, as `(X, offset)`.
fn linear(t: &Term) -> Option<(Variable, BigInt)> {
    if let Some(v) = int_var(t) {
        return Some((v, BigInt::from(0)));
    }
    match t {
        Term::App { label, args, .. } => match (label.as_str(), args.as_slice()) {
            (labels::INT_ADD, [a, b]) => match (int_var(a), int_var(b)) {
                (Some(v), None) => Some((v, b.as_int()?)),
                (None, Some(v)) => Some((v, a.as_int()?)),
                _ => None,
            },
            (labels::INT_SUB, [a, b]) => Some((int_var(a)?, -b.as_int()?)),
            _ => None,
        },
        _ => None,
    }
}

impl Bounds {
    fn add(&mut self, atom: &Atom) {
        match atom {
            Atom::Eq(a, b) => self.compare(Cmp::Eq, a, b),
            Atom::Holds(Term::App { label, args, .. }) if label == labels::BOOL_NOT => {
                if let [Term::App { label, args, .. }] = args.as_slice() {
                    if let (Some(op), [a, b]) = (
                        Cmp::from_label(label).map(Cmp::negate),
                        args.as_slice(),
                    ) {
                        self.compare(op, a, b);
                    }
                }
            }
            Atom::Holds(Term::App { label, args, .. }) => {
                if let (Some(op), [a, b]) = (Cmp::from_label(label), args.as_slice()) {
                    self.compare(op, a, b);
                }
            }
            Atom::Holds(_) => (),
        }
    }

    fn compare(&mut self, op: Cmp, a: &Term, b: &Term) {
        let (op, (v, offset), constant) = match (linear(a), b.as_int(), linear(b), a.as_int()) {
            (Some(l), Some(c), _, _) => (op, l, c),
            (_, _, Some(l), Some(c)) => (op.flip(), l, c),
            _ => return,
        };
        // v + offset op constant
        let bound = constant - offset;
        let one = BigInt::from(1);
        match op {
            Cmp::Lt => self.tighten_upper(v, bound - one),
            Cmp::Le => self.tighten_upper(v, bound),
            Cmp::Gt => self.tighten_lower(v, bound + one),
            Cmp::Ge => self.tighten_lower(v, bound),
            Cmp::Eq => {
                self.tighten_upper(v.clone(), bound.clone());
                self.tighten_lower(v, bound);
            }
            Cmp::Ne => self.excluded.entry(v).or_default().push(bound),
        }
    }

    fn tighten_upper(&mut self, v: Variable, bound: BigInt) {
        let entry = self.upper.entry(v).or_insert_with(|| bound.clone());
        if bound < *entry {
            *entry = bound;
        }
    }

    fn tighten_lower(&mut self, v: Variable, bound: BigInt) {
        let entry = self.lower.entry(v).or_insert_with(|| bound.clone());
        if bound > *entry {
            *entry = bound;
        }
    }

    fn is_empty_range(&self) -> bool {
        self.lower.iter().any(|(v, lo)| {
            let Some(hi) = self.upper.get(v) else {
                return false;
            };
            let (mut lo, mut hi) = (lo.clone(), hi.clone());
            if let Some(excluded) = self.excluded.get(v) {
                // excluded points only matter at the ends of the interval
                while lo <= hi && excluded.contains(&lo) {
                    lo += 1u32;
                }
                while lo <= hi && excluded.contains(&hi) {
                    hi -= 1u32;
                }
            }
            lo > hi
        })
    }
}
