// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

#![allow(dead_code)]

use std::sync::Arc;

use kterm::rule::{Definition, Rule, TRANSITION};
use kterm::sorts::{labels, LabelDecl, Signature};
use kterm::syntax::*;

pub fn cfg(t: Term) -> Term {
    Term::app("cfg", Sort::named("Cfg"), [t])
}

pub fn int_var(name: &str) -> Term {
    Term::var(name, Sort::Int)
}

pub fn int_op(label: &str, a: Term, b: Term) -> Term {
    Term::app(label, Sort::Int, [a, b])
}

pub fn cmp(label: &str, a: Term, b: Term) -> Term {
    Term::app(label, Sort::Bool, [a, b])
}

pub fn counter_signature() -> Signature {
    Signature::with_builtins()
        .with(LabelDecl::constructor("cfg", &[Sort::Int], Sort::named("Cfg")))
        .unwrap()
}

/// `cfg(X) => cfg(X +Int 1) requires X <Int 10`
pub fn inc_rule() -> Rule {
    let x = int_var("X");
    Rule::new("inc", cfg(x.clone()), cfg(int_op(labels::INT_ADD, x.clone(), Term::int(1))))
        .requires(cmp(labels::INT_LT, x, Term::int(10)))
        .with_attribute(TRANSITION)
}

pub fn counter_definition() -> Arc<Definition> {
    Arc::new(Definition::new(counter_signature(), vec![inc_rule()]).unwrap())
}
