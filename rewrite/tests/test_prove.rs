// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

mod common;

use common::*;
use kterm::rule::{Rule, TRUSTED};
use kterm::sorts::labels;
use kterm::syntax::*;
use rewrite::*;

#[test]
fn closed_without_steps() {
    let _ = pretty_env_logger::try_init();
    let session = RewriteSession::new(counter_definition());
    let x = int_var("X");
    let claim = Rule::new("refl", cfg(x.clone()), cfg(x));
    let result = session.prove(&[claim], &ProveConf::default()).unwrap();
    assert_eq!(result.status, ProofStatus::Proved);
}

#[test]
fn symbolic_claim_by_circularity() {
    let session = RewriteSession::new(counter_definition());
    let x = int_var("X");
    let claim = Rule::new("count-up", cfg(x.clone()), cfg(Term::int(10)))
        .requires(cmp(labels::INT_LE, x, Term::int(10)));
    let result = session.prove(&[claim], &ProveConf::default()).unwrap();
    assert!(result.is_proved(), "residuals: {:?}", result.residuals);
}

#[test]
fn stuck_branch_is_a_counterexample() {
    let session = RewriteSession::new(counter_definition());
    let x = int_var("X");
    let claim = Rule::new("too-far", cfg(x.clone()), cfg(Term::int(10)))
        .requires(cmp(labels::INT_GT, x, Term::int(10)));
    let result = session.prove(&[claim], &ProveConf::default()).unwrap();
    assert_eq!(result.status, ProofStatus::NotProved);
    assert_eq!(result.residuals.len(), 1);
    insta::assert_display_snapshot!(result.residuals[0], @"cfg(X#0:Int) /\\ _>Int_(X#0:Int, 10)");
}

#[test]
fn trusted_claims_shorten_proofs() {
    let x = int_var("X");
    let lemma = Rule::new("lemma", cfg(x.clone()), cfg(Term::int(10)))
        .requires(cmp(labels::INT_LT, x, Term::int(10)))
        .with_attribute(TRUSTED);
    let main = Rule::new("main", cfg(Term::int(0)), cfg(Term::int(10)));
    let conf = ProveConf { max_depth: Some(3) };

    let session = RewriteSession::new(counter_definition());
    let without = session.prove(&[main.clone()], &conf).unwrap();
    assert_eq!(without.status, ProofStatus::NotProved);

    let with = session.prove(&[lemma, main], &conf).unwrap();
    assert_eq!(with.status, ProofStatus::Proved);
}

#[test]
fn uncovered_instances_are_counterexamples() {
    let session = RewriteSession::new(counter_definition());
    let x = int_var("X");
    // false for 10 < X <= 20, where cfg(X) is stuck
    let claim = Rule::new("overreach", cfg(x.clone()), cfg(Term::int(10)))
        .requires(cmp(labels::INT_LE, x, Term::int(20)));
    let result = session.prove(&[claim], &ProveConf::default()).unwrap();
    assert_eq!(result.status, ProofStatus::NotProved);
    assert_eq!(result.residuals.len(), 1);
    insta::assert_display_snapshot!(
        result.residuals[0],
        @"cfg(X#0:Int) /\\ _<=Int_(X#0:Int, 20) /\\ notBool_(_<Int_(X#0:Int, 10))"
    );
}
