// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

mod common;

use common::*;
use kterm::syntax::*;
use rewrite::*;

#[test]
fn search_determinism() {
    let mut expected_output: Option<String> = None;
    let num_iters = 5;
    for i in 0..num_iters {
        println!("search determinism iteration {i}");
        let session = RewriteSession::new(counter_definition());
        let found = session
            .search(
                &cfg(int_var("Y")),
                &Pattern::new(cfg(int_var("N"))),
                &SearchConf {
                    depth: Some(4),
                    ..SearchConf::default()
                },
            )
            .unwrap();
        let output = serde_json::to_string(&found).unwrap();
        match expected_output {
            Some(ref expected) => assert_eq!(expected, &output),
            None => expected_output = Some(output),
        }
    }
}

#[test]
fn execute_determinism() {
    let results: Vec<ExecuteResult> = (0..5)
        .map(|_| {
            RewriteSession::new(counter_definition())
                .execute(&cfg(Term::int(2)), None)
                .unwrap()
        })
        .collect();
    assert!(results.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(results[0].steps_taken, 8);
}
