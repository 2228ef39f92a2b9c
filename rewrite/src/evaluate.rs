// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! Evaluation of function applications and of rule lookups.
//!
//! Functions are evaluated innermost first. An application whose label has a
//! builtin hook is computed natively when the hook can decide it; otherwise
//! the first function rule (in definition order) that matches and whose
//! precondition evaluates to `true` rewrites it. A matching rule whose
//! precondition is undecided blocks the later rules, so an application with
//! symbolic arguments is left in place rather than rewritten by a fallback.

use kterm::rule::{Definition, Lookup, Rule};
use kterm::semantics::apply_hook;
use kterm::subst::Substitution;
use kterm::syntax::*;
use unify::{matches, matches_with};

use crate::error::RewriteError;

/// Evaluates terms against the function rules of a definition.
#[derive(Clone, Copy)]
pub struct Evaluator<'a> {
    def: &'a Definition,
    max_depth: usize,
}

impl<'a> Evaluator<'a> {
    /// `max_depth` bounds how deeply function rules may nest.
    pub fn new(def: &'a Definition, max_depth: usize) -> Self {
        Evaluator { def, max_depth }
    }

    /// Reduce every reducible function application in `term`.
    pub fn evaluate(&self, term: &Term) -> Result<Term, RewriteError> {
        self.eval(term, 0)
    }

    /// Extend `theta` by each lookup of `rule` in turn. A lookup whose pattern
    /// matches its value in several ways multiplies the results; one that does
    /// not match drops the candidate.
    pub fn lookups(
        &self,
        rule: &Rule,
        theta: Substitution,
    ) -> Result<Vec<Substitution>, RewriteError> {
        self.lookups_at(&rule.lookups, theta, 0)
    }

    fn lookups_at(
        &self,
        lookups: &[Lookup],
        theta: Substitution,
        depth: usize,
    ) -> Result<Vec<Substitution>, RewriteError> {
        let mut current = vec![theta];
        for lookup in lookups {
            let mut next = vec![];
            for theta in current {
                let value = self.eval(&theta.apply(&lookup.expr), depth)?;
                next.extend(matches_with(&lookup.pattern, &value, theta));
            }
            if next.is_empty() {
                return Ok(next);
            }
            current = next;
        }
        Ok(current)
    }

    fn eval(&self, term: &Term, depth: usize) -> Result<Term, RewriteError> {
        match term {
            Term::Variable(_) | Term::Token { .. } => Ok(term.clone()),
            Term::Collection(c) => {
                let entries = c
                    .entries
                    .iter()
                    .map(|e| match e {
                        Entry::Element(t) => Ok(Entry::Element(self.eval(t, depth)?)),
                        Entry::Binding(k, v) => {
                            Ok(Entry::Binding(self.eval(k, depth)?, self.eval(v, depth)?))
                        }
                    })
                    .collect::<Result<Vec<_>, RewriteError>>()?;
                let frame = match &c.frame {
                    Some(f) => Some(self.eval(f, depth)?),
                    None => None,
                };
                Ok(Collection::normalized(c.kind, entries, frame))
            }
            Term::App { label, sort, args } => {
                let args = args
                    .iter()
                    .map(|a| self.eval(a, depth))
                    .collect::<Result<Vec<_>, _>>()?;
                let sig = self.def.signature();
                if let Some(value) = sig.hook(label).and_then(|hook| apply_hook(hook, &args)) {
                    return Ok(value);
                }
                let app = Term::App {
                    label: label.clone(),
                    sort: sort.clone(),
                    args,
                };
                if !sig.is_function(label) {
                    return Ok(app);
                }
                self.apply_function(label, app, depth)
            }
        }
    }

    fn apply_function(&self, label: &str, app: Term, depth: usize) -> Result<Term, RewriteError> {
        let rules = self.def.function_rules(label);
        if rules.is_empty() {
            return Ok(app);
        }
        if depth >= self.max_depth {
            return Err(RewriteError::FunctionDepthExceeded {
                label: label.to_string(),
                depth,
            });
        }
        for rule in rules {
            for theta in matches(&rule.lhs, &app) {
                for theta in self.lookups_at(&rule.lookups, theta, depth + 1)? {
                    let requires = self.eval(&theta.apply(&rule.requires), depth + 1)?;
                    if requires.is_true() {
                        log::trace!("function rule {} applies to {app}", rule.label);
                        return self.eval(&theta.apply(&rule.rhs), depth + 1);
                    }
                    if !requires.is_false() {
                        return Ok(app);
                    }
                }
            }
        }
        Ok(app)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kterm::sorts::{labels, LabelDecl, Signature};

    fn definition() -> Definition {
        let sig = Signature::with_builtins()
            .with(LabelDecl::function("double", &[Sort::Int], Sort::Int))
            .and_then(|s| s.with(LabelDecl::function("loop", &[Sort::Int], Sort::Int)))
            .and_then(|s| s.with(LabelDecl::function("sign", &[Sort::Int], Sort::Int)))
            .unwrap();
        let x = Term::var("X", Sort::Int);
        let rules = vec![
            Rule::new(
                "double",
                sig.app("double", [x.clone()]).unwrap(),
                sig.app(labels::INT_ADD, [x.clone(), x.clone()]).unwrap(),
            ),
            Rule::new(
                "loop",
                sig.app("loop", [x.clone()]).unwrap(),
                sig.app("loop", [x.clone()]).unwrap(),
            ),
            Rule::new("sign-neg", sig.app("sign", [x.clone()]).unwrap(), Term::int(-1))
                .requires(sig.app(labels::INT_LT, [x.clone(), Term::int(0)]).unwrap()),
            Rule::new("sign-pos", sig.app("sign", [x.clone()]).unwrap(), Term::int(1)),
        ];
        Definition::new(sig, rules).unwrap()
    }

    #[test]
    fn test_function_rules() {
        let def = definition();
        let eval = Evaluator::new(&def, 64);
        let sig = def.signature();

        let t = sig
            .app("double", [sig.app("double", [Term::int(3)]).unwrap()])
            .unwrap();
        assert_eq!(eval.evaluate(&t), Ok(Term::int(12)));

        let neg = sig.app("sign", [Term::int(-5)]).unwrap();
        assert_eq!(eval.evaluate(&neg), Ok(Term::int(-1)));
        let pos = sig.app("sign", [Term::int(5)]).unwrap();
        assert_eq!(eval.evaluate(&pos), Ok(Term::int(1)));
    }

    #[test]
    fn test_symbolic_arguments_stay() {
        let def = definition();
        let eval = Evaluator::new(&def, 64);
        let sig = def.signature();
        let y = Term::var("Y", Sort::Int);
        // the first rule's condition is undecided, so the second is not tried
        let t = sig.app("sign", [y.clone()]).unwrap();
        assert_eq!(eval.evaluate(&t), Ok(t.clone()));

        let sum = sig.app(labels::INT_ADD, [y, Term::int(1)]).unwrap();
        assert_eq!(eval.evaluate(&sum), Ok(sum.clone()));
    }

    #[test]
    fn test_depth_limit() {
        let def = definition();
        let eval = Evaluator::new(&def, 16);
        let t = def.signature().app("loop", [Term::int(0)]).unwrap();
        assert_eq!(
            eval.evaluate(&t),
            Err(RewriteError::FunctionDepthExceeded {
                label: "loop".to_string(),
                depth: 16
            })
        );
    }

    #[test]
    fn test_lookups() {
        let def = definition();
        let eval = Evaluator::new(&def, 64);
        let sig = def.signature();
        let m = Term::var("M", Sort::Map);
        let v = Term::var("V", Sort::Int);
        let k = Term::var("K", Sort::Int);
        let rule = Rule::new("read", k.clone(), v.clone())
            .lookup(v.clone(), sig.app(labels::MAP_LOOKUP, [m.clone(), k.clone()]).unwrap());
        let store = sig
            .collection(
                CollectionKind::Map,
                vec![
                    Entry::Binding(Term::int(1), Term::int(10)),
                    Entry::Binding(Term::int(2), Term::int(20)),
                ],
                None,
            )
            .unwrap();
        let theta: Substitution = [
            (Variable::new("M", Sort::Map), store),
            (Variable::new("K", Sort::Int), Term::int(2)),
        ]
        .into_iter()
        .collect();
        let results = eval.lookups(&rule, theta).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].get(&Variable::new("V", Sort::Int)), Some(&Term::int(20)));
    }
}
