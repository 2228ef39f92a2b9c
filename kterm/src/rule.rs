// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! Rewrite rules and compiled definitions.

use std::collections::BTreeMap;

use itertools::Itertools;
use serde::Serialize;

use crate::fresh::FreshCounter;
use crate::hashmap::{HashMap, HashSet};
use crate::sorts::{Signature, SortError};
use crate::subst::Substitution;
use crate::syntax::*;

/// Attribute marking a claim that is assumed rather than proved.
pub const TRUSTED: &str = "trusted";
/// Default attribute marking a rule whose firing counts as a step.
pub const TRANSITION: &str = "transition";

/// A side condition evaluated while a rule is being applied: `expr` is
/// evaluated under the current bindings and `pattern` is matched against the
/// result, extending the bindings.
#[derive(PartialEq, Eq, Clone, Debug, Hash, Serialize)]
pub struct Lookup {
    #[allow(missing_docs)]
    pub pattern: Term,
    #[allow(missing_docs)]
    pub expr: Term,
}

/// A conditional rewrite rule `lhs => rhs requires requires ensures ensures`.
/// Reachability claims use the same representation.
#[derive(PartialEq, Eq, Clone, Debug, Serialize)]
pub struct Rule {
    /// Name used in logs and results
    pub label: String,
    #[allow(missing_docs)]
    pub lhs: Term,
    #[allow(missing_docs)]
    pub rhs: Term,
    /// Must be feasible together with the current constraint for the rule to fire
    pub requires: Term,
    /// Conjoined to the constraint of the successor
    pub ensures: Term,
    /// Variables replaced by fresh concrete values each time the rule fires
    pub fresh_constants: Vec<Variable>,
    /// Variables replaced by fresh symbolic variables each time the rule fires
    pub fresh_variables: Vec<Variable>,
    /// Side conditions, evaluated in order
    pub lookups: Vec<Lookup>,
    #[allow(missing_docs)]
    pub attributes: BTreeMap<String, String>,
}

impl Rule {
    /// An unconditional rule with no attributes.
    pub fn new(label: &str, lhs: Term, rhs: Term) -> Self {
        Rule {
            label: label.to_string(),
            lhs,
            rhs,
            requires: Term::true_(),
            ensures: Term::true_(),
            fresh_constants: vec![],
            fresh_variables: vec![],
            lookups: vec![],
            attributes: BTreeMap::new(),
        }
    }

    /// Set the precondition.
    pub fn requires(mut self, requires: Term) -> Self {
        self.requires = requires;
        self
    }

    /// Set the postcondition.
    pub fn ensures(mut self, ensures: Term) -> Self {
        self.ensures = ensures;
        self
    }

    /// Add a lookup after the existing ones.
    pub fn lookup(mut self, pattern: Term, expr: Term) -> Self {
        self.lookups.push(Lookup { pattern, expr });
        self
    }

    /// Declare a fresh-constant variable.
    pub fn fresh_constant(mut self, v: Variable) -> Self {
        self.fresh_constants.push(v);
        self
    }

    /// Declare a fresh symbolic variable.
    pub fn fresh_variable(mut self, v: Variable) -> Self {
        self.fresh_variables.push(v);
        self
    }

    /// Add a valueless attribute.
    pub fn with_attribute(self, key: &str) -> Self {
        self.attribute(key, "")
    }

    /// Add an attribute with a value.
    pub fn attribute(mut self, key: &str, value: &str) -> Self {
        self.attributes.insert(key.to_string(), value.to_string());
        self
    }

    /// Whether the rule carries the attribute `key`.
    pub fn has_attribute(&self, key: &str) -> bool {
        self.attributes.contains_key(key)
    }

    /// Whether the rule is a trusted claim.
    pub fn is_trusted(&self) -> bool {
        self.has_attribute(TRUSTED)
    }

    /// Every variable of the rule, in order of first occurrence.
    pub fn variables(&self) -> HashSet<Variable> {
        let mut vars = HashSet::default();
        self.lhs.collect_vars(&mut vars);
        for l in &self.lookups {
            l.expr.collect_vars(&mut vars);
            l.pattern.collect_vars(&mut vars);
        }
        self.requires.collect_vars(&mut vars);
        self.rhs.collect_vars(&mut vars);
        self.ensures.collect_vars(&mut vars);
        vars.extend(self.fresh_constants.iter().cloned());
        vars.extend(self.fresh_variables.iter().cloned());
        vars
    }

    /// Apply `subst` to every part of the rule. Declared fresh variables must
    /// be mapped to variables; other images are ignored for them.
    pub fn substitute(&self, subst: &Substitution) -> Rule {
        let rename = |vs: &[Variable]| -> Vec<Variable> {
            vs.iter()
                .map(|v| match subst.get(v) {
                    Some(Term::Variable(w)) => w.clone(),
                    _ => v.clone(),
                })
                .collect()
        };
        Rule {
            label: self.label.clone(),
            lhs: subst.apply(&self.lhs),
            rhs: subst.apply(&self.rhs),
            requires: subst.apply(&self.requires),
            ensures: subst.apply(&self.ensures),
            fresh_constants: rename(&self.fresh_constants),
            fresh_variables: rename(&self.fresh_variables),
            lookups: self
                .lookups
                .iter()
                .map(|l| Lookup {
                    pattern: subst.apply(&l.pattern),
                    expr: subst.apply(&l.expr),
                })
                .collect(),
            attributes: self.attributes.clone(),
        }
    }

    /// A copy of the rule whose variables are all fresh in the session.
    pub fn rename_variables(&self, counter: &FreshCounter) -> Rule {
        let renaming: Substitution = self
            .variables()
            .into_iter()
            .map(|v| {
                let w = counter.fresh_variable(&v);
                (v, Term::Variable(w))
            })
            .collect();
        self.substitute(&renaming)
    }
}

/// A compiled set of rules together with the signature they are written in.
///
/// Semantic rules are indexed by the outermost label of their left-hand side;
/// rules whose left-hand side is headed by a function label are kept apart as
/// function rules, used only to evaluate function applications.
#[derive(Clone, Debug)]
pub struct Definition {
    signature: Signature,
    rules: Vec<Rule>,
    index: HashMap<String, Vec<usize>>,
    unindexed: Vec<usize>,
    functions: HashMap<String, Vec<Rule>>,
}

impl Definition {
    /// Sort check the rules and build the indices.
    pub fn new(signature: Signature, all_rules: Vec<Rule>) -> Result<Self, SortError> {
        let mut rules = vec![];
        let mut index: HashMap<String, Vec<usize>> = HashMap::default();
        let mut unindexed = vec![];
        let mut functions: HashMap<String, Vec<Rule>> = HashMap::default();

        for rule in all_rules {
            check_rule(&signature, &rule)?;
            match rule.lhs.label() {
                Some(label) if signature.is_function(label) => {
                    functions.entry(label.to_string()).or_default().push(rule);
                }
                Some(label) => {
                    index.entry(label.to_string()).or_default().push(rules.len());
                    rules.push(rule);
                }
                None => {
                    unindexed.push(rules.len());
                    rules.push(rule);
                }
            }
        }

        Ok(Definition {
            signature,
            rules,
            index,
            unindexed,
            functions,
        })
    }

    /// The signature the rules are written in.
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// All semantic rules, in definition order.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// The semantic rules that may apply to `term`, in definition order:
    /// rules indexed under its outermost label plus rules with an unlabeled
    /// left-hand side.
    pub fn candidates<'a>(&'a self, term: &Term) -> impl Iterator<Item = &'a Rule> + 'a {
        let indexed: &[usize] = term
            .label()
            .and_then(|l| self.index.get(l))
            .map(Vec::as_slice)
            .unwrap_or_default();
        indexed
            .iter()
            .merge(self.unindexed.iter())
            .map(move |&i| &self.rules[i])
    }

    /// The function rules defining `label`, in definition order.
    pub fn function_rules(&self, label: &str) -> &[Rule] {
        self.functions
            .get(label)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

fn check_rule(sig: &Signature, rule: &Rule) -> Result<(), SortError> {
    for t in [&rule.lhs, &rule.rhs, &rule.requires, &rule.ensures] {
        sig.check(t)?;
    }
    for l in &rule.lookups {
        sig.check(&l.pattern)?;
        sig.check(&l.expr)?;
    }
    let lhs_sort = rule.lhs.sort();
    let rhs_sort = rule.rhs.sort();
    if !lhs_sort.accepts(&rhs_sort) {
        return Err(SortError::SortMismatch {
            expected: lhs_sort,
            found: rhs_sort,
            context: rule.label.clone(),
        });
    }
    for condition in [&rule.requires, &rule.ensures] {
        if condition.sort() != Sort::Bool {
            return Err(SortError::SortMismatch {
                expected: Sort::Bool,
                found: condition.sort(),
                context: rule.label.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sorts::{labels, LabelDecl};

    fn sig() -> Signature {
        Signature::with_builtins()
            .with(LabelDecl::constructor("a", &[], Sort::named("S")))
            .and_then(|s| s.with(LabelDecl::constructor("b", &[], Sort::named("S"))))
            .and_then(|s| s.with(LabelDecl::function("f", &[Sort::Int], Sort::Int)))
            .unwrap()
    }

    fn a() -> Term {
        Term::app("a", Sort::named("S"), Vec::<Term>::new())
    }

    fn b() -> Term {
        Term::app("b", Sort::named("S"), Vec::<Term>::new())
    }

    #[test]
    fn test_candidates_in_definition_order() {
        let x = Term::var("X", Sort::named("S"));
        let def = Definition::new(
            sig(),
            vec![
                Rule::new("r0", a(), b()),
                Rule::new("r1", x.clone(), a()),
                Rule::new("r2", b(), a()),
                Rule::new("r3", a(), a()),
                Rule::new(
                    "f0",
                    Term::app("f", Sort::Int, [Term::var("N", Sort::Int)]),
                    Term::int(0),
                ),
            ],
        )
        .unwrap();
        let labels: Vec<&str> = def.candidates(&a()).map(|r| r.label.as_str()).collect();
        assert_eq!(labels, vec!["r0", "r1", "r3"]);
        assert_eq!(def.function_rules("f").len(), 1);
        assert_eq!(def.rules().len(), 4);
    }

    #[test]
    fn test_bad_requires() {
        let rule = Rule::new("r", a(), b()).requires(Term::int(1));
        assert!(matches!(
            Definition::new(sig(), vec![rule]),
            Err(SortError::SortMismatch { .. })
        ));
    }

    #[test]
    fn test_rename_variables() {
        let sig = sig();
        let x = Variable::new("X", Sort::Int);
        let rule = Rule::new(
            "r",
            Term::Variable(x.clone()),
            sig.app(labels::INT_ADD, [Term::Variable(x.clone()), Term::int(1)])
                .unwrap(),
        )
        .fresh_variable(Variable::new("Y", Sort::Int));
        let counter = FreshCounter::new();
        let renamed = rule.rename_variables(&counter);
        assert_eq!(renamed.lhs, Term::var("X#0", Sort::Int));
        assert_eq!(renamed.fresh_variables, vec![Variable::new("Y#1", Sort::Int)]);
        assert!(renamed.variables().iter().all(|v| !rule.variables().contains(v)));
    }
}
