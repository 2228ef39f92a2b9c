// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! Simultaneous substitution of variables by terms.

use std::fmt::Display;

use itertools::Itertools;
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::hashmap::HashMap;
use crate::syntax::*;

/// A map from variables to terms, applied simultaneously: the bound terms are
/// never themselves substituted into, so a binding cannot capture another.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Substitution {
    bindings: HashMap<Variable, Term>,
}

impl Substitution {
    /// The empty substitution.
    pub fn new() -> Self {
        Self::default()
    }

    /// The term bound to `v`, if any.
    pub fn get(&self, v: &Variable) -> Option<&Term> {
        self.bindings.get(v)
    }

    /// Whether `v` is in the domain.
    pub fn contains(&self, v: &Variable) -> bool {
        self.bindings.contains_key(v)
    }

    /// Bind `v` to `t`, returning the previous binding.
    pub fn insert(&mut self, v: Variable, t: Term) -> Option<Term> {
        self.bindings.insert(v, t)
    }

    /// Number of bindings.
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Whether there are no bindings.
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// The bindings, in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&Variable, &Term)> {
        self.bindings.iter()
    }

    /// Apply the substitution to `term`. Collections are renormalized, so a
    /// frame bound to a collection is spliced into its parent.
    pub fn apply(&self, term: &Term) -> Term {
        if self.is_empty() {
            return term.clone();
        }
        match term {
            Term::Variable(v) => match self.bindings.get(v) {
                Some(t) => t.clone(),
                None => term.clone(),
            },
            Term::Token { .. } => term.clone(),
            Term::App { label, sort, args } => Term::App {
                label: label.clone(),
                sort: sort.clone(),
                args: args.iter().map(|a| self.apply(a)).collect(),
            },
            Term::Collection(c) => Collection::normalized(
                c.kind,
                c.entries.iter().map(|e| e.map(|t| self.apply(t))).collect(),
                c.frame.as_deref().map(|f| self.apply(f)),
            ),
        }
    }

    /// The substitution equivalent to applying `self` and then `other`.
    pub fn compose(&self, other: &Substitution) -> Substitution {
        let mut bindings: HashMap<Variable, Term> = self
            .bindings
            .iter()
            .map(|(v, t)| (v.clone(), other.apply(t)))
            .collect();
        for (v, t) in &other.bindings {
            if !bindings.contains_key(v) {
                bindings.insert(v.clone(), t.clone());
            }
        }
        Substitution { bindings }
    }

    /// Keep only the bindings of variables satisfying `keep`.
    pub fn restrict(&self, mut keep: impl FnMut(&Variable) -> bool) -> Substitution {
        self.bindings
            .iter()
            .filter(|(v, _)| keep(v))
            .map(|(v, t)| (v.clone(), t.clone()))
            .collect()
    }

    /// Whether every binding maps a variable to a distinct variable of the
    /// same sort.
    pub fn is_renaming(&self) -> bool {
        self.bindings
            .iter()
            .all(|(v, t)| matches!(t, Term::Variable(w) if w.sort == v.sort))
            && self.bindings.values().all_unique()
    }
}

impl FromIterator<(Variable, Term)> for Substitution {
    fn from_iter<T: IntoIterator<Item = (Variable, Term)>>(iter: T) -> Self {
        Substitution {
            bindings: iter.into_iter().collect(),
        }
    }
}

impl Display for Substitution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{{{}}}",
            self.bindings
                .iter()
                .map(|(v, t)| format!("{v} |-> {t}"))
                .join(", ")
        )
    }
}

/// Serialized as a map from printed variables to terms.
impl Serialize for Substitution {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.bindings.len()))?;
        for (v, t) in &self.bindings {
            map.serialize_entry(&v.to_string(), t)?;
        }
        map.end()
    }
}
