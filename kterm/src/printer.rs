// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! Plain-text rendering of terms, used in log messages and test snapshots.
//!
//! This is not a concrete syntax: it cannot be parsed back, and it makes no
//! attempt at mixfix notation.

use std::fmt;

use itertools::Itertools;

use crate::syntax::*;

impl fmt::Display for Sort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Sort::K => "K",
            Sort::Bool => "Bool",
            Sort::Int => "Int",
            Sort::String => "String",
            Sort::Map => "Map",
            Sort::Set => "Set",
            Sort::List => "List",
            Sort::Bag => "Bag",
            Sort::Named(name) => name,
        };
        write!(f, "{s}")
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.sort)
    }
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Entry::Element(t) => write!(f, "{t}"),
            Entry::Binding(k, v) => write!(f, "{k} |-> {v}"),
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (open, close) = match self.kind {
            CollectionKind::List => ("[", "]"),
            _ => ("{", "}"),
        };
        let entries = self.entries.iter().join(", ");
        let frame = match (&self.frame, self.entries.is_empty()) {
            (None, _) => String::new(),
            (Some(frame), true) => format!("| {frame}"),
            (Some(frame), false) => format!(" | {frame}"),
        };
        write!(f, "{}{open}{entries}{frame}{close}", self.kind.sort())
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Variable(v) => write!(f, "{v}"),
            Term::Token {
                sort: Sort::String,
                value,
            } => write!(f, "{value:?}"),
            Term::Token { sort: Sort::Int | Sort::Bool, value } => write!(f, "{value}"),
            Term::Token { sort, value } => write!(f, "{value}:{sort}"),
            Term::App { label, args, .. } if args.is_empty() => write!(f, "{label}"),
            Term::App { label, args, .. } => write!(f, "{label}({})", args.iter().join(", ")),
            Term::Collection(c) => write!(f, "{c}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_print_terms() {
        let t = Term::app(
            "cfg",
            Sort::named("Cfg"),
            [
                Term::int(-3),
                Term::var("X", Sort::Int),
                Term::string("a\"b"),
                Term::token(Sort::named("Id"), "x"),
                Term::app("nil", Sort::named("Exp"), Vec::<Term>::new()),
            ],
        );
        insta::assert_snapshot!(t, @r###"cfg(-3, X:Int, "a\"b", x:Id, nil)"###);
    }

    #[test]
    fn test_print_collections() {
        let m = Term::collection(
            CollectionKind::Map,
            vec![
                Entry::Binding(Term::int(2), Term::bool(true)),
                Entry::Binding(Term::int(1), Term::bool(false)),
            ],
            Some(Term::var("M", Sort::Map)),
        );
        insta::assert_snapshot!(m, @"Map{1 |-> false, 2 |-> true | M:Map}");

        let l = Term::collection(
            CollectionKind::List,
            vec![Entry::Element(Term::int(2)), Entry::Element(Term::int(1))],
            None,
        );
        insta::assert_snapshot!(l, @"List[2, 1]");

        insta::assert_snapshot!(Collection::empty(CollectionKind::Set), @"Set{}");
    }
}
