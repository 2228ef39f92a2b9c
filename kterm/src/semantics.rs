// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! Native implementations of the builtin hooked functions.
//!
//! A hook is only applied when its arguments are sufficiently concrete; in all
//! other cases (symbolic arguments, division by zero, ill-typed tokens) the
//! application is left as it is and remains symbolic.

use num_bigint::BigInt;
use sha2::{Digest, Sha256};

use crate::sorts::Signature;
use crate::syntax::*;

/// Apply the builtin named `hook` to `args`, returning `None` if the result
/// cannot be determined.
pub fn apply_hook(hook: &str, args: &[Term]) -> Option<Term> {
    match hook.split_once('.')? {
        ("INT", op) => int_hook(op, args),
        ("BOOL", op) => bool_hook(op, args),
        ("STRING", op) => string_hook(op, args),
        ("K", op) => k_hook(op, args),
        ("MAP", op) => map_hook(op, args),
        ("SET", op) => set_hook(op, args),
        ("LIST", "size") => match args {
            [t] => closed(t, CollectionKind::List).map(|c| Term::int(c.entries.len())),
            _ => None,
        },
        ("HASH", "sha256") => match args {
            [t] => {
                let digest = Sha256::digest(t.as_str()?.as_bytes());
                let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
                Some(Term::string(&hex))
            }
            _ => None,
        },
        _ => None,
    }
}

fn int_hook(op: &str, args: &[Term]) -> Option<Term> {
    let zero = BigInt::from(0);
    match args {
        [a] => {
            let a = a.as_int()?;
            match op {
                "abs" => Some(Term::int(if a < zero { -a } else { a })),
                _ => None,
            }
        }
        [a, b] => {
            let (a, b) = (a.as_int()?, b.as_int()?);
            match op {
                "add" => Some(Term::int(a + b)),
                "sub" => Some(Term::int(a - b)),
                "mul" => Some(Term::int(a * b)),
                "div" if b != zero => Some(Term::int(a / b)),
                "mod" if b != zero => Some(Term::int(a % b)),
                "min" => Some(Term::int(a.min(b))),
                "max" => Some(Term::int(a.max(b))),
                "lt" => Some(Term::bool(a < b)),
                "le" => Some(Term::bool(a <= b)),
                "gt" => Some(Term::bool(a > b)),
                "ge" => Some(Term::bool(a >= b)),
                "eq" => Some(Term::bool(a == b)),
                "ne" => Some(Term::bool(a != b)),
                _ => None,
            }
        }
        _ => None,
    }
}

/// Boolean connectives also simplify when only one side is known.
fn bool_hook(op: &str, args: &[Term]) -> Option<Term> {
    match (op, args) {
        ("not", [a]) => Some(Term::bool(!a.as_bool()?)),
        ("and", [a, b]) => match (a.as_bool(), b.as_bool()) {
            (Some(false), _) | (_, Some(false)) => Some(Term::false_()),
            (Some(true), _) => Some(b.clone()),
            (_, Some(true)) => Some(a.clone()),
            _ => None,
        },
        ("or", [a, b]) => match (a.as_bool(), b.as_bool()) {
            (Some(true), _) | (_, Some(true)) => Some(Term::true_()),
            (Some(false), _) => Some(b.clone()),
            (_, Some(false)) => Some(a.clone()),
            _ => None,
        },
        ("implies", [a, b]) => match (a.as_bool(), b.as_bool()) {
            (Some(false), _) | (_, Some(true)) => Some(Term::true_()),
            (Some(true), _) => Some(b.clone()),
            _ => None,
        },
        ("xor", [a, b]) => Some(Term::bool(a.as_bool()? != b.as_bool()?)),
        ("eq", [a, b]) => Some(Term::bool(a.as_bool()? == b.as_bool()?)),
        _ => None,
    }
}

fn string_hook(op: &str, args: &[Term]) -> Option<Term> {
    match (op, args) {
        ("concat", [a, b]) => Some(Term::string(&format!("{}{}", a.as_str()?, b.as_str()?))),
        ("length", [a]) => Some(Term::int(a.as_str()?.chars().count())),
        ("eq", [a, b]) => Some(Term::bool(a.as_str()? == b.as_str()?)),
        _ => None,
    }
}

/// Structural equality, decided only for ground terms.
fn k_hook(op: &str, args: &[Term]) -> Option<Term> {
    match (op, args) {
        ("eq", [a, b]) if a.is_ground() && b.is_ground() => Some(Term::bool(a == b)),
        ("ne", [a, b]) if a.is_ground() && b.is_ground() => Some(Term::bool(a != b)),
        _ => None,
    }
}

fn map_hook(op: &str, args: &[Term]) -> Option<Term> {
    match (op, args) {
        ("lookup", [m, k]) => {
            let m = collection(m, CollectionKind::Map)?;
            find_key(m, k)?.map(|i| match &m.entries[i] {
                Entry::Binding(_, v) => v.clone(),
                Entry::Element(e) => e.clone(),
            })
        }
        ("update", [m, k, v]) => {
            let m = collection(m, CollectionKind::Map)?;
            let mut entries = m.entries.clone();
            if let Some(i) = find_key(m, k)? {
                entries.remove(i);
            } else if m.frame.is_some() {
                return None;
            }
            entries.push(Entry::Binding(k.clone(), v.clone()));
            Some(rebuild(m, entries))
        }
        ("remove", [m, k]) => {
            let m = collection(m, CollectionKind::Map)?;
            let mut entries = m.entries.clone();
            match find_key(m, k)? {
                Some(i) => {
                    entries.remove(i);
                }
                None if m.frame.is_some() => return None,
                None => (),
            }
            Some(rebuild(m, entries))
        }
        ("in_keys", [k, m]) => {
            let m = collection(m, CollectionKind::Map)?;
            match find_key(m, k)? {
                Some(_) => Some(Term::true_()),
                None if m.frame.is_none() => Some(Term::false_()),
                None => None,
            }
        }
        ("size", [m]) => closed(m, CollectionKind::Map).map(|c| Term::int(c.entries.len())),
        _ => None,
    }
}

fn set_hook(op: &str, args: &[Term]) -> Option<Term> {
    match (op, args) {
        ("in", [e, s]) => {
            let s = collection(s, CollectionKind::Set)?;
            match find_key(s, e)? {
                Some(_) => Some(Term::true_()),
                None if s.frame.is_none() => Some(Term::false_()),
                None => None,
            }
        }
        ("size", [s]) => closed(s, CollectionKind::Set).map(|c| Term::int(c.entries.len())),
        _ => None,
    }
}

fn collection(t: &Term, kind: CollectionKind) -> Option<&Collection> {
    match t {
        Term::Collection(c) if c.kind == kind => Some(c),
        _ => None,
    }
}

/// A collection with no frame whose entries are all ground.
fn closed(t: &Term, kind: CollectionKind) -> Option<&Collection> {
    collection(t, kind).filter(|c| {
        c.frame.is_none() && c.entries.iter().all(|e| e.terms().all(Term::is_ground))
    })
}

/// Position of the entry whose key is `key`. The outer `None` means the
/// answer is unknown because `key` or some entry key is symbolic.
fn find_key(c: &Collection, key: &Term) -> Option<Option<usize>> {
    if !key.is_ground() {
        return None;
    }
    if let Some(i) = c.entries.iter().position(|e| e.key() == key) {
        return Some(Some(i));
    }
    if c.entries.iter().all(|e| e.key().is_ground()) {
        Some(None)
    } else {
        None
    }
}

fn rebuild(c: &Collection, entries: Vec<Entry>) -> Term {
    Collection::normalized(c.kind, entries, c.frame.as_deref().cloned())
}

/// Bottom-up evaluation of every hooked application in `term`.
pub fn eval_builtins(sig: &Signature, term: &Term) -> Term {
    match term {
        Term::Variable(_) | Term::Token { .. } => term.clone(),
        Term::App { label, sort, args } => {
            let args: Vec<Term> = args.iter().map(|a| eval_builtins(sig, a)).collect();
            if let Some(value) = sig.hook(label).and_then(|hook| apply_hook(hook, &args)) {
                return value;
            }
            Term::App {
                label: label.clone(),
                sort: sort.clone(),
                args,
            }
        }
        Term::Collection(c) => Collection::normalized(
            c.kind,
            c.entries
                .iter()
                .map(|e| e.map(|t| eval_builtins(sig, t)))
                .collect(),
            c.frame.as_deref().map(|f| eval_builtins(sig, f)),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sorts::labels;

    #[test]
    fn test_int_hooks() {
        let sig = Signature::with_builtins();
        let t = sig
            .app(
                labels::INT_ADD,
                [
                    sig.app(labels::INT_MUL, [Term::int(6), Term::int(7)]).unwrap(),
                    Term::int(-2),
                ],
            )
            .unwrap();
        assert_eq!(eval_builtins(&sig, &t), Term::int(40));

        assert_eq!(
            apply_hook("INT.div", &[Term::int(-7), Term::int(2)]),
            Some(Term::int(-3))
        );
        assert_eq!(
            apply_hook("INT.mod", &[Term::int(-7), Term::int(2)]),
            Some(Term::int(-1))
        );
        assert_eq!(apply_hook("INT.div", &[Term::int(1), Term::int(0)]), None);
        assert_eq!(
            apply_hook("INT.lt", &[Term::int(1), Term::var("X", Sort::Int)]),
            None
        );
    }

    #[test]
    fn test_bool_partial_evaluation() {
        let x = Term::var("B", Sort::Bool);
        assert_eq!(apply_hook("BOOL.and", &[Term::true_(), x.clone()]), Some(x.clone()));
        assert_eq!(
            apply_hook("BOOL.and", &[x.clone(), Term::false_()]),
            Some(Term::false_())
        );
        assert_eq!(apply_hook("BOOL.or", &[x.clone(), Term::false_()]), Some(x.clone()));
        assert_eq!(apply_hook("BOOL.implies", &[Term::false_(), x]), Some(Term::true_()));
    }

    #[test]
    fn test_map_hooks() {
        let m = Term::collection(
            CollectionKind::Map,
            vec![
                Entry::Binding(Term::string("a"), Term::int(1)),
                Entry::Binding(Term::string("b"), Term::int(2)),
            ],
            None,
        );
        assert_eq!(
            apply_hook("MAP.lookup", &[m.clone(), Term::string("b")]),
            Some(Term::int(2))
        );
        assert_eq!(apply_hook("MAP.lookup", &[m.clone(), Term::string("c")]), None);
        assert_eq!(
            apply_hook("MAP.in_keys", &[Term::string("c"), m.clone()]),
            Some(Term::false_())
        );
        let updated = apply_hook("MAP.update", &[m.clone(), Term::string("a"), Term::int(5)]);
        assert_eq!(
            updated.and_then(|m| apply_hook("MAP.lookup", &[m, Term::string("a")])),
            Some(Term::int(5))
        );
        assert_eq!(apply_hook("MAP.size", &[m]), Some(Term::int(2)));

        // a frame may hide the key
        let open = Term::collection(
            CollectionKind::Map,
            vec![Entry::Binding(Term::string("a"), Term::int(1))],
            Some(Term::var("M", Sort::Map)),
        );
        assert_eq!(apply_hook("MAP.in_keys", &[Term::string("c"), open]), None);
    }

    #[test]
    fn test_sha256() {
        assert_eq!(
            apply_hook("HASH.sha256", &[Term::string("")]),
            Some(Term::string(
                "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
            ))
        );
    }
}
