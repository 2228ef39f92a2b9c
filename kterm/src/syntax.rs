// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! The term AST manipulated by the rewriter.
//!
//! Terms are immutable values compared structurally. Associative-commutative
//! collections are kept in a canonical form (entries sorted, sets deduplicated,
//! nested frames spliced) so that structural equality coincides with equality
//! modulo AC for ground collections.

use itertools::Itertools;
use num_bigint::BigInt;
use serde::Serialize;

use crate::hashmap::HashSet;

/// A Sort classifies terms. The builtin sorts are understood natively by the
/// hooks in [`crate::semantics`]; any other sort is a named, uninterpreted sort
/// coming from a [`crate::sorts::Signature`].
#[derive(PartialEq, Eq, Clone, Debug, Hash, Serialize, PartialOrd, Ord)]
pub enum Sort {
    /// The top sort, which accepts a term of any sort
    K,
    /// Boolean sort
    Bool,
    /// Arbitrary-precision integers
    Int,
    /// Strings
    String,
    /// Sort of [`CollectionKind::Map`] collections
    Map,
    /// Sort of [`CollectionKind::Set`] collections
    Set,
    /// Sort of [`CollectionKind::List`] collections
    List,
    /// Sort of [`CollectionKind::Bag`] collections
    Bag,
    /// Uninterpreted sort identified by its name
    Named(String),
}

impl Sort {
    /// Smart constructor for a named sort that takes &str
    pub fn named(name: &str) -> Self {
        Self::Named(name.to_string())
    }

    /// Whether a term of sort `other` may appear where `self` is expected.
    pub fn accepts(&self, other: &Sort) -> bool {
        self == other || *self == Sort::K
    }

    /// The collection kind whose terms have this sort, if any.
    pub fn collection_kind(&self) -> Option<CollectionKind> {
        match self {
            Sort::Map => Some(CollectionKind::Map),
            Sort::Set => Some(CollectionKind::Set),
            Sort::List => Some(CollectionKind::List),
            Sort::Bag => Some(CollectionKind::Bag),
            _ => None,
        }
    }
}

impl From<&str> for Sort {
    /// Builtin sort names map to the builtin variants, anything else is named.
    fn from(value: &str) -> Self {
        match value {
            "K" => Sort::K,
            "Bool" => Sort::Bool,
            "Int" => Sort::Int,
            "String" => Sort::String,
            "Map" => Sort::Map,
            "Set" => Sort::Set,
            "List" => Sort::List,
            "Bag" => Sort::Bag,
            _ => Sort::named(value),
        }
    }
}

impl From<&Sort> for Sort {
    fn from(value: &Self) -> Self {
        value.clone()
    }
}

/// The kinds of builtin collections.
#[allow(missing_docs)]
#[derive(PartialEq, Eq, Clone, Copy, Debug, Hash, Serialize, PartialOrd, Ord)]
pub enum CollectionKind {
    Map,
    Set,
    List,
    Bag,
}

impl CollectionKind {
    /// The sort of collections of this kind.
    pub fn sort(self) -> Sort {
        match self {
            CollectionKind::Map => Sort::Map,
            CollectionKind::Set => Sort::Set,
            CollectionKind::List => Sort::List,
            CollectionKind::Bag => Sort::Bag,
        }
    }

    /// Lists are the only collections whose entry order is significant.
    pub fn is_ordered(self) -> bool {
        self == CollectionKind::List
    }
}

/// A sorted symbolic variable.
#[derive(PartialEq, Eq, Clone, Debug, Hash, Serialize, PartialOrd, Ord)]
pub struct Variable {
    /// Variable name
    pub name: String,
    /// Sort of the values this variable ranges over
    pub sort: Sort,
}

impl Variable {
    /// Smart constructor for a Variable that takes arguments by reference.
    pub fn new<T>(name: &str, sort: T) -> Self
    where
        T: Into<Sort>,
    {
        Variable {
            name: name.to_string(),
            sort: sort.into(),
        }
    }
}

/// One explicit entry of a collection. Maps hold bindings, every other kind
/// holds elements.
#[derive(PartialEq, Eq, Clone, Debug, Hash, Serialize, PartialOrd, Ord)]
pub enum Entry {
    /// An element of a set, list or bag
    Element(Term),
    /// A `key |-> value` binding of a map
    Binding(Term, Term),
}

impl Entry {
    /// The terms inside this entry, keys before values.
    pub fn terms(&self) -> impl Iterator<Item = &Term> {
        let (first, second) = match self {
            Entry::Element(t) => (t, None),
            Entry::Binding(k, v) => (k, Some(v)),
        };
        std::iter::once(first).chain(second)
    }

    /// Rebuild the entry by applying `f` to each of its terms.
    pub fn map(&self, mut f: impl FnMut(&Term) -> Term) -> Entry {
        match self {
            Entry::Element(t) => Entry::Element(f(t)),
            Entry::Binding(k, v) => Entry::Binding(f(k), f(v)),
        }
    }

    /// The key of a map binding, or the element itself.
    pub fn key(&self) -> &Term {
        match self {
            Entry::Element(t) | Entry::Binding(t, _) => t,
        }
    }
}

/// A builtin collection: explicit entries plus an optional frame standing for
/// "all the other entries". In rules the frame is a variable; after
/// substitution it may be any term of the collection's sort that could not be
/// spliced into the entries.
#[derive(PartialEq, Eq, Clone, Debug, Hash, Serialize, PartialOrd, Ord)]
pub struct Collection {
    /// What kind of collection this is
    pub kind: CollectionKind,
    /// The explicit entries, in canonical order
    pub entries: Vec<Entry>,
    /// The rest of the collection, if it is not fully known
    pub frame: Option<Box<Term>>,
}

impl Collection {
    /// Build a collection in canonical form.
    ///
    /// A frame that is itself a collection of the same kind is spliced into
    /// the entries; entries of unordered collections are sorted (and
    /// deduplicated for sets); a collection with no entries and a frame is just
    /// its frame. This does no sort checking, see
    /// [`crate::sorts::Signature::collection`] for the checked version.
    pub fn normalized(kind: CollectionKind, entries: Vec<Entry>, frame: Option<Term>) -> Term {
        let mut entries = entries;
        let mut frame = frame;
        while let Some(Term::Collection(inner)) = &frame {
            if inner.kind != kind {
                break;
            }
            let Some(Term::Collection(inner)) = frame.take() else {
                unreachable!()
            };
            entries.extend(inner.entries);
            frame = inner.frame.map(|f| *f);
        }

        if !kind.is_ordered() {
            entries.sort();
            if kind != CollectionKind::Bag {
                entries.dedup();
            }
        }

        match frame {
            Some(f) if entries.is_empty() => f,
            frame => Term::Collection(Collection {
                kind,
                entries,
                frame: frame.map(Box::new),
            }),
        }
    }

    /// The empty collection of the given kind.
    pub fn empty(kind: CollectionKind) -> Term {
        Term::Collection(Collection {
            kind,
            entries: vec![],
            frame: None,
        })
    }

    /// Look up the value bound to `key` among the explicit entries of a map.
    pub fn lookup(&self, key: &Term) -> Option<&Term> {
        self.entries.iter().find_map(|e| match e {
            Entry::Binding(k, v) if k == key => Some(v),
            _ => None,
        })
    }
}

/// A term of the rewriting language.
#[derive(PartialEq, Eq, Clone, Debug, Hash, Serialize, PartialOrd, Ord)]
pub enum Term {
    /// A symbolic variable
    Variable(Variable),
    /// Application of a label to an ordered list of children. The result sort
    /// is cached from the label's declaration.
    #[allow(missing_docs)]
    App {
        label: String,
        sort: Sort,
        args: Vec<Term>,
    },
    /// A literal value of a sort, such as `42` or `"abc"`
    #[allow(missing_docs)]
    Token { sort: Sort, value: String },
    /// A builtin collection
    Collection(Collection),
}

impl From<&Term> for Term {
    fn from(value: &Self) -> Self {
        value.clone()
    }
}

impl From<Variable> for Term {
    fn from(value: Variable) -> Self {
        Term::Variable(value)
    }
}

/// Smart constructors for Term. None of these check sorts against a signature;
/// use [`crate::sorts::Signature`] for checked construction.
impl Term {
    /// Smart constructor for a variable
    pub fn var<T>(name: &str, sort: T) -> Self
    where
        T: Into<Sort>,
    {
        Self::Variable(Variable::new(name, sort))
    }

    /// Smart constructor for a token
    pub fn token<T>(sort: T, value: &str) -> Self
    where
        T: Into<Sort>,
    {
        Self::Token {
            sort: sort.into(),
            value: value.to_string(),
        }
    }

    /// Smart constructor for an integer token
    pub fn int<I: Into<BigInt>>(value: I) -> Self {
        Self::Token {
            sort: Sort::Int,
            value: value.into().to_string(),
        }
    }

    /// Smart constructor for a boolean token
    pub fn bool(value: bool) -> Self {
        Self::Token {
            sort: Sort::Bool,
            value: value.to_string(),
        }
    }

    /// Smart constructor for `true`
    pub fn true_() -> Self {
        Self::bool(true)
    }

    /// Smart constructor for `false`
    pub fn false_() -> Self {
        Self::bool(false)
    }

    /// Smart constructor for a string token; `value` is the unquoted contents.
    pub fn string(value: &str) -> Self {
        Self::token(Sort::String, value)
    }

    /// Smart constructor for an application whose result sort is given
    /// explicitly.
    pub fn app<I>(label: &str, sort: Sort, args: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Term>,
    {
        Self::App {
            label: label.to_string(),
            sort,
            args: args.into_iter().map(|x| x.into()).collect(),
        }
    }

    /// Smart constructor for a canonical collection, see [`Collection::normalized`].
    pub fn collection(kind: CollectionKind, entries: Vec<Entry>, frame: Option<Term>) -> Self {
        Collection::normalized(kind, entries, frame)
    }

    /// The sort of this term.
    pub fn sort(&self) -> Sort {
        match self {
            Term::Variable(v) => v.sort.clone(),
            Term::App { sort, .. } | Term::Token { sort, .. } => sort.clone(),
            Term::Collection(c) => c.kind.sort(),
        }
    }

    /// The outermost label, if this term is an application.
    pub fn label(&self) -> Option<&str> {
        match self {
            Term::App { label, .. } => Some(label),
            _ => None,
        }
    }

    /// Returns the variable if this term is one.
    pub fn as_variable(&self) -> Option<&Variable> {
        match self {
            Term::Variable(v) => Some(v),
            _ => None,
        }
    }

    /// Interpret a `Bool` token.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Term::Token {
                sort: Sort::Bool,
                value,
            } => value.parse().ok(),
            _ => None,
        }
    }

    /// Interpret an `Int` token.
    pub fn as_int(&self) -> Option<BigInt> {
        match self {
            Term::Token {
                sort: Sort::Int,
                value,
            } => value.parse().ok(),
            _ => None,
        }
    }

    /// Interpret a `String` token.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Term::Token {
                sort: Sort::String,
                value,
            } => Some(value),
            _ => None,
        }
    }

    /// Whether this term is `true`.
    pub fn is_true(&self) -> bool {
        self.as_bool() == Some(true)
    }

    /// Whether this term is `false`.
    pub fn is_false(&self) -> bool {
        self.as_bool() == Some(false)
    }

    /// The immediate subterms, in order (collection frames last).
    pub fn children(&self) -> Vec<&Term> {
        match self {
            Term::Variable(_) | Term::Token { .. } => vec![],
            Term::App { args, .. } => args.iter().collect(),
            Term::Collection(c) => c
                .entries
                .iter()
                .flat_map(|e| e.terms())
                .chain(c.frame.as_deref())
                .collect(),
        }
    }

    /// The free variables of this term, in order of first occurrence.
    pub fn free_vars(&self) -> HashSet<Variable> {
        let mut vars = HashSet::default();
        self.collect_vars(&mut vars);
        vars
    }

    /// Add the free variables of this term to `vars`.
    pub fn collect_vars(&self, vars: &mut HashSet<Variable>) {
        match self {
            Term::Variable(v) => {
                vars.insert(v.clone());
            }
            _ => {
                for child in self.children() {
                    child.collect_vars(vars);
                }
            }
        }
    }

    /// Whether `v` occurs in this term.
    pub fn contains_var(&self, v: &Variable) -> bool {
        match self {
            Term::Variable(w) => v == w,
            _ => self.children().into_iter().any(|c| c.contains_var(v)),
        }
    }

    /// Whether this term has no variables.
    pub fn is_ground(&self) -> bool {
        match self {
            Term::Variable(_) => false,
            _ => self.children().into_iter().all(Term::is_ground),
        }
    }

    /// The number of nodes in this term.
    pub fn size(&self) -> usize {
        1 + self.children().into_iter().map(Term::size).sum::<usize>()
    }

    /// The labels used anywhere in this term, sorted.
    pub fn labels(&self) -> Vec<&str> {
        let mut labels = vec![];
        let mut todo = vec![self];
        while let Some(t) = todo.pop() {
            if let Some(l) = t.label() {
                labels.push(l);
            }
            todo.extend(t.children());
        }
        labels.into_iter().sorted().dedup().collect()
    }
}
