// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! Label signatures and sort checking.
//!
//! A [`Signature`] records, for every label, its argument sorts, its result
//! sort, whether it is a function (evaluated rather than rewritten as a
//! constructor) and an optional builtin hook. Terms built through the
//! signature are checked eagerly; [`Signature::check`] re-checks terms that
//! were built with the unchecked smart constructors in [`crate::syntax`].

use serde::Serialize;
use thiserror::Error;

use crate::hashmap::HashMap;
use crate::syntax::*;

/// An error encountered while building or checking a term
#[derive(Error, Debug, PartialEq, Eq, Clone)]
pub enum SortError {
    /// A subterm's sort did not agree with the sort its position requires.
    #[error("expected {expected} but found {found} in {context}")]
    SortMismatch {
        /// Sort required by the enclosing label or collection
        expected: Sort,
        #[allow(missing_docs)]
        found: Sort,
        /// Label or collection the mismatch was found in
        context: String,
    },
    /// The term referred to a label that was not declared.
    #[error("label {0} was not declared")]
    UnknownLabel(String),
    /// A label was declared multiple times.
    #[error("label {0} was declared multiple times")]
    RedeclaredLabel(String),
    /// A label was applied to the wrong number of arguments.
    #[allow(missing_docs)]
    #[error("label {label} expected {expected} args but found {found} args")]
    ArityMismatch {
        label: String,
        expected: usize,
        found: usize,
    },
    /// A map collection bound the same key twice.
    #[error("duplicate key {0} in map")]
    DuplicateKey(Term),
    /// A map entry was not a binding, or a non-map entry was a binding.
    #[error("{0:?} collections cannot hold {1}")]
    EntryShape(CollectionKind, String),
    /// The frame of a collection does not have the collection's sort.
    #[error("frame of a {kind:?} collection has sort {found}")]
    #[allow(missing_docs)]
    FrameSort { kind: CollectionKind, found: Sort },
}

/// The declaration of a single label.
#[derive(PartialEq, Eq, Clone, Debug, Serialize)]
pub struct LabelDecl {
    /// Label name
    pub name: String,
    /// Argument sorts
    pub args: Vec<Sort>,
    /// Result sort
    pub sort: Sort,
    /// Functions are evaluated by function rules and hooks instead of being
    /// treated as constructors
    pub function: bool,
    /// Name of the builtin implementation, see [`crate::semantics::apply_hook`]
    pub hook: Option<String>,
}

impl LabelDecl {
    /// A constructor label.
    pub fn constructor(name: &str, args: &[Sort], sort: Sort) -> Self {
        Self {
            name: name.to_string(),
            args: args.to_vec(),
            sort,
            function: false,
            hook: None,
        }
    }

    /// A function label, evaluated by the function rules of a definition.
    pub fn function(name: &str, args: &[Sort], sort: Sort) -> Self {
        Self {
            function: true,
            ..Self::constructor(name, args, sort)
        }
    }

    /// A function label with a builtin implementation.
    pub fn hooked(name: &str, args: &[Sort], sort: Sort, hook: &str) -> Self {
        Self {
            hook: Some(hook.to_string()),
            ..Self::function(name, args, sort)
        }
    }
}

/// Names of the builtin labels declared by [`Signature::with_builtins`].
#[allow(missing_docs)]
pub mod labels {
    pub const INT_ADD: &str = "_+Int_";
    pub const INT_SUB: &str = "_-Int_";
    pub const INT_MUL: &str = "_*Int_";
    pub const INT_DIV: &str = "_/Int_";
    pub const INT_MOD: &str = "_%Int_";
    pub const INT_MIN: &str = "minInt";
    pub const INT_MAX: &str = "maxInt";
    pub const INT_ABS: &str = "absInt";
    pub const INT_LT: &str = "_<Int_";
    pub const INT_LE: &str = "_<=Int_";
    pub const INT_GT: &str = "_>Int_";
    pub const INT_GE: &str = "_>=Int_";
    pub const INT_EQ: &str = "_==Int_";
    pub const INT_NE: &str = "_=/=Int_";

    pub const BOOL_AND: &str = "_andBool_";
    pub const BOOL_OR: &str = "_orBool_";
    pub const BOOL_NOT: &str = "notBool_";
    pub const BOOL_IMPLIES: &str = "_impliesBool_";
    pub const BOOL_XOR: &str = "_xorBool_";
    pub const BOOL_EQ: &str = "_==Bool_";

    pub const STRING_CONCAT: &str = "_+String_";
    pub const STRING_LENGTH: &str = "lengthString";
    pub const STRING_EQ: &str = "_==String_";

    pub const K_EQ: &str = "_==K_";
    pub const K_NE: &str = "_=/=K_";

    pub const MAP_LOOKUP: &str = "Map:lookup";
    pub const MAP_UPDATE: &str = "Map:update";
    pub const MAP_REMOVE: &str = "Map:remove";
    pub const MAP_IN_KEYS: &str = "_in_keys(_)";
    pub const MAP_SIZE: &str = "sizeMap";
    pub const SET_IN: &str = "Set:in";
    pub const SET_SIZE: &str = "sizeSet";
    pub const LIST_SIZE: &str = "sizeList";

    pub const SHA256: &str = "sha256";
}

/// The labels usable in terms, with their sorts.
#[derive(PartialEq, Eq, Clone, Debug, Default, Serialize)]
pub struct Signature {
    labels: HashMap<String, LabelDecl>,
}

impl Signature {
    /// A signature declaring every builtin hooked label.
    pub fn with_builtins() -> Self {
        use labels::*;
        use Sort::*;

        let int2 = [Int, Int];
        let bool2 = [Bool, Bool];
        let string2 = [String, String];
        let decls = [
            LabelDecl::hooked(INT_ADD, &int2, Int, "INT.add"),
            LabelDecl::hooked(INT_SUB, &int2, Int, "INT.sub"),
            LabelDecl::hooked(INT_MUL, &int2, Int, "INT.mul"),
            LabelDecl::hooked(INT_DIV, &int2, Int, "INT.div"),
            LabelDecl::hooked(INT_MOD, &int2, Int, "INT.mod"),
            LabelDecl::hooked(INT_MIN, &int2, Int, "INT.min"),
            LabelDecl::hooked(INT_MAX, &int2, Int, "INT.max"),
            LabelDecl::hooked(INT_ABS, &[Int], Int, "INT.abs"),
            LabelDecl::hooked(INT_LT, &int2, Bool, "INT.lt"),
            LabelDecl::hooked(INT_LE, &int2, Bool, "INT.le"),
            LabelDecl::hooked(INT_GT, &int2, Bool, "INT.gt"),
            LabelDecl::hooked(INT_GE, &int2, Bool, "INT.ge"),
            LabelDecl::hooked(INT_EQ, &int2, Bool, "INT.eq"),
            LabelDecl::hooked(INT_NE, &int2, Bool, "INT.ne"),
            LabelDecl::hooked(BOOL_AND, &bool2, Bool, "BOOL.and"),
            LabelDecl::hooked(BOOL_OR, &bool2, Bool, "BOOL.or"),
            LabelDecl::hooked(BOOL_NOT, &[Bool], Bool, "BOOL.not"),
            LabelDecl::hooked(BOOL_IMPLIES, &bool2, Bool, "BOOL.implies"),
            LabelDecl::hooked(BOOL_XOR, &bool2, Bool, "BOOL.xor"),
            LabelDecl::hooked(BOOL_EQ, &bool2, Bool, "BOOL.eq"),
            LabelDecl::hooked(STRING_CONCAT, &string2, String, "STRING.concat"),
            LabelDecl::hooked(STRING_LENGTH, &[String], Int, "STRING.length"),
            LabelDecl::hooked(STRING_EQ, &string2, Bool, "STRING.eq"),
            LabelDecl::hooked(K_EQ, &[K, K], Bool, "K.eq"),
            LabelDecl::hooked(K_NE, &[K, K], Bool, "K.ne"),
            LabelDecl::hooked(MAP_LOOKUP, &[Map, K], K, "MAP.lookup"),
            LabelDecl::hooked(MAP_UPDATE, &[Map, K, K], Map, "MAP.update"),
            LabelDecl::hooked(MAP_REMOVE, &[Map, K], Map, "MAP.remove"),
            LabelDecl::hooked(MAP_IN_KEYS, &[K, Map], Bool, "MAP.in_keys"),
            LabelDecl::hooked(MAP_SIZE, &[Map], Int, "MAP.size"),
            LabelDecl::hooked(SET_IN, &[K, Set], Bool, "SET.in"),
            LabelDecl::hooked(SET_SIZE, &[Set], Int, "SET.size"),
            LabelDecl::hooked(LIST_SIZE, &[List], Int, "LIST.size"),
            LabelDecl::hooked(SHA256, &[String], String, "HASH.sha256"),
        ];

        let mut sig = Signature::default();
        for decl in decls {
            sig.labels.insert(decl.name.clone(), decl);
        }
        sig
    }

    /// Declare a new label. Labels cannot be redeclared.
    pub fn declare(&mut self, decl: LabelDecl) -> Result<(), SortError> {
        if self.labels.contains_key(&decl.name) {
            return Err(SortError::RedeclaredLabel(decl.name));
        }
        self.labels.insert(decl.name.clone(), decl);
        Ok(())
    }

    /// Builder-style [`Signature::declare`].
    pub fn with(mut self, decl: LabelDecl) -> Result<Self, SortError> {
        self.declare(decl)?;
        Ok(self)
    }

    /// Look up the declaration of a label.
    pub fn label(&self, name: &str) -> Result<&LabelDecl, SortError> {
        self.labels
            .get(name)
            .ok_or_else(|| SortError::UnknownLabel(name.to_string()))
    }

    /// Iterate over all declared labels, in declaration order.
    pub fn labels(&self) -> impl Iterator<Item = &LabelDecl> {
        self.labels.values()
    }

    /// Whether the label is a declared function.
    pub fn is_function(&self, name: &str) -> bool {
        self.labels.get(name).is_some_and(|d| d.function)
    }

    /// The builtin hook of the label, if any.
    pub fn hook(&self, name: &str) -> Option<&str> {
        self.labels.get(name).and_then(|d| d.hook.as_deref())
    }

    /// Build a well-sorted application.
    pub fn app<I>(&self, label: &str, args: I) -> Result<Term, SortError>
    where
        I: IntoIterator,
        I::Item: Into<Term>,
    {
        let decl = self.label(label)?;
        let args: Vec<Term> = args.into_iter().map(|t| t.into()).collect();
        check_args(decl, &args)?;
        Ok(Term::App {
            label: label.to_string(),
            sort: decl.sort.clone(),
            args,
        })
    }

    /// Build a well-formed canonical collection.
    pub fn collection(
        &self,
        kind: CollectionKind,
        entries: Vec<Entry>,
        frame: Option<Term>,
    ) -> Result<Term, SortError> {
        for e in &entries {
            check_entry_shape(kind, e)?;
        }
        if let Some(f) = &frame {
            check_frame(kind, f)?;
        }
        let term = Collection::normalized(kind, entries, frame);
        if let Term::Collection(c) = &term {
            check_duplicate_keys(c)?;
        }
        Ok(term)
    }

    /// Check a whole term against this signature.
    pub fn check(&self, term: &Term) -> Result<(), SortError> {
        match term {
            Term::Variable(_) | Term::Token { .. } => Ok(()),
            Term::App { label, sort, args } => {
                let decl = self.label(label)?;
                if decl.sort != *sort {
                    return Err(SortError::SortMismatch {
                        expected: decl.sort.clone(),
                        found: sort.clone(),
                        context: label.clone(),
                    });
                }
                check_args(decl, args)?;
                args.iter().try_for_each(|a| self.check(a))
            }
            Term::Collection(c) => {
                for e in &c.entries {
                    check_entry_shape(c.kind, e)?;
                    e.terms().try_for_each(|t| self.check(t))?;
                }
                if let Some(f) = &c.frame {
                    check_frame(c.kind, f)?;
                    self.check(f)?;
                }
                check_duplicate_keys(c)
            }
        }
    }
}

fn check_args(decl: &LabelDecl, args: &[Term]) -> Result<(), SortError> {
    if decl.args.len() != args.len() {
        return Err(SortError::ArityMismatch {
            label: decl.name.clone(),
            expected: decl.args.len(),
            found: args.len(),
        });
    }
    for (expected, arg) in decl.args.iter().zip(args) {
        let found = arg.sort();
        if !expected.accepts(&found) {
            return Err(SortError::SortMismatch {
                expected: expected.clone(),
                found,
                context: decl.name.clone(),
            });
        }
    }
    Ok(())
}

fn check_entry_shape(kind: CollectionKind, entry: &Entry) -> Result<(), SortError> {
    match (kind, entry) {
        (CollectionKind::Map, Entry::Binding(..)) => Ok(()),
        (CollectionKind::Map, Entry::Element(_)) => {
            Err(SortError::EntryShape(kind, "elements".to_string()))
        }
        (_, Entry::Element(_)) => Ok(()),
        (_, Entry::Binding(..)) => Err(SortError::EntryShape(kind, "bindings".to_string())),
    }
}

fn check_frame(kind: CollectionKind, frame: &Term) -> Result<(), SortError> {
    let found = frame.sort();
    if found == kind.sort() {
        Ok(())
    } else {
        Err(SortError::FrameSort { kind, found })
    }
}

fn check_duplicate_keys(c: &Collection) -> Result<(), SortError> {
    if c.kind != CollectionKind::Map {
        return Ok(());
    }
    // entries are sorted, so equal keys are adjacent
    for (a, b) in c.entries.iter().zip(c.entries.iter().skip(1)) {
        if a.key() == b.key() && a.key().is_ground() {
            return Err(SortError::DuplicateKey(a.key().clone()));
        }
    }
    Ok(())
}
