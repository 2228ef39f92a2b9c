// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! Matching and unification of terms.
//!
//! Both are enumerated lazily: collection patterns can have combinatorially
//! many solutions, and callers usually want only a bounded prefix. An empty
//! enumeration means "no solution" and is never an error.

// configure clippy
#![allow(clippy::needless_return)]
#![allow(clippy::large_enum_variant)]
#![allow(clippy::type_complexity)]
#![deny(clippy::uninlined_format_args)]
// documentation-related lints (only checked when running rustdoc)
#![warn(missing_docs)]
#![allow(rustdoc::private_intra_doc_links)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod collections;
pub mod matcher;
pub mod unifier;

pub use matcher::{match_term, matches, matches_with, Matches};
pub use unifier::{Unification, Unifier, Unifiers};
