// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! Constraints over terms and the decision procedures that check their
//! feasibility.
//!
//! The rewriter only ever asks two questions: is a constraint feasible, and
//! does one constraint imply another. [`store::ConstraintStore`] answers both,
//! simplifying locally before delegating to a [`basics::BasicSolver`].

// configure clippy
#![allow(clippy::needless_return)]
#![allow(clippy::large_enum_variant)]
#![allow(clippy::upper_case_acronyms)]
#![allow(clippy::type_complexity)]
#![deny(clippy::uninlined_format_args)]
// documentation-related lints (only checked when running rustdoc)
#![warn(missing_docs)]
#![allow(rustdoc::private_intra_doc_links)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod basics;
pub mod conf;
pub mod constraint;
pub mod local;
pub mod store;

pub use basics::{SatResp, SolverError};
pub use constraint::{Atom, Constraint};
pub use store::ConstraintStore;
