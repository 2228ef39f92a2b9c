// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! Concrete execution, bounded search and reachability proofs over a compiled
//! rewrite definition.

// configure clippy
#![allow(clippy::needless_return)]
#![allow(clippy::large_enum_variant)]
#![allow(clippy::type_complexity)]
#![deny(clippy::uninlined_format_args)]
// documentation-related lints (only checked when running rustdoc)
#![warn(missing_docs)]
#![allow(rustdoc::private_intra_doc_links)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod conf;
pub mod error;
pub mod evaluate;
pub mod prove;
pub mod registry;
pub mod search;
pub mod session;
pub mod state;
pub mod step;

pub use conf::RewriteConf;
pub use error::RewriteError;
pub use prove::{ProofResult, ProofStatus, ProveConf};
pub use registry::{DefinitionRegistry, ModuleId};
pub use search::{Pattern, SearchConf, SearchResult, SearchResults, SearchType};
pub use session::{ExecuteResult, RewriteSession};
pub use state::ConstrainedTerm;
