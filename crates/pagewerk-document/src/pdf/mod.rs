// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF module — opening source documents and assembling new ones from their
// pages.

pub mod assembler;
pub(crate) mod objects;
pub mod source;
pub(crate) mod writer;

pub use assembler::{DocumentAssembler, PageSelection, SourceSelection, SplitOutcome, SplitPolicy};
pub use source::{PageInfo, PageSource};
