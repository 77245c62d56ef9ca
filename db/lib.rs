// This file is part of Moonfire NVR, a security camera network video recorder.
// Copyright (C) 2020 The Moonfire NVR Authors; see AUTHORS and LICENSE.txt.
// SPDX-License-Identifier: GPL-v3.0-or-later WITH GPL-3.0-linking-exception.

//! The persistence gateway (SPEC_FULL.md §4.1): everything this worker knows
//! about PostgreSQL lives in this crate.

mod models;
mod pool;
mod queries;

pub use models::*;
pub use pool::{create_pool, run_migrations};
pub use queries::{Gateway, ResolvedContext};

#[cfg(test)]
mod tests;
