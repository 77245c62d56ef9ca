// This file is part of Moonfire NVR, a security camera network video recorder.
// Copyright (C) 2018 The Moonfire NVR Authors; see AUTHORS and LICENSE.txt.
// SPDX-License-Identifier: GPL-v3.0-or-later WITH GPL-3.0-linking-exception.

mod error;
pub mod shutdown;
pub mod tracing_setup;

pub use crate::error::{prettify_failure, Error, ErrorKind, ResultExt};
pub use parking_lot::{Condvar, Mutex};
