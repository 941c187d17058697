// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

mod reducer;
mod service;

pub use reducer::*;
pub use service::*;
