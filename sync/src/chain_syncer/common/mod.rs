// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Common types shared by the log client, the scheduler and the collectors

mod blocks;
mod config;
mod events;
mod range;
mod types;

pub use blocks::*;
pub use config::*;
pub use events::*;
pub use range::*;
pub use types::*;
