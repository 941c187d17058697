// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

pub mod events;
mod state_transition;
mod verifier;

pub use state_transition::*;
pub use verifier::*;
