// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! codemachine-wire: host-process signal and directive wire types shared
//! between the runtime and its external callers.

pub mod directive;
pub mod signal;

pub use directive::{read_directive, reset_directive, Directive, DirectiveError};
pub use signal::ProcessSignal;
