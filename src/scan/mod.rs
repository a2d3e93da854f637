// SPDX-License-Identifier: MPL-2.0

//! Scanner core shared by every front-end
//!
//! - [`payload`]: FIDO prefix check and URL validation
//! - [`coordinator`]: scan state machine returning effects for the front-end

pub mod coordinator;
pub mod payload;

pub use coordinator::{Alert, Effect, ScanCoordinator, ScanState};
pub use payload::{HandoffUrl, has_fido_prefix};
