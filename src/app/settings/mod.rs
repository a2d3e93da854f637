// SPDX-License-Identifier: GPL-3.0-only

//! Settings UI module
//!
//! Theme, camera and backend preferences shown in the context drawer.

pub mod view;
