//! Backend adapter implementations.
//!
//! This module contains both the local model (host) adapter and the cloud
//! voice adapter.

pub mod cloud;
pub mod host;
