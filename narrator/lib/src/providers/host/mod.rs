//! Host-based backend implementations.
//!
//! These run the speech model on the local machine.

mod command_model;
mod local_model;

pub use command_model::CommandModel;
pub use local_model::LocalModelAdapter;
