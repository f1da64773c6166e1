// Use cases layer: application workflows for the arcade server.

pub mod games;
pub mod hub;

pub use hub::{HubHandle, PendingPlayer};
