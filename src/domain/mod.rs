//! Domain layer types and invariants.

pub mod api_keys;
pub mod claims;
pub mod entities;
pub mod error;
pub mod status;
pub mod vehicles;

pub use vor_api_types::{Region, Role, VorState};
