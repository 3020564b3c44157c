//! Application services layer.

pub mod api_keys;
pub mod audit;
pub mod conditional;
pub mod dashboard;
pub mod error;
pub mod incidents;
pub mod pagination;
pub mod repos;
pub mod vehicles;
