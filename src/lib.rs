//! Vehicle off-road (VOR) availability service.
//!
//! Layers follow the usual split: `domain` holds pure types and rules,
//! `application` the services and repository traits, `infra` the Postgres
//! adapters and the axum surface, and `config` the layered settings.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
