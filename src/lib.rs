//! A web service that greets people by name.

pub mod core;
pub mod feature;
pub mod infra;
pub mod server;
