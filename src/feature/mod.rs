//! HTTP bindings for the business logic in [`crate::core`].

pub mod greeting;
