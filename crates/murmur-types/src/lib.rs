//! Types shared by the storage layer, the HTTP handlers and their tests.

pub mod api;
pub mod models;
