//! Domain and wire types shared by the store, auth and API crates.

pub mod api;
pub mod models;
