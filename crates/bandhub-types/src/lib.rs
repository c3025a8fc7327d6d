//! Types shared by the BandHub database, API and server crates.

pub mod api;
pub mod models;
