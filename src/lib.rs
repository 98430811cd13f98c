//! MECHA-LUNG browser client.
//!
//! A doctor signs in, then lists, creates, edits and deletes patient
//! risk-assessment records held by the MECHA-LUNG API. The session and
//! roster logic lives in plain Rust types that run under `tokio` in tests
//! and under `wasm-bindgen-futures` in the browser; the Leptos components
//! in [`app`], [`pages`] and [`components`] only render [`clinic::ClinicSnapshot`]s
//! and forward user intents.

pub mod app;
pub mod auth;
pub mod clinic;
pub mod components;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod pages;
pub mod prompt;
pub mod roster;
pub mod session;
pub mod transport;
pub mod view;

#[cfg(test)]
mod test_support;

pub use clinic::{BrowserClinic, Clinic, ClinicSnapshot, ServerHealth};
pub use config::ClientConfig;
pub use error::{ApiError, MechaLungError};
