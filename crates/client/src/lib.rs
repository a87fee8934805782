//! Client code for harbor.
//!
//! This crate provides the HTTP network the offline cache controller
//! fetches through, bound to a single site origin.

pub mod fetch;

pub use fetch::{FetchClient, FetchConfig, UrlError, canonicalize, resolve};
