//! Shared types, adapter traits, and core utilities for Warden.
//!
//! This crate contains the decision model and the adapter contracts that are
//! shared between the engine crate and all adapter implementations. Keeping
//! them separate lets the cache and upstream adapters compile without pulling
//! in the engine.

pub mod cache_adapter;
pub mod captcha_adapter;
pub mod decision;
pub mod error;
pub mod lapi_adapter;
pub mod prelude;
pub mod types;

// vim: ts=4
