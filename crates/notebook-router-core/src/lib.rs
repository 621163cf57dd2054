//! # Notebook Router Core
//!
//! Pure routing and parsing logic for Notebook Router: the closed category
//! set and its classification prompt, the query/research data types, and
//! the best-effort readers for the notebook engine's text output.
//!
//! This crate performs no I/O. It has no tokio, HTTP client, or subprocess
//! dependencies; the calling application owns every external call.

pub mod category;
pub mod models;
pub mod parse;
