//! # Notebook Router
//!
//! Answers product questions by routing them to NotebookLM notebooks.
//!
//! A question is classified into a product category by a hosted language
//! model, mapped to the notebook bound to that category, optionally enriched
//! by a research pass, and finally asked through the `nlm` CLI. The engine's
//! output is normalized into a [`QueryResult`](notebook_router_core::models::QueryResult).
//!
//! ## Architecture
//!
//! ```text
//! question ──▶ Classifier ──▶ NotebookRegistry ──▶ ResearchPoller ──▶ engine query
//!              (Gemini)       category → id        (quick/extended)    (nlm CLI)
//!                                                                          │
//!                                                  QueryResult ◀── parse ◀─┘
//! ```
//!
//! Pure types and parsing live in the `notebook-router-core` crate; this
//! crate owns everything that touches the network, processes, or config.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Engine, research, and query error types |
//! | [`registry`] | Category → notebook bindings |
//! | [`classifier`] | Language model seam and question classification |
//! | [`engine`] | Engine CLI commands and their execution |
//! | [`research`] | Research start / poll / import |
//! | [`service`] | Query orchestration and admin operations |
//! | [`commands`] | `nbr` subcommand printers |

pub mod classifier;
pub mod commands;
pub mod config;
pub mod engine;
pub mod error;
pub mod registry;
pub mod research;
pub mod service;
