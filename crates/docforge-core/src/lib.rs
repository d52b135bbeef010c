//! Core library for docforge, a staged documentation-generation
//! orchestrator.
//!
//! A project moves through four sequential stages (business analysis,
//! engineering standards, architecture, implementation planning). Each
//! stage run is audited in an execution ledger, produces an immutable
//! document version, and streams progress events to subscribers. This
//! crate holds the domain types, the redb-backed stores, the orchestrator
//! and the contracts for the external retrieval and generation services;
//! the HTTP server and the CLI live in their own crates on top.

pub mod cancel;
pub mod config;
pub mod db;
pub mod document;
pub mod error;
pub mod events;
pub mod execution;
pub mod export;
pub mod gateway;
pub mod io;
pub mod ledger;
pub mod orchestrator;
pub mod paths;
pub mod project;
pub mod retry;
pub mod types;

pub use error::{DocforgeError, Result};
