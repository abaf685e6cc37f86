//! # Zyra Core
//!
//! Core functionality of zyra, the file-based HTTP API testing tool.
//!
//! A request file describes one HTTP call and the assertions its response must satisfy:
//!
//! ```text
//! """
//! Fetch a single user.
//! """
//! GET /users/{{id}}
//!
//! [headers]
//! Authorization = Bearer {{token}}
//!
//! [vars]
//! id = 7
//!
//! [assert]
//! res.status eq 200
//! res.body.data.id eq {{id}}
//! res.headers["Content-Type"] has "json"
//! ```
//!
//! This crate provides:
//! - The tokenizer and the line-oriented parsers for request files and `zyra.config`
//! - `{{name}}` placeholder resolution
//! - The assertion engine and its function registry
//! - HTTP transport, the runner and reporters
//!
//! ## Architecture (block diagram)
//!
//! ```text
//! +---------------------+      +---------------------+      +---------------------+
//! | loader              | ---> | parser              | ---> | resolver            |
//! | *.zyra discovery    |      | Document/Assertion  |      | {{name}} -> value   |
//! +---------------------+      +---------------------+      +---------------------+
//!                                        ^                             |
//!                                        |                             v
//! +---------------------+      +---------------------+      +---------------------+
//! | config              | ---> | runner              | ---> | http::Transport     |
//! | zyra.config + env   |      | sequential or       |      | reqwest Client      |
//! +---------------------+      | concurrent          |      +---------------------+
//!                              +---------------------+                 |
//!                                 |            ^                       v
//!                                 v            +--------------- +---------------------+
//!                      +---------------------+                  | assertion engine    |
//!                      | reporter            |                  | Registry + builtins |
//!                      | List/Table/Null     |                  +---------------------+
//!                      +---------------------+
//! ```
//!
//! Most users should use the `zyra` binary rather than importing `zyra-core` directly.

pub mod assertion;
pub mod config;
pub mod error;
pub mod http;
pub mod loader;
pub mod masking;
pub mod model;
pub mod parser;
pub mod reporter;
pub mod resolver;
pub mod runner;
pub mod token;

// Re-export error handling crates
pub use eyre;

// Re-export key functionality
pub use assertion::{Function, Registry};
pub use config::Config;
pub use error::{Error, Result};
pub use http::{Client, Request, Response, Transport};
pub use model::{Assertion, Document, Method, Path, PathSegment, Value};
pub use reporter::{ListReporter, NullReporter, Reporter, ReporterType, Summary, TableReporter};
pub use runner::{FileResult, Runner};
