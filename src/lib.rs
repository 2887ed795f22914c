//! Flipt Provider
//!
//! Manages [Flipt](https://flipt.io) v2 feature-flag configuration as
//! declarative infrastructure: namespaces, flags, variants, segments,
//! constraints and rules, plus read-only lookups of existing objects.
//!
//! # Overview
//!
//! The crate provides:
//!
//! - **ProviderService trait**: the protocol the orchestrator drives
//! - **FliptProvider**: the implementation for the Flipt v2 management API
//! - **Schema types**: declarative schemas for the provider, resources and data sources
//! - **Error types**: a single [`ProviderError`] mapped onto diagnostics
//! - **Logging**: `tracing` output on stderr
//! - **Testing**: [`testing::ProviderTester`] for driving a provider in tests
//!
//! # Storage model
//!
//! Flipt v2 stores flags and segments as whole documents. Variants and rules
//! live inside their flag's document, constraints inside their segment's.
//! Every child operation fetches the parent, changes one element of the
//! embedded array and writes the whole parent back; fields the provider
//! does not manage are carried through untouched.
//!
//! # Quick Start
//!
//! ```ignore
//! use flipt_provider::{FliptProvider, ProviderService};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     flipt_provider::init_logging();
//!
//!     let provider = FliptProvider::new();
//!     provider
//!         .configure(json!({
//!             "endpoint": "http://localhost:8080",
//!             "environment_key": "default",
//!             "token": "secret"
//!         }))
//!         .await?;
//!
//!     provider
//!         .create("flipt_namespace", json!({"key": "production", "name": "Production"}))
//!         .await?;
//!     provider
//!         .create(
//!             "flipt_flag",
//!             json!({"namespace_key": "production", "key": "new-feature", "name": "New Feature"}),
//!         )
//!         .await?;
//!     Ok(())
//! }
//! ```
//!
//! # Resources
//!
//! - `flipt_namespace`
//! - `flipt_flag`
//! - `flipt_variant`
//! - `flipt_segment`
//! - `flipt_constraint`
//! - `flipt_rule`
//!
//! # Data sources
//!
//! `flipt_namespace`, `flipt_environment`, `flipt_flag`, `flipt_segment`
//! and `flipt_variant`.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod api;
pub mod client;
pub mod config;
pub mod data_sources;
pub mod document;
pub mod error;
pub mod logging;
pub mod plan;
pub mod provider;
pub mod resources;
pub mod schema;
pub mod service;
pub mod testing;
pub mod types;
pub mod validation;

// Re-export main types at crate root
pub use client::FliptClient;
pub use config::ProviderConfig;
pub use error::ProviderError;
pub use logging::{init_logging, init_logging_with_default, try_init_logging};
pub use provider::FliptProvider;
pub use schema::ProviderSchema;
pub use service::ProviderService;
pub use types::{AttributeChange, ImportedResource, PlanResult, ProviderMetadata};
pub use validation::{is_valid, validate, validate_result};

// Re-export async_trait for convenience
pub use async_trait::async_trait;

// Re-export commonly used external types
pub use serde_json;
pub use tracing;
