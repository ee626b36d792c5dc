//! End-to-end helpers for the model metadata editing screen
//!
//! This crate drives the metadata editor of a model (a saved question whose
//! result columns can be renamed, retyped and remapped) from browser tests,
//! and patches model metadata directly over the REST API.
//!
//! # Features
//!
//! - **Editor helpers**: Open column options, rename, change semantic type,
//!   remap to a database column, save and wait for the round trips
//! - **Retrying commands**: Element queries and assertions poll until they
//!   hold or time out, so helpers read as straight-line scripts
//! - **Request aliases**: Named interceptions over the page's network traffic
//! - **API patching**: Map a function over a model's `result_metadata`
//!
//! # Example
//!
//! ```no_run
//! use model_metadata_e2e::{Config, Session};
//! use model_metadata_e2e::helpers::{
//!     map_column_to, open_column_options, save_metadata_changes, set_column_type,
//!     set_model_metadata, ColumnMapping,
//! };
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = Config::from_file("e2e.toml")?;
//! let mut session = Session::launch(config).await?;
//! session.api_mut().login("admin@example.com", "secret").await?;
//!
//! // Give every column an upper-case display name before opening the editor
//! set_model_metadata(session.api(), 7, |column| {
//!     let upper = column.name().unwrap_or_default().to_uppercase();
//!     column.with_display_name(upper)
//! })
//! .await?;
//!
//! session.visit("/model/7/metadata").await?;
//! open_column_options(&session, "TAX").await?;
//! set_column_type(&session, "No special type", "Currency").await?;
//! map_column_to(&session, &ColumnMapping::new("Orders", "Tax")).await?;
//! save_metadata_changes(&session).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration
//!
//! Sessions are configured using TOML files:
//!
//! ```toml
//! [app]
//! base_url = "http://localhost:3000"
//!
//! [timeouts]
//! command_ms = 4000
//! request_ms = 5000
//! response_ms = 30000
//!
//! [browser]
//! headless = true
//! ```

pub mod api;
pub mod config;
pub mod driver;
pub mod error;
pub mod helpers;
pub mod intercept;
pub mod locator;
pub mod session;

// Re-export main types for convenience
pub use api::{ApiClient, Card, ColumnMetadata};
pub use config::Config;
pub use error::{HelperError, Result};
pub use intercept::InterceptRegistry;
pub use locator::{Locator, TextMatch};
pub use session::{ClickOptions, Session};
