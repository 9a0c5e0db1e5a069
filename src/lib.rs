//! bls_explorer
//!
//! Search, fetch, export and script U.S. Bureau of Labor Statistics time series.
//! Pairs with the `bls` CLI and the `bls-gui` desktop app.
//!
//! ### Pipeline
//! - [`query`]: validate raw input into a [`QueryDescriptor`]
//! - [`api`]: execute it against the BLS Public Data API
//! - [`shape`]: turn the raw records into a [`ShapedTable`]
//! - [`storage`]: export the table as CSV or JSON
//! - [`snippet`]: render code that reproduces the request
//!
//! ### Example
//! ```no_run
//! use bls_explorer::{BlsClient, Session};
//! use bls_explorer::config::Settings;
//! use bls_explorer::query::RawFields;
//! use bls_explorer::storage::ExportOptions;
//!
//! let settings = Settings::load()?;
//! let client = BlsClient::new(&settings)?;
//! let mut session = Session::new();
//! let outcome = session.submit(
//!     &client,
//!     &settings.validation_rules()?,
//!     &RawFields::series_by_range("LNS14000000", 2015, 2024),
//! )?;
//! println!("{} rows", outcome.table.len());
//! session.export_csv("unemployment.csv".as_ref(), ExportOptions::default())?;
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod query;
pub mod session;
pub mod shape;
pub mod snippet;
pub mod storage;

pub use api::{ApiClient, BlsClient};
pub use error::{Error, ShapeError, UpstreamError, ValidationError};
pub use models::{QueryDescriptor, QueryMode, ShapedTable};
pub use session::{QueryOutcome, Session, run_query};
