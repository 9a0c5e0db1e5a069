//! One query-display-export cycle.
//!
//! [`run_query`] chains builder, client and shaper for a single user action.
//! [`Session`] keeps the outcome around so export and snippet requests see the
//! same descriptor and table the user is looking at.

use crate::api::ApiClient;
use crate::error::{Error, Result};
use crate::models::{QueryDescriptor, ShapedTable};
use crate::query::{RawFields, ValidationRules, build_query};
use crate::shape::shape;
use crate::snippet::{SnippetOptions, render};
use crate::storage::{self, ExportOptions};
use log::{debug, error, warn};
use std::path::Path;

/// Everything produced by one successful query.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOutcome {
    pub query: QueryDescriptor,
    pub table: ShapedTable,
    /// Notices the API attached to an otherwise successful response.
    pub messages: Vec<String>,
}

/// Validate, execute and shape. Stops at the first failure.
pub fn run_query<C: ApiClient + ?Sized>(
    client: &C,
    rules: &ValidationRules,
    fields: &RawFields,
) -> Result<QueryOutcome> {
    let query = build_query(fields, rules).inspect_err(|e| debug!("rejected input: {}", e))?;
    debug!("running {} query {:?}", query.mode(), query.label());

    let response = client
        .execute(&query)
        .inspect_err(|e| warn!("upstream failure: {}", e))?;

    let table = shape(&response.records, &query).map_err(|e| {
        error!(
            "{} response did not match the expected shape: {}",
            query.mode(),
            e
        );
        Error::from(e)
    })?;

    Ok(QueryOutcome {
        query,
        table,
        messages: response.messages,
    })
}

/// Holds the current outcome. A new submission replaces it; a failed one clears it.
#[derive(Debug, Default)]
pub struct Session {
    current: Option<QueryOutcome>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn submit<C: ApiClient + ?Sized>(
        &mut self,
        client: &C,
        rules: &ValidationRules,
        fields: &RawFields,
    ) -> Result<&QueryOutcome> {
        self.current = None;
        let outcome = run_query(client, rules, fields)?;
        let stored = self.current.insert(outcome);
        Ok(&*stored)
    }

    /// Store an outcome produced elsewhere (e.g. on a worker thread).
    pub fn set(&mut self, outcome: QueryOutcome) {
        self.current = Some(outcome);
    }

    pub fn current(&self) -> Option<&QueryOutcome> {
        self.current.as_ref()
    }

    pub fn clear(&mut self) {
        self.current = None;
    }

    /// Write the current table as CSV.
    pub fn export_csv(&self, path: &Path, opts: ExportOptions) -> Result<usize> {
        let outcome = self.current.as_ref().ok_or_else(nothing_to_export)?;
        storage::save_csv_with(&outcome.table, path, opts)?;
        Ok(outcome.table.len())
    }

    pub fn export_json(&self, path: &Path) -> Result<usize> {
        let outcome = self.current.as_ref().ok_or_else(nothing_to_export)?;
        storage::save_json(&outcome.table, path)?;
        Ok(outcome.table.len())
    }

    /// Snippet for the current query, if there is one.
    pub fn snippet(&self, opts: &SnippetOptions) -> Option<String> {
        self.current.as_ref().map(|o| render(&o.query, opts))
    }
}

fn nothing_to_export() -> Error {
    Error::Io(std::io::Error::new(
        std::io::ErrorKind::NotFound,
        "no results to export; run a query first",
    ))
}
