//! Pipeline tests against an in-memory client; no network involved.

use bls_explorer::api::ApiClient;
use bls_explorer::error::{Error, Field, UpstreamError, UpstreamKind};
use bls_explorer::models::{ApiResponse, QueryDescriptor, QueryMode, RawRecord};
use bls_explorer::query::{RawFields, ValidationRules};
use bls_explorer::snippet::{SnippetLanguage, SnippetOptions};
use bls_explorer::storage::{self, ExportOptions};
use bls_explorer::{Session, run_query};
use serde_json::json;
use std::cell::RefCell;

/// Replies with canned records and remembers what it was asked.
struct StubClient {
    reply: Result<Vec<RawRecord>, UpstreamError>,
    messages: Vec<String>,
    seen: RefCell<Vec<QueryDescriptor>>,
}

impl StubClient {
    fn ok(records: serde_json::Value) -> Self {
        let records = records
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r.as_object().cloned().unwrap())
            .collect();
        Self {
            reply: Ok(records),
            messages: Vec::new(),
            seen: RefCell::new(Vec::new()),
        }
    }

    fn failing(kind: UpstreamKind, message: &str) -> Self {
        Self {
            reply: Err(UpstreamError::new(kind, message)),
            messages: Vec::new(),
            seen: RefCell::new(Vec::new()),
        }
    }
}

impl ApiClient for StubClient {
    fn execute(&self, query: &QueryDescriptor) -> Result<ApiResponse, UpstreamError> {
        self.seen.borrow_mut().push(query.clone());
        self.reply.clone().map(|records| ApiResponse {
            records,
            messages: self.messages.clone(),
        })
    }
}

fn rules() -> ValidationRules {
    ValidationRules::default().with_current_year(2025)
}

fn cpi_rows() -> serde_json::Value {
    json!([
        {"id": "CUUR0000SA0", "period": "2024M02", "value": "310.326", "footnote": null},
        {"id": "CUUR0000SA0", "period": "2024M01", "value": "308.417", "footnote": null}
    ])
}

#[test]
fn run_query_chains_build_execute_shape() {
    let client = StubClient::ok(cpi_rows());
    let out = run_query(
        &client,
        &rules(),
        &RawFields::series_by_range("cuur0000sa0", 2023, 2024),
    )
    .unwrap();
    assert_eq!(out.query.mode(), QueryMode::SeriesByRange);
    assert_eq!(out.table.len(), 2);
    assert!(out.messages.is_empty());

    let seen = client.seen.borrow();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].series()[0].as_str(), "CUUR0000SA0");
}

#[test]
fn invalid_input_never_reaches_the_client() {
    let client = StubClient::ok(cpi_rows());
    let err = run_query(&client, &rules(), &RawFields::series_by_range("CUUR0000SA0", 2020, 2010))
        .unwrap_err();
    match err {
        Error::Validation(v) => assert_eq!(v.field, Field::EndYear),
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(client.seen.borrow().is_empty());
}

#[test]
fn upstream_errors_pass_through_verbatim() {
    let client = StubClient::failing(UpstreamKind::NotFound, "Series does not exist for Series ABC123");
    let err = run_query(&client, &rules(), &RawFields::series_by_id("ABC123")).unwrap_err();
    match err {
        Error::Upstream(u) => {
            assert_eq!(u.kind, UpstreamKind::NotFound);
            assert_eq!(u.message, "Series does not exist for Series ABC123");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn shape_mismatch_is_a_generic_failure() {
    let client = StubClient::ok(json!([{"seriesID": "CUUR0000SA0"}]));
    let err = run_query(&client, &rules(), &RawFields::series_by_id("CUUR0000SA0")).unwrap_err();
    assert!(matches!(err, Error::Shape(_)));
    assert_eq!(err.to_string(), "unexpected response from the BLS API");
}

#[test]
fn api_notices_are_kept_with_the_outcome() {
    let mut client = StubClient::ok(cpi_rows());
    client.messages = vec!["No Data Available for Series CUUR0000SA0 Year: 2025".into()];
    let out = run_query(&client, &rules(), &RawFields::series_by_id("CUUR0000SA0")).unwrap();
    assert_eq!(out.messages.len(), 1);
}

#[test]
fn session_replaces_on_success_and_clears_on_failure() {
    let mut session = Session::new();
    assert!(session.current().is_none());

    let cpi = StubClient::ok(cpi_rows());
    session
        .submit(&cpi, &rules(), &RawFields::series_by_id("CUUR0000SA0"))
        .unwrap();
    assert_eq!(session.current().unwrap().table.len(), 2);

    let search = StubClient::ok(json!([{"id": "LNS14000000", "title": "Unemployment Rate"}]));
    session
        .submit(&search, &rules(), &RawFields::search("unemployment"))
        .unwrap();
    assert_eq!(session.current().unwrap().query.mode(), QueryMode::Search);

    assert!(session.submit(&search, &rules(), &RawFields::search("")).is_err());
    assert!(session.current().is_none());
}

#[test]
fn session_exports_and_renders_current_query() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cpi.csv");
    let mut session = Session::new();

    assert!(matches!(
        session.export_csv(&path, ExportOptions::default()),
        Err(Error::Io(_))
    ));
    assert!(session.snippet(&SnippetOptions::default()).is_none());

    let client = StubClient::ok(cpi_rows());
    session
        .submit(&client, &rules(), &RawFields::series_by_range("CUUR0000SA0", 2023, 2024))
        .unwrap();

    assert_eq!(session.export_csv(&path, ExportOptions::default()).unwrap(), 2);
    let back = storage::read_csv(std::fs::File::open(&path).unwrap()).unwrap();
    assert_eq!(&back, &session.current().unwrap().table);

    let code = session
        .snippet(&SnippetOptions {
            language: SnippetLanguage::Python,
            api_key: None,
        })
        .unwrap();
    assert!(code.contains("seriesids=['CUUR0000SA0']"));
    assert!(code.contains("startyear=2023"));
}
