//! Code snippets reproducing a query outside the app.
//!
//! Output is a pure function of the descriptor and options. User-supplied text is
//! escaped for the target language so a pasted snippet runs as shown.

use crate::config::DEFAULT_BASE_URL;
use crate::models::QueryDescriptor;
use serde_json::json;
use std::fmt::Write;

/// Shown instead of a real registration key.
pub const KEY_PLACEHOLDER: &str = "your_api_key";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SnippetLanguage {
    /// `py-bls-api`, the Python wrapper.
    #[default]
    Python,
    /// This crate.
    Rust,
    /// Raw HTTP with curl.
    Curl,
}

impl SnippetLanguage {
    pub const ALL: [SnippetLanguage; 3] = [
        SnippetLanguage::Python,
        SnippetLanguage::Rust,
        SnippetLanguage::Curl,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            SnippetLanguage::Python => "Python",
            SnippetLanguage::Rust => "Rust",
            SnippetLanguage::Curl => "curl",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnippetOptions {
    pub language: SnippetLanguage,
    /// Key to embed; `None` renders [`KEY_PLACEHOLDER`].
    pub api_key: Option<String>,
}

/// Python snippet with the key placeholder.
pub fn generate_snippet(query: &QueryDescriptor) -> String {
    render(query, &SnippetOptions::default())
}

pub fn render(query: &QueryDescriptor, opts: &SnippetOptions) -> String {
    let key = opts
        .api_key
        .as_deref()
        .filter(|k| !k.trim().is_empty())
        .unwrap_or(KEY_PLACEHOLDER);
    match opts.language {
        SnippetLanguage::Python => python(query, key),
        SnippetLanguage::Rust => rust(query, key),
        SnippetLanguage::Curl => curl(query, key),
    }
}

/// Single-quoted Python string literal.
fn py_str(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

/// Single-quoted POSIX shell word.
fn sh_str(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

fn python(query: &QueryDescriptor, key: &str) -> String {
    let mut s = String::new();
    s.push_str("# First, install the required package:\n# pip install py-bls-api\n\n");
    match query {
        QueryDescriptor::Search { keyword } => {
            s.push_str("from py_bls_api import get_surveys, get_seriesid_metadata\n\n");
            let _ = writeln!(s, "keyword = {}", py_str(keyword));
            s.push_str(
                "surveys = get_surveys()\n\
                 matches = {abbr: name for abbr, name in surveys.items()\n\
                 \x20          if keyword.lower() == abbr.lower() or keyword.lower() in name.lower()}\n\n\
                 for abbr, name in matches.items():\n\
                 \x20   # Returns a dataframe containing Series ID metadata for the survey.\n\
                 \x20   seriesid_metadata = get_seriesid_metadata(name)\n\
                 \x20   print(abbr, name)\n\
                 \x20   print(seriesid_metadata)\n",
            );
        }
        QueryDescriptor::SeriesById { series } | QueryDescriptor::SeriesByRange { series, .. } => {
            let ids: Vec<String> = series.iter().map(|id| py_str(id.as_str())).collect();
            s.push_str("import pandas as pd\nfrom py_bls_api import get_bls_data\n\n");
            let indent = " ".repeat("data, log = get_bls_data(".len());
            let _ = writeln!(s, "data, log = get_bls_data(seriesids=[{}],", ids.join(", "));
            if let Some(r) = query.range() {
                let _ = writeln!(s, "{}startyear={},", indent, r.start());
                let _ = writeln!(s, "{}endyear={},", indent, r.end());
            }
            let _ = writeln!(s, "{}registrationkey={},", indent, py_str(key));
            let _ = writeln!(s, "{}return_logs=True)", indent);
            s.push_str("\nprint(log)\nprint(data)\n");
        }
    }
    s
}

fn rust(query: &QueryDescriptor, key: &str) -> String {
    let fields = match query {
        QueryDescriptor::Search { keyword } => format!("RawFields::search({:?})", keyword),
        QueryDescriptor::SeriesById { series } => {
            format!("RawFields::series_by_id({:?})", join_ids(series))
        }
        QueryDescriptor::SeriesByRange { series, range } => format!(
            "RawFields::series_by_range({:?}, {}, {})",
            join_ids(series),
            range.start(),
            range.end()
        ),
    };
    let mut s = String::new();
    s.push_str(
        "// Cargo.toml: bls-explorer, anyhow\n\
         use bls_explorer::api::{ApiClient, BlsClient};\n\
         use bls_explorer::config::Settings;\n\
         use bls_explorer::query::{build_query, RawFields, ValidationRules};\n\
         use bls_explorer::{shape, storage};\n\n\
         fn main() -> anyhow::Result<()> {\n",
    );
    let _ = writeln!(
        s,
        "    let settings = Settings {{ api_key: Some({:?}.into()), ..Settings::default() }};",
        key
    );
    s.push_str("    let client = BlsClient::new(&settings)?;\n");
    let _ = writeln!(
        s,
        "    let query = build_query(&{}, &ValidationRules::default())?;",
        fields
    );
    s.push_str(
        "    let response = client.execute(&query)?;\n\
         \x20   let table = shape::shape(&response.records, &query)?;\n\
         \x20   storage::save_csv(&table, \"bls.csv\")?;\n\
         \x20   Ok(())\n\
         }\n",
    );
    s
}

fn join_ids(series: &[crate::models::SeriesId]) -> String {
    series
        .iter()
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join(",")
}

fn curl(query: &QueryDescriptor, key: &str) -> String {
    match query {
        QueryDescriptor::Search { keyword } => {
            let mut s = String::new();
            let _ = writeln!(s, "KEYWORD={}", sh_str(keyword));
            let _ = writeln!(
                s,
                "curl -s {} | grep -i -- \"$KEYWORD\"",
                sh_str(&format!("{}/surveys", DEFAULT_BASE_URL))
            );
            s.push_str("# then list popular series of a matching survey, e.g. LN:\n");
            let _ = writeln!(
                s,
                "curl -s {}",
                sh_str(&format!(
                    "{}/timeseries/popular?survey=LN&registrationkey={}",
                    DEFAULT_BASE_URL, key
                ))
            );
            s
        }
        QueryDescriptor::SeriesById { series } | QueryDescriptor::SeriesByRange { series, .. } => {
            let mut body = json!({ "seriesid": series });
            if let Some(r) = query.range() {
                body["startyear"] = r.start().to_string().into();
                body["endyear"] = r.end().to_string().into();
            }
            body["registrationkey"] = key.into();
            let mut s = String::new();
            let _ = writeln!(
                s,
                "curl -s -X POST {} \\",
                sh_str(&format!("{}/timeseries/data/", DEFAULT_BASE_URL))
            );
            s.push_str("  -H 'Content-Type: application/json' \\\n");
            let _ = writeln!(s, "  -d {}", sh_str(&body.to_string()));
            s
        }
    }
}
