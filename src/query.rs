//! Query builder: turns raw form/CLI input into a [`QueryDescriptor`].
//!
//! ```
//! use bls_explorer::query::{build_query, RawFields, ValidationRules};
//! use bls_explorer::models::QueryMode;
//!
//! let fields = RawFields::series_by_id("lns14000000");
//! let q = build_query(&fields, &ValidationRules::default()).unwrap();
//! assert_eq!(q.mode(), QueryMode::SeriesById);
//! assert_eq!(q.series()[0].as_str(), "LNS14000000");
//! ```

use crate::error::{Field, ValidationError};
use crate::models::{QueryDescriptor, QueryMode, SeriesId, YearRange};
use anyhow::Context;
use chrono::Datelike;
use regex::Regex;

pub const DEFAULT_SERIES_PATTERN: &str = r"^[A-Z0-9]{3,30}$";

/// Input exactly as collected by a UI. Years stay text so parsing is validated here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawFields {
    /// `None` lets the builder infer the mode from which fields are filled.
    pub mode: Option<QueryMode>,
    pub keyword: String,
    /// One or more identifiers separated by commas, semicolons or whitespace.
    pub series: String,
    pub start: String,
    pub end: String,
}

impl RawFields {
    pub fn search(keyword: impl Into<String>) -> Self {
        Self {
            mode: Some(QueryMode::Search),
            keyword: keyword.into(),
            ..Default::default()
        }
    }

    pub fn series_by_id(series: impl Into<String>) -> Self {
        Self {
            mode: Some(QueryMode::SeriesById),
            series: series.into(),
            ..Default::default()
        }
    }

    pub fn series_by_range(series: impl Into<String>, start: impl ToString, end: impl ToString) -> Self {
        Self {
            mode: Some(QueryMode::SeriesByRange),
            series: series.into(),
            start: start.to_string(),
            end: end.to_string(),
            ..Default::default()
        }
    }
}

/// Tunable validation bounds.
#[derive(Debug, Clone)]
pub struct ValidationRules {
    pub min_year: i32,
    pub max_year_ahead: i32,
    pub max_series: usize,
    series_pattern: Regex,
    current_year: Option<i32>,
}

impl Default for ValidationRules {
    fn default() -> Self {
        Self {
            min_year: 1900,
            max_year_ahead: 1,
            max_series: 50,
            series_pattern: Regex::new(DEFAULT_SERIES_PATTERN).expect("default series pattern"),
            current_year: None,
        }
    }
}

impl ValidationRules {
    pub fn new(
        min_year: i32,
        max_year_ahead: i32,
        max_series: usize,
        series_pattern: &str,
    ) -> anyhow::Result<Self> {
        let series_pattern = Regex::new(series_pattern)
            .with_context(|| format!("invalid series pattern {:?}", series_pattern))?;
        Ok(Self {
            min_year,
            max_year_ahead,
            max_series,
            series_pattern,
            current_year: None,
        })
    }

    /// Pin "today" instead of reading the clock.
    pub fn with_current_year(mut self, year: i32) -> Self {
        self.current_year = Some(year);
        self
    }

    pub fn max_year(&self) -> i32 {
        self.current_year
            .unwrap_or_else(|| chrono::Local::now().year())
            + self.max_year_ahead
    }

    fn check_year(&self, year: i32, field: Field) -> Result<i32, ValidationError> {
        let max = self.max_year();
        if year < self.min_year || year > max {
            return Err(ValidationError::new(
                field,
                format!("year {} out of range {}..={}", year, self.min_year, max),
            ));
        }
        Ok(year)
    }
}

/// Split a free-form identifier list on commas, semicolons and whitespace.
pub fn split_ids(s: &str) -> Vec<String> {
    s.split(|c: char| c == ',' || c == ';' || c.is_whitespace())
        .map(|x| x.trim().to_string())
        .filter(|x| !x.is_empty())
        .collect()
}

/// Validate raw fields and produce an immutable descriptor.
pub fn build_query(
    fields: &RawFields,
    rules: &ValidationRules,
) -> Result<QueryDescriptor, ValidationError> {
    let mode = match fields.mode {
        Some(m) => m,
        None => infer_mode(fields)?,
    };
    match mode {
        QueryMode::Search => {
            let keyword = fields.keyword.trim();
            if keyword.is_empty() {
                return Err(ValidationError::new(Field::Keyword, "keyword is empty"));
            }
            Ok(QueryDescriptor::Search {
                keyword: keyword.to_string(),
            })
        }
        QueryMode::SeriesById => Ok(QueryDescriptor::SeriesById {
            series: parse_series(&fields.series, rules)?,
        }),
        QueryMode::SeriesByRange => {
            let range = parse_range(&fields.start, &fields.end, rules)?;
            let series = parse_series(&fields.series, rules)?;
            Ok(QueryDescriptor::SeriesByRange { series, range })
        }
    }
}

fn infer_mode(fields: &RawFields) -> Result<QueryMode, ValidationError> {
    let has_keyword = !fields.keyword.trim().is_empty();
    let has_series = !fields.series.trim().is_empty();
    let has_start = !fields.start.trim().is_empty();
    let has_end = !fields.end.trim().is_empty();
    match (has_keyword, has_series, has_start, has_end) {
        (true, false, false, false) => Ok(QueryMode::Search),
        (false, true, false, false) => Ok(QueryMode::SeriesById),
        (false, true, true, true) => Ok(QueryMode::SeriesByRange),
        (true, _, _, _) => Err(ValidationError::new(
            Field::Mode,
            "a keyword cannot be combined with series or years; choose search or fetch",
        )),
        (false, false, false, false) => Err(ValidationError::new(
            Field::Mode,
            "nothing to query: enter a keyword or a series identifier",
        )),
        (false, false, _, _) => Err(ValidationError::new(
            Field::Mode,
            "a year range needs at least one series identifier",
        )),
        (false, true, _, _) => Err(ValidationError::new(
            Field::Mode,
            "a year range needs both a start and an end year",
        )),
    }
}

fn parse_series(text: &str, rules: &ValidationRules) -> Result<Vec<SeriesId>, ValidationError> {
    let mut out: Vec<SeriesId> = Vec::new();
    for raw in split_ids(text) {
        let id = raw.to_ascii_uppercase();
        if !rules.series_pattern.is_match(&id) {
            return Err(ValidationError::new(
                Field::SeriesId,
                format!("malformed series identifier: {}", raw),
            ));
        }
        let id = SeriesId::new_unchecked(id);
        if !out.contains(&id) {
            out.push(id);
        }
    }
    if out.is_empty() {
        return Err(ValidationError::new(Field::SeriesId, "series identifier is empty"));
    }
    if out.len() > rules.max_series {
        return Err(ValidationError::new(
            Field::SeriesId,
            format!("too many series: {} (at most {})", out.len(), rules.max_series),
        ));
    }
    Ok(out)
}

fn parse_year(text: &str, field: Field, rules: &ValidationRules) -> Result<i32, ValidationError> {
    let t = text.trim();
    if t.is_empty() {
        let which = if field == Field::StartYear { "start" } else { "end" };
        return Err(ValidationError::new(field, format!("{} year is required", which)));
    }
    let year = t
        .parse::<i32>()
        .map_err(|_| ValidationError::new(field, format!("not a year: {}", t)))?;
    rules.check_year(year, field)
}

fn parse_range(start: &str, end: &str, rules: &ValidationRules) -> Result<YearRange, ValidationError> {
    let start = parse_year(start, Field::StartYear, rules)?;
    let end = parse_year(end, Field::EndYear, rules)?;
    if start > end {
        return Err(ValidationError::new(Field::EndYear, "end before start"));
    }
    Ok(YearRange::new_unchecked(start, end))
}
