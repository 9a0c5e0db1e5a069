use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// One raw record as handed over by the API client: a flat JSON object.
pub type RawRecord = Map<String, Value>;

/// Which operation a query performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QueryMode {
    /// Keyword search over the series catalog.
    Search,
    /// Latest observations for one or more series.
    SeriesById,
    /// Observations for one or more series within an inclusive year range.
    SeriesByRange,
}

impl fmt::Display for QueryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            QueryMode::Search => "search",
            QueryMode::SeriesById => "series-by-id",
            QueryMode::SeriesByRange => "series-by-range",
        };
        f.write_str(s)
    }
}

/// A validated BLS series identifier (trimmed, upper-case).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct SeriesId(String);

impl SeriesId {
    /// Only the query builder mints identifiers; it has checked the pattern.
    pub(crate) fn new_unchecked(id: String) -> Self {
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SeriesId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SeriesId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Inclusive year range with `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct YearRange {
    start: i32,
    end: i32,
}

impl YearRange {
    pub(crate) fn new_unchecked(start: i32, end: i32) -> Self {
        debug_assert!(start <= end);
        Self { start, end }
    }

    pub fn start(&self) -> i32 {
        self.start
    }

    pub fn end(&self) -> i32 {
        self.end
    }

    /// Split into consecutive windows of at most `size` years, newest window first.
    pub fn windows(&self, size: i32) -> Vec<YearRange> {
        let size = size.max(1);
        let mut out = Vec::new();
        let mut end = self.end;
        while end >= self.start {
            let start = (end - size + 1).max(self.start);
            out.push(YearRange { start, end });
            end = start - 1;
        }
        out
    }
}

impl fmt::Display for YearRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

/// Normalized, immutable description of one search or fetch.
///
/// Obtained from [`crate::query::build_query`]; each variant carries exactly the
/// fields its mode needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "kebab-case")]
pub enum QueryDescriptor {
    Search { keyword: String },
    SeriesById { series: Vec<SeriesId> },
    SeriesByRange { series: Vec<SeriesId>, range: YearRange },
}

impl QueryDescriptor {
    pub fn mode(&self) -> QueryMode {
        match self {
            QueryDescriptor::Search { .. } => QueryMode::Search,
            QueryDescriptor::SeriesById { .. } => QueryMode::SeriesById,
            QueryDescriptor::SeriesByRange { .. } => QueryMode::SeriesByRange,
        }
    }

    pub fn keyword(&self) -> Option<&str> {
        match self {
            QueryDescriptor::Search { keyword } => Some(keyword.as_str()),
            _ => None,
        }
    }

    /// Requested series; empty for search.
    pub fn series(&self) -> &[SeriesId] {
        match self {
            QueryDescriptor::Search { .. } => &[],
            QueryDescriptor::SeriesById { series } => series,
            QueryDescriptor::SeriesByRange { series, .. } => series,
        }
    }

    pub fn range(&self) -> Option<YearRange> {
        match self {
            QueryDescriptor::SeriesByRange { range, .. } => Some(*range),
            _ => None,
        }
    }

    /// Short human label, used for file names and window titles.
    pub fn label(&self) -> String {
        match self {
            QueryDescriptor::Search { keyword } => keyword.clone(),
            QueryDescriptor::SeriesById { series } => series_label(series),
            QueryDescriptor::SeriesByRange { series, range } => {
                format!("{} {}", series_label(series), range)
            }
        }
    }
}

fn series_label(series: &[SeriesId]) -> String {
    match series.len() {
        0 => String::new(),
        1 => series[0].to_string(),
        n => format!("{} and {} more", series[0], n - 1),
    }
}

/// One search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesMeta {
    pub id: String,
    pub title: String,
    pub survey: Option<String>,
    pub survey_name: Option<String>,
    pub seasonality: Option<String>,
}

/// One value of a series at one period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub id: String,
    /// Year followed by the BLS period code, e.g. `2023M01`.
    pub period: String,
    /// `None` when the API reports the value as not available.
    pub value: Option<f64>,
    pub footnote: Option<String>,
}

pub const SERIES_FIELDS: [&str; 5] = ["id", "title", "survey", "survey_name", "seasonality"];
pub const OBSERVATION_FIELDS: [&str; 4] = ["id", "period", "value", "footnote"];

/// Uniform table handed to display and export. Never mixes row kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum ShapedTable {
    Series(Vec<SeriesMeta>),
    Observations(Vec<Observation>),
}

impl ShapedTable {
    /// Column names in their fixed order.
    ///
    /// Observation tables only carry a `footnote` column when some row has one.
    pub fn fields(&self) -> Vec<&'static str> {
        match self {
            ShapedTable::Series(_) => SERIES_FIELDS.to_vec(),
            ShapedTable::Observations(rows) => {
                let n = if rows.iter().any(|r| r.footnote.is_some()) { 4 } else { 3 };
                OBSERVATION_FIELDS[..n].to_vec()
            }
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ShapedTable::Series(rows) => rows.len(),
            ShapedTable::Observations(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rows rendered as text cells, aligned with [`ShapedTable::fields`].
    pub fn rows(&self) -> Vec<Vec<String>> {
        let opt = |v: &Option<String>| v.clone().unwrap_or_default();
        match self {
            ShapedTable::Series(rows) => rows
                .iter()
                .map(|r| {
                    vec![
                        r.id.clone(),
                        r.title.clone(),
                        opt(&r.survey),
                        opt(&r.survey_name),
                        opt(&r.seasonality),
                    ]
                })
                .collect(),
            ShapedTable::Observations(rows) => {
                let with_footnote = self.fields().len() == 4;
                rows.iter()
                    .map(|r| {
                        let mut cells = vec![
                            r.id.clone(),
                            r.period.clone(),
                            r.value.map(|v| v.to_string()).unwrap_or_default(),
                        ];
                        if with_footnote {
                            cells.push(opt(&r.footnote));
                        }
                        cells
                    })
                    .collect()
            }
        }
    }
}

/// Result of one API client call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApiResponse {
    pub records: Vec<RawRecord>,
    /// Non-fatal notices returned alongside the data.
    pub messages: Vec<String>,
}

/// A BLS dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Survey {
    #[serde(rename = "survey_abbreviation")]
    pub abbreviation: String,
    #[serde(rename = "survey_name")]
    pub name: String,
}

/// Top-level envelope of every BLS v2 response.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    pub status: String,
    #[serde(default)]
    pub message: Vec<String>,
    #[serde(rename = "Results")]
    pub results: Option<T>,
}

pub const STATUS_SUCCEEDED: &str = "REQUEST_SUCCEEDED";

#[derive(Debug, Clone, Deserialize)]
pub struct SurveyResults {
    #[serde(default)]
    pub survey: Vec<Survey>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeriesResults {
    #[serde(default)]
    pub series: Vec<SeriesData>,
}

/// One series block of a data or popular-series response.
#[derive(Debug, Clone, Deserialize)]
pub struct SeriesData {
    #[serde(rename = "seriesID")]
    pub series_id: String,
    pub catalog: Option<Catalog>,
    #[serde(default)]
    pub data: Vec<DataEntry>,
}

/// Catalog block returned when `catalog=true` and a registration key is supplied.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Catalog {
    pub series_title: Option<String>,
    pub seasonality: Option<String>,
    pub survey_name: Option<String>,
    pub survey_abbreviation: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DataEntry {
    pub year: String,
    pub period: String,
    #[serde(rename = "periodName", default)]
    pub period_name: Option<String>,
    pub value: String,
    #[serde(default)]
    pub footnotes: Vec<Footnote>,
}

/// Footnotes are often sent as `[{}]`, so every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Footnote {
    pub code: Option<String>,
    pub text: Option<String>,
}

impl DataEntry {
    /// Flatten into the observation record layout the shaper expects.
    pub fn to_record(&self, series_id: &str) -> RawRecord {
        let mut rec = RawRecord::new();
        rec.insert("id".into(), Value::String(series_id.to_string()));
        rec.insert(
            "period".into(),
            Value::String(format!("{}{}", self.year.trim(), self.period.trim())),
        );
        rec.insert("value".into(), Value::String(self.value.trim().to_string()));
        let notes: Vec<&str> = self
            .footnotes
            .iter()
            .filter_map(|f| f.text.as_deref())
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect();
        let footnote = if notes.is_empty() {
            Value::Null
        } else {
            Value::String(notes.join("; "))
        };
        rec.insert("footnote".into(), footnote);
        rec
    }
}

impl SeriesData {
    /// Flatten the catalog block into a metadata record.
    pub fn to_meta_record(&self) -> RawRecord {
        let cat = self.catalog.clone().unwrap_or_default();
        let s = |v: Option<String>| v.map(Value::String).unwrap_or(Value::Null);
        let mut rec = RawRecord::new();
        rec.insert("id".into(), Value::String(self.series_id.clone()));
        rec.insert(
            "title".into(),
            Value::String(cat.series_title.unwrap_or_default()),
        );
        rec.insert("survey".into(), s(cat.survey_abbreviation));
        rec.insert("survey_name".into(), s(cat.survey_name));
        rec.insert("seasonality".into(), s(cat.seasonality));
        rec
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn windows_cover_range_newest_first() {
        let r = YearRange::new_unchecked(1990, 2024);
        let w = r.windows(20);
        assert_eq!(w, vec![YearRange::new_unchecked(2005, 2024), YearRange::new_unchecked(1990, 2004)]);
        assert_eq!(r.windows(10).len(), 4);
        assert_eq!(YearRange::new_unchecked(2020, 2020).windows(10).len(), 1);
    }

    #[test]
    fn label_summarizes_series() {
        let q = QueryDescriptor::SeriesById {
            series: vec![
                SeriesId::new_unchecked("LNS14000000".into()),
                SeriesId::new_unchecked("CUUR0000SA0".into()),
            ],
        };
        assert_eq!(q.label(), "LNS14000000 and 1 more");
    }

    #[test]
    fn footnotes_are_joined_and_blank_ones_dropped() {
        let e: DataEntry = serde_json::from_str(
            r#"{"year":"2023","period":"Q04","value":"1.2",
                "footnotes":[{"code":"P","text":"preliminary"},{},{"text":" "},{"text":"revised"}]}"#,
        )
        .unwrap();
        let rec = e.to_record("PRS85006092");
        assert_eq!(rec["period"], "2023Q04");
        assert_eq!(rec["footnote"], "preliminary; revised");
    }
}
