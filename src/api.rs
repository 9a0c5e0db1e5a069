//! Synchronous client for the **BLS Public Data API (v2)**.
//!
//! The rest of the crate only sees the [`ApiClient`] trait: one call per query,
//! returning flat JSON records. Everything specific to the wire format lives here:
//! the `Results` envelope, the 50-series and 20-year request limits, catalog lookups
//! and the keyword search built on top of the survey and popular-series endpoints.
//!
//! ### Notes
//! - Without a registration key the API limits requests to 10 years and omits
//!   catalog metadata (titles, survey names).
//! - Observations come back newest first; that order is kept.
//! - Transient failures (5xx, connection errors) are retried a few times with a
//!   short backoff. Anything else is returned as an [`UpstreamError`].
//!
//! Typical usage:
//! ```no_run
//! # use bls_explorer::api::{ApiClient, BlsClient};
//! # use bls_explorer::config::Settings;
//! # use bls_explorer::query::{build_query, RawFields, ValidationRules};
//! let client = BlsClient::new(&Settings::default())?;
//! let q = build_query(&RawFields::series_by_range("LNS14000000", 2020, 2024), &ValidationRules::default())?;
//! let resp = client.execute(&q)?;
//! # Ok::<(), anyhow::Error>(())
//! ```

use crate::config::Settings;
use crate::error::{UpstreamError, UpstreamKind};
use crate::models::{
    ApiResponse, Envelope, QueryDescriptor, RawRecord, STATUS_SUCCEEDED, SeriesData, SeriesId,
    SeriesResults, Survey, SurveyResults, YearRange,
};
use log::{debug, info, warn};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC};
use reqwest::blocking::{Client as HttpClient, RequestBuilder};
use reqwest::redirect::Policy;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::time::Duration;

/// Most series the API accepts in one data request.
pub const MAX_SERIES_PER_REQUEST: usize = 50;
/// Longest year span per request with a registration key.
pub const MAX_YEARS_REGISTERED: i32 = 20;
/// Longest year span per request without one.
pub const MAX_YEARS_UNREGISTERED: i32 = 10;

/// The capability the query pipeline consumes.
pub trait ApiClient {
    /// Run the query and return its raw records, or the reason it failed.
    fn execute(&self, query: &QueryDescriptor) -> Result<ApiResponse, UpstreamError>;
}

impl<T: ApiClient + ?Sized> ApiClient for &T {
    fn execute(&self, query: &QueryDescriptor) -> Result<ApiResponse, UpstreamError> {
        (**self).execute(query)
    }
}

#[derive(Debug, Clone)]
pub struct BlsClient {
    pub base_url: String,
    api_key: Option<String>,
    search_limit: usize,
    http: HttpClient,
}

// Allow -, _, . unescaped in path/query values
const SAFE: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.');

fn enc(s: &str) -> String {
    percent_encoding::utf8_percent_encode(s.trim(), SAFE).to_string()
}

fn network(e: reqwest::Error) -> UpstreamError {
    UpstreamError::new(UpstreamKind::Network, e.to_string())
}

/// Check the envelope status and split it into results and notices.
pub fn unwrap_envelope<T>(env: Envelope<T>) -> Result<(T, Vec<String>), UpstreamError> {
    if env.status != STATUS_SUCCEEDED {
        let detail = if env.message.is_empty() {
            env.status.clone()
        } else {
            format!("{}: {}", env.status, env.message.join("; "))
        };
        return Err(UpstreamError::new(UpstreamKind::Rejected, detail));
    }
    match env.results {
        Some(r) => Ok((r, env.message)),
        None => Err(UpstreamError::new(
            UpstreamKind::Decode,
            "response has no Results section",
        )),
    }
}

impl BlsClient {
    pub fn new(settings: &Settings) -> Result<Self, UpstreamError> {
        let http = HttpClient::builder()
            .timeout(Duration::from_secs(settings.timeout_secs)) // total request timeout
            .connect_timeout(Duration::from_secs(10))
            .redirect(Policy::limited(5))
            .user_agent(concat!("bls_explorer/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(network)?;
        Ok(Self {
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key: settings
                .api_key
                .clone()
                .filter(|k| !k.trim().is_empty()),
            search_limit: settings.search_limit.max(1),
            http,
        })
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    fn max_years(&self) -> i32 {
        if self.has_api_key() {
            MAX_YEARS_REGISTERED
        } else {
            MAX_YEARS_UNREGISTERED
        }
    }

    /// Small retry for transient failures (5xx / network errors).
    fn send<T: DeserializeOwned>(
        &self,
        what: &str,
        build: impl Fn() -> RequestBuilder,
    ) -> Result<Envelope<T>, UpstreamError> {
        let mut last_err: Option<UpstreamError> = None;
        for backoff_ms in [100u64, 300, 700] {
            match build().send() {
                Ok(r) if r.status().is_success() => {
                    return r.json::<Envelope<T>>().map_err(|e| {
                        UpstreamError::new(UpstreamKind::Decode, format!("{}: {}", what, e))
                    });
                }
                Ok(r) if r.status().is_server_error() => {
                    last_err = Some(UpstreamError::new(
                        UpstreamKind::Status,
                        format!("{} failed with HTTP {}", what, r.status()),
                    ));
                }
                Ok(r) => {
                    return Err(UpstreamError::new(
                        UpstreamKind::Status,
                        format!("{} failed with HTTP {}", what, r.status()),
                    ));
                }
                Err(e) => last_err = Some(network(e)),
            }
            debug!("{} failed, retrying in {}ms", what, backoff_ms);
            std::thread::sleep(Duration::from_millis(backoff_ms));
        }
        Err(last_err.unwrap_or_else(|| UpstreamError::new(UpstreamKind::Network, what.to_string())))
    }

    fn get_url(&self, path: &str, params: &[(&str, &str)]) -> String {
        let mut url = format!("{}/{}", self.base_url, path);
        let mut params: Vec<(&str, &str)> = params.to_vec();
        if let Some(k) = self.api_key.as_deref() {
            params.push(("registrationkey", k));
        }
        for (i, (k, v)) in params.iter().enumerate() {
            url.push(if i == 0 { '?' } else { '&' });
            url.push_str(&format!("{}={}", k, enc(v)));
        }
        url
    }

    /// All surveys (datasets) the API knows about.
    pub fn surveys(&self) -> Result<Vec<Survey>, UpstreamError> {
        let url = self.get_url("surveys", &[]);
        debug!("GET {}/surveys", self.base_url);
        let env: Envelope<SurveyResults> = self.send("GET surveys", || self.http.get(&url))?;
        let (res, _) = unwrap_envelope(env)?;
        Ok(res.survey)
    }

    /// Popular series ids, for one survey or across all of them.
    pub fn popular_series(&self, survey: Option<&str>) -> Result<Vec<String>, UpstreamError> {
        let params: Vec<(&str, &str)> = survey.map(|s| vec![("survey", s)]).unwrap_or_default();
        let url = self.get_url("timeseries/popular", &params);
        debug!("GET popular series (survey={:?})", survey);
        let env: Envelope<SeriesResults> =
            self.send("GET popular series", || self.http.get(&url))?;
        let (res, _) = unwrap_envelope(env)?;
        Ok(res.series.into_iter().map(|s| s.series_id).collect())
    }

    /// One data request: at most 50 series and one year window.
    fn post_data(
        &self,
        series: &[&str],
        window: Option<YearRange>,
        catalog: bool,
        latest: bool,
    ) -> Result<(Vec<SeriesData>, Vec<String>), UpstreamError> {
        let mut body = json!({ "seriesid": series });
        if let Some(w) = window {
            body["startyear"] = Value::String(w.start().to_string());
            body["endyear"] = Value::String(w.end().to_string());
        }
        if catalog {
            body["catalog"] = Value::Bool(true);
        }
        if latest {
            body["latest"] = Value::Bool(true);
        }
        if let Some(k) = self.api_key.as_deref() {
            body["registrationkey"] = Value::String(k.to_string());
        }
        let url = format!("{}/timeseries/data/", self.base_url);
        debug!("POST {} series={:?} window={:?}", url, series, window);
        let env: Envelope<SeriesResults> =
            self.send("POST timeseries/data", || self.http.post(&url).json(&body))?;
        let (res, messages) = unwrap_envelope(env)?;
        Ok((res.series, messages))
    }

    /// Observations for the given series, grouped by series in request order.
    pub fn fetch_data(
        &self,
        series: &[SeriesId],
        range: Option<YearRange>,
    ) -> Result<ApiResponse, UpstreamError> {
        let windows: Vec<Option<YearRange>> = match range {
            Some(r) => r.windows(self.max_years()).into_iter().map(Some).collect(),
            None => vec![None],
        };
        debug!(
            "fetching {} series in {} window(s)",
            series.len(),
            windows.len()
        );

        let mut responses = Vec::new();
        for window in windows {
            for chunk in series.chunks(MAX_SERIES_PER_REQUEST) {
                let ids: Vec<&str> = chunk.iter().map(SeriesId::as_str).collect();
                responses.push(self.post_data(&ids, window, false, false)?);
            }
        }
        let merged = merge_blocks(series, responses)?;
        info!("fetched {} observations", merged.records.len());
        Ok(merged)
    }

    /// Keyword search over the series catalog.
    ///
    /// Surveys whose abbreviation equals the keyword or whose name contains it
    /// contribute their popular series. When no survey matches, the global popular
    /// list is filtered by series title instead.
    pub fn search(&self, keyword: &str) -> Result<ApiResponse, UpstreamError> {
        let kw = keyword.trim().to_lowercase();
        let surveys = self.surveys()?;
        let names: HashMap<String, String> = surveys
            .iter()
            .map(|s| (s.abbreviation.clone(), s.name.clone()))
            .collect();
        let matched: Vec<&Survey> = surveys
            .iter()
            .filter(|s| s.abbreviation.to_lowercase() == kw || s.name.to_lowercase().contains(&kw))
            .collect();
        debug!("{} survey(s) match {:?}", matched.len(), keyword);

        // (series id, survey it was found under)
        let mut candidates: Vec<(String, Option<String>)> = Vec::new();
        let filter_by_title = matched.is_empty();
        if filter_by_title {
            for id in self.popular_series(None)? {
                candidates.push((id, None));
            }
        } else {
            for s in &matched {
                for id in self.popular_series(Some(s.abbreviation.as_str()))? {
                    candidates.push((id, Some(s.abbreviation.clone())));
                }
                if candidates.len() >= self.search_limit {
                    break;
                }
            }
            candidates.truncate(self.search_limit);
        }
        let mut seen = std::collections::HashSet::new();
        candidates.retain(|(id, _)| seen.insert(id.clone()));

        if !self.has_api_key() {
            warn!("series titles need a registration key; search results will be untitled");
        }

        let mut blocks: Vec<SeriesData> = Vec::new();
        let mut messages: Vec<String> = Vec::new();
        for chunk in candidates.chunks(MAX_SERIES_PER_REQUEST) {
            let ids: Vec<&str> = chunk.iter().map(|(id, _)| id.as_str()).collect();
            let (found, notes) = self.post_data(&ids, None, true, true)?;
            blocks.extend(found);
            messages.extend(notes);
        }
        let title_filter = filter_by_title.then_some(kw.as_str());
        let records = search_hits(&candidates, blocks, &names, title_filter, self.search_limit);
        info!("search {:?} returned {} series", keyword, records.len());
        Ok(ApiResponse { records, messages })
    }
}

/// Group data blocks from every request by series, in request order.
///
/// Windows are requested newest first, so each series' rows stay newest first.
/// When nothing came back and the API says a series does not exist, the whole
/// request is reported as [`UpstreamKind::NotFound`].
fn merge_blocks(
    series: &[SeriesId],
    responses: Vec<(Vec<SeriesData>, Vec<String>)>,
) -> Result<ApiResponse, UpstreamError> {
    let mut per_series: Vec<(String, Vec<RawRecord>)> = series
        .iter()
        .map(|s| (s.to_string(), Vec::new()))
        .collect();
    let mut messages: Vec<String> = Vec::new();

    for (blocks, notes) in responses {
        messages.extend(notes);
        for block in blocks {
            let records = block.data.iter().map(|d| d.to_record(&block.series_id));
            match per_series.iter_mut().find(|(id, _)| *id == block.series_id) {
                Some((_, rows)) => rows.extend(records),
                None => per_series.push((block.series_id.clone(), records.collect())),
            }
        }
    }

    if per_series.iter().all(|(_, rows)| rows.is_empty())
        && messages.iter().any(|m| m.contains("does not exist"))
    {
        return Err(UpstreamError::new(UpstreamKind::NotFound, messages.join("; ")));
    }
    for m in &messages {
        warn!("bls api: {}", m);
    }

    let records = per_series.into_iter().flat_map(|(_, r)| r).collect();
    Ok(ApiResponse { records, messages })
}

/// Turn catalog blocks into search hits.
///
/// `candidates` pairs each requested id with the survey it was found under; that
/// survey fills in when the catalog has none. With `title_filter`, only series
/// whose title or id contains it are kept.
fn search_hits(
    candidates: &[(String, Option<String>)],
    blocks: Vec<SeriesData>,
    survey_names: &HashMap<String, String>,
    title_filter: Option<&str>,
    limit: usize,
) -> Vec<RawRecord> {
    let mut records: Vec<RawRecord> = Vec::new();
    for block in blocks {
        let mut rec = block.to_meta_record();
        let origin = candidates
            .iter()
            .find(|(id, _)| *id == block.series_id)
            .and_then(|(_, s)| s.clone());
        if rec.get("survey").is_none_or(Value::is_null)
            && let Some(abbr) = origin
        {
            let name = survey_names.get(&abbr).cloned();
            rec.insert("survey".into(), Value::String(abbr));
            rec.insert(
                "survey_name".into(),
                name.map(Value::String).unwrap_or(Value::Null),
            );
        }
        if let Some(kw) = title_filter {
            let title = rec
                .get("title")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_lowercase();
            if !title.contains(kw) && !block.series_id.to_lowercase().contains(kw) {
                continue;
            }
        }
        records.push(rec);
        if records.len() >= limit {
            break;
        }
    }
    records
}

impl ApiClient for BlsClient {
    fn execute(&self, query: &QueryDescriptor) -> Result<ApiResponse, UpstreamError> {
        match query {
            QueryDescriptor::Search { keyword } => self.search(keyword),
            QueryDescriptor::SeriesById { series } => self.fetch_data(series, None),
            QueryDescriptor::SeriesByRange { series, range } => {
                self.fetch_data(series, Some(*range))
            }
        }
    }
}
