use bls_explorer::error::Error;
use bls_explorer::models::{Observation, SeriesMeta, ShapedTable};
use bls_explorer::query::{RawFields, ValidationRules, build_query};
use bls_explorer::shape::shape;
use bls_explorer::storage::{self, ExportOptions};
use chrono::NaiveDate;
use std::fs;
use tempfile::tempdir;

fn observations(n: usize) -> ShapedTable {
    ShapedTable::Observations(
        (0..n)
            .map(|i| Observation {
                id: "CUUR0000SA0".into(),
                period: format!("2024M{:02}", 12 - i),
                value: if i == 2 { None } else { Some(300.0 + i as f64 * 0.125) },
                footnote: (i == 1).then(|| "preliminary, subject to revision".to_string()),
            })
            .collect(),
    )
}

fn series() -> ShapedTable {
    ShapedTable::Series(vec![
        SeriesMeta {
            id: "LNS14000000".into(),
            title: "(Seas) Unemployment Rate".into(),
            survey: Some("LN".into()),
            survey_name: Some("Labor Force Statistics including the National Unemployment Rate".into()),
            seasonality: Some("Seasonally Adjusted".into()),
        },
        SeriesMeta {
            id: "CUUR0000SA0".into(),
            title: "All items in U.S. city average, \"all urban consumers\"".into(),
            survey: None,
            survey_name: None,
            seasonality: None,
        },
    ])
}

#[test]
fn csv_header_and_row_count() {
    let dir = tempdir().unwrap();
    let rows = observations(4);
    let path = dir.path().join("cpi.csv");
    storage::save_csv(&rows, &path).unwrap();
    let txt = fs::read_to_string(&path).unwrap();
    assert!(txt.starts_with("id,period,value,footnote\n"));
    assert_eq!(txt.lines().count(), 1 + rows.len());
}

#[test]
fn observation_round_trip_keeps_rows_and_order() {
    let table = observations(5);
    let mut buf = Vec::new();
    storage::write_csv(&table, &mut buf, ExportOptions::default()).unwrap();
    let back = storage::read_csv(buf.as_slice()).unwrap();
    assert_eq!(back, table);
}

#[test]
fn series_round_trip_keeps_quotes_and_commas() {
    let table = series();
    let dir = tempdir().unwrap();
    let path = dir.path().join("search.csv");
    storage::save_csv(&table, &path).unwrap();
    let back = storage::read_csv(fs::File::open(&path).unwrap()).unwrap();
    assert_eq!(back, table);
}

#[test]
fn footnote_column_only_when_present() {
    let table = ShapedTable::Observations(vec![Observation {
        id: "X".into(),
        period: "2023M01".into(),
        value: Some(3.5),
        footnote: None,
    }]);
    let mut buf = Vec::new();
    storage::write_csv(&table, &mut buf, ExportOptions::default()).unwrap();
    assert_eq!(String::from_utf8(buf).unwrap(), "id,period,value\nX,2023M01,3.5\n");
}

#[test]
fn json_export_is_an_array_of_rows() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("cpi.json");
    storage::save_json(&observations(3), &path).unwrap();
    let v: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    let arr = v.as_array().unwrap();
    assert_eq!(arr.len(), 3);
    assert_eq!(arr[0]["period"], "2024M12");
    assert!(arr[2]["value"].is_null());
}

#[test]
fn unwritable_destination_is_an_io_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("missing").join("out.csv");
    let err = storage::save_csv(&observations(1), &path).unwrap_err();
    assert!(matches!(err, Error::Io(_)), "{err:?}");
}

//test that text cells which look like spreadsheet formulas get a quote prefix
//when the guard is on, and that numbers (including negatives) are left alone
#[test]
fn csv_cells_are_prefixed_to_avoid_formulas() {
    let table = ShapedTable::Observations(vec![Observation {
        id: "=HYPERLINK(\"http://evil\")".into(),
        period: "+SUM(A1:A9)".into(),
        value: Some(-0.4),
        footnote: Some("@foo".into()),
    }]);
    let mut buf = Vec::new();
    storage::write_csv(&table, &mut buf, ExportOptions { sanitize_formulas: true }).unwrap();

    let mut rdr = csv::Reader::from_reader(buf.as_slice());
    let row = rdr.records().next().expect("one data row expected").unwrap();
    assert_eq!(&row[0], "'=HYPERLINK(\"http://evil\")");
    assert_eq!(&row[1], "'+SUM(A1:A9)");
    assert_eq!(&row[2], "-0.4");
    assert_eq!(&row[3], "'@foo");
}

#[test]
fn default_file_name_is_dated_and_safe() {
    let rules = ValidationRules::default().with_current_year(2025);
    let date = NaiveDate::from_ymd_opt(2025, 3, 7).unwrap();

    let q = build_query(&RawFields::series_by_id("LNS14000000"), &rules).unwrap();
    assert_eq!(storage::default_file_name(&q, date), "2025-03-07 LNS14000000.csv");

    let q = build_query(
        &RawFields::series_by_range("LNS14000000,CUUR0000SA0", 2015, 2020),
        &rules,
    )
    .unwrap();
    assert_eq!(storage::default_file_name(&q, date), "2025-03-07 LNS14000000.csv");

    let q = build_query(&RawFields::search("wages/hour: \"all\""), &rules).unwrap();
    assert_eq!(storage::default_file_name(&q, date), "2025-03-07 wages_hour_ _all_.csv");
}

#[test]
fn shaped_values_survive_a_csv_round_trip() {
    let q = build_query(&RawFields::series_by_id("LNS14000000"), &ValidationRules::default()).unwrap();
    let records: Vec<_> = serde_json::json!([
        {"id": "LNS14000000", "period": "2024M02", "value": "3.9", "footnote": null},
        {"id": "LNS14000000", "period": "2024M01", "value": "-", "footnote": "preliminary"},
        {"id": "LNS14000000", "period": "2023M12", "value": "1,234.5"}
    ])
    .as_array()
    .unwrap()
    .iter()
    .map(|r| r.as_object().cloned().unwrap())
    .collect();
    let table = shape(&records, &q).unwrap();

    let mut buf = Vec::new();
    storage::write_csv(&table, &mut buf, ExportOptions::default()).unwrap();
    assert_eq!(storage::read_csv(buf.as_slice()).unwrap(), table);
}

#[test]
fn default_file_name_swaps_only_the_extension() {
    let rules = ValidationRules::default().with_current_year(2025);
    let date = NaiveDate::from_ymd_opt(2025, 3, 7).unwrap();
    let q = build_query(&RawFields::search("x.csv"), &rules).unwrap();
    assert_eq!(storage::default_file_name(&q, date), "2025-03-07 x.csv.csv");
    assert_eq!(
        storage::default_file_name_as(&q, date, "json"),
        "2025-03-07 x.csv.json"
    );
}
