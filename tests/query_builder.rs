use bls_explorer::error::Field;
use bls_explorer::models::{QueryDescriptor, QueryMode};
use bls_explorer::query::{RawFields, ValidationRules, build_query};

fn rules() -> ValidationRules {
    ValidationRules::default().with_current_year(2025)
}

#[test]
fn search_keyword_is_trimmed() {
    for input in ["unemployment", "  consumer price index ", "\tCU\n"] {
        let q = build_query(&RawFields::search(input), &rules()).unwrap();
        assert_eq!(q.mode(), QueryMode::Search);
        assert_eq!(q.keyword(), Some(input.trim()));
    }
}

#[test]
fn empty_keyword_is_rejected() {
    let e = build_query(&RawFields::search("   "), &rules()).unwrap_err();
    assert_eq!(e.field, Field::Keyword);
}

#[test]
fn series_by_id_scenario() {
    let q = build_query(&RawFields::series_by_id("LNS14000000"), &rules()).unwrap();
    assert_eq!(q.mode(), QueryMode::SeriesById);
    let ids: Vec<&str> = q.series().iter().map(|s| s.as_str()).collect();
    assert_eq!(ids, vec!["LNS14000000"]);
    assert_eq!(q.range(), None);
}

#[test]
fn end_before_start_scenario() {
    // No series given: the range is checked first.
    let e = build_query(&RawFields::series_by_range("", 2020, 2010), &rules()).unwrap_err();
    assert_eq!(e.field, Field::EndYear);
    assert_eq!(e.message, "end before start");
}

#[test]
fn any_inverted_range_fails() {
    for (start, end) in [(2001, 2000), (2025, 1900), (1950, 1949)] {
        let f = RawFields::series_by_range("CUUR0000SA0", start, end);
        assert!(build_query(&f, &rules()).is_err(), "{start}..{end}");
    }
}

#[test]
fn range_bounds_are_inclusive_and_checked() {
    let ok = build_query(&RawFields::series_by_range("CUUR0000SA0", 1900, 2026), &rules()).unwrap();
    let r = ok.range().unwrap();
    assert_eq!((r.start(), r.end()), (1900, 2026));

    let e = build_query(&RawFields::series_by_range("CUUR0000SA0", 1899, 2000), &rules()).unwrap_err();
    assert_eq!(e.field, Field::StartYear);
    let e = build_query(&RawFields::series_by_range("CUUR0000SA0", 2000, 2027), &rules()).unwrap_err();
    assert_eq!(e.field, Field::EndYear);
    assert!(e.message.contains("out of range"));
}

#[test]
fn non_numeric_year_is_rejected() {
    let e = build_query(&RawFields::series_by_range("CUUR0000SA0", "twenty", 2020), &rules()).unwrap_err();
    assert_eq!(e.field, Field::StartYear);
    assert!(e.message.starts_with("not a year"));
}

#[test]
fn series_ids_are_normalized_and_deduplicated() {
    let q = build_query(
        &RawFields::series_by_id(" lns14000000, CUUR0000SA0;LNS14000000 "),
        &rules(),
    )
    .unwrap();
    let ids: Vec<&str> = q.series().iter().map(|s| s.as_str()).collect();
    assert_eq!(ids, vec!["LNS14000000", "CUUR0000SA0"]);
}

#[test]
fn malformed_series_id_is_rejected() {
    let too_long = "X".repeat(31);
    for bad in ["LN", "LNS-1400", "CUUR0000SA0,ab?c", too_long.as_str()] {
        let e = build_query(&RawFields::series_by_id(bad), &rules()).unwrap_err();
        assert_eq!(e.field, Field::SeriesId, "{bad}");
    }
    let e = build_query(&RawFields::series_by_id(" , "), &rules()).unwrap_err();
    assert_eq!(e.message, "series identifier is empty");
}

#[test]
fn too_many_series_is_rejected() {
    let ids: Vec<String> = (0..51).map(|i| format!("CES{:08}", i)).collect();
    let e = build_query(&RawFields::series_by_id(ids.join(",")), &rules()).unwrap_err();
    assert_eq!(e.field, Field::SeriesId);
    assert!(e.message.starts_with("too many series"));
}

#[test]
fn custom_rules_apply() {
    let strict = ValidationRules::new(2000, 0, 2, r"^LN[A-Z0-9]+$")
        .unwrap()
        .with_current_year(2020);
    assert!(build_query(&RawFields::series_by_id("CUUR0000SA0"), &strict).is_err());
    assert!(build_query(&RawFields::series_by_range("LNS14000000", 2000, 2021), &strict).is_err());
    assert!(build_query(&RawFields::series_by_range("LNS14000000", 2000, 2020), &strict).is_ok());
    assert!(ValidationRules::new(1900, 1, 50, "([unclosed").is_err());
}

#[test]
fn descriptor_serializes_with_mode_tag() {
    let q = build_query(&RawFields::series_by_range("LNS14000000", 2010, 2020), &rules()).unwrap();
    let v = serde_json::to_value(&q).unwrap();
    assert_eq!(v["mode"], "series-by-range");
    assert_eq!(v["series"][0], "LNS14000000");
    assert_eq!(v["range"]["start"], 2010);
    assert!(matches!(q, QueryDescriptor::SeriesByRange { .. }));
}

#[test]
fn bounds_without_series_cannot_infer_a_mode() {
    let f = RawFields {
        start: "2010".into(),
        end: "2020".into(),
        ..Default::default()
    };
    let e = build_query(&f, &rules()).unwrap_err();
    assert_eq!(e.field, Field::Mode);
}

#[test]
fn series_with_one_bound_cannot_infer_a_mode() {
    for (start, end) in [("2010", ""), ("", "2020")] {
        let f = RawFields {
            series: "LNS14000000".into(),
            start: start.into(),
            end: end.into(),
            ..Default::default()
        };
        let e = build_query(&f, &rules()).unwrap_err();
        assert_eq!(e.field, Field::Mode, "start={start:?} end={end:?}");
    }
}
