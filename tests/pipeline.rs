use chrono::NaiveDate;
use uuid::Uuid;

use store_quadrant::aggregate::{RecordFilter, StoreSelection};
use store_quadrant::models::{Store, Thresholds};
use store_quadrant::period::{DateRange, YearMonth};
use store_quadrant::quadrant::Quadrant;
use store_quadrant::records::{ensure_month_available, RecordDraft};
use store_quadrant::report::{render_markdown, QuadrantReport};
use store_quadrant::settings::{MemorySettingsStore, Settings, SettingsStore};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn entry(store_id: Uuid, date: NaiveDate, revenue: f64, subs: [f64; 3]) -> RecordDraft {
    RecordDraft {
        store_id,
        date,
        revenue_score: revenue,
        standardization: subs[0],
        layout: subs[1],
        culture: subs[2],
    }
}

#[test]
fn quarter_report_uses_saved_targets() {
    let settings_store = MemorySettingsStore::default();
    settings_store
        .save(&Settings::default().with_thresholds(Thresholds {
            target_revenue: 90.0,
            target_compliance: 85.0,
        }))
        .unwrap();
    let thresholds = settings_store.load().unwrap().thresholds();

    let centro = Uuid::new_v4();
    let praia = Uuid::new_v4();
    let closed = Uuid::new_v4();
    let stores = vec![
        Store {
            id: centro,
            name: "Centro".to_string(),
        },
        Store {
            id: praia,
            name: "Praia".to_string(),
        },
    ];

    let mut records = Vec::new();
    for draft in [
        entry(centro, date(2026, 1, 10), 95.0, [90.0, 90.0, 90.0]),
        entry(centro, date(2026, 2, 10), 60.0, [95.0, 95.0, 95.0]),
        entry(praia, date(2026, 1, 12), 120.0, [50.0, 60.0, 70.0]),
        entry(closed, date(2026, 3, 1), 10.0, [10.0, 10.0, 10.0]),
        // Outside the quarter.
        entry(praia, date(2026, 4, 1), 0.0, [0.0, 0.0, 0.0]),
    ] {
        draft.validate().unwrap();
        ensure_month_available(&records, draft.store_id, draft.month(), None).unwrap();
        records.push(draft.into_record(Uuid::new_v4()));
    }

    let filter = RecordFilter {
        date_range: Some(DateRange::new(
            YearMonth::new(2026, 1).unwrap().first_day(),
            YearMonth::new(2026, 3).unwrap().last_day(),
        )),
        stores: StoreSelection::All,
    };
    let report = QuadrantReport::build(&records, &stores, &filter, thresholds);

    let by_name = |name: &str| {
        report
            .classification
            .classified
            .iter()
            .find(|entry| entry.point.store_name == name)
            .unwrap()
    };
    assert_eq!(by_name("Centro").quadrant, Quadrant::Potential);
    assert_eq!(by_name("Praia").quadrant, Quadrant::Risk);
    assert_eq!(by_name("Unknown Store").quadrant, Quadrant::Critical);
    assert_eq!(report.classification.tally[&Quadrant::Success], 0);

    assert_eq!(report.summary.record_count, 4);
    assert_eq!(report.summary.store_count, 3);
    let expected_revenue = (95.0 + 60.0 + 120.0 + 10.0) / 4.0;
    assert!((report.summary.avg_revenue - expected_revenue).abs() < 1e-9);

    let markdown = render_markdown(&report, 10);
    assert!(markdown.contains("## Potential"));
    assert!(markdown.contains("Unknown Store"));
}

#[test]
fn duplicate_month_is_refused_before_write() {
    let store = Uuid::new_v4();
    let existing = vec![entry(store, date(2026, 6, 1), 80.0, [80.0, 80.0, 80.0])
        .into_record(Uuid::new_v4())];
    let retry = entry(store, date(2026, 6, 28), 99.0, [99.0, 99.0, 99.0]);

    let err = ensure_month_available(&existing, store, retry.month(), None).unwrap_err();
    assert_eq!(
        err.to_string(),
        format!("a record already exists for this store this month ({store}, 2026-06)")
    );
}
