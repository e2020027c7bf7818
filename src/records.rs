use chrono::NaiveDate;
use uuid::Uuid;

use crate::aggregate::StoreSelection;
use crate::error::StoreError;
use crate::models::{MetricRecord, Store};
use crate::period::YearMonth;

/// Label shown for records whose store no longer exists.
pub const MISSING_STORE_LABEL: &str = "N/A";

/// Compliance is the plain mean of the three sub-scores.
pub fn compliance_score(standardization: f64, layout: f64, culture: f64) -> f64 {
    (standardization + layout + culture) / 3.0
}

fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// A record as entered, before it has an id.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordDraft {
    pub store_id: Uuid,
    pub date: NaiveDate,
    pub revenue_score: f64,
    pub standardization: f64,
    pub layout: f64,
    pub culture: f64,
}

impl RecordDraft {
    pub fn validate(&self) -> Result<(), StoreError> {
        if !self.revenue_score.is_finite() || self.revenue_score < 0.0 {
            return Err(StoreError::InvalidInput(format!(
                "revenue score must be a non-negative number, got {}",
                self.revenue_score
            )));
        }

        for (label, value) in [
            ("standardization", self.standardization),
            ("layout", self.layout),
            ("culture", self.culture),
        ] {
            if !(0.0..=100.0).contains(&value) {
                return Err(StoreError::InvalidInput(format!(
                    "{label} must be between 0 and 100, got {value}"
                )));
            }
        }

        Ok(())
    }

    pub fn month(&self) -> YearMonth {
        YearMonth::of(self.date)
    }

    pub fn into_record(self, id: Uuid) -> MetricRecord {
        MetricRecord {
            id,
            store_id: self.store_id,
            date: self.date,
            revenue_score: self.revenue_score,
            standardization: self.standardization,
            layout: self.layout,
            culture: self.culture,
            compliance_score: round_one_decimal(compliance_score(
                self.standardization,
                self.layout,
                self.culture,
            )),
        }
    }
}

/// Best-effort check against a local snapshot that no other record covers
/// the same store and month. `editing` is the id of the record being
/// replaced, which may keep its own slot. Concurrent writers can still race
/// past this; the database constraint is authoritative.
pub fn ensure_month_available(
    existing: &[MetricRecord],
    store_id: Uuid,
    month: YearMonth,
    editing: Option<Uuid>,
) -> Result<(), StoreError> {
    let taken = existing.iter().any(|record| {
        record.store_id == store_id
            && YearMonth::of(record.date) == month
            && Some(record.id) != editing
    });

    if taken {
        Err(StoreError::Conflict { store_id, month })
    } else {
        Ok(())
    }
}

/// New and edited records may only point at stores that exist. The
/// "Unknown Store" fallback is for stores deleted afterwards.
pub fn ensure_store_exists(stores: &[Store], store_id: Uuid) -> Result<(), StoreError> {
    if stores.iter().any(|store| store.id == store_id) {
        Ok(())
    } else {
        Err(StoreError::NotFound {
            kind: "store",
            id: store_id,
        })
    }
}

/// Records for one month and store selection, newest first.
pub fn records_for_month<'a>(
    records: &'a [MetricRecord],
    month: YearMonth,
    selection: &StoreSelection,
) -> Vec<&'a MetricRecord> {
    let mut matching: Vec<&MetricRecord> = records
        .iter()
        .filter(|record| month.contains(record.date) && selection.includes(&record.store_id))
        .collect();
    matching.sort_by(|a, b| b.date.cmp(&a.date));
    matching
}

pub fn store_label(stores: &[Store], store_id: Uuid) -> &str {
    stores
        .iter()
        .find(|store| store.id == store_id)
        .map(|store| store.name.as_str())
        .unwrap_or(MISSING_STORE_LABEL)
}

/// Trims a store name, rejecting blank ones.
pub fn normalize_store_name(name: &str) -> Result<String, StoreError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(StoreError::InvalidInput(
            "store name must not be empty".to_string(),
        ));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{aggregate, RecordFilter};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn draft(store_id: Uuid, date: NaiveDate) -> RecordDraft {
        RecordDraft {
            store_id,
            date,
            revenue_score: 92.0,
            standardization: 80.0,
            layout: 90.0,
            culture: 85.0,
        }
    }

    #[test]
    fn compliance_is_mean_of_sub_scores() {
        assert!((compliance_score(80.0, 90.0, 85.0) - 85.0).abs() < 1e-9);
        assert!((compliance_score(0.0, 0.0, 100.0) - 33.333_333).abs() < 1e-5);
    }

    #[test]
    fn draft_rounds_compliance_to_one_decimal() {
        let mut entry = draft(Uuid::new_v4(), date(2026, 1, 5));
        entry.standardization = 0.0;
        entry.layout = 0.0;
        entry.culture = 100.0;
        let record = entry.into_record(Uuid::new_v4());
        assert_eq!(record.compliance_score, 33.3);
    }

    #[test]
    fn rejects_out_of_range_entries() {
        let store = Uuid::new_v4();
        let mut entry = draft(store, date(2026, 1, 5));
        entry.layout = 101.0;
        assert!(matches!(entry.validate(), Err(StoreError::InvalidInput(_))));

        let mut entry = draft(store, date(2026, 1, 5));
        entry.revenue_score = -1.0;
        assert!(entry.validate().is_err());

        let mut entry = draft(store, date(2026, 1, 5));
        entry.revenue_score = f64::NAN;
        assert!(entry.validate().is_err());

        assert!(draft(store, date(2026, 1, 5)).validate().is_ok());
    }

    #[test]
    fn second_record_in_same_month_conflicts() {
        let store = Uuid::new_v4();
        let existing = vec![draft(store, date(2026, 3, 2)).into_record(Uuid::new_v4())];
        let month = YearMonth::new(2026, 3).unwrap();

        let err = ensure_month_available(&existing, store, month, None).unwrap_err();
        assert!(matches!(err, StoreError::Conflict { store_id, .. } if store_id == store));
        assert!(err.to_string().contains("already exists for this store this month"));

        let next_month = YearMonth::new(2026, 4).unwrap();
        assert!(ensure_month_available(&existing, store, next_month, None).is_ok());
        assert!(ensure_month_available(&existing, Uuid::new_v4(), month, None).is_ok());
    }

    #[test]
    fn editing_a_record_keeps_its_own_month() {
        let store = Uuid::new_v4();
        let id = Uuid::new_v4();
        let existing = vec![draft(store, date(2026, 3, 2)).into_record(id)];
        let month = YearMonth::new(2026, 3).unwrap();

        assert!(ensure_month_available(&existing, store, month, Some(id)).is_ok());
        assert!(ensure_month_available(&existing, store, month, Some(Uuid::new_v4())).is_err());
    }

    #[test]
    fn rejected_write_never_reaches_aggregation() {
        let store = Uuid::new_v4();
        let mut snapshot = vec![
            draft(store, date(2026, 5, 3)).into_record(Uuid::new_v4()),
            draft(Uuid::new_v4(), date(2026, 5, 3)).into_record(Uuid::new_v4()),
        ];

        let attempt = draft(store, date(2026, 5, 20));
        if ensure_month_available(&snapshot, store, attempt.month(), None).is_ok() {
            snapshot.push(attempt.into_record(Uuid::new_v4()));
        }

        let points = aggregate(&snapshot, &[], &RecordFilter::default());
        let for_store = points.iter().find(|point| point.store_id == store).unwrap();
        assert_eq!(for_store.count, 1);
    }

    #[test]
    fn records_must_reference_a_known_store() {
        let known = Uuid::new_v4();
        let stores = vec![Store {
            id: known,
            name: "Centro".to_string(),
        }];
        assert!(ensure_store_exists(&stores, known).is_ok());

        let typo = Uuid::new_v4();
        let err = ensure_store_exists(&stores, typo).unwrap_err();
        assert!(matches!(err, StoreError::NotFound { kind: "store", id } if id == typo));
        assert!(ensure_store_exists(&[], known).is_err());
    }

    #[test]
    fn month_listing_filters_and_sorts_newest_first() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let records = vec![
            draft(a, date(2026, 2, 3)).into_record(Uuid::new_v4()),
            draft(b, date(2026, 2, 20)).into_record(Uuid::new_v4()),
            draft(a, date(2026, 3, 1)).into_record(Uuid::new_v4()),
        ];
        let month = YearMonth::new(2026, 2).unwrap();

        let all = records_for_month(&records, month, &StoreSelection::All);
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].date, date(2026, 2, 20));

        let only_a = records_for_month(&records, month, &StoreSelection::from_ids([a]));
        assert_eq!(only_a.len(), 1);
        assert_eq!(only_a[0].store_id, a);
    }

    #[test]
    fn store_names_are_trimmed_and_required() {
        assert_eq!(normalize_store_name("  Centro  ").unwrap(), "Centro");
        assert!(normalize_store_name("   ").is_err());
    }

    #[test]
    fn missing_store_label_is_used_for_unknown_ids() {
        let id = Uuid::new_v4();
        let stores = vec![Store {
            id,
            name: "Centro".to_string(),
        }];
        assert_eq!(store_label(&stores, id), "Centro");
        assert_eq!(store_label(&stores, Uuid::new_v4()), MISSING_STORE_LABEL);
    }
}
