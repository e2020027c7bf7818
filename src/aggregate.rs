use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use crate::models::{MetricRecord, Store, SummaryPoint};
use crate::period::DateRange;

pub const UNKNOWN_STORE: &str = "Unknown Store";

#[derive(Debug, Clone, Default, PartialEq)]
pub enum StoreSelection {
    #[default]
    All,
    Only(HashSet<Uuid>),
}

impl StoreSelection {
    /// An empty id list means no store filtering.
    pub fn from_ids(ids: impl IntoIterator<Item = Uuid>) -> Self {
        let ids: HashSet<Uuid> = ids.into_iter().collect();
        if ids.is_empty() {
            StoreSelection::All
        } else {
            StoreSelection::Only(ids)
        }
    }

    pub fn includes(&self, store_id: &Uuid) -> bool {
        match self {
            StoreSelection::All => true,
            StoreSelection::Only(ids) => ids.contains(store_id),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordFilter {
    pub date_range: Option<DateRange>,
    pub stores: StoreSelection,
}

impl RecordFilter {
    pub fn matches(&self, record: &MetricRecord) -> bool {
        let in_range = self
            .date_range
            .map_or(true, |range| range.contains(record.date));
        in_range && self.stores.includes(&record.store_id)
    }
}

#[derive(Default)]
struct Totals {
    revenue: f64,
    compliance: f64,
    count: usize,
}

/// Groups the records matching `filter` by store and averages their scores.
///
/// Only stores with at least one matching record appear in the output. Records
/// whose store is missing from `stores` still count, under [`UNKNOWN_STORE`].
/// Points are sorted by store name, then id.
pub fn aggregate(
    records: &[MetricRecord],
    stores: &[Store],
    filter: &RecordFilter,
) -> Vec<SummaryPoint> {
    let mut totals: HashMap<Uuid, Totals> = HashMap::new();

    for record in records.iter().filter(|record| filter.matches(record)) {
        let entry = totals.entry(record.store_id).or_default();
        entry.revenue += record.revenue_score;
        entry.compliance += record.compliance_score;
        entry.count += 1;
    }

    let names: HashMap<Uuid, &str> = stores
        .iter()
        .map(|store| (store.id, store.name.as_str()))
        .collect();

    let mut points: Vec<SummaryPoint> = totals
        .into_iter()
        .map(|(store_id, totals)| SummaryPoint {
            store_id,
            store_name: names
                .get(&store_id)
                .copied()
                .unwrap_or(UNKNOWN_STORE)
                .to_string(),
            avg_revenue: totals.revenue / totals.count as f64,
            avg_compliance: totals.compliance / totals.count as f64,
            count: totals.count,
        })
        .collect();

    points.sort_by(|a, b| {
        a.store_name
            .cmp(&b.store_name)
            .then_with(|| a.store_id.cmp(&b.store_id))
    });
    points
}
