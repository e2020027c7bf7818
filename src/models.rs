use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Store {
    pub id: Uuid,
    pub name: String,
}

/// One month's reported metrics for one store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    pub id: Uuid,
    pub store_id: Uuid,
    pub date: NaiveDate,
    pub revenue_score: f64,
    pub standardization: f64,
    pub layout: f64,
    pub culture: f64,
    pub compliance_score: f64,
}

/// Per-store averages over the records that matched a filter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryPoint {
    pub store_id: Uuid,
    pub store_name: String,
    pub avg_revenue: f64,
    pub avg_compliance: f64,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub target_revenue: f64,
    pub target_compliance: f64,
}

/// Count-weighted averages across every summary point of a period.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PeriodSummary {
    pub avg_revenue: f64,
    pub avg_compliance: f64,
    pub record_count: usize,
    pub store_count: usize,
}
