use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::models::{PeriodSummary, SummaryPoint, Thresholds};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Quadrant {
    /// Revenue and compliance both on target.
    Success,
    /// Revenue on target, compliance below.
    Risk,
    /// Compliance on target, revenue below.
    Potential,
    /// Both below target.
    Critical,
}

impl Quadrant {
    pub const ALL: [Quadrant; 4] = [
        Quadrant::Success,
        Quadrant::Risk,
        Quadrant::Potential,
        Quadrant::Critical,
    ];

    /// Both comparisons are inclusive, so a point sitting on a target line
    /// lands on the favorable side.
    pub fn of(point: &SummaryPoint, thresholds: &Thresholds) -> Self {
        let revenue_met = point.avg_revenue >= thresholds.target_revenue;
        let compliance_met = point.avg_compliance >= thresholds.target_compliance;

        match (revenue_met, compliance_met) {
            (true, true) => Quadrant::Success,
            (true, false) => Quadrant::Risk,
            (false, true) => Quadrant::Potential,
            (false, false) => Quadrant::Critical,
        }
    }
}

impl fmt::Display for Quadrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quadrant::Success => write!(f, "Success"),
            Quadrant::Risk => write!(f, "Risk"),
            Quadrant::Potential => write!(f, "Potential"),
            Quadrant::Critical => write!(f, "Critical"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassifiedPoint {
    pub point: SummaryPoint,
    pub quadrant: Quadrant,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classification {
    pub classified: Vec<ClassifiedPoint>,
    /// Always holds all four quadrants, including empty ones.
    pub tally: BTreeMap<Quadrant, usize>,
}

pub fn classify(points: &[SummaryPoint], thresholds: &Thresholds) -> Classification {
    let mut tally: BTreeMap<Quadrant, usize> =
        Quadrant::ALL.iter().map(|quadrant| (*quadrant, 0)).collect();

    let classified = points
        .iter()
        .map(|point| {
            let quadrant = Quadrant::of(point, thresholds);
            *tally.entry(quadrant).or_default() += 1;
            ClassifiedPoint {
                point: point.clone(),
                quadrant,
            }
        })
        .collect();

    Classification { classified, tally }
}

/// Count-weighted means across all points. Each point stands for `count`
/// records, so this equals the plain mean over the underlying records.
/// With no records both averages are 0.0.
pub fn period_summary(points: &[SummaryPoint]) -> PeriodSummary {
    let record_count: usize = points.iter().map(|point| point.count).sum();
    let (revenue_sum, compliance_sum) = points.iter().fold((0.0, 0.0), |(rev, comp), point| {
        (
            rev + point.avg_revenue * point.count as f64,
            comp + point.avg_compliance * point.count as f64,
        )
    });

    let (avg_revenue, avg_compliance) = if record_count == 0 {
        (0.0, 0.0)
    } else {
        (
            revenue_sum / record_count as f64,
            compliance_sum / record_count as f64,
        )
    };

    PeriodSummary {
        avg_revenue,
        avg_compliance,
        record_count,
        store_count: points.len(),
    }
}
