//! Per-store performance tracking against monthly targets.
//!
//! Records are grouped per store by [`aggregate::aggregate`] and the
//! resulting points are placed into quadrants by [`quadrant::classify`].
//! Both are pure; [`db`] and [`settings`] supply their inputs.

pub mod aggregate;
pub mod db;
pub mod error;
pub mod models;
pub mod period;
pub mod quadrant;
pub mod records;
pub mod report;
pub mod settings;
