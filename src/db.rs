use anyhow::Context;
use chrono::{Datelike, Months, NaiveDate, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{MetricRecord, Store};
use crate::period::{DateRange, YearMonth};
use crate::records::{self, RecordDraft};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let stores = vec![
        (
            Uuid::parse_str("6b1f3c2e-7d4a-4f0e-9a51-2c8e5d7f9b10")?,
            "Loja Centro",
        ),
        (
            Uuid::parse_str("a4e2d9c7-1b3f-4c6a-8e5d-0f7b9a2c4e61")?,
            "Loja Shopping Norte",
        ),
        (
            Uuid::parse_str("f09c8b7a-6e5d-4c3b-a291-8f7e6d5c4b32")?,
            "Loja Praia",
        ),
    ];

    for (id, name) in &stores {
        sqlx::query(
            r#"
            INSERT INTO store_quadrant.stores (id, name)
            VALUES ($1, $2)
            ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name
            "#,
        )
        .bind(*id)
        .bind(*name)
        .execute(pool)
        .await?;
    }

    let this_month = YearMonth::of(Utc::now().date_naive()).first_day();
    let last_month = this_month
        .checked_sub_months(Months::new(1))
        .context("invalid seed month")?;

    // (store index, month start, day, revenue, standardization, layout, culture)
    let samples = [
        (0, last_month, 5, 104.0, 90.0, 88.0, 95.0),
        (1, last_month, 7, 96.0, 70.0, 75.0, 80.0),
        (2, last_month, 10, 72.0, 92.0, 90.0, 86.0),
        (0, this_month, 3, 98.0, 91.0, 87.0, 93.0),
        (1, this_month, 4, 81.0, 60.0, 72.0, 68.0),
        (2, this_month, 6, 110.0, 78.0, 82.0, 80.0),
    ];

    for (store_idx, month_start, day, revenue, standardization, layout, culture) in samples {
        let date = NaiveDate::from_ymd_opt(month_start.year(), month_start.month(), day)
            .context("invalid seed date")?;
        let draft = RecordDraft {
            store_id: stores[store_idx].0,
            date,
            revenue_score: revenue,
            standardization,
            layout,
            culture,
        };
        insert_ignoring_duplicates(pool, draft.into_record(Uuid::new_v4())).await?;
    }

    tracing::info!("seeded {} stores", stores.len());
    Ok(())
}

fn store_from_row(row: &PgRow) -> Store {
    Store {
        id: row.get("id"),
        name: row.get("name"),
    }
}

fn record_from_row(row: &PgRow) -> MetricRecord {
    MetricRecord {
        id: row.get("id"),
        store_id: row.get("store_id"),
        date: row.get("record_date"),
        revenue_score: row.get("revenue_score"),
        standardization: row.get("standardization"),
        layout: row.get("layout"),
        culture: row.get("culture"),
        compliance_score: row.get("compliance_score"),
    }
}

const RECORD_COLUMNS: &str = "id, store_id, record_date, revenue_score, \
     standardization, layout, culture, compliance_score";

/// Maps a unique-constraint violation to [`StoreError::Conflict`].
fn write_error(err: sqlx::Error, store_id: Uuid, month: YearMonth) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::Conflict { store_id, month }
        }
        _ => StoreError::Database(err),
    }
}

pub async fn fetch_stores(pool: &PgPool) -> Result<Vec<Store>, StoreError> {
    let rows = sqlx::query("SELECT id, name FROM store_quadrant.stores ORDER BY name, id")
        .fetch_all(pool)
        .await?;
    Ok(rows.iter().map(store_from_row).collect())
}

pub async fn fetch_records(
    pool: &PgPool,
    range: Option<DateRange>,
) -> Result<Vec<MetricRecord>, StoreError> {
    let mut query = format!("SELECT {RECORD_COLUMNS} FROM store_quadrant.metric_records");

    if range.is_some() {
        query.push_str(" WHERE record_date >= $1 AND record_date <= $2");
    }
    query.push_str(" ORDER BY record_date DESC");

    let mut rows = sqlx::query(&query);
    if let Some(range) = range {
        rows = rows.bind(range.start).bind(range.end);
    }

    let records: Vec<MetricRecord> = rows
        .fetch_all(pool)
        .await?
        .iter()
        .map(record_from_row)
        .collect();
    tracing::debug!("fetched {} records", records.len());
    Ok(records)
}

pub async fn fetch_record(pool: &PgPool, id: Uuid) -> Result<MetricRecord, StoreError> {
    let query = format!("SELECT {RECORD_COLUMNS} FROM store_quadrant.metric_records WHERE id = $1");
    let row = sqlx::query(&query)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(StoreError::NotFound { kind: "record", id })?;
    Ok(record_from_row(&row))
}

async fn fetch_store_records(
    pool: &PgPool,
    store_id: Uuid,
) -> Result<Vec<MetricRecord>, StoreError> {
    let query = format!(
        "SELECT {RECORD_COLUMNS} FROM store_quadrant.metric_records WHERE store_id = $1"
    );
    let rows = sqlx::query(&query).bind(store_id).fetch_all(pool).await?;
    Ok(rows.iter().map(record_from_row).collect())
}

pub async fn add_store(pool: &PgPool, name: &str) -> Result<Store, StoreError> {
    let store = Store {
        id: Uuid::new_v4(),
        name: records::normalize_store_name(name)?,
    };

    sqlx::query("INSERT INTO store_quadrant.stores (id, name) VALUES ($1, $2)")
        .bind(store.id)
        .bind(&store.name)
        .execute(pool)
        .await?;

    tracing::info!(store_id = %store.id, "added store {:?}", store.name);
    Ok(store)
}

pub async fn rename_store(pool: &PgPool, id: Uuid, name: &str) -> Result<Store, StoreError> {
    let name = records::normalize_store_name(name)?;
    let result = sqlx::query("UPDATE store_quadrant.stores SET name = $2 WHERE id = $1")
        .bind(id)
        .bind(&name)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound { kind: "store", id });
    }

    tracing::info!(store_id = %id, "renamed store to {:?}", name);
    Ok(Store { id, name })
}

/// Deletes a store and returns how many records still reference it.
/// Records are kept.
pub async fn delete_store(pool: &PgPool, id: Uuid) -> Result<i64, StoreError> {
    let result = sqlx::query("DELETE FROM store_quadrant.stores WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound { kind: "store", id });
    }

    let orphaned: i64 =
        sqlx::query("SELECT COUNT(*) AS total FROM store_quadrant.metric_records WHERE store_id = $1")
            .bind(id)
            .fetch_one(pool)
            .await?
            .get("total");

    if orphaned > 0 {
        tracing::warn!(store_id = %id, "deleted store still has {orphaned} records");
    }
    Ok(orphaned)
}

pub async fn create_record(pool: &PgPool, draft: RecordDraft) -> Result<MetricRecord, StoreError> {
    draft.validate()?;
    records::ensure_store_exists(&fetch_stores(pool).await?, draft.store_id)?;
    let month = draft.month();
    let existing = fetch_store_records(pool, draft.store_id).await?;
    records::ensure_month_available(&existing, draft.store_id, month, None)?;

    let record = draft.into_record(Uuid::new_v4());
    let query = format!(
        "INSERT INTO store_quadrant.metric_records ({RECORD_COLUMNS}, record_month) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"
    );
    bind_record(sqlx::query(&query), &record)
        .bind(month.first_day())
        .execute(pool)
        .await
        .map_err(|err| write_error(err, record.store_id, month))?;

    tracing::info!(record_id = %record.id, store_id = %record.store_id, %month, "record created");
    Ok(record)
}

pub async fn update_record(
    pool: &PgPool,
    id: Uuid,
    draft: RecordDraft,
) -> Result<MetricRecord, StoreError> {
    draft.validate()?;
    records::ensure_store_exists(&fetch_stores(pool).await?, draft.store_id)?;
    let month = draft.month();
    let existing = fetch_store_records(pool, draft.store_id).await?;
    records::ensure_month_available(&existing, draft.store_id, month, Some(id))?;

    let record = draft.into_record(id);
    let query = sqlx::query(
        r#"
        UPDATE store_quadrant.metric_records
        SET store_id = $2, record_date = $3, revenue_score = $4, standardization = $5,
            layout = $6, culture = $7, compliance_score = $8, record_month = $9
        WHERE id = $1
        "#,
    );
    let result = bind_record(query, &record)
        .bind(month.first_day())
        .execute(pool)
        .await
        .map_err(|err| write_error(err, record.store_id, month))?;

    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound { kind: "record", id });
    }

    tracing::info!(record_id = %id, %month, "record updated");
    Ok(record)
}

fn bind_record<'q>(
    query: sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>,
    record: &MetricRecord,
) -> sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments> {
    query
        .bind(record.id)
        .bind(record.store_id)
        .bind(record.date)
        .bind(record.revenue_score)
        .bind(record.standardization)
        .bind(record.layout)
        .bind(record.culture)
        .bind(record.compliance_score)
}

pub async fn delete_record(pool: &PgPool, id: Uuid) -> Result<(), StoreError> {
    let result = sqlx::query("DELETE FROM store_quadrant.metric_records WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound { kind: "record", id });
    }

    tracing::info!(record_id = %id, "record deleted");
    Ok(())
}

/// Inserts unless the store already has a record that month. Returns whether
/// a row was written.
async fn insert_ignoring_duplicates(pool: &PgPool, record: MetricRecord) -> anyhow::Result<bool> {
    let month = YearMonth::of(record.date);
    let query = format!(
        "INSERT INTO store_quadrant.metric_records ({RECORD_COLUMNS}, record_month) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
         ON CONFLICT (store_id, record_month) DO NOTHING"
    );
    let result = bind_record(sqlx::query(&query), &record)
        .bind(month.first_day())
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        tracing::debug!(store_id = %record.store_id, %month, "skipped duplicate month");
    }
    Ok(result.rows_affected() > 0)
}

/// File line of the `index`-th data row; line 1 is the header.
fn file_line(index: usize) -> usize {
    index + 2
}

pub async fn import_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        store_name: String,
        date: NaiveDate,
        revenue_score: f64,
        standardization: f64,
        layout: f64,
        culture: f64,
    }

    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut stores = fetch_stores(pool).await?;
    let mut inserted = 0usize;

    for (index, result) in reader.deserialize::<CsvRow>().enumerate() {
        let line = file_line(index);
        let row = result.with_context(|| format!("malformed row on line {line}"))?;
        let name = records::normalize_store_name(&row.store_name)?;

        let store_id = match stores.iter().find(|store| store.name == name) {
            Some(store) => store.id,
            None => {
                let store = add_store(pool, &name).await?;
                let id = store.id;
                stores.push(store);
                id
            }
        };

        let draft = RecordDraft {
            store_id,
            date: row.date,
            revenue_score: row.revenue_score,
            standardization: row.standardization,
            layout: row.layout,
            culture: row.culture,
        };
        draft
            .validate()
            .with_context(|| format!("invalid values on line {line}"))?;

        if insert_ignoring_duplicates(pool, draft.into_record(Uuid::new_v4())).await? {
            inserted += 1;
        }
    }

    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn import_errors_point_at_file_lines() {
        assert_eq!(file_line(0), 2);
        assert_eq!(file_line(9), 11);
    }
}
