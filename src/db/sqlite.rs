use anyhow::Result;
use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::{catalog::Product, cli::create_progress_bar, yearly::YearlyRecord};

// 21 bound columns per row keeps a chunk under SQLite's 999 variable limit.
const CHUNK_SIZE: usize = 40;

const COLUMNS: &str = "record_id, place_id, iso2_code, adm0_name, adm1_name, adm2_name, \
    adm1_id, adm2_id, product, scenario, month, \
    min_raw, mean_raw, max_raw, median_raw, pixel_count, \
    min_celsius, mean_celsius, max_celsius, median_celsius, uploaded_at";

const UPDATED_COLUMNS: [&str; 20] = [
    "place_id",
    "iso2_code",
    "adm0_name",
    "adm1_name",
    "adm2_name",
    "adm1_id",
    "adm2_id",
    "product",
    "scenario",
    "month",
    "min_raw",
    "mean_raw",
    "max_raw",
    "median_raw",
    "pixel_count",
    "min_celsius",
    "mean_celsius",
    "max_celsius",
    "median_celsius",
    "uploaded_at",
];

pub async fn create_product_table(pool: &SqlitePool, product: Product) -> Result<()> {
    sqlx::query(&format!(
        "CREATE TABLE IF NOT EXISTS {} (
            record_id TEXT PRIMARY KEY NOT NULL,
            place_id TEXT NOT NULL,
            iso2_code TEXT,
            adm0_name TEXT,
            adm1_name TEXT,
            adm2_name TEXT,
            adm1_id TEXT,
            adm2_id TEXT,
            product TEXT NOT NULL,
            scenario TEXT NOT NULL,
            month INTEGER NOT NULL,
            min_raw REAL,
            mean_raw REAL,
            max_raw REAL,
            median_raw REAL,
            pixel_count INTEGER,
            min_celsius REAL,
            mean_celsius REAL,
            max_celsius REAL,
            median_celsius REAL,
            uploaded_at TEXT NOT NULL)",
        product.table_name()
    ))
    .execute(pool)
    .await?;

    Ok(())
}

/// Upserts the yearly table of one scenario into the product's table. Rows
/// are keyed on the record id, so uploading twice leaves one copy.
pub async fn upload_yearly(
    pool: &SqlitePool,
    product: Product,
    records: &[YearlyRecord],
) -> Result<u64> {
    create_product_table(pool, product).await?;

    let progress_bar = create_progress_bar(
        records.len() as u64,
        format!("Uploading to `{}`", product.table_name()),
    );

    let uploaded_at = Utc::now();
    let on_conflict = UPDATED_COLUMNS
        .iter()
        .map(|column| format!("{column} = excluded.{column}"))
        .collect::<Vec<_>>()
        .join(", ");

    let mut transaction = pool.begin().await?;
    let mut affected = 0;

    for chunk in records.chunks(CHUNK_SIZE) {
        let mut qb = QueryBuilder::<Sqlite>::new(format!(
            "INSERT INTO {} ({}) ",
            product.table_name(),
            COLUMNS
        ));

        qb.push_values(chunk, |mut row, record| {
            row.push_bind(&record.id)
                .push_bind(&record.place_id)
                .push_bind(record.iso2_code.as_deref())
                .push_bind(record.adm0_name.as_deref())
                .push_bind(record.adm1_name.as_deref())
                .push_bind(record.adm2_name.as_deref())
                .push_bind(record.adm1_id.as_deref())
                .push_bind(record.adm2_id.as_deref())
                .push_bind(&record.product)
                .push_bind(&record.scenario)
                .push_bind(record.month as i64)
                .push_bind(record.min_raw)
                .push_bind(record.mean_raw)
                .push_bind(record.max_raw)
                .push_bind(record.median_raw)
                .push_bind(record.pixel_count.map(|count| count as i64))
                .push_bind(record.min_celsius)
                .push_bind(record.mean_celsius)
                .push_bind(record.max_celsius)
                .push_bind(record.median_celsius)
                .push_bind(uploaded_at);
        });
        qb.push(" ON CONFLICT(record_id) DO UPDATE SET ");
        qb.push(&on_conflict);

        affected += qb.build().execute(&mut *transaction).await?.rows_affected();
        progress_bar.inc(chunk.len() as u64);
    }

    transaction.commit().await?;
    progress_bar.finish_with_message(format!("Uploaded to `{}`", product.table_name()));

    Ok(affected)
}

// -- Tests -------------------------------------------------------------------
