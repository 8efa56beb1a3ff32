use std::path::Path;

use anyhow::{Context, Result};
use log::info;
use serde::Deserialize;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Country {
    pub iso3_code: String,
    pub iso2_code: String,
    pub adm0_name: String,
}

pub fn read_countries_csv(path: &Path) -> Result<Vec<Country>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Unable to open {}", path.display()))?;

    let mut countries = Vec::new();
    for country in reader.deserialize::<Country>() {
        countries.push(country.with_context(|| format!("Invalid row in {}", path.display()))?);
    }
    Ok(countries)
}

pub async fn create_country_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS country (
            iso3_code TEXT PRIMARY KEY NOT NULL,
            iso2_code TEXT NOT NULL,
            adm0_name TEXT NOT NULL)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Loads countries from a CSV with `iso3_code,iso2_code,adm0_name` columns.
/// Countries already in the table are left untouched.
pub async fn add_countries_to_db(pool: &SqlitePool, path: &Path) -> Result<u64> {
    let countries = read_countries_csv(path)?;
    create_country_table(pool).await?;

    let mut transaction = pool.begin().await?;
    let mut inserted = 0;

    for chunk in countries.chunks(100) {
        let mut qb = QueryBuilder::<Sqlite>::new(
            "INSERT OR IGNORE INTO country (iso3_code, iso2_code, adm0_name) ",
        );
        qb.push_values(chunk, |mut row, country| {
            row.push_bind(&country.iso3_code)
                .push_bind(&country.iso2_code)
                .push_bind(&country.adm0_name);
        });
        inserted += qb.build().execute(&mut *transaction).await?.rows_affected();
    }

    transaction.commit().await?;
    info!("Added {} of {} countries", inserted, countries.len());

    Ok(inserted)
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod test {
    use std::fs;

    use tempfile::TempDir;

    use super::*;
    use crate::db::test::pool_fixture;

    #[tokio::test]
    async fn should_ignore_duplicate_countries() {
        let tmp = TempDir::new().unwrap();
        let pool = pool_fixture(tmp.path()).await;
        let csv = tmp.path().join("countries.csv");
        fs::write(
            &csv,
            "iso3_code,iso2_code,adm0_name\nBFA,BF,Burkina Faso\nMLI,ML,Mali\nBFA,BF,Burkina\n",
        )
        .unwrap();

        assert_eq!(add_countries_to_db(&pool, &csv).await.unwrap(), 2);
        assert_eq!(add_countries_to_db(&pool, &csv).await.unwrap(), 0);

        let (name,): (String,) =
            sqlx::query_as("SELECT adm0_name FROM country WHERE iso3_code = 'BFA'")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(name, "Burkina Faso");
    }

    #[test]
    fn should_reject_malformed_csv() {
        let tmp = TempDir::new().unwrap();
        let csv = tmp.path().join("countries.csv");
        fs::write(&csv, "iso3_code,iso2_code\nBFA,BF\n").unwrap();

        assert!(read_countries_csv(&csv).is_err());
    }
}
