//! Read side used by the dashboard. Values come back in °C when the product
//! has them, raw otherwise.

use std::collections::BTreeMap;

use anyhow::Result;
use serde::Serialize;
use sqlx::{FromRow, SqlitePool};

use crate::catalog::Product;

/// adm0 -> adm1 -> adm2 names.
pub type AdmOptions = BTreeMap<String, BTreeMap<String, Vec<String>>>;

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct SeriesPoint {
    pub scenario: String,
    pub month: i64,
    pub mean: Option<f64>,
    pub max: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct ChoroplethValue {
    pub place_id: String,
    pub adm2_name: Option<String>,
    pub mean: Option<f64>,
}

pub async fn adm_options(pool: &SqlitePool, product: Product) -> Result<AdmOptions> {
    let rows: Vec<(String, String, String)> = sqlx::query_as(&format!(
        "SELECT DISTINCT adm0_name, adm1_name, adm2_name FROM {}
         WHERE adm0_name IS NOT NULL AND adm1_name IS NOT NULL AND adm2_name IS NOT NULL
         ORDER BY adm0_name, adm1_name, adm2_name",
        product.table_name()
    ))
    .fetch_all(pool)
    .await?;

    let mut options = AdmOptions::new();
    for (adm0, adm1, adm2) in rows {
        options
            .entry(adm0)
            .or_default()
            .entry(adm1)
            .or_default()
            .push(adm2);
    }
    Ok(options)
}

pub async fn scenarios(pool: &SqlitePool, product: Product) -> Result<Vec<String>> {
    let rows: Vec<(String,)> = sqlx::query_as(&format!(
        "SELECT DISTINCT scenario FROM {} ORDER BY scenario",
        product.table_name()
    ))
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|(scenario,)| scenario).collect())
}

/// Monthly mean and maximum of one adm2 unit, for every scenario.
pub async fn time_series(
    pool: &SqlitePool,
    product: Product,
    adm0: &str,
    adm1: &str,
    adm2: &str,
) -> Result<Vec<SeriesPoint>> {
    let points = sqlx::query_as::<_, SeriesPoint>(&format!(
        "SELECT scenario, month,
                COALESCE(mean_celsius, mean_raw) AS mean,
                COALESCE(max_celsius, max_raw) AS max
         FROM {}
         WHERE adm0_name = ? AND adm1_name = ? AND adm2_name = ?
         ORDER BY scenario, month",
        product.table_name()
    ))
    .bind(adm0)
    .bind(adm1)
    .bind(adm2)
    .fetch_all(pool)
    .await?;

    Ok(points)
}

/// Mean of every adm2 unit in a country for one scenario and month.
pub async fn choropleth(
    pool: &SqlitePool,
    product: Product,
    adm0: &str,
    scenario: &str,
    month: u8,
) -> Result<Vec<ChoroplethValue>> {
    let values = sqlx::query_as::<_, ChoroplethValue>(&format!(
        "SELECT place_id, adm2_name, COALESCE(mean_celsius, mean_raw) AS mean
         FROM {}
         WHERE adm0_name = ? AND scenario = ? AND month = ?
         ORDER BY place_id",
        product.table_name()
    ))
    .bind(adm0)
    .bind(scenario)
    .bind(month as i64)
    .fetch_all(pool)
    .await?;

    Ok(values)
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod test {
    use tempfile::TempDir;

    use super::*;
    use crate::{
        db::{sqlite::upload_yearly, test::pool_fixture},
        yearly::{test::zonal_record, YearlyRecord},
    };

    /// Two units of one country, twelve months, two scenarios.
    pub(crate) async fn seed(pool: &SqlitePool) {
        let mut records = Vec::new();
        for scenario in ["CCSM4_rcp60", "BNU-ESM_rcp26"] {
            for month in 1..=12u8 {
                for (place_id, adm2) in [("BF1300", "Kadiogo"), ("BF1301", "Ouaga")] {
                    let mut zonal = zonal_record("temp", place_id, month, 200.0 + month as f64);
                    zonal.id = format!("temp_{}_{}_{}", scenario, month, place_id);
                    zonal.scenario = scenario.to_string();
                    zonal.adm2_name = Some(adm2.to_string());
                    records.push(YearlyRecord::from_zonal(zonal, Product::Temp));
                }
            }
        }
        upload_yearly(pool, Product::Temp, &records).await.unwrap();
    }

    #[tokio::test]
    async fn should_nest_adm_options() {
        let tmp = TempDir::new().unwrap();
        let pool = pool_fixture(tmp.path()).await;
        seed(&pool).await;

        let options = adm_options(&pool, Product::Temp).await.unwrap();

        assert_eq!(options.len(), 1);
        assert_eq!(
            options["Burkina Faso"]["Centre"],
            vec!["Kadiogo".to_string(), "Ouaga".to_string()]
        );
        assert_eq!(
            scenarios(&pool, Product::Temp).await.unwrap(),
            vec!["BNU-ESM_rcp26", "CCSM4_rcp60"]
        );
    }

    #[tokio::test]
    async fn should_return_series_in_celsius_by_scenario() {
        let tmp = TempDir::new().unwrap();
        let pool = pool_fixture(tmp.path()).await;
        seed(&pool).await;

        let series = time_series(&pool, Product::Temp, "Burkina Faso", "Centre", "Ouaga")
            .await
            .unwrap();

        assert_eq!(series.len(), 24);
        assert_eq!(series[0].scenario, "BNU-ESM_rcp26");
        assert_eq!(series[0].month, 1);
        assert_eq!(series[0].mean, Some(20.1));
        assert_eq!(series[23].scenario, "CCSM4_rcp60");
        assert_eq!(series[23].month, 12);
    }

    #[tokio::test]
    async fn should_return_choropleth_values() {
        let tmp = TempDir::new().unwrap();
        let pool = pool_fixture(tmp.path()).await;
        seed(&pool).await;

        let values = choropleth(&pool, Product::Temp, "Burkina Faso", "CCSM4_rcp60", 3)
            .await
            .unwrap();

        assert_eq!(values.len(), 2);
        assert_eq!(values[0].place_id, "BF1300");
        assert_eq!(values[0].adm2_name.as_deref(), Some("Kadiogo"));
        assert_eq!(values[0].mean, Some(20.3));
    }
}
