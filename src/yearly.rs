//! Twelve monthly zonal tables folded into one table per scenario.

use std::{fs, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{catalog::Product, zonal::read_zonal_csv, zonal::ZonalRecord};

/// A zonal row with its values converted to °C for temperature products.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearlyRecord {
    pub id: String,
    pub place_id: String,
    pub iso2_code: Option<String>,
    pub adm0_name: Option<String>,
    pub adm1_name: Option<String>,
    pub adm2_name: Option<String>,
    pub adm1_id: Option<String>,
    pub adm2_id: Option<String>,
    pub product: String,
    pub scenario: String,
    pub month: u8,
    pub min_raw: Option<f64>,
    pub mean_raw: Option<f64>,
    pub max_raw: Option<f64>,
    pub median_raw: Option<f64>,
    pub pixel_count: Option<u64>,
    pub min_celsius: Option<f64>,
    pub mean_celsius: Option<f64>,
    pub max_celsius: Option<f64>,
    pub median_celsius: Option<f64>,
}

/// CHELSA stores temperatures as °C/10.
pub fn to_celsius(raw: Option<f64>) -> Option<f64> {
    raw.map(|value| value / 10.0)
}

impl YearlyRecord {
    pub fn from_zonal(record: ZonalRecord, product: Product) -> Self {
        let celsius = |raw: Option<f64>| {
            if product.is_temperature() {
                to_celsius(raw)
            } else {
                None
            }
        };

        YearlyRecord {
            min_celsius: celsius(record.min_raw),
            mean_celsius: celsius(record.mean_raw),
            max_celsius: celsius(record.max_raw),
            median_celsius: celsius(record.median_raw),
            id: record.id,
            place_id: record.place_id,
            iso2_code: record.iso2_code,
            adm0_name: record.adm0_name,
            adm1_name: record.adm1_name,
            adm2_name: record.adm2_name,
            adm1_id: record.adm1_id,
            adm2_id: record.adm2_id,
            product: record.product,
            scenario: record.scenario,
            month: record.month,
            min_raw: record.min_raw,
            mean_raw: record.mean_raw,
            max_raw: record.max_raw,
            median_raw: record.median_raw,
            pixel_count: record.pixel_count,
        }
    }
}

/// Concatenates every zonal CSV in `zonal_dir`, sorted by place and month.
pub fn yearly_table_generator(zonal_dir: &Path, product: Product) -> Result<Vec<YearlyRecord>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(zonal_dir)
        .with_context(|| format!("Unable to list {}", zonal_dir.display()))?
    {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) == Some("csv") {
            files.push(path);
        }
    }
    files.sort();

    let mut records = Vec::new();
    for file in &files {
        records.extend(
            read_zonal_csv(file)?
                .into_iter()
                .map(|record| YearlyRecord::from_zonal(record, product)),
        );
    }

    records.sort_by(|a, b| a.place_id.cmp(&b.place_id).then(a.month.cmp(&b.month)));
    Ok(records)
}

pub fn read_yearly_csv(path: &Path) -> Result<Vec<YearlyRecord>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Unable to open {}", path.display()))?;

    let mut records = Vec::new();
    for record in reader.deserialize::<YearlyRecord>() {
        records.push(record.with_context(|| format!("Invalid row in {}", path.display()))?);
    }
    Ok(records)
}

// -- Tests -------------------------------------------------------------------
