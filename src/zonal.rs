//! Per administrative unit statistics of a cropped raster.

use std::{fs, path::Path, str::FromStr};

use anyhow::{anyhow, Context, Result};
use gdal::Dataset;
use log::info;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use crate::{
    boundaries::{AdminUnit, Boundaries},
    catalog::{Month, Product, Scenario},
    cli::create_progress_bar,
    raster::{rasterize_mask, window_for_bounds, window_transform, Bounds, RasterData},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, EnumIter)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ZonalStatistic {
    Min,
    Mean,
    Max,
    Median,
    Count,
}

/// Parses a space separated list such as `"min mean max median"`.
pub fn parse_statistics(aggregates: &str) -> Result<Vec<ZonalStatistic>> {
    let mut statistics = Vec::new();
    for name in aggregates.split_whitespace() {
        let statistic = ZonalStatistic::from_str(name)
            .map_err(|_| anyhow!("Unknown zonal statistic `{}`", name))?;
        if !statistics.contains(&statistic) {
            statistics.push(statistic);
        }
    }

    if statistics.is_empty() {
        return Err(anyhow!("No zonal statistics requested"));
    }
    Ok(statistics)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Summary {
    pub min: Option<f64>,
    pub mean: Option<f64>,
    pub max: Option<f64>,
    pub median: Option<f64>,
    pub count: u64,
}

pub fn summarise(values: &[f64]) -> Summary {
    if values.is_empty() {
        return Summary::default();
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let n = sorted.len();
    let median = if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    };

    Summary {
        min: sorted.first().copied(),
        mean: Some(sorted.iter().sum::<f64>() / n as f64),
        max: sorted.last().copied(),
        median: Some(median),
        count: n as u64,
    }
}

/// One row of a monthly zonal statistics table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZonalRecord {
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
}

impl ZonalRecord {
    pub fn new(
        unit: &AdminUnit,
        product: Product,
        scenario: Scenario,
        month: Month,
        summary: &Summary,
        statistics: &[ZonalStatistic],
    ) -> Self {
        let keep = |statistic: ZonalStatistic, value: Option<f64>| {
            value.filter(|_| statistics.contains(&statistic))
        };
        let attributes = &unit.attributes;

        ZonalRecord {
            id: record_id(product, scenario, month, &unit.place_id),
            place_id: unit.place_id.clone(),
            iso2_code: attributes.iso2_code.clone(),
            adm0_name: attributes.adm0_name.clone(),
            adm1_name: attributes.adm1_name.clone(),
            adm2_name: attributes.adm2_name.clone(),
            adm1_id: attributes.adm1_id.clone(),
            adm2_id: attributes.adm2_id.clone(),
            product: product.to_string(),
            scenario: scenario.to_string(),
            month: month.number(),
            min_raw: keep(ZonalStatistic::Min, summary.min),
            mean_raw: keep(ZonalStatistic::Mean, summary.mean),
            max_raw: keep(ZonalStatistic::Max, summary.max),
            median_raw: keep(ZonalStatistic::Median, summary.median),
            pixel_count: Some(summary.count).filter(|_| statistics.contains(&ZonalStatistic::Count)),
        }
    }
}

pub fn record_id(product: Product, scenario: Scenario, month: Month, place_id: &str) -> String {
    format!("{}_{}_{}_{}", product, scenario, month.number(), place_id)
}

/// Valid pixels of `raster` whose centre falls inside `unit`.
fn unit_values(raster: &RasterData, unit: &AdminUnit) -> Result<Vec<f64>> {
    let bounds = Bounds::of(&unit.geometry);
    let window = match window_for_bounds(&raster.transform, (raster.width, raster.height), &bounds)
    {
        Some(window) => window,
        None => return Ok(Vec::new()),
    };

    let mask = rasterize_mask(
        &window_transform(&raster.transform, &window),
        window.width,
        window.height,
        &raster.projection,
        std::slice::from_ref(&unit.geometry),
    )?;

    Ok(raster
        .window(&window)
        .into_iter()
        .zip(mask)
        .filter(|(value, inside)| *inside == 1 && !raster.is_nodata(*value))
        .map(|(value, _)| value as f64)
        .collect())
}

pub fn calculate_zonal_statistics(
    raster_path: &Path,
    boundaries: &Boundaries,
    product: Product,
    scenario: Scenario,
    month: Month,
    statistics: &[ZonalStatistic],
) -> Result<Vec<ZonalRecord>> {
    let dataset = Dataset::open(raster_path)
        .with_context(|| format!("Unable to open raster {}", raster_path.display()))?;
    let raster = RasterData::from_dataset(&dataset)?;
    let boundaries = match dataset.spatial_ref() {
        Ok(srs) => boundaries.to_crs(&srs)?,
        Err(_) => boundaries.clone(),
    };

    let bar = create_progress_bar(
        boundaries.len() as u64,
        format!("Zonal statistics {} {}", scenario, month),
    );

    let mut records = Vec::with_capacity(boundaries.len());
    for unit in &boundaries.units {
        let values = unit_values(&raster, unit)?;
        let summary = summarise(&values);
        records.push(ZonalRecord::new(
            unit, product, scenario, month, &summary, statistics,
        ));
        bar.inc(1);
    }
    bar.finish_and_clear();

    Ok(records)
}

/// Writes records as CSV, via a partial file renamed on success.
pub fn write_csv<T: Serialize>(records: &[T], path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let partial = path.with_extension("csv.part");
    {
        let mut writer = csv::Writer::from_path(&partial)?;
        for record in records {
            writer.serialize(record)?;
        }
        writer.flush()?;
    }
    fs::rename(&partial, path)?;

    info!("Saved {} rows to {}", records.len(), path.display());
    Ok(())
}

pub fn read_zonal_csv(path: &Path) -> Result<Vec<ZonalRecord>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Unable to open {}", path.display()))?;

    let mut records = Vec::new();
    for record in reader.deserialize::<ZonalRecord>() {
        records.push(record.with_context(|| format!("Invalid row in {}", path.display()))?);
    }
    Ok(records)
}

// -- Tests -------------------------------------------------------------------
