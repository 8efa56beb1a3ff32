//! Works out which processing steps a month still needs and runs them.
//!
//! Nothing is recorded between runs except the files each step writes, so a
//! run after a failure picks up from the first missing output.

use std::{fs, path::PathBuf};

use anyhow::{anyhow, ensure, Result};
use chrono::Utc;
use log::info;
use strum::{Display, EnumIter, IntoEnumIterator};

use crate::{
    boundaries::Boundaries,
    catalog::{ChelsaProduct, Month, Scenario},
    config::Config,
    db,
    download::download_raster,
    paths::ProductPaths,
    raster::{crop_raster_with_geometry, raster_description},
    yearly::{read_yearly_csv, yearly_table_generator},
    zonal::{calculate_zonal_statistics, parse_statistics, write_csv, ZonalStatistic},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Display, EnumIter)]
pub enum ProcessingStep {
    Download,
    Mask,
    ZonalStatistics,
    YearlyAggregate,
    Upload,
}

/// Steps needed to bring `month` and the scenario's yearly aggregate up to date.
pub fn get_processing_steps(paths: &ProductPaths, month: Month) -> Vec<ProcessingStep> {
    let zonal = !paths.zonal_stats(month).exists();
    let mask = zonal && !paths.cropped_raster(month).exists();
    let download = mask && !paths.raw_raster(month).exists();

    let mut zonal_months = paths.zonal_months();
    if zonal && !zonal_months.contains(&month) {
        zonal_months.push(month);
    }
    let complete_year = Month::iter().all(|m| zonal_months.contains(&m));
    let yearly_exists = paths.yearly_aggregate().exists();
    let yearly = complete_year && (!yearly_exists || zonal);

    let upload = yearly || (yearly_exists && !paths.upload_marker().exists());

    [
        (ProcessingStep::Download, download),
        (ProcessingStep::Mask, mask),
        (ProcessingStep::ZonalStatistics, zonal),
        (ProcessingStep::YearlyAggregate, yearly),
        (ProcessingStep::Upload, upload),
    ]
    .into_iter()
    .filter_map(|(step, needed)| needed.then_some(step))
    .collect()
}

pub fn describe_steps(steps: &[ProcessingStep]) -> String {
    if steps.is_empty() {
        return "nothing to do".to_string();
    }
    steps
        .iter()
        .map(|step| step.to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}

pub struct Pipeline {
    config: Config,
    product: ChelsaProduct,
    statistics: Vec<ZonalStatistic>,
    boundaries: Option<Boundaries>,
}

impl Pipeline {
    pub fn new(config: Config, product: ChelsaProduct) -> Result<Self> {
        let statistics = parse_statistics(&config.zonal_stats_aggregates)?;

        Ok(Pipeline {
            config,
            product,
            statistics,
            boundaries: None,
        })
    }

    pub fn paths(&self, scenario: Scenario) -> ProductPaths {
        ProductPaths::new(&self.config, &self.product, scenario)
    }

    pub async fn run_single_month(
        &mut self,
        scenario: Scenario,
        month: Month,
    ) -> Result<Vec<ProcessingStep>> {
        let paths = self.paths(scenario);
        paths.create_directories()?;

        let steps = get_processing_steps(&paths, month);
        info!(
            "{} {} {}: {}",
            self.product.product,
            scenario,
            month,
            describe_steps(&steps)
        );

        self.execute_processing_steps(&steps, &paths, month).await?;
        Ok(steps)
    }

    pub async fn run_all_months(&mut self, scenario: Scenario) -> Result<()> {
        for month in self.product.available_months.clone() {
            self.run_single_month(scenario, month).await?;
        }
        Ok(())
    }

    /// Runs `steps` in order, stopping at the first failure.
    pub async fn execute_processing_steps(
        &mut self,
        steps: &[ProcessingStep],
        paths: &ProductPaths,
        month: Month,
    ) -> Result<()> {
        if steps
            .iter()
            .any(|s| matches!(s, ProcessingStep::Mask | ProcessingStep::ZonalStatistics))
        {
            self.load_boundaries()?;
        }

        for step in steps {
            info!("{}: {}", month, step);
            match step {
                ProcessingStep::Download => {
                    let url = self.product.url(paths.scenario, month)?;
                    let raw = paths.raw_raster(month);
                    download_raster(&url, &raw).await?;
                    raster_description(&raw)?;
                }
                ProcessingStep::Mask => {
                    crop_raster_with_geometry(
                        &paths.raw_raster(month),
                        self.boundaries()?,
                        &paths.cropped_raster(month),
                    )?;
                }
                ProcessingStep::ZonalStatistics => {
                    let records = calculate_zonal_statistics(
                        &paths.cropped_raster(month),
                        self.boundaries()?,
                        self.product.product,
                        paths.scenario,
                        month,
                        &self.statistics,
                    )?;
                    remove_stale(&[paths.yearly_aggregate(), paths.upload_marker()])?;
                    write_csv(&records, &paths.zonal_stats(month))?;
                }
                ProcessingStep::YearlyAggregate => {
                    let table = yearly_table_generator(&paths.zonal_stats_dir, self.product.product)?;
                    remove_stale(&[paths.upload_marker()])?;
                    write_csv(&table, &paths.yearly_aggregate())?;
                }
                ProcessingStep::Upload => self.upload(paths).await?,
            }
        }

        Ok(())
    }

    async fn upload(&self, paths: &ProductPaths) -> Result<()> {
        let records = read_yearly_csv(&paths.yearly_aggregate())?;
        let pool = db::connect(&self.config.database_url).await?;
        let affected = db::sqlite::upload_yearly(&pool, self.product.product, &records).await?;
        pool.close().await;

        let marker = paths.upload_marker();
        let partial = marker.with_extension("uploaded.part");
        fs::write(&partial, Utc::now().to_rfc3339())?;
        fs::rename(&partial, &marker)?;

        info!("Uploaded {} rows for {}", affected, paths.scenario);
        Ok(())
    }

    fn load_boundaries(&mut self) -> Result<()> {
        if self.boundaries.is_none() {
            let boundaries = Boundaries::read(
                &self.config.geom_path,
                &self.config.column_mapping,
                &self.config.place_id,
            )?;
            ensure!(
                !boundaries.is_empty(),
                "No administrative units in {}",
                self.config.geom_path.display()
            );
            self.boundaries = Some(boundaries);
        }
        Ok(())
    }

    fn boundaries(&self) -> Result<&Boundaries> {
        self.boundaries
            .as_ref()
            .ok_or_else(|| anyhow!("Boundaries have not been loaded"))
    }
}

/// Removes outputs that a new zonal table or yearly aggregate makes stale.
/// A missing yearly aggregate is what schedules it again.
fn remove_stale(paths: &[PathBuf]) -> Result<()> {
    for path in paths {
        if path.exists() {
            fs::remove_file(path)?;
        }
    }
    Ok(())
}

// -- Tests -------------------------------------------------------------------
