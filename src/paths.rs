//! On-disk layout of a product's scenario.
//!
//! The presence of these files is the only state the pipeline keeps between
//! runs, see [`crate::steps`].

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::Result;
use strum::IntoEnumIterator;

use crate::{
    catalog::{ChelsaProduct, Month, Scenario},
    config::Config,
};

#[derive(Debug, Clone)]
pub struct ProductPaths {
    pub scenario: Scenario,
    pub raw_raster_dir: PathBuf,
    pub cropped_raster_dir: PathBuf,
    pub zonal_stats_dir: PathBuf,
    pub yearly_aggregate_dir: PathBuf,
}

impl ProductPaths {
    pub fn new(config: &Config, product: &ChelsaProduct, scenario: Scenario) -> Self {
        let base = config
            .root_dir
            .join(product.phase.to_string())
            .join(product.product.to_string())
            .join(scenario.to_string());

        ProductPaths {
            scenario,
            raw_raster_dir: base.join(&config.raw_raster_dir),
            cropped_raster_dir: base.join(&config.cropped_raster_dir),
            zonal_stats_dir: base.join(&config.zonal_stats_dir),
            yearly_aggregate_dir: base.join(&config.yearly_aggregate_dir),
        }
    }

    pub fn raw_raster(&self, month: Month) -> PathBuf {
        self.raw_raster_dir.join(self.monthly_name(month, "tif"))
    }

    pub fn cropped_raster(&self, month: Month) -> PathBuf {
        self.cropped_raster_dir.join(self.monthly_name(month, "tif"))
    }

    pub fn zonal_stats(&self, month: Month) -> PathBuf {
        self.zonal_stats_dir.join(self.monthly_name(month, "csv"))
    }

    pub fn yearly_aggregate(&self) -> PathBuf {
        self.yearly_aggregate_dir
            .join(format!("{}_yearly.csv", self.scenario))
    }

    /// Written once the yearly aggregate has reached the database.
    pub fn upload_marker(&self) -> PathBuf {
        self.yearly_aggregate_dir
            .join(format!("{}_yearly.uploaded", self.scenario))
    }

    /// Months whose zonal statistics are already on disk.
    pub fn zonal_months(&self) -> Vec<Month> {
        Month::iter()
            .filter(|month| self.zonal_stats(*month).exists())
            .collect()
    }

    pub fn create_directories(&self) -> Result<()> {
        for dir in self.directories() {
            fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    fn directories(&self) -> [&Path; 4] {
        [
            self.raw_raster_dir.as_path(),
            self.cropped_raster_dir.as_path(),
            self.zonal_stats_dir.as_path(),
            self.yearly_aggregate_dir.as_path(),
        ]
    }

    fn monthly_name(&self, month: Month, extension: &str) -> String {
        format!("{}_{}.{}", self.scenario, month.number(), extension)
    }
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod test {
    use std::collections::BTreeMap;

    use tempfile::TempDir;

    use super::*;
    use crate::catalog::{get_climatology, Product};

    pub(crate) fn config_fixture(root: &Path) -> Config {
        Config {
            root_dir: root.to_path_buf(),
            geom_path: root.join("adm2.geojson"),
            zonal_stats_aggregates: "min mean max median".to_string(),
            raw_raster_dir: "raw".to_string(),
            cropped_raster_dir: "cropped".to_string(),
            zonal_stats_dir: "zonal_statistics".to_string(),
            yearly_aggregate_dir: "yearly_aggregate".to_string(),
            product: "temp".to_string(),
            scenario: "ACCESS1-0_rcp45".to_string(),
            month: "january".to_string(),
            database_url: format!("sqlite://{}", root.join("test.sqlite").display()),
            boundaries_url: "http://localhost/adm2.zip".to_string(),
            column_mapping: BTreeMap::new(),
            place_id: "adm2_id".to_string(),
            geojson_path: None,
        }
    }

    #[test]
    fn should_lay_out_paths_under_phase_product_scenario() {
        let tmp = TempDir::new().unwrap();
        let config = config_fixture(tmp.path());
        let product = get_climatology("temp").unwrap();
        let paths = ProductPaths::new(&config, &product, Scenario::BnuEsmRcp45);

        assert_eq!(product.product, Product::Temp);
        assert_eq!(
            paths.raw_raster(Month::May),
            tmp.path().join("cmip5/temp/BNU-ESM_rcp45/raw/BNU-ESM_rcp45_5.tif")
        );
        assert_eq!(
            paths.cropped_raster(Month::November),
            tmp.path().join("cmip5/temp/BNU-ESM_rcp45/cropped/BNU-ESM_rcp45_11.tif")
        );
        assert_eq!(
            paths.zonal_stats(Month::January),
            tmp.path()
                .join("cmip5/temp/BNU-ESM_rcp45/zonal_statistics/BNU-ESM_rcp45_1.csv")
        );
        assert_eq!(
            paths.yearly_aggregate(),
            tmp.path()
                .join("cmip5/temp/BNU-ESM_rcp45/yearly_aggregate/BNU-ESM_rcp45_yearly.csv")
        );
    }

    #[test]
    fn should_create_directories_idempotently() {
        let tmp = TempDir::new().unwrap();
        let config = config_fixture(tmp.path());
        let product = get_climatology("prec").unwrap();
        let paths = ProductPaths::new(&config, &product, Scenario::Ccsm4Rcp60);

        paths.create_directories().unwrap();
        paths.create_directories().unwrap();

        for dir in paths.directories() {
            assert!(dir.is_dir());
        }
    }

    #[test]
    fn should_list_zonal_months_on_disk() {
        let tmp = TempDir::new().unwrap();
        let config = config_fixture(tmp.path());
        let product = get_climatology("tmax").unwrap();
        let paths = ProductPaths::new(&config, &product, Scenario::Access10Rcp85);
        paths.create_directories().unwrap();

        fs::write(paths.zonal_stats(Month::February), "id\n").unwrap();
        fs::write(paths.zonal_stats(Month::August), "id\n").unwrap();

        assert_eq!(paths.zonal_months(), vec![Month::February, Month::August]);
    }
}
