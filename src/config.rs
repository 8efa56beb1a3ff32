//! Pipeline configuration, read from a JSON file.

use std::{
    collections::BTreeMap,
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::Deserialize;

pub const DATABASE_URL_ENV: &str = "DATABASE_URL";

const WEST_AFRICA_ADM2_URL: &str = "https://data.humdata.org/dataset/b20cd345-93fb-43bd-9c6e-7bc7d87b63eb/resource/30b6979a-d3f3-4982-971f-dc53f076bc52/download/wca_admbnda_adm2_ocha.zip";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub root_dir: PathBuf,
    /// Boundary layer used for cropping and zonal statistics.
    pub geom_path: PathBuf,
    #[serde(default = "default_zonal_stats_aggregates")]
    pub zonal_stats_aggregates: String,
    #[serde(default = "default_raw_raster_dir")]
    pub raw_raster_dir: String,
    #[serde(default = "default_cropped_raster_dir")]
    pub cropped_raster_dir: String,
    #[serde(default = "default_zonal_stats_dir")]
    pub zonal_stats_dir: String,
    #[serde(default = "default_yearly_aggregate_dir")]
    pub yearly_aggregate_dir: String,
    #[serde(default = "default_product")]
    pub product: String,
    #[serde(default = "default_scenario")]
    pub scenario: String,
    #[serde(default = "default_month")]
    pub month: String,
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_boundaries_url")]
    pub boundaries_url: String,
    /// Source attribute -> pipeline attribute.
    #[serde(default = "default_column_mapping")]
    pub column_mapping: BTreeMap<String, String>,
    #[serde(default = "default_place_id")]
    pub place_id: String,
    /// GeoJSON served by the dashboard.
    #[serde(default)]
    pub geojson_path: Option<PathBuf>,
}

impl Config {
    /// Applies environment overrides. `DATABASE_URL` wins over the file.
    pub fn with_env(mut self) -> Self {
        if let Ok(url) = std::env::var(DATABASE_URL_ENV) {
            if !url.trim().is_empty() {
                self.database_url = url;
            }
        }
        self
    }

    pub fn geojson_path(&self) -> PathBuf {
        self.geojson_path
            .clone()
            .unwrap_or_else(|| self.root_dir.join("boundaries").join("boundaries.geojson"))
    }
}

pub fn read_config(config_file: &Path) -> Result<Config> {
    let file = File::open(config_file)
        .with_context(|| format!("Unable to open config file {}", config_file.display()))?;
    let config: Config = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Invalid config file {}", config_file.display()))?;

    Ok(config.with_env())
}

fn default_zonal_stats_aggregates() -> String {
    "min mean max median".to_string()
}

fn default_raw_raster_dir() -> String {
    "raw".to_string()
}

fn default_cropped_raster_dir() -> String {
    "cropped".to_string()
}

fn default_zonal_stats_dir() -> String {
    "zonal_statistics".to_string()
}

fn default_yearly_aggregate_dir() -> String {
    "yearly_aggregate".to_string()
}

fn default_product() -> String {
    "temp".to_string()
}

fn default_scenario() -> String {
    "ACCESS1-0_rcp45".to_string()
}

fn default_month() -> String {
    "january".to_string()
}

fn default_database_url() -> String {
    "sqlite://chelsa.sqlite".to_string()
}

fn default_boundaries_url() -> String {
    WEST_AFRICA_ADM2_URL.to_string()
}

fn default_place_id() -> String {
    "adm2_id".to_string()
}

/// Column names of the OCHA administrative boundary shapefiles.
pub fn default_column_mapping() -> BTreeMap<String, String> {
    [
        ("admin0Pcod", "iso2_code"),
        ("admin0Name", "adm0_name"),
        ("admin1Name", "adm1_name"),
        ("admin2Name", "adm2_name"),
        ("admin1Pcod", "adm1_id"),
        ("admin2Pcod", "adm2_id"),
    ]
    .into_iter()
    .map(|(from, to)| (from.to_string(), to.to_string()))
    .collect()
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod test {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    #[test]
    fn should_read_minimal_config_with_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"root_dir": "data", "geom_path": "data/adm2/wca_admbnda_adm2_ocha.shp"}}"#
        )
        .unwrap();

        let config: Config =
            serde_json::from_reader(File::open(file.path()).unwrap()).unwrap();

        assert_eq!(config.root_dir, PathBuf::from("data"));
        assert_eq!(config.zonal_stats_aggregates, "min mean max median");
        assert_eq!(config.raw_raster_dir, "raw");
        assert_eq!(config.place_id, "adm2_id");
        assert_eq!(config.column_mapping.get("admin2Name").unwrap(), "adm2_name");
        assert_eq!(
            config.geojson_path(),
            PathBuf::from("data/boundaries/boundaries.geojson")
        );
    }

    #[test]
    fn should_read_full_config() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "root_dir": "/tmp/chelsa",
                "geom_path": "adm2.shp",
                "zonal_stats_aggregates": "mean",
                "raw_raster_dir": "r",
                "cropped_raster_dir": "c",
                "zonal_stats_dir": "z",
                "yearly_aggregate_dir": "y",
                "product": "tmax",
                "scenario": "CCSM4_rcp60",
                "month": "MARCH",
                "column_mapping": {{"NAME": "adm2_name"}}
            }}"#
        )
        .unwrap();

        let config = read_config(file.path()).unwrap();

        assert_eq!(config.product, "tmax");
        assert_eq!(config.month, "MARCH");
        assert_eq!(config.cropped_raster_dir, "c");
        assert_eq!(config.column_mapping.len(), 1);
    }

    #[test]
    fn should_override_database_url_from_env() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"root_dir": "data", "geom_path": "adm2.shp", "database_url": "sqlite://file.sqlite"}}"#
        )
        .unwrap();

        std::env::set_var(DATABASE_URL_ENV, "sqlite:///tmp/env.sqlite");
        let overridden = read_config(file.path()).unwrap();

        std::env::set_var(DATABASE_URL_ENV, "  ");
        let blank = read_config(file.path()).unwrap();

        std::env::remove_var(DATABASE_URL_ENV);
        let unset = read_config(file.path()).unwrap();

        assert_eq!(overridden.database_url, "sqlite:///tmp/env.sqlite");
        assert_eq!(blank.database_url, "sqlite://file.sqlite");
        assert_eq!(unset.database_url, "sqlite://file.sqlite");
    }

    #[test]
    fn should_fail_on_missing_file() {
        let err = read_config(Path::new("/does/not/exist.json")).unwrap_err();
        assert!(err.to_string().contains("Unable to open config file"));
    }
}
