use std::path::PathBuf;

use anyhow::Result;

use crate::{boundaries::shapefile_to_geojson, config::Config, download::download_shapefile};

/// Downloads the configured boundaries and writes the dashboard GeoJSON.
pub async fn boundaries(config: &Config) -> Result<PathBuf> {
    let out_dir = config.root_dir.join("boundaries");
    let shp_path = download_shapefile(&config.boundaries_url, &out_dir).await?;

    let geojson_path = config.geojson_path();
    shapefile_to_geojson(
        &shp_path,
        &geojson_path,
        &config.column_mapping,
        &config.place_id,
    )?;

    Ok(geojson_path)
}
