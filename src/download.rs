//! Downloads CHELSA rasters and boundary shapefiles.

use std::{
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Context, Error, Result};
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use tempfile::NamedTempFile;
use zip::ZipArchive;

use crate::cli::create_spinner;

/// Streams `url` into `file_path`. The body lands in a temporary file next to
/// the target, which is only persisted once the stream completes.
pub async fn download_with_progress(
    url: &str,
    file_path: &Path,
    progress_bar: ProgressBar,
) -> Result<(), Error> {
    let response = reqwest::get(url)
        .await
        .map_err(|e| Error::msg(format!("Failed to download file: {}", e)))?;

    if !response.status().is_success() {
        return Err(Error::msg(format!(
            "Failed to download {}: {}",
            url,
            response.status()
        )));
    }

    let total_size = response.content_length().unwrap_or(0);
    if total_size > 0 {
        progress_bar.set_length(total_size);
        progress_bar.set_style(
            ProgressStyle::with_template(
                "{msg} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({percent}%) {eta}",
            )?
            .progress_chars("=> "),
        );
    }

    let dir = file_path
        .parent()
        .ok_or_else(|| anyhow!("{} has no parent directory", file_path.display()))?;
    fs::create_dir_all(dir)?;
    let mut file = NamedTempFile::new_in(dir)?;

    let mut downloaded = 0u64;
    let mut stream = response.bytes_stream();
    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| Error::msg(format!("Error reading chunk: {}", e)))?;
        file.write_all(&chunk)?;
        downloaded += chunk.len() as u64;
        progress_bar.set_position(downloaded);
    }

    file.flush()?;
    file.persist(file_path)?;
    Ok(())
}

/// Downloads a raster into `out_path`.
pub async fn download_raster(url: &str, out_path: &Path) -> Result<()> {
    info!("Downloading {}", url);
    let bar = create_spinner(format!(
        "Downloading {}",
        out_path.file_name().unwrap_or_default().to_string_lossy()
    ));

    download_with_progress(url, out_path, bar.clone()).await?;

    bar.finish_with_message(format!("Saved {}", out_path.display()));
    Ok(())
}

/// File stem of the archive at `url`: `.../wca_admbnda_adm2_ocha.zip` gives
/// `wca_admbnda_adm2_ocha`.
pub fn shapefile_name(url: &str) -> Result<String> {
    let last = url
        .split('?')
        .next()
        .and_then(|path| path.rsplit('/').next())
        .filter(|name| !name.is_empty())
        .ok_or_else(|| anyhow!("No file name in {}", url))?;

    Ok(last.strip_suffix(".zip").unwrap_or(last).to_string())
}

/// Downloads and unpacks a zipped shapefile into `out_dir`, returning the
/// `.shp` path. Skipped when the shapefile is already there.
pub async fn download_shapefile(url: &str, out_dir: &Path) -> Result<PathBuf> {
    let shp_path = out_dir.join(format!("{}.shp", shapefile_name(url)?));
    if shp_path.exists() {
        info!("Shapefile already exists at {}", shp_path.display());
        return Ok(shp_path);
    }

    fs::create_dir_all(out_dir)?;
    let archive_path = out_dir.join(format!("{}.zip", shapefile_name(url)?));
    let bar = create_spinner("Downloading boundaries".to_string());
    download_with_progress(url, &archive_path, bar.clone()).await?;
    bar.finish_and_clear();

    extract_zip(&archive_path, out_dir)?;
    fs::remove_file(&archive_path)?;

    if !shp_path.exists() {
        return Err(anyhow!(
            "{} did not contain {}",
            url,
            shp_path.file_name().unwrap_or_default().to_string_lossy()
        ));
    }

    info!("Saved shapefile to {}", shp_path.display());
    Ok(shp_path)
}

/// Extracts the zip archive at `archive_path` into `out_dir`.
pub fn extract_zip(archive_path: &Path, out_dir: &Path) -> Result<()> {
    let file = File::open(archive_path)
        .with_context(|| format!("Unable to open {}", archive_path.display()))?;
    let mut archive = ZipArchive::new(file)?;
    archive.extract(out_dir)?;
    Ok(())
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod test {
    use std::io::Write;

    use tempfile::TempDir;
    use zip::{write::FileOptions, ZipWriter};

    use super::*;

    #[test]
    fn should_take_shapefile_name_from_url() {
        assert_eq!(
            shapefile_name("https://data.humdata.org/a/b/download/wca_admbnda_adm2_ocha.zip")
                .unwrap(),
            "wca_admbnda_adm2_ocha"
        );
        assert_eq!(
            shapefile_name("http://host/boundaries.zip?dl=1").unwrap(),
            "boundaries"
        );
        assert!(shapefile_name("http://host/").is_err());
    }

    #[test]
    fn should_extract_zip() {
        let tmp = TempDir::new().unwrap();
        let archive_path = tmp.path().join("adm2.zip");
        {
            let mut zip = ZipWriter::new(File::create(&archive_path).unwrap());
            zip.start_file("adm2.shp", FileOptions::default()).unwrap();
            zip.write_all(b"shape").unwrap();
            zip.start_file("adm2.dbf", FileOptions::default()).unwrap();
            zip.write_all(b"table").unwrap();
            zip.finish().unwrap();
        }

        let out = tmp.path().join("out");
        extract_zip(&archive_path, &out).unwrap();

        assert_eq!(fs::read_to_string(out.join("adm2.shp")).unwrap(), "shape");
        assert!(out.join("adm2.dbf").exists());
    }

    #[tokio::test]
    async fn should_skip_existing_shapefile() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("adm2.shp"), "").unwrap();

        // The URL is never requested because the shapefile is already there.
        let shp = download_shapefile("http://127.0.0.1:9/adm2.zip", tmp.path())
            .await
            .unwrap();
        assert_eq!(shp, tmp.path().join("adm2.shp"));
    }

    #[tokio::test]
    async fn should_leave_nothing_behind_on_failed_download() {
        let tmp = TempDir::new().unwrap();
        let target = tmp.path().join("raw").join("CCSM4_rcp60_1.tif");

        let result = download_raster("http://127.0.0.1:9/missing.tif", &target).await;

        assert!(result.is_err());
        assert!(!target.exists());
    }
}
