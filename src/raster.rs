//! GeoTIFF reading, cropping and masking with GDAL.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, ensure, Context, Result};
use gdal::{
    raster::{rasterize, Buffer},
    vector::Geometry,
    Dataset, DriverManager, GeoTransform,
};
use log::{debug, info};

use crate::boundaries::Boundaries;

/// Used when the source raster declares no nodata value.
pub const FALLBACK_NODATA: f64 = -999.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Bounds {
    pub fn of(geometry: &Geometry) -> Self {
        let envelope = geometry.envelope();
        Bounds {
            min_x: envelope.MinX,
            min_y: envelope.MinY,
            max_x: envelope.MaxX,
            max_y: envelope.MaxY,
        }
    }

    pub fn union(&self, other: &Bounds) -> Self {
        Bounds {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }
}

/// Rectangle of pixels, offset from the raster's top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelWindow {
    pub col: usize,
    pub row: usize,
    pub width: usize,
    pub height: usize,
}

impl PixelWindow {
    pub fn area(&self) -> usize {
        self.width * self.height
    }
}

/// Pixels covering `bounds`, clipped to the raster. `None` when they do not
/// overlap.
pub fn window_for_bounds(
    transform: &GeoTransform,
    raster_size: (usize, usize),
    bounds: &Bounds,
) -> Option<PixelWindow> {
    let (width, height) = raster_size;

    let x0 = (bounds.min_x - transform[0]) / transform[1];
    let x1 = (bounds.max_x - transform[0]) / transform[1];
    let y0 = (bounds.min_y - transform[3]) / transform[5];
    let y1 = (bounds.max_y - transform[3]) / transform[5];

    let col_start = x0.min(x1).floor().max(0.0);
    let col_end = x0.max(x1).ceil().min(width as f64);
    let row_start = y0.min(y1).floor().max(0.0);
    let row_end = y0.max(y1).ceil().min(height as f64);

    if col_end <= col_start || row_end <= row_start {
        return None;
    }

    Some(PixelWindow {
        col: col_start as usize,
        row: row_start as usize,
        width: (col_end - col_start) as usize,
        height: (row_end - row_start) as usize,
    })
}

pub fn is_north_up(transform: &GeoTransform) -> bool {
    transform[2] == 0.0 && transform[4] == 0.0
}

/// Geotransform of a window's top-left pixel.
pub fn window_transform(transform: &GeoTransform, window: &PixelWindow) -> GeoTransform {
    let col = window.col as f64;
    let row = window.row as f64;
    [
        transform[0] + col * transform[1] + row * transform[2],
        transform[1],
        transform[2],
        transform[3] + col * transform[4] + row * transform[5],
        transform[4],
        transform[5],
    ]
}

/// First band of a raster held in memory.
#[derive(Debug, Clone)]
pub struct RasterData {
    pub values: Vec<f32>,
    pub width: usize,
    pub height: usize,
    pub transform: GeoTransform,
    pub projection: String,
    pub nodata: Option<f64>,
}

impl RasterData {
    pub fn read(path: &Path) -> Result<Self> {
        let dataset = Dataset::open(path)
            .with_context(|| format!("Unable to open raster {}", path.display()))?;
        RasterData::from_dataset(&dataset)
    }

    pub fn from_dataset(dataset: &Dataset) -> Result<Self> {
        let (width, height) = dataset.raster_size();
        let window = PixelWindow {
            col: 0,
            row: 0,
            width,
            height,
        };
        RasterData::read_window(dataset, &window)
    }

    /// Reads only the pixels of `window` from the first band.
    pub fn read_window(dataset: &Dataset, window: &PixelWindow) -> Result<Self> {
        let band = dataset.rasterband(1)?;
        let size = (window.width, window.height);
        let buffer = band.read_as::<f32>(
            (window.col as isize, window.row as isize),
            size,
            size,
            None,
        )?;

        Ok(RasterData {
            values: buffer.data().to_vec(),
            width: window.width,
            height: window.height,
            transform: window_transform(&dataset.geo_transform()?, window),
            projection: dataset.projection(),
            nodata: band.no_data_value(),
        })
    }

    pub fn nodata_or_fallback(&self) -> f64 {
        self.nodata.unwrap_or(FALLBACK_NODATA)
    }

    /// True for NaN and for the declared nodata value.
    pub fn is_nodata(&self, value: f32) -> bool {
        value.is_nan() || self.nodata.map_or(false, |nodata| value == nodata as f32)
    }

    /// Row-major copy of the pixels in `window`.
    pub fn window(&self, window: &PixelWindow) -> Vec<f32> {
        let mut values = Vec::with_capacity(window.area());
        for row in window.row..window.row + window.height {
            let start = row * self.width + window.col;
            values.extend_from_slice(&self.values[start..start + window.width]);
        }
        values
    }

    /// Writes a single band GeoTIFF, via a partial file renamed on success.
    /// Returns the written path, which always ends in `.tif`.
    pub fn write_geotiff(&self, path: &Path) -> Result<PathBuf> {
        let path = check_tif_extension(path);
        let partial = path.with_extension("part.tif");
        {
            let driver = DriverManager::get_driver_by_name("GTiff")?;
            let mut dataset =
                driver.create_with_band_type::<f32, _>(&partial, self.width, self.height, 1)?;
            dataset.set_geo_transform(&self.transform)?;
            dataset.set_projection(&self.projection)?;

            let mut band = dataset.rasterband(1)?;
            band.set_no_data_value(Some(self.nodata_or_fallback()))?;
            let mut buffer = Buffer::new((self.width, self.height), self.values.clone());
            band.write((0, 0), (self.width, self.height), &mut buffer)?;
        }
        fs::rename(&partial, &path)?;
        Ok(path)
    }
}

/// Forces a `.tif` suffix.
pub fn check_tif_extension(path: &Path) -> PathBuf {
    match path.extension().and_then(|e| e.to_str()) {
        Some("tif") => path.to_path_buf(),
        _ => path.with_extension("tif"),
    }
}

pub fn raster_description(path: &Path) -> Result<()> {
    let dataset = Dataset::open(path)?;
    let (width, height) = dataset.raster_size();
    let crs = dataset
        .spatial_ref()
        .and_then(|srs| srs.name())
        .unwrap_or_else(|_| "unknown".to_string());

    info!("Raster {}", path.display());
    info!("  CRS: {}", crs);
    info!("  Bands: {}", dataset.raster_count());
    info!("  Size: {}x{}", width, height);
    info!("  Transform: {:?}", dataset.geo_transform()?);
    Ok(())
}

/// Burns `geometries` into a byte mask over a window: 1 inside, 0 outside.
/// A pixel is inside when its centre is.
pub fn rasterize_mask(
    transform: &GeoTransform,
    width: usize,
    height: usize,
    projection: &str,
    geometries: &[Geometry],
) -> Result<Vec<u8>> {
    if geometries.is_empty() || width == 0 || height == 0 {
        return Ok(vec![0; width * height]);
    }

    let driver = DriverManager::get_driver_by_name("MEM")?;
    let mut dataset = driver.create_with_band_type::<u8, _>("", width, height, 1)?;
    dataset.set_geo_transform(transform)?;
    dataset.set_projection(projection)?;

    let burn_values = vec![1.0; geometries.len()];
    rasterize(&mut dataset, &[1], geometries, &burn_values, None)?;

    let band = dataset.rasterband(1)?;
    let mask = band.read_as::<u8>((0, 0), (width, height), (width, height), None)?;
    Ok(mask.data().to_vec())
}

/// Crops `raster_path` to the envelope of `boundaries` and sets pixels
/// outside every geometry to nodata.
pub fn crop_raster_with_geometry(
    raster_path: &Path,
    boundaries: &Boundaries,
    out_path: &Path,
) -> Result<()> {
    let dataset = Dataset::open(raster_path)
        .with_context(|| format!("Unable to open raster {}", raster_path.display()))?;
    let transform = dataset.geo_transform()?;
    ensure!(
        is_north_up(&transform),
        "Rotated rasters are not supported: {}",
        raster_path.display()
    );

    let boundaries = match dataset.spatial_ref() {
        Ok(srs) => boundaries.to_crs(&srs)?,
        Err(_) => boundaries.clone(),
    };

    let bounds = boundaries
        .bounds()
        .ok_or_else(|| anyhow!("No boundaries to crop {} with", raster_path.display()))?;
    let window = window_for_bounds(&transform, dataset.raster_size(), &bounds)
        .ok_or_else(|| anyhow!("Boundaries do not overlap {}", raster_path.display()))?;
    debug!("Cropping {} to {:?}", raster_path.display(), window);

    let mut cropped = RasterData::read_window(&dataset, &window)?;
    let mask = rasterize_mask(
        &cropped.transform,
        cropped.width,
        cropped.height,
        &cropped.projection,
        &boundaries.geometries(),
    )?;

    let nodata = cropped.nodata_or_fallback();
    for (value, inside) in cropped.values.iter_mut().zip(mask) {
        if inside == 0 {
            *value = nodata as f32;
        }
    }
    cropped.nodata = Some(nodata);

    if let Some(parent) = out_path.parent() {
        fs::create_dir_all(parent)?;
    }
    let out_path = cropped.write_geotiff(out_path)?;
    info!("Saved cropped raster to {}", out_path.display());
    Ok(())
}

// -- Tests -------------------------------------------------------------------
