//! Administrative boundaries read through OGR.

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    fs,
    path::Path,
};

use anyhow::{anyhow, Context, Result};
use gdal::{
    spatial_ref::{AxisMappingStrategy, CoordTransform, SpatialRef},
    vector::{Geometry, LayerAccess},
    Dataset,
};
use log::info;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::raster::Bounds;

/// Attributes every administrative unit carries once the column mapping is applied.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdminAttributes {
    pub iso2_code: Option<String>,
    pub adm0_name: Option<String>,
    pub adm1_name: Option<String>,
    pub adm2_name: Option<String>,
    pub adm1_id: Option<String>,
    pub adm2_id: Option<String>,
}

impl AdminAttributes {
    /// Sets an attribute by its pipeline name. Unknown names are rejected.
    pub fn set(&mut self, name: &str, value: Option<String>) -> Result<()> {
        let slot = match name {
            "iso2_code" => &mut self.iso2_code,
            "adm0_name" => &mut self.adm0_name,
            "adm1_name" => &mut self.adm1_name,
            "adm2_name" => &mut self.adm2_name,
            "adm1_id" => &mut self.adm1_id,
            "adm2_id" => &mut self.adm2_id,
            _ => return Err(anyhow!("`{}` is not an administrative attribute", name)),
        };
        *slot = value.filter(|v| !v.trim().is_empty());
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        match name {
            "iso2_code" => self.iso2_code.as_deref(),
            "adm0_name" => self.adm0_name.as_deref(),
            "adm1_name" => self.adm1_name.as_deref(),
            "adm2_name" => self.adm2_name.as_deref(),
            "adm1_id" => self.adm1_id.as_deref(),
            "adm2_id" => self.adm2_id.as_deref(),
            _ => None,
        }
    }
}

#[derive(Clone)]
pub struct AdminUnit {
    pub place_id: String,
    pub attributes: AdminAttributes,
    pub geometry: Geometry,
}

#[derive(Clone)]
pub struct Boundaries {
    pub units: Vec<AdminUnit>,
    pub srs: Option<SpatialRef>,
}

impl Boundaries {
    /// Reads the first layer of an OGR source and renames its attributes
    /// with `column_mapping`.
    pub fn read(
        path: &Path,
        column_mapping: &BTreeMap<String, String>,
        place_id_column: &str,
    ) -> Result<Self> {
        let dataset = Dataset::open(path)
            .with_context(|| format!("Unable to open boundaries {}", path.display()))?;
        let mut layer = dataset.layer(0)?;
        let srs = layer.spatial_ref();

        let mut features = Vec::new();
        for feature in layer.features() {
            let geometry = match feature.geometry() {
                Some(geometry) => geometry.clone(),
                None => continue,
            };

            let mut attributes = AdminAttributes::default();
            for (source, target) in column_mapping {
                let value = feature
                    .field_as_string_by_name(source)
                    .with_context(|| format!("Missing boundary column `{}`", source))?;
                attributes.set(target, value)?;
            }

            features.push((attributes, geometry));
        }

        info!(
            "Read {} administrative units from {}",
            features.len(),
            path.display()
        );

        Ok(Boundaries::from_features(features, srs, place_id_column))
    }

    pub fn from_features(
        features: Vec<(AdminAttributes, Geometry)>,
        srs: Option<SpatialRef>,
        place_id_column: &str,
    ) -> Self {
        let attributes: Vec<AdminAttributes> = features.iter().map(|(a, _)| a.clone()).collect();
        let place_ids = assign_place_ids(&attributes, place_id_column);

        let units = features
            .into_iter()
            .zip(place_ids)
            .map(|((attributes, geometry), place_id)| AdminUnit {
                place_id,
                attributes,
                geometry,
            })
            .collect();

        Boundaries { units, srs }
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Returns the boundaries in `target`, reprojecting when the CRS differs.
    pub fn to_crs(&self, target: &SpatialRef) -> Result<Self> {
        let transform = match &self.srs {
            Some(source) if source != target => Some(coord_transform(source, target)?),
            _ => None,
        };

        let mut units = Vec::with_capacity(self.units.len());
        for unit in &self.units {
            let geometry = match &transform {
                Some(transform) => unit.geometry.transform(transform)?,
                None => unit.geometry.clone(),
            };
            units.push(AdminUnit {
                place_id: unit.place_id.clone(),
                attributes: unit.attributes.clone(),
                geometry,
            });
        }

        Ok(Boundaries {
            units,
            srs: Some(target.clone()),
        })
    }

    /// Envelope of every unit.
    pub fn bounds(&self) -> Option<Bounds> {
        self.units
            .iter()
            .map(|unit| Bounds::of(&unit.geometry))
            .reduce(|a, b| a.union(&b))
    }

    pub fn geometries(&self) -> Vec<Geometry> {
        self.units.iter().map(|unit| unit.geometry.clone()).collect()
    }

    /// Serialises the units as an EPSG:4326 GeoJSON FeatureCollection.
    pub fn to_geojson(&self) -> Result<Value> {
        let wgs84 = SpatialRef::from_epsg(4326)?;
        let boundaries = self.to_crs(&wgs84)?;

        let mut features = Vec::with_capacity(boundaries.units.len());
        for unit in &boundaries.units {
            let geometry: Value = serde_json::from_str(&unit.geometry.json()?)?;
            let mut properties = serde_json::to_value(&unit.attributes)?;
            properties["place_id"] = Value::String(unit.place_id.clone());

            features.push(json!({
                "type": "Feature",
                "id": unit.place_id,
                "properties": properties,
                "geometry": geometry,
            }));
        }

        Ok(json!({
            "type": "FeatureCollection",
            "features": features,
        }))
    }
}

/// Uses the place id column when it is complete and unique, otherwise numbers
/// the units within each country (`BF1`, `BF2`, ...).
pub fn assign_place_ids(attributes: &[AdminAttributes], place_id_column: &str) -> Vec<String> {
    let candidates: Vec<Option<&str>> = attributes
        .iter()
        .map(|a| a.get(place_id_column))
        .collect();

    let mut seen = HashSet::new();
    let usable = candidates
        .iter()
        .all(|c| matches!(c, Some(id) if seen.insert(*id)));

    if usable {
        return candidates
            .into_iter()
            .map(|c| c.unwrap_or_default().to_string())
            .collect();
    }

    let mut counters: HashMap<String, usize> = HashMap::new();
    attributes
        .iter()
        .map(|a| {
            let country = a.iso2_code.clone().unwrap_or_default();
            let counter = counters.entry(country.clone()).or_insert(0);
            *counter += 1;
            format!("{}{}", country, counter)
        })
        .collect()
}

/// Writes the boundaries as GeoJSON unless `out_path` already exists.
pub fn shapefile_to_geojson(
    shp_path: &Path,
    out_path: &Path,
    column_mapping: &BTreeMap<String, String>,
    place_id_column: &str,
) -> Result<()> {
    if out_path.exists() {
        info!("GeoJSON already exists at {}", out_path.display());
        return Ok(());
    }

    let boundaries = Boundaries::read(shp_path, column_mapping, place_id_column)?;
    let geojson = boundaries.to_geojson()?;

    if let Some(parent) = out_path.parent() {
        fs::create_dir_all(parent)?;
    }
    let partial = out_path.with_extension("geojson.part");
    fs::write(&partial, serde_json::to_vec(&geojson)?)?;
    fs::rename(&partial, out_path)?;

    info!("Saved GeoJSON to {}", out_path.display());
    Ok(())
}

fn coord_transform(source: &SpatialRef, target: &SpatialRef) -> Result<CoordTransform> {
    let mut source = source.clone();
    let mut target = target.clone();
    source.set_axis_mapping_strategy(AxisMappingStrategy::TraditionalGisOrder);
    target.set_axis_mapping_strategy(AxisMappingStrategy::TraditionalGisOrder);

    Ok(CoordTransform::new(&source, &target)?)
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod test {
    use tempfile::TempDir;

    use super::*;
    use crate::config::default_column_mapping;

    fn attributes(iso2: &str, adm2_id: Option<&str>) -> AdminAttributes {
        AdminAttributes {
            iso2_code: Some(iso2.to_string()),
            adm2_id: adm2_id.map(String::from),
            ..Default::default()
        }
    }

    /// Two unit squares side by side, in the OCHA attribute layout.
    pub(crate) const TWO_SQUARES_GEOJSON: &str = r#"{
        "type": "FeatureCollection",
        "crs": { "type": "name", "properties": { "name": "urn:ogc:def:crs:OGC:1.3:CRS84" } },
        "features": [
            {
                "type": "Feature",
                "properties": {
                    "admin0Name": "Burkina Faso", "admin0Pcod": "BF",
                    "admin1Name": "Centre", "admin1Pcod": "BF13",
                    "admin2Name": "Kadiogo", "admin2Pcod": "BF1300"
                },
                "geometry": { "type": "Polygon", "coordinates": [[[0,0],[1,0],[1,1],[0,1],[0,0]]] }
            },
            {
                "type": "Feature",
                "properties": {
                    "admin0Name": "Burkina Faso", "admin0Pcod": "BF",
                    "admin1Name": "Centre", "admin1Pcod": "BF13",
                    "admin2Name": "Ouaga", "admin2Pcod": "BF1301"
                },
                "geometry": { "type": "Polygon", "coordinates": [[[1,0],[2,0],[2,1],[1,1],[1,0]]] }
            }
        ]
    }"#;

    pub(crate) fn write_two_squares(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("adm2.geojson");
        fs::write(&path, TWO_SQUARES_GEOJSON).unwrap();
        path
    }

    #[test]
    fn should_use_unique_place_id_column() {
        let attrs = vec![attributes("BF", Some("BF1300")), attributes("BF", Some("BF1301"))];
        assert_eq!(assign_place_ids(&attrs, "adm2_id"), vec!["BF1300", "BF1301"]);
    }

    #[test]
    fn should_number_units_per_country_when_ids_repeat() {
        let attrs = vec![
            attributes("BF", Some("X")),
            attributes("ML", Some("X")),
            attributes("BF", Some("Y")),
        ];
        assert_eq!(assign_place_ids(&attrs, "adm2_id"), vec!["BF1", "ML1", "BF2"]);
    }

    #[test]
    fn should_number_units_when_ids_missing() {
        let attrs = vec![attributes("NE", None), attributes("NE", Some("NE01"))];
        assert_eq!(assign_place_ids(&attrs, "adm2_id"), vec!["NE1", "NE2"]);
    }

    #[test]
    fn should_reject_unknown_attribute() {
        let mut attrs = AdminAttributes::default();
        assert!(attrs.set("adm3_name", Some("x".into())).is_err());
        attrs.set("adm1_name", Some("  ".into())).unwrap();
        assert_eq!(attrs.adm1_name, None);
    }

    #[test]
    fn should_read_boundaries_with_column_mapping() {
        let tmp = TempDir::new().unwrap();
        let path = write_two_squares(tmp.path());

        let boundaries = Boundaries::read(&path, &default_column_mapping(), "adm2_id").unwrap();

        assert_eq!(boundaries.len(), 2);
        let first = &boundaries.units[0];
        assert_eq!(first.place_id, "BF1300");
        assert_eq!(first.attributes.iso2_code.as_deref(), Some("BF"));
        assert_eq!(first.attributes.adm2_name.as_deref(), Some("Kadiogo"));
        assert_eq!(first.attributes.adm1_id.as_deref(), Some("BF13"));

        let bounds = boundaries.bounds().unwrap();
        assert_eq!(bounds.min_x, 0.0);
        assert_eq!(bounds.max_x, 2.0);
        assert_eq!(bounds.min_y, 0.0);
        assert_eq!(bounds.max_y, 1.0);
    }

    #[test]
    fn should_write_geojson_once() {
        let tmp = TempDir::new().unwrap();
        let source = write_two_squares(tmp.path());
        let out = tmp.path().join("dash").join("west_africa.geojson");

        shapefile_to_geojson(&source, &out, &default_column_mapping(), "adm2_id").unwrap();

        let written: Value = serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
        let features = written["features"].as_array().unwrap();
        assert_eq!(features.len(), 2);
        assert_eq!(features[1]["properties"]["adm2_name"], "Ouaga");
        assert_eq!(features[1]["properties"]["place_id"], "BF1301");

        fs::write(&out, "{}").unwrap();
        shapefile_to_geojson(&source, &out, &default_column_mapping(), "adm2_id").unwrap();
        assert_eq!(fs::read_to_string(&out).unwrap(), "{}");
    }
}
