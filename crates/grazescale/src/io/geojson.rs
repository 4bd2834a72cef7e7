use std::path::Path;

use geojson::{Feature, FeatureCollection, Geometry, JsonObject, JsonValue, Value};
use crate::{
    error::Result,
    pipeline::AnalysisReport,
    types::{Analysis, Contour},
};

impl Contour {
    /// Closed GeoJSON polygon ring in image pixel coordinates
    pub fn to_geojson_geometry(&self) -> Geometry {
        let mut ring: Vec<Vec<f64>> = self
            .points
            .iter()
            .map(|p| vec![p.x as f64, p.y as f64])
            .collect();
        if let Some(first) = ring.first().cloned() {
            ring.push(first);
        }
        Geometry::new(Value::Polygon(vec![ring]))
    }
}

impl AnalysisReport {
    /// Export the outline and its measurements.
    ///
    /// A measured report becomes a collection with one polygon feature whose
    /// properties are the measurement fields plus species and confidence. A
    /// failed report becomes an empty collection carrying the error message.
    pub fn to_geojson(&self) -> Result<FeatureCollection> {
        let mut foreign_members = JsonObject::new();
        foreign_members.insert("image_width".to_string(), JsonValue::from(self.image_width));
        foreign_members.insert("image_height".to_string(), JsonValue::from(self.image_height));

        let mut features = Vec::new();
        match (&self.analysis, &self.contour) {
            (Analysis::Measured(measurements), Some(contour)) => {
                let mut properties = match serde_json::to_value(measurements)? {
                    JsonValue::Object(map) => map,
                    _ => JsonObject::new(),
                };
                if let Some(species) = self.species {
                    properties.insert("species".to_string(), JsonValue::from(species.to_string()));
                }
                if let Some(confidence) = self.confidence {
                    properties.insert("confidence".to_string(), JsonValue::from(confidence as f64));
                }

                features.push(Feature {
                    bbox: None,
                    geometry: Some(contour.to_geojson_geometry()),
                    id: None,
                    properties: Some(properties),
                    foreign_members: None,
                });
            }
            (Analysis::Failed { error }, _) => {
                foreign_members.insert("error".to_string(), JsonValue::from(error.to_string()));
            }
            (Analysis::Measured(_), None) => {}
        }

        Ok(FeatureCollection {
            bbox: None,
            features,
            foreign_members: Some(foreign_members),
        })
    }

    pub fn to_geojson_string(&self) -> Result<String> {
        let geojson = self.to_geojson()?;
        Ok(serde_json::to_string_pretty(&geojson)?)
    }

    pub fn save_geojson<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, self.to_geojson_string()?)?;
        Ok(())
    }
}
