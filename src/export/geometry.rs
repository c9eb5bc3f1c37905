//! Geometry extraction for GeoJSON features
//!
//! Two modes, selected by which fields are configured:
//! - coordinate array: `geometry.coord_field` names an array used as is,
//!   `geometry.type_field` names the geometry type
//! - lon/lat: `geometry.lon_field` and `geometry.lat_field` (plus an optional
//!   `geometry.alt_field`) are assembled into a `Point`
//!
//! The coordinate array mode wins when both are configured. Paths follow
//! [`crate::record::path`]; an absent path leaves the geometry empty.

use serde_json::{json, Number, Value};
use tracing::debug;

use crate::error::{Result, SerializationError};
use crate::record::{path, Record};

/// Field mappings for the geometry of each feature.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeometryOptions {
    pub lon_field: Option<String>,
    pub lat_field: Option<String>,
    pub alt_field: Option<String>,
    pub type_field: Option<String>,
    pub coord_field: Option<String>,
    /// Keep the consumed source fields in the feature properties
    pub keep_geometry_info: bool,
    /// Fields always removed from the feature properties
    pub exclude_fields: Vec<String>,
}

/// Geometry of one feature.
#[derive(Debug, Clone, PartialEq)]
pub struct GeometryDescriptor {
    pub geometry_type: String,
    pub coordinates: Vec<Value>,
}

impl GeometryDescriptor {
    fn to_value(&self) -> Value {
        json!({
            "type": self.geometry_type,
            "coordinates": self.coordinates,
        })
    }
}

/// Builds GeoJSON features out of nested source documents.
#[derive(Debug, Clone)]
pub struct GeometryExtractor {
    options: GeometryOptions,
}

impl GeometryExtractor {
    pub fn new(options: GeometryOptions) -> Self {
        Self { options }
    }

    /// Extract the geometry of `source`
    ///
    /// Consumed fields are removed from `source` unless geometry info is kept;
    /// excluded fields are removed in every case.
    ///
    /// # Arguments
    /// * `source` - Source document, turned into the feature properties
    ///
    /// # Returns
    /// * `Result<GeometryDescriptor>` - Geometry, or an error when a configured
    ///   field holds a value of the wrong kind
    pub fn extract(&self, source: &mut Record) -> Result<GeometryDescriptor> {
        let geometry = match self.options.coord_field.as_deref() {
            Some(coord_field) => self.extract_coordinates(source, coord_field)?,
            None => self.extract_point(source)?,
        };

        for field in &self.options.exclude_fields {
            path::remove(source, field);
        }

        Ok(geometry)
    }

    /// Turn `source` into a GeoJSON `Feature`
    pub fn feature(&self, mut source: Record) -> Result<Value> {
        let geometry = self.extract(&mut source)?;
        Ok(json!({
            "type": "Feature",
            "geometry": geometry.to_value(),
            "properties": Value::Object(source),
        }))
    }

    fn extract_coordinates(
        &self,
        source: &mut Record,
        coord_field: &str,
    ) -> Result<GeometryDescriptor> {
        let mut coordinates = Vec::new();
        if let Some(value) = path::get(source, coord_field) {
            match value {
                Value::Array(items) => coordinates = items.clone(),
                other => {
                    return Err(SerializationError::Record(format!(
                        "{coord_field} is not an array: {other}"
                    ))
                    .into());
                }
            }
            self.consume(source, coord_field);
        }

        let mut geometry_type = String::new();
        if let Some(type_field) = self.options.type_field.as_deref() {
            if let Some(value) = path::get(source, type_field) {
                geometry_type = scalar_text(value).ok_or_else(|| {
                    SerializationError::Record(format!("{type_field} is not a scalar: {value}"))
                })?;
                self.consume(source, type_field);
            }
        }

        Ok(GeometryDescriptor {
            geometry_type,
            coordinates,
        })
    }

    fn extract_point(&self, source: &mut Record) -> Result<GeometryDescriptor> {
        let mut coordinates = Vec::new();
        let options = &self.options;

        if let (Some(lon_field), Some(lat_field)) =
            (options.lon_field.as_deref(), options.lat_field.as_deref())
        {
            let lon = path::get(source, lon_field).map(|v| number(v, lon_field)).transpose()?;
            let lat = path::get(source, lat_field).map(|v| number(v, lat_field)).transpose()?;

            if let (Some(lon), Some(lat)) = (lon, lat) {
                coordinates.push(Value::Number(lon));
                coordinates.push(Value::Number(lat));
                self.consume(source, lon_field);
                self.consume(source, lat_field);

                if let Some(alt_field) = options.alt_field.as_deref() {
                    if let Some(value) = path::get(source, alt_field) {
                        coordinates.push(Value::Number(number(value, alt_field)?));
                        self.consume(source, alt_field);
                    }
                }
            } else {
                debug!("No coordinates at {} / {}", lon_field, lat_field);
            }
        }

        Ok(GeometryDescriptor {
            geometry_type: "Point".to_string(),
            coordinates,
        })
    }

    fn consume(&self, source: &mut Record, field: &str) {
        if !self.options.keep_geometry_info {
            path::remove(source, field);
        }
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Numbers pass through; numeric strings are parsed.
fn number(value: &Value, field: &str) -> Result<Number> {
    let parsed = match value {
        Value::Number(n) => Some(n.clone()),
        Value::String(s) => s.trim().parse::<f64>().ok().and_then(Number::from_f64),
        _ => None,
    };
    parsed.ok_or_else(|| {
        SerializationError::Record(format!("{field} is not a number: {value}")).into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    fn lon_lat() -> GeometryOptions {
        GeometryOptions {
            lon_field: Some("x_lon".to_string()),
            lat_field: Some("x_lat".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_lon_lat_point() {
        let extractor = GeometryExtractor::new(lon_lat());
        let mut source = record(json!({ "name": "a", "x_lon": 139.7, "x_lat": 35.6 }));

        let geometry = extractor.extract(&mut source).unwrap();
        assert_eq!(geometry.geometry_type, "Point");
        assert_eq!(geometry.coordinates, vec![json!(139.7), json!(35.6)]);
        assert_eq!(source, record(json!({ "name": "a" })));
    }

    #[test]
    fn test_altitude_and_keep_info() {
        let options = GeometryOptions {
            alt_field: Some("pos.alt".to_string()),
            keep_geometry_info: true,
            ..lon_lat()
        };
        let extractor = GeometryExtractor::new(options);
        let mut source = record(json!({ "x_lon": "1.5", "x_lat": 2, "pos": { "alt": 30 } }));

        let geometry = extractor.extract(&mut source).unwrap();
        assert_eq!(geometry.coordinates, vec![json!(1.5), json!(2), json!(30)]);
        assert!(source.contains_key("x_lon"));
        assert_eq!(source["pos"]["alt"], 30);
    }

    #[test]
    fn test_missing_latitude_leaves_point_empty() {
        let extractor = GeometryExtractor::new(lon_lat());
        let mut source = record(json!({ "x_lon": 1.0 }));

        let geometry = extractor.extract(&mut source).unwrap();
        assert_eq!(geometry.geometry_type, "Point");
        assert!(geometry.coordinates.is_empty());
        assert!(source.contains_key("x_lon"));
    }

    #[test]
    fn test_coordinate_array_mode() {
        let options = GeometryOptions {
            coord_field: Some("shape.points[1]".to_string()),
            type_field: Some("shape.kind".to_string()),
            exclude_fields: vec!["secret".to_string()],
            ..lon_lat()
        };
        let extractor = GeometryExtractor::new(options);
        let source = record(json!({
            "x_lon": 5,
            "secret": "s",
            "shape": { "kind": "LineString", "points": [[0, 0], [[1, 1], [2, 2]]] }
        }));

        let feature = extractor.feature(source).unwrap();
        assert_eq!(feature["type"], "Feature");
        assert_eq!(feature["geometry"]["type"], "LineString");
        assert_eq!(feature["geometry"]["coordinates"], json!([[1, 1], [2, 2]]));
        assert_eq!(
            feature["properties"],
            json!({ "x_lon": 5, "shape": { "points": [[0, 0]] } })
        );
    }

    #[test]
    fn test_missing_coordinate_field() {
        let options = GeometryOptions {
            coord_field: Some("geo.coords".to_string()),
            ..Default::default()
        };
        let extractor = GeometryExtractor::new(options);

        let feature = extractor.feature(record(json!({ "name": "n" }))).unwrap();
        assert_eq!(feature["geometry"], json!({ "type": "", "coordinates": [] }));
        assert_eq!(feature["properties"], json!({ "name": "n" }));
    }

    #[test]
    fn test_wrong_kinds_are_errors() {
        let options = GeometryOptions {
            coord_field: Some("geo".to_string()),
            ..Default::default()
        };
        let extractor = GeometryExtractor::new(options);
        assert!(extractor.feature(record(json!({ "geo": "1,2" }))).is_err());

        let extractor = GeometryExtractor::new(lon_lat());
        assert!(extractor.feature(record(json!({ "x_lon": "east", "x_lat": 1 }))).is_err());
    }
}
