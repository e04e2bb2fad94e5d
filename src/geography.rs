// geography.rs
// State boundaries and centroids for mapping. Not part of the merged panel.

use std::path::Path;

use geo::{Centroid, MultiPolygon};
use shapefile::dbase::{FieldValue, Record};
use tracing::info;

use crate::error::{PanelError, Result};

#[derive(Debug, Clone)]
pub struct StateShape {
    pub fips: String,
    pub code: String,
    pub state: String,
    pub geometry: MultiPolygon<f64>,
    pub centroid_lon: f64,
    pub centroid_lat: f64,
}

/// Reads the state boundary shapefile (`statefp`, `stusps`, `name` attributes,
/// any case) and computes each state's centroid.
#[tracing::instrument(level = "info", skip_all, fields(path = %path.display()))]
pub fn load_states(path: &Path) -> Result<Vec<StateShape>> {
    let shapes = shapefile::read_as::<_, shapefile::Polygon, Record>(path).map_err(|source| {
        PanelError::Shapefile {
            path: path.to_path_buf(),
            source,
        }
    })?;

    let states = shapes
        .into_iter()
        .map(|(polygon, record)| {
            build_shape(path, |name| text_field(&record, name), MultiPolygon::from(polygon))
        })
        .collect::<Result<Vec<_>>>()?;

    info!(states = states.len(), "loaded state shapes");
    Ok(states)
}

fn text_field(record: &Record, name: &str) -> Option<String> {
    let value = record
        .get(&name.to_uppercase())
        .or_else(|| record.get(name))?;

    match value {
        FieldValue::Character(Some(text)) => Some(text.trim().to_string()),
        FieldValue::Memo(text) => Some(text.trim().to_string()),
        _ => None,
    }
}

fn build_shape(
    path: &Path,
    field: impl Fn(&str) -> Option<String>,
    geometry: MultiPolygon<f64>,
) -> Result<StateShape> {
    let required = |name: &str| field(name).ok_or_else(|| PanelError::missing_column(path, name));

    let fips = required("statefp")?;
    let code = required("stusps")?.to_uppercase();
    let state = required("name")?;

    let centroid = geometry
        .centroid()
        .ok_or_else(|| PanelError::schema(path, format!("{state} has an empty geometry")))?;

    Ok(StateShape {
        fips,
        code,
        state,
        centroid_lon: centroid.x(),
        centroid_lat: centroid.y(),
        geometry,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{LineString, Polygon};

    fn square(x0: f64, y0: f64, side: f64) -> MultiPolygon<f64> {
        let ring = LineString::from(vec![
            (x0, y0),
            (x0 + side, y0),
            (x0 + side, y0 + side),
            (x0, y0 + side),
            (x0, y0),
        ]);
        MultiPolygon::new(vec![Polygon::new(ring, vec![])])
    }

    fn attrs(name: &str) -> Option<String> {
        match name {
            "statefp" => Some("01".to_string()),
            "stusps" => Some("al".to_string()),
            "name" => Some("Alabama".to_string()),
            _ => None,
        }
    }

    #[test]
    fn test_centroid_and_uppercased_code() {
        let shape = build_shape(Path::new("states.shp"), attrs, square(-88.0, 30.0, 4.0)).unwrap();

        assert_eq!(shape.fips, "01");
        assert_eq!(shape.code, "AL");
        assert_eq!(shape.state, "Alabama");
        assert!((shape.centroid_lon + 86.0).abs() < 1e-9);
        assert!((shape.centroid_lat - 32.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_attribute() {
        let err = build_shape(
            Path::new("states.shp"),
            |name| if name == "stusps" { None } else { attrs(name) },
            square(0.0, 0.0, 1.0),
        )
        .unwrap_err();
        assert!(matches!(err, PanelError::MissingColumn { ref column, .. } if column == "stusps"));
    }

    #[test]
    fn test_empty_geometry_is_rejected() {
        let err = build_shape(Path::new("states.shp"), attrs, MultiPolygon::new(vec![])).unwrap_err();
        assert!(matches!(err, PanelError::Schema { .. }));
    }

    #[test]
    fn test_missing_shapefile() {
        let err = load_states(Path::new("/nonexistent/states.shp")).unwrap_err();
        assert!(matches!(err, PanelError::Shapefile { .. }));
    }
}
