use std::fs;
use std::path::Path;

use geo::{Contains, GeodesicArea, Geometry, LineString, Point, Polygon};
use hydroprep_projection::{AlbersParams, Crs, Ellipsoid, Transformer};
use polars::prelude::*;
use serde_json::json;
use tempfile::tempdir;

use hydroprep_core::config::WatershedsConfig;
use hydroprep_core::error::BoundaryError;
use hydroprep_core::pipelines::run_watersheds;
use hydroprep_core::watersheds::{
    enrich_watersheds, load_boundaries, EnrichmentCrs, HucLevel, LayerColumns, WatershedTable,
    WatershedUnit,
};

/// Square with the given corner and side length in the working projection,
/// returned in geographic coordinates.
fn projected_square(crs: &EnrichmentCrs, x0: f64, y0: f64, side: f64) -> Geometry<f64> {
    let inverse = Transformer::new(&crs.working, &crs.geographic).unwrap();
    let corners = [
        (x0, y0),
        (x0 + side, y0),
        (x0 + side, y0 + side),
        (x0, y0 + side),
        (x0, y0),
    ];
    let ring: Vec<(f64, f64)> = corners
        .iter()
        .map(|&(x, y)| inverse.transform(x, y).unwrap())
        .collect();
    Geometry::Polygon(Polygon::new(LineString::from(ring), vec![]))
}

fn lon_lat_box(west: f64, south: f64, east: f64, north: f64) -> Polygon<f64> {
    Polygon::new(
        LineString::from(vec![
            (west, south),
            (east, south),
            (east, north),
            (west, north),
            (west, south),
        ]),
        vec![],
    )
}

fn table(units: Vec<WatershedUnit>) -> WatershedTable {
    WatershedTable {
        level: HucLevel::HU4,
        columns: LayerColumns {
            huc: true,
            name: true,
            states: true,
            geometry: true,
            derived: false,
        },
        units,
    }
}

fn unit(huc: &str, geometry: Option<Geometry<f64>>) -> WatershedUnit {
    WatershedUnit {
        huc: Some(huc.to_string()),
        geometry,
        ..WatershedUnit::default()
    }
}

fn write_layer(container: &Path, layer: &str, features: serde_json::Value) {
    fs::create_dir_all(container).unwrap();
    let collection = json!({ "type": "FeatureCollection", "features": features });
    fs::write(
        container.join(format!("{layer}.geojson")),
        serde_json::to_string(&collection).unwrap(),
    )
    .unwrap();
}

fn square_feature(properties: serde_json::Value) -> serde_json::Value {
    json!({
        "type": "Feature",
        "properties": properties,
        "geometry": {
            "type": "Polygon",
            "coordinates": [[[-100.0, 35.0], [-99.0, 35.0], [-99.0, 36.0], [-100.0, 36.0], [-100.0, 35.0]]]
        }
    })
}

#[test]
fn hundred_km_square_measures_ten_thousand_km2() {
    let crs = EnrichmentCrs::default();
    let square = projected_square(&crs, -500_000.0, 1_500_000.0, 100_000.0);

    let outcome = enrich_watersheds(&table(vec![unit("1203", Some(square))]), &crs).unwrap();
    let measured = &outcome.table.units[0];

    let area = measured.area_km2.unwrap();
    assert!((area - 10_000.0).abs() < 1e-3, "area was {area}");
    assert_eq!(measured.huc.as_deref(), Some("1203"));

    let (expected_lon, expected_lat) = Transformer::new(&crs.working, &crs.geographic)
        .unwrap()
        .transform(-450_000.0, 1_550_000.0)
        .unwrap();
    assert!((measured.centroid_lon.unwrap() - expected_lon).abs() < 1e-9);
    assert!((measured.centroid_lat.unwrap() - expected_lat).abs() < 1e-9);
    assert_eq!(outcome.report.enriched, 1);
    assert!(outcome.report.failures.is_empty());
}

#[test]
fn ring_orientation_does_not_change_area() {
    let crs = EnrichmentCrs::default();
    let ccw = lon_lat_box(-100.0, 35.0, -99.0, 36.0);
    let mut cw_coords: Vec<_> = ccw.exterior().0.clone();
    cw_coords.reverse();
    let cw = Polygon::new(LineString::from(cw_coords), vec![]);

    let outcome = enrich_watersheds(
        &table(vec![
            unit("1101", Some(Geometry::Polygon(ccw))),
            unit("1102", Some(Geometry::Polygon(cw))),
        ]),
        &crs,
    )
    .unwrap();

    let a = outcome.table.units[0].area_km2.unwrap();
    let b = outcome.table.units[1].area_km2.unwrap();
    assert!(a > 0.0);
    assert!((a - b).abs() < 1e-6);
}

#[test]
fn area_agrees_with_geodesic_area() {
    let crs = EnrichmentCrs::default();
    let polygon = lon_lat_box(-100.0, 35.0, -99.0, 36.0);
    let geodesic_km2 = polygon.geodesic_area_unsigned() / 1_000_000.0;

    let outcome = enrich_watersheds(
        &table(vec![unit("1113", Some(Geometry::Polygon(polygon)))]),
        &crs,
    )
    .unwrap();
    let area = outcome.table.units[0].area_km2.unwrap();

    let relative = (area - geodesic_km2).abs() / geodesic_km2;
    assert!(relative < 0.005, "albers {area} vs geodesic {geodesic_km2}");
}

#[test]
fn centroid_falls_inside_convex_unit() {
    let crs = EnrichmentCrs::default();
    let polygon = lon_lat_box(-106.0, 31.0, -94.0, 36.5);

    let outcome = enrich_watersheds(
        &table(vec![unit("1208", Some(Geometry::Polygon(polygon.clone())))]),
        &crs,
    )
    .unwrap();
    let measured = &outcome.table.units[0];
    let centroid = Point::new(measured.centroid_lon.unwrap(), measured.centroid_lat.unwrap());

    assert!(polygon.contains(&centroid));
}

#[test]
fn stored_geometry_is_left_untouched() {
    let crs = EnrichmentCrs::default();
    let geometry = Geometry::Polygon(lon_lat_box(-100.0, 35.0, -99.0, 36.0));
    let input = table(vec![unit("1112", Some(geometry.clone()))]);

    let outcome = enrich_watersheds(&input, &crs).unwrap();

    assert_eq!(outcome.table.units[0].geometry.as_ref(), Some(&geometry));
    assert_eq!(input.units[0].area_km2, None);
    assert!(!input.columns.derived);
    assert!(outcome.table.columns.derived);
}

#[test]
fn bad_geometry_fails_only_its_row() {
    let crs = EnrichmentCrs::default();
    let empty = Geometry::Polygon(Polygon::new(LineString::new(vec![]), vec![]));
    let good = Geometry::Polygon(lon_lat_box(-100.0, 35.0, -99.0, 36.0));

    let outcome = enrich_watersheds(
        &table(vec![
            unit("0101", None),
            unit("0102", Some(empty)),
            unit("0103", Some(good)),
        ]),
        &crs,
    )
    .unwrap();

    let units = &outcome.table.units;
    assert_eq!(units[0].area_km2, None);
    assert_eq!(units[1].area_km2, None);
    assert_eq!(units[1].centroid_lon, None);
    assert!(units[2].area_km2.unwrap() > 0.0);

    assert_eq!(outcome.report.units, 3);
    assert_eq!(outcome.report.enriched, 1);
    let failed: Vec<Option<&str>> = outcome
        .report
        .failures
        .iter()
        .map(|f| f.huc.as_deref())
        .collect();
    assert_eq!(failed, vec![Some("0101"), Some("0102")]);
}

#[test]
fn synthetic_spherical_projection_is_accepted() {
    let crs = EnrichmentCrs {
        working: Crs::Albers(AlbersParams {
            ellipsoid: Ellipsoid::sphere(1_000.0),
            latitude_of_origin: 0.0,
            central_meridian: 0.0,
            standard_parallel_1: 10.0,
            standard_parallel_2: 40.0,
            false_easting: 0.0,
            false_northing: 0.0,
        }),
        geographic: Crs::Wgs84,
    };
    let square = projected_square(&crs, 0.0, 200.0, 10.0);

    let outcome = enrich_watersheds(&table(vec![unit("0001", Some(square))]), &crs).unwrap();
    let area_km2 = outcome.table.units[0].area_km2.unwrap();

    assert!((area_km2 * 1_000_000.0 - 100.0).abs() < 1e-6);
}

#[test]
fn loader_pads_identifiers_and_renames_name() {
    let dir = tempdir().unwrap();
    let container = dir.path().join("boundaries.gdb");
    write_layer(
        &container,
        "WBDHU4",
        json!([
            square_feature(json!({ "huc4": "1203", "name": "Trinity", "states": "TX" })),
            square_feature(json!({ "huc4": 45, "name": "Saint John", "states": "CN,ME" })),
            square_feature(json!({ "huc4": "0307", "name": null, "states": "" })),
        ]),
    );

    let table = load_boundaries(&container, HucLevel::HU4).unwrap();

    assert_eq!(
        table.column_names(),
        vec!["huc4", "watershed_name", "states", "geometry"]
    );
    let hucs: Vec<Option<&str>> = table.units.iter().map(|u| u.huc.as_deref()).collect();
    assert_eq!(hucs, vec![Some("1203"), Some("0045"), Some("0307")]);
    assert_eq!(table.units[1].watershed_name.as_deref(), Some("Saint John"));
    assert_eq!(table.units[2].watershed_name, None);
    assert_eq!(table.units[2].states.as_deref(), Some(""));
    assert!(table.units.iter().all(|u| u.geometry.is_some()));
}

#[test]
fn loader_omits_absent_columns() {
    let dir = tempdir().unwrap();
    write_layer(
        dir.path(),
        "WBDHU8",
        json!([square_feature(json!({ "huc8": "12030105" }))]),
    );

    let table = load_boundaries(dir.path(), HucLevel::HU8).unwrap();

    assert!(!table.columns.name);
    assert!(!table.columns.states);
    assert_eq!(table.column_names(), vec!["huc8", "geometry"]);
}

#[test]
fn missing_container_is_fatal() {
    let dir = tempdir().unwrap();
    let err = load_boundaries(&dir.path().join("absent.gdb"), HucLevel::HU4).unwrap_err();
    assert!(matches!(err, BoundaryError::ContainerNotFound(_)));
}

#[test]
fn missing_layer_lists_available_layers() {
    let dir = tempdir().unwrap();
    write_layer(dir.path(), "WBDHU2", json!([]));
    write_layer(dir.path(), "WBDHU8", json!([]));

    let err = load_boundaries(dir.path(), HucLevel::HU4).unwrap_err();
    match err {
        BoundaryError::LayerNotFound {
            layer, available, ..
        } => {
            assert_eq!(layer, "WBDHU4");
            assert_eq!(available, vec!["WBDHU2", "WBDHU8"]);
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn run_watersheds_writes_parquet_and_geojson() -> PolarsResult<()> {
    let dir = tempdir().unwrap();
    let container = dir.path().join("wbd");
    write_layer(
        &container,
        "WBDHU4",
        json!([
            square_feature(json!({ "huc4": "1112", "name": "Upper Red", "states": "OK,TX" })),
            {
                "type": "Feature",
                "properties": { "huc4": "45", "name": "No shape", "states": null },
                "geometry": null
            }
        ]),
    );
    let output_dir = dir.path().join("processed");
    let config = WatershedsConfig {
        container,
        output_dir: output_dir.clone(),
        ..WatershedsConfig::default()
    };

    let run = run_watersheds(&config).unwrap();

    assert_eq!(run.units, 2);
    assert_eq!(run.artifacts.parquet_path, output_dir.join("huc4.parquet"));
    assert_eq!(run.artifacts.geojson_path, output_dir.join("huc4.geojson"));
    assert_eq!(run.report.failures.len(), 1);
    assert_eq!(run.report.failures[0].huc.as_deref(), Some("0045"));

    let file = fs::File::open(&run.artifacts.parquet_path).unwrap();
    let frame = ParquetReader::new(file).finish()?;
    let names: Vec<String> = frame
        .get_column_names()
        .into_iter()
        .map(|name| name.to_string())
        .collect();
    assert_eq!(names, run.columns);
    assert_eq!(
        names,
        vec![
            "huc4",
            "watershed_name",
            "states",
            "geometry",
            "area_km2",
            "centroid_lon",
            "centroid_lat"
        ]
    );
    let hucs: Vec<Option<&str>> = frame.column("huc4")?.str()?.into_iter().collect();
    assert_eq!(hucs, vec![Some("1112"), Some("0045")]);
    assert_eq!(frame.column("area_km2")?.null_count(), 1);

    let text = fs::read_to_string(&run.artifacts.geojson_path).unwrap();
    let collection: geojson::FeatureCollection = text.parse().unwrap();
    assert_eq!(collection.features.len(), 2);
    assert!(collection.features[0].geometry.is_some());
    assert!(collection.features[1].geometry.is_none());
    let properties = collection.features[0].properties.as_ref().unwrap();
    assert_eq!(properties["huc4"], json!("1112"));
    assert!(properties["area_km2"].as_f64().unwrap() > 0.0);

    assert!(!output_dir.join("huc4.parquet.tmp").exists());
    Ok(())
}

#[test]
fn failed_run_keeps_previous_outputs() {
    let dir = tempdir().unwrap();
    let container = dir.path().join("wbd");
    write_layer(
        &container,
        "WBDHU4",
        json!([square_feature(json!({ "huc4": "1112", "name": "Upper Red" }))]),
    );
    let output_dir = dir.path().join("out");
    fs::create_dir_all(output_dir.join("huc4.geojson")).unwrap();
    fs::write(output_dir.join("huc4.geojson/keep"), b"x").unwrap();
    fs::write(output_dir.join("huc4.parquet"), b"PRIOR").unwrap();

    let config = WatershedsConfig {
        container,
        output_dir: output_dir.clone(),
        ..WatershedsConfig::default()
    };

    assert!(run_watersheds(&config).is_err());
    assert_eq!(fs::read(output_dir.join("huc4.parquet")).unwrap(), b"PRIOR");
    assert!(!output_dir.join("huc4.parquet.tmp").exists());
    assert!(!output_dir.join("huc4.geojson.tmp").exists());
}
