//! Optional assets: a graph JSON document and a property coordinates table.
//!
//! Neither is required. A missing or malformed asset loads as an empty value
//! plus diagnostics the caller shows to the user.

use std::{fs, path::Path};

use log::warn;
use serde::Serialize;
use thiserror::Error;

use crate::{
    cli::CoordinatesArgs,
    coerce,
    io_utils,
    network::Graph,
    table,
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AssetError {
    #[error("asset {path} not found")]
    Missing { path: String },
    #[error("asset {path} could not be read: {message}")]
    Unreadable { path: String, message: String },
    #[error("asset {path} is malformed: {message}")]
    Malformed { path: String, message: String },
    #[error("{path} line {line}: {message}")]
    InvalidRow {
        path: String,
        line: usize,
        message: String,
    },
}

/// An asset value plus everything that went wrong while loading it.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetLoad<T> {
    pub value: T,
    pub diagnostics: Vec<AssetError>,
}

impl<T: Default> AssetLoad<T> {
    fn degraded(error: AssetError) -> Self {
        warn!("{error}");
        Self {
            value: T::default(),
            diagnostics: vec![error],
        }
    }
}

impl<T> AssetLoad<T> {
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

fn read_asset(path: &Path) -> Result<Vec<u8>, AssetError> {
    let shown = path.display().to_string();
    if !path.exists() {
        return Err(AssetError::Missing { path: shown });
    }
    fs::read(path).map_err(|err| AssetError::Unreadable {
        path: shown,
        message: err.to_string(),
    })
}

pub fn load_graph(path: &Path) -> AssetLoad<Graph> {
    let bytes = match read_asset(path) {
        Ok(bytes) => bytes,
        Err(err) => return AssetLoad::degraded(err),
    };
    match serde_json::from_slice::<Graph>(&bytes) {
        Ok(graph) => AssetLoad {
            value: graph,
            diagnostics: Vec::new(),
        },
        Err(err) => AssetLoad::degraded(AssetError::Malformed {
            path: path.display().to_string(),
            message: err.to_string(),
        }),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Coordinate {
    pub property: String,
    pub latitude: f64,
    pub longitude: f64,
}

const PROPERTY_HEADERS: &[&str] = &["nome_propriedade", "propriedade", "nome", "property"];
const LATITUDE_HEADERS: &[&str] = &["latitude", "lat"];
const LONGITUDE_HEADERS: &[&str] = &["longitude", "lon", "lng", "long"];

fn find_header(headers: &csv::StringRecord, names: &[&str]) -> Option<usize> {
    headers
        .iter()
        .position(|h| names.contains(&h.trim().to_lowercase().as_str()))
}

pub fn load_coordinates(path: &Path, delimiter: Option<u8>) -> AssetLoad<Vec<Coordinate>> {
    let shown = path.display().to_string();
    let bytes = match read_asset(path) {
        Ok(bytes) => bytes,
        Err(err) => return AssetLoad::degraded(err),
    };
    let delimiter = io_utils::resolve_input_delimiter(path, delimiter);
    let mut reader = io_utils::open_csv_reader(bytes.as_slice(), delimiter);
    let headers = match reader.headers() {
        Ok(headers) => headers.clone(),
        Err(err) => {
            return AssetLoad::degraded(AssetError::Malformed {
                path: shown,
                message: err.to_string(),
            });
        }
    };
    let (Some(prop_idx), Some(lat_idx), Some(lon_idx)) = (
        find_header(&headers, PROPERTY_HEADERS),
        find_header(&headers, LATITUDE_HEADERS),
        find_header(&headers, LONGITUDE_HEADERS),
    ) else {
        return AssetLoad::degraded(AssetError::Malformed {
            path: shown,
            message: "expected property, latitude and longitude columns".to_string(),
        });
    };

    let mut value = Vec::new();
    let mut diagnostics = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let line = idx + 2;
        let invalid = |message: String| AssetError::InvalidRow {
            path: shown.clone(),
            line,
            message,
        };
        let record = match record {
            Ok(record) => record,
            Err(err) => {
                diagnostics.push(invalid(err.to_string()));
                continue;
            }
        };
        let field = |i: usize| record.get(i).unwrap_or("").trim();
        let property = field(prop_idx);
        if property.is_empty() {
            diagnostics.push(invalid("missing property name".to_string()));
            continue;
        }
        let latitude = coerce::coerce_plain_decimal(field(lat_idx)).filter(|v| v.abs() <= 90.0);
        let longitude = coerce::coerce_plain_decimal(field(lon_idx)).filter(|v| v.abs() <= 180.0);
        match (latitude, longitude) {
            (Some(latitude), Some(longitude)) => value.push(Coordinate {
                property: property.to_string(),
                latitude,
                longitude,
            }),
            _ => diagnostics.push(invalid(format!(
                "unusable coordinates '{}', '{}'",
                field(lat_idx),
                field(lon_idx)
            ))),
        }
    }
    for diagnostic in &diagnostics {
        warn!("{diagnostic}");
    }
    AssetLoad { value, diagnostics }
}

pub fn execute_coordinates(args: &CoordinatesArgs) -> anyhow::Result<()> {
    let loaded = load_coordinates(&args.input, args.delimiter);
    for diagnostic in &loaded.diagnostics {
        eprintln!("Aviso: {diagnostic}");
    }
    let headers = ["propriedade", "latitude", "longitude"]
        .iter()
        .map(|h| h.to_string())
        .collect::<Vec<_>>();
    let rows = loaded
        .value
        .iter()
        .map(|c| {
            vec![
                c.property.clone(),
                format!("{:.6}", c.latitude),
                format!("{:.6}", c.longitude),
            ]
        })
        .collect::<Vec<_>>();
    table::print_table(&headers, &rows);
    Ok(())
}
