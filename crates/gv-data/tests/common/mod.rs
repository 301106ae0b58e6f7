//! Range-capable HTTP server and GeoParquet fixtures for integration tests

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use arrow::array::{BinaryArray, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::file::metadata::KeyValue;
use parquet::file::properties::WriterProperties;
use tiny_http::{Header, Method, Response, Server, StatusCode};

/// A request as the server saw it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Logged {
    pub method: String,
    pub path: String,
    pub range: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct ServerOptions {
    /// Send `content-length` on `HEAD`
    pub head_length: bool,
    /// Answer ranged `GET`s with 206; otherwise send the whole file with 200
    pub honor_ranges: bool,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            head_length: true,
            honor_ranges: true,
        }
    }
}

/// A fixed answer for one extra path
#[derive(Debug, Clone)]
pub struct Route {
    pub path: String,
    pub status: u16,
    pub body: String,
}

impl Route {
    pub fn new(path: &str, status: u16, body: &str) -> Self {
        Self {
            path: path.to_owned(),
            status,
            body: body.to_owned(),
        }
    }
}

/// Serves one in-memory file at `/data.parquet`, plus any extra routes,
/// until dropped
pub struct RangeServer {
    server: Arc<Server>,
    handle: Option<JoinHandle<()>>,
    log: Arc<Mutex<Vec<Logged>>>,
    pub url: String,
    /// `http://host:port`, without a trailing slash
    pub base: String,
}

impl RangeServer {
    pub fn start(data: Vec<u8>, options: ServerOptions) -> Self {
        Self::with_routes(data, options, Vec::new())
    }

    pub fn with_routes(data: Vec<u8>, options: ServerOptions, routes: Vec<Route>) -> Self {
        let server = Arc::new(Server::http("127.0.0.1:0").expect("start mock server"));
        let base = format!("http://{}", server.server_addr());
        let url = format!("{base}/data.parquet");
        let log = Arc::new(Mutex::new(Vec::new()));

        let handle = {
            let server = Arc::clone(&server);
            let log = Arc::clone(&log);
            thread::spawn(move || {
                for request in server.incoming_requests() {
                    let range = request
                        .headers()
                        .iter()
                        .find(|h| h.field.equiv("Range"))
                        .map(|h| h.value.as_str().to_owned());
                    log.lock().unwrap().push(Logged {
                        method: request.method().to_string(),
                        path: request.url().to_owned(),
                        range: range.clone(),
                    });

                    if request.url() != "/data.parquet" {
                        let route = routes.iter().find(|r| r.path == request.url());
                        let _ = match route {
                            Some(route) => request.respond(
                                Response::from_string(route.body.clone()).with_status_code(route.status),
                            ),
                            None => request.respond(Response::empty(404)),
                        };
                        continue;
                    }

                    let method = request.method().clone();
                    let result = match method {
                        Method::Head => {
                            let length = options.head_length.then_some(data.len());
                            request.respond(Response::new(
                                StatusCode(200),
                                vec![],
                                std::io::empty(),
                                length,
                                None,
                            ))
                        }
                        Method::Get => match range.as_deref().and_then(parse_range) {
                            Some((start, end)) if options.honor_ranges => {
                                let end = end.min(data.len() - 1);
                                let content_range = format!("bytes {start}-{end}/{}", data.len());
                                request.respond(
                                    Response::from_data(data[start..=end].to_vec())
                                        .with_status_code(206)
                                        .with_header(
                                            Header::from_bytes("Content-Range", content_range)
                                                .expect("valid header"),
                                        ),
                                )
                            }
                            _ => request.respond(Response::from_data(data.clone())),
                        },
                        _ => request.respond(Response::empty(405)),
                    };
                    result.expect("response should succeed");
                }
            })
        };

        Self {
            server,
            handle: Some(handle),
            log,
            url,
            base,
        }
    }

    pub fn requests(&self) -> Vec<Logged> {
        self.log.lock().unwrap().clone()
    }

    pub fn count(&self, method: &str) -> usize {
        self.requests().iter().filter(|r| r.method == method).count()
    }

    pub fn count_path(&self, path: &str) -> usize {
        self.requests().iter().filter(|r| r.path == path).count()
    }
}

impl Drop for RangeServer {
    fn drop(&mut self) {
        self.server.unblock();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// `bytes=a-b` or `bytes=a-`, as an inclusive pair
fn parse_range(value: &str) -> Option<(usize, usize)> {
    let spec = value.strip_prefix("bytes=")?;
    let (start, end) = spec.split_once('-')?;
    let start = start.parse().ok()?;
    let end = if end.is_empty() { usize::MAX } else { end.parse().ok()? };
    Some((start, end))
}

/// Little-endian WKB point
pub fn wkb_point(x: f64, y: f64) -> Vec<u8> {
    let mut out = vec![1u8];
    out.extend_from_slice(&1u32.to_le_bytes());
    out.extend_from_slice(&x.to_le_bytes());
    out.extend_from_slice(&y.to_le_bytes());
    out
}

pub const GEO_EPSG_4326: &str = r#"{
    "version": "1.1.0",
    "primary_column": "geometry",
    "columns": {
        "geometry": {
            "encoding": "WKB",
            "geometry_types": ["Point"],
            "crs": {"id": {"authority": "EPSG", "code": 4326}}
        }
    }
}"#;

pub const GEO_EPSG_27700: &str = r#"{
    "version": "1.1.0",
    "primary_column": "geometry",
    "columns": {
        "geometry": {
            "encoding": "WKB",
            "geometry_types": ["Point"],
            "crs": "EPSG:27700"
        }
    }
}"#;

/// OSGB 1936 / British National Grid, as served by spatialreference.org
pub const PROJ4_EPSG_27700: &str = "+proj=tmerc +lat_0=49 +lon_0=-2 +k=0.9996012717 +x_0=400000 +y_0=-100000 +ellps=airy +towgs84=446.448,-125.157,542.06,0.15,0.247,0.842,-20.489 +units=m +no_defs";

/// GeoParquet file of `rows` points. Row `i` has id `i`, name `row-i` and a
/// point at (i / 10, i / 20); every seventh geometry is null. Row groups
/// hold `row_group_size` rows.
pub fn geoparquet(rows: usize, row_group_size: usize, geo: Option<&str>) -> Vec<u8> {
    let schema = Arc::new(Schema::new(vec![
        Field::new("id", DataType::Int64, false),
        Field::new("name", DataType::Utf8, false),
        Field::new("geometry", DataType::Binary, true),
    ]));

    let ids: Vec<i64> = (0..rows as i64).collect();
    let names: Vec<String> = (0..rows).map(|i| format!("row-{i}")).collect();
    let geometries: Vec<Option<Vec<u8>>> = (0..rows)
        .map(|i| (i % 7 != 6).then(|| wkb_point(i as f64 / 10.0, i as f64 / 20.0)))
        .collect();
    let geometry: BinaryArray = geometries.iter().map(|g| g.as_deref()).collect();

    let batch = RecordBatch::try_new(
        Arc::clone(&schema),
        vec![
            Arc::new(Int64Array::from(ids)),
            Arc::new(StringArray::from(names)),
            Arc::new(geometry),
        ],
    )
    .expect("valid batch");

    let props = WriterProperties::builder()
        .set_max_row_group_size(row_group_size)
        .set_key_value_metadata(geo.map(|g| vec![KeyValue::new("geo".to_owned(), g.to_owned())]))
        .build();

    let mut buffer = Vec::new();
    let mut writer = ArrowWriter::try_new(&mut buffer, schema, Some(props)).expect("writer");
    writer.write(&batch).expect("write batch");
    writer.close().expect("close writer");
    buffer
}

/// Rows that carry a geometry in a file built by [`geoparquet`]
pub fn rows_with_geometry(range: std::ops::Range<usize>) -> usize {
    range.filter(|i| i % 7 != 6).count()
}
