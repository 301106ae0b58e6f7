//! Reprojection into the map's display CRS (EPSG:3857)

use std::f64::consts::{FRAC_PI_4, PI};
use std::fmt;
use std::sync::Arc;

use ahash::AHashMap;
use geo_types::Coord;
use gv_core::CrsCode;
use parking_lot::RwLock;
use proj4rs::Proj;
use reqwest::Client;
use tracing::{debug, info};

use crate::DataError;

/// WGS84 semi-major axis used by Web Mercator
const EARTH_RADIUS: f64 = 6_378_137.0;

/// Latitude where Web Mercator turns the world into a square
const MAX_LATITUDE: f64 = 85.051_128_779_806_59;

const WGS84_LONLAT: &str = "+proj=longlat +datum=WGS84 +no_defs";

/// How coordinates of one CRS reach EPSG:3857
pub enum Projection {
    /// Already in display coordinates
    Identity,
    /// Longitude/latitude in degrees on (close to) WGS84
    LonLat,
    /// Anything `proj4rs` understands, taken through WGS84 lon/lat
    Proj4 {
        definition: String,
        source: Box<Proj>,
        target: Box<Proj>,
    },
}

impl fmt::Debug for Projection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Projection::Identity => f.write_str("Identity"),
            Projection::LonLat => f.write_str("LonLat"),
            Projection::Proj4 { definition, .. } => {
                f.debug_struct("Proj4").field("definition", definition).finish()
            }
        }
    }
}

impl Projection {
    /// The projections known without a registry lookup
    pub fn builtin(code: &CrsCode) -> Option<Self> {
        match (code.authority.as_str(), code.code.as_str()) {
            ("EPSG", "4326") | ("OGC", "CRS84") | ("EPSG", "4269") => Some(Projection::LonLat),
            ("EPSG", "3857") | ("EPSG", "900913") => Some(Projection::Identity),
            _ => None,
        }
    }

    /// Parse a proj4 definition string
    pub fn from_proj4(crs: &CrsCode, definition: &str) -> Result<Self, DataError> {
        let definition = definition.trim();
        let error = |message: String| DataError::Projection {
            crs: crs.to_string(),
            message,
        };
        let source = Proj::from_proj_string(definition).map_err(|e| error(e.to_string()))?;
        let target = Proj::from_proj_string(WGS84_LONLAT).map_err(|e| error(e.to_string()))?;
        Ok(Projection::Proj4 {
            definition: definition.to_owned(),
            source: Box::new(source),
            target: Box::new(target),
        })
    }

    /// Project one coordinate into EPSG:3857
    pub fn to_web_mercator(&self, coord: Coord<f64>) -> Result<Coord<f64>, DataError> {
        match self {
            Projection::Identity => Ok(coord),
            Projection::LonLat => Ok(lonlat_to_web_mercator(coord)),
            Projection::Proj4 {
                definition,
                source,
                target,
            } => {
                let mut point = if source.is_latlong() {
                    (coord.x.to_radians(), coord.y.to_radians(), 0.0)
                } else {
                    (coord.x, coord.y, 0.0)
                };
                proj4rs::transform::transform(source, target, &mut point).map_err(|e| {
                    DataError::Projection {
                        crs: definition.clone(),
                        message: e.to_string(),
                    }
                })?;
                Ok(lonlat_to_web_mercator(Coord {
                    x: point.0.to_degrees(),
                    y: point.1.to_degrees(),
                }))
            }
        }
    }
}

/// Spherical Mercator forward projection; latitude is clamped to the
/// projection's valid band
pub fn lonlat_to_web_mercator(coord: Coord<f64>) -> Coord<f64> {
    let lat = coord.y.clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians();
    Coord {
        x: EARTH_RADIUS * coord.x.to_radians(),
        y: EARTH_RADIUS * (FRAC_PI_4 + lat / 2.0).tan().ln(),
    }
}

/// Inverse of [`lonlat_to_web_mercator`]
pub fn web_mercator_to_lonlat(coord: Coord<f64>) -> Coord<f64> {
    Coord {
        x: (coord.x / EARTH_RADIUS).to_degrees(),
        y: (2.0 * (coord.y / EARTH_RADIUS).exp().atan() - PI / 2.0).to_degrees(),
    }
}

/// Resolves CRS codes to projections, fetching unknown definitions once.
///
/// Definitions are looked up at `{base}/{authority}/{code}/proj4.txt`, the
/// registry's proj4 rendering of its WKT entry. `proj4rs` parses proj4
/// strings only. Codes that failed stay failed until
/// [`forget_failures`](Self::forget_failures).
pub struct ProjectionRegistry {
    client: Option<Client>,
    base_url: String,
    cache: RwLock<AHashMap<CrsCode, Arc<Projection>>>,
    failures: RwLock<AHashMap<CrsCode, String>>,
}

impl ProjectionRegistry {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client: Some(client),
            base_url: base_url.into(),
            cache: RwLock::new(AHashMap::new()),
            failures: RwLock::new(AHashMap::new()),
        }
    }

    /// Registry that knows only the built-in and registered projections
    pub fn offline() -> Self {
        Self {
            client: None,
            base_url: String::new(),
            cache: RwLock::new(AHashMap::new()),
            failures: RwLock::new(AHashMap::new()),
        }
    }

    /// Add a definition by hand
    pub fn register_proj4(&self, code: CrsCode, definition: &str) -> Result<Arc<Projection>, DataError> {
        let projection = Arc::new(Projection::from_proj4(&code, definition)?);
        self.cache.write().insert(code, Arc::clone(&projection));
        Ok(projection)
    }

    pub fn definition_url(&self, code: &CrsCode) -> String {
        format!(
            "{}/{}/{}/proj4.txt",
            self.base_url.trim_end_matches('/'),
            code.authority.to_lowercase(),
            code.code
        )
    }

    pub async fn resolve(&self, code: &CrsCode) -> Result<Arc<Projection>, DataError> {
        if let Some(projection) = self.cache.read().get(code) {
            return Ok(Arc::clone(projection));
        }
        if let Some(builtin) = Projection::builtin(code) {
            let projection = Arc::new(builtin);
            self.cache.write().insert(code.clone(), Arc::clone(&projection));
            return Ok(projection);
        }

        if let Some(message) = self.failures.read().get(code) {
            return Err(DataError::Projection {
                crs: code.to_string(),
                message: message.clone(),
            });
        }

        match self.fetch(code).await {
            Ok(projection) => Ok(projection),
            Err(err) => {
                let message = match &err {
                    DataError::Projection { message, .. } => message.clone(),
                    other => other.to_string(),
                };
                self.failures.write().insert(code.clone(), message);
                Err(err)
            }
        }
    }

    /// Allow codes that failed to be fetched again
    pub fn forget_failures(&self) {
        self.failures.write().clear();
    }

    async fn fetch(&self, code: &CrsCode) -> Result<Arc<Projection>, DataError> {
        let Some(client) = &self.client else {
            return Err(DataError::Projection {
                crs: code.to_string(),
                message: "unknown CRS and no registry configured".into(),
            });
        };

        let url = self.definition_url(code);
        debug!(crs = %code, %url, "fetching projection definition");
        let response = client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(DataError::Projection {
                crs: code.to_string(),
                message: format!("registry returned HTTP {}", response.status().as_u16()),
            });
        }
        let definition = response.text().await?;
        let projection = self.register_proj4(code.clone(), &definition)?;
        info!(crs = %code, definition = definition.trim(), "registered projection");
        Ok(projection)
    }
}
