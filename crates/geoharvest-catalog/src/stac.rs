//! STAC scene search and asset signing.
//!
//! A search is a single POST to the catalog's `/search` endpoint. Results are
//! returned in service order and truncated to the requested limit; no client
//! side sorting happens. Asset hrefs are signed one at a time right before they
//! are downloaded, because Planetary Computer SAS tokens expire.

use crate::{CatalogError, Result};
use chrono::NaiveDate;
use geoharvest_common::BoundingBox;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Planetary Computer SAS signing endpoint.
pub const PC_SIGN_URL: &str = "https://planetarycomputer.microsoft.com/api/sas/v1/sign";

/// Collection searched by default.
pub const SENTINEL_2_L2A: &str = "sentinel-2-l2a";

// ============================================================================
// Query and result types
// ============================================================================

/// Parameters of one scene search.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneQuery {
    /// Collections to search.
    pub collections: Vec<String>,
    /// Area of interest.
    pub bbox: BoundingBox,
    /// First acquisition day (inclusive).
    pub start: NaiveDate,
    /// Last acquisition day (inclusive).
    pub end: NaiveDate,
    /// Scenes must have strictly less cloud cover than this (percent).
    pub max_cloud_cover: f64,
    /// Maximum number of scenes returned.
    pub limit: usize,
}

impl SceneQuery {
    /// STAC `datetime` interval, e.g. `2024-01-01/2024-06-30`.
    pub fn datetime(&self) -> String {
        format!("{}/{}", self.start.format("%Y-%m-%d"), self.end.format("%Y-%m-%d"))
    }

    /// JSON body of the search request.
    pub fn to_body(&self) -> Value {
        json!({
            "collections": self.collections,
            "bbox": self.bbox.to_array(),
            "datetime": self.datetime(),
            "query": { "eo:cloud_cover": { "lt": self.max_cloud_cover } },
            "limit": self.limit,
        })
    }
}

/// A scene returned by a search.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Scene {
    /// Scene identifier, also its directory name.
    pub id: String,
    /// Collection the scene belongs to, when the service reports it.
    pub collection: Option<String>,
    /// Asset key → unsigned href.
    pub assets: BTreeMap<String, String>,
    /// The full item document as returned by the service.
    pub metadata: Value,
}

impl Scene {
    /// Unsigned href of an asset (band).
    pub fn asset_href(&self, band: &str) -> Option<&str> {
        self.assets.get(band).map(String::as_str)
    }

    /// Build a scene from one GeoJSON feature.
    pub fn from_feature(feature: Value) -> Result<Self> {
        let id = feature
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| CatalogError::malformed("feature without an id", &feature.to_string()))?
            .to_string();

        let collection = feature
            .get("collection")
            .and_then(Value::as_str)
            .map(str::to_string);

        let assets = feature
            .get("assets")
            .and_then(Value::as_object)
            .map(|assets| {
                assets
                    .iter()
                    .filter_map(|(key, asset)| {
                        asset
                            .get("href")
                            .and_then(Value::as_str)
                            .map(|href| (key.clone(), href.to_string()))
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            id,
            collection,
            assets,
            metadata: feature,
        })
    }
}

/// Parse a search response body into at most `limit` scenes.
pub fn parse_search_response(body: &str, limit: usize) -> Result<Vec<Scene>> {
    let doc: Value = serde_json::from_str(body)
        .map_err(|e| CatalogError::malformed(format!("search response is not JSON: {}", e), body))?;

    let features = match doc.get("features") {
        Some(Value::Array(features)) => features,
        _ => return Err(CatalogError::malformed("search response has no features array", body)),
    };

    features
        .iter()
        .take(limit)
        .cloned()
        .map(Scene::from_feature)
        .collect()
}

// ============================================================================
// Catalog seam
// ============================================================================

/// A searchable scene catalog.
pub trait SceneCatalog {
    /// Run a search and return scenes in service order.
    fn search(&self, query: &SceneQuery) -> Result<Vec<Scene>>;

    /// Turn an asset href into a URL that can be downloaded now.
    fn sign(&self, href: &str) -> Result<String>;
}

/// Well-known STAC endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StacCatalog {
    /// Microsoft Planetary Computer. Assets need SAS signing.
    PlanetaryComputer,
    /// AWS Earth Search (Element 84). Assets are public.
    EarthSearch,
    /// Any other STAC API root. Assets are used as-is.
    Custom(String),
}

impl StacCatalog {
    /// Full POST `/search` URL.
    pub fn search_url(&self) -> String {
        match self {
            Self::PlanetaryComputer => {
                "https://planetarycomputer.microsoft.com/api/stac/v1/search".to_string()
            }
            Self::EarthSearch => "https://earth-search.aws.element84.com/v1/search".to_string(),
            Self::Custom(base) => {
                let base = base.trim_end_matches('/');
                if base.ends_with("/search") {
                    base.to_string()
                } else {
                    format!("{}/search", base)
                }
            }
        }
    }

    /// Parse `pc`, `earth-search` or a URL.
    pub fn from_str_or_url(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "pc" | "planetary-computer" | "planetarycomputer" => Self::PlanetaryComputer,
            "es" | "earth-search" | "earthsearch" => Self::EarthSearch,
            _ => Self::Custom(s.to_string()),
        }
    }

    /// Whether asset hrefs must be signed before download.
    pub fn needs_signing(&self) -> bool {
        matches!(self, Self::PlanetaryComputer)
    }
}

// ============================================================================
// HTTP client
// ============================================================================

/// Blocking STAC client.
pub struct StacClient {
    catalog: StacCatalog,
    client: reqwest::blocking::Client,
    sign_url: String,
}

impl StacClient {
    /// Create a client for a catalog.
    pub fn new(catalog: StacCatalog) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("geoharvest/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self::with_client(catalog, client))
    }

    /// Create a client around an existing HTTP client.
    pub fn with_client(catalog: StacCatalog, client: reqwest::blocking::Client) -> Self {
        Self {
            catalog,
            client,
            sign_url: PC_SIGN_URL.to_string(),
        }
    }

    /// Override the signing endpoint.
    pub fn with_sign_url(mut self, sign_url: impl Into<String>) -> Self {
        self.sign_url = sign_url.into();
        self
    }

    /// The catalog this client talks to.
    pub fn catalog(&self) -> &StacCatalog {
        &self.catalog
    }
}

impl SceneCatalog for StacClient {
    fn search(&self, query: &SceneQuery) -> Result<Vec<Scene>> {
        let url = self.catalog.search_url();
        info!(
            url = %url,
            bbox = %query.bbox,
            datetime = %query.datetime(),
            max_cloud_cover = query.max_cloud_cover,
            limit = query.limit,
            "searching scenes"
        );

        let response = self.client.post(&url).json(&query.to_body()).send()?;
        let status = response.status();
        let body = response.text()?;
        if !status.is_success() {
            return Err(CatalogError::http("STAC search", status.as_u16(), &body));
        }

        let scenes = parse_search_response(&body, query.limit)?;
        info!(count = scenes.len(), "scene search finished");
        Ok(scenes)
    }

    fn sign(&self, href: &str) -> Result<String> {
        if !self.catalog.needs_signing() {
            return Ok(href.to_string());
        }

        debug!(href, "signing asset");
        let response = self
            .client
            .get(&self.sign_url)
            .query(&[("href", href)])
            .send()?;
        let status = response.status();
        let body = response.text()?;
        if !status.is_success() {
            return Err(CatalogError::http("asset signing", status.as_u16(), &body));
        }

        parse_sign_response(&body)
    }
}

/// Extract the signed `href` from a signing response.
pub fn parse_sign_response(body: &str) -> Result<String> {
    let doc: Value = serde_json::from_str(body)
        .map_err(|e| CatalogError::malformed(format!("sign response is not JSON: {}", e), body))?;
    doc.get("href")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| CatalogError::malformed("sign response missing 'href'", body))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query() -> SceneQuery {
        SceneQuery {
            collections: vec![SENTINEL_2_L2A.to_string()],
            bbox: BoundingBox::new(-41.65, -12.80, -40.95, -12.10).unwrap(),
            start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2024, 6, 30).unwrap(),
            max_cloud_cover: 20.0,
            limit: 2,
        }
    }

    #[test]
    fn test_search_body() {
        let body = query().to_body();
        assert_eq!(body["collections"], json!(["sentinel-2-l2a"]));
        assert_eq!(body["bbox"], json!([-41.65, -12.80, -40.95, -12.10]));
        assert_eq!(body["datetime"], "2024-01-01/2024-06-30");
        assert_eq!(body["query"]["eo:cloud_cover"]["lt"], json!(20.0));
        assert_eq!(body["limit"], 2);
    }

    #[test]
    fn test_parse_search_keeps_order_and_limit() {
        let body = json!({
            "type": "FeatureCollection",
            "features": [
                {"id": "S2B_2", "collection": "sentinel-2-l2a",
                 "properties": {"eo:cloud_cover": 3.5},
                 "assets": {"B04": {"href": "https://x/B04.tif"}, "B03": {"href": "https://x/B03.tif"}}},
                {"id": "S2A_1", "assets": {}},
                {"id": "S2A_0", "assets": {}}
            ]
        })
        .to_string();

        let scenes = parse_search_response(&body, 2).unwrap();
        let ids: Vec<_> = scenes.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, ["S2B_2", "S2A_1"]);
        assert_eq!(scenes[0].asset_href("B04"), Some("https://x/B04.tif"));
        assert_eq!(scenes[0].asset_href("B02"), None);
        assert_eq!(scenes[0].collection.as_deref(), Some("sentinel-2-l2a"));
        assert_eq!(scenes[0].metadata["properties"]["eo:cloud_cover"], json!(3.5));
    }

    #[test]
    fn test_parse_search_errors_carry_body() {
        let err = parse_search_response("{\"type\":\"FeatureCollection\"}", 5).unwrap_err();
        match err {
            CatalogError::Malformed { raw, .. } => assert!(raw.contains("FeatureCollection")),
            other => panic!("unexpected error: {:?}", other),
        }

        let err = parse_search_response("{\"features\":[{\"assets\":{}}]}", 5).unwrap_err();
        assert!(matches!(err, CatalogError::Malformed { .. }));
    }

    #[test]
    fn test_parse_sign_response() {
        assert_eq!(
            parse_sign_response("{\"href\":\"https://x/B04.tif?sig=abc\",\"msft:expiry\":\"t\"}")
                .unwrap(),
            "https://x/B04.tif?sig=abc"
        );
        assert!(parse_sign_response("{}").is_err());
        assert!(parse_sign_response("<html>").is_err());
    }

    #[test]
    fn test_catalog_search_urls() {
        assert_eq!(
            StacCatalog::PlanetaryComputer.search_url(),
            "https://planetarycomputer.microsoft.com/api/stac/v1/search"
        );
        assert_eq!(
            StacCatalog::Custom("http://localhost:8080/stac/".into()).search_url(),
            "http://localhost:8080/stac/search"
        );
        assert_eq!(StacCatalog::from_str_or_url("pc"), StacCatalog::PlanetaryComputer);
        assert_eq!(StacCatalog::from_str_or_url("earth-search"), StacCatalog::EarthSearch);
        assert!(StacCatalog::PlanetaryComputer.needs_signing());
        assert!(!StacCatalog::EarthSearch.needs_signing());
    }

    #[test]
    fn test_unsigned_catalog_returns_href_unchanged() {
        let client = StacClient::new(StacCatalog::EarthSearch).unwrap();
        assert_eq!(client.sign("https://x/B04.tif").unwrap(), "https://x/B04.tif");
    }
}
