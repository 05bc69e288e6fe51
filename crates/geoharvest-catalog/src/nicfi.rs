//! Planet NICFI monthly basemap quads.
//!
//! Resolving the quads of a mosaic takes two calls: the mosaic descriptor
//! yields a quads link, and the quads link (queried with the bounding box)
//! yields pages of `{id, _links.download}` items. Later pages are reached via
//! `_links._next`.

use crate::{CatalogError, Result};
use geoharvest_common::BoundingBox;
use serde_json::Value;
use tracing::{debug, info};

/// Planet basemaps API root.
pub const PLANET_BASEMAPS_URL: &str = "https://api.planet.com/basemaps/v1";

/// Upper bound on followed `_next` links.
const MAX_QUAD_PAGES: usize = 100;

/// Placeholder some quads links carry for the bounding box.
const BBOX_TEMPLATE: &str = "{lx},{ly},{ux},{uy}";

/// Name of the NICFI monthly mosaic for a year and month.
pub fn nicfi_mosaic_name(year: i32, month: u32) -> String {
    format!("nicfi_monthly_{}_{:02}_mosaic", year, month)
}

/// One mosaic quad ready to download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MosaicQuad {
    /// Quad identifier, e.g. `748-962`. Local file is `<id>.tif`.
    pub id: String,
    /// Download URL carrying the API key.
    pub download_url: String,
}

impl MosaicQuad {
    /// Local file name of the quad.
    pub fn file_name(&self) -> String {
        format!("{}.tif", self.id)
    }
}

/// A mosaic service that can list the quads intersecting a box.
pub trait MosaicSource {
    /// Quads of mosaic `name` intersecting `bbox`.
    fn quads(&self, name: &str, bbox: &BoundingBox) -> Result<Vec<MosaicQuad>>;
}

/// One page of quads and the link to the next page, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuadPage {
    /// Items of this page, download URLs without the API key.
    pub quads: Vec<MosaicQuad>,
    /// `_links._next`, when present.
    pub next: Option<String>,
}

/// Extract `_links.quads` from a mosaic descriptor.
///
/// A descriptor without the link means the mosaic name or the key is wrong;
/// this is reported as a configuration error carrying the raw body.
pub fn parse_quads_link(body: &str) -> Result<String> {
    let doc: Value = serde_json::from_str(body).map_err(|e| {
        CatalogError::configuration(format!("mosaic descriptor is not JSON: {}", e), body)
    })?;

    doc.pointer("/_links/quads")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| CatalogError::configuration("mosaic descriptor has no _links.quads", body))
}

/// Parse one page of the quads listing.
pub fn parse_quad_page(body: &str) -> Result<QuadPage> {
    let doc: Value = serde_json::from_str(body)
        .map_err(|e| CatalogError::malformed(format!("quad page is not JSON: {}", e), body))?;

    let items = match doc.get("items") {
        Some(Value::Array(items)) => items.as_slice(),
        None | Some(Value::Null) => &[],
        Some(_) => return Err(CatalogError::malformed("quad page 'items' is not a list", body)),
    };

    let quads = items
        .iter()
        .map(|item| {
            let id = item.get("id").and_then(Value::as_str);
            let download = item.pointer("/_links/download").and_then(Value::as_str);
            match (id, download) {
                (Some(id), Some(download)) => Ok(MosaicQuad {
                    id: id.to_string(),
                    download_url: download.to_string(),
                }),
                _ => Err(CatalogError::malformed(
                    "quad item lacks 'id' or '_links.download'",
                    body,
                )),
            }
        })
        .collect::<Result<Vec<_>>>()?;

    let next = doc
        .pointer("/_links/_next")
        .and_then(Value::as_str)
        .map(str::to_string);

    Ok(QuadPage { quads, next })
}

/// Append `api_key=<key>` to a URL's query string.
pub fn with_api_key(url: &str, api_key: &str) -> String {
    let sep = if url.contains('?') { '&' } else { '?' };
    format!("{}{}api_key={}", url, sep, api_key)
}

/// Put the bounding box into a quads link.
fn quads_url(link: &str, bbox: &BoundingBox) -> String {
    if link.contains(BBOX_TEMPLATE) {
        link.replace(BBOX_TEMPLATE, &bbox.to_string())
    } else {
        let sep = if link.contains('?') { '&' } else { '?' };
        format!("{}{}bbox={}", link, sep, bbox)
    }
}

/// Blocking client for the Planet basemaps API.
pub struct PlanetBasemaps {
    api_url: String,
    api_key: String,
    client: reqwest::blocking::Client,
}

impl std::fmt::Debug for PlanetBasemaps {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlanetBasemaps")
            .field("api_url", &self.api_url)
            .finish_non_exhaustive()
    }
}

impl PlanetBasemaps {
    /// Create a client for the public API.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("geoharvest/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self::with_client(PLANET_BASEMAPS_URL, api_key, client))
    }

    /// Create a client for an arbitrary API root.
    pub fn with_client(
        api_url: impl Into<String>,
        api_key: impl Into<String>,
        client: reqwest::blocking::Client,
    ) -> Self {
        Self {
            api_url: api_url.into(),
            api_key: api_key.into(),
            client,
        }
    }

    fn get(&self, url: &str, context: &str) -> Result<String> {
        let response = self.client.get(with_api_key(url, &self.api_key)).send()?;
        let status = response.status();
        let body = response.text()?;
        if !status.is_success() {
            return Err(CatalogError::http(context, status.as_u16(), &body));
        }
        Ok(body)
    }
}

impl MosaicSource for PlanetBasemaps {
    fn quads(&self, name: &str, bbox: &BoundingBox) -> Result<Vec<MosaicQuad>> {
        let descriptor_url = format!("{}/mosaics/{}", self.api_url.trim_end_matches('/'), name);
        let descriptor = self.get(&descriptor_url, "mosaic descriptor")?;
        let link = parse_quads_link(&descriptor)?;

        let mut quads = Vec::new();
        let mut next = Some(quads_url(&link, bbox));
        let mut pages = 0;

        while let Some(url) = next.take() {
            if pages == MAX_QUAD_PAGES {
                debug!(mosaic = name, pages, "quad page limit reached");
                break;
            }
            let page = parse_quad_page(&self.get(&url, "quad listing")?)?;
            pages += 1;
            quads.extend(page.quads);
            next = page.next;
        }

        info!(mosaic = name, count = quads.len(), pages, "resolved mosaic quads");

        Ok(quads
            .into_iter()
            .map(|q| MosaicQuad {
                download_url: with_api_key(&q.download_url, &self.api_key),
                id: q.id,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mosaic_name() {
        assert_eq!(nicfi_mosaic_name(2024, 3), "nicfi_monthly_2024_03_mosaic");
        assert_eq!(nicfi_mosaic_name(2023, 11), "nicfi_monthly_2023_11_mosaic");
    }

    #[test]
    fn test_missing_quads_link_is_configuration_error() {
        let body = r#"{"mosaics": [], "message": "not found"}"#;
        match parse_quads_link(body).unwrap_err() {
            CatalogError::Configuration { raw, .. } => assert_eq!(raw, body),
            other => panic!("unexpected error: {:?}", other),
        }

        let link = parse_quads_link(
            r#"{"id": "m1", "_links": {"quads": "https://api/mosaics/m1/quads?bbox={lx},{ly},{ux},{uy}"}}"#,
        )
        .unwrap();
        assert!(link.ends_with("quads?bbox={lx},{ly},{ux},{uy}"));
    }

    #[test]
    fn test_parse_quad_page() {
        let page = parse_quad_page(
            r#"{
                "items": [
                    {"id": "748-962", "_links": {"download": "https://dl/748-962/full"}},
                    {"id": "749-962", "_links": {"download": "https://dl/749-962/full"}}
                ],
                "_links": {"_next": "https://api/quads?page=2"}
            }"#,
        )
        .unwrap();

        assert_eq!(page.quads.len(), 2);
        assert_eq!(page.quads[0].id, "748-962");
        assert_eq!(page.quads[0].file_name(), "748-962.tif");
        assert_eq!(page.next.as_deref(), Some("https://api/quads?page=2"));

        let empty = parse_quad_page(r#"{"_links": {}}"#).unwrap();
        assert!(empty.quads.is_empty());
        assert!(empty.next.is_none());
    }

    #[test]
    fn test_malformed_quad_item() {
        let body = r#"{"items": [{"id": "748-962", "_links": {}}]}"#;
        match parse_quad_page(body).unwrap_err() {
            CatalogError::Malformed { raw, .. } => assert!(raw.contains("748-962")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_url_helpers() {
        assert_eq!(with_api_key("https://dl/q/full", "k"), "https://dl/q/full?api_key=k");
        assert_eq!(with_api_key("https://dl/q?x=1", "k"), "https://dl/q?x=1&api_key=k");

        let bbox = BoundingBox::new(-41.65, -12.8, -40.95, -12.1).unwrap();
        assert_eq!(
            quads_url("https://api/m/quads?bbox={lx},{ly},{ux},{uy}", &bbox),
            "https://api/m/quads?bbox=-41.65,-12.8,-40.95,-12.1"
        );
        assert_eq!(
            quads_url("https://api/m/quads", &bbox),
            "https://api/m/quads?bbox=-41.65,-12.8,-40.95,-12.1"
        );
    }
}
