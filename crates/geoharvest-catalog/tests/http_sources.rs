//! Catalog clients against a loopback HTTP server.

use geoharvest_catalog::{
    CatalogError, MosaicSource, PlanetBasemaps, SceneCatalog, SceneQuery, StacCatalog, StacClient,
};
use geoharvest_common::BoundingBox;
use serde_json::json;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::thread;

/// A request as seen by the test server.
#[derive(Debug, Clone)]
struct Seen {
    method: String,
    target: String,
    body: String,
}

type Router = dyn Fn(&Seen) -> (u16, String) + Send + Sync;

/// Serve requests through `router`, recording each one.
fn spawn_server(router: Box<Router>) -> (String, Arc<Mutex<Vec<Seen>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind loopback");
    let addr = listener.local_addr().expect("local addr");
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&seen);

    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else { continue };
            let mut reader = BufReader::new(stream.try_clone().expect("clone stream"));

            let mut request_line = String::new();
            reader.read_line(&mut request_line).unwrap_or(0);
            let mut parts = request_line.split_whitespace();
            let method = parts.next().unwrap_or_default().to_string();
            let target = parts.next().unwrap_or_default().to_string();

            let mut content_length = 0usize;
            let mut line = String::new();
            loop {
                line.clear();
                if reader.read_line(&mut line).unwrap_or(0) == 0 || line == "\r\n" {
                    break;
                }
                if let Some((name, value)) = line.split_once(':') {
                    if name.eq_ignore_ascii_case("content-length") {
                        content_length = value.trim().parse().unwrap_or(0);
                    }
                }
            }
            let mut body = vec![0u8; content_length];
            let _ = reader.read_exact(&mut body);

            let request = Seen {
                method,
                target,
                body: String::from_utf8_lossy(&body).into_owned(),
            };
            let (status, response) = router(&request);
            log.lock().unwrap().push(request);

            let head = format!(
                "HTTP/1.1 {} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                status,
                response.len()
            );
            let _ = stream.write_all(head.as_bytes());
            let _ = stream.write_all(response.as_bytes());
            let _ = stream.flush();
        }
    });

    (format!("http://{}", addr), seen)
}

fn loopback_client() -> reqwest::blocking::Client {
    reqwest::blocking::Client::builder()
        .no_proxy()
        .build()
        .expect("build client")
}

fn bbox() -> BoundingBox {
    BoundingBox::new(-41.65, -12.8, -40.95, -12.1).unwrap()
}

#[test]
fn test_quads_follow_pages_and_carry_key() {
    let base = Arc::new(Mutex::new(String::new()));
    let base_for_router = Arc::clone(&base);
    let (url, seen) = spawn_server(Box::new(move |req| {
        let base = base_for_router.lock().unwrap().clone();
        let path = req.target.split('?').next().unwrap_or_default();
        match path {
            "/mosaics/nicfi_monthly_2024_03_mosaic" => (
                200,
                json!({"_links": {"quads": format!("{}/mosaics/m1/quads?bbox={{lx}},{{ly}},{{ux}},{{uy}}", base)}})
                    .to_string(),
            ),
            "/mosaics/m1/quads" => (
                200,
                json!({
                    "items": [{"id": "748-962", "_links": {"download": format!("{}/dl/748-962", base)}}],
                    "_links": {"_next": format!("{}/mosaics/m1/quads2", base)}
                })
                .to_string(),
            ),
            "/mosaics/m1/quads2" => (
                200,
                json!({"items": [{"id": "749-962", "_links": {"download": format!("{}/dl/749-962", base)}}]})
                    .to_string(),
            ),
            _ => (404, "{}".to_string()),
        }
    }));
    *base.lock().unwrap() = url.clone();

    let source = PlanetBasemaps::with_client(url.clone(), "secret", loopback_client());
    let quads = source.quads("nicfi_monthly_2024_03_mosaic", &bbox()).unwrap();

    let ids: Vec<_> = quads.iter().map(|q| q.id.as_str()).collect();
    assert_eq!(ids, ["748-962", "749-962"]);
    assert_eq!(quads[0].download_url, format!("{}/dl/748-962?api_key=secret", url));

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 3);
    assert!(seen.iter().all(|r| r.target.contains("api_key=secret")));
    assert!(seen[1].target.contains("bbox=-41.65,-12.8,-40.95,-12.1"));
}

#[test]
fn test_unusable_descriptor_is_configuration_error() {
    let (url, seen) = spawn_server(Box::new(|_| (200, r#"{"name": "oops"}"#.to_string())));

    let source = PlanetBasemaps::with_client(url, "secret", loopback_client());
    let err = source.quads("nicfi_monthly_2024_03_mosaic", &bbox()).unwrap_err();

    match err {
        CatalogError::Configuration { raw, .. } => assert!(raw.contains("oops")),
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(seen.lock().unwrap().len(), 1, "no quad listing after a bad descriptor");
}

#[test]
fn test_unreachable_api_keeps_key_out_of_error() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let source = PlanetBasemaps::with_client(
        format!("http://127.0.0.1:{}", port),
        "SECRETKEY123",
        loopback_client(),
    );
    let err = source.quads("nicfi_monthly_2024_03_mosaic", &bbox()).unwrap_err();

    assert!(matches!(err, CatalogError::Request(_)), "got {:?}", err);
    assert!(!err.to_string().contains("SECRETKEY123"), "{}", err);
    assert!(!format!("{:?}", err).contains("SECRETKEY123"), "{:?}", err);
}

#[test]
fn test_stac_search_posts_query() {
    let (url, seen) = spawn_server(Box::new(|_| {
        (
            200,
            json!({"features": [
                {"id": "S2B_MSIL2A_1", "assets": {"B04": {"href": "https://blob/B04.tif"}}},
                {"id": "S2A_MSIL2A_2", "assets": {"B04": {"href": "https://blob/B04b.tif"}}}
            ]})
            .to_string(),
        )
    }));

    let client = StacClient::with_client(StacCatalog::Custom(url), loopback_client());
    let query = SceneQuery {
        collections: vec!["sentinel-2-l2a".into()],
        bbox: bbox(),
        start: chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        end: chrono::NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
        max_cloud_cover: 20.0,
        limit: 20,
    };
    let scenes = client.search(&query).unwrap();

    assert_eq!(scenes.len(), 2);
    assert_eq!(scenes[0].id, "S2B_MSIL2A_1");

    let seen = seen.lock().unwrap();
    assert_eq!(seen[0].method, "POST");
    assert_eq!(seen[0].target, "/search");
    let body: serde_json::Value = serde_json::from_str(&seen[0].body).unwrap();
    assert_eq!(body["datetime"], "2024-01-01/2024-02-01");
    assert_eq!(body["query"]["eo:cloud_cover"]["lt"], json!(20.0));
}

#[test]
fn test_stac_search_http_error_keeps_body() {
    let (url, _) = spawn_server(Box::new(|_| (400, r#"{"detail": "bad bbox"}"#.to_string())));

    let client = StacClient::with_client(StacCatalog::Custom(url), loopback_client());
    let query = SceneQuery {
        collections: vec!["sentinel-2-l2a".into()],
        bbox: bbox(),
        start: chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        end: chrono::NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
        max_cloud_cover: 20.0,
        limit: 20,
    };

    match client.search(&query).unwrap_err() {
        CatalogError::Http { status, raw, .. } => {
            assert_eq!(status, 400);
            assert!(raw.contains("bad bbox"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn test_planetary_computer_signing() {
    let (url, seen) = spawn_server(Box::new(|_| {
        (200, r#"{"href": "https://blob/B04.tif?sv=2024&sig=x"}"#.to_string())
    }));

    let client = StacClient::with_client(StacCatalog::PlanetaryComputer, loopback_client())
        .with_sign_url(format!("{}/api/sas/v1/sign", url));
    let signed = client.sign("https://blob/B04.tif").unwrap();

    assert_eq!(signed, "https://blob/B04.tif?sv=2024&sig=x");
    let seen = seen.lock().unwrap();
    assert!(seen[0].target.starts_with("/api/sas/v1/sign?href=https"));
}
