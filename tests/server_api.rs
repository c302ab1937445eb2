use anyhow::Result;
use audit_sampler::config::Config;
use audit_sampler::constants::XLSX_MIME;
use audit_sampler::pipeline::Pipeline;
use audit_sampler::server::{create_server, SEED_HEADER};
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

const UPLOAD: &str = "\
User Profile,Changed Using,Module,External Code
alice,Manual,BEER,A1
alice,Manual,WINE,A2
alice,Manual,WINE,A3
alice,Surgery,WINE,A4
bob,Manual,WINE,B1
bob,Manual,CIDER,B2
bob,Manual,WINE,B3
OGRDS SYSTEM,Manual,BEER,S1
";

fn app() -> Router {
    create_server(Pipeline::from_config(&Config::default()).unwrap())
}

async fn post(app: Router, uri: &str, body: &str) -> Result<(StatusCode, axum::http::HeaderMap, Vec<u8>)> {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::from(body.to_string()))?;
    let response = app.oneshot(request).await?;
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = hyper::body::to_bytes(response.into_body()).await?;
    Ok((status, headers, bytes.to_vec()))
}

#[tokio::test]
async fn test_health() -> Result<()> {
    let request = Request::builder().uri("/health").body(Body::empty())?;
    let response = app().oneshot(request).await?;

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = serde_json::from_slice(&hyper::body::to_bytes(response.into_body()).await?)?;
    assert_eq!(body["status"], "healthy");
    Ok(())
}

#[tokio::test]
async fn test_index_serves_upload_page() -> Result<()> {
    let request = Request::builder().uri("/").body(Body::empty())?;
    let response = app().oneshot(request).await?;

    assert_eq!(response.status(), StatusCode::OK);
    let html = hyper::body::to_bytes(response.into_body()).await?;
    assert!(String::from_utf8_lossy(&html).contains("Download Summary File"));
    Ok(())
}

#[tokio::test]
async fn test_process_returns_run_report() -> Result<()> {
    let (status, _, body) = post(app(), "/api/process?format=csv&seed=5", UPLOAD).await?;

    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body)?;
    assert_eq!(json["seed"], 5);
    assert_eq!(json["filter"]["input_rows"], 8);
    assert_eq!(json["filter"]["retained_rows"], 6);
    // alice: 3 rows -> 1, bob: 3 rows -> 1
    assert_eq!(json["sampled_rows"], 2);
    assert!(json["category_summary"].is_object());
    assert!(json["user_profile_summary"].is_object());
    Ok(())
}

#[tokio::test]
async fn test_same_seed_same_sample() -> Result<()> {
    let (_, _, first) = post(app(), "/api/process?format=csv&seed=77", UPLOAD).await?;
    let (_, _, second) = post(app(), "/api/process?format=csv&seed=77", UPLOAD).await?;

    let first: Value = serde_json::from_slice(&first)?;
    let second: Value = serde_json::from_slice(&second)?;
    assert_eq!(first["final_sample"], second["final_sample"]);
    Ok(())
}

#[tokio::test]
async fn test_missing_column_is_bad_request() -> Result<()> {
    let upload = "User Profile,Module,External Code\nalice,BEER,A1\n";
    let (status, _, body) = post(app(), "/api/process?format=csv", upload).await?;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let json: Value = serde_json::from_slice(&body)?;
    assert!(json["error"].as_str().unwrap().contains("Changed Using"));
    Ok(())
}

#[tokio::test]
async fn test_unknown_format_is_json_bad_request() -> Result<()> {
    let (status, _, body) = post(app(), "/api/process?format=xls", UPLOAD).await?;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let json: Value = serde_json::from_slice(&body)?;
    assert!(json["error"].as_str().unwrap().contains("xls"));
    Ok(())
}

#[tokio::test]
async fn test_empty_upload_is_bad_request() -> Result<()> {
    let (status, _, _) = post(app(), "/api/process?format=csv", "").await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn test_export_returns_workbook_attachment() -> Result<()> {
    let (status, headers, body) = post(app(), "/api/export?format=csv&seed=12", UPLOAD).await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], XLSX_MIME);
    let disposition = headers[header::CONTENT_DISPOSITION].to_str()?;
    assert!(disposition.starts_with("attachment"));
    assert!(disposition.contains("final_sample_with_summary.xlsx"));
    assert_eq!(headers[SEED_HEADER], "12");
    // xlsx files are zip archives
    assert_eq!(&body[..2], b"PK");
    Ok(())
}
