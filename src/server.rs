use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Query, State},
    http::{header, HeaderName, Method, StatusCode},
    response::{Html, IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use hyper::Server;
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

use crate::constants::{DEFAULT_OUTPUT_FILE, XLSX_MIME};
use crate::error::SamplerError;
use crate::metrics;
use crate::pipeline::export::XlsxExporter;
use crate::pipeline::ingestion::InputFormat;
use crate::pipeline::{Pipeline, PipelineResult};

/// Response header carrying the seed a download was sampled with
pub const SEED_HEADER: &str = "x-sampler-seed";

const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<Pipeline>,
}

/// Query string shared by the process and export endpoints
#[derive(Debug, Default, Deserialize)]
pub struct RunParams {
    /// `xlsx` (default) or `csv`; parsed by hand so a bad value gets a JSON error body
    pub format: Option<String>,
    pub seed: Option<u64>,
}

impl RunParams {
    pub fn input_format(&self) -> Result<InputFormat, SamplerError> {
        match self.format.as_deref() {
            Some(format) => format.parse(),
            None => Ok(InputFormat::default()),
        }
    }
}

/// Error body `{ "error": message }` with a status derived from the failure kind
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl From<SamplerError> for ApiError {
    fn from(e: SamplerError) -> Self {
        let status = if e.is_input_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        Self {
            status,
            message: e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!("Request failed: {}", self.message);
        } else {
            warn!("Rejected upload: {}", self.message);
        }
        (
            self.status,
            Json(serde_json::json!({ "error": self.message })),
        )
            .into_response()
    }
}

/// Run the synchronous pipeline off the async executor
async fn run_pipeline(state: &AppState, params: RunParams, body: Bytes) -> Result<PipelineResult, ApiError> {
    let format = params.input_format()?;
    let pipeline = state.pipeline.clone();
    tokio::task::spawn_blocking(move || pipeline.run_bytes(&body, format, params.seed))
        .await
        .map_err(|e| ApiError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: format!("pipeline task failed: {e}"),
        })?
        .map_err(ApiError::from)
}

/// Health check endpoint
async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "audit-sampler",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn metrics_text() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics::render().unwrap_or_default(),
    )
}

/// Upload bytes, get the filtered table, both summaries and the run report back
async fn process(
    State(state): State<AppState>,
    Query(params): Query<RunParams>,
    body: Bytes,
) -> Result<Json<PipelineResult>, ApiError> {
    let result = run_pipeline(&state, params, body).await?;
    info!(run_id = %result.run_id, "processed upload");
    Ok(Json(result))
}

/// Upload bytes, get the three-sheet workbook back as an attachment
async fn export(
    State(state): State<AppState>,
    Query(params): Query<RunParams>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let result = run_pipeline(&state, params, body).await?;
    let bytes = XlsxExporter::render(&result.report())?;
    let seed = result.seed.map(|s| s.to_string()).unwrap_or_default();
    info!(run_id = %result.run_id, bytes = bytes.len(), "exported workbook");

    Ok((
        [
            (header::CONTENT_TYPE, XLSX_MIME.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{DEFAULT_OUTPUT_FILE}\""),
            ),
            (HeaderName::from_static(SEED_HEADER), seed),
        ],
        bytes,
    )
        .into_response())
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// Create the HTTP server with all routes
pub fn create_server(pipeline: Pipeline) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    let state = AppState {
        pipeline: Arc::new(pipeline),
    };

    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/metrics", get(metrics_text))
        .route("/api/process", post(process))
        .route("/api/export", post(export))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(ServiceBuilder::new().layer(cors))
        .with_state(state)
}

/// Start the HTTP server on the specified port
pub async fn start_server(pipeline: Pipeline, port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let app = create_server(pipeline);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    println!("🚀 HTTP server running on http://localhost:{port}");
    println!("💚 Health check: http://localhost:{port}/health");
    println!("📤 Upload page:  http://localhost:{port}/");

    Server::bind(&addr).serve(app.into_make_service()).await?;

    Ok(())
}

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="utf-8" />
    <title>Audit Sampler</title>
    <style>
      body { font-family: sans-serif; margin: 2rem; }
      table { border-collapse: collapse; margin-bottom: 1.5rem; }
      td, th { border: 1px solid #ccc; padding: 2px 6px; font-size: 0.9rem; }
      .error { color: #b00020; }
    </style>
  </head>
  <body>
    <h1>File Processor with Final Summary</h1>
    <p>Upload an Excel or CSV file and generate a processed summary.</p>
    <input id="file" type="file" accept=".xlsx,.csv" />
    <button id="download" disabled>Download Summary File</button>
    <p id="status"></p>
    <div id="out"></div>
    <script>
      let upload = null;
      const fmt = (name) => name.toLowerCase().endsWith('.csv') ? 'csv' : 'xlsx';
      const esc = (v) => String(v ?? '').replace(/[&<>]/g, (c) => ({'&':'&amp;','<':'&lt;','>':'&gt;'}[c]));
      function table(title, headers, rows) {
        const head = '<tr>' + headers.map((h) => '<th>' + esc(h) + '</th>').join('') + '</tr>';
        const body = rows.map((r) => '<tr>' + r.map((c) => '<td>' + esc(c) + '</td>').join('') + '</tr>').join('');
        return '<h2>' + esc(title) + '</h2><table>' + head + body + '</table>';
      }
      function summary(title, s) {
        return table(title, [s.key_header, 'Sample Count', 'Total Volume', 'Percentage'],
          s.rows.map((r) => [r.key, r.sample_count, r.total_count, r.ratio]));
      }
      document.getElementById('file').addEventListener('change', async (ev) => {
        const file = ev.target.files[0];
        if (!file) return;
        const bytes = await file.arrayBuffer();
        const status = document.getElementById('status');
        status.className = '';
        status.textContent = 'Processing...';
        const res = await fetch('/api/process?format=' + fmt(file.name), { method: 'POST', body: bytes });
        const data = await res.json();
        if (!res.ok) {
          status.className = 'error';
          status.textContent = data.error;
          return;
        }
        upload = { bytes, format: fmt(file.name), seed: data.seed };
        status.textContent = 'Seed ' + data.seed + ': ' + data.final_sample.rows.length + ' rows sampled';
        document.getElementById('out').innerHTML =
          table('Filtered Data', data.filtered.headers, data.filtered.rows) +
          summary('Category Summary', data.category_summary) +
          summary('User Profile Summary', data.user_profile_summary);
        document.getElementById('download').disabled = false;
      });
      document.getElementById('download').addEventListener('click', async () => {
        if (!upload) return;
        const url = '/api/export?format=' + upload.format + '&seed=' + upload.seed;
        const res = await fetch(url, { method: 'POST', body: upload.bytes });
        const blob = await res.blob();
        const a = document.createElement('a');
        a.href = URL.createObjectURL(blob);
        a.download = 'final_sample_with_summary.xlsx';
        a.click();
      });
    </script>
  </body>
</html>"#;
