//! Serves files with range support.
//!
//! ```text
//! cargo run --example serve
//! curl -H 'Range: bytes=0-4' 'http://localhost:3000/file?path=test/fixture.txt'
//! ```

use std::path::PathBuf;

use axum::extract::Query;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Router, routing::get};
use serde::Deserialize;
use tracing::{info, warn};

use axum_seekable::{KnownSize, RangeError, RawRange, Seekable};

const DEFAULT_ADDR: &str = "0.0.0.0:3000";

#[tokio::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt::init();

    let addr = std::env::var("SEEKABLE_ADDR").unwrap_or_else(|_| DEFAULT_ADDR.to_string());

    let router = Router::new()
        .route("/", get(|| async { "Hello, World!" }))
        .route("/file", get(get_file));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "listening");
    axum::serve(listener, router).await
}

#[derive(Debug, Deserialize)]
struct FileRequest {
    path: String,
}

async fn get_file(RawRange(range): RawRange, Query(q): Query<FileRequest>) -> Response {
    let path = PathBuf::from(q.path);
    if !path.is_file() {
        return (StatusCode::NOT_FOUND, "File not found").into_response();
    }

    match KnownSize::open(&path).await {
        Ok(body) => Seekable::new(range, body).respond().await,
        Err(err) => {
            warn!(path = %path.display(), %err, "failed to open file");
            RangeError::Io(err).into_response()
        }
    }
}
