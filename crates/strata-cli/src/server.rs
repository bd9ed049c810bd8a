//! Static file server for `--serve`.
//!
//! Serves the build output directory from disk, so every request sees the
//! latest written bundle.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use axum::{routing::get, Json, Router};
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::services::ServeDir;

use crate::error::{CliError, Result};
use crate::ui;

/// Bound, not yet serving.
#[derive(Debug)]
pub struct StaticServer {
    listener: TcpListener,
    dir: PathBuf,
}

impl StaticServer {
    /// Bind `127.0.0.1:port`. Port 0 picks a free port.
    pub async fn bind(dir: PathBuf, port: u16) -> Result<Self> {
        let addr: SocketAddr = ([127, 0, 0, 1], port).into();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| CliError::Server(format!("Failed to bind to {addr}: {e}")))?;
        Ok(Self { listener, dir })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Serve until the task is dropped.
    pub async fn run(self) -> Result<()> {
        let addr = self.local_addr()?;
        let app = router(&self.dir);

        ui::success(&format!(
            "Serving {} at http://{}",
            self.dir.display(),
            addr
        ));

        axum::serve(self.listener, app)
            .await
            .map_err(|e| CliError::Server(format!("Server error: {e}")))
    }
}

fn router(dir: &Path) -> Router {
    Router::new()
        .route("/__strata/health", get(health))
        .fallback_service(ServeDir::new(dir).append_index_html_on_directories(true))
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}
