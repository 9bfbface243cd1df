//! Synchronous client for the control plane's `/projects` query.
//!
//! The gateway is a one-shot process, so each query spins up a
//! current-thread tokio runtime, performs exactly one HTTP/1.1 exchange over
//! the Unix socket, and tears everything down again. The whole exchange
//! (connect, request, body) is bounded by a single timeout. There is no
//! retry: any failure is reported and the caller denies.

use std::path::{Path, PathBuf};
use std::time::Duration;

use bytes::Bytes;
use http_body_util::{BodyExt, Empty, LengthLimitError, Limited};
use hyper::client::conn::http1;
use hyper::header::HOST;
use hyper::{Method, Request};
use hyper_util::rt::TokioIo;
use tokio::net::UnixStream;
use tracing::{debug, trace};

use super::error::FetchError;
use super::protocol::{PROJECTS_PATH, ProjectMap};
use crate::config::Settings;

/// Client for one control-plane socket.
#[derive(Debug, Clone)]
pub struct ControlPlaneClient {
    socket_path: PathBuf,
    timeout: Duration,
    max_response_bytes: usize,
}

impl ControlPlaneClient {
    /// Client with explicit bounds.
    pub fn new(socket_path: impl Into<PathBuf>, timeout: Duration, max_response_bytes: usize) -> Self {
        Self {
            socket_path: socket_path.into(),
            timeout,
            max_response_bytes,
        }
    }

    /// Client configured from the resolved settings.
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.socket_path.clone(),
            settings.policy_timeout,
            settings.max_response_bytes,
        )
    }

    /// Socket this client talks to.
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Query the current project map.
    pub fn fetch_projects(&self) -> Result<ProjectMap, FetchError> {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(FetchError::Runtime)?;

        let body = rt.block_on(async {
            tokio::time::timeout(self.timeout, self.exchange())
                .await
                .map_err(|_| FetchError::Timeout(self.timeout))?
        })?;

        let projects = ProjectMap::from_json(&body)?;
        debug!(
            "Control plane at {:?} returned {} project(s)",
            self.socket_path,
            projects.len()
        );
        Ok(projects)
    }

    async fn exchange(&self) -> Result<Bytes, FetchError> {
        let stream = UnixStream::connect(&self.socket_path)
            .await
            .map_err(|source| FetchError::Connect {
                socket: self.socket_path.clone(),
                source,
            })?;

        let (mut sender, connection) =
            http1::handshake::<_, Empty<Bytes>>(TokioIo::new(stream)).await?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                trace!("Control-plane connection closed with error: {}", e);
            }
        });

        let request = Request::builder()
            .method(Method::GET)
            .uri(PROJECTS_PATH)
            .header(HOST, "localhost")
            .body(Empty::<Bytes>::new())?;

        let response = sender.send_request(request).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let collected = Limited::new(response.into_body(), self.max_response_bytes)
            .collect()
            .await
            .map_err(|e| {
                if e.downcast_ref::<LengthLimitError>().is_some() {
                    FetchError::TooLarge {
                        limit: self.max_response_bytes,
                    }
                } else {
                    FetchError::Body(e.to_string())
                }
            })?;

        Ok(collected.to_bytes())
    }
}
