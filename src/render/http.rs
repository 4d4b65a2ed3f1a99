//! HTTP-backed render gateway.
//!
//! Talks to a renderer process that exposes
//! `GET {endpoint}/render/{zoom}/{x}/{y}` and answers with:
//!
//! - `200 OK` and a PNG body when the tile was rendered (the body is checked
//!   by the tile service before it is cached)
//! - `204 No Content` or `404 Not Found` when there is no data for the tile
//! - any other status on failure
//!
//! The data-store parameters from [`RendererConfig`] are forwarded as query
//! parameters (`host`, `keyspace`, `table`, `base_zoom`) and are not
//! interpreted here.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::debug;
use url::Url;

use crate::config::RendererConfig;
use crate::error::RenderError;
use crate::tile::TileCoord;

use super::{RenderGateway, RenderOutput};

/// Upstream error bodies are cut to this many characters before logging.
const MAX_ERROR_BODY: usize = 256;

/// Render gateway that delegates to a remote renderer over HTTP.
#[derive(Debug, Clone)]
pub struct HttpRenderGateway {
    client: Client,
    config: RendererConfig,
}

impl HttpRenderGateway {
    /// Create a gateway for the configured renderer.
    ///
    /// Every request is bounded by `config.timeout`.
    pub fn new(config: RendererConfig) -> Result<Self, RenderError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| RenderError::Failed(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// Build the render URL for a tile.
    pub fn render_url(&self, coord: TileCoord) -> Result<Url, RenderError> {
        let mut url = self.config.endpoint.clone();

        url.path_segments_mut()
            .map_err(|_| {
                RenderError::Failed(format!(
                    "renderer URL cannot have a path: {}",
                    self.config.endpoint
                ))
            })?
            .pop_if_empty()
            .extend([
                "render".to_string(),
                coord.zoom.to_string(),
                coord.x.to_string(),
                coord.y.to_string(),
            ]);

        url.query_pairs_mut()
            .append_pair("host", &self.config.data_host)
            .append_pair("keyspace", &self.config.keyspace)
            .append_pair("table", &self.config.table)
            .append_pair("base_zoom", &self.config.base_zoom.to_string());

        Ok(url)
    }

    /// Check that the renderer endpoint answers HTTP at all.
    ///
    /// Any response, whatever its status, counts as reachable.
    pub async fn ping(&self) -> Result<StatusCode, RenderError> {
        let response = self
            .client
            .get(self.config.endpoint.clone())
            .send()
            .await
            .map_err(|e| self.map_error(e))?;
        Ok(response.status())
    }

    fn map_error(&self, err: reqwest::Error) -> RenderError {
        if err.is_timeout() {
            RenderError::Timeout(self.config.timeout)
        } else if err.is_connect() {
            RenderError::Connection(err.to_string())
        } else {
            RenderError::Failed(err.to_string())
        }
    }
}

#[async_trait]
impl RenderGateway for HttpRenderGateway {
    async fn render(&self, coord: TileCoord) -> Result<RenderOutput, RenderError> {
        let url = self.render_url(coord)?;
        debug!(%coord, "Requesting tile from renderer");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| self.map_error(e))?;

        match response.status() {
            StatusCode::OK => {
                let body = response.bytes().await.map_err(|e| self.map_error(e))?;
                Ok(RenderOutput::Tile(body))
            }
            StatusCode::NO_CONTENT | StatusCode::NOT_FOUND => Ok(RenderOutput::NoData),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(RenderError::Upstream {
                    status: status.as_u16(),
                    message: body.chars().take(MAX_ERROR_BODY).collect(),
                })
            }
        }
    }
}
