//! Public URLs plus thumbnail and preview URLs for file entries.
//!
//! Images are not rendered here: the resolver only builds query strings for
//! the external thumbnail endpoint. Probing reads the image header through
//! the public URL; any probe failure falls back to configured dimensions.

use crate::config::{Dimensions, SourceConfig};
use async_trait::async_trait;
use std::{sync::Arc, time::Duration};
use tracing::debug;

/// Largest display size handed to the renderer.
pub const MAX_DISPLAY: Dimensions = Dimensions::new(800, 600);

/// Bytes fetched when probing; enough for the header of common formats.
const PROBE_RANGE: &str = "bytes=0-65535";

/// Reads the pixel dimensions of a remote image.
#[async_trait]
pub trait ImageProbe: Send + Sync {
    async fn dimensions(&self, url: &str) -> Option<Dimensions>;
}

/// Never probes; configured defaults always apply.
pub struct NoProbe;

#[async_trait]
impl ImageProbe for NoProbe {
    async fn dimensions(&self, _url: &str) -> Option<Dimensions> {
        None
    }
}

/// Fetches the head of the image over HTTP and parses its header.
pub struct HttpImageProbe {
    client: reqwest::Client,
}

impl HttpImageProbe {
    pub fn new(timeout: Duration) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ImageProbe for HttpImageProbe {
    async fn dimensions(&self, url: &str) -> Option<Dimensions> {
        let response = match self
            .client
            .get(url)
            .header(reqwest::header::RANGE, PROBE_RANGE)
            .send()
            .await
            .and_then(|r| r.error_for_status())
        {
            Ok(response) => response,
            Err(err) => {
                debug!(url, "image probe request failed: {}", err);
                return None;
            }
        };
        let bytes = response.bytes().await.ok()?;
        match imagesize::blob_size(&bytes) {
            Ok(size) => Some(Dimensions::new(
                u32::try_from(size.width).ok()?,
                u32::try_from(size.height).ok()?,
            )),
            Err(err) => {
                debug!(url, "image probe could not read header: {}", err);
                None
            }
        }
    }
}

/// URLs and dimensions computed for one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thumbnail {
    pub thumbnail_url: String,
    /// Full preview; `None` for non-images.
    pub preview_url: Option<String>,
    pub thumb_size: Dimensions,
}

#[derive(Clone)]
pub struct ThumbnailResolver {
    config: Arc<SourceConfig>,
    probe: Arc<dyn ImageProbe>,
}

impl ThumbnailResolver {
    pub fn new(config: Arc<SourceConfig>, probe: Arc<dyn ImageProbe>) -> Self {
        Self { config, probe }
    }

    /// `base_url` joined to the bucket-relative key with exactly one `/`.
    pub fn public_url(&self, key: &str) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            key.trim_matches('/')
        )
    }

    /// Prefix `src` with the public base URL unless it already carries it.
    pub fn prepare_src_for_thumb(&self, src: &str) -> String {
        if src.contains(self.config.base_url.as_str()) {
            src.to_string()
        } else {
            format!("{}{}", self.config.base_url, src.trim_start_matches('/'))
        }
    }

    pub fn is_image(&self, extension: &str) -> bool {
        self.config
            .image_extensions
            .iter()
            .any(|ext| ext.eq_ignore_ascii_case(extension))
    }

    /// Display size: probed dimensions capped per axis at [`MAX_DISPLAY`], or
    /// the configured default when nothing could be probed.
    pub fn display_size(&self, probed: Option<Dimensions>) -> Dimensions {
        match probed {
            Some(size) => Dimensions::new(
                size.width.min(MAX_DISPLAY.width),
                size.height.min(MAX_DISPLAY.height),
            ),
            None => self.config.image_size,
        }
    }

    /// Thumbnail size: configured thumbnail size, capped at the display size.
    pub fn thumb_size(&self, display: Dimensions) -> Dimensions {
        Dimensions::new(
            self.config.thumb_size.width.min(display.width),
            self.config.thumb_size.height.min(display.height),
        )
    }

    /// Resolve thumbnail and preview URLs for `key`.
    pub async fn resolve(&self, key: &str, extension: &str, auth_token: &str) -> Thumbnail {
        if !self.is_image(extension) {
            return Thumbnail {
                thumbnail_url: self.placeholder_url(),
                preview_url: None,
                thumb_size: self.config.thumb_size,
            };
        }

        let probed = if self.config.probe_images {
            self.probe.dimensions(&self.public_url(key)).await
        } else {
            None
        };
        let display = self.display_size(probed);
        let thumb = self.thumb_size(display);

        let format = self.config.thumbnail_type.as_str();
        let quality = self.config.thumbnail_quality.to_string();
        let source = self.config.source_id.to_string();
        let (tw, th) = (thumb.width.to_string(), thumb.height.to_string());
        let (iw, ih) = (display.width.to_string(), display.height.to_string());

        let thumb_query = [
            ("src", key),
            ("w", tw.as_str()),
            ("h", th.as_str()),
            ("f", format),
            ("q", quality.as_str()),
            ("HTTP_MODAUTH", auth_token),
            ("wctx", self.config.context_key.as_str()),
            ("source", source.as_str()),
        ];
        let image_query = [
            ("src", key),
            ("w", iw.as_str()),
            ("h", ih.as_str()),
            ("HTTP_MODAUTH", auth_token),
            ("f", format),
            ("q", quality.as_str()),
            ("wctx", self.config.context_key.as_str()),
            ("source", source.as_str()),
        ];

        Thumbnail {
            thumbnail_url: self.renderer_url(&thumb_query),
            preview_url: Some(self.renderer_url(&image_query)),
            thumb_size: thumb,
        }
    }

    fn renderer_url(&self, params: &[(&str, &str)]) -> String {
        let query = params
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");
        format!("{}?{}", self.config.thumbnail_endpoint, query)
    }

    fn placeholder_url(&self) -> String {
        format!(
            "{}templates/default/images/restyle/nopreview.jpg",
            self.config.manager_url
        )
    }
}
