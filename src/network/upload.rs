//! File Upload
//!
//! Multipart upload with progress callbacks. Runs outside the retry loop:
//! one attempt, cancellable by request id, no timeout.

use futures::StreamExt;
use reqwest::multipart::{Form, Part};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{AppError, NetworkFailure, Result};
use crate::network::manager::read_response;
use crate::network::registry::CancelGuard;
use crate::network::{ApiResponse, NetworkManager, RequestConfig, RequestOverrides, UploadFile, UploadProgress};

/// Bytes handed to the transport between progress callbacks.
pub const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;

impl NetworkManager {
    // == Upload File ==
    /// Posts `file` as multipart form data to `path`.
    ///
    /// `on_progress` fires as each chunk is handed to the transport. A 2xx
    /// response resolves with its parsed JSON body; invalid JSON, non-2xx,
    /// transport failure and cancellation each fail with their own
    /// `NetworkFailure` after being reported.
    pub async fn upload_file<F>(
        &self,
        path: &str,
        file: UploadFile,
        on_progress: F,
        overrides: Option<RequestOverrides>,
    ) -> Result<ApiResponse>
    where
        F: Fn(UploadProgress) + Send + Sync + 'static,
    {
        let overrides = overrides.unwrap_or_default();
        let url = self.resolve_url(path);
        let config = self.default_config().merged(&overrides);
        let request_id = overrides
            .request_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let mut cancel = self.in_flight.register(&request_id);

        info!(
            url = %url,
            file_name = %file.file_name,
            bytes = file.bytes.len(),
            request_id = %request_id,
            "starting upload"
        );

        match self
            .send_upload(&url, file, on_progress, &config, &mut cancel)
            .await
        {
            Ok(response) => Ok(response),
            Err(failure) => {
                self.errors.handle_network_error(&url, &failure).await;
                Err(AppError::NetworkRequestFailed { url, failure })
            }
        }
    }

    async fn send_upload<F>(
        &self,
        url: &str,
        file: UploadFile,
        on_progress: F,
        config: &RequestConfig,
        cancel: &mut CancelGuard,
    ) -> std::result::Result<ApiResponse, NetworkFailure>
    where
        F: Fn(UploadProgress) + Send + Sync + 'static,
    {
        let total = file.bytes.len() as u64;
        let chunks: Vec<Vec<u8>> = file
            .bytes
            .chunks(UPLOAD_CHUNK_SIZE)
            .map(<[u8]>::to_vec)
            .collect();

        let mut loaded = 0u64;
        let body = futures::stream::iter(chunks).map(move |chunk| {
            loaded += chunk.len() as u64;
            on_progress(UploadProgress { loaded, total });
            Ok::<_, std::io::Error>(chunk)
        });

        let part = Part::stream_with_length(reqwest::Body::wrap_stream(body), total)
            .file_name(file.file_name)
            .mime_str(&file.content_type)
            .map_err(|err| NetworkFailure::Transport(err.to_string()))?;
        let form = Form::new().part(file.field_name, part);

        let mut request = self.client.post(url);
        for (name, value) in &config.headers {
            // The multipart boundary header is set by the form.
            if name.eq_ignore_ascii_case("content-type") {
                continue;
            }
            request = request.header(name.as_str(), value.as_str());
        }
        let request = request.multipart(form);

        let exchange = async {
            let response = request
                .send()
                .await
                .map_err(|err| NetworkFailure::Transport(err.to_string()))?;
            read_response(response, url).await
        };

        let result = tokio::select! {
            result = exchange => result,
            _ = cancel.cancelled() => Err(NetworkFailure::Aborted),
        };
        debug!(url, ok = result.is_ok(), "upload finished");
        result
    }
}
