use std::path::Path;

use anyhow::{Result, anyhow};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};

use crate::source::ImageSource;

/// Everything the analyze endpoint needs for one request.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub prompt: String,
    pub source: ImageSource,
}

#[derive(Clone)]
pub struct AnalysisClient {
    client: Client,
    base_url: String,
}

impl AnalysisClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.to_string(),
        }
    }

    /// POST the prompt and image as a multipart form and hand back the raw
    /// response; the caller consumes the body incrementally.
    pub async fn analyze(&self, request: &AnalysisRequest) -> Result<Response> {
        let url = format!("{}/analyze", self.base_url);

        let mut form = Form::new().text("prompt", request.prompt.clone());

        match &request.source {
            ImageSource::File(path) => {
                let bytes = tokio::fs::read(path)
                    .await
                    .map_err(|e| anyhow!("Failed to read image file {:?}: {}", path, e))?;
                let file_name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "image".to_string());
                let part = Part::bytes(bytes)
                    .file_name(file_name)
                    .mime_str(mime_for(path))?;
                form = form.text("image_source", "file").part("image_file", part);
            }
            ImageSource::Url(image_url) => {
                form = form
                    .text("image_source", "url")
                    .text("image_url", image_url.clone());
            }
        }

        let response = self.client.post(&url).multipart(form).send().await?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "Analysis request failed with status: {}",
                response.status()
            ));
        }

        Ok(response)
    }
}

/// Mime type for the file part, guessed from the extension.
fn mime_for(path: &Path) -> &'static str {
    image::ImageFormat::from_path(path)
        .map(|format| format.to_mime_type())
        .unwrap_or("application/octet-stream")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_mime_for_known_extensions() {
        assert_eq!(mime_for(&PathBuf::from("cat.jpg")), "image/jpeg");
        assert_eq!(mime_for(&PathBuf::from("cat.png")), "image/png");
        assert_eq!(mime_for(&PathBuf::from("cat.webp")), "image/webp");
    }

    #[test]
    fn test_mime_for_unknown_extension() {
        assert_eq!(mime_for(&PathBuf::from("cat")), "application/octet-stream");
        assert_eq!(mime_for(&PathBuf::from("cat.xyz")), "application/octet-stream");
    }
}
