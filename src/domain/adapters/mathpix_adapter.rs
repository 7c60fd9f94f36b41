//! Mathpix text API adapter.

use crate::core::traits::Recognizer;
use crate::domain::{BackendFailure, RasterImage, RawRecognition, SourceTag};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Serialize)]
struct TextRequest<'a> {
    src: String,
    formats: [&'a str; 2],
}

#[derive(Debug, Default, Deserialize)]
struct TextResponse {
    #[serde(default)]
    latex_styled: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl TextResponse {
    /// Styled markup preferred, plain text otherwise. Blank values count as absent.
    fn into_markup(self) -> Result<String, BackendFailure> {
        if let Some(error) = self.error {
            return Err(BackendFailure::MalformedOutput(error));
        }
        self.latex_styled
            .filter(|s| !s.trim().is_empty())
            .or(self.text.filter(|s| !s.trim().is_empty()))
            .map(|s| s.trim().to_string())
            .ok_or_else(|| BackendFailure::MalformedOutput("empty Mathpix response".to_string()))
    }
}

/// Sends the preprocessed image to Mathpix `/v3/text`.
#[derive(Debug)]
pub struct MathpixAdapter {
    client: reqwest::blocking::Client,
    endpoint: String,
    app_id: String,
    app_key: String,
}

impl MathpixAdapter {
    /// Fails with [`BackendFailure::Unavailable`] when credentials are blank.
    pub fn new(
        endpoint: impl Into<String>,
        app_id: impl Into<String>,
        app_key: impl Into<String>,
    ) -> Result<Self, BackendFailure> {
        let (app_id, app_key) = (app_id.into(), app_key.into());
        if app_id.trim().is_empty() || app_key.trim().is_empty() {
            return Err(BackendFailure::Unavailable(
                "Mathpix credentials not configured".to_string(),
            ));
        }
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| BackendFailure::Unavailable(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            app_id,
            app_key,
        })
    }

    fn data_url(image: &RasterImage) -> Result<String, BackendFailure> {
        let mut png = Vec::new();
        image
            .pixels()
            .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
            .map_err(|e| BackendFailure::Runtime(format!("PNG encode: {e}")))?;
        Ok(format!("data:image/png;base64,{}", STANDARD.encode(png)))
    }
}

impl Recognizer for MathpixAdapter {
    fn tag(&self) -> SourceTag {
        SourceTag::Mathpix
    }

    fn recognize(&self, image: &RasterImage) -> Result<RawRecognition, BackendFailure> {
        let request = TextRequest {
            src: Self::data_url(image)?,
            formats: ["text", "latex_styled"],
        };
        let response = self
            .client
            .post(format!("{}/v3/text", self.endpoint))
            .header("app_id", &self.app_id)
            .header("app_key", &self.app_key)
            .json(&request)
            .send()
            .map_err(|e| BackendFailure::Runtime(format!("Mathpix request: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(BackendFailure::Runtime(format!("Mathpix returned HTTP {status}")));
        }
        let body: TextResponse = response
            .json()
            .map_err(|e| BackendFailure::MalformedOutput(format!("Mathpix response: {e}")))?;
        Ok(RawRecognition::markup(body.into_markup()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_credentials_are_unavailable() {
        let err = MathpixAdapter::new("https://api.mathpix.com", "", "key").unwrap_err();
        assert_eq!(err.kind(), "unavailable");
    }

    #[test]
    fn test_response_prefers_styled_markup() {
        let body: TextResponse =
            serde_json::from_str(r#"{"latex_styled": "x^{2}", "text": "\\( x^2 \\)"}"#).unwrap();
        assert_eq!(body.into_markup().unwrap(), "x^{2}");

        let body: TextResponse =
            serde_json::from_str(r#"{"latex_styled": " ", "text": "2x+3=7"}"#).unwrap();
        assert_eq!(body.into_markup().unwrap(), "2x+3=7");
    }

    #[test]
    fn test_response_errors_are_malformed() {
        let body: TextResponse = serde_json::from_str(r#"{"error": "no content"}"#).unwrap();
        assert_eq!(body.into_markup().unwrap_err().kind(), "malformed_output");
        assert!(TextResponse::default().into_markup().is_err());
    }
}
