use crate::error::{Error, Result};
use crate::models::observation::Direction;
use crate::utils::image::DecodedFrame;
use anyhow::Context as _;
use async_trait::async_trait;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// Face mesh output for one frame. Directions are only meaningful for a single face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FaceGeometry {
    pub face_count: u32,
    #[serde(default)]
    pub head_direction: Direction,
    #[serde(default)]
    pub gaze_direction: Direction,
}

/// Embedding of the single cropped face, if the frame had exactly one.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FaceCapture {
    pub face_count: u32,
    /// Mouth and chin landmarks visible (no mask or hand over the face).
    #[serde(default)]
    pub face_clear: bool,
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FrameDetector: Send + Sync {
    async fn face_geometry(&self, frame: &DecodedFrame) -> Result<FaceGeometry>;

    async fn phone_present(&self, frame: &DecodedFrame) -> Result<bool>;

    async fn face_embedding(&self, frame: &DecodedFrame) -> Result<FaceCapture>;
}

/// Client for the perception sidecar that hosts the face mesh, phone
/// detector and face embedding models.
#[derive(Clone)]
pub struct HttpDetector {
    client: Client,
    base_url: String,
}

impl HttpDetector {
    pub fn new(base_url: String, client: Client) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn call<T: DeserializeOwned>(&self, endpoint: &str, frame: &DecodedFrame) -> Result<T> {
        #[derive(Serialize)]
        struct DetectReq<'a> {
            image: String,
            mime: &'a str,
        }

        let body = DetectReq {
            image: frame.to_base64(),
            mime: frame.format.mime(),
        };
        let resp = self
            .client
            .post(format!("{}/{}", self.base_url, endpoint))
            .header("Accept", "application/json")
            .json(&body)
            .send()
            .await
            .with_context(|| format!("{} detector request failed", endpoint))
            .map_err(|e| Error::Detector(format!("{:#}", e)))?;

        let status = resp.status();
        let txt = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(Error::Detector(format!(
                "{} detector status {}: {}",
                endpoint,
                status.as_u16(),
                txt
            )));
        }
        serde_json::from_str(&txt)
            .with_context(|| format!("{} detector parse failed", endpoint))
            .map_err(|e| Error::Detector(format!("{:#}", e)))
    }
}

#[async_trait]
impl FrameDetector for HttpDetector {
    async fn face_geometry(&self, frame: &DecodedFrame) -> Result<FaceGeometry> {
        self.call("face", frame).await
    }

    async fn phone_present(&self, frame: &DecodedFrame) -> Result<bool> {
        #[derive(Deserialize)]
        struct PhoneResp {
            phone_detected: bool,
        }
        let resp: PhoneResp = self.call("phone", frame).await?;
        Ok(resp.phone_detected)
    }

    async fn face_embedding(&self, frame: &DecodedFrame) -> Result<FaceCapture> {
        self.call("embedding", frame).await
    }
}

/// `1 - cos(a, b)`. `None` when the vectors differ in length or either is zero.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }
    let mut dot = 0f32;
    let mut na = 0f32;
    let mut nb = 0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    if na == 0.0 || nb == 0.0 {
        None
    } else {
        Some(1.0 - dot / (na.sqrt() * nb.sqrt()))
    }
}
