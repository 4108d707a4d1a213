use crate::error::{Error, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Png,
    Webp,
}

impl ImageFormat {
    fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(ImageFormat::Jpeg)
        } else if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
            Some(ImageFormat::Png)
        } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
            Some(ImageFormat::Webp)
        } else {
            None
        }
    }

    pub fn mime(self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Png => "image/png",
            ImageFormat::Webp => "image/webp",
        }
    }
}

/// A webcam frame whose encoding has been verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedFrame {
    pub bytes: Vec<u8>,
    pub format: ImageFormat,
}

impl DecodedFrame {
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }
}

/// Accepts bare base64 or a `data:image/...;base64,` URL as sent by the browser.
pub fn decode_frame(payload: &str) -> Result<DecodedFrame> {
    let payload = payload.trim();
    let encoded = match payload.strip_prefix("data:") {
        Some(rest) => {
            let (header, data) = rest
                .split_once(',')
                .ok_or_else(|| Error::Decode("data URL without payload".to_string()))?;
            if !header.ends_with(";base64") {
                return Err(Error::Decode("data URL is not base64 encoded".to_string()));
            }
            data
        }
        None => payload,
    };

    if encoded.is_empty() {
        return Err(Error::Decode("empty image payload".to_string()));
    }

    let bytes = STANDARD
        .decode(encoded)
        .map_err(|e| Error::Decode(e.to_string()))?;
    let format = ImageFormat::sniff(&bytes)
        .ok_or_else(|| Error::Decode("unsupported image format".to_string()))?;

    Ok(DecodedFrame { bytes, format })
}
