// src/models.rs
use std::fmt;
use std::str::FromStr;

use base64::{Engine as _, engine::general_purpose};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::BoothError;

/// An encoded raster image plus its MIME type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub data: Bytes,
    pub mime_type: String,
}

impl EncodedImage {
    pub fn new(data: impl Into<Bytes>, mime_type: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            mime_type: mime_type.into(),
        }
    }

    pub fn png(data: impl Into<Bytes>) -> Self {
        Self::new(data, "image/png")
    }

    pub fn base64(&self) -> String {
        general_purpose::STANDARD.encode(&self.data)
    }

    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.base64())
    }

    pub fn from_base64(payload: &str, mime_type: &str) -> Result<Self, BoothError> {
        let data = general_purpose::STANDARD
            .decode(payload.trim())
            .map_err(|e| BoothError::Decode(format!("Invalid base64 payload: {}", e)))?;
        Ok(Self::new(data, mime_type))
    }
}

/// The user's photo. Built once by the image processor and never mutated;
/// a new upload replaces it wholesale.
#[derive(Debug, Clone)]
pub struct SourceImage {
    pub id: Uuid,
    pub image: EncodedImage,
    pub width: u32,
    pub height: u32,
    pub uploaded_at: DateTime<Utc>,
}

impl SourceImage {
    pub fn data(&self) -> &Bytes {
        &self.image.data
    }

    pub fn mime_type(&self) -> &str {
        &self.image.mime_type
    }

    pub fn base64(&self) -> String {
        self.image.base64()
    }

    pub fn data_url(&self) -> String {
        self.image.to_data_url()
    }
}

/// One shot within a theme's batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptVariant {
    pub id: String,
    pub base: String,
}

impl PromptVariant {
    pub fn new(id: impl Into<String>, base: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            base: base.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotStatus {
    Pending,
    Success,
    Failed,
}

impl fmt::Display for SlotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SlotStatus::Pending => "pending",
            SlotStatus::Success => "success",
            SlotStatus::Failed => "failed",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationSlot {
    pub variant_id: String,
    pub status: SlotStatus,
    /// Watermarked output, present only on success.
    pub image: Option<EncodedImage>,
    pub error: Option<String>,
}

impl GenerationSlot {
    pub fn pending(variant_id: impl Into<String>) -> Self {
        Self {
            variant_id: variant_id.into(),
            status: SlotStatus::Pending,
            image: None,
            error: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum HeadshotPose {
    #[default]
    Forward,
    Angled,
}

impl FromStr for HeadshotPose {
    type Err = BoothError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "forward" => Ok(HeadshotPose::Forward),
            "angled" | "angle" => Ok(HeadshotPose::Angled),
            other => Err(BoothError::Validation(format!(
                "Unknown headshot pose: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LookbookStyle {
    Preset(String),
    Custom(String),
}

impl LookbookStyle {
    pub fn as_str(&self) -> &str {
        match self {
            LookbookStyle::Preset(style) | LookbookStyle::Custom(style) => style,
        }
    }
}

pub const DEFAULT_EXPRESSION: &str = "Friendly Smile";

/// Per-call inputs supplied by the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationOptions {
    pub headshot_expression: String,
    pub headshot_pose: HeadshotPose,
    /// Shared descriptor for the whole album, filled in by the setup phase.
    pub album_style: Option<String>,
    pub hair_colors: Vec<String>,
    pub selected_hairstyles: Vec<String>,
    pub custom_hairstyle: Option<String>,
    pub lookbook_style: Option<LookbookStyle>,
    pub celebrity_name: Option<String>,
    pub keychain_text: Option<String>,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            headshot_expression: DEFAULT_EXPRESSION.to_string(),
            headshot_pose: HeadshotPose::Forward,
            album_style: None,
            hair_colors: Vec::new(),
            selected_hairstyles: Vec::new(),
            custom_hairstyle: None,
            lookbook_style: None,
            celebrity_name: None,
            keychain_text: None,
        }
    }
}

impl GenerationOptions {
    /// Custom hairstyle text, if any non-blank text was entered.
    pub fn custom_hairstyle(&self) -> Option<&str> {
        non_blank(self.custom_hairstyle.as_deref())
    }

    pub fn celebrity_name(&self) -> Option<&str> {
        non_blank(self.celebrity_name.as_deref())
    }

    pub fn keychain_text(&self) -> Option<&str> {
        non_blank(self.keychain_text.as_deref())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Target crop ratio written as `W:H`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AspectRatio {
    pub width: u32,
    pub height: u32,
}

impl AspectRatio {
    pub const SQUARE: AspectRatio = AspectRatio {
        width: 1,
        height: 1,
    };
    pub const PORTRAIT: AspectRatio = AspectRatio {
        width: 9,
        height: 16,
    };

    pub fn new(width: u32, height: u32) -> Result<Self, BoothError> {
        if width == 0 || height == 0 {
            return Err(BoothError::Validation(
                "Aspect ratio terms must be positive".to_string(),
            ));
        }
        Ok(Self { width, height })
    }

    pub fn as_f64(&self) -> f64 {
        self.width as f64 / self.height as f64
    }
}

impl FromStr for AspectRatio {
    type Err = BoothError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (w, h) = s
            .split_once(':')
            .ok_or_else(|| BoothError::Validation(format!("Invalid aspect ratio: {}", s)))?;
        let parse = |part: &str| {
            part.trim()
                .parse::<u32>()
                .map_err(|_| BoothError::Validation(format!("Invalid aspect ratio: {}", s)))
        };
        AspectRatio::new(parse(w)?, parse(h)?)
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.width, self.height)
    }
}
