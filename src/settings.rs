use crate::constants::DEFAULT_MAX_LENGTH;
use crate::error::{CaptionError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Output variants the caption service can produce for one image.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum CaptionStyle {
    Short,
    Detailed,
    /// Accessibility text
    Alt,
    Creative,
}

impl CaptionStyle {
    pub const ALL: [CaptionStyle; 4] = [
        CaptionStyle::Short,
        CaptionStyle::Detailed,
        CaptionStyle::Alt,
        CaptionStyle::Creative,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            CaptionStyle::Short => "short",
            CaptionStyle::Detailed => "detailed",
            CaptionStyle::Alt => "alt",
            CaptionStyle::Creative => "creative",
        }
    }
}

impl fmt::Display for CaptionStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    #[default]
    Professional,
    Casual,
    Funny,
}

/// Caption request options. Read-only to the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptionSettings {
    pub styles: BTreeSet<CaptionStyle>,
    pub tone: Tone,
    pub max_length: u32,
}

impl Default for CaptionSettings {
    fn default() -> Self {
        Self {
            styles: [CaptionStyle::Short, CaptionStyle::Detailed, CaptionStyle::Alt]
                .into_iter()
                .collect(),
            tone: Tone::default(),
            max_length: DEFAULT_MAX_LENGTH,
        }
    }
}

impl CaptionSettings {
    pub fn new(
        styles: impl IntoIterator<Item = CaptionStyle>,
        tone: Tone,
        max_length: u32,
    ) -> Result<Self> {
        let settings = Self {
            styles: styles.into_iter().collect(),
            tone,
            max_length,
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.styles.is_empty() {
            return Err(CaptionError::InvalidSettings(
                "at least one caption style is required".to_string(),
            ));
        }
        if self.max_length == 0 {
            return Err(CaptionError::InvalidSettings(
                "max length must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Generated text per caption style. Styles that were not requested, or
/// that the service left out, are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Captions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detailed: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creative: Option<String>,
}

impl Captions {
    pub fn get(&self, style: CaptionStyle) -> Option<&str> {
        match style {
            CaptionStyle::Short => self.short.as_deref(),
            CaptionStyle::Detailed => self.detailed.as_deref(),
            CaptionStyle::Alt => self.alt.as_deref(),
            CaptionStyle::Creative => self.creative.as_deref(),
        }
    }

    /// Present captions in style order.
    pub fn iter(&self) -> impl Iterator<Item = (CaptionStyle, &str)> {
        CaptionStyle::ALL
            .into_iter()
            .filter_map(move |style| self.get(style).map(|text| (style, text)))
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }
}
