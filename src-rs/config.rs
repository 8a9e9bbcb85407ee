//! Run configuration assembled from command-line flags.

use std::fmt;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_GROUP_NAME: &str = "Font Annotations";
pub const DEFAULT_FONT: &str = "LucidaGrande-Bold";
pub const DEFAULT_BACKGROUND: Rgb = Rgb::new(255, 127, 0);
pub const DEFAULT_FOREGROUND: Rgb = Rgb::new(255, 255, 255);

/// Display density the document was authored at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scale {
    /// 1x
    Standard,
    /// 2x ("retina")
    #[default]
    Retina,
}

impl Scale {
    pub fn factor(self) -> f64 {
        match self {
            Scale::Standard => 1.0,
            Scale::Retina => 2.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parses `RRGGBB` or `#RRGGBB`, any case.
    pub fn parse_hex(raw: &str) -> Option<Self> {
        let s = raw.trim();
        let hex = s.strip_prefix('#').unwrap_or(s);
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
        let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
        let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
        Some(Self { r, g, b })
    }

    /// Upper-case hex without the leading `#`.
    pub fn hex(self) -> String {
        format!("{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.hex())
    }
}

impl Serialize for Rgb {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.hex())
    }
}

impl<'de> Deserialize<'de> for Rgb {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Rgb::parse_hex(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid hex color: {raw}")))
    }
}

/// Colors and typeface of everything the annotator draws.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnnotationStyle {
    pub background: Rgb,
    pub foreground: Rgb,
    pub font: String,
}

impl Default for AnnotationStyle {
    fn default() -> Self {
        Self {
            background: DEFAULT_BACKGROUND,
            foreground: DEFAULT_FOREGROUND,
            font: DEFAULT_FONT.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnnotateConfig {
    pub scale: Scale,
    pub group_name: String,
    pub style: AnnotationStyle,
}

impl Default for AnnotateConfig {
    fn default() -> Self {
        Self {
            scale: Scale::default(),
            group_name: DEFAULT_GROUP_NAME.to_string(),
            style: AnnotationStyle::default(),
        }
    }
}

impl AnnotateConfig {
    pub fn from_flags(
        scale: Scale,
        group: Option<&str>,
        font: Option<&str>,
        background: Option<&str>,
        foreground: Option<&str>,
    ) -> Result<Self> {
        let mut config = Self {
            scale,
            ..Self::default()
        };
        if let Some(group) = group {
            if group.trim().is_empty() {
                bail!("group name must not be empty");
            }
            config.group_name = group.to_string();
        }
        if let Some(font) = font {
            config.style.font = font.to_string();
        }
        if let Some(raw) = background {
            config.style.background = parse_color_flag("--background", raw)?;
        }
        if let Some(raw) = foreground {
            config.style.foreground = parse_color_flag("--foreground", raw)?;
        }
        Ok(config)
    }
}

fn parse_color_flag(flag: &str, raw: &str) -> Result<Rgb> {
    match Rgb::parse_hex(raw) {
        Some(color) => Ok(color),
        None => bail!("{flag} expects a #RRGGBB color, got '{raw}'"),
    }
}
