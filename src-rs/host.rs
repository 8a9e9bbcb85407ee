//! Contracts between the annotator and the document host.
//!
//! The annotator never touches a concrete document type. It reads layers
//! through [`LayerInspector`], measures text through [`TextMetrics`] and
//! mutates the document through [`DrawingAdapter`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::Rgb;
use crate::error::Result;
use crate::geometry::{Bounds, Point, SubPath};

/// Opaque handle to a layer, valid for the document it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LayerRef(pub u32);

impl fmt::Display for LayerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Layer groups are layers too.
pub type GroupRef = LayerRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerKind {
    #[default]
    Pixel,
    Text,
    Shape,
    SmartObject,
    Adjustment,
    Fill,
    Layer3d,
    Video,
    Group,
    #[serde(other)]
    Other,
}

/// Raw text style as the host reports it.
#[derive(Debug, Clone, PartialEq)]
pub struct TextInfo {
    pub font_name: String,
    pub raw_point_size: f64,
    /// Vertical scale of the layer transform, 1.0 when untransformed.
    pub vertical_scale: f64,
    pub fill_color_hex: String,
}

impl TextInfo {
    /// Point size as it appears on screen at the given density.
    pub fn effective_point_size(&self, scale: f64) -> f64 {
        self.raw_point_size * self.vertical_scale / scale
    }
}

/// Read side of the host document.
pub trait LayerInspector {
    /// Document width in pixels.
    fn document_width(&self) -> f64;

    /// Every layer in top-to-bottom stack order, excluding the background
    /// layer and group section markers.
    fn layers(&self) -> Vec<LayerRef>;

    fn kind(&self, layer: LayerRef) -> Result<LayerKind>;

    fn visible(&self, layer: LayerRef) -> Result<bool>;

    /// 0 to 100.
    fn opacity(&self, layer: LayerRef) -> Result<f64>;

    fn bounds(&self, layer: LayerRef) -> Result<Bounds>;

    fn text_info(&self, layer: LayerRef) -> Result<TextInfo>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Justification {
    #[default]
    Left,
    Center,
    Right,
}

/// Everything needed to create a text layer.
#[derive(Debug, Clone, PartialEq)]
pub struct TextLayerSpec {
    pub name: String,
    pub contents: String,
    pub position: Point,
    /// Paragraph box size; `None` creates point text.
    pub paragraph: Option<(f64, f64)>,
    pub font: String,
    pub point_size: f64,
    pub color: Rgb,
    pub justification: Justification,
    pub baseline_shift: f64,
}

/// Host-side text measurement.
pub trait TextMetrics {
    /// Box the text layer described by `spec` would occupy once created.
    fn text_bounds(&self, spec: &TextLayerSpec) -> Bounds;
}

/// Write side of the host document.
pub trait DrawingAdapter {
    /// Top-level group with the given name, if one exists.
    fn find_group(&self, name: &str) -> Option<GroupRef>;

    /// Creates a group at the top of `parent`, or of the document when
    /// `parent` is `None`.
    fn create_layer_group(&mut self, parent: Option<GroupRef>, name: &str) -> Result<GroupRef>;

    /// Creates a solid-fill shape layer from a path.
    fn create_shape_layer(
        &mut self,
        group: GroupRef,
        name: &str,
        path: &SubPath,
        color: Rgb,
    ) -> Result<LayerRef>;

    fn create_text_layer(&mut self, group: GroupRef, spec: &TextLayerSpec) -> Result<LayerRef>;
}

/// A document that can be inspected, measured and drawn into.
pub trait Host: LayerInspector + TextMetrics + DrawingAdapter {}

impl<T: LayerInspector + TextMetrics + DrawingAdapter> Host for T {}
