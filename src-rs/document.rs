//! JSON layered-document host.
//!
//! A document is a tree of layers listed top-to-bottom, the way a layers
//! panel shows them. Groups hold their children in `layers`.
//!
//! ```json
//! {
//!   "width": 1000, "height": 800,
//!   "layers": [
//!     {"name": "Title", "kind": "text",
//!      "bounds": {"left": 40, "top": 30, "right": 400, "bottom": 80},
//!      "text": {"font": "Helvetica-Bold", "size": 48, "color": "333333"}},
//!     {"name": "Background", "kind": "pixel", "background": true}
//!   ]
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};

use crate::config::Rgb;
use crate::error::{AnnotateError, Result};
use crate::geometry::{Bounds, Point, SubPath};
use crate::host::{
    DrawingAdapter, GroupRef, Justification, LayerInspector, LayerKind, LayerRef, TextInfo,
    TextLayerSpec, TextMetrics,
};
use crate::render::text_extent;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayeredDocument {
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub layers: Vec<LayerNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerNode {
    #[serde(skip)]
    id: u32,
    pub name: String,
    #[serde(default)]
    pub kind: LayerKind,
    #[serde(default = "default_visible")]
    pub visible: bool,
    #[serde(default = "default_opacity")]
    pub opacity: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounds: Option<Bounds>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub background: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<TextStyle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shape: Option<ShapeFill>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub layers: Vec<LayerNode>,
}

impl LayerNode {
    fn new(id: u32, name: &str, kind: LayerKind) -> Self {
        Self {
            id,
            name: name.to_string(),
            kind,
            visible: true,
            opacity: 100.0,
            bounds: None,
            background: false,
            text: None,
            shape: None,
            layers: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextStyle {
    pub font: String,
    pub size: f64,
    /// Fill color as `RRGGBB`.
    pub color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<TextTransform>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contents: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Point>,
    /// Paragraph box `[width, height]`; absent for point text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paragraph: Option<[f64; 2]>,
    #[serde(default)]
    pub justification: Justification,
    #[serde(default)]
    pub baseline_shift: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TextTransform {
    #[serde(default = "unit_scale")]
    pub xx: f64,
    #[serde(default = "unit_scale")]
    pub yy: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeFill {
    pub color: Rgb,
    pub paths: Vec<SubPath>,
}

fn default_visible() -> bool {
    true
}

fn default_opacity() -> f64 {
    100.0
}

fn unit_scale() -> f64 {
    1.0
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// An open document plus the runtime ids that back [`LayerRef`].
#[derive(Debug, Clone)]
pub struct JsonDocument {
    path: Option<PathBuf>,
    doc: LayeredDocument,
    next_id: u32,
}

impl JsonDocument {
    pub fn new(mut doc: LayeredDocument) -> anyhow::Result<Self> {
        if !(doc.width.is_finite() && doc.width > 0.0) {
            bail!("document width must be a positive number, got {}", doc.width);
        }
        if !(doc.height.is_finite() && doc.height > 0.0) {
            bail!("document height must be a positive number, got {}", doc.height);
        }
        let mut next_id = 1;
        assign_ids(&mut doc.layers, &mut next_id);
        Ok(Self {
            path: None,
            doc,
            next_id,
        })
    }

    pub fn from_json_str(raw: &str) -> anyhow::Result<Self> {
        let doc: LayeredDocument = serde_json::from_str(raw).context("invalid document JSON")?;
        Self::new(doc)
    }

    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read document: {}", path.display()))?;
        let mut opened = Self::from_json_str(&raw)
            .with_context(|| format!("failed to open document: {}", path.display()))?;
        opened.path = Some(path.to_path_buf());
        Ok(opened)
    }

    /// Writes the document back to `path`, or where it was opened from.
    pub fn save(&self, path: Option<&Path>) -> anyhow::Result<PathBuf> {
        let target = match (path, &self.path) {
            (Some(path), _) => path.to_path_buf(),
            (None, Some(path)) => path.clone(),
            (None, None) => bail!("document has no path to save to"),
        };
        ensure_parent_dir(&target)?;
        let raw = serde_json::to_string_pretty(&self.doc)?;
        fs::write(&target, raw)
            .with_context(|| format!("failed to write document: {}", target.display()))?;
        Ok(target)
    }

    #[cfg(test)]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn document(&self) -> &LayeredDocument {
        &self.doc
    }

    fn node(&self, layer: LayerRef) -> Result<&LayerNode> {
        find(&self.doc.layers, layer.0)
            .ok_or_else(|| AnnotateError::inspection(layer, "layer no longer exists"))
    }

    fn group_children(&mut self, group: GroupRef) -> Result<&mut Vec<LayerNode>> {
        match find_mut(&mut self.doc.layers, group.0) {
            Some(node) if node.kind == LayerKind::Group => Ok(&mut node.layers),
            Some(node) => Err(AnnotateError::Drawing(format!(
                "layer '{}' is not a group",
                node.name
            ))),
            None => Err(AnnotateError::Drawing(format!("group {group} not found"))),
        }
    }

    fn insert(&mut self, parent: Option<GroupRef>, mut node: LayerNode) -> Result<LayerRef> {
        let id = self.next_id;
        node.id = id;
        let siblings = match parent {
            Some(group) => self.group_children(group)?,
            None => &mut self.doc.layers,
        };
        siblings.insert(0, node);
        self.next_id += 1;
        Ok(LayerRef(id))
    }
}

fn assign_ids(nodes: &mut [LayerNode], next_id: &mut u32) {
    for node in nodes {
        node.id = *next_id;
        *next_id += 1;
        assign_ids(&mut node.layers, next_id);
    }
}

fn find(nodes: &[LayerNode], id: u32) -> Option<&LayerNode> {
    for node in nodes {
        if node.id == id {
            return Some(node);
        }
        if let Some(found) = find(&node.layers, id) {
            return Some(found);
        }
    }
    None
}

fn find_mut(nodes: &mut [LayerNode], id: u32) -> Option<&mut LayerNode> {
    for node in nodes {
        if node.id == id {
            return Some(node);
        }
        if let Some(found) = find_mut(&mut node.layers, id) {
            return Some(found);
        }
    }
    None
}

fn collect_refs(nodes: &[LayerNode], out: &mut Vec<LayerRef>) {
    for node in nodes {
        if node.background {
            continue;
        }
        out.push(LayerRef(node.id));
        collect_refs(&node.layers, out);
    }
}

impl LayerInspector for JsonDocument {
    fn document_width(&self) -> f64 {
        self.doc.width
    }

    fn layers(&self) -> Vec<LayerRef> {
        let mut out = Vec::new();
        collect_refs(&self.doc.layers, &mut out);
        out
    }

    fn kind(&self, layer: LayerRef) -> Result<LayerKind> {
        Ok(self.node(layer)?.kind)
    }

    fn visible(&self, layer: LayerRef) -> Result<bool> {
        Ok(self.node(layer)?.visible)
    }

    fn opacity(&self, layer: LayerRef) -> Result<f64> {
        let opacity = self.node(layer)?.opacity;
        if !(0.0..=100.0).contains(&opacity) {
            return Err(AnnotateError::inspection(
                layer,
                format!("opacity {opacity} outside 0..100"),
            ));
        }
        Ok(opacity)
    }

    fn bounds(&self, layer: LayerRef) -> Result<Bounds> {
        let node = self.node(layer)?;
        let bounds = node
            .bounds
            .ok_or_else(|| AnnotateError::inspection(layer, format!("'{}' has no bounds", node.name)))?;
        if !bounds.is_valid() {
            return Err(AnnotateError::inspection(
                layer,
                format!("'{}' has inverted bounds", node.name),
            ));
        }
        Ok(bounds)
    }

    fn text_info(&self, layer: LayerRef) -> Result<TextInfo> {
        let node = self.node(layer)?;
        let style = node.text.as_ref().ok_or_else(|| {
            AnnotateError::inspection(layer, format!("'{}' has no text style", node.name))
        })?;
        let color = Rgb::parse_hex(&style.color).ok_or_else(|| {
            AnnotateError::inspection(layer, format!("invalid text color '{}'", style.color))
        })?;
        Ok(TextInfo {
            font_name: style.font.clone(),
            raw_point_size: style.size,
            vertical_scale: style.transform.map(|t| t.yy).unwrap_or(1.0),
            fill_color_hex: color.hex(),
        })
    }
}

impl TextMetrics for JsonDocument {
    fn text_bounds(&self, spec: &TextLayerSpec) -> Bounds {
        if let Some((w, h)) = spec.paragraph {
            return Bounds::from_origin(spec.position, w, h);
        }
        let (w, h) = text_extent(&spec.contents, spec.point_size);
        Bounds::from_origin(spec.position, w, h)
    }
}

impl DrawingAdapter for JsonDocument {
    fn find_group(&self, name: &str) -> Option<GroupRef> {
        self.doc
            .layers
            .iter()
            .find(|node| node.kind == LayerKind::Group && node.name == name)
            .map(|node| LayerRef(node.id))
    }

    fn create_layer_group(&mut self, parent: Option<GroupRef>, name: &str) -> Result<GroupRef> {
        let node = LayerNode::new(0, name, LayerKind::Group);
        self.insert(parent, node)
    }

    fn create_shape_layer(
        &mut self,
        group: GroupRef,
        name: &str,
        path: &SubPath,
        color: Rgb,
    ) -> Result<LayerRef> {
        let mut node = LayerNode::new(0, name, LayerKind::Shape);
        node.bounds = path.bounds();
        node.shape = Some(ShapeFill {
            color,
            paths: vec![path.clone()],
        });
        self.insert(Some(group), node)
    }

    fn create_text_layer(&mut self, group: GroupRef, spec: &TextLayerSpec) -> Result<LayerRef> {
        let mut node = LayerNode::new(0, &spec.name, LayerKind::Text);
        node.bounds = Some(self.text_bounds(spec));
        node.text = Some(TextStyle {
            font: spec.font.clone(),
            size: spec.point_size,
            color: spec.color.hex(),
            transform: None,
            contents: Some(spec.contents.clone()),
            position: Some(spec.position),
            paragraph: spec.paragraph.map(|(w, h)| [w, h]),
            justification: spec.justification,
            baseline_shift: spec.baseline_shift,
        });
        self.insert(Some(group), node)
    }
}

pub fn ensure_parent_dir(path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create parent directory: {}", parent.display())
            })?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn sample() -> JsonDocument {
        let raw = json!({
            "width": 500,
            "height": 300,
            "layers": [
                {"name": "Title", "kind": "text",
                 "bounds": {"left": 10, "top": 10, "right": 200, "bottom": 40},
                 "text": {"font": "Helvetica", "size": 24, "color": "#ff0000",
                          "transform": {"yy": 0.5}}},
                {"name": "Card", "kind": "group", "layers": [
                    {"name": "Body", "kind": "text", "visible": false,
                     "bounds": {"left": 10, "top": 60, "right": 200, "bottom": 80},
                     "text": {"font": "Georgia", "size": 12, "color": "000000"}}
                ]},
                {"name": "Background", "kind": "pixel", "background": true}
            ]
        });
        JsonDocument::new(serde_json::from_value(raw).unwrap()).unwrap()
    }

    #[test]
    fn traversal_is_top_down_and_skips_background() {
        let doc = sample();
        let names: Vec<String> = doc
            .layers()
            .into_iter()
            .map(|layer| doc.node(layer).unwrap().name.clone())
            .collect();
        assert_eq!(names, vec!["Title", "Card", "Body"]);
    }

    #[test]
    fn text_info_applies_defaults_and_normalises_color() {
        let doc = sample();
        let layers = doc.layers();
        let title = doc.text_info(layers[0]).unwrap();
        assert_eq!(title.fill_color_hex, "FF0000");
        assert_eq!(title.vertical_scale, 0.5);
        let body = doc.text_info(layers[2]).unwrap();
        assert_eq!(body.vertical_scale, 1.0);
        assert!(!doc.visible(layers[2]).unwrap());
        assert_eq!(doc.opacity(layers[2]).unwrap(), 100.0);
    }

    #[test]
    fn missing_properties_are_inspection_failures() {
        let doc = sample();
        let group = doc.layers()[1];
        assert!(matches!(
            doc.text_info(group),
            Err(AnnotateError::LayerInspection { .. })
        ));
        assert!(matches!(
            doc.bounds(group),
            Err(AnnotateError::LayerInspection { .. })
        ));
        assert!(matches!(
            doc.kind(LayerRef(999)),
            Err(AnnotateError::LayerInspection { .. })
        ));
    }

    #[test]
    fn new_layers_go_on_top_of_their_parent() {
        let mut doc = sample();
        let group = doc.create_layer_group(None, "Font Annotations").unwrap();
        assert_eq!(doc.find_group("Font Annotations"), Some(group));
        assert_eq!(doc.document().layers[0].name, "Font Annotations");

        let first = doc.create_layer_group(Some(group), "Badge 1").unwrap();
        let second = doc.create_layer_group(Some(group), "Badge 2").unwrap();
        let children = &doc.node(group).unwrap().layers;
        assert_eq!(children[0].id, second.0);
        assert_eq!(children[1].id, first.0);
    }

    #[test]
    fn drawing_into_a_non_group_fails() {
        let mut doc = sample();
        let title = doc.layers()[0];
        let err = doc.create_layer_group(Some(title), "x").unwrap_err();
        assert!(matches!(err, AnnotateError::Drawing(_)));
    }

    #[test]
    fn point_text_is_measured_by_cell() {
        let doc = sample();
        let spec = TextLayerSpec {
            name: "Font Legend".to_string(),
            contents: "ab\rcde".to_string(),
            position: Point::new(10.0, 10.0),
            paragraph: None,
            font: "LucidaGrande-Bold".to_string(),
            point_size: 10.0,
            color: Rgb::new(255, 255, 255),
            justification: Justification::Left,
            baseline_shift: 0.0,
        };
        assert_eq!(doc.text_bounds(&spec), Bounds::new(10.0, 10.0, 40.0, 30.0));
    }

    #[test]
    fn save_and_reopen_keeps_layers() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("nested").join("doc.psd");
        let mut doc = sample();
        let group = doc.create_layer_group(None, "Font Annotations").unwrap();
        doc.create_shape_layer(
            group,
            "circle",
            &crate::geometry::circle_path(0.0, 0.0, 5.0),
            Rgb::new(255, 127, 0),
        )
        .unwrap();
        doc.save(Some(&target)).unwrap();

        let reopened = JsonDocument::open(&target).unwrap();
        assert_eq!(reopened.path(), Some(target.as_path()));
        assert_eq!(
            serde_json::to_value(reopened.document()).unwrap(),
            serde_json::to_value(doc.document()).unwrap()
        );
        assert_eq!(reopened.layers().len(), 5);
    }

    #[test]
    fn rejects_zero_width() {
        let err = JsonDocument::from_json_str(r#"{"width": 0, "height": 10}"#).unwrap_err();
        assert!(err.to_string().contains("width"));
    }
}
