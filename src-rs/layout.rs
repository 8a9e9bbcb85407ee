//! Badge and legend geometry.
//!
//! All sizes derive from the document width so annotations stay legible
//! when the document is viewed scaled to fit (e.g. exported to PDF). Only
//! the badge padding follows the density scale.

use serde::Serialize;

use crate::config::{AnnotationStyle, Rgb, Scale};
use crate::geometry::{circle_path, rect_path, Bounds, Point, SubPath};
use crate::host::{Justification, TextLayerSpec, TextMetrics};
use crate::registry::{FontRegistry, SignatureIndex};

/// Document width divided by this gives the annotation font size.
pub const FONT_SIZE_RATIO: f64 = 50.0;
/// Gap between a layer and its badge, in 1x pixels.
pub const BADGE_PADDING: f64 = 7.0;
/// Inset applied to the legend text box to get its background.
pub const LEGEND_INSET: f64 = -15.0;
/// Separator between legend lines.
pub const LEGEND_LINE_BREAK: char = '\r';

pub const LEGEND_NAME: &str = "Font Legend";

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Palette {
    pub background: Rgb,
    pub foreground: Rgb,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BadgeLayout {
    pub index: SignatureIndex,
    /// Top-left of the square the circle is inscribed in.
    pub position: Point,
    pub radius: f64,
    pub outline: SubPath,
    pub label: TextLayerSpec,
    pub colors: Palette,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LegendLayout {
    pub position: Point,
    pub lines: Vec<String>,
    pub text: TextLayerSpec,
    pub text_bounds: Bounds,
    pub background_bounds: Bounds,
    pub background: SubPath,
    pub colors: Palette,
}

/// Abstract drawing step handed to a host.
#[derive(Debug, Clone, PartialEq)]
pub enum LayoutInstruction {
    BadgeAt(BadgeLayout),
    LegendBlock(LegendLayout),
}

#[derive(Debug, Clone)]
pub struct LayoutEngine {
    font_size: f64,
    padding: f64,
    style: AnnotationStyle,
}

impl LayoutEngine {
    pub fn new(document_width: f64, scale: Scale, style: AnnotationStyle) -> Self {
        Self {
            font_size: document_width / FONT_SIZE_RATIO,
            padding: BADGE_PADDING * scale.factor(),
            style,
        }
    }

    pub fn font_size(&self) -> f64 {
        self.font_size
    }

    pub fn radius(&self) -> f64 {
        self.font_size()
    }

    pub fn padding(&self) -> f64 {
        self.padding
    }

    fn palette(&self) -> Palette {
        Palette {
            background: self.style.background,
            foreground: self.style.foreground,
        }
    }

    /// Circle badge to the right of `layer`, vertically centred on it.
    pub fn layout_badge(&self, layer: &Bounds, index: SignatureIndex) -> LayoutInstruction {
        let radius = self.radius();
        let x = layer.right + self.padding();
        let y = layer.top + layer.height() / 2.0 - radius;
        let position = Point::new(x, y);
        let label = TextLayerSpec {
            name: index.to_string(),
            contents: index.to_string(),
            position,
            paragraph: Some((radius * 2.0, radius * 2.0)),
            font: self.style.font.clone(),
            point_size: self.font_size(),
            color: self.style.foreground,
            justification: Justification::Center,
            baseline_shift: -(radius - self.font_size() / 2.0),
        };
        LayoutInstruction::BadgeAt(BadgeLayout {
            index,
            position,
            radius,
            outline: circle_path(x, y, radius),
            label,
            colors: self.palette(),
        })
    }

    /// One line per registered signature, in registration order.
    ///
    /// Returns `None` for an empty registry so no empty legend gets drawn.
    pub fn layout_legend(
        &self,
        registry: &FontRegistry,
        metrics: &dyn TextMetrics,
    ) -> Option<LayoutInstruction> {
        if registry.is_empty() {
            return None;
        }
        let lines = legend_lines(registry);
        let font_size = self.font_size();
        let position = Point::new(font_size, font_size);
        let text = TextLayerSpec {
            name: LEGEND_NAME.to_string(),
            contents: lines.join(&LEGEND_LINE_BREAK.to_string()),
            position,
            paragraph: None,
            font: self.style.font.clone(),
            point_size: font_size,
            color: self.style.foreground,
            justification: Justification::Left,
            baseline_shift: 0.0,
        };
        let text_bounds = metrics.text_bounds(&text);
        let background_bounds = text_bounds.inset(LEGEND_INSET);
        Some(LayoutInstruction::LegendBlock(LegendLayout {
            position,
            lines,
            text,
            text_bounds,
            background_bounds,
            background: rect_path(&background_bounds),
            colors: self.palette(),
        }))
    }
}

/// `"{index}: {font}, {size}pt, #{color}"` for every signature.
pub fn legend_lines(registry: &FontRegistry) -> Vec<String> {
    registry
        .iter()
        .map(|(index, signature)| format!("{index}: {signature}"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::FontSignature;

    struct FixedMetrics(Bounds);

    impl TextMetrics for FixedMetrics {
        fn text_bounds(&self, _spec: &TextLayerSpec) -> Bounds {
            self.0
        }
    }

    fn engine(width: f64, scale: Scale) -> LayoutEngine {
        LayoutEngine::new(width, scale, AnnotationStyle::default())
    }

    fn first_index() -> SignatureIndex {
        let mut registry = FontRegistry::new();
        registry.register(FontSignature::new("A", 12.0, "000000"))
    }

    #[test]
    fn badge_sits_right_of_layer_and_centred() {
        let engine = engine(500.0, Scale::Standard);
        assert_eq!(engine.font_size(), 10.0);
        assert_eq!(engine.radius(), 10.0);
        assert_eq!(engine.padding(), 7.0);

        let layer = Bounds::new(0.0, 0.0, 100.0, 40.0);
        let LayoutInstruction::BadgeAt(badge) = engine.layout_badge(&layer, first_index()) else {
            panic!("expected a badge");
        };
        assert_eq!(badge.position, Point::new(107.0, 10.0));
        assert_eq!(badge.radius, 10.0);
        assert_eq!(
            badge.outline.bounds(),
            Some(Bounds::new(107.0, 10.0, 127.0, 30.0))
        );
        assert_eq!(badge.label.contents, "1");
        assert_eq!(badge.label.paragraph, Some((20.0, 20.0)));
        assert_eq!(badge.label.baseline_shift, -5.0);
        assert_eq!(badge.label.justification, Justification::Center);
    }

    #[test]
    fn badge_above_document_top_for_short_layer() {
        let engine = engine(500.0, Scale::Standard);
        let layer = Bounds::new(0.0, 0.0, 100.0, 0.0);
        let LayoutInstruction::BadgeAt(badge) = engine.layout_badge(&layer, first_index()) else {
            panic!("expected a badge");
        };
        assert_eq!(badge.position, Point::new(107.0, -10.0));
    }

    #[test]
    fn retina_doubles_padding_only() {
        let engine = engine(500.0, Scale::Retina);
        assert_eq!(engine.padding(), 14.0);
        assert_eq!(engine.font_size(), 10.0);
        let layer = Bounds::new(0.0, 0.0, 100.0, 40.0);
        let LayoutInstruction::BadgeAt(badge) = engine.layout_badge(&layer, first_index()) else {
            panic!("expected a badge");
        };
        assert_eq!(badge.position.x, 114.0);
    }

    #[test]
    fn legend_lists_signatures_in_registration_order() {
        let mut registry = FontRegistry::new();
        registry.register(FontSignature::new("Helvetica-Bold", 24.0, "333333"));
        registry.register(FontSignature::new("Georgia", 12.5, "ff0000"));
        registry.register(FontSignature::new("Helvetica-Bold", 24.0, "333333"));

        let metrics = FixedMetrics(Bounds::new(20.0, 20.0, 220.0, 60.0));
        let engine = engine(1000.0, Scale::Standard);
        let Some(LayoutInstruction::LegendBlock(legend)) = engine.layout_legend(&registry, &metrics)
        else {
            panic!("expected a legend");
        };
        assert_eq!(
            legend.lines,
            vec![
                "1: Helvetica-Bold, 24pt, #333333".to_string(),
                "2: Georgia, 12.5pt, #FF0000".to_string(),
            ]
        );
        assert_eq!(
            legend.text.contents,
            "1: Helvetica-Bold, 24pt, #333333\r2: Georgia, 12.5pt, #FF0000"
        );
        assert_eq!(legend.position, Point::new(20.0, 20.0));
        assert_eq!(legend.background_bounds, Bounds::new(5.0, 5.0, 235.0, 75.0));
        assert_eq!(legend.background.bounds(), Some(legend.background_bounds));
    }

    #[test]
    fn empty_registry_has_no_legend() {
        let metrics = FixedMetrics(Bounds::default());
        let engine = engine(1000.0, Scale::Retina);
        assert!(engine.layout_legend(&FontRegistry::new(), &metrics).is_none());
        assert!(legend_lines(&FontRegistry::new()).is_empty());
    }
}
