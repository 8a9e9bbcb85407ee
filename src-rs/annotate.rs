//! One annotation pass over one open document.

use log::{debug, info, warn};
use serde::Serialize;

use crate::config::AnnotateConfig;
use crate::error::Result;
use crate::geometry::Bounds;
use crate::host::{DrawingAdapter, GroupRef, Host, LayerInspector, LayerKind, LayerRef};
use crate::layout::{legend_lines, LayoutEngine, LayoutInstruction, LEGEND_NAME};
use crate::registry::{FontRegistry, FontSignature, SignatureIndex};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PassState {
    Init,
    EnsureGroup,
    Inspecting,
    Drawing,
    Done,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnnotatedLayer {
    pub layer: LayerRef,
    pub bounds: Bounds,
    pub index: SignatureIndex,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedLayer {
    pub layer: LayerRef,
    pub reason: String,
}

/// Result of walking the layer stack once.
#[derive(Debug, Default)]
pub struct Inspection {
    pub registry: FontRegistry,
    pub annotated: Vec<AnnotatedLayer>,
    pub skipped: Vec<SkippedLayer>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PassReport {
    pub badges: usize,
    pub legend: Vec<String>,
    pub annotated: Vec<AnnotatedLayer>,
    pub skipped: Vec<SkippedLayer>,
    pub group_created: bool,
}

/// Text layers that are visible and not fully transparent get annotated,
/// even when other layers cover them.
pub fn is_eligible(kind: LayerKind, opacity: f64, visible: bool) -> bool {
    kind == LayerKind::Text && opacity > 0.0 && visible
}

fn inspect_layer(
    inspector: &dyn LayerInspector,
    layer: LayerRef,
    scale: f64,
) -> Result<Option<(Bounds, FontSignature)>> {
    if inspector.kind(layer)? != LayerKind::Text {
        return Ok(None);
    }
    if !is_eligible(LayerKind::Text, inspector.opacity(layer)?, inspector.visible(layer)?) {
        return Ok(None);
    }
    let bounds = inspector.bounds(layer)?;
    let info = inspector.text_info(layer)?;
    Ok(Some((bounds, FontSignature::from_text(&info, scale))))
}

/// Registers a signature for every eligible layer, in stack order.
///
/// A layer whose properties cannot be read is recorded as skipped and the
/// walk continues.
pub fn inspect_layers(inspector: &dyn LayerInspector, scale: f64) -> Inspection {
    let mut inspection = Inspection::default();
    for layer in inspector.layers() {
        match inspect_layer(inspector, layer, scale) {
            Ok(Some((bounds, signature))) => {
                let index = inspection.registry.register(signature);
                inspection.annotated.push(AnnotatedLayer {
                    layer,
                    bounds,
                    index,
                });
            }
            Ok(None) => {}
            Err(err) => {
                warn!("skipping layer {layer}: {err}");
                inspection.skipped.push(SkippedLayer {
                    layer,
                    reason: err.to_string(),
                });
            }
        }
    }
    inspection
}

/// Creates the layers for one instruction inside its own sub-group.
pub fn draw_instruction(
    adapter: &mut dyn DrawingAdapter,
    group: GroupRef,
    instruction: &LayoutInstruction,
) -> Result<GroupRef> {
    match instruction {
        LayoutInstruction::BadgeAt(badge) => {
            let sub = adapter.create_layer_group(Some(group), &format!("Badge {}", badge.index))?;
            adapter.create_shape_layer(sub, "Badge", &badge.outline, badge.colors.background)?;
            adapter.create_text_layer(sub, &badge.label)?;
            Ok(sub)
        }
        LayoutInstruction::LegendBlock(legend) => {
            let sub = adapter.create_layer_group(Some(group), LEGEND_NAME)?;
            adapter.create_shape_layer(
                sub,
                "Legend Background",
                &legend.background,
                legend.colors.background,
            )?;
            adapter.create_text_layer(sub, &legend.text)?;
            Ok(sub)
        }
    }
}

enum GroupSlot {
    Existing(GroupRef),
    Pending,
}

pub struct AnnotationPass<'a, H: Host> {
    host: &'a mut H,
    config: &'a AnnotateConfig,
    state: PassState,
}

impl<'a, H: Host> AnnotationPass<'a, H> {
    pub fn new(host: &'a mut H, config: &'a AnnotateConfig) -> Self {
        Self {
            host,
            config,
            state: PassState::Init,
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> PassState {
        self.state
    }

    fn advance(&mut self, next: PassState) {
        debug!("pass state {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    pub fn run(mut self) -> Result<PassReport> {
        self.advance(PassState::EnsureGroup);
        // Creation waits for the first drawing so an empty pass leaves no
        // empty group behind.
        let slot = match self.host.find_group(&self.config.group_name) {
            Some(group) => GroupSlot::Existing(group),
            None => GroupSlot::Pending,
        };

        self.advance(PassState::Inspecting);
        let scale = self.config.scale.factor();
        let inspection = inspect_layers(&*self.host, scale);
        debug!(
            "{} eligible layers, {} signatures, {} skipped",
            inspection.annotated.len(),
            inspection.registry.len(),
            inspection.skipped.len()
        );

        self.advance(PassState::Drawing);
        let mut report = PassReport {
            legend: legend_lines(&inspection.registry),
            skipped: inspection.skipped,
            ..PassReport::default()
        };
        if !inspection.annotated.is_empty() {
            let group = match slot {
                GroupSlot::Existing(group) => group,
                GroupSlot::Pending => {
                    let group = self
                        .host
                        .create_layer_group(None, &self.config.group_name)?;
                    report.group_created = true;
                    group
                }
            };
            let engine = LayoutEngine::new(
                self.host.document_width(),
                self.config.scale,
                self.config.style.clone(),
            );
            for item in &inspection.annotated {
                let badge = engine.layout_badge(&item.bounds, item.index);
                draw_instruction(&mut *self.host, group, &badge)?;
                report.badges += 1;
            }
            if let Some(legend) = engine.layout_legend(&inspection.registry, &*self.host) {
                draw_instruction(&mut *self.host, group, &legend)?;
            }
        } else {
            debug!("no eligible text layers; nothing drawn");
        }
        report.annotated = inspection.annotated;

        self.advance(PassState::Done);
        info!(
            "annotated {} layers with {} fonts",
            report.badges,
            report.legend.len()
        );
        Ok(report)
    }
}

pub fn annotate_document<H: Host>(host: &mut H, config: &AnnotateConfig) -> Result<PassReport> {
    AnnotationPass::new(host, config).run()
}
