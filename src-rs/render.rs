//! Raster previews of layered documents.
//!
//! Text is drawn with the 8x8 bitmap font, so one character cell is one
//! point size wide and one point size tall. [`text_extent`] uses the same
//! cell to measure text for the document host.

use std::path::Path;

use anyhow::{bail, Context, Result};
use font8x8::{UnicodeFonts, BASIC_FONTS};
use image::{DynamicImage, Rgba, RgbaImage};

use crate::config::Rgb;
use crate::document::{ensure_parent_dir, LayerNode, LayeredDocument, TextStyle};
use crate::geometry::{Bounds, Point};
use crate::host::{Justification, LayerKind};

const CURVE_STEPS: usize = 16;
const CANVAS: Rgba<u8> = Rgba([255, 255, 255, 255]);
const OUTLINE: Rgba<u8> = Rgba([200, 200, 200, 255]);

/// Splits on either line break a host may store.
pub fn text_lines(text: &str) -> Vec<&str> {
    text.split(['\r', '\n']).collect()
}

/// Width and height of `text` set at `point_size`.
pub fn text_extent(text: &str, point_size: f64) -> (f64, f64) {
    let lines = text_lines(text);
    let widest = lines
        .iter()
        .map(|line| line.chars().count())
        .max()
        .unwrap_or(0);
    (
        widest as f64 * point_size,
        lines.len().max(1) as f64 * point_size,
    )
}

/// Largest canvas a preview will allocate, in pixels.
pub const MAX_PREVIEW_PIXELS: u64 = 100_000_000;

// Cap on glyph magnification.
const MAX_GLYPH_SCALE: u32 = 4096;

pub fn render_document(doc: &LayeredDocument) -> Result<RgbaImage> {
    let width = doc.width.round().max(1.0);
    let height = doc.height.round().max(1.0);
    if width * height > MAX_PREVIEW_PIXELS as f64 {
        bail!(
            "document is too large to preview: {}x{} exceeds {} pixels",
            doc.width,
            doc.height,
            MAX_PREVIEW_PIXELS
        );
    }
    let mut img = RgbaImage::from_pixel(width as u32, height as u32, CANVAS);
    draw_nodes(&mut img, &doc.layers, 1.0);
    Ok(img)
}

pub fn save_preview(img: RgbaImage, path: &Path) -> Result<()> {
    ensure_parent_dir(path)?;
    DynamicImage::ImageRgba8(img)
        .save(path)
        .with_context(|| format!("failed to save preview image: {}", path.display()))?;
    Ok(())
}

// Layers are stored top-to-bottom, so paint in reverse.
fn draw_nodes(img: &mut RgbaImage, nodes: &[LayerNode], parent_alpha: f64) {
    for node in nodes.iter().rev() {
        if !node.visible || node.background {
            continue;
        }
        let alpha = parent_alpha * (node.opacity / 100.0).clamp(0.0, 1.0);
        if alpha <= 0.0 {
            continue;
        }
        match node.kind {
            LayerKind::Group => draw_nodes(img, &node.layers, alpha),
            LayerKind::Text => draw_text_node(img, node, alpha),
            LayerKind::Shape => draw_shape_node(img, node, alpha),
            _ => {
                if let Some(bounds) = node.bounds {
                    stroke_bounds(img, &bounds, with_alpha(OUTLINE, alpha));
                }
            }
        }
    }
}

fn draw_shape_node(img: &mut RgbaImage, node: &LayerNode, alpha: f64) {
    let Some(shape) = &node.shape else {
        if let Some(bounds) = node.bounds {
            stroke_bounds(img, &bounds, with_alpha(OUTLINE, alpha));
        }
        return;
    };
    let color = with_alpha(rgba(shape.color), alpha);
    for path in &shape.paths {
        fill_polygon(img, &path.flatten(CURVE_STEPS), color);
    }
}

fn draw_text_node(img: &mut RgbaImage, node: &LayerNode, alpha: f64) {
    let Some(style) = &node.text else {
        return;
    };
    let color = Rgb::parse_hex(&style.color)
        .map(rgba)
        .unwrap_or(Rgba([0, 0, 0, 255]));
    let color = with_alpha(color, alpha);
    match (&style.contents, node.bounds) {
        (Some(contents), _) if !contents.is_empty() => {
            draw_text_style(img, style, node.bounds, contents, color);
        }
        (_, Some(bounds)) => stroke_bounds(img, &bounds, color),
        _ => {}
    }
}

fn draw_text_style(
    img: &mut RgbaImage,
    style: &TextStyle,
    bounds: Option<Bounds>,
    contents: &str,
    color: Rgba<u8>,
) {
    let origin = style
        .position
        .or_else(|| bounds.map(|b| Point::new(b.left, b.top)))
        .unwrap_or_default();
    let glyph_scale = (style.size / 8.0)
        .round()
        .clamp(1.0, f64::from(MAX_GLYPH_SCALE)) as u32;
    let cell = 8.0 * f64::from(glyph_scale);
    let box_width = style.paragraph.map(|[w, _]| w);
    let top = origin.y - style.baseline_shift;

    for (row, line) in text_lines(contents).into_iter().enumerate() {
        let line_width = line.chars().count() as f64 * cell;
        let offset = match (style.justification, box_width) {
            (Justification::Center, Some(w)) => (w - line_width) / 2.0,
            (Justification::Right, Some(w)) => w - line_width,
            _ => 0.0,
        };
        let x = (origin.x + offset).round() as i64;
        let y = (top + row as f64 * cell).round() as i64;
        draw_bitmap_line(img, x, y, line, color, glyph_scale);
    }
}

fn rgba(color: Rgb) -> Rgba<u8> {
    Rgba([color.r, color.g, color.b, 255])
}

fn with_alpha(color: Rgba<u8>, alpha: f64) -> Rgba<u8> {
    let a = (f64::from(color[3]) * alpha).round().clamp(0.0, 255.0) as u8;
    Rgba([color[0], color[1], color[2], a])
}

fn clamp_i32(value: i32, min_value: i32, max_value: i32) -> i32 {
    value.max(min_value).min(max_value)
}

fn blend_pixel(dst: Rgba<u8>, src: Rgba<u8>) -> Rgba<u8> {
    let a = f64::from(src[3]) / 255.0;
    if a <= 0.0 {
        return dst;
    }
    let inv = 1.0 - a;
    let mix = |d: u8, s: u8| {
        (f64::from(d) * inv + f64::from(s) * a)
            .round()
            .clamp(0.0, 255.0) as u8
    };
    let out_a = (f64::from(dst[3]) + f64::from(src[3]) * inv)
        .round()
        .clamp(0.0, 255.0) as u8;
    Rgba([mix(dst[0], src[0]), mix(dst[1], src[1]), mix(dst[2], src[2]), out_a])
}

fn blend_at(img: &mut RgbaImage, x: i32, y: i32, color: Rgba<u8>) {
    if x < 0 || y < 0 || x >= img.width() as i32 || y >= img.height() as i32 {
        return;
    }
    let dst = *img.get_pixel(x as u32, y as u32);
    img.put_pixel(x as u32, y as u32, blend_pixel(dst, color));
}

fn draw_bitmap_line(
    img: &mut RgbaImage,
    x: i64,
    y: i64,
    text: &str,
    color: Rgba<u8>,
    scale: u32,
) {
    let scale = i64::from(scale.max(1));
    let (width, height) = (i64::from(img.width()), i64::from(img.height()));
    if y >= height || y + 8 * scale <= 0 {
        return;
    }
    let mut cursor_x = x;
    for ch in text.chars() {
        if cursor_x >= width {
            break;
        }
        let glyph = BASIC_FONTS.get(ch).or_else(|| BASIC_FONTS.get('?'));
        if let Some(glyph) = glyph.filter(|_| cursor_x + 8 * scale > 0) {
            for (row_idx, row) in glyph.iter().enumerate() {
                for col_idx in 0..8 {
                    if (*row >> col_idx) & 1 == 0 {
                        continue;
                    }
                    let px = cursor_x + col_idx * scale;
                    let py = y + row_idx as i64 * scale;
                    fill_block(img, px, py, scale, color);
                }
            }
        }
        cursor_x += 8 * scale;
    }
}

// Blends a `size` square at (x, y), clipped to the canvas.
fn fill_block(img: &mut RgbaImage, x: i64, y: i64, size: i64, color: Rgba<u8>) {
    let x0 = x.max(0);
    let y0 = y.max(0);
    let x1 = (x + size).min(i64::from(img.width()));
    let y1 = (y + size).min(i64::from(img.height()));
    for py in y0..y1 {
        for px in x0..x1 {
            let dst = *img.get_pixel(px as u32, py as u32);
            img.put_pixel(px as u32, py as u32, blend_pixel(dst, color));
        }
    }
}

fn fill_rect_alpha(img: &mut RgbaImage, x0: i32, y0: i32, x1: i32, y1: i32, color: Rgba<u8>) {
    if img.width() == 0 || img.height() == 0 {
        return;
    }
    let min_x = clamp_i32(x0.min(x1), 0, img.width() as i32 - 1);
    let max_x = clamp_i32(x0.max(x1), 0, img.width() as i32 - 1);
    let min_y = clamp_i32(y0.min(y1), 0, img.height() as i32 - 1);
    let max_y = clamp_i32(y0.max(y1), 0, img.height() as i32 - 1);
    for y in min_y..=max_y {
        for x in min_x..=max_x {
            blend_at(img, x, y, color);
        }
    }
}

fn stroke_bounds(img: &mut RgbaImage, bounds: &Bounds, color: Rgba<u8>) {
    let x0 = bounds.left.round() as i32;
    let y0 = bounds.top.round() as i32;
    let x1 = bounds.right.round() as i32;
    let y1 = bounds.bottom.round() as i32;
    if x1 < 0 || y1 < 0 || x0 >= img.width() as i32 || y0 >= img.height() as i32 {
        return;
    }
    fill_rect_alpha(img, x0, y0, x1, y0, color);
    fill_rect_alpha(img, x0, y1, x1, y1, color);
    fill_rect_alpha(img, x0, y0 + 1, x0, y1 - 1, color);
    fill_rect_alpha(img, x1, y0 + 1, x1, y1 - 1, color);
}

fn point_in_polygon(p: (f64, f64), poly: &[Point]) -> bool {
    let mut inside = false;
    let mut j = poly.len() - 1;
    for i in 0..poly.len() {
        let (a, b) = (poly[i], poly[j]);
        if (a.y > p.1) != (b.y > p.1) {
            let cross_x = (b.x - a.x) * (p.1 - a.y) / (b.y - a.y) + a.x;
            if p.0 < cross_x {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

fn fill_polygon(img: &mut RgbaImage, poly: &[Point], color: Rgba<u8>) {
    if poly.len() < 3 || img.width() == 0 || img.height() == 0 {
        return;
    }
    let (mut lo_x, mut lo_y, mut hi_x, mut hi_y) = (f64::MAX, f64::MAX, f64::MIN, f64::MIN);
    for p in poly {
        lo_x = lo_x.min(p.x);
        lo_y = lo_y.min(p.y);
        hi_x = hi_x.max(p.x);
        hi_y = hi_y.max(p.y);
    }
    let min_x = clamp_i32(lo_x.floor() as i32, 0, img.width() as i32 - 1);
    let max_x = clamp_i32(hi_x.ceil() as i32, 0, img.width() as i32 - 1);
    let min_y = clamp_i32(lo_y.floor() as i32, 0, img.height() as i32 - 1);
    let max_y = clamp_i32(hi_y.ceil() as i32, 0, img.height() as i32 - 1);
    for y in min_y..=max_y {
        for x in min_x..=max_x {
            let center = (f64::from(x) + 0.5, f64::from(y) + 0.5);
            if point_in_polygon(center, poly) {
                blend_at(img, x, y, color);
            }
        }
    }
}
