use crate::cache::ResourceCache;
use crate::canvas::{Command, Document};
use crate::error::BoardError;
use crate::font::{FontRole, FontSet, detect_direction, missing_glyph_error, needs_glyph};
use crate::types::{Gradient, GradientDirection, Loc, Rgba};
use base64::Engine;
use rustybuzz::{Face as HbFace, UnicodeBuffer};
use tiny_skia::{
    FillRule, FilterQuality, GradientStop as SkGradientStop, LinearGradient, Paint, Path,
    PathBuilder, Pixmap, PixmapPaint, Point, Rect, SpreadMode, Transform,
};
use tracing::debug;
use ttf_parser::{GlyphId, OutlineBuilder};

// Cubic control distance for a quarter circle.
const KAPPA: f32 = 0.552_284_8;

#[derive(Debug, Clone, Copy)]
struct RasterState {
    fill_color: Rgba,
    font: Option<(FontRole, f32)>,
}

impl Default for RasterState {
    fn default() -> Self {
        Self {
            fill_color: Rgba::BLACK,
            font: None,
        }
    }
}

/// Rasterizes a recorded report and encodes it as PNG.
pub fn render_png(
    doc: &Document,
    fonts: &FontSet,
    resources: &ResourceCache,
    shape_text: bool,
) -> Result<Vec<u8>, BoardError> {
    let pixmap = rasterize(doc, Some(fonts), resources, shape_text)?;
    pixmap
        .encode_png()
        .map_err(|err| BoardError::Asset(format!("png encoding failed: {err}")))
}

pub(crate) fn rasterize(
    doc: &Document,
    fonts: Option<&FontSet>,
    resources: &ResourceCache,
    shape_text: bool,
) -> Result<Pixmap, BoardError> {
    if let Some(fonts) = fonts {
        check_glyph_coverage(doc, fonts)?;
    }
    let mut pixmap = Pixmap::new(doc.width, doc.height).ok_or_else(|| {
        BoardError::InvalidConfiguration(format!(
            "cannot allocate a {}x{} canvas",
            doc.width, doc.height
        ))
    })?;
    pixmap.fill(to_sk_color(doc.background));

    let mut state = RasterState::default();
    let mut glyphs = 0usize;
    for command in &doc.commands {
        match command {
            Command::SetFillColor(color) => state.fill_color = *color,
            Command::SetFont { role, size } => state.font = Some((*role, *size)),
            Command::DrawString { x, y, text } => {
                glyphs += draw_string(&mut pixmap, &state, fonts, *x, *y, text, shape_text)?;
            }
            Command::DrawRect { loc, radius } => {
                if let Some(path) = rect_path(loc, *radius) {
                    pixmap.fill_path(
                        &path,
                        &fill_paint(state.fill_color),
                        FillRule::Winding,
                        Transform::identity(),
                        None,
                    );
                }
            }
            Command::DrawGradientRect {
                loc,
                gradient,
                radius,
            } => draw_gradient_rect(&mut pixmap, loc, gradient, *radius),
            Command::DrawImage { loc, source, tint } => {
                draw_image(&mut pixmap, resources, loc, source, *tint)?
            }
        }
    }
    debug!(
        width = doc.width,
        height = doc.height,
        commands = doc.commands.len(),
        glyphs,
        "rasterized document"
    );
    Ok(pixmap)
}

/// Fails on the first string whose font cannot draw every visible character. Runs over the
/// recorded commands, so a report is rejected before any pixel is touched.
pub(crate) fn check_glyph_coverage(doc: &Document, fonts: &FontSet) -> Result<(), BoardError> {
    let mut font = None;
    for command in &doc.commands {
        match command {
            Command::SetFont { role, .. } => font = Some(*role),
            Command::DrawString { text, .. } => {
                if let Some(role) = font {
                    fonts.check_coverage(role, text)?;
                }
            }
            _ => {}
        }
    }
    Ok(())
}

fn draw_string(
    pixmap: &mut Pixmap,
    state: &RasterState,
    fonts: Option<&FontSet>,
    x: f32,
    y: f32,
    text: &str,
    shape_text: bool,
) -> Result<usize, BoardError> {
    if text.trim().is_empty() {
        return Ok(0);
    }
    let Some((role, size)) = state.font else {
        return Err(BoardError::Font(format!(
            "text {text:?} drawn before a font was selected"
        )));
    };
    if size <= 0.0 {
        return Ok(0);
    }
    let fonts = fonts.ok_or_else(|| BoardError::Font("no fonts loaded".to_string()))?;
    let data = fonts
        .font_data(role)
        .ok_or_else(|| BoardError::Font(format!("no font bound to {role:?}")))?;
    let face = ttf_parser::Face::parse(data, 0)
        .map_err(|err| BoardError::Font(format!("{role:?} font: {err}")))?;

    let baseline = y + fonts.ascent(role, size);
    let paint = fill_paint(state.fill_color);
    let mut drawn = 0usize;
    for glyph in layout_text_glyphs(data, role, text, size, x, baseline, shape_text)? {
        let mut builder = GlyphPathBuilder::new(glyph.origin_x, glyph.origin_y, glyph.scale);
        if face
            .outline_glyph(GlyphId(glyph.glyph_id), &mut builder)
            .is_none()
        {
            // Spaces and other blank glyphs have no outline.
            continue;
        }
        if let Some(path) = builder.finish() {
            pixmap.fill_path(
                &path,
                &paint,
                FillRule::Winding,
                Transform::identity(),
                None,
            );
            drawn += 1;
        }
    }
    Ok(drawn)
}

#[derive(Debug, Clone, Copy)]
struct GlyphPlacement {
    glyph_id: u16,
    origin_x: f32,
    origin_y: f32,
    scale: f32,
}

fn layout_text_glyphs(
    font_data: &[u8],
    role: FontRole,
    text: &str,
    size: f32,
    baseline_x: f32,
    baseline_y: f32,
    shape_text: bool,
) -> Result<Vec<GlyphPlacement>, BoardError> {
    if !shape_text {
        return layout_text_glyphs_unshaped(font_data, role, text, size, baseline_x, baseline_y);
    }
    let Some(face) = HbFace::from_slice(font_data, 0) else {
        return layout_text_glyphs_unshaped(font_data, role, text, size, baseline_x, baseline_y);
    };
    let units = face.units_per_em().max(1) as f32;
    let scale = size / units;
    let mut buffer = UnicodeBuffer::new();
    buffer.set_direction(detect_direction(text));
    buffer.push_str(text);
    let output = rustybuzz::shape(&face, &[], buffer);
    let infos = output.glyph_infos();
    let positions = output.glyph_positions();
    if infos.is_empty() || infos.len() != positions.len() {
        return layout_text_glyphs_unshaped(font_data, role, text, size, baseline_x, baseline_y);
    }

    let mut out = Vec::with_capacity(infos.len());
    let mut pen_x = 0.0f32;
    for (info, pos) in infos.iter().zip(positions) {
        let glyph_id = info.glyph_id as u16;
        if glyph_id == 0 {
            // `.notdef`: fine for blanks, fatal for anything that should be visible.
            let source = text.get(info.cluster as usize..).and_then(|rest| rest.chars().next());
            if let Some(ch) = source.filter(|ch| needs_glyph(*ch)) {
                return Err(missing_glyph_error(role, ch));
            }
        } else {
            // Shaping offsets are y-up, the canvas is y-down.
            out.push(GlyphPlacement {
                glyph_id,
                origin_x: baseline_x + pen_x + pos.x_offset as f32 * scale,
                origin_y: baseline_y - pos.y_offset as f32 * scale,
                scale,
            });
        }
        pen_x += pos.x_advance as f32 * scale;
    }
    Ok(out)
}

fn layout_text_glyphs_unshaped(
    font_data: &[u8],
    role: FontRole,
    text: &str,
    size: f32,
    baseline_x: f32,
    baseline_y: f32,
) -> Result<Vec<GlyphPlacement>, BoardError> {
    let face = ttf_parser::Face::parse(font_data, 0)
        .map_err(|err| BoardError::Font(format!("{role:?} font: {err}")))?;
    let units = face.units_per_em().max(1) as f32;
    let scale = size / units;

    let mut out = Vec::new();
    let mut pen_x = 0.0f32;
    for ch in text.chars() {
        let Some(glyph) = face.glyph_index(ch) else {
            if needs_glyph(ch) {
                return Err(missing_glyph_error(role, ch));
            }
            pen_x += size * 0.5;
            continue;
        };
        out.push(GlyphPlacement {
            glyph_id: glyph.0,
            origin_x: baseline_x + pen_x,
            origin_y: baseline_y,
            scale,
        });
        let advance = face.glyph_hor_advance(glyph).unwrap_or(0) as f32 * scale;
        pen_x += if advance > 0.0 { advance } else { size * 0.5 };
    }
    Ok(out)
}

/// Emits outlines straight into canvas space: scaled from font units and flipped about the
/// baseline.
struct GlyphPathBuilder {
    builder: PathBuilder,
    origin_x: f32,
    origin_y: f32,
    scale: f32,
}

impl GlyphPathBuilder {
    fn new(origin_x: f32, origin_y: f32, scale: f32) -> Self {
        Self {
            builder: PathBuilder::new(),
            origin_x,
            origin_y,
            scale,
        }
    }

    fn map(&self, x: f32, y: f32) -> (f32, f32) {
        (self.origin_x + x * self.scale, self.origin_y - y * self.scale)
    }

    fn finish(self) -> Option<Path> {
        self.builder.finish()
    }
}

impl OutlineBuilder for GlyphPathBuilder {
    fn move_to(&mut self, x: f32, y: f32) {
        let (x, y) = self.map(x, y);
        self.builder.move_to(x, y);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        let (x, y) = self.map(x, y);
        self.builder.line_to(x, y);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        let (x1, y1) = self.map(x1, y1);
        let (x, y) = self.map(x, y);
        self.builder.quad_to(x1, y1, x, y);
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        let (x1, y1) = self.map(x1, y1);
        let (x2, y2) = self.map(x2, y2);
        let (x, y) = self.map(x, y);
        self.builder.cubic_to(x1, y1, x2, y2, x, y);
    }

    fn close(&mut self) {
        self.builder.close();
    }
}

/// Rectangle with all four corners rounded. The radius is clamped to half the short side.
fn rect_path(loc: &Loc, radius: f32) -> Option<Path> {
    let rect = Rect::from_xywh(loc.x, loc.y, loc.width, loc.height)?;
    let r = radius.min(loc.width / 2.0).min(loc.height / 2.0);
    if r <= 0.0 {
        return Some(PathBuilder::from_rect(rect));
    }
    let (left, top, right, bottom) = (rect.left(), rect.top(), rect.right(), rect.bottom());
    let k = r * KAPPA;
    let mut pb = PathBuilder::new();
    pb.move_to(left + r, top);
    pb.line_to(right - r, top);
    pb.cubic_to(right - r + k, top, right, top + r - k, right, top + r);
    pb.line_to(right, bottom - r);
    pb.cubic_to(right, bottom - r + k, right - r + k, bottom, right - r, bottom);
    pb.line_to(left + r, bottom);
    pb.cubic_to(left + r - k, bottom, left, bottom - r + k, left, bottom - r);
    pb.line_to(left, top + r);
    pb.cubic_to(left, top + r - k, left + r - k, top, left + r, top);
    pb.close();
    pb.finish()
}

fn draw_gradient_rect(pixmap: &mut Pixmap, loc: &Loc, gradient: &Gradient, radius: f32) {
    let Some(path) = rect_path(loc, radius) else {
        return;
    };
    let (start, end) = match gradient.direction {
        GradientDirection::Horizontal => (
            Point::from_xy(loc.x, loc.y + loc.height / 2.0),
            Point::from_xy(loc.x + loc.width, loc.y + loc.height / 2.0),
        ),
        GradientDirection::Vertical => (
            Point::from_xy(loc.x + loc.width / 2.0, loc.y),
            Point::from_xy(loc.x + loc.width / 2.0, loc.y + loc.height),
        ),
        GradientDirection::Diagonal => (
            Point::from_xy(loc.x, loc.y),
            Point::from_xy(loc.x + loc.width, loc.y + loc.height),
        ),
    };
    let stops: Vec<SkGradientStop> = gradient
        .stops
        .iter()
        .map(|stop| SkGradientStop::new(stop.offset.clamp(0.0, 1.0), to_sk_color(stop.color)))
        .collect();

    let mut paint = fill_paint(gradient.first_color());
    if let Some(shader) =
        LinearGradient::new(start, end, stops, SpreadMode::Pad, Transform::identity())
    {
        paint.shader = shader;
    }
    pixmap.fill_path(&path, &paint, FillRule::Winding, Transform::identity(), None);
}

fn draw_image(
    pixmap: &mut Pixmap,
    resources: &ResourceCache,
    loc: &Loc,
    source: &str,
    tint: Option<Rgba>,
) -> Result<(), BoardError> {
    let image = resources.image(source)?;
    if image.width() == 0 || image.height() == 0 || loc.width <= 0.0 || loc.height <= 0.0 {
        return Ok(());
    }
    let tinted = tint.map(|color| tinted_copy(&image, color));
    let src = tinted.as_ref().unwrap_or(&*image);
    let transform = Transform::from_row(
        loc.width / src.width() as f32,
        0.0,
        0.0,
        loc.height / src.height() as f32,
        loc.x,
        loc.y,
    );
    let paint = PixmapPaint {
        quality: FilterQuality::Bicubic,
        ..PixmapPaint::default()
    };
    pixmap.draw_pixmap(0, 0, src.as_ref(), &paint, transform, None);
    Ok(())
}

// Replaces every pixel's color with `tint`, keeping the source coverage.
fn tinted_copy(image: &Pixmap, tint: Rgba) -> Pixmap {
    let mut out = image.clone();
    for px in out.data_mut().chunks_exact_mut(4) {
        let alpha = premul_u8(px[3], tint.a);
        px[0] = premul_u8(tint.r, alpha);
        px[1] = premul_u8(tint.g, alpha);
        px[2] = premul_u8(tint.b, alpha);
        px[3] = alpha;
    }
    out
}

fn fill_paint(color: Rgba) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color(to_sk_color(color));
    paint.anti_alias = true;
    paint
}

fn to_sk_color(color: Rgba) -> tiny_skia::Color {
    tiny_skia::Color::from_rgba8(color.r, color.g, color.b, color.a)
}

/// Loads a file path or `data:` URI into a premultiplied pixmap.
pub(crate) fn decode_image_source(source: &str) -> Result<Pixmap, BoardError> {
    if source.starts_with("data:") {
        let (mime, data) = parse_data_uri(source)
            .ok_or_else(|| BoardError::Asset("malformed data uri".to_string()))?;
        return decode_image_to_pixmap(&data, Some(&mime));
    }
    let bytes = std::fs::read(source)
        .map_err(|err| BoardError::Asset(format!("image {source}: {err}")))?;
    decode_image_to_pixmap(&bytes, None)
}

fn decode_image_to_pixmap(data: &[u8], mime: Option<&str>) -> Result<Pixmap, BoardError> {
    let format = match mime {
        Some(mime) if mime.contains("png") => Some(image::ImageFormat::Png),
        Some(mime) if mime.contains("jpeg") || mime.contains("jpg") => {
            Some(image::ImageFormat::Jpeg)
        }
        _ => image::guess_format(data).ok(),
    };
    let decoded = match format {
        Some(format) => image::load_from_memory_with_format(data, format),
        None => image::load_from_memory(data),
    }
    .map_err(|err| BoardError::Asset(format!("image decode failed: {err}")))?;

    let rgba = decoded.to_rgba8();
    let (width, height) = rgba.dimensions();
    let mut pixmap = Pixmap::new(width, height)
        .ok_or_else(|| BoardError::Asset(format!("empty image ({width}x{height})")))?;
    for (src, dst) in rgba
        .as_raw()
        .chunks_exact(4)
        .zip(pixmap.data_mut().chunks_exact_mut(4))
    {
        let alpha = src[3];
        dst[0] = premul_u8(src[0], alpha);
        dst[1] = premul_u8(src[1], alpha);
        dst[2] = premul_u8(src[2], alpha);
        dst[3] = alpha;
    }
    Ok(pixmap)
}

fn premul_u8(channel: u8, alpha: u8) -> u8 {
    let prod = (channel as u16) * (alpha as u16) + 127;
    ((prod + (prod >> 8)) >> 8) as u8
}

fn parse_data_uri(uri: &str) -> Option<(String, Vec<u8>)> {
    let rest = uri.strip_prefix("data:")?;
    let (header, payload) = rest.split_once(',')?;
    let mime = header
        .split(';')
        .next()
        .filter(|v| !v.is_empty())
        .unwrap_or("application/octet-stream")
        .to_string();
    let data = if header.contains(";base64") {
        base64::engine::general_purpose::STANDARD
            .decode(payload.trim())
            .ok()?
    } else {
        payload.as_bytes().to_vec()
    };
    Some((mime, data))
}
