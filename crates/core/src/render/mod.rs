use std::f32::consts::TAU;
use std::path::Path as FsPath;

use palette::{FromColor, Srgb};
use tiny_skia::{
    BlendMode, Color, FillRule, FilterQuality, Paint, Path, PathBuilder, Pixmap, PixmapPaint,
    Shader, Stroke, Transform,
};

use crate::{Particle, Result, ShapeKind, VisualiserError};

const OUTLINE_WIDTH: f32 = 2.0;
const BRANCH_WIDTH: f32 = 1.0;
const FRACTAL_DEPTH: u32 = 4;
const FRACTAL_SPREAD: f32 = 0.3;
const FRACTAL_SHRINK: f32 = 0.7;
const SPIRAL_SAMPLES: usize = 100;
const WAVE_STEP: f32 = 5.0;

/// Immediate-mode 2D drawing target with a save/restore transform stack.
pub trait Surface {
    fn width(&self) -> u32;
    fn height(&self) -> u32;

    /// Pushes the current transform.
    fn save(&mut self);
    /// Pops the last saved transform; a no-op on an empty stack.
    fn restore(&mut self);
    fn translate(&mut self, dx: f32, dy: f32);
    fn rotate(&mut self, radians: f32);

    /// Wipes every pixel to transparent.
    fn clear(&mut self);
    fn fill_path(&mut self, path: &Path, color: Color);
    fn stroke_path(&mut self, path: &Path, color: Color, width: f32);

    /// Runs `draw` with the current transform saved, restoring it afterwards
    /// however `draw` returns.
    fn scoped<R>(&mut self, draw: impl FnOnce(&mut Self) -> R) -> R
    where
        Self: Sized,
    {
        self.save();
        let result = draw(self);
        self.restore();
        result
    }
}

/// Colour in the hue/saturation/lightness space used by the visuals.
/// Hue is in degrees and wraps; saturation and lightness are percentages.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hsl {
    pub hue: f32,
    pub saturation: f32,
    pub lightness: f32,
}

impl Hsl {
    pub fn new(hue: f32, saturation: f32, lightness: f32) -> Self {
        Self {
            hue,
            saturation,
            lightness,
        }
    }

    pub fn to_rgb8(self) -> [u8; 3] {
        let hsl: palette::Hsl = palette::Hsl::new(
            self.hue.rem_euclid(360.0),
            (self.saturation / 100.0).clamp(0.0, 1.0),
            (self.lightness / 100.0).clamp(0.0, 1.0),
        );
        let rgb: Srgb = Srgb::from_color(hsl);
        let rgb: Srgb<u8> = rgb.into_format();
        [rgb.red, rgb.green, rgb.blue]
    }

    pub fn to_color(self, alpha: f32) -> Color {
        let [r, g, b] = self.to_rgb8();
        Color::from_rgba8(r, g, b, alpha_u8(alpha))
    }
}

fn alpha_u8(alpha: f32) -> u8 {
    (alpha.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Software raster surface backed by a [`Pixmap`].
#[derive(Debug, Clone)]
pub struct Canvas {
    pixmap: Pixmap,
    transform: Transform,
    stack: Vec<Transform>,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> Result<Self> {
        let pixmap = Pixmap::new(width, height).ok_or_else(|| {
            VisualiserError::Surface(format!("cannot allocate a {width}x{height} surface"))
        })?;
        Ok(Self {
            pixmap,
            transform: Transform::identity(),
            stack: Vec::new(),
        })
    }

    pub fn pixmap(&self) -> &Pixmap {
        &self.pixmap
    }

    /// Fills the whole surface with `shader`, ignoring the current transform.
    pub fn paint_shader(&mut self, shader: Shader<'_>) {
        let mut paint = Paint::default();
        paint.shader = shader;
        if let Some(rect) =
            tiny_skia::Rect::from_xywh(0.0, 0.0, self.width() as f32, self.height() as f32)
        {
            self.pixmap
                .fill_rect(rect, &paint, Transform::identity(), None);
        }
    }

    /// Composites a same-sized layer over the surface.
    pub fn draw_layer(&mut self, layer: &Pixmap, opacity: f32) {
        let paint = PixmapPaint {
            opacity: opacity.clamp(0.0, 1.0),
            blend_mode: BlendMode::SourceOver,
            quality: FilterQuality::Nearest,
        };
        self.pixmap
            .draw_pixmap(0, 0, layer.as_ref(), &paint, Transform::identity(), None);
    }

    pub fn save_png(&self, path: impl AsRef<FsPath>) -> Result<()> {
        self.pixmap
            .save_png(path.as_ref())
            .map_err(|err| VisualiserError::Surface(err.to_string()))
    }

    fn paint(color: Color) -> Paint<'static> {
        let mut paint = Paint::default();
        paint.set_color(color);
        paint.anti_alias = true;
        paint
    }
}

impl Surface for Canvas {
    fn width(&self) -> u32 {
        self.pixmap.width()
    }

    fn height(&self) -> u32 {
        self.pixmap.height()
    }

    fn save(&mut self) {
        self.stack.push(self.transform);
    }

    fn restore(&mut self) {
        if let Some(transform) = self.stack.pop() {
            self.transform = transform;
        }
    }

    fn translate(&mut self, dx: f32, dy: f32) {
        self.transform = self.transform.pre_translate(dx, dy);
    }

    fn rotate(&mut self, radians: f32) {
        self.transform = self.transform.pre_rotate(radians.to_degrees());
    }

    fn clear(&mut self) {
        self.pixmap.fill(Color::TRANSPARENT);
    }

    fn fill_path(&mut self, path: &Path, color: Color) {
        let paint = Self::paint(color);
        self.pixmap
            .fill_path(path, &paint, FillRule::Winding, self.transform, None);
    }

    fn stroke_path(&mut self, path: &Path, color: Color, width: f32) {
        let paint = Self::paint(color);
        let stroke = Stroke {
            width,
            ..Stroke::default()
        };
        self.pixmap
            .stroke_path(path, &paint, &stroke, self.transform, None);
    }
}

fn polyline(points: impl IntoIterator<Item = (f32, f32)>, closed: bool) -> Option<Path> {
    let mut builder = PathBuilder::new();
    for (index, (x, y)) in points.into_iter().enumerate() {
        if index == 0 {
            builder.move_to(x, y);
        } else {
            builder.line_to(x, y);
        }
    }
    if closed {
        builder.close();
    }
    builder.finish()
}

/// Draws particles as one of the seven shape primitives.
#[derive(Debug, Default, Clone, Copy)]
pub struct ShapeRenderer;

impl ShapeRenderer {
    pub fn new() -> Self {
        Self
    }

    /// Paints `particle` in its own rotated frame centred on its position.
    pub fn draw<S: Surface>(&self, surface: &mut S, particle: &Particle) {
        let fill = Hsl::new(particle.hue, particle.saturation, particle.lightness)
            .to_color(particle.opacity);
        let outline = Hsl::new(
            (particle.hue + 30.0).rem_euclid(360.0),
            particle.saturation,
            (particle.lightness + 30.0).min(90.0),
        )
        .to_color(particle.opacity);
        let radius = particle.radius;

        surface.scoped(|surface| {
            surface.translate(particle.x, particle.y);
            surface.rotate(particle.rotation);

            match particle.shape {
                ShapeKind::Circle => {
                    if let Some(path) = PathBuilder::from_circle(0.0, 0.0, radius) {
                        surface.fill_path(&path, fill);
                    }
                }
                ShapeKind::Starburst => outlined(surface, starburst(radius), fill, outline),
                ShapeKind::Wave => outlined(surface, wave(radius, particle.detail), fill, outline),
                ShapeKind::Triangle => {
                    let points = [(0.0, -radius), (radius, radius), (-radius, radius)];
                    outlined(surface, polyline(points, true), fill, outline);
                }
                ShapeKind::Square => {
                    let points = [
                        (-radius, -radius),
                        (radius, -radius),
                        (radius, radius),
                        (-radius, radius),
                    ];
                    outlined(surface, polyline(points, true), fill, outline);
                }
                ShapeKind::Spiral => {
                    if let Some(path) = spiral(radius, particle.detail) {
                        surface.stroke_path(&path, outline, OUTLINE_WIDTH);
                    }
                }
                ShapeKind::Fractal => {
                    let branch_color = Hsl::new(
                        (particle.hue + 60.0).rem_euclid(360.0),
                        particle.saturation,
                        (particle.lightness + 20.0).min(90.0),
                    )
                    .to_color(particle.opacity);
                    branch(surface, radius * FRACTAL_SHRINK, FRACTAL_DEPTH, branch_color);
                }
            }
        });
    }
}

fn outlined<S: Surface>(surface: &mut S, path: Option<Path>, fill: Color, outline: Color) {
    if let Some(path) = path {
        surface.fill_path(&path, fill);
        surface.stroke_path(&path, outline, OUTLINE_WIDTH);
    }
}

fn starburst(radius: f32) -> Option<Path> {
    let points = (0..5).flat_map(|i| {
        let outer = (18.0 + i as f32 * 72.0).to_radians();
        let inner = (54.0 + i as f32 * 72.0).to_radians();
        [
            (radius * outer.cos(), radius * outer.sin()),
            (radius / 2.0 * inner.cos(), radius / 2.0 * inner.sin()),
        ]
    });
    polyline(points, true)
}

fn wave(radius: f32, detail: u32) -> Option<Path> {
    let frequency = 0.3 * detail as f32;
    let mut points = Vec::new();
    let mut x = -radius;
    while x <= radius {
        points.push((x, (x * frequency).sin() * radius * 0.5));
        x += WAVE_STEP;
    }
    points.push((radius, radius));
    points.push((-radius, radius));
    polyline(points, true)
}

fn spiral(radius: f32, detail: u32) -> Option<Path> {
    let turns = (3 + detail) as f32;
    let points = (0..SPIRAL_SAMPLES).map(|i| {
        let t = i as f32 / SPIRAL_SAMPLES as f32;
        let angle = t * turns * TAU;
        let r = radius * t;
        (r * angle.cos(), r * angle.sin())
    });
    polyline(points, false)
}

/// Recursive binary tree: one segment per branch, then both children in
/// their own saved frames.
fn branch<S: Surface>(surface: &mut S, length: f32, depth: u32, color: Color) {
    if depth == 0 {
        return;
    }

    if let Some(path) = polyline([(0.0, 0.0), (0.0, -length)], false) {
        surface.stroke_path(&path, color, BRANCH_WIDTH);
    }

    surface.translate(0.0, -length);
    for turn in [FRACTAL_SPREAD, -FRACTAL_SPREAD] {
        surface.scoped(|surface| {
            surface.rotate(turn);
            branch(surface, length * FRACTAL_SHRINK, depth - 1, color);
        });
    }
    surface.translate(0.0, length);
}

/// Frequency-bar renderer for the live spectrum variant.
#[derive(Debug, Default, Clone, Copy)]
pub struct BarRenderer;

impl BarRenderer {
    pub fn new() -> Self {
        Self
    }

    /// Clears the surface and draws one bar per magnitude bin, anchored to
    /// the bottom edge.
    pub fn draw<S: Surface>(&self, surface: &mut S, bins: &[u8]) {
        surface.clear();
        if bins.is_empty() {
            return;
        }

        let width = surface.width() as f32;
        let height = surface.height() as f32;
        let bar_width = width / bins.len() as f32 * 2.5;

        let mut x = 0.0;
        for &magnitude in bins {
            let bar_height = f32::from(magnitude) / 2.0;
            if bar_height > 0.0 {
                let red = magnitude.saturating_add(100);
                let top = height - bar_height;
                let points = [
                    (x, top),
                    (x + bar_width, top),
                    (x + bar_width, height),
                    (x, height),
                ];
                if let Some(path) = polyline(points, true) {
                    surface.fill_path(&path, Color::from_rgba8(red, 50, 150, 255));
                }
            }
            x += bar_width + 1.0;
        }
    }
}
