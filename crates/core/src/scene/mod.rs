use rand::{rngs::StdRng, Rng, SeedableRng};
use tiny_skia::{ColorU8, GradientStop, LinearGradient, Pixmap, Point, SpreadMode, Transform};

use crate::{render::Hsl, Canvas, Surface};

/// Hue advance of the background per tick, in degrees.
const HUE_STEP: u64 = 6;
const GRAIN_ALPHA_BASE: f64 = 50.0;
const GRAIN_FLICKER: f64 = 40.0;
const GRAIN_FLICKER_RATE: f64 = 0.08;

/// Paints the layers that sit beneath the particles: a hue-cycling
/// vertical gradient and a flickering grain texture.
#[derive(Debug)]
pub struct SceneCompositor<R = StdRng> {
    rng: R,
    grain: Option<Pixmap>,
    grain_opacity: f32,
}

impl SceneCompositor<StdRng> {
    pub fn new(grain_opacity: f32) -> Self {
        Self::with_rng(StdRng::from_os_rng(), grain_opacity)
    }
}

/// Hue rotation of the background at `tick`, wrapped to `[0, 360)`.
pub fn gradient_shift(tick: u64) -> f32 {
    ((tick % (360 / HUE_STEP)) * HUE_STEP) as f32
}

/// The five gradient stops for `tick`, spaced a quarter turn apart.
pub fn gradient_stops(tick: u64) -> [(f32, Hsl); 5] {
    let shift = gradient_shift(tick);
    let stop = |offset: f32, saturation: f32, lightness: f32| {
        Hsl::new((shift + offset) % 360.0, saturation, lightness)
    };
    [
        (0.0, stop(0.0, 90.0, 30.0)),
        (0.25, stop(90.0, 95.0, 35.0)),
        (0.5, stop(180.0, 90.0, 30.0)),
        (0.75, stop(270.0, 95.0, 35.0)),
        (1.0, stop(0.0, 90.0, 30.0)),
    ]
}

/// Alpha of every grain pixel at wall-clock time `now_ms`.
pub fn grain_alpha(now_ms: f64) -> u8 {
    let flicker = (GRAIN_FLICKER * (now_ms * GRAIN_FLICKER_RATE).sin()).floor();
    (GRAIN_ALPHA_BASE + flicker).clamp(0.0, 255.0) as u8
}

impl<R: Rng> SceneCompositor<R> {
    pub fn with_rng(rng: R, grain_opacity: f32) -> Self {
        Self {
            rng,
            grain: None,
            grain_opacity,
        }
    }

    /// Covers the whole surface with the background gradient for `tick`.
    pub fn paint_background(&self, canvas: &mut Canvas, tick: u64) {
        let height = canvas.height() as f32;
        let stops = gradient_stops(tick)
            .into_iter()
            .map(|(position, hsl)| GradientStop::new(position, hsl.to_color(1.0)))
            .collect();

        match LinearGradient::new(
            Point::from_xy(0.0, 0.0),
            Point::from_xy(0.0, height),
            stops,
            SpreadMode::Pad,
            Transform::identity(),
        ) {
            Some(shader) => canvas.paint_shader(shader),
            None => tracing::warn!(height, "skipping degenerate background gradient"),
        }
    }

    /// Regenerates the grain texture and composites it over the surface.
    pub fn paint_grain(&mut self, canvas: &mut Canvas, now_ms: f64) {
        let (width, height) = (canvas.width(), canvas.height());
        let stale = self
            .grain
            .as_ref()
            .map(|grain| grain.width() != width || grain.height() != height)
            .unwrap_or(true);
        if stale {
            self.grain = Pixmap::new(width, height);
        }
        let Some(grain) = self.grain.as_mut() else {
            return;
        };

        let alpha = grain_alpha(now_ms);
        for pixel in grain.pixels_mut() {
            let shade = self.rng.random_range(0..255u8);
            *pixel = ColorU8::from_rgba(shade, shade, shade, alpha).premultiply();
        }

        canvas.draw_layer(grain, self.grain_opacity);
    }

    /// Drops the cached grain buffer.
    pub fn release(&mut self) {
        self.grain = None;
    }
}
