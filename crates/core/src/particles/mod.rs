use std::fmt;

use serde::Deserialize;

/// Geometric primitive a particle is drawn as.
///
/// Deserialises from its name; unrecognised names become [`ShapeKind::Circle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(from = "String")]
pub enum ShapeKind {
    Circle,
    Starburst,
    Wave,
    Triangle,
    Square,
    Spiral,
    Fractal,
}

impl ShapeKind {
    pub const ALL: [ShapeKind; 7] = [
        ShapeKind::Circle,
        ShapeKind::Starburst,
        ShapeKind::Wave,
        ShapeKind::Triangle,
        ShapeKind::Square,
        ShapeKind::Spiral,
        ShapeKind::Fractal,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ShapeKind::Circle => "circle",
            ShapeKind::Starburst => "starburst",
            ShapeKind::Wave => "wave",
            ShapeKind::Triangle => "triangle",
            ShapeKind::Square => "square",
            ShapeKind::Spiral => "spiral",
            ShapeKind::Fractal => "fractal",
        }
    }

    /// Parses a shape name, treating anything unknown as a circle.
    pub fn from_name_or_circle(name: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(name.trim()))
            .unwrap_or(ShapeKind::Circle)
    }
}

impl From<String> for ShapeKind {
    fn from(name: String) -> Self {
        Self::from_name_or_circle(&name)
    }
}

impl fmt::Display for ShapeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One short-lived decorative shape.
///
/// Positions are in surface pixels, velocities in pixels per tick and times
/// in milliseconds on the driver's clock.
#[derive(Debug, Clone, PartialEq)]
pub struct Particle {
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub radius: f32,
    pub hue: f32,
    pub saturation: f32,
    pub lightness: f32,
    pub opacity: f32,
    pub shape: ShapeKind,
    pub rotation: f32,
    pub detail: u32,
    pub created_at_ms: f64,
    pub lifespan_ms: f64,
}

impl Particle {
    /// Moment the particle fades out completely.
    pub fn expires_at_ms(&self) -> f64 {
        self.created_at_ms + self.lifespan_ms
    }

    /// Linear fade from 1 at creation to 0 at expiry.
    pub fn opacity_at(&self, now_ms: f64) -> f32 {
        (1.0 - (now_ms - self.created_at_ms) / self.lifespan_ms) as f32
    }
}

/// Owns the live particle set and advances it once per tick.
#[derive(Debug, Default)]
pub struct ParticleSimulator {
    particles: Vec<Particle>,
    capacity: Option<usize>,
}

impl ParticleSimulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulator that recycles its oldest particles once `capacity` is
    /// exceeded.
    pub fn with_capacity_limit(capacity: Option<usize>) -> Self {
        Self {
            particles: Vec::new(),
            capacity,
        }
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    /// Releases every live particle.
    pub fn clear(&mut self) {
        self.particles.clear();
    }

    /// Appends freshly spawned particles in emission order.
    pub fn extend(&mut self, spawned: impl IntoIterator<Item = Particle>) {
        self.particles.extend(spawned);

        if let Some(capacity) = self.capacity {
            if self.particles.len() > capacity {
                let overflow = self.particles.len() - capacity;
                self.particles.drain(0..overflow);
            }
        }
    }

    /// Moves every particle one step, bounces it off the surface edges and
    /// drops the ones whose lifespan has elapsed.
    pub fn tick(&mut self, width: f32, height: f32, now_ms: f64) {
        self.particles.retain_mut(|particle| {
            particle.x += particle.vx;
            particle.y += particle.vy;

            if particle.x < 0.0 || particle.x > width {
                particle.vx = -particle.vx;
            }
            if particle.y < 0.0 || particle.y > height {
                particle.vy = -particle.vy;
            }

            if now_ms >= particle.expires_at_ms() {
                return false;
            }

            particle.opacity = particle.opacity_at(now_ms);
            true
        });
    }
}
