use std::f32::consts::TAU;

use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::{FeatureFrame, Particle, ShapeKind};

const BEAT_SPAWN_COUNT: usize = 30;
const VOLUME_SPAWN_SCALE: f32 = 15.0;

/// Turns feature frames into batches of new particles.
///
/// The generator is OS-seeded by default so no two runs look alike. Tests
/// and tools that want repeatable batches can inject their own generator.
#[derive(Debug)]
pub struct ParticleSpawner<R = StdRng> {
    rng: R,
}

impl ParticleSpawner<StdRng> {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_os_rng())
    }
}

impl Default for ParticleSpawner<StdRng> {
    fn default() -> Self {
        Self::new()
    }
}

/// Number of particles a frame emits.
pub fn spawn_count(frame: &FeatureFrame) -> usize {
    if frame.beat {
        BEAT_SPAWN_COUNT
    } else {
        (frame.volume * VOLUME_SPAWN_SCALE).floor().max(0.0) as usize + 1
    }
}

/// Hue shared by a batch before the per-particle jitter is added.
pub fn base_hue(frame: &FeatureFrame) -> f32 {
    (frame.mean_chroma() * 360.0 + frame.spectral_centroid * 150.0).rem_euclid(360.0)
}

/// Speed in pixels per tick.
pub fn particle_speed(frame: &FeatureFrame) -> f32 {
    frame.volume * 4.0 + if frame.beat { 5.0 } else { 2.0 }
}

pub fn particle_radius(frame: &FeatureFrame) -> f32 {
    frame.leading_timbre().abs() * 30.0 + frame.volume * 40.0 + 10.0
}

impl<R: Rng> ParticleSpawner<R> {
    pub fn with_rng(rng: R) -> Self {
        Self { rng }
    }

    /// Emits the particles for one tick. A missing frame spawns nothing.
    pub fn spawn(
        &mut self,
        frame: Option<&FeatureFrame>,
        width: f32,
        height: f32,
        now_ms: f64,
    ) -> Vec<Particle> {
        let Some(frame) = frame else {
            return Vec::new();
        };

        let count = spawn_count(frame);
        let hue = base_hue(frame);
        let saturation = 80.0 + self.rng.random::<f32>() * 20.0;
        let lightness = 55.0 + self.rng.random::<f32>() * 30.0;
        let speed = particle_speed(frame);
        let radius = particle_radius(frame);

        (0..count)
            .map(|_| {
                let angle = self.rng.random::<f32>() * TAU;
                Particle {
                    x: self.rng.random::<f32>() * width,
                    y: self.rng.random::<f32>() * height,
                    vx: angle.cos() * speed,
                    vy: angle.sin() * speed,
                    radius,
                    hue: hue + self.rng.random::<f32>() * 40.0,
                    saturation,
                    lightness,
                    opacity: 1.0,
                    shape: ShapeKind::ALL[self.rng.random_range(0..ShapeKind::ALL.len())],
                    rotation: self.rng.random::<f32>() * TAU,
                    detail: 3 + self.rng.random_range(0..4),
                    created_at_ms: now_ms,
                    lifespan_ms: 2000.0 + self.rng.random::<f64>() * 1800.0,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn spawner() -> ParticleSpawner {
        ParticleSpawner::with_rng(StdRng::seed_from_u64(7))
    }

    fn frame(volume: f32, beat: bool) -> FeatureFrame {
        FeatureFrame {
            volume,
            beat,
            ..Default::default()
        }
    }

    #[test]
    fn missing_frame_spawns_nothing() {
        assert!(spawner().spawn(None, 800.0, 600.0, 0.0).is_empty());
    }

    #[test]
    fn count_follows_volume_and_beat() {
        assert_eq!(spawn_count(&frame(0.0, false)), 1);
        assert_eq!(spawn_count(&frame(0.5, false)), 8);
        assert_eq!(spawn_count(&frame(1.0, false)), 16);
        assert_eq!(spawn_count(&frame(0.0, true)), 30);
        assert_eq!(spawn_count(&frame(1.0, true)), 30);

        let mut spawner = spawner();
        assert_eq!(spawner.spawn(Some(&frame(1.0, false)), 10.0, 10.0, 0.0).len(), 16);
        assert_eq!(spawner.spawn(Some(&frame(0.2, true)), 10.0, 10.0, 0.0).len(), 30);
    }

    #[test]
    fn hue_blends_chroma_and_centroid() {
        let frame = FeatureFrame {
            chroma: vec![0.5; 12],
            spectral_centroid: 1.0,
            ..Default::default()
        };
        assert!((base_hue(&frame) - 330.0).abs() < 1e-3);

        let wrapped = FeatureFrame {
            chroma: vec![1.0; 12],
            spectral_centroid: 0.4,
            ..Default::default()
        };
        assert!((base_hue(&wrapped) - 60.0).abs() < 1e-3);
    }

    #[test]
    fn derived_attributes_use_frame_values() {
        let frame = FeatureFrame {
            volume: 0.5,
            spectral_centroid: 0.2,
            chroma: vec![0.25; 12],
            timbre: vec![-2.0, 7.0],
            beat: false,
            onset: Some(0.9),
            tempo: Some(120.0),
        };
        let particles = spawner().spawn(Some(&frame), 640.0, 480.0, 1234.0);
        assert_eq!(particles.len(), 8);

        let base = 0.25 * 360.0 + 0.2 * 150.0;
        let saturation = particles[0].saturation;
        let lightness = particles[0].lightness;
        for p in &particles {
            assert_eq!(p.radius, 2.0 * 30.0 + 0.5 * 40.0 + 10.0);
            assert!((p.vx.hypot(p.vy) - 4.0).abs() < 1e-4);
            assert!(p.hue >= base && p.hue < base + 40.0);
            assert_eq!(p.saturation, saturation);
            assert_eq!(p.lightness, lightness);
            assert!((80.0..100.0).contains(&p.saturation));
            assert!((55.0..85.0).contains(&p.lightness));
            assert!((0.0..=640.0).contains(&p.x) && (0.0..=480.0).contains(&p.y));
            assert!((3..7).contains(&p.detail));
            assert!((0.0..TAU).contains(&p.rotation));
            assert!((2000.0..3800.0).contains(&p.lifespan_ms));
            assert_eq!(p.created_at_ms, 1234.0);
            assert_eq!(p.opacity, 1.0);
        }
    }

    #[test]
    fn beat_frames_move_faster() {
        let calm = particle_speed(&frame(0.5, false));
        let beat = particle_speed(&frame(0.5, true));
        assert_eq!(calm, 4.0);
        assert_eq!(beat, 7.0);
        assert_eq!(particle_radius(&FeatureFrame::default()), 0.5 * 30.0 + 0.3 * 40.0 + 10.0);
    }

    #[test]
    fn every_shape_kind_eventually_appears() {
        let mut spawner = spawner();
        let mut seen = HashSet::new();
        for tick in 0..20 {
            for p in spawner.spawn(Some(&frame(0.0, true)), 100.0, 100.0, tick as f64) {
                seen.insert(p.shape);
            }
        }
        assert_eq!(seen.len(), ShapeKind::ALL.len());
    }
}
