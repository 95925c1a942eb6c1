use rand::Rng;

use crate::ParticleConfig;

/// Six-colour neon palette particles draw their colour from.
pub const NEON_PALETTE: [[u8; 3]; 6] = [
    [0xff, 0x00, 0xff],
    [0x00, 0xff, 0xff],
    [0xff, 0x00, 0x80],
    [0x39, 0xff, 0x14],
    [0xff, 0xe6, 0x00],
    [0x7d, 0x5f, 0xff],
];

/// A decaying, drifting point.
#[derive(Debug, Clone, PartialEq)]
pub struct Particle {
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    /// Ticks lived so far.
    pub age: u32,
    pub max_life: u32,
    /// Index into [`NEON_PALETTE`].
    pub color: usize,
}

impl Particle {
    pub fn rgb(&self) -> [u8; 3] {
        NEON_PALETTE[self.color % NEON_PALETTE.len()]
    }

    /// Opacity fading linearly from 1 at birth to 0 at end of life.
    pub fn opacity(&self) -> f32 {
        if self.max_life == 0 {
            return 0.0;
        }
        (1.0 - self.age as f32 / self.max_life as f32).clamp(0.0, 1.0)
    }

    pub fn speed(&self) -> f32 {
        self.vx.hypot(self.vy)
    }

    /// A particle expires once its age reaches its lifetime.
    pub fn is_expired(&self) -> bool {
        self.age >= self.max_life
    }
}

/// Owns every live particle and the random source used to spawn them.
#[derive(Debug)]
pub struct ParticleSystem<R> {
    particles: Vec<Particle>,
    rng: R,
    min_life: u32,
    max_life: u32,
    drag: f32,
}

impl<R: Rng> ParticleSystem<R> {
    /// Creates an empty system. An empty life range is widened to a single
    /// tick so spawning always has a lifetime to draw.
    pub fn new(config: &ParticleConfig, rng: R) -> Self {
        let min_life = config.min_life.min(u32::MAX - 1);
        Self {
            particles: Vec::new(),
            rng,
            min_life,
            max_life: config.max_life.max(min_life.saturating_add(1)),
            drag: config.drag,
        }
    }

    /// Live particles in spawn order.
    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn clear(&mut self) {
        self.particles.clear();
    }

    /// Adds one particle at `origin` whose velocity components are drawn
    /// from `[-intensity / 2, intensity / 2]`.
    pub fn spawn(&mut self, origin: (f32, f32), intensity: f32) {
        let half = intensity.abs() / 2.0;
        let particle = Particle {
            x: origin.0,
            y: origin.1,
            vx: self.rng.gen_range(-half..=half),
            vy: self.rng.gen_range(-half..=half),
            age: 0,
            max_life: self.rng.gen_range(self.min_life..self.max_life),
            color: self.rng.gen_range(0..NEON_PALETTE.len()),
        };
        self.particles.push(particle);
    }

    /// Spawns `count` particles at the same origin.
    pub fn burst(&mut self, origin: (f32, f32), intensity: f32, count: usize) {
        for _ in 0..count {
            self.spawn(origin, intensity);
        }
    }

    /// Moves every particle one tick: drift, drag, age.
    pub fn advance(&mut self) {
        for particle in &mut self.particles {
            particle.x += particle.vx;
            particle.y += particle.vy;
            particle.vx *= self.drag;
            particle.vy *= self.drag;
            particle.age += 1;
        }
    }

    /// Drops particles that have reached their lifetime.
    pub fn cull(&mut self) {
        self.particles.retain(|p| !p.is_expired());
    }
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;

    fn system(seed: u64) -> ParticleSystem<StdRng> {
        ParticleSystem::new(&ParticleConfig::default(), StdRng::seed_from_u64(seed))
    }

    #[test]
    fn spawn_respects_ranges() {
        let mut particles = system(7);
        particles.burst((50.0, 20.0), 0.8, 500);

        assert_eq!(particles.len(), 500);
        for p in particles.particles() {
            assert_eq!((p.x, p.y), (50.0, 20.0));
            assert!(p.vx.abs() <= 0.4 && p.vy.abs() <= 0.4);
            assert!((60..120).contains(&p.max_life));
            assert!(p.color < NEON_PALETTE.len());
            assert_eq!(p.age, 0);
        }
    }

    #[test]
    fn unvalidated_life_range_still_spawns() {
        let config = ParticleConfig {
            min_life: u32::MAX,
            max_life: 0,
            ..ParticleConfig::default()
        };
        let mut particles = ParticleSystem::new(&config, StdRng::seed_from_u64(2));
        particles.spawn((0.0, 0.0), 0.8);
        assert_eq!(particles.particles()[0].max_life, u32::MAX - 1);
    }

    #[test]
    fn advance_ages_and_drags() {
        let mut particles = system(1);
        particles.spawn((0.0, 0.0), 0.8);
        let initial = particles.particles()[0].clone();

        for k in 1..=10u32 {
            particles.advance();
            let p = &particles.particles()[0];
            assert_eq!(p.age, k);
            let expected = initial.speed() * 0.98f32.powi(k as i32);
            assert!((p.speed() - expected).abs() < 1e-5);
        }
    }

    #[test]
    fn advance_moves_by_velocity() {
        let mut particles = system(3);
        particles.spawn((10.0, 10.0), 0.8);
        let before = particles.particles()[0].clone();

        particles.advance();
        let after = &particles.particles()[0];
        assert!((after.x - (before.x + before.vx)).abs() < 1e-6);
        assert!((after.y - (before.y + before.vy)).abs() < 1e-6);
    }

    #[test]
    fn cull_removes_exactly_at_max_life() {
        let mut particles = system(11);
        particles.spawn((0.0, 0.0), 0.8);
        let life = particles.particles()[0].max_life;

        for _ in 0..life - 1 {
            particles.advance();
            particles.cull();
        }
        assert_eq!(particles.len(), 1);
        assert_eq!(particles.particles()[0].age, life - 1);

        particles.advance();
        particles.cull();
        assert!(particles.is_empty());
    }

    #[test]
    fn opacity_fades_linearly() {
        let mut p = Particle {
            x: 0.0,
            y: 0.0,
            vx: 0.0,
            vy: 0.0,
            age: 0,
            max_life: 100,
            color: 0,
        };
        assert_eq!(p.opacity(), 1.0);
        p.age = 25;
        assert!((p.opacity() - 0.75).abs() < 1e-6);
        p.age = 100;
        assert_eq!(p.opacity(), 0.0);
    }

    #[test]
    fn zero_intensity_spawns_stationary_particles() {
        let mut particles = system(5);
        particles.spawn((1.0, 1.0), 0.0);
        let p = &particles.particles()[0];
        assert_eq!((p.vx, p.vy), (0.0, 0.0));
    }
}
