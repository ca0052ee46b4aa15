//! Effect cues: частицы попаданий, рёв босса, camera shake
//!
//! Симуляция ничего не рисует: states и director производят `EffectCue`,
//! хост получает их через `EffectEmitter`.
//! Частицы ограничены бюджетом на тик; bursts сверх бюджета отбрасываются
//! (у движка фиксированные particle буферы).

use bevy::math::Vec2;
use serde::Deserialize;

use crate::actor::Facing;
use crate::rng::RandomStream;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub enum ParticleStyle {
    Sparks,
    Dust,
    Smoke,
    Debris,
    Flash,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParticleBurst {
    pub position: Vec2,
    pub direction: Vec2,
    pub count: u32,
    pub lifetime: f32,
    pub style: ParticleStyle,
}

/// Fire-and-forget запрос эффекта
#[derive(Debug, Clone, PartialEq)]
pub enum EffectCue {
    Particles(ParticleBurst),
    Sound { clip: String, volume: f32 },
    CameraShake { intensity: f32, duration: f32 },
}

impl EffectCue {
    pub fn sound(clip: impl Into<String>, volume: f32) -> Self {
        Self::Sound {
            clip: clip.into(),
            volume,
        }
    }

    pub fn shake(intensity: f32, duration: f32) -> Self {
        Self::CameraShake {
            intensity,
            duration,
        }
    }
}

/// Приёмник cues на стороне хоста (particles, audio, camera)
pub trait EffectEmitter {
    fn spawn_particle_burst(&mut self, burst: &ParticleBurst);
    fn play_sound(&mut self, clip: &str, volume: f32);
    fn shake_camera(&mut self, intensity: f32, duration: f32);
}

fn default_volume() -> f32 {
    1.0
}

/// Cue из данных (state или phase)
///
/// Offset и direction заданы для актора, смотрящего вправо; при Facing::Left
/// `x` зеркалится.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub enum CueSpec {
    Particles {
        #[serde(default)]
        offset: (f32, f32),
        direction: (f32, f32),
        count: u32,
        lifetime: f32,
        style: ParticleStyle,
        /// Случайный поворот `direction`, ± радианы
        #[serde(default)]
        jitter: f32,
    },
    Sound {
        clip: String,
        #[serde(default = "default_volume")]
        volume: f32,
    },
    Shake {
        intensity: f32,
        duration: f32,
    },
}

impl CueSpec {
    pub fn particles(direction: (f32, f32), count: u32, lifetime: f32, style: ParticleStyle) -> Self {
        Self::Particles {
            offset: (0.0, 0.0),
            direction,
            count,
            lifetime,
            style,
            jitter: 0.0,
        }
    }

    pub fn sound(clip: impl Into<String>) -> Self {
        Self::Sound {
            clip: clip.into(),
            volume: default_volume(),
        }
    }

    pub fn shake(intensity: f32, duration: f32) -> Self {
        Self::Shake {
            intensity,
            duration,
        }
    }

    /// Конкретный cue в точке `origin`
    pub fn resolve(&self, origin: Vec2, facing: Facing, rng: &mut RandomStream) -> EffectCue {
        match self {
            CueSpec::Particles {
                offset,
                direction,
                count,
                lifetime,
                style,
                jitter,
            } => {
                let sign = facing.sign();
                let mut direction = Vec2::new(direction.0 * sign, direction.1);
                if *jitter > 0.0 {
                    let angle = rng.next_range(-jitter, *jitter);
                    direction = Vec2::from_angle(angle).rotate(direction);
                }
                EffectCue::Particles(ParticleBurst {
                    position: origin + Vec2::new(offset.0 * sign, offset.1),
                    direction,
                    count: *count,
                    lifetime: *lifetime,
                    style: *style,
                })
            }
            CueSpec::Sound { clip, volume } => EffectCue::sound(clip.clone(), *volume),
            CueSpec::Shake {
                intensity,
                duration,
            } => EffectCue::shake(*intensity, *duration),
        }
    }
}

/// Per-tick particle budget
#[derive(Debug, Clone)]
pub struct EffectBudget {
    particle_limit: u32,
    particles_used: u32,
    dropped: u64,
}

impl EffectBudget {
    pub fn new(particle_limit: u32) -> Self {
        Self {
            particle_limit,
            particles_used: 0,
            dropped: 0,
        }
    }

    pub fn begin_tick(&mut self) {
        self.particles_used = 0;
    }

    /// Зарезервировать место под burst; сверх бюджета → burst отброшен
    pub fn admit(&mut self, burst: &ParticleBurst) -> bool {
        let wanted = self.particles_used.saturating_add(burst.count);
        if wanted > self.particle_limit {
            self.dropped += 1;
            return false;
        }
        self.particles_used = wanted;
        true
    }

    pub fn particles_used(&self) -> u32 {
        self.particles_used
    }

    /// Bursts dropped over the budget's lifetime
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

/// Отправить cues хосту по порядку; возвращает сколько доставлено
pub fn dispatch<E>(cues: impl IntoIterator<Item = EffectCue>, emitter: &mut E, budget: &mut EffectBudget) -> usize
where
    E: EffectEmitter + ?Sized,
{
    let mut delivered = 0;
    for cue in cues {
        match cue {
            EffectCue::Particles(burst) => {
                if !budget.admit(&burst) {
                    crate::log(&format!(
                        "✨ Particle burst dropped ({} particles, budget {}/{})",
                        burst.count, budget.particles_used, budget.particle_limit
                    ));
                    continue;
                }
                emitter.spawn_particle_burst(&burst);
            }
            EffectCue::Sound { clip, volume } => {
                emitter.play_sound(&clip, volume.clamp(0.0, 1.0));
            }
            EffectCue::CameraShake {
                intensity,
                duration,
            } => {
                emitter.shake_camera(intensity.max(0.0), duration.max(0.0));
            }
        }
        delivered += 1;
    }
    delivered
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        bursts: Vec<ParticleBurst>,
        sounds: Vec<(String, f32)>,
        shakes: Vec<(f32, f32)>,
    }

    impl EffectEmitter for Recorder {
        fn spawn_particle_burst(&mut self, burst: &ParticleBurst) {
            self.bursts.push(burst.clone());
        }

        fn play_sound(&mut self, clip: &str, volume: f32) {
            self.sounds.push((clip.to_string(), volume));
        }

        fn shake_camera(&mut self, intensity: f32, duration: f32) {
            self.shakes.push((intensity, duration));
        }
    }

    fn burst(count: u32) -> EffectCue {
        EffectCue::Particles(ParticleBurst {
            position: Vec2::ZERO,
            direction: Vec2::Y,
            count,
            lifetime: 0.5,
            style: ParticleStyle::Sparks,
        })
    }

    #[test]
    fn test_budget_drops_newest_burst() {
        let mut recorder = Recorder::default();
        let mut budget = EffectBudget::new(50);

        let delivered = dispatch(vec![burst(30), burst(30), burst(20)], &mut recorder, &mut budget);

        // 30 проходит, второй 30 не влезает (60 > 50), 20 влезает (50)
        assert_eq!(delivered, 2);
        assert_eq!(recorder.bursts.len(), 2);
        assert_eq!(budget.particles_used(), 50);
        assert_eq!(budget.dropped(), 1);

        budget.begin_tick();
        assert_eq!(budget.particles_used(), 0);
    }

    #[test]
    fn test_sounds_and_shakes_bypass_budget() {
        let mut recorder = Recorder::default();
        let mut budget = EffectBudget::new(0);

        dispatch(
            vec![EffectCue::sound("roar", 3.0), EffectCue::shake(-1.0, 0.4)],
            &mut recorder,
            &mut budget,
        );

        assert_eq!(recorder.sounds, vec![("roar".to_string(), 1.0)]);
        assert_eq!(recorder.shakes, vec![(0.0, 0.4)]);
    }

    #[test]
    fn test_cue_mirrors_for_left_facing() {
        let mut rng = RandomStream::new(1);
        let spec = CueSpec::Particles {
            offset: (1.0, 0.5),
            direction: (1.0, 0.0),
            count: 8,
            lifetime: 0.3,
            style: ParticleStyle::Dust,
            jitter: 0.0,
        };

        let EffectCue::Particles(burst) = spec.resolve(Vec2::new(10.0, 0.0), Facing::Left, &mut rng) else {
            panic!("expected particles");
        };
        assert_eq!(burst.position, Vec2::new(9.0, 0.5));
        assert_eq!(burst.direction, Vec2::new(-1.0, 0.0));
    }

    #[test]
    fn test_jitter_keeps_direction_length() {
        let mut rng = RandomStream::new(5);
        let spec = CueSpec::Particles {
            offset: (0.0, 0.0),
            direction: (0.0, 2.0),
            count: 4,
            lifetime: 0.3,
            style: ParticleStyle::Sparks,
            jitter: 0.5,
        };

        for _ in 0..20 {
            let EffectCue::Particles(burst) = spec.resolve(Vec2::ZERO, Facing::Right, &mut rng) else {
                panic!("expected particles");
            };
            assert!((burst.direction.length() - 2.0).abs() < 1e-4);
        }
    }
}
