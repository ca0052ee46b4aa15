//! Encounter config: лимиты, арена, типы акторов и волны (RON)

use bevy::math::Vec2;
use serde::Deserialize;

use super::waves::WaveDefinition;
use crate::ai::{presets, ActorDefinition, DefinitionRegistry};
use crate::error::DefinitionError;

/// Лимиты и флаги одного encounter'а
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EncounterSettings {
    /// Живых акторов одновременно (мёртвые в death animation не считаются)
    pub max_actors: usize,
    pub max_projectiles: usize,
    /// Частиц на тик
    pub particle_budget: u32,
    /// Искры на каждом попадании
    pub hit_sparks: bool,
    pub arena: Option<Arena>,
}

impl Default for EncounterSettings {
    fn default() -> Self {
        Self {
            max_actors: 32,
            max_projectiles: 64,
            particle_budget: 256,
            hit_sparks: true,
            arena: None,
        }
    }
}

/// Прямоугольник арены; min.y это пол
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Arena {
    pub min: (f32, f32),
    pub max: (f32, f32),
}

/// Актор ближе этого к краю арены касается пола/стены
const ARENA_CONTACT_EPSILON: f32 = 0.05;

impl Arena {
    pub fn new(min: Vec2, max: Vec2) -> Self {
        Self {
            min: (min.x, min.y),
            max: (max.x, max.y),
        }
    }

    pub fn min(&self) -> Vec2 {
        Vec2::new(self.min.0, self.min.1)
    }

    pub fn max(&self) -> Vec2 {
        Vec2::new(self.max.0, self.max.1)
    }

    pub fn clamp(&self, position: Vec2) -> Vec2 {
        position.clamp(self.min(), self.max())
    }

    pub fn contains(&self, position: Vec2) -> bool {
        self.clamp(position) == position
    }

    pub fn on_floor(&self, position: Vec2) -> bool {
        position.y <= self.min.1 + ARENA_CONTACT_EPSILON
    }

    pub fn at_wall(&self, position: Vec2) -> bool {
        position.x <= self.min.0 + ARENA_CONTACT_EPSILON || position.x >= self.max.0 - ARENA_CONTACT_EPSILON
    }
}

/// Полный encounter из RON файла
#[derive(Debug, Clone, Deserialize)]
pub struct EncounterConfig {
    pub name: String,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub settings: EncounterSettings,
    /// Типы акторов поверх встроенных presets
    #[serde(default)]
    pub actors: Vec<ActorDefinition>,
    #[serde(default)]
    pub waves: Vec<WaveDefinition>,
}

impl EncounterConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            seed: None,
            settings: EncounterSettings::default(),
            actors: Vec::new(),
            waves: Vec::new(),
        }
    }

    pub fn from_ron_str(source: &str) -> Result<Self, DefinitionError> {
        Ok(ron::from_str(source)?)
    }

    /// Presets + actors из конфига, проверенные вместе с волнами
    pub fn registry(&self) -> Result<DefinitionRegistry, DefinitionError> {
        let mut registry = presets::registry()?;
        for definition in &self.actors {
            registry.register(definition.clone())?;
        }
        registry.validate_references()?;

        for wave in &self.waves {
            if let Some(spawn) = wave.spawns.iter().find(|spawn| !registry.contains(&spawn.actor)) {
                return Err(DefinitionError::UnknownWaveActor {
                    wave: wave.name.clone(),
                    actor: spawn.actor.clone(),
                });
            }
        }

        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encounter::WaveTrigger;

    #[test]
    fn test_settings_defaults_fill_missing_fields() {
        let settings: EncounterSettings = ron::from_str("(max_actors: 4)").unwrap();
        assert_eq!(settings.max_actors, 4);
        assert_eq!(settings.max_projectiles, 64);
        assert!(settings.hit_sparks);
        assert!(settings.arena.is_none());
    }

    #[test]
    fn test_arena_clamp_and_contacts() {
        let arena = Arena::new(Vec2::new(-10.0, 0.0), Vec2::new(10.0, 8.0));

        assert_eq!(arena.clamp(Vec2::new(12.0, -3.0)), Vec2::new(10.0, 0.0));
        assert!(arena.contains(Vec2::new(0.0, 4.0)));
        assert!(arena.on_floor(Vec2::new(0.0, 0.0)));
        assert!(arena.at_wall(Vec2::new(-10.0, 3.0)));
        assert!(!arena.at_wall(Vec2::ZERO));
    }

    #[test]
    fn test_config_from_ron() {
        let source = r#"(
            name: "pit",
            seed: Some(9),
            settings: (max_projectiles: 8, arena: Some((min: (-5.0, 0.0), max: (5.0, 6.0)))),
            waves: [
                (name: "opening", trigger: AtTime(0.0), spawns: [(actor: "grunt", position: (1.0, 0.0))]),
                (name: "boss", trigger: WhenCleared, spawns: [(actor: "clap_boss", position: (0.0, 4.0))]),
            ],
        )"#;

        let config = EncounterConfig::from_ron_str(source).unwrap();
        assert_eq!(config.seed, Some(9));
        assert_eq!(config.settings.max_projectiles, 8);
        assert_eq!(config.waves[1].trigger, WaveTrigger::WhenCleared);
        assert!(config.registry().is_ok());
    }

    #[test]
    fn test_unknown_wave_actor_rejected() {
        let mut config = EncounterConfig::new("broken");
        config.waves.push(WaveDefinition {
            name: "ghosts".to_string(),
            trigger: WaveTrigger::AtTime(1.0),
            spawns: vec![crate::encounter::SpawnPoint::new("ghost", 0.0, 0.0)],
        });

        assert!(matches!(
            config.registry(),
            Err(DefinitionError::UnknownWaveActor { .. })
        ));
    }

    #[test]
    fn test_config_actor_cannot_shadow_preset() {
        let mut config = EncounterConfig::new("dupe");
        config.actors.push(presets::grunt());

        assert!(matches!(config.registry(), Err(DefinitionError::DuplicateActor(_))));
    }
}
