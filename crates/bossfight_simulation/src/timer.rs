//! Countdown: атомарный таймер симуляции
//!
//! Все "ожидания" (длительность state, invulnerability, lifetime снаряда,
//! death animation) выражены countdown'ами, которые тикаются синхронно.
//! Имя Countdown, чтобы не конфликтовать с `bevy::prelude::Timer`.

/// Остаток ближе к нулю считается истёкшим (накопление f32 при dt = 1/60)
const EXPIRY_EPSILON: f32 = 1e-4;

/// Таймер обратного отсчёта
///
/// Инвариант: 0.0 ≤ remaining ≤ duration
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Countdown {
    duration: f32,
    remaining: f32,
}

impl Countdown {
    /// Запущенный таймер на `duration` секунд
    pub fn new(duration: f32) -> Self {
        let duration = sanitize(duration);
        Self {
            duration,
            remaining: duration,
        }
    }

    /// Перезапуск с новой длительностью
    pub fn set(&mut self, duration: f32) {
        self.duration = sanitize(duration);
        self.remaining = self.duration;
    }

    /// Продвинуть на `dt`, вернуть остаток
    pub fn tick(&mut self, dt: f32) -> f32 {
        let dt = sanitize(dt);
        if dt == 0.0 {
            return self.remaining;
        }
        self.remaining = (self.remaining - dt).max(0.0);
        if self.remaining <= EXPIRY_EPSILON {
            self.remaining = 0.0;
        }
        self.remaining
    }

    pub fn expired(&self) -> bool {
        self.remaining <= 0.0
    }

    pub fn is_running(&self) -> bool {
        !self.expired()
    }

    /// Перезапуск с последней заданной длительностью
    pub fn reset(&mut self) {
        self.remaining = self.duration;
    }

    /// Мгновенно истечь (длительность сохраняется для reset)
    pub fn clear(&mut self) {
        self.remaining = 0.0;
    }

    pub fn remaining(&self) -> f32 {
        self.remaining
    }

    pub fn duration(&self) -> f32 {
        self.duration
    }

    /// Доля прошедшего времени (0.0 → только запущен, 1.0 → истёк)
    pub fn progress(&self) -> f32 {
        if self.duration <= 0.0 {
            1.0
        } else {
            1.0 - self.remaining / self.duration
        }
    }
}

fn sanitize(value: f32) -> f32 {
    if value.is_finite() {
        value.max(0.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expires_exactly_on_fourth_tick() {
        let mut timer = Countdown::new(2.0);

        for _ in 0..3 {
            timer.tick(0.5);
            assert!(!timer.expired());
        }

        timer.tick(0.5);
        assert!(timer.expired());
        assert_eq!(timer.remaining(), 0.0);
    }

    #[test]
    fn test_sixtieth_steps_expire_on_frame_120() {
        let mut timer = Countdown::new(2.0);
        let dt = 1.0 / 60.0;

        for _ in 0..119 {
            timer.tick(dt);
        }
        assert!(!timer.expired());

        timer.tick(dt);
        assert!(timer.expired());
    }

    #[test]
    fn test_reset_restores_duration() {
        let mut timer = Countdown::new(1.0);
        timer.tick(0.75);
        assert_eq!(timer.remaining(), 0.25);

        timer.reset();
        assert_eq!(timer.remaining(), 1.0);
        assert_eq!(timer.progress(), 0.0);
    }

    #[test]
    fn test_default_is_expired() {
        let timer = Countdown::default();
        assert!(timer.expired());
        assert!(!timer.is_running());
    }

    #[test]
    fn test_invalid_inputs_clamped() {
        let mut timer = Countdown::new(-3.0);
        assert!(timer.expired());

        timer.set(f32::NAN);
        assert_eq!(timer.duration(), 0.0);

        timer.set(1.0);
        timer.tick(-5.0); // Отрицательный dt не продлевает таймер
        assert_eq!(timer.remaining(), 1.0);
    }

    #[test]
    fn test_zero_dt_does_not_expire_nearly_finished_timer() {
        let mut timer = Countdown::new(5e-5);
        assert!(timer.is_running());

        // Пауза (dt = 0) не двигает таймер, даже у самого нуля
        assert_eq!(timer.tick(0.0), 5e-5);
        assert!(timer.is_running());

        timer.tick(1.0 / 60.0);
        assert!(timer.expired());
    }

    #[test]
    fn test_clear_keeps_duration() {
        let mut timer = Countdown::new(0.5);
        timer.clear();
        assert!(timer.expired());
        assert_eq!(timer.duration(), 0.5);
    }
}
