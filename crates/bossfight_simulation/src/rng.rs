//! RandomStream: детерминистичный поток случайных чисел
//!
//! Один долгоживущий поток на encounter и по одному на каждого актора
//! (fork от encounter потока при spawn). Никакого глобального состояния:
//! одинаковый seed → одинаковая последовательность.

use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Примешивается к битам engine float, чтобы соседние значения давали далёкие seed'ы
const ENGINE_SEED_MIX: u64 = 0x9E37_79B9_7F4A_7C15;

#[derive(Debug, Clone)]
pub struct RandomStream {
    rng: ChaCha8Rng,
    seed: u64,
    draws: u64,
}

impl RandomStream {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            seed,
            draws: 0,
        }
    }

    /// Seed из "шумного" float движка (Random service, [0, 1))
    ///
    /// Воспроизводимость best-effort: зависит от того, что вернул движок.
    pub fn from_engine_float(value: f32) -> Self {
        let value = if value.is_finite() { value } else { 0.0 };
        Self::new(u64::from(value.to_bits()).wrapping_mul(ENGINE_SEED_MIX) ^ ENGINE_SEED_MIX)
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Сколько значений уже выдано (для отладки рассинхрона)
    pub fn draws(&self) -> u64 {
        self.draws
    }

    /// Равномерный float в [0, 1)
    pub fn next_float(&mut self) -> f32 {
        self.draws += 1;
        self.rng.gen::<f32>()
    }

    /// Целое в [lo, hi). Пустой диапазон → `lo` без продвижения потока.
    pub fn next_int(&mut self, lo: i32, hi: i32) -> i32 {
        if hi <= lo {
            return lo;
        }
        self.draws += 1;
        self.rng.gen_range(lo..hi)
    }

    /// Float в [lo, hi)
    pub fn next_range(&mut self, lo: f32, hi: f32) -> f32 {
        if hi <= lo {
            return lo;
        }
        lo + (hi - lo) * self.next_float()
    }

    /// true с вероятностью `probability`
    pub fn chance(&mut self, probability: f32) -> bool {
        self.next_float() < probability
    }

    /// Индекс по весам (непозитивные и нечисловые веса игнорируются)
    pub fn pick_weighted(&mut self, weights: &[f32]) -> Option<usize> {
        let usable = |w: f32| w.is_finite() && w > 0.0;
        let total: f32 = weights.iter().copied().filter(|w| usable(*w)).sum();
        if total <= 0.0 {
            return None;
        }

        let roll = self.next_float() * total;
        let mut cumulative = 0.0;
        let mut last_usable = None;
        for (index, weight) in weights.iter().copied().enumerate() {
            if !usable(weight) {
                continue;
            }
            cumulative += weight;
            last_usable = Some(index);
            if roll < cumulative {
                return Some(index);
            }
        }

        // roll == total из-за округления
        last_usable
    }

    /// Независимый дочерний поток (seed берётся из этого потока)
    pub fn fork(&mut self) -> RandomStream {
        self.draws += 1;
        RandomStream::new(self.rng.next_u64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_sequence() {
        let mut a = RandomStream::new(7);
        let mut b = RandomStream::new(7);

        for _ in 0..100 {
            assert_eq!(a.next_float(), b.next_float());
            assert_eq!(a.next_int(-5, 50), b.next_int(-5, 50));
        }
        assert_eq!(a.draws(), b.draws());
    }

    #[test]
    fn test_float_range() {
        let mut stream = RandomStream::new(1);
        for _ in 0..1000 {
            let value = stream.next_float();
            assert!((0.0..1.0).contains(&value), "value = {}", value);
        }
    }

    #[test]
    fn test_int_range_half_open() {
        let mut stream = RandomStream::new(2);
        let mut seen_lo = false;
        for _ in 0..500 {
            let value = stream.next_int(3, 6);
            assert!((3..6).contains(&value));
            seen_lo |= value == 3;
        }
        assert!(seen_lo);
    }

    #[test]
    fn test_empty_int_range_does_not_advance() {
        let mut stream = RandomStream::new(3);
        assert_eq!(stream.next_int(4, 4), 4);
        assert_eq!(stream.next_int(9, 2), 9);
        assert_eq!(stream.draws(), 0);
    }

    #[test]
    fn test_pick_weighted_skips_zero_weights() {
        let mut stream = RandomStream::new(4);
        for _ in 0..200 {
            let picked = stream.pick_weighted(&[0.0, 2.0, -1.0, 1.0]);
            assert!(matches!(picked, Some(1) | Some(3)));
        }
        assert_eq!(stream.pick_weighted(&[0.0, f32::NAN]), None);
    }

    #[test]
    fn test_fork_is_deterministic() {
        let mut parent_a = RandomStream::new(99);
        let mut parent_b = RandomStream::new(99);

        let mut child_a = parent_a.fork();
        let mut child_b = parent_b.fork();

        assert_eq!(child_a.seed(), child_b.seed());
        assert_eq!(child_a.next_float(), child_b.next_float());
    }

    #[test]
    fn test_engine_float_seed() {
        let a = RandomStream::from_engine_float(0.25);
        let b = RandomStream::from_engine_float(0.25);
        let c = RandomStream::from_engine_float(0.5);

        assert_eq!(a.seed(), b.seed());
        assert_ne!(a.seed(), c.seed());
    }
}
