use rand::Rng;

/// Evenly spaced starting positions for Pastry's synthetic `[0,1]` proximity
/// coordinate, handed out to joiners in order; falls back to uniform random
/// once exhausted, per spec §4.8 and grounded in the original
/// `np.linspace(0, 1, EVENLY_SPACED_NODES)` seeding.
#[derive(Debug)]
pub struct PositionPool {
    evenly_spaced: Vec<f64>,
    next: usize,
}

impl PositionPool {
    /// `count` evenly spaced positions across `[0, 1]` inclusive, matching
    /// `numpy.linspace(0, 1, count)`'s endpoint-inclusive spacing.
    pub fn new(count: usize) -> Self {
        let evenly_spaced = if count <= 1 {
            vec![0.0; count]
        } else {
            let step = 1.0 / (count - 1) as f64;
            (0..count).map(|i| i as f64 * step).collect()
        };
        PositionPool { evenly_spaced, next: 0 }
    }

    pub fn take(&mut self) -> f64 {
        if self.next < self.evenly_spaced.len() {
            let position = self.evenly_spaced[self.next];
            self.next += 1;
            position
        } else {
            rand::thread_rng().gen_range(0.0..=1.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn evenly_spaced_positions_span_the_unit_interval() {
        let mut pool = PositionPool::new(3);
        assert_eq!(pool.take(), 0.0);
        assert_eq!(pool.take(), 0.5);
        assert_eq!(pool.take(), 1.0);
    }

    #[test]
    fn exhausted_pool_falls_back_to_random_in_range() {
        let mut pool = PositionPool::new(1);
        let _ = pool.take();
        let fallback = pool.take();
        assert!((0.0..=1.0).contains(&fallback));
    }
}
