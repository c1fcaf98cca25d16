//! Fabricated packet loss for exercising recovery paths.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::core::SocketConfig;

/// Drops inbound packets at random with a fixed probability.
#[derive(Debug, Clone)]
pub struct PacketDropper {
    rate: f64,
    rng: StdRng,
}

impl PacketDropper {
    /// Create a dropper with entropy-seeded randomness. `rate` is clamped to
    /// `[0, 1]`.
    pub fn new(rate: f32) -> Self {
        Self::with_rng(rate, StdRng::from_entropy())
    }

    /// Create a dropper with a fixed seed, for reproducible runs.
    pub fn with_seed(rate: f32, seed: u64) -> Self {
        Self::with_rng(rate, StdRng::seed_from_u64(seed))
    }

    /// Create a dropper using the socket's fabricated drop rate.
    pub fn from_config(config: &SocketConfig) -> Self {
        Self::new(config.fabricated_packet_drop_rate)
    }

    fn with_rng(rate: f32, rng: StdRng) -> Self {
        let rate = if rate.is_finite() {
            (rate as f64).clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self { rate, rng }
    }

    /// Probability that a packet is dropped.
    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Decide the fate of one packet.
    pub fn should_drop(&mut self) -> bool {
        self.rate > 0.0 && self.rng.gen_bool(self.rate)
    }
}
