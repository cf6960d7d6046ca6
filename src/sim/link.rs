//! Link models.

use std::net::Ipv4Addr;
use std::time::Duration;

use rand::Rng;
use rand_chacha::ChaCha8Rng;

/// Outcome of handing one packet to the link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Delivered(Duration),
    Lost,
}

/// End-to-end packet delivery between two addresses
pub trait LinkModel {
    fn transmit(&mut self, source: Ipv4Addr, destination: Ipv4Addr, bytes: u32) -> Delivery;
}

/// Constant-delay link with optional random loss
#[derive(Debug, Clone)]
pub struct IdealLink {
    delay: Duration,
    loss_probability: f64,
    rng: ChaCha8Rng,
}

impl IdealLink {
    pub fn new(delay: Duration, loss_probability: f64, rng: ChaCha8Rng) -> Self {
        Self {
            delay,
            loss_probability: loss_probability.clamp(0.0, 1.0),
            rng,
        }
    }
}

impl LinkModel for IdealLink {
    fn transmit(&mut self, _source: Ipv4Addr, _destination: Ipv4Addr, _bytes: u32) -> Delivery {
        if self.loss_probability > 0.0 && self.rng.gen_bool(self.loss_probability) {
            return Delivery::Lost;
        }
        Delivery::Delivered(self.delay)
    }
}
