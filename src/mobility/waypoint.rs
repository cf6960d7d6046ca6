//! Random waypoint motion.
//!
//! A node starts at its initial position and moves in straight legs towards
//! uniformly drawn waypoints inside its region, pausing at each waypoint.
//! The first leg uses the initial speed drawn by the assigner; every later
//! waypoint and speed comes from the node's private generator.

use std::time::Duration;

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// Rectangular area, in meters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}

impl Region {
    pub fn new(x_min: f64, x_max: f64, y_min: f64, y_max: f64) -> Self {
        Self {
            x_min,
            x_max,
            y_min,
            y_max,
        }
    }

    /// Both ranges must be finite and non-empty
    pub fn validate(&self, parameter: &'static str) -> Result<(), ConfigError> {
        let finite = [self.x_min, self.x_max, self.y_min, self.y_max]
            .iter()
            .all(|v| v.is_finite());
        if !finite || self.x_min >= self.x_max || self.y_min >= self.y_max {
            return Err(ConfigError::invalid(
                parameter,
                format!(
                    "x [{}, {}] y [{}, {}] is not a valid area",
                    self.x_min, self.x_max, self.y_min, self.y_max
                ),
            ));
        }
        Ok(())
    }

    pub fn contains(&self, point: Vector) -> bool {
        point.x >= self.x_min && point.x <= self.x_max && point.y >= self.y_min && point.y <= self.y_max
    }
}

/// Planar position or velocity
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Vector {
    pub x: f64,
    pub y: f64,
}

impl Vector {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    fn distance_to(&self, other: Vector) -> f64 {
        ((other.x - self.x).powi(2) + (other.y - self.y).powi(2)).sqrt()
    }
}

#[derive(Debug, Clone, Copy)]
struct Leg {
    start: f64,
    from: Vector,
    to: Vector,
    speed: f64,
    /// Arrival time at `to`; infinite for a stationary node
    arrival: f64,
}

impl Leg {
    fn new(start: f64, from: Vector, to: Vector, speed: f64) -> Self {
        let distance = from.distance_to(to);
        let arrival = if speed > 0.0 {
            start + distance / speed
        } else {
            f64::INFINITY
        };
        Self {
            start,
            from,
            to,
            speed,
            arrival,
        }
    }

    fn position(&self, t: f64) -> Vector {
        if t >= self.arrival {
            return self.to;
        }
        if self.speed <= 0.0 || t <= self.start {
            return self.from;
        }
        let fraction = (t - self.start) / (self.arrival - self.start);
        Vector::new(
            self.from.x + (self.to.x - self.from.x) * fraction,
            self.from.y + (self.to.y - self.from.y) * fraction,
        )
    }

    fn velocity(&self, t: f64) -> Vector {
        if self.speed <= 0.0 || t < self.start || t >= self.arrival {
            return Vector::default();
        }
        let distance = self.from.distance_to(self.to);
        Vector::new(
            (self.to.x - self.from.x) / distance * self.speed,
            (self.to.y - self.from.y) / distance * self.speed,
        )
    }
}

/// Random waypoint process of one node
#[derive(Debug, Clone)]
pub struct RandomWaypoint {
    region: Region,
    max_speed: f64,
    pause: f64,
    initial_position: Vector,
    initial_speed: f64,
    rng: ChaCha8Rng,
    leg: Leg,
}

impl RandomWaypoint {
    /// Start a process at `initial_position`, heading for its first waypoint
    /// at `initial_speed`.
    pub fn new(
        region: Region,
        max_speed: f64,
        pause: Duration,
        initial_position: Vector,
        initial_speed: f64,
        mut rng: ChaCha8Rng,
    ) -> Self {
        let first = Self::waypoint(&region, &mut rng);
        let leg = Leg::new(0.0, initial_position, first, initial_speed);
        Self {
            region,
            max_speed,
            pause: pause.as_secs_f64(),
            initial_position,
            initial_speed,
            rng,
            leg,
        }
    }

    fn waypoint(region: &Region, rng: &mut ChaCha8Rng) -> Vector {
        Vector::new(
            rng.gen_range(region.x_min..region.x_max),
            rng.gen_range(region.y_min..region.y_max),
        )
    }

    pub fn initial_position(&self) -> Vector {
        self.initial_position
    }

    pub fn initial_speed(&self) -> f64 {
        self.initial_speed
    }

    pub fn region(&self) -> Region {
        self.region
    }

    /// Advance the process so the current leg covers `time`.
    ///
    /// Queries must be made in non-decreasing time order.
    pub fn advance_to(&mut self, time: Duration) {
        let t = time.as_secs_f64();
        loop {
            let departure = self.leg.arrival + self.pause;
            if !departure.is_finite() || t < departure {
                break;
            }
            let speed = if self.max_speed > 0.0 {
                self.rng.gen_range(0.0..self.max_speed)
            } else {
                0.0
            };
            let next = Self::waypoint(&self.region, &mut self.rng);
            let from = self.leg.to;
            self.leg = Leg::new(departure, from, next, speed);
        }
    }

    /// Position at `time`
    pub fn position(&mut self, time: Duration) -> Vector {
        self.advance_to(time);
        self.leg.position(time.as_secs_f64())
    }

    /// Velocity at `time`; zero while paused or stationary
    pub fn velocity(&mut self, time: Duration) -> Vector {
        self.advance_to(time);
        self.leg.velocity(time.as_secs_f64())
    }
}
