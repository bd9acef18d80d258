use crate::error::{TigraError, TigraResult};
use crate::geometry::{Side, VehicleGeometry};
use serde::{Deserialize, Serialize};

const DEFAULT_STEER_GAIN: f64 = 10.0;
const DEFAULT_STEERING_RATIO: f64 = 1.0;

#[derive(Deserialize, Debug, Clone)]
pub struct SteeringConfig {
    /// proportional gain from angle error (rad) to steer joint velocity (rad/s)
    #[serde(default = "default_steer_gain")]
    pub steer_gain: f64,
    /// angular request (rad/s) to single-track steering angle (rad)
    #[serde(default = "default_steering_ratio")]
    pub steering_ratio: f64,
    /// rad/s limit on the single-track target, `None` disables limiting
    #[serde(default)]
    pub max_steering_rate: Option<f64>,
}

impl Default for SteeringConfig {
    fn default() -> Self {
        Self {
            steer_gain: DEFAULT_STEER_GAIN,
            steering_ratio: DEFAULT_STEERING_RATIO,
            max_steering_rate: None,
        }
    }
}

impl SteeringConfig {
    pub fn validate(&self) -> TigraResult<()> {
        if !(self.steer_gain.is_finite() && self.steer_gain > 0.0) {
            return Err(TigraError::InvalidConfig(format!(
                "steering.steer_gain must be positive, got {}",
                self.steer_gain
            )));
        }
        if !self.steering_ratio.is_finite() {
            return Err(TigraError::InvalidConfig(format!(
                "steering.steering_ratio must be finite, got {}",
                self.steering_ratio
            )));
        }
        match self.max_steering_rate {
            Some(rate) if !(rate.is_finite() && rate > 0.0) => Err(TigraError::InvalidConfig(
                format!("steering.max_steering_rate must be positive, got {}", rate),
            )),
            _ => Ok(()),
        }
    }
}

fn default_steer_gain() -> f64 {
    DEFAULT_STEER_GAIN
}

fn default_steering_ratio() -> f64 {
    DEFAULT_STEERING_RATIO
}

/// Steer joint velocity setpoints, rad/s.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SteerSetpoint {
    pub left: f64,
    pub right: f64,
}

/// Limits how fast the single-track target may move.
#[derive(Debug, Clone, Copy)]
struct RateLimiter {
    max_rate: f64,
    current: f64,
}

impl RateLimiter {
    fn step(&mut self, target: f64, dt: f64) -> f64 {
        let max_increment = self.max_rate * dt.max(0.0);
        self.current += (target - self.current).clamp(-max_increment, max_increment);
        self.current
    }
}

/// Proportional position loop on the two front steer joints.
#[derive(Debug, Clone)]
pub struct SteeringServo {
    geometry: VehicleGeometry,
    gain: f64,
    rate_limiter: Option<RateLimiter>,
}

impl SteeringServo {
    pub fn new(geometry: VehicleGeometry, config: &SteeringConfig) -> Self {
        Self {
            geometry,
            gain: config.steer_gain,
            rate_limiter: config
                .max_steering_rate
                .filter(|rate| rate.is_finite() && *rate > 0.0)
                .map(|max_rate| RateLimiter {
                    max_rate,
                    current: 0.0,
                }),
        }
    }

    /// Per-wheel Ackermann targets for a single-track angle, `(left, right)`.
    pub fn wheel_targets(&self, steering_angle: f64) -> (f64, f64) {
        (
            self.geometry.virtual_to_wheel(Side::Left, steering_angle),
            self.geometry.virtual_to_wheel(Side::Right, steering_angle),
        )
    }

    /// Compute steer joint velocities.
    ///
    /// `dt` is only used by the rate limiter.
    pub fn update(
        &mut self,
        commanded_angle: f64,
        measured_left: f64,
        measured_right: f64,
        dt: f64,
    ) -> SteerSetpoint {
        let angle = match self.rate_limiter.as_mut() {
            Some(limiter) => limiter.step(commanded_angle, dt),
            None => commanded_angle,
        };
        let (target_left, target_right) = self.wheel_targets(angle);
        SteerSetpoint {
            left: self.gain * (target_left - measured_left),
            right: self.gain * (target_right - measured_right),
        }
    }
}
