use crate::error::{TigraError, TigraResult};
use serde::Deserialize;
use std::f64::consts::FRAC_PI_2;

/// Denominators of the Ackermann mappings below this fraction of the
/// wheelbase are treated as out of the reachable steer range.
const DENOMINATOR_EPSILON: f64 = 1e-6;

const DEFAULT_WHEELBASE: f64 = 1.0;
const DEFAULT_TRACK_WIDTH: f64 = 0.8;
const DEFAULT_WHEEL_RADIUS: f64 = 0.25;
const DEFAULT_MAX_STEER_DEGREES: f64 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    fn sign(self) -> f64 {
        match self {
            Side::Left => 1.0,
            Side::Right => -1.0,
        }
    }
}

/// Raw geometry as it appears in the settings file.
#[derive(Deserialize, Debug, Clone)]
pub struct GeometryConfig {
    #[serde(default = "default_wheelbase")]
    pub wheelbase: f64,
    #[serde(default = "default_track_width")]
    pub track_width: f64,
    #[serde(default = "default_wheel_radius")]
    pub wheel_radius: f64,
    #[serde(default = "default_max_steer_angle")]
    pub max_steer_angle: f64,
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self {
            wheelbase: DEFAULT_WHEELBASE,
            track_width: DEFAULT_TRACK_WIDTH,
            wheel_radius: DEFAULT_WHEEL_RADIUS,
            max_steer_angle: default_max_steer_angle(),
        }
    }
}

fn default_wheelbase() -> f64 {
    DEFAULT_WHEELBASE
}

fn default_track_width() -> f64 {
    DEFAULT_TRACK_WIDTH
}

fn default_wheel_radius() -> f64 {
    DEFAULT_WHEEL_RADIUS
}

fn default_max_steer_angle() -> f64 {
    DEFAULT_MAX_STEER_DEGREES.to_radians()
}

/// Validated, immutable vehicle geometry.
///
/// Construction guarantees that both Ackermann mappings are defined for every
/// steering angle inside `±max_steer_angle`.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(try_from = "GeometryConfig")]
pub struct VehicleGeometry {
    wheelbase: f64,
    track_width: f64,
    wheel_radius: f64,
    max_steer_angle: f64,
}

impl VehicleGeometry {
    pub fn new(
        wheelbase: f64,
        track_width: f64,
        wheel_radius: f64,
        max_steer_angle: f64,
    ) -> TigraResult<Self> {
        fn positive(name: &str, value: f64) -> TigraResult<()> {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(TigraError::InvalidGeometry(format!(
                    "{} must be positive, got {}",
                    name, value
                )))
            }
        }
        positive("wheelbase", wheelbase)?;
        positive("track_width", track_width)?;
        positive("wheel_radius", wheel_radius)?;
        positive("max_steer_angle", max_steer_angle)?;
        if max_steer_angle >= FRAC_PI_2 {
            return Err(TigraError::InvalidGeometry(format!(
                "max_steer_angle must be below 90 degrees, got {} rad",
                max_steer_angle
            )));
        }
        // the inner wheel must not reach 90 degrees within the steer range
        if 0.5 * track_width * max_steer_angle.tan() >= wheelbase * (1.0 - DENOMINATOR_EPSILON) {
            return Err(TigraError::InvalidGeometry(format!(
                "max_steer_angle {} rad is unreachable for wheelbase {} and track width {}",
                max_steer_angle, wheelbase, track_width
            )));
        }
        Ok(Self {
            wheelbase,
            track_width,
            wheel_radius,
            max_steer_angle,
        })
    }

    pub fn wheelbase(&self) -> f64 {
        self.wheelbase
    }

    pub fn track_width(&self) -> f64 {
        self.track_width
    }

    pub fn wheel_radius(&self) -> f64 {
        self.wheel_radius
    }

    pub fn max_steer_angle(&self) -> f64 {
        self.max_steer_angle
    }

    pub fn clamp_steer(&self, angle: f64) -> f64 {
        angle.clamp(-self.max_steer_angle, self.max_steer_angle)
    }

    /// Forward Ackermann mapping: single-track angle to the wheel angle on `side`.
    ///
    /// The angle is clamped to the steer range first.
    pub fn virtual_to_wheel(&self, side: Side, virtual_angle: f64) -> f64 {
        let tan_alpha = self.clamp_steer(virtual_angle).tan();
        let half_track = 0.5 * self.track_width;
        (self.wheelbase * tan_alpha / (self.wheelbase - side.sign() * half_track * tan_alpha))
            .atan()
    }

    /// Inverse Ackermann mapping: measured wheel angle on `side` to the
    /// single-track angle.
    ///
    /// Returns `None` when the angle is not finite or lies outside the range
    /// where the mapping is defined.
    pub fn wheel_to_virtual(&self, side: Side, wheel_angle: f64) -> Option<f64> {
        if !wheel_angle.is_finite() {
            return None;
        }
        let tan_theta = wheel_angle.tan();
        let half_track = 0.5 * self.track_width;
        let denominator = self.wheelbase + side.sign() * half_track * tan_theta;
        if !denominator.is_finite() || denominator <= DENOMINATOR_EPSILON * self.wheelbase {
            return None;
        }
        Some((self.wheelbase * tan_theta / denominator).atan())
    }
}

impl Default for VehicleGeometry {
    fn default() -> Self {
        Self {
            wheelbase: DEFAULT_WHEELBASE,
            track_width: DEFAULT_TRACK_WIDTH,
            wheel_radius: DEFAULT_WHEEL_RADIUS,
            max_steer_angle: default_max_steer_angle(),
        }
    }
}

impl TryFrom<GeometryConfig> for VehicleGeometry {
    type Error = TigraError;

    fn try_from(config: GeometryConfig) -> Result<Self, Self::Error> {
        VehicleGeometry::new(
            config.wheelbase,
            config.track_width,
            config.wheel_radius,
            config.max_steer_angle,
        )
    }
}
