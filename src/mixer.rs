use crate::geometry::VehicleGeometry;
use serde::Serialize;

/// Below this `tan(steer)` both rear wheels turn at the same rate.
const STRAIGHT_STEER_EPSILON: f64 = 1e-6;

/// Rear wheel rate setpoints, rad/s.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct DriveSetpoint {
    pub left: f64,
    pub right: f64,
}

/// Splits the commanded speed between the two driven rear wheels.
///
/// The turn radius comes from the *estimated* steering angle, not the
/// commanded one, so the drive follows where the front wheels actually point.
#[derive(Debug, Clone)]
pub struct MotionCommandMixer {
    geometry: VehicleGeometry,
}

impl MotionCommandMixer {
    pub fn new(geometry: VehicleGeometry) -> Self {
        Self { geometry }
    }

    pub fn mix(&self, commanded_speed: f64, estimated_steering_angle: f64) -> DriveSetpoint {
        let rotation_speed = commanded_speed / self.geometry.wheel_radius();
        let tan_steer = estimated_steering_angle.tan();
        if tan_steer.abs() < STRAIGHT_STEER_EPSILON {
            return DriveSetpoint {
                left: rotation_speed,
                right: rotation_speed,
            };
        }
        let radius = self.geometry.wheelbase() / tan_steer;
        let half_track_ratio = 0.5 * self.geometry.track_width() / radius;
        DriveSetpoint {
            left: rotation_speed * (1.0 - half_track_ratio),
            right: rotation_speed * (1.0 + half_track_ratio),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn straight_driving_is_symmetric() {
        let mixer = MotionCommandMixer::new(VehicleGeometry::default());
        let setpoint = mixer.mix(1.0, 0.0);
        assert_eq!(setpoint.left, 1.0 / 0.25);
        assert_eq!(setpoint.right, 1.0 / 0.25);

        let setpoint = mixer.mix(-0.7, 1e-9);
        assert_eq!(setpoint.left, setpoint.right);
        assert_eq!(setpoint.left, -0.7 / 0.25);
    }

    #[test]
    fn outer_wheel_is_faster() {
        let mixer = MotionCommandMixer::new(VehicleGeometry::default());
        let left_turn = mixer.mix(1.0, 0.2);
        assert!(left_turn.right > left_turn.left);
        let right_turn = mixer.mix(1.0, -0.2);
        assert!(right_turn.left > right_turn.right);
    }

    #[test]
    fn mean_rate_matches_commanded_speed() {
        let mixer = MotionCommandMixer::new(VehicleGeometry::default());
        let setpoint = mixer.mix(2.0, 0.3);
        assert_relative_eq!((setpoint.left + setpoint.right) / 2.0, 8.0, epsilon = 1e-12);
    }

    #[test]
    fn differential_follows_turn_radius() {
        let geometry = VehicleGeometry::default();
        let mixer = MotionCommandMixer::new(geometry);
        let steer = 0.1_f64;
        let setpoint = mixer.mix(1.0, steer);
        let radius = geometry.wheelbase() / steer.tan();
        assert_relative_eq!(setpoint.right, 4.0 * (1.0 + 0.4 / radius));
        assert_relative_eq!(setpoint.left, 4.0 * (1.0 - 0.4 / radius));
    }

    #[test]
    fn zero_speed_stops_both_wheels() {
        let mixer = MotionCommandMixer::new(VehicleGeometry::default());
        let setpoint = mixer.mix(0.0, 0.4);
        assert_eq!(setpoint.left, 0.0);
        assert_eq!(setpoint.right, 0.0);
    }
}
