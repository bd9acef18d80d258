use crate::error::{TigraError, TigraResult};
use crate::geometry::{Side, VehicleGeometry};
use crate::wheels::WheelSensorSample;
use serde::Serialize;

/// Single-track equivalent of the measured wheel state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct VirtualBicycleState {
    /// rad, always inside the geometry's steer range
    pub steering_angle: f64,
    /// mean rear wheel rate, rad/s
    pub wheel_rate: f64,
}

impl VirtualBicycleState {
    /// Forward speed of the vehicle in m/s.
    pub fn forward_speed(&self, geometry: &VehicleGeometry) -> f64 {
        self.wheel_rate * geometry.wheel_radius()
    }
}

#[derive(Debug)]
pub struct StateEstimator {
    geometry: VehicleGeometry,
    state: VirtualBicycleState,
    fault_count: u64,
}

impl StateEstimator {
    pub fn new(geometry: VehicleGeometry) -> Self {
        Self {
            geometry,
            state: VirtualBicycleState::default(),
            fault_count: 0,
        }
    }

    /// Project the sample onto the single-track model.
    ///
    /// On a faulty sample the previous state is kept and the fault counter
    /// is incremented.
    pub fn update(&mut self, sample: &WheelSensorSample) -> TigraResult<VirtualBicycleState> {
        match self.estimate(sample) {
            Ok(state) => {
                self.state = state;
                Ok(state)
            }
            Err(err) => {
                self.fault_count += 1;
                Err(err)
            }
        }
    }

    /// Last valid estimate.
    pub fn state(&self) -> VirtualBicycleState {
        self.state
    }

    pub fn fault_count(&self) -> u64 {
        self.fault_count
    }

    fn estimate(&self, sample: &WheelSensorSample) -> TigraResult<VirtualBicycleState> {
        let left = self
            .geometry
            .wheel_to_virtual(Side::Left, sample.front_left_steer)
            .ok_or_else(|| {
                TigraError::SensorFault(format!(
                    "front left steer angle {} out of domain",
                    sample.front_left_steer
                ))
            })?;
        let right = self
            .geometry
            .wheel_to_virtual(Side::Right, sample.front_right_steer)
            .ok_or_else(|| {
                TigraError::SensorFault(format!(
                    "front right steer angle {} out of domain",
                    sample.front_right_steer
                ))
            })?;
        if !sample.rear_left_speed.is_finite() || !sample.rear_right_speed.is_finite() {
            return Err(TigraError::SensorFault(format!(
                "rear wheel speeds not finite: {} / {}",
                sample.rear_left_speed, sample.rear_right_speed
            )));
        }

        Ok(VirtualBicycleState {
            steering_angle: self.geometry.clamp_steer((left + right) / 2.0),
            wheel_rate: (sample.rear_left_speed + sample.rear_right_speed) / 2.0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn straight_sample() {
        let mut estimator = StateEstimator::new(VehicleGeometry::default());
        let state = estimator
            .update(&WheelSensorSample::new(0.0, 0.0, 4.0, 6.0))
            .unwrap();
        assert_eq!(state.steering_angle, 0.0);
        assert_relative_eq!(state.wheel_rate, 5.0);
        assert_relative_eq!(state.forward_speed(&VehicleGeometry::default()), 1.25);
    }

    #[test]
    fn ackermann_wheel_angles_average_to_virtual_angle() {
        let geometry = VehicleGeometry::default();
        let alpha = -0.2;
        let sample = WheelSensorSample::new(
            geometry.virtual_to_wheel(Side::Left, alpha),
            geometry.virtual_to_wheel(Side::Right, alpha),
            1.0,
            1.0,
        );
        let mut estimator = StateEstimator::new(geometry);
        let state = estimator.update(&sample).unwrap();
        assert_relative_eq!(state.steering_angle, alpha, epsilon = 1e-12);
    }

    #[test]
    fn averaging_tolerates_tracking_error() {
        let geometry = VehicleGeometry::default();
        let alpha = 0.25;
        let sample = WheelSensorSample::new(
            geometry.virtual_to_wheel(Side::Left, alpha) + 0.01,
            geometry.virtual_to_wheel(Side::Right, alpha) - 0.01,
            0.0,
            0.0,
        );
        let mut estimator = StateEstimator::new(geometry);
        let state = estimator.update(&sample).unwrap();
        assert_relative_eq!(state.steering_angle, alpha, epsilon = 5e-3);
    }

    #[test]
    fn estimate_is_clamped_to_steer_range() {
        let geometry = VehicleGeometry::default();
        let mut estimator = StateEstimator::new(geometry);
        let state = estimator
            .update(&WheelSensorSample::new(0.8, 0.8, 0.0, 0.0))
            .unwrap();
        assert_relative_eq!(state.steering_angle, geometry.max_steer_angle());
    }

    #[test]
    fn fault_keeps_last_valid_state() {
        let mut estimator = StateEstimator::new(VehicleGeometry::default());
        let good = estimator
            .update(&WheelSensorSample::new(0.1, 0.1, 2.0, 2.0))
            .unwrap();

        let err = estimator.update(&WheelSensorSample::new(f64::NAN, 0.1, 2.0, 2.0));
        assert!(matches!(err, Err(TigraError::SensorFault(_))));
        let err = estimator.update(&WheelSensorSample::new(0.1, 0.1, f64::INFINITY, 2.0));
        assert!(matches!(err, Err(TigraError::SensorFault(_))));
        // drives the left denominator negative
        let err = estimator.update(&WheelSensorSample::new(-1.3, 0.1, 2.0, 2.0));
        assert!(matches!(err, Err(TigraError::SensorFault(_))));

        assert_eq!(estimator.fault_count(), 3);
        assert_eq!(estimator.state(), good);
    }

    #[test]
    fn initial_state_is_zero() {
        let mut estimator = StateEstimator::new(VehicleGeometry::default());
        assert!(estimator
            .update(&WheelSensorSample::new(f64::NAN, f64::NAN, 0.0, 0.0))
            .is_err());
        assert_eq!(estimator.state(), VirtualBicycleState::default());
    }
}
