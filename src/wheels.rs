use serde::{Deserialize, Serialize};

/// Raw joint readings taken once per tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WheelSensorSample {
    /// rad
    pub front_left_steer: f64,
    /// rad
    pub front_right_steer: f64,
    /// rad/s
    pub rear_left_speed: f64,
    /// rad/s
    pub rear_right_speed: f64,
}

impl WheelSensorSample {
    pub fn new(
        front_left_steer: f64,
        front_right_steer: f64,
        rear_left_speed: f64,
        rear_right_speed: f64,
    ) -> Self {
        Self {
            front_left_steer,
            front_right_steer,
            rear_left_speed,
            rear_right_speed,
        }
    }
}

/// Setpoints for the four actuated joints. All values are velocities in rad/s.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct WheelActuatorCommand {
    front_left_steer: f64,
    front_right_steer: f64,
    rear_left_wheel: f64,
    rear_right_wheel: f64,
}

impl WheelActuatorCommand {
    pub fn new(
        front_left_steer: f64,
        front_right_steer: f64,
        rear_left_wheel: f64,
        rear_right_wheel: f64,
    ) -> WheelActuatorCommand {
        WheelActuatorCommand {
            front_left_steer,
            front_right_steer,
            rear_left_wheel,
            rear_right_wheel,
        }
    }

    pub fn stopped() -> Self {
        Self::default()
    }

    pub fn front_left_steer(&self) -> f64 {
        self.front_left_steer
    }
    pub fn front_right_steer(&self) -> f64 {
        self.front_right_steer
    }
    pub fn rear_left_wheel(&self) -> f64 {
        self.rear_left_wheel
    }
    pub fn rear_right_wheel(&self) -> f64 {
        self.rear_right_wheel
    }
}
