use super::{JointConfig, VehicleDriver};
use crate::error::TigraError;
use crate::wheels::{WheelActuatorCommand, WheelSensorSample};
use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

const DEFAULT_STEER_JOINT_LIMIT: f64 = 0.8;

#[derive(Deserialize, Debug, Clone)]
pub struct SimulatedConfig {
    #[serde(default)]
    pub joints: JointConfig,
    /// joints the simulated model provides
    #[serde(default = "default_model_joints")]
    pub model_joints: Vec<String>,
    /// mechanical stop of the steer joints, rad
    #[serde(default = "default_steer_joint_limit")]
    pub steer_joint_limit: f64,
}

impl Default for SimulatedConfig {
    fn default() -> Self {
        Self {
            joints: JointConfig::default(),
            model_joints: default_model_joints(),
            steer_joint_limit: DEFAULT_STEER_JOINT_LIMIT,
        }
    }
}

fn default_model_joints() -> Vec<String> {
    let joints = JointConfig::default();
    vec![
        joints.front_left_steer,
        joints.front_right_steer,
        joints.rear_left_drive,
        joints.rear_right_drive,
        "joint_left_wheel_2_speed_joint".to_owned(),
        "joint_right_wheel_2_speed_joint".to_owned(),
    ]
}

fn default_steer_joint_limit() -> f64 {
    DEFAULT_STEER_JOINT_LIMIT
}

#[derive(Debug, Clone, Default)]
struct Joint {
    name: String,
    position: f64,
    velocity: f64,
}

/// Kinematic stand-in for the vehicle.
///
/// Steer joints integrate their commanded velocity over one tick period and
/// stop at the joint limit. Drive joints take the commanded rate at once.
#[derive(Debug)]
pub struct SimulatedVehicle {
    joints: Vec<Joint>,
    front_left_steer: usize,
    front_right_steer: usize,
    rear_left_drive: usize,
    rear_right_drive: usize,
    steer_joint_limit: f64,
    step: f64,
}

impl SimulatedVehicle {
    pub fn new(config: SimulatedConfig, tick_period: Duration) -> Result<Self> {
        let joints: Vec<Joint> = config
            .model_joints
            .iter()
            .map(|name| Joint {
                name: name.clone(),
                ..Default::default()
            })
            .collect();
        let find = |name: &str| -> Result<usize, TigraError> {
            joints
                .iter()
                .position(|joint| joint.name == name)
                .ok_or_else(|| TigraError::MissingJoint(name.to_owned()))
        };
        let front_left_steer = find(&config.joints.front_left_steer)?;
        let front_right_steer = find(&config.joints.front_right_steer)?;
        let rear_left_drive = find(&config.joints.rear_left_drive)?;
        let rear_right_drive = find(&config.joints.rear_right_drive)?;
        debug!(joints = joints.len(), "Simulated vehicle joints resolved");

        Ok(Self {
            joints,
            front_left_steer,
            front_right_steer,
            rear_left_drive,
            rear_right_drive,
            steer_joint_limit: config.steer_joint_limit.abs(),
            step: tick_period.as_secs_f64(),
        })
    }

    fn set_steer_velocity(&mut self, index: usize, velocity: f64) {
        let limit = self.steer_joint_limit;
        let step = self.step;
        let joint = &mut self.joints[index];
        joint.velocity = velocity;
        joint.position = (joint.position + velocity * step).clamp(-limit, limit);
    }

    fn set_drive_velocity(&mut self, index: usize, velocity: f64) {
        let joint = &mut self.joints[index];
        joint.velocity = velocity;
        joint.position += velocity * self.step;
    }
}

#[async_trait]
impl VehicleDriver for SimulatedVehicle {
    async fn read_sensors(&mut self) -> Result<WheelSensorSample> {
        Ok(WheelSensorSample::new(
            self.joints[self.front_left_steer].position,
            self.joints[self.front_right_steer].position,
            self.joints[self.rear_left_drive].velocity,
            self.joints[self.rear_right_drive].velocity,
        ))
    }

    async fn send(&mut self, command: WheelActuatorCommand) -> Result<()> {
        let values = [
            command.front_left_steer(),
            command.front_right_steer(),
            command.rear_left_wheel(),
            command.rear_right_wheel(),
        ];
        if values.iter().any(|value| !value.is_finite()) {
            return Err(TigraError::Driver(format!("non-finite actuator command {:?}", command)).into());
        }
        self.set_steer_velocity(self.front_left_steer, command.front_left_steer());
        self.set_steer_velocity(self.front_right_steer, command.front_right_steer());
        self.set_drive_velocity(self.rear_left_drive, command.rear_left_wheel());
        self.set_drive_velocity(self.rear_right_drive, command.rear_right_wheel());
        Ok(())
    }
}
