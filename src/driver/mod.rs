pub mod sim_driver;

use crate::wheels::{WheelActuatorCommand, WheelSensorSample};
use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use sim_driver::{SimulatedConfig, SimulatedVehicle};
use std::time::Duration;
use tracing::info;

/// Hardware or simulator behind the controller.
#[async_trait]
pub trait VehicleDriver: Send + Sync {
    async fn read_sensors(&mut self) -> Result<WheelSensorSample>;
    async fn send(&mut self, command: WheelActuatorCommand) -> Result<()>;
}

/// Names of the four joints the controller needs.
#[derive(Deserialize, Debug, Clone)]
pub struct JointConfig {
    #[serde(default = "default_front_left_steer")]
    pub front_left_steer: String,
    #[serde(default = "default_front_right_steer")]
    pub front_right_steer: String,
    #[serde(default = "default_rear_left_drive")]
    pub rear_left_drive: String,
    #[serde(default = "default_rear_right_drive")]
    pub rear_right_drive: String,
}

impl Default for JointConfig {
    fn default() -> Self {
        Self {
            front_left_steer: default_front_left_steer(),
            front_right_steer: default_front_right_steer(),
            rear_left_drive: default_rear_left_drive(),
            rear_right_drive: default_rear_right_drive(),
        }
    }
}

fn default_front_left_steer() -> String {
    "joint_left_wheel_1_steer_joint".to_owned()
}

fn default_front_right_steer() -> String {
    "joint_right_wheel_1_steer_joint".to_owned()
}

fn default_rear_left_drive() -> String {
    "joint_left_wheel_1_speed_joint".to_owned()
}

fn default_rear_right_drive() -> String {
    "joint_right_wheel_1_speed_joint".to_owned()
}

#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DriverConfig {
    Simulated(SimulatedConfig),
}

impl Default for DriverConfig {
    fn default() -> Self {
        DriverConfig::Simulated(SimulatedConfig::default())
    }
}

/// Open the configured driver. Fails when any required joint is missing.
pub fn vehicle_driver_from_config(
    config: DriverConfig,
    tick_period: Duration,
) -> Result<Box<dyn VehicleDriver>> {
    match config {
        DriverConfig::Simulated(config) => {
            info!("Using simulated vehicle");
            Ok(Box::new(SimulatedVehicle::new(config, tick_period)?))
        }
    }
}
