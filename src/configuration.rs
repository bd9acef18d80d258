use config::Config;
use serde::Deserialize;
use std::path::PathBuf;
use tracing::*;

use crate::{
    control_loop::ControlConfig, driver::DriverConfig, geometry::VehicleGeometry,
    odometry::OdometryConfig, steering::SteeringConfig,
};

#[derive(Deserialize, Debug, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub vehicle: VehicleGeometry,
    #[serde(default)]
    pub steering: SteeringConfig,
    #[serde(default)]
    pub odometry: OdometryConfig,
    #[serde(default)]
    pub control: ControlConfig,
    #[serde(default)]
    pub driver: DriverConfig,
}

/// `TIGRA_VEHICLE__WHEELBASE=1.2` overrides `vehicle.wheelbase`
fn environment() -> config::Environment {
    config::Environment::with_prefix("TIGRA")
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

impl AppConfig {
    pub fn load_config(config: &Option<PathBuf>) -> anyhow::Result<Self> {
        let settings = if let Some(config) = config {
            info!("Using configuration from {:?}", config);
            Config::builder()
                .add_source(config::File::with_name(
                    config
                        .to_str()
                        .ok_or_else(|| anyhow::anyhow!("Failed to convert path"))?,
                ))
                .add_source(environment())
                .build()?
        } else {
            info!("Using dev configuration");
            Config::builder()
                .add_source(config::File::with_name("config/settings"))
                .add_source(config::File::with_name("config/dev_settings").required(false))
                .add_source(environment())
                .build()?
        };

        let app_config: AppConfig = settings.try_deserialize()?;
        app_config.validate()?;
        info!(
            wheelbase = app_config.vehicle.wheelbase(),
            track_width = app_config.vehicle.track_width(),
            wheel_radius = app_config.vehicle.wheel_radius(),
            max_steer_angle = app_config.vehicle.max_steer_angle(),
            "Vehicle geometry loaded"
        );
        Ok(app_config)
    }

    /// Checks the values that serde cannot reject on its own.
    /// Geometry is already validated while deserializing.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.steering.validate()?;
        self.odometry.validate()?;
        self.control.tick_period()?;
        Ok(())
    }
}
