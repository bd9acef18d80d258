use crate::controller::AckermannController;
use crate::driver::VehicleDriver;
use crate::error::TigraError;
use crate::wheels::WheelActuatorCommand;
use anyhow::Result;
use serde::Deserialize;
use std::time::Duration;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info};

const DEFAULT_TICK_PERIOD: f64 = 0.01;
const STATUS_LOG_PERIOD: Duration = Duration::from_secs(5);

#[derive(Deserialize, Debug, Clone)]
pub struct ControlConfig {
    /// seconds between control ticks
    #[serde(default = "default_tick_period")]
    pub tick_period: f64,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            tick_period: DEFAULT_TICK_PERIOD,
        }
    }
}

impl ControlConfig {
    /// Fails on a period the interval timer cannot run with.
    pub fn tick_period(&self) -> Result<Duration> {
        if !(self.tick_period.is_finite() && self.tick_period > 0.0) {
            return Err(TigraError::InvalidConfig(format!(
                "control.tick_period must be positive, got {}",
                self.tick_period
            ))
            .into());
        }
        let period = Duration::try_from_secs_f64(self.tick_period)?;
        if period.is_zero() {
            return Err(TigraError::InvalidConfig(format!(
                "control.tick_period {} rounds to zero",
                self.tick_period
            ))
            .into());
        }
        Ok(period)
    }
}

fn default_tick_period() -> f64 {
    DEFAULT_TICK_PERIOD
}

/// Fixed cadence loop: read sensors, tick the controller, write actuators.
pub struct ControlLoop {
    driver: Box<dyn VehicleDriver>,
    controller: AckermannController,
    period: Duration,
}

impl ControlLoop {
    pub fn new(
        driver: Box<dyn VehicleDriver>,
        controller: AckermannController,
        period: Duration,
    ) -> Self {
        Self {
            driver,
            controller,
            period,
        }
    }

    pub fn controller(&self) -> &AckermannController {
        &self.controller
    }

    /// A single tick for a sample taken at `stamp` seconds.
    pub async fn step(&mut self, stamp: f64) -> Result<WheelActuatorCommand> {
        let sample = self.driver.read_sensors().await?;
        let command = self.controller.tick(stamp, &sample);
        self.driver.send(command).await?;
        Ok(command)
    }

    /// Tick until the driver fails. Stopping is left to the host.
    pub async fn run(mut self) -> Result<()> {
        info!(period = ?self.period, "Control loop started");
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let start = Instant::now();
        let mut last_status = start;
        loop {
            ticker.tick().await;
            let stamp = start.elapsed().as_secs_f64();
            self.step(stamp).await?;
            if last_status.elapsed() >= STATUS_LOG_PERIOD {
                last_status = Instant::now();
                debug!(status = ?self.controller.status(), "Controller status");
            }
        }
    }
}
