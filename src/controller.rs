use crate::command::{command_channel, CommandReceiver, CommandSender, VelocityCommand};
use crate::geometry::VehicleGeometry;
use crate::mixer::MotionCommandMixer;
use crate::odometry::{OdometryConfig, OdometryIntegrator, OdometryReceivers, Pose2d, Twist2d};
use crate::state_estimator::{StateEstimator, VirtualBicycleState};
use crate::steering::{SteerSetpoint, SteeringConfig, SteeringServo};
use crate::wheels::{WheelActuatorCommand, WheelSensorSample};
use serde::Serialize;
use tracing::{trace, warn};

/// Snapshot of the controller for diagnostics.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ControllerStatus {
    pub state: VirtualBicycleState,
    pub command: VelocityCommand,
    pub pose: Pose2d,
    pub twist: Twist2d,
    pub sensor_faults: u64,
    pub dropped_samples: u64,
}

/// One control tick: estimate, integrate, mix, steer.
#[derive(Debug)]
pub struct AckermannController {
    geometry: VehicleGeometry,
    estimator: StateEstimator,
    odometry: OdometryIntegrator,
    mixer: MotionCommandMixer,
    servo: SteeringServo,
    commands: CommandReceiver,
    last_command: VelocityCommand,
    last_stamp: Option<f64>,
}

impl AckermannController {
    /// Build the controller together with the command writer and the odometry
    /// consumer ends.
    pub fn new(
        geometry: VehicleGeometry,
        steering: &SteeringConfig,
        odometry: OdometryConfig,
    ) -> (Self, CommandSender, OdometryReceivers) {
        let (command_sender, commands) = command_channel(&geometry, steering.steering_ratio);
        let (odometry, receivers) = OdometryIntegrator::new(geometry, odometry);
        let controller = Self {
            geometry,
            estimator: StateEstimator::new(geometry),
            odometry,
            mixer: MotionCommandMixer::new(geometry),
            servo: SteeringServo::new(geometry, steering),
            commands,
            last_command: VelocityCommand::default(),
            last_stamp: None,
        };
        (controller, command_sender, receivers)
    }

    /// Run one tick for the sample taken at `stamp` (seconds, monotonic).
    pub fn tick(&mut self, stamp: f64, sample: &WheelSensorSample) -> WheelActuatorCommand {
        let state = match self.estimator.update(sample) {
            Ok(state) => state,
            Err(err) => {
                warn!(
                    %err,
                    faults = self.estimator.fault_count(),
                    "Holding last valid estimate"
                );
                self.estimator.state()
            }
        };

        self.odometry.update(
            stamp,
            state.forward_speed(&self.geometry),
            state.steering_angle,
        );

        let command = self.commands.latest();
        self.last_command = command;

        // feedback from the estimated angle, not the commanded one
        let drive = self.mixer.mix(command.linear_speed, state.steering_angle);

        let dt = match self.last_stamp {
            Some(last) if stamp > last => stamp - last,
            _ => 0.0,
        };
        if stamp.is_finite() {
            self.last_stamp = Some(stamp);
        }

        // hold the steer joints while their own readings are unusable
        let steer_readings_valid =
            sample.front_left_steer.is_finite() && sample.front_right_steer.is_finite();
        let steer = if steer_readings_valid {
            self.servo.update(
                command.steering_angle,
                sample.front_left_steer,
                sample.front_right_steer,
                dt,
            )
        } else {
            SteerSetpoint::default()
        };

        let output = WheelActuatorCommand::new(steer.left, steer.right, drive.left, drive.right);
        trace!(?state, ?command, ?output, "Control tick");
        output
    }

    pub fn reset_odometry(&mut self) {
        self.odometry.reset();
    }

    pub fn geometry(&self) -> &VehicleGeometry {
        &self.geometry
    }

    pub fn pose(&self) -> Pose2d {
        self.odometry.pose()
    }

    pub fn status(&self) -> ControllerStatus {
        ControllerStatus {
            state: self.estimator.state(),
            command: self.last_command,
            pose: self.odometry.base_pose(),
            twist: self.odometry.twist(),
            sensor_faults: self.estimator.fault_count(),
            dropped_samples: self.odometry.dropped_samples(),
        }
    }
}
