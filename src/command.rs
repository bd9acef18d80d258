use crate::error::{TigraError, TigraResult};
use crate::geometry::VehicleGeometry;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::trace;

/// Velocity request as delivered by an external source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandRequest {
    /// m/s
    pub linear_speed: f64,
    /// rad/s, turned into a steering angle through the steering ratio
    pub angular_request: f64,
}

impl CommandRequest {
    pub fn new(linear_speed: f64, angular_request: f64) -> Self {
        Self {
            linear_speed,
            angular_request,
        }
    }
}

/// Command as consumed by the control tick. The default stops the vehicle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct VelocityCommand {
    /// m/s
    pub linear_speed: f64,
    /// rad, already inside the steer range
    pub steering_angle: f64,
}

/// Create the latest-value command slot shared between the asynchronous
/// writers and the control tick.
pub fn command_channel(
    geometry: &VehicleGeometry,
    steering_ratio: f64,
) -> (CommandSender, CommandReceiver) {
    let value = Arc::new(Mutex::new(VelocityCommand::default()));
    let sender = CommandSender {
        value: Arc::clone(&value),
        steering_ratio,
        max_steer_angle: geometry.max_steer_angle(),
    };
    let receiver = CommandReceiver { value };
    (sender, receiver)
}

fn lock(value: &Mutex<VelocityCommand>) -> MutexGuard<'_, VelocityCommand> {
    // the guarded value is plain data and always whole
    value.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug, Clone)]
pub struct CommandSender {
    value: Arc<Mutex<VelocityCommand>>,
    steering_ratio: f64,
    max_steer_angle: f64,
}

impl CommandSender {
    /// Replace the current command. Returns the clamped command that was stored.
    pub fn send(&self, request: CommandRequest) -> TigraResult<VelocityCommand> {
        if !request.linear_speed.is_finite() || !request.angular_request.is_finite() {
            return Err(TigraError::InvalidCommand(format!(
                "request values must be finite, got {:?}",
                request
            )));
        }
        let steering_angle = request.angular_request * self.steering_ratio;
        if steering_angle.is_nan() {
            return Err(TigraError::InvalidCommand(format!(
                "steering ratio {} gives no angle for {:?}",
                self.steering_ratio, request
            )));
        }
        let command = VelocityCommand {
            linear_speed: request.linear_speed,
            steering_angle: steering_angle.clamp(-self.max_steer_angle, self.max_steer_angle),
        };
        *lock(&self.value) = command;
        trace!(?command, "Command updated");
        Ok(command)
    }

    /// Go back to the stopped state.
    pub fn stop(&self) {
        *lock(&self.value) = VelocityCommand::default();
    }
}

#[derive(Debug)]
pub struct CommandReceiver {
    value: Arc<Mutex<VelocityCommand>>,
}

impl CommandReceiver {
    /// Snapshot of the most recent command. Does not consume it.
    pub fn latest(&self) -> VelocityCommand {
        *lock(&self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::thread;

    #[test]
    fn defaults_to_stop() {
        let (_sender, receiver) = command_channel(&VehicleGeometry::default(), 1.0);
        assert_eq!(receiver.latest(), VelocityCommand::default());
    }

    #[test]
    fn applies_steering_ratio() {
        let (sender, receiver) = command_channel(&VehicleGeometry::default(), 0.5);
        sender.send(CommandRequest::new(1.5, 0.4)).unwrap();
        let command = receiver.latest();
        assert_relative_eq!(command.linear_speed, 1.5);
        assert_relative_eq!(command.steering_angle, 0.2);
    }

    #[test]
    fn clamps_to_exact_steer_limit() {
        let geometry = VehicleGeometry::default();
        let (sender, receiver) = command_channel(&geometry, 2.0);
        sender.send(CommandRequest::new(1.0, 10.0)).unwrap();
        assert_eq!(receiver.latest().steering_angle, geometry.max_steer_angle());
        sender.send(CommandRequest::new(1.0, -10.0)).unwrap();
        assert_eq!(receiver.latest().steering_angle, -geometry.max_steer_angle());
    }

    #[test]
    fn latest_value_wins_and_is_not_consumed() {
        let (sender, receiver) = command_channel(&VehicleGeometry::default(), 1.0);
        sender.send(CommandRequest::new(1.0, 0.1)).unwrap();
        sender.send(CommandRequest::new(2.0, -0.1)).unwrap();
        assert_eq!(receiver.latest().linear_speed, 2.0);
        assert_eq!(receiver.latest().linear_speed, 2.0);
        sender.stop();
        assert_eq!(receiver.latest(), VelocityCommand::default());
    }

    #[test]
    fn rejects_non_finite_requests() {
        let (sender, receiver) = command_channel(&VehicleGeometry::default(), 1.0);
        sender.send(CommandRequest::new(1.0, 0.1)).unwrap();
        assert!(sender.send(CommandRequest::new(f64::NAN, 0.1)).is_err());
        assert!(sender
            .send(CommandRequest::new(1.0, f64::NEG_INFINITY))
            .is_err());
        assert_eq!(receiver.latest().linear_speed, 1.0);
    }

    #[test]
    fn stored_angle_is_always_finite() {
        let geometry = VehicleGeometry::default();
        let (sender, receiver) = command_channel(&geometry, f64::INFINITY);
        assert!(sender.send(CommandRequest::new(1.0, 0.0)).is_err());
        assert_eq!(receiver.latest(), VelocityCommand::default());
        let command = sender.send(CommandRequest::new(1.0, 0.1)).unwrap();
        assert_eq!(command.steering_angle, geometry.max_steer_angle());
    }

    #[test]
    fn concurrent_writers_never_tear() {
        let geometry = VehicleGeometry::default();
        let (sender, receiver) = command_channel(&geometry, 1.0);
        // every request keeps speed == 10 * angle so a torn read is detectable
        let writers: Vec<_> = (0..4)
            .map(|writer| {
                let sender = sender.clone();
                thread::spawn(move || {
                    for i in 0..2000 {
                        let angle = ((writer * 2000 + i) % 50) as f64 * 0.01;
                        sender.send(CommandRequest::new(angle * 10.0, angle)).unwrap();
                    }
                })
            })
            .collect();
        for _ in 0..5000 {
            let command = receiver.latest();
            assert_relative_eq!(command.linear_speed, command.steering_angle * 10.0);
        }
        for writer in writers {
            writer.join().unwrap();
        }
    }
}
