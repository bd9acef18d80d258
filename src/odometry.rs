use crate::error::{TigraError, TigraResult};
use crate::geometry::VehicleGeometry;
use crate::publisher::{publish_slot, PublishSlot};
use nalgebra as na;
use serde::{Deserialize, Serialize};
use std::f64::consts::FRAC_PI_2;
use std::fmt;
use tokio::sync::mpsc::Receiver;
use tracing::{debug, warn};

/// Below this `sin(steer)` the curvature radius is treated as infinite.
const STRAIGHT_LINE_EPSILON: f64 = 1e-6;

const DEFAULT_PUBLISH_PERIOD: f64 = 0.01;
const DEFAULT_ODOM_FRAME: &str = "wheel_odom";
const DEFAULT_BASE_FRAME: &str = "base_footprint";

#[derive(Deserialize, Debug, Clone)]
pub struct OdometryConfig {
    /// seconds between two published samples
    #[serde(default = "default_publish_period")]
    pub publish_period: f64,
    #[serde(default = "default_odom_frame")]
    pub odom_frame: String,
    #[serde(default = "default_base_frame")]
    pub base_frame: String,
    #[serde(default = "default_publish_transform")]
    pub publish_transform: bool,
}

impl Default for OdometryConfig {
    fn default() -> Self {
        Self {
            publish_period: DEFAULT_PUBLISH_PERIOD,
            odom_frame: DEFAULT_ODOM_FRAME.to_owned(),
            base_frame: DEFAULT_BASE_FRAME.to_owned(),
            publish_transform: true,
        }
    }
}

impl OdometryConfig {
    pub fn validate(&self) -> TigraResult<()> {
        if !(self.publish_period.is_finite() && self.publish_period > 0.0) {
            return Err(TigraError::InvalidConfig(format!(
                "odometry.publish_period must be positive, got {}",
                self.publish_period
            )));
        }
        Ok(())
    }
}

fn default_publish_period() -> f64 {
    DEFAULT_PUBLISH_PERIOD
}

fn default_odom_frame() -> String {
    DEFAULT_ODOM_FRAME.to_owned()
}

fn default_base_frame() -> String {
    DEFAULT_BASE_FRAME.to_owned()
}

fn default_publish_transform() -> bool {
    true
}

/// Planar pose. Yaw accumulates without wrapping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Pose2d {
    pub x: f64,
    pub y: f64,
    pub yaw: f64,
}

impl Pose2d {
    pub fn new(x: f64, y: f64, yaw: f64) -> Self {
        Self { x, y, yaw }
    }

    pub fn orientation(&self) -> na::UnitQuaternion<f64> {
        na::UnitQuaternion::from_euler_angles(0., 0., self.yaw)
    }

    pub fn isometry(&self) -> na::Isometry2<f64> {
        na::Isometry2::new(na::Vector2::new(self.x, self.y), self.yaw)
    }
}

impl fmt::Display for Pose2d {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[{}, {}] -> {}", self.x, self.y, self.yaw.to_degrees())
    }
}

/// Body velocity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Twist2d {
    /// m/s
    pub linear: f64,
    /// rad/s
    pub angular: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct OdometryMessage {
    pub stamp: f64,
    pub frame_id: String,
    pub child_frame_id: String,
    pub pose: Pose2d,
    pub orientation: na::UnitQuaternion<f64>,
    pub twist: Twist2d,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransformMessage {
    pub stamp: f64,
    pub parent_frame_id: String,
    pub child_frame_id: String,
    pub transform: na::Isometry2<f64>,
}

/// Consumer ends of the odometry sinks.
#[derive(Debug)]
pub struct OdometryReceivers {
    pub odometry: Receiver<OdometryMessage>,
    pub transform: Option<Receiver<TransformMessage>>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Tracking {
    Uninitialized,
    Tracking { last_stamp: f64 },
}

/// Advance `pose` by one step of exact arc integration and return the body twist.
pub fn integrate(
    pose: &mut Pose2d,
    geometry: &VehicleGeometry,
    speed: f64,
    steering_angle: f64,
    dt: f64,
) -> Twist2d {
    let wheelbase = geometry.wheelbase();
    let linear = speed * dt;
    let sin_steer = (FRAC_PI_2 - steering_angle).cos();

    if sin_steer.abs() > STRAIGHT_LINE_EPSILON {
        let curvature_radius = wheelbase / sin_steer;
        let arc = linear / curvature_radius;
        let dx_local = curvature_radius * arc.sin();
        let dy_local = curvature_radius * (arc.cos() - 1.0);
        let heading = pose.yaw + steering_angle;
        pose.x += dx_local * heading.cos() - dy_local * heading.sin();
        pose.y += dx_local * heading.sin() + dy_local * heading.cos();
        pose.yaw += arc;
    } else {
        pose.x += linear * pose.yaw.cos();
        pose.y += linear * pose.yaw.sin();
    }

    Twist2d {
        linear: speed,
        angular: speed * steering_angle.tan() / wheelbase,
    }
}

/// Dead reckoning from the single-track state.
#[derive(Debug)]
pub struct OdometryIntegrator {
    geometry: VehicleGeometry,
    config: OdometryConfig,
    tracking: Tracking,
    pose: Pose2d,
    twist: Twist2d,
    last_publish: Option<f64>,
    odometry_sink: PublishSlot<OdometryMessage>,
    transform_sink: Option<PublishSlot<TransformMessage>>,
}

impl OdometryIntegrator {
    pub fn new(geometry: VehicleGeometry, config: OdometryConfig) -> (Self, OdometryReceivers) {
        let (odometry_sink, odometry) = publish_slot("odometry");
        let (transform_sink, transform) = if config.publish_transform {
            let (sink, receiver) = publish_slot("transform");
            (Some(sink), Some(receiver))
        } else {
            (None, None)
        };
        (
            Self {
                geometry,
                config,
                tracking: Tracking::Uninitialized,
                pose: Pose2d::default(),
                twist: Twist2d::default(),
                last_publish: None,
                odometry_sink,
                transform_sink,
            },
            OdometryReceivers {
                odometry,
                transform,
            },
        )
    }

    /// Integrate the state observed at `stamp` (seconds).
    ///
    /// The first call only records the time baseline.
    pub fn update(&mut self, stamp: f64, speed: f64, steering_angle: f64) {
        if !stamp.is_finite() {
            warn!(stamp, "Ignoring odometry update with invalid timestamp");
            return;
        }
        let last_stamp = match self.tracking {
            Tracking::Uninitialized => {
                debug!(stamp, "Odometry baseline recorded");
                self.tracking = Tracking::Tracking { last_stamp: stamp };
                return;
            }
            Tracking::Tracking { last_stamp } => last_stamp,
        };
        self.tracking = Tracking::Tracking { last_stamp: stamp };

        let dt = stamp - last_stamp;
        if dt <= 0.0 {
            warn!(dt, "Non-monotonic odometry timestamp, skipping step");
            return;
        }

        self.twist = integrate(&mut self.pose, &self.geometry, speed, steering_angle, dt);
        self.publish(stamp);
    }

    /// Forget the accumulated pose and wait for a new time baseline.
    pub fn reset(&mut self) {
        self.tracking = Tracking::Uninitialized;
        self.pose = Pose2d::default();
        self.twist = Twist2d::default();
        self.last_publish = None;
    }

    pub fn is_tracking(&self) -> bool {
        matches!(self.tracking, Tracking::Tracking { .. })
    }

    /// Integrated pose of the steering reference point.
    pub fn pose(&self) -> Pose2d {
        self.pose
    }

    /// Pose of the base frame as it is published.
    pub fn base_pose(&self) -> Pose2d {
        let wheelbase = self.geometry.wheelbase();
        Pose2d {
            x: self.pose.x + wheelbase * (1.0 - self.pose.yaw.cos()),
            y: self.pose.y - wheelbase * self.pose.yaw.sin(),
            yaw: self.pose.yaw,
        }
    }

    pub fn twist(&self) -> Twist2d {
        self.twist
    }

    pub fn dropped_samples(&self) -> u64 {
        self.odometry_sink.dropped()
            + self
                .transform_sink
                .as_ref()
                .map(|sink| sink.dropped())
                .unwrap_or_default()
    }

    fn publish(&mut self, stamp: f64) {
        let period = self.config.publish_period;
        match self.last_publish {
            Some(last) if last + period > stamp => return,
            Some(last) => {
                let next = last + period;
                // resync instead of bursting when we fell behind
                self.last_publish = Some(if stamp - next >= period { stamp } else { next });
            }
            None => self.last_publish = Some(stamp),
        }

        let pose = self.base_pose();
        self.odometry_sink.try_publish(OdometryMessage {
            stamp,
            frame_id: self.config.odom_frame.clone(),
            child_frame_id: self.config.base_frame.clone(),
            pose,
            orientation: pose.orientation(),
            twist: self.twist,
        });
        if let Some(sink) = self.transform_sink.as_mut() {
            sink.try_publish(TransformMessage {
                stamp,
                parent_frame_id: self.config.odom_frame.clone(),
                child_frame_id: self.config.base_frame.clone(),
                transform: pose.isometry(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::TAU;

    fn integrator() -> (OdometryIntegrator, OdometryReceivers) {
        OdometryIntegrator::new(VehicleGeometry::default(), OdometryConfig::default())
    }

    #[test]
    fn first_update_only_records_baseline() {
        let (mut odometry, mut receivers) = integrator();
        assert!(!odometry.is_tracking());
        odometry.update(12.5, 3.0, 0.3);
        assert!(odometry.is_tracking());
        assert_eq!(odometry.pose(), Pose2d::default());
        assert_eq!(odometry.twist(), Twist2d::default());
        assert!(receivers.odometry.try_recv().is_err());
    }

    #[test]
    fn straight_line() {
        let (mut odometry, _receivers) = integrator();
        odometry.update(1.0, 0.0, 0.0);
        odometry.update(1.5, 2.0, 0.0);
        let pose = odometry.pose();
        assert_relative_eq!(pose.x, 1.0);
        assert_eq!(pose.y, 0.0);
        assert_eq!(pose.yaw, 0.0);
        assert_relative_eq!(odometry.twist().linear, 2.0);
        assert_eq!(odometry.twist().angular, 0.0);
    }

    #[test]
    fn straight_line_follows_heading() {
        let mut pose = Pose2d::new(1.0, 1.0, std::f64::consts::FRAC_PI_2);
        integrate(&mut pose, &VehicleGeometry::default(), 1.0, 0.0, 2.0);
        assert_relative_eq!(pose.x, 1.0, epsilon = 1e-12);
        assert_relative_eq!(pose.y, 3.0);
    }

    #[test]
    fn concrete_arc_step() {
        let geometry = VehicleGeometry::new(1.0, 0.8, 0.25, 30_f64.to_radians()).unwrap();
        let (speed, steer, dt) = (1.0_f64, 0.1_f64, 0.1_f64);
        let mut pose = Pose2d::default();
        let twist = integrate(&mut pose, &geometry, speed, steer, dt);

        let linear = speed * dt;
        assert_relative_eq!(linear, 0.1);
        assert_relative_eq!(twist.angular * dt, 0.01003, epsilon = 1e-5);
        let radius = 1.0 / steer.sin();
        assert_relative_eq!(radius, 10.017, epsilon = 1e-3);
        let arc = linear / radius;
        let dx = radius * arc.sin();
        let dy = radius * (arc.cos() - 1.0);
        assert_relative_eq!(pose.x, dx * steer.cos() - dy * steer.sin(), epsilon = 1e-6);
        assert_relative_eq!(pose.y, dx * steer.sin() + dy * steer.cos(), epsilon = 1e-6);
        assert_relative_eq!(pose.yaw, arc, epsilon = 1e-6);
    }

    #[test]
    fn closed_arc_returns_to_start() {
        let geometry = VehicleGeometry::default();
        let (speed, steer, steps) = (1.5, 0.2_f64, 1000);
        let radius = geometry.wheelbase() / steer.sin();
        let dt = TAU * radius / (speed * steps as f64);

        let mut pose = Pose2d::default();
        for _ in 0..steps {
            integrate(&mut pose, &geometry, speed, steer, dt);
        }
        assert_relative_eq!(pose.yaw, TAU, epsilon = 1e-9);
        assert_relative_eq!(pose.x, 0.0, epsilon = 1e-9);
        assert_relative_eq!(pose.y, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn yaw_is_not_wrapped() {
        let geometry = VehicleGeometry::default();
        let steer = 0.4_f64;
        let radius = geometry.wheelbase() / steer.sin();
        let mut pose = Pose2d::default();
        for _ in 0..300 {
            integrate(&mut pose, &geometry, 1.0, steer, 0.1);
        }
        assert_relative_eq!(pose.yaw, 30.0 / radius, epsilon = 1e-9);
        assert!(pose.yaw > TAU);
    }

    #[test]
    fn left_turn_increases_yaw_and_y() {
        let (mut odometry, _receivers) = integrator();
        odometry.update(0.0, 0.0, 0.0);
        for i in 1..=20 {
            odometry.update(i as f64 * 0.05, 1.0, 0.3);
        }
        assert!(odometry.pose().yaw > 0.0);
        assert!(odometry.pose().y > 0.0);
        assert!(odometry.twist().angular > 0.0);
    }

    #[test]
    fn non_monotonic_timestamp_skips_step() {
        let (mut odometry, _receivers) = integrator();
        odometry.update(1.0, 1.0, 0.0);
        odometry.update(2.0, 1.0, 0.0);
        odometry.update(1.5, 1.0, 0.0);
        odometry.update(f64::NAN, 1.0, 0.0);
        assert_relative_eq!(odometry.pose().x, 1.0);
        odometry.update(2.5, 1.0, 0.0);
        assert_relative_eq!(odometry.pose().x, 2.0);
    }

    #[test]
    fn reset_returns_to_uninitialized() {
        let (mut odometry, _receivers) = integrator();
        odometry.update(0.0, 1.0, 0.1);
        odometry.update(1.0, 1.0, 0.1);
        assert_ne!(odometry.pose(), Pose2d::default());
        odometry.reset();
        assert!(!odometry.is_tracking());
        odometry.update(5.0, 1.0, 0.1);
        assert_eq!(odometry.pose(), Pose2d::default());
    }

    #[test]
    fn base_pose_offsets_by_wheelbase() {
        let (mut odometry, _receivers) = integrator();
        odometry.update(0.0, 0.0, 0.0);
        odometry.update(1.0, 1.0, 0.0);
        assert_eq!(odometry.base_pose(), odometry.pose());

        odometry.pose.yaw = std::f64::consts::FRAC_PI_2;
        let base = odometry.base_pose();
        assert_relative_eq!(base.x, odometry.pose().x + 1.0);
        assert_relative_eq!(base.y, odometry.pose().y - 1.0);
    }

    #[test]
    fn publishes_at_bounded_rate() {
        let config = OdometryConfig {
            publish_period: 1.0,
            ..Default::default()
        };
        let (mut odometry, mut receivers) =
            OdometryIntegrator::new(VehicleGeometry::default(), config);
        let mut transform = receivers.transform.take().unwrap();

        let mut stamps = vec![];
        for i in 0..=40 {
            odometry.update(i as f64 * 0.25, 1.0, 0.0);
            if let Ok(message) = receivers.odometry.try_recv() {
                stamps.push(message.stamp);
                assert_eq!(message.frame_id, "wheel_odom");
                assert_eq!(message.child_frame_id, "base_footprint");
            }
            // transform consumer is never drained after the first sample
            if i == 1 {
                assert!(transform.try_recv().is_ok());
            }
        }
        // first sample on the first integrated tick, then every 4th tick
        assert_eq!(stamps.len(), 10);
        assert_relative_eq!(stamps[0], 0.25);
        for pair in stamps.windows(2) {
            assert_relative_eq!(pair[1] - pair[0], 1.0);
        }
        // the busy transform slot dropped everything after its one pending sample
        assert_eq!(odometry.dropped_samples(), 8);
    }

    #[test]
    fn publish_clock_resyncs_after_stall() {
        let config = OdometryConfig {
            publish_period: 1.0,
            publish_transform: false,
            ..Default::default()
        };
        let (mut odometry, mut receivers) =
            OdometryIntegrator::new(VehicleGeometry::default(), config);
        let mut stamps = vec![];
        for stamp in [0.0, 0.5, 5.0, 5.75, 6.0, 6.5] {
            odometry.update(stamp, 1.0, 0.0);
            if let Ok(message) = receivers.odometry.try_recv() {
                stamps.push(message.stamp);
            }
        }
        assert_eq!(stamps, vec![0.5, 5.0, 6.0]);
    }

    #[test]
    fn publish_period_is_validated() {
        assert!(OdometryConfig::default().validate().is_ok());
        for publish_period in [0.0, -0.01, f64::NAN, f64::INFINITY] {
            let config = OdometryConfig {
                publish_period,
                ..Default::default()
            };
            assert!(matches!(
                config.validate(),
                Err(TigraError::InvalidConfig(_))
            ));
        }
    }

    #[test]
    fn pose_display() {
        assert_eq!(Pose2d::new(1.0, -2.5, 0.0).to_string(), "[1, -2.5] -> 0");
    }

    #[test]
    fn transform_sink_can_be_disabled() {
        let config = OdometryConfig {
            publish_transform: false,
            ..Default::default()
        };
        let (_odometry, receivers) = OdometryIntegrator::new(VehicleGeometry::default(), config);
        assert!(receivers.transform.is_none());
    }

    #[test]
    fn published_message_carries_pose_and_twist() {
        let (mut odometry, mut receivers) = integrator();
        odometry.update(0.0, 0.0, 0.0);
        odometry.update(0.5, 2.0, 0.0);
        let message = receivers.odometry.try_recv().unwrap();
        assert_relative_eq!(message.pose.x, 1.0);
        assert_relative_eq!(message.twist.linear, 2.0);
        assert_relative_eq!(message.orientation.angle(), 0.0);
        let transform = receivers.transform.as_mut().unwrap().try_recv().unwrap();
        assert_relative_eq!(transform.transform.translation.vector.x, 1.0);
    }
}
