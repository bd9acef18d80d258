#![doc = include_str!("../README.md")]
pub mod command;
pub mod configuration;
pub mod control_loop;
pub mod controller;
pub mod driver;
pub mod error;
pub mod geometry;
pub mod logging;
pub mod mixer;
pub mod odometry;
pub mod publisher;
pub mod state_estimator;
pub mod steering;
pub mod wheels;
