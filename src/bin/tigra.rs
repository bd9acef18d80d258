use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tigra::{
    command::{CommandRequest, CommandSender},
    configuration::AppConfig,
    control_loop::ControlLoop,
    controller::AckermannController,
    driver::vehicle_driver_from_config,
    logging,
    odometry::{OdometryMessage, TransformMessage},
};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::mpsc::Receiver,
};
use tracing::*;

#[derive(Parser, Debug)]
#[command(version, about = "Ackermann vehicle controller")]
struct Args {
    /// path to config
    #[arg(long)]
    config: Option<PathBuf>,

    /// Sets the level of verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbosity: u8,

    /// Log as JSON
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    logging::setup_tracing(args.verbosity, args.json_logs);

    let app_config = AppConfig::load_config(&args.config)?;
    let tick_period = app_config.control.tick_period()?;

    let driver = vehicle_driver_from_config(app_config.driver.clone(), tick_period)?;
    let (controller, command_sender, receivers) = AckermannController::new(
        app_config.vehicle,
        &app_config.steering,
        app_config.odometry.clone(),
    );

    tokio::spawn(read_commands(command_sender));
    tokio::spawn(log_odometry(receivers.odometry));
    if let Some(transform) = receivers.transform {
        tokio::spawn(log_transforms(transform));
    }

    let control_loop = tokio::spawn(ControlLoop::new(driver, controller, tick_period).run());

    tokio::select! {
        result = control_loop => {
            result??;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Stopping");
        }
    }

    Ok(())
}

async fn read_commands(sender: CommandSender) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<CommandRequest>(&line) {
                    Ok(request) => match sender.send(request) {
                        Ok(command) => info!(?command, "New command"),
                        Err(err) => warn!(%err, "Command rejected"),
                    },
                    Err(err) => warn!(%err, "Failed to parse command"),
                }
            }
            Ok(None) => {
                info!("Command input closed, stopping vehicle");
                sender.stop();
                return;
            }
            Err(err) => {
                error!(%err, "Failed to read command input");
                sender.stop();
                return;
            }
        }
    }
}

async fn log_odometry(mut odometry: Receiver<OdometryMessage>) {
    while let Some(message) = odometry.recv().await {
        info!(
            stamp = message.stamp,
            pose = %message.pose,
            linear = message.twist.linear,
            angular = message.twist.angular,
            "Odometry"
        );
    }
}

async fn log_transforms(mut transforms: Receiver<TransformMessage>) {
    while let Some(message) = transforms.recv().await {
        debug!(
            stamp = message.stamp,
            parent = %message.parent_frame_id,
            child = %message.child_frame_id,
            transform = ?message.transform,
            "Transform"
        );
    }
}
