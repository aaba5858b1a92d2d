//! laserctl: command-line control for serial laser/pulse controllers
//!
//! Runs one operation against a controller on a serial port, or against a
//! simulated controller with `--simulate`.

mod settings;
mod simulate;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use laser_link::{DeviceIdentifier, LaserController, LaserLink};
use laser_protocol::LaserParameters;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use settings::Settings;

/// Control a serial laser/pulse controller
#[derive(Parser, Debug)]
#[command(name = "laserctl", version)]
#[command(about = "Control a serial laser/pulse controller")]
struct Args {
    /// Serial device path, e.g. /dev/ttyUSB0
    #[arg(short, long, conflicts_with_all = ["name", "simulate"])]
    port: Option<String>,

    /// Device name as shown by `laserctl devices`
    #[arg(short, long, conflicts_with = "simulate")]
    name: Option<String>,

    /// Talk to a built-in simulated controller
    #[arg(long)]
    simulate: bool,

    /// Per-operation timeout in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand, Debug)]
enum CliCommand {
    /// List attached serial devices
    Devices,
    /// Print the driver version
    DriverVersion,
    /// Print the controller's hardware and firmware version
    Version,
    /// Show or switch master power
    Power {
        #[arg(value_enum)]
        state: Option<Switch>,
    },
    /// Show or stage exposure, filter and delay
    Params {
        /// Exposure in controller ticks
        #[arg(long)]
        exposure: Option<u32>,
        /// Digital filter setting
        #[arg(long)]
        filter: Option<u32>,
        /// Pulse delay in controller ticks
        #[arg(long)]
        delay: Option<u32>,
    },
    /// Apply staged parameters
    Commit,
    /// Arm the trigger
    Arm,
    /// Cancel the trigger
    Disarm,
    /// Reset the controller
    Reset,
    /// Print effective settings
    Config {
        /// Store the command-line port and timeout as defaults
        #[arg(long)]
        save: bool,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Switch {
    On,
    Off,
}

/// Pick the device to connect to
fn select_device(args: &Args, settings: &Settings) -> anyhow::Result<DeviceIdentifier> {
    if args.simulate {
        return Ok(DeviceIdentifier::Path(simulate::SIMULATED_PATH.to_string()));
    }
    if let Some(port) = &args.port {
        return Ok(DeviceIdentifier::Path(port.clone()));
    }
    if let Some(name) = &args.name {
        return Ok(DeviceIdentifier::Name(name.clone()));
    }
    match &settings.default_device {
        Some(path) => Ok(DeviceIdentifier::Path(path.clone())),
        None => bail!("no device given; use --port, --name or --simulate"),
    }
}

fn print_parameters(params: &LaserParameters) {
    println!("exposure: {}", params.exposure_ticks);
    println!("filter:   {}", params.digital_filter);
    println!("delay:    {}", params.pulse_delay);
}

/// Run an operation that needs an open connection
async fn run_connected(controller: &LaserController, command: &CliCommand) -> anyhow::Result<()> {
    match command {
        CliCommand::Version => {
            let version = controller.device_version().await?;
            println!("hardware {} firmware {}", version.hardware, version.firmware);
        }

        CliCommand::Power { state } => {
            if let Some(state) = state {
                controller.set_power(*state == Switch::On).await?;
            }
            let power = controller.power().await?;
            println!("power: {}", if power.master { "on" } else { "off" });
        }

        CliCommand::Params {
            exposure,
            filter,
            delay,
        } => {
            let current = controller.laser_parameters().await?;
            if exposure.is_none() && filter.is_none() && delay.is_none() {
                print_parameters(&current);
                return Ok(());
            }

            let staged = LaserParameters {
                exposure_ticks: exposure.unwrap_or(current.exposure_ticks),
                digital_filter: filter.unwrap_or(current.digital_filter),
                pulse_delay: delay.unwrap_or(current.pulse_delay),
            };
            controller.set_laser_parameters(&staged).await?;
            print_parameters(&staged);
        }

        CliCommand::Commit => controller.commit_parameters().await?,
        CliCommand::Arm => controller.control_laser(true).await?,
        CliCommand::Disarm => controller.control_laser(false).await?,
        CliCommand::Reset => controller.reset_controller().await?,

        CliCommand::Devices | CliCommand::DriverVersion | CliCommand::Config { .. } => {}
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "laserctl=info,laser_protocol=info,laser_detect=info,laser_link=info,laser_sim=info"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let mut settings = Settings::load();
    if let Some(timeout_ms) = args.timeout_ms {
        settings.timeout_ms = timeout_ms;
    }

    let link = if args.simulate {
        simulate::simulated_link(settings.link_config())
    } else {
        LaserLink::serial(settings.link_config())
    };
    let controller = LaserController::new(link, settings.controller_config());

    match &args.command {
        CliCommand::Devices => {
            for device in controller.serial_devices()? {
                println!("{}\t{}", device.name, device.path);
            }
        }

        CliCommand::DriverVersion => println!("{}", controller.driver_version()),

        CliCommand::Config { save } => {
            if *save {
                if let Some(port) = &args.port {
                    settings.default_device = Some(port.clone());
                }
                let path = settings.save()?;
                tracing::info!("Saved settings to {}", path.display());
            }
            println!("{}", serde_json::to_string_pretty(&settings)?);
        }

        command => {
            let device = select_device(&args, &settings)?;
            controller
                .connect(&device)
                .await
                .with_context(|| format!("failed to connect to {:?}", device))?;
            let result = run_connected(&controller, command).await;
            controller.disconnect().await?;
            result?;
        }
    }

    Ok(())
}
