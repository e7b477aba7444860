//! CLI application for controlling Atomberg fans.
//!
//! Run with: cargo run --example fan_cli -- --help

use atomberg_fans_rs::{
    BroadcastListener, Fan, FanEvent, FanSpeed, ListenerConfig, SpeedDelta, Timer,
};
use clap::{Parser, Subcommand, ValueEnum};
use std::net::Ipv4Addr;

#[derive(Parser)]
#[command(name = "fan-cli")]
#[command(about = "Control Atomberg ceiling fans from the command line", long_about = None)]
struct Cli {
    /// IP address of the fan (not required for the listen command)
    #[arg(short, long, global = true)]
    ip: Option<Ipv4Addr>,

    /// Command port of the fan
    #[arg(short, long, global = true, default_value_t = Fan::DEFAULT_PORT)]
    port: u16,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Switch {
    On,
    Off,
}

impl From<Switch> for bool {
    fn from(switch: Switch) -> Self {
        matches!(switch, Switch::On)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Turn the fan on
    On,

    /// Turn the fan off
    Off,

    /// Set the speed (0-6)
    Speed {
        #[arg(value_parser = clap::value_parser!(u8).range(0..=6))]
        level: u8,
    },

    /// Change the speed relative to the current one (-1, or 1 to 5)
    Delta {
        #[arg(allow_hyphen_values = true)]
        delta: i8,
    },

    /// Turn the LED on or off
    Led { state: Switch },

    /// Set the off timer in hours (0 disables it)
    Timer {
        #[arg(value_parser = clap::value_parser!(u8).range(0..=4))]
        hours: u8,
    },

    /// Turn sleep mode on or off
    Sleep { state: Switch },

    /// Print state broadcasts from all fans on the network
    Listen,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if let Commands::Listen = cli.command {
        let known = cli.ip.into_iter();
        let listener = BroadcastListener::new(ListenerConfig::default().with_known_fans(known));
        let events = listener.start()?;
        println!(
            "Listening for fan broadcasts on port {}... (Press Ctrl+C to stop)\n",
            listener.config().port
        );

        tokio::task::spawn_blocking(move || {
            for event in events {
                match event {
                    FanEvent::Identified { ip, device_id } => {
                        println!("Fan at {} is {}", ip, device_id);
                    }
                    FanEvent::State(state) => {
                        println!(
                            "{}",
                            serde_json::to_string(&state).unwrap_or_else(|_| format!("{:?}", state))
                        );
                    }
                }
            }
        })
        .await?;
        return Ok(());
    }

    // All other commands require an IP address
    let ip = cli.ip.ok_or("IP address is required for this command. Use --ip <IP>")?;
    let fan = Fan::new(ip, None).with_port(cli.port);

    let result = match cli.command {
        Commands::Listen => unreachable!(),
        Commands::On => fan.turn_on().await,
        Commands::Off => fan.turn_off().await,
        Commands::Speed { level } => {
            let speed = FanSpeed::create(level).ok_or("speed must be between 0 and 6")?;
            fan.set_speed(speed).await
        }
        Commands::Delta { delta } => {
            let delta = SpeedDelta::create(delta).ok_or("delta must be -1 or between 1 and 5")?;
            fan.change_speed(delta).await
        }
        Commands::Led { state } => fan.set_led(state.into()).await,
        Commands::Timer { hours } => {
            let timer = Timer::create(hours).ok_or("timer must be between 0 and 4")?;
            fan.set_timer(timer).await
        }
        Commands::Sleep { state } => fan.set_sleep(state.into()).await,
    };

    result?;
    let history = fan.history().await;
    if let Some(entry) = history.entries().last() {
        println!("Sent to {}: {}", fan.addr(), entry.message);
    }

    Ok(())
}
