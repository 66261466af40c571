//! `ground-station` - receive, decode and stream rocket telemetry.

use clap::Parser;

use ground_station::cli::{Cli, Command, ConfigCommand, DecodeCommand, MissionsCommand};
use ground_station::mission::list_missions;
use ground_station::protocol::parse_hex_transmission;
use ground_station::transport::list_ports;
use ground_station::{Config, GroundStation, init_logging};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    init_logging(cli.verbosity());

    let config = Config::load_from(cli.config.clone())?;

    match cli.command {
        Command::Run => {
            tracing::info!("ground station {} starting", env!("CARGO_PKG_VERSION"));
            GroundStation::new(config).run().await?;
        }
        Command::Ports => handle_ports()?,
        Command::Decode(decode) => handle_decode(&config, &decode)?,
        Command::Missions(missions) => handle_missions(&config, missions).await?,
        Command::Config(config_cmd) => handle_config(&config, &config_cmd)?,
    }
    Ok(())
}

fn handle_ports() -> Result<(), Box<dyn std::error::Error>> {
    let ports = list_ports()?;
    if ports.is_empty() {
        println!("No serial ports found");
    }
    for port in ports {
        println!("{port}");
    }
    Ok(())
}

fn handle_decode(config: &Config, cmd: &DecodeCommand) -> Result<(), Box<dyn std::error::Error>> {
    let transmission = parse_hex_transmission(&cmd.hex, &config.telemetry.approved_call_signs)?;
    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&transmission.to_json())?);
    } else {
        print!("{transmission}");
    }
    Ok(())
}

async fn handle_missions(
    config: &Config,
    cmd: MissionsCommand,
) -> Result<(), Box<dyn std::error::Error>> {
    let dir = cmd.dir.unwrap_or_else(|| config.telemetry.missions_dir.clone());
    let missions = list_missions(&dir).await?;

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&missions)?);
        return Ok(());
    }

    if missions.is_empty() {
        println!("No missions in {}", dir.display());
    }
    for mission in missions {
        println!(
            "{:<24} {:>6} sectors  epoch {:<12} v{}",
            mission.name, mission.length, mission.epoch, mission.version
        );
    }
    Ok(())
}

fn handle_config(config: &Config, cmd: &ConfigCommand) -> Result<(), Box<dyn std::error::Error>> {
    match cmd {
        ConfigCommand::Show { json } => {
            if *json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                let params = &config.radio.parameters;
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Station]");
                println!("  Call sign:          {}", config.station.call_sign);
                println!();
                println!("[Telemetry]");
                println!("  Buffer size:        {}", config.telemetry.buffer_size);
                println!(
                    "  Missions dir:       {}",
                    config.telemetry.missions_dir.display()
                );
                println!(
                    "  Approved signs:     {}",
                    config.telemetry.approved_call_signs.join(", ")
                );
                println!();
                println!("[Radio]");
                println!("  Baud rate:          {}", config.radio.baud_rate);
                println!("  Modulation:         {}", params.modulation);
                println!("  Frequency:          {} Hz", params.frequency);
                println!("  Power:              {} dBm", params.power);
                println!("  Spread factor:      sf{}", params.spread_factor);
                println!("  Coding rate:        {}", params.coding_rate);
                println!("  Bandwidth:          {} kHz", params.bandwidth);
                println!("  Sync word:          {}", params.sync_word);
                println!();
                println!("[WebSocket]");
                println!("  Address:            {}", config.websocket_address());
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
    }
    Ok(())
}
