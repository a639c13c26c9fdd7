//! ISO 15118-20 Harness - scripted EV against the EVSE session engine
//!
//! This CLI tool runs complete d20 sessions in-process:
//! - `run` - Play one AC or DC session with a simulated charger
//! - `config` - Print the default EVSE setup as JSON

mod charger;
mod ev;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use iso20_core::config::{AcTransferLimits, ControlMobilityNeedsModes, DcTransferLimits, Limits, PowerCurrentLimits};
use iso20_core::message::datatypes::{ControlMode, MobilityNeedsMode, RationalNumber, ServiceCategory};
use iso20_core::{memory_pipe, EvseSetupConfig, JsonCodec, RecordingFeedback, Session};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use charger::{ChargerFeedback, ChargerProfile};
use ev::{EnergyMode, Script, ScriptedEv};

#[derive(Parser)]
#[command(name = "iso20-harness")]
#[command(about = "Scripted EV driving an ISO 15118-20 EVSE session")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one charging session
    Run {
        /// Energy transfer to negotiate
        #[arg(short, long, value_enum, default_value = "dc")]
        mode: EnergyMode,

        /// EVSE setup JSON; defaults to a 150 kW DC / 22 kW AC charger
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Number of charge loop requests
        #[arg(short, long, default_value = "5")]
        loops: usize,

        /// End with SessionStop(Pause) instead of Terminate
        #[arg(long)]
        pause: bool,

        /// EV target voltage for DC sessions
        #[arg(long, default_value = "400")]
        voltage: f32,

        /// EV target current for DC sessions
        #[arg(long, default_value = "50")]
        current: f32,

        /// Path to write a JSON session summary
        #[arg(long)]
        summary: Option<PathBuf>,
    },

    /// Print the default EVSE setup as JSON
    Config,
}

fn default_setup() -> EvseSetupConfig {
    let dc = DcTransferLimits {
        charge_limits: PowerCurrentLimits {
            power: Limits::new(RationalNumber::new(150, 3), RationalNumber::new(1, 3)),
            current: Limits::new(RationalNumber::new(400, 0), RationalNumber::new(1, 0)),
        },
        discharge_limits: None,
        voltage: Limits::new(RationalNumber::new(900, 0), RationalNumber::new(150, 0)),
        power_ramp_limit: None,
    };
    let ac = AcTransferLimits {
        charge_power: Limits::new(RationalNumber::new(22, 3), RationalNumber::new(14, 2)),
        discharge_power: None,
        nominal_frequency: RationalNumber::new(50, 0),
        max_power_asymmetry: None,
        power_ramp_limitation: None,
    };

    EvseSetupConfig::new("DE*PNX*E12345*1", vec![ServiceCategory::Dc, ServiceCategory::Ac])
        .with_dc_limits(dc)
        .with_ac_limits(ac)
        .with_control_mobility_modes(vec![
            ControlMobilityNeedsModes::new(ControlMode::Scheduled, MobilityNeedsMode::ProvidedByEvcc),
            ControlMobilityNeedsModes::new(ControlMode::Dynamic, MobilityNeedsMode::ProvidedBySecc),
        ])
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging; RUST_LOG wins over --verbose
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if cli.verbose { "debug" } else { "info" }));

    fmt().with_env_filter(filter).with_target(false).init();

    match cli.command {
        Commands::Run { mode, config, loops, pause, voltage, current, summary } => {
            let setup = match config {
                Some(path) => {
                    info!("Loading EVSE setup from {}", path.display());
                    EvseSetupConfig::from_json(&std::fs::read_to_string(&path)?)?
                }
                None => default_setup(),
            };

            let record = RecordingFeedback::new();
            let (feedback, signals) = ChargerFeedback::new(record.clone());
            let (evse, peer) = memory_pipe();
            let (session, control) = Session::new(Box::new(evse), &setup, Box::new(feedback), Box::new(JsonCodec::new()));

            let profile = ChargerProfile { voltage, current, ..Default::default() };
            let charger = tokio::spawn(charger::run(signals, control, profile));

            let script = Script { mode, charge_loops: loops, pause, target_voltage: voltage, target_current: current };
            info!("Running {:?} session with {} charge loops", mode, loops);

            let mut ev = ScriptedEv::new(session, peer);
            let outcome = ev.run(&script).await;
            match &outcome {
                Ok(()) => charger.await?,
                Err(e) => {
                    error!("Session failed in {}: {}", ev.session().state_name(), e);
                    // the link may still be up, so the charger would wait forever
                    charger.abort();
                }
            }

            let record = record.record().clone();
            println!("\nSession Summary:");
            println!("  Final state: {}", ev.session().state_name());
            println!("  Messages exchanged: {}", ev.exchanged());
            println!("  Signals: {:?}", record.signals);
            println!(
                "  Failures: {}",
                record.response_codes.iter().filter(|c| c.is_failure()).count()
            );

            if let Some(path) = summary {
                let json = serde_json::json!({
                    "mode": format!("{:?}", mode),
                    "success": outcome.is_ok(),
                    "final_state": ev.session().state_name(),
                    "messages": ev.exchanged(),
                    "signals": record.signals.iter().map(|s| format!("{:?}", s)).collect::<Vec<_>>(),
                    "response_codes": record.response_codes,
                    "states": ev.session().log().state_history(),
                });
                std::fs::write(&path, serde_json::to_string_pretty(&json)?)?;
                info!("Summary written to: {}", path.display());
            }

            outcome?;
        }

        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&default_setup())?);
        }
    }

    Ok(())
}
