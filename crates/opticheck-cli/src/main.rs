use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use opticheck_core::{load_gallery, OnnxFaceEncoder};
use opticheck_hw::{Camera, V4lDevice};
use opticheck_workflow::{
    derive_insights, verify_identity, BloodPressure, Config, SimulatedVitals, StressLevel, VitalsSnapshot,
    VitalsSource,
};
use tracing_subscriber::EnvFilter;

mod terminal;

#[derive(Parser)]
#[command(name = "opticheck", about = "OptiCheck face-verified health check-in")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an interactive check-in session
    Checkin,
    /// Run one recognition attempt and print the result as JSON
    Identify,
    /// List the reference identities found in the gallery directory
    Gallery,
    /// List V4L2 capture devices
    Devices,
    /// Print the health insights for a vitals reading
    Insights {
        #[arg(long, default_value_t = 72)]
        heart_rate: u32,
        #[arg(long, default_value = "120/80")]
        blood_pressure: BloodPressure,
        #[arg(long, default_value_t = 16)]
        respiratory_rate: u32,
        #[arg(long, default_value = "low")]
        stress_level: StressLevel,
        #[arg(long, default_value_t = 24.5)]
        bmi: f64,
        #[arg(long, default_value_t = 98)]
        oxygen_saturation: u32,
    },
}

fn main() -> Result<()> {
    // Logs go to stderr so the interactive session owns stdout.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();

    match cli.command {
        Commands::Checkin => {
            let encoder = load_encoder(&config)?;
            terminal::run(&config, encoder)?;
        }
        Commands::Identify => {
            let mut encoder = load_encoder(&config)?;
            let mut device = V4lDevice::new(config.camera_index);
            let result = verify_identity(&mut device, &mut encoder, &config.gallery_dir, &config.match_settings())?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::Gallery => {
            let mut encoder = load_encoder(&config)?;
            let gallery = load_gallery(&config.gallery_dir, &mut encoder)?;
            for identity in gallery.identities() {
                println!("{}", identity.label);
            }
            for skipped in gallery.skipped() {
                println!("warning: {skipped}");
            }
        }
        Commands::Devices => {
            let devices = Camera::list_devices();
            if devices.is_empty() {
                println!("No V4L2 capture devices found");
            }
            for dev in devices {
                println!("{}  {} (driver: {}, bus: {})", dev.path, dev.name, dev.driver, dev.bus);
            }
        }
        Commands::Insights {
            heart_rate,
            blood_pressure,
            respiratory_rate,
            stress_level,
            bmi,
            oxygen_saturation,
        } => {
            let vitals = VitalsSnapshot {
                heart_rate,
                blood_pressure,
                respiratory_rate,
                stress_level,
                bmi,
                oxygen_saturation,
                ..SimulatedVitals.generate()
            };
            let insights: Vec<&str> = derive_insights(&vitals).iter().map(|i| i.message()).collect();
            let report = serde_json::json!({ "vitals": vitals, "insights": insights });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}

fn load_encoder(config: &Config) -> Result<OnnxFaceEncoder> {
    OnnxFaceEncoder::load(&config.scrfd_model_path(), &config.arcface_model_path())
        .with_context(|| format!("loading face models from {}", config.model_dir.display()))
}
