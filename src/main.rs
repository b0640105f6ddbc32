//! synthctl - inspect a device schema, build its parameter registry and
//! encode/decode sysex packets from the command line.

use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use synthctl::midi::{format_hex, is_sysex_frame, parse_hex};
use synthctl::{
    AppConfig, Controller, DeviceModel, DeviceSchema, MidiDataType, PacketValues,
    ParameterGroupStore,
};

/// synthctl - parameter registry and sysex codec for multi-part synthesizers
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "synthctl.yaml")]
    config: String,

    /// Schema document to use instead of the one named in the config
    #[arg(short, long)]
    schema: Option<String>,

    /// Device model (a, b, c, snow, ti, ti2), overrides the config
    #[arg(short, long)]
    model: Option<String>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// List parameter groups and descriptors
    #[arg(long)]
    list_params: bool,

    /// Encode the named packet
    #[arg(long, value_name = "PACKET")]
    encode: Option<String>,

    /// Field value for --encode, as type=value (e.g. part=2, value=64)
    #[arg(long = "value", value_name = "TYPE=VALUE")]
    values: Vec<String>,

    /// Decode bytes (see --hex) with the named packet
    #[arg(long, value_name = "PACKET")]
    decode: Option<String>,

    /// Bytes for --decode, e.g. "F0 00 20 33 ... F7"
    #[arg(long)]
    hex: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let args = Args::parse();

    init_logging(&args.log_level)?;

    let (schema_path, model, device_id) = resolve_target(&args).await?;
    info!("Schema: {} (model {})", schema_path, model);

    let schema = DeviceSchema::load(&schema_path).await?;

    // Public parameters live in the group store for the whole run
    let mut groups = ParameterGroupStore::new();
    let controller = Controller::new(schema, model, &mut groups).with_device_id(device_id);

    if args.list_params {
        list_params(&controller, &groups);
        return Ok(());
    }

    if let Some(packet) = &args.encode {
        let values = parse_values(&args.values)?;
        let bytes = controller.create_midi_data_from_packet(packet, &values)?;
        println!("{}", format_hex(&bytes).green());
        return Ok(());
    }

    if let Some(packet) = &args.decode {
        let text = args.hex.as_deref().context("--decode requires --hex")?;
        let bytes = parse_hex(text)?;
        if !is_sysex_frame(&bytes) {
            tracing::warn!("Input is not a complete sysex frame");
        }
        let values = controller.packets().decode(packet, &bytes)?;
        println!("\n{} {}", "Decoded".bold(), packet.cyan());
        for (data_type, value) in &values {
            println!("  {:<10} {}", data_type.to_string().yellow(), value);
        }
        return Ok(());
    }

    print_summary(&controller, &groups);
    Ok(())
}

async fn resolve_target(args: &Args) -> Result<(String, DeviceModel, u8)> {
    let config = if args.schema.is_some() && !std::path::Path::new(&args.config).exists() {
        None
    } else {
        Some(AppConfig::load(&args.config).await?)
    };

    let schema_path = match (&args.schema, &config) {
        (Some(schema), _) => schema.clone(),
        (None, Some(config)) => config.schema_path(&args.config).display().to_string(),
        (None, None) => anyhow::bail!("No schema given"),
    };

    let model = match &args.model {
        Some(name) => DeviceModel::from_str(name)
            .with_context(|| format!("Unknown device model: {}", name))?,
        None => config
            .as_ref()
            .map(|c| c.device.model)
            .unwrap_or(DeviceModel::C),
    };

    let device_id = config
        .as_ref()
        .map(|c| c.device.device_id)
        .unwrap_or(synthctl::controller::DEFAULT_DEVICE_ID);

    Ok((schema_path, model, device_id))
}

/// Parse `type=value` pairs into a packet value map
fn parse_values(pairs: &[String]) -> Result<PacketValues> {
    let mut values = PacketValues::new();
    for pair in pairs {
        let (name, value) = pair
            .split_once('=')
            .with_context(|| format!("Expected type=value, got '{}'", pair))?;
        let data_type = MidiDataType::from_name(name.trim())
            .with_context(|| format!("Unknown field type: {}", name))?;
        let value = value.trim();
        let value = match value.strip_prefix("0x") {
            Some(hex) => u16::from_str_radix(hex, 16),
            None => value.parse::<u16>(),
        }
        .with_context(|| format!("Invalid value for {}: {}", data_type, value))?;
        values.insert(data_type, value);
    }
    Ok(values)
}

fn print_summary(controller: &Controller, groups: &ParameterGroupStore) {
    println!("\n{}", "=== Device Schema ===".bold().cyan());
    println!("  Model: {}", controller.model().to_string().green());
    println!("  Parts: {}", controller.part_count().to_string().green());
    println!(
        "  Descriptions: {}",
        controller.descriptions().len().to_string().green()
    );
    println!(
        "  Instances: {} ({} public, {} internal)",
        controller.registry().instance_count().to_string().green(),
        groups.parameter_count(),
        controller.registry().internal_instances().count()
    );

    println!("\n{}", "Packets:".bold());
    for name in controller.packets().names() {
        if let Some(packet) = controller.midi_packet(name) {
            let fields: Vec<String> = packet.fields().iter().map(|f| f.to_string()).collect();
            println!(
                "  {} ({} bytes): {}",
                name.yellow(),
                packet.len(),
                fields.join(", ")
            );
        }
    }
}

fn list_params(controller: &Controller, groups: &ParameterGroupStore) {
    println!("\n{}", "=== Parameter Groups ===".bold().cyan());
    for group in groups.groups() {
        println!("  {} ({} parameters)", group.name.yellow(), group.len());
    }

    println!("\n{}", "Descriptions:".bold());
    for (i, desc) in controller.descriptions().descriptions().iter().enumerate() {
        let classes = desc.classes.to_string();
        println!(
            "  {:>4} {:<24} page {:>3} idx {:>3} [{}..{}] {}{}",
            i,
            desc.name.bright_white(),
            desc.page,
            desc.index,
            desc.range.min,
            desc.range.max,
            if desc.is_public { "" } else { "internal " },
            classes.cyan()
        );
    }
}

fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false),
        )
        .init();

    Ok(())
}
