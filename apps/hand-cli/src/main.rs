use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::thread;
use std::time::Duration;
use tracing::{info, warn};

use hand_control as hc;
use hand_control::protocol::{Generation, RegisterMap, TactileFrame, TactileSite};
use hand_control::transport::{MockLine, MockRegisterBus, ModbusTcpBus, SerialLine, SerialPortLine};
use hand_control::{HandConfig, HandController, ModbusHand, SerialHand, TransportConfig};

#[derive(Parser, Debug)]
#[command(
    name = "hand",
    version,
    about = "Dexterous hand control CLI",
    disable_help_subcommand = true
)]
struct Cli {
    /// Use in-process mock transports (no hardware)
    #[arg(long, action = ArgAction::SetTrue, global = true)]
    mock: bool,

    /// YAML config file (see HandConfig)
    #[arg(long, global = true)]
    config: Option<String>,

    /// Transport, overriding the config file
    #[arg(long, value_enum, global = true)]
    transport: Option<TransportKind>,

    /// Hardware generation (3 or 4)
    #[arg(long, global = true)]
    generation: Option<u8>,

    /// Serial device path
    #[arg(long, global = true)]
    port: Option<String>,

    /// Serial baud rate
    #[arg(long, global = true)]
    baudrate: Option<u32>,

    /// Serial hand id
    #[arg(long, global = true)]
    hand_id: Option<u8>,

    /// Modbus host
    #[arg(long, global = true)]
    host: Option<String>,

    /// Modbus TCP port
    #[arg(long, global = true)]
    tcp_port: Option<u16>,

    /// Log every frame / register exchange at debug level
    #[arg(long, action = ArgAction::SetTrue, global = true)]
    debug: bool,

    /// Print Prometheus counters after the command
    #[arg(long, action = ArgAction::SetTrue, global = true)]
    metrics: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum TransportKind {
    Serial,
    Modbus,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum VectorKind {
    Angle,
    Pos,
    Speed,
    Force,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Reading {
    AngleActual,
    AngleSet,
    PosActual,
    PosSet,
    SpeedSet,
    ForceActual,
    ForceSet,
    Current,
    Error,
    Temperature,
    Status,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List serial ports
    Ports,
    /// Print the register table for a generation
    Registers {
        /// Only this category (e.g. touch_sensor)
        #[arg(long)]
        category: Option<String>,
        /// Emit JSON instead of a table
        #[arg(long, action = ArgAction::SetTrue)]
        json: bool,
    },
    /// Open the hand fully
    Open,
    /// Close the hand fully
    Close,
    /// Drive every joint to zero
    Zero,
    /// Clear latched errors
    ResetError,
    /// Send a six-joint vector
    Set {
        #[arg(value_enum)]
        kind: VectorKind,
        /// Six comma-separated values in [0, 1000]; -1 leaves a joint unchanged (Modbus only)
        #[arg(value_delimiter = ',', allow_hyphen_values = true, required = true)]
        values: Vec<i32>,
    },
    /// Read a six-joint register
    Get {
        #[arg(value_enum)]
        what: Reading,
        /// Keep polling this many times
        #[arg(long, default_value_t = 1u32)]
        count: u32,
        /// Delay between polls
        #[arg(long, default_value_t = 100u64)]
        interval_ms: u64,
    },
    /// Read tactile frames (Gen4 over Modbus)
    Tactile {
        /// Single pad instead of a full frame (e.g. palm, thumb_base)
        #[arg(long)]
        site: Option<String>,
        /// Number of frames
        #[arg(long, default_value_t = 1u32)]
        count: u32,
        /// Delay between frames
        #[arg(long, default_value_t = 100u64)]
        interval_ms: u64,
        /// Append frames to this JSONL file
        #[arg(long)]
        to: Option<String>,
        /// Print each frame as JSON instead of a summary
        #[arg(long, action = ArgAction::SetTrue)]
        json: bool,
    },
    /// Select or run a stored action sequence (Gen3)
    Sequence {
        /// Sequence index to select
        #[arg(long)]
        select: Option<u8>,
        /// Run the selected sequence
        #[arg(long, action = ArgAction::SetTrue)]
        run: bool,
    },
    /// Probe a fixed set of registers
    Validate {
        /// Print the full verification report
        #[arg(long, action = ArgAction::SetTrue)]
        report: bool,
    },
}

fn main() -> Result<()> {
    setup_tracing();
    let cli = Cli::parse();
    let cfg = resolve_config(&cli)?;

    match &cli.command {
        Commands::Ports => return list_ports(cli.mock),
        Commands::Registers { category, json } => {
            return print_registers(cfg.generation, category.as_deref(), *json)
        }
        _ => {}
    }

    let hub = hc::MetricsHub::new().map_err(anyhow::Error::msg)?;
    let mut hand = build_controller(&cfg, cli.mock, hub.clone())?;
    info!(endpoint = %hand.endpoint(), generation = %hand.generation(), "connected");

    let outcome = run(&cli.command, hand.as_mut());
    if let Err(e) = hand.disconnect() {
        warn!(error = %e, "disconnect failed");
    }
    if cli.metrics {
        print!("{}", hub.encode_text());
    }
    outcome
}

fn setup_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn resolve_config(cli: &Cli) -> Result<HandConfig> {
    let mut cfg = match &cli.config {
        Some(path) => hc::load_hand_config(path)?,
        None => HandConfig::default(),
    };
    if let Some(g) = cli.generation {
        cfg.generation = Generation::try_from(g)?;
    }
    cfg.debug |= cli.debug;
    match cli.transport {
        Some(TransportKind::Serial) if !matches!(cfg.transport, TransportConfig::Serial(_)) => {
            cfg.transport = TransportConfig::Serial(hc::SerialConfig::default());
        }
        Some(TransportKind::Modbus) if !matches!(cfg.transport, TransportConfig::Modbus(_)) => {
            cfg.transport = TransportConfig::Modbus(hc::ModbusConfig::default());
        }
        _ => {}
    }
    match &mut cfg.transport {
        TransportConfig::Serial(s) => {
            if let Some(p) = &cli.port {
                s.port = p.clone();
            }
            if let Some(b) = cli.baudrate {
                s.baudrate = b;
            }
            if let Some(id) = cli.hand_id {
                s.hand_id = id;
            }
        }
        TransportConfig::Modbus(m) => {
            if let Some(h) = &cli.host {
                m.host = h.clone();
            }
            if let Some(p) = cli.tcp_port {
                m.port = p;
            }
        }
    }
    Ok(cfg)
}

fn build_controller(
    cfg: &HandConfig,
    mock: bool,
    hub: hc::MetricsHub,
) -> Result<Box<dyn HandController>> {
    let hand: Box<dyn HandController> = match (&cfg.transport, mock) {
        (TransportConfig::Serial(s), true) => {
            let mut hand = SerialHand::<MockLine>::new(s.clone(), cfg.generation)
                .with_debug(cfg.debug)
                .with_metrics(hub);
            hand.attach(MockLine::new());
            Box::new(hand)
        }
        (TransportConfig::Serial(s), false) => {
            let mut hand = SerialHand::<SerialPortLine>::new(s.clone(), cfg.generation)
                .with_debug(cfg.debug)
                .with_metrics(hub);
            hand.connect()
                .with_context(|| format!("opening serial port {}", s.port))?;
            Box::new(hand)
        }
        (TransportConfig::Modbus(m), true) => {
            let mut hand = ModbusHand::<MockRegisterBus>::new(m.clone(), cfg.generation)
                .with_debug(cfg.debug)
                .with_metrics(hub);
            hand.attach(MockRegisterBus::new());
            Box::new(hand)
        }
        (TransportConfig::Modbus(m), false) => {
            let mut hand = ModbusHand::<ModbusTcpBus>::new(m.clone(), cfg.generation)
                .with_debug(cfg.debug)
                .with_metrics(hub);
            hand.connect()
                .with_context(|| format!("connecting to {}", m.endpoint()))?;
            Box::new(hand)
        }
    };
    Ok(hand)
}

fn run(command: &Commands, hand: &mut dyn HandController) -> Result<()> {
    match command {
        Commands::Ports | Commands::Registers { .. } => Ok(()),
        Commands::Open => Ok(hand.perform_open()?),
        Commands::Close => Ok(hand.perform_close()?),
        Commands::Zero => Ok(hand.return_to_zero()?),
        Commands::ResetError => Ok(hand.reset_error()?),
        Commands::Set { kind, values } => {
            match kind {
                VectorKind::Angle => hand.set_angle(values)?,
                VectorKind::Pos => hand.set_pos(values)?,
                VectorKind::Speed => hand.set_speed(values)?,
                VectorKind::Force => hand.set_force(values)?,
            }
            Ok(())
        }
        Commands::Get {
            what,
            count,
            interval_ms,
        } => {
            for i in 0..*count {
                if i > 0 {
                    thread::sleep(Duration::from_millis(*interval_ms));
                }
                println!("{}", read_values(hand, *what)?);
            }
            Ok(())
        }
        Commands::Tactile {
            site,
            count,
            interval_ms,
            to,
            json,
        } => tactile(hand, site.as_deref(), *count, *interval_ms, to.as_deref(), *json),
        Commands::Sequence { select, run: start } => {
            if let Some(id) = select {
                hand.set_action_sequence(*id)?;
            }
            if *start {
                hand.run_action_sequence()?;
            }
            Ok(())
        }
        Commands::Validate { report } => {
            if *report {
                print!("{}", hand.verification_report()?);
            } else {
                for (name, ok) in hand.validate_registers()? {
                    println!("{name}\t{}", if ok { "ok" } else { "FAIL" });
                }
            }
            Ok(())
        }
    }
}

fn read_values(hand: &mut dyn HandController, what: Reading) -> Result<String> {
    let row = match what {
        Reading::AngleActual => hand.get_angle_actual()?.to_string(),
        Reading::AngleSet => hand.get_angle_set()?.to_string(),
        Reading::PosActual => hand.get_pos_actual()?.to_string(),
        Reading::PosSet => hand.get_pos_set()?.to_string(),
        Reading::SpeedSet => hand.get_speed_set()?.to_string(),
        Reading::ForceActual => hand.get_force_actual()?.to_string(),
        Reading::ForceSet => hand.get_force_set()?.to_string(),
        Reading::Current => hand.get_current()?.to_string(),
        Reading::Error => join_bytes(&hand.get_error()?),
        Reading::Temperature => join_bytes(&hand.get_temperature()?),
        Reading::Status => join_bytes(&hand.get_status()?),
    };
    Ok(row)
}

fn join_bytes(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| b.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

fn tactile(
    hand: &mut dyn HandController,
    site: Option<&str>,
    count: u32,
    interval_ms: u64,
    to: Option<&str>,
    json: bool,
) -> Result<()> {
    if let Some(name) = site {
        let site: TactileSite = name.parse().map_err(anyhow::Error::msg)?;
        let m = hand.get_tactile_site(site)?;
        for row in m.to_rows() {
            println!("{}", row.iter().map(|v| format!("{v:5}")).collect::<String>());
        }
        return Ok(());
    }

    let mut writer = match to {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("opening {path}"))?;
            Some(BufWriter::new(file))
        }
        None => None,
    };
    for i in 0..count {
        if i > 0 {
            thread::sleep(Duration::from_millis(interval_ms));
        }
        let frame = hand.get_tactile_frame()?;
        if let Some(w) = writer.as_mut() {
            serde_json::to_writer(&mut *w, &frame)?;
            w.write_all(b"\n")?;
        }
        if json {
            println!("{}", serde_json::to_string(&frame)?);
        } else {
            print_frame_summary(&frame);
        }
    }
    if let Some(mut w) = writer {
        w.flush()?;
    }
    Ok(())
}

fn print_frame_summary(frame: &TactileFrame) {
    for (site, m) in &frame.matrices {
        println!(
            "{site:<12} {}x{}\tmax={}",
            m.rows(),
            m.cols(),
            m.max().unwrap_or(0)
        );
    }
    for (site, reason) in &frame.faults {
        println!("{site:<12} FAULT\t{reason}");
    }
}

fn list_ports(mock: bool) -> Result<()> {
    let ports = if mock {
        MockLine::list()?
    } else {
        SerialPortLine::list()?
    };
    for p in ports {
        println!("{p}");
    }
    Ok(())
}

fn print_registers(generation: Generation, category: Option<&str>, json: bool) -> Result<()> {
    let map = RegisterMap::for_generation(generation);
    let rows = map.info();
    let rows: Vec<_> = rows
        .iter()
        .filter(|r| category.map_or(true, |c| r.category.as_str() == c))
        .collect();
    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }
    println!("# {generation}: {} registers", rows.len());
    for r in rows {
        let shape = r.shape.map(|s| s.to_string()).unwrap_or_default();
        println!(
            "{:<25} {:>5} {:<7} {:<16} {shape}",
            r.name.as_str(),
            r.address,
            r.hex_address,
            r.category.as_str()
        );
    }
    Ok(())
}
