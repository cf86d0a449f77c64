//! gridlink - connection probe for the gridlink SQL driver
//!
//! Resolves a connection string (optionally through a DSN file), opens a
//! session and reports what the node answered.

use clap::{Parser, Subcommand};
use colored::Colorize;
use gridlink_client::{
    info_type, CallResult, Configuration, Connection, ConnectionInfo, DiagnosticRecord,
    DsnRegistry, InfoValue,
};
use std::path::PathBuf;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "gridlink")]
#[command(about = "Connection probe for the gridlink SQL driver")]
#[command(version)]
struct Cli {
    /// Connection string, e.g. "ADDRESS=db1:10800;SCHEMA=PUBLIC"
    #[arg(short, long, env = "GRIDLINK_CONNECT", default_value = "")]
    connect: String,

    /// Start from this DSN
    #[arg(short, long)]
    dsn: Option<String>,

    /// YAML file with DSN definitions
    #[arg(long, env = "GRIDLINK_DSN_FILE")]
    dsn_file: Option<PathBuf>,

    /// Apply GRIDLINK_ADDRESS, GRIDLINK_SCHEMA and GRIDLINK_PROTOCOL_VERSION
    #[arg(long)]
    env_overrides: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect, negotiate and disconnect
    Ping,

    /// Connect and print GetInfo values
    Info {
        /// Info type id (all known types if omitted)
        id: Option<u16>,
    },

    /// Print the effective configuration
    Config,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = resolve_config(&cli)?;

    match cli.command {
        Commands::Config => {
            print!("{}", serde_yaml::to_string(&config)?);
            println!("{}", config.to_connect_string().as_str().dimmed());
        }
        Commands::Ping => {
            let mut conn = Connection::new();
            let started = Instant::now();
            connect(&mut conn, config)?;

            let (host, port) = conn.configuration().endpoint()?;
            println!(
                "{} {}:{} protocol {} in {:.1?}",
                "Connected".green(),
                host.as_str().cyan(),
                port,
                conn.protocol_version()
                    .map(|v| v.to_string())
                    .unwrap_or_default(),
                started.elapsed()
            );

            report(&conn.release());
        }
        Commands::Info { id } => {
            let mut conn = Connection::new();
            connect(&mut conn, config)?;

            let version = conn.protocol_version().unwrap_or_default();
            let known = ConnectionInfo::new(conn.configuration(), version);

            let ids: Vec<u16> = match id {
                Some(id) => vec![id],
                None => (0..=u16::MAX)
                    .filter(|id| info_type::name(*id).is_some())
                    .collect(),
            };

            for id in ids {
                let mut buf = [0u8; 1024];
                let res = conn.get_info(id, &mut buf);
                report(&res);
                let Some(len) = res.value else {
                    continue;
                };

                let Some(kind) = known.value(id) else {
                    continue;
                };
                let value = match kind {
                    InfoValue::Str(_) => {
                        let end = buf.iter().position(|&b| b == 0).unwrap_or(len);
                        String::from_utf8_lossy(&buf[..end]).into_owned()
                    }
                    InfoValue::U16(_) => u16::from_ne_bytes([buf[0], buf[1]]).to_string(),
                    InfoValue::U32(_) => {
                        u32::from_ne_bytes([buf[0], buf[1], buf[2], buf[3]]).to_string()
                    }
                };

                println!(
                    "{:>32} ({:>5}) = {}",
                    info_type::name(id).unwrap_or("?").bold(),
                    id,
                    value
                );
            }

            report(&conn.release());
        }
    }

    Ok(())
}

fn resolve_config(cli: &Cli) -> Result<Configuration, Box<dyn std::error::Error>> {
    let registry = match &cli.dsn_file {
        Some(path) => DsnRegistry::from_file(path)?,
        None => DsnRegistry::load()?,
    };

    let connect = match &cli.dsn {
        Some(dsn) => format!("DSN={{{}}};{}", dsn, cli.connect),
        None => cli.connect.clone(),
    };

    let mut config = Configuration::resolve(&connect, &registry)?;
    if cli.env_overrides {
        config.apply_env_overrides();
    }
    tracing::debug!("Resolved configuration: {}", config.to_connect_string());
    Ok(config)
}

fn connect(conn: &mut Connection, config: Configuration) -> Result<(), Box<dyn std::error::Error>> {
    let res = conn.establish(config);
    report(&res);
    if res.is_error() {
        return Err("Connection failed".into());
    }
    Ok(())
}

fn report<T>(res: &CallResult<T>) {
    for record in &res.diagnostics {
        print_record(record);
    }
}

fn print_record(record: &DiagnosticRecord) {
    let label = if record.sql_state().is_warning() {
        "Warning".yellow()
    } else {
        "Error".red()
    };
    eprintln!(
        "{} [{}] {}",
        label,
        record.sql_state().as_str().bold(),
        record.message()
    );
}
