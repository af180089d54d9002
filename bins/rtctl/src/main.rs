//! rtctl - inspect and drive the rtlink routing bridge.

mod commands;

use clap::{Parser, Subcommand};
use rtlink::{Session, SessionConfig};

#[derive(Parser)]
#[command(name = "rtctl", version, about = "Kernel routing bridge tool")]
struct Cli {
    /// Use IPv4 only.
    #[arg(short = '4', global = true, conflicts_with = "ipv6")]
    ipv4: bool,

    /// Use IPv6 only.
    #[arg(short = '6', global = true)]
    ipv6: bool,

    /// Output JSON.
    #[arg(short = 'j', long, global = true)]
    json: bool,

    /// Pretty print JSON.
    #[arg(short = 'p', long, global = true)]
    pretty: bool,

    /// Extra lookups while waiting for an interface to appear.
    #[arg(long, default_value_t = 10)]
    resolve_attempts: u32,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show network interfaces.
    #[command(visible_alias = "l")]
    Link(commands::link::LinkCmd),

    /// Manage interface addresses.
    #[command(visible_alias = "a", visible_alias = "addr")]
    Address(commands::address::AddressCmd),

    /// Manage the main routing table.
    #[command(visible_alias = "r")]
    Route(commands::route::RouteCmd),

    /// Watch link, address and route events.
    #[command(visible_alias = "m", visible_alias = "mon")]
    Monitor(commands::monitor::MonitorCmd),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let output = commands::Output {
        json: cli.json,
        pretty: cli.pretty,
    };

    let family = match (cli.ipv4, cli.ipv6) {
        (true, false) => Some(libc::AF_INET as u8),
        (false, true) => Some(libc::AF_INET6 as u8),
        _ => None,
    };

    let config = SessionConfig::default().with_resolve_attempts(cli.resolve_attempts);
    let session = Session::open(config).await?;

    let result = match cli.command {
        Command::Link(cmd) => cmd.run(&session, output),
        Command::Address(cmd) => cmd.run(&session).await,
        Command::Route(cmd) => cmd.run(&session, output, family).await,
        Command::Monitor(cmd) => cmd.run(&session, output).await,
    };

    session.close().await?;

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    Ok(())
}
