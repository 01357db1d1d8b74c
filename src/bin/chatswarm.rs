//! chatswarm binary
//!
//! Usage: chatswarm [OPTIONS]
//!
//! Options:
//!   -c, --config <FILE>    Path to configuration file
//!   -a, --accounts <FILE>  Account list (overrides config)
//!   -p, --proxies <FILE>   Proxy list (overrides config)
//!       --channel <NAME>   Channel to join (overrides config)
//!   -h, --help             Print help information

use std::env;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use chatswarm::chat::Channel;
use chatswarm::swarm::config::{load_accounts, load_proxies};
use chatswarm::swarm::{Swarm, SwarmConfigFile};

#[derive(Debug, Default)]
struct Options {
    config: Option<PathBuf>,
    accounts: Option<PathBuf>,
    proxies: Option<PathBuf>,
    channel: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Respects RUST_LOG (e.g. RUST_LOG=chatswarm=debug)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    let options = match parse_args(&args) {
        Ok(Some(options)) => options,
        Ok(None) => {
            print_usage();
            return Ok(());
        }
        Err(message) => {
            eprintln!("Error: {}", message);
            print_usage();
            return Ok(());
        }
    };

    run(options).await
}

fn parse_args(args: &[String]) -> Result<Option<Options>, String> {
    let mut options = Options::default();
    let mut iter = args.iter();

    while let Some(arg) = iter.next() {
        let mut value = |flag: &str| {
            iter.next()
                .cloned()
                .ok_or_else(|| format!("{} requires a value", flag))
        };

        match arg.as_str() {
            "-h" | "--help" => return Ok(None),
            "-c" | "--config" => options.config = Some(value("--config")?.into()),
            "-a" | "--accounts" => options.accounts = Some(value("--accounts")?.into()),
            "-p" | "--proxies" => options.proxies = Some(value("--proxies")?.into()),
            "--channel" => options.channel = Some(value("--channel")?),
            other => return Err(format!("Unknown option: {}", other)),
        }
    }

    Ok(Some(options))
}

fn print_usage() {
    println!(
        r#"chatswarm - chat sessions over SOCKS5 proxies

USAGE:
    chatswarm [OPTIONS]

OPTIONS:
    -c, --config <FILE>    Path to configuration file (TOML)
    -a, --accounts <FILE>  Account list, one username:oauth:token per line
    -p, --proxies <FILE>   Proxy list, one [socks5://][user[:pass]@]host[:port] per line
        --channel <NAME>   Channel to join, without the leading #
    -h, --help             Print help information

CONFIGURATION FILE FORMAT (TOML):
    accounts_file = "accounts.txt"
    proxies_file = "proxies.txt"
    channel = "somechannel"
    destination_host = "irc.chat.twitch.tv"
    destination_port = 6667
    launch_delay_ms = 500

EXAMPLES:
    Run with lists in the current directory:
        chatswarm

    Run from a configuration file:
        chatswarm --config chatswarm.toml --channel somechannel
"#
    );
}

async fn run(options: Options) -> anyhow::Result<()> {
    let mut file = match &options.config {
        Some(path) => SwarmConfigFile::load(path)?,
        None => SwarmConfigFile::default(),
    };
    if let Some(path) = options.accounts {
        file.accounts_file = path;
    }
    if let Some(path) = options.proxies {
        file.proxies_file = path;
    }

    let accounts = load_accounts(&file.accounts_file)?;
    let proxies = load_proxies(&file.proxies_file)?;

    let channel = match options.channel.or_else(|| file.channel.clone()) {
        Some(name) => Channel::new(&name)?,
        None => Channel::new(&prompt_channel()?)?,
    };

    let config = file.to_config(channel)?;
    let destination = config.destination.clone();
    tracing::info!("Channel: {}", config.channel);

    let swarm = Swarm::new(config, proxies)?;
    tracing::info!(
        "Starting {} session(s) over {} proxy(ies) to {}",
        accounts.len(),
        swarm.proxies().len(),
        destination
    );

    let summary = swarm.run(accounts).await;

    for rejected in &summary.rejected {
        eprintln!(
            "Skipped account on line {} of {}: {}",
            rejected.line,
            file.accounts_file.display(),
            rejected.reason
        );
    }
    for report in summary.failed() {
        if let chatswarm::swarm::SessionOutcome::Failed(e) = &report.outcome {
            eprintln!("Session {} ({}) via {}: {}", report.index, report.username, report.proxy, e);
        }
    }

    println!("{}", swarm.metrics().format_report());
    Ok(())
}

fn prompt_channel() -> anyhow::Result<String> {
    print!("Enter the channel name (without #): ");
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line)
}
