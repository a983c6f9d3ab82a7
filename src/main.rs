use anyhow::{Context, Result};
use clap::error::ErrorKind as ClapErrorKind;
use clap::Parser;
use smpc_rsa_proxy::{Action, FileStorage, Proxy, Report, Role};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const USAGE: &str = "USAGE: smpc-rsa-proxy [mode] [action]
    Modes: client-sign, client-full, server
    Actions:
        generate - Set the [client-sign] keys or
                   Generate the [client-full|server] keys
        sign - Sign the message
        reset - Reset the applet";

#[derive(Parser)]
#[command(name = "smpc-rsa-proxy", version)]
#[command(about = "SMPC RSA proxy - relays key and signature shares to the smart card applets", long_about = None)]
struct Cli {
    /// Role of the card in the reader
    #[arg(value_enum)]
    mode: Role,

    /// What to do with the card
    #[arg(value_enum)]
    action: Action,

    /// Directory holding the share records (client_card.key, message.txt, ...)
    #[arg(long, default_value = ".")]
    dir: PathBuf,

    /// Use the first reader whose name contains this text
    #[arg(long)]
    reader: Option<String>,

    /// Trace every command and response sent to the card
    #[arg(long, default_value = "false")]
    debug: bool,

    /// Print the result as JSON
    #[arg(long, default_value = "false")]
    json: bool,
}

fn init_tracing(debug: bool) {
    let env_filter = if debug {
        EnvFilter::new("smpc_rsa_proxy=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| "smpc_rsa_proxy=warn".into())
    };
    let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

#[cfg(feature = "pcsc")]
fn transport(cli: &Cli) -> smpc_rsa_proxy::card::PcscTransport {
    smpc_rsa_proxy::card::PcscTransport::new(cli.reader.clone())
}

#[cfg(not(feature = "pcsc"))]
fn transport(cli: &Cli) -> smpc_rsa_proxy::card::NoReader {
    if cli.reader.is_some() {
        tracing::warn!("--reader has no effect without reader support");
    }
    smpc_rsa_proxy::card::NoReader
}

fn print_steps(report: &Report) {
    for step in &report.steps {
        println!("{step} OK");
    }
}

fn print_report(report: &Report, json: bool) -> Result<()> {
    if json {
        let out = serde_json::to_string_pretty(report).context("Failed to encode result")?;
        println!("{out}");
        return Ok(());
    }

    print_steps(report);
    for slot in &report.written {
        println!("Wrote {slot}");
    }
    Ok(())
}

fn run(cli: &Cli) -> Result<()> {
    let store = FileStorage::new(cli.dir.clone())?;

    if !cli.json {
        println!("*** SMPC RSA {} PROXY ***", cli.mode.title());
    }

    let mut proxy = Proxy::connect(cli.mode, transport(cli))?;
    let mut report = Report::new(cli.mode, cli.action);
    let result = proxy.execute(cli.action, &store, &mut report);
    drop(proxy);

    if let Err(e) = result {
        // show how far the action got
        if !cli.json {
            print_steps(&report);
        }
        return Err(e.into());
    }
    print_report(&report, cli.json)
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e)
            if matches!(
                e.kind(),
                ClapErrorKind::DisplayHelp | ClapErrorKind::DisplayVersion
            ) =>
        {
            e.exit()
        }
        Err(e) => {
            eprintln!("{e}");
            eprintln!("{USAGE}");
            return ExitCode::FAILURE;
        }
    };

    init_tracing(cli.debug);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("NOK");
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}
