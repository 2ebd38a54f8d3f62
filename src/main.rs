use anyhow::{anyhow, Context};
use clap::Parser;
use log::{error, warn};
use std::process::ExitCode;
use tokio::net::lookup_host;
use tokio::signal;
use tokio::time::Duration;

use tftp_client::{Cli, Client, ClientConfig, Error, ErrorKind, Operation};

#[tokio::main]
async fn main() -> ExitCode {
    let args = Cli::parse();

    let level = match args.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    // Dropping the transfer future on Ctrl-C closes the socket and the file.
    tokio::select! {
        res = run(args) => match res {
            Ok(()) => ExitCode::SUCCESS,
            Err(err) => {
                error!("{err:#}");
                exit_code(&err)
            }
        },
        _ = signal::ctrl_c() => {
            warn!("transfer cancelled");
            ExitCode::from(130)
        }
    }
}

async fn run(args: Cli) -> anyhow::Result<()> {
    let server = lookup_host((args.host.as_str(), args.port))
        .await
        .map_err(Error::Socket)
        .with_context(|| format!("cannot resolve {}", args.host))?
        .next()
        .ok_or(anyhow!("no address for {}", args.host))?;

    let config = ClientConfig::new(server)
        .with_mode(args.mode)
        .with_timeout(Duration::from_millis(args.timeout))
        .with_max_retries(args.retry);
    let client = Client::new(config);
    let local = args.local_path()?;

    match args.operation {
        Operation::Get => {
            client
                .get_file(&args.filename, &local)
                .await
                .with_context(|| format!("get {} failed", args.filename))?;
        }
        Operation::Put => {
            client
                .put_file(&local, &args.filename)
                .await
                .with_context(|| format!("put {} failed", local.display()))?;
        }
    }
    Ok(())
}

fn exit_code(err: &anyhow::Error) -> ExitCode {
    let kind = err
        .chain()
        .find_map(|e| e.downcast_ref::<Error>())
        .map(Error::kind);
    match kind {
        Some(ErrorKind::Protocol) => ExitCode::from(1),
        Some(ErrorKind::LocalIo) => ExitCode::from(3),
        Some(ErrorKind::Network) => ExitCode::from(4),
        None => ExitCode::FAILURE,
    }
}
