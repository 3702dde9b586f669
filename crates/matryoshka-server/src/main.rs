use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use matryoshka_server::{MatryoshkaServer, ServerConfig};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "matryoshka-server",
    about = "Serve the entries of a Matryoshka container over HTTP",
    version
)]
struct Args {
    /// The container file
    container: PathBuf,

    /// Address to listen on
    #[arg(long)]
    bind: Option<SocketAddr>,

    /// TOML file with server settings
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let filter = if args.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let mut config = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("cannot read config {}", path.display()))?;
            ServerConfig::from_toml(&text)
                .with_context(|| format!("in config {}", path.display()))?
        }
        None => ServerConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }

    let server = MatryoshkaServer::open(&args.container, config)
        .with_context(|| format!("cannot load {}", args.container.display()))?;
    server.serve().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_container_and_bind() {
        let args =
            Args::try_parse_from(["matryoshka-server", "a.mtr", "--bind", "0.0.0.0:9000"]).unwrap();
        assert_eq!(args.container, PathBuf::from("a.mtr"));
        assert_eq!(args.bind, Some("0.0.0.0:9000".parse().unwrap()));
        assert!(!args.verbose);
    }

    #[test]
    fn container_is_required() {
        assert!(Args::try_parse_from(["matryoshka-server"]).is_err());
    }

    #[tokio::test]
    async fn missing_container_fails_to_start() {
        let dir = tempfile::tempdir().unwrap();
        let args = Args::try_parse_from([
            "matryoshka-server",
            dir.path().join("none.mtr").to_str().unwrap(),
        ])
        .unwrap();
        assert!(run(args).await.is_err());
    }
}
