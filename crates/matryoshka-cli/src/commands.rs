use std::fs;
use std::io::{self, Write};
use std::path::Path;

use anyhow::{bail, Context};
use colored::Colorize;
use matryoshka_vfs::{ChunkSize, Container, ContainerConfig, ErrorKind, Status, VfsError};
use serde::Serialize;

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let mut config = load_config(cli.config.as_deref())?;
    config.create_if_missing &= cli.command.creates_container();
    let format = cli.format;

    let mut container = Container::load_with(&cli.container, config)
        .with_context(|| format!("cannot load {}", cli.container.display()))?;

    match cli.command {
        Command::List(args) => cmd_list(&container, args, format),
        Command::Push(args) => cmd_push(&mut container, args, format),
        Command::Pull(args) => cmd_pull(&container, args, format),
        Command::Cat(args) => cmd_cat(&container, args),
        Command::Size(args) => cmd_size(&container, args, format),
        Command::Rm(args) => cmd_rm(&mut container, args, format),
        Command::Compact => cmd_compact(&mut container, format),
        Command::Info => cmd_info(&container, format),
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<ContainerConfig> {
    let Some(path) = path else {
        return Ok(ContainerConfig::default());
    };
    let text = fs::read_to_string(path)
        .with_context(|| format!("cannot read config {}", path.display()))?;
    let config = ContainerConfig::from_toml(&text)
        .with_context(|| format!("in config {}", path.display()))?;
    tracing::debug!(?config, "loaded configuration");
    Ok(config)
}

/// Process exit code for a failed command.
pub fn exit_code(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<VfsError>().map(VfsError::kind) {
        Some(ErrorKind::Corrupt) => 2,
        Some(ErrorKind::NotFound) | Some(ErrorKind::SourceNotFound) => 3,
        Some(ErrorKind::DuplicatePath) => 4,
        Some(ErrorKind::IoFailure) => 5,
        Some(ErrorKind::InvalidHandle) => 6,
        Some(ErrorKind::InvalidArgument) | Some(ErrorKind::OutOfBounds) => 7,
        None => 1,
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[derive(Serialize)]
struct Listing<'a> {
    path: &'a str,
    size: u64,
    chunks: usize,
}

fn cmd_list(container: &Container, args: ListArgs, format: OutputFormat) -> anyhow::Result<()> {
    let mut rows = Vec::new();
    for path in container.find(args.prefix.as_deref())? {
        let entry = container.stat(container.open(path)?)?;
        rows.push(Listing {
            path,
            size: entry.size,
            chunks: entry.chunk_count(),
        });
    }

    match format {
        OutputFormat::Json => print_json(&rows),
        OutputFormat::Text => {
            for row in &rows {
                if args.long {
                    println!(
                        "{:>12}  {:>6}  {}",
                        row.size.to_string().bold(),
                        row.chunks.to_string().dimmed(),
                        row.path
                    );
                } else {
                    println!("{}", row.path);
                }
            }
            Ok(())
        }
    }
}

#[derive(Serialize)]
struct Outcome<'a> {
    #[serde(flatten)]
    status: Status,
    path: &'a str,
    bytes: u64,
}

fn cmd_push(container: &mut Container, args: PushArgs, format: OutputFormat) -> anyhow::Result<()> {
    let chunk_size = args
        .chunk_size
        .map(ChunkSize::from_raw)
        .unwrap_or_else(|| container.config().default_chunk());
    let handle = container
        .push(&args.destination, &args.source, chunk_size)
        .with_context(|| format!("cannot push {}", args.source.display()))?;
    let entry = container.stat(handle)?;

    match format {
        OutputFormat::Json => print_json(&Outcome {
            status: Status::ok(),
            path: entry.path.as_str(),
            bytes: entry.size,
        }),
        OutputFormat::Text => {
            println!(
                "{} Pushed {} ({} bytes in {} chunks, {})",
                "✓".green().bold(),
                entry.path.as_str().bold(),
                entry.size,
                entry.chunk_count(),
                chunk_size.to_string().cyan()
            );
            Ok(())
        }
    }
}

fn cmd_pull(container: &Container, args: PullArgs, format: OutputFormat) -> anyhow::Result<()> {
    if !args.force && args.destination.exists() {
        bail!(
            "{} already exists (use --force to overwrite)",
            args.destination.display()
        );
    }
    let handle = container.open(&args.source)?;
    let bytes = container
        .pull(handle, &args.destination)
        .with_context(|| format!("cannot pull {}", args.source))?;

    match format {
        OutputFormat::Json => print_json(&Outcome {
            status: Status::ok(),
            path: &args.source,
            bytes,
        }),
        OutputFormat::Text => {
            println!(
                "{} Pulled {} to {} ({} bytes)",
                "✓".green().bold(),
                args.source.bold(),
                args.destination.display(),
                bytes
            );
            Ok(())
        }
    }
}

fn cmd_cat(container: &Container, args: CatArgs) -> anyhow::Result<()> {
    let handle = container.open(&args.path)?;
    let size = container.get_size(handle)?;
    let length = args
        .length
        .unwrap_or_else(|| size.saturating_sub(args.offset));
    let bytes = container.read_range(handle, args.offset, length)?;

    let mut stdout = io::stdout().lock();
    stdout.write_all(&bytes)?;
    stdout.flush()?;
    Ok(())
}

fn cmd_size(container: &Container, args: SizeArgs, format: OutputFormat) -> anyhow::Result<()> {
    let handle = container.open(&args.path)?;
    let size = container.get_size(handle)?;
    match format {
        OutputFormat::Json => print_json(&Outcome {
            status: Status::ok(),
            path: &args.path,
            bytes: size,
        }),
        OutputFormat::Text => {
            println!("{size}");
            Ok(())
        }
    }
}

fn cmd_rm(container: &mut Container, args: RmArgs, format: OutputFormat) -> anyhow::Result<()> {
    let mut outcomes = Vec::with_capacity(args.paths.len());
    let mut failed = 0usize;
    for path in &args.paths {
        let result = container.open(path).and_then(|handle| {
            let size = container.get_size(handle)?;
            container.delete(handle)?;
            Ok(size)
        });
        let status = Status::from_result(&result);
        if !status.is_ok() {
            failed += 1;
        }
        if format == OutputFormat::Text {
            match &result {
                Ok(_) => println!("{} Deleted {}", "✓".green().bold(), path.bold()),
                Err(err) => eprintln!("{} {}: {}", "✗".red().bold(), path.bold(), err),
            }
        }
        outcomes.push(Outcome {
            status,
            path: path.as_str(),
            bytes: result.unwrap_or(0),
        });
    }

    if format == OutputFormat::Json {
        print_json(&outcomes)?;
    }
    if failed > 0 {
        bail!("{failed} of {} deletions failed", args.paths.len());
    }
    Ok(())
}

fn cmd_compact(container: &mut Container, format: OutputFormat) -> anyhow::Result<()> {
    let reclaimed = container.compact().context("compaction failed")?;
    match format {
        OutputFormat::Json => print_json(&serde_json::json!({ "reclaimed": reclaimed })),
        OutputFormat::Text => {
            println!(
                "{} Compacted {} ({} bytes reclaimed)",
                "✓".green().bold(),
                container.location().bold(),
                reclaimed
            );
            Ok(())
        }
    }
}

fn cmd_info(container: &Container, format: OutputFormat) -> anyhow::Result<()> {
    let info = container.info()?;
    match format {
        OutputFormat::Json => print_json(&info),
        OutputFormat::Text => {
            println!("Container: {}", info.location.bold());
            println!("  Entries:       {}", info.entries);
            println!("  Logical bytes: {}", info.logical_bytes);
            println!("  File bytes:    {}", info.file_bytes);
            println!("  Dead bytes:    {}", info.dead_bytes.to_string().yellow());
            println!("  Index BLAKE3:  {}", info.index_checksum.dimmed());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn run(args: &[&str]) -> anyhow::Result<()> {
        run_command(Cli::try_parse_from(args).unwrap())
    }

    #[test]
    fn push_list_pull_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("a.mtr");
        let source = dir.path().join("in.bin");
        let out = dir.path().join("out/in.bin");
        fs::write(&source, vec![7u8; 1000]).unwrap();
        let a = archive.to_str().unwrap();

        let s = source.to_str().unwrap();
        run(&["matryoshka", a, "push", s, "data/in.bin", "-c", "300"]).unwrap();
        run(&["matryoshka", a, "ls", "--format", "json"]).unwrap();
        run(&["matryoshka", a, "pull", "data/in.bin", out.to_str().unwrap()]).unwrap();
        assert_eq!(fs::read(&out).unwrap(), vec![7u8; 1000]);

        let o = out.to_str().unwrap();
        let err = run(&["matryoshka", a, "pull", "data/in.bin", o]).unwrap_err();
        assert_eq!(exit_code(&err), 1);
        run(&["matryoshka", a, "pull", "data/in.bin", o, "--force"]).unwrap();
    }

    #[test]
    fn read_only_commands_do_not_create_containers() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("missing.mtr");
        let err = run(&["matryoshka", archive.to_str().unwrap(), "list"]).unwrap_err();
        assert_eq!(exit_code(&err), 3);
        assert!(!archive.exists());
    }

    #[test]
    fn duplicate_push_maps_to_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("a.mtr");
        let source = dir.path().join("f");
        fs::write(&source, b"x").unwrap();
        let (a, s) = (archive.to_str().unwrap(), source.to_str().unwrap());

        run(&["matryoshka", a, "push", s, "f"]).unwrap();
        let err = run(&["matryoshka", a, "push", s, "f"]).unwrap_err();
        assert_eq!(exit_code(&err), 4);
    }

    #[test]
    fn rm_reports_missing_paths() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("a.mtr");
        let source = dir.path().join("f");
        fs::write(&source, b"x").unwrap();
        let (a, s) = (archive.to_str().unwrap(), source.to_str().unwrap());

        run(&["matryoshka", a, "push", s, "f"]).unwrap();
        assert!(run(&["matryoshka", a, "rm", "f", "nope"]).is_err());
        let err = run(&["matryoshka", a, "size", "f"]).unwrap_err();
        assert_eq!(exit_code(&err), 3);
    }

    #[test]
    fn config_file_sets_default_chunk_size() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("a.mtr");
        let config = dir.path().join("m.toml");
        let source = dir.path().join("f");
        fs::write(&config, "default_chunk_size = 10\n").unwrap();
        fs::write(&source, vec![1u8; 25]).unwrap();
        let (a, s) = (archive.to_str().unwrap(), source.to_str().unwrap());

        run(&["matryoshka", a, "push", s, "f", "--config", config.to_str().unwrap()]).unwrap();
        let container = Container::load(&archive).unwrap();
        let handle = container.open("f").unwrap();
        assert_eq!(container.stat(handle).unwrap().chunk_count(), 3);
    }

    #[test]
    fn bad_config_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("m.toml");
        fs::write(&config, "copy_buffer_size = \"big\"\n").unwrap();
        let archive = dir.path().join("a.mtr");
        let (a, c) = (archive.to_str().unwrap(), config.to_str().unwrap());
        let err = run(&["matryoshka", a, "info", "--config", c]).unwrap_err();
        assert_eq!(exit_code(&err), 7);
    }
}
