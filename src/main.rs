//! gio-adapter command line entry point

use std::path::PathBuf;

use chrono::{DateTime, Local};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use gio_adapter::attributes::FileInfo;
use gio_adapter::config::Config;
use gio_adapter::locator::DeviceLocator;
use gio_adapter::mount::MountEnumerator;
use gio_adapter::runner::Gio;
use gio_adapter::vfs::gio::GioFs;
use gio_adapter::vfs::{find_photo_root, MediaFs};
use gio_adapter::{GioAdapterError, Result};

/// Print usage information
fn print_usage() {
    eprintln!("Usage: gio-adapter [-c config.yaml] <command> [args]");
    eprintln!();
    eprintln!("gio-adapter - browse camera and phone media through gio");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  mounts               List media mounted by GVFS");
    eprintln!("  devices              List photo directories of the mounted devices");
    eprintln!("  dcim <uri>           Find the photo directory below a mount URI");
    eprintln!("  ls <uri> [path]      List a directory");
    eprintln!("  stat <uri> <path>    Show file metadata");
    eprintln!("  cat <uri> <path>     Copy a file to stdout");
    eprintln!("  rm <uri> <path>      Remove a file");
    eprintln!();
    eprintln!("Example:");
    eprintln!("  gio-adapter ls mtp://Google_Pixel_7_2A111FDH200ABC/ 'Internal storage/DCIM'");
}

struct Args {
    config: Option<PathBuf>,
    command: Vec<String>,
}

fn parse_args() -> Option<Args> {
    let mut config = None;
    let mut command = Vec::new();
    let mut args = std::env::args().skip(1);

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-c" | "--config" => config = Some(PathBuf::from(args.next()?)),
            "-h" | "--help" => return None,
            _ => command.push(arg),
        }
    }

    if command.is_empty() {
        return None;
    }
    Some(Args { config, command })
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let Some(args) = parse_args() else {
        print_usage();
        std::process::exit(1);
    };

    // Load configuration
    let config = match Config::load(args.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {}", e);
            std::process::exit(1);
        }
    };

    // Validate configuration
    if let Err(e) = config.validate() {
        eprintln!("Configuration error: {}", e);
        std::process::exit(1);
    }

    // Initialize logging; stdout is reserved for command output
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    debug!("Running {:?}", args.command);

    let gio = Gio::system(&config.gio.program);

    // Interrupts stop before the next device or subcommand
    let cancel = CancellationToken::new();
    let c = cancel.clone();
    ctrlc::set_handler(move || {
        info!("Received interrupt signal");
        c.cancel();
    })?;

    if let Err(e) = run(&config, gio, &cancel, &args.command).await {
        error!("{}", e);
        std::process::exit(1);
    }

    Ok(())
}

async fn run(config: &Config, gio: Gio, cancel: &CancellationToken, command: &[String]) -> Result<()> {
    let words: Vec<&str> = command.iter().map(String::as_str).collect();

    match words.as_slice() {
        ["mounts"] => {
            for m in MountEnumerator::new(gio).list().await? {
                println!("{}\t{}\t{}", m.device_name, m.protocol, m.uri);
            }
        }
        ["devices"] => {
            let locator = DeviceLocator::new(gio, config.discovery.clone());
            let devices = locator.search(cancel).await?;
            if devices.is_empty() {
                info!("No media device found");
            }
            for device in devices {
                println!("{}\t{}\t{}", device.name, device.protocol, device.path.display());
            }
        }
        ["dcim", uri] => {
            let protocol = uri.split("://").next().unwrap_or_default();
            let fs = GioFs::with_cancel(gio, *uri, cancel.clone());
            match find_photo_root(&fs, protocol, &config.discovery.photo_dir).await? {
                Some(path) => println!("{}", fs.uri_for(&path)),
                None => info!("No {} directory on {}", config.discovery.photo_dir, uri),
            }
        }
        ["ls", uri, rest @ ..] if rest.len() <= 1 => {
            let fs = GioFs::with_cancel(gio, *uri, cancel.clone());
            for entry in fs.list_dir(rest.first().copied().unwrap_or("")).await? {
                println!("{}", format_entry(&entry));
            }
        }
        ["stat", uri, path] => {
            let fs = GioFs::with_cancel(gio, *uri, cancel.clone());
            println!("{}", format_entry(&fs.stat(path).await?));
        }
        ["cat", uri, path] => {
            let fs = GioFs::with_cancel(gio, *uri, cancel.clone());
            let mut file = fs.open(path).await?;
            let mut stdout = tokio::io::stdout();
            let copied = tokio::io::copy(&mut file, &mut stdout).await?;
            debug!("Copied {} of {} bytes", copied, file.stat().size);
        }
        ["rm", uri, path] => {
            let fs = GioFs::with_cancel(gio, *uri, cancel.clone());
            fs.remove(path).await?;
            info!("Removed {}", fs.uri_for(path));
        }
        _ => {
            print_usage();
            return Err(GioAdapterError::Config(format!(
                "Unknown command: {}",
                command.join(" ")
            )));
        }
    }

    Ok(())
}

/// One `ls -l` style line
fn format_entry(entry: &FileInfo) -> String {
    let mode: String = [
        (entry.is_dir, 'd'),
        (entry.can_read(), 'r'),
        (entry.can_write(), 'w'),
        (entry.can_execute(), 'x'),
    ]
    .iter()
    .map(|(set, c)| if *set { *c } else { '-' })
    .collect();

    let mtime = entry
        .mtime
        .map(|t| DateTime::<Local>::from(t).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".repeat(16));

    let suffix = if entry.is_dir { "/" } else { "" };
    format!("{} {:>12} {} {}{}", mode, entry.size, mtime, entry.name, suffix)
}
