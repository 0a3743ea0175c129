use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use extgate_install::{InstallerConfig, Installer, Outcome, Upload};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::cli::{App, Commands, GlobalArgs, InspectArg, InstallArg};

mod cli;

const DEFAULT_CONFIG: &str = "extgate.toml";

fn main() -> Result<ExitCode> {
    let app = App::parse();
    init_logging(app.global.verbose, app.global.log_json);

    let config = resolve_config(&app.global)?;
    debug!(?config, "effective config");

    match app.cmd {
        Commands::Install(arg) => install(config, arg),
        Commands::Inspect(arg) => inspect(&config, arg),
        Commands::CheckConfig => check_config(&config),
    }
}

fn init_logging(verbose: bool, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn resolve_config(args: &GlobalArgs) -> Result<InstallerConfig> {
    let mut config = match &args.config {
        Some(path) => InstallerConfig::load(path)?,
        None if Path::new(DEFAULT_CONFIG).is_file() => InstallerConfig::load(Path::new(DEFAULT_CONFIG))?,
        None => InstallerConfig::default(),
    };

    if let Some(root) = &args.root {
        config = InstallerConfig::rooted_at(root)
            .with_limits(config.limits)
            .with_max_upload_bytes(config.max_upload_bytes);
    }
    if let Some(dir) = &args.temp_dir {
        config = config.with_temp_dir(dir);
    }
    if let Some(dir) = &args.staging_dir {
        config = config.with_staging_dir(dir);
    }
    if let Some(dir) = &args.extensions_dir {
        config = config.with_extensions_dir(dir);
    }
    Ok(config)
}

fn install(config: InstallerConfig, arg: InstallArg) -> Result<ExitCode> {
    let installer = Installer::new(config).context("invalid installer config")?;

    // Stand in for the web server's upload temp file so the caller's copy is
    // never moved.
    let incoming = stage_incoming(&installer.config().temp_dir, &arg.zip)?;
    let original_name = arg
        .zip
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let size = std::fs::metadata(&incoming)
        .with_context(|| format!("failed to stat {}", incoming.display()))?
        .len();
    let mut upload = Upload::new(original_name, &incoming, size);

    let result = installer.install(&mut upload, arg.slug.as_deref());
    if incoming.exists() {
        let _ = std::fs::remove_file(&incoming);
    }

    if arg.json {
        println!("{}", serde_json::to_string(&Outcome::from(&result))?);
        return Ok(if result.is_ok() { ExitCode::SUCCESS } else { ExitCode::FAILURE });
    }

    match result {
        Ok(report) => {
            println!("installed {} -> {}", report.slug, report.path.display());
            println!("  files:  {}", report.file_count);
            println!("  bytes:  {}", report.total_bytes);
            println!("  sha256: {}", report.sha256);
            if report.normalized {
                println!("  package folder was rehomed under its slug");
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            eprintln!("install failed [{}]: {e}", e.code());
            Ok(ExitCode::FAILURE)
        }
    }
}

fn stage_incoming(temp_dir: &Path, zip: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(temp_dir)
        .with_context(|| format!("failed to create {}", temp_dir.display()))?;
    let incoming = temp_dir.join(format!("incoming-{}", extgate_fs::random_hex(8)));
    std::fs::copy(zip, &incoming).with_context(|| format!("failed to read {}", zip.display()))?;
    Ok(incoming)
}

fn inspect(config: &InstallerConfig, arg: InspectArg) -> Result<ExitCode> {
    let validated = match extgate_archive::inspect(&arg.zip, &config.limits) {
        Ok(validated) => validated,
        Err(e) => {
            eprintln!("{} rejected [{}]: {e}", arg.zip.display(), e.code());
            return Ok(ExitCode::FAILURE);
        }
    };

    let manifest = &validated.manifest;
    println!("slug:     {}", validated.slug);
    if let Some(name) = manifest.name() {
        println!("name:     {name}");
    }
    if let Some(version) = manifest.version() {
        println!("version:  {version}");
    }
    match &validated.root.prefix {
        Some(folder) => println!("root:     {folder}/"),
        None => println!("root:     archive root"),
    }
    println!("entries:  {}", validated.report.entries_seen);
    println!("files:    {}", validated.report.file_count);
    println!("bytes:    {}", validated.report.total_bytes);
    println!(
        "target:   {}",
        config.extensions_dir.join(&validated.slug).display()
    );
    Ok(ExitCode::SUCCESS)
}

fn check_config(config: &InstallerConfig) -> Result<ExitCode> {
    config.validate().context("invalid installer config")?;
    print!("{}", toml::to_string_pretty(config)?);
    Ok(ExitCode::SUCCESS)
}
