use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Clone, Debug, Parser)]
#[command(name = "extgate", version = env!("CARGO_PKG_VERSION"), about, long_about = None, propagate_version = true)]
pub struct App {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Clone, Debug, Args)]
pub struct GlobalArgs {
    /// Installer config; `extgate.toml` in the working directory is used when present.
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,

    /// Put `tmp/`, `staging/` and `extensions/` under this directory.
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    #[arg(long, global = true)]
    pub temp_dir: Option<PathBuf>,

    #[arg(long, global = true)]
    pub staging_dir: Option<PathBuf>,

    #[arg(long, global = true)]
    pub extensions_dir: Option<PathBuf>,

    /// Debug logging unless RUST_LOG says otherwise.
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Log as JSON lines.
    #[arg(long, global = true)]
    pub log_json: bool,
}

#[derive(Clone, Debug, Subcommand)]
pub enum Commands {
    #[command(alias = "i", name = "install", about = "Validate and install an extension package")]
    Install(InstallArg),
    #[command(name = "inspect", about = "Scan a package and report what would be installed")]
    Inspect(InspectArg),
    #[command(alias = "cfg", name = "check-config", about = "Validate and print the effective config")]
    CheckConfig,
}

#[derive(Clone, Debug, Args)]
pub struct InstallArg {
    /// Package to install.
    pub zip: PathBuf,

    /// Refuse the package unless its manifest declares this slug.
    #[arg(long)]
    pub slug: Option<String>,

    /// Print the result as `{"success":..,"code":..}`.
    #[arg(long)]
    pub json: bool,
}

#[derive(Clone, Debug, Args)]
pub struct InspectArg {
    pub zip: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_is_well_formed() {
        App::command().debug_assert();
    }

    #[test]
    fn parses_install_with_overrides() {
        let app = App::try_parse_from([
            "extgate",
            "install",
            "theme.zip",
            "--slug",
            "theme",
            "--extensions-dir",
            "/srv/ext",
        ])
        .unwrap();

        assert_eq!(app.global.extensions_dir, Some(PathBuf::from("/srv/ext")));
        match app.cmd {
            Commands::Install(arg) => {
                assert_eq!(arg.zip, PathBuf::from("theme.zip"));
                assert_eq!(arg.slug.as_deref(), Some("theme"));
                assert!(!arg.json);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
