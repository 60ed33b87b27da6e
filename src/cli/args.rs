use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::model::platform::PlatformDescriptor;

/// Platform-aware dependency and build-option resolution.
#[derive(Debug, Parser)]
#[command(version)]
pub struct CliArgs {
    #[command(subcommand)]
    pub cmd: Command,
    /// Project root; other paths are relative to it
    #[arg(short, long, env = "CAPDEPS_ROOT")]
    pub root: Option<PathBuf>,
    #[arg(long, default_value = "capdeps.toml")]
    pub recipe: PathBuf,
    #[arg(long, default_value = "capdeps.lock")]
    pub lockfile: PathBuf,
    /// Package index declaring the requirements of upstream packages
    #[arg(long)]
    pub index: Option<PathBuf>,
    #[command(flatten)]
    pub platform: PlatformArgs,
}

#[derive(Debug, Args)]
pub struct PlatformArgs {
    /// Target operating system, e.g. Linux, Macos, Windows
    #[arg(long)]
    pub os: Option<String>,
    #[arg(long)]
    pub compiler: Option<String>,
    /// Release, Debug, RelWithDebInfo or MinSizeRel
    #[arg(long)]
    pub build_type: Option<String>,
    #[arg(long)]
    pub arch: Option<String>,
    /// Fill in os and arch from the running host when not given otherwise
    #[arg(long)]
    pub detect_host: bool,
}

impl PlatformArgs {
    pub fn descriptor(&self) -> PlatformDescriptor {
        PlatformDescriptor {
            os: self.os.clone(),
            compiler: self.compiler.clone(),
            build_type: self.build_type.clone(),
            arch: self.arch.clone(),
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Prints the resolved dependencies and options for the platform
    Resolve,
    /// Creates, updates or verifies the lock file
    Lock {
        /// Fail instead of writing when the lock file is missing or out of date
        #[arg(long, conflicts_with = "recreate")]
        locked: bool,
        /// Rewrite the lock file even when it is up to date
        #[arg(long)]
        recreate: bool,
    },
    /// Creates an empty recipe in the root directory
    Init {
        #[arg(short, long)]
        name: Option<String>,
    },
    /// Deletes the lock file
    Clean,
}

#[cfg(test)]
mod tests {
    use super::*;

    use clap::CommandFactory;
    use pretty_assertions::assert_eq;

    #[test]
    fn verify_cli() {
        CliArgs::command().debug_assert();
    }

    #[test]
    fn parse_platform_flags() {
        let args = CliArgs::try_parse_from([
            "capdeps",
            "--os",
            "Macos",
            "--build-type",
            "Release",
            "lock",
            "--locked",
        ])
        .unwrap();
        assert_eq!(
            args.platform.descriptor(),
            PlatformDescriptor {
                os: Some("Macos".to_owned()),
                build_type: Some("Release".to_owned()),
                ..Default::default()
            }
        );
        assert!(matches!(
            args.cmd,
            Command::Lock {
                locked: true,
                recreate: false
            }
        ));
    }

    #[test]
    fn locked_conflicts_with_recreate() {
        assert!(CliArgs::try_parse_from(["capdeps", "lock", "--locked", "--recreate"]).is_err());
    }
}
