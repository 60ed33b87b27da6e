use std::error::Error;

use clap::Parser;
use log::error;

use capdeps::{
    cli::args::{CliArgs, Command},
    config::CapdepsConfig,
    model::platform::PlatformDescriptor,
    Capdeps, LockMode,
};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run() {
        error!("{}", e);
        std::process::exit(1)
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let cli_args: CliArgs = CliArgs::parse();
    let config = CapdepsConfig::load()?;

    let mut platform = cli_args.platform.descriptor().or(config.platform);
    if cli_args.platform.detect_host {
        platform = platform.or(PlatformDescriptor::detect_host());
    }

    let mut builder = Capdeps::builder()
        .recipe_file_name(&cli_args.recipe)
        .lock_file_name(&cli_args.lockfile)
        .platform(platform);
    if let Some(root) = &cli_args.root {
        builder = builder.root(root);
    }
    if let Some(index) = &cli_args.index {
        builder = builder.index_file_name(index);
    }
    let capdeps = builder.try_build()?;

    match cli_args.cmd {
        Command::Resolve => {
            let resolution = capdeps.resolve()?;
            print!("{}", resolution.to_toml_string()?);
            Ok(())
        }
        Command::Lock { locked, recreate } => {
            let lock_mode = if locked {
                LockMode::Locked
            } else if recreate {
                LockMode::Recreate
            } else {
                LockMode::Update
            };
            capdeps.lock(lock_mode)?;
            Ok(())
        }
        Command::Init { name } => capdeps.init(name),
        Command::Clean => capdeps.clean(),
    }
}
