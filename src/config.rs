use std::collections::HashMap;

use config::{Config, ConfigError, Environment};
use serde::Deserialize;

use crate::model::platform::PlatformDescriptor;

/// Settings read from `CAPDEPS_*` environment variables.
pub struct CapdepsConfig {
    /// Platform defaults; any field may be unset.
    pub platform: PlatformDescriptor,
}

impl CapdepsConfig {
    pub fn load() -> anyhow::Result<Self> {
        let raw_config = RawConfig::load(None)?;

        Ok(Self {
            platform: PlatformDescriptor {
                os: raw_config.platform.os,
                compiler: raw_config.platform.compiler,
                build_type: raw_config.platform.build_type,
                arch: raw_config.platform.arch,
            },
        })
    }
}

#[derive(Default, Debug, Deserialize, PartialEq, Eq)]
struct RawConfig {
    #[serde(default)]
    platform: PlatformConfig,
}

#[derive(Default, Debug, Deserialize, PartialEq, Eq)]
struct PlatformConfig {
    os: Option<String>,
    compiler: Option<String>,
    build_type: Option<String>,
    arch: Option<String>,
}

impl RawConfig {
    fn load(env: Option<HashMap<String, String>>) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(
                Environment::with_prefix("CAPDEPS")
                    .prefix_separator("_")
                    .separator("__")
                    .source(env),
            )
            .build()?
            .try_deserialize()
    }
}
