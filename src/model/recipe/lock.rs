use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::model::{platform::Platform, ParseError};

use super::{resolved::Resolution, DependencySpec, OptionOverride, Recipe};

/// A resolution persisted for one recipe and platform.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LockFile {
    pub recipe: String,
    pub platform: Platform,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub python_requires: Vec<DependencySpec>,
    #[serde(default)]
    pub dependencies: Vec<DependencySpec>,
    #[serde(default)]
    pub options: Vec<OptionOverride>,
}

const VERSION: i64 = 1;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
struct VersionedLockFile<'a> {
    pub version: i64,
    #[serde(flatten)]
    pub content: &'a LockFile,
}

impl LockFile {
    pub fn from_resolution(recipe: &Recipe, platform: Platform, resolution: Resolution) -> Self {
        LockFile {
            recipe: recipe.name.clone(),
            platform,
            python_requires: recipe.python_requires.clone(),
            dependencies: resolution.dependencies,
            options: resolution.options,
        }
    }

    pub fn from_file(file: &Path) -> Result<LockFile, ParseError> {
        LockFile::from_str(&std::fs::read_to_string(file)?)
    }

    pub fn from_str(s: &str) -> Result<LockFile, ParseError> {
        let mut table = toml::from_str::<toml::Table>(s)?;
        match table.remove("version") {
            Some(toml::Value::Integer(VERSION)) => table.try_into::<LockFile>().map_err(Into::into),
            Some(other) => Err(ParseError::UnsupportedLockFileVersion(other.to_string())),
            None => Err(ParseError::UnsupportedLockFileVersion(
                "(missing)".to_string(),
            )),
        }
    }

    pub fn to_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(&VersionedLockFile {
            version: VERSION,
            content: self,
        })
    }
}

#[cfg(test)]
mod tests {
    use toml::toml;

    use super::*;

    use pretty_assertions::assert_eq;

    fn lock_file() -> LockFile {
        LockFile {
            recipe: "orbbec_capture_test".to_owned(),
            platform: Platform {
                os: "Linux".to_owned(),
                compiler: "gcc".to_owned(),
                build_type: "Release".to_owned(),
                arch: "x86_64".to_owned(),
            },
            python_requires: vec![],
            dependencies: vec![
                DependencySpec::parse("spdlog/1.11.0")
                    .unwrap()
                    .with_transitive_libs(true),
                DependencySpec::parse("fmt/9.1.0")
                    .unwrap()
                    .with_transitive_libs(true)
                    .forced(),
            ],
            options: vec![
                OptionOverride::new("ffmpeg", "with_ssl", false),
                OptionOverride::new("ffmpeg", "threads", 4i64),
            ],
        }
    }

    #[test]
    fn load_lock_file() {
        let text = r#"
            version = 1
            recipe = "orbbec_capture_test"

            [platform]
            os = "Linux"
            compiler = "gcc"
            build_type = "Release"
            arch = "x86_64"

            [[dependencies]]
            ref = "spdlog/1.11.0"
            transitive_libs = true

            [[dependencies]]
            ref = "fmt/9.1.0"
            force = true
            transitive_libs = true

            [[options]]
            package = "ffmpeg"
            option = "with_ssl"
            value = false

            [[options]]
            package = "ffmpeg"
            option = "threads"
            value = 4
        "#;
        assert_eq!(LockFile::from_str(text).unwrap(), lock_file());
    }

    #[test]
    fn save_and_reload_lock_file() {
        let data = lock_file();
        let formatted = data.to_string().unwrap();
        assert!(formatted.starts_with("version = 1\n"));
        assert_eq!(LockFile::from_str(&formatted).unwrap(), data);
    }

    #[test]
    fn reject_unknown_lock_file_version() {
        let text = toml::to_string_pretty(&toml! {
            version = 7
            recipe = "foo"
        })
        .unwrap();
        assert!(matches!(
            LockFile::from_str(&text),
            Err(ParseError::UnsupportedLockFileVersion(version)) if version == "7"
        ));
    }

    #[test]
    fn reject_unversioned_lock_file() {
        let text = toml::to_string_pretty(&toml! {
            recipe = "foo"
        })
        .unwrap();
        LockFile::from_str(&text).expect_err("should not parse an unversioned lock file");
    }
}
