use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Build-target attributes as supplied by the caller.
///
/// Every field may be absent so that an incomplete descriptor can be
/// represented and rejected at resolution time. A blank value counts as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformDescriptor {
    pub os: Option<String>,
    pub compiler: Option<String>,
    pub build_type: Option<String>,
    pub arch: Option<String>,
}

/// A platform field, in validation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlatformField {
    Os,
    Compiler,
    BuildType,
    Arch,
}

impl Display for PlatformField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlatformField::Os => f.write_str("os"),
            PlatformField::Compiler => f.write_str("compiler"),
            PlatformField::BuildType => f.write_str("build_type"),
            PlatformField::Arch => f.write_str("arch"),
        }
    }
}

/// A descriptor with all four fields present.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Platform {
    pub os: String,
    pub compiler: String,
    pub build_type: String,
    pub arch: String,
}

impl Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.os, self.compiler, self.build_type, self.arch
        )
    }
}

impl PlatformDescriptor {
    pub fn new(
        os: impl Into<String>,
        compiler: impl Into<String>,
        build_type: impl Into<String>,
        arch: impl Into<String>,
    ) -> Self {
        PlatformDescriptor {
            os: Some(os.into()),
            compiler: Some(compiler.into()),
            build_type: Some(build_type.into()),
            arch: Some(arch.into()),
        }
    }

    /// Operating system and architecture of the running host, in the
    /// package manager's setting vocabulary. Unknown values are left empty.
    pub fn detect_host() -> Self {
        let os = match std::env::consts::OS {
            "linux" => Some("Linux"),
            "macos" => Some("Macos"),
            "windows" => Some("Windows"),
            "freebsd" => Some("FreeBSD"),
            _ => None,
        };
        let arch = match std::env::consts::ARCH {
            "x86_64" => Some("x86_64"),
            "x86" => Some("x86"),
            "aarch64" => Some("armv8"),
            "arm" => Some("armv7"),
            _ => None,
        };
        PlatformDescriptor {
            os: os.map(str::to_owned),
            compiler: None,
            build_type: None,
            arch: arch.map(str::to_owned),
        }
    }

    /// Fills every absent field from `fallback`.
    pub fn or(self, fallback: PlatformDescriptor) -> Self {
        PlatformDescriptor {
            os: present(self.os).or(fallback.os),
            compiler: present(self.compiler).or(fallback.compiler),
            build_type: present(self.build_type).or(fallback.build_type),
            arch: present(self.arch).or(fallback.arch),
        }
    }

    /// Returns the complete platform, or the first missing field.
    pub fn complete(&self) -> Result<Platform, PlatformField> {
        let require = |value: &Option<String>, field: PlatformField| {
            present(value.clone()).ok_or(field)
        };
        Ok(Platform {
            os: require(&self.os, PlatformField::Os)?,
            compiler: require(&self.compiler, PlatformField::Compiler)?,
            build_type: require(&self.build_type, PlatformField::BuildType)?,
            arch: require(&self.arch, PlatformField::Arch)?,
        })
    }
}

impl From<Platform> for PlatformDescriptor {
    fn from(platform: Platform) -> Self {
        PlatformDescriptor::new(
            platform.os,
            platform.compiler,
            platform.build_type,
            platform.arch,
        )
    }
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
