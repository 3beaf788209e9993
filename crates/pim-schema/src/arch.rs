//! CPU architectures and host preference order.

/// CPU architecture an installer targets or a host can run.
///
/// `Neutral` marks architecture-independent installers; it is applicable on
/// every host and always ranks last in a host's preference order. `Unknown`
/// is what unrecognized input parses to and is never applicable.
///
/// # Example
///
/// ```
/// use pim_schema::Arch;
///
/// let arch: Arch = "amd64".parse().unwrap();
/// assert_eq!(arch, Arch::X64);
/// assert_eq!(arch.to_string(), "x64");
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Arch {
    /// 32-bit Intel/AMD.
    X86,
    /// 64-bit Intel/AMD.
    X64,
    /// 32-bit ARM.
    Arm,
    /// 64-bit ARM.
    Arm64,
    /// Runs anywhere.
    Neutral,
    /// Unrecognized value.
    #[default]
    #[serde(other)]
    Unknown,
}

impl Arch {
    /// Every architecture that can appear in a manifest, `Unknown` excluded.
    pub const ALL: [Arch; 5] = [Self::X86, Self::X64, Self::Arm, Self::Arm64, Self::Neutral];

    /// Native architecture of the running binary.
    pub fn native() -> Self {
        #[cfg(target_arch = "x86_64")]
        {
            Self::X64
        }
        #[cfg(target_arch = "x86")]
        {
            Self::X86
        }
        #[cfg(target_arch = "aarch64")]
        {
            Self::Arm64
        }
        #[cfg(target_arch = "arm")]
        {
            Self::Arm
        }
        #[cfg(not(any(
            target_arch = "x86_64",
            target_arch = "x86",
            target_arch = "aarch64",
            target_arch = "arm"
        )))]
        {
            Self::Unknown
        }
    }

    /// Architectures a host with `native` can execute, native first and
    /// emulated after, `Neutral` last.
    pub fn applicable_for(native: Arch) -> Vec<Arch> {
        match native {
            Self::X64 => vec![Self::X64, Self::X86, Self::Neutral],
            Self::Arm64 => vec![Self::Arm64, Self::X64, Self::X86, Self::Arm, Self::Neutral],
            Self::X86 => vec![Self::X86, Self::Neutral],
            Self::Arm => vec![Self::Arm, Self::Neutral],
            Self::Neutral | Self::Unknown => vec![Self::Neutral],
        }
    }

    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::X86 => "x86",
            Self::X64 => "x64",
            Self::Arm => "arm",
            Self::Arm64 => "arm64",
            Self::Neutral => "neutral",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for Arch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Arch {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "x86" | "i386" | "i686" => Ok(Self::X86),
            "x64" | "x86_64" | "amd64" => Ok(Self::X64),
            "arm" | "armv7" => Ok(Self::Arm),
            "arm64" | "aarch64" => Ok(Self::Arm64),
            "neutral" => Ok(Self::Neutral),
            _ => Err(format!("Unknown architecture: {s}")),
        }
    }
}
