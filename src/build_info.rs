use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildInfo {
    pub version: &'static str,
    pub rustc_version: &'static str,
    pub commit: Option<&'static str>,
}

impl BuildInfo {
    /// `None` when the build script could not determine the compiler version.
    pub fn current() -> Option<Self> {
        Self::from_parts(
            env!("CARGO_PKG_VERSION"),
            option_env!("CLAI_RUSTC_VERSION"),
            option_env!("CLAI_GIT_COMMIT"),
        )
    }

    fn from_parts(
        version: &'static str,
        rustc_version: Option<&'static str>,
        commit: Option<&'static str>,
    ) -> Option<Self> {
        Some(Self {
            version,
            rustc_version: rustc_version.filter(|value| !value.is_empty())?,
            commit: commit.filter(|value| !value.is_empty()),
        })
    }
}

impl fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "version: {}, rustc version: {}, commit: {}",
            self.version,
            self.rustc_version,
            self.commit.unwrap_or("unknown")
        )
    }
}
