//! Kernel backend selection.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use tracing::info;

/// Implementation used for the image kernels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// `imageproc` kernels.
    Accelerated,
    /// In-crate implementations of the same kernels.
    Portable,
}

/// Requested backend, resolved once per process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendPreference {
    /// Use the accelerated backend when it is compiled in.
    #[default]
    Auto,
    /// Always use the portable backend.
    Portable,
}

static ACTIVE: OnceLock<Backend> = OnceLock::new();

impl Backend {
    /// Returns the best backend compiled into this build.
    #[must_use]
    pub fn detect() -> Self {
        if cfg!(feature = "accelerated") {
            info!("Using accelerated image kernels");
            Self::Accelerated
        } else {
            info!("Using portable image kernels");
            Self::Portable
        }
    }

    /// Resolves the process-wide backend on first call.
    ///
    /// Later calls return the backend chosen by the first one, whatever
    /// preference they pass.
    pub fn select(preference: BackendPreference) -> Self {
        *ACTIVE.get_or_init(|| match preference {
            BackendPreference::Auto => Self::detect(),
            BackendPreference::Portable => {
                info!("Using portable image kernels (requested)");
                Self::Portable
            }
        })
    }

    /// The process-wide backend, selecting automatically if none was chosen.
    #[must_use]
    pub fn active() -> Self {
        Self::select(BackendPreference::Auto)
    }

    /// Backend name as shown in logs and traces.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Accelerated => "accelerated",
            Self::Portable => "portable",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BackendPreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "portable" => Ok(Self::Portable),
            other => Err(format!("unknown backend '{other}' (expected auto or portable)")),
        }
    }
}
