use std::path::PathBuf;

use anyhow::Result;
use serde::Deserialize;

/// Environment-derived settings shared by every fixture of a test run
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HarnessConfig {
    /// Credentials file for cluster access (`KUBECONFIG`)
    #[serde(default = "default_kubeconfig")]
    pub kubeconfig: Option<PathBuf>,

    /// Address of the host as seen from inside the kind cluster
    #[serde(default = "default_kind_host")]
    pub kind_host: String,
}

fn default_kubeconfig() -> Option<PathBuf> {
    None
}

fn default_kind_host() -> String {
    "172.17.0.1".to_string()
}

impl HarnessConfig {
    /// Load settings from the process environment (and `.env` if present).
    ///
    /// `KUBECONFIG` is read unprefixed; the rest use the `EIRINIX_` prefix,
    /// e.g. `EIRINIX_KIND_HOST`.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_env_source(config::Environment::with_prefix("EIRINIX"))
    }

    /// Build settings from an explicit environment source, then read
    /// `KUBECONFIG` from the process environment
    fn from_env_source(source: config::Environment) -> Result<Self> {
        let settings = config::Config::builder().add_source(source).build()?;

        let mut config: HarnessConfig = settings.try_deserialize()?;

        // Empty means "no explicit credentials", same as unset
        config.kubeconfig = std::env::var_os("KUBECONFIG")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);

        Ok(config)
    }

    /// Override the kind host, mostly for tests that pin the address
    pub fn with_kind_host(mut self, host: impl Into<String>) -> Self {
        self.kind_host = host.into();
        self
    }

    pub fn with_kubeconfig(mut self, path: impl Into<PathBuf>) -> Self {
        self.kubeconfig = Some(path.into());
        self
    }
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            kubeconfig: default_kubeconfig(),
            kind_host: default_kind_host(),
        }
    }
}
