//! Extension manager configuration
//!
//! The manager itself lives in the extension framework; the harness only
//! produces the option set handed to its constructor.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Webhooks are registered unless explicitly turned off
pub const DEFAULT_REGISTER_WEBHOOK: bool = true;

/// Only pods labelled as Eirini apps are handled unless explicitly turned off
pub const DEFAULT_FILTER_EIRINI_APPS: bool = true;

/// A flag that is either left to the framework default or set explicitly
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriState {
    #[default]
    Unset,
    Enabled,
    Disabled,
}

impl TriState {
    /// Resolve to a concrete value, using `default` when unset
    pub fn resolve(self, default: bool) -> bool {
        match self {
            TriState::Unset => default,
            TriState::Enabled => true,
            TriState::Disabled => false,
        }
    }

    pub fn is_set(self) -> bool {
        self != TriState::Unset
    }

    pub fn as_option(self) -> Option<bool> {
        match self {
            TriState::Unset => None,
            TriState::Enabled => Some(true),
            TriState::Disabled => Some(false),
        }
    }
}

impl From<bool> for TriState {
    fn from(value: bool) -> Self {
        if value {
            TriState::Enabled
        } else {
            TriState::Disabled
        }
    }
}

impl From<Option<bool>> for TriState {
    fn from(value: Option<bool>) -> Self {
        value.map(TriState::from).unwrap_or_default()
    }
}

impl std::fmt::Display for TriState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TriState::Unset => write!(f, "unset"),
            TriState::Enabled => write!(f, "true"),
            TriState::Disabled => write!(f, "false"),
        }
    }
}

/// Options consumed by the extension manager constructor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagerOptions {
    pub namespace: String,
    pub host: String,
    /// 0 lets the listener pick an ephemeral port
    pub port: u16,
    pub kube_config: Option<PathBuf>,
    pub service_name: Option<String>,
    pub webhook_namespace: Option<String>,
    #[serde(default)]
    pub filter_eirini_apps: TriState,
    #[serde(default)]
    pub register_webhook: TriState,
}

impl ManagerOptions {
    pub fn new(namespace: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            namespace: namespace.into(),
            host: host.into(),
            port,
            kube_config: None,
            service_name: None,
            webhook_namespace: None,
            filter_eirini_apps: TriState::Unset,
            register_webhook: TriState::Unset,
        }
    }

    pub fn with_kube_config(mut self, path: Option<PathBuf>) -> Self {
        self.kube_config = path;
        self
    }

    pub fn with_service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = Some(name.into());
        self
    }

    pub fn with_webhook_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.webhook_namespace = Some(namespace.into());
        self
    }

    pub fn with_filter_eirini_apps(mut self, filter: impl Into<TriState>) -> Self {
        self.filter_eirini_apps = filter.into();
        self
    }

    pub fn with_register_webhook(mut self, register: impl Into<TriState>) -> Self {
        self.register_webhook = register.into();
        self
    }

    /// `host:port` the webhook server binds to
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Namespace the webhook configuration is registered in
    pub fn effective_webhook_namespace(&self) -> &str {
        self.webhook_namespace.as_deref().unwrap_or(&self.namespace)
    }

    pub fn filters_eirini_apps(&self) -> bool {
        self.filter_eirini_apps.resolve(DEFAULT_FILTER_EIRINI_APPS)
    }

    pub fn registers_webhook(&self) -> bool {
        self.register_webhook.resolve(DEFAULT_REGISTER_WEBHOOK)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tristate_resolution() {
        assert!(TriState::Unset.resolve(true));
        assert!(!TriState::Unset.resolve(false));
        assert!(TriState::Enabled.resolve(false));
        assert!(!TriState::Disabled.resolve(true));
    }

    #[test]
    fn test_tristate_conversions() {
        assert_eq!(TriState::from(None), TriState::Unset);
        assert_eq!(TriState::from(Some(true)), TriState::Enabled);
        assert_eq!(TriState::from(false), TriState::Disabled);
        assert_eq!(TriState::Disabled.as_option(), Some(false));
        assert!(!TriState::default().is_set());
        assert_eq!(TriState::Enabled.to_string(), "true");
    }

    #[test]
    fn test_unset_flags_use_framework_defaults() {
        let opts = ManagerOptions::new("default", "127.0.0.1", 0);
        assert!(opts.filters_eirini_apps());
        assert!(opts.registers_webhook());
        assert_eq!(opts.effective_webhook_namespace(), "default");

        let opts = opts
            .with_register_webhook(false)
            .with_webhook_namespace("cf");
        assert!(!opts.registers_webhook());
        assert_eq!(opts.effective_webhook_namespace(), "cf");
    }

    #[test]
    fn test_options_serialization() {
        let opts = ManagerOptions::new("eirini", "0.0.0.0", 0)
            .with_service_name("extension")
            .with_filter_eirini_apps(true);

        let json = serde_json::to_value(&opts).unwrap();
        assert_eq!(json["namespace"], "eirini");
        assert_eq!(json["serviceName"], "extension");
        assert_eq!(json["filterEiriniApps"], "enabled");
        assert_eq!(json["registerWebhook"], "unset");
        assert_eq!(opts.bind_address(), "0.0.0.0:0");
    }
}
