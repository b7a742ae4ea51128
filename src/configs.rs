use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Default location of the optional configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/ovpn-pki.toml";

/// Filesystem layout and service settings.
///
/// Every field has a working default, so a deployment that follows the
/// stock OpenVPN/easy-rsa paths needs no configuration file at all.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    /// easy-rsa working directory; the toolkit's `pki/` tree lives beneath it.
    #[serde(default = "default_easyrsa_dir")]
    pub easyrsa_dir: PathBuf,

    /// Root of the durable per-role artifact store.
    #[serde(default = "default_store_root")]
    pub store_root: PathBuf,

    #[serde(default = "default_server_config_dir")]
    pub server_config_dir: PathBuf,

    #[serde(default = "default_client_config_dir")]
    pub client_config_dir: PathBuf,

    /// Template rewritten by `gen-profile server`.
    #[serde(default = "default_server_template")]
    pub server_template: PathBuf,

    /// Template rewritten by `gen-profile client`.
    #[serde(default = "default_client_template")]
    pub client_template: PathBuf,

    /// systemd unit restarted by the alert step.
    #[serde(default = "default_service_unit")]
    pub service_unit: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            easyrsa_dir: default_easyrsa_dir(),
            store_root: default_store_root(),
            server_config_dir: default_server_config_dir(),
            client_config_dir: default_client_config_dir(),
            server_template: default_server_template(),
            client_template: default_client_template(),
            service_unit: default_service_unit(),
        }
    }
}

fn default_easyrsa_dir() -> PathBuf {
    PathBuf::from("/etc/openvpn/easy-rsa")
}

fn default_store_root() -> PathBuf {
    PathBuf::from("/var/lib/ovpn-pki")
}

fn default_server_config_dir() -> PathBuf {
    PathBuf::from("/etc/openvpn/server")
}

fn default_client_config_dir() -> PathBuf {
    PathBuf::from("/etc/openvpn/client")
}

fn default_server_template() -> PathBuf {
    PathBuf::from("/usr/share/doc/openvpn/examples/sample-config-files/server.conf")
}

fn default_client_template() -> PathBuf {
    PathBuf::from("/usr/share/doc/openvpn/examples/sample-config-files/client.conf")
}

fn default_service_unit() -> String {
    "openvpn-server@server".to_string()
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let config_str = fs::read_to_string(path)
            .context(format!("Failed to read config file: {}", path.display()))?;

        let config: AppConfig =
            toml::from_str(&config_str).context("Failed to parse config file")?;

        Ok(config)
    }

    /// Load configuration from the default path, falling back to built-in
    /// defaults when no file is present.
    pub fn load() -> Result<Self> {
        let path = Path::new(DEFAULT_CONFIG_PATH);
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }
}
