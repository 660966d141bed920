//! Server configuration resolved from environment variables

use esignage_common::GlobalDefaults;

/// Web server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Optional shared secret the fronting session layer must present in
    /// `x-esignage-gateway-token` on operator endpoints. When unset, the
    /// operator surface trusts the injected identity header as-is.
    pub gateway_token: Option<String>,
    /// Operator created at startup when the operators table is empty.
    pub bootstrap_operator: Option<String>,
    /// Seed values for the lazily-initialized global settings row.
    pub seed_defaults: GlobalDefaults,
    /// External image tool invocation parameters.
    pub image: ImageToolConfig,
}

/// Parameters for the external filesystem-image tool
#[derive(Debug, Clone)]
pub struct ImageToolConfig {
    pub tool_path: String,
    pub block_size: u32,
    pub page_size: u32,
    pub image_size: String,
    pub timeout_secs: u64,
}

impl Default for ImageToolConfig {
    fn default() -> Self {
        Self {
            tool_path: "mkspiffs".to_string(),
            block_size: 4096,
            page_size: 256,
            image_size: "0x160000".to_string(),
            timeout_secs: 30,
        }
    }
}

fn env_nonempty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let seed_defaults = GlobalDefaults {
            wifi_ssid: env_nonempty("ESIGNAGE_WIFI_SSID").unwrap_or_else(|| "signage".to_string()),
            wifi_password: env_nonempty("ESIGNAGE_WIFI_PASSWORD").unwrap_or_default(),
            ntp_server: env_nonempty("ESIGNAGE_NTP_SERVER")
                .unwrap_or_else(|| "pool.ntp.org".to_string()),
            server_domain: env_nonempty("ESIGNAGE_SERVER_DOMAIN")
                .unwrap_or_else(|| "localhost:8080".to_string()),
        };

        let mut image = ImageToolConfig::default();
        if let Some(path) = env_nonempty("ESIGNAGE_MKSPIFFS_PATH") {
            image.tool_path = path;
        }
        if let Some(secs) = env_nonempty("ESIGNAGE_IMAGE_TIMEOUT_SECS") {
            if let Ok(secs) = secs.parse() {
                image.timeout_secs = secs;
            }
        }

        Self {
            gateway_token: env_nonempty("ESIGNAGE_GATEWAY_TOKEN"),
            bootstrap_operator: Some(
                env_nonempty("ESIGNAGE_BOOTSTRAP_OPERATOR").unwrap_or_else(|| "admin".to_string()),
            ),
            seed_defaults,
            image,
        }
    }
}
