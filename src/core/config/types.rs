use thiserror::Error;

#[derive(Debug, Clone)]
pub(crate) struct Settings {
    pub(super) server: ServerSettings,
    pub(super) runtime: RuntimeSettings,
    pub(super) api: ApiSettings,
    pub(super) cors: CorsSettings,
    pub(super) ledger: LedgerSettings,
    pub(super) content: ContentSettings,
    pub(super) ai: AiSettings,
    pub(super) reconcile: ReconcileSettings,
    pub(super) voice: VoiceSettings,
    pub(super) telemetry: TelemetrySettings,
}

#[derive(Debug, Clone)]
pub(crate) struct ServerSettings {
    pub(super) host: ServerHost,
    pub(super) port: ServerPort,
}

#[derive(Debug, Clone)]
pub(crate) struct ApiSettings {
    pub(crate) project_name: String,
    pub(crate) version: String,
    pub(crate) api_v1_str: String,
}

#[derive(Debug, Clone)]
pub(crate) struct CorsSettings {
    pub(crate) origins: Vec<String>,
}

#[derive(Debug, Clone)]
pub(crate) struct LedgerSettings {
    pub(crate) gateway_url: String,
    pub(crate) api_key: String,
    pub(crate) chain_id: u64,
    pub(crate) contract_address: String,
    pub(crate) request_timeout: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ContentBackend {
    Memory,
    Pinata,
}

#[derive(Debug, Clone)]
pub(crate) struct ContentSettings {
    pub(crate) backend: ContentBackend,
    pub(crate) pinata_jwt: String,
    pub(crate) pinata_upload_url: String,
    pub(crate) pinata_gateway: String,
    pub(crate) pinata_gateway_token: String,
    pub(crate) request_timeout: u64,
}

#[derive(Debug, Clone)]
pub(crate) struct AiSettings {
    pub(crate) genai_key: String,
    pub(crate) genai_base_url: String,
    pub(crate) genai_model: String,
    pub(crate) request_timeout: u64,
    pub(crate) max_upload_size_mb: u64,
}

#[derive(Debug, Clone)]
pub(crate) struct ReconcileSettings {
    pub(crate) batch_size: usize,
    /// Zero disables the per-lookup timeout.
    pub(crate) lookup_timeout_seconds: u64,
    pub(crate) dashboard_idle_ttl_seconds: u64,
}

#[derive(Debug, Clone)]
pub(crate) struct VoiceSettings {
    pub(crate) min_feedback_chars: usize,
    pub(crate) session_idle_ttl_seconds: u64,
}

#[derive(Debug, Clone)]
pub(crate) struct TelemetrySettings {
    pub(crate) log_level: String,
    pub(crate) json: bool,
    pub(crate) prometheus_enabled: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct RuntimeSettings {
    pub(crate) environment: Environment,
    pub(crate) strict_config: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Environment {
    Development,
    Production,
    Staging,
    Test,
}

impl Environment {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Staging => "staging",
            Self::Test => "test",
        }
    }

    pub(super) fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ServerHost(pub(super) String);

#[derive(Debug, Clone, Copy)]
pub(crate) struct ServerPort(pub(super) u16);

#[derive(Debug, Error)]
pub(crate) enum ConfigError {
    #[error("invalid server host: {0}")]
    InvalidHost(String),
    #[error("invalid server port: {0}")]
    InvalidPort(String),
    #[error("invalid value for {field}: {value}")]
    InvalidValue { field: &'static str, value: String },
    #[error("invalid cors origins: {0}")]
    InvalidCors(String),
    #[error("missing required secret for {0}")]
    MissingSecret(&'static str),
}

impl LedgerSettings {
    pub(crate) fn is_configured(&self) -> bool {
        !self.gateway_url.is_empty() && !self.contract_address.is_empty()
    }
}

impl ContentSettings {
    pub(crate) fn gateway_base(&self) -> String {
        let gateway = self.pinata_gateway.trim_end_matches('/');
        if gateway.starts_with("http://") || gateway.starts_with("https://") {
            gateway.to_string()
        } else {
            format!("https://{gateway}")
        }
    }
}

impl ServerHost {
    pub(super) fn parse(value: String) -> Result<Self, ConfigError> {
        if value.trim().is_empty() {
            return Err(ConfigError::InvalidHost(value));
        }

        Ok(Self(value))
    }
}

impl ServerPort {
    pub(super) fn parse(value: String) -> Result<Self, ConfigError> {
        let parsed: u16 = value.parse().map_err(|_| ConfigError::InvalidPort(value.clone()))?;
        if parsed == 0 {
            return Err(ConfigError::InvalidPort(value));
        }

        Ok(Self(parsed))
    }
}
