use super::parsing::{
    env_optional, env_or_default, parse_bool, parse_content_backend, parse_cors_origins,
    parse_environment, parse_u64, parse_usize,
};
use super::types::{
    AiSettings, ApiSettings, ConfigError, ContentBackend, ContentSettings, CorsSettings,
    LedgerSettings, ReconcileSettings, RuntimeSettings, ServerHost, ServerPort, ServerSettings,
    Settings, TelemetrySettings, VoiceSettings,
};
use crate::models::Address;

const SEPOLIA_CHAIN_ID: &str = "11155111";

impl Settings {
    pub(crate) fn load() -> Result<Self, ConfigError> {
        let host = env_or_default("EXAMCHAIN_HOST", "0.0.0.0");
        let port = env_or_default("EXAMCHAIN_PORT", "8000");

        let environment = parse_environment(
            env_optional("EXAMCHAIN_ENV").or_else(|| env_optional("ENVIRONMENT")),
        );
        let strict_config = env_optional("EXAMCHAIN_STRICT_CONFIG")
            .map(|value| parse_bool(&value))
            .unwrap_or(false)
            || environment.is_production();

        let project_name = env_or_default("PROJECT_NAME", "Examchain API");
        let version = env_or_default("VERSION", env!("CARGO_PKG_VERSION"));
        let api_v1_str = env_or_default("API_V1_STR", "/api/v1");

        let cors_origins = parse_cors_origins(env_optional("BACKEND_CORS_ORIGINS"))?;

        let gateway_url = env_or_default("LEDGER_GATEWAY_URL", "");
        let ledger_api_key = env_or_default("LEDGER_API_KEY", "");
        let chain_id =
            parse_u64("LEDGER_CHAIN_ID", env_or_default("LEDGER_CHAIN_ID", SEPOLIA_CHAIN_ID))?;
        let contract_address = env_or_default("LEDGER_CONTRACT_ADDRESS", "");
        let ledger_request_timeout =
            parse_u64("LEDGER_REQUEST_TIMEOUT", env_or_default("LEDGER_REQUEST_TIMEOUT", "60"))?;

        let backend = parse_content_backend(env_optional("CONTENT_BACKEND"))?;
        let pinata_jwt = env_or_default("PINATA_JWT", "");
        let pinata_upload_url =
            env_or_default("PINATA_UPLOAD_URL", "https://uploads.pinata.cloud/v3/files");
        let pinata_gateway = env_or_default("PINATA_GATEWAY", "gateway.pinata.cloud");
        let pinata_gateway_token = env_or_default("PINATA_GATEWAY_TOKEN", "");
        let content_request_timeout =
            parse_u64("CONTENT_REQUEST_TIMEOUT", env_or_default("CONTENT_REQUEST_TIMEOUT", "60"))?;

        let genai_key = env_or_default("GENAI_KEY", "");
        let genai_base_url =
            env_or_default("GENAI_BASE_URL", "https://generativelanguage.googleapis.com/v1beta");
        let genai_model = env_or_default("GENAI_MODEL", "gemini-1.5-flash");
        let ai_request_timeout =
            parse_u64("GENAI_REQUEST_TIMEOUT", env_or_default("GENAI_REQUEST_TIMEOUT", "120"))?;
        let max_upload_size_mb =
            parse_u64("MAX_UPLOAD_SIZE_MB", env_or_default("MAX_UPLOAD_SIZE_MB", "10"))?;

        let batch_size =
            parse_usize("RECONCILE_BATCH_SIZE", env_or_default("RECONCILE_BATCH_SIZE", "5"))?;
        let lookup_timeout_seconds = parse_u64(
            "RECONCILE_LOOKUP_TIMEOUT_SECONDS",
            env_or_default("RECONCILE_LOOKUP_TIMEOUT_SECONDS", "15"),
        )?;
        let dashboard_idle_ttl_seconds = parse_u64(
            "DASHBOARD_IDLE_TTL_SECONDS",
            env_or_default("DASHBOARD_IDLE_TTL_SECONDS", "900"),
        )?;

        let min_feedback_chars = parse_usize(
            "VOICE_MIN_FEEDBACK_CHARS",
            env_or_default("VOICE_MIN_FEEDBACK_CHARS", "3"),
        )?;
        let session_idle_ttl_seconds = parse_u64(
            "VOICE_SESSION_IDLE_TTL_SECONDS",
            env_or_default("VOICE_SESSION_IDLE_TTL_SECONDS", "7200"),
        )?;

        let log_level = env_or_default("EXAMCHAIN_LOG_LEVEL", "info");
        let json = env_optional("EXAMCHAIN_LOG_JSON").map(|value| parse_bool(&value)).unwrap_or(false);
        let prometheus_enabled =
            env_optional("PROMETHEUS_ENABLED").map(|value| parse_bool(&value)).unwrap_or(false);

        let settings = Self {
            server: ServerSettings {
                host: ServerHost::parse(host)?,
                port: ServerPort::parse(port)?,
            },
            runtime: RuntimeSettings { environment, strict_config },
            api: ApiSettings { project_name, version, api_v1_str },
            cors: CorsSettings { origins: cors_origins },
            ledger: LedgerSettings {
                gateway_url: gateway_url.trim_end_matches('/').to_string(),
                api_key: ledger_api_key,
                chain_id,
                contract_address,
                request_timeout: ledger_request_timeout,
            },
            content: ContentSettings {
                backend,
                pinata_jwt,
                pinata_upload_url,
                pinata_gateway,
                pinata_gateway_token,
                request_timeout: content_request_timeout,
            },
            ai: AiSettings {
                genai_key,
                genai_base_url: genai_base_url.trim_end_matches('/').to_string(),
                genai_model,
                request_timeout: ai_request_timeout,
                max_upload_size_mb,
            },
            reconcile: ReconcileSettings {
                batch_size,
                lookup_timeout_seconds,
                dashboard_idle_ttl_seconds,
            },
            voice: VoiceSettings { min_feedback_chars, session_idle_ttl_seconds },
            telemetry: TelemetrySettings { log_level, json, prometheus_enabled },
        };

        settings.validate()?;
        Ok(settings)
    }

    pub(crate) fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host.0, self.server.port.0)
    }

    pub(crate) fn server_host(&self) -> &str {
        &self.server.host.0
    }

    pub(crate) fn server_port(&self) -> u16 {
        self.server.port.0
    }

    pub(crate) fn api(&self) -> &ApiSettings {
        &self.api
    }

    pub(crate) fn cors(&self) -> &CorsSettings {
        &self.cors
    }

    pub(crate) fn ledger(&self) -> &LedgerSettings {
        &self.ledger
    }

    pub(crate) fn content(&self) -> &ContentSettings {
        &self.content
    }

    pub(crate) fn ai(&self) -> &AiSettings {
        &self.ai
    }

    pub(crate) fn reconcile(&self) -> &ReconcileSettings {
        &self.reconcile
    }

    pub(crate) fn voice(&self) -> &VoiceSettings {
        &self.voice
    }

    pub(crate) fn telemetry(&self) -> &TelemetrySettings {
        &self.telemetry
    }

    pub(crate) fn runtime(&self) -> &RuntimeSettings {
        &self.runtime
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.reconcile.batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "RECONCILE_BATCH_SIZE",
                value: "0".to_string(),
            });
        }
        if self.reconcile.dashboard_idle_ttl_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "DASHBOARD_IDLE_TTL_SECONDS",
                value: "0".to_string(),
            });
        }
        if self.voice.session_idle_ttl_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "VOICE_SESSION_IDLE_TTL_SECONDS",
                value: "0".to_string(),
            });
        }

        if !self.ledger.contract_address.is_empty()
            && Address::parse(&self.ledger.contract_address).is_err()
        {
            return Err(ConfigError::InvalidValue {
                field: "LEDGER_CONTRACT_ADDRESS",
                value: self.ledger.contract_address.clone(),
            });
        }

        if self.content.backend == ContentBackend::Pinata && self.content.pinata_jwt.is_empty() {
            return Err(ConfigError::MissingSecret("PINATA_JWT"));
        }

        if !(self.runtime.strict_config || self.runtime.environment.is_production()) {
            return Ok(());
        }

        if self.ledger.gateway_url.is_empty() {
            return Err(ConfigError::MissingSecret("LEDGER_GATEWAY_URL"));
        }
        if self.ledger.contract_address.is_empty() {
            return Err(ConfigError::MissingSecret("LEDGER_CONTRACT_ADDRESS"));
        }
        if self.content.backend != ContentBackend::Pinata {
            return Err(ConfigError::InvalidValue {
                field: "CONTENT_BACKEND",
                value: "memory".to_string(),
            });
        }
        if self.ai.genai_key.is_empty() {
            return Err(ConfigError::MissingSecret("GENAI_KEY"));
        }

        Ok(())
    }
}
