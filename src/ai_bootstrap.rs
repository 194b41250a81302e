// src/ai_bootstrap.rs
use crate::ai_adapter::{build_service_from_config, AiService};
use crate::config::ai::AiConfig;
use std::path::Path;
use tracing::{info, warn};

/// Set to `1`/`true` to run `quick_probe` once at startup.
pub const ENV_AI_PROBE: &str = "FINPULSE_AI_PROBE";

pub fn probe_requested() -> bool {
    std::env::var(ENV_AI_PROBE)
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

pub struct AiRuntime {
    pub cfg: AiConfig,
    pub service: AiService,
}

impl AiRuntime {
    /// Load `AiConfig` (missing file = disabled) and build the service.
    pub fn from_path<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let cfg = AiConfig::load_or_default(path)?;
        // Safe diagnostics: only provider + enabled + key length
        info!(
            "AI cfg loaded: provider={}, enabled={}, model={}, key_len={}",
            cfg.provider,
            cfg.enabled,
            cfg.model,
            cfg.api_key.len()
        );
        let service = build_service_from_config(&cfg);
        Ok(Self { cfg, service })
    }

    /// Runtime with AI switched off; every call takes its fallback path.
    pub fn disabled() -> Self {
        Self {
            cfg: AiConfig::default(),
            service: AiService::disabled(),
        }
    }

    /// One summary round-trip against a sample headline. `None` when AI is off.
    pub async fn quick_probe(&self) -> Option<String> {
        if self.service.provider_name() == "disabled" {
            warn!("AI quick_probe skipped: AI is disabled in config");
            return None;
        }
        let sample = "Fed signals possible rate cut as inflation cools; Bitcoin jumps 4%.";
        let out = self.service.summarize(sample).await;
        info!(provider = self.service.provider_name(), "AI quick_probe => {out}");
        Some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai_adapter::MockClient;

    #[serial_test::serial]
    #[test]
    fn missing_file_means_disabled() {
        std::env::remove_var("AI_TEST_MODE");
        let rt = AiRuntime::from_path("does/not/exist.json").unwrap();
        assert!(!rt.cfg.enabled);
        assert_eq!(rt.service.provider_name(), "disabled");
    }

    #[serial_test::serial]
    #[test]
    fn mock_provider_from_file() {
        std::env::remove_var("AI_TEST_MODE");
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("ai.json");
        std::fs::write(&p, r#"{"enabled":true,"provider":"mock","api_key":"ENV"}"#).unwrap();
        let rt = AiRuntime::from_path(&p).unwrap();
        assert_eq!(rt.service.provider_name(), "mock");
    }

    #[tokio::test]
    async fn startup_summary_check_reports_reply_or_skips() {
        assert_eq!(AiRuntime::disabled().quick_probe().await, None);

        let rt = AiRuntime {
            cfg: AiConfig::default(),
            service: AiService::new(std::sync::Arc::new(MockClient::default())),
        };
        assert_eq!(rt.quick_probe().await.as_deref(), Some("Neutral outlook (mock)"));
    }

    #[serial_test::serial]
    #[test]
    fn startup_check_flag_from_env() {
        std::env::remove_var(ENV_AI_PROBE);
        assert!(!probe_requested());
        std::env::set_var(ENV_AI_PROBE, "1");
        assert!(probe_requested());
        std::env::set_var(ENV_AI_PROBE, "off");
        assert!(!probe_requested());
        std::env::remove_var(ENV_AI_PROBE);
    }
}
