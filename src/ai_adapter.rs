//! AI adapter: hosted language-model contract used for headline translation,
//! per-item summaries, market analysis and analyst chat.
//!
//! Two layers:
//! * `AiClient`: raw provider calls, reporting `Reply::Failed` or `Reply::Empty`
//!   when nothing usable came back.
//! * `AiService`: the contract the pipeline depends on. It never fails; every
//!   method degrades to the input text or a fixed fallback message.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use serde::{Deserialize, Serialize};

use crate::config::ai::AiConfig;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub const SUMMARY_ERROR: &str = "生成摘要時發生錯誤。";
pub const SUMMARY_EMPTY: &str = "無法生成摘要。";
pub const ANALYSIS_ERROR: &str = "AI 分析師目前離線。";
pub const ANALYSIS_EMPTY: &str = "目前無法提供市場分析。";
pub const CHAT_ERROR: &str = "連接 AI 分析師失敗。";
pub const CHAT_EMPTY: &str = "抱歉，我無法處理該請求。";

/// Market analysis looks at this many most-recent headlines.
pub const ANALYSIS_CONTEXT_LIMIT: usize = 10;

/// Outcome of a raw provider call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Text(String),
    Empty,
    Failed,
}

impl Reply {
    fn from_text(s: String) -> Self {
        if s.trim().is_empty() {
            Reply::Empty
        } else {
            Reply::Text(s)
        }
    }
}

/// Provider-level calls. Implementations must not panic.
pub trait AiClient: Send + Sync {
    /// Translate headlines; the reply is raw model text, one headline per line.
    fn translate<'a>(&'a self, headlines: &'a [String]) -> BoxFuture<'a, Reply>;
    fn summarize<'a>(&'a self, headline: &'a str) -> BoxFuture<'a, Reply>;
    fn analyze_market<'a>(&'a self, headlines: &'a [String]) -> BoxFuture<'a, Reply>;
    fn chat<'a>(&'a self, message: &'a str, context: &'a str) -> BoxFuture<'a, Reply>;
    /// Provider name for diagnostics.
    fn provider_name(&self) -> &'static str;
}

pub type DynAiClient = Arc<dyn AiClient>;

// ------------------------------------------------------------
// Service contract
// ------------------------------------------------------------

#[derive(Clone)]
pub struct AiService {
    client: DynAiClient,
}

impl AiService {
    pub fn new(client: DynAiClient) -> Self {
        Self { client }
    }

    pub fn disabled() -> Self {
        Self::new(Arc::new(DisabledClient))
    }

    pub fn provider_name(&self) -> &'static str {
        self.client.provider_name()
    }

    /// Translated lines in input order. On failure returns an unchanged copy of
    /// the input. The line count is whatever the model produced; callers that
    /// need strict alignment go through `enrich::translate_aligned`.
    pub async fn translate_headlines(&self, headlines: &[String]) -> Vec<String> {
        if headlines.is_empty() {
            return Vec::new();
        }
        counter!("ai_calls_total", "op" => "translate").increment(1);
        match self.client.translate(headlines).await {
            Reply::Text(raw) => split_lines(&raw),
            Reply::Empty => Vec::new(),
            Reply::Failed => {
                tracing::warn!(
                    provider = self.provider_name(),
                    "translation failed; keeping originals"
                );
                counter!("ai_failures_total", "op" => "translate").increment(1);
                headlines.to_vec()
            }
        }
    }

    pub async fn summarize(&self, headline: &str) -> String {
        counter!("ai_calls_total", "op" => "summarize").increment(1);
        match self.client.summarize(headline).await {
            Reply::Text(s) => s.trim().to_string(),
            Reply::Empty => SUMMARY_EMPTY.to_string(),
            Reply::Failed => {
                counter!("ai_failures_total", "op" => "summarize").increment(1);
                SUMMARY_ERROR.to_string()
            }
        }
    }

    /// Uses at most the first `ANALYSIS_CONTEXT_LIMIT` headlines.
    pub async fn market_analysis(&self, headlines: &[String]) -> String {
        let ctx = &headlines[..headlines.len().min(ANALYSIS_CONTEXT_LIMIT)];
        counter!("ai_calls_total", "op" => "analysis").increment(1);
        match self.client.analyze_market(ctx).await {
            Reply::Text(s) => s.trim().to_string(),
            Reply::Empty => ANALYSIS_EMPTY.to_string(),
            Reply::Failed => {
                counter!("ai_failures_total", "op" => "analysis").increment(1);
                ANALYSIS_ERROR.to_string()
            }
        }
    }

    pub async fn chat_with_analyst(&self, message: &str, market_context: &str) -> String {
        counter!("ai_calls_total", "op" => "chat").increment(1);
        match self.client.chat(message, market_context).await {
            Reply::Text(s) => s.trim().to_string(),
            Reply::Empty => CHAT_EMPTY.to_string(),
            Reply::Failed => {
                counter!("ai_failures_total", "op" => "chat").increment(1);
                CHAT_ERROR.to_string()
            }
        }
    }
}

/// One headline per line; blank lines dropped.
pub fn split_lines(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Factory: build a service according to config and environment variables.
///
/// * If `AI_TEST_MODE=mock`, returns a deterministic mock client.
/// * Else if `config.enabled==false`, returns a disabled client.
/// * Else builds the Gemini provider.
pub fn build_service_from_config(config: &AiConfig) -> AiService {
    if std::env::var("AI_TEST_MODE")
        .map(|v| v == "mock")
        .unwrap_or(false)
    {
        return AiService::new(Arc::new(MockClient::default()));
    }

    if !config.enabled {
        return AiService::disabled();
    }

    match config.provider.as_str() {
        "gemini" => match GeminiClient::new(config) {
            Ok(c) => AiService::new(Arc::new(c)),
            Err(e) => {
                tracing::warn!(error = ?e, "gemini client init failed; AI disabled");
                AiService::disabled()
            }
        },
        "mock" => AiService::new(Arc::new(MockClient::default())),
        _ => AiService::disabled(),
    }
}

// ------------------------------------------------------------
// Prompts
// ------------------------------------------------------------

fn translate_prompt(headlines: &[String]) -> String {
    format!(
        "You are a professional financial translator. Translate the following financial news \
headlines into accurate, concise Traditional Chinese (zh-TW). Keep terminology correct \
(Fed = 聯準會, ECB = 歐洲央行, Short = 放空). Return only the translated list, one headline \
per line, in the same order, without numbering or commentary.\n\nHeadlines:\n{}",
        headlines.join("\n")
    )
}

fn summary_prompt(headline: &str) -> String {
    format!(
        "Give a short Traditional Chinese (zh-TW) summary of this financial headline and its \
potential market impact. Keep the tone professional and concise: \"{headline}\""
    )
}

fn analysis_prompt(headlines: &[String]) -> String {
    format!(
        "You are a senior quantitative analyst. Based on the latest market headlines below, \
write a three-paragraph market outlook in Traditional Chinese (zh-TW), covering the dominant \
trend and the main risks.\n\nHeadlines:\n{}",
        headlines.join("\n")
    )
}

fn chat_prompt(message: &str, context: &str) -> String {
    format!(
        "You are a professional financial analyst. Answer the user's question in Traditional \
Chinese (zh-TW) using the market context below. If the context has nothing relevant, answer \
from general knowledge but stay cautious.\n\nMarket context:\n{context}\n\nQuestion: {message}"
    )
}

// ------------------------------------------------------------
// Gemini provider
// ------------------------------------------------------------

/// Google Gemini `generateContent` REST client.
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(cfg: &AiConfig) -> anyhow::Result<Self> {
        let api_key = if cfg.api_key.is_empty() {
            std::env::var("GEMINI_API_KEY").unwrap_or_default()
        } else {
            cfg.api_key.clone()
        };
        let http = reqwest::Client::builder()
            .user_agent("finpulse/0.1")
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            api_key,
            model: cfg.model.clone(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
        })
    }

    async fn generate(&self, prompt: String, temperature: Option<f32>) -> Reply {
        if self.api_key.is_empty() {
            return Reply::Failed;
        }

        #[derive(Serialize)]
        struct Part<'a> {
            text: &'a str,
        }
        #[derive(Serialize)]
        struct Content<'a> {
            role: &'a str,
            parts: Vec<Part<'a>>,
        }
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct GenCfg {
            #[serde(skip_serializing_if = "Option::is_none")]
            temperature: Option<f32>,
        }
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Req<'a> {
            contents: Vec<Content<'a>>,
            generation_config: GenCfg,
        }
        #[derive(Deserialize)]
        struct Resp {
            #[serde(default)]
            candidates: Vec<Candidate>,
        }
        #[derive(Deserialize)]
        struct Candidate {
            content: Option<RespContent>,
        }
        #[derive(Deserialize)]
        struct RespContent {
            #[serde(default)]
            parts: Vec<RespPart>,
        }
        #[derive(Deserialize)]
        struct RespPart {
            #[serde(default)]
            text: String,
        }

        let req = Req {
            contents: vec![Content {
                role: "user",
                parts: vec![Part { text: &prompt }],
            }],
            generation_config: GenCfg { temperature },
        };
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);

        let resp = match self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&req)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(error = ?e, "gemini request failed");
                return Reply::Failed;
            }
        };
        if !resp.status().is_success() {
            tracing::warn!(status = %resp.status(), "gemini non-success status");
            return Reply::Failed;
        }
        let body: Resp = match resp.json().await {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!(error = ?e, "gemini response decode failed");
                return Reply::Failed;
            }
        };
        let text: String = body
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().map(|p| p.text).collect())
            .unwrap_or_default();
        Reply::from_text(text)
    }
}

impl AiClient for GeminiClient {
    fn translate<'a>(&'a self, headlines: &'a [String]) -> BoxFuture<'a, Reply> {
        Box::pin(self.generate(translate_prompt(headlines), Some(0.1)))
    }
    fn summarize<'a>(&'a self, headline: &'a str) -> BoxFuture<'a, Reply> {
        Box::pin(self.generate(summary_prompt(headline), None))
    }
    fn analyze_market<'a>(&'a self, headlines: &'a [String]) -> BoxFuture<'a, Reply> {
        Box::pin(self.generate(analysis_prompt(headlines), None))
    }
    fn chat<'a>(&'a self, message: &'a str, context: &'a str) -> BoxFuture<'a, Reply> {
        Box::pin(self.generate(chat_prompt(message, context), None))
    }
    fn provider_name(&self) -> &'static str {
        "gemini"
    }
}

// ------------------------------------------------------------
// Disabled + mock providers
// ------------------------------------------------------------

/// Every call fails; the service degrades to its fallbacks.
pub struct DisabledClient;

impl AiClient for DisabledClient {
    fn translate<'a>(&'a self, _headlines: &'a [String]) -> BoxFuture<'a, Reply> {
        Box::pin(async { Reply::Failed })
    }
    fn summarize<'a>(&'a self, _headline: &'a str) -> BoxFuture<'a, Reply> {
        Box::pin(async { Reply::Failed })
    }
    fn analyze_market<'a>(&'a self, _headlines: &'a [String]) -> BoxFuture<'a, Reply> {
        Box::pin(async { Reply::Failed })
    }
    fn chat<'a>(&'a self, _message: &'a str, _context: &'a str) -> BoxFuture<'a, Reply> {
        Box::pin(async { Reply::Failed })
    }
    fn provider_name(&self) -> &'static str {
        "disabled"
    }
}

/// Deterministic client for tests and offline runs: "translates" by prefixing
/// each headline and answers everything else with `fixed`.
#[derive(Clone)]
pub struct MockClient {
    pub prefix: String,
    pub fixed: String,
}

impl Default for MockClient {
    fn default() -> Self {
        Self {
            prefix: "[zh] ".to_string(),
            fixed: "Neutral outlook (mock)".to_string(),
        }
    }
}

impl AiClient for MockClient {
    fn translate<'a>(&'a self, headlines: &'a [String]) -> BoxFuture<'a, Reply> {
        let out = headlines
            .iter()
            .map(|h| format!("{}{}", self.prefix, h))
            .collect::<Vec<_>>()
            .join("\n");
        Box::pin(async move { Reply::from_text(out) })
    }
    fn summarize<'a>(&'a self, _headline: &'a str) -> BoxFuture<'a, Reply> {
        let out = self.fixed.clone();
        Box::pin(async move { Reply::from_text(out) })
    }
    fn analyze_market<'a>(&'a self, _headlines: &'a [String]) -> BoxFuture<'a, Reply> {
        let out = self.fixed.clone();
        Box::pin(async move { Reply::from_text(out) })
    }
    fn chat<'a>(&'a self, _message: &'a str, _context: &'a str) -> BoxFuture<'a, Reply> {
        let out = self.fixed.clone();
        Box::pin(async move { Reply::from_text(out) })
    }
    fn provider_name(&self) -> &'static str {
        "mock"
    }
}
