// src/recommendations.rs
//
// Async HTTP client that turns a finished analysis report into staffing
// recommendations via an OpenAI-compatible chat completions endpoint.
// Without an API key (or when the call fails) a rule-based fallback
// produces advice from the same report, so the feature degrades instead
// of disappearing.

use crate::stats::AnalysisReport;
use crate::types::RecommendationsConfig;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

const API_KEY_ENV: &str = "QUEUE_AI_API_KEY";

const SYSTEM_PROMPT: &str = "You are a retail operations analyst. Given queue \
measurements from a store camera, give short, concrete staffing and layout \
recommendations. Answer with at most five bullet points.";

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Recommendations {
    /// "ai" when the model answered, "rules" for the local fallback.
    pub source: String,
    pub text: String,
}

pub struct RecommendationClient {
    config: RecommendationsConfig,
    http_client: reqwest::Client,
    api_key: Option<String>,
}

impl RecommendationClient {
    pub fn new(config: RecommendationsConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;
        let api_key = std::env::var(API_KEY_ENV).ok();
        if api_key.is_none() {
            info!("No {} set, recommendations fall back to rules", API_KEY_ENV);
        }
        Ok(Self {
            config,
            http_client,
            api_key,
        })
    }

    pub async fn recommend(&self, report: &AnalysisReport) -> Recommendations {
        let Some(key) = self.api_key.as_deref() else {
            return Recommendations {
                source: "rules".to_string(),
                text: rule_based(report),
            };
        };

        match self.ask_model(key, report).await {
            Ok(text) => {
                info!("🌐 Recommendation model answered ({} chars)", text.len());
                Recommendations {
                    source: "ai".to_string(),
                    text,
                }
            }
            Err(e) => {
                warn!("🌐 Recommendation request failed, using rules: {}", e);
                Recommendations {
                    source: "rules".to_string(),
                    text: rule_based(report),
                }
            }
        }
    }

    async fn ask_model(&self, api_key: &str, report: &AnalysisReport) -> Result<String> {
        let request = ChatRequest {
            model: self.config.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: report_prompt(report),
                },
            ],
        };

        let resp = self
            .http_client
            .post(&self.config.api_url)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("HTTP {}: {}", status, body);
        }

        let parsed: ChatResponse = resp.json().await?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| anyhow::anyhow!("empty choices in model response"))?;
        Ok(content)
    }
}

/// Condense the report into a prompt the model can reason over.
fn report_prompt(report: &AnalysisReport) -> String {
    let mut lines = vec![format!(
        "Footage: {:.1}s at {:.1} fps, {} frames analyzed.",
        report.duration_sec, report.fps, report.frame_count
    )];
    for zone in &report.zones {
        let avg = zone
            .metrics
            .avg_wait
            .map(|w| format!("{:.1}s", w))
            .unwrap_or_else(|| "n/a".to_string());
        lines.push(format!(
            "Zone '{}': avg wait {}, max queue {}, {} people measured ({} tracked).",
            zone.zone_name,
            avg,
            zone.metrics.max_queue_len,
            zone.metrics.num_people_measured,
            zone.metrics.total_people_tracked
        ));
    }
    lines.join("\n")
}

/// Threshold-based fallback advice.
fn rule_based(report: &AnalysisReport) -> String {
    let mut advice = Vec::new();

    for zone in &report.zones {
        let name = &zone.zone_name;
        if let Some(avg) = zone.metrics.avg_wait {
            if avg > 120.0 {
                advice.push(format!(
                    "- Average wait in '{}' is {:.0}s; open an additional service point there.",
                    name, avg
                ));
            } else if avg > 60.0 {
                advice.push(format!(
                    "- Waits in '{}' ({:.0}s) are creeping up; monitor and prepare backup staff.",
                    name, avg
                ));
            }
        }
        if zone.metrics.max_queue_len >= 8 {
            advice.push(format!(
                "- '{}' peaked at {} people; consider widening the queue area or adding signage.",
                name, zone.metrics.max_queue_len
            ));
        }
    }

    if advice.is_empty() {
        advice.push("- Queue levels look healthy; current staffing is adequate.".to_string());
    }
    advice.join("\n")
}
