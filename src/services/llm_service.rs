/*!
 * LLM Service
 *
 * Calls the configured chat-completions provider with anonymized clinical
 * input, and renders the deterministic fallback when no provider is
 * configured or the call fails. LLM errors never surface to callers; the
 * fallback output covers the same sections from the same data.
 */

use serde::Deserialize;
use serde_json::json;

use crate::config::AiConfig;
use crate::models::{RiskFlags, AI_DISCLAIMER};
use crate::services::anonymizer::AnonymizedInput;

/// Request timeout for the provider call
const LLM_TIMEOUT_SECS: u64 = 30;
/// Sampling temperature; summaries should be stable, not creative
const LLM_TEMPERATURE: f64 = 0.25;
const LLM_MAX_TOKENS: u32 = 1500;

/// Section headers every summary carries, rendered by provider and fallback alike
pub const SUMMARY_SECTIONS: [&str; 7] = [
    "Clinical Overview",
    "Vital Sign Trends",
    "Laboratory Findings",
    "Symptom Analysis",
    "Risk Assessment",
    "Recommended Monitoring",
    "Disclaimer",
];

const SUMMARY_SYSTEM_PROMPT: &str = "\
You are a clinical documentation assistant. Produce a structured summary of \
the provided de-identified patient data with exactly these sections: \
Clinical Overview, Vital Sign Trends, Laboratory Findings, Symptom Analysis, \
Risk Assessment, Recommended Monitoring, Disclaimer. Describe trends and \
flagged values factually. Never diagnose, never name conditions as \
established facts, and never invent data that is not present. End with the \
disclaimer that this is AI-assisted, advisory only, and not a diagnosis.";

const CHAT_SYSTEM_PROMPT: &str = "\
You are a clinical assistant answering questions about one de-identified \
patient. Answer strictly from the provided context; if the context does not \
contain the answer, say so. Never diagnose. Remind the reader that the \
answer is advisory and not a diagnosis.";

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

/// LLM caller with deterministic fallback
#[derive(Clone)]
pub struct LlmService {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
}

impl LlmService {
    pub fn new(config: &AiConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(LLM_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();

        Self {
            client,
            api_key: config.llm_api_key().map(String::from),
            base_url: config.llm_base_url.trim_end_matches('/').to_string(),
            model: config.llm_model.clone(),
        }
    }

    /// Generate a clinical summary, falling back to the deterministic
    /// renderer on any provider error or missing key
    pub async fn generate_summary(&self, input: &AnonymizedInput, flags: &RiskFlags) -> String {
        if let Some(api_key) = self.api_key.as_deref() {
            let user_prompt = format!(
                "De-identified patient data (session {}):\n{}\n\nDeterministic risk flags:\n{}",
                input.session_id,
                serde_json::to_string_pretty(input).unwrap_or_default(),
                serde_json::to_string_pretty(flags).unwrap_or_default(),
            );

            match self
                .chat_completion(api_key, SUMMARY_SYSTEM_PROMPT, &user_prompt)
                .await
            {
                Ok(text) => return text,
                Err(e) => {
                    tracing::warn!("LLM summary call failed, using fallback renderer: {}", e);
                }
            }
        }

        render_fallback_summary(input, flags)
    }

    /// Answer a question from the anonymized context, with fallback
    pub async fn answer_question(&self, input: &AnonymizedInput, question: &str) -> String {
        if let Some(api_key) = self.api_key.as_deref() {
            let user_prompt = format!(
                "Context (session {}):\n{}\n\nQuestion: {}",
                input.session_id,
                serde_json::to_string_pretty(input).unwrap_or_default(),
                question,
            );

            match self
                .chat_completion(api_key, CHAT_SYSTEM_PROMPT, &user_prompt)
                .await
            {
                Ok(text) => return text,
                Err(e) => {
                    tracing::warn!("LLM chat call failed, using fallback answer: {}", e);
                }
            }
        }

        render_fallback_answer(input)
    }

    async fn chat_completion(
        &self,
        api_key: &str,
        system_prompt: &str,
        user_prompt: &str,
    ) -> anyhow::Result<String> {
        let url = format!("{}/chat/completions", self.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&json!({
                "model": self.model,
                "messages": [
                    { "role": "system", "content": system_prompt },
                    { "role": "user", "content": user_prompt },
                ],
                "temperature": LLM_TEMPERATURE,
                "max_tokens": LLM_MAX_TOKENS,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            anyhow::bail!("LLM provider returned status {}", response.status());
        }

        let body: ChatCompletionResponse = response.json().await?;
        let content = body
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("LLM provider returned no content"))?;

        Ok(content)
    }
}

fn describe_trend(name: &str, trend: &[f64]) -> String {
    match trend {
        [] => format!("- {}: no recent readings", name),
        [only] => format!("- {}: single reading {:.1}", name, only),
        _ => {
            // Trends arrive most-recent first
            let latest = trend[0];
            let oldest = trend[trend.len() - 1];
            let delta = latest - oldest;
            format!(
                "- {}: latest {:.1}, change {:+.1} over {} readings",
                name,
                latest,
                delta,
                trend.len()
            )
        }
    }
}

/// Deterministic summary renderer
///
/// Produces the same enumerated sections as the provider prompt from the
/// structured data alone, so callers cannot tell from the shape of the
/// output which path produced it.
pub fn render_fallback_summary(input: &AnonymizedInput, flags: &RiskFlags) -> String {
    let mut out = String::new();

    out.push_str("## Clinical Overview\n");
    out.push_str(&format!(
        "Patient (age band {}) with {} recent symptom report(s) and {} recent lab value(s) on record.\n\n",
        input.age_band,
        input.recent_symptoms.len(),
        input.recent_lab_values.len(),
    ));

    out.push_str("## Vital Sign Trends\n");
    out.push_str(&describe_trend("Blood pressure", &input.bp_trend));
    out.push('\n');
    out.push_str(&describe_trend("Glucose", &input.glucose_trend));
    out.push('\n');
    out.push_str(&describe_trend("Heart rate", &input.heart_rate_trend));
    out.push('\n');
    out.push_str(&describe_trend("Weight", &input.weight_trend));
    out.push_str("\n\n");

    out.push_str("## Laboratory Findings\n");
    if input.recent_lab_values.is_empty() {
        out.push_str("No recent laboratory results available.\n");
    } else {
        for lab in &input.recent_lab_values {
            let range = lab
                .reference_range
                .as_deref()
                .map(|r| format!(" (reference {})", r))
                .unwrap_or_default();
            let unit = lab.unit.as_deref().map(|u| format!(" {}", u)).unwrap_or_default();
            out.push_str(&format!("- {}: {}{}{}\n", lab.test_name, lab.value, unit, range));
        }
    }
    out.push('\n');

    out.push_str("## Symptom Analysis\n");
    if input.recent_symptoms.is_empty() {
        out.push_str("No recent symptoms reported.\n");
    } else {
        for symptom in &input.recent_symptoms {
            out.push_str(&format!("- {}\n", symptom));
        }
    }
    out.push('\n');

    out.push_str("## Risk Assessment\n");
    let mut any_flag = false;
    if flags.high_blood_pressure_trend {
        out.push_str("- Blood pressure trend deviates from the patient's baseline\n");
        any_flag = true;
    }
    if flags.rising_glucose_trend {
        out.push_str("- Glucose trend deviates upward from the patient's baseline\n");
        any_flag = true;
    }
    if flags.tachycardia_trend {
        out.push_str("- Heart rate trend deviates upward from the patient's baseline\n");
        any_flag = true;
    }
    if flags.rapid_weight_change {
        out.push_str("- Weight changed rapidly relative to the patient's baseline\n");
        any_flag = true;
    }
    for symptom in &flags.concerning_symptoms {
        out.push_str(&format!("- Reported symptom of note: {}\n", symptom));
        any_flag = true;
    }
    if !any_flag {
        out.push_str("No statistical risk flags raised by recent data.\n");
    }
    out.push('\n');

    out.push_str("## Recommended Monitoring\n");
    if flags.high_blood_pressure_trend {
        out.push_str("- Repeat blood pressure measurement at the next visit\n");
    }
    if flags.rising_glucose_trend {
        out.push_str("- Follow up glucose readings and consider fasting measurement\n");
    }
    if flags.tachycardia_trend {
        out.push_str("- Review heart rate readings for persistence\n");
    }
    if flags.rapid_weight_change {
        out.push_str("- Track weight at regular intervals\n");
    }
    if !any_flag {
        out.push_str("- Continue routine monitoring\n");
    }
    out.push('\n');

    out.push_str("## Disclaimer\n");
    out.push_str(AI_DISCLAIMER);
    out.push('\n');

    out
}

/// Deterministic chat answer used when no provider is available
pub fn render_fallback_answer(input: &AnonymizedInput) -> String {
    format!(
        "Based on the available records: blood pressure has {} recent reading(s), \
         glucose {}, heart rate {}, weight {}; {} recent symptom report(s) and {} \
         recent lab value(s) are on file. A detailed conversational answer is not \
         available right now. This information is advisory only and not a diagnosis.",
        input.bp_trend.len(),
        input.glucose_trend.len(),
        input.heart_rate_trend.len(),
        input.weight_trend.len(),
        input.recent_symptoms.len(),
        input.recent_lab_values.len(),
    )
}
