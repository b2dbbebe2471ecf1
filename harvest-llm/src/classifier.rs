//! LLM-backed relevance classification for image-bearing posts.
//!
//! The model is asked for a strict JSON verdict on whether a post carries an AI
//! image-generation prompt. Replies are parsed leniently: ```json fences and
//! leading prose are tolerated, missing fields default and confidence is clamped.
use crate::traits::LlmClient;
use harvest_common::{HarvestError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

pub const CLASSIFIER_SYSTEM_PROMPT: &str = r#"You are an expert in AI image-generation prompts. Decide strictly whether a social media post contains a prompt used with an AI image generator (Midjourney, DALL-E, Stable Diffusion, Flux, ComfyUI, NovelAI and similar).

All of the following must hold for a post to be relevant:
1. The post itself contains the concrete prompt text given to the generator.
2. The prompt is descriptive: subjects, art styles, lighting, composition or technical parameters, usually in English.
3. It shows AI-specific markers such as model parameters (--ar, --v, --style, --s, --stylize, --niji), negative prompt labels (Negative prompt, Undesired content), weighting syntax ((word:1.2), [word], {word}) or explicit model references ("Created with Flux", "Midjourney prompt:").

Not relevant, even if images are attached:
- Plain captions ("Today's sunset is beautiful").
- Hashtags without a prompt body ("Check out my #AIArt #Midjourney").
- Links to prompt sites without the prompt in the post.

Answer with JSON only."#;

/// Verdict for one post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub is_relevant: bool,
    /// Always within `0.0..=1.0`.
    pub confidence: f64,
    pub reason: String,
    pub extracted_text: Option<String>,
    pub extracted_negative_text: Option<String>,
    pub suggested_title: Option<String>,
    pub suggested_model: Option<String>,
}

impl Classification {
    /// "Not relevant" verdict recorded when classification itself failed.
    pub fn failure(reason: impl std::fmt::Display) -> Self {
        Self {
            is_relevant: false,
            confidence: 0.0,
            reason: format!("classification failed: {reason}"),
            extracted_text: None,
            extracted_negative_text: None,
            suggested_title: None,
            suggested_model: None,
        }
    }

    pub fn passes(&self, threshold: f64) -> bool {
        self.is_relevant && self.confidence >= threshold
    }
}

#[derive(Debug, Deserialize)]
struct ClassificationWire {
    #[serde(default)]
    is_relevant: Option<Value>,
    #[serde(default)]
    confidence: Option<Value>,
    #[serde(default)]
    reason: Option<String>,
    #[serde(default, alias = "extracted_prompt")]
    extracted_text: Option<String>,
    #[serde(default, alias = "extracted_negative_prompt")]
    extracted_negative_text: Option<String>,
    #[serde(default)]
    suggested_title: Option<String>,
    #[serde(default)]
    suggested_model: Option<String>,
}

/// Classifies posts through any [`LlmClient`].
#[derive(Clone)]
pub struct PostClassifier {
    llm: Arc<dyn LlmClient>,
    max_tokens: u32,
}

impl PostClassifier {
    pub fn new(llm: Arc<dyn LlmClient>, max_tokens: u32) -> Self {
        Self { llm, max_tokens }
    }

    pub fn model_name(&self) -> &str {
        self.llm.model_name()
    }

    /// One LLM call per post. Transport and parse failures surface as errors so the
    /// caller can count them.
    pub async fn classify(&self, text: &str, media_count: usize) -> Result<Classification> {
        let prompt = user_prompt(text, media_count);
        let response = self
            .llm
            .generate(
                &prompt,
                Some(CLASSIFIER_SYSTEM_PROMPT),
                Some(self.max_tokens),
                Some(0.2),
            )
            .await?;
        let verdict = parse_classification(&response.text)?;
        tracing::debug!(
            model = self.llm.model_name(),
            relevant = verdict.is_relevant,
            confidence = verdict.confidence,
            tokens = ?response.tokens_used,
            "classifier.verdict"
        );
        Ok(verdict)
    }
}

pub fn user_prompt(text: &str, media_count: usize) -> String {
    format!(
        r#"Analyse this post:

Post text:
{text}

The post has {media_count} image(s) attached.

Return exactly this JSON shape:
{{
  "is_relevant": true/false,
  "confidence": 0.0-1.0,
  "reason": "short justification",
  "extracted_prompt": "the positive prompt, if relevant",
  "extracted_negative_prompt": "the negative prompt, if any",
  "suggested_title": "a short title",
  "suggested_model": "likely model, e.g. midjourney-v6 or flux-1.1-pro"
}}

Return only the JSON, nothing else."#
    )
}

/// Try to extract a ```json ... ``` fenced block; fall back to the outermost `{...}`.
fn extract_json_block(text: &str) -> Option<&str> {
    let re_fence = Regex::new("(?s)```(?:json)?\\s*(\\{.*?\\})\\s*```").ok()?;
    if let Some(caps) = re_fence.captures(text) {
        return Some(caps.get(1)?.as_str());
    }
    let re_plain = Regex::new("(?s)(\\{.*\\})").ok()?;
    re_plain.captures(text).and_then(|c| c.get(1)).map(|m| m.as_str())
}

fn as_bool(v: &Value) -> bool {
    match v {
        Value::Bool(b) => *b,
        Value::String(s) => matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "yes"),
        _ => false,
    }
}

fn as_confidence(v: &Value) -> f64 {
    let raw = match v {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    };
    if raw.is_nan() {
        0.0
    } else {
        raw.clamp(0.0, 1.0)
    }
}

fn non_blank(s: Option<String>) -> Option<String> {
    s.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Parse a model reply into a [`Classification`].
pub fn parse_classification(text: &str) -> Result<Classification> {
    let text = text.trim();
    let json = extract_json_block(text).unwrap_or(text);
    let wire: ClassificationWire = serde_json::from_str(json).map_err(|e| {
        HarvestError::Provider(format!("unparsable classification ({e}): {}", snip(text)))
    })?;

    Ok(Classification {
        is_relevant: wire.is_relevant.as_ref().is_some_and(as_bool),
        confidence: wire.confidence.as_ref().map_or(0.0, as_confidence),
        reason: wire.reason.unwrap_or_default(),
        extracted_text: non_blank(wire.extracted_text),
        extracted_negative_text: non_blank(wire.extracted_negative_text),
        suggested_title: non_blank(wire.suggested_title),
        suggested_model: non_blank(wire.suggested_model),
    })
}

fn snip(text: &str) -> String {
    text.chars().take(200).collect()
}
