use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use glob::glob;
use serde::Deserialize;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::models::{TokenUsageDelta, TokenUsageEvent};

/// Model attributed to token counts recorded before any model was known
/// (legacy session logs). Events priced this way carry a fallback marker.
const DEFAULT_MODEL: &str = "gpt-5";

/// Reads token-usage events out of Codex CLI session logs
/// (`$CODEX_HOME/sessions/**/*.jsonl`, default `~/.codex/sessions`).
pub struct DataLoader {
    sessions_dir: PathBuf,
}

#[derive(Deserialize)]
struct LogLine {
    timestamp: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    payload: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct TokenCountPayload {
    #[serde(rename = "type")]
    kind: Option<String>,
    model: Option<String>,
    info: Option<TokenCountInfo>,
}

#[derive(Deserialize)]
struct TokenCountInfo {
    model: Option<String>,
    last_token_usage: Option<RawUsage>,
    total_token_usage: Option<RawUsage>,
}

/// Token counters as they appear on the wire. `total_token_usage` is a
/// running total per session; deltas are recovered by differencing.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
struct RawUsage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default, alias = "cache_read_input_tokens")]
    cached_input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
    #[serde(default)]
    reasoning_output_tokens: u64,
    #[serde(default)]
    total_tokens: u64,
}

impl RawUsage {
    fn subtract(self, previous: RawUsage) -> RawUsage {
        RawUsage {
            input_tokens: self.input_tokens.saturating_sub(previous.input_tokens),
            cached_input_tokens: self
                .cached_input_tokens
                .saturating_sub(previous.cached_input_tokens),
            output_tokens: self.output_tokens.saturating_sub(previous.output_tokens),
            reasoning_output_tokens: self
                .reasoning_output_tokens
                .saturating_sub(previous.reasoning_output_tokens),
            total_tokens: self.total_tokens.saturating_sub(previous.total_tokens),
        }
    }

    fn is_zero(&self) -> bool {
        self.input_tokens == 0
            && self.cached_input_tokens == 0
            && self.output_tokens == 0
            && self.reasoning_output_tokens == 0
    }

    fn into_delta(self) -> TokenUsageDelta {
        let total_tokens = if self.total_tokens > 0 {
            self.total_tokens
        } else {
            self.input_tokens.saturating_add(self.output_tokens)
        };

        TokenUsageDelta {
            input_tokens: self.input_tokens,
            cached_input_tokens: self.cached_input_tokens.min(self.input_tokens),
            output_tokens: self.output_tokens,
            reasoning_output_tokens: self.reasoning_output_tokens,
            total_tokens,
        }
    }
}

impl DataLoader {
    pub fn new() -> Result<Self> {
        let codex_home = std::env::var("CODEX_HOME")
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .map(PathBuf::from)
            .or_else(|| {
                directories::BaseDirs::new().map(|dirs| dirs.home_dir().join(".codex"))
            })
            .context("Unable to locate the Codex home directory")?;

        Ok(Self::with_root(&codex_home))
    }

    /// Build a loader rooted at an explicit Codex home directory.
    pub fn with_root(codex_home: &Path) -> Self {
        Self {
            sessions_dir: codex_home.join("sessions"),
        }
    }

    /// Load every token-usage event under the sessions directory, sorted by
    /// timestamp. A missing directory yields an empty event list.
    pub fn load_events(&self) -> Result<Vec<TokenUsageEvent>> {
        if !self.sessions_dir.exists() {
            debug!("Sessions directory {:?} does not exist", self.sessions_dir);
            return Ok(Vec::new());
        }

        let pattern = self.sessions_dir.join("**").join("*.jsonl");
        let pattern_str = pattern.to_str().context("Invalid sessions path")?;

        let mut events = Vec::new();
        for entry in glob(pattern_str)? {
            match entry {
                Ok(path) => {
                    debug!("Loading session file: {:?}", path);
                    events.extend(self.parse_session_file(&path));
                }
                Err(e) => warn!("Error reading path: {}", e),
            }
        }

        events.sort_by_key(|event| event.timestamp);
        Ok(events)
    }

    fn parse_session_file(&self, path: &Path) -> Vec<TokenUsageEvent> {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) => {
                warn!("Failed to open {:?}: {}", path, e);
                return Vec::new();
            }
        };
        let reader = BufReader::new(file);
        let session_id = self.session_id_from_path(path);

        let mut events = Vec::new();
        let mut previous_totals: Option<RawUsage> = None;
        let mut current_model: Option<String> = None;
        let mut current_model_is_fallback = false;

        for (line_num, line) in reader.lines().enumerate() {
            let line = match line {
                Ok(value) => value,
                Err(e) => {
                    warn!("Error reading line {} in {:?}: {}", line_num + 1, path, e);
                    continue;
                }
            };
            if line.trim().is_empty() {
                continue;
            }

            let parsed: LogLine = match serde_json::from_str(&line) {
                Ok(value) => value,
                Err(e) => {
                    debug!("Failed to parse line {} in {:?}: {}", line_num + 1, path, e);
                    continue;
                }
            };

            match parsed.kind.as_deref() {
                Some("turn_context") => {
                    if let Some(model) = parsed
                        .payload
                        .as_ref()
                        .and_then(|p| p.get("model"))
                        .and_then(|m| m.as_str())
                        .map(str::trim)
                        .filter(|m| !m.is_empty())
                    {
                        current_model = Some(model.to_string());
                        current_model_is_fallback = false;
                    }
                }
                Some("event_msg") => {
                    let Some(payload) = parsed.payload else {
                        continue;
                    };
                    let payload: TokenCountPayload = match serde_json::from_value(payload) {
                        Ok(value) => value,
                        Err(_) => continue,
                    };
                    if payload.kind.as_deref() != Some("token_count") {
                        continue;
                    }

                    let Some(timestamp) = parsed
                        .timestamp
                        .as_deref()
                        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
                        .map(|ts| ts.with_timezone(&Utc))
                    else {
                        continue;
                    };

                    let last_usage = payload.info.as_ref().and_then(|i| i.last_token_usage);
                    let total_usage = payload.info.as_ref().and_then(|i| i.total_token_usage);

                    // Prefer the per-turn delta; older logs only carry the
                    // running total, which gets differenced.
                    let raw_usage = last_usage.or_else(|| {
                        total_usage.map(|total| total.subtract(previous_totals.unwrap_or_default()))
                    });
                    if let Some(total) = total_usage {
                        previous_totals = Some(total);
                    }
                    let Some(raw_usage) = raw_usage else {
                        continue;
                    };
                    if raw_usage.is_zero() {
                        continue;
                    }

                    let reported_model = payload
                        .model
                        .or_else(|| payload.info.as_ref().and_then(|i| i.model.clone()))
                        .map(|m| m.trim().to_string())
                        .filter(|m| !m.is_empty());
                    if let Some(model) = &reported_model {
                        current_model = Some(model.clone());
                        current_model_is_fallback = false;
                    }

                    let (model, is_fallback_model) = match current_model.clone() {
                        Some(model) => (model, current_model_is_fallback),
                        None => {
                            current_model = Some(DEFAULT_MODEL.to_string());
                            current_model_is_fallback = true;
                            (DEFAULT_MODEL.to_string(), true)
                        }
                    };

                    events.push(TokenUsageEvent {
                        timestamp,
                        session_id: session_id.clone(),
                        model,
                        is_fallback_model,
                        usage: raw_usage.into_delta(),
                    });
                }
                _ => {}
            }
        }

        events
    }

    /// Session id is the log path relative to the sessions directory with
    /// the `.jsonl` suffix stripped, so ids keep their directory components.
    fn session_id_from_path(&self, path: &Path) -> String {
        let relative = path.strip_prefix(&self.sessions_dir).unwrap_or(path);
        let mut session_id = relative.to_string_lossy().replace('\\', "/");
        if let Some(stripped) = session_id.strip_suffix(".jsonl") {
            session_id = stripped.to_string();
        }
        session_id
    }
}
