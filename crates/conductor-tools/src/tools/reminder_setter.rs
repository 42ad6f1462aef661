//! Reminder-setter tool — parses a natural-language time phrase and emits a
//! `ReminderDetails` side effect. Per §4.2, this tool MUST NOT itself
//! schedule anything; the orchestrator (C10) is responsible for handing the
//! side effect to the event scheduler (C6).

use async_trait::async_trait;
use chrono::{Datelike, Duration, NaiveTime, TimeZone, Timelike, Utc};
use conductor_core::error::ErrorKind;
use conductor_core::types::{ReminderDetails, ToolCall, ToolContent, ToolExecutionResult};

use crate::registry::{Tool, ToolContext};

pub struct ReminderSetterTool;

impl ReminderSetterTool {
    /// Parse `when` against `tz`, returning an absolute UTC instant.
    /// Recognizes:
    /// - `"in N seconds|minutes|hours"`
    /// - `"at HH:MM"` (next occurrence of that local time, today or tomorrow)
    /// - an RFC3339 timestamp, taken verbatim
    fn parse_when(when: &str, tz: chrono_tz::Tz, now: chrono::DateTime<Utc>) -> Result<chrono::DateTime<Utc>, String> {
        let trimmed = when.trim().to_lowercase();

        if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(when.trim()) {
            return Ok(dt.with_timezone(&Utc));
        }

        if let Some(rest) = trimmed.strip_prefix("in ") {
            let mut parts = rest.split_whitespace();
            let amount: i64 = parts
                .next()
                .ok_or_else(|| "expected a number after 'in'".to_string())?
                .parse()
                .map_err(|_| "expected a number after 'in'".to_string())?;
            let unit = parts.next().unwrap_or("");
            let delta = if unit.starts_with("sec") {
                Duration::seconds(amount)
            } else if unit.starts_with("min") {
                Duration::minutes(amount)
            } else if unit.starts_with("hour") || unit.starts_with("hr") {
                Duration::hours(amount)
            } else if unit.starts_with("day") {
                Duration::days(amount)
            } else {
                return Err(format!("unrecognized time unit '{unit}'"));
            };
            if delta <= Duration::zero() {
                return Err("reminder delay must be positive".to_string());
            }
            return Ok(now + delta);
        }

        if let Some(rest) = trimmed.strip_prefix("at ") {
            let mut hm = rest.splitn(2, ':');
            let hour: u32 = hm
                .next()
                .ok_or("expected HH:MM after 'at'")?
                .parse()
                .map_err(|_| "expected HH:MM after 'at'".to_string())?;
            let minute: u32 = hm
                .next()
                .unwrap_or("0")
                .parse()
                .map_err(|_| "expected HH:MM after 'at'".to_string())?;
            let time = NaiveTime::from_hms_opt(hour, minute, 0)
                .ok_or_else(|| format!("invalid time {hour:02}:{minute:02}"))?;

            let local_now = now.with_timezone(&tz);
            let mut candidate = tz
                .with_ymd_and_hms(
                    local_now.year(),
                    local_now.month(),
                    local_now.day(),
                    time.hour(),
                    time.minute(),
                    0,
                )
                .single()
                .ok_or_else(|| "ambiguous local time".to_string())?;
            if candidate <= local_now {
                candidate += Duration::days(1);
            }
            return Ok(candidate.with_timezone(&Utc));
        }

        Err(format!("could not parse time phrase: '{when}'"))
    }
}

#[async_trait]
impl Tool for ReminderSetterTool {
    fn name(&self) -> &str {
        "reminder_setter"
    }

    fn description(&self) -> &str {
        "ALWAYS use this tool when the user asks to be reminded or notified at a future time. \
         Do NOT respond with the reminder text directly; call this tool instead. It only \
         prepares the reminder — the platform schedules the delivery."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "content": {
                    "type": "string",
                    "description": "Text to deliver when the reminder fires."
                },
                "when": {
                    "type": "string",
                    "description": "Natural-language or RFC3339 time phrase, e.g. 'in 5 minutes', 'at 14:30', or '2026-08-01T09:00:00Z'."
                },
                "channel_ref": {
                    "type": "string",
                    "description": "Opaque channel reference to deliver to; forwarded verbatim from session context."
                },
                "user_ref": {
                    "type": "string",
                    "description": "Opaque user reference; forwarded verbatim from session context."
                }
            },
            "required": ["content", "when", "channel_ref", "user_ref"]
        })
    }

    fn default_priority(&self) -> i32 {
        5
    }

    async fn execute(&self, call: &ToolCall, ctx: &ToolContext) -> ToolExecutionResult {
        let args = &call.arguments;
        let content = match args.get("content").and_then(|v| v.as_str()) {
            Some(c) if !c.is_empty() => c.to_string(),
            _ => {
                return ToolExecutionResult::failed(
                    call.task_id.clone(),
                    self.name(),
                    ErrorKind::ToolFailure,
                    "'content' is required",
                )
            }
        };
        let when = match args.get("when").and_then(|v| v.as_str()) {
            Some(w) if !w.is_empty() => w,
            _ => {
                return ToolExecutionResult::failed(
                    call.task_id.clone(),
                    self.name(),
                    ErrorKind::ToolFailure,
                    "'when' is required",
                )
            }
        };
        let channel_ref = args.get("channel_ref").and_then(|v| v.as_str()).unwrap_or_default();
        let user_ref = args.get("user_ref").and_then(|v| v.as_str()).unwrap_or_default();

        let now = Utc::now();
        let fire_at = match Self::parse_when(when, ctx.timezone, now) {
            Ok(instant) => instant,
            Err(message) => {
                return ToolExecutionResult::failed(call.task_id.clone(), self.name(), ErrorKind::ToolFailure, message)
            }
        };

        let details = ReminderDetails {
            content: content.clone(),
            fire_at,
            channel_ref: channel_ref.to_string(),
            user_ref: user_ref.to_string(),
            created_at: now,
        };

        let mut result = ToolExecutionResult::ok(
            call.task_id.clone(),
            self.name(),
            ToolContent::Text(format!("Reminder prepared for {fire_at} (UTC): {content}")),
        );
        result.side_effect = Some(details);
        result
    }
}
