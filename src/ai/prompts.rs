//! Prompt and modal-title builders for the analysis commands.

use crate::notifications::Notification;

/// Upper bound on notifications embedded in a summary prompt.
pub const SUMMARY_MAX_NOTIFICATIONS: usize = 50;

const FORMAT_INSTRUCTION: &str = "Format your response clearly using Markdown.";

pub fn analysis_title(notification: &Notification) -> String {
    format!(
        "✨ AI Analysis for notification from \"{}\"",
        notification.source_or_unknown()
    )
}

pub fn summary_title() -> String {
    "✨ AI Summary of All Notifications".to_string()
}

pub fn analysis_prompt(notification: &Notification) -> String {
    format!(
        "A notification was received with the following JSON data: {}. \
As an expert systems analyst, please provide a brief analysis. In your analysis:\n\
1.  Explain what this data likely means in plain English.\n\
2.  Suggest the potential significance or urgency (e.g., is it a critical error, a routine log, a security alert?).\n\
3.  Recommend a concrete next step for the user to take.\n\
{}",
        notification.to_pretty_json(),
        FORMAT_INSTRUCTION
    )
}

/// `notifications` must already be sorted newest first; only the head is embedded,
/// but the stated count is the full length.
pub fn summary_prompt(notifications: &[Notification]) -> String {
    let recent = &notifications[..notifications.len().min(SUMMARY_MAX_NOTIFICATIONS)];
    let recent_json = serde_json::to_string_pretty(recent).unwrap_or_else(|_| "[]".to_string());
    format!(
        "Here are the latest {} notifications received by a system, in JSON format: {}.\n\
As an expert systems analyst, please provide a high-level summary of these events. In your summary:\n\
1.  Identify any recurring patterns, critical errors, or notable trends.\n\
2.  Highlight the most important or urgent notifications that require attention.\n\
3.  Provide a concluding thought on the overall system health based on this data.\n\
{}",
        notifications.len(),
        recent_json,
        FORMAT_INSTRUCTION
    )
}
