use crate::entities::vendor::{self, ReviewStatus};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;

pub const COLOR_BLURPLE: u32 = 0x7289DA;
pub const COLOR_GREEN: u32 = 0x00D166;
pub const COLOR_RED: u32 = 0xFF0000;
pub const COLOR_ORANGE: u32 = 0xFFA500;
pub const COLOR_GRAY: u32 = 0x808080;

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Webhook request failed: {0}")]
    Transport(String),
    #[error("Webhook responded with status {0}")]
    Rejected(u16),
    #[error("Webhook URL is not configured")]
    NotConfigured,
}

/// Outbound chat-webhook delivery.
#[async_trait]
pub trait WebhookNotifier: Send + Sync {
    async fn send(&self, webhook_url: &str, payload: &Value) -> Result<(), NotifyError>;
}

pub struct DiscordNotifier {
    client: reqwest::Client,
}

impl DiscordNotifier {
    pub fn new() -> Result<Self, anyhow::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(DiscordNotifier { client })
    }
}

#[async_trait]
impl WebhookNotifier for DiscordNotifier {
    async fn send(&self, webhook_url: &str, payload: &Value) -> Result<(), NotifyError> {
        if webhook_url.is_empty() {
            return Err(NotifyError::NotConfigured);
        }
        let response = self
            .client
            .post(webhook_url)
            .json(payload)
            .send()
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(NotifyError::Rejected(response.status().as_u16()));
        }
        log::info!("Webhook notification delivered");
        Ok(())
    }
}

fn embed(title: &str, description: String, fields: Value, color: u32) -> Value {
    json!({
        "embeds": [{
            "title": title,
            "description": description,
            "fields": fields,
            "color": color,
        }]
    })
}

pub fn verification_code_payload(username: &str, code: &str) -> Value {
    embed(
        "Verification Code Notification",
        format!("Registration code for: **{}**", username),
        json!([{"name": "Verification Code", "value": format!("`{}`", code), "inline": false}]),
        COLOR_BLURPLE,
    )
}

pub fn login_code_payload(username: &str, code: &str) -> Value {
    embed(
        "Login Code Notification",
        format!("Login code for: **{}**", username),
        json!([{"name": "Login Code", "value": format!("`{}`", code), "inline": false}]),
        COLOR_BLURPLE,
    )
}

pub fn vendor_created_payload(vendor: &vendor::Model, username: &str) -> Value {
    embed(
        "New Vendor Registration",
        format!("**{}**", vendor.name),
        json!([
            {"name": "Type", "value": vendor.vendor_type.display(), "inline": true},
            {"name": "Status", "value": vendor.review_status.display(), "inline": true},
            {"name": "User", "value": username, "inline": true},
        ]),
        COLOR_GREEN,
    )
}

fn status_emoji(status: ReviewStatus) -> &'static str {
    match status {
        ReviewStatus::Approved => "✅",
        ReviewStatus::Rejected => "❌",
        ReviewStatus::Resubmission => "🔄",
        ReviewStatus::Pending => "⏳",
    }
}

fn status_color(status: ReviewStatus) -> u32 {
    match status {
        ReviewStatus::Approved => COLOR_GREEN,
        ReviewStatus::Rejected => COLOR_RED,
        ReviewStatus::Resubmission => COLOR_ORANGE,
        ReviewStatus::Pending => COLOR_GRAY,
    }
}

pub fn vendor_status_changed_payload(
    vendor: &vendor::Model,
    username: &str,
    old_status: ReviewStatus,
) -> Value {
    embed(
        "Vendor Status Changed",
        format!(
            "**{}**: `{}` → `{}` {}",
            vendor.name,
            old_status.as_str(),
            vendor.review_status.as_str(),
            status_emoji(vendor.review_status)
        ),
        json!([
            {"name": "Status", "value": vendor.review_status.display(), "inline": true},
            {"name": "User", "value": username, "inline": true},
        ]),
        status_color(vendor.review_status),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_embed_carries_code_and_username() {
        let payload = login_code_payload("08123", "AB12");
        let embed = &payload["embeds"][0];
        assert_eq!(embed["title"], "Login Code Notification");
        assert_eq!(embed["description"], "Login code for: **08123**");
        assert_eq!(embed["fields"][0]["value"], "`AB12`");
        assert_eq!(embed["color"], COLOR_BLURPLE);
    }

    #[test]
    fn status_colors_follow_new_status() {
        assert_eq!(status_color(ReviewStatus::Approved), COLOR_GREEN);
        assert_eq!(status_color(ReviewStatus::Rejected), COLOR_RED);
        assert_eq!(status_emoji(ReviewStatus::Resubmission), "🔄");
    }
}
