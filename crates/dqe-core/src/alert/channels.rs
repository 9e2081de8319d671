//! Per-channel-type dispatch bodies. Every HTTP channel shares the
//! dispatcher's 30-second timeout; any non-2xx status, timeout, or
//! connection error is a delivery failure.

use std::time::Duration;

use dqe_db::models::{AlertChannel, AlertChannelType, Severity};
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use reqwest::Client;
use serde::Deserialize;

use crate::alert::AlertPayload;
use crate::error::{Error, Result};

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

fn client() -> Result<Client> {
    Client::builder().timeout(HTTP_TIMEOUT).build().map_err(|e| Error::DeliveryFailed(e.to_string()))
}

async fn post_json(url: &str, body: serde_json::Value, extra_headers: &[(String, String)]) -> Result<()> {
    let client = client()?;
    let mut req = client.post(url).json(&body);
    for (name, value) in extra_headers {
        req = req.header(name.as_str(), value.as_str());
    }
    let resp = req.send().await.map_err(|e| Error::DeliveryFailed(e.to_string()))?;
    if resp.status().is_success() {
        Ok(())
    } else {
        Err(Error::DeliveryFailed(format!("HTTP {}", resp.status())))
    }
}

/// Dispatches `alert` through `channel`, using the wire format appropriate
/// to its channel type.
pub async fn send(channel: &AlertChannel, alert: &AlertPayload) -> Result<()> {
    match channel.channel_type {
        AlertChannelType::Slack => send_slack(channel, alert).await,
        AlertChannelType::Msteams => send_msteams(channel, alert).await,
        AlertChannelType::Webhook => send_webhook(channel, alert).await,
        AlertChannelType::Pagerduty => send_pagerduty(channel, alert).await,
        AlertChannelType::Email => send_email(channel, alert).await,
        AlertChannelType::Opsgenie => send_opsgenie(channel, alert).await,
    }
}

fn severity_color(severity: Severity) -> &'static str {
    match severity {
        Severity::Critical => "#d9302f",
        Severity::High => "#e8833a",
        Severity::Medium => "#e8c93a",
        Severity::Low => "#5b9bd5",
        Severity::Info => "#8a8a8a",
    }
}

fn opsgenie_priority(severity: Severity) -> &'static str {
    match severity {
        Severity::Critical => "P1",
        Severity::High => "P2",
        Severity::Medium => "P3",
        Severity::Low => "P4",
        Severity::Info => "P5",
    }
}

#[derive(Debug, Deserialize)]
struct SlackConfig {
    webhook_url: String,
}

async fn send_slack(channel: &AlertChannel, alert: &AlertPayload) -> Result<()> {
    let config: SlackConfig = parse_config(channel)?;
    let body = serde_json::json!({
        "text": alert.title,
        "attachments": [{
            "color": severity_color(alert.severity),
            "text": alert.summary,
            "fields": [{"title": "Severity", "value": alert.severity.to_string(), "short": true}],
        }],
    });
    post_json(&config.webhook_url, body, &[]).await
}

#[derive(Debug, Deserialize)]
struct MsTeamsConfig {
    webhook_url: String,
}

async fn send_msteams(channel: &AlertChannel, alert: &AlertPayload) -> Result<()> {
    let config: MsTeamsConfig = parse_config(channel)?;
    let body = serde_json::json!({
        "@type": "MessageCard",
        "@context": "http://schema.org/extensions",
        "themeColor": severity_color(alert.severity).trim_start_matches('#'),
        "summary": alert.title,
        "title": alert.title,
        "text": alert.summary,
    });
    post_json(&config.webhook_url, body, &[]).await
}

#[derive(Debug, Deserialize)]
struct WebhookConfig {
    url: String,
    #[serde(default = "default_method")]
    method: String,
    #[serde(default)]
    headers: std::collections::HashMap<String, String>,
}

fn default_method() -> String {
    "POST".to_owned()
}

async fn send_webhook(channel: &AlertChannel, alert: &AlertPayload) -> Result<()> {
    let config: WebhookConfig = parse_config(channel)?;
    let method = reqwest::Method::from_bytes(config.method.as_bytes())
        .map_err(|e| Error::Invalid(format!("invalid webhook method {:?}: {e}", config.method)))?;
    let body = serde_json::json!({
        "id": alert.id,
        "severity": alert.severity,
        "title": alert.title,
        "summary": alert.summary,
    });

    let client = client()?;
    let mut req = client.request(method, &config.url).json(&body);
    for (name, value) in &config.headers {
        req = req.header(name.as_str(), value.as_str());
    }
    let resp = req.send().await.map_err(|e| Error::DeliveryFailed(e.to_string()))?;
    if resp.status().is_success() {
        Ok(())
    } else {
        Err(Error::DeliveryFailed(format!("HTTP {}", resp.status())))
    }
}

#[derive(Debug, Deserialize)]
struct PagerdutyConfig {
    routing_key: String,
}

async fn send_pagerduty(channel: &AlertChannel, alert: &AlertPayload) -> Result<()> {
    let config: PagerdutyConfig = parse_config(channel)?;
    let body = serde_json::json!({
        "routing_key": config.routing_key,
        "event_action": "trigger",
        "dedup_key": alert.id,
        "payload": {
            "summary": alert.title,
            "source": "dqe",
            "severity": pagerduty_severity(alert.severity),
            "custom_details": {"message": alert.summary},
        },
    });
    post_json("https://events.pagerduty.com/v2/enqueue", body, &[]).await
}

fn pagerduty_severity(severity: Severity) -> &'static str {
    match severity {
        Severity::Critical | Severity::High => "critical",
        Severity::Medium => "warning",
        Severity::Low | Severity::Info => "info",
    }
}

#[derive(Debug, Deserialize)]
struct OpsgenieConfig {
    api_key: String,
}

async fn send_opsgenie(channel: &AlertChannel, alert: &AlertPayload) -> Result<()> {
    let config: OpsgenieConfig = parse_config(channel)?;
    let body = serde_json::json!({
        "message": alert.title,
        "description": alert.summary,
        "priority": opsgenie_priority(alert.severity),
    });
    post_json("https://api.opsgenie.com/v2/alerts", body, &[("Authorization".to_owned(), format!("GenieKey {}", config.api_key))]).await
}

#[derive(Debug, Deserialize)]
struct EmailConfig {
    host: String,
    #[serde(default = "default_smtp_port")]
    port: u16,
    username: String,
    password: String,
    from: String,
    to: Vec<String>,
}

fn default_smtp_port() -> u16 {
    587
}

async fn send_email(channel: &AlertChannel, alert: &AlertPayload) -> Result<()> {
    let config: EmailConfig = parse_config(channel)?;
    let from: Mailbox = config.from.parse().map_err(|e| Error::Invalid(format!("invalid from address: {e}")))?;

    let mut builder = Message::builder().from(from).subject(alert.title.clone());
    for recipient in &config.to {
        let mailbox: Mailbox = recipient.parse().map_err(|e| Error::Invalid(format!("invalid to address {recipient:?}: {e}")))?;
        builder = builder.to(mailbox);
    }
    let message = builder
        .body(format!("{}\n\nSeverity: {}", alert.summary, alert.severity))
        .map_err(|e| Error::Invalid(e.to_string()))?;

    let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
        .map_err(|e| Error::DeliveryFailed(e.to_string()))?
        .port(config.port)
        .credentials(Credentials::new(config.username, config.password))
        .build();

    transport.send(message).await.map_err(|e| Error::DeliveryFailed(e.to_string()))?;
    Ok(())
}

fn parse_config<T: serde::de::DeserializeOwned>(channel: &AlertChannel) -> Result<T> {
    serde_json::from_value(channel.configuration.clone())
        .map_err(|e| Error::Invalid(format!("invalid configuration for channel {:?}: {e}", channel.name)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_color_is_distinct_per_level() {
        let colors: std::collections::HashSet<_> = [
            Severity::Critical,
            Severity::High,
            Severity::Medium,
            Severity::Low,
            Severity::Info,
        ]
        .into_iter()
        .map(severity_color)
        .collect();
        assert_eq!(colors.len(), 5);
    }

    #[test]
    fn opsgenie_priority_maps_critical_to_p1_and_info_to_p5() {
        assert_eq!(opsgenie_priority(Severity::Critical), "P1");
        assert_eq!(opsgenie_priority(Severity::Info), "P5");
    }
}
