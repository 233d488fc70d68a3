//! Order confirmation notifications
//!
//! Delivery is best effort: callers log failures and carry on.

use anyhow::{Context, Result};
use async_trait::async_trait;
use brewclub_common::format_currency;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::info;

pub const DEFAULT_TEMPLATE: &str = "Thanks for your order!\n\n\
Your order number is {order_number}. The total including GST is {total}.\n\n\
We'll let you know when it arrives.";

pub const DEFAULT_SUBJECT: &str = "Your UCBC Order #{order_number}";

/// A rendered plain-text confirmation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderConfirmation {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Subject and body templates with `{order_number}` and `{total}` placeholders
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmationTemplate {
    pub subject: String,
    pub body: String,
}

impl Default for ConfirmationTemplate {
    fn default() -> Self {
        Self {
            subject: DEFAULT_SUBJECT.to_string(),
            body: DEFAULT_TEMPLATE.to_string(),
        }
    }
}

impl ConfirmationTemplate {
    pub fn render(&self, to: &str, order_number: u64, total_incl_gst: Decimal) -> OrderConfirmation {
        let render = |template: &str| {
            template
                .replace("{order_number}", &order_number.to_string())
                .replace("{total}", &format_currency(total_incl_gst))
        };

        OrderConfirmation {
            to: to.to_string(),
            subject: render(&self.subject),
            body: render(&self.body),
        }
    }
}

/// Delivers confirmations to members
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, confirmation: &OrderConfirmation) -> Result<()>;
}

/// Writes confirmations to the log instead of delivering them
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, confirmation: &OrderConfirmation) -> Result<()> {
        info!(
            "Order confirmation for {}: {}",
            confirmation.to, confirmation.subject
        );
        Ok(())
    }
}

/// Posts confirmations to an HTTP mail relay
pub struct RelayNotifier {
    relay_url: String,
    http_client: reqwest::Client,
}

impl RelayNotifier {
    pub fn new(relay_url: String) -> Self {
        Self {
            relay_url,
            http_client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Notifier for RelayNotifier {
    async fn send(&self, confirmation: &OrderConfirmation) -> Result<()> {
        let response = self
            .http_client
            .post(&self.relay_url)
            .json(confirmation)
            .send()
            .await
            .context("Failed to reach mail relay")?;

        if !response.status().is_success() {
            anyhow::bail!("Mail relay returned {}", response.status());
        }

        info!("Sent order confirmation to {}", confirmation.to);
        Ok(())
    }
}
