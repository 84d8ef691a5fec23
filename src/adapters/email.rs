//! SMTP email notifier
//!
//! Implements the `Notifier` trait over STARTTLS SMTP. Every message
//! carries both an HTML and a plain-text part; price alerts accept an
//! optional PNG chart attachment. Rendering is split into pure
//! functions so tests never need a mail server.

use std::collections::HashMap;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Body, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::info;

use crate::adapters::errors::{SendError, SendResult};
use crate::adapters::traits::Notifier;
use crate::config::EmailConfig;
use crate::core::types::{AlertRecord, EventSummary, TrackedEvent};

// =============================================================================
// Configuration
// =============================================================================

/// Settings for the SMTP notifier
#[derive(Debug, Clone)]
pub struct EmailSettings {
    pub from: String,
    pub to: String,
    pub smtp_host: String,
    pub smtp_username: String,
    pub smtp_password: String,
}

impl EmailSettings {
    /// Build settings from file config plus the `SMTP_USERNAME` and
    /// `SMTP_PASSWORD` environment variables. Credentials never live
    /// in the YAML file.
    pub fn from_config(email: &EmailConfig) -> SendResult<Self> {
        let smtp_username = std::env::var("SMTP_USERNAME")
            .map_err(|_| SendError::Transport("SMTP_USERNAME not set".to_string()))?;
        let smtp_password = std::env::var("SMTP_PASSWORD")
            .map_err(|_| SendError::Transport("SMTP_PASSWORD not set".to_string()))?;
        Ok(Self {
            from: email.from.clone(),
            to: email.to.clone(),
            smtp_host: email.smtp_host.clone(),
            smtp_username,
            smtp_password,
        })
    }
}

// =============================================================================
// Rendering
// =============================================================================

fn alert_subject(name: &str, record: &AlertRecord) -> String {
    format!(
        "Price alert: {} ({}) now ${}",
        name, record.section, record.new_price
    )
}

fn render_alert_text(name: &str, record: &AlertRecord) -> String {
    format!(
        "Price alert for {name}\n\
         Section: {}\n\
         Previous price: ${}\n\
         Current price: ${}\n\
         Drop: {}%\n",
        record.section,
        record.old_price,
        record.new_price,
        record.percent_drop.round_dp(2),
    )
}

fn render_alert_html(name: &str, record: &AlertRecord) -> String {
    format!(
        "<html><body>\
         <h2>Price alert: {name}</h2>\
         <table>\
         <tr><td>Section</td><td>{}</td></tr>\
         <tr><td>Previous price</td><td>${}</td></tr>\
         <tr><td><b>Current price</b></td><td><b>${}</b></td></tr>\
         <tr><td>Drop</td><td>{}%</td></tr>\
         </table>\
         </body></html>",
        record.section,
        record.old_price,
        record.new_price,
        record.percent_drop.round_dp(2),
    )
}

fn render_summary_text(entries: &[EventSummary]) -> String {
    let mut out = String::from("Daily ticket price summary\n\n");
    for entry in entries {
        let threshold = entry
            .event
            .threshold_price
            .map(|t| format!("${t}"))
            .unwrap_or_else(|| "none".to_string());
        match &entry.latest {
            Some(obs) => {
                let marker = if entry.below_threshold() { " [BELOW THRESHOLD]" } else { "" };
                out.push_str(&format!(
                    "{}: ${} ({}) at {}, threshold {}{}\n",
                    entry.event.name,
                    obs.price,
                    obs.section,
                    obs.observed_at.format("%Y-%m-%d %H:%M UTC"),
                    threshold,
                    marker,
                ));
            }
            None => {
                out.push_str(&format!(
                    "{}: no prices recorded yet, threshold {}\n",
                    entry.event.name, threshold,
                ));
            }
        }
    }
    out
}

fn render_summary_html(entries: &[EventSummary]) -> String {
    let mut rows = String::new();
    for entry in entries {
        let threshold = entry
            .event
            .threshold_price
            .map(|t| format!("${t}"))
            .unwrap_or_else(|| "none".to_string());
        let (price, section) = match &entry.latest {
            Some(obs) => (format!("${}", obs.price), obs.section.clone()),
            None => ("no data".to_string(), "-".to_string()),
        };
        let style = if entry.below_threshold() {
            " style=\"color:green;font-weight:bold\""
        } else {
            ""
        };
        rows.push_str(&format!(
            "<tr{style}><td>{}</td><td>{price}</td><td>{section}</td><td>{threshold}</td></tr>",
            entry.event.name,
        ));
    }
    format!(
        "<html><body>\
         <h2>Daily ticket price summary</h2>\
         <table border=\"1\" cellpadding=\"4\">\
         <tr><th>Event</th><th>Latest price</th><th>Section</th><th>Threshold</th></tr>\
         {rows}\
         </table>\
         </body></html>"
    )
}

// =============================================================================
// Notifier
// =============================================================================

/// SMTP implementation of `Notifier`
pub struct EmailNotifier {
    settings: EmailSettings,
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    /// Display names per event id, for subjects and bodies
    names: HashMap<String, String>,
}

impl EmailNotifier {
    pub fn new(settings: EmailSettings, events: &[TrackedEvent]) -> SendResult<Self> {
        let creds = Credentials::new(
            settings.smtp_username.clone(),
            settings.smtp_password.clone(),
        );
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.smtp_host)
            .map_err(|e| SendError::Transport(format!("failed to create SMTP transport: {e}")))?
            .credentials(creds)
            .build();

        let names = events
            .iter()
            .map(|e| (e.event_id.clone(), e.name.clone()))
            .collect();

        Ok(Self {
            settings,
            mailer,
            names,
        })
    }

    fn display_name<'a>(&'a self, event_id: &'a str) -> &'a str {
        self.names
            .get(event_id)
            .map(String::as_str)
            .unwrap_or(event_id)
    }

    fn mailboxes(&self) -> SendResult<(Mailbox, Mailbox)> {
        let from: Mailbox = self
            .settings
            .from
            .parse()
            .map_err(|e| SendError::InvalidMessage(format!("bad from address: {e}")))?;
        let to: Mailbox = self
            .settings
            .to
            .parse()
            .map_err(|e| SendError::InvalidMessage(format!("bad to address: {e}")))?;
        Ok((from, to))
    }

    async fn deliver(&self, email: Message, subject: &str) -> SendResult<()> {
        self.mailer
            .send(email)
            .await
            .map_err(|e| SendError::Transport(e.to_string()))?;
        info!(to = %self.settings.to, subject, "email sent");
        Ok(())
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    async fn send_alert(&self, record: &AlertRecord, chart: Option<&[u8]>) -> SendResult<()> {
        let name = self.display_name(&record.event_id);
        let subject = alert_subject(name, record);
        let (from, to) = self.mailboxes()?;

        let alternative = MultiPart::alternative()
            .singlepart(
                SinglePart::builder()
                    .header(ContentType::TEXT_PLAIN)
                    .body(render_alert_text(name, record)),
            )
            .singlepart(
                SinglePart::builder()
                    .header(ContentType::TEXT_HTML)
                    .body(render_alert_html(name, record)),
            );

        let builder = Message::builder().from(from).to(to).subject(&subject);

        let email = match chart {
            Some(png) => {
                let png_type = ContentType::parse("image/png")
                    .map_err(|e| SendError::InvalidMessage(format!("bad content type: {e}")))?;
                let attachment = Attachment::new("price_history.png".to_string())
                    .body(Body::new(png.to_vec()), png_type);
                builder.multipart(
                    MultiPart::mixed()
                        .multipart(alternative)
                        .singlepart(attachment),
                )
            }
            None => builder.multipart(alternative),
        }
        .map_err(|e| SendError::InvalidMessage(format!("failed to build message: {e}")))?;

        self.deliver(email, &subject).await
    }

    async fn send_summary(&self, entries: &[EventSummary]) -> SendResult<()> {
        let subject = "Daily ticket price summary";
        let (from, to) = self.mailboxes()?;

        let email = Message::builder()
            .from(from)
            .to(to)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(render_summary_text(entries)),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(render_summary_html(entries)),
                    ),
            )
            .map_err(|e| SendError::InvalidMessage(format!("failed to build message: {e}")))?;

        self.deliver(email, subject).await
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{DeliveryOutcome, PriceObservation};
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn record() -> AlertRecord {
        AlertRecord {
            event_id: "evt1".to_string(),
            section: "Floor".to_string(),
            old_price: Decimal::from_str("150.00").unwrap(),
            new_price: Decimal::from_str("99.50").unwrap(),
            percent_drop: Decimal::from_str("33.6666").unwrap(),
            fired_at: Utc.with_ymd_and_hms(2025, 6, 10, 9, 0, 0).unwrap(),
            outcome: DeliveryOutcome::Pending,
        }
    }

    fn event(threshold: Option<&str>) -> TrackedEvent {
        TrackedEvent {
            event_id: "evt1".to_string(),
            name: "Example Show".to_string(),
            venue: Some("Example Arena".to_string()),
            event_date: None,
            threshold_price: threshold.map(|t| Decimal::from_str(t).unwrap()),
            enabled: true,
        }
    }

    #[test]
    fn test_alert_subject_carries_name_section_and_price() {
        let subject = alert_subject("Example Show", &record());
        assert_eq!(subject, "Price alert: Example Show (Floor) now $99.50");
    }

    #[test]
    fn test_alert_text_rendering() {
        let text = render_alert_text("Example Show", &record());
        assert!(text.contains("Example Show"));
        assert!(text.contains("Previous price: $150.00"));
        assert!(text.contains("Current price: $99.50"));
        assert!(text.contains("Drop: 33.67%"));
    }

    #[test]
    fn test_alert_html_rendering() {
        let html = render_alert_html("Example Show", &record());
        assert!(html.contains("<h2>Price alert: Example Show</h2>"));
        assert!(html.contains("$99.50"));
        assert!(html.contains("33.67%"));
    }

    #[test]
    fn test_summary_text_marks_below_threshold() {
        let below = EventSummary {
            event: event(Some("150.00")),
            latest: Some(PriceObservation {
                event_id: "evt1".to_string(),
                price: Decimal::from_str("120.00").unwrap(),
                section: "Floor".to_string(),
                availability: 0,
                observed_at: Utc.with_ymd_and_hms(2025, 6, 10, 9, 0, 0).unwrap(),
            }),
        };
        let text = render_summary_text(&[below]);
        assert!(text.contains("Example Show: $120.00 (Floor)"));
        assert!(text.contains("[BELOW THRESHOLD]"));
    }

    #[test]
    fn test_summary_text_handles_missing_data() {
        let empty = EventSummary {
            event: event(None),
            latest: None,
        };
        let text = render_summary_text(&[empty]);
        assert!(text.contains("no prices recorded yet"));
        assert!(text.contains("threshold none"));
        assert!(!text.contains("[BELOW THRESHOLD]"));
    }

    #[test]
    fn test_summary_html_lists_every_event() {
        let entries = vec![
            EventSummary {
                event: event(Some("150.00")),
                latest: None,
            },
            EventSummary {
                event: TrackedEvent {
                    event_id: "evt2".to_string(),
                    name: "Other Show".to_string(),
                    venue: None,
                    event_date: None,
                    threshold_price: None,
                    enabled: true,
                },
                latest: None,
            },
        ];
        let html = render_summary_html(&entries);
        assert!(html.contains("Example Show"));
        assert!(html.contains("Other Show"));
    }
}
