use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context};
use serde::Serialize;

use crate::config::{MailBackend, MailSettings};

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OutgoingMail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub text: String,
    pub html: Option<String>,
}

#[derive(Clone)]
enum Transport {
    Log,
    Webhook { client: reqwest::Client, url: String },
    Outbox(Arc<Mutex<Vec<OutgoingMail>>>),
}

/// Outbound email. The webhook transport posts the message as JSON to a relay.
#[derive(Clone)]
pub struct Mailer {
    from: String,
    transport: Transport,
}

impl Mailer {
    pub fn from_settings(settings: &MailSettings) -> anyhow::Result<Self> {
        let transport = match &settings.backend {
            MailBackend::Log => Transport::Log,
            MailBackend::Webhook(url) => Transport::Webhook {
                client: reqwest::Client::builder()
                    .timeout(std::time::Duration::from_secs(10))
                    .build()
                    .context("failed to build mail client")?,
                url: url.clone(),
            },
        };
        Ok(Self { from: settings.from.clone(), transport })
    }

    /// Keeps every message in memory; returns the mailer and a handle on the outbox.
    pub fn outbox(from: impl Into<String>) -> (Self, Arc<Mutex<Vec<OutgoingMail>>>) {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let mailer = Self { from: from.into(), transport: Transport::Outbox(sent.clone()) };
        (mailer, sent)
    }

    pub async fn send(&self, to: &str, subject: &str, text: String, html: Option<String>) -> anyhow::Result<()> {
        let mail = OutgoingMail {
            from: self.from.clone(),
            to: to.to_string(),
            subject: subject.to_string(),
            text,
            html,
        };

        match &self.transport {
            Transport::Log => {
                tracing::info!(to = %mail.to, subject = %mail.subject, "mail (log backend):\n{}", mail.text);
            }
            Transport::Webhook { client, url } => {
                let resp = client.post(url).json(&mail).send().await?;
                if !resp.status().is_success() {
                    return Err(anyhow!("mail relay responded with status {}", resp.status()));
                }
                tracing::info!(to = %mail.to, subject = %mail.subject, "mail handed to relay");
            }
            Transport::Outbox(sent) => {
                sent.lock().map_err(|_| anyhow!("mail outbox poisoned"))?.push(mail);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn outbox_keeps_sent_messages() {
        let (mailer, sent) = Mailer::outbox("noreply@ayika.org");
        mailer.send("a@b.co", "Konu", "Merhaba".into(), None).await.unwrap();
        let sent = sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].from, "noreply@ayika.org");
        assert_eq!(sent[0].subject, "Konu");
    }
}
