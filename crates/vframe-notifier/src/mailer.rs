//! SMTP mail delivery.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{debug, info, warn};

use crate::config::MailConfig;
use crate::error::MailError;

/// Sends HTML email.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<(), MailError>;
}

/// [`Mailer`] over SMTP with STARTTLS.
///
/// Without credentials every send is skipped and reported as success.
pub struct SmtpMailer {
    from: Mailbox,
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
}

impl SmtpMailer {
    pub fn new(config: &MailConfig) -> Result<Self, MailError> {
        let from: Mailbox = config.from_address.parse()?;

        let transport = if config.has_credentials() {
            let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
                .port(config.smtp_port)
                .credentials(Credentials::new(
                    config.smtp_username.clone(),
                    config.smtp_password.clone(),
                ))
                .build();
            info!(host = %config.smtp_host, port = config.smtp_port, "SMTP client initialized");
            Some(transport)
        } else {
            warn!("SMTP credentials not configured, emails will not be sent");
            None
        };

        Ok(Self { from, transport })
    }

    pub fn is_configured(&self) -> bool {
        self.transport.is_some()
    }

    fn build_message(&self, to: &str, subject: &str, html_body: &str) -> Result<Message, MailError> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(to.parse()?)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html_body.to_string())?;
        Ok(message)
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<(), MailError> {
        let Some(transport) = &self.transport else {
            info!(to, "Skipping email (SMTP not configured)");
            return Ok(());
        };

        let message = self.build_message(to, subject, html_body)?;
        transport.send(message).await?;
        debug!(to, subject, "Email sent");
        Ok(())
    }
}
