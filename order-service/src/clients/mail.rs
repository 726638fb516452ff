use anyhow::{Error, Result, anyhow};
use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::header::ContentType,
    transport::smtp::authentication::Credentials,
};
use tracing::{debug, info};

use crate::{config::Config, dispatcher::MailGateway};

pub struct SmtpClient {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl SmtpClient {
    pub fn new(config: &Config) -> Result<Self, Error> {
        let credentials = Credentials::new(config.smtp_username.clone(), config.smtp_password.clone());

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
            .map_err(|e| anyhow!("SMTP relay error: {}", e))?
            .port(config.smtp_port)
            .credentials(credentials)
            .build();

        info!(host = %config.smtp_host, "SMTP client initialized");

        Ok(Self {
            mailer,
            from_address: config.mail_from.clone(),
        })
    }

    pub async fn test_connection(&self) -> Result<bool, Error> {
        let connected = self
            .mailer
            .test_connection()
            .await
            .map_err(|e| anyhow!("SMTP connection test failed: {}", e))?;

        Ok(connected)
    }
}

#[async_trait]
impl MailGateway for SmtpClient {
    async fn send(&self, to: &str, subject: &str, text: &str) -> Result<(), Error> {
        let email = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|e| anyhow!("Invalid from address: {}", e))?,
            )
            .to(to
                .parse()
                .map_err(|e| anyhow!("Invalid to address: {}", e))?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(text.to_string())
            .map_err(|e| anyhow!("Failed to build mail: {}", e))?;

        self.mailer
            .send(email)
            .await
            .map_err(|e| anyhow!("Failed to send mail: {}", e))?;

        debug!(to = %to, "Mail handed to SMTP relay");

        Ok(())
    }
}
