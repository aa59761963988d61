use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use super::{DeliveryGateway, GatewayError, SendRequest};
use crate::config::SmtpConfig;
use crate::template;

pub struct SmtpGateway {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
    base_url: String,
}

impl SmtpGateway {
    pub fn new(config: &SmtpConfig, base_url: &str) -> Result<Self, String> {
        let creds = Credentials::new(config.user.clone(), config.pass.clone());

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| format!("SMTP transport error: {e}"))?
            .port(config.port)
            .credentials(creds)
            .build();

        Ok(Self {
            transport,
            from: config.from.clone(),
            base_url: base_url.to_string(),
        })
    }

    fn unsubscribe_footer(&self, request: &SendRequest) -> String {
        let token = request
            .variables
            .get("unsubscribe_token")
            .map(String::as_str)
            .unwrap_or_default();
        let url = format!(
            "{}/v1/unsubscribe/{}/{}?token={}",
            self.base_url,
            request.recipient_kind.as_str(),
            request.recipient_id,
            token
        );
        format!(
            r#"<p style="color: #666; font-size: 12px;">Don't want these emails? <a href="{url}">Unsubscribe</a>.</p>"#
        )
    }
}

#[async_trait]
impl DeliveryGateway for SmtpGateway {
    async fn send(&self, request: &SendRequest) -> Result<(), GatewayError> {
        let subject = template::render(&request.subject, &request.variables);
        let mut body = template::render(&request.body_html, &request.variables);
        body.push_str(&self.unsubscribe_footer(request));

        let message = Message::builder()
            .from(
                self.from
                    .parse()
                    .map_err(|e| GatewayError::from(format!("Invalid from address: {e}")))?,
            )
            .to(request
                .recipient_email
                .parse()
                .map_err(|e| GatewayError::from(format!("Invalid to address: {e}")))?)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(body)
            .map_err(|e| GatewayError::from(format!("Failed to build email: {e}")))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| GatewayError::from(format!("Failed to send email: {e}")))?;

        Ok(())
    }
}
