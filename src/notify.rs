use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::info;

pub const CONFIRM_CREATION: &str = "confirm_creation";
pub const RESET_PASSWORD: &str = "reset_password";

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("unknown mail template: {0}")]
    UnknownTemplate(String),
    #[error("mail delivery failed: {0}")]
    Delivery(String),
}

/// A templated account-lifecycle message.
#[derive(Debug, Clone, Serialize)]
pub struct Mail {
    pub to: String,
    pub subject: String,
    pub template: &'static str,
    pub context: Map<String, Value>,
}

impl Mail {
    pub fn confirm_creation(name: &str, email: &str, confirmation_url: String) -> Self {
        Self::build(name, email, "Account confirmation", CONFIRM_CREATION, confirmation_url)
    }

    pub fn reset_password(name: &str, email: &str, confirmation_url: String) -> Self {
        Self::build(name, email, "Password reset", RESET_PASSWORD, confirmation_url)
    }

    fn build(
        name: &str,
        email: &str,
        subject: &str,
        template: &'static str,
        confirmation_url: String,
    ) -> Self {
        let mut context = Map::new();
        context.insert("username".into(), Value::String(name.to_string()));
        context.insert("confirmation_url".into(), Value::String(confirmation_url));
        Self {
            to: format!("{} <{}>", name, email),
            subject: subject.to_string(),
            template,
            context,
        }
    }

    pub fn context_str(&self, key: &str) -> Option<&str> {
        self.context.get(key).and_then(Value::as_str)
    }

    /// Plain-text body for the known templates.
    pub fn render(&self) -> Result<String, NotifyError> {
        let username = self.context_str("username").unwrap_or_default();
        let url = self.context_str("confirmation_url").unwrap_or_default();
        match self.template {
            CONFIRM_CREATION => Ok(format!(
                "Hello {username},\n\nconfirm your account by opening the link below:\n{url}\n"
            )),
            RESET_PASSWORD => Ok(format!(
                "Hello {username},\n\nset a new password by opening the link below:\n{url}\n\n\
                 If you did not ask for a reset, ignore this message.\n"
            )),
            other => Err(NotifyError::UnknownTemplate(other.to_string())),
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, mail: Mail) -> Result<(), NotifyError>;
}

/// Renders mails and hands them to the tracing pipeline instead of an SMTP relay.
pub struct LogNotifier {
    from: String,
}

impl LogNotifier {
    pub fn new(from: impl Into<String>) -> Self {
        Self { from: from.into() }
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, mail: Mail) -> Result<(), NotifyError> {
        let body = mail.render()?;
        info!(
            from = %self.from,
            to = %mail.to,
            subject = %mail.subject,
            template = mail.template,
            bytes = body.len(),
            "mail dispatched"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confirm_mail_carries_context() {
        let mail = Mail::confirm_creation("Ana", "ana@x.com", "http://app/confirm/abc".into());
        assert_eq!(mail.to, "Ana <ana@x.com>");
        assert_eq!(mail.template, CONFIRM_CREATION);
        assert_eq!(mail.context_str("username"), Some("Ana"));
        assert_eq!(mail.context_str("confirmation_url"), Some("http://app/confirm/abc"));
        assert!(mail.render().unwrap().contains("http://app/confirm/abc"));
    }

    #[test]
    fn unknown_template_fails_to_render() {
        let mut mail = Mail::reset_password("Ana", "ana@x.com", "u".into());
        mail.template = "newsletter";
        assert!(matches!(mail.render(), Err(NotifyError::UnknownTemplate(_))));
    }

    #[tokio::test]
    async fn log_notifier_accepts_known_templates() {
        let notifier = LogNotifier::new("no-reply@test.local");
        let mail = Mail::reset_password("Ana", "ana@x.com", "http://app/reset/abc".into());
        assert!(notifier.send(mail).await.is_ok());
    }
}
