//! Outbound email. Delivery is a collaborator behind [`EmailSender`]; this
//! module also composes the two messages the auth flows send.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("delivery to {to} failed: {reason}")]
    Delivery { to: String, reason: String },
}

#[rocket::async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub subject: String,
    pub body: String,
}

impl Email {
    pub fn reset_password(app_url: &str, token: &str) -> Self {
        let link = format!("{}/reset-password?token={}", app_url.trim_end_matches('/'), token);
        Self {
            subject: "Reset password".into(),
            body: format!(
                "Dear user,\n\n\
                 To reset your password, click on this link: {link}\n\n\
                 If you did not request any password resets, then ignore this email."
            ),
        }
    }

    pub fn verification(app_url: &str, token: &str) -> Self {
        let link = format!("{}/verify-email?token={}", app_url.trim_end_matches('/'), token);
        Self {
            subject: "Email Verification".into(),
            body: format!(
                "Dear user,\n\n\
                 To verify your email, click on this link: {link}\n\n\
                 If you did not create an account, then ignore this email."
            ),
        }
    }
}

/// Development transport: records each delivery in the log instead of
/// talking to a mail server. Bodies carry live tokens, so they only appear at
/// debug level.
#[derive(Debug, Clone)]
pub struct LogMailer {
    from: String,
}

impl LogMailer {
    pub fn new(from: impl Into<String>) -> Self {
        Self { from: from.into() }
    }
}

#[rocket::async_trait]
impl EmailSender for LogMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError> {
        log::info!("email from {} to {}: {}", self.from, to, subject);
        log::debug!("email body for {}:\n{}", to, body);
        Ok(())
    }
}
