//! Outbound notification dispatch.
//!
//! Fire-and-forget from the policy engine's point of view: messages are
//! queued to a background worker and delivery failures are logged, never
//! surfaced to the authentication response. The OTP plaintext lives only in
//! the message body; log lines carry recipient and template, nothing else.

use anyhow::{Context, Result};
use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor, message::Mailbox,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info};

use crate::api::handlers::auth::account::OtpContext;

#[derive(Clone, Debug)]
pub enum OutboundKind {
    OtpCode { context: OtpContext, code: String },
    Welcome { first_name: String },
    LoginAlert,
    PasswordReset { reset_url: String },
    PasswordChanged,
}

impl OutboundKind {
    #[must_use]
    pub fn template(&self) -> &'static str {
        match self {
            Self::OtpCode { .. } => "otp_code",
            Self::Welcome { .. } => "welcome",
            Self::LoginAlert => "login_alert",
            Self::PasswordReset { .. } => "password_reset",
            Self::PasswordChanged => "password_changed",
        }
    }

    fn subject(&self) -> &'static str {
        match self {
            Self::OtpCode { .. } => "Your Halcyon verification code",
            Self::Welcome { .. } => "Welcome to Halcyon",
            Self::LoginAlert => "New sign-in to your Halcyon account",
            Self::PasswordReset { .. } => "Reset your Halcyon password",
            Self::PasswordChanged => "Your Halcyon password was changed",
        }
    }

    fn body(&self) -> String {
        match self {
            Self::OtpCode { context, code } => {
                let intro = match context {
                    OtpContext::Registration => "Confirm your email address to finish signing up.",
                    OtpContext::Login => "Confirm this sign-in to your account.",
                    OtpContext::Reverify => "Confirm it's still you to keep your session active.",
                };
                format!("{intro}\n\nYour verification code is: {code}\n\nIt expires in 10 minutes.")
            }
            Self::Welcome { first_name } => format!(
                "Hi {first_name},\n\nYour email is verified and your Halcyon account is ready."
            ),
            Self::LoginAlert => {
                "A new sign-in to your Halcyon account was just verified. If this wasn't you, reset your password now.".to_string()
            }
            Self::PasswordReset { reset_url } => format!(
                "A password reset was requested for your account.\n\nReset it here: {reset_url}\n\nThe link expires in one hour. If you didn't ask for this, you can ignore this email."
            ),
            Self::PasswordChanged => {
                "Your Halcyon password was just changed. If this wasn't you, contact support immediately.".to_string()
            }
        }
    }
}

#[derive(Clone, Debug)]
pub struct OutboundMessage {
    pub to_email: String,
    pub kind: OutboundKind,
}

#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send(&self, message: &OutboundMessage) -> Result<()>;
}

/// Delivery stub for DSN-less development and `log` delivery mode. Logs the
/// envelope only; bodies may carry codes and are never logged.
#[derive(Clone, Debug)]
pub struct LogSender;

#[async_trait]
impl NotificationSender for LogSender {
    async fn send(&self, message: &OutboundMessage) -> Result<()> {
        info!(
            to_email = %message.to_email,
            template = %message.kind.template(),
            "outbound notification (delivery disabled)"
        );
        Ok(())
    }
}

/// SMTP delivery via lettre.
pub struct SmtpSender {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpSender {
    /// # Errors
    /// Returns an error if the relay or the from address is invalid.
    pub fn new(relay: &str, from: &str) -> Result<Self> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(relay)
            .with_context(|| format!("invalid SMTP relay: {relay}"))?
            .build();
        let from = from
            .parse::<Mailbox>()
            .with_context(|| format!("invalid SMTP from address: {from}"))?;
        Ok(Self { transport, from })
    }
}

#[async_trait]
impl NotificationSender for SmtpSender {
    async fn send(&self, message: &OutboundMessage) -> Result<()> {
        let email = Message::builder()
            .from(self.from.clone())
            .to(message
                .to_email
                .parse::<Mailbox>()
                .with_context(|| format!("invalid recipient: {}", message.to_email))?)
            .subject(message.kind.subject())
            .body(message.kind.body())
            .context("failed to build outbound email")?;
        self.transport
            .send(email)
            .await
            .context("failed to send outbound email")?;
        Ok(())
    }
}

/// How outbound notifications leave the process, selected by
/// `HALCYON_OTP_DELIVERY`.
#[derive(Clone, Debug)]
pub enum DeliveryMode {
    Smtp { relay: String, from: String },
    /// Log the envelope instead of delivering; local development only.
    Log,
}

impl DeliveryMode {
    /// # Errors
    /// Returns an error if the SMTP relay or from address is invalid.
    pub fn sender(&self) -> Result<Arc<dyn NotificationSender>> {
        match self {
            Self::Smtp { relay, from } => Ok(Arc::new(SmtpSender::new(relay, from)?)),
            Self::Log => Ok(Arc::new(LogSender)),
        }
    }
}

enum DispatchMode {
    /// Messages drain through a background worker; the caller never waits
    /// on delivery.
    Queued(mpsc::UnboundedSender<OutboundMessage>),
    /// Direct delivery, used by tests with capturing fakes.
    Inline(Arc<dyn NotificationSender>),
}

pub struct Dispatcher {
    mode: DispatchMode,
}

impl Dispatcher {
    /// Spawn the delivery worker and return the queueing dispatcher.
    #[must_use]
    pub fn spawn(sender: Arc<dyn NotificationSender>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<OutboundMessage>();
        tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                if let Err(err) = sender.send(&message).await {
                    error!(
                        to_email = %message.to_email,
                        template = %message.kind.template(),
                        "notification dispatch failed: {err:#}"
                    );
                }
            }
        });
        Self {
            mode: DispatchMode::Queued(tx),
        }
    }

    #[must_use]
    pub fn inline(sender: Arc<dyn NotificationSender>) -> Self {
        Self {
            mode: DispatchMode::Inline(sender),
        }
    }

    /// Hand a message off for delivery. Never fails the caller.
    pub async fn dispatch(&self, message: OutboundMessage) {
        match &self.mode {
            DispatchMode::Queued(tx) => {
                // A closed channel only happens at shutdown; drop silently.
                let _ = tx.send(message);
            }
            DispatchMode::Inline(sender) => {
                if let Err(err) = sender.send(&message).await {
                    error!(
                        to_email = %message.to_email,
                        template = %message.kind.template(),
                        "notification dispatch failed: {err:#}"
                    );
                }
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Capturing fake for policy and handler tests.
    #[derive(Default)]
    pub struct CaptureSender {
        messages: Mutex<Vec<OutboundMessage>>,
    }

    impl CaptureSender {
        pub fn captured(&self) -> Vec<OutboundMessage> {
            self.messages.lock().expect("capture lock").clone()
        }

        /// The most recent OTP code sent to `email`, if any.
        pub fn last_otp_code(&self, email: &str) -> Option<String> {
            self.captured()
                .into_iter()
                .rev()
                .find_map(|message| match message.kind {
                    OutboundKind::OtpCode { code, .. } if message.to_email == email => Some(code),
                    _ => None,
                })
        }

        pub fn last_reset_url(&self, email: &str) -> Option<String> {
            self.captured()
                .into_iter()
                .rev()
                .find_map(|message| match message.kind {
                    OutboundKind::PasswordReset { reset_url } if message.to_email == email => {
                        Some(reset_url)
                    }
                    _ => None,
                })
        }
    }

    #[async_trait]
    impl NotificationSender for CaptureSender {
        async fn send(&self, message: &OutboundMessage) -> Result<()> {
            self.messages
                .lock()
                .expect("capture lock")
                .push(message.clone());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn otp_body_carries_the_code_and_context() {
        let kind = OutboundKind::OtpCode {
            context: OtpContext::Login,
            code: "482913".to_string(),
        };
        assert!(kind.body().contains("482913"));
        assert!(kind.body().contains("sign-in"));
        assert_eq!(kind.template(), "otp_code");
    }

    #[test]
    fn reset_body_carries_the_link() {
        let kind = OutboundKind::PasswordReset {
            reset_url: "https://app.halcyon.health/reset-password#token=abc".to_string(),
        };
        assert!(kind.body().contains("#token=abc"));
    }

    #[tokio::test]
    async fn inline_dispatch_reaches_the_sender() {
        let sender = Arc::new(testing::CaptureSender::default());
        let dispatcher = Dispatcher::inline(sender.clone());
        dispatcher
            .dispatch(OutboundMessage {
                to_email: "alice@example.com".to_string(),
                kind: OutboundKind::LoginAlert,
            })
            .await;
        assert_eq!(sender.captured().len(), 1);
    }

    #[tokio::test]
    async fn queued_dispatch_never_fails_the_caller() {
        struct FailingSender;

        #[async_trait]
        impl NotificationSender for FailingSender {
            async fn send(&self, _message: &OutboundMessage) -> Result<()> {
                anyhow::bail!("smtp unreachable")
            }
        }

        let dispatcher = Dispatcher::spawn(Arc::new(FailingSender));
        // Errors are logged by the worker; dispatch itself cannot fail.
        dispatcher
            .dispatch(OutboundMessage {
                to_email: "alice@example.com".to_string(),
                kind: OutboundKind::PasswordChanged,
            })
            .await;
    }
}
