use async_trait::async_trait;
use serde::Serialize;
use std::sync::{Arc, Mutex};

// 1. Mailer Contract
/// Mailer
///
/// Delivers confirmation codes to users. The HTTP relay is used in production,
/// the console implementation in local development and the mock in tests.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Sends `code` to `email`. Errors carry a human-readable cause.
    async fn send_confirmation_code(&self, email: &str, code: &str) -> Result<(), String>;
}

pub const CONFIRMATION_SUBJECT: &str = "Account registration";

/// Body of the confirmation mail.
pub fn confirmation_body(code: &str) -> String {
    format!("Confirmation code: {code}")
}

/// Wire format understood by the transactional mail API.
#[derive(Debug, Serialize)]
struct OutgoingMail<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    text: String,
}

// 2. The Real Implementation
/// HttpMailer
///
/// Posts each message as JSON to a transactional mail HTTP API, authenticating
/// with a bearer API key.
#[derive(Clone)]
pub struct HttpMailer {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    sender: String,
}

impl HttpMailer {
    pub fn new(endpoint: &str, api_key: &str, sender: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.to_string(),
            api_key: api_key.to_string(),
            sender: sender.to_string(),
        }
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send_confirmation_code(&self, email: &str, code: &str) -> Result<(), String> {
        let mail = OutgoingMail {
            from: &self.sender,
            to: [email],
            subject: CONFIRMATION_SUBJECT,
            text: confirmation_body(code),
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&mail)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if !response.status().is_success() {
            return Err(format!("mail relay responded with {}", response.status()));
        }
        Ok(())
    }
}

/// ConsoleMailer
///
/// Writes messages to the log instead of sending them.
#[derive(Clone, Default)]
pub struct ConsoleMailer {
    pub sender: String,
}

impl ConsoleMailer {
    pub fn new(sender: &str) -> Self {
        Self {
            sender: sender.to_string(),
        }
    }
}

#[async_trait]
impl Mailer for ConsoleMailer {
    async fn send_confirmation_code(&self, email: &str, code: &str) -> Result<(), String> {
        tracing::info!(
            from = %self.sender,
            to = %email,
            subject = CONFIRMATION_SUBJECT,
            "{}",
            confirmation_body(code)
        );
        Ok(())
    }
}

// 3. The Mock Implementation (For Tests)
/// SentMail
///
/// A message captured by `MockMailer`.
#[derive(Debug, Clone, PartialEq)]
pub struct SentMail {
    pub to: String,
    pub code: String,
}

/// MockMailer
///
/// Records every message so tests can read the confirmation code back.
#[derive(Clone, Default)]
pub struct MockMailer {
    /// When true, every send returns a simulated failure.
    pub should_fail: bool,
    pub sent: Arc<Mutex<Vec<SentMail>>>,
}

impl MockMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    /// The most recent code sent to `email`.
    pub fn last_code_for(&self, email: &str) -> Option<String> {
        let sent = self.sent.lock().ok()?;
        sent.iter().rev().find(|m| m.to == email).map(|m| m.code.clone())
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().map(|s| s.len()).unwrap_or(0)
    }
}

#[async_trait]
impl Mailer for MockMailer {
    async fn send_confirmation_code(&self, email: &str, code: &str) -> Result<(), String> {
        if self.should_fail {
            return Err("Mock Mailer Error: Simulation requested".to_string());
        }
        let mut sent = self.sent.lock().map_err(|e| e.to_string())?;
        sent.push(SentMail {
            to: email.to_string(),
            code: code.to_string(),
        });
        Ok(())
    }
}

/// MailerState
///
/// The concrete type used to share the mailer across the application state.
pub type MailerState = Arc<dyn Mailer>;
