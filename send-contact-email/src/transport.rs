use crate::{config::MailAccount, content::EmailContent};
use async_trait::async_trait;
use lettre::{
    message::{Mailbox, MultiPart},
    transport::smtp::authentication::{Credentials, Mechanism},
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::info;

#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingEmail {
    pub from: Mailbox,
    pub to: Mailbox,
    pub reply_to: Option<Mailbox>,
    pub content: EmailContent,
}

impl OutgoingEmail {
    fn into_message(self) -> Result<Message, lettre::error::Error> {
        let mut builder = Message::builder()
            .from(self.from)
            .to(self.to)
            .subject(self.content.subject);
        if let Some(reply_to) = self.reply_to {
            builder = builder.reply_to(reply_to);
        }
        builder.multipart(MultiPart::alternative_plain_html(
            self.content.text,
            self.content.html,
        ))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentEmail {
    pub id: Option<String>,
}

/// Opens sessions with the mail server on behalf of a [`MailAccount`].
pub trait MailTransport: Send + Sync {
    type Session: MailSession;

    fn connect(&self, account: &MailAccount) -> Result<Self::Session, TransportError>;
}

#[async_trait]
pub trait MailSession: Send + Sync {
    /// Checks that the server is reachable and accepts the session.
    async fn verify(&self) -> Result<(), TransportError>;

    async fn send(&self, email: OutgoingEmail) -> Result<SentEmail, TransportError>;
}

pub struct LettreMailTransport {
    smtp_url: String,
}

impl LettreMailTransport {
    pub fn new(smtp_url: impl Into<String>) -> Self {
        Self {
            smtp_url: smtp_url.into(),
        }
    }
}

impl MailTransport for LettreMailTransport {
    type Session = LettreMailSession;

    fn connect(&self, account: &MailAccount) -> Result<LettreMailSession, TransportError> {
        info!("Connecting to {}", self.smtp_url);
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::from_url(&self.smtp_url)?
            .authentication(vec![Mechanism::Plain]);

        // Credentials are only attached when the connection URL is over TLS. A misconfigured
        // plain-text URL then fails authentication at the server instead of leaking the
        // account password.
        if self.smtp_url.starts_with("smtps://") {
            builder = builder.credentials(Credentials::new(
                account.user.clone(),
                account.password.clone(),
            ));
        }

        Ok(LettreMailSession(builder.build()))
    }
}

pub struct LettreMailSession(AsyncSmtpTransport<Tokio1Executor>);

#[async_trait]
impl MailSession for LettreMailSession {
    async fn verify(&self) -> Result<(), TransportError> {
        if self.0.test_connection().await? {
            Ok(())
        } else {
            Err(TransportError::Rejected(
                "SMTP server did not accept the connection".into(),
            ))
        }
    }

    async fn send(&self, email: OutgoingEmail) -> Result<SentEmail, TransportError> {
        let message = email.into_message()?;
        let id = message.headers().get_raw("Message-ID").map(str::to_owned);
        let response = self.0.send(message).await?;
        if !response.is_positive() {
            return Err(TransportError::Rejected(
                response.first_line().unwrap_or_default().to_owned(),
            ));
        }
        Ok(SentEmail { id })
    }
}

#[derive(Debug)]
pub enum TransportError {
    Smtp(lettre::transport::smtp::Error),
    Message(lettre::error::Error),
    Rejected(String),
    /// A failure which carries no usable description.
    Unknown,
}

impl TransportError {
    /// The text which may be shown to the client, if the failure has one.
    pub fn description(&self) -> Option<String> {
        match self {
            TransportError::Unknown => None,
            other => Some(other.to_string()),
        }
    }
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportError::Smtp(error) => write!(f, "{error}"),
            TransportError::Message(error) => write!(f, "{error}"),
            TransportError::Rejected(reason) => write!(f, "{reason}"),
            TransportError::Unknown => write!(f, "Unknown mail transport failure"),
        }
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TransportError::Smtp(error) => Some(error),
            TransportError::Message(error) => Some(error),
            _ => None,
        }
    }
}

impl From<lettre::transport::smtp::Error> for TransportError {
    fn from(error: lettre::transport::smtp::Error) -> Self {
        TransportError::Smtp(error)
    }
}

impl From<lettre::error::Error> for TransportError {
    fn from(error: lettre::error::Error) -> Self {
        TransportError::Message(error)
    }
}

#[cfg(test)]
pub mod test_support {
    use super::{MailSession, MailTransport, OutgoingEmail, SentEmail, TransportError};
    use crate::config::MailAccount;
    use async_trait::async_trait;
    use std::{
        collections::HashMap,
        sync::{Arc, Mutex},
    };

    #[derive(Debug, Clone, PartialEq)]
    pub enum TransportCall {
        Connect(MailAccount),
        Verify,
        Send(OutgoingEmail),
    }

    #[derive(Debug, Clone, Copy)]
    pub enum FakeFailure {
        Described(&'static str),
        Unknown,
    }

    impl FakeFailure {
        fn into_error(self) -> TransportError {
            match self {
                FakeFailure::Described(reason) => TransportError::Rejected(reason.into()),
                FakeFailure::Unknown => TransportError::Unknown,
            }
        }
    }

    #[derive(Default)]
    struct FakeState {
        calls: Vec<TransportCall>,
        connect_failure: Option<FakeFailure>,
        verify_failure: Option<FakeFailure>,
        send_failures: HashMap<usize, FakeFailure>,
        send_attempts: usize,
    }

    /// Records every call and fails wherever it was told to. Clones share their records.
    #[derive(Clone, Default)]
    pub struct FakeMailTransport(Arc<Mutex<FakeState>>);

    impl FakeMailTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn failing_connect(self, failure: FakeFailure) -> Self {
            self.0.lock().unwrap().connect_failure = Some(failure);
            self
        }

        pub fn failing_verify(self, failure: FakeFailure) -> Self {
            self.0.lock().unwrap().verify_failure = Some(failure);
            self
        }

        /// Fails the send attempt with the given zero-based index.
        pub fn failing_send(self, attempt: usize, failure: FakeFailure) -> Self {
            self.0
                .lock()
                .unwrap()
                .send_failures
                .insert(attempt, failure);
            self
        }

        pub fn calls(&self) -> Vec<TransportCall> {
            self.0.lock().unwrap().calls.clone()
        }

        pub fn sent_emails(&self) -> Vec<OutgoingEmail> {
            self.calls()
                .into_iter()
                .filter_map(|call| match call {
                    TransportCall::Send(email) => Some(email),
                    _ => None,
                })
                .collect()
        }
    }

    impl MailTransport for FakeMailTransport {
        type Session = FakeMailTransport;

        fn connect(&self, account: &MailAccount) -> Result<Self::Session, TransportError> {
            let mut state = self.0.lock().unwrap();
            state.calls.push(TransportCall::Connect(account.clone()));
            match state.connect_failure {
                Some(failure) => Err(failure.into_error()),
                None => Ok(self.clone()),
            }
        }
    }

    #[async_trait]
    impl MailSession for FakeMailTransport {
        async fn verify(&self) -> Result<(), TransportError> {
            let mut state = self.0.lock().unwrap();
            state.calls.push(TransportCall::Verify);
            match state.verify_failure {
                Some(failure) => Err(failure.into_error()),
                None => Ok(()),
            }
        }

        async fn send(&self, email: OutgoingEmail) -> Result<SentEmail, TransportError> {
            let mut state = self.0.lock().unwrap();
            state.calls.push(TransportCall::Send(email));
            let attempt = state.send_attempts;
            state.send_attempts += 1;
            match state.send_failures.get(&attempt) {
                Some(failure) => Err(failure.into_error()),
                None => Ok(SentEmail {
                    id: Some(format!("<fake-{attempt}@contact.test>")),
                }),
            }
        }
    }
}
