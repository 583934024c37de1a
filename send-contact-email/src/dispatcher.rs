use crate::{
    config::MailAccount,
    content::{build_confirmation, build_notification},
    transport::{MailSession, MailTransport, OutgoingEmail, TransportError},
    validation::ContactSubmission,
};
use chrono::Utc;
use lettre::{address::AddressError, message::Mailbox, Address};
use tracing::{info, warn};

pub const CONFIRMATION_SENDER_NAME: &str = "Dan Ferrari - Portfolio";
pub const UNKNOWN_SEND_ERROR: &str = "Error desconocido al enviar email";

/// Relays a submission to the site owner and sends the submitter an auto-reply.
pub struct MailDispatcher<MailTransportT: MailTransport> {
    transport: MailTransportT,
}

impl<MailTransportT: MailTransport> MailDispatcher<MailTransportT> {
    pub fn new(transport: MailTransportT) -> Self {
        Self { transport }
    }

    /// Verifies the session, then sends the notification and, on a best-effort basis, the
    /// confirmation.
    ///
    /// Any failure up to and including the notification aborts the dispatch. A failed
    /// confirmation is only logged.
    pub async fn dispatch(
        &self,
        account: &MailAccount,
        submission: &ContactSubmission,
    ) -> Result<(), DispatchError> {
        let session = self
            .transport
            .connect(account)
            .map_err(DispatchError::Verify)?;
        session.verify().await.map_err(DispatchError::Verify)?;

        let notification = Self::notification_email(account, submission)?;
        let sent = session
            .send(notification)
            .await
            .map_err(DispatchError::Notification)?;
        info!(
            "Contact email sent successfully: {}",
            sent.id.as_deref().unwrap_or("(no message id)")
        );

        match Self::confirmation_email(account, submission) {
            Ok(confirmation) => match session.send(confirmation).await {
                Ok(sent) => info!(
                    "Confirmation email sent successfully: {}",
                    sent.id.as_deref().unwrap_or("(no message id)")
                ),
                Err(error) => warn!("Error sending confirmation email: {error}"),
            },
            Err(error) => warn!("Error building confirmation email: {error}"),
        }
        Ok(())
    }

    fn notification_email(
        account: &MailAccount,
        submission: &ContactSubmission,
    ) -> Result<OutgoingEmail, DispatchError> {
        let sender_name = format!("{} {}", submission.first_name, submission.last_name);
        Ok(OutgoingEmail {
            from: Mailbox::new(Some(sender_name), account.user.parse::<Address>()?),
            to: account.destination.parse()?,
            reply_to: Some(submission.email.parse()?),
            content: build_notification(submission, Utc::now())?,
        })
    }

    fn confirmation_email(
        account: &MailAccount,
        submission: &ContactSubmission,
    ) -> Result<OutgoingEmail, DispatchError> {
        Ok(OutgoingEmail {
            from: Mailbox::new(
                Some(CONFIRMATION_SENDER_NAME.into()),
                account.user.parse::<Address>()?,
            ),
            to: submission.email.parse()?,
            reply_to: None,
            content: build_confirmation(submission)?,
        })
    }
}

#[derive(Debug)]
pub enum DispatchError {
    Verify(TransportError),
    Notification(TransportError),
    InvalidAddress(AddressError),
    Content(tinytemplate::error::Error),
}

impl DispatchError {
    /// The text reported to the client, if this failure has one worth showing.
    pub fn client_message(&self) -> Option<String> {
        match self {
            DispatchError::Verify(error) | DispatchError::Notification(error) => Some(
                error
                    .description()
                    .unwrap_or_else(|| UNKNOWN_SEND_ERROR.into()),
            ),
            DispatchError::InvalidAddress(error) => Some(error.to_string()),
            DispatchError::Content(_) => None,
        }
    }
}

impl std::fmt::Display for DispatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DispatchError::Verify(error) => write!(f, "Mail transport verification failed: {error}"),
            DispatchError::Notification(error) => {
                write!(f, "Error sending contact email: {error}")
            }
            DispatchError::InvalidAddress(error) => write!(f, "Invalid email address: {error}"),
            DispatchError::Content(error) => write!(f, "Error rendering email: {error}"),
        }
    }
}

impl std::error::Error for DispatchError {}

impl From<AddressError> for DispatchError {
    fn from(error: AddressError) -> Self {
        DispatchError::InvalidAddress(error)
    }
}

impl From<tinytemplate::error::Error> for DispatchError {
    fn from(error: tinytemplate::error::Error) -> Self {
        DispatchError::Content(error)
    }
}
