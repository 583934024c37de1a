use crate::{cors::AllowedOrigins, secrets::SecretRepository};
use serde::Deserialize;
use tracing::{error, info};

const DEFAULT_SMTP_URL: &str = "smtps://smtp.gmail.com";

const ACCOUNT_USER_VAR: &str = "GMAIL_USER";
const ACCOUNT_PASSWORD_VAR: &str = "GMAIL_APP_PASSWORD";
const DESTINATION_EMAIL_VAR: &str = "DESTINATION_EMAIL";
const ALLOWED_ORIGIN_VAR: &str = "ALLOWED_ORIGIN";
const SMTP_URL_VAR: &str = "SMTP_URL";
const SMTP_CREDENTIALS_SECRET_VAR: &str = "SMTP_CREDENTIALS_SECRET";

/// Process-wide settings, read once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub account_user: Option<String>,
    pub account_password: Option<String>,
    pub destination_email: Option<String>,
    pub allowed_origins: AllowedOrigins,
    pub smtp_url: String,
    pub smtp_credentials_secret: Option<String>,
}

/// The sending account and destination, available only when all of them are configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailAccount {
    pub user: String,
    pub password: String,
    pub destination: String,
}

#[derive(Deserialize)]
struct SmtpCredentials {
    #[serde(rename = "SMTP_USERNAME")]
    username: String,
    #[serde(rename = "SMTP_PASSWORD")]
    password: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let value = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        Self {
            account_user: value(ACCOUNT_USER_VAR),
            account_password: value(ACCOUNT_PASSWORD_VAR),
            destination_email: value(DESTINATION_EMAIL_VAR),
            allowed_origins: AllowedOrigins::parse(value(ALLOWED_ORIGIN_VAR).as_deref()),
            smtp_url: value(SMTP_URL_VAR).unwrap_or_else(|| DEFAULT_SMTP_URL.into()),
            smtp_credentials_secret: value(SMTP_CREDENTIALS_SECRET_VAR),
        }
    }

    /// Fills in the account credentials from the secret named by `SMTP_CREDENTIALS_SECRET`
    /// when the environment does not already provide them.
    ///
    /// A failed lookup is logged and leaves the configuration incomplete.
    pub async fn with_secret_credentials<SecretRepositoryT: SecretRepository>(
        mut self,
        secrets_repository: &SecretRepositoryT,
    ) -> Self {
        let Some(secret_name) = self.smtp_credentials_secret.clone() else {
            return self;
        };
        if self.account_user.is_some() && self.account_password.is_some() {
            return self;
        }
        match secrets_repository
            .get_secret::<SmtpCredentials>(&secret_name)
            .await
        {
            Ok(credentials) => {
                info!("Loaded SMTP credentials from secret {secret_name}");
                self.account_user.get_or_insert(credentials.username);
                self.account_password.get_or_insert(credentials.password);
            }
            Err(error) => {
                error!("Could not retrieve SMTP credentials {secret_name}: {error:#}");
            }
        }
        self
    }

    pub fn mail_account(&self) -> Option<MailAccount> {
        Some(MailAccount {
            user: self.account_user.clone()?,
            password: self.account_password.clone()?,
            destination: self.destination_email.clone()?,
        })
    }
}


#[cfg(test)]
mod tests {
    use super::{
        test_support::{complete_config, config_from},
        Config, MailAccount,
    };
    use crate::{cors::AllowedOrigins, secrets::test_support::FakeSecretRepository};
    use googletest::prelude::*;

    const SMTP_SECRET: &str = "smtp-credentials";

    #[test]
    fn provides_mail_account_when_complete() -> Result<()> {
        verify_that!(
            complete_config().mail_account(),
            some(eq(MailAccount {
                user: "test@gmail.com".into(),
                password: "test-password".into(),
                destination: "destination@test.com".into(),
            }))
        )
    }

    #[googletest::test]
    fn provides_no_mail_account_when_any_value_is_missing() {
        for missing in ["GMAIL_USER", "GMAIL_APP_PASSWORD", "DESTINATION_EMAIL"] {
            let pairs: Vec<(&str, &str)> = [
                ("GMAIL_USER", "test@gmail.com"),
                ("GMAIL_APP_PASSWORD", "test-password"),
                ("DESTINATION_EMAIL", "destination@test.com"),
            ]
            .into_iter()
            .filter(|(key, _)| *key != missing)
            .collect();

            expect_that!(config_from(&pairs).mail_account(), none());
        }
    }

    #[test]
    fn treats_blank_values_as_missing() -> Result<()> {
        let config = config_from(&[
            ("GMAIL_USER", "test@gmail.com"),
            ("GMAIL_APP_PASSWORD", "  "),
            ("DESTINATION_EMAIL", "destination@test.com"),
        ]);

        verify_that!(config.mail_account(), none())
    }

    #[googletest::test]
    fn applies_defaults_when_unset() {
        let config = config_from(&[]);

        expect_that!(config.allowed_origins, eq(AllowedOrigins::Any));
        expect_that!(config.smtp_url, eq("smtps://smtp.gmail.com"));
    }

    #[test]
    fn reads_smtp_url_override() -> Result<()> {
        let config = config_from(&[("SMTP_URL", "smtp://localhost:4567")]);

        verify_that!(config.smtp_url, eq("smtp://localhost:4567"))
    }

    #[tokio::test]
    async fn fills_credentials_from_secret() -> Result<()> {
        let mut secrets = FakeSecretRepository::default();
        secrets.add_secret(
            SMTP_SECRET,
            r#"{
                "SMTP_USERNAME": "secret user",
                "SMTP_PASSWORD": "secret password"
            }"#,
        );
        let config = config_from(&[
            ("DESTINATION_EMAIL", "destination@test.com"),
            ("SMTP_CREDENTIALS_SECRET", SMTP_SECRET),
        ]);

        let config = config.with_secret_credentials(&secrets).await;

        verify_that!(
            config.mail_account(),
            some(eq(MailAccount {
                user: "secret user".into(),
                password: "secret password".into(),
                destination: "destination@test.com".into(),
            }))
        )
    }

    #[tokio::test]
    async fn prefers_credentials_from_environment() -> Result<()> {
        let mut secrets = FakeSecretRepository::default();
        secrets.add_secret(
            SMTP_SECRET,
            r#"{"SMTP_USERNAME": "secret user", "SMTP_PASSWORD": "secret password"}"#,
        );
        let config = Config {
            smtp_credentials_secret: Some(SMTP_SECRET.into()),
            ..complete_config()
        };

        let config = config.with_secret_credentials(&secrets).await;

        verify_that!(config.account_user, some(eq("test@gmail.com")))
    }

    #[tokio::test]
    async fn stays_incomplete_when_secret_is_missing() -> Result<()> {
        let secrets = FakeSecretRepository::default();
        let config = config_from(&[
            ("DESTINATION_EMAIL", "destination@test.com"),
            ("SMTP_CREDENTIALS_SECRET", SMTP_SECRET),
        ]);

        let config = config.with_secret_credentials(&secrets).await;

        verify_that!(config.mail_account(), none())
    }
}
