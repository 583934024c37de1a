mod config;
mod content;
mod cors;
mod dispatcher;
mod secrets;
mod transport;
mod validation;

use config::Config;
use cors::CorsHeaders;
use dispatcher::{DispatchError, MailDispatcher};
use lambda_http::{
    http::{Method, StatusCode},
    run, service_fn, Body, Error, Request, Response,
};
use secrets::{AwsSecretsManagerSecretRepository, SecretRepository};
use serde::Serialize;
use tracing::{debug, error};
use transport::{LettreMailTransport, MailTransport};
use validation::{validate_submission, FieldError, ValidationErrors};

const SUCCESS_MESSAGE: &str = "Email enviado exitosamente";
const INVALID_DATA_MESSAGE: &str = "Datos inválidos";
const INCOMPLETE_CONFIGURATION_MESSAGE: &str = "Configuración del servidor incompleta";
const SEND_ERROR_MESSAGE: &str = "Error al enviar email";
const INTERNAL_ERROR_MESSAGE: &str = "Error interno del servidor";
const METHOD_NOT_ALLOWED_MESSAGE: &str = "Método no permitido";

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .without_time()
        .init();

    let mut config = Config::from_env();
    if config.smtp_credentials_secret.is_some() {
        let secrets_repository = AwsSecretsManagerSecretRepository::open().await;
        config = config.with_secret_credentials(&secrets_repository).await;
    }
    let transport = LettreMailTransport::new(config.smtp_url.clone());
    let handler = ContactEmailHandler::new(config, transport);
    run(service_fn(|event| handler.handle(event))).await
}

struct ContactEmailHandler<MailTransportT: MailTransport> {
    config: Config,
    dispatcher: MailDispatcher<MailTransportT>,
}

impl<MailTransportT: MailTransport> ContactEmailHandler<MailTransportT> {
    fn new(config: Config, transport: MailTransportT) -> Self {
        Self {
            config,
            dispatcher: MailDispatcher::new(transport),
        }
    }

    async fn handle(&self, event: Request) -> Result<Response<Body>, Error> {
        let origin = event
            .headers()
            .get("Origin")
            .and_then(|value| value.to_str().ok());
        let cors = CorsHeaders::for_origin(&self.config.allowed_origins, origin);
        match *event.method() {
            Method::OPTIONS => Ok(cors
                .apply(Response::builder())
                .status(StatusCode::OK)
                .body(Body::Empty)?),
            Method::POST => match self.process_submission(event.body()).await {
                Ok(()) => json_response(&cors, StatusCode::OK, &ResponseBody::success()),
                Err(error) => {
                    error.log();
                    error.into_response(&cors)
                }
            },
            _ => json_response(
                &cors,
                StatusCode::METHOD_NOT_ALLOWED,
                &ResponseBody::failure(METHOD_NOT_ALLOWED_MESSAGE),
            ),
        }
    }

    async fn process_submission(&self, body: &Body) -> Result<(), ContactFormError> {
        let payload: serde_json::Value = serde_json::from_slice(body)
            .map_err(|error| ContactFormError::Internal(format!("Unparseable body: {error}")))?;
        let submission = validate_submission(&payload)?;
        debug!("Validated contact submission: {submission:?}");
        let Some(account) = self.config.mail_account() else {
            return Err(ContactFormError::IncompleteConfiguration);
        };
        self.dispatcher.dispatch(&account, &submission).await?;
        Ok(())
    }
}

#[derive(Serialize, Debug)]
struct ResponseBody {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Vec<FieldError>>,
}

impl ResponseBody {
    fn success() -> Self {
        Self {
            success: true,
            message: Some(SUCCESS_MESSAGE.into()),
            error: None,
            details: None,
        }
    }

    fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            message: None,
            error: Some(error.into()),
            details: None,
        }
    }
}

fn json_response(
    cors: &CorsHeaders,
    status: StatusCode,
    body: &ResponseBody,
) -> Result<Response<Body>, Error> {
    Ok(cors
        .apply(Response::builder())
        .status(status)
        .header("Content-Type", "application/json")
        .body(serde_json::to_string(body)?.into())?)
}

#[derive(Debug)]
enum ContactFormError {
    Validation(ValidationErrors),
    IncompleteConfiguration,
    Dispatch(DispatchError),
    Internal(String),
}

impl ContactFormError {
    fn log(&self) {
        match self {
            ContactFormError::Validation(errors) => {
                debug!("Rejected contact submission: {errors}");
            }
            ContactFormError::IncompleteConfiguration => {
                error!("Missing environment variables for email configuration");
            }
            ContactFormError::Dispatch(error) => {
                error!("Error dispatching contact form email: {error}");
            }
            ContactFormError::Internal(description) => {
                error!("Internal error handling contact form: {description}");
            }
        }
    }

    fn into_response(self, cors: &CorsHeaders) -> Result<Response<Body>, Error> {
        match self {
            ContactFormError::Validation(ValidationErrors(details)) => json_response(
                cors,
                StatusCode::BAD_REQUEST,
                &ResponseBody {
                    details: Some(details),
                    ..ResponseBody::failure(INVALID_DATA_MESSAGE)
                },
            ),
            ContactFormError::IncompleteConfiguration => json_response(
                cors,
                StatusCode::INTERNAL_SERVER_ERROR,
                &ResponseBody::failure(INCOMPLETE_CONFIGURATION_MESSAGE),
            ),
            ContactFormError::Dispatch(error) => json_response(
                cors,
                StatusCode::INTERNAL_SERVER_ERROR,
                &ResponseBody::failure(
                    error
                        .client_message()
                        .unwrap_or_else(|| SEND_ERROR_MESSAGE.into()),
                ),
            ),
            ContactFormError::Internal(_) => json_response(
                cors,
                StatusCode::INTERNAL_SERVER_ERROR,
                &ResponseBody::failure(INTERNAL_ERROR_MESSAGE),
            ),
        }
    }
}

impl std::fmt::Display for ContactFormError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContactFormError::Validation(errors) => write!(f, "Invalid submission: {errors}"),
            ContactFormError::IncompleteConfiguration => {
                write!(f, "Incomplete email configuration")
            }
            ContactFormError::Dispatch(error) => write!(f, "{error}"),
            ContactFormError::Internal(description) => write!(f, "Internal error: {description}"),
        }
    }
}

impl std::error::Error for ContactFormError {}

impl From<ValidationErrors> for ContactFormError {
    fn from(errors: ValidationErrors) -> Self {
        ContactFormError::Validation(errors)
    }
}

impl From<DispatchError> for ContactFormError {
    fn from(error: DispatchError) -> Self {
        ContactFormError::Dispatch(error)
    }
}
