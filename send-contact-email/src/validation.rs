use lettre::Address;
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::LazyLock;
use validator::{Validate, ValidationError};

pub const DEFAULT_LANGUAGE: &str = "es";

const REQUIRED_MESSAGE: &str = "Campo requerido";
const EXPECTED_TEXT_MESSAGE: &str = "Se esperaba un texto";
const EXPECTED_OBJECT_MESSAGE: &str = "Se esperaba un objeto";

static NAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-ZÀ-ÿ\s]+$").unwrap());
static PHONE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?[0-9\s\-().]+$").unwrap());
// Dot-atom local part, then domain labels which start and end alphanumeric, then a TLD.
static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[A-Za-z0-9_'+\-]+(\.[A-Za-z0-9_'+\-]+)*@([A-Za-z0-9]([A-Za-z0-9\-]*[A-Za-z0-9])?\.)+[A-Za-z]{2,}$",
    )
    .unwrap()
});

/// A contact form submission whose fields have all passed validation.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ContactSubmission {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: String,
    pub message: String,
    pub language: String,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FieldErrorCode {
    InvalidType,
    TooSmall,
    TooBig,
    InvalidString,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub path: Vec<String>,
    pub code: FieldErrorCode,
    pub message: String,
}

impl FieldError {
    fn new(field: &str, code: FieldErrorCode, message: &str) -> Self {
        Self {
            path: vec![field.into()],
            code,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrors(pub Vec<FieldError>);

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let fields = self
            .0
            .iter()
            .map(|error| format!("{}: {}", error.path.join("."), error.message))
            .collect::<Vec<_>>();
        write!(f, "Invalid submission ({})", fields.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

/// The text fields of a submission, checked once each has been read as a string.
#[derive(Validate)]
struct SubmissionText {
    #[validate(length(min = 2, max = 50), regex(path = *NAME_PATTERN))]
    first_name: String,
    #[validate(length(min = 2, max = 50), regex(path = *NAME_PATTERN))]
    last_name: String,
    #[validate(
        length(max = 50),
        email,
        regex(path = *EMAIL_PATTERN),
        custom(function = "deliverable_address")
    )]
    email: String,
    #[validate(length(min = 8, max = 15), regex(path = *PHONE_PATTERN))]
    phone_number: String,
    #[validate(length(min = 10, max = 1000))]
    message: String,
}

/// Rejects addresses the mail transport would refuse as a Reply-To or recipient.
fn deliverable_address(email: &str) -> Result<(), ValidationError> {
    email
        .parse::<Address>()
        .map(|_| ())
        .map_err(|_| ValidationError::new("address"))
}

/// How the rule failures of one text field are reported to the client.
struct TextField {
    name: &'static str,
    key: &'static str,
    too_short: &'static str,
    too_long: &'static str,
    invalid: &'static str,
}

static TEXT_FIELDS: [TextField; 5] = [
    TextField {
        name: "firstName",
        key: "first_name",
        too_short: "El nombre debe tener al menos 2 caracteres",
        too_long: "El nombre no puede exceder 50 caracteres",
        invalid: "El nombre solo puede contener letras",
    },
    TextField {
        name: "lastName",
        key: "last_name",
        too_short: "El apellido debe tener al menos 2 caracteres",
        too_long: "El apellido no puede exceder 50 caracteres",
        invalid: "El apellido solo puede contener letras",
    },
    TextField {
        name: "email",
        key: "email",
        too_short: "",
        too_long: "El email no puede exceder 50 caracteres",
        invalid: "Email inválido",
    },
    TextField {
        name: "phoneNumber",
        key: "phone_number",
        too_short: "El teléfono debe tener al menos 8 caracteres",
        too_long: "El teléfono no puede exceder 15 caracteres",
        invalid: "El teléfono contiene caracteres inválidos",
    },
    TextField {
        name: "message",
        key: "message",
        too_short: "El mensaje debe tener al menos 10 caracteres",
        too_long: "El mensaje no puede exceder 1000 caracteres",
        invalid: "",
    },
];

impl TextField {
    /// Length failures come first. The syntax checks of one field collapse into a single error.
    fn errors(
        &self,
        value: &str,
        failures: Option<&validator::ValidationErrors>,
    ) -> Vec<FieldError> {
        let Some(failures) =
            failures.and_then(|failures| failures.field_errors().get(self.key).copied())
        else {
            return vec![];
        };
        let length = value.chars().count() as u64;
        let mut errors: Vec<FieldError> = failures
            .iter()
            .map(|failure| {
                if failure.code != "length" {
                    return FieldError::new(self.name, FieldErrorCode::InvalidString, self.invalid);
                }
                let too_short = failure
                    .params
                    .get("min")
                    .and_then(Value::as_u64)
                    .is_some_and(|min| length < min);
                if too_short {
                    FieldError::new(self.name, FieldErrorCode::TooSmall, self.too_short)
                } else {
                    FieldError::new(self.name, FieldErrorCode::TooBig, self.too_long)
                }
            })
            .collect();
        errors.sort_by_key(|error| error.code == FieldErrorCode::InvalidString);
        errors.dedup();
        errors
    }
}

/// Validates an untyped JSON payload into a [`ContactSubmission`].
///
/// Every field is checked independently and every violated rule is reported, in field
/// declaration order. An absent `language` defaults to [`DEFAULT_LANGUAGE`].
pub fn validate_submission(payload: &Value) -> Result<ContactSubmission, ValidationErrors> {
    let Value::Object(fields) = payload else {
        return Err(ValidationErrors(vec![FieldError {
            path: vec![],
            code: FieldErrorCode::InvalidType,
            message: EXPECTED_OBJECT_MESSAGE.into(),
        }]));
    };

    let read = TEXT_FIELDS.each_ref().map(|field| read_text(fields, field.name));
    let language = read_language(fields);
    let [first_name, last_name, email, phone_number, message] =
        read.clone().map(Result::unwrap_or_default);
    let text = SubmissionText {
        first_name,
        last_name,
        email,
        phone_number,
        message,
    };
    let failures = text.validate().err();

    let mut errors = Vec::new();
    for (field, value) in TEXT_FIELDS.iter().zip(&read) {
        match value {
            Ok(value) => errors.extend(field.errors(value, failures.as_ref())),
            Err(error) => errors.push(error.clone()),
        }
    }
    let language = match language {
        Ok(language) => Some(language),
        Err(error) => {
            errors.push(error);
            None
        }
    };

    match language {
        Some(language) if errors.is_empty() => Ok(ContactSubmission {
            first_name: text.first_name,
            last_name: text.last_name,
            email: text.email,
            phone_number: text.phone_number,
            message: text.message,
            language,
        }),
        _ => Err(ValidationErrors(errors)),
    }
}

fn read_text(fields: &Map<String, Value>, field: &str) -> Result<String, FieldError> {
    match fields.get(field) {
        None => Err(FieldError::new(
            field,
            FieldErrorCode::InvalidType,
            REQUIRED_MESSAGE,
        )),
        Some(Value::String(value)) => Ok(value.clone()),
        Some(_) => Err(FieldError::new(
            field,
            FieldErrorCode::InvalidType,
            EXPECTED_TEXT_MESSAGE,
        )),
    }
}

fn read_language(fields: &Map<String, Value>) -> Result<String, FieldError> {
    match fields.get("language") {
        None => Ok(DEFAULT_LANGUAGE.into()),
        Some(Value::String(language)) => Ok(language.clone()),
        Some(_) => Err(FieldError::new(
            "language",
            FieldErrorCode::InvalidType,
            EXPECTED_TEXT_MESSAGE,
        )),
    }
}
