use crate::validation::ContactSubmission;
use chrono::{DateTime, Datelike, FixedOffset, Timelike, Utc};
use serde::Serialize;
use tinytemplate::{error::Error, format_unescaped, TinyTemplate};

pub const PORTFOLIO_URL: &str = "https://daniferrari1994.github.io/portfolio/";
pub const ORIGIN_LABEL: &str = "Portfolio - Formulario de contacto";
pub const CONFIRMATION_SUBJECT: &str =
    "✅ Confirmación: Tu mensaje ha sido recibido - Portfolio de Dan Ferrari";

// America/Argentina/Buenos_Aires has no daylight saving time.
const BUENOS_AIRES_SECONDS_WEST_OF_UTC: i32 = 3 * 3600;

const MONTHS_ES: [&str; 12] = [
    "enero",
    "febrero",
    "marzo",
    "abril",
    "mayo",
    "junio",
    "julio",
    "agosto",
    "septiembre",
    "octubre",
    "noviembre",
    "diciembre",
];

const NOTIFICATION_HTML: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/assets/notification.html"
));
const NOTIFICATION_TEXT: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/assets/notification.txt"
));

struct ConfirmationLocale {
    language: &'static str,
    html: &'static str,
    text: &'static str,
}

static SPANISH_CONFIRMATION: ConfirmationLocale = ConfirmationLocale {
    language: "es",
    html: include_str!(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/assets/confirmation.es.html"
    )),
    text: include_str!(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/assets/confirmation.es.txt"
    )),
};

static ENGLISH_CONFIRMATION: ConfirmationLocale = ConfirmationLocale {
    language: "en",
    html: include_str!(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/assets/confirmation.en.html"
    )),
    text: include_str!(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/assets/confirmation.en.txt"
    )),
};

static CONFIRMATION_LOCALES: [&ConfirmationLocale; 2] =
    [&SPANISH_CONFIRMATION, &ENGLISH_CONFIRMATION];

/// Subject and the two renderings of one email body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailContent {
    pub subject: String,
    pub html: String,
    pub text: String,
}

#[derive(Serialize)]
struct NotificationContext<'a> {
    full_name: String,
    email: &'a str,
    phone_number: &'a str,
    language_label: &'static str,
    message: &'a str,
    received_at: String,
    origin: &'static str,
}

#[derive(Serialize)]
struct ConfirmationContext<'a> {
    first_name: &'a str,
    message: &'a str,
    portfolio_url: &'static str,
}

/// Builds the email which tells the site owner about a new submission.
pub fn build_notification(
    submission: &ContactSubmission,
    received_at: DateTime<Utc>,
) -> Result<EmailContent, Error> {
    let context = NotificationContext {
        full_name: format!("{} {}", submission.first_name, submission.last_name),
        email: &submission.email,
        phone_number: &submission.phone_number,
        language_label: language_label(&submission.language),
        message: &submission.message,
        received_at: format_received_at(received_at),
        origin: ORIGIN_LABEL,
    };
    Ok(EmailContent {
        subject: format!(
            "[Portfolio] Mensaje de {} {} - {}",
            submission.first_name, submission.last_name, submission.email
        ),
        html: render_html("notification-html", NOTIFICATION_HTML, &context)?,
        text: render_text("notification-text", NOTIFICATION_TEXT, &context)?,
    })
}

/// Builds the auto-reply to the submitter in the submission's language.
pub fn build_confirmation(submission: &ContactSubmission) -> Result<EmailContent, Error> {
    let locale = confirmation_locale(&submission.language);
    let context = ConfirmationContext {
        first_name: &submission.first_name,
        message: &submission.message,
        portfolio_url: PORTFOLIO_URL,
    };
    Ok(EmailContent {
        subject: CONFIRMATION_SUBJECT.into(),
        html: render_html("confirmation-html", locale.html, &context)?,
        text: render_text("confirmation-text", locale.text, &context)?,
    })
}

fn confirmation_locale(language: &str) -> &'static ConfirmationLocale {
    CONFIRMATION_LOCALES
        .into_iter()
        .find(|locale| locale.language == language)
        .unwrap_or(&ENGLISH_CONFIRMATION)
}

fn language_label(language: &str) -> &'static str {
    if language == "es" {
        "Español"
    } else {
        "English"
    }
}

/// Renders the receive time the way the site owner reads it, e.g. `15 de enero de 2024, 07:30`.
pub fn format_received_at(received_at: DateTime<Utc>) -> String {
    let local = match FixedOffset::west_opt(BUENOS_AIRES_SECONDS_WEST_OF_UTC) {
        Some(offset) => received_at.with_timezone(&offset),
        None => received_at.fixed_offset(),
    };
    format!(
        "{} de {} de {}, {:02}:{:02}",
        local.day(),
        MONTHS_ES[local.month0() as usize],
        local.year(),
        local.hour(),
        local.minute()
    )
}

fn render_html<C: Serialize>(
    name: &'static str,
    template: &'static str,
    context: &C,
) -> Result<String, Error> {
    let mut tt = TinyTemplate::new();
    tt.add_template(name, template)?;
    tt.render(name, context)
}

fn render_text<C: Serialize>(
    name: &'static str,
    template: &'static str,
    context: &C,
) -> Result<String, Error> {
    let mut tt = TinyTemplate::new();
    tt.set_default_formatter(&format_unescaped);
    tt.add_template(name, template)?;
    tt.render(name, context)
}
