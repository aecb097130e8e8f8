// ABOUTME: Contact form relay for the hero-panel application
// ABOUTME: Validates submissions and delivers notification emails through a sink

use crate::config::ContactConfig;
use crate::errors::{PanelError, Result};
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use log::{error, info};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

pub const REQUIRED_FIELDS_MESSAGE: &str = "Name, email, phone, and company are required fields.";
pub const INVALID_EMAIL_MESSAGE: &str = "Please provide a valid email address.";
pub const INVALID_BODY_MESSAGE: &str = "Invalid request body.";
pub const SUCCESS_MESSAGE: &str = "Thank you! We'll be in touch shortly.";
pub const FAILURE_MESSAGE: &str =
    "Failed to send your message. Please try again later or contact us directly.";

/// Timeout for one outgoing delivery request
const DELIVERY_TIMEOUT: Duration = Duration::from_secs(10);

static EMAIL_PATTERN: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").ok());

/// The form as posted; every field may be missing
#[derive(Debug, Default, Deserialize)]
pub struct ContactForm {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub message: Option<String>,
}

/// A validated, trimmed submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContactSubmission {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub company: String,
    pub message: Option<String>,
}

/// The JSON body returned to the browser
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContactResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ContactResponse {
    fn ok() -> Self {
        Self {
            success: true,
            message: SUCCESS_MESSAGE.to_string(),
            error: None,
        }
    }

    fn rejected(message: &str) -> Self {
        Self {
            success: false,
            message: message.to_string(),
            error: None,
        }
    }
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_PATTERN
        .as_ref()
        .map(|re| re.is_match(email))
        .unwrap_or(false)
}

impl ContactForm {
    /// Trim every field and check the required ones
    pub fn validate(self) -> Result<ContactSubmission> {
        let required = |value: Option<String>| {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let (Some(name), Some(email), Some(phone), Some(company)) = (
            required(self.name),
            required(self.email),
            required(self.phone),
            required(self.company),
        ) else {
            return Err(PanelError::ValidationError(REQUIRED_FIELDS_MESSAGE.to_string()));
        };

        if !is_valid_email(&email) {
            return Err(PanelError::ValidationError(INVALID_EMAIL_MESSAGE.to_string()));
        }

        Ok(ContactSubmission {
            name,
            email,
            phone,
            company,
            message: required(self.message),
        })
    }
}

/// Where validated submissions are delivered
pub trait NotificationSink: Send + Sync {
    fn deliver(&self, submission: &ContactSubmission) -> Result<()>;
}

/// Parse, validate and deliver a posted form. Returns the HTTP status and
/// the response body.
pub fn handle_submission(
    body: &str,
    sink: &dyn NotificationSink,
    expose_errors: bool,
) -> (u16, ContactResponse) {
    let body = if body.trim().is_empty() { "{}" } else { body };

    let form: ContactForm = match serde_json::from_str(body) {
        Ok(form) => form,
        Err(e) => {
            info!("Rejected contact form body: {}", e);
            return (400, ContactResponse::rejected(INVALID_BODY_MESSAGE));
        }
    };

    info!(
        "Contact form submission received from {} ({})",
        form.name.as_deref().unwrap_or(""),
        form.email.as_deref().unwrap_or("")
    );

    let submission = match form.validate() {
        Ok(submission) => submission,
        Err(e) => return (400, ContactResponse::rejected(&e.to_string())),
    };

    match sink.deliver(&submission) {
        Ok(()) => {
            info!(
                "Contact form email sent successfully from {} ({})",
                submission.name, submission.email
            );
            (200, ContactResponse::ok())
        }
        Err(e) => {
            error!("Contact form error: {}", e);
            let mut response = ContactResponse::rejected(FAILURE_MESSAGE);
            if expose_errors {
                response.error = Some(e.to_string());
            }
            (500, response)
        }
    }
}

/// An email address with an optional display name
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Party {
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// One message in the transactional email API's request format
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutgoingEmail {
    pub sender: Party,
    pub to: Vec<Party>,
    #[serde(rename = "replyTo", skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<Party>,
    pub subject: String,
    #[serde(rename = "textContent")]
    pub text_content: String,
}

/// The internal notification for the business owner
pub fn notification_email(sender: &Party, contact_email: &str, submission: &ContactSubmission) -> OutgoingEmail {
    let mut text = format!(
        "New Discovery Call Request\n\nName: {}\nEmail: {}\nPhone: {}\nCompany: {}\n",
        submission.name, submission.email, submission.phone, submission.company
    );
    if let Some(message) = &submission.message {
        text.push_str(&format!("Message: {}\n", message));
    }

    OutgoingEmail {
        sender: sender.clone(),
        to: vec![Party {
            email: contact_email.to_string(),
            name: None,
        }],
        reply_to: Some(Party {
            email: submission.email.clone(),
            name: Some(submission.name.clone()),
        }),
        subject: format!("New Discovery Call Request from {}", submission.name),
        text_content: text,
    }
}

/// The confirmation sent back to the person who filled in the form
pub fn confirmation_email(sender: &Party, submission: &ContactSubmission) -> OutgoingEmail {
    let from = sender.name.as_deref().unwrap_or("us");
    OutgoingEmail {
        sender: sender.clone(),
        to: vec![Party {
            email: submission.email.clone(),
            name: Some(submission.name.clone()),
        }],
        reply_to: None,
        subject: format!("Thank you for your interest - {}", from),
        text_content: format!(
            "Dear {},\n\nThank you for your interest in {}. We have received your discovery call \
request and will be in touch shortly to schedule your session.\n\nThis is an automated \
confirmation email. Please do not reply to this message.",
            submission.name, from
        ),
    }
}

/// Delivers through the Brevo HTTP transactional email API
pub struct BrevoSink {
    client: Client,
    api_url: String,
    api_key: String,
    sender: Party,
    contact_email: String,
}

impl BrevoSink {
    pub fn from_config(config: &ContactConfig) -> Result<Self> {
        let (Some(api_key), Some(sender_email), Some(contact_email)) = (
            config.brevo_api_key.clone(),
            config.brevo_sender_email.clone(),
            config.contact_email.clone(),
        ) else {
            return Err(missing_configuration());
        };

        let client = Client::builder()
            .timeout(DELIVERY_TIMEOUT)
            .build()
            .map_err(PanelError::FetchError)?;

        Ok(Self {
            client,
            api_url: config.brevo_api_url.clone(),
            api_key,
            sender: Party {
                email: sender_email,
                name: Some(config.brevo_sender_name.clone()),
            },
            contact_email,
        })
    }

    fn send(&self, email: &OutgoingEmail) -> Result<()> {
        let response = self
            .client
            .post(&self.api_url)
            .header("api-key", &self.api_key)
            .header("accept", "application/json")
            .json(email)
            .send()
            .map_err(|e| PanelError::DeliveryError(e.to_string()))?;

        if !response.status().is_success() {
            let body = response.text().unwrap_or_default();
            return Err(PanelError::DeliveryError(format!("Brevo API error: {}", body)));
        }
        Ok(())
    }
}

impl NotificationSink for BrevoSink {
    fn deliver(&self, submission: &ContactSubmission) -> Result<()> {
        info!("Sending notification email...");
        self.send(&notification_email(&self.sender, &self.contact_email, submission))?;
        info!("Sending confirmation email...");
        self.send(&confirmation_email(&self.sender, submission))?;
        Ok(())
    }
}

/// Delivers through an SMTP server with `lettre`
pub struct SmtpSink {
    transport: SmtpTransport,
    sender: Party,
    contact_email: String,
}

impl SmtpSink {
    pub fn from_config(config: &ContactConfig) -> Result<Self> {
        let (Some(user), Some(password), Some(contact_email)) = (
            config.smtp_user.clone(),
            config.smtp_password.clone(),
            config.contact_email.clone(),
        ) else {
            return Err(missing_configuration());
        };

        let builder = if config.smtp_port == 465 {
            SmtpTransport::relay(&config.smtp_host)
        } else {
            SmtpTransport::starttls_relay(&config.smtp_host)
        }
        .map_err(|e| PanelError::ConfigError(format!("Invalid SMTP host {}: {}", config.smtp_host, e)))?;

        let transport = builder
            .port(config.smtp_port)
            .credentials(Credentials::new(user.clone(), password))
            .timeout(Some(DELIVERY_TIMEOUT))
            .build();

        Ok(Self {
            transport,
            sender: Party {
                email: user,
                name: Some(config.brevo_sender_name.clone()),
            },
            contact_email,
        })
    }

    fn send(&self, email: &OutgoingEmail) -> Result<()> {
        let message = to_message(email)?;
        self.transport
            .send(&message)
            .map_err(|e| PanelError::DeliveryError(e.to_string()))?;
        Ok(())
    }
}

impl NotificationSink for SmtpSink {
    fn deliver(&self, submission: &ContactSubmission) -> Result<()> {
        info!("Sending notification email...");
        self.send(&notification_email(&self.sender, &self.contact_email, submission))?;
        info!("Sending confirmation email...");
        self.send(&confirmation_email(&self.sender, submission))?;
        Ok(())
    }
}

fn mailbox(party: &Party) -> Result<Mailbox> {
    let address = party
        .email
        .parse()
        .map_err(|e| PanelError::DeliveryError(format!("Invalid address {}: {}", party.email, e)))?;
    Ok(Mailbox::new(party.name.clone(), address))
}

/// Build the plain-text MIME message for an outgoing email
pub fn to_message(email: &OutgoingEmail) -> Result<Message> {
    let mut builder = Message::builder()
        .from(mailbox(&email.sender)?)
        .subject(email.subject.clone())
        .header(ContentType::TEXT_PLAIN);
    for to in &email.to {
        builder = builder.to(mailbox(to)?);
    }
    if let Some(reply_to) = &email.reply_to {
        builder = builder.reply_to(mailbox(reply_to)?);
    }
    builder
        .body(email.text_content.clone())
        .map_err(|e| PanelError::DeliveryError(e.to_string()))
}

/// Fails every delivery; used when the relay is not configured
pub struct UnconfiguredSink;

impl NotificationSink for UnconfiguredSink {
    fn deliver(&self, _submission: &ContactSubmission) -> Result<()> {
        Err(missing_configuration())
    }
}

fn missing_configuration() -> PanelError {
    PanelError::ConfigError(
        "Email configuration missing. Please set BREVO_API_KEY, BREVO_SENDER_EMAIL, and CONTACT_EMAIL, or SMTP_USER, SMTP_PASSWORD, and CONTACT_EMAIL environment variables."
            .to_string(),
    )
}

/// Which delivery backend a configuration selects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryBackend {
    Brevo,
    Smtp,
    Unconfigured,
}

/// The HTTP API wins when both backends are configured
pub fn select_backend(config: &ContactConfig) -> DeliveryBackend {
    if config.is_complete() {
        DeliveryBackend::Brevo
    } else if config.has_smtp() {
        DeliveryBackend::Smtp
    } else {
        DeliveryBackend::Unconfigured
    }
}

/// Pick the sink the configuration allows
pub fn sink_from_config(config: &ContactConfig) -> Arc<dyn NotificationSink> {
    let sink: Result<Arc<dyn NotificationSink>> = match select_backend(config) {
        DeliveryBackend::Brevo => BrevoSink::from_config(config).map(|s| Arc::new(s) as Arc<dyn NotificationSink>),
        DeliveryBackend::Smtp => SmtpSink::from_config(config).map(|s| Arc::new(s) as Arc<dyn NotificationSink>),
        DeliveryBackend::Unconfigured => Err(missing_configuration()),
    };

    match sink {
        Ok(sink) => {
            info!("Contact relay using {:?}", select_backend(config));
            sink
        }
        Err(e) => {
            info!("Contact relay disabled: {}", e);
            Arc::new(UnconfiguredSink)
        }
    }
}

/// Which email settings are present, without revealing secrets
pub fn config_report(config: &ContactConfig) -> serde_json::Value {
    let secret = |v: &Option<String>| {
        if v.is_some() {
            "SET (hidden)".to_string()
        } else {
            "MISSING".to_string()
        }
    };
    let plain = |v: &Option<String>| v.clone().unwrap_or_else(|| "not set".to_string());

    serde_json::json!({
        "config": {
            "BREVO_API_KEY": secret(&config.brevo_api_key),
            "BREVO_SENDER_EMAIL": plain(&config.brevo_sender_email),
            "BREVO_SENDER_NAME": config.brevo_sender_name,
            "CONTACT_EMAIL": plain(&config.contact_email),
            "SMTP_HOST": config.smtp_host,
            "SMTP_PORT": config.smtp_port.to_string(),
            "SMTP_USER": secret(&config.smtp_user),
            "SMTP_PASSWORD": secret(&config.smtp_password),
        }
    })
}
