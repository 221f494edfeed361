use axum::async_trait;
use serde::Serialize;
use tracing::{error, info};

/// Account-lifecycle process names understood by the CRM pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CrmProcess {
    #[serde(rename = "newRegistrationEmail")]
    NewRegistrationEmail,
    #[serde(rename = "resetPasswordRequest")]
    ResetPasswordRequest,
}

#[derive(Debug, Clone, Serialize)]
pub struct Customer {
    pub email: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct EventMetadata {
    /// Unix milliseconds, matching the CRM contract.
    pub timestamp: i64,
}

/// Outbound account event. `token` is present only for reset requests.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CrmEvent {
    pub crm_process: CrmProcess,
    pub customer: Customer,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    pub metadata: EventMetadata,
}

impl CrmEvent {
    fn now_ms() -> i64 {
        (time::OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
    }

    pub fn new_registration(email: &str) -> Self {
        Self {
            crm_process: CrmProcess::NewRegistrationEmail,
            customer: Customer {
                email: email.into(),
            },
            token: None,
            metadata: EventMetadata {
                timestamp: Self::now_ms(),
            },
        }
    }

    pub fn reset_password_request(email: &str, token: &str) -> Self {
        Self {
            crm_process: CrmProcess::ResetPasswordRequest,
            customer: Customer {
                email: email.into(),
            },
            token: Some(token.into()),
            metadata: EventMetadata {
                timestamp: Self::now_ms(),
            },
        }
    }
}

/// Keeps only the first character of the local part when logging emails.
fn mask_email(email: &str) -> String {
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() => {
            let first = local.chars().next().unwrap_or('*');
            format!("{first}{}@{domain}", "*".repeat(local.chars().count().saturating_sub(1)))
        }
        _ => "***".into(),
    }
}

/// Fire-and-forget publisher for account events.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn publish(&self, event: CrmEvent) -> anyhow::Result<()>;
}

/// Pushes events as JSON to the CRM ingestion endpoint.
pub struct HttpNotifier {
    http: reqwest::Client,
    endpoint: String,
}

impl HttpNotifier {
    pub fn new(endpoint: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint,
        }
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn publish(&self, event: CrmEvent) -> anyhow::Result<()> {
        let process = event.crm_process;
        let masked = mask_email(&event.customer.email);
        let timestamp = event.metadata.timestamp;
        self.http
            .post(&self.endpoint)
            .json(&event)
            .send()
            .await?
            .error_for_status()?;
        info!(process = ?process, email = %masked, timestamp, "published CRM event");
        Ok(())
    }
}

/// Discards events; used by `AppState::fake()` and tests.
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn publish(&self, _event: CrmEvent) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Publish without letting a delivery failure escalate. The primary flow has
/// already committed by the time events go out.
pub async fn publish_best_effort(notifier: &dyn Notifier, event: CrmEvent) {
    let process = event.crm_process;
    let masked = mask_email(&event.customer.email);
    if let Err(err) = notifier.publish(event).await {
        error!(error = %err, process = ?process, email = %masked, "failed to publish CRM event");
    }
}
