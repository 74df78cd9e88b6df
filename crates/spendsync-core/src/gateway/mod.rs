//! Remote gateway: the only component that talks to the expense server

use std::time::Duration;

use reqwest::{multipart, Client, Request, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::models::{AuthToken, Category, Expense, ExpenseDraft, Identity, Page};
use crate::util::{compact_text, is_http_url, normalize_text_option};

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Expense server is not configured")]
    NotConfigured,
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Not authorized by the expense server")]
    Unauthorized,
    #[error("Monthly budget exceeded: {0}")]
    BudgetExceeded(String),
    #[error("Request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("Invalid request or response payload: {0}")]
    InvalidPayload(String),
}

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Server operations the reconciliation core depends on.
#[allow(async_fn_in_trait)]
pub trait RemoteGateway {
    /// Who the server thinks we are; `None` when nobody is signed in.
    async fn current_identity(&self) -> GatewayResult<Option<Identity>>;

    /// Submit one expense and return the server's stored copy.
    async fn create_expense(&self, expense: &ExpenseDraft) -> GatewayResult<Expense>;

    /// Fetch one page of the user's categories.
    async fn list_categories(&self, offset: u32, limit: u32) -> GatewayResult<Page<Category>>;
}

/// `reqwest` client for the expense server's REST API.
#[derive(Clone)]
pub struct HttpGateway {
    base_url: Option<String>,
    token: Option<String>,
    client: Client,
}

impl HttpGateway {
    /// Build a gateway for `base_url`.
    ///
    /// Without a URL the gateway still builds, but every call fails with
    /// `NotConfigured`.
    pub fn new(base_url: Option<String>, timeout: Duration) -> GatewayResult<Self> {
        let base_url = normalize_base_url(base_url)?;
        Ok(Self {
            base_url,
            token: None,
            client: Client::builder().timeout(timeout).build()?,
        })
    }

    /// Attach the bearer token sent with every authenticated request.
    #[must_use]
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = normalize_text_option(token);
        self
    }

    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    /// Exchange username/password for a bearer token.
    pub async fn login(&self, username: &str, password: &str) -> GatewayResult<AuthToken> {
        if username.trim().is_empty() || password.is_empty() {
            return Err(GatewayError::InvalidPayload(
                "username and password must not be empty".to_string(),
            ));
        }

        let response = self
            .client
            .post(self.endpoint("/token")?)
            .form(&[("username", username.trim()), ("password", password)])
            .send()
            .await?;
        read_json(response).await
    }

    fn endpoint(&self, path: &str) -> GatewayResult<String> {
        let base_url = self.base_url.as_deref().ok_or(GatewayError::NotConfigured)?;
        Ok(format!("{base_url}{path}"))
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn build_create_expense_request(&self, expense: &ExpenseDraft) -> GatewayResult<Request> {
        let expense_base = serde_json::to_string(expense)
            .map_err(|error| GatewayError::InvalidPayload(error.to_string()))?;
        let form = multipart::Form::new().text("expense_base", expense_base);

        self.authorized(self.client.post(self.endpoint("/users/me/expenses")?))
            .multipart(form)
            .build()
            .map_err(GatewayError::Http)
    }

    fn build_list_categories_request(&self, offset: u32, limit: u32) -> GatewayResult<Request> {
        self.authorized(self.client.get(self.endpoint("/users/me/categories")?))
            .query(&[("offset", offset), ("limit", limit)])
            .build()
            .map_err(GatewayError::Http)
    }
}

impl RemoteGateway for HttpGateway {
    async fn current_identity(&self) -> GatewayResult<Option<Identity>> {
        if self.token.is_none() {
            tracing::debug!("No bearer token stored; nobody is signed in");
            return Ok(None);
        }

        let response = self
            .authorized(self.client.get(self.endpoint("/users/me")?))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        read_json(response).await.map(Some)
    }

    async fn create_expense(&self, expense: &ExpenseDraft) -> GatewayResult<Expense> {
        let request = self.build_create_expense_request(expense)?;
        let response = self.client.execute(request).await?;
        read_json(response).await
    }

    async fn list_categories(&self, offset: u32, limit: u32) -> GatewayResult<Page<Category>> {
        let request = self.build_list_categories_request(offset, limit)?;
        let response = self.client.execute(request).await?;
        read_json(response).await
    }
}

async fn read_json<T: DeserializeOwned>(response: Response) -> GatewayResult<T> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json::<T>().await?);
    }

    let body = response.text().await.unwrap_or_default();
    Err(classify_failure(status, &body))
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: Option<Value>,
    message: Option<String>,
    error: Option<String>,
}

fn parse_error_message(body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ErrorBody>(body) {
        let detail = payload.detail.map(|detail| match detail {
            Value::String(text) => text,
            other => other.to_string(),
        });
        if let Some(message) = detail.or(payload.message).or(payload.error) {
            return compact_text(&message);
        }
    }
    compact_text(body)
}

fn classify_failure(status: StatusCode, body: &str) -> GatewayError {
    if status == StatusCode::UNAUTHORIZED {
        return GatewayError::Unauthorized;
    }

    let message = parse_error_message(body);
    if status.is_client_error() && message.to_ascii_lowercase().contains("budget") {
        return GatewayError::BudgetExceeded(message);
    }

    GatewayError::Rejected {
        status: status.as_u16(),
        message: if message.is_empty() {
            format!("HTTP {}", status.as_u16())
        } else {
            message
        },
    }
}

fn normalize_base_url(raw: Option<String>) -> GatewayResult<Option<String>> {
    let Some(url) = normalize_text_option(raw) else {
        return Ok(None);
    };
    if is_http_url(&url) {
        Ok(Some(url.trim_end_matches('/').to_string()))
    } else {
        Err(GatewayError::InvalidPayload(format!(
            "server URL must include http:// or https://, got {url}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    use super::*;

    fn gateway() -> HttpGateway {
        HttpGateway::new(
            Some("https://api.example.com/".to_string()),
            Duration::from_secs(5),
        )
        .unwrap()
        .with_token(Some("token-123".to_string()))
    }

    #[test]
    fn normalize_base_url_rejects_invalid_values() {
        assert_eq!(normalize_base_url(Some("  ".to_string())).unwrap(), None);
        assert!(normalize_base_url(Some("api.example.com".to_string())).is_err());
        assert_eq!(
            normalize_base_url(Some(" http://10.0.0.2:8000/ ".to_string()))
                .unwrap()
                .as_deref(),
            Some("http://10.0.0.2:8000")
        );
    }

    #[tokio::test]
    async fn unconfigured_gateway_fails_every_call() {
        let gateway = HttpGateway::new(None, Duration::from_secs(5))
            .unwrap()
            .with_token(Some("token-123".to_string()));
        assert_eq!(gateway.base_url(), None);
        assert!(matches!(
            gateway.current_identity().await,
            Err(GatewayError::NotConfigured)
        ));
        assert!(matches!(
            gateway.list_categories(0, 100).await,
            Err(GatewayError::NotConfigured)
        ));
    }

    #[test]
    fn create_expense_request_targets_expenses_endpoint() {
        let draft = ExpenseDraft::new(
            "Coffee",
            dec!(12.5),
            Uuid::nil(),
            NaiveDate::from_ymd_opt(2024, 5, 17).unwrap(),
        );
        let request = gateway().build_create_expense_request(&draft).unwrap();

        assert_eq!(request.method(), reqwest::Method::POST);
        assert_eq!(
            request.url().as_str(),
            "https://api.example.com/users/me/expenses"
        );
        assert_eq!(
            request.headers().get("authorization").unwrap(),
            "Bearer token-123"
        );
        let content_type = request.headers().get("content-type").unwrap();
        assert!(content_type
            .to_str()
            .unwrap()
            .starts_with("multipart/form-data"));
    }

    #[test]
    fn list_categories_request_carries_paging() {
        let request = gateway().build_list_categories_request(0, 100).unwrap();
        assert_eq!(
            request.url().as_str(),
            "https://api.example.com/users/me/categories?offset=0&limit=100"
        );
    }

    #[test]
    fn classify_failure_detects_budget_rejection() {
        let error = classify_failure(
            StatusCode::BAD_REQUEST,
            r#"{"detail": "Expense exceeds the monthly budget"}"#,
        );
        assert!(matches!(error, GatewayError::BudgetExceeded(message) if message.contains("budget")));
    }

    #[test]
    fn classify_failure_maps_unauthorized_and_other_statuses() {
        assert!(matches!(
            classify_failure(StatusCode::UNAUTHORIZED, ""),
            GatewayError::Unauthorized
        ));
        assert!(matches!(
            classify_failure(StatusCode::INTERNAL_SERVER_ERROR, ""),
            GatewayError::Rejected { status: 500, ref message } if message == "HTTP 500"
        ));
        assert!(matches!(
            classify_failure(StatusCode::UNPROCESSABLE_ENTITY, r#"{"detail": [{"msg": "field required"}]}"#),
            GatewayError::Rejected { status: 422, ref message } if message.contains("field required")
        ));
    }

    #[tokio::test]
    async fn current_identity_without_token_is_none() {
        let gateway = HttpGateway::new(
            Some("https://api.example.com".to_string()),
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(gateway.current_identity().await.unwrap(), None);
    }

    #[tokio::test]
    async fn login_rejects_blank_credentials() {
        let result = gateway().login("  ", "secret").await;
        assert!(matches!(result, Err(GatewayError::InvalidPayload(_))));
    }
}
