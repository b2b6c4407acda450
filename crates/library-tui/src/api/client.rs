use std::sync::Arc;

use library_shared::api::{
    BookListParams, BorrowResponse, CreateBookRequest, CsrfResponse, LoginRequest,
    MessageResponse, RegisterRequest, RegisterResponse, UpdateBookRequest, UpdateUserRequest,
};
use library_shared::{Book, User};
use reqwest::{cookie::Jar, Client, StatusCode};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Not authenticated")]
    Unauthorized,
    #[error("Access forbidden")]
    Forbidden,
    #[error("Resource not found")]
    NotFound,
    #[error("{0}")]
    Validation(String),
    #[error("Server error: {0}")]
    Server(String),
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

/// HTTP client for the library API. The session rides in the cookie
/// store; the CSRF token is fetched from `/api/csrf/` after login and
/// echoed in the `X-CSRFToken` header on every mutating call.
pub struct ApiClient {
    client: Client,
    base_url: String,
    csrf_token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Self {
        let jar = Arc::new(Jar::default());
        let client = Client::builder()
            .cookie_provider(jar)
            .build()
            .expect("reqwest client");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            csrf_token: None,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Flatten an error body into a single message. Backend validation
    /// errors are field-keyed (`{"isbn": ["..."]}`); plain errors are
    /// `{"error": "..."}`.
    fn flatten_error(body: &str) -> String {
        let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
            return body.to_string();
        };

        if let Some(msg) = value.get("error").and_then(|v| v.as_str()) {
            return msg.to_string();
        }

        if let Some(map) = value.as_object() {
            let mut lines = Vec::new();
            for (field, messages) in map {
                match messages {
                    serde_json::Value::Array(items) => {
                        for item in items {
                            if let Some(s) = item.as_str() {
                                lines.push(format!("{}: {}", field, s));
                            }
                        }
                    }
                    serde_json::Value::String(s) => lines.push(format!("{}: {}", field, s)),
                    _ => {}
                }
            }
            if !lines.is_empty() {
                return lines.join("\n");
            }
        }

        body.to_string()
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        let status = response.status();

        match status {
            StatusCode::OK | StatusCode::CREATED => {
                response.json().await.map_err(ApiError::Network)
            }
            StatusCode::UNAUTHORIZED => Err(ApiError::Unauthorized),
            StatusCode::FORBIDDEN => Err(ApiError::Forbidden),
            StatusCode::NOT_FOUND => Err(ApiError::NotFound),
            StatusCode::BAD_REQUEST => {
                let text = response.text().await.unwrap_or_default();
                Err(ApiError::Validation(Self::flatten_error(&text)))
            }
            _ => {
                let text = response.text().await.unwrap_or_default();
                Err(ApiError::Server(format!("{}: {}", status, text)))
            }
        }
    }

    async fn handle_empty_response(&self, response: reqwest::Response) -> Result<(), ApiError> {
        let status = response.status();

        match status {
            StatusCode::OK | StatusCode::NO_CONTENT => Ok(()),
            StatusCode::UNAUTHORIZED => Err(ApiError::Unauthorized),
            StatusCode::FORBIDDEN => Err(ApiError::Forbidden),
            StatusCode::NOT_FOUND => Err(ApiError::NotFound),
            StatusCode::BAD_REQUEST => {
                let text = response.text().await.unwrap_or_default();
                Err(ApiError::Validation(Self::flatten_error(&text)))
            }
            _ => {
                let text = response.text().await.unwrap_or_default();
                Err(ApiError::Server(format!("{}: {}", status, text)))
            }
        }
    }

    fn csrf_header(&self) -> Result<&str, ApiError> {
        self.csrf_token.as_deref().ok_or(ApiError::Unauthorized)
    }

    async fn mutate<T: serde::Serialize>(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<&T>,
    ) -> Result<reqwest::Response, ApiError> {
        let mut builder = self
            .client
            .request(method, self.url(path))
            .header("X-CSRFToken", self.csrf_header()?);

        if let Some(body) = body {
            builder = builder.json(body);
        }

        builder.send().await.map_err(ApiError::Network)
    }

    // ============ Auth ============

    pub async fn register(&self, req: &RegisterRequest) -> Result<RegisterResponse, ApiError> {
        let response = self
            .client
            .post(self.url("/api/auth/register/"))
            .json(req)
            .send()
            .await?;

        self.handle_response(response).await
    }

    pub async fn login(&mut self, username: &str, password: &str) -> Result<User, ApiError> {
        let req = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };

        let response = self
            .client
            .post(self.url("/api/auth/login/"))
            .json(&req)
            .send()
            .await?;

        let _: MessageResponse = self.handle_response(response).await?;

        // Session cookie is now in the jar; pick up the CSRF token for
        // the mutating calls that follow.
        self.fetch_csrf().await?;
        self.me().await
    }

    /// Best-effort: local CSRF state clears even when the request fails.
    pub async fn logout(&mut self) -> Result<(), ApiError> {
        let result = self
            .mutate::<()>(reqwest::Method::POST, "/api/auth/logout/", None)
            .await;

        self.csrf_token = None;

        match result {
            Ok(response) => self.handle_empty_response(response).await,
            Err(e) => Err(e),
        }
    }

    pub async fn fetch_csrf(&mut self) -> Result<(), ApiError> {
        let response = self.client.get(self.url("/api/csrf/")).send().await?;
        let csrf: CsrfResponse = self.handle_response(response).await?;
        self.csrf_token = Some(csrf.csrf_token);
        Ok(())
    }

    pub async fn me(&self) -> Result<User, ApiError> {
        let response = self.client.get(self.url("/api/users/me/")).send().await?;
        self.handle_response(response).await
    }

    pub async fn update_me(&self, req: &UpdateUserRequest) -> Result<User, ApiError> {
        let response = self
            .mutate(reqwest::Method::PATCH, "/api/users/me/update/", Some(req))
            .await?;
        self.handle_response(response).await
    }

    // ============ Books ============

    pub async fn list_books(&self, params: &BookListParams) -> Result<Vec<Book>, ApiError> {
        let mut url = self.url("/api/books/");
        let mut query_parts = Vec::new();

        if let Some(category) = params.category {
            let code = serde_json::to_string(&category).unwrap_or_default();
            query_parts.push(format!("category={}", code.trim_matches('"')));
        }
        if let Some(ref language) = params.language {
            query_parts.push(format!("language={}", urlencoding::encode(language)));
        }
        if let Some(available) = params.available {
            query_parts.push(format!("available={}", available));
        }
        if let Some(ref search) = params.search {
            query_parts.push(format!("search={}", urlencoding::encode(search)));
        }
        if let Some(ref ordering) = params.ordering {
            query_parts.push(format!("ordering={}", ordering));
        }

        if !query_parts.is_empty() {
            url.push('?');
            url.push_str(&query_parts.join("&"));
        }

        let response = self.client.get(url).send().await?;
        self.handle_response(response).await
    }

    pub async fn get_book(&self, id: Uuid) -> Result<Book, ApiError> {
        let response = self
            .client
            .get(self.url(&format!("/api/books/{}/", id)))
            .send()
            .await?;
        self.handle_response(response).await
    }

    pub async fn create_book(&self, req: &CreateBookRequest) -> Result<Book, ApiError> {
        let response = self
            .mutate(reqwest::Method::POST, "/api/books/", Some(req))
            .await?;
        self.handle_response(response).await
    }

    pub async fn update_book(&self, id: Uuid, req: &UpdateBookRequest) -> Result<Book, ApiError> {
        let response = self
            .mutate(
                reqwest::Method::PATCH,
                &format!("/api/books/{}/", id),
                Some(req),
            )
            .await?;
        self.handle_response(response).await
    }

    pub async fn delete_book(&self, id: Uuid) -> Result<(), ApiError> {
        let response = self
            .mutate::<()>(reqwest::Method::DELETE, &format!("/api/books/{}/", id), None)
            .await?;
        self.handle_empty_response(response).await
    }

    pub async fn borrow_book(&self, id: Uuid) -> Result<BorrowResponse, ApiError> {
        let response = self
            .mutate::<()>(
                reqwest::Method::POST,
                &format!("/api/books/{}/borrow/", id),
                None,
            )
            .await?;
        self.handle_response(response).await
    }

    pub async fn return_book(&self, id: Uuid) -> Result<BorrowResponse, ApiError> {
        let response = self
            .mutate::<()>(
                reqwest::Method::POST,
                &format!("/api/books/{}/return/", id),
                None,
            )
            .await?;
        self.handle_response(response).await
    }

    pub async fn borrowed_books(&self) -> Result<Vec<Book>, ApiError> {
        let response = self
            .client
            .get(self.url("/api/books/borrowed/"))
            .send()
            .await?;
        self.handle_response(response).await
    }

    // ============ Users (admin) ============

    pub async fn list_users(&self) -> Result<Vec<User>, ApiError> {
        let response = self.client.get(self.url("/api/users/")).send().await?;
        self.handle_response(response).await
    }

    pub async fn delete_user(&self, id: Uuid) -> Result<(), ApiError> {
        let response = self
            .mutate::<()>(reqwest::Method::DELETE, &format!("/api/users/{}/", id), None)
            .await?;
        self.handle_empty_response(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flatten_plain_error_body() {
        let msg = ApiClient::flatten_error(r#"{"error": "Invalid credentials"}"#);
        assert_eq!(msg, "Invalid credentials");
    }

    #[test]
    fn flatten_field_keyed_body_joins_lines() {
        let msg = ApiClient::flatten_error(
            r#"{"isbn": ["A book with this ISBN already exists"], "title": ["Title is required"]}"#,
        );
        assert!(msg.contains("isbn: A book with this ISBN already exists"));
        assert!(msg.contains("title: Title is required"));
        assert_eq!(msg.lines().count(), 2);
    }

    #[test]
    fn flatten_falls_back_to_raw_body() {
        assert_eq!(ApiClient::flatten_error("boom"), "boom");
    }
}
