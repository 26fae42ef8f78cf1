use crate::error::ApiError;
use crate::models::{AppError, Channel, NewChannel, NewPost, Post, Team, User, UserPatch};
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// Operations the bot needs from the Mattermost server.
#[async_trait]
pub trait Platform: Send + Sync {
    /// Server version as reported by the legacy client config.
    async fn server_version(&self) -> Result<String, ApiError>;

    async fn login(&self, login_id: &str, password: &str) -> Result<User, ApiError>;

    async fn patch_user(&self, user_id: &str, patch: &UserPatch) -> Result<User, ApiError>;

    async fn team_by_name(&self, name: &str) -> Result<Team, ApiError>;

    async fn channel_by_name(&self, name: &str, team_id: &str) -> Result<Channel, ApiError>;

    async fn create_channel(&self, channel: &NewChannel) -> Result<Channel, ApiError>;

    async fn add_channel_member(&self, channel_id: &str, user_id: &str) -> Result<(), ApiError>;

    async fn create_post(&self, post: &NewPost) -> Result<Post, ApiError>;

    /// Session token obtained by [`Platform::login`].
    fn auth_token(&self) -> Option<String>;
}

/// REST client for the Mattermost v4 API.
pub struct HttpClient {
    http: reqwest::Client,
    base_url: String,
    token: RwLock<Option<String>>,
}

impl HttpClient {
    pub fn new(server_url: &str) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("mbot-helper/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(ApiError::Transport)?;
        Ok(Self {
            http,
            base_url: server_url.trim_end_matches('/').to_string(),
            token: RwLock::new(None),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/api/v4{}", self.base_url, path);
        let builder = self.http.request(method, url);
        match self.auth_token() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    fn authed(&self, method: Method, path: &str) -> Result<RequestBuilder, ApiError> {
        if self.auth_token().is_none() {
            return Err(ApiError::NotAuthenticated);
        }
        Ok(self.request(method, path))
    }

    async fn execute(&self, builder: RequestBuilder) -> Result<Response, ApiError> {
        let response = builder.send().await.map_err(ApiError::Transport)?;
        check_status(response).await
    }

    async fn execute_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, ApiError> {
        let response = self.execute(builder).await?;
        response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(e.to_string()))
    }
}

/// Turns a non-2xx response into [`ApiError::App`].
async fn check_status(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let app_error = match serde_json::from_str::<AppError>(&body) {
        Ok(mut err) if !err.id.is_empty() || !err.message.is_empty() => {
            if err.status_code == 0 {
                err.status_code = status.as_u16();
            }
            err
        }
        _ => AppError {
            id: "api.unexpected_status".to_string(),
            message: format!("Server responded with {status}"),
            detailed_error: body,
            request_id: String::new(),
            status_code: status.as_u16(),
        },
    };
    Err(ApiError::App(app_error))
}

#[async_trait]
impl Platform for HttpClient {
    async fn server_version(&self) -> Result<String, ApiError> {
        let props: HashMap<String, String> = self
            .execute_json(self.request(Method::GET, "/config/client?format=old"))
            .await?;
        props
            .get("Version")
            .cloned()
            .ok_or_else(|| ApiError::InvalidResponse("client config has no Version".to_string()))
    }

    async fn login(&self, login_id: &str, password: &str) -> Result<User, ApiError> {
        let body = serde_json::json!({ "login_id": login_id, "password": password });
        let response = self
            .execute(self.request(Method::POST, "/users/login").json(&body))
            .await?;

        let token = response
            .headers()
            .get("Token")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| ApiError::InvalidResponse("login response has no Token header".to_string()))?;

        let user: User = response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(e.to_string()))?;

        *self.token.write().unwrap_or_else(PoisonError::into_inner) = Some(token);
        tracing::debug!(user_id = %user.id, "Logged in");
        Ok(user)
    }

    async fn patch_user(&self, user_id: &str, patch: &UserPatch) -> Result<User, ApiError> {
        let builder = self.authed(Method::PUT, &format!("/users/{user_id}/patch"))?;
        self.execute_json(builder.json(patch)).await
    }

    async fn team_by_name(&self, name: &str) -> Result<Team, ApiError> {
        let builder = self.authed(Method::GET, &format!("/teams/name/{name}"))?;
        self.execute_json(builder).await
    }

    async fn channel_by_name(&self, name: &str, team_id: &str) -> Result<Channel, ApiError> {
        let builder = self.authed(
            Method::GET,
            &format!("/teams/{team_id}/channels/name/{name}"),
        )?;
        self.execute_json(builder).await
    }

    async fn create_channel(&self, channel: &NewChannel) -> Result<Channel, ApiError> {
        let builder = self.authed(Method::POST, "/channels")?;
        self.execute_json(builder.json(channel)).await
    }

    async fn add_channel_member(&self, channel_id: &str, user_id: &str) -> Result<(), ApiError> {
        let builder = self.authed(Method::POST, &format!("/channels/{channel_id}/members"))?;
        self.execute(builder.json(&serde_json::json!({ "user_id": user_id })))
            .await?;
        Ok(())
    }

    async fn create_post(&self, post: &NewPost) -> Result<Post, ApiError> {
        let builder = self.authed(Method::POST, "/posts")?;
        self.execute_json(builder.json(post)).await
    }

    fn auth_token(&self) -> Option<String> {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
