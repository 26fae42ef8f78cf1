use crate::models::AppError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{} ({})", .0.message, .0.id)]
    App(AppError),

    #[error("HTTP request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("Invalid response from server: {0}")]
    InvalidResponse(String),

    #[error("Not logged in")]
    NotAuthenticated,
}

#[derive(Error, Debug)]
pub enum EventError {
    #[error("Invalid websocket URL: {0}")]
    InvalidUrl(String),

    #[error("Websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Invalid event frame: {0}")]
    InvalidFrame(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum BotError {
    #[error("Cannot reach the Mattermost server: {0}")]
    ServerUnreachable(#[source] ApiError),

    #[error("Login failed: {0}")]
    LoginFailed(#[source] ApiError),

    #[error("Failed to update the bot account: {0}")]
    UpdateUserFailed(#[source] ApiError),

    #[error("Team '{team}' not found or bot is not a member: {source}")]
    TeamNotFound {
        team: String,
        #[source]
        source: ApiError,
    },

    #[error("Debugging channel '{0}' could not be found or created")]
    DebuggingChannelUnavailable(String),

    #[error("{0} is not available yet")]
    NotReady(&'static str),

    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error("Event stream failed: {0}")]
    EventStream(#[from] EventError),

    #[error("Event stream closed by the server")]
    EventStreamClosed,
}
