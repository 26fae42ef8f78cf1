use crate::config::Config;
use crate::error::{BotError, EventError};
use crate::handler;
use crate::helper::BotHelper;
use crate::mattermost::{EventStream, HttpClient, Platform};
use crate::responder::Responder;
use tokio_util::sync::CancellationToken;

pub async fn run_bot(config: Config) -> anyhow::Result<()> {
    let ws_url = config.effective_ws_url();
    let client = HttpClient::new(config.api_base())?;
    let responder = Responder::new()?;

    let mut helper = BotHelper::new(config, client);
    helper.setup().await?;
    helper.announce_started().await;

    let cancel_token = CancellationToken::new();
    spawn_signal_handler(cancel_token.clone());

    let token = helper
        .platform()
        .auth_token()
        .ok_or(BotError::NotReady("session token"))?;

    let mut events = match connect_or_cancel(&ws_url, &token, &cancel_token).await {
        None => {
            tracing::info!("Shutdown signal received before the event feed connected");
            helper.announce_stopped().await;
            return Ok(());
        }
        Some(Ok(events)) => events,
        Some(Err(e)) => {
            tracing::error!("We failed to connect to the event feed: {e}");
            helper.announce_stopped().await;
            return Err(BotError::from(e).into());
        }
    };

    tracing::info!("Bot started. Listening for events...");
    serve_events(&helper, &responder, &mut events, cancel_token).await?;
    Ok(())
}

/// Connects the event feed unless shutdown is requested first, in which case `None`.
pub async fn connect_or_cancel(
    ws_url: &str,
    token: &str,
    cancel_token: &CancellationToken,
) -> Option<Result<EventStream, EventError>> {
    tokio::select! {
        () = cancel_token.cancelled() => None,
        result = EventStream::connect(ws_url, token) => Some(result),
    }
}

/// Dispatches events until cancelled or until the feed ends.
///
/// Undecodable frames are skipped. Cancellation is honoured while an event is being
/// handled. On exit the feed is closed and the stop notice is posted. A feed that ends
/// without cancellation is reported as an error.
pub async fn serve_events<P: Platform>(
    helper: &BotHelper<P>,
    responder: &Responder,
    events: &mut EventStream,
    cancel_token: CancellationToken,
) -> Result<(), BotError> {
    let outcome = loop {
        tokio::select! {
            () = cancel_token.cancelled() => {
                tracing::info!("Shutdown signal received");
                break Ok(());
            }
            next = events.next_event() => match next {
                Some(Ok(event)) => {
                    tokio::select! {
                        () = cancel_token.cancelled() => {
                            tracing::info!("Shutdown signal received while handling an event");
                            break Ok(());
                        }
                        () = handler::handle_event(helper, responder, &event) => {}
                    }
                }
                Some(Err(EventError::InvalidFrame(e))) => {
                    tracing::warn!("Skipping undecodable event frame: {e}");
                }
                Some(Err(e)) => {
                    tracing::error!("Event feed error: {e}");
                    break Err(BotError::EventStream(e));
                }
                None => {
                    tracing::warn!("Event feed closed");
                    break Err(BotError::EventStreamClosed);
                }
            }
        }
    };

    if let Err(e) = events.close().await {
        tracing::debug!("Closing event feed: {e}");
    }
    helper.announce_stopped().await;

    outcome
}

/// Checks the server is reachable and returns its version.
pub async fn ping(config: &Config) -> anyhow::Result<String> {
    let client = HttpClient::new(config.api_base())?;
    let helper = BotHelper::new(config.clone(), client);
    Ok(helper.make_sure_server_is_running().await?)
}

fn spawn_signal_handler(cancel_token: CancellationToken) {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            let mut sigterm =
                match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                    Ok(s) => s,
                    Err(e) => {
                        tracing::error!("Failed to register SIGTERM handler: {e}");
                        return;
                    }
                };
            tokio::select! {
                result = tokio::signal::ctrl_c() => {
                    if let Err(e) = result {
                        tracing::error!("Failed to listen for SIGINT: {e}");
                        return;
                    }
                    tracing::info!("Received SIGINT, shutting down...");
                }
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM, shutting down...");
                }
            }
        }
        #[cfg(not(unix))]
        {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for Ctrl+C: {e}");
                return;
            }
            tracing::info!("Received Ctrl+C, shutting down...");
        }
        cancel_token.cancel();
    });
}
