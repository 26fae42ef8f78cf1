use crate::config::Config;
use crate::error::{ApiError, BotError};
use crate::mattermost::Platform;
use crate::models::{Channel, ChannelType, NewChannel, NewPost, Post, Team, User, UserPatch};

const DEBUGGING_CHANNEL_DISPLAY_NAME: &str = "Debugging Channel for bot";
const DEBUGGING_CHANNEL_PURPOSE: &str = "This is used for logging bot debug messages";

/// Logs the server-side details of a failed call.
pub fn log_api_error(err: &ApiError) {
    match err {
        ApiError::App(app) => tracing::error!(
            message = %app.message,
            id = %app.id,
            detail = %app.detailed_error,
            status = app.status_code,
            "Error details"
        ),
        other => tracing::error!("Error details: {other}"),
    }
}

/// Sequences the bot's calls against the server and holds what start-up resolves.
pub struct BotHelper<P> {
    config: Config,
    platform: P,
    bot_user: Option<User>,
    team: Option<Team>,
    debugging_channel: Option<Channel>,
    main_channel: Option<Channel>,
    status_channel: Option<Channel>,
}

impl<P: Platform> BotHelper<P> {
    pub fn new(config: Config, platform: P) -> Self {
        Self {
            config,
            platform,
            bot_user: None,
            team: None,
            debugging_channel: None,
            main_channel: None,
            status_channel: None,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn bot_user(&self) -> Option<&User> {
        self.bot_user.as_ref()
    }

    pub fn team(&self) -> Option<&Team> {
        self.team.as_ref()
    }

    pub fn debugging_channel(&self) -> Option<&Channel> {
        self.debugging_channel.as_ref()
    }

    pub fn main_channel(&self) -> Option<&Channel> {
        self.main_channel.as_ref()
    }

    pub fn status_channel(&self) -> Option<&Channel> {
        self.status_channel.as_ref()
    }

    /// Runs every start-up step in order. Stops at the first fatal failure.
    pub async fn setup(&mut self) -> Result<(), BotError> {
        self.make_sure_server_is_running().await?;
        self.login_as_bot_user().await?;
        self.update_bot_user_if_needed().await?;
        self.find_bot_team().await?;
        self.create_debugging_channel_if_needed().await?;
        self.join_configured_channels().await;
        Ok(())
    }

    pub async fn make_sure_server_is_running(&self) -> Result<String, BotError> {
        match self.platform.server_version().await {
            Ok(version) => {
                tracing::info!("Server detected and is running version {version}");
                Ok(version)
            }
            Err(e) => {
                tracing::error!(
                    server = %self.config.server_url,
                    "There was a problem pinging the Mattermost server. Are you sure it's running?"
                );
                log_api_error(&e);
                Err(BotError::ServerUnreachable(e))
            }
        }
    }

    pub async fn login_as_bot_user(&mut self) -> Result<(), BotError> {
        match self
            .platform
            .login(&self.config.user_email, &self.config.user_password)
            .await
        {
            Ok(user) => {
                tracing::info!(user_id = %user.id, username = %user.username, "Logged in as the bot user");
                self.bot_user = Some(user);
                Ok(())
            }
            Err(e) => {
                tracing::error!(
                    email = %self.config.user_email,
                    "There was a problem logging into the Mattermost server"
                );
                log_api_error(&e);
                Err(BotError::LoginFailed(e))
            }
        }
    }

    /// Brings the account's names in line with the config. Returns whether it changed.
    pub async fn update_bot_user_if_needed(&mut self) -> Result<bool, BotError> {
        let user = self.bot_user.as_ref().ok_or(BotError::NotReady("bot user"))?;

        if user.first_name == self.config.user_first_name
            && user.last_name == self.config.user_last_name
            && user.username == self.config.user_name
        {
            return Ok(false);
        }

        let patch = UserPatch {
            username: Some(self.config.user_name.clone()),
            first_name: Some(self.config.user_first_name.clone()),
            last_name: Some(self.config.user_last_name.clone()),
        };

        let result = self.platform.patch_user(&user.id, &patch).await;
        match result {
            Ok(updated) => {
                self.bot_user = Some(updated);
                tracing::info!(
                    "Looks like this might be the first run so we've updated the bot's account settings"
                );
                Ok(true)
            }
            Err(e) => {
                tracing::error!("We failed to update the bot user");
                log_api_error(&e);
                Err(BotError::UpdateUserFailed(e))
            }
        }
    }

    pub async fn find_bot_team(&mut self) -> Result<(), BotError> {
        match self.platform.team_by_name(&self.config.team_name).await {
            Ok(team) => {
                tracing::info!(team_id = %team.id, "Found team '{}'", team.name);
                self.team = Some(team);
                Ok(())
            }
            Err(e) => {
                tracing::error!(
                    "We failed to get the initial load or we do not appear to be a member of the team '{}'",
                    self.config.team_name
                );
                log_api_error(&e);
                Err(BotError::TeamNotFound {
                    team: self.config.team_name.clone(),
                    source: e,
                })
            }
        }
    }

    pub async fn create_debugging_channel_if_needed(&mut self) -> Result<(), BotError> {
        let team_id = self
            .team
            .as_ref()
            .map(|t| t.id.clone())
            .ok_or(BotError::NotReady("team"))?;
        let name = self.config.log_channel.clone();

        match self.platform.channel_by_name(&name, &team_id).await {
            Ok(channel) => {
                self.debugging_channel = Some(channel);
                return Ok(());
            }
            Err(e) => {
                tracing::warn!(channel = %name, "We failed to get the debugging channel");
                log_api_error(&e);
            }
        }

        let new_channel = NewChannel {
            team_id,
            name: name.clone(),
            display_name: DEBUGGING_CHANNEL_DISPLAY_NAME.to_string(),
            purpose: DEBUGGING_CHANNEL_PURPOSE.to_string(),
            channel_type: ChannelType::Open,
        };

        match self.platform.create_channel(&new_channel).await {
            Ok(channel) => {
                tracing::info!(
                    "Looks like this might be the first run so we've created the channel {name}"
                );
                self.debugging_channel = Some(channel);
                Ok(())
            }
            Err(e) => {
                tracing::error!("We failed to create the channel {name}");
                log_api_error(&e);
                Err(BotError::DebuggingChannelUnavailable(name))
            }
        }
    }

    /// Looks a channel up by name and makes the bot a member of it.
    pub async fn join_channel(&self, name: &str, team_id: &str) -> Option<Channel> {
        let channel = match self.platform.channel_by_name(name, team_id).await {
            Ok(channel) => channel,
            Err(e) => {
                tracing::warn!(channel = %name, "We failed to get the channel");
                log_api_error(&e);
                return None;
            }
        };

        let Some(user_id) = self.bot_user.as_ref().map(|u| u.id.as_str()) else {
            tracing::warn!(channel = %name, "Not logged in, cannot join the channel");
            return None;
        };
        if let Err(e) = self.platform.add_channel_member(&channel.id, user_id).await {
            tracing::warn!(channel = %name, "We failed to join the channel");
            log_api_error(&e);
            return None;
        }

        tracing::info!(channel = %name, channel_id = %channel.id, "Joined channel");
        Some(channel)
    }

    /// Joins the optional main and status channels. Failures leave them unset.
    pub async fn join_configured_channels(&mut self) {
        let Some(team_id) = self.team.as_ref().map(|t| t.id.clone()) else {
            tracing::warn!("No team resolved, skipping channel joins");
            return;
        };

        if let Some(name) = self.config.main_channel.clone() {
            self.main_channel = self.join_channel(&name, &team_id).await;
        }
        if let Some(name) = self.config.status_channel.clone() {
            self.status_channel = self.join_channel(&name, &team_id).await;
        }
    }

    /// Posts to any channel. An empty `reply_to_id` starts a new thread.
    pub async fn send_msg_to_channel(
        &self,
        msg: &str,
        reply_to_id: &str,
        channel_id: &str,
    ) -> Option<Post> {
        let post = NewPost {
            channel_id: channel_id.to_string(),
            message: msg.to_string(),
            root_id: reply_to_id.to_string(),
        };

        match self.platform.create_post(&post).await {
            Ok(created) => Some(created),
            Err(e) => {
                tracing::warn!(channel_id = %channel_id, "We failed to send a message");
                log_api_error(&e);
                self.send_msg_to_debugging_channel(
                    "We failed to send a message to the main channel",
                    "",
                )
                .await;
                None
            }
        }
    }

    pub async fn send_msg_to_debugging_channel(&self, msg: &str, reply_to_id: &str) -> Option<Post> {
        let Some(channel) = self.debugging_channel.as_ref() else {
            tracing::warn!("No debugging channel, dropping message: {msg}");
            return None;
        };

        let post = NewPost {
            channel_id: channel.id.clone(),
            message: msg.to_string(),
            root_id: reply_to_id.to_string(),
        };

        match self.platform.create_post(&post).await {
            Ok(created) => Some(created),
            Err(e) => {
                tracing::error!("We failed to send a message to the logging channel");
                log_api_error(&e);
                None
            }
        }
    }

    pub async fn announce_started(&self) -> Option<Post> {
        let msg = format!("_{} has **started** running_", self.config.bot_name);
        self.send_msg_to_debugging_channel(&msg, "").await
    }

    pub async fn announce_stopped(&self) -> Option<Post> {
        let msg = format!("_{} has **stopped** running_", self.config.bot_name);
        self.send_msg_to_debugging_channel(&msg, "").await
    }
}
