//! In-memory [`Platform`] for unit tests.

use crate::error::ApiError;
use crate::mattermost::Platform;
use crate::models::{AppError, Channel, NewChannel, NewPost, Post, Team, User, UserPatch};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Mutex;

#[derive(Default)]
pub struct MockPlatform {
    pub version: Option<String>,
    pub user: Option<User>,
    pub teams: Vec<Team>,
    pub channels: Mutex<Vec<Channel>>,
    pub fail_patch: bool,
    pub fail_create_channel: bool,
    pub fail_add_member: bool,
    /// Channel ids whose posts are rejected.
    pub reject_posts_in: HashSet<String>,
    /// Threaded replies never complete.
    pub stall_replies: bool,
    pub patches: Mutex<Vec<UserPatch>>,
    pub created_channels: Mutex<Vec<NewChannel>>,
    pub memberships: Mutex<Vec<(String, String)>>,
    pub posts: Mutex<Vec<NewPost>>,
}

pub fn app_error(id: &str, status_code: u16) -> ApiError {
    ApiError::App(AppError {
        id: id.to_string(),
        message: format!("mock failure: {id}"),
        detailed_error: String::new(),
        request_id: String::new(),
        status_code,
    })
}

impl MockPlatform {
    pub fn posts(&self) -> Vec<NewPost> {
        self.posts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Platform for MockPlatform {
    async fn server_version(&self) -> Result<String, ApiError> {
        self.version
            .clone()
            .ok_or_else(|| app_error("api.server.unreachable", 503))
    }

    async fn login(&self, _login_id: &str, password: &str) -> Result<User, ApiError> {
        match &self.user {
            Some(user) if password == "password1" => Ok(user.clone()),
            _ => Err(app_error("api.user.login.invalid_credentials", 401)),
        }
    }

    async fn patch_user(&self, user_id: &str, patch: &UserPatch) -> Result<User, ApiError> {
        if self.fail_patch {
            return Err(app_error("api.user.patch.forbidden", 403));
        }
        self.patches.lock().unwrap().push(patch.clone());
        let mut user = self.user.clone().unwrap_or_default();
        user.id = user_id.to_string();
        if let Some(ref v) = patch.username {
            user.username = v.clone();
        }
        if let Some(ref v) = patch.first_name {
            user.first_name = v.clone();
        }
        if let Some(ref v) = patch.last_name {
            user.last_name = v.clone();
        }
        Ok(user)
    }

    async fn team_by_name(&self, name: &str) -> Result<Team, ApiError> {
        self.teams
            .iter()
            .find(|t| t.name == name)
            .cloned()
            .ok_or_else(|| app_error("store.sql_team.get_by_name.app_error", 404))
    }

    async fn channel_by_name(&self, name: &str, team_id: &str) -> Result<Channel, ApiError> {
        self.channels
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.name == name && c.team_id == team_id)
            .cloned()
            .ok_or_else(|| app_error("store.sql_channel.get_by_name.missing.app_error", 404))
    }

    async fn create_channel(&self, channel: &NewChannel) -> Result<Channel, ApiError> {
        if self.fail_create_channel {
            return Err(app_error("api.channel.create_channel.forbidden", 403));
        }
        self.created_channels.lock().unwrap().push(channel.clone());
        let created = Channel {
            id: format!("id-{}", channel.name),
            team_id: channel.team_id.clone(),
            name: channel.name.clone(),
            display_name: channel.display_name.clone(),
            purpose: channel.purpose.clone(),
            channel_type: channel.channel_type,
        };
        self.channels.lock().unwrap().push(created.clone());
        Ok(created)
    }

    async fn add_channel_member(&self, channel_id: &str, user_id: &str) -> Result<(), ApiError> {
        if self.fail_add_member {
            return Err(app_error("api.channel.add_member.forbidden", 403));
        }
        self.memberships
            .lock()
            .unwrap()
            .push((channel_id.to_string(), user_id.to_string()));
        Ok(())
    }

    async fn create_post(&self, post: &NewPost) -> Result<Post, ApiError> {
        if self.stall_replies && !post.root_id.is_empty() {
            std::future::pending::<()>().await;
        }
        if self.reject_posts_in.contains(&post.channel_id) {
            return Err(app_error("api.post.create_post.forbidden", 403));
        }
        let mut posts = self.posts.lock().unwrap();
        posts.push(post.clone());
        Ok(Post {
            id: format!("post-{}", posts.len()),
            channel_id: post.channel_id.clone(),
            user_id: self.user.as_ref().map(|u| u.id.clone()).unwrap_or_default(),
            root_id: post.root_id.clone(),
            message: post.message.clone(),
            create_at: 0,
        })
    }

    fn auth_token(&self) -> Option<String> {
        self.user.as_ref().map(|_| "mock-token".to_string())
    }
}
