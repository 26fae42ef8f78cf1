pub mod bot;
pub mod config;
pub mod error;
pub mod handler;
pub mod helper;
pub mod mattermost;
pub mod models;
pub mod responder;

#[cfg(test)]
mod mock;
