pub mod client;
pub mod websocket;

pub use client::{HttpClient, Platform};
pub use websocket::EventStream;
