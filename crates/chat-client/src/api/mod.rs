//! REST API client

mod client;
mod dto;

pub use client::{ApiClient, USER_HEADER};
pub use dto::FriendDto;
