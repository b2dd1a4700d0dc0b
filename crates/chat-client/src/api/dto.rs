//! Wire shapes that have no domain counterpart

use chat_core::UserId;
use serde::Deserialize;

/// Entry of `GET /users/{id}/friends`
#[derive(Debug, Clone, Deserialize)]
pub struct FriendDto {
    pub id: UserId,
}
