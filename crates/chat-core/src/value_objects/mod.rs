//! Value objects - immutable types that represent domain concepts

mod ids;
mod resource;

pub use ids::{ChannelId, MessageId, UserId};
pub use resource::ResourceKey;
