use serde::{Deserialize, Serialize};
use sqlx::prelude::Type;

pub mod service;

pub use service::RelationshipService;

/// State of a directed friendship edge (requester -> target).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "friendship_status", rename_all = "lowercase")]
#[serde(rename_all = "UPPERCASE")]
pub enum FriendshipStatus {
    Pending,
    Confirmed,
}

/// Response for `GET /films/:id/likes`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeCountResponse {
    pub film_id: i64,
    pub likes: i64,
}
