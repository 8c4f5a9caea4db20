use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use tracing::info;
use validator::Validate;

use crate::{
    error::{ensure_positive_id, AppError},
    extract::{AppJson, AppPath},
    relations::RelationshipService,
    store::{EntityStore, Store, StoreTx},
    users::UserPayload,
    AppState,
};

/// GET /users
pub async fn list_users<S: Store>(
    State(state): State<AppState<S>>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = state.store.begin().await?;
    let users = tx.list_users().await?;
    tx.commit().await?;

    info!("Returning {} users", users.len());
    Ok(Json(users))
}

/// POST /users
pub async fn create_user<S: Store>(
    State(state): State<AppState<S>>,
    AppJson(payload): AppJson<UserPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let mut tx = state.store.begin().await?;
    let user = tx.insert_user(&payload.into_new_user()).await?;
    tx.commit().await?;

    info!("Created user with id {}", user.id);
    Ok(Json(user))
}

/// PUT /users
pub async fn update_user<S: Store>(
    State(state): State<AppState<S>>,
    AppJson(payload): AppJson<UserPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let id = payload
        .id
        .ok_or_else(|| AppError::invalid("User id is required for update"))?;
    let id = ensure_positive_id(id, "User")?;

    let mut tx = state.store.begin().await?;
    let user = tx.update_user(&payload.into_new_user().with_id(id)).await?;
    tx.commit().await?;

    info!("Updated user with id {}", user.id);
    Ok(Json(user))
}

/// GET /users/:id
pub async fn get_user<S: Store>(
    State(state): State<AppState<S>>,
    AppPath(id): AppPath<i64>,
) -> Result<impl IntoResponse, AppError> {
    let id = ensure_positive_id(id, "User")?;

    let mut tx = state.store.begin().await?;
    let user = tx.get_user(id).await?;
    tx.commit().await?;

    Ok(Json(user))
}

/// Send a friend request
/// PUT /users/:id/friends/:friend_id
pub async fn add_friend<S: Store>(
    State(relations): State<RelationshipService<S>>,
    AppPath((id, friend_id)): AppPath<(i64, i64)>,
) -> Result<impl IntoResponse, AppError> {
    let id = ensure_positive_id(id, "User")?;
    let friend_id = ensure_positive_id(friend_id, "Friend")?;

    relations.send_friend_request(id, friend_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Accept the pending request `friend_id` sent to `id`
/// PUT /users/:id/friends/:friend_id/confirm
pub async fn confirm_friend<S: Store>(
    State(relations): State<RelationshipService<S>>,
    AppPath((id, friend_id)): AppPath<(i64, i64)>,
) -> Result<impl IntoResponse, AppError> {
    let id = ensure_positive_id(id, "User")?;
    let friend_id = ensure_positive_id(friend_id, "Friend")?;

    relations.confirm_friend_request(id, friend_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /users/:id/friends/:friend_id
pub async fn remove_friend<S: Store>(
    State(relations): State<RelationshipService<S>>,
    AppPath((id, friend_id)): AppPath<(i64, i64)>,
) -> Result<impl IntoResponse, AppError> {
    let id = ensure_positive_id(id, "User")?;
    let friend_id = ensure_positive_id(friend_id, "Friend")?;

    relations.remove_friend(id, friend_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /users/:id/friends
pub async fn get_friends<S: Store>(
    State(relations): State<RelationshipService<S>>,
    AppPath(id): AppPath<i64>,
) -> Result<impl IntoResponse, AppError> {
    let id = ensure_positive_id(id, "User")?;

    let friends = relations.list_friends(id).await?;
    info!("Returning {} friends of user {}", friends.len(), id);
    Ok(Json(friends))
}

/// GET /users/:id/friends/common/:other_id
pub async fn get_common_friends<S: Store>(
    State(relations): State<RelationshipService<S>>,
    AppPath((id, other_id)): AppPath<(i64, i64)>,
) -> Result<impl IntoResponse, AppError> {
    let id = ensure_positive_id(id, "User")?;
    let other_id = ensure_positive_id(other_id, "Other user")?;

    let common = relations.list_common_friends(id, other_id).await?;
    info!(
        "Found {} common friends of users {} and {}",
        common.len(),
        id,
        other_id
    );
    Ok(Json(common))
}

/// Incoming friend requests that are still pending
/// GET /users/:id/friends/requests
pub async fn get_friend_requests<S: Store>(
    State(relations): State<RelationshipService<S>>,
    AppPath(id): AppPath<i64>,
) -> Result<impl IntoResponse, AppError> {
    let id = ensure_positive_id(id, "User")?;

    let requesters = relations.list_friend_requests(id).await?;
    Ok(Json(requesters))
}
