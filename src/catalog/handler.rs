use axum::{
    extract::State,
    response::IntoResponse,
    Json,
};

use crate::{
    error::{ensure_positive_id, AppError},
    extract::AppPath,
    store::{EntityStore, Store, StoreTx},
    AppState,
};

/// GET /mpa
pub async fn list_mpa<S: Store>(
    State(state): State<AppState<S>>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = state.store.begin().await?;
    let ratings = tx.list_mpa().await?;
    tx.commit().await?;
    Ok(Json(ratings))
}

/// GET /mpa/:id
pub async fn get_mpa<S: Store>(
    State(state): State<AppState<S>>,
    AppPath(id): AppPath<i32>,
) -> Result<impl IntoResponse, AppError> {
    ensure_positive_id(id.into(), "MPA rating")?;

    let mut tx = state.store.begin().await?;
    let rating = tx.get_mpa(id).await?;
    tx.commit().await?;
    Ok(Json(rating))
}

/// GET /genres
pub async fn list_genres<S: Store>(
    State(state): State<AppState<S>>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = state.store.begin().await?;
    let genres = tx.list_genres().await?;
    tx.commit().await?;
    Ok(Json(genres))
}

/// GET /genres/:id
pub async fn get_genre<S: Store>(
    State(state): State<AppState<S>>,
    AppPath(id): AppPath<i32>,
) -> Result<impl IntoResponse, AppError> {
    ensure_positive_id(id.into(), "Genre")?;

    let mut tx = state.store.begin().await?;
    let genre = tx.get_genre(id).await?;
    tx.commit().await?;
    Ok(Json(genre))
}
