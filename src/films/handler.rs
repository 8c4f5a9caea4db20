use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use tracing::info;
use validator::Validate;

use crate::{
    error::{ensure_positive_id, AppError},
    extract::{AppJson, AppPath, AppQuery},
    films::{FilmPayload, NewFilm},
    relations::{LikeCountResponse, RelationshipService},
    store::{EntityStore, Store, StoreTx},
    AppState,
};

const DEFAULT_POPULAR_COUNT: i64 = 10;

/// Query parameters for the popular films list
#[derive(Debug, Deserialize)]
pub struct PopularFilter {
    pub count: Option<i64>,
}

/// Referenced MPA rating and genres must exist before the film is written.
async fn check_references<T: EntityStore + Send>(tx: &mut T, film: &NewFilm) -> Result<(), AppError> {
    tx.get_mpa(film.mpa_id).await?;
    for genre_id in &film.genre_ids {
        tx.get_genre(*genre_id).await?;
    }
    Ok(())
}

/// GET /films
pub async fn list_films<S: Store>(
    State(state): State<AppState<S>>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = state.store.begin().await?;
    let films = tx.list_films().await?;
    tx.commit().await?;

    info!("Returning {} films", films.len());
    Ok(Json(films))
}

/// POST /films
pub async fn create_film<S: Store>(
    State(state): State<AppState<S>>,
    AppJson(payload): AppJson<FilmPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let new_film = payload.into_new_film()?;

    let mut tx = state.store.begin().await?;
    check_references(&mut tx, &new_film).await?;
    let film = tx.insert_film(&new_film).await?;
    tx.commit().await?;

    info!("Created film with id {}", film.id);
    Ok(Json(film))
}

/// PUT /films
pub async fn update_film<S: Store>(
    State(state): State<AppState<S>>,
    AppJson(payload): AppJson<FilmPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let id = payload
        .id
        .ok_or_else(|| AppError::invalid("Film id is required for update"))?;
    let id = ensure_positive_id(id, "Film")?;
    let new_film = payload.into_new_film()?;

    let mut tx = state.store.begin().await?;
    check_references(&mut tx, &new_film).await?;
    let film = tx.update_film(id, &new_film).await?;
    tx.commit().await?;

    info!("Updated film with id {}", film.id);
    Ok(Json(film))
}

/// GET /films/:id
pub async fn get_film<S: Store>(
    State(state): State<AppState<S>>,
    AppPath(id): AppPath<i64>,
) -> Result<impl IntoResponse, AppError> {
    let id = ensure_positive_id(id, "Film")?;

    let mut tx = state.store.begin().await?;
    let film = tx.get_film(id).await?;
    tx.commit().await?;

    Ok(Json(film))
}

/// PUT /films/:id/like/:user_id
pub async fn add_like<S: Store>(
    State(relations): State<RelationshipService<S>>,
    AppPath((id, user_id)): AppPath<(i64, i64)>,
) -> Result<impl IntoResponse, AppError> {
    let id = ensure_positive_id(id, "Film")?;
    let user_id = ensure_positive_id(user_id, "User")?;

    relations.add_like(id, user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /films/:id/like/:user_id
pub async fn remove_like<S: Store>(
    State(relations): State<RelationshipService<S>>,
    AppPath((id, user_id)): AppPath<(i64, i64)>,
) -> Result<impl IntoResponse, AppError> {
    let id = ensure_positive_id(id, "Film")?;
    let user_id = ensure_positive_id(user_id, "User")?;

    relations.remove_like(id, user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /films/:id/likes
pub async fn get_like_count<S: Store>(
    State(relations): State<RelationshipService<S>>,
    AppPath(id): AppPath<i64>,
) -> Result<impl IntoResponse, AppError> {
    let id = ensure_positive_id(id, "Film")?;

    let likes = relations.count_likes(id).await?;
    Ok(Json(LikeCountResponse { film_id: id, likes }))
}

/// GET /films/popular?count=N
pub async fn get_popular<S: Store>(
    State(relations): State<RelationshipService<S>>,
    AppQuery(filter): AppQuery<PopularFilter>,
) -> Result<impl IntoResponse, AppError> {
    let count = filter.count.unwrap_or(DEFAULT_POPULAR_COUNT);

    let films = relations.top_films(count).await?;
    info!("Returning {} popular films", films.len());
    Ok(Json(films))
}
