use async_trait::async_trait;

use crate::catalog::{Genre, Mpa};
use crate::error::{AppError, Result};
use crate::films::{Film, NewFilm};
use crate::relations::FriendshipStatus;
use crate::users::{NewUser, User};

#[cfg(test)]
pub mod memory;
pub mod postgres;

/// Entry point to persistence: every unit of work runs inside one transaction.
#[async_trait]
pub trait Store: Clone + Send + Sync + 'static {
    type Tx: StoreTx;

    async fn begin(&self) -> Result<Self::Tx>;
}

/// An open transaction. Dropping it without `commit` rolls back.
#[async_trait]
pub trait StoreTx: EntityStore + RelationshipStore + Send {
    async fn commit(self) -> Result<()>;
}

/// Keyed user and film records plus the static MPA and genre tables.
#[async_trait]
pub trait EntityStore {
    async fn user_exists(&mut self, id: i64) -> Result<bool>;
    async fn film_exists(&mut self, id: i64) -> Result<bool>;
    async fn get_user(&mut self, id: i64) -> Result<User>;
    async fn get_film(&mut self, id: i64) -> Result<Film>;
    /// Records for `ids`, in the same order. Unknown ids are skipped.
    async fn get_users(&mut self, ids: &[i64]) -> Result<Vec<User>>;
    /// Records for `ids`, in the same order. Unknown ids are skipped.
    async fn get_films(&mut self, ids: &[i64]) -> Result<Vec<Film>>;

    async fn list_users(&mut self) -> Result<Vec<User>>;
    async fn insert_user(&mut self, user: &NewUser) -> Result<User>;
    async fn update_user(&mut self, user: &User) -> Result<User>;

    async fn list_films(&mut self) -> Result<Vec<Film>>;
    async fn insert_film(&mut self, film: &NewFilm) -> Result<Film>;
    async fn update_film(&mut self, id: i64, film: &NewFilm) -> Result<Film>;

    async fn list_mpa(&mut self) -> Result<Vec<Mpa>>;
    async fn get_mpa(&mut self, id: i32) -> Result<Mpa>;
    async fn list_genres(&mut self) -> Result<Vec<Genre>>;
    async fn get_genre(&mut self, id: i32) -> Result<Genre>;
}

/// Friendship edges and film likes with set semantics.
#[async_trait]
pub trait RelationshipStore {
    async fn friendship_status(&mut self, from_id: i64, to_id: i64)
        -> Result<Option<FriendshipStatus>>;
    /// Fails with `Conflict` when an edge for `(from_id, to_id)` already exists.
    async fn insert_friendship_edge(
        &mut self,
        from_id: i64,
        to_id: i64,
        status: FriendshipStatus,
    ) -> Result<()>;
    async fn delete_friendship_edge(&mut self, from_id: i64, to_id: i64) -> Result<()>;
    async fn update_friendship_status(
        &mut self,
        from_id: i64,
        to_id: i64,
        status: FriendshipStatus,
    ) -> Result<()>;
    /// Targets of confirmed edges leaving `user_id`, oldest first.
    async fn list_confirmed_friends(&mut self, user_id: i64) -> Result<Vec<i64>>;
    /// Requesters with a pending edge pointing at `user_id`, oldest first.
    async fn list_pending_incoming(&mut self, user_id: i64) -> Result<Vec<i64>>;

    async fn has_like(&mut self, film_id: i64, user_id: i64) -> Result<bool>;
    /// Fails with `Conflict` when the pair already exists.
    async fn insert_like(&mut self, film_id: i64, user_id: i64) -> Result<()>;
    async fn delete_like(&mut self, film_id: i64, user_id: i64) -> Result<()>;
    async fn count_likes(&mut self, film_id: i64) -> Result<i64>;
    /// Film ids by descending like count, ties by ascending id.
    async fn top_films_by_like_count(&mut self, limit: i64) -> Result<Vec<i64>>;
}

pub(crate) fn ensure_positive_limit(limit: i64) -> Result<i64> {
    if limit <= 0 {
        return Err(AppError::invalid(format!(
            "Film count must be a positive number, got {}",
            limit
        )));
    }
    Ok(limit)
}

/// Reorders fetched records to follow `ids`, dropping ids that were not found.
pub(crate) fn order_by_ids<T>(ids: &[i64], records: Vec<T>, id_of: impl Fn(&T) -> i64) -> Vec<T> {
    let mut by_id: std::collections::HashMap<i64, T> =
        records.into_iter().map(|r| (id_of(&r), r)).collect();
    ids.iter().filter_map(|id| by_id.remove(id)).collect()
}
