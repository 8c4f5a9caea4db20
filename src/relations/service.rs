use std::collections::HashSet;

use tracing::info;

use crate::{
    error::{AppError, Result},
    films::Film,
    relations::FriendshipStatus,
    store::{EntityStore, RelationshipStore, Store, StoreTx},
    users::User,
};

/// Rule-checked friendship and like operations. Each call is one store transaction:
/// existence checks and mutations commit together or not at all.
#[derive(Debug, Clone)]
pub struct RelationshipService<S> {
    store: S,
}

async fn ensure_user<T: EntityStore + Send>(tx: &mut T, id: i64) -> Result<()> {
    if !tx.user_exists(id).await? {
        return Err(AppError::not_found(format!("User with id {} not found", id)));
    }
    Ok(())
}

async fn ensure_film<T: EntityStore + Send>(tx: &mut T, id: i64) -> Result<()> {
    if !tx.film_exists(id).await? {
        return Err(AppError::not_found(format!("Film with id {} not found", id)));
    }
    Ok(())
}

impl<S: Store> RelationshipService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub async fn send_friend_request(&self, from_id: i64, to_id: i64) -> Result<()> {
        let mut tx = self.store.begin().await?;
        ensure_user(&mut tx, from_id).await?;
        ensure_user(&mut tx, to_id).await?;

        if from_id == to_id {
            return Err(AppError::invalid("A user cannot send a friend request to themselves"));
        }

        if tx.friendship_status(from_id, to_id).await?.is_some() {
            return Err(AppError::conflict(format!(
                "User {} has already sent a friend request to user {}",
                from_id, to_id
            )));
        }

        tx.insert_friendship_edge(from_id, to_id, FriendshipStatus::Pending)
            .await?;
        tx.commit().await?;

        info!("User {} sent a friend request to user {}", from_id, to_id);
        Ok(())
    }

    /// `user_id` accepts the pending request sent by `requester_id`.
    pub async fn confirm_friend_request(&self, user_id: i64, requester_id: i64) -> Result<()> {
        let mut tx = self.store.begin().await?;
        ensure_user(&mut tx, user_id).await?;
        ensure_user(&mut tx, requester_id).await?;

        if tx.friendship_status(requester_id, user_id).await? != Some(FriendshipStatus::Pending) {
            return Err(AppError::not_found(format!(
                "No pending friend request from user {} to user {}",
                requester_id, user_id
            )));
        }

        tx.update_friendship_status(requester_id, user_id, FriendshipStatus::Confirmed)
            .await?;

        match tx.friendship_status(user_id, requester_id).await? {
            None => {
                tx.insert_friendship_edge(user_id, requester_id, FriendshipStatus::Confirmed)
                    .await?
            }
            Some(_) => {
                tx.update_friendship_status(user_id, requester_id, FriendshipStatus::Confirmed)
                    .await?
            }
        }

        tx.commit().await?;

        info!(
            "User {} confirmed the friend request from user {}",
            user_id, requester_id
        );
        Ok(())
    }

    /// Removes the `user_id -> other_id` edge only; the reverse edge stays.
    pub async fn remove_friend(&self, user_id: i64, other_id: i64) -> Result<()> {
        let mut tx = self.store.begin().await?;
        ensure_user(&mut tx, user_id).await?;
        ensure_user(&mut tx, other_id).await?;

        tx.delete_friendship_edge(user_id, other_id).await?;
        tx.commit().await?;

        info!("User {} removed user {} from friends", user_id, other_id);
        Ok(())
    }

    pub async fn list_friends(&self, user_id: i64) -> Result<Vec<User>> {
        let mut tx = self.store.begin().await?;
        ensure_user(&mut tx, user_id).await?;

        let ids = tx.list_confirmed_friends(user_id).await?;
        let friends = tx.get_users(&ids).await?;
        tx.commit().await?;

        Ok(friends)
    }

    pub async fn list_common_friends(&self, user_id: i64, other_id: i64) -> Result<Vec<User>> {
        let mut tx = self.store.begin().await?;
        ensure_user(&mut tx, user_id).await?;
        ensure_user(&mut tx, other_id).await?;

        let mine = tx.list_confirmed_friends(user_id).await?;
        let theirs: HashSet<i64> = tx.list_confirmed_friends(other_id).await?.into_iter().collect();

        let common: Vec<i64> = mine.into_iter().filter(|id| theirs.contains(id)).collect();
        let users = tx.get_users(&common).await?;
        tx.commit().await?;

        Ok(users)
    }

    /// Users whose friend request to `user_id` is still pending.
    pub async fn list_friend_requests(&self, user_id: i64) -> Result<Vec<User>> {
        let mut tx = self.store.begin().await?;
        ensure_user(&mut tx, user_id).await?;

        let ids = tx.list_pending_incoming(user_id).await?;
        let users = tx.get_users(&ids).await?;
        tx.commit().await?;

        Ok(users)
    }

    pub async fn add_like(&self, film_id: i64, user_id: i64) -> Result<()> {
        let mut tx = self.store.begin().await?;
        ensure_film(&mut tx, film_id).await?;
        ensure_user(&mut tx, user_id).await?;

        if tx.has_like(film_id, user_id).await? {
            return Err(AppError::conflict(format!(
                "User {} has already liked film {}",
                user_id, film_id
            )));
        }

        tx.insert_like(film_id, user_id).await?;
        tx.commit().await?;

        info!("User {} liked film {}", user_id, film_id);
        Ok(())
    }

    pub async fn remove_like(&self, film_id: i64, user_id: i64) -> Result<()> {
        let mut tx = self.store.begin().await?;
        ensure_film(&mut tx, film_id).await?;
        ensure_user(&mut tx, user_id).await?;

        if !tx.has_like(film_id, user_id).await? {
            return Err(AppError::not_found(format!(
                "Like from user {} on film {} not found",
                user_id, film_id
            )));
        }

        tx.delete_like(film_id, user_id).await?;
        tx.commit().await?;

        info!("User {} removed their like from film {}", user_id, film_id);
        Ok(())
    }

    pub async fn count_likes(&self, film_id: i64) -> Result<i64> {
        let mut tx = self.store.begin().await?;
        ensure_film(&mut tx, film_id).await?;

        let count = tx.count_likes(film_id).await?;
        tx.commit().await?;

        Ok(count)
    }

    /// Most liked films first; equal counts are ordered by ascending film id.
    pub async fn top_films(&self, limit: i64) -> Result<Vec<Film>> {
        if limit <= 0 {
            return Err(AppError::invalid(format!(
                "Film count must be a positive number, got {}",
                limit
            )));
        }

        let mut tx = self.store.begin().await?;
        let ids = tx.top_films_by_like_count(limit).await?;
        let films = tx.get_films(&ids).await?;
        tx.commit().await?;

        Ok(films)
    }
}
