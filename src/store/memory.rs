use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{
    catalog::{Genre, Mpa},
    error::{AppError, Result},
    films::{Film, NewFilm},
    relations::FriendshipStatus,
    store::{ensure_positive_limit, EntityStore, RelationshipStore, Store, StoreTx},
    users::{NewUser, User},
};

/// Same rows as `migrations/*_seed_reference_data.sql`.
const DEFAULT_MPA: [(i32, &str); 5] = [(1, "G"), (2, "PG"), (3, "PG-13"), (4, "R"), (5, "NC-17")];

const DEFAULT_GENRES: [(i32, &str); 6] = [
    (1, "Комедия"),
    (2, "Драма"),
    (3, "Мультфильм"),
    (4, "Триллер"),
    (5, "Документальный"),
    (6, "Боевик"),
];

#[derive(Debug, Clone)]
struct Edge {
    from_id: i64,
    to_id: i64,
    status: FriendshipStatus,
}

#[derive(Debug, Clone)]
struct State {
    users: BTreeMap<i64, User>,
    films: BTreeMap<i64, Film>,
    mpa: BTreeMap<i32, Mpa>,
    genres: BTreeMap<i32, Genre>,
    next_user_id: i64,
    next_film_id: i64,
    // Insertion order doubles as "created_at" ordering.
    friendships: Vec<Edge>,
    likes: Vec<(i64, i64)>,
}

impl Default for State {
    fn default() -> Self {
        Self {
            users: BTreeMap::new(),
            films: BTreeMap::new(),
            mpa: DEFAULT_MPA
                .iter()
                .map(|&(id, name)| (id, Mpa { id, name: name.to_string() }))
                .collect(),
            genres: DEFAULT_GENRES
                .iter()
                .map(|&(id, name)| (id, Genre { id, name: name.to_string() }))
                .collect(),
            next_user_id: 1,
            next_film_id: 1,
            friendships: Vec::new(),
            likes: Vec::new(),
        }
    }
}

/// In-process store used by tests. Transactions are serialized by a mutex and
/// work on a copy that replaces the shared state on commit.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

pub struct MemoryTx {
    guard: OwnedMutexGuard<State>,
    work: State,
}

#[async_trait]
impl Store for MemoryStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> Result<MemoryTx> {
        let guard = self.state.clone().lock_owned().await;
        let work = guard.clone();
        Ok(MemoryTx { guard, work })
    }
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn commit(self) -> Result<()> {
        let MemoryTx { mut guard, work } = self;
        *guard = work;
        Ok(())
    }
}

impl State {
    fn resolve_film(&self, id: i64, film: &NewFilm) -> Result<Film> {
        let mpa = self
            .mpa
            .get(&film.mpa_id)
            .cloned()
            .ok_or_else(|| AppError::not_found(format!("MPA rating with id {} not found", film.mpa_id)))?;

        let genres = film
            .genre_ids
            .iter()
            .map(|gid| {
                self.genres
                    .get(gid)
                    .cloned()
                    .ok_or_else(|| AppError::not_found(format!("Genre with id {} not found", gid)))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Film {
            id,
            name: film.name.clone(),
            description: film.description.clone(),
            release_date: film.release_date,
            duration: film.duration,
            mpa,
            genres,
        })
    }

    fn edge_mut(&mut self, from_id: i64, to_id: i64) -> Option<&mut Edge> {
        self.friendships
            .iter_mut()
            .find(|e| e.from_id == from_id && e.to_id == to_id)
    }
}

#[async_trait]
impl EntityStore for MemoryTx {
    async fn user_exists(&mut self, id: i64) -> Result<bool> {
        Ok(self.work.users.contains_key(&id))
    }

    async fn film_exists(&mut self, id: i64) -> Result<bool> {
        Ok(self.work.films.contains_key(&id))
    }

    async fn get_user(&mut self, id: i64) -> Result<User> {
        self.work
            .users
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::not_found(format!("User with id {} not found", id)))
    }

    async fn get_film(&mut self, id: i64) -> Result<Film> {
        self.work
            .films
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::not_found(format!("Film with id {} not found", id)))
    }

    async fn get_users(&mut self, ids: &[i64]) -> Result<Vec<User>> {
        Ok(ids
            .iter()
            .filter_map(|id| self.work.users.get(id).cloned())
            .collect())
    }

    async fn get_films(&mut self, ids: &[i64]) -> Result<Vec<Film>> {
        Ok(ids
            .iter()
            .filter_map(|id| self.work.films.get(id).cloned())
            .collect())
    }

    async fn list_users(&mut self) -> Result<Vec<User>> {
        Ok(self.work.users.values().cloned().collect())
    }

    async fn insert_user(&mut self, user: &NewUser) -> Result<User> {
        let id = self.work.next_user_id;
        self.work.next_user_id += 1;

        let user = user.clone().with_id(id);
        self.work.users.insert(id, user.clone());
        Ok(user)
    }

    async fn update_user(&mut self, user: &User) -> Result<User> {
        let slot = self
            .work
            .users
            .get_mut(&user.id)
            .ok_or_else(|| AppError::not_found(format!("User with id {} not found", user.id)))?;
        *slot = user.clone();
        Ok(user.clone())
    }

    async fn list_films(&mut self) -> Result<Vec<Film>> {
        Ok(self.work.films.values().cloned().collect())
    }

    async fn insert_film(&mut self, film: &NewFilm) -> Result<Film> {
        let id = self.work.next_film_id;
        let film = self.work.resolve_film(id, film)?;
        self.work.next_film_id += 1;
        self.work.films.insert(id, film.clone());
        Ok(film)
    }

    async fn update_film(&mut self, id: i64, film: &NewFilm) -> Result<Film> {
        if !self.work.films.contains_key(&id) {
            return Err(AppError::not_found(format!("Film with id {} not found", id)));
        }
        let film = self.work.resolve_film(id, film)?;
        self.work.films.insert(id, film.clone());
        Ok(film)
    }

    async fn list_mpa(&mut self) -> Result<Vec<Mpa>> {
        Ok(self.work.mpa.values().cloned().collect())
    }

    async fn get_mpa(&mut self, id: i32) -> Result<Mpa> {
        self.work
            .mpa
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::not_found(format!("MPA rating with id {} not found", id)))
    }

    async fn list_genres(&mut self) -> Result<Vec<Genre>> {
        Ok(self.work.genres.values().cloned().collect())
    }

    async fn get_genre(&mut self, id: i32) -> Result<Genre> {
        self.work
            .genres
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::not_found(format!("Genre with id {} not found", id)))
    }
}

#[async_trait]
impl RelationshipStore for MemoryTx {
    async fn friendship_status(
        &mut self,
        from_id: i64,
        to_id: i64,
    ) -> Result<Option<FriendshipStatus>> {
        Ok(self.work.edge_mut(from_id, to_id).map(|e| e.status))
    }

    async fn insert_friendship_edge(
        &mut self,
        from_id: i64,
        to_id: i64,
        status: FriendshipStatus,
    ) -> Result<()> {
        if self.work.edge_mut(from_id, to_id).is_some() {
            return Err(AppError::conflict(format!(
                "Friendship from {} to {} already exists",
                from_id, to_id
            )));
        }
        if !self.work.users.contains_key(&from_id) || !self.work.users.contains_key(&to_id) {
            return Err(AppError::not_found(format!(
                "User with id {} or {} not found",
                from_id, to_id
            )));
        }

        self.work.friendships.push(Edge {
            from_id,
            to_id,
            status,
        });
        Ok(())
    }

    async fn delete_friendship_edge(&mut self, from_id: i64, to_id: i64) -> Result<()> {
        let before = self.work.friendships.len();
        self.work
            .friendships
            .retain(|e| !(e.from_id == from_id && e.to_id == to_id));

        if self.work.friendships.len() == before {
            return Err(AppError::not_found(format!(
                "Friendship from {} to {} not found",
                from_id, to_id
            )));
        }
        Ok(())
    }

    async fn update_friendship_status(
        &mut self,
        from_id: i64,
        to_id: i64,
        status: FriendshipStatus,
    ) -> Result<()> {
        let edge = self.work.edge_mut(from_id, to_id).ok_or_else(|| {
            AppError::not_found(format!("Friendship from {} to {} not found", from_id, to_id))
        })?;
        edge.status = status;
        Ok(())
    }

    async fn list_confirmed_friends(&mut self, user_id: i64) -> Result<Vec<i64>> {
        Ok(self
            .work
            .friendships
            .iter()
            .filter(|e| e.from_id == user_id && e.status == FriendshipStatus::Confirmed)
            .map(|e| e.to_id)
            .collect())
    }

    async fn list_pending_incoming(&mut self, user_id: i64) -> Result<Vec<i64>> {
        Ok(self
            .work
            .friendships
            .iter()
            .filter(|e| e.to_id == user_id && e.status == FriendshipStatus::Pending)
            .map(|e| e.from_id)
            .collect())
    }

    async fn has_like(&mut self, film_id: i64, user_id: i64) -> Result<bool> {
        Ok(self.work.likes.contains(&(film_id, user_id)))
    }

    async fn insert_like(&mut self, film_id: i64, user_id: i64) -> Result<()> {
        if self.work.likes.contains(&(film_id, user_id)) {
            return Err(AppError::conflict(format!(
                "User {} already liked film {}",
                user_id, film_id
            )));
        }
        if !self.work.films.contains_key(&film_id) || !self.work.users.contains_key(&user_id) {
            return Err(AppError::not_found(format!(
                "Film {} or user {} not found",
                film_id, user_id
            )));
        }

        self.work.likes.push((film_id, user_id));
        Ok(())
    }

    async fn delete_like(&mut self, film_id: i64, user_id: i64) -> Result<()> {
        let before = self.work.likes.len();
        self.work.likes.retain(|&like| like != (film_id, user_id));

        if self.work.likes.len() == before {
            return Err(AppError::not_found(format!(
                "Like from user {} on film {} not found",
                user_id, film_id
            )));
        }
        Ok(())
    }

    async fn count_likes(&mut self, film_id: i64) -> Result<i64> {
        Ok(self
            .work
            .likes
            .iter()
            .filter(|(fid, _)| *fid == film_id)
            .count() as i64)
    }

    async fn top_films_by_like_count(&mut self, limit: i64) -> Result<Vec<i64>> {
        let limit = ensure_positive_limit(limit)?;

        let mut counts: HashMap<i64, i64> = self.work.films.keys().map(|&id| (id, 0)).collect();
        for (film_id, _) in &self.work.likes {
            *counts.entry(*film_id).or_insert(0) += 1;
        }

        let mut ranked: Vec<(i64, i64)> = counts.into_iter().collect();
        ranked.sort_by(|(a_id, a_count), (b_id, b_count)| {
            b_count.cmp(a_count).then(a_id.cmp(b_id))
        });

        Ok(ranked
            .into_iter()
            .take(limit as usize)
            .map(|(id, _)| id)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    async fn seed_users(store: &MemoryStore, count: usize) -> Vec<i64> {
        let mut tx = store.begin().await.unwrap();
        let mut ids = Vec::new();
        for i in 0..count {
            let user = NewUser {
                email: format!("user{}@example.com", i),
                login: format!("user{}", i),
                name: format!("User {}", i),
                birthday: NaiveDate::from_ymd_opt(1990, 1, 1),
            };
            ids.push(tx.insert_user(&user).await.unwrap().id);
        }
        tx.commit().await.unwrap();
        ids
    }

    fn new_film(name: &str) -> NewFilm {
        NewFilm {
            name: name.to_string(),
            description: "description".to_string(),
            release_date: NaiveDate::from_ymd_opt(2000, 1, 1).unwrap(),
            duration: 90,
            mpa_id: 1,
            genre_ids: vec![1, 2],
        }
    }

    #[tokio::test]
    async fn dropped_transaction_rolls_back() {
        let store = MemoryStore::new();
        let ids = seed_users(&store, 2).await;

        {
            let mut tx = store.begin().await.unwrap();
            tx.insert_friendship_edge(ids[0], ids[1], FriendshipStatus::Pending)
                .await
                .unwrap();
        }

        let mut tx = store.begin().await.unwrap();
        assert_eq!(tx.friendship_status(ids[0], ids[1]).await.unwrap(), None);
    }

    #[tokio::test]
    async fn duplicate_edge_is_conflict_and_missing_edge_is_not_found() {
        let store = MemoryStore::new();
        let ids = seed_users(&store, 2).await;
        let mut tx = store.begin().await.unwrap();

        tx.insert_friendship_edge(ids[0], ids[1], FriendshipStatus::Pending)
            .await
            .unwrap();
        assert!(matches!(
            tx.insert_friendship_edge(ids[0], ids[1], FriendshipStatus::Confirmed)
                .await,
            Err(AppError::Conflict(_))
        ));
        assert!(matches!(
            tx.update_friendship_status(ids[1], ids[0], FriendshipStatus::Confirmed)
                .await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            tx.delete_friendship_edge(ids[1], ids[0]).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn pending_incoming_lists_requesters() {
        let store = MemoryStore::new();
        let ids = seed_users(&store, 3).await;
        let mut tx = store.begin().await.unwrap();

        tx.insert_friendship_edge(ids[1], ids[0], FriendshipStatus::Pending)
            .await
            .unwrap();
        tx.insert_friendship_edge(ids[2], ids[0], FriendshipStatus::Confirmed)
            .await
            .unwrap();

        assert_eq!(tx.list_pending_incoming(ids[0]).await.unwrap(), vec![ids[1]]);
        assert!(tx.list_confirmed_friends(ids[0]).await.unwrap().is_empty());
        assert_eq!(tx.list_confirmed_friends(ids[2]).await.unwrap(), vec![ids[0]]);
    }

    #[tokio::test]
    async fn films_resolve_catalog_references() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();

        let film = tx.insert_film(&new_film("Up")).await.unwrap();
        assert_eq!(film.mpa.name, "G");
        assert_eq!(film.genres.len(), 2);

        let mut bad = new_film("Nope");
        bad.genre_ids = vec![42];
        assert!(matches!(tx.insert_film(&bad).await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn top_films_break_ties_by_id_and_include_unliked() {
        let store = MemoryStore::new();
        let users = seed_users(&store, 2).await;
        let mut tx = store.begin().await.unwrap();

        let a = tx.insert_film(&new_film("A")).await.unwrap().id;
        let b = tx.insert_film(&new_film("B")).await.unwrap().id;
        let c = tx.insert_film(&new_film("C")).await.unwrap().id;

        tx.insert_like(c, users[0]).await.unwrap();
        tx.insert_like(b, users[1]).await.unwrap();

        assert_eq!(tx.top_films_by_like_count(10).await.unwrap(), vec![b, c, a]);
        assert_eq!(tx.top_films_by_like_count(1).await.unwrap(), vec![b]);
        assert!(matches!(
            tx.top_films_by_like_count(0).await,
            Err(AppError::InvalidArgument(_))
        ));
    }
}
