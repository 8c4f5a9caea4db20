use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use std::collections::HashMap;

use crate::{
    catalog::{Genre, Mpa},
    error::{AppError, Result},
    films::{Film, NewFilm},
    relations::FriendshipStatus,
    store::{ensure_positive_limit, order_by_ids, EntityStore, RelationshipStore, Store, StoreTx},
    users::{NewUser, User},
};

const USER_COLUMNS: &str = "user_id, email, login, name, birthday";

const FILM_SELECT: &str = r#"
    SELECT f.film_id, f.title, f.description, f.release_date, f.duration,
           m.mpa_id, m.name AS mpa_name
    FROM films f
    JOIN mpa_ratings m ON f.mpa_id = m.mpa_id
"#;

/// PostgreSQL-backed store. Uniqueness of edges and likes is enforced by primary keys.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

pub struct PgTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl Store for PgStore {
    type Tx = PgTx;

    async fn begin(&self) -> Result<PgTx> {
        let tx = self.pool.begin().await.map_err(internal)?;
        Ok(PgTx { tx })
    }
}

#[async_trait]
impl StoreTx for PgTx {
    async fn commit(self) -> Result<()> {
        self.tx.commit().await.map_err(internal)
    }
}

fn internal(e: sqlx::Error) -> AppError {
    tracing::error!("Database error: {:?}", e);
    AppError::InternalServerError
}

/// Maps constraint violations that can race a pre-check onto domain errors.
fn classify(e: sqlx::Error, conflict: impl FnOnce() -> String, missing: impl FnOnce() -> String) -> AppError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            return AppError::Conflict(conflict());
        }
        if db.is_foreign_key_violation() {
            return AppError::NotFound(missing());
        }
    }
    internal(e)
}

/// Helper struct for fetching films joined with their MPA rating
#[derive(FromRow)]
struct FilmRow {
    film_id: i64,
    title: String,
    description: String,
    release_date: NaiveDate,
    duration: i32,
    mpa_id: i32,
    mpa_name: String,
}

#[derive(FromRow)]
struct FilmGenreRow {
    film_id: i64,
    genre_id: i32,
    name: String,
}

impl PgTx {
    async fn attach_genres(&mut self, rows: Vec<FilmRow>) -> Result<Vec<Film>> {
        let ids: Vec<i64> = rows.iter().map(|r| r.film_id).collect();

        let genre_rows = sqlx::query_as::<_, FilmGenreRow>(
            r#"
            SELECT fg.film_id, g.genre_id, g.name
            FROM film_genres fg
            JOIN genres g ON fg.genre_id = g.genre_id
            WHERE fg.film_id = ANY($1)
            ORDER BY fg.film_id, g.genre_id
            "#,
        )
        .bind(&ids)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(internal)?;

        let mut genres: HashMap<i64, Vec<Genre>> = HashMap::new();
        for row in genre_rows {
            genres.entry(row.film_id).or_default().push(Genre {
                id: row.genre_id,
                name: row.name,
            });
        }

        Ok(rows
            .into_iter()
            .map(|r| Film {
                id: r.film_id,
                name: r.title,
                description: r.description,
                release_date: r.release_date,
                duration: r.duration,
                mpa: Mpa {
                    id: r.mpa_id,
                    name: r.mpa_name,
                },
                genres: genres.remove(&r.film_id).unwrap_or_default(),
            })
            .collect())
    }

    async fn replace_film_genres(&mut self, film_id: i64, genre_ids: &[i32]) -> Result<()> {
        sqlx::query("DELETE FROM film_genres WHERE film_id = $1")
            .bind(film_id)
            .execute(&mut *self.tx)
            .await
            .map_err(internal)?;

        if genre_ids.is_empty() {
            return Ok(());
        }

        sqlx::query(
            "INSERT INTO film_genres (film_id, genre_id) SELECT $1, UNNEST($2::int[]) ON CONFLICT DO NOTHING",
        )
        .bind(film_id)
        .bind(genre_ids)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| {
            classify(
                e,
                || "Duplicate genre".to_string(),
                || format!("Genre from {:?} not found", genre_ids),
            )
        })?;

        Ok(())
    }
}

#[async_trait]
impl EntityStore for PgTx {
    async fn user_exists(&mut self, id: i64) -> Result<bool> {
        // FOR SHARE keeps the row from being deleted until this transaction ends.
        let row = sqlx::query("SELECT 1 FROM users WHERE user_id = $1 FOR SHARE")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(internal)?;
        Ok(row.is_some())
    }

    async fn film_exists(&mut self, id: i64) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM films WHERE film_id = $1 FOR SHARE")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(internal)?;
        Ok(row.is_some())
    }

    async fn get_user(&mut self, id: i64) -> Result<User> {
        sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE user_id = $1", USER_COLUMNS))
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(internal)?
            .ok_or_else(|| AppError::not_found(format!("User with id {} not found", id)))
    }

    async fn get_film(&mut self, id: i64) -> Result<Film> {
        let row = sqlx::query_as::<_, FilmRow>(&format!("{} WHERE f.film_id = $1", FILM_SELECT))
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(internal)?
            .ok_or_else(|| AppError::not_found(format!("Film with id {} not found", id)))?;

        let mut films = self.attach_genres(vec![row]).await?;
        films
            .pop()
            .ok_or_else(|| AppError::not_found(format!("Film with id {} not found", id)))
    }

    async fn get_users(&mut self, ids: &[i64]) -> Result<Vec<User>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE user_id = ANY($1)",
            USER_COLUMNS
        ))
        .bind(ids)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(internal)?;

        Ok(order_by_ids(ids, users, |u| u.id))
    }

    async fn get_films(&mut self, ids: &[i64]) -> Result<Vec<Film>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query_as::<_, FilmRow>(&format!("{} WHERE f.film_id = ANY($1)", FILM_SELECT))
            .bind(ids)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(internal)?;

        let films = self.attach_genres(rows).await?;
        Ok(order_by_ids(ids, films, |f| f.id))
    }

    async fn list_users(&mut self) -> Result<Vec<User>> {
        sqlx::query_as::<_, User>(&format!("SELECT {} FROM users ORDER BY user_id", USER_COLUMNS))
            .fetch_all(&mut *self.tx)
            .await
            .map_err(internal)
    }

    async fn insert_user(&mut self, user: &NewUser) -> Result<User> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (email, login, name, birthday)
            VALUES ($1, $2, $3, $4)
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(&user.email)
        .bind(&user.login)
        .bind(&user.name)
        .bind(user.birthday)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(internal)
    }

    async fn update_user(&mut self, user: &User) -> Result<User> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users SET email = $1, login = $2, name = $3, birthday = $4
            WHERE user_id = $5
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(&user.email)
        .bind(&user.login)
        .bind(&user.name)
        .bind(user.birthday)
        .bind(user.id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(internal)?
        .ok_or_else(|| AppError::not_found(format!("User with id {} not found", user.id)))
    }

    async fn list_films(&mut self) -> Result<Vec<Film>> {
        let rows = sqlx::query_as::<_, FilmRow>(&format!("{} ORDER BY f.film_id", FILM_SELECT))
            .fetch_all(&mut *self.tx)
            .await
            .map_err(internal)?;

        self.attach_genres(rows).await
    }

    async fn insert_film(&mut self, film: &NewFilm) -> Result<Film> {
        let film_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO films (title, description, release_date, duration, mpa_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING film_id
            "#,
        )
        .bind(&film.name)
        .bind(&film.description)
        .bind(film.release_date)
        .bind(film.duration)
        .bind(film.mpa_id)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| {
            classify(
                e,
                || "Film already exists".to_string(),
                || format!("MPA rating with id {} not found", film.mpa_id),
            )
        })?;

        self.replace_film_genres(film_id, &film.genre_ids).await?;
        self.get_film(film_id).await
    }

    async fn update_film(&mut self, id: i64, film: &NewFilm) -> Result<Film> {
        let result = sqlx::query(
            r#"
            UPDATE films
            SET title = $1, description = $2, release_date = $3, duration = $4, mpa_id = $5
            WHERE film_id = $6
            "#,
        )
        .bind(&film.name)
        .bind(&film.description)
        .bind(film.release_date)
        .bind(film.duration)
        .bind(film.mpa_id)
        .bind(id)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| {
            classify(
                e,
                || "Film already exists".to_string(),
                || format!("MPA rating with id {} not found", film.mpa_id),
            )
        })?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(format!("Film with id {} not found", id)));
        }

        self.replace_film_genres(id, &film.genre_ids).await?;
        self.get_film(id).await
    }

    async fn list_mpa(&mut self) -> Result<Vec<Mpa>> {
        sqlx::query_as::<_, Mpa>("SELECT mpa_id, name FROM mpa_ratings ORDER BY mpa_id")
            .fetch_all(&mut *self.tx)
            .await
            .map_err(internal)
    }

    async fn get_mpa(&mut self, id: i32) -> Result<Mpa> {
        sqlx::query_as::<_, Mpa>("SELECT mpa_id, name FROM mpa_ratings WHERE mpa_id = $1")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(internal)?
            .ok_or_else(|| AppError::not_found(format!("MPA rating with id {} not found", id)))
    }

    async fn list_genres(&mut self) -> Result<Vec<Genre>> {
        sqlx::query_as::<_, Genre>("SELECT genre_id, name FROM genres ORDER BY genre_id")
            .fetch_all(&mut *self.tx)
            .await
            .map_err(internal)
    }

    async fn get_genre(&mut self, id: i32) -> Result<Genre> {
        sqlx::query_as::<_, Genre>("SELECT genre_id, name FROM genres WHERE genre_id = $1")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(internal)?
            .ok_or_else(|| AppError::not_found(format!("Genre with id {} not found", id)))
    }
}

#[async_trait]
impl RelationshipStore for PgTx {
    async fn friendship_status(
        &mut self,
        from_id: i64,
        to_id: i64,
    ) -> Result<Option<FriendshipStatus>> {
        sqlx::query_scalar::<_, FriendshipStatus>(
            "SELECT status FROM friendships WHERE user_id = $1 AND friend_id = $2",
        )
        .bind(from_id)
        .bind(to_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(internal)
    }

    async fn insert_friendship_edge(
        &mut self,
        from_id: i64,
        to_id: i64,
        status: FriendshipStatus,
    ) -> Result<()> {
        sqlx::query("INSERT INTO friendships (user_id, friend_id, status) VALUES ($1, $2, $3)")
            .bind(from_id)
            .bind(to_id)
            .bind(status)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| {
                classify(
                    e,
                    || format!("Friendship from {} to {} already exists", from_id, to_id),
                    || format!("User with id {} or {} not found", from_id, to_id),
                )
            })?;
        Ok(())
    }

    async fn delete_friendship_edge(&mut self, from_id: i64, to_id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM friendships WHERE user_id = $1 AND friend_id = $2")
            .bind(from_id)
            .bind(to_id)
            .execute(&mut *self.tx)
            .await
            .map_err(internal)?;

        if result.rows_affected() == 0 {
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
        let result =
            sqlx::query("UPDATE friendships SET status = $3 WHERE user_id = $1 AND friend_id = $2")
                .bind(from_id)
                .bind(to_id)
                .bind(status)
                .execute(&mut *self.tx)
                .await
                .map_err(internal)?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(format!(
                "Friendship from {} to {} not found",
                from_id, to_id
            )));
        }
        Ok(())
    }

    async fn list_confirmed_friends(&mut self, user_id: i64) -> Result<Vec<i64>> {
        sqlx::query_scalar::<_, i64>(
            r#"
            SELECT friend_id FROM friendships
            WHERE user_id = $1 AND status = $2
            ORDER BY created_at, friend_id
            "#,
        )
        .bind(user_id)
        .bind(FriendshipStatus::Confirmed)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(internal)
    }

    async fn list_pending_incoming(&mut self, user_id: i64) -> Result<Vec<i64>> {
        sqlx::query_scalar::<_, i64>(
            r#"
            SELECT user_id FROM friendships
            WHERE friend_id = $1 AND status = $2
            ORDER BY created_at, user_id
            "#,
        )
        .bind(user_id)
        .bind(FriendshipStatus::Pending)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(internal)
    }

    async fn has_like(&mut self, film_id: i64, user_id: i64) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM film_likes WHERE film_id = $1 AND user_id = $2")
            .bind(film_id)
            .bind(user_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(internal)?;
        Ok(row.is_some())
    }

    async fn insert_like(&mut self, film_id: i64, user_id: i64) -> Result<()> {
        sqlx::query("INSERT INTO film_likes (film_id, user_id) VALUES ($1, $2)")
            .bind(film_id)
            .bind(user_id)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| {
                classify(
                    e,
                    || format!("User {} already liked film {}", user_id, film_id),
                    || format!("Film {} or user {} not found", film_id, user_id),
                )
            })?;
        Ok(())
    }

    async fn delete_like(&mut self, film_id: i64, user_id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM film_likes WHERE film_id = $1 AND user_id = $2")
            .bind(film_id)
            .bind(user_id)
            .execute(&mut *self.tx)
            .await
            .map_err(internal)?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(format!(
                "Like from user {} on film {} not found",
                user_id, film_id
            )));
        }
        Ok(())
    }

    async fn count_likes(&mut self, film_id: i64) -> Result<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM film_likes WHERE film_id = $1")
            .bind(film_id)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(internal)
    }

    async fn top_films_by_like_count(&mut self, limit: i64) -> Result<Vec<i64>> {
        let limit = ensure_positive_limit(limit)?;

        sqlx::query_scalar::<_, i64>(
            r#"
            SELECT f.film_id
            FROM films f
            LEFT JOIN film_likes fl ON f.film_id = fl.film_id
            GROUP BY f.film_id
            ORDER BY COUNT(fl.user_id) DESC, f.film_id ASC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(internal)
    }
}
