use serde::{Deserialize, Serialize};

pub mod handler;

/// MPA age rating, a row of the static `mpa_ratings` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Mpa {
    #[sqlx(rename = "mpa_id")]
    pub id: i32,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Genre {
    #[sqlx(rename = "genre_id")]
    pub id: i32,
    pub name: String,
}
