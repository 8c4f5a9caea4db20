use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::catalog::{Genre, Mpa};
use crate::users::not_blank;

pub mod handler;

/// Release dates earlier than the first public film screening are rejected.
pub const EARLIEST_RELEASE_DATE: (i32, u32, u32) = (1895, 12, 28);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Film {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub release_date: NaiveDate,
    pub duration: i32,
    pub mpa: Mpa,
    pub genres: Vec<Genre>,
}

/// Reference to an MPA rating or genre by id, as sent by clients
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct IdRef {
    pub id: i32,
}

/// Request payload for creating or updating a film
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct FilmPayload {
    pub id: Option<i64>,
    #[validate(custom(function = "not_blank", message = "Name cannot be blank"))]
    pub name: String,
    #[validate(length(
        min = 1,
        max = 200,
        message = "Description must be between 1 and 200 characters"
    ))]
    pub description: String,
    #[validate(custom(function = "release_date_after_cinema_birth"))]
    pub release_date: NaiveDate,
    #[validate(range(min = 1, message = "Duration must be positive"))]
    pub duration: i32,
    pub mpa: Option<IdRef>,
    pub genres: Option<Vec<IdRef>>,
}

/// A validated film ready to be written; genre ids are sorted and deduplicated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewFilm {
    pub name: String,
    pub description: String,
    pub release_date: NaiveDate,
    pub duration: i32,
    pub mpa_id: i32,
    pub genre_ids: Vec<i32>,
}

impl FilmPayload {
    pub fn into_new_film(self) -> crate::error::Result<NewFilm> {
        let mpa = self
            .mpa
            .ok_or_else(|| crate::error::AppError::invalid("MPA rating is required"))?;

        let mut genre_ids: Vec<i32> = self
            .genres
            .unwrap_or_default()
            .into_iter()
            .map(|g| g.id)
            .collect();
        genre_ids.sort_unstable();
        genre_ids.dedup();

        Ok(NewFilm {
            name: self.name,
            description: self.description,
            release_date: self.release_date,
            duration: self.duration,
            mpa_id: mpa.id,
            genre_ids,
        })
    }
}

fn release_date_after_cinema_birth(date: &NaiveDate) -> Result<(), ValidationError> {
    let (y, m, d) = EARLIEST_RELEASE_DATE;
    match NaiveDate::from_ymd_opt(y, m, d) {
        Some(earliest) if *date < earliest => {
            let mut err = ValidationError::new("release_date");
            err.message = Some("Release date cannot be earlier than 1895-12-28".into());
            Err(err)
        }
        _ => Ok(()),
    }
}
