use axum::{
    routing::{get, put},
    Router,
};

use crate::{catalog, films, store::Store, users, AppState};

pub fn router<S: Store>(state: AppState<S>) -> Router {
    let user_router = Router::new()
        .route(
            "/",
            get(users::handler::list_users::<S>)
                .post(users::handler::create_user::<S>)
                .put(users::handler::update_user::<S>),
        )
        .route("/:id", get(users::handler::get_user::<S>))
        .route("/:id/friends", get(users::handler::get_friends::<S>))
        .route(
            "/:id/friends/requests",
            get(users::handler::get_friend_requests::<S>),
        )
        .route(
            "/:id/friends/common/:other_id",
            get(users::handler::get_common_friends::<S>),
        )
        .route(
            "/:id/friends/:friend_id",
            put(users::handler::add_friend::<S>).delete(users::handler::remove_friend::<S>),
        )
        .route(
            "/:id/friends/:friend_id/confirm",
            put(users::handler::confirm_friend::<S>),
        );

    let film_router = Router::new()
        .route(
            "/",
            get(films::handler::list_films::<S>)
                .post(films::handler::create_film::<S>)
                .put(films::handler::update_film::<S>),
        )
        .route("/popular", get(films::handler::get_popular::<S>))
        .route("/:id", get(films::handler::get_film::<S>))
        .route("/:id/likes", get(films::handler::get_like_count::<S>))
        .route(
            "/:id/like/:user_id",
            put(films::handler::add_like::<S>).delete(films::handler::remove_like::<S>),
        );

    let mpa_router = Router::new()
        .route("/", get(catalog::handler::list_mpa::<S>))
        .route("/:id", get(catalog::handler::get_mpa::<S>));

    let genre_router = Router::new()
        .route("/", get(catalog::handler::list_genres::<S>))
        .route("/:id", get(catalog::handler::get_genre::<S>));

    Router::new()
        .nest("/users", user_router)
        .nest("/films", film_router)
        .nest("/mpa", mpa_router)
        .nest("/genres", genre_router)
        .with_state(state)
}
