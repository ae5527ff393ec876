/// Application routes configuration
use crate::auth::require_token;
use crate::handlers::{
    create_dummy_player, destroy_clan, destroy_player, fetch_clan_from_api,
    fetch_player_from_api, get_capital_raids, health, list_clans, list_players, show_clan,
    show_player, store_clan, store_player, update_clan, update_player, AppState,
};
use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Build the application router with all routes
pub fn build_router(state: AppState) -> Router {
    // Write operations require the bearer token
    let protected = Router::new()
        .route("/players", post(store_player))
        .route("/players/:tag", put(update_player).delete(destroy_player))
        .route("/clans", post(store_clan))
        .route("/clans/:tag", put(update_clan).delete(destroy_clan))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_token));

    let public = Router::new()
        // Players
        .route("/players", get(list_players))
        .route("/players/create-dummy", get(create_dummy_player))
        .route("/players/fetch-from-api/:tag", get(fetch_player_from_api))
        .route("/players/:tag", get(show_player))
        // Clans
        .route("/clans", get(list_clans))
        .route("/clans/fetch-from-api/:tag", get(fetch_clan_from_api))
        .route("/clans/:tag", get(show_clan))
        .route("/clans/:tag/capital-raids", get(get_capital_raids));

    Router::new()
        .route("/health", get(health))
        .nest("/api", public.merge(protected))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
