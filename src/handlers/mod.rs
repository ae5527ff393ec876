/// HTTP request handlers
use crate::domain::{
    Clan, ClanUpdate, Health, NewClan, NewPlayer, Player, PlayerUpdate, RaidQuery, RaidResponse,
};
use crate::errors::ApiError;
use crate::services::{ClanService, PlayerService, RaidService};
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub clan_service: Arc<ClanService>,
    pub player_service: Arc<PlayerService>,
    pub raid_service: Arc<RaidService>,
    pub api_token: Option<Arc<str>>,
}

/// Successful response wrapper
#[derive(Debug, Serialize)]
pub struct SuccessResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fetched_at: Option<DateTime<Utc>>,
}

impl<T: Serialize> SuccessResponse<T> {
    pub fn new(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
            fetched_at: None,
        }
    }

    pub fn with_message(mut self, message: &'static str) -> Self {
        self.message = Some(message);
        self
    }

    pub fn fetched_now(mut self) -> Self {
        self.fetched_at = Some(Utc::now());
        self
    }
}

impl SuccessResponse<()> {
    pub fn message_only(message: &'static str) -> Self {
        Self {
            success: true,
            message: Some(message),
            data: None,
            fetched_at: None,
        }
    }
}

type Created<T> = (StatusCode, Json<SuccessResponse<T>>);

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(v)| v)
        .map_err(|rejection| ApiError::InvalidInput(rejection.body_text()))
}

fn created_or_ok(created: bool) -> StatusCode {
    if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    }
}

/// Health check handler
pub async fn health() -> Json<Health> {
    Json(Health {
        status: "ok",
        now: Utc::now(),
    })
}

// ---------------------------------------------------------------------------
// Clans
// ---------------------------------------------------------------------------

pub async fn list_clans(
    State(state): State<AppState>,
) -> Result<Json<SuccessResponse<Vec<Clan>>>, ApiError> {
    let clans = state.clan_service.list().await?;
    Ok(Json(SuccessResponse::new(clans)))
}

pub async fn show_clan(
    Path(tag): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<SuccessResponse<Clan>>, ApiError> {
    let clan = state.clan_service.get(&tag).await?;
    Ok(Json(SuccessResponse::new(clan)))
}

pub async fn store_clan(
    State(state): State<AppState>,
    payload: Result<Json<NewClan>, JsonRejection>,
) -> Result<Created<Clan>, ApiError> {
    let clan = state.clan_service.create(body(payload)?).await?;
    Ok((
        StatusCode::CREATED,
        Json(SuccessResponse::new(clan).with_message("Clan created successfully")),
    ))
}

pub async fn update_clan(
    Path(tag): Path<String>,
    State(state): State<AppState>,
    payload: Result<Json<ClanUpdate>, JsonRejection>,
) -> Result<Json<SuccessResponse<Clan>>, ApiError> {
    let clan = state.clan_service.update(&tag, body(payload)?).await?;
    Ok(Json(
        SuccessResponse::new(clan).with_message("Clan updated successfully"),
    ))
}

pub async fn destroy_clan(
    Path(tag): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<SuccessResponse<()>>, ApiError> {
    state.clan_service.delete(&tag).await?;
    Ok(Json(SuccessResponse::message_only("Clan deleted successfully")))
}

pub async fn fetch_clan_from_api(
    Path(tag): Path<String>,
    State(state): State<AppState>,
) -> Result<Created<Clan>, ApiError> {
    let (clan, created) = state.clan_service.fetch_from_api(&tag).await?;
    let message = if created {
        "Clan fetched successfully from Clash of Clans API"
    } else {
        "Clan updated successfully from Clash of Clans API"
    };
    Ok((
        created_or_ok(created),
        Json(
            SuccessResponse::new(clan)
                .with_message(message)
                .fetched_now(),
        ),
    ))
}

/// Capital raid seasons of a clan, formatted for the dashboard
pub async fn get_capital_raids(
    Path(tag): Path<String>,
    Query(query): Query<RaidQuery>,
    State(state): State<AppState>,
) -> Result<Json<RaidResponse>, ApiError> {
    let params = query.validate()?;
    let resp = state.raid_service.get_capital_raids(&tag, &params).await?;
    Ok(Json(resp))
}

// ---------------------------------------------------------------------------
// Players
// ---------------------------------------------------------------------------

pub async fn list_players(
    State(state): State<AppState>,
) -> Result<Json<SuccessResponse<Vec<Player>>>, ApiError> {
    let players = state.player_service.list().await?;
    Ok(Json(SuccessResponse::new(players)))
}

pub async fn show_player(
    Path(tag): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<SuccessResponse<Player>>, ApiError> {
    let player = state.player_service.get(&tag).await?;
    Ok(Json(SuccessResponse::new(player)))
}

pub async fn store_player(
    State(state): State<AppState>,
    payload: Result<Json<NewPlayer>, JsonRejection>,
) -> Result<Created<Player>, ApiError> {
    let player = state.player_service.create(body(payload)?).await?;
    Ok((
        StatusCode::CREATED,
        Json(SuccessResponse::new(player).with_message("Player created successfully")),
    ))
}

pub async fn update_player(
    Path(tag): Path<String>,
    State(state): State<AppState>,
    payload: Result<Json<PlayerUpdate>, JsonRejection>,
) -> Result<Json<SuccessResponse<Player>>, ApiError> {
    let player = state.player_service.update(&tag, body(payload)?).await?;
    Ok(Json(
        SuccessResponse::new(player).with_message("Player updated successfully"),
    ))
}

pub async fn destroy_player(
    Path(tag): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<SuccessResponse<()>>, ApiError> {
    state.player_service.delete(&tag).await?;
    Ok(Json(SuccessResponse::message_only(
        "Player deleted successfully",
    )))
}

pub async fn create_dummy_player(
    State(state): State<AppState>,
) -> Result<Created<Player>, ApiError> {
    let player = state.player_service.create_dummy().await?;
    Ok((
        StatusCode::CREATED,
        Json(SuccessResponse::new(player).with_message("Dummy player created successfully")),
    ))
}

pub async fn fetch_player_from_api(
    Path(tag): Path<String>,
    State(state): State<AppState>,
) -> Result<Created<Player>, ApiError> {
    let (player, created) = state.player_service.fetch_from_api(&tag).await?;
    let message = if created {
        "Player fetched successfully from Clash of Clans API"
    } else {
        "Player updated successfully from Clash of Clans API"
    };
    Ok((
        created_or_ok(created),
        Json(SuccessResponse::new(player).with_message(message)),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_response_shape() {
        let json = serde_json::to_value(SuccessResponse::new(vec![1, 2])).unwrap();
        assert_eq!(json, serde_json::json!({"success": true, "data": [1, 2]}));
    }

    #[test]
    fn test_success_response_with_message_and_timestamp() {
        let resp = SuccessResponse::new("x")
            .with_message("Clan fetched successfully from Clash of Clans API")
            .fetched_now();
        let json = serde_json::to_value(resp).unwrap();
        assert_eq!(json["message"], "Clan fetched successfully from Clash of Clans API");
        assert!(json["fetched_at"].is_string());
    }

    #[test]
    fn test_message_only_has_no_data() {
        let json = serde_json::to_value(SuccessResponse::message_only("Clan deleted successfully"))
            .unwrap();
        assert_eq!(
            json,
            serde_json::json!({"success": true, "message": "Clan deleted successfully"})
        );
    }

    #[test]
    fn test_created_or_ok() {
        assert_eq!(created_or_ok(true), StatusCode::CREATED);
        assert_eq!(created_or_ok(false), StatusCode::OK);
    }
}
