/// Domain models for the application
use crate::errors::{ApiError, ApiResult};
use crate::utils::double_option;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Capital raids: upstream shapes
// ---------------------------------------------------------------------------

/// Body of `GET /clans/{tag}/capitalraidseasons`
#[derive(Debug, Clone, Deserialize)]
pub struct RaidPayload {
    pub items: Vec<RaidSeason>,
    #[serde(default)]
    pub paging: Option<Value>,
}

/// One raid weekend. Absent fields read as zero / empty.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RaidSeason {
    pub state: String,
    pub start_time: String,
    pub end_time: String,
    pub capital_total_loot: u64,
    pub total_attacks: u64,
    pub raids_completed: u64,
    pub enemy_districts_destroyed: u64,
    pub offensive_reward: u64,
    pub defensive_reward: u64,
    pub members: Vec<RaidMember>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RaidMember {
    pub tag: String,
    pub name: String,
    pub capital_resources_looted: u64,
    pub attacks: u64,
    pub attack_limit: u64,
    pub bonus_attack_limit: u64,
}

// ---------------------------------------------------------------------------
// Capital raids: client-facing shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormattedRaidSeason {
    pub state: String,
    pub start_time: String,
    pub end_time: String,
    pub overview: RaidOverview,
    pub members: Vec<FormattedMember>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RaidOverview {
    pub total_loot: u64,
    pub total_attacks: u64,
    pub raids_completed: u64,
    pub enemy_districts_destroyed: u64,
    pub avg_loot_per_raid: u64,
    pub avg_loot_per_attack: u64,
    pub offensive_reward: u64,
    pub defensive_reward: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormattedMember {
    pub tag: String,
    pub name: String,
    pub looted: u64,
    pub attacks_used: u64,
    pub attack_limit: u64,
    pub bonus_attack_limit: u64,
    pub total_attack_limit: u64,
    pub hits: String,
    /// Percentage of allowed attacks used; 0 when no attacks were allowed
    pub attack_completion: u64,
    pub avg_loot_per_attack: u64,
}

/// Raid endpoint envelope
#[derive(Debug, Serialize)]
pub struct RaidResponse {
    pub success: bool,
    pub data: Vec<FormattedRaidSeason>,
    pub paging: Option<Value>,
    pub fetched_at: DateTime<Utc>,
}

/// Raw query string of the raid endpoint
#[derive(Debug, Default, Deserialize)]
pub struct RaidQuery {
    pub limit: Option<String>,
    pub after: Option<String>,
    pub before: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cursor {
    After(String),
    Before(String),
}

/// Validated raid paging options forwarded upstream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RaidParams {
    pub limit: u8,
    pub cursor: Option<Cursor>,
}

pub const RAID_LIMIT_MAX: u8 = 25;

impl RaidQuery {
    pub fn validate(self) -> ApiResult<RaidParams> {
        let limit = match self.limit.as_deref().map(str::trim) {
            None | Some("") => 1,
            Some(raw) => {
                let n: i64 = raw.parse().map_err(|_| {
                    ApiError::InvalidInput("The limit field must be an integer.".into())
                })?;
                if !(1..=RAID_LIMIT_MAX as i64).contains(&n) {
                    return Err(ApiError::InvalidInput(format!(
                        "The limit field must be between 1 and {}.",
                        RAID_LIMIT_MAX
                    )));
                }
                n as u8
            }
        };

        // `after` takes precedence when both cursors are supplied
        let cursor = match (non_empty(self.after), non_empty(self.before)) {
            (Some(after), _) => Some(Cursor::After(after)),
            (None, Some(before)) => Some(Cursor::Before(before)),
            (None, None) => None,
        };

        Ok(RaidParams { limit, cursor })
    }
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.filter(|s| !s.is_empty())
}

// ---------------------------------------------------------------------------
// Persisted records
// ---------------------------------------------------------------------------

/// Stored clan
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Clan {
    pub id: i64,
    pub tag: String,
    pub name: String,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub clan_type: String,
    pub description: Option<String>,
    pub location_name: Option<String>,
    pub is_family_friendly: bool,
    pub badge_urls: Value,
    pub clan_level: i32,
    pub clan_points: i32,
    pub clan_builder_base_points: i32,
    pub clan_capital_points: i32,
    pub capital_league_name: Option<String>,
    pub required_trophies: i32,
    pub war_frequency: Option<String>,
    pub war_win_streak: i32,
    pub war_wins: i32,
    pub war_ties: i32,
    pub war_losses: i32,
    pub is_war_log_public: bool,
    pub war_league_name: Option<String>,
    pub members: i32,
    pub member_list: Option<Value>,
    pub clan_capital: Option<Value>,
    pub chat_language: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Full clan attribute set, used for creation and as the write model of updates
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewClan {
    pub tag: String,
    pub name: String,
    #[serde(rename = "type")]
    pub clan_type: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location_name: Option<String>,
    #[serde(default)]
    pub is_family_friendly: bool,
    pub badge_urls: Value,
    pub clan_level: i32,
    #[serde(default)]
    pub clan_points: i32,
    #[serde(default)]
    pub clan_builder_base_points: i32,
    #[serde(default)]
    pub clan_capital_points: i32,
    #[serde(default)]
    pub capital_league_name: Option<String>,
    #[serde(default)]
    pub required_trophies: i32,
    #[serde(default)]
    pub war_frequency: Option<String>,
    #[serde(default)]
    pub war_win_streak: i32,
    #[serde(default)]
    pub war_wins: i32,
    #[serde(default)]
    pub war_ties: i32,
    #[serde(default)]
    pub war_losses: i32,
    #[serde(default = "default_true")]
    pub is_war_log_public: bool,
    #[serde(default)]
    pub war_league_name: Option<String>,
    #[serde(default)]
    pub members: i32,
    #[serde(default)]
    pub member_list: Option<Value>,
    #[serde(default)]
    pub clan_capital: Option<Value>,
    #[serde(default)]
    pub chat_language: Option<String>,
}

fn default_true() -> bool {
    true
}

impl NewClan {
    pub fn validate(&self) -> ApiResult<()> {
        required("tag", &self.tag)?;
        required("name", &self.name)?;
        required("type", &self.clan_type)?;
        for (field, value) in [
            ("location_name", self.location_name.as_deref()),
            ("capital_league_name", self.capital_league_name.as_deref()),
            ("war_frequency", self.war_frequency.as_deref()),
            ("war_league_name", self.war_league_name.as_deref()),
            ("chat_language", self.chat_language.as_deref()),
        ] {
            max_len(field, value, MAX_STRING)?;
        }
        json_collection("badge_urls", Some(&self.badge_urls))?;
        json_collection("member_list", self.member_list.as_ref())?;
        json_collection("clan_capital", self.clan_capital.as_ref())?;
        at_least("clan_level", self.clan_level, 1)?;
        for (field, value) in [
            ("clan_points", self.clan_points),
            ("clan_builder_base_points", self.clan_builder_base_points),
            ("clan_capital_points", self.clan_capital_points),
            ("required_trophies", self.required_trophies),
            ("war_win_streak", self.war_win_streak),
            ("war_wins", self.war_wins),
            ("war_ties", self.war_ties),
            ("war_losses", self.war_losses),
            ("members", self.members),
        ] {
            at_least(field, value, 0)?;
        }
        Ok(())
    }
}

/// Partial clan update; the tag is immutable
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClanUpdate {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub clan_type: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub location_name: Option<Option<String>>,
    pub is_family_friendly: Option<bool>,
    pub badge_urls: Option<Value>,
    pub clan_level: Option<i32>,
    pub clan_points: Option<i32>,
    pub clan_builder_base_points: Option<i32>,
    pub clan_capital_points: Option<i32>,
    #[serde(default, deserialize_with = "double_option")]
    pub capital_league_name: Option<Option<String>>,
    pub required_trophies: Option<i32>,
    #[serde(default, deserialize_with = "double_option")]
    pub war_frequency: Option<Option<String>>,
    pub war_win_streak: Option<i32>,
    pub war_wins: Option<i32>,
    pub war_ties: Option<i32>,
    pub war_losses: Option<i32>,
    pub is_war_log_public: Option<bool>,
    #[serde(default, deserialize_with = "double_option")]
    pub war_league_name: Option<Option<String>>,
    pub members: Option<i32>,
    #[serde(default, deserialize_with = "double_option")]
    pub member_list: Option<Option<Value>>,
    #[serde(default, deserialize_with = "double_option")]
    pub clan_capital: Option<Option<Value>>,
    #[serde(default, deserialize_with = "double_option")]
    pub chat_language: Option<Option<String>>,
}

impl ClanUpdate {
    /// Overlay the supplied fields on an existing clan
    pub fn apply(self, clan: &Clan) -> NewClan {
        NewClan {
            tag: clan.tag.clone(),
            name: self.name.unwrap_or_else(|| clan.name.clone()),
            clan_type: self.clan_type.unwrap_or_else(|| clan.clan_type.clone()),
            description: self.description.unwrap_or_else(|| clan.description.clone()),
            location_name: self.location_name.unwrap_or_else(|| clan.location_name.clone()),
            is_family_friendly: self.is_family_friendly.unwrap_or(clan.is_family_friendly),
            badge_urls: self.badge_urls.unwrap_or_else(|| clan.badge_urls.clone()),
            clan_level: self.clan_level.unwrap_or(clan.clan_level),
            clan_points: self.clan_points.unwrap_or(clan.clan_points),
            clan_builder_base_points: self
                .clan_builder_base_points
                .unwrap_or(clan.clan_builder_base_points),
            clan_capital_points: self.clan_capital_points.unwrap_or(clan.clan_capital_points),
            capital_league_name: self
                .capital_league_name
                .unwrap_or_else(|| clan.capital_league_name.clone()),
            required_trophies: self.required_trophies.unwrap_or(clan.required_trophies),
            war_frequency: self.war_frequency.unwrap_or_else(|| clan.war_frequency.clone()),
            war_win_streak: self.war_win_streak.unwrap_or(clan.war_win_streak),
            war_wins: self.war_wins.unwrap_or(clan.war_wins),
            war_ties: self.war_ties.unwrap_or(clan.war_ties),
            war_losses: self.war_losses.unwrap_or(clan.war_losses),
            is_war_log_public: self.is_war_log_public.unwrap_or(clan.is_war_log_public),
            war_league_name: self
                .war_league_name
                .unwrap_or_else(|| clan.war_league_name.clone()),
            members: self.members.unwrap_or(clan.members),
            member_list: self.member_list.unwrap_or_else(|| clan.member_list.clone()),
            clan_capital: self.clan_capital.unwrap_or_else(|| clan.clan_capital.clone()),
            chat_language: self.chat_language.unwrap_or_else(|| clan.chat_language.clone()),
        }
    }
}

/// Stored player
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Player {
    pub id: i64,
    pub name: String,
    pub tag: String,
    pub town_hall_level: i32,
    pub xp: i32,
    pub trophies: i32,
    pub best_trophies: i32,
    pub war_stars: i32,
    pub clan_tag: Option<String>,
    pub clan_name: Option<String>,
    pub role: Option<String>,
    pub heroes: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hero {
    pub name: String,
    pub level: i32,
    #[serde(rename = "maxLevel")]
    pub max_level: i32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewPlayer {
    pub name: String,
    pub tag: String,
    pub town_hall_level: i32,
    pub xp: i32,
    #[serde(default)]
    pub trophies: i32,
    #[serde(default)]
    pub best_trophies: i32,
    #[serde(default)]
    pub war_stars: i32,
    #[serde(default)]
    pub clan_tag: Option<String>,
    #[serde(default)]
    pub clan_name: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub heroes: Option<Value>,
}

pub const TOWN_HALL_MAX: i32 = 15;

impl NewPlayer {
    pub fn validate(&self) -> ApiResult<()> {
        required("name", &self.name)?;
        required("tag", &self.tag)?;
        for (field, value) in [
            ("clan_tag", self.clan_tag.as_deref()),
            ("clan_name", self.clan_name.as_deref()),
            ("role", self.role.as_deref()),
        ] {
            max_len(field, value, MAX_STRING)?;
        }
        between("town_hall_level", self.town_hall_level, 1, TOWN_HALL_MAX)?;
        at_least("xp", self.xp, 1)?;
        at_least("trophies", self.trophies, 0)?;
        at_least("best_trophies", self.best_trophies, 0)?;
        at_least("war_stars", self.war_stars, 0)?;
        json_collection("heroes", self.heroes.as_ref())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlayerUpdate {
    pub name: Option<String>,
    pub town_hall_level: Option<i32>,
    pub xp: Option<i32>,
    pub trophies: Option<i32>,
    pub best_trophies: Option<i32>,
    pub war_stars: Option<i32>,
    #[serde(default, deserialize_with = "double_option")]
    pub clan_tag: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub clan_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub role: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub heroes: Option<Option<Value>>,
}

impl PlayerUpdate {
    pub fn apply(self, player: &Player) -> NewPlayer {
        NewPlayer {
            name: self.name.unwrap_or_else(|| player.name.clone()),
            tag: player.tag.clone(),
            town_hall_level: self.town_hall_level.unwrap_or(player.town_hall_level),
            xp: self.xp.unwrap_or(player.xp),
            trophies: self.trophies.unwrap_or(player.trophies),
            best_trophies: self.best_trophies.unwrap_or(player.best_trophies),
            war_stars: self.war_stars.unwrap_or(player.war_stars),
            clan_tag: self.clan_tag.unwrap_or_else(|| player.clan_tag.clone()),
            clan_name: self.clan_name.unwrap_or_else(|| player.clan_name.clone()),
            role: self.role.unwrap_or_else(|| player.role.clone()),
            heroes: self.heroes.unwrap_or_else(|| player.heroes.clone()),
        }
    }
}

/// Health check response
#[derive(Serialize)]
pub struct Health {
    pub status: &'static str,
    pub now: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Validation rules
// ---------------------------------------------------------------------------

const MAX_STRING: usize = 255;

fn required(field: &str, value: &str) -> ApiResult<()> {
    if value.trim().is_empty() {
        return Err(ApiError::InvalidInput(format!("The {field} field is required.")));
    }
    max_len(field, Some(value), MAX_STRING)
}

fn max_len(field: &str, value: Option<&str>, max: usize) -> ApiResult<()> {
    match value {
        Some(v) if v.chars().count() > max => Err(ApiError::InvalidInput(format!(
            "The {field} field must not be greater than {max} characters."
        ))),
        _ => Ok(()),
    }
}

fn at_least(field: &str, value: i32, min: i32) -> ApiResult<()> {
    if value < min {
        return Err(ApiError::InvalidInput(format!(
            "The {field} field must be at least {min}."
        )));
    }
    Ok(())
}

fn between(field: &str, value: i32, min: i32, max: i32) -> ApiResult<()> {
    if !(min..=max).contains(&value) {
        return Err(ApiError::InvalidInput(format!(
            "The {field} field must be between {min} and {max}."
        )));
    }
    Ok(())
}

fn json_collection(field: &str, value: Option<&Value>) -> ApiResult<()> {
    match value {
        None | Some(Value::Null) | Some(Value::Array(_)) | Some(Value::Object(_)) => Ok(()),
        Some(_) => Err(ApiError::InvalidInput(format!(
            "The {field} field must be an array."
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn query(limit: Option<&str>, after: Option<&str>, before: Option<&str>) -> RaidQuery {
        RaidQuery {
            limit: limit.map(String::from),
            after: after.map(String::from),
            before: before.map(String::from),
        }
    }

    fn new_clan() -> NewClan {
        serde_json::from_value(json!({
            "tag": "2PP",
            "name": "Raiders",
            "type": "open",
            "badge_urls": {"small": "https://example.invalid/s.png"},
            "clan_level": 12
        }))
        .unwrap()
    }

    fn stored_player() -> Player {
        Player {
            id: 1,
            name: "Chief".into(),
            tag: "P0LYJC8C".into(),
            town_hall_level: 14,
            xp: 220,
            trophies: 5000,
            best_trophies: 5400,
            war_stars: 1200,
            clan_tag: Some("2PP".into()),
            clan_name: Some("Raiders".into()),
            role: Some("Elder".into()),
            heroes: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_raid_query_default_limit() {
        let params = RaidQuery::default().validate().unwrap();
        assert_eq!(params, RaidParams { limit: 1, cursor: None });
    }

    #[test]
    fn test_raid_query_limit_bounds() {
        assert_eq!(query(Some("25"), None, None).validate().unwrap().limit, 25);
        assert!(query(Some("0"), None, None).validate().is_err());
        assert!(query(Some("26"), None, None).validate().is_err());
        assert!(query(Some("ten"), None, None).validate().is_err());
    }

    #[test]
    fn test_raid_query_after_wins_over_before() {
        let params = query(Some("3"), Some("abc"), Some("xyz")).validate().unwrap();
        assert_eq!(params.cursor, Some(Cursor::After("abc".into())));

        let params = query(None, None, Some("xyz")).validate().unwrap();
        assert_eq!(params.cursor, Some(Cursor::Before("xyz".into())));
    }

    #[test]
    fn test_raid_payload_missing_fields_default_to_zero() {
        let payload: RaidPayload = serde_json::from_value(json!({
            "items": [{"state": "ended", "members": [{"tag": "#A"}]}]
        }))
        .unwrap();
        let season = &payload.items[0];
        assert_eq!(season.capital_total_loot, 0);
        assert_eq!(season.members[0].attack_limit, 0);
        assert!(payload.paging.is_none());
    }

    #[test]
    fn test_raid_payload_rejects_non_integer_loot() {
        let res: Result<RaidPayload, _> = serde_json::from_value(json!({
            "items": [{"capitalTotalLoot": "lots"}]
        }));
        assert!(res.is_err());
    }

    #[test]
    fn test_new_clan_defaults() {
        let clan = new_clan();
        assert!(clan.is_war_log_public);
        assert!(!clan.is_family_friendly);
        assert_eq!(clan.members, 0);
        assert!(clan.validate().is_ok());
    }

    #[test]
    fn test_new_clan_rules() {
        let mut clan = new_clan();
        clan.clan_level = 0;
        assert!(clan.validate().is_err());

        let mut clan = new_clan();
        clan.name = "x".repeat(256);
        assert!(clan.validate().is_err());

        let mut clan = new_clan();
        clan.badge_urls = json!("not-a-map");
        assert!(clan.validate().is_err());

        let mut clan = new_clan();
        clan.war_wins = -1;
        assert!(clan.validate().is_err());
    }

    #[test]
    fn test_new_player_rules() {
        let player: NewPlayer = serde_json::from_value(json!({
            "name": "Chief", "tag": "ABC", "town_hall_level": 16, "xp": 10
        }))
        .unwrap();
        assert!(player.validate().is_err());

        let player = NewPlayer { town_hall_level: 15, ..player };
        assert!(player.validate().is_ok());

        let player = NewPlayer { xp: 0, ..player };
        assert!(player.validate().is_err());
    }

    #[test]
    fn test_player_update_clears_and_keeps() {
        let update: PlayerUpdate =
            serde_json::from_value(json!({"trophies": 5100, "clan_tag": null, "clan_name": null}))
                .unwrap();
        let merged = update.apply(&stored_player());
        assert_eq!(merged.trophies, 5100);
        assert_eq!(merged.clan_tag, None);
        assert_eq!(merged.clan_name, None);
        assert_eq!(merged.role.as_deref(), Some("Elder"));
        assert_eq!(merged.tag, "P0LYJC8C");
    }
}
