/// Business logic services layer
use crate::clients::ClashClient;
use crate::domain::{
    Clan, ClanUpdate, Hero, NewClan, NewPlayer, Player, PlayerUpdate, RaidParams, RaidResponse,
    TOWN_HALL_MAX,
};
use crate::errors::{ApiError, ApiResult};
use crate::raids::{format_capital_raids, parse_raid_payload};
use crate::repo::{ClanRepo, PlayerRepo};
use crate::utils::{bool_or, i32_or, normalize_tag, s_at};
use chrono::Utc;
use rand::seq::IndexedRandom;
use rand::Rng;
use serde_json::{json, Value};
use std::sync::Arc;

/// Clan persistence and upstream sync
pub struct ClanService {
    repo: ClanRepo,
    client: Arc<ClashClient>,
}

impl ClanService {
    pub fn new(repo: ClanRepo, client: Arc<ClashClient>) -> Self {
        Self { repo, client }
    }

    pub async fn list(&self) -> ApiResult<Vec<Clan>> {
        self.repo.list().await
    }

    pub async fn get(&self, tag: &str) -> ApiResult<Clan> {
        self.repo
            .find_by_tag(&normalize_tag(tag))
            .await?
            .ok_or_else(|| ApiError::NotFound("Clan not found".into()))
    }

    pub async fn create(&self, mut clan: NewClan) -> ApiResult<Clan> {
        clan.tag = normalize_tag(&clan.tag);
        clan.validate()?;
        if self.repo.exists(&clan.tag).await? {
            return Err(ApiError::InvalidInput(
                "The tag has already been taken.".into(),
            ));
        }
        self.repo.insert(&clan).await
    }

    pub async fn update(&self, tag: &str, update: ClanUpdate) -> ApiResult<Clan> {
        let existing = self.get(tag).await?;
        let merged = update.apply(&existing);
        merged.validate()?;
        self.repo.update(&merged).await
    }

    pub async fn delete(&self, tag: &str) -> ApiResult<()> {
        if !self.repo.delete(&normalize_tag(tag)).await? {
            return Err(ApiError::NotFound("Clan not found".into()));
        }
        Ok(())
    }

    /// Insert the development demo clan unless it is already stored
    pub async fn seed_demo(&self) -> ApiResult<bool> {
        let clan = demo_clan();
        if self.repo.exists(&clan.tag).await? {
            return Ok(false);
        }
        self.repo.insert(&clan).await?;
        Ok(true)
    }

    /// Pull a clan from the Clash API and upsert it; the flag is true on insert
    pub async fn fetch_from_api(&self, tag: &str) -> ApiResult<(Clan, bool)> {
        let tag = normalize_tag(tag);
        let data = self
            .client
            .get_clan(&tag)
            .await?
            .ok_or_else(|| ApiError::NotFound("Clan not found in Clash of Clans API".into()))?;

        let attrs = clan_from_api(&data)?;
        if self.repo.exists(&attrs.tag).await? {
            Ok((self.repo.update(&attrs).await?, false))
        } else {
            Ok((self.repo.insert(&attrs).await?, true))
        }
    }
}

/// Map an upstream clan body onto stored clan attributes
pub fn clan_from_api(data: &Value) -> ApiResult<NewClan> {
    let tag = s_at(data, &["tag"])
        .ok_or_else(|| ApiError::UpstreamPayload("clan payload has no tag".into()))?;

    Ok(NewClan {
        tag: normalize_tag(&tag),
        name: s_at(data, &["name"]).unwrap_or_default(),
        clan_type: s_at(data, &["type"]).unwrap_or_default(),
        description: s_at(data, &["description"]),
        location_name: s_at(data, &["location", "name"]),
        is_family_friendly: bool_or(data, "isFamilyFriendly", false),
        badge_urls: data.get("badgeUrls").cloned().unwrap_or_else(|| json!({})),
        clan_level: i32_or(data, "clanLevel", 1),
        clan_points: i32_or(data, "clanPoints", 0),
        clan_builder_base_points: i32_or(data, "clanBuilderBasePoints", 0),
        clan_capital_points: i32_or(data, "clanCapitalPoints", 0),
        capital_league_name: s_at(data, &["capitalLeague", "name"]),
        required_trophies: i32_or(data, "requiredTrophies", 0),
        war_frequency: s_at(data, &["warFrequency"]),
        war_win_streak: i32_or(data, "warWinStreak", 0),
        war_wins: i32_or(data, "warWins", 0),
        war_ties: i32_or(data, "warTies", 0),
        war_losses: i32_or(data, "warLosses", 0),
        is_war_log_public: bool_or(data, "isWarLogPublic", true),
        war_league_name: s_at(data, &["warLeague", "name"]),
        members: i32_or(data, "members", 0),
        member_list: data.get("memberList").filter(|v| !v.is_null()).cloned(),
        clan_capital: data.get("clanCapital").filter(|v| !v.is_null()).cloned(),
        chat_language: s_at(data, &["chatLanguage", "name"]),
    })
}

/// Player persistence and upstream sync
pub struct PlayerService {
    repo: PlayerRepo,
    client: Arc<ClashClient>,
}

impl PlayerService {
    pub fn new(repo: PlayerRepo, client: Arc<ClashClient>) -> Self {
        Self { repo, client }
    }

    pub async fn list(&self) -> ApiResult<Vec<Player>> {
        self.repo.list().await
    }

    pub async fn get(&self, tag: &str) -> ApiResult<Player> {
        self.repo
            .find_by_tag(&normalize_tag(tag))
            .await?
            .ok_or_else(|| ApiError::NotFound("Player not found".into()))
    }

    pub async fn create(&self, mut player: NewPlayer) -> ApiResult<Player> {
        player.tag = normalize_tag(&player.tag);
        player.validate()?;
        if self.repo.exists(&player.tag).await? {
            return Err(ApiError::InvalidInput(
                "The tag has already been taken.".into(),
            ));
        }
        self.repo.insert(&player).await
    }

    pub async fn update(&self, tag: &str, update: PlayerUpdate) -> ApiResult<Player> {
        let existing = self.get(tag).await?;
        let merged = update.apply(&existing);
        merged.validate()?;
        self.repo.update(&merged).await
    }

    pub async fn delete(&self, tag: &str) -> ApiResult<()> {
        if !self.repo.delete(&normalize_tag(tag)).await? {
            return Err(ApiError::NotFound("Player not found".into()));
        }
        Ok(())
    }

    /// Insert a randomly generated demo player
    pub async fn create_dummy(&self) -> ApiResult<Player> {
        let player = dummy_player(&mut rand::rng());
        self.repo.insert(&player).await
    }

    pub async fn seed_demo(&self) -> ApiResult<bool> {
        let player = demo_player();
        if self.repo.exists(&player.tag).await? {
            return Ok(false);
        }
        self.repo.insert(&player).await?;
        Ok(true)
    }

    pub async fn fetch_from_api(&self, tag: &str) -> ApiResult<(Player, bool)> {
        let tag = normalize_tag(tag);
        let data = self
            .client
            .get_player(&tag)
            .await?
            .ok_or_else(|| ApiError::NotFound("Player not found in Clash of Clans API".into()))?;

        // key on the tag upstream reports, which is what the write binds
        let existing = self.repo.find_by_tag(&upstream_tag(&data)?).await?;
        let attrs = player_from_api(&data, existing.as_ref())?;
        match existing {
            Some(_) => Ok((self.repo.update(&attrs).await?, false)),
            None => Ok((self.repo.insert(&attrs).await?, true)),
        }
    }
}

/// Map an upstream player body onto stored player attributes. Clan details
/// are only overwritten when the player currently belongs to a clan.
pub fn player_from_api(data: &Value, existing: Option<&Player>) -> ApiResult<NewPlayer> {
    let tag = upstream_tag(data)?;

    let (clan_tag, clan_name, role) = match data.get("clan") {
        Some(clan) if clan.is_object() => (
            s_at(clan, &["tag"]).map(|t| normalize_tag(&t)),
            s_at(clan, &["name"]),
            Some(s_at(data, &["role"]).unwrap_or_else(|| "Member".to_string())),
        ),
        _ => match existing {
            Some(p) => (p.clan_tag.clone(), p.clan_name.clone(), p.role.clone()),
            None => (None, None, None),
        },
    };

    let heroes = match data.get("heroes").and_then(Value::as_array) {
        Some(list) => {
            let heroes: Vec<Hero> = list
                .iter()
                .map(|h| Hero {
                    name: s_at(h, &["name"]).unwrap_or_default(),
                    level: i32_or(h, "level", 0),
                    max_level: i32_or(h, "maxLevel", 0),
                })
                .collect();
            Some(serde_json::to_value(heroes).map_err(|e| ApiError::Internal(e.to_string()))?)
        }
        None => existing.and_then(|p| p.heroes.clone()),
    };

    Ok(NewPlayer {
        name: s_at(data, &["name"]).unwrap_or_default(),
        tag,
        town_hall_level: i32_or(data, "townHallLevel", 1),
        xp: i32_or(data, "expLevel", 1),
        trophies: i32_or(data, "trophies", 0),
        best_trophies: i32_or(data, "bestTrophies", 0),
        war_stars: i32_or(data, "warStars", 0),
        clan_tag,
        clan_name,
        role,
        heroes,
    })
}

/// Normalised tag of an upstream player body
pub fn upstream_tag(data: &Value) -> ApiResult<String> {
    s_at(data, &["tag"])
        .map(|t| normalize_tag(&t))
        .ok_or_else(|| ApiError::UpstreamPayload("player payload has no tag".into()))
}

const ROLES: [&str; 4] = ["Member", "Elder", "Co-leader", "Leader"];

pub fn dummy_player<R: Rng + ?Sized>(rng: &mut R) -> NewPlayer {
    let heroes = vec![
        Hero { name: "Barbarian King".into(), level: rng.random_range(1..=90), max_level: 90 },
        Hero { name: "Archer Queen".into(), level: rng.random_range(1..=90), max_level: 90 },
        Hero { name: "Grand Warden".into(), level: rng.random_range(1..=65), max_level: 65 },
    ];

    NewPlayer {
        name: format!("Chief {}", rng.random_range(1000..=9999)),
        tag: format!("DUMMY{}", rng.random_range(100_000..=999_999)),
        town_hall_level: rng.random_range(8..=TOWN_HALL_MAX),
        xp: rng.random_range(50..=300),
        trophies: rng.random_range(1000..=6000),
        best_trophies: rng.random_range(1500..=7000),
        war_stars: rng.random_range(100..=2000),
        clan_tag: Some(format!("CLAN{}", rng.random_range(10_000..=99_999))),
        clan_name: Some("Dummy Clan".into()),
        role: ROLES.choose(rng).map(|r| r.to_string()),
        heroes: serde_json::to_value(heroes).ok(),
    }
}

/// Fixed development clan
pub fn demo_clan() -> NewClan {
    NewClan {
        tag: "12345".into(),
        name: "Test Clan".into(),
        clan_type: "inviteOnly".into(),
        description: Some("This is a test clan for development purposes".into()),
        location_name: Some("International".into()),
        is_family_friendly: false,
        badge_urls: json!({
            "small": "https://api-assets.clashofclans.com/badges/70/test_small.png",
            "medium": "https://api-assets.clashofclans.com/badges/200/test_medium.png",
            "large": "https://api-assets.clashofclans.com/badges/512/test_large.png"
        }),
        clan_level: 10,
        clan_points: 25000,
        clan_builder_base_points: 15000,
        clan_capital_points: 12000,
        capital_league_name: Some("Capital League I".into()),
        required_trophies: 2000,
        war_frequency: Some("always".into()),
        war_win_streak: 5,
        war_wins: 150,
        war_ties: 10,
        war_losses: 50,
        is_war_log_public: false,
        war_league_name: Some("Master League I".into()),
        members: 35,
        member_list: Some(json!([
            {"tag": "QYPYRQV0", "name": "Raj", "role": "coLeader", "expLevel": 261,
             "trophies": 5639, "clanRank": 1, "previousClanRank": 1,
             "donations": 1500, "donationsReceived": 1200},
            {"tag": "98765", "name": "TestPlayer", "role": "member", "expLevel": 150,
             "trophies": 3200, "clanRank": 2, "previousClanRank": 3,
             "donations": 800, "donationsReceived": 1000}
        ])),
        clan_capital: Some(json!({
            "capitalHallLevel": 8,
            "districts": [
                {"name": "Capital Peak", "id": 0, "districtHallLevel": 8},
                {"name": "Barbarian Camp", "id": 1, "districtHallLevel": 7},
                {"name": "Wizard Valley", "id": 2, "districtHallLevel": 7}
            ]
        })),
        chat_language: Some("English".into()),
    }
}

/// Fixed development player
pub fn demo_player() -> NewPlayer {
    let heroes = [
        ("Barbarian King", 100),
        ("Archer Queen", 100),
        ("Grand Warden", 75),
        ("Battle Machine", 35),
        ("Royal Champion", 50),
        ("Battle Copter", 35),
        ("Minion Prince", 90),
    ]
    .into_iter()
    .map(|(name, level)| Hero { name: name.into(), level, max_level: level })
    .collect::<Vec<_>>();

    NewPlayer {
        name: "Clasher".into(),
        tag: "123".into(),
        town_hall_level: TOWN_HALL_MAX,
        xp: 261,
        trophies: 5639,
        best_trophies: 6008,
        war_stars: 3505,
        clan_tag: Some("9PLULVPC".into()),
        clan_name: Some("HOUSE OF POWER".into()),
        role: Some("coLeader".into()),
        heroes: serde_json::to_value(heroes).ok(),
    }
}

/// Capital raid pass-through with formatting
pub struct RaidService {
    client: Arc<ClashClient>,
}

impl RaidService {
    pub fn new(client: Arc<ClashClient>) -> Self {
        Self { client }
    }

    pub async fn get_capital_raids(
        &self,
        tag: &str,
        params: &RaidParams,
    ) -> ApiResult<RaidResponse> {
        let raw = self.client.get_capital_raids(tag, params).await;
        build_raid_response(unreachable_as_missing(raw)?)
    }
}

/// An upstream that cannot be reached or decoded counts as "no data"
fn unreachable_as_missing(raw: ApiResult<Option<Value>>) -> ApiResult<Option<Value>> {
    match raw {
        Err(ApiError::ExternalApi(e)) => {
            tracing::warn!(error = %e, "capital raid fetch failed");
            Ok(None)
        }
        other => other,
    }
}

/// Turn an upstream raid answer into the client envelope
pub fn build_raid_response(raw: Option<Value>) -> ApiResult<RaidResponse> {
    let raw = raw.ok_or_else(|| {
        ApiError::NotFound("Failed to fetch capital raid data or clan not found".into())
    })?;
    let payload = parse_raid_payload(raw)?;

    Ok(RaidResponse {
        success: true,
        data: format_capital_raids(&payload.items),
        paging: payload.paging,
        fetched_at: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_transport_failure_reads_as_missing() {
        let res = unreachable_as_missing(Ok(None));
        assert!(matches!(res, Ok(None)));

        let res = unreachable_as_missing(Err(ApiError::UpstreamPayload("x".into())));
        assert!(matches!(res, Err(ApiError::UpstreamPayload(_))));
    }

    #[tokio::test]
    async fn test_unreachable_upstream_answers_not_found() {
        let client = ClashClient::new(
            "http://127.0.0.1:1/v1",
            "token".into(),
            std::time::Duration::from_secs(2),
        )
        .unwrap();
        let service = RaidService::new(Arc::new(client));
        let params = RaidParams { limit: 1, cursor: None };

        match service.get_capital_raids("2PP", &params).await {
            Err(err @ ApiError::NotFound(_)) => {
                assert_eq!(err.status(), axum::http::StatusCode::NOT_FOUND);
                assert_eq!(
                    err.to_string(),
                    "Failed to fetch capital raid data or clan not found"
                );
            }
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_player_lookup_key_matches_written_tag() {
        // path tag may differ in case from what upstream reports
        let data = json!({"tag": "#P0LYJC8C", "name": "Chief", "townHallLevel": 14, "expLevel": 220});
        let key = upstream_tag(&data).unwrap();
        assert_eq!(key, "P0LYJC8C");
        assert_ne!(key, normalize_tag("p0lyjc8c"));
        assert_eq!(player_from_api(&data, None).unwrap().tag, key);
    }

    #[test]
    fn test_upstream_tag_missing() {
        assert!(matches!(
            upstream_tag(&json!({"name": "x"})),
            Err(ApiError::UpstreamPayload(_))
        ));
    }

    #[test]
    fn test_demo_records_are_valid() {
        let clan = demo_clan();
        assert!(clan.validate().is_ok());
        assert!(!clan.is_war_log_public);

        let player = demo_player();
        assert!(player.validate().is_ok());
        assert_eq!(player.heroes.as_ref().and_then(|h| h.as_array()).map(Vec::len), Some(7));
    }

    #[test]
    fn test_raid_response_not_found() {
        match build_raid_response(None) {
            Err(ApiError::NotFound(msg)) => {
                assert_eq!(msg, "Failed to fetch capital raid data or clan not found")
            }
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_raid_response_envelope() {
        let raw = json!({
            "items": [{
                "state": "ended",
                "startTime": "20240105T070000.000Z",
                "endTime": "20240108T070000.000Z",
                "capitalTotalLoot": 1000,
                "raidsCompleted": 4,
                "totalAttacks": 40,
                "enemyDistrictsDestroyed": 30,
                "offensiveReward": 600,
                "defensiveReward": 250,
                "members": [
                    {"tag": "#A", "name": "a", "capitalResourcesLooted": 500, "attacks": 5, "attackLimit": 5, "bonusAttackLimit": 0},
                    {"tag": "#B", "name": "b", "capitalResourcesLooted": 900, "attacks": 6, "attackLimit": 5, "bonusAttackLimit": 1}
                ]
            }],
            "paging": {"cursors": {"after": "eyJwb3MiOjF9"}}
        });

        let resp = build_raid_response(Some(raw)).unwrap();
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["paging"]["cursors"]["after"], "eyJwb3MiOjF9");
        assert_eq!(json["data"][0]["overview"]["avgLootPerRaid"], 250);
        assert_eq!(json["data"][0]["members"][0]["tag"], "#B");
        assert!(json["fetched_at"].is_string());
    }

    #[test]
    fn test_raid_response_without_paging_serializes_null() {
        let resp = build_raid_response(Some(json!({"items": []}))).unwrap();
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["data"], json!([]));
        assert!(json["paging"].is_null());
    }

    #[test]
    fn test_raid_response_rejects_malformed_payload() {
        let res = build_raid_response(Some(json!({"reason": "accessDenied"})));
        assert!(matches!(res, Err(ApiError::UpstreamPayload(_))));
    }

    #[test]
    fn test_clan_from_api_mapping() {
        let data = json!({
            "tag": "#2PP",
            "name": "Raiders",
            "type": "inviteOnly",
            "location": {"id": 32000094, "name": "Germany"},
            "badgeUrls": {"small": "s.png"},
            "clanLevel": 20,
            "clanPoints": 41000,
            "capitalLeague": {"name": "Master League I"},
            "warLeague": {"name": "Crystal League II"},
            "chatLanguage": {"name": "English"},
            "members": 48,
            "memberList": [{"tag": "#A"}]
        });
        let clan = clan_from_api(&data).unwrap();
        assert_eq!(clan.tag, "2PP");
        assert_eq!(clan.location_name.as_deref(), Some("Germany"));
        assert_eq!(clan.capital_league_name.as_deref(), Some("Master League I"));
        assert_eq!(clan.war_league_name.as_deref(), Some("Crystal League II"));
        assert_eq!(clan.chat_language.as_deref(), Some("English"));
        assert!(!clan.is_family_friendly);
        assert!(clan.is_war_log_public);
        assert_eq!(clan.war_wins, 0);
        assert_eq!(clan.members, 48);
        assert!(clan.clan_capital.is_none());
        assert!(clan.validate().is_ok());
    }

    #[test]
    fn test_clan_from_api_requires_tag() {
        assert!(clan_from_api(&json!({"name": "x"})).is_err());
    }

    #[test]
    fn test_player_from_api_with_clan() {
        let data = json!({
            "tag": "#P0LYJC8C",
            "name": "Chief",
            "townHallLevel": 14,
            "expLevel": 220,
            "trophies": 5000,
            "bestTrophies": 5400,
            "warStars": 1200,
            "clan": {"tag": "#2PP", "name": "Raiders"},
            "heroes": [{"name": "Barbarian King", "level": 80, "maxLevel": 90, "village": "home"}]
        });
        let player = player_from_api(&data, None).unwrap();
        assert_eq!(player.tag, "P0LYJC8C");
        assert_eq!(player.xp, 220);
        assert_eq!(player.clan_tag.as_deref(), Some("2PP"));
        assert_eq!(player.role.as_deref(), Some("Member"));
        assert_eq!(
            player.heroes,
            Some(json!([{"name": "Barbarian King", "level": 80, "maxLevel": 90}]))
        );
    }

    #[test]
    fn test_player_from_api_keeps_clan_when_clanless() {
        let existing = Player {
            id: 7,
            name: "Old".into(),
            tag: "P0LYJC8C".into(),
            town_hall_level: 13,
            xp: 200,
            trophies: 4000,
            best_trophies: 5000,
            war_stars: 1000,
            clan_tag: Some("2PP".into()),
            clan_name: Some("Raiders".into()),
            role: Some("Elder".into()),
            heroes: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let data = json!({"tag": "#P0LYJC8C", "name": "New", "townHallLevel": 14, "expLevel": 221});
        let player = player_from_api(&data, Some(&existing)).unwrap();
        assert_eq!(player.name, "New");
        assert_eq!(player.clan_tag.as_deref(), Some("2PP"));
        assert_eq!(player.role.as_deref(), Some("Elder"));
    }

    #[test]
    fn test_dummy_player_is_valid() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..50 {
            let player = dummy_player(&mut rng);
            assert!(player.validate().is_ok());
            assert!(player.tag.starts_with("DUMMY"));
            assert!(ROLES.contains(&player.role.as_deref().unwrap()));
        }
    }
}
