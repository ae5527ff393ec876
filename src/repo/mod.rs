/// Repository layer for database operations
use crate::domain::{Clan, NewClan, NewPlayer, Player};
use crate::errors::{ApiError, ApiResult};
use sqlx::PgPool;

const CLAN_COLUMNS: &str = "id, tag, name, type, description, location_name, is_family_friendly,
    badge_urls, clan_level, clan_points, clan_builder_base_points, clan_capital_points,
    capital_league_name, required_trophies, war_frequency, war_win_streak, war_wins, war_ties,
    war_losses, is_war_log_public, war_league_name, members, member_list, clan_capital,
    chat_language, created_at, updated_at";

const PLAYER_COLUMNS: &str = "id, name, tag, town_hall_level, xp, trophies, best_trophies,
    war_stars, clan_tag, clan_name, role, heroes, created_at, updated_at";

/// A duplicate tag that slipped past the `exists` check surfaces as a validation error
fn unique_violation(err: sqlx::Error) -> ApiError {
    let duplicate = matches!(
        &err,
        sqlx::Error::Database(db) if db.code().as_deref() == Some("23505")
    );
    if duplicate {
        ApiError::InvalidInput("The tag has already been taken.".into())
    } else {
        ApiError::Database(err)
    }
}

/// Clan repository
#[derive(Clone)]
pub struct ClanRepo {
    pool: PgPool,
}

impl ClanRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list(&self) -> ApiResult<Vec<Clan>> {
        let rows = sqlx::query_as::<_, Clan>(&format!(
            "SELECT {CLAN_COLUMNS} FROM clans ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn find_by_tag(&self, tag: &str) -> ApiResult<Option<Clan>> {
        let row = sqlx::query_as::<_, Clan>(&format!(
            "SELECT {CLAN_COLUMNS} FROM clans WHERE tag = $1"
        ))
        .bind(tag)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn exists(&self, tag: &str) -> ApiResult<bool> {
        let row = sqlx::query_as::<_, (bool,)>("SELECT EXISTS(SELECT 1 FROM clans WHERE tag = $1)")
            .bind(tag)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0)
    }

    pub async fn insert(&self, clan: &NewClan) -> ApiResult<Clan> {
        let row = sqlx::query_as::<_, Clan>(&format!(
            "INSERT INTO clans (tag, name, type, description, location_name, is_family_friendly,
                badge_urls, clan_level, clan_points, clan_builder_base_points, clan_capital_points,
                capital_league_name, required_trophies, war_frequency, war_win_streak, war_wins,
                war_ties, war_losses, is_war_log_public, war_league_name, members, member_list,
                clan_capital, chat_language)
             VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16,$17,$18,$19,$20,$21,$22,$23,$24)
             RETURNING {CLAN_COLUMNS}"
        ))
        .bind(&clan.tag)
        .bind(&clan.name)
        .bind(&clan.clan_type)
        .bind(&clan.description)
        .bind(&clan.location_name)
        .bind(clan.is_family_friendly)
        .bind(&clan.badge_urls)
        .bind(clan.clan_level)
        .bind(clan.clan_points)
        .bind(clan.clan_builder_base_points)
        .bind(clan.clan_capital_points)
        .bind(&clan.capital_league_name)
        .bind(clan.required_trophies)
        .bind(&clan.war_frequency)
        .bind(clan.war_win_streak)
        .bind(clan.war_wins)
        .bind(clan.war_ties)
        .bind(clan.war_losses)
        .bind(clan.is_war_log_public)
        .bind(&clan.war_league_name)
        .bind(clan.members)
        .bind(&clan.member_list)
        .bind(&clan.clan_capital)
        .bind(&clan.chat_language)
        .fetch_one(&self.pool)
        .await
        .map_err(unique_violation)?;
        Ok(row)
    }

    /// Overwrite every mutable column of the clan identified by `clan.tag`
    pub async fn update(&self, clan: &NewClan) -> ApiResult<Clan> {
        let row = sqlx::query_as::<_, Clan>(&format!(
            "UPDATE clans SET name=$2, type=$3, description=$4, location_name=$5,
                is_family_friendly=$6, badge_urls=$7, clan_level=$8, clan_points=$9,
                clan_builder_base_points=$10, clan_capital_points=$11, capital_league_name=$12,
                required_trophies=$13, war_frequency=$14, war_win_streak=$15, war_wins=$16,
                war_ties=$17, war_losses=$18, is_war_log_public=$19, war_league_name=$20,
                members=$21, member_list=$22, clan_capital=$23, chat_language=$24,
                updated_at=now()
             WHERE tag = $1
             RETURNING {CLAN_COLUMNS}"
        ))
        .bind(&clan.tag)
        .bind(&clan.name)
        .bind(&clan.clan_type)
        .bind(&clan.description)
        .bind(&clan.location_name)
        .bind(clan.is_family_friendly)
        .bind(&clan.badge_urls)
        .bind(clan.clan_level)
        .bind(clan.clan_points)
        .bind(clan.clan_builder_base_points)
        .bind(clan.clan_capital_points)
        .bind(&clan.capital_league_name)
        .bind(clan.required_trophies)
        .bind(&clan.war_frequency)
        .bind(clan.war_win_streak)
        .bind(clan.war_wins)
        .bind(clan.war_ties)
        .bind(clan.war_losses)
        .bind(clan.is_war_log_public)
        .bind(&clan.war_league_name)
        .bind(clan.members)
        .bind(&clan.member_list)
        .bind(&clan.clan_capital)
        .bind(&clan.chat_language)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    /// Returns whether a row was removed
    pub async fn delete(&self, tag: &str) -> ApiResult<bool> {
        let res = sqlx::query("DELETE FROM clans WHERE tag = $1")
            .bind(tag)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}

/// Player repository
#[derive(Clone)]
pub struct PlayerRepo {
    pool: PgPool,
}

impl PlayerRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list(&self) -> ApiResult<Vec<Player>> {
        let rows = sqlx::query_as::<_, Player>(&format!(
            "SELECT {PLAYER_COLUMNS} FROM players ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn find_by_tag(&self, tag: &str) -> ApiResult<Option<Player>> {
        let row = sqlx::query_as::<_, Player>(&format!(
            "SELECT {PLAYER_COLUMNS} FROM players WHERE tag = $1"
        ))
        .bind(tag)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn exists(&self, tag: &str) -> ApiResult<bool> {
        let row =
            sqlx::query_as::<_, (bool,)>("SELECT EXISTS(SELECT 1 FROM players WHERE tag = $1)")
                .bind(tag)
                .fetch_one(&self.pool)
                .await?;
        Ok(row.0)
    }

    pub async fn insert(&self, player: &NewPlayer) -> ApiResult<Player> {
        let row = sqlx::query_as::<_, Player>(&format!(
            "INSERT INTO players (name, tag, town_hall_level, xp, trophies, best_trophies,
                war_stars, clan_tag, clan_name, role, heroes)
             VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11)
             RETURNING {PLAYER_COLUMNS}"
        ))
        .bind(&player.name)
        .bind(&player.tag)
        .bind(player.town_hall_level)
        .bind(player.xp)
        .bind(player.trophies)
        .bind(player.best_trophies)
        .bind(player.war_stars)
        .bind(&player.clan_tag)
        .bind(&player.clan_name)
        .bind(&player.role)
        .bind(&player.heroes)
        .fetch_one(&self.pool)
        .await
        .map_err(unique_violation)?;
        Ok(row)
    }

    pub async fn update(&self, player: &NewPlayer) -> ApiResult<Player> {
        let row = sqlx::query_as::<_, Player>(&format!(
            "UPDATE players SET name=$1, town_hall_level=$3, xp=$4, trophies=$5,
                best_trophies=$6, war_stars=$7, clan_tag=$8, clan_name=$9, role=$10, heroes=$11,
                updated_at=now()
             WHERE tag = $2
             RETURNING {PLAYER_COLUMNS}"
        ))
        .bind(&player.name)
        .bind(&player.tag)
        .bind(player.town_hall_level)
        .bind(player.xp)
        .bind(player.trophies)
        .bind(player.best_trophies)
        .bind(player.war_stars)
        .bind(&player.clan_tag)
        .bind(&player.clan_name)
        .bind(&player.role)
        .bind(&player.heroes)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn delete(&self, tag: &str) -> ApiResult<bool> {
        let res = sqlx::query("DELETE FROM players WHERE tag = $1")
            .bind(tag)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}

/// Initialize database tables
pub async fn init_db(pool: &PgPool) -> ApiResult<()> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS clans(
            id BIGSERIAL PRIMARY KEY,
            tag TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            type TEXT NOT NULL,
            description TEXT,
            location_name TEXT,
            is_family_friendly BOOLEAN NOT NULL DEFAULT false,
            badge_urls JSONB NOT NULL,
            clan_level INTEGER NOT NULL,
            clan_points INTEGER NOT NULL DEFAULT 0,
            clan_builder_base_points INTEGER NOT NULL DEFAULT 0,
            clan_capital_points INTEGER NOT NULL DEFAULT 0,
            capital_league_name TEXT,
            required_trophies INTEGER NOT NULL DEFAULT 0,
            war_frequency TEXT,
            war_win_streak INTEGER NOT NULL DEFAULT 0,
            war_wins INTEGER NOT NULL DEFAULT 0,
            war_ties INTEGER NOT NULL DEFAULT 0,
            war_losses INTEGER NOT NULL DEFAULT 0,
            is_war_log_public BOOLEAN NOT NULL DEFAULT true,
            war_league_name TEXT,
            members INTEGER NOT NULL DEFAULT 0,
            member_list JSONB,
            clan_capital JSONB,
            chat_language TEXT,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS players(
            id BIGSERIAL PRIMARY KEY,
            name TEXT NOT NULL,
            tag TEXT NOT NULL UNIQUE,
            town_hall_level INTEGER NOT NULL,
            xp INTEGER NOT NULL,
            trophies INTEGER NOT NULL DEFAULT 0,
            best_trophies INTEGER NOT NULL DEFAULT 0,
            war_stars INTEGER NOT NULL DEFAULT 0,
            clan_tag TEXT,
            clan_name TEXT,
            role TEXT,
            heroes JSONB,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )",
    )
    .execute(pool)
    .await?;

    Ok(())
}
