/// Capital raid formatting: per-season overview metrics plus a ranked member table
use crate::domain::{
    FormattedMember, FormattedRaidSeason, RaidMember, RaidOverview, RaidPayload, RaidSeason,
};
use crate::errors::{ApiError, ApiResult};
use crate::utils::div_round;
use serde_json::Value;

/// Decode the raw upstream body. Missing fields read as zero, but a payload
/// without an `items` array or with mistyped fields rejects the whole request.
pub fn parse_raid_payload(raw: Value) -> ApiResult<RaidPayload> {
    serde_json::from_value(raw).map_err(|e| ApiError::UpstreamPayload(e.to_string()))
}

/// Seasons keep their upstream order. Members are ranked by loot, highest
/// first, with ties kept in upstream order.
pub fn format_capital_raids(seasons: &[RaidSeason]) -> Vec<FormattedRaidSeason> {
    seasons.iter().map(format_season).collect()
}

fn format_season(season: &RaidSeason) -> FormattedRaidSeason {
    let overview = RaidOverview {
        total_loot: season.capital_total_loot,
        total_attacks: season.total_attacks,
        raids_completed: season.raids_completed,
        enemy_districts_destroyed: season.enemy_districts_destroyed,
        avg_loot_per_raid: div_round(season.capital_total_loot, season.raids_completed),
        avg_loot_per_attack: div_round(season.capital_total_loot, season.total_attacks),
        offensive_reward: season.offensive_reward,
        defensive_reward: season.defensive_reward,
    };

    let mut members: Vec<FormattedMember> = season.members.iter().map(format_member).collect();
    // stable: equal loot keeps upstream order
    members.sort_by(|a, b| b.looted.cmp(&a.looted));

    FormattedRaidSeason {
        state: season.state.clone(),
        start_time: season.start_time.clone(),
        end_time: season.end_time.clone(),
        overview,
        members,
    }
}

fn format_member(member: &RaidMember) -> FormattedMember {
    let total_attack_limit = member.attack_limit.saturating_add(member.bonus_attack_limit);

    FormattedMember {
        tag: member.tag.clone(),
        name: member.name.clone(),
        looted: member.capital_resources_looted,
        attacks_used: member.attacks,
        attack_limit: member.attack_limit,
        bonus_attack_limit: member.bonus_attack_limit,
        total_attack_limit,
        hits: format!("{}/{}", member.attacks, total_attack_limit),
        attack_completion: div_round(member.attacks.saturating_mul(100), total_attack_limit),
        avg_loot_per_attack: div_round(member.capital_resources_looted, member.attacks),
    }
}
