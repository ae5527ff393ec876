/// Utility functions
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Strip any leading `#` from a clan or player tag
pub fn normalize_tag(tag: &str) -> String {
    tag.trim().trim_start_matches('#').to_string()
}

/// Integer division rounded half away from zero; a zero divisor yields 0
pub fn div_round(numerator: u64, divisor: u64) -> u64 {
    if divisor == 0 {
        return 0;
    }
    let n = numerator as u128;
    let d = divisor as u128;
    ((2 * n + d) / (2 * d)) as u64
}

/// Follow a path of object keys and return the string found there
pub fn s_at(v: &Value, path: &[&str]) -> Option<String> {
    let mut cur = v;
    for k in path {
        cur = cur.get(*k)?;
    }
    cur.as_str().map(str::to_string)
}

/// Integer field as i32, falling back to `default` when absent or out of range
pub fn i32_or(v: &Value, key: &str, default: i32) -> i32 {
    v.get(key)
        .and_then(Value::as_i64)
        .and_then(|n| i32::try_from(n).ok())
        .unwrap_or(default)
}

pub fn bool_or(v: &Value, key: &str, default: bool) -> bool {
    v.get(key).and_then(Value::as_bool).unwrap_or(default)
}

/// Distinguish an absent field (`None`) from an explicit `null` (`Some(None)`)
pub fn double_option<'de, D, T>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(de).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_tag_strips_hash() {
        assert_eq!(normalize_tag("#2PP"), "2PP");
        assert_eq!(normalize_tag("2PP"), "2PP");
        assert_eq!(normalize_tag(" ##2PP "), "2PP");
    }

    #[test]
    fn test_div_round_half_up() {
        assert_eq!(div_round(1000, 4), 250);
        assert_eq!(div_round(12345, 100), 123);
        assert_eq!(div_round(5, 2), 3);
        assert_eq!(div_round(400, 6), 67);
    }

    #[test]
    fn test_div_round_zero_divisor() {
        assert_eq!(div_round(1000, 0), 0);
        assert_eq!(div_round(0, 0), 0);
    }

    #[test]
    fn test_div_round_large_values() {
        assert_eq!(div_round(u64::MAX, 1), u64::MAX);
    }

    #[test]
    fn test_s_at_nested() {
        let json = serde_json::json!({"location": {"name": "Germany"}});
        assert_eq!(s_at(&json, &["location", "name"]), Some("Germany".to_string()));
        assert_eq!(s_at(&json, &["warLeague", "name"]), None);
    }

    #[test]
    fn test_i32_or_default() {
        let json = serde_json::json!({"clanPoints": 41000, "big": 9_000_000_000i64});
        assert_eq!(i32_or(&json, "clanPoints", 0), 41000);
        assert_eq!(i32_or(&json, "warWins", 0), 0);
        assert_eq!(i32_or(&json, "big", 7), 7);
    }

    #[test]
    fn test_bool_or_default() {
        let json = serde_json::json!({"isFamilyFriendly": true});
        assert!(bool_or(&json, "isFamilyFriendly", false));
        assert!(bool_or(&json, "isWarLogPublic", true));
    }

    #[test]
    fn test_double_option() {
        #[derive(Deserialize)]
        struct Patch {
            #[serde(default, deserialize_with = "double_option")]
            role: Option<Option<String>>,
        }

        let absent: Patch = serde_json::from_str("{}").unwrap();
        let null: Patch = serde_json::from_str(r#"{"role": null}"#).unwrap();
        let set: Patch = serde_json::from_str(r#"{"role": "Elder"}"#).unwrap();
        assert_eq!(absent.role, None);
        assert_eq!(null.role, Some(None));
        assert_eq!(set.role, Some(Some("Elder".to_string())));
    }
}
