//! Defensive re-normalization of authored card documents.
//!
//! Card documents arrive from an authoring pipeline whose output is mostly
//! right. Rather than reject a whole card over one bad field, normalization
//! repairs what it can:
//!
//! - op tags are matched case-insensitively (`Damage`, `add_marker`, `ADDMARKER`)
//! - common field misspellings are mapped (`marker` → `name`, `duration` →
//!   `turns`, `target_stat` → `stat`, `condition` → `cond`, `probability` →
//!   `chance`)
//! - a missing `target` gets the default for the op
//! - ops with an unknown tag or an unusable payload are dropped one by one
//! - branches nested past [`MAX_NESTING_DEPTH`] are cut off
//!
//! A card is only rejected when it is not an object, when no op survives, or
//! when the card-level fields themselves do not parse.

use serde_json::{Map, Value as Json};
use thiserror::Error;
use tracing::warn;

use super::definition::{Card, MAX_KEYWORDS, MAX_OPS_PER_CARD};
use crate::effects::{default_target_for, Op, MAX_NESTING_DEPTH};

/// Card-level errors from normalization and the registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CardError {
    #[error("card document is not a JSON object")]
    NotAnObject,

    #[error("malformed card: {0}")]
    Malformed(String),

    #[error("card {0} has no valid ops")]
    NoValidOps(String),

    #[error("duplicate card id: {0}")]
    Duplicate(String),

    #[error("unknown card id: {0}")]
    Unknown(String),

    #[error("card {0} is blocked")]
    Blocked(String),
}

/// Normalize and parse one card document.
///
/// ```
/// use card_battle::cards::normalize_card;
/// use card_battle::effects::TargetSpec;
///
/// let doc = serde_json::json!({
///     "id": "c1",
///     "name": "Ember",
///     "dsl": [{"op": "Damage", "amount": 4}],
/// });
/// let card = normalize_card(doc).unwrap();
/// assert_eq!(card.ops[0].target(), Some(&TargetSpec::Enemy));
/// ```
pub fn normalize_card(doc: Json) -> Result<Card, CardError> {
    let Json::Object(mut doc) = doc else {
        return Err(CardError::NotAnObject);
    };

    rename(&mut doc, "dsl", "ops");
    rename(&mut doc, "ownerUid", "ownerId");
    rename(&mut doc, "cooldownTurns", "cooldown");
    rename(&mut doc, "cardType", "type");

    let id = match doc.get("id") {
        Some(Json::String(s)) => s.clone(),
        Some(Json::Number(n)) => n.to_string(),
        _ => return Err(CardError::Malformed("missing id".into())),
    };
    doc.insert("id".into(), Json::String(id.clone()));

    let raw_ops = match doc.remove("ops") {
        Some(Json::Array(ops)) => ops,
        Some(single @ Json::Object(_)) => vec![single],
        _ => Vec::new(),
    };
    let mut ops = normalize_ops(raw_ops, 1, &id);
    if ops.is_empty() {
        return Err(CardError::NoValidOps(id));
    }
    if ops.len() > MAX_OPS_PER_CARD {
        warn!(card = %id, count = ops.len(), "truncating op list");
        ops.truncate(MAX_OPS_PER_CARD);
    }
    doc.insert("ops".into(), Json::Array(Vec::new()));

    if let Some(Json::Array(keywords)) = doc.get_mut("keywords") {
        keywords.retain(Json::is_string);
        keywords.truncate(MAX_KEYWORDS);
    }
    clamp_non_negative(&mut doc, "cost");
    clamp_non_negative(&mut doc, "cooldown");
    if !doc.contains_key("name") {
        doc.insert("name".into(), Json::String(id.clone()));
    }

    let mut card: Card = serde_json::from_value(Json::Object(doc)).map_err(|e| CardError::Malformed(e.to_string()))?;
    card.ops = ops;
    Ok(card)
}

/// Normalize a list of raw ops at the given depth (top level is 1).
///
/// Invalid ops are dropped individually.
pub fn normalize_ops(raw: Vec<Json>, depth: u8, card: &str) -> Vec<Op> {
    raw.into_iter().filter_map(|op| normalize_op(op, depth, card)).collect()
}

fn normalize_op(raw: Json, depth: u8, card: &str) -> Option<Op> {
    let Json::Object(mut op) = raw else {
        warn!(card, "dropping op that is not an object");
        return None;
    };
    let raw_tag = op.get("op").and_then(Json::as_str).unwrap_or_default().to_string();
    let Some(tag) = canonical_tag(&raw_tag) else {
        warn!(card, op = %raw_tag, "dropping unknown op");
        return None;
    };
    op.insert("op".into(), Json::String(tag.into()));

    rename(&mut op, "condition", "cond");
    rename(&mut op, "target_stat", "stat");
    rename(&mut op, "targetStat", "stat");
    rename(&mut op, "loop_var", "loopVar");
    rename(&mut op, "probability", "chance");
    match tag {
        "damage" | "heal" | "shield" | "modifyStat" => rename(&mut op, "value", "amount"),
        "addMarker" => rename(&mut op, "marker", "name"),
        "applyDisaster" | "removeDisaster" => rename(&mut op, "disaster", "name"),
        _ => {}
    }
    if matches!(tag, "addMarker" | "applyDisaster" | "delay") {
        rename(&mut op, "duration", "turns");
        rename(&mut op, "count", "turns");
    }
    if tag == "random" {
        if let Some(chance) = op.get("chance").and_then(chance_of) {
            op.insert("chance".into(), Json::from(chance));
        }
    }

    let missing_target = op.get("target").map_or(true, |t| t.is_null() || t.as_str() == Some(""));
    if missing_target {
        if let Some(default) = default_target_for(tag) {
            op.insert("target".into(), Json::String(default.token()));
        }
    }

    for key in branch_keys(tag) {
        let Some(branch) = op.remove(*key) else {
            continue;
        };
        let nested = match branch {
            Json::Array(list) => list,
            single @ Json::Object(_) => vec![single],
            _ => Vec::new(),
        };
        let kept = if depth >= MAX_NESTING_DEPTH {
            if !nested.is_empty() {
                warn!(card, op = tag, depth, "truncating branch nested too deep");
            }
            Vec::new()
        } else {
            normalize_ops(nested, depth + 1, card)
                .iter()
                .filter_map(|op| serde_json::to_value(op).ok())
                .collect()
        };
        op.insert((*key).into(), Json::Array(kept));
    }

    match serde_json::from_value::<Op>(Json::Object(op)) {
        Ok(op) => Some(op),
        Err(e) => {
            warn!(card, op = tag, error = %e, "dropping malformed op");
            None
        }
    }
}

/// Map a loosely spelled tag onto its canonical form.
fn canonical_tag(raw: &str) -> Option<&'static str> {
    let key: String = raw
        .chars()
        .filter(|c| !matches!(c, '_' | '-' | ' '))
        .collect::<String>()
        .to_ascii_lowercase();
    Some(match key.as_str() {
        "damage" | "dmg" => "damage",
        "heal" => "heal",
        "shield" => "shield",
        "draw" => "draw",
        "discard" => "discard",
        "addmarker" | "marker" => "addMarker",
        "applydisaster" | "disaster" => "applyDisaster",
        "removedisaster" => "removeDisaster",
        "modifystat" => "modifyStat",
        "setvar" => "setVar",
        "if" | "conditional" => "if",
        "foreach" => "forEach",
        "find" => "find",
        "addtrigger" | "trigger" => "addTrigger",
        "random" | "chance" => "random",
        "delay" => "delay",
        "execute" => "execute",
        "ondeath" => "onDeath",
        "lifesteal" => "lifesteal",
        "reflectdamage" | "reflect" => "reflectDamage",
        "equip" => "equip",
        "changeattribute" => "changeAttribute",
        _ => return None,
    })
}

fn branch_keys(tag: &str) -> &'static [&'static str] {
    match tag {
        "if" | "random" => &["then", "else"],
        "forEach" | "addTrigger" | "delay" | "onDeath" => &["actions"],
        _ => &[],
    }
}

/// Percentages (`30`, `"30%"`) become probabilities, clamped to `0.0..=1.0`.
fn chance_of(value: &Json) -> Option<f64> {
    let raw = match value {
        Json::Number(n) => n.as_f64()?,
        Json::String(s) => s.trim().trim_end_matches('%').trim().parse::<f64>().ok()?,
        _ => return None,
    };
    let p = if raw > 1.0 { raw / 100.0 } else { raw };
    Some(p.clamp(0.0, 1.0))
}

fn rename(doc: &mut Map<String, Json>, from: &str, to: &str) {
    if doc.contains_key(to) {
        return;
    }
    if let Some(value) = doc.remove(from) {
        doc.insert(to.into(), value);
    }
}

fn clamp_non_negative(doc: &mut Map<String, Json>, key: &str) {
    if let Some(value) = doc.get_mut(key) {
        #[allow(clippy::cast_possible_truncation)]
        let n = value
            .as_i64()
            .or_else(|| value.as_f64().map(|f| f.round() as i64))
            .unwrap_or(0);
        *value = Json::from(n.max(0));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::TargetSpec;
    use serde_json::json;

    #[test]
    fn test_not_an_object() {
        assert_eq!(normalize_card(json!([1, 2])), Err(CardError::NotAnObject));
    }

    #[test]
    fn test_tag_and_field_aliases() {
        let card = normalize_card(json!({
            "id": "c1",
            "name": "Hex",
            "dsl": [
                {"op": "ADD_MARKER", "marker": "stun", "duration": 2, "target": "enemy"},
                {"op": "Heal", "amount": 3, "target_stat": "mp"},
                {"op": "random", "probability": 30, "then": [{"op": "draw", "count": 1}]},
            ],
        }))
        .unwrap();

        assert_eq!(card.ops.len(), 3);
        assert_eq!(card.ops[0].tag(), "addMarker");
        assert!(matches!(&card.ops[0], Op::AddMarker { name, .. } if name == "stun"));
        assert!(matches!(&card.ops[1], Op::Heal { target: TargetSpec::Caster, .. }));
        match &card.ops[2] {
            Op::Random { chance, then, .. } => {
                assert!((chance - 0.3).abs() < 1e-9);
                assert_eq!(then.len(), 1);
            }
            other => panic!("unexpected op {other:?}"),
        }
    }

    #[test]
    fn test_unknown_op_dropped_alone() {
        let card = normalize_card(json!({
            "id": "c2",
            "name": "Mixed",
            "ops": [{"op": "summon"}, {"op": "damage", "amount": 2}, {"op": "heal"}],
        }))
        .unwrap();
        assert_eq!(card.ops.len(), 1);
        assert_eq!(card.ops[0].tag(), "damage");
    }

    #[test]
    fn test_no_valid_ops() {
        let err = normalize_card(json!({"id": "c3", "name": "Dud", "ops": [{"op": "summon"}]})).unwrap_err();
        assert_eq!(err, CardError::NoValidOps("c3".into()));
    }

    #[test]
    fn test_depth_truncated() {
        let leaf = json!({"op": "damage", "amount": 1});
        let lvl3 = json!({"op": "if", "cond": "turn > 0", "then": [leaf]});
        let lvl2 = json!({"op": "if", "cond": "turn > 0", "then": [lvl3]});
        let lvl1 = json!({"op": "if", "cond": "turn > 0", "then": [lvl2]});
        let card = normalize_card(json!({"id": "c4", "name": "Deep", "ops": [lvl1]})).unwrap();
        assert_eq!(card.ops[0].depth(), usize::from(MAX_NESTING_DEPTH));
    }

    #[test]
    fn test_limits_and_clamps() {
        let ops: Vec<Json> = (0..12).map(|_| json!({"op": "shield", "amount": 1})).collect();
        let card = normalize_card(json!({
            "id": 7,
            "name": "Wall",
            "cost": -3,
            "cooldownTurns": 2.6,
            "keywords": ["a", "b", "c", "d", "e"],
            "ops": ops,
        }))
        .unwrap();
        assert_eq!(card.id.0, "7");
        assert_eq!(card.ops.len(), MAX_OPS_PER_CARD);
        assert_eq!(card.keywords.len(), MAX_KEYWORDS);
        assert_eq!(card.cost, 0);
        assert_eq!(card.cooldown, 3);
    }
}
