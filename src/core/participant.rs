//! Participants: ids, resource pools, statuses, equipment.
//!
//! ## ParticipantId
//!
//! Opaque string identifier supplied by the identity layer.
//!
//! ## Participant
//!
//! Everything the engine tracks for one seat in a match: bounded resource
//! pools (`0 <= value <= max` after every resolution pass), hand, timed
//! statuses, equipment and one-shot combat flags. Participants are mutated
//! only by the interpreter or the state machine.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::cards::{Attribute, CardInstance};

/// Participant identifier (the authenticated actor id).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(pub String);

impl ParticipantId {
    /// Create a new participant ID.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw id.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ParticipantId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ParticipantId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A numeric stat addressable by scripts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Stat {
    #[default]
    Hp,
    Mp,
    Ki,
    #[serde(alias = "max_hp")]
    MaxHp,
    #[serde(alias = "max_mp")]
    MaxMp,
    #[serde(alias = "max_ki")]
    MaxKi,
    #[serde(alias = "ki_regen")]
    KiRegen,
    #[serde(alias = "attack")]
    Power,
    Defense,
}

impl Stat {
    /// The cap for a bounded resource, if this stat is one.
    #[must_use]
    pub const fn cap(self) -> Option<Stat> {
        match self {
            Stat::Hp => Some(Stat::MaxHp),
            Stat::Mp => Some(Stat::MaxMp),
            Stat::Ki => Some(Stat::MaxKi),
            _ => None,
        }
    }
}

impl FromStr for Stat {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s.chars().filter(|c| *c != '_').collect::<String>().to_ascii_lowercase();
        match key.as_str() {
            "hp" => Ok(Stat::Hp),
            "mp" => Ok(Stat::Mp),
            "ki" => Ok(Stat::Ki),
            "maxhp" => Ok(Stat::MaxHp),
            "maxmp" => Ok(Stat::MaxMp),
            "maxki" => Ok(Stat::MaxKi),
            "kiregen" => Ok(Stat::KiRegen),
            "power" | "attack" => Ok(Stat::Power),
            "defense" => Ok(Stat::Defense),
            _ => Err(()),
        }
    }
}

/// A named timed status.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Marker {
    pub name: String,
    pub remaining_turns: i64,
}

/// A timed ailment that may deal damage at the start of its holder's turn.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Disaster {
    pub name: String,
    pub remaining_turns: i64,
    #[serde(default)]
    pub potency: i64,
}

/// Equipment slot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EquipSlot {
    #[default]
    Weapon,
    Armor,
    Accessory,
}

/// An equipped item and its combat bonuses.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Equipment {
    pub name: String,
    #[serde(default)]
    pub power: i64,
    #[serde(default)]
    pub defense: i64,
}

/// Equipment slots of a participant.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EquipmentSlots {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weapon: Option<Equipment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub armor: Option<Equipment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accessory: Option<Equipment>,
}

impl EquipmentSlots {
    /// Mutable access to a slot.
    pub fn slot_mut(&mut self, slot: EquipSlot) -> &mut Option<Equipment> {
        match slot {
            EquipSlot::Weapon => &mut self.weapon,
            EquipSlot::Armor => &mut self.armor,
            EquipSlot::Accessory => &mut self.accessory,
        }
    }

    fn all(&self) -> impl Iterator<Item = &Equipment> {
        [&self.weapon, &self.armor, &self.accessory].into_iter().flatten()
    }

    /// Total power bonus from every slot.
    #[must_use]
    pub fn power_bonus(&self) -> i64 {
        self.all().map(|e| e.power).sum()
    }

    /// Total defense bonus from every slot.
    #[must_use]
    pub fn defense_bonus(&self) -> i64 {
        self.all().map(|e| e.defense).sum()
    }
}

/// One-shot combat flags, consumed by damage resolution.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombatFlag {
    /// Holder's next dealt damage heals the holder by a percentage.
    Lifesteal,
    /// Holder's next taken damage is partly reflected to its source.
    Reflect,
}

/// Per-participant combat flag storage (percentages, 0 = unset).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CombatFlags {
    #[serde(default)]
    pub lifesteal_pct: i64,
    #[serde(default)]
    pub reflect_pct: i64,
}

impl CombatFlags {
    /// Set a flag to a percentage (clamped to 0..=100).
    pub fn set(&mut self, flag: CombatFlag, percent: i64) {
        let percent = percent.clamp(0, 100);
        match flag {
            CombatFlag::Lifesteal => self.lifesteal_pct = percent,
            CombatFlag::Reflect => self.reflect_pct = percent,
        }
    }

    /// Take a flag's percentage, clearing it.
    pub fn take(&mut self, flag: CombatFlag) -> i64 {
        match flag {
            CombatFlag::Lifesteal => std::mem::take(&mut self.lifesteal_pct),
            CombatFlag::Reflect => std::mem::take(&mut self.reflect_pct),
        }
    }
}

/// A seat in a match.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub id: ParticipantId,
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub is_bot: bool,

    // === Resource pools ===
    pub hp: i64,
    pub max_hp: i64,
    #[serde(default)]
    pub mp: i64,
    #[serde(default)]
    pub max_mp: i64,
    #[serde(default)]
    pub ki: i64,
    #[serde(default)]
    pub max_ki: i64,
    #[serde(default)]
    pub ki_regen: i64,
    #[serde(default)]
    pub shield: i64,

    // === Combat ===
    #[serde(default)]
    pub power: i64,
    #[serde(default)]
    pub defense: i64,
    #[serde(default)]
    pub attribute: Attribute,
    #[serde(default)]
    pub equipment: EquipmentSlots,
    #[serde(default)]
    pub flags: CombatFlags,

    // === Cards and statuses ===
    #[serde(default)]
    pub hand: Vec<CardInstance>,
    #[serde(default)]
    pub markers: Vec<Marker>,
    #[serde(default)]
    pub disasters: Vec<Disaster>,

    #[serde(default)]
    pub reactions_used: u32,
    #[serde(default)]
    pub defeated: bool,
}

impl Participant {
    /// Create a participant with full pools.
    #[must_use]
    pub fn new(id: impl Into<ParticipantId>, max_hp: i64, max_mp: i64, max_ki: i64) -> Self {
        let id = id.into();
        Self {
            nickname: id.0.clone(),
            id,
            is_bot: false,
            hp: max_hp,
            max_hp,
            mp: max_mp,
            max_mp,
            ki: max_ki,
            max_ki,
            ki_regen: 2,
            shield: 0,
            power: 0,
            defense: 0,
            attribute: Attribute::Neutral,
            equipment: EquipmentSlots::default(),
            flags: CombatFlags::default(),
            hand: Vec::new(),
            markers: Vec::new(),
            disasters: Vec::new(),
            reactions_used: 0,
            defeated: false,
        }
    }

    /// Set the display name (builder pattern).
    #[must_use]
    pub fn with_nickname(mut self, nickname: impl Into<String>) -> Self {
        self.nickname = nickname.into();
        self
    }

    /// Set starting ki and regen rate (builder pattern).
    #[must_use]
    pub fn with_ki(mut self, ki: i64, regen: i64) -> Self {
        self.ki = ki;
        self.ki_regen = regen;
        self
    }

    /// Mark as a bot seat (builder pattern).
    #[must_use]
    pub fn as_bot(mut self) -> Self {
        self.is_bot = true;
        self
    }

    /// Whether this participant can still act and be targeted.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        !self.defeated
    }

    /// Read a stat.
    #[must_use]
    pub fn stat(&self, stat: Stat) -> i64 {
        match stat {
            Stat::Hp => self.hp,
            Stat::Mp => self.mp,
            Stat::Ki => self.ki,
            Stat::MaxHp => self.max_hp,
            Stat::MaxMp => self.max_mp,
            Stat::MaxKi => self.max_ki,
            Stat::KiRegen => self.ki_regen,
            Stat::Power => self.power,
            Stat::Defense => self.defense,
        }
    }

    /// Mutable access to a stat.
    pub fn stat_mut(&mut self, stat: Stat) -> &mut i64 {
        match stat {
            Stat::Hp => &mut self.hp,
            Stat::Mp => &mut self.mp,
            Stat::Ki => &mut self.ki,
            Stat::MaxHp => &mut self.max_hp,
            Stat::MaxMp => &mut self.max_mp,
            Stat::MaxKi => &mut self.max_ki,
            Stat::KiRegen => &mut self.ki_regen,
            Stat::Power => &mut self.power,
            Stat::Defense => &mut self.defense,
        }
    }

    /// Add to a resource without exceeding its cap. Returns the amount gained.
    ///
    /// Uncapped stats simply receive the delta.
    pub fn restore(&mut self, stat: Stat, amount: i64) -> i64 {
        let amount = amount.max(0);
        let before = self.stat(stat);
        let after = match stat.cap() {
            Some(cap) => before.saturating_add(amount).min(self.stat(cap).max(before)),
            None => before.saturating_add(amount),
        };
        *self.stat_mut(stat) = after;
        after - before
    }

    /// Clamp every bounded pool to `[0, max]`.
    pub fn clamp_resources(&mut self) {
        self.max_hp = self.max_hp.max(0);
        self.max_mp = self.max_mp.max(0);
        self.max_ki = self.max_ki.max(0);
        self.hp = self.hp.clamp(0, self.max_hp);
        self.mp = self.mp.clamp(0, self.max_mp);
        self.ki = self.ki.clamp(0, self.max_ki);
        self.shield = self.shield.max(0);
        self.ki_regen = self.ki_regen.max(0);
    }

    /// Whether every bounded pool is within `[0, max]`.
    #[must_use]
    pub fn resources_in_bounds(&self) -> bool {
        (0..=self.max_hp).contains(&self.hp)
            && (0..=self.max_mp).contains(&self.mp)
            && (0..=self.max_ki).contains(&self.ki)
    }

    /// Total attack power bonus (stat + equipment).
    #[must_use]
    pub fn attack_bonus(&self) -> i64 {
        self.power + self.equipment.power_bonus()
    }

    /// Total block bonus (stat + equipment).
    #[must_use]
    pub fn block_bonus(&self) -> i64 {
        self.defense + self.equipment.defense_bonus()
    }

    /// Add or refresh a marker. A refreshed marker keeps the longer duration.
    pub fn add_marker(&mut self, name: &str, turns: i64) {
        match self.markers.iter_mut().find(|m| m.name == name) {
            Some(existing) => existing.remaining_turns = existing.remaining_turns.max(turns),
            None => self.markers.push(Marker {
                name: name.to_string(),
                remaining_turns: turns,
            }),
        }
    }

    /// Whether a marker with this name is active.
    #[must_use]
    pub fn has_marker(&self, name: &str) -> bool {
        self.markers.iter().any(|m| m.name == name)
    }

    /// Add or refresh a disaster.
    pub fn add_disaster(&mut self, name: &str, turns: i64, potency: i64) {
        match self.disasters.iter_mut().find(|d| d.name == name) {
            Some(existing) => {
                existing.remaining_turns = existing.remaining_turns.max(turns);
                existing.potency = existing.potency.max(potency);
            }
            None => self.disasters.push(Disaster {
                name: name.to_string(),
                remaining_turns: turns,
                potency,
            }),
        }
    }

    /// Remove disasters by name, or all of them. Returns how many were removed.
    pub fn remove_disasters(&mut self, name: Option<&str>) -> usize {
        let before = self.disasters.len();
        match name {
            Some(name) => self.disasters.retain(|d| d.name != name),
            None => self.disasters.clear(),
        }
        before - self.disasters.len()
    }

    /// Whether a disaster with this name is active.
    #[must_use]
    pub fn has_disaster(&self, name: &str) -> bool {
        self.disasters.iter().any(|d| d.name == name)
    }

    /// Count down markers and disasters by one turn, dropping expired ones.
    ///
    /// Returns the names of everything that expired.
    pub fn tick_statuses(&mut self) -> Vec<String> {
        let mut expired = Vec::new();
        for marker in &mut self.markers {
            marker.remaining_turns -= 1;
        }
        for disaster in &mut self.disasters {
            disaster.remaining_turns -= 1;
        }
        self.markers.retain(|m| {
            let keep = m.remaining_turns > 0;
            if !keep {
                expired.push(m.name.clone());
            }
            keep
        });
        self.disasters.retain(|d| {
            let keep = d.remaining_turns > 0;
            if !keep {
                expired.push(d.name.clone());
            }
            keep
        });
        expired
    }

    /// Find a hand card by instance id, falling back to card id.
    #[must_use]
    pub fn find_in_hand(&self, card_ref: &str) -> Option<usize> {
        self.hand
            .iter()
            .position(|c| c.instance_id == card_ref)
            .or_else(|| self.hand.iter().position(|c| c.card.id.as_str() == card_ref))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Participant {
        Participant::new("p1", 20, 10, 10).with_ki(3, 2)
    }

    #[test]
    fn test_new_participant_has_full_pools() {
        let p = Participant::new("p1", 30, 5, 10);
        assert_eq!(p.hp, 30);
        assert_eq!(p.mp, 5);
        assert_eq!(p.ki, 10);
        assert!(p.is_alive());
        assert_eq!(p.nickname, "p1");
    }

    #[test]
    fn test_restore_is_capped() {
        let mut p = sample();
        p.hp = 15;
        assert_eq!(p.restore(Stat::Hp, 10), 5);
        assert_eq!(p.hp, 20);

        assert_eq!(p.restore(Stat::Ki, 2), 2);
        assert_eq!(p.ki, 5);

        // Uncapped stats take the full delta.
        assert_eq!(p.restore(Stat::Power, 4), 4);
        assert_eq!(p.power, 4);
    }

    #[test]
    fn test_restore_never_lowers_an_overfull_pool() {
        let mut p = sample();
        p.hp = 25;
        assert_eq!(p.restore(Stat::Hp, 3), 0);
        assert_eq!(p.hp, 25);
    }

    #[test]
    fn test_clamp_resources() {
        let mut p = sample();
        p.hp = -7;
        p.ki = 42;
        p.shield = -1;
        assert!(!p.resources_in_bounds());
        p.clamp_resources();
        assert_eq!(p.hp, 0);
        assert_eq!(p.ki, 10);
        assert_eq!(p.shield, 0);
        assert!(p.resources_in_bounds());
    }

    #[test]
    fn test_markers_refresh_and_expire() {
        let mut p = sample();
        p.add_marker("stun", 1);
        p.add_marker("stun", 3);
        p.add_marker("haste", 1);
        assert_eq!(p.markers.len(), 2);

        let expired = p.tick_statuses();
        assert_eq!(expired, vec!["haste".to_string()]);
        assert!(p.has_marker("stun"));
        assert_eq!(p.markers[0].remaining_turns, 2);
    }

    #[test]
    fn test_disasters() {
        let mut p = sample();
        p.add_disaster("poison", 2, 1);
        p.add_disaster("fog", 1, 0);
        assert!(p.has_disaster("poison"));
        assert_eq!(p.remove_disasters(Some("fog")), 1);
        assert_eq!(p.remove_disasters(None), 1);
        assert!(p.disasters.is_empty());
    }

    #[test]
    fn test_combat_flags_are_one_shot() {
        let mut flags = CombatFlags::default();
        flags.set(CombatFlag::Lifesteal, 250);
        assert_eq!(flags.take(CombatFlag::Lifesteal), 100);
        assert_eq!(flags.take(CombatFlag::Lifesteal), 0);
    }

    #[test]
    fn test_equipment_bonuses() {
        let mut p = sample();
        p.power = 1;
        *p.equipment.slot_mut(EquipSlot::Weapon) = Some(Equipment { name: "sword".into(), power: 3, defense: 0 });
        *p.equipment.slot_mut(EquipSlot::Armor) = Some(Equipment { name: "mail".into(), power: 0, defense: 4 });
        assert_eq!(p.attack_bonus(), 4);
        assert_eq!(p.block_bonus(), 4);
    }

    #[test]
    fn test_stat_parsing() {
        assert_eq!("max_hp".parse::<Stat>(), Ok(Stat::MaxHp));
        assert_eq!("kiRegen".parse::<Stat>(), Ok(Stat::KiRegen));
        assert_eq!("attack".parse::<Stat>(), Ok(Stat::Power));
        assert!("luck".parse::<Stat>().is_err());
        let stat: Stat = serde_json::from_str("\"maxHp\"").unwrap();
        assert_eq!(stat, Stat::MaxHp);
    }
}
