//! Elemental attributes and the attribute matchup table.
//!
//! Every card carries one attribute and every participant has one (neutral
//! until an effect changes it). Attributes only matter in the combat
//! sub-cycle:
//!
//! - **Opposing pairs**: fire ↔ water and wind ↔ earth. Blocking with the
//!   opposing attribute halves damage; a defender whose own attribute is the
//!   opposing one and fails to block with it takes amplified damage.
//! - **Light** always bypasses block.
//! - **Dark** defeats the defender on any nonzero hit unless fully blocked
//!   by light.
//! - **Neutral** has no matchup.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Elemental attribute of a card or participant.
///
/// The single-glyph names used by older card data (火 水 風 土 光 暗 無)
/// are accepted as aliases.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Attribute {
    #[serde(alias = "火")]
    Fire,
    #[serde(alias = "水")]
    Water,
    #[serde(alias = "風")]
    Wind,
    #[serde(alias = "土")]
    Earth,
    #[serde(alias = "光")]
    Light,
    #[serde(alias = "暗")]
    Dark,
    #[default]
    #[serde(alias = "無")]
    Neutral,
}

impl Attribute {
    /// All attributes, in declaration order.
    pub const ALL: [Attribute; 7] = [
        Attribute::Fire,
        Attribute::Water,
        Attribute::Wind,
        Attribute::Earth,
        Attribute::Light,
        Attribute::Dark,
        Attribute::Neutral,
    ];

    /// The attribute that counters this one.
    ///
    /// Neutral has no counterpart.
    #[must_use]
    pub const fn opposing(self) -> Option<Attribute> {
        match self {
            Attribute::Fire => Some(Attribute::Water),
            Attribute::Water => Some(Attribute::Fire),
            Attribute::Wind => Some(Attribute::Earth),
            Attribute::Earth => Some(Attribute::Wind),
            Attribute::Light => Some(Attribute::Dark),
            Attribute::Dark => Some(Attribute::Light),
            Attribute::Neutral => None,
        }
    }

    /// Lowercase wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Attribute::Fire => "fire",
            Attribute::Water => "water",
            Attribute::Wind => "wind",
            Attribute::Earth => "earth",
            Attribute::Light => "light",
            Attribute::Dark => "dark",
            Attribute::Neutral => "neutral",
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Attribute {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fire" | "火" => Ok(Attribute::Fire),
            "water" | "水" => Ok(Attribute::Water),
            "wind" | "風" => Ok(Attribute::Wind),
            "earth" | "土" => Ok(Attribute::Earth),
            "light" | "光" => Ok(Attribute::Light),
            "dark" | "暗" => Ok(Attribute::Dark),
            "neutral" | "無" => Ok(Attribute::Neutral),
            _ => Err(()),
        }
    }
}

/// How an attack interacts with a defense.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Matchup {
    /// Plain subtraction of block from power.
    Normal,
    /// Block ignored entirely (light).
    Bypass,
    /// Defender blocked with the opposing attribute; damage halved.
    Resisted,
    /// Defender is of the opposing attribute and did not block with it.
    Weakness,
    /// Any nonzero hit defeats the defender (dark, not countered).
    Lethal,
    /// Dark attack fully stopped by a light block.
    Nullified,
}

/// Classify an attack against a defense.
///
/// `block_attrs` are the attributes of the armor used to block,
/// `block` the summed block value, `defender` the defender's own attribute.
///
/// | attack | condition | matchup |
/// |---|---|---|
/// | light | always | `Bypass` |
/// | dark | light armor and `block >= power` | `Nullified` |
/// | dark | otherwise | `Lethal` |
/// | fire/water/wind/earth | blocked with the opposing attribute | `Resisted` |
/// | fire/water/wind/earth | defender *is* the opposing attribute | `Weakness` |
/// | anything else | | `Normal` |
///
/// The opposing attribute plays two parts. As armor it is the counter and
/// halves the hit; as the defender's own attribute it is the exposed
/// weakness. So water armor halves fire, while a water defender who does
/// not block with water takes 150% from fire. A blocking counter takes
/// precedence over the weakness. Damage from card ops has no block step
/// and applies the weakness multiplier for any opposing pair.
#[must_use]
pub fn classify(
    attack: Attribute,
    power: i64,
    block: i64,
    block_attrs: &[Attribute],
    defender: Attribute,
) -> Matchup {
    let blocks_with = |a: Attribute| block_attrs.contains(&a);
    match attack {
        Attribute::Light => Matchup::Bypass,
        Attribute::Dark => {
            if blocks_with(Attribute::Light) && block >= power {
                Matchup::Nullified
            } else {
                Matchup::Lethal
            }
        }
        Attribute::Neutral => Matchup::Normal,
        elemental => match elemental.opposing() {
            Some(counter) if blocks_with(counter) => Matchup::Resisted,
            Some(counter) if defender == counter => Matchup::Weakness,
            _ => Matchup::Normal,
        },
    }
}
