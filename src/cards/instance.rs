//! Card instances - a card in a hand, the draw pool or the discard pile.
//!
//! Instances are referenced from requests by `instance_id`, which is unique
//! within a match. Several instances may share one card definition.

use serde::{Deserialize, Serialize};

use super::definition::Card;

/// A card instance in a match.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardInstance {
    /// Match-unique id of this copy.
    pub instance_id: String,

    /// The definition this copy was made from.
    pub card: Card,
}

impl CardInstance {
    /// Create a new instance.
    #[must_use]
    pub fn new(instance_id: impl Into<String>, card: Card) -> Self {
        Self {
            instance_id: instance_id.into(),
            card,
        }
    }

    /// Card name (used as the `source` of bound ops).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.card.name
    }
}
