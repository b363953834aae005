//! Bot players.
//!
//! A bot is a [`DecisionPolicy`] that maps a snapshot to one request. Its
//! randomness comes from its own seeded stream, so a bot seat never
//! perturbs the match RNG.
//!
//! ## Usage
//!
//! ```
//! use card_battle::bot::{BotConfig, DecisionPolicy, Difficulty, HeuristicBot};
//! use card_battle::core::{MatchBuilder, Participant, ParticipantId};
//!
//! let state = MatchBuilder::new("m1", 1)
//!     .participant(Participant::new("bot", 30, 0, 5).as_bot())
//!     .participant(Participant::new("p2", 30, 0, 5))
//!     .build();
//!
//! let mut bot = HeuristicBot::new(BotConfig::preset(Difficulty::Hard).with_seed(3));
//! // Empty hand and no weapon: the bot prays or ends its turn.
//! let request = bot.propose(&state, &ParticipantId::new("bot")).unwrap();
//! assert!(matches!(request.name(), "pray" | "endTurn"));
//! ```

pub mod config;
pub mod policy;

pub use config::{BotConfig, Difficulty};
pub use policy::{strongest_weapon, weakest_opponent, DecisionPolicy, HeuristicBot};
