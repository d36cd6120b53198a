//! Trigger conditions the dynamics core reports to whoever logs telemetry.

use serde::{Deserialize, Serialize};

/// Category of a body the vehicle can touch. Stored in the host's collider
/// user data so contacts can be classified without a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionLayer {
    #[default]
    Default,
    Ground,
    Obstacle,
    Agent,
    Pedestrian,
    Npc,
}

impl CollisionLayer {
    /// Obstacle, agent, pedestrian and NPC contacts are collisions; the rest is scenery.
    pub fn is_reportable(self) -> bool {
        matches!(
            self,
            CollisionLayer::Obstacle | CollisionLayer::Agent | CollisionLayer::Pedestrian | CollisionLayer::Npc
        )
    }

    pub fn to_user_data(self) -> u128 {
        match self {
            CollisionLayer::Default => 0,
            CollisionLayer::Ground => 1,
            CollisionLayer::Obstacle => 2,
            CollisionLayer::Agent => 3,
            CollisionLayer::Pedestrian => 4,
            CollisionLayer::Npc => 5,
        }
    }

    /// Unknown values fall back to `Default`.
    pub fn from_user_data(data: u128) -> Self {
        match data {
            1 => CollisionLayer::Ground,
            2 => CollisionLayer::Obstacle,
            3 => CollisionLayer::Agent,
            4 => CollisionLayer::Pedestrian,
            5 => CollisionLayer::Npc,
            _ => CollisionLayer::Default,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DynamicsEvent {
    /// Another whole mile accumulated since the last tick event.
    MileTick { odometer: f32 }, // metres driven so far
    /// Contact began with a reportable body. `other` is the host's id for it.
    Collision { other: u32, layer: CollisionLayer },
}
