// ── Serialized model snapshot ──
//
// The JSON document router clients receive and `parse` prints: one
// array per entity variant. Command stacks and view flags are not part
// of it.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::model::{Accessory, CentralStation, Entity, FeedbackBus, Locomotive};

/// Snapshot section names, in document order.
pub const SECTION_ECOSBASE: &str = "ecosbase";
pub const SECTION_LOCOMOTIVES: &str = "locomotives";
pub const SECTION_ACCESSORIES: &str = "accessories";
pub const SECTION_FEEDBACKS: &str = "feedbacks";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Snapshot {
    pub ecosbase: Vec<CentralStation>,
    pub locomotives: Vec<Locomotive>,
    pub accessories: Vec<Accessory>,
    pub feedbacks: Vec<FeedbackBus>,
}

impl Snapshot {
    pub fn from_entities<'a>(entities: impl IntoIterator<Item = &'a Entity>) -> Self {
        let mut snapshot = Self::default();
        for entity in entities {
            match entity {
                Entity::CentralStation(e) => snapshot.ecosbase.push(e.clone()),
                Entity::Locomotive(e) => snapshot.locomotives.push(e.clone()),
                Entity::Accessory(e) => snapshot.accessories.push(e.clone()),
                Entity::FeedbackBus(e) => snapshot.feedbacks.push(e.clone()),
            }
        }
        snapshot
    }

    /// All entities, section by section.
    pub fn into_entities(self) -> Vec<Entity> {
        let mut out = Vec::with_capacity(self.len());
        out.extend(self.ecosbase.into_iter().map(Entity::from));
        out.extend(self.locomotives.into_iter().map(Entity::from));
        out.extend(self.accessories.into_iter().map(Entity::from));
        out.extend(self.feedbacks.into_iter().map(Entity::from));
        out
    }

    pub fn len(&self) -> usize {
        self.ecosbase.len() + self.locomotives.len() + self.accessories.len() + self.feedbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn from_json(text: &str) -> Result<Self, CoreError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_value(&self) -> Result<serde_json::Value, CoreError> {
        Ok(serde_json::to_value(self)?)
    }
}
