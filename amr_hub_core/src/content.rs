use serde::{Deserialize, Serialize};

/// Kind of furniture a room can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContentType {
    Bed,
    Workstation,
}

/// Represents an item of room content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Content {
    Bed { bed_id: usize },
    Workstation { workstation_id: usize },
}

impl Content {
    pub fn content_type(&self) -> ContentType {
        match self {
            Content::Bed { .. } => ContentType::Bed,
            Content::Workstation { .. } => ContentType::Workstation,
        }
    }

    pub fn id(&self) -> usize {
        match self {
            Content::Bed { bed_id } => *bed_id,
            Content::Workstation { workstation_id } => *workstation_id,
        }
    }
}
