use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type MenuItemId = Uuid;

/// An item on the cafe menu, offered as a ready-made transaction description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuItem {
    pub id: MenuItemId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl MenuItem {
    /// Returns `None` when the name is blank. Surrounding whitespace is trimmed.
    pub fn new(name: &str) -> Option<Self> {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        Some(Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            created_at: Utc::now(),
        })
    }
}
