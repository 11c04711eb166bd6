use crate::model::SupplyId;

/// A prerequisite item shown on the supply shelf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupplyItem {
    pub id: SupplyId,
    pub name: String,
    pub description: String,
}

impl SupplyItem {
    #[must_use]
    pub fn new(id: &str, name: &str, description: &str) -> Self {
        Self {
            id: SupplyId::new(id),
            name: name.to_string(),
            description: description.to_string(),
        }
    }
}

/// Result of a single `collect` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectOutcome {
    /// The item was added; `remaining` items are still missing.
    Collected { remaining: usize },
    AlreadyCollected,
    /// The id is not part of the required list and was ignored.
    Unknown,
}

/// Tracks which required supplies have been collected.
///
/// The collected set only grows, is bounded by the required list, and is
/// cleared only by `reset`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupplyGate {
    required: Vec<SupplyItem>,
    collected: Vec<SupplyId>,
}

impl SupplyGate {
    #[must_use]
    pub fn new(required: Vec<SupplyItem>) -> Self {
        let mut unique: Vec<SupplyItem> = Vec::with_capacity(required.len());
        for item in required {
            if !unique.iter().any(|known| known.id == item.id) {
                unique.push(item);
            }
        }
        Self {
            required: unique,
            collected: Vec::new(),
        }
    }

    /// Collect an item. Repeats and unknown ids are no-ops.
    pub fn collect(&mut self, id: &SupplyId) -> CollectOutcome {
        if self.item(id).is_none() {
            return CollectOutcome::Unknown;
        }
        if self.is_collected(id) {
            return CollectOutcome::AlreadyCollected;
        }
        self.collected.push(id.clone());
        CollectOutcome::Collected {
            remaining: self.remaining_count(),
        }
    }

    #[must_use]
    pub fn is_collected(&self, id: &SupplyId) -> bool {
        self.collected.contains(id)
    }

    /// True once every required item has been collected.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.required.iter().all(|item| self.is_collected(&item.id))
    }

    #[must_use]
    pub fn item(&self, id: &SupplyId) -> Option<&SupplyItem> {
        self.required.iter().find(|item| &item.id == id)
    }

    #[must_use]
    pub fn required(&self) -> &[SupplyItem] {
        &self.required
    }

    /// Collected ids in collection order.
    #[must_use]
    pub fn collected(&self) -> &[SupplyId] {
        &self.collected
    }

    #[must_use]
    pub fn collected_count(&self) -> usize {
        self.collected.len()
    }

    #[must_use]
    pub fn required_count(&self) -> usize {
        self.required.len()
    }

    #[must_use]
    pub fn remaining_count(&self) -> usize {
        self.required_count().saturating_sub(self.collected_count())
    }

    /// Items still missing, in shelf order.
    pub fn missing(&self) -> impl Iterator<Item = &SupplyItem> {
        self.required
            .iter()
            .filter(|item| !self.is_collected(&item.id))
    }

    pub fn reset(&mut self) {
        self.collected.clear();
    }
}
