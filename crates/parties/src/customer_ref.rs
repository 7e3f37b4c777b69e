use serde::{Deserialize, Serialize};

use crate::PartyId;

/// Who a sale is made to.
///
/// Serialized as `{"kind": "walk_in"}` or `{"kind": "registered", "party_id": "..."}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CustomerRef {
    /// Anonymous counter customer with no record.
    #[default]
    WalkIn,
    Registered { party_id: PartyId },
}

impl CustomerRef {
    pub fn party_id(&self) -> Option<PartyId> {
        match self {
            CustomerRef::WalkIn => None,
            CustomerRef::Registered { party_id } => Some(*party_id),
        }
    }

    pub fn is_walk_in(&self) -> bool {
        matches!(self, CustomerRef::WalkIn)
    }
}

impl From<Option<PartyId>> for CustomerRef {
    fn from(value: Option<PartyId>) -> Self {
        match value {
            Some(party_id) => CustomerRef::Registered { party_id },
            None => CustomerRef::WalkIn,
        }
    }
}
