//! In-process change-notification bus.
//!
//! Mutating handlers publish a row-level [`ChangeEvent`] after each
//! successful write to one of the watched tables; the SSE endpoint in
//! `routes::events` fans them out to subscribed clients, filtered per
//! subscriber. Clients respond by re-fetching the affected collection.

use serde::Serialize;
use tokio::sync::broadcast;

use crate::db::models::Role;

/// Tables whose changes are pushed to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeTable {
    Profiles,
    Invitations,
    InvitationResponses,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeOp {
    Insert,
    Update,
    Delete,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChangeEvent {
    pub table: ChangeTable,
    pub op: ChangeOp,
    pub row_id: String,
    /// The user the row belongs to: the profile itself, the school behind
    /// an invitation, or the senior behind a response.
    pub owner_id: String,
    /// A second interested party, e.g. the school whose invitation a
    /// response answers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audience_id: Option<String>,
}

/// Whether `event` falls inside the visibility scope of the given user.
///
/// Own rows are always visible and admins see everything. Invitations are
/// an open feed for every senior; everything else needs an ownership or
/// audience match.
pub fn visible_to(event: &ChangeEvent, user_id: &str, role: Role) -> bool {
    if role == Role::Admin {
        return true;
    }
    if event.owner_id == user_id {
        return true;
    }
    if event.audience_id.as_deref() == Some(user_id) {
        return true;
    }
    match event.table {
        ChangeTable::Invitations => role == Role::Senior,
        _ => false,
    }
}

#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ChangeEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish an event. Having no subscribers is not an error.
    pub fn publish(&self, event: ChangeEvent) {
        let receivers = self.tx.receiver_count();
        tracing::debug!(?event, receivers, "publishing change event");
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
