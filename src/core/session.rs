//! Role selection persistence.
//!
//! The selected [`Actor`] is stored as JSON in the `system_state` table under a single
//! key, so it survives a restart. Reading is forgiving: an unreadable value is treated
//! as "no role selected".

use crate::{
    core::permissions::Actor,
    entities::{SystemState, system_state},
    errors::Result,
};
use chrono::Utc;
use sea_orm::{Set, prelude::*};
use tracing::{debug, warn};

/// `system_state` key holding the selected role.
pub const ROLE_KEY: &str = "attendance_role";

async fn find_slot<C>(db: &C) -> Result<Option<system_state::Model>>
where
    C: ConnectionTrait,
{
    SystemState::find()
        .filter(system_state::Column::Key.eq(ROLE_KEY))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Reads the selected actor, or [`Actor::none`] when nothing usable is stored.
pub async fn load_actor<C>(db: &C) -> Result<Actor>
where
    C: ConnectionTrait,
{
    let Some(slot) = find_slot(db).await? else {
        return Ok(Actor::none());
    };
    match serde_json::from_str(&slot.value) {
        Ok(actor) => Ok(actor),
        Err(e) => {
            warn!("Ignoring unreadable role selection: {e}");
            Ok(Actor::none())
        }
    }
}

/// Stores the selected actor, replacing any previous selection.
pub async fn save_actor<C>(db: &C, actor: &Actor) -> Result<()>
where
    C: ConnectionTrait,
{
    let value = serde_json::to_string(actor)?;
    let now = Utc::now().naive_utc();

    if let Some(slot) = find_slot(db).await? {
        let mut active_model: system_state::ActiveModel = slot.into();
        active_model.value = Set(value);
        active_model.updated_at = Set(now);
        active_model.update(db).await?;
    } else {
        let slot = system_state::ActiveModel {
            key: Set(ROLE_KEY.to_string()),
            value: Set(value),
            updated_at: Set(now),
            ..Default::default()
        };
        slot.insert(db).await?;
    }
    debug!(role = ?actor.role, "Role selection saved");
    Ok(())
}

/// Forgets the selection (role switch).
pub async fn clear_actor<C>(db: &C) -> Result<()>
where
    C: ConnectionTrait,
{
    SystemState::delete_many()
        .filter(system_state::Column::Key.eq(ROLE_KEY))
        .exec(db)
        .await?;
    debug!("Role selection cleared");
    Ok(())
}
