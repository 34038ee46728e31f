//! Puzzle resolution: using an item, and combining two items.
//!
//! Each resolution runs in a single transaction so an action is never marked
//! completed without its effect (or the reverse).

use delve_data::{ActionId, ActionKind, Direction, ItemAction, ItemId};
use log::{info, warn};
use rusqlite::Connection;

use crate::error::StoreResult;
use crate::mutation::{
    WorldMutator, mark_action_completed, remove_item, set_item_visibility, unlock_exit, upsert_placement,
};
use crate::query;
use crate::world::Location;

pub const NOTHING_NEW_MESSAGE: &str = "Nothing new happens.";
pub const CANNOT_USE_MESSAGE: &str = "You can't use that here.";
pub const TRIGGERED_MESSAGE: &str = "Something happens.";
pub const UNKNOWN_ACTION_MESSAGE: &str = "Nothing seems to happen.";
pub const COMBINED_MESSAGE: &str = "You combine them.";
pub const NOT_COMBINABLE_MESSAGE: &str = "Those can't be combined.";
pub const NO_RECIPE_MESSAGE: &str = "Nothing happens when you put those together.";

/// What came of using an item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UseOutcome {
    /// An action fired; `consumed` means the used item is gone.
    Triggered {
        action_id: ActionId,
        message: String,
        consumed: bool,
    },
    /// Every matching action has already fired.
    NothingNew,
    /// No action here; the item's own use message.
    UseMessage(String),
    CannotUseHere,
    /// The next action has a kind or target this engine cannot perform. Nothing changed.
    UnknownAction(String),
}

impl UseOutcome {
    /// Text to show the player.
    pub fn message(&self) -> &str {
        match self {
            UseOutcome::Triggered { message, .. } | UseOutcome::UseMessage(message) => message,
            UseOutcome::NothingNew => NOTHING_NEW_MESSAGE,
            UseOutcome::CannotUseHere => CANNOT_USE_MESSAGE,
            UseOutcome::UnknownAction(_) => UNKNOWN_ACTION_MESSAGE,
        }
    }
}

/// What came of combining two items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CombineOutcome {
    Combined { result: ItemId, message: String },
    NotCombinable,
    NoRecipe,
}

impl CombineOutcome {
    pub fn message(&self) -> &str {
        match self {
            CombineOutcome::Combined { message, .. } => message,
            CombineOutcome::NotCombinable => NOT_COMBINABLE_MESSAGE,
            CombineOutcome::NoRecipe => NO_RECIPE_MESSAGE,
        }
    }
}

/// Effect an action will have once its targets are resolved.
enum Effect {
    Reveal(ItemId),
    Remove(ItemId),
    Unlock(Direction),
}

impl WorldMutator<'_> {
    /// Use an item in the current room.
    ///
    /// Actions for the item bound to this room or to any room are tried in id order;
    /// the first not yet completed fires, is marked completed, and, if it consumes the
    /// item, removes the item from play.
    ///
    /// # Errors
    /// - `NotInitialized` if the store is closed
    /// - `NotFound` if the item or the game state is missing
    /// - `StorageFault` if any write fails; nothing is changed in that case
    pub fn use_item(&mut self, item_id: ItemId) -> StoreResult<UseOutcome> {
        let outcome = self
            .store
            .with_transaction("use item", |tx| resolve_use(tx, item_id))?;
        match &outcome {
            UseOutcome::Triggered { action_id, consumed, .. } => {
                info!("item {item_id} triggered action {action_id} (consumed: {consumed})");
            },
            UseOutcome::UnknownAction(detail) => warn!("item {item_id}: cannot perform action ({detail})"),
            _ => {},
        }
        Ok(outcome)
    }

    /// Combine two items by their combination rule.
    ///
    /// On success both sources leave play and the result is revealed in the inventory.
    ///
    /// # Errors
    /// - `NotInitialized` if the store is closed
    /// - `NotFound` if either item is missing
    /// - `StorageFault` if any write fails; nothing is changed in that case
    pub fn combine_items(&mut self, first: ItemId, second: ItemId) -> StoreResult<CombineOutcome> {
        let outcome = self
            .store
            .with_transaction("combine items", |tx| resolve_combine(tx, first, second))?;
        if let CombineOutcome::Combined { result, .. } = &outcome {
            info!("items {first} and {second} combined into item {result}");
        }
        Ok(outcome)
    }
}

fn resolve_use(conn: &Connection, item_id: ItemId) -> StoreResult<UseOutcome> {
    let item = query::item(conn, item_id)?;
    let here = query::game_state(conn)?.current_room;
    let actions = query::item_actions(conn, item_id, here)?;

    if actions.is_empty() {
        return Ok(item
            .use_message
            .filter(|m| !m.trim().is_empty())
            .map_or(UseOutcome::CannotUseHere, UseOutcome::UseMessage));
    }

    let mut pending = None;
    for action in actions {
        if !query::is_action_completed(conn, action.id)? {
            pending = Some(action);
            break;
        }
    }
    let Some(action) = pending else {
        return Ok(UseOutcome::NothingNew);
    };

    let effect = match effect_of(&action) {
        Ok(effect) => effect,
        Err(detail) => return Ok(UseOutcome::UnknownAction(detail)),
    };
    match effect {
        Effect::Reveal(target) => set_item_visibility(conn, target, true)?,
        Effect::Remove(target) => remove_item(conn, target)?,
        Effect::Unlock(direction) => unlock_exit(conn, here, direction)?,
    }

    mark_action_completed(conn, action.id)?;
    if action.consumes_item {
        remove_item(conn, item_id)?;
    }

    Ok(UseOutcome::Triggered {
        action_id: action.id,
        message: action
            .success_message
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| TRIGGERED_MESSAGE.to_string()),
        consumed: action.consumes_item,
    })
}

fn effect_of(action: &ItemAction) -> Result<Effect, String> {
    match &action.kind {
        ActionKind::RevealItem => action
            .target_item
            .map(Effect::Reveal)
            .ok_or_else(|| format!("action {} reveals no item", action.id)),
        ActionKind::RemoveItem => action
            .target_item
            .map(Effect::Remove)
            .ok_or_else(|| format!("action {} removes no item", action.id)),
        ActionKind::UnlockExit => action
            .direction()
            .map(Effect::Unlock)
            .ok_or_else(|| format!("action {} has no valid direction to unlock", action.id)),
        ActionKind::Other(kind) => Err(format!("unknown action kind '{kind}'")),
    }
}

fn resolve_combine(conn: &Connection, first: ItemId, second: ItemId) -> StoreResult<CombineOutcome> {
    let a = query::item(conn, first)?;
    let b = query::item(conn, second)?;
    if !a.can_combine || !b.can_combine {
        return Ok(CombineOutcome::NotCombinable);
    }
    let Some(rule) = query::combination(conn, first, second)? else {
        return Ok(CombineOutcome::NoRecipe);
    };

    remove_item(conn, first)?;
    remove_item(conn, second)?;
    upsert_placement(conn, rule.result, Location::Inventory)?;
    set_item_visibility(conn, rule.result, true)?;

    Ok(CombineOutcome::Combined {
        result: rule.result,
        message: rule
            .success_message
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| COMBINED_MESSAGE.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::WorldStore;
    use delve_data::{ExitConditionDraft, ItemActionDraft, ItemDraft};
    use tempfile::tempdir;

    fn starter() -> (tempfile::TempDir, WorldStore) {
        let dir = tempdir().expect("tempdir");
        let store = WorldStore::create(dir.path().join("world.db")).expect("create");
        (dir, store)
    }

    #[test]
    fn item_without_actions_falls_back() {
        let (_dir, mut store) = starter();
        assert_eq!(store.play().use_item(1).expect("use"), UseOutcome::CannotUseHere);

        let whistle = store
            .author()
            .create_item(&ItemDraft::new("Whistle", "A tin whistle.").usable(Some("Tweet!")), Location::Inventory)
            .expect("item");
        let outcome = store.play().use_item(whistle).expect("use");
        assert_eq!(outcome.message(), "Tweet!");
    }

    #[test]
    fn action_elsewhere_falls_back_to_use_message() {
        let (_dir, mut store) = starter();
        let rod = store
            .author()
            .create_item(&ItemDraft::new("Rod", "A rod.").usable(Some("It hums.")), Location::Inventory)
            .expect("rod");
        store
            .author()
            .create_item_action(&ItemActionDraft::reveal(rod, Some(2), 1))
            .expect("action");
        assert_eq!(
            store.play().use_item(rod).expect("use"),
            UseOutcome::UseMessage("It hums.".into())
        );
        assert!(!store.query().is_item_revealed(1).expect("revealed"));
    }

    #[test]
    fn unlock_action_opens_exit_and_consumes() {
        let (_dir, mut store) = starter();
        let key = store
            .author()
            .create_item(&ItemDraft::new("Key", "Iron key."), Location::Inventory)
            .expect("key");
        store
            .author()
            .create_exit_condition(&ExitConditionDraft {
                room_id: 1,
                direction: Direction::South,
                required_item: Some(key),
                locked_message: None,
            })
            .expect("lock");
        store
            .author()
            .create_item_action(&ItemActionDraft::unlock(key, Some(1), Direction::South).consuming())
            .expect("action");

        let outcome = store.play().use_item(key).expect("use");
        assert!(matches!(outcome, UseOutcome::Triggered { consumed: true, .. }));
        assert_eq!(outcome.message(), TRIGGERED_MESSAGE);
        assert!(!store.query().is_exit_locked(1, Direction::South).expect("lock"));
        assert!(store.query().inventory_items().expect("inv").is_empty());
    }

    #[test]
    fn unknown_kind_changes_nothing() {
        let (_dir, mut store) = starter();
        store
            .conn()
            .expect("conn")
            .execute(
                "INSERT INTO item_actions (item_id, room_id, action_type) VALUES (1, NULL, 'teleport')",
                [],
            )
            .expect("odd action");
        let outcome = store.play().use_item(1).expect("use");
        assert!(matches!(outcome, UseOutcome::UnknownAction(_)));
        let completed: i64 = store
            .conn()
            .expect("conn")
            .query_row("SELECT COUNT(*) FROM completed_actions", [], |r| r.get(0))
            .expect("count");
        assert_eq!(completed, 0);
    }

    #[test]
    fn combine_yields_result_in_inventory() {
        let (_dir, mut store) = starter();
        let mut author = store.author();
        let rope = author
            .create_item(&ItemDraft::new("Rope", "Rope.").combinable(), Location::Inventory)
            .expect("rope");
        let hook = author
            .create_item(&ItemDraft::new("Hook", "Hook.").combinable(), Location::Inventory)
            .expect("hook");
        let grapple = author
            .create_item(&ItemDraft::new("Grapple", "Grappling hook.").hidden(), Location::Room(1))
            .expect("grapple");
        author
            .create_combination(hook, rope, grapple, Some("You tie the rope to the hook."))
            .expect("rule");

        assert_eq!(store.play().combine_items(rope, 1).expect("combine"), CombineOutcome::NotCombinable);
        let outcome = store.play().combine_items(rope, hook).expect("combine");
        assert_eq!(outcome.message(), "You tie the rope to the hook.");

        let inventory: Vec<_> = store
            .query()
            .inventory_items()
            .expect("inv")
            .into_iter()
            .map(|i| i.id)
            .collect();
        assert_eq!(inventory, vec![grapple]);
        assert!(store.query().is_item_revealed(grapple).expect("revealed"));
    }

    #[test]
    fn combinable_pair_without_rule_has_no_recipe() {
        let (_dir, mut store) = starter();
        let mut author = store.author();
        let a = author
            .create_item(&ItemDraft::new("Flint", "Flint.").combinable(), Location::Inventory)
            .expect("a");
        let b = author
            .create_item(&ItemDraft::new("Steel", "Steel.").combinable(), Location::Inventory)
            .expect("b");
        assert_eq!(store.play().combine_items(a, b).expect("combine"), CombineOutcome::NoRecipe);
        assert_eq!(store.query().inventory_items().expect("inv").len(), 2);
    }
}
