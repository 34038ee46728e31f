//! Structural edits to the world: rooms, items, links, puzzles and the starting snapshot.

use delve_data::{
    ActionId, Direction, ExitConditionDraft, ItemActionDraft, ItemDraft, ItemId, RoomDraft, RoomId,
    ValidationError, non_empty, validate_action, validate_exit_condition, validate_item, validate_room,
};
use log::{info, warn};
use rusqlite::{Connection, OptionalExtension, params};

use crate::error::{StoreError, StoreResult};
use crate::mutation::upsert_placement;
use crate::query::room_exists;
use crate::schema::{exit_clear_sql, exit_update_sql};
use crate::store::WorldStore;
use crate::world::{Location, META_STARTING_ROOM};

/// Borrowed write access for world authoring.
#[derive(Debug)]
pub struct WorldAuthor<'a> {
    store: &'a mut WorldStore,
}

impl<'a> WorldAuthor<'a> {
    pub fn new(store: &'a mut WorldStore) -> Self {
        Self { store }
    }

    fn conn(&self) -> StoreResult<&Connection> {
        self.store.conn()
    }

    /// # Errors
    /// - `NotInitialized` if the store is closed
    /// - `BadValue` if the draft has no name
    pub fn create_room(&mut self, draft: &RoomDraft) -> StoreResult<RoomId> {
        check(validate_room(draft))?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO rooms (name, description, image_path, graph_x, graph_y) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                draft.name.trim(),
                draft.description,
                non_empty(draft.image_path.clone()),
                draft.x,
                draft.y
            ],
        )?;
        let id = conn.last_insert_rowid();
        info!("room {id} created: {}", draft.name.trim());
        Ok(id)
    }

    /// Replace a room's authored fields. Exits are left alone.
    ///
    /// # Errors
    /// - `NotInitialized` if the store is closed
    /// - `BadValue` if the draft has no name
    /// - `NotFound` if the room does not exist
    pub fn update_room(&mut self, id: RoomId, draft: &RoomDraft) -> StoreResult<()> {
        check(validate_room(draft))?;
        let changed = self.conn()?.execute(
            "UPDATE rooms SET name = ?1, description = ?2, image_path = ?3, graph_x = ?4, graph_y = ?5
             WHERE id = ?6",
            params![
                draft.name.trim(),
                draft.description,
                non_empty(draft.image_path.clone()),
                draft.x,
                draft.y,
                id
            ],
        )?;
        expect_row(changed, || format!("room {id}"))?;
        info!("room {id} updated");
        Ok(())
    }

    /// Delete a room in one transaction.
    ///
    /// The player, the starting-room setting and any items in the room move to the
    /// lowest-numbered other room; links from other rooms are cleared.
    ///
    /// # Errors
    /// - `NotInitialized` if the store is closed
    /// - `NotFound` if the room does not exist
    /// - `LastRoom` if no other room exists; nothing is changed
    /// - `StorageFault` if any step fails; nothing is changed
    pub fn delete_room(&mut self, id: RoomId) -> StoreResult<()> {
        let fallback = self.store.with_transaction("delete room", |tx| {
            if !room_exists(tx, id)? {
                return Err(StoreError::NotFound(format!("room {id}")));
            }
            let fallback: Option<RoomId> = tx
                .query_row(
                    "SELECT id FROM rooms WHERE id != ?1 ORDER BY id LIMIT 1",
                    params![id],
                    |row| row.get(0),
                )
                .optional()?;
            let fallback = fallback.ok_or(StoreError::LastRoom(id))?;

            tx.execute(
                "UPDATE game_state SET current_room_id = ?1 WHERE current_room_id = ?2",
                params![fallback, id],
            )?;
            tx.execute(
                "UPDATE game_metadata SET value = ?1 WHERE key = ?2 AND value = ?3",
                params![fallback.to_string(), META_STARTING_ROOM, id.to_string()],
            )?;
            tx.execute(
                "UPDATE item_locations SET room_id = ?1 WHERE room_id = ?2",
                params![fallback, id],
            )?;
            tx.execute(
                "UPDATE item_locations_initial SET room_id = ?1 WHERE room_id = ?2",
                params![fallback, id],
            )?;
            for direction in Direction::ALL {
                tx.execute(exit_clear_sql(direction), params![id])?;
            }
            tx.execute("DELETE FROM rooms WHERE id = ?1", params![id])?;
            Ok(fallback)
        })?;
        info!("room {id} deleted; dependents moved to room {fallback}");
        Ok(())
    }

    /// Point `room`'s exit in `direction` at `target`. The reverse link is not touched.
    ///
    /// # Errors
    /// - `NotInitialized` if the store is closed
    /// - `NotFound` if `room` does not exist
    /// - `StorageFault` if `target` does not exist
    pub fn connect_rooms(&mut self, room: RoomId, direction: Direction, target: RoomId) -> StoreResult<()> {
        let changed = self
            .conn()?
            .execute(exit_update_sql(direction), params![Some(target), room])?;
        expect_row(changed, || format!("room {room}"))?;
        info!("room {room} {direction} -> room {target}");
        Ok(())
    }

    /// # Errors
    /// - `NotInitialized` if the store is closed
    /// - `NotFound` if `room` does not exist
    pub fn disconnect_room(&mut self, room: RoomId, direction: Direction) -> StoreResult<()> {
        let changed = self
            .conn()?
            .execute(exit_update_sql(direction), params![None::<RoomId>, room])?;
        expect_row(changed, || format!("room {room}"))?;
        info!("room {room} {direction} exit cleared");
        Ok(())
    }

    /// Set a room's map coordinates.
    ///
    /// # Errors
    /// - `NotInitialized` if the store is closed
    /// - `NotFound` if the room does not exist
    pub fn set_room_position(&mut self, room: RoomId, x: i64, y: i64) -> StoreResult<()> {
        let changed = self.conn()?.execute(
            "UPDATE rooms SET graph_x = ?1, graph_y = ?2 WHERE id = ?3",
            params![x, y, room],
        )?;
        expect_row(changed, || format!("room {room}"))
    }

    /// Create an item with both a live and a starting placement at `location`.
    ///
    /// # Errors
    /// - `NotInitialized` if the store is closed
    /// - `BadValue` if the draft has no name
    /// - `StorageFault` if the room does not exist or a write fails; nothing is changed
    pub fn create_item(&mut self, draft: &ItemDraft, location: Location) -> StoreResult<ItemId> {
        check(validate_item(draft))?;
        let id = self.store.with_transaction("create item", |tx| {
            tx.execute(
                "INSERT INTO items (name, description, room_description, image_path, can_take, can_use,
                                    can_combine, use_message, is_visible)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    draft.name.trim(),
                    draft.description,
                    non_empty(draft.room_description.clone()),
                    non_empty(draft.image_path.clone()),
                    draft.can_take,
                    draft.can_use,
                    draft.can_combine,
                    non_empty(draft.use_message.clone()),
                    draft.is_visible
                ],
            )?;
            let id = tx.last_insert_rowid();
            upsert_placement(tx, id, location)?;
            tx.execute(
                "INSERT OR REPLACE INTO item_locations_initial (item_id, room_id) VALUES (?1, ?2)",
                params![id, location.to_column()],
            )?;
            Ok(id)
        })?;
        info!("item {id} created: {} at {location:?}", draft.name.trim());
        Ok(id)
    }

    /// Replace an item's authored fields. Placement is left alone.
    ///
    /// # Errors
    /// - `NotInitialized` if the store is closed
    /// - `BadValue` if the draft has no name
    /// - `NotFound` if the item does not exist
    pub fn update_item(&mut self, id: ItemId, draft: &ItemDraft) -> StoreResult<()> {
        check(validate_item(draft))?;
        let changed = self.conn()?.execute(
            "UPDATE items SET name = ?1, description = ?2, room_description = ?3, image_path = ?4,
                              can_take = ?5, can_use = ?6, can_combine = ?7, use_message = ?8,
                              is_visible = ?9
             WHERE id = ?10",
            params![
                draft.name.trim(),
                draft.description,
                non_empty(draft.room_description.clone()),
                non_empty(draft.image_path.clone()),
                draft.can_take,
                draft.can_use,
                draft.can_combine,
                non_empty(draft.use_message.clone()),
                draft.is_visible,
                id
            ],
        )?;
        expect_row(changed, || format!("item {id}"))?;
        info!("item {id} updated");
        Ok(())
    }

    /// Delete an item. Placements, actions, combinations and log rows referencing it
    /// go with it; exit conditions requiring it lose the requirement.
    ///
    /// # Errors
    /// - `NotInitialized` if the store is closed
    /// - `NotFound` if the item does not exist
    pub fn delete_item(&mut self, id: ItemId) -> StoreResult<()> {
        let changed = self.conn()?.execute("DELETE FROM items WHERE id = ?1", params![id])?;
        expect_row(changed, || format!("item {id}"))?;
        info!("item {id} deleted");
        Ok(())
    }

    /// Set an item's live placement, creating it if missing.
    ///
    /// # Errors
    /// - `NotInitialized` if the store is closed
    /// - `StorageFault` if the item or room does not exist
    pub fn place_item(&mut self, item: ItemId, location: Location) -> StoreResult<()> {
        upsert_placement(self.conn()?, item, location)?;
        info!("item {item} placed at {location:?}");
        Ok(())
    }

    /// # Errors
    /// - `NotInitialized` if the store is closed
    /// - `BadValue` if the draft lacks the target its kind needs
    /// - `StorageFault` if a referenced item or room does not exist
    pub fn create_item_action(&mut self, draft: &ItemActionDraft) -> StoreResult<ActionId> {
        check(validate_action(draft))?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO item_actions (item_id, room_id, action_type, target_item_id, target_direction,
                                       success_message, consumes_item)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                draft.item_id,
                draft.room_id,
                draft.kind.as_key(),
                draft.target_item,
                draft.target_direction.map(Direction::as_str),
                non_empty(draft.success_message.clone()),
                draft.consumes_item
            ],
        )?;
        let id = conn.last_insert_rowid();
        info!("action {id} created: {} on item {}", draft.kind, draft.item_id);
        Ok(id)
    }

    /// # Errors
    /// - `NotInitialized` if the store is closed
    /// - `NotFound` if the action does not exist
    pub fn delete_item_action(&mut self, id: ActionId) -> StoreResult<()> {
        let changed = self
            .conn()?
            .execute("DELETE FROM item_actions WHERE id = ?1", params![id])?;
        expect_row(changed, || format!("item action {id}"))?;
        info!("action {id} deleted");
        Ok(())
    }

    /// Lock an exit, replacing any existing condition on it.
    ///
    /// # Errors
    /// - `NotInitialized` if the store is closed
    /// - `BadValue` for non-positive ids
    /// - `StorageFault` if the room or required item does not exist
    pub fn create_exit_condition(&mut self, draft: &ExitConditionDraft) -> StoreResult<i64> {
        check(validate_exit_condition(draft))?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO exit_conditions (room_id, direction, is_locked, required_item_id, locked_message)
             VALUES (?1, ?2, 1, ?3, ?4)",
            params![
                draft.room_id,
                draft.direction.as_str(),
                draft.required_item,
                non_empty(draft.locked_message.clone())
            ],
        )?;
        let id = conn.last_insert_rowid();
        info!("exit {} of room {} locked", draft.direction, draft.room_id);
        Ok(id)
    }

    /// # Errors
    /// - `NotInitialized` if the store is closed
    /// - `NotFound` if no condition exists for the exit
    pub fn delete_exit_condition(&mut self, room: RoomId, direction: Direction) -> StoreResult<()> {
        let changed = self.conn()?.execute(
            "DELETE FROM exit_conditions WHERE room_id = ?1 AND direction = ?2",
            params![room, direction.as_str()],
        )?;
        expect_row(changed, || format!("exit condition on {direction} of room {room}"))?;
        info!("exit {direction} of room {room} no longer locked");
        Ok(())
    }

    /// Define what combining `a` and `b` (in either order) yields. Replaces an
    /// existing rule for the pair.
    ///
    /// # Errors
    /// - `NotInitialized` if the store is closed
    /// - `BadValue` if `a` and `b` are the same item
    /// - `StorageFault` if any item does not exist
    pub fn create_combination(
        &mut self,
        a: ItemId,
        b: ItemId,
        result: ItemId,
        message: Option<&str>,
    ) -> StoreResult<i64> {
        let (first, second) = ordered_pair(a, b)?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO item_combinations (item1_id, item2_id, result_item_id, success_message)
             VALUES (?1, ?2, ?3, ?4)",
            params![first, second, result, non_empty(message.map(str::to_string))],
        )?;
        let id = conn.last_insert_rowid();
        info!("combination {id}: items {first} + {second} -> item {result}");
        Ok(id)
    }

    /// # Errors
    /// - `NotInitialized` if the store is closed
    /// - `BadValue` if `a` and `b` are the same item
    /// - `NotFound` if no rule exists for the pair
    pub fn delete_combination(&mut self, a: ItemId, b: ItemId) -> StoreResult<()> {
        let (first, second) = ordered_pair(a, b)?;
        let changed = self.conn()?.execute(
            "DELETE FROM item_combinations WHERE item1_id = ?1 AND item2_id = ?2",
            params![first, second],
        )?;
        expect_row(changed, || format!("combination of items {first} and {second}"))
    }

    /// Freeze current live placements as the configuration a reset restores.
    ///
    /// # Errors
    /// - `NotInitialized` if the store is closed
    /// - `StorageFault` if the copy fails; the old snapshot is kept
    pub fn save_as_initial_state(&mut self) -> StoreResult<()> {
        self.store.with_transaction("save initial state", |tx| {
            tx.execute_batch(
                "DELETE FROM item_locations_initial;
                 INSERT INTO item_locations_initial (item_id, room_id)
                     SELECT item_id, room_id FROM item_locations;",
            )?;
            Ok(())
        })?;
        info!("current placements saved as initial state");
        Ok(())
    }

    /// Reset play state so editing starts from the authored baseline.
    ///
    /// # Errors
    /// - see [`crate::WorldMutator::clear_game_state`]
    pub fn clear_game_state(&mut self) -> StoreResult<()> {
        self.store.play().clear_game_state()
    }

    /// # Errors
    /// - `NotInitialized` if the store is closed
    /// - `BadValue` if the key is blank
    pub fn set_metadata(&mut self, key: &str, value: &str) -> StoreResult<()> {
        if key.trim().is_empty() {
            return Err(StoreError::BadValue("metadata key is empty".into()));
        }
        self.conn()?.execute(
            "INSERT OR REPLACE INTO game_metadata (key, value) VALUES (?1, ?2)",
            params![key.trim(), value],
        )?;
        info!("metadata '{}' set", key.trim());
        Ok(())
    }

    /// Choose the room a reset puts the player in.
    ///
    /// # Errors
    /// - `NotInitialized` if the store is closed
    /// - `NotFound` if the room does not exist
    pub fn set_starting_room(&mut self, room: RoomId) -> StoreResult<()> {
        if !room_exists(self.conn()?, room)? {
            return Err(StoreError::NotFound(format!("room {room}")));
        }
        self.set_metadata(META_STARTING_ROOM, &room.to_string())
    }
}

fn check(errors: Vec<ValidationError>) -> StoreResult<()> {
    if errors.is_empty() {
        Ok(())
    } else {
        warn!("rejected draft: {} problem(s)", errors.len());
        Err(StoreError::from_validation(&errors))
    }
}

fn expect_row(changed: usize, what: impl FnOnce() -> String) -> StoreResult<()> {
    if changed == 0 {
        Err(StoreError::NotFound(what()))
    } else {
        Ok(())
    }
}

/// Combination rules are stored with the smaller id first.
fn ordered_pair(a: ItemId, b: ItemId) -> StoreResult<(ItemId, ItemId)> {
    if a == b {
        return Err(StoreError::BadValue(format!("item {a} cannot be combined with itself")));
    }
    Ok((a.min(b), a.max(b)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn starter() -> (tempfile::TempDir, WorldStore) {
        let dir = tempdir().expect("tempdir");
        let store = WorldStore::create(dir.path().join("world.db")).expect("create");
        (dir, store)
    }

    #[test]
    fn blank_room_name_touches_nothing() {
        let (_dir, mut store) = starter();
        let err = store.author().create_room(&RoomDraft::new(" ", "x")).unwrap_err();
        assert!(matches!(err, StoreError::BadValue(_)));
        assert_eq!(store.query().rooms().expect("rooms").len(), 2);
    }

    #[test]
    fn connect_and_disconnect_one_direction() {
        let (_dir, mut store) = starter();
        let hall = store.author().create_room(&RoomDraft::new("Hall", "")).expect("hall");
        store.author().connect_rooms(1, Direction::East, hall).expect("connect");
        assert_eq!(store.query().room(1).expect("room").east, Some(hall));
        assert_eq!(store.query().room(hall).expect("hall").west, None);
        store.author().disconnect_room(1, Direction::East).expect("disconnect");
        assert_eq!(store.query().room(1).expect("room").east, None);
    }

    #[test]
    fn updating_missing_rows_is_not_found() {
        let (_dir, mut store) = starter();
        let mut author = store.author();
        assert!(matches!(author.update_room(77, &RoomDraft::new("X", "")), Err(StoreError::NotFound(_))));
        assert!(matches!(author.update_item(77, &ItemDraft::new("X", "")), Err(StoreError::NotFound(_))));
        assert!(matches!(author.delete_item(77), Err(StoreError::NotFound(_))));
        assert!(matches!(author.delete_item_action(77), Err(StoreError::NotFound(_))));
        assert!(matches!(author.connect_rooms(77, Direction::North, 1), Err(StoreError::NotFound(_))));
        assert!(matches!(author.set_starting_room(77), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn delete_room_moves_player_and_items_to_fallback() {
        let (_dir, mut store) = starter();
        store.play().move_to_room(2).expect("move");
        store.author().delete_room(2).expect("delete");
        let query = store.query();
        assert_eq!(query.game_state().expect("state").current_room, 1);
        assert_eq!(query.room(1).expect("cave").south, None);
        assert_eq!(query.items_in_room(1).expect("items").len(), 2);
        assert!(query.initial_placements().expect("initial").iter().all(|(_, loc)| *loc == Location::Room(1)));
    }

    #[test]
    fn delete_room_redirects_starting_room() {
        let (_dir, mut store) = starter();
        store.author().delete_room(1).expect("delete");
        assert_eq!(store.query().metadata(META_STARTING_ROOM).expect("meta").as_deref(), Some("2"));
        store.author().clear_game_state().expect("reset");
        assert_eq!(store.query().game_state().expect("state").current_room, 2);
    }

    #[test]
    fn exit_condition_is_replaced_not_duplicated() {
        let (_dir, mut store) = starter();
        let mut draft = ExitConditionDraft {
            room_id: 1,
            direction: Direction::South,
            required_item: None,
            locked_message: Some("Rocks.".into()),
        };
        store.author().create_exit_condition(&draft).expect("first");
        draft.locked_message = Some(String::new());
        store.author().create_exit_condition(&draft).expect("second");
        let cond = store
            .query()
            .exit_condition(1, Direction::South)
            .expect("query")
            .expect("condition");
        assert_eq!(cond.locked_message, None);
        assert_eq!(cond.message(), delve_data::DEFAULT_LOCKED_MESSAGE);
        store.author().delete_exit_condition(1, Direction::South).expect("delete");
        assert!(matches!(
            store.author().delete_exit_condition(1, Direction::South),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn combination_pairs_are_normalised() {
        let (_dir, mut store) = starter();
        assert!(matches!(
            store.author().create_combination(1, 1, 2, None),
            Err(StoreError::BadValue(_))
        ));
        store.author().create_combination(2, 1, 1, None).expect("rule");
        let rule = store.query().combination(1, 2).expect("query").expect("rule");
        assert_eq!((rule.first, rule.second), (1, 2));
        store.author().delete_combination(1, 2).expect("delete");
        assert_eq!(store.query().combination(2, 1).expect("query"), None);
    }

    #[test]
    fn item_action_optional_fields_are_null() {
        let (_dir, mut store) = starter();
        let id = store
            .author()
            .create_item_action(&ItemActionDraft::reveal(1, None, 2).with_message(""))
            .expect("action");
        let actions = store.query().item_actions(1, 1).expect("actions");
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].id, id);
        assert_eq!(actions[0].success_message, None);
        assert_eq!(actions[0].target_direction, None);
        assert_eq!(actions[0].room_id, None);
    }

    #[test]
    fn invalid_action_draft_is_bad_value() {
        let (_dir, mut store) = starter();
        let mut draft = ItemActionDraft::unlock(1, Some(1), Direction::North);
        draft.target_direction = None;
        assert!(matches!(store.author().create_item_action(&draft), Err(StoreError::BadValue(_))));
    }

    #[test]
    fn room_position_is_stored() {
        let (_dir, mut store) = starter();
        store.author().set_room_position(2, 300, -100).expect("position");
        let room = store.query().room(2).expect("room");
        assert_eq!((room.x, room.y), (300, -100));
    }

    #[test]
    fn metadata_and_starting_room() {
        let (_dir, mut store) = starter();
        let mut author = store.author();
        assert!(matches!(author.set_metadata("  ", "x"), Err(StoreError::BadValue(_))));
        author.set_metadata("title", "Sunken Keep").expect("title");
        author.set_starting_room(2).expect("start");
        author.clear_game_state().expect("reset");
        let query = store.query();
        assert_eq!(query.metadata("title").expect("title").as_deref(), Some("Sunken Keep"));
        assert_eq!(query.game_state().expect("state").current_room, 2);
    }
}
