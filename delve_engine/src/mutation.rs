//! State changes made while playing.
//!
//! One-time effects are recorded in the event-log tables with `INSERT OR IGNORE`, so
//! repeating any of them is harmless. Resetting the game truncates those logs and
//! restores the authored starting placements.

use delve_data::{DEFAULT_HEALTH, DEFAULT_LOCKED_MESSAGE, Direction, ItemId, RoomId};
use log::{debug, info};
use rusqlite::{Connection, params};
use variantly::Variantly;

use crate::error::{StoreError, StoreResult};
use crate::query;
use crate::store::{WorldStore, unix_now};
use crate::world::{Location, META_STARTING_ROOM};

/// Borrowed write access for gameplay.
#[derive(Debug)]
pub struct WorldMutator<'a> {
    pub(crate) store: &'a mut WorldStore,
}

/// Result of trying to leave the current room.
#[derive(Debug, Clone, PartialEq, Eq, Variantly)]
pub enum TravelOutcome {
    NoExit,
    Locked(String),
    Moved(RoomId),
}

/// Result of trying to pick an item up.
#[derive(Debug, Clone, PartialEq, Eq, Variantly)]
pub enum TakeOutcome {
    Taken,
    CannotTake,
}

impl<'a> WorldMutator<'a> {
    pub fn new(store: &'a mut WorldStore) -> Self {
        Self { store }
    }

    fn conn(&self) -> StoreResult<&Connection> {
        self.store.conn()
    }

    /// Put the player in `room_id` and count one move. Reachability is not checked.
    ///
    /// # Errors
    /// - `NotInitialized` if the store is closed
    /// - `StorageFault` if the room does not exist (foreign key) or the write fails
    pub fn move_to_room(&mut self, room_id: RoomId) -> StoreResult<()> {
        move_to_room(self.conn()?, room_id)
    }

    /// # Errors
    /// - `NotInitialized` if the store is closed
    /// - `NotFound` if the item has no placement
    pub fn move_item_to_inventory(&mut self, item_id: ItemId) -> StoreResult<()> {
        set_item_location(self.conn()?, item_id, Location::Inventory)
    }

    /// # Errors
    /// - `NotInitialized` if the store is closed
    /// - `NotFound` if the item has no placement
    /// - `StorageFault` if the room does not exist
    pub fn move_item_to_room(&mut self, item_id: ItemId, room_id: RoomId) -> StoreResult<()> {
        set_item_location(self.conn()?, item_id, Location::Room(room_id))
    }

    /// Record an action as done. Marking twice is a no-op.
    ///
    /// # Errors
    /// - `NotInitialized` if the store is closed
    /// - `StorageFault` if the action does not exist
    pub fn mark_action_completed(&mut self, action_id: i64) -> StoreResult<()> {
        mark_action_completed(self.conn()?, action_id)
    }

    /// # Errors
    /// - `NotInitialized` if the store is closed
    pub fn is_action_completed(&self, action_id: i64) -> StoreResult<bool> {
        query::is_action_completed(self.conn()?, action_id)
    }

    /// `true` logs the item as revealed, `false` withdraws the reveal. The item's
    /// authored visibility flag is never touched.
    ///
    /// # Errors
    /// - `NotInitialized` if the store is closed
    /// - `StorageFault` if the item does not exist
    pub fn set_item_visibility(&mut self, item_id: ItemId, visible: bool) -> StoreResult<()> {
        set_item_visibility(self.conn()?, item_id, visible)
    }

    /// Take an item out of play. Its placement row stays; queries filter it out.
    ///
    /// # Errors
    /// - `NotInitialized` if the store is closed
    /// - `StorageFault` if the item does not exist
    pub fn remove_item_from_room(&mut self, item_id: ItemId) -> StoreResult<()> {
        remove_item(self.conn()?, item_id)
    }

    /// # Errors
    /// - `NotInitialized` if the store is closed
    /// - `StorageFault` if the room does not exist
    pub fn unlock_exit(&mut self, room_id: RoomId, direction: Direction) -> StoreResult<()> {
        unlock_exit(self.conn()?, room_id, direction)
    }

    /// # Errors
    /// - `NotInitialized` if the store is closed
    pub fn is_exit_locked(&self, room_id: RoomId, direction: Direction) -> StoreResult<bool> {
        query::is_exit_locked(self.conn()?, room_id, direction)
    }

    /// Overwrite score and health, leaving room and move count alone.
    ///
    /// # Errors
    /// - `NotInitialized` if the store is closed
    /// - `NotFound` if the game-state row is missing
    pub fn update_game_state(&mut self, score: i64, health: i64) -> StoreResult<()> {
        let changed = self.conn()?.execute(
            "UPDATE game_state SET score = ?1, health = ?2 WHERE id = 1",
            params![score, health],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound("game state".into()));
        }
        debug!("game state updated: score {score}, health {health}");
        Ok(())
    }

    /// Pick up an item if its authored flags allow it.
    ///
    /// # Errors
    /// - `NotInitialized` if the store is closed
    /// - `NotFound` if the item does not exist or has no placement
    pub fn take_item(&mut self, item_id: ItemId) -> StoreResult<TakeOutcome> {
        let conn = self.conn()?;
        let item = query::item(conn, item_id)?;
        if !item.can_take {
            return Ok(TakeOutcome::CannotTake);
        }
        set_item_location(conn, item_id, Location::Inventory)?;
        info!("player took '{}' (item {item_id})", item.name);
        Ok(TakeOutcome::Taken)
    }

    /// Put an item down in the current room, returning that room.
    ///
    /// # Errors
    /// - `NotInitialized` if the store is closed
    /// - `NotFound` if the item has no placement or the game state is missing
    pub fn drop_item(&mut self, item_id: ItemId) -> StoreResult<RoomId> {
        let conn = self.conn()?;
        let room = query::game_state(conn)?.current_room;
        set_item_location(conn, item_id, Location::Room(room))?;
        info!("player dropped item {item_id} in room {room}");
        Ok(room)
    }

    /// Follow the current room's exit in `direction`, honouring exit locks.
    ///
    /// # Errors
    /// - `NotInitialized` if the store is closed
    /// - `NotFound` if the current room or game state is missing
    pub fn travel(&mut self, direction: Direction) -> StoreResult<TravelOutcome> {
        let conn = self.conn()?;
        let here = query::game_state(conn)?.current_room;
        let Some(target) = query::neighbor(conn, here, direction)? else {
            return Ok(TravelOutcome::NoExit);
        };
        if query::is_exit_locked(conn, here, direction)? {
            let message = query::exit_condition(conn, here, direction)?
                .map_or_else(|| DEFAULT_LOCKED_MESSAGE.to_string(), |cond| cond.message().to_string());
            return Ok(TravelOutcome::Locked(message));
        }
        move_to_room(conn, target)?;
        Ok(TravelOutcome::Moved(target))
    }

    /// Restore the authored starting configuration in one transaction.
    ///
    /// # Errors
    /// - `NotInitialized` if the store is closed
    /// - `StorageFault` if the starting-room metadata is missing or not a number, or any
    ///   statement fails; nothing is changed in that case
    pub fn clear_game_state(&mut self) -> StoreResult<()> {
        let start_time = unix_now();
        self.store
            .with_transaction("clear game state", |tx| reset_game_state(tx, start_time))?;
        info!("game state reset to initial configuration");
        Ok(())
    }
}

pub(crate) fn move_to_room(conn: &Connection, room_id: RoomId) -> StoreResult<()> {
    let changed = conn.execute(
        "UPDATE game_state SET current_room_id = ?1, moves_count = moves_count + 1 WHERE id = 1",
        params![room_id],
    )?;
    if changed == 0 {
        return Err(StoreError::NotFound("game state".into()));
    }
    debug!("player moved to room {room_id}");
    Ok(())
}

pub(crate) fn set_item_location(conn: &Connection, item_id: ItemId, location: Location) -> StoreResult<()> {
    let changed = conn.execute(
        "UPDATE item_locations SET room_id = ?1 WHERE item_id = ?2",
        params![location.to_column(), item_id],
    )?;
    if changed == 0 {
        return Err(StoreError::NotFound(format!("placement of item {item_id}")));
    }
    debug!("item {item_id} now at {location:?}");
    Ok(())
}

/// Insert or replace an item's live placement.
pub(crate) fn upsert_placement(conn: &Connection, item_id: ItemId, location: Location) -> StoreResult<()> {
    conn.execute(
        "INSERT OR REPLACE INTO item_locations (item_id, room_id) VALUES (?1, ?2)",
        params![item_id, location.to_column()],
    )?;
    Ok(())
}

pub(crate) fn mark_action_completed(conn: &Connection, action_id: i64) -> StoreResult<()> {
    conn.execute(
        "INSERT OR IGNORE INTO completed_actions (action_id) VALUES (?1)",
        params![action_id],
    )?;
    Ok(())
}

pub(crate) fn set_item_visibility(conn: &Connection, item_id: ItemId, visible: bool) -> StoreResult<()> {
    if visible {
        conn.execute(
            "INSERT OR IGNORE INTO revealed_items (item_id) VALUES (?1)",
            params![item_id],
        )?;
    } else {
        conn.execute("DELETE FROM revealed_items WHERE item_id = ?1", params![item_id])?;
    }
    Ok(())
}

pub(crate) fn remove_item(conn: &Connection, item_id: ItemId) -> StoreResult<()> {
    conn.execute(
        "INSERT OR IGNORE INTO removed_items (item_id) VALUES (?1)",
        params![item_id],
    )?;
    Ok(())
}

pub(crate) fn unlock_exit(conn: &Connection, room_id: RoomId, direction: Direction) -> StoreResult<()> {
    conn.execute(
        "INSERT OR IGNORE INTO unlocked_exits (room_id, direction) VALUES (?1, ?2)",
        params![room_id, direction.as_str()],
    )?;
    Ok(())
}

/// Truncate the event logs, restore starting placements and restart the session.
pub(crate) fn reset_game_state(conn: &Connection, start_time: i64) -> StoreResult<()> {
    let starting_room = starting_room(conn)?;
    conn.execute_batch(
        "DELETE FROM completed_actions;
         DELETE FROM removed_items;
         DELETE FROM revealed_items;
         DELETE FROM unlocked_exits;
         DELETE FROM item_locations;
         INSERT INTO item_locations (item_id, room_id)
             SELECT item_id, room_id FROM item_locations_initial;",
    )?;
    conn.execute(
        "INSERT OR REPLACE INTO game_state (id, current_room_id, score, health, moves_count, start_time)
         VALUES (1, ?1, 0, ?2, 0, ?3)",
        params![starting_room, DEFAULT_HEALTH, start_time],
    )?;
    Ok(())
}

fn starting_room(conn: &Connection) -> StoreResult<RoomId> {
    let raw = query::metadata(conn, META_STARTING_ROOM)?
        .ok_or_else(|| StoreError::StorageFault(format!("metadata '{META_STARTING_ROOM}' is missing")))?;
    raw.trim()
        .parse::<RoomId>()
        .map_err(|_| StoreError::StorageFault(format!("metadata '{META_STARTING_ROOM}' is not a room id: '{raw}'")))
}
