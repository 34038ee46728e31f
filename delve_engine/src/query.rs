//! Read-only projections over a world store.
//!
//! The free functions take any `&Connection` so mutations can reuse them inside a
//! transaction; `WorldQuery` is the public face that borrows an open store.

use std::collections::BTreeMap;

use delve_data::{
    ActionKind, Direction, ExitCondition, GameState, Item, ItemAction, ItemCombination, ItemId, Room, RoomId,
};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::error::{StoreError, StoreResult};
use crate::schema::exit_select_sql;
use crate::store::WorldStore;
use crate::world::{Location, Placement};

const ROOM_COLUMNS: &str = "id, name, description, image_path, north_room_id, south_room_id, east_room_id, \
                            west_room_id, graph_x, graph_y";

const ITEM_COLUMNS: &str = "i.id, i.name, i.description, i.room_description, i.image_path, i.can_take, \
                            i.can_use, i.can_combine, i.use_message, i.is_visible";

const ACTION_COLUMNS: &str =
    "id, item_id, room_id, action_type, target_item_id, target_direction, success_message, consumes_item";

/// Borrowed read access to an open store.
#[derive(Debug, Clone, Copy)]
pub struct WorldQuery<'a> {
    store: &'a WorldStore,
}

impl<'a> WorldQuery<'a> {
    pub fn new(store: &'a WorldStore) -> Self {
        Self { store }
    }

    fn conn(&self) -> StoreResult<&'a Connection> {
        self.store.conn()
    }

    /// Fetch one room. Unset exits come back as `None`.
    ///
    /// # Errors
    /// - `NotInitialized` if the store is closed
    /// - `NotFound` if no room has this id
    pub fn room(&self, id: RoomId) -> StoreResult<Room> {
        room(self.conn()?, id)
    }

    /// Every room, ordered by id.
    ///
    /// # Errors
    /// - `NotInitialized` if the store is closed
    pub fn rooms(&self) -> StoreResult<Vec<Room>> {
        rooms(self.conn()?)
    }

    /// Items lying in a room that are neither removed nor hidden.
    ///
    /// # Errors
    /// - `NotInitialized` if the store is closed
    pub fn items_in_room(&self, room_id: RoomId) -> StoreResult<Vec<Item>> {
        items_in_room(self.conn()?, room_id)
    }

    /// Items the player carries, excluding removed ones.
    ///
    /// # Errors
    /// - `NotInitialized` if the store is closed
    pub fn inventory_items(&self) -> StoreResult<Vec<Item>> {
        inventory_items(self.conn()?)
    }

    /// # Errors
    /// - `NotInitialized` if the store is closed
    /// - `NotFound` if the game-state row is missing
    pub fn game_state(&self) -> StoreResult<GameState> {
        game_state(self.conn()?)
    }

    /// Actions on `item_id` bound to `room_id` or to any room, in id order.
    /// Completed actions are included.
    ///
    /// # Errors
    /// - `NotInitialized` if the store is closed
    pub fn item_actions(&self, item_id: ItemId, room_id: RoomId) -> StoreResult<Vec<ItemAction>> {
        item_actions(self.conn()?, item_id, room_id)
    }

    /// # Errors
    /// - `NotInitialized` if the store is closed
    /// - `NotFound` if no item has this id
    pub fn item(&self, id: ItemId) -> StoreResult<Item> {
        item(self.conn()?, id)
    }

    /// Every item regardless of placement or visibility, ordered by id.
    ///
    /// # Errors
    /// - `NotInitialized` if the store is closed
    pub fn items(&self) -> StoreResult<Vec<Item>> {
        items(self.conn()?)
    }

    /// # Errors
    /// - `NotInitialized` if the store is closed
    /// - `NotFound` if the item has no placement
    pub fn item_location(&self, id: ItemId) -> StoreResult<Location> {
        item_location(self.conn()?, id)
    }

    /// Live placements ordered by item id.
    ///
    /// # Errors
    /// - `NotInitialized` if the store is closed
    pub fn placements(&self) -> StoreResult<Vec<Placement>> {
        placements(self.conn()?, PlacementTable::Live)
    }

    /// Authored starting placements ordered by item id.
    ///
    /// # Errors
    /// - `NotInitialized` if the store is closed
    pub fn initial_placements(&self) -> StoreResult<Vec<Placement>> {
        placements(self.conn()?, PlacementTable::Initial)
    }

    /// # Errors
    /// - `NotInitialized` if the store is closed
    pub fn exit_condition(&self, room_id: RoomId, direction: Direction) -> StoreResult<Option<ExitCondition>> {
        exit_condition(self.conn()?, room_id, direction)
    }

    /// The combination rule for an unordered pair, if any.
    ///
    /// # Errors
    /// - `NotInitialized` if the store is closed
    pub fn combination(&self, a: ItemId, b: ItemId) -> StoreResult<Option<ItemCombination>> {
        combination(self.conn()?, a, b)
    }

    /// # Errors
    /// - `NotInitialized` if the store is closed
    pub fn metadata(&self, key: &str) -> StoreResult<Option<String>> {
        metadata(self.conn()?, key)
    }

    /// # Errors
    /// - `NotInitialized` if the store is closed
    pub fn all_metadata(&self) -> StoreResult<BTreeMap<String, String>> {
        all_metadata(self.conn()?)
    }

    /// # Errors
    /// - `NotInitialized` if the store is closed
    /// - `NotFound` if the room does not exist
    pub fn neighbor(&self, room_id: RoomId, direction: Direction) -> StoreResult<Option<RoomId>> {
        neighbor(self.conn()?, room_id, direction)
    }

    /// # Errors
    /// - `NotInitialized` if the store is closed
    pub fn is_item_removed(&self, id: ItemId) -> StoreResult<bool> {
        is_item_removed(self.conn()?, id)
    }

    /// # Errors
    /// - `NotInitialized` if the store is closed
    pub fn is_item_revealed(&self, id: ItemId) -> StoreResult<bool> {
        is_item_revealed(self.conn()?, id)
    }

    /// # Errors
    /// - `NotInitialized` if the store is closed
    pub fn is_action_completed(&self, action_id: i64) -> StoreResult<bool> {
        is_action_completed(self.conn()?, action_id)
    }

    /// # Errors
    /// - `NotInitialized` if the store is closed
    pub fn is_exit_locked(&self, room_id: RoomId, direction: Direction) -> StoreResult<bool> {
        is_exit_locked(self.conn()?, room_id, direction)
    }
}

/// Which placement table to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PlacementTable {
    Live,
    Initial,
}

impl PlacementTable {
    fn select_sql(self) -> &'static str {
        match self {
            PlacementTable::Live => "SELECT item_id, room_id FROM item_locations ORDER BY item_id",
            PlacementTable::Initial => "SELECT item_id, room_id FROM item_locations_initial ORDER BY item_id",
        }
    }
}

fn map_room(row: &Row<'_>) -> rusqlite::Result<Room> {
    Ok(Room {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        image_path: row.get(3)?,
        north: row.get(4)?,
        south: row.get(5)?,
        east: row.get(6)?,
        west: row.get(7)?,
        x: row.get(8)?,
        y: row.get(9)?,
    })
}

fn map_item(row: &Row<'_>) -> rusqlite::Result<Item> {
    Ok(Item {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        room_description: row.get(3)?,
        image_path: row.get(4)?,
        can_take: row.get(5)?,
        can_use: row.get(6)?,
        can_combine: row.get(7)?,
        use_message: row.get(8)?,
        is_visible: row.get(9)?,
    })
}

fn map_action(row: &Row<'_>) -> rusqlite::Result<ItemAction> {
    let kind: String = row.get(3)?;
    Ok(ItemAction {
        id: row.get(0)?,
        item_id: row.get(1)?,
        room_id: row.get(2)?,
        kind: ActionKind::from_key(&kind),
        target_item: row.get(4)?,
        target_direction: row.get(5)?,
        success_message: row.get(6)?,
        consumes_item: row.get(7)?,
    })
}

fn map_exit_condition(row: &Row<'_>) -> rusqlite::Result<ExitCondition> {
    let raw: String = row.get(2)?;
    let direction = raw
        .parse::<Direction>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))?;
    Ok(ExitCondition {
        id: row.get(0)?,
        room_id: row.get(1)?,
        direction,
        is_locked: row.get(3)?,
        required_item: row.get(4)?,
        locked_message: row.get(5)?,
    })
}

fn map_combination(row: &Row<'_>) -> rusqlite::Result<ItemCombination> {
    Ok(ItemCombination {
        id: row.get(0)?,
        first: row.get(1)?,
        second: row.get(2)?,
        result: row.get(3)?,
        success_message: row.get(4)?,
    })
}

pub(crate) fn room(conn: &Connection, id: RoomId) -> StoreResult<Room> {
    let sql = format!("SELECT {ROOM_COLUMNS} FROM rooms WHERE id = ?1");
    conn.query_row(&sql, params![id], map_room)
        .optional()?
        .ok_or_else(|| StoreError::NotFound(format!("room {id}")))
}

pub(crate) fn rooms(conn: &Connection) -> StoreResult<Vec<Room>> {
    let sql = format!("SELECT {ROOM_COLUMNS} FROM rooms ORDER BY id");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], map_room)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

pub(crate) fn room_exists(conn: &Connection, id: RoomId) -> StoreResult<bool> {
    let found: Option<i64> = conn
        .query_row("SELECT 1 FROM rooms WHERE id = ?1", params![id], |row| row.get(0))
        .optional()?;
    Ok(found.is_some())
}

pub(crate) fn items_in_room(conn: &Connection, room_id: RoomId) -> StoreResult<Vec<Item>> {
    let sql = format!(
        "SELECT {ITEM_COLUMNS} FROM items i
         JOIN item_locations l ON l.item_id = i.id
         WHERE l.room_id = ?1
           AND i.id NOT IN (SELECT item_id FROM removed_items)
           AND (i.is_visible = 1 OR i.id IN (SELECT item_id FROM revealed_items))
         ORDER BY i.id"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![room_id], map_item)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

pub(crate) fn inventory_items(conn: &Connection) -> StoreResult<Vec<Item>> {
    let sql = format!(
        "SELECT {ITEM_COLUMNS} FROM items i
         JOIN item_locations l ON l.item_id = i.id
         WHERE l.room_id IS NULL
           AND i.id NOT IN (SELECT item_id FROM removed_items)
         ORDER BY i.id"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], map_item)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

pub(crate) fn item(conn: &Connection, id: ItemId) -> StoreResult<Item> {
    let sql = format!("SELECT {ITEM_COLUMNS} FROM items i WHERE i.id = ?1");
    conn.query_row(&sql, params![id], map_item)
        .optional()?
        .ok_or_else(|| StoreError::NotFound(format!("item {id}")))
}

pub(crate) fn items(conn: &Connection) -> StoreResult<Vec<Item>> {
    let sql = format!("SELECT {ITEM_COLUMNS} FROM items i ORDER BY i.id");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], map_item)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

pub(crate) fn game_state(conn: &Connection) -> StoreResult<GameState> {
    conn.query_row(
        "SELECT current_room_id, score, health, moves_count, start_time FROM game_state WHERE id = 1",
        [],
        |row| {
            Ok(GameState {
                current_room: row.get(0)?,
                score: row.get(1)?,
                health: row.get(2)?,
                moves: row.get(3)?,
                start_time: row.get(4)?,
            })
        },
    )
    .optional()?
    .ok_or_else(|| StoreError::NotFound("game state".into()))
}

pub(crate) fn item_actions(conn: &Connection, item_id: ItemId, room_id: RoomId) -> StoreResult<Vec<ItemAction>> {
    let sql = format!(
        "SELECT {ACTION_COLUMNS} FROM item_actions
         WHERE item_id = ?1 AND (room_id = ?2 OR room_id IS NULL)
         ORDER BY id"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![item_id, room_id], map_action)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

pub(crate) fn item_location(conn: &Connection, id: ItemId) -> StoreResult<Location> {
    let room: Option<Option<RoomId>> = conn
        .query_row(
            "SELECT room_id FROM item_locations WHERE item_id = ?1",
            params![id],
            |row| row.get(0),
        )
        .optional()?;
    room.map(Location::from_column)
        .ok_or_else(|| StoreError::NotFound(format!("placement of item {id}")))
}

pub(crate) fn placements(conn: &Connection, table: PlacementTable) -> StoreResult<Vec<Placement>> {
    let mut stmt = conn.prepare(table.select_sql())?;
    let rows = stmt.query_map([], |row| {
        let room: Option<RoomId> = row.get(1)?;
        Ok((row.get::<_, ItemId>(0)?, Location::from_column(room)))
    })?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

pub(crate) fn exit_condition(
    conn: &Connection,
    room_id: RoomId,
    direction: Direction,
) -> StoreResult<Option<ExitCondition>> {
    Ok(conn
        .query_row(
            "SELECT id, room_id, direction, is_locked, required_item_id, locked_message
             FROM exit_conditions WHERE room_id = ?1 AND direction = ?2",
            params![room_id, direction.as_str()],
            map_exit_condition,
        )
        .optional()?)
}

pub(crate) fn combination(conn: &Connection, a: ItemId, b: ItemId) -> StoreResult<Option<ItemCombination>> {
    Ok(conn
        .query_row(
            "SELECT id, item1_id, item2_id, result_item_id, success_message FROM item_combinations
             WHERE (item1_id = ?1 AND item2_id = ?2) OR (item1_id = ?2 AND item2_id = ?1)
             ORDER BY id LIMIT 1",
            params![a, b],
            map_combination,
        )
        .optional()?)
}

pub(crate) fn metadata(conn: &Connection, key: &str) -> StoreResult<Option<String>> {
    let value: Option<Option<String>> = conn
        .query_row("SELECT value FROM game_metadata WHERE key = ?1", params![key], |row| {
            row.get(0)
        })
        .optional()?;
    Ok(value.flatten())
}

pub(crate) fn all_metadata(conn: &Connection) -> StoreResult<BTreeMap<String, String>> {
    let mut stmt = conn.prepare("SELECT key, value FROM game_metadata WHERE value IS NOT NULL")?;
    let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;
    Ok(rows.collect::<Result<BTreeMap<_, _>, _>>()?)
}

pub(crate) fn neighbor(conn: &Connection, room_id: RoomId, direction: Direction) -> StoreResult<Option<RoomId>> {
    let target: Option<Option<RoomId>> = conn
        .query_row(exit_select_sql(direction), params![room_id], |row| row.get(0))
        .optional()?;
    target.ok_or_else(|| StoreError::NotFound(format!("room {room_id}")))
}

pub(crate) fn is_item_removed(conn: &Connection, id: ItemId) -> StoreResult<bool> {
    exists(conn, "SELECT 1 FROM removed_items WHERE item_id = ?1", id)
}

pub(crate) fn is_item_revealed(conn: &Connection, id: ItemId) -> StoreResult<bool> {
    exists(conn, "SELECT 1 FROM revealed_items WHERE item_id = ?1", id)
}

pub(crate) fn is_action_completed(conn: &Connection, action_id: i64) -> StoreResult<bool> {
    exists(conn, "SELECT 1 FROM completed_actions WHERE action_id = ?1", action_id)
}

/// Locked iff an exit condition exists for the pair and no unlock has been logged for it.
pub(crate) fn is_exit_locked(conn: &Connection, room_id: RoomId, direction: Direction) -> StoreResult<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM exit_conditions ec
             WHERE ec.room_id = ?1 AND ec.direction = ?2
               AND NOT EXISTS (
                   SELECT 1 FROM unlocked_exits ue
                   WHERE ue.room_id = ec.room_id AND ue.direction = ec.direction
               )",
            params![room_id, direction.as_str()],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

fn exists(conn: &Connection, sql: &str, id: i64) -> StoreResult<bool> {
    let found: Option<i64> = conn.query_row(sql, params![id], |row| row.get(0)).optional()?;
    Ok(found.is_some())
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
    fn starter_rooms_and_exits() {
        let (_dir, store) = starter();
        let query = store.query();
        let cave = query.room(1).expect("room 1");
        assert_eq!(cave.name, "Dark Cave");
        assert_eq!(cave.south, Some(2));
        assert_eq!(cave.north, None);
        assert_eq!(query.neighbor(2, Direction::North).expect("neighbor"), Some(1));
        assert_eq!(query.rooms().expect("rooms").len(), 2);
    }

    #[test]
    fn missing_rows_are_not_found() {
        let (_dir, store) = starter();
        let query = store.query();
        assert!(matches!(query.room(99), Err(StoreError::NotFound(_))));
        assert!(matches!(query.item(99), Err(StoreError::NotFound(_))));
        assert!(matches!(query.item_location(99), Err(StoreError::NotFound(_))));
        assert!(matches!(query.neighbor(99, Direction::East), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn closed_store_is_not_initialized() {
        let store = WorldStore::new();
        assert!(matches!(store.query().room(1), Err(StoreError::NotInitialized)));
        assert!(matches!(store.query().game_state(), Err(StoreError::NotInitialized)));
    }

    #[test]
    fn starter_items_lie_on_the_path() {
        let (_dir, store) = starter();
        let query = store.query();
        let names: Vec<_> = query
            .items_in_room(2)
            .expect("items")
            .into_iter()
            .map(|i| i.name)
            .collect();
        assert_eq!(names, vec!["Stone", "Stick"]);
        assert!(query.inventory_items().expect("inventory").is_empty());
        assert_eq!(query.placements().expect("live"), query.initial_placements().expect("initial"));
    }

    #[test]
    fn starter_state_and_metadata() {
        let (_dir, store) = starter();
        let query = store.query();
        let state = query.game_state().expect("state");
        assert_eq!((state.current_room, state.score, state.health, state.moves), (1, 0, 100, 0));
        assert_eq!(query.metadata("title").expect("title").as_deref(), Some("Cave Adventure"));
        assert_eq!(query.all_metadata().expect("meta").len(), 4);
        assert_eq!(query.metadata("nope").expect("absent"), None);
    }

    #[test]
    fn neighbor_reads_each_exit_column() {
        let (_dir, mut store) = starter();
        let mut author = store.author();
        for (direction, target) in [
            (Direction::North, 2),
            (Direction::East, 2),
            (Direction::West, 1),
        ] {
            author.connect_rooms(1, direction, target).expect("connect");
        }
        let query = store.query();
        assert_eq!(query.neighbor(1, Direction::North).expect("north"), Some(2));
        assert_eq!(query.neighbor(1, Direction::South).expect("south"), Some(2));
        assert_eq!(query.neighbor(1, Direction::East).expect("east"), Some(2));
        assert_eq!(query.neighbor(1, Direction::West).expect("west"), Some(1));
        assert_eq!(query.neighbor(2, Direction::South).expect("unset"), None);
    }

    #[test]
    fn no_condition_means_never_locked() {
        let (_dir, store) = starter();
        assert!(!store.query().is_exit_locked(1, Direction::South).expect("lock"));
        assert_eq!(store.query().exit_condition(1, Direction::South).expect("cond"), None);
    }
}
