//! Relational schema and starter world for new stores.
//!
//! The schema is versioned only by table presence: opening a store checks that the
//! core tables exist and nothing more.

use delve_data::{DEFAULT_HEALTH, Direction};
use log::info;
use rusqlite::{Connection, params};

use crate::error::StoreResult;
use crate::world::{META_AUTHOR, META_STARTING_ROOM, META_TITLE, META_VERSION};

/// Tables whose presence marks a file as a world store.
pub const CORE_TABLES: [&str; 4] = ["rooms", "items", "game_state", "game_metadata"];

/// Every connection needs this before cascades take effect.
pub const ENABLE_FOREIGN_KEYS: &str = "PRAGMA foreign_keys = ON;";

const SCHEMA_SQL: &str = r"
CREATE TABLE rooms (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    description TEXT NOT NULL,
    image_path TEXT,
    north_room_id INTEGER,
    south_room_id INTEGER,
    east_room_id INTEGER,
    west_room_id INTEGER,
    graph_x INTEGER NOT NULL DEFAULT 0,
    graph_y INTEGER NOT NULL DEFAULT 0,
    FOREIGN KEY (north_room_id) REFERENCES rooms(id) ON DELETE SET NULL,
    FOREIGN KEY (south_room_id) REFERENCES rooms(id) ON DELETE SET NULL,
    FOREIGN KEY (east_room_id) REFERENCES rooms(id) ON DELETE SET NULL,
    FOREIGN KEY (west_room_id) REFERENCES rooms(id) ON DELETE SET NULL
);

CREATE TABLE items (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    description TEXT NOT NULL,
    room_description TEXT,
    image_path TEXT,
    can_take INTEGER NOT NULL DEFAULT 1,
    can_use INTEGER NOT NULL DEFAULT 0,
    can_combine INTEGER NOT NULL DEFAULT 0,
    use_message TEXT,
    is_visible INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE item_locations (
    item_id INTEGER PRIMARY KEY,
    room_id INTEGER,
    FOREIGN KEY (item_id) REFERENCES items(id) ON DELETE CASCADE,
    FOREIGN KEY (room_id) REFERENCES rooms(id) ON DELETE CASCADE
);

CREATE TABLE item_locations_initial (
    item_id INTEGER PRIMARY KEY,
    room_id INTEGER,
    FOREIGN KEY (item_id) REFERENCES items(id) ON DELETE CASCADE,
    FOREIGN KEY (room_id) REFERENCES rooms(id) ON DELETE CASCADE
);

CREATE TABLE item_combinations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    item1_id INTEGER NOT NULL,
    item2_id INTEGER NOT NULL,
    result_item_id INTEGER NOT NULL,
    success_message TEXT,
    FOREIGN KEY (item1_id) REFERENCES items(id) ON DELETE CASCADE,
    FOREIGN KEY (item2_id) REFERENCES items(id) ON DELETE CASCADE,
    FOREIGN KEY (result_item_id) REFERENCES items(id) ON DELETE CASCADE,
    UNIQUE (item1_id, item2_id)
);

CREATE TABLE item_actions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    item_id INTEGER NOT NULL,
    room_id INTEGER,
    action_type TEXT NOT NULL,
    target_item_id INTEGER,
    target_direction TEXT,
    success_message TEXT,
    consumes_item INTEGER NOT NULL DEFAULT 0,
    FOREIGN KEY (item_id) REFERENCES items(id) ON DELETE CASCADE,
    FOREIGN KEY (room_id) REFERENCES rooms(id) ON DELETE CASCADE,
    FOREIGN KEY (target_item_id) REFERENCES items(id) ON DELETE CASCADE
);

CREATE TABLE exit_conditions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    room_id INTEGER NOT NULL,
    direction TEXT NOT NULL,
    is_locked INTEGER NOT NULL DEFAULT 1,
    required_item_id INTEGER,
    locked_message TEXT,
    FOREIGN KEY (room_id) REFERENCES rooms(id) ON DELETE CASCADE,
    FOREIGN KEY (required_item_id) REFERENCES items(id) ON DELETE SET NULL,
    UNIQUE (room_id, direction)
);

CREATE TABLE completed_actions (
    action_id INTEGER NOT NULL PRIMARY KEY,
    completed_at INTEGER DEFAULT (strftime('%s', 'now')),
    FOREIGN KEY (action_id) REFERENCES item_actions(id) ON DELETE CASCADE
);

CREATE TABLE removed_items (
    item_id INTEGER PRIMARY KEY,
    removed_at INTEGER DEFAULT (strftime('%s', 'now')),
    FOREIGN KEY (item_id) REFERENCES items(id) ON DELETE CASCADE
);

CREATE TABLE revealed_items (
    item_id INTEGER PRIMARY KEY,
    revealed_at INTEGER DEFAULT (strftime('%s', 'now')),
    FOREIGN KEY (item_id) REFERENCES items(id) ON DELETE CASCADE
);

CREATE TABLE unlocked_exits (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    room_id INTEGER NOT NULL,
    direction TEXT NOT NULL,
    unlocked_at INTEGER DEFAULT (strftime('%s', 'now')),
    FOREIGN KEY (room_id) REFERENCES rooms(id) ON DELETE CASCADE,
    UNIQUE (room_id, direction)
);

CREATE TABLE game_state (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    current_room_id INTEGER NOT NULL,
    score INTEGER NOT NULL DEFAULT 0,
    health INTEGER NOT NULL DEFAULT 100,
    moves_count INTEGER NOT NULL DEFAULT 0,
    start_time INTEGER NOT NULL DEFAULT 0,
    FOREIGN KEY (current_room_id) REFERENCES rooms(id)
);

CREATE TABLE game_metadata (
    key TEXT PRIMARY KEY,
    value TEXT
);

CREATE INDEX idx_item_locations_room ON item_locations(room_id);
CREATE INDEX idx_item_combinations_items ON item_combinations(item1_id, item2_id);
CREATE INDEX idx_item_actions_room ON item_actions(room_id);
CREATE INDEX idx_item_actions_item ON item_actions(item_id);
CREATE INDEX idx_exit_conditions_room ON exit_conditions(room_id);
CREATE INDEX idx_unlocked_exits_room ON unlocked_exits(room_id);
";

/// Build every table and index on an empty database.
///
/// Foreign keys must already be enabled; the pragma is ignored inside a transaction.
///
/// # Errors
/// - if any statement fails
pub fn create_schema(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    info!("schema created ({} tables)", count_tables(conn)?);
    Ok(())
}

/// Populate a two-room cave world so a new store is playable immediately.
///
/// # Errors
/// - if any insert fails
pub fn seed_starter_world(conn: &Connection, start_time: i64) -> StoreResult<()> {
    let mut insert_room =
        conn.prepare("INSERT INTO rooms (id, name, description, graph_x, graph_y) VALUES (?1, ?2, ?3, ?4, ?5)")?;
    insert_room.execute(params![
        1,
        "Dark Cave",
        "You are in a dark, damp cave. The walls glisten with moisture. A narrow passage leads south.",
        0,
        0
    ])?;
    insert_room.execute(params![
        2,
        "Mountain Path",
        "You stand on a narrow mountain path. The cave entrance is to the north. Steep cliffs drop away on either side.",
        0,
        100
    ])?;

    // Rooms exist before they are linked, so the self-references always resolve.
    conn.execute(exit_update_sql(Direction::South), params![Some(2_i64), 1_i64])?;
    conn.execute(exit_update_sql(Direction::North), params![Some(1_i64), 2_i64])?;

    let mut insert_item = conn.prepare(
        "INSERT INTO items (id, name, description, room_description, can_take, can_use) VALUES (?1, ?2, ?3, ?4, 1, 0)",
    )?;
    insert_item.execute(params![
        1,
        "Stone",
        "A smooth, palm-sized stone.",
        "A smooth stone lies on the ground."
    ])?;
    insert_item.execute(params![
        2,
        "Stick",
        "A sturdy wooden stick, good for poking things.",
        "A wooden stick rests against a rock."
    ])?;

    for item_id in [1_i64, 2] {
        conn.execute(
            "INSERT INTO item_locations (item_id, room_id) VALUES (?1, ?2)",
            params![item_id, 2_i64],
        )?;
        conn.execute(
            "INSERT INTO item_locations_initial (item_id, room_id) VALUES (?1, ?2)",
            params![item_id, 2_i64],
        )?;
    }

    conn.execute(
        "INSERT INTO game_state (id, current_room_id, score, health, moves_count, start_time)
         VALUES (1, 1, 0, ?1, 0, ?2)",
        params![DEFAULT_HEALTH, start_time],
    )?;

    let mut insert_meta = conn.prepare("INSERT INTO game_metadata (key, value) VALUES (?1, ?2)")?;
    for (key, value) in [
        (META_TITLE, "Cave Adventure"),
        (META_AUTHOR, "Pathfinder"),
        (META_VERSION, "1.0"),
        (META_STARTING_ROOM, "1"),
    ] {
        insert_meta.execute(params![key, value])?;
    }

    info!("starter world seeded: 2 rooms, 2 items");
    Ok(())
}

/// Number of core tables present. A complete store reports `CORE_TABLES.len()`.
///
/// # Errors
/// - if `sqlite_master` cannot be queried
pub fn count_core_tables(conn: &Connection) -> StoreResult<usize> {
    let mut stmt = conn.prepare(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN (?1, ?2, ?3, ?4)",
    )?;
    let count: i64 = stmt.query_row(
        params![CORE_TABLES[0], CORE_TABLES[1], CORE_TABLES[2], CORE_TABLES[3]],
        |row| row.get(0),
    )?;
    Ok(usize::try_from(count).unwrap_or_default())
}

fn count_tables(conn: &Connection) -> StoreResult<i64> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
        [],
        |row| row.get(0),
    )?)
}

/// Column holding the neighbor for `direction`.
pub fn exit_column(direction: Direction) -> &'static str {
    match direction {
        Direction::North => "north_room_id",
        Direction::South => "south_room_id",
        Direction::East => "east_room_id",
        Direction::West => "west_room_id",
    }
}

/// `UPDATE` setting one exit column. Params: `?1` target (nullable), `?2` room id.
pub fn exit_update_sql(direction: Direction) -> &'static str {
    match direction {
        Direction::North => "UPDATE rooms SET north_room_id = ?1 WHERE id = ?2",
        Direction::South => "UPDATE rooms SET south_room_id = ?1 WHERE id = ?2",
        Direction::East => "UPDATE rooms SET east_room_id = ?1 WHERE id = ?2",
        Direction::West => "UPDATE rooms SET west_room_id = ?1 WHERE id = ?2",
    }
}

/// `SELECT` of one exit column. Params: `?1` room id.
pub fn exit_select_sql(direction: Direction) -> &'static str {
    match direction {
        Direction::North => "SELECT north_room_id FROM rooms WHERE id = ?1",
        Direction::South => "SELECT south_room_id FROM rooms WHERE id = ?1",
        Direction::East => "SELECT east_room_id FROM rooms WHERE id = ?1",
        Direction::West => "SELECT west_room_id FROM rooms WHERE id = ?1",
    }
}

/// `UPDATE` nulling one exit column wherever it points at `?1`.
pub fn exit_clear_sql(direction: Direction) -> &'static str {
    match direction {
        Direction::North => "UPDATE rooms SET north_room_id = NULL WHERE north_room_id = ?1",
        Direction::South => "UPDATE rooms SET south_room_id = NULL WHERE south_room_id = ?1",
        Direction::East => "UPDATE rooms SET east_room_id = NULL WHERE east_room_id = ?1",
        Direction::West => "UPDATE rooms SET west_room_id = NULL WHERE west_room_id = ?1",
    }
}
