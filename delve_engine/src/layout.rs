//! Breadth-first placement of rooms on a grid for map drawing.
//!
//! Only rooms reachable from the start room through stored exits are moved. Links
//! need not be symmetric and may form cycles, so every room is placed at most once.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use delve_data::{Direction, Room, RoomId};
use log::{info, warn};
use rusqlite::params;

use crate::error::StoreResult;
use crate::query;
use crate::store::WorldStore;

/// Grid cells are this many map units apart.
pub const LAYOUT_SCALE: i64 = 100;

/// Room the layout starts from when none is given.
pub const DEFAULT_LAYOUT_START: RoomId = 1;

/// Grid cell, in unscaled units.
pub type Cell = (i64, i64);

/// What an auto-layout run did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LayoutReport {
    /// Rooms given new coordinates.
    pub placed: usize,
    /// Rooms not reachable from the start and left where they were.
    pub unreached: usize,
}

/// Lay out the rooms reachable from `start` (room 1 if `None`) and save their
/// coordinates in one transaction.
///
/// An empty world or a missing start room is a logged no-op.
///
/// # Errors
/// - `NotInitialized` if the store is closed
/// - `StorageFault` if reading rooms or writing coordinates fails; no coordinates change
pub fn auto_layout(store: &mut WorldStore, start: Option<RoomId>) -> StoreResult<LayoutReport> {
    let rooms = query::rooms(store.conn()?)?;
    let start = start.unwrap_or(DEFAULT_LAYOUT_START);

    if rooms.is_empty() {
        info!("auto-layout: no rooms to place");
        return Ok(LayoutReport::default());
    }
    if !rooms.iter().any(|room| room.id == start) {
        warn!("auto-layout: start room {start} does not exist; nothing moved");
        return Ok(LayoutReport {
            placed: 0,
            unreached: rooms.len(),
        });
    }

    let cells = compute_layout(&rooms, start);
    store.with_transaction("auto-layout", |tx| {
        let mut update = tx.prepare("UPDATE rooms SET graph_x = ?1, graph_y = ?2 WHERE id = ?3")?;
        for (id, (x, y)) in &cells {
            update.execute(params![x * LAYOUT_SCALE, y * LAYOUT_SCALE, id])?;
        }
        Ok(())
    })?;

    let report = LayoutReport {
        placed: cells.len(),
        unreached: rooms.len() - cells.len(),
    };
    info!(
        "auto-layout from room {start}: {} placed, {} unreached",
        report.placed, report.unreached
    );
    Ok(report)
}

/// Assign unscaled grid cells to every room reachable from `start`.
///
/// Neighbors are visited north, south, east, west. A neighbor whose natural cell is
/// taken is shifted along +x until a free cell is found, whichever direction it was
/// reached from.
pub fn compute_layout(rooms: &[Room], start: RoomId) -> BTreeMap<RoomId, Cell> {
    let by_id: HashMap<RoomId, &Room> = rooms.iter().map(|room| (room.id, room)).collect();
    let mut cells = BTreeMap::new();
    if !by_id.contains_key(&start) {
        return cells;
    }

    let mut occupied: HashSet<Cell> = HashSet::new();
    let mut queue = VecDeque::new();

    cells.insert(start, (0, 0));
    occupied.insert((0, 0));
    queue.push_back(start);

    while let Some(id) = queue.pop_front() {
        let (Some(room), Some(&(x, y))) = (by_id.get(&id), cells.get(&id)) else {
            continue;
        };
        for direction in Direction::ALL {
            let Some(next) = room.exit(direction) else {
                continue;
            };
            if cells.contains_key(&next) || !by_id.contains_key(&next) {
                continue;
            }
            let cell = free_cell(&occupied, (x, y), direction);
            cells.insert(next, cell);
            occupied.insert(cell);
            queue.push_back(next);
        }
    }
    cells
}

fn free_cell(occupied: &HashSet<Cell>, (x, y): Cell, direction: Direction) -> Cell {
    let (dx, dy) = direction.offset();
    let base = (x + dx, y + dy);
    let mut cell = base;
    let mut shift = 1;
    // x only, even for vertical moves
    while occupied.contains(&cell) {
        cell = (base.0 + shift, base.1);
        shift += 1;
    }
    cell
}
