//! Shared runtime vocabulary for the world store.
//!
//! Defines where an item can be and the metadata keys every store carries.

use delve_data::{ItemId, RoomId};
use variantly::Variantly;

pub const META_TITLE: &str = "title";
pub const META_AUTHOR: &str = "author";
pub const META_VERSION: &str = "version";
pub const META_STARTING_ROOM: &str = "starting_room_id";

/// Where an item currently is.
///
/// Storage encodes `Inventory` as a NULL room reference.
#[derive(Copy, Debug, Clone, PartialEq, Eq, Hash, Variantly)]
pub enum Location {
    Inventory,
    Room(RoomId),
}

impl Location {
    /// Decode a placement row's nullable room column.
    pub fn from_column(room: Option<RoomId>) -> Self {
        room.map_or(Location::Inventory, Location::Room)
    }

    /// Encode for a placement row's nullable room column.
    pub fn to_column(self) -> Option<RoomId> {
        match self {
            Location::Inventory => None,
            Location::Room(id) => Some(id),
        }
    }
}

/// One item's location, as held in the live or initial placement table.
pub type Placement = (ItemId, Location);
