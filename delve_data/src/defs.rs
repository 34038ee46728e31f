use std::fmt;
use std::str::FromStr;

/// Row identifiers are SQLite rowids.
pub type RoomId = i64;
pub type ItemId = i64;
pub type ActionId = i64;

/// Health a fresh or reset game starts with.
pub const DEFAULT_HEALTH: i64 = 100;

/// Shown for a locked exit whose condition carries no message of its own.
pub const DEFAULT_LOCKED_MESSAGE: &str = "The way is blocked.";

/// One of the four compass exits a room may have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Direction {
    North,
    South,
    East,
    West,
}

impl Direction {
    /// Every direction, in the order exits are listed and traversed.
    pub const ALL: [Direction; 4] = [Direction::North, Direction::South, Direction::East, Direction::West];

    /// Stable lowercase token used in storage and messages.
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::North => "north",
            Direction::South => "south",
            Direction::East => "east",
            Direction::West => "west",
        }
    }

    pub fn opposite(self) -> Direction {
        match self {
            Direction::North => Direction::South,
            Direction::South => Direction::North,
            Direction::East => Direction::West,
            Direction::West => Direction::East,
        }
    }

    /// Grid step `(dx, dy)` for a move in this direction. North is up, so it decreases y.
    pub fn offset(self) -> (i64, i64) {
        match self {
            Direction::North => (0, -1),
            Direction::South => (0, 1),
            Direction::East => (1, 0),
            Direction::West => (-1, 0),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input that does not name one of the four directions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseDirectionError(pub String);

impl fmt::Display for ParseDirectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' is not a direction (expected north, south, east or west)", self.0)
    }
}

impl std::error::Error for ParseDirectionError {}

impl FromStr for Direction {
    type Err = ParseDirectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "north" | "n" => Ok(Direction::North),
            "south" | "s" => Ok(Direction::South),
            "east" | "e" => Ok(Direction::East),
            "west" | "w" => Ok(Direction::West),
            _ => Err(ParseDirectionError(s.to_string())),
        }
    }
}

/// A location node in the world graph.
///
/// Each direction holds at most one neighbor. Links are independent per room, so
/// `A --north--> B` says nothing about how B links back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Room {
    pub id: RoomId,
    pub name: String,
    pub description: String,
    pub image_path: Option<String>,
    pub north: Option<RoomId>,
    pub south: Option<RoomId>,
    pub east: Option<RoomId>,
    pub west: Option<RoomId>,
    /// Map coordinates, only used for drawing.
    pub x: i64,
    pub y: i64,
}

impl Room {
    /// Neighbor reached by leaving in `direction`, if that exit is set.
    pub fn exit(&self, direction: Direction) -> Option<RoomId> {
        match direction {
            Direction::North => self.north,
            Direction::South => self.south,
            Direction::East => self.east,
            Direction::West => self.west,
        }
    }

    pub fn set_exit(&mut self, direction: Direction, target: Option<RoomId>) {
        let slot = match direction {
            Direction::North => &mut self.north,
            Direction::South => &mut self.south,
            Direction::East => &mut self.east,
            Direction::West => &mut self.west,
        };
        *slot = target;
    }

    /// Set exits in `Direction::ALL` order.
    pub fn exits(&self) -> impl Iterator<Item = (Direction, RoomId)> + '_ {
        Direction::ALL
            .into_iter()
            .filter_map(|dir| self.exit(dir).map(|target| (dir, target)))
    }
}

/// An object that can lie in a room or sit in the player's inventory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub id: ItemId,
    pub name: String,
    pub description: String,
    /// Alternate text used while the item lies in a room.
    pub room_description: Option<String>,
    pub image_path: Option<String>,
    pub can_take: bool,
    pub can_use: bool,
    pub can_combine: bool,
    /// Fallback message when the item is used somewhere it has no action.
    pub use_message: Option<String>,
    /// Hidden items exist but are not listed until revealed.
    pub is_visible: bool,
}

impl Item {
    /// Text to show for the item lying in a room.
    pub fn room_text(&self) -> &str {
        self.room_description.as_deref().unwrap_or(&self.description)
    }
}

/// What an item action does when it fires.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ActionKind {
    RevealItem,
    RemoveItem,
    UnlockExit,
    /// A kind this engine does not know how to perform.
    Other(String),
}

impl ActionKind {
    /// Storage key for this kind.
    pub fn as_key(&self) -> &str {
        match self {
            ActionKind::RevealItem => "reveal_item",
            ActionKind::RemoveItem => "remove_item",
            ActionKind::UnlockExit => "unlock_exit",
            ActionKind::Other(key) => key,
        }
    }

    /// Parse a storage key. Unrecognized keys are kept as `Other`.
    pub fn from_key(key: &str) -> Self {
        match key {
            "reveal_item" => ActionKind::RevealItem,
            "remove_item" => ActionKind::RemoveItem,
            "unlock_exit" => ActionKind::UnlockExit,
            other => ActionKind::Other(other.to_string()),
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_key())
    }
}

/// A puzzle trigger fired by using an item, either in one room or anywhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemAction {
    pub id: ActionId,
    pub item_id: ItemId,
    /// `None` means the action works in any room.
    pub room_id: Option<RoomId>,
    pub kind: ActionKind,
    pub target_item: Option<ItemId>,
    /// Stored text, parsed on use.
    pub target_direction: Option<String>,
    pub success_message: Option<String>,
    pub consumes_item: bool,
}

impl ItemAction {
    /// Parsed target direction, if present and valid.
    pub fn direction(&self) -> Option<Direction> {
        self.target_direction.as_deref().and_then(|dir| dir.parse().ok())
    }
}

/// Authored lock on one exit of a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitCondition {
    pub id: i64,
    pub room_id: RoomId,
    pub direction: Direction,
    pub is_locked: bool,
    pub required_item: Option<ItemId>,
    pub locked_message: Option<String>,
}

impl ExitCondition {
    pub fn message(&self) -> &str {
        self.locked_message.as_deref().unwrap_or(DEFAULT_LOCKED_MESSAGE)
    }
}

/// Combining `first` and `second` (in either order) yields `result`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemCombination {
    pub id: i64,
    pub first: ItemId,
    pub second: ItemId,
    pub result: ItemId,
    pub success_message: Option<String>,
}

impl ItemCombination {
    /// True if this rule covers the unordered pair `(a, b)`.
    pub fn matches(&self, a: ItemId, b: ItemId) -> bool {
        (self.first == a && self.second == b) || (self.first == b && self.second == a)
    }
}

/// The single live game-state record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameState {
    pub current_room: RoomId,
    pub score: i64,
    pub health: i64,
    pub moves: i64,
    /// Unix timestamp of the session start.
    pub start_time: i64,
}

/// Authored fields of a room.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RoomDraft {
    pub name: String,
    pub description: String,
    pub image_path: Option<String>,
    pub x: i64,
    pub y: i64,
}

impl RoomDraft {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn at(mut self, x: i64, y: i64) -> Self {
        self.x = x;
        self.y = y;
        self
    }
}

/// Authored fields of an item. Defaults match a plain takeable, visible prop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemDraft {
    pub name: String,
    pub description: String,
    pub room_description: Option<String>,
    pub image_path: Option<String>,
    pub can_take: bool,
    pub can_use: bool,
    pub can_combine: bool,
    pub use_message: Option<String>,
    pub is_visible: bool,
}

impl ItemDraft {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            room_description: None,
            image_path: None,
            can_take: true,
            can_use: false,
            can_combine: false,
            use_message: None,
            is_visible: true,
        }
    }

    #[must_use]
    pub fn hidden(mut self) -> Self {
        self.is_visible = false;
        self
    }

    #[must_use]
    pub fn fixed(mut self) -> Self {
        self.can_take = false;
        self
    }

    #[must_use]
    pub fn usable(mut self, use_message: Option<&str>) -> Self {
        self.can_use = true;
        self.use_message = use_message.map(str::to_string);
        self
    }

    #[must_use]
    pub fn combinable(mut self) -> Self {
        self.can_combine = true;
        self
    }

    #[must_use]
    pub fn with_room_description(mut self, text: impl Into<String>) -> Self {
        self.room_description = Some(text.into());
        self
    }
}

/// Authored fields of an item action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemActionDraft {
    pub item_id: ItemId,
    pub room_id: Option<RoomId>,
    pub kind: ActionKind,
    pub target_item: Option<ItemId>,
    pub target_direction: Option<Direction>,
    pub success_message: Option<String>,
    pub consumes_item: bool,
}

impl ItemActionDraft {
    pub fn reveal(item_id: ItemId, room_id: Option<RoomId>, target: ItemId) -> Self {
        Self::targeting_item(item_id, room_id, ActionKind::RevealItem, target)
    }

    pub fn remove(item_id: ItemId, room_id: Option<RoomId>, target: ItemId) -> Self {
        Self::targeting_item(item_id, room_id, ActionKind::RemoveItem, target)
    }

    pub fn unlock(item_id: ItemId, room_id: Option<RoomId>, direction: Direction) -> Self {
        Self {
            item_id,
            room_id,
            kind: ActionKind::UnlockExit,
            target_item: None,
            target_direction: Some(direction),
            success_message: None,
            consumes_item: false,
        }
    }

    fn targeting_item(item_id: ItemId, room_id: Option<RoomId>, kind: ActionKind, target: ItemId) -> Self {
        Self {
            item_id,
            room_id,
            kind,
            target_item: Some(target),
            target_direction: None,
            success_message: None,
            consumes_item: false,
        }
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.success_message = Some(message.into());
        self
    }

    #[must_use]
    pub fn consuming(mut self) -> Self {
        self.consumes_item = true;
        self
    }
}

/// Authored fields of an exit lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitConditionDraft {
    pub room_id: RoomId,
    pub direction: Direction,
    pub required_item: Option<ItemId>,
    pub locked_message: Option<String>,
}

/// Treat empty or whitespace-only text as absent.
pub fn non_empty(text: Option<String>) -> Option<String> {
    text.filter(|t| !t.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room() -> Room {
        Room {
            id: 1,
            name: "Hall".into(),
            description: "A hall.".into(),
            image_path: None,
            north: Some(2),
            south: None,
            east: Some(3),
            west: None,
            x: 0,
            y: 0,
        }
    }

    #[test]
    fn direction_parses_names_and_abbreviations() {
        assert_eq!("north".parse::<Direction>(), Ok(Direction::North));
        assert_eq!(" West ".parse::<Direction>(), Ok(Direction::West));
        assert_eq!("s".parse::<Direction>(), Ok(Direction::South));
        assert_eq!("up".parse::<Direction>(), Err(ParseDirectionError("up".into())));
    }

    #[test]
    fn direction_opposites_and_offsets_cancel() {
        for dir in Direction::ALL {
            let (dx, dy) = dir.offset();
            let (ox, oy) = dir.opposite().offset();
            assert_eq!((dx + ox, dy + oy), (0, 0));
            assert_eq!(dir.opposite().opposite(), dir);
        }
    }

    #[test]
    fn room_exits_follow_direction_order() {
        let exits: Vec<_> = room().exits().collect();
        assert_eq!(exits, vec![(Direction::North, 2), (Direction::East, 3)]);
    }

    #[test]
    fn room_set_exit_clears_and_sets() {
        let mut room = room();
        room.set_exit(Direction::North, None);
        room.set_exit(Direction::West, Some(9));
        assert_eq!(room.exit(Direction::North), None);
        assert_eq!(room.exit(Direction::West), Some(9));
    }

    #[test]
    fn action_kind_keys_round_trip_known_kinds() {
        for kind in [ActionKind::RevealItem, ActionKind::RemoveItem, ActionKind::UnlockExit] {
            assert_eq!(ActionKind::from_key(kind.as_key()), kind);
        }
        assert_eq!(ActionKind::from_key("teleport"), ActionKind::Other("teleport".into()));
    }

    #[test]
    fn item_room_text_falls_back_to_description() {
        let draft = ItemDraft::new("Stone", "A smooth stone.");
        let mut item = Item {
            id: 1,
            name: draft.name,
            description: draft.description,
            room_description: None,
            image_path: None,
            can_take: true,
            can_use: false,
            can_combine: false,
            use_message: None,
            is_visible: true,
        };
        assert_eq!(item.room_text(), "A smooth stone.");
        item.room_description = Some("A stone lies here.".into());
        assert_eq!(item.room_text(), "A stone lies here.");
    }

    #[test]
    fn combination_matches_either_order() {
        let combo = ItemCombination {
            id: 1,
            first: 4,
            second: 7,
            result: 9,
            success_message: None,
        };
        assert!(combo.matches(4, 7));
        assert!(combo.matches(7, 4));
        assert!(!combo.matches(4, 9));
    }

    #[test]
    fn non_empty_drops_blank_text() {
        assert_eq!(non_empty(Some("  ".into())), None);
        assert_eq!(non_empty(Some("hi".into())), Some("hi".into()));
        assert_eq!(non_empty(None), None);
    }
}
