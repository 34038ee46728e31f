use std::fmt;

use crate::*;

/// Problem found in an authoring draft before it reaches storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    MissingField { kind: &'static str, field: &'static str },
    InvalidId { kind: &'static str, id: i64, context: String },
    InvalidValue { context: String },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::MissingField { kind, field } => {
                write!(f, "{kind} is missing '{field}'")
            },
            ValidationError::InvalidId { kind, id, context } => {
                write!(f, "invalid {kind} id {id} ({context})")
            },
            ValidationError::InvalidValue { context } => {
                write!(f, "invalid value ({context})")
            },
        }
    }
}

impl std::error::Error for ValidationError {}

/// Check a room draft: the name must not be blank.
pub fn validate_room(draft: &RoomDraft) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    require_text("room", "name", &draft.name, &mut errors);
    errors
}

/// Check an item draft: the name must not be blank.
pub fn validate_item(draft: &ItemDraft) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    require_text("item", "name", &draft.name, &mut errors);
    errors
}

/// Check that an action draft carries the target its kind needs.
///
/// ```
/// use delve_data::{ActionKind, Direction, ItemActionDraft, validate_action};
///
/// let ok = ItemActionDraft::unlock(1, Some(2), Direction::North);
/// assert!(validate_action(&ok).is_empty());
///
/// let mut missing = ItemActionDraft::reveal(1, None, 3);
/// missing.target_item = None;
/// assert_eq!(validate_action(&missing).len(), 1);
///
/// let mut odd = ok.clone();
/// odd.kind = ActionKind::Other("dance".into());
/// assert!(!validate_action(&odd).is_empty());
/// ```
pub fn validate_action(draft: &ItemActionDraft) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    check_id("item", draft.item_id, "action item", &mut errors);
    if let Some(room) = draft.room_id {
        check_id("room", room, "action room", &mut errors);
    }
    if let Some(target) = draft.target_item {
        check_id("item", target, "action target", &mut errors);
    }

    match &draft.kind {
        ActionKind::RevealItem | ActionKind::RemoveItem => {
            if draft.target_item.is_none() {
                errors.push(ValidationError::MissingField {
                    kind: "item action",
                    field: "target_item",
                });
            }
        },
        ActionKind::UnlockExit => {
            if draft.target_direction.is_none() {
                errors.push(ValidationError::MissingField {
                    kind: "item action",
                    field: "target_direction",
                });
            }
        },
        ActionKind::Other(key) => errors.push(ValidationError::InvalidValue {
            context: format!("unknown action kind '{key}'"),
        }),
    }
    errors
}

/// Check ids referenced by an exit lock.
pub fn validate_exit_condition(draft: &ExitConditionDraft) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    check_id("room", draft.room_id, "exit condition room", &mut errors);
    if let Some(item) = draft.required_item {
        check_id("item", item, "exit condition required item", &mut errors);
    }
    errors
}

fn require_text(kind: &'static str, field: &'static str, value: &str, errors: &mut Vec<ValidationError>) {
    if value.trim().is_empty() {
        errors.push(ValidationError::MissingField { kind, field });
    }
}

fn check_id(kind: &'static str, id: i64, context: &str, errors: &mut Vec<ValidationError>) {
    if id <= 0 {
        errors.push(ValidationError::InvalidId {
            kind,
            id,
            context: context.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_room_name_is_rejected() {
        let errors = validate_room(&RoomDraft::new("   ", "desc"));
        assert_eq!(
            errors,
            vec![ValidationError::MissingField {
                kind: "room",
                field: "name"
            }]
        );
        assert!(validate_room(&RoomDraft::new("Cellar", "")).is_empty());
    }

    #[test]
    fn blank_item_name_is_rejected() {
        assert_eq!(validate_item(&ItemDraft::new("", "x")).len(), 1);
        assert!(validate_item(&ItemDraft::new("Key", "x")).is_empty());
    }

    #[test]
    fn unlock_action_requires_direction() {
        let mut draft = ItemActionDraft::unlock(1, None, Direction::East);
        assert!(validate_action(&draft).is_empty());
        draft.target_direction = None;
        let errors = validate_action(&draft);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("target_direction"));
    }

    #[test]
    fn remove_action_requires_target_item() {
        let mut draft = ItemActionDraft::remove(1, Some(1), 2);
        assert!(validate_action(&draft).is_empty());
        draft.target_item = None;
        assert_eq!(validate_action(&draft).len(), 1);
    }

    #[test]
    fn non_positive_ids_are_reported() {
        let draft = ItemActionDraft::reveal(0, Some(-1), 3);
        let errors = validate_action(&draft);
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().all(|e| matches!(e, ValidationError::InvalidId { .. })));
    }

    #[test]
    fn exit_condition_ids_are_checked() {
        let draft = ExitConditionDraft {
            room_id: 2,
            direction: Direction::North,
            required_item: Some(0),
            locked_message: None,
        };
        assert_eq!(validate_exit_condition(&draft).len(), 1);
    }
}
