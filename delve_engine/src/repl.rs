//! Play loop.
//!
//! Reads commands with `rustyline`, applies them through [`WorldMutator`] and prints
//! the results. The loop keeps no game state of its own; everything is read back
//! from the store after each command.
//!
//! [`WorldMutator`]: crate::WorldMutator

use anyhow::{Context, Result};
use colored::Colorize;
use delve_data::Item;
use log::{info, warn};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use crate::action::UseOutcome;
use crate::command::{Command, parse_command};
use crate::mutation::{TakeOutcome, TravelOutcome};
use crate::store::WorldStore;
use crate::style::GameStyle;

/// Control flow signal used by handlers to exit the REPL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplControl {
    Continue,
    Quit,
}

/// Run the play loop until the player quits or input ends.
///
/// # Errors
/// - if the line editor cannot start or input fails
/// - if the store fails underneath a command
pub fn run_repl(store: &mut WorldStore) -> Result<()> {
    let mut editor = DefaultEditor::new().context("starting line editor")?;
    describe_room(store)?;

    loop {
        let state = store.query().game_state()?;
        let prompt = format!(
            "\n[Moves: {}|Score: {}|Health: {}]>> ",
            state.moves, state.score, state.health
        );
        let line = match editor.readline(&prompt) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(err) => return Err(err).context("reading input"),
        };
        if line.trim().is_empty() {
            continue;
        }
        if let Err(err) = editor.add_history_entry(line.as_str()) {
            warn!("could not record history entry: {err}");
        }

        if dispatch(store, parse_command(&line))? == ReplControl::Quit {
            break;
        }
    }
    info!("play session ended");
    Ok(())
}

/// Apply one command to the store and print what happened.
///
/// # Errors
/// - if the store fails underneath the command
pub fn dispatch(store: &mut WorldStore, command: Command) -> Result<ReplControl> {
    match command {
        Command::Look => describe_room(store)?,
        Command::Go(direction) => {
            let outcome = store.play().travel(direction)?;
            match outcome {
                TravelOutcome::NoExit => println!("{}", "You can't go that way.".denied_style()),
                TravelOutcome::Locked(message) => println!("{}", message.denied_style()),
                TravelOutcome::Moved(_) => describe_room(store)?,
            }
        },
        Command::Take(name) => take_handler(store, &name)?,
        Command::Drop(name) => {
            let inventory = store.query().inventory_items()?;
            match find_item(&inventory, &name) {
                Some(item) => {
                    store.play().drop_item(item.id)?;
                    println!("Dropped: {}", item.name.item_style());
                },
                None => println!("{}", "You aren't carrying that.".denied_style()),
            }
        },
        Command::UseItem(name) => {
            let Some(item) = find_reachable_item(store, &name)? else {
                println!("{}", "You don't see that here.".denied_style());
                return Ok(ReplControl::Continue);
            };
            let outcome = store.play().use_item(item.id)?;
            match outcome {
                UseOutcome::Triggered { .. } => println!("{}", outcome.message().triggered_style()),
                _ => println!("{}", outcome.message().description_style()),
            }
        },
        Command::Combine { first, second } => {
            let (Some(a), Some(b)) = (find_reachable_item(store, &first)?, find_reachable_item(store, &second)?)
            else {
                println!("{}", "You need both of those to hand.".denied_style());
                return Ok(ReplControl::Continue);
            };
            let outcome = store.play().combine_items(a.id, b.id)?;
            println!("{}", outcome.message().triggered_style());
        },
        Command::Inventory => {
            let items = store.query().inventory_items()?;
            println!("{}", "Inventory".subheading_style());
            if items.is_empty() {
                println!("  (empty)");
            }
            for item in items {
                println!("  {} - {}", item.name.item_style(), item.description);
            }
        },
        Command::Status => {
            let state = store.query().game_state()?;
            let room = store.query().room(state.current_room)?;
            println!("{}", "Status".subheading_style());
            println!("  Location: {}", room.name.room_style());
            println!("  Score: {}  Health: {}  Moves: {}", state.score, state.health, state.moves);
        },
        Command::Reset => {
            store.play().clear_game_state()?;
            println!("{}", "The world shimmers and resets.".triggered_style());
            describe_room(store)?;
        },
        Command::Help => print_help(),
        Command::Quit => return Ok(ReplControl::Quit),
        Command::Unknown => println!("{}", "I don't understand that.".error_style()),
    }
    Ok(ReplControl::Continue)
}

fn take_handler(store: &mut WorldStore, name: &str) -> Result<()> {
    let here = store.query().game_state()?.current_room;
    let items = store.query().items_in_room(here)?;
    let Some(item) = find_item(&items, name) else {
        println!("{}", "You don't see that here.".denied_style());
        return Ok(());
    };
    match store.play().take_item(item.id)? {
        TakeOutcome::Taken => println!("Taken: {}", item.name.item_style()),
        TakeOutcome::CannotTake => println!("{}", "You can't take that.".denied_style()),
    }
    Ok(())
}

/// Print the current room, its visible items and its exits.
///
/// # Errors
/// - if the room or game state cannot be read
pub fn describe_room(store: &WorldStore) -> Result<()> {
    let query = store.query();
    let state = query.game_state()?;
    let room = query.room(state.current_room)?;

    println!("\n{}", room.name.room_titlebar_style());
    println!("{}", room.description.description_style());

    let items = query.items_in_room(room.id)?;
    if !items.is_empty() {
        println!("{}", "Items".section_style());
        for item in &items {
            println!("  {} {}", "*".bold(), item.room_text().item_style());
        }
    }

    let mut exits = Vec::new();
    for (direction, _) in room.exits() {
        let label = direction.as_str();
        if query.is_exit_locked(room.id, direction)? {
            exits.push(label.exit_locked_style().to_string());
        } else {
            exits.push(label.exit_open_style().to_string());
        }
    }
    if exits.is_empty() {
        println!("{}", "There is no way out.".denied_style());
    } else {
        println!("{} {}", "Exits".section_style(), exits.join(", "));
    }
    Ok(())
}

fn print_help() {
    println!("{}", "Commands".subheading_style());
    for (usage, what) in [
        ("look", "describe where you are"),
        ("go <dir> | n s e w", "move through an exit"),
        ("take <item>", "pick an item up"),
        ("drop <item>", "put an item down here"),
        ("use <item>", "use an item here"),
        ("combine <a> with <b>", "combine two items"),
        ("inventory", "list what you carry"),
        ("status", "show score, health and moves"),
        ("reset", "restart from the beginning"),
        ("quit", "leave the game"),
    ] {
        println!("  {usage:<22} {what}");
    }
}

/// Case-insensitive name match.
pub fn find_item(items: &[Item], name: &str) -> Option<Item> {
    let wanted = name.trim();
    items.iter().find(|item| item.name.eq_ignore_ascii_case(wanted)).cloned()
}

/// Look for an item in the inventory first, then in the current room.
fn find_reachable_item(store: &WorldStore, name: &str) -> Result<Option<Item>> {
    let query = store.query();
    if let Some(item) = find_item(&query.inventory_items()?, name) {
        return Ok(Some(item));
    }
    let here = query.game_state()?.current_room;
    Ok(find_item(&query.items_in_room(here)?, name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use delve_data::Direction;
    use tempfile::tempdir;

    #[test]
    fn find_item_ignores_case_and_padding() {
        let dir = tempdir().expect("tempdir");
        let store = WorldStore::create(dir.path().join("world.db")).expect("create");
        let items = store.query().items_in_room(2).expect("items");
        assert_eq!(find_item(&items, " stick ").map(|i| i.id), Some(2));
        assert!(find_item(&items, "sword").is_none());
    }

    #[test]
    fn dispatch_walks_and_takes() {
        let dir = tempdir().expect("tempdir");
        let mut store = WorldStore::create(dir.path().join("world.db")).expect("create");
        dispatch(&mut store, Command::Go(Direction::South)).expect("go");
        dispatch(&mut store, Command::Take("stone".into())).expect("take");
        assert_eq!(store.query().inventory_items().expect("inv").len(), 1);
        assert_eq!(dispatch(&mut store, Command::Quit).expect("quit"), ReplControl::Quit);
    }
}
