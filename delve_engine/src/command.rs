//! Command module
//!
//! Describes the commands understood while playing.
use delve_data::Direction;
use variantly;

/// Commands that can be executed by the player.
#[derive(Debug, Clone, PartialEq, Eq, variantly::Variantly)]
pub enum Command {
    Combine { first: String, second: String },
    Drop(String),
    Go(Direction),
    Help,
    Inventory,
    Look,
    Quit,
    Reset,
    Status,
    Take(String),
    Unknown,
    UseItem(String),
}

/// Parses an input line into a `Command`. Item names may span several words.
pub fn parse_command(input: &str) -> Command {
    let lowered = input.to_lowercase();
    let words: Vec<&str> = lowered.split_whitespace().collect();
    match words.as_slice() {
        ["look" | "l"] => Command::Look,
        ["go" | "move" | "walk", dir] | [dir @ ("north" | "south" | "east" | "west" | "n" | "s" | "e" | "w")] => {
            dir.parse().map_or(Command::Unknown, Command::Go)
        },
        ["take" | "get", rest @ ..] | ["pick", "up", rest @ ..] if !rest.is_empty() => Command::Take(rest.join(" ")),
        ["drop", rest @ ..] if !rest.is_empty() => Command::Drop(rest.join(" ")),
        ["use", rest @ ..] if !rest.is_empty() => Command::UseItem(rest.join(" ")),
        ["combine", rest @ ..] => parse_combine(rest),
        ["inventory" | "inv" | "i"] => Command::Inventory,
        ["status" | "score"] => Command::Status,
        ["reset" | "restart"] => Command::Reset,
        ["help" | "?"] => Command::Help,
        ["quit" | "exit" | "q"] => Command::Quit,
        _ => Command::Unknown,
    }
}

/// `combine <a> with <b>`, where both names may span several words.
fn parse_combine(words: &[&str]) -> Command {
    let Some(split) = words.iter().position(|w| *w == "with" || *w == "and") else {
        return Command::Unknown;
    };
    let (first, second) = (&words[..split], &words[split + 1..]);
    if first.is_empty() || second.is_empty() {
        return Command::Unknown;
    }
    Command::Combine {
        first: first.join(" "),
        second: second.join(" "),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn movement_forms() {
        assert_eq!(parse_command("go north"), Command::Go(Direction::North));
        assert_eq!(parse_command("S"), Command::Go(Direction::South));
        assert_eq!(parse_command("walk west"), Command::Go(Direction::West));
        assert_eq!(parse_command("go up"), Command::Unknown);
    }

    #[test]
    fn item_names_keep_all_words() {
        assert_eq!(parse_command("take rusty key"), Command::Take("rusty key".into()));
        assert_eq!(parse_command("pick up Stone"), Command::Take("stone".into()));
        assert_eq!(parse_command("use old lamp"), Command::UseItem("old lamp".into()));
        assert!(parse_command("drop").is_unknown());
    }

    #[test]
    fn combine_splits_on_with() {
        assert_eq!(
            parse_command("combine rope with iron hook"),
            Command::Combine {
                first: "rope".into(),
                second: "iron hook".into()
            }
        );
        assert!(parse_command("combine rope").is_unknown());
        assert!(parse_command("combine with hook").is_unknown());
    }

    #[test]
    fn simple_verbs() {
        assert!(parse_command("inv").is_inventory());
        assert!(parse_command("quit").is_quit());
        assert!(parse_command("  look ").is_look());
        assert!(parse_command("").is_unknown());
    }
}
