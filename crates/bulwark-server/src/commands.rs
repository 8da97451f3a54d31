//! Operator command parsing.
//!
//! Turns lines read from the console into structured [`Command`] values.

use bulwark_proto::NodeId;

/// Parsed operator command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Originate FLOOD packets.
    Flood {
        /// Destination node or host.
        destination: NodeId,
        /// Number of packets to send.
        count: usize,
    },

    /// Print the routing table.
    Routes,

    /// Print the neighbor set.
    Neighbors,

    /// Stop the daemon.
    Quit,

    /// Blank line.
    Empty,

    /// Unknown command or input without a leading `/`.
    Unknown {
        /// The original input.
        input: String,
    },

    /// Command with missing or invalid arguments.
    InvalidArgs {
        /// Command name.
        command: String,
        /// Error message.
        error: String,
    },
}

/// Parse one line of operator input.
pub fn parse(input: &str) -> Command {
    let input = input.trim();

    if input.is_empty() {
        return Command::Empty;
    }

    let Some(cmd_str) = input.strip_prefix('/') else {
        return Command::Unknown { input: input.to_string() };
    };

    let parts: Vec<&str> = cmd_str.split_whitespace().collect();
    let command = parts.first().copied().unwrap_or("");

    match command {
        "flood" => match (parts.get(1), parts.get(2)) {
            (None, _) => Command::InvalidArgs {
                command: "flood".into(),
                error: "Usage: /flood <destination> [count]".into(),
            },
            (Some(destination), None) => {
                Command::Flood { destination: (*destination).to_string(), count: 1 }
            },
            (Some(destination), Some(count)) => match count.parse::<usize>() {
                Ok(count) if count > 0 => {
                    Command::Flood { destination: (*destination).to_string(), count }
                },
                _ => Command::InvalidArgs {
                    command: "flood".into(),
                    error: "Count must be a positive integer".into(),
                },
            },
        },

        "routes" => Command::Routes,

        "neighbors" => Command::Neighbors,

        "quit" | "q" => Command::Quit,

        _ => Command::Unknown { input: input.to_string() },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_flood_default_count() {
        assert_eq!(
            parse("/flood 10.0.0.3"),
            Command::Flood { destination: "10.0.0.3".into(), count: 1 }
        );
    }

    #[test]
    fn parse_flood_with_count() {
        assert_eq!(
            parse("  /flood 10.0.0.3 5 "),
            Command::Flood { destination: "10.0.0.3".into(), count: 5 }
        );
    }

    #[test]
    fn parse_flood_missing_destination() {
        assert!(
            matches!(parse("/flood"), Command::InvalidArgs { command, .. } if command == "flood")
        );
    }

    #[test]
    fn parse_flood_bad_count() {
        assert!(matches!(parse("/flood 10.0.0.3 zero"), Command::InvalidArgs { .. }));
        assert!(matches!(parse("/flood 10.0.0.3 0"), Command::InvalidArgs { .. }));
    }

    #[test]
    fn parse_tables() {
        assert_eq!(parse("/routes"), Command::Routes);
        assert_eq!(parse("/neighbors"), Command::Neighbors);
    }

    #[test]
    fn parse_quit() {
        assert_eq!(parse("/quit"), Command::Quit);
        assert_eq!(parse("/q"), Command::Quit);
    }

    #[test]
    fn parse_unknown() {
        assert!(matches!(parse("/unknown"), Command::Unknown { .. }));
        assert!(matches!(parse("hello"), Command::Unknown { .. }));
    }

    #[test]
    fn parse_empty() {
        assert_eq!(parse("   "), Command::Empty);
    }
}
