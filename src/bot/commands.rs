//! Turning incoming chat messages into bot commands.

use super::telegram::Message;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// `/start` or `/help`
    Help,
    /// `/sweep <address>`; the address may be empty
    Sweep(String),
    /// `/subscribe <address>`
    Subscribe(String),
    /// `/mysubs`
    MySubs,
    /// `/unsubscribe [n|all]`
    Unsubscribe(String),
    /// Plain text that isn't a command
    Text(String),
    /// A shared map location
    Location { latitude: f64, longitude: f64 },
}

impl Command {
    /// Parse a message. Unknown slash commands and empty messages yield `None`.
    pub fn from_message(message: &Message) -> Option<Self> {
        if let Some(loc) = message.location {
            return Some(Command::Location {
                latitude: loc.latitude,
                longitude: loc.longitude,
            });
        }
        Self::parse(message.text.as_deref()?)
    }

    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        let Some(rest) = text.strip_prefix('/') else {
            return Some(Command::Text(text.to_string()));
        };

        let (head, args) = match rest.split_once(char::is_whitespace) {
            Some((head, args)) => (head, args.split_whitespace().collect::<Vec<_>>().join(" ")),
            None => (rest, String::new()),
        };
        // "/sweep@MyBot" in group chats
        let name = head.split('@').next().unwrap_or(head).to_lowercase();

        match name.as_str() {
            "start" | "help" => Some(Command::Help),
            "sweep" => Some(Command::Sweep(args)),
            "subscribe" => Some(Command::Subscribe(args)),
            "mysubs" => Some(Command::MySubs),
            "unsubscribe" => Some(Command::Unsubscribe(args)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::telegram::{Chat, SharedLocation};

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse("/start"), Some(Command::Help));
        assert_eq!(Command::parse("/help"), Some(Command::Help));
        assert_eq!(
            Command::parse("/sweep  1234   Main St, Los Angeles "),
            Some(Command::Sweep("1234 Main St, Los Angeles".to_string()))
        );
        assert_eq!(Command::parse("/sweep"), Some(Command::Sweep(String::new())));
        assert_eq!(
            Command::parse("/subscribe 1234 Main St"),
            Some(Command::Subscribe("1234 Main St".to_string()))
        );
        assert_eq!(Command::parse("/mysubs"), Some(Command::MySubs));
        assert_eq!(
            Command::parse("/unsubscribe all"),
            Some(Command::Unsubscribe("all".to_string()))
        );
    }

    #[test]
    fn test_parse_bot_suffix() {
        assert_eq!(Command::parse("/MySubs@SweepBot"), Some(Command::MySubs));
        assert_eq!(
            Command::parse("/sweep@SweepBot 1 Main St"),
            Some(Command::Sweep("1 Main St".to_string()))
        );
    }

    #[test]
    fn test_parse_text_and_unknown() {
        assert_eq!(
            Command::parse("1234 Main St"),
            Some(Command::Text("1234 Main St".to_string()))
        );
        assert_eq!(Command::parse("/settings"), None);
        assert_eq!(Command::parse("   "), None);
    }

    #[test]
    fn test_from_message_prefers_location() {
        let message = Message {
            message_id: 1,
            chat: Chat { id: 42 },
            text: None,
            location: Some(SharedLocation {
                latitude: 34.05,
                longitude: -118.25,
            }),
        };
        assert_eq!(
            Command::from_message(&message),
            Some(Command::Location {
                latitude: 34.05,
                longitude: -118.25
            })
        );
    }
}
