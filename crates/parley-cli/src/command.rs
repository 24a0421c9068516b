//! Input line parsing.
//!
//! Lines starting with `/` are commands; anything else is a chat message for
//! the active room.

use parley_proto::payloads::Message;

/// One parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Send text to the active room.
    Message { content: String },
    /// Switch to another room.
    Join { room_id: String },
    /// Leave the active room.
    Leave,
    /// Start or stop typing.
    Typing { is_typing: bool },
    /// Mark a message read.
    Read { message_id: String },
    /// Replace the content of one of our messages.
    Edit { message_id: String, content: String },
    /// Soft-delete one of our messages.
    Delete { message_id: String },
    /// React to a message.
    React { message_id: String, emoji: String },
    /// Remove our reaction from a message.
    Unreact { message_id: String },
    /// Log the active room's cached history.
    History,
    /// Case-insensitive search over cached messages.
    Search { query: String },
    /// Destroy the messenger and exit.
    Quit,
    /// A known command with missing arguments.
    Usage { usage: &'static str },
    /// Not a known command.
    Unknown { input: String },
}

/// Help text listing every command.
pub const HELP: &str = "/join <room> | /leave | /typing on|off | /read <id> | /edit <id> <text> | \
                        /delete <id> | /react <id> <emoji> | /unreact <id> | /history | \
                        /search <text> | /quit";

/// Parse one input line. Blank lines yield `None`.
pub fn parse(line: &str) -> Option<Command> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let Some(cmd) = line.strip_prefix('/') else {
        return Some(Command::Message { content: line.to_owned() });
    };

    let (name, rest) = cmd.split_once(char::is_whitespace).unwrap_or((cmd, ""));
    let rest = rest.trim();
    let (first, tail) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
    let tail = tail.trim();

    let command = match name {
        "join" if !first.is_empty() => Command::Join { room_id: first.to_owned() },
        "join" => Command::Usage { usage: "/join <room>" },
        "leave" => Command::Leave,
        "typing" => match first {
            "on" => Command::Typing { is_typing: true },
            "off" => Command::Typing { is_typing: false },
            _ => Command::Usage { usage: "/typing on|off" },
        },
        "read" if !first.is_empty() => Command::Read { message_id: first.to_owned() },
        "read" => Command::Usage { usage: "/read <id>" },
        "edit" if !first.is_empty() && !tail.is_empty() => {
            Command::Edit { message_id: first.to_owned(), content: tail.to_owned() }
        },
        "edit" => Command::Usage { usage: "/edit <id> <text>" },
        "delete" if !first.is_empty() => Command::Delete { message_id: first.to_owned() },
        "delete" => Command::Usage { usage: "/delete <id>" },
        "react" if !first.is_empty() && !tail.is_empty() => {
            Command::React { message_id: first.to_owned(), emoji: tail.to_owned() }
        },
        "react" => Command::Usage { usage: "/react <id> <emoji>" },
        "unreact" if !first.is_empty() => Command::Unreact { message_id: first.to_owned() },
        "unreact" => Command::Usage { usage: "/unreact <id>" },
        "history" => Command::History,
        "search" if !rest.is_empty() => Command::Search { query: rest.to_owned() },
        "search" => Command::Usage { usage: "/search <text>" },
        "quit" | "q" => Command::Quit,
        _ => Command::Unknown { input: line.to_owned() },
    };
    Some(command)
}

/// Render a message as one log line.
pub fn render(message: &Message) -> String {
    let mut line = if message.is_deleted() {
        format!("[{}] {}: <deleted>", message.id, message.sender_name)
    } else {
        format!("[{}] {}: {}", message.id, message.sender_name, message.content)
    };

    if message.edited && !message.is_deleted() {
        line.push_str(" (edited)");
    }
    for reaction in &message.reactions {
        line.push(' ');
        line.push_str(&reaction.emoji);
    }
    if message.read {
        line.push_str(" [read]");
    } else if message.delivered {
        line.push_str(" [delivered]");
    }
    line
}

#[cfg(test)]
mod tests {
    use parley_proto::payloads::{MessageKind, Reaction};

    use super::*;

    fn message(content: &str) -> Message {
        Message {
            id: "msg-1".into(),
            room_id: "room-123".into(),
            sender_id: "user-2".into(),
            sender_name: "Bob".into(),
            sender_role: "staff".into(),
            content: content.into(),
            kind: MessageKind::Text,
            attachments: Vec::new(),
            reply_to: None,
            timestamp: 1,
            read: false,
            delivered: false,
            read_by: Vec::new(),
            edited: false,
            deleted_at: None,
            reactions: Vec::new(),
        }
    }

    #[test]
    fn plain_text_is_a_message() {
        assert_eq!(parse("  hello there "), Some(Command::Message { content: "hello there".into() }));
        assert_eq!(parse("   "), None);
    }

    #[test]
    fn commands_with_arguments() {
        assert_eq!(parse("/join room-9"), Some(Command::Join { room_id: "room-9".into() }));
        assert_eq!(parse("/typing on"), Some(Command::Typing { is_typing: true }));
        assert_eq!(parse("/typing off"), Some(Command::Typing { is_typing: false }));
        assert_eq!(
            parse("/edit msg-1 fixed   the typo"),
            Some(Command::Edit { message_id: "msg-1".into(), content: "fixed   the typo".into() })
        );
        assert_eq!(
            parse("/react msg-1 :+1:"),
            Some(Command::React { message_id: "msg-1".into(), emoji: ":+1:".into() })
        );
        assert_eq!(parse("/search Hello World"), Some(Command::Search { query: "Hello World".into() }));
        assert_eq!(parse("/q"), Some(Command::Quit));
    }

    #[test]
    fn missing_arguments_yield_usage() {
        assert_eq!(parse("/join"), Some(Command::Usage { usage: "/join <room>" }));
        assert_eq!(parse("/typing maybe"), Some(Command::Usage { usage: "/typing on|off" }));
        assert_eq!(parse("/edit msg-1"), Some(Command::Usage { usage: "/edit <id> <text>" }));
        assert_eq!(parse("/react msg-1"), Some(Command::Usage { usage: "/react <id> <emoji>" }));
    }

    #[test]
    fn unknown_command() {
        assert_eq!(parse("/dance now"), Some(Command::Unknown { input: "/dance now".into() }));
    }

    #[test]
    fn render_plain_and_flagged() {
        insta::assert_snapshot!(render(&message("hi Alice")), @"[msg-1] Bob: hi Alice");

        let mut m = message("hi Alice");
        m.edited = true;
        m.delivered = true;
        m.reactions.push(Reaction {
            emoji: ":+1:".into(),
            user_id: "user-1".into(),
            user_name: "Alice".into(),
            created_at: 2,
        });
        insta::assert_snapshot!(render(&m), @"[msg-1] Bob: hi Alice (edited) :+1: [delivered]");

        m.read = true;
        m.content.clear();
        m.deleted_at = Some(3);
        insta::assert_snapshot!(render(&m), @"[msg-1] Bob: <deleted> :+1: [read]");
    }
}
