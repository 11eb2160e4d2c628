/// A command invocation extracted from a message body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    /// Identifier, lowercased for case-insensitive matching.
    pub name: String,
    /// Argument tail, trimmed. Empty when the command stands alone.
    pub args: String,
}

/// Extract a command invocation from `body`, or `None` when the message is
/// not addressed to the bot (wrong or missing prefix, or bare prefix).
pub fn parse_command(body: &str, prefix: &str) -> Option<ParsedCommand> {
    let trimmed = body.trim();
    let rest = trimmed.strip_prefix(prefix)?;
    if rest.is_empty() || rest.starts_with(char::is_whitespace) {
        return None;
    }

    let (name, args) = match rest.split_once(char::is_whitespace) {
        Some((name, args)) => (name, args.trim()),
        None => (rest, ""),
    };

    Some(ParsedCommand {
        name: name.to_ascii_lowercase(),
        args: args.to_string(),
    })
}
