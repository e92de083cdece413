//! Slash-command parsing.
//!
//! Matching runs in two phases. Phase one compares the whole message
//! against the info commands; only when none of them matches does the
//! prefix ladder of phase two run. Phase-one commands therefore win over
//! any phase-two command with an overlapping keyword.
//!
//! In groups Telegram appends the bot's username to the keyword
//! (`/ping@lumi_bot`). That suffix is removed before matching when it names
//! this bot; a command addressed to any other bot is never ours.

use std::borrow::Cow;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    About,
    CommandsLink,
    Prompt,
    Ping,
    Model,
    Mood(MoodArg),
    Memorize(String),
    ShowMemory,
    Forget(ForgetArg),
    Reset,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoodArg {
    Show,
    List,
    Set(String),
    Usage,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForgetArg {
    All,
    /// 1-based note position.
    Position(usize),
    Usage,
}

/// Result of classifying one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Parsed {
    Command(Command),
    /// Starts with `/` but matches no command.
    UnknownCommand,
    Text,
}

const MEMORIZE_PREFIX: &str = "/memorize ";

pub fn parse(text: &str, bot_username: Option<&str>) -> Parsed {
    if !text.starts_with('/') {
        return Parsed::Text;
    }
    let Some(text) = strip_bot_mention(text, bot_username) else {
        return Parsed::UnknownCommand;
    };
    let lowered = text.to_lowercase();

    if let Some(command) = parse_info_command(&lowered) {
        return Parsed::Command(command);
    }
    match parse_ladder(&text, &lowered) {
        Some(command) => Parsed::Command(command),
        None => Parsed::UnknownCommand,
    }
}

/// Drop an `@username` suffix from the keyword. `None` when the suffix names
/// a different bot.
fn strip_bot_mention<'a>(text: &'a str, bot_username: Option<&str>) -> Option<Cow<'a, str>> {
    let keyword_end = text.find(char::is_whitespace).unwrap_or(text.len());
    let Some(at) = text[..keyword_end].find('@') else {
        return Some(Cow::Borrowed(text));
    };
    let target = &text[at + 1..keyword_end];
    match bot_username {
        Some(me) if target.eq_ignore_ascii_case(me) => Some(Cow::Owned(format!(
            "{}{}",
            &text[..at],
            &text[keyword_end..]
        ))),
        _ => None,
    }
}

fn parse_info_command(lowered: &str) -> Option<Command> {
    match lowered {
        "/lumi" => Some(Command::About),
        "/commands" => Some(Command::CommandsLink),
        _ => None,
    }
}

fn parse_ladder(text: &str, lowered: &str) -> Option<Command> {
    if lowered.starts_with("/prompt") {
        return Some(Command::Prompt);
    }
    if lowered.starts_with("/ping") {
        return Some(Command::Ping);
    }
    if lowered.starts_with("/model") {
        return Some(Command::Model);
    }
    if lowered.starts_with("/mood") {
        return Some(Command::Mood(parse_mood_arg(lowered)));
    }
    if lowered.starts_with(MEMORIZE_PREFIX) {
        let note = text.get(MEMORIZE_PREFIX.len()..).unwrap_or("").trim();
        return Some(Command::Memorize(note.to_string()));
    }
    if lowered.starts_with("/show_memory") {
        return Some(Command::ShowMemory);
    }
    if lowered.starts_with("/forget") {
        return Some(Command::Forget(parse_forget_arg(text)));
    }
    if lowered.starts_with("/reset") {
        return Some(Command::Reset);
    }
    None
}

fn parse_mood_arg(lowered: &str) -> MoodArg {
    let parts: Vec<&str> = lowered.split_whitespace().collect();
    match parts.as_slice() {
        [_] => MoodArg::Show,
        [_, "list"] => MoodArg::List,
        [_, key] => MoodArg::Set((*key).to_string()),
        _ => MoodArg::Usage,
    }
}

fn parse_forget_arg(text: &str) -> ForgetArg {
    let parts: Vec<&str> = text.split_whitespace().collect();
    match parts.as_slice() {
        [_] => ForgetArg::All,
        [_, arg] if arg.chars().all(|c| c.is_ascii_digit()) => {
            // Too large to parse can never name an existing note.
            ForgetArg::Position(arg.parse().unwrap_or(usize::MAX))
        }
        _ => ForgetArg::Usage,
    }
}
