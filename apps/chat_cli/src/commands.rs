use std::path::PathBuf;

use shared::domain::FeedbackKind;

pub const HELP: &str = "\
commands:
  <text>                      send a chat message
  /image PATH [prompt]        upload an image with an optional prompt
  /new                        start a new chat
  /sessions                   list stored sessions
  /open N                     open session N
  /delete N                   delete session N
  /clear-all --yes            delete all chat history
  /feedback N KIND [text]     rate message N (thumbs_up, thumbs_down, format_mismatch, too_long, too_short, off_topic)
  /messages                   print the current conversation
  /help                       show this help
  /quit                       exit";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Chat(String),
    Image {
        path: PathBuf,
        prompt: Option<String>,
    },
    NewChat,
    Sessions,
    Open(usize),
    Delete(usize),
    ClearAll,
    Feedback {
        index: usize,
        kind: FeedbackKind,
        text: String,
    },
    Messages,
    Help,
    Quit,
}

/// Parses one input line. `None` for blank lines.
pub fn parse_command(line: &str) -> Result<Option<Command>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let Some(rest) = line.strip_prefix('/') else {
        return Ok(Some(Command::Chat(line.to_string())));
    };

    let (name, args) = split_word(rest);
    let command = match name {
        "image" => {
            let (path, prompt) = split_word(args);
            if path.is_empty() {
                return Err("usage: /image PATH [prompt]".into());
            }
            Command::Image {
                path: PathBuf::from(path),
                prompt: Some(prompt.to_string()).filter(|p| !p.is_empty()),
            }
        }
        "new" => Command::NewChat,
        "sessions" => Command::Sessions,
        "open" => Command::Open(parse_index(args, "usage: /open N")?),
        "delete" => Command::Delete(parse_index(args, "usage: /delete N")?),
        "clear-all" => {
            if args != "--yes" {
                return Err("this deletes every session; confirm with /clear-all --yes".into());
            }
            Command::ClearAll
        }
        "feedback" => {
            let (index, rest) = split_word(args);
            let (kind, text) = split_word(rest);
            let index = parse_index(index, "usage: /feedback N KIND [text]")?;
            let kind = kind.parse::<FeedbackKind>().map_err(|e| e.to_string())?;
            Command::Feedback {
                index,
                kind,
                text: text.to_string(),
            }
        }
        "messages" => Command::Messages,
        "help" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => return Err(format!("unknown command /{other}; try /help")),
    };
    Ok(Some(command))
}

fn split_word(input: &str) -> (&str, &str) {
    let input = input.trim();
    match input.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (input, ""),
    }
}

fn parse_index(raw: &str, usage: &str) -> Result<usize, String> {
    match raw.trim().parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(usage.to_string()),
    }
}
