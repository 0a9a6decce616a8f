//! Line commands understood on stdin.

use crate::state::RepeatMode;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Play,
    Pause,
    /// Play when paused, pause when playing.
    Toggle,
    Stop,
    Next,
    Previous,
    /// Zero-based queue index.
    Skip(usize),
    /// Seconds into the current track.
    Seek(f64),
    Volume(f32),
    Repeat(RepeatMode),
    Remove(usize),
    Queue,
    Status,
    Help,
    Quit,
}

pub const HELP: &str = "\
commands:
  play | pause | toggle | stop
  next | prev
  skip N          jump to queue entry N (0-based)
  seek S          seek to S seconds
  vol V           volume, 0.0 to 1.0
  repeat MODE     off | track | queue
  remove N        drop queue entry N
  queue           list the queue
  status          show what is playing
  help | quit";

fn arg<'a>(name: &str, arg: Option<&'a str>) -> Result<&'a str, String> {
    arg.ok_or_else(|| format!("`{name}` needs an argument"))
}

fn number<T: std::str::FromStr>(name: &str, raw: Option<&str>) -> Result<T, String> {
    let raw = arg(name, raw)?;
    raw.parse()
        .map_err(|_| format!("`{name}`: `{raw}` is not a valid number"))
}

fn repeat_mode(raw: &str) -> Result<RepeatMode, String> {
    match raw.to_ascii_lowercase().as_str() {
        "off" | "none" => Ok(RepeatMode::Off),
        "track" | "one" => Ok(RepeatMode::Track),
        "queue" | "all" => Ok(RepeatMode::Queue),
        other => Err(format!("unknown repeat mode `{other}` (off, track, queue)")),
    }
}

/// `Ok(None)` for a blank line.
pub fn parse(line: &str) -> Result<Option<Command>, String> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };
    let rest = words.next();

    let cmd = match verb.to_ascii_lowercase().as_str() {
        "play" => Command::Play,
        "pause" => Command::Pause,
        "toggle" | "p" => Command::Toggle,
        "stop" => Command::Stop,
        "next" | "n" => Command::Next,
        "prev" | "previous" => Command::Previous,
        "skip" => Command::Skip(number("skip", rest)?),
        "seek" => Command::Seek(number("seek", rest)?),
        "vol" | "volume" => Command::Volume(number("vol", rest)?),
        "repeat" => Command::Repeat(repeat_mode(arg("repeat", rest)?)?),
        "remove" | "rm" => Command::Remove(number("remove", rest)?),
        "queue" | "ls" => Command::Queue,
        "status" => Command::Status,
        "help" | "?" => Command::Help,
        "quit" | "exit" | "q" => Command::Quit,
        other => return Err(format!("unknown command `{other}`, try `help`")),
    };
    Ok(Some(cmd))
}
