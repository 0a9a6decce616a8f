use std::io::{self, BufRead, Write};

use tracing::debug;

use crate::player::Player;
use crate::state::{PlaybackState, RepeatMode};

use super::commands::{self, Command, HELP};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

fn format_time(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    format!("{:02}:{:02}", total / 60, total % 60)
}

fn repeat_label(mode: RepeatMode) -> &'static str {
    match mode {
        RepeatMode::Off => "off",
        RepeatMode::Track => "track",
        RepeatMode::Queue => "queue",
    }
}

fn status_line(state: &PlaybackState) -> String {
    let Some(track) = state.active_track() else {
        return "nothing queued".to_string();
    };
    let marker = if state.is_playing { "playing" } else { "paused" };
    format!(
        "{marker}: {} [{} / {}] vol {:.0}% repeat {}",
        track.display(),
        format_time(state.position),
        format_time(state.duration),
        state.volume * 100.0,
        repeat_label(state.repeat_mode)
    )
}

fn write_queue(state: &PlaybackState, out: &mut impl Write) -> io::Result<()> {
    if state.queue.is_empty() {
        return writeln!(out, "queue is empty");
    }
    for (i, track) in state.queue.iter().enumerate() {
        let marker = if state.current_index == Some(i) { '>' } else { ' ' };
        writeln!(out, "{marker} {i:>3}  {}", track.display())?;
    }
    Ok(())
}

/// Run one command against the player. Engine errors are reported on `out`
/// and do not end the session.
pub fn execute(player: &Player, cmd: Command, out: &mut impl Write) -> io::Result<Flow> {
    debug!(?cmd, "console command");
    let result = match cmd {
        Command::Play => player.play(),
        Command::Pause => player.pause(),
        Command::Toggle => {
            if player.snapshot().is_playing {
                player.pause()
            } else {
                player.play()
            }
        }
        Command::Stop => player.stop(),
        Command::Next => player.skip_to_next(),
        Command::Previous => player.skip_to_previous(),
        Command::Skip(index) => player.skip(index),
        Command::Seek(seconds) => player.seek_to(seconds),
        Command::Volume(volume) => player.set_volume(volume),
        Command::Repeat(mode) => player.set_repeat_mode(mode),
        Command::Remove(index) => player.remove(index),
        Command::Queue => {
            write_queue(&player.snapshot(), out)?;
            return Ok(Flow::Continue);
        }
        Command::Status => {
            writeln!(out, "{}", status_line(&player.snapshot()))?;
            return Ok(Flow::Continue);
        }
        Command::Help => {
            writeln!(out, "{HELP}")?;
            return Ok(Flow::Continue);
        }
        Command::Quit => return Ok(Flow::Quit),
    };

    if let Err(e) = result {
        writeln!(out, "error: {e}")?;
    }
    Ok(Flow::Continue)
}

/// Read commands from `input` until `quit` or end of input.
pub fn run(player: &Player, input: impl BufRead, out: &mut impl Write) -> io::Result<()> {
    for line in input.lines() {
        let line = line?;
        let cmd = match commands::parse(&line) {
            Ok(Some(cmd)) => cmd,
            Ok(None) => continue,
            Err(msg) => {
                writeln!(out, "{msg}")?;
                continue;
            }
        };
        if execute(player, cmd, out)? == Flow::Quit {
            break;
        }
        out.flush()?;
    }
    Ok(())
}
