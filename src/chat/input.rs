// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 CaretForge Contributors

//! Raw-mode line reader for the REPL
//!
//! A minimal line editor: characters, backspace, Enter, Ctrl+C/Ctrl+D, and
//! Tab completion for `@path` references from the file index. Falls back to
//! plain buffered reads when stdin is not a terminal.

use crossterm::cursor::MoveToColumn;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{self, Clear, ClearType};
use crossterm::ExecutableCommand;
use std::io::{self, BufRead, IsTerminal, Write};

use crate::indexer::FileIndex;

/// What one read produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// A complete input line
    Line(String),
    /// Ctrl+C
    Interrupted,
    /// Ctrl+D on an empty line, or stdin closed
    Eof,
}

/// Read one line, with Tab-after-`@` completion.
pub fn read_line(prompt: &str, index: &FileIndex) -> io::Result<ReadOutcome> {
    if !io::stdin().is_terminal() {
        return read_line_plain(prompt);
    }

    let mut stdout = io::stdout();
    write!(stdout, "{}", prompt)?;
    stdout.flush()?;

    terminal::enable_raw_mode()?;
    let outcome = read_line_raw(prompt, index, &mut stdout);
    terminal::disable_raw_mode()?;
    writeln!(stdout)?;
    outcome
}

fn read_line_plain(prompt: &str) -> io::Result<ReadOutcome> {
    let mut stdout = io::stdout();
    write!(stdout, "{}", prompt)?;
    stdout.flush()?;

    let mut line = String::new();
    let read = io::stdin().lock().read_line(&mut line)?;
    if read == 0 {
        return Ok(ReadOutcome::Eof);
    }
    Ok(ReadOutcome::Line(line.trim_end_matches(['\n', '\r']).to_string()))
}

fn read_line_raw(
    prompt: &str,
    index: &FileIndex,
    stdout: &mut io::Stdout,
) -> io::Result<ReadOutcome> {
    let mut buffer = String::new();

    loop {
        let Event::Key(KeyEvent {
            code, modifiers, ..
        }) = event::read()?
        else {
            continue;
        };

        match code {
            KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => {
                return Ok(ReadOutcome::Interrupted);
            }
            KeyCode::Char('d') if modifiers.contains(KeyModifiers::CONTROL) => {
                if buffer.is_empty() {
                    return Ok(ReadOutcome::Eof);
                }
            }
            KeyCode::Enter => {
                return Ok(ReadOutcome::Line(buffer));
            }
            KeyCode::Backspace => {
                buffer.pop();
                redraw(prompt, &buffer, stdout)?;
            }
            KeyCode::Tab => {
                apply_completion(&mut buffer, index, stdout)?;
                redraw(prompt, &buffer, stdout)?;
            }
            KeyCode::Char(c) => {
                buffer.push(c);
                write!(stdout, "{}", c)?;
                stdout.flush()?;
            }
            _ => {}
        }
    }
}

fn redraw(prompt: &str, buffer: &str, stdout: &mut io::Stdout) -> io::Result<()> {
    stdout.execute(MoveToColumn(0))?;
    stdout.execute(Clear(ClearType::CurrentLine))?;
    write!(stdout, "{}{}", prompt, buffer)?;
    stdout.flush()
}

/// On Tab: a single candidate replaces the token, several are listed.
fn apply_completion(
    buffer: &mut String,
    index: &FileIndex,
    stdout: &mut io::Stdout,
) -> io::Result<()> {
    let completions = index.complete(buffer);
    match completions.len() {
        0 => Ok(()),
        1 => {
            if let Some(at) = buffer.rfind('@') {
                buffer.truncate(at);
                buffer.push_str(&completions[0]);
            }
            Ok(())
        }
        _ => {
            write!(stdout, "\r\n")?;
            for completion in completions.iter().take(20) {
                write!(stdout, "  {}\r\n", completion)?;
            }
            if completions.len() > 20 {
                write!(stdout, "  … {} more\r\n", completions.len() - 20)?;
            }
            stdout.flush()
        }
    }
}
