//! Raw-mode line editor.
//!
//! The terminal is switched to raw mode so every keystroke arrives on its
//! own. The line being typed is kept in an [`InputBuffer`] and echoed
//! locally; when server text arrives the line is hidden, the text printed,
//! and the line shown again underneath it.

use super::{Console, ConsoleInput};
use async_trait::async_trait;
use crossterm::{
    cursor::MoveToColumn,
    event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    queue,
    terminal::{disable_raw_mode, enable_raw_mode, Clear, ClearType},
};
use futures::StreamExt;
use std::borrow::Cow;
use std::io::{self, Stdout, Write};

/// What a keystroke did to the buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Edit {
    /// Nothing visible changed.
    None,
    /// A character was appended and should be echoed.
    Echo(char),
    /// The line changed in a way that needs a full redraw.
    Redraw,
    /// Enter was pressed; the line, with `\n` appended.
    Submit(String),
    /// Ctrl-C.
    Interrupt,
    /// Ctrl-D on an empty line.
    Closed,
}

/// The line currently being typed, bounded in bytes.
#[derive(Debug)]
pub struct InputBuffer {
    line: String,
    capacity: usize,
}

impl InputBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            line: String::with_capacity(capacity),
            capacity,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.line
    }

    /// Apply one key event.
    pub fn feed(&mut self, key: KeyEvent) -> Edit {
        if key.kind == KeyEventKind::Release {
            return Edit::None;
        }

        if key.modifiers.contains(KeyModifiers::CONTROL) {
            return match key.code {
                KeyCode::Char('c') => Edit::Interrupt,
                KeyCode::Char('d') if self.line.is_empty() => Edit::Closed,
                _ => Edit::None,
            };
        }

        match key.code {
            KeyCode::Enter => {
                let mut line = std::mem::take(&mut self.line);
                line.push('\n');
                Edit::Submit(line)
            }
            KeyCode::Backspace => {
                if self.line.pop().is_some() {
                    Edit::Redraw
                } else {
                    Edit::None
                }
            }
            KeyCode::Char(c) => {
                // Full buffer: drop the keystroke.
                if self.line.len() + c.len_utf8() > self.capacity {
                    return Edit::None;
                }
                self.line.push(c);
                Edit::Echo(c)
            }
            _ => Edit::None,
        }
    }
}

/// Raw mode for as long as this value lives.
struct RawMode;

impl RawMode {
    fn enable() -> io::Result<Self> {
        enable_raw_mode()?;
        Ok(RawMode)
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
    }
}

/// Raw mode turns off output post-processing, so a bare `\n` would not
/// return the cursor to column zero.
fn raw_newlines(text: &str) -> Cow<'_, str> {
    if text.contains('\n') {
        Cow::Owned(text.replace('\n', "\r\n"))
    } else {
        Cow::Borrowed(text)
    }
}

/// The line being edited and the writer it is drawn on.
pub struct LineView<W> {
    buffer: InputBuffer,
    prompt: String,
    out: W,
}

impl<W: Write> LineView<W> {
    pub fn new(max_line: usize, prompt: String, out: W) -> Self {
        Self {
            buffer: InputBuffer::new(max_line),
            prompt,
            out,
        }
    }

    fn hide_line(&mut self) -> io::Result<()> {
        queue!(self.out, Clear(ClearType::CurrentLine), MoveToColumn(0))
    }

    fn show_line(&mut self) -> io::Result<()> {
        self.out.write_all(self.buffer.as_str().as_bytes())
    }

    /// Apply a key and redraw. Returns the input to act on, if any.
    pub fn handle_key(&mut self, key: KeyEvent) -> io::Result<Option<ConsoleInput>> {
        let input = match self.buffer.feed(key) {
            Edit::None => None,
            Edit::Echo(c) => {
                write!(self.out, "{}", c)?;
                None
            }
            Edit::Redraw => {
                self.hide_line()?;
                self.show_line()?;
                None
            }
            Edit::Submit(line) => {
                self.hide_line()?;
                write!(self.out, "{}{}", self.prompt, raw_newlines(&line))?;
                Some(ConsoleInput::Line(line.into_bytes()))
            }
            Edit::Interrupt => Some(ConsoleInput::Interrupted),
            Edit::Closed => Some(ConsoleInput::Closed),
        };
        self.out.flush()?;
        Ok(input)
    }

    /// Print server text above the line being typed.
    pub fn show_remote(&mut self, text: &str) -> io::Result<()> {
        self.hide_line()?;
        self.out.write_all(raw_newlines(text).as_bytes())?;
        self.show_line()?;
        self.out.flush()
    }

    pub fn notice(&mut self, message: &str) -> io::Result<()> {
        self.hide_line()?;
        write!(self.out, "{}\r\n", raw_newlines(message))?;
        self.out.flush()
    }
}

/// Console backed by a raw-mode terminal.
pub struct EditorConsole {
    view: LineView<Stdout>,
    events: EventStream,
    _raw: RawMode,
}

impl EditorConsole {
    /// Enter raw mode. The terminal is restored when the console is dropped.
    pub fn new(max_line: usize, prompt: String) -> io::Result<Self> {
        let raw = RawMode::enable()?;
        Ok(Self {
            view: LineView::new(max_line, prompt, io::stdout()),
            events: EventStream::new(),
            _raw: raw,
        })
    }
}

#[async_trait]
impl Console for EditorConsole {
    async fn next_input(&mut self) -> io::Result<ConsoleInput> {
        // Only the stream poll is an await point, so cancelling between
        // keys leaves the buffer intact.
        loop {
            match self.events.next().await {
                Some(Ok(Event::Key(key))) => {
                    if let Some(input) = self.view.handle_key(key)? {
                        return Ok(input);
                    }
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e),
                None => return Ok(ConsoleInput::Closed),
            }
        }
    }

    async fn show_remote(&mut self, text: &str) -> io::Result<()> {
        self.view.show_remote(text)
    }

    async fn notice(&mut self, message: &str) -> io::Result<()> {
        self.view.notice(message)
    }
}
