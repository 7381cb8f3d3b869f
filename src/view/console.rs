use super::{DisplayFrame, DisplaySink, VISIBLE_CHARS};
use std::io::{self, Write};

/// Draws the display window on a single, constantly rewritten terminal line.
/// Notifications are printed above it.
pub struct ConsoleSink<W: Write> {
    out: W,
    last: Option<String>,
}

impl ConsoleSink<io::Stdout> {
    pub fn stdout() -> Self {
        ConsoleSink::new(io::stdout())
    }
}

impl<W: Write> ConsoleSink<W> {
    pub fn new(out: W) -> Self {
        ConsoleSink { out, last: None }
    }

    fn draw(self: &mut Self, window: &str) -> io::Result<()> {
        write!(self.out, "\r[{:<width$}]", window, width = VISIBLE_CHARS)?;
        self.out.flush()
    }
}

impl<W: Write> DisplaySink for ConsoleSink<W> {
    fn show(&mut self, frame: &DisplayFrame) -> io::Result<()> {
        let window = frame.visible();
        self.draw(&window)?;
        self.last = Some(window);
        Ok(())
    }

    fn notify(&mut self, message: &str) -> io::Result<()> {
        write!(self.out, "\r{:<width$}\n", message, width = VISIBLE_CHARS + 2)?;
        match self.last.take() {
            Some(window) => {
                self.draw(&window)?;
                self.last = Some(window);
                Ok(())
            }
            None => self.out.flush(),
        }
    }
}
