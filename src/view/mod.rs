pub mod console;
pub mod display;

use crate::event::DeviceEvent;
use std::io;

/// Width of the CommandPad OLED in characters.
pub const VISIBLE_CHARS: usize = 20;
pub const SCROLL_PADDING: usize = 5;
pub const IDLE_TEXT: &str = "CommandPad Ready";

/// What the display shows. Built from a single event; never merged.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DisplayFrame {
    pub text: String,
    /// Present only when `text` does not fit in `VISIBLE_CHARS`.
    pub scroll_offset: Option<usize>,
    pub truncated: bool,
}

impl DisplayFrame {
    pub fn new(text: String, truncated: bool) -> Self {
        let scroll_offset = if text.chars().count() > VISIBLE_CHARS {
            Some(0)
        } else {
            None
        };
        DisplayFrame {
            text,
            scroll_offset,
            truncated,
        }
    }

    pub fn blank() -> Self {
        DisplayFrame::default()
    }

    pub fn from_event(event: &DeviceEvent) -> Self {
        match event {
            DeviceEvent::VolumeChanged { level } => {
                DisplayFrame::new(format!("Volume: {}%", level), false)
            }
            DeviceEvent::NowPlaying {
                title,
                artist,
                truncated,
            } => {
                let text = match artist {
                    Some(artist) => format!("{} - {}", artist, title),
                    None => title.clone(),
                };
                DisplayFrame::new(text, *truncated)
            }
            DeviceEvent::PlaybackStopped => DisplayFrame::new(IDLE_TEXT.into(), false),
            DeviceEvent::Disconnected => DisplayFrame::new("Disconnected".into(), false),
            DeviceEvent::Reconnected { .. } => DisplayFrame::new("Connected".into(), false),
        }
    }

    pub fn scroll(self: &mut Self) {
        let period = self.text.chars().count() + SCROLL_PADDING;
        if let Some(offset) = self.scroll_offset.as_mut() {
            *offset = (*offset + 1) % period;
        }
    }

    /// The `VISIBLE_CHARS` wide window currently on screen.
    pub fn visible(self: &Self) -> String {
        match self.scroll_offset {
            None => self.text.clone(),
            Some(offset) => self
                .text
                .chars()
                .chain(std::iter::repeat(' ').take(SCROLL_PADDING))
                .cycle()
                .skip(offset)
                .take(VISIBLE_CHARS)
                .collect(),
        }
    }
}

pub trait DisplaySink {
    fn show(&mut self, frame: &DisplayFrame) -> io::Result<()>;

    /// One-off status line, e.g. a connection change.
    fn notify(&mut self, _message: &str) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::protocol;

    #[test]
    fn frames_from_events() {
        assert_eq!(
            DisplayFrame::from_event(&DeviceEvent::VolumeChanged { level: 75 }).text,
            "Volume: 75%"
        );
        let frame = DisplayFrame::from_event(&DeviceEvent::NowPlaying {
            title: "Song".into(),
            artist: Some("Band".into()),
            truncated: false,
        });
        assert_eq!(frame.text, "Band - Song");
        assert_eq!(frame.scroll_offset, None);
        assert_eq!(
            DisplayFrame::from_event(&DeviceEvent::PlaybackStopped).text,
            IDLE_TEXT
        );
    }

    #[test]
    fn long_title_frame_is_truncated_and_flagged() {
        let line = format!("T:{}", "A very long song title ".repeat(5));
        let event = protocol::decode(&line).unwrap();
        let frame = DisplayFrame::from_event(&event);

        assert!(frame.truncated);
        assert!(frame.text.ends_with(protocol::TRUNCATION_MARKER));
        assert_eq!(frame.text.chars().count(), protocol::MAX_TITLE_LEN);
        assert_eq!(frame.scroll_offset, Some(0));
    }

    #[test]
    fn scrolling_wraps_with_padding() {
        let mut frame = DisplayFrame::new("abcdefghijklmnopqrstuvwxy".into(), false);
        assert_eq!(frame.visible(), "abcdefghijklmnopqrst");

        frame.scroll();
        assert_eq!(frame.visible(), "bcdefghijklmnopqrstu");

        for _ in 0..20 {
            frame.scroll();
        }
        assert_eq!(frame.scroll_offset, Some(21));
        assert_eq!(frame.visible(), "vwxy     abcdefghijk");

        for _ in 0..9 {
            frame.scroll();
        }
        assert_eq!(frame.scroll_offset, Some(0));
    }

    #[test]
    fn short_text_does_not_scroll() {
        let mut frame = DisplayFrame::new("Volume: 5%".into(), false);
        frame.scroll();
        assert_eq!(frame.scroll_offset, None);
        assert_eq!(frame.visible(), "Volume: 5%");
    }
}
