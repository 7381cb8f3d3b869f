use super::{DisplayFrame, IDLE_TEXT};
use crate::event::DeviceEvent;
use std::time::{Duration, Instant};

pub const SCROLL_STEP: Duration = Duration::from_millis(300);
pub const SLEEP_AFTER: Duration = Duration::from_secs(30);

/// Host-side mirror of the CommandPad OLED: one active frame, scrolled
/// while it overflows, blanked after a quiet spell with nothing playing.
pub struct Display {
    frame: DisplayFrame,
    playing: bool,
    asleep: bool,
    last_activity: Instant,
    last_scroll: Instant,
}

impl Display {
    pub fn new(now: Instant) -> Self {
        Display {
            frame: DisplayFrame::new(IDLE_TEXT.into(), false),
            playing: false,
            asleep: false,
            last_activity: now,
            last_scroll: now,
        }
    }

    pub fn frame(self: &Self) -> &DisplayFrame {
        &self.frame
    }

    pub fn is_asleep(self: &Self) -> bool {
        self.asleep
    }

    pub fn apply(self: &mut Self, event: &DeviceEvent, now: Instant) {
        match event {
            DeviceEvent::NowPlaying { .. } => self.playing = true,
            DeviceEvent::PlaybackStopped | DeviceEvent::Disconnected => self.playing = false,
            DeviceEvent::VolumeChanged { .. } | DeviceEvent::Reconnected { .. } => {}
        }

        self.frame = DisplayFrame::from_event(event);
        self.asleep = false;
        self.last_activity = now;
        self.last_scroll = now;
    }

    /// Advances time. Returns true when the visible window changed.
    pub fn tick(self: &mut Self, now: Instant) -> bool {
        if self.asleep {
            return false;
        }

        if !self.playing && now.duration_since(self.last_activity) > SLEEP_AFTER {
            log::debug!("Display going to sleep");
            self.asleep = true;
            self.frame = DisplayFrame::blank();
            return true;
        }

        if self.frame.scroll_offset.is_some() && now.duration_since(self.last_scroll) > SCROLL_STEP
        {
            self.frame.scroll();
            self.last_scroll = now;
            return true;
        }

        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn song(title: &str) -> DeviceEvent {
        DeviceEvent::NowPlaying {
            title: title.into(),
            artist: None,
            truncated: false,
        }
    }

    #[test]
    fn each_event_replaces_the_frame() {
        let start = Instant::now();
        let mut display = Display::new(start);
        assert_eq!(display.frame().text, IDLE_TEXT);

        display.apply(&song("Song"), start);
        assert_eq!(display.frame().text, "Song");

        display.apply(&DeviceEvent::VolumeChanged { level: 40 }, start);
        assert_eq!(
            *display.frame(),
            DisplayFrame::new("Volume: 40%".into(), false)
        );
    }

    #[test]
    fn long_text_scrolls_every_step() {
        let start = Instant::now();
        let mut display = Display::new(start);
        display.apply(&song("A title that is too long to fit"), start);

        assert!(!display.tick(start + Duration::from_millis(100)));
        assert!(display.tick(start + Duration::from_millis(400)));
        assert_eq!(display.frame().scroll_offset, Some(1));
        assert!(!display.tick(start + Duration::from_millis(500)));
        assert!(display.tick(start + Duration::from_millis(800)));
        assert_eq!(display.frame().scroll_offset, Some(2));
    }

    #[test]
    fn sleeps_when_idle_and_wakes_on_event() {
        let start = Instant::now();
        let mut display = Display::new(start);
        display.apply(&DeviceEvent::PlaybackStopped, start);

        assert!(!display.tick(start + Duration::from_secs(10)));
        assert!(display.tick(start + Duration::from_secs(31)));
        assert!(display.is_asleep());
        assert!(display.frame().text.is_empty());
        assert!(!display.tick(start + Duration::from_secs(40)));

        display.apply(&DeviceEvent::VolumeChanged { level: 3 }, start + Duration::from_secs(41));
        assert!(!display.is_asleep());
        assert_eq!(display.frame().text, "Volume: 3%");
    }

    #[test]
    fn stays_awake_while_playing() {
        let start = Instant::now();
        let mut display = Display::new(start);
        display.apply(&song("Song"), start);

        display.tick(start + Duration::from_secs(120));
        assert!(!display.is_asleep());
        assert_eq!(display.frame().text, "Song");
    }
}
