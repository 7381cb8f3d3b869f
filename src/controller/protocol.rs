// CommandPad line protocol

use crate::error::LinkError;
use crate::event::DeviceEvent;
use heapless::Vec as SVec;

pub const LINE_CAPACITY: usize = 256;
pub const TERMINATOR: u8 = b'\n';

pub const VOLUME_PREFIX: &str = "V:";
pub const VOLUME_PREFIX_LONG: &str = "VOL:";
pub const TITLE_PREFIX: &str = "T:";
pub const MEDIA_PREFIX: &str = "MEDIA:";
pub const STOP: &str = "STOP";

pub const FIELD_SEPARATOR: char = '|';
pub const MAX_TITLE_LEN: usize = 50;
pub const MAX_ARTIST_LEN: usize = 30;
pub const TRUNCATION_MARKER: char = '…';

pub const MAX_VOLUME: i64 = 100;

/// Splits a byte stream into lines. Partial lines are kept across calls.
/// A `\r` right before the terminator is not buffered, so it does not count
/// against `LINE_CAPACITY`.
pub struct LineFramer {
    buffer: SVec<u8, LINE_CAPACITY>,
    carriage: bool,
    discarding: bool,
}

impl Default for LineFramer {
    fn default() -> Self {
        LineFramer {
            buffer: SVec::new(),
            carriage: false,
            discarding: false,
        }
    }
}

impl LineFramer {
    pub fn feed<F>(self: &mut Self, bytes: &[u8], mut on_line: F)
    where
        F: FnMut(Result<&str, LinkError>),
    {
        for &byte in bytes {
            if byte == TERMINATOR {
                self.finish_line(&mut on_line);
                continue;
            }

            if self.carriage {
                self.carriage = false;
                self.push(b'\r');
            }
            if byte == b'\r' {
                self.carriage = true;
            } else {
                self.push(byte);
            }
        }
    }

    fn push(self: &mut Self, byte: u8) {
        if !self.discarding && self.buffer.push(byte).is_err() {
            self.buffer.clear();
            self.discarding = true;
        }
    }

    fn finish_line<F>(self: &mut Self, on_line: &mut F)
    where
        F: FnMut(Result<&str, LinkError>),
    {
        self.carriage = false;
        if self.discarding {
            self.discarding = false;
            on_line(Err(LinkError::MalformedMessage(format!(
                "line longer than {} bytes",
                LINE_CAPACITY
            ))));
        } else {
            match core::str::from_utf8(&self.buffer) {
                Ok(line) => on_line(Ok(line)),
                Err(e) => on_line(Err(LinkError::MalformedMessage(format!(
                    "invalid utf-8: {}",
                    e
                )))),
            }
        }
        self.buffer.clear();
    }

    /// Drops any partial line, e.g. after the port was lost.
    pub fn reset(self: &mut Self) {
        self.buffer.clear();
        self.carriage = false;
        self.discarding = false;
    }

    pub fn pending(self: &Self) -> usize {
        self.buffer.len() + self.carriage as usize
    }
}

pub fn decode(line: &str) -> Result<DeviceEvent, LinkError> {
    let line = line.trim();

    if line.is_empty() {
        return Err(LinkError::MalformedMessage("empty line".into()));
    }

    if let Some(payload) = line
        .strip_prefix(VOLUME_PREFIX_LONG)
        .or_else(|| line.strip_prefix(VOLUME_PREFIX))
    {
        let value: i64 = payload
            .trim()
            .parse()
            .map_err(|_| LinkError::MalformedMessage(format!("bad volume {:?}", payload)))?;
        return Ok(DeviceEvent::VolumeChanged {
            level: value.clamp(0, MAX_VOLUME) as u8,
        });
    }

    if let Some(payload) = line.strip_prefix(TITLE_PREFIX) {
        let mut fields = payload.splitn(2, FIELD_SEPARATOR);
        let title = fields.next().unwrap_or_default();
        return now_playing(title, fields.next());
    }

    if let Some(payload) = line.strip_prefix(MEDIA_PREFIX) {
        // MEDIA:playing|title|artist
        let mut fields = payload.splitn(3, FIELD_SEPARATOR);
        let playing = fields.next().unwrap_or_default();
        let title = fields
            .next()
            .ok_or_else(|| LinkError::MalformedMessage(format!("missing title in {:?}", line)))?;
        return match playing {
            "1" => now_playing(title, fields.next()),
            "0" => Ok(DeviceEvent::PlaybackStopped),
            other => Err(LinkError::MalformedMessage(format!(
                "bad playing flag {:?}",
                other
            ))),
        };
    }

    if line == STOP {
        return Ok(DeviceEvent::PlaybackStopped);
    }

    Err(LinkError::MalformedMessage(format!("unknown line {:?}", line)))
}

fn now_playing(title: &str, artist: Option<&str>) -> Result<DeviceEvent, LinkError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(LinkError::MalformedMessage("empty title".into()));
    }

    let (title, truncated) = truncate(title, MAX_TITLE_LEN);
    let artist = artist
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(|a| truncate(a, MAX_ARTIST_LEN).0);

    Ok(DeviceEvent::NowPlaying {
        title,
        artist,
        truncated,
    })
}

/// Cuts `text` to at most `limit` characters, the last being the marker.
pub fn truncate(text: &str, limit: usize) -> (String, bool) {
    if text.chars().count() <= limit {
        return (text.to_string(), false);
    }

    let mut result: String = text.chars().take(limit.saturating_sub(1)).collect();
    result.push(TRUNCATION_MARKER);
    (result, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_all(chunks: &[&[u8]]) -> Vec<Result<String, String>> {
        let mut framer = LineFramer::default();
        let mut out = Vec::new();
        for chunk in chunks {
            framer.feed(chunk, |line| {
                out.push(line.map(String::from).map_err(|e| e.to_string()))
            });
        }
        out
    }

    #[test]
    fn scenario_lines() {
        assert_eq!(decode("V:75").unwrap(), DeviceEvent::VolumeChanged { level: 75 });
        assert_eq!(
            decode("T:MySong").unwrap(),
            DeviceEvent::NowPlaying {
                title: "MySong".into(),
                artist: None,
                truncated: false
            }
        );
        assert_eq!(decode("V:150").unwrap(), DeviceEvent::VolumeChanged { level: 100 });
        assert!(decode("garbage").is_err());
    }

    #[test]
    fn volume_in_range_is_exact() {
        for level in 0..=100u8 {
            assert_eq!(
                decode(&format!("V:{}", level)).unwrap(),
                DeviceEvent::VolumeChanged { level }
            );
            assert_eq!(
                decode(&format!("VOL:{}", level)).unwrap(),
                DeviceEvent::VolumeChanged { level }
            );
        }
    }

    #[test]
    fn volume_out_of_range_is_clamped() {
        assert_eq!(decode("V:-5").unwrap(), DeviceEvent::VolumeChanged { level: 0 });
        assert_eq!(decode("V:101").unwrap(), DeviceEvent::VolumeChanged { level: 100 });
        assert_eq!(
            decode("VOL:9999999999").unwrap(),
            DeviceEvent::VolumeChanged { level: 100 }
        );
    }

    #[test]
    fn malformed_lines_are_rejected() {
        for line in ["", "   ", "V:", "V:loud", "T:", "T:  |x", "MEDIA:1", "MEDIA:x|a", "vol:3"] {
            assert!(
                matches!(decode(line), Err(LinkError::MalformedMessage(_))),
                "{:?} should be malformed",
                line
            );
        }
    }

    #[test]
    fn media_lines() {
        assert_eq!(
            decode("MEDIA:1|Song|Band").unwrap(),
            DeviceEvent::NowPlaying {
                title: "Song".into(),
                artist: Some("Band".into()),
                truncated: false
            }
        );
        assert_eq!(decode("MEDIA:0|Song|Band").unwrap(), DeviceEvent::PlaybackStopped);
        assert_eq!(decode("STOP").unwrap(), DeviceEvent::PlaybackStopped);
        assert_eq!(
            decode("T:Song|").unwrap(),
            DeviceEvent::NowPlaying {
                title: "Song".into(),
                artist: None,
                truncated: false
            }
        );
    }

    #[test]
    fn long_title_is_truncated_with_marker() {
        let title = "x".repeat(80);
        match decode(&format!("T:{}", title)).unwrap() {
            DeviceEvent::NowPlaying {
                title, truncated, ..
            } => {
                assert!(truncated);
                assert_eq!(title.chars().count(), MAX_TITLE_LEN);
                assert!(title.ends_with(TRUNCATION_MARKER));
            }
            other => panic!("unexpected {:?}", other),
        }

        let (text, cut) = truncate("ééééé", 3);
        assert_eq!(text, "éé…");
        assert!(cut);
        assert_eq!(truncate("short", 50), ("short".into(), false));
    }

    #[test]
    fn framer_reassembles_split_lines() {
        let lines = frame_all(&[b"V:7", b"5\r\nT:My", b"Song\n", b"STO"]);
        assert_eq!(lines, vec![Ok("V:75".into()), Ok("T:MySong".into())]);
    }

    #[test]
    fn framer_reports_bad_lines() {
        let long = vec![b'a'; LINE_CAPACITY + 10];
        let lines = frame_all(&[&long, b"\n\n", &[0xff, 0xfe, b'\n'], b"V:1\n"]);
        assert_eq!(lines.len(), 4);
        assert!(lines[0].is_err());
        assert_eq!(lines[1], Ok(String::new()));
        assert!(lines[2].is_err());
        assert_eq!(lines[3], Ok("V:1".into()));
    }

    #[test]
    fn carriage_return_does_not_use_line_capacity() {
        let mut full = vec![b'a'; LINE_CAPACITY];
        full.extend_from_slice(b"\r\n");
        let mut over = vec![b'a'; LINE_CAPACITY + 1];
        over.extend_from_slice(b"\r\n");

        let lines = frame_all(&[&full, b"a\rb\n", &over, b"V:2\r", b"\n"]);
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], Ok("a".repeat(LINE_CAPACITY)));
        assert_eq!(lines[1], Ok("a\rb".into()));
        assert!(lines[2].is_err());
        assert_eq!(lines[3], Ok("V:2".into()));
    }
}
