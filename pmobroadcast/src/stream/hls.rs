//! M3U8 rendering.

use crate::segment::{segment_file_name, HlsSegment};
use chrono::{DateTime, SecondsFormat, Utc};
use std::fmt::Write;

pub const PLAYLIST_CONTENT_TYPE: &str = "application/vnd.apple.mpegurl";
pub const SEGMENT_CONTENT_TYPE: &str = "video/MP2T";

/// Minimal valid playlist served while the live window is empty.
pub fn empty_playlist(target_duration: u32) -> String {
    format!(
        "#EXTM3U\n#EXT-X-VERSION:3\n#EXT-X-ALLOW-CACHE:NO\n#EXT-X-TARGETDURATION:{target_duration}\n#EXT-X-MEDIA-SEQUENCE:0\n"
    )
}

/// Event playlist over `segments`, which must be in ascending sequence order.
///
/// The media sequence is the first segment's; at most `max_visible` entries
/// are listed.
pub fn render_playlist<'a, I>(
    slug: &str,
    target_duration: u32,
    generated_at: DateTime<Utc>,
    segments: I,
    max_visible: usize,
) -> String
where
    I: IntoIterator<Item = &'a HlsSegment>,
{
    let mut segments = segments.into_iter().take(max_visible).peekable();
    let Some(first) = segments.peek() else {
        return empty_playlist(target_duration);
    };

    let mut playlist = String::with_capacity(256 + max_visible * 96);
    playlist.push_str("#EXTM3U\n#EXT-X-VERSION:3\n#EXT-X-ALLOW-CACHE:NO\n#EXT-X-PLAYLIST-TYPE:EVENT\n");
    // Writing into a String cannot fail
    let _ = writeln!(playlist, "#EXT-X-TARGETDURATION:{target_duration}");
    let _ = writeln!(playlist, "#EXT-X-MEDIA-SEQUENCE:{}", first.sequence);
    let _ = writeln!(
        playlist,
        "#EXT-X-PROGRAM-DATE-TIME:{}",
        generated_at.to_rfc3339_opts(SecondsFormat::Millis, true)
    );

    for segment in segments {
        let _ = writeln!(playlist, "#EXTINF:{},{}", segment.duration_secs, segment.metadata);
        let _ = writeln!(
            playlist,
            "segments/{}",
            segment_file_name(slug, segment.sequence)
        );
    }
    playlist
}
