//! Best-effort desktop notifications.
//!
//! Fire-and-forget: a notification that cannot be delivered is logged and
//! dropped. Nothing here may ever block or fail playback.

use std::process::{Command, Stdio};

use crate::config::PlaylistId;

/// "Now playing" notification when a playlist starts.
pub fn now_playing(playlist: PlaylistId, loops: bool, track_name: &str) {
    let loop_text = if loops { " (looping)" } else { "" };
    send(
        "Study Companion Audio",
        &format!("Now playing: Playlist {playlist}{loop_text} - {track_name}"),
    );
}

/// Break-day notification, sent once at setup on break days.
pub fn break_day(day: u32, total: u32) {
    send(
        "Study Companion",
        &format!("Break day {day}/{total} - enjoy your rest!"),
    );
}

/// Send a system notification with a title and message.
pub fn send(title: &str, message: &str) {
    if let Err(e) = try_send(title, message) {
        tracing::debug!("Notification not delivered: {}", e);
    }
}

#[cfg(target_os = "macos")]
fn try_send(title: &str, message: &str) -> std::io::Result<()> {
    let script = format!(
        "display notification \"{}\" with title \"{}\"",
        escape(message),
        escape(title)
    );
    Command::new("osascript")
        .arg("-e")
        .arg(script)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map(|_| ())
}

#[cfg(all(unix, not(target_os = "macos")))]
fn try_send(title: &str, message: &str) -> std::io::Result<()> {
    Command::new("notify-send")
        .arg(title)
        .arg(message)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map(|_| ())
}

#[cfg(not(unix))]
fn try_send(_title: &str, _message: &str) -> std::io::Result<()> {
    Ok(())
}

/// Escape quotes for embedding in an AppleScript string literal.
#[cfg(target_os = "macos")]
fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    #[cfg(target_os = "macos")]
    #[test]
    fn test_escape_quotes() {
        use super::escape;
        assert_eq!(escape(r#"a "quoted" name"#), r#"a \"quoted\" name"#);
        assert_eq!(escape(r"back\slash"), r"back\\slash");
    }

    #[test]
    fn test_send_never_panics() {
        super::send("Study Companion", "test message");
    }
}
