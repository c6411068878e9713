//! The message bus between the daemon's collaborators: host-originated events
//! (tab switches, activity pings, host-side UI announcements) and the idle
//! monitor's auto-pause request all flow through one channel into the
//! coordinator. Sends are fire-and-forget: a full or closed channel drops the
//! message, which is the delivery guarantee the system is built around.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveTab {
    pub tab_id: u64,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Message {
    /// The host-side UI applied a timer transition; `active` is the new
    /// effective state.
    TimerStatusChanged { active: bool },
    /// A page asks for the current status (and its own blocking decision) on
    /// load.
    GetTimerStatus { tab_id: u64, url: String },
    /// The site list or mode changed; every tab must re-evaluate its overlay.
    WatchlistUpdated,
    /// Any user interaction observed by a page.
    UserActivity,
    /// Idle monitor verdict: pause the running timer.
    AutoPauseTimer,
    TabActivated { tab_id: u64, url: Option<String> },
    NavigationCompleted { tab_id: u64, url: String },
    /// `None` means the browser itself lost focus.
    WindowFocusChanged { tab: Option<ActiveTab> },
    /// Coarse platform idle classification, an additional auto-pause trigger.
    IdleStateChanged { idle: bool },
}

/// Best-effort send. Dropping a message because nobody is listening (or the
/// coordinator is behind) is a defined no-op.
pub fn send_or_drop(sender: &mpsc::Sender<Message>, message: Message) {
    if let Err(e) = sender.try_send(message) {
        debug!("Dropping undeliverable message: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::Message;

    #[test]
    fn test_wire_names_match_the_protocol() {
        let encoded = serde_json::to_string(&Message::AutoPauseTimer).unwrap();
        assert_eq!(encoded, r#"{"type":"AUTO_PAUSE_TIMER"}"#);

        let decoded: Message =
            serde_json::from_str(r#"{"type":"TIMER_STATUS_CHANGED","active":true}"#).unwrap();
        assert_eq!(decoded, Message::TimerStatusChanged { active: true });

        let decoded: Message = serde_json::from_str(
            r#"{"type":"NAVIGATION_COMPLETED","tab_id":7,"url":"https://docs.rs/tokio"}"#,
        )
        .unwrap();
        assert_eq!(
            decoded,
            Message::NavigationCompleted {
                tab_id: 7,
                url: "https://docs.rs/tokio".into()
            }
        );
    }
}
