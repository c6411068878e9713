//! Terminal rendering for the status and breakdown views.

use ansi_term::Colour;
use chrono::{DateTime, Utc};

use crate::{
    classifier::{ListMode, Settings},
    daemon::accounting::DomainLedger,
    timer::{TimerState, TimerStatus},
    utils::{
        percentage::{share_of_total, Percentage},
        time::{format_compact, format_hms},
    },
};

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "on"
    } else {
        "off"
    }
}

pub fn render_status(timer: &TimerState, settings: &Settings, now: DateTime<Utc>) -> String {
    let status = match timer.status {
        TimerStatus::Running => Colour::Green.paint("Running"),
        TimerStatus::Paused if timer.auto_paused => Colour::Yellow.paint("Paused (auto)"),
        TimerStatus::Paused => Colour::Yellow.paint("Paused"),
        TimerStatus::Stopped => Colour::Red.paint("Stopped"),
    };

    let session_ms = timer.current_session_ms(now);
    let today_ms = timer.today_total_ms + session_ms;

    let list = settings.active_list();
    let mode = match settings.list_mode {
        ListMode::Blacklist => "blacklist",
        ListMode::Whitelist => "whitelist",
    };

    let mut out = String::new();
    out.push_str(&format!("Status:  {status}\n"));
    out.push_str(&format!("Session: {}\n", format_hms(session_ms)));
    out.push_str(&format!(
        "Today:   {} ({} distracted)\n",
        format_compact(today_ms),
        format_compact(timer.distraction_ms),
    ));
    out.push_str(&format!(
        "Sites:   {mode} mode, {} entries, lock-in {}, dim {}\n",
        list.len(),
        on_off(settings.lock_in_enabled),
        on_off(settings.dim_inactive),
    ));
    out.push_str(&format!(
        "Breaks:  posture {}, eye rest {}\n",
        on_off(settings.posture_enabled),
        on_off(settings.eye_rest_enabled),
    ));
    out
}

pub fn render_breakdown(ledger: &DomainLedger, min_percentage: Option<Percentage>) -> String {
    if ledger.is_empty() {
        return "No time recorded today.\n".to_string();
    }

    let total_ms = ledger.total_ms();
    let mut out = format!("Today: {}\n", format_compact(total_ms));
    for (domain, ms) in ledger.sorted() {
        let share = share_of_total(ms, total_ms);
        if matches!(min_percentage, Some(min) if share < min) {
            continue;
        }
        out.push_str(&format!(
            "{:<30} {:>8} {:>7}\n",
            Colour::Cyan.paint(domain).to_string(),
            format_compact(ms),
            share.to_string(),
        ));
    }
    out
}

pub fn render_sites(settings: &Settings) -> String {
    let mode = match settings.list_mode {
        ListMode::Blacklist => "blacklist",
        ListMode::Whitelist => "whitelist",
    };
    let mut out = format!("Mode: {mode}\n");

    let render_list = |name: &str, active: bool, entries: Vec<&str>| {
        let marker = if active { " (enforced)" } else { "" };
        let mut section = format!("{name}{marker}:\n");
        if entries.is_empty() {
            section.push_str("  (empty)\n");
        } else {
            for entry in entries {
                section.push_str(&format!("  {entry}\n"));
            }
        }
        section
    };

    out.push_str(&render_list(
        "Watchlist",
        settings.list_mode == ListMode::Blacklist,
        settings.watchlist.iter().collect(),
    ));
    out.push_str(&render_list(
        "Whitelist",
        settings.list_mode == ListMode::Whitelist,
        settings.whitelist.iter().collect(),
    ));
    out
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};

    use crate::{
        classifier::Settings, daemon::accounting::DomainLedger, timer::TimerState,
        utils::percentage::Percentage,
    };

    use super::{render_breakdown, render_sites, render_status};

    fn start() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2018, 7, 4, 9, 0, 0).unwrap()
    }

    #[test]
    fn test_status_includes_live_session_time() {
        let now = start();
        let mut timer = TimerState::fresh(now);
        timer.start(now);

        let later = now + chrono::Duration::seconds(8);
        let rendered = render_status(&timer, &Settings::default(), later);
        assert!(rendered.contains("00:00:08"));
        assert!(rendered.contains("Running"));
        assert!(rendered.contains("blacklist mode, 6 entries"));
    }

    #[test]
    fn test_breakdown_filters_small_shares() {
        let mut ledger = DomainLedger::new(NaiveDate::from_ymd_opt(2018, 7, 4).unwrap());
        ledger.attribute("docs.rs", 95_000);
        ledger.attribute("reddit.com", 5_000);

        let rendered = render_breakdown(&ledger, Some("10%".parse::<Percentage>().unwrap()));
        assert!(rendered.contains("docs.rs"));
        assert!(!rendered.contains("reddit.com"));
    }

    #[test]
    fn test_breakdown_handles_empty_ledger() {
        let ledger = DomainLedger::new(NaiveDate::from_ymd_opt(2018, 7, 4).unwrap());
        assert!(render_breakdown(&ledger, None).contains("No time recorded"));
    }

    #[test]
    fn test_sites_marks_the_enforced_list() {
        let rendered = render_sites(&Settings::default());
        assert!(rendered.contains("Watchlist (enforced):"));
        assert!(rendered.contains("youtube.com"));
        assert!(rendered.contains("Whitelist:"));
    }
}
