//! Digest message texts

use crate::actions::ActionRef;
use crate::channels::{MessageAction, OutboundMessage};
use crate::jobs::JobPosting;
use chrono::{DateTime, Utc};
use std::collections::HashSet;

pub const SEARCHING: &str = "🔍 Suche gerade nach passenden Stellen für dich...";
pub const NO_RESULTS: &str = "😕 Heute keine passenden Stellen gefunden. Morgen wieder!";

const GENERATE_LABEL: &str = "✍️ Anschreiben erstellen";
const OPEN_LABEL: &str = "🔗 Zur Stelle";

/// Drop repeated postings, keeping the first occurrence, then keep at most
/// `max` in source order
pub fn select_postings(postings: Vec<JobPosting>, max: usize) -> Vec<JobPosting> {
    let mut seen = HashSet::new();
    postings
        .into_iter()
        .filter(|p| seen.insert(p.id()))
        .take(max)
        .collect()
}

pub fn header(count: usize, date: DateTime<Utc>) -> String {
    format!(
        "🌅 Dein tägliches Job-Update ({})\nIch habe {} passende Stellen für dich gefunden:\n{}",
        date.format("%d.%m.%Y"),
        count,
        "─".repeat(30)
    )
}

/// One posting notice with its two buttons
pub fn posting_notice(
    channel: &str,
    user_id: &str,
    position: usize,
    posting: &JobPosting,
) -> OutboundMessage {
    let date = if posting.posted_date.is_empty() {
        "k.A."
    } else {
        posting.posted_date.as_str()
    };
    let text = format!(
        "{} {}. {}\n🏢 {}\n📍 {}\n📅 {}",
        posting.site_icon(),
        position,
        posting.title,
        posting.company,
        posting.location,
        date
    );

    let mut row = vec![MessageAction::callback(
        GENERATE_LABEL,
        ActionRef::cover_letter(user_id, posting.id()).encode(),
    )];
    if !posting.url.is_empty() {
        row.push(MessageAction::url(OPEN_LABEL, posting.url.clone()));
    }

    OutboundMessage::new(channel, user_id, &text).action_row(row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::ActionTarget;
    use crate::testing::posting;
    use chrono::TimeZone;

    #[test]
    fn test_select_dedups_then_truncates() {
        let mut postings: Vec<JobPosting> = (0..12).map(posting).collect();
        postings.insert(1, posting(0));
        postings.insert(3, posting(2));

        let selected = select_postings(postings, 10);
        let titles: Vec<String> = selected.iter().map(|p| p.title.clone()).collect();
        let expected: Vec<String> = (0..10).map(|n| posting(n).title).collect();
        assert_eq!(titles, expected);
    }

    #[test]
    fn test_header_carries_date_and_count() {
        let date = Utc.with_ymd_and_hms(2026, 3, 9, 6, 0, 0).unwrap();
        let text = header(10, date);
        assert!(text.starts_with("🌅 Dein tägliches Job-Update (09.03.2026)"));
        assert!(text.contains("10 passende Stellen"));
    }

    #[test]
    fn test_posting_notice_buttons() {
        let p = posting(3);
        let msg = posting_notice("telegram", "42", 4, &p);
        assert!(msg.content.starts_with("💼 4. Data Analyst 3"));
        assert!(msg.content.contains("🏢 Firma 3"));
        assert_eq!(msg.chat_id, "42");

        let row = &msg.actions[0];
        assert_eq!(row.len(), 2);
        assert_eq!(
            row[0].target,
            ActionTarget::Callback(format!("cl:42:{}", p.id()))
        );
        assert_eq!(row[1].target, ActionTarget::Url(p.url.clone()));
    }

    #[test]
    fn test_missing_date_placeholder() {
        let mut p = posting(1);
        p.posted_date.clear();
        p.source_site = "stepstone".to_string();
        let msg = posting_notice("telegram", "42", 1, &p);
        assert!(msg.content.starts_with("📌 1."));
        assert!(msg.content.ends_with("📅 k.A."));
    }
}
