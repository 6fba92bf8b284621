//! Flow tables for `/setup` and `/jobsetup`

use super::engine::{
    text_answer, Answer, Answers, ConversationInput, Flow, FlowDefaults, FlowKind, StateSpec,
    Transition, Validation,
};
use crate::error::{Error, Result};
use crate::profile::{JobPreference, UserProfile};

/// Flow table for a kind
pub fn flow(kind: FlowKind) -> &'static Flow {
    match kind {
        FlowKind::Documents => &DOCUMENTS,
        FlowKind::Preferences => &PREFERENCES,
    }
}

// Document upload

static DOCUMENTS: Flow = Flow {
    kind: FlowKind::Documents,
    states: &[
        StateSpec {
            id: "choice",
            prompt: |_| {
                "⚙️ Dokumente hinterlegen\n\n\
                 • 1 – Lebenslauf\n\
                 • 2 – Muster-Anschreiben\n\
                 • 3 – Beides"
                    .to_string()
            },
            parse: parse_choice,
            next: Transition::Branch(after_choice),
        },
        StateSpec {
            id: "reference_document",
            prompt: |_| "📄 Lebenslauf als .txt oder .pdf schicken.".to_string(),
            parse: parse_document,
            next: Transition::Branch(after_reference),
        },
        StateSpec {
            id: "style_sample",
            prompt: |_| "📝 Muster-Anschreiben als .txt oder .pdf schicken.".to_string(),
            parse: parse_document,
            next: Transition::Done,
        },
    ],
    commit: commit_documents,
    summary: documents_summary,
    cancelled: "Abgebrochen.",
};

fn parse_choice(input: &ConversationInput, _: &FlowDefaults) -> Validation {
    match input {
        ConversationInput::Text(text) if matches!(text.trim(), "1" | "2" | "3") => {
            Ok(Answer::text(text.trim()))
        }
        _ => Err("Bitte 1, 2 oder 3 eingeben.".to_string()),
    }
}

fn after_choice(answers: &Answers) -> Option<&'static str> {
    match text_answer(answers, "choice") {
        Some("2") => Some("style_sample"),
        _ => Some("reference_document"),
    }
}

fn after_reference(answers: &Answers) -> Option<&'static str> {
    match text_answer(answers, "choice") {
        Some("3") => Some("style_sample"),
        _ => None,
    }
}

fn parse_document(input: &ConversationInput, _: &FlowDefaults) -> Validation {
    match input {
        ConversationInput::Document { text, .. } if !text.trim().is_empty() => {
            Ok(Answer::text(text.trim()))
        }
        ConversationInput::Document { .. } => {
            Err("Die Datei enthält keinen lesbaren Text.".to_string())
        }
        _ => Err("Bitte eine Datei schicken.".to_string()),
    }
}

fn commit_documents(answers: &Answers, profile: &mut UserProfile) -> Result<()> {
    let reference = text_answer(answers, "reference_document");
    let style = text_answer(answers, "style_sample");
    if reference.is_none() && style.is_none() {
        return Err(Error::Session("document flow finished without a document".to_string()));
    }
    if let Some(text) = reference {
        profile.reference_document = Some(text.to_string());
    }
    if let Some(text) = style {
        profile.style_sample = Some(text.to_string());
    }
    Ok(())
}

fn documents_summary(answers: &Answers) -> String {
    let reference = answers.contains_key("reference_document");
    let style = answers.contains_key("style_sample");
    match (reference, style) {
        (true, true) => {
            "✅ Lebenslauf und Muster-Anschreiben gespeichert! Nutze /suchenow für eine sofortige Jobsuche."
                .to_string()
        }
        (false, true) => {
            "✅ Muster-Anschreiben gespeichert! Nutze /suchenow für eine sofortige Jobsuche."
                .to_string()
        }
        _ => "✅ Lebenslauf gespeichert!".to_string(),
    }
}

// Job search preferences

static PREFERENCES: Flow = Flow {
    kind: FlowKind::Preferences,
    states: &[
        StateSpec {
            id: "role_title",
            prompt: |_| {
                "🔍 Job-Präferenzen einrichten\n\n\
                 Wie lautet deine gewünschte Berufsbezeichnung?\n\
                 (z.B. „Software Engineer“, „Marketing Manager“, „Data Analyst“)"
                    .to_string()
            },
            parse: |input, _| required_text(input, "Bitte eine Berufsbezeichnung eingeben."),
            next: Transition::To("location"),
        },
        StateSpec {
            id: "location",
            prompt: |_| {
                "📍 In welcher Stadt / Region suchst du?\n\
                 (z.B. „Berlin“, „München“, „Remote“, „Deutschland“)"
                    .to_string()
            },
            parse: |input, _| required_text(input, "Bitte einen Ort eingeben."),
            next: Transition::To("keywords"),
        },
        StateSpec {
            id: "keywords",
            prompt: |_| {
                "🏷️ Welche weiteren Stichwörter soll die Suche berücksichtigen?\n\
                 (z.B. „Python React“, „agil Scrum“, „Teilzeit“ – oder skip für keine)"
                    .to_string()
            },
            parse: parse_keywords,
            next: Transition::To("remote"),
        },
        StateSpec {
            id: "remote",
            prompt: |_| "🏠 Nur Remote-Stellen anzeigen?\nAntworte mit ja oder nein.".to_string(),
            parse: parse_yes_no,
            next: Transition::To("alert_time"),
        },
        StateSpec {
            id: "alert_time",
            prompt: |defaults| {
                format!(
                    "⏰ Um wie viel Uhr (UTC) soll der tägliche Job-Alert kommen?\n\
                     (Standard: {:02}:{:02} UTC – einfach ok eingeben)\n\
                     Oder eigene Uhrzeit: z.B. 07:30",
                    defaults.alert_hour, defaults.alert_minute
                )
            },
            parse: parse_time,
            next: Transition::Done,
        },
    ],
    commit: commit_preferences,
    summary: preferences_summary,
    cancelled: "Job-Setup abgebrochen.",
};

fn required_text(input: &ConversationInput, error: &str) -> Validation {
    match input {
        ConversationInput::Text(text) if !text.trim().is_empty() => Ok(Answer::text(text.trim())),
        _ => Err(error.to_string()),
    }
}

fn parse_keywords(input: &ConversationInput, _: &FlowDefaults) -> Validation {
    match input {
        ConversationInput::Text(text) if text.trim().eq_ignore_ascii_case("skip") => {
            Ok(Answer::text(""))
        }
        ConversationInput::Text(text) => Ok(Answer::text(text.trim())),
        _ => Err("Bitte Stichwörter als Text eingeben oder skip.".to_string()),
    }
}

fn parse_yes_no(input: &ConversationInput, _: &FlowDefaults) -> Validation {
    let ConversationInput::Text(text) = input else {
        return Err("Bitte mit ja oder nein antworten.".to_string());
    };
    match text.trim().to_lowercase().as_str() {
        "ja" | "yes" | "j" | "y" => Ok(Answer::Flag { value: true }),
        "nein" | "no" | "n" => Ok(Answer::Flag { value: false }),
        _ => Err("Bitte mit ja oder nein antworten.".to_string()),
    }
}

fn parse_time(input: &ConversationInput, defaults: &FlowDefaults) -> Validation {
    const INVALID: &str = "Ungültiges Format. Nutze HH:MM oder ok.";

    let ConversationInput::Text(text) = input else {
        return Err(INVALID.to_string());
    };
    let raw = text.trim().to_lowercase();
    if raw == "ok" {
        return Ok(Answer::Time {
            hour: defaults.alert_hour,
            minute: defaults.alert_minute,
        });
    }

    let (hour, minute) = raw.split_once(':').ok_or_else(|| INVALID.to_string())?;
    let valid_digits = |s: &str, max_len: usize| {
        !s.is_empty() && s.len() <= max_len && s.chars().all(|c| c.is_ascii_digit())
    };
    if !valid_digits(hour, 2) || !valid_digits(minute, 2) {
        return Err(INVALID.to_string());
    }

    let hour: u8 = hour.parse().map_err(|_| INVALID.to_string())?;
    let minute: u8 = minute.parse().map_err(|_| INVALID.to_string())?;
    if hour > 23 || minute > 59 {
        return Err(INVALID.to_string());
    }
    Ok(Answer::Time { hour, minute })
}

fn commit_preferences(answers: &Answers, profile: &mut UserProfile) -> Result<()> {
    let missing = |state: &str| Error::Session(format!("preference flow is missing '{}'", state));

    let role_title = text_answer(answers, "role_title").ok_or_else(|| missing("role_title"))?;
    let location = text_answer(answers, "location").ok_or_else(|| missing("location"))?;
    let keywords = text_answer(answers, "keywords").unwrap_or("");
    let remote_only = match answers.get("remote") {
        Some(Answer::Flag { value }) => *value,
        _ => return Err(missing("remote")),
    };
    let (alert_hour, alert_minute) = match answers.get("alert_time") {
        Some(Answer::Time { hour, minute }) => (*hour, *minute),
        _ => return Err(missing("alert_time")),
    };

    profile.search_preference = Some(JobPreference {
        role_title: role_title.to_string(),
        location: location.to_string(),
        keywords: keywords.to_string(),
        remote_only,
        alert_hour,
        alert_minute,
    });
    Ok(())
}

fn preferences_summary(answers: &Answers) -> String {
    let mut profile = UserProfile::default();
    let Ok(()) = commit_preferences(answers, &mut profile) else {
        return "✅ Job-Präferenzen gespeichert!".to_string();
    };
    let Some(pref) = profile.search_preference else {
        return "✅ Job-Präferenzen gespeichert!".to_string();
    };

    format!(
        "✅ Job-Präferenzen gespeichert!\n\n\
         🔎 Suche: {} in {}\n\
         🏷️ Keywords: {}\n\
         🏠 Remote: {}\n\
         ⏰ Alert: täglich {:02}:{:02} UTC\n\n\
         Nutze /alert um den täglichen Alert zu aktivieren.\n\
         Oder /suchenow für eine sofortige Suche!",
        pref.role_title,
        pref.location,
        if pref.keywords.is_empty() { "–" } else { pref.keywords.as_str() },
        if pref.remote_only { "Ja" } else { "Nein" },
        pref.alert_hour,
        pref.alert_minute,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> ConversationInput {
        ConversationInput::Text(s.to_string())
    }

    #[test]
    fn test_flow_tables_are_closed() {
        for kind in [FlowKind::Documents, FlowKind::Preferences] {
            let flow = flow(kind);
            assert_eq!(flow.kind, kind);
            for state in flow.states {
                if let Transition::To(next) = state.next {
                    assert!(flow.state(next).is_some(), "{} -> {}", state.id, next);
                }
            }
        }
    }

    #[test]
    fn test_parse_yes_no() {
        let d = FlowDefaults::default();
        for yes in ["ja", "Yes", "J", "y"] {
            assert_eq!(parse_yes_no(&text(yes), &d), Ok(Answer::Flag { value: true }));
        }
        for no in ["nein", "NO", "n"] {
            assert_eq!(parse_yes_no(&text(no), &d), Ok(Answer::Flag { value: false }));
        }
        assert!(parse_yes_no(&text("jein"), &d).is_err());
    }

    #[test]
    fn test_parse_time() {
        let d = FlowDefaults {
            alert_hour: 8,
            alert_minute: 45,
        };
        assert_eq!(parse_time(&text("OK"), &d), Ok(Answer::Time { hour: 8, minute: 45 }));
        assert_eq!(parse_time(&text("7:05"), &d), Ok(Answer::Time { hour: 7, minute: 5 }));
        assert_eq!(parse_time(&text("23:59"), &d), Ok(Answer::Time { hour: 23, minute: 59 }));
        assert_eq!(parse_time(&text("12:5"), &d), Ok(Answer::Time { hour: 12, minute: 5 }));
        for bad in ["24:00", "12:60", "12:", "12:123", "12", ":30", "ab:cd", "-1:30", "123:00"] {
            assert!(parse_time(&text(bad), &d).is_err(), "accepted {}", bad);
        }
    }

    #[test]
    fn test_branching() {
        let mut answers = Answers::new();
        answers.insert("choice".to_string(), Answer::text("1"));
        assert_eq!(after_choice(&answers), Some("reference_document"));
        assert_eq!(after_reference(&answers), None);

        answers.insert("choice".to_string(), Answer::text("3"));
        assert_eq!(after_reference(&answers), Some("style_sample"));

        answers.insert("choice".to_string(), Answer::text("2"));
        assert_eq!(after_choice(&answers), Some("style_sample"));
    }

    #[test]
    fn test_keywords_skip() {
        let d = FlowDefaults::default();
        assert_eq!(parse_keywords(&text("SKIP"), &d), Ok(Answer::text("")));
        assert_eq!(parse_keywords(&text(" Rust "), &d), Ok(Answer::text("Rust")));
    }

    #[test]
    fn test_summary_lists_preference() {
        let mut answers = Answers::new();
        answers.insert("role_title".to_string(), Answer::text("Dev"));
        answers.insert("location".to_string(), Answer::text("Köln"));
        answers.insert("keywords".to_string(), Answer::text(""));
        answers.insert("remote".to_string(), Answer::Flag { value: true });
        answers.insert("alert_time".to_string(), Answer::Time { hour: 7, minute: 30 });

        let summary = preferences_summary(&answers);
        assert!(summary.contains("Dev in Köln"));
        assert!(summary.contains("Keywords: –"));
        assert!(summary.contains("Remote: Ja"));
        assert!(summary.contains("07:30"));
    }
}
