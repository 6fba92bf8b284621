//! Fixed reply texts

use crate::profile::UserProfile;

pub const WELCOME: &str = "👋 Willkommen bei jobpilot!\n\n\
    📋 Befehle:\n\
    • /setup – Lebenslauf & Muster-Anschreiben hinterlegen\n\
    • /jobsetup – Job-Suchpräferenzen festlegen\n\
    • /suchenow – Sofort nach Jobs suchen\n\
    • /alert – Täglichen Job-Alert ein-/ausschalten\n\
    • /status – Übersicht über deine Einstellungen\n\
    • /help – Hilfe\n\n\
    💡 Oder schick direkt einen Link zu einer Stellenausschreibung!";

pub const HELP: &str = "📖 Anleitung:\n\n\
    1️⃣ /setup → Lebenslauf & Muster-Anschreiben hochladen\n\
    2️⃣ /jobsetup → Berufsfeld, Ort & Stichwörter festlegen\n\
    3️⃣ /alert → Täglichen Digest aktivieren\n\
    4️⃣ Jeden Morgen bekommst du 10 Jobs – klick auf Anschreiben erstellen!\n\n\
    📌 Oder schick jederzeit einen Stellenlink für ein sofortiges Anschreiben.\n\
    /abbrechen beendet einen laufenden Dialog.";

pub const HINT: &str =
    "Sende einen Link zur Stellenausschreibung oder nutze /suchenow für automatische Jobsuche.";
pub const NEED_PREFERENCES: &str = "❌ Bitte zuerst /jobsetup ausführen!";
pub const NOTHING_TO_CANCEL: &str = "Es läuft gerade kein Dialog.";
pub const UNKNOWN_COMMAND: &str = "Unbekannter Befehl. /help zeigt alle Befehle.";
pub const SEARCHING_NOW: &str = "🔍 Suche nach passenden Stellen... (kann 30–60 Sek. dauern)";
pub const PROCESSING: &str = "⏳ Verarbeite...";
pub const LOADING_LISTING: &str = "🔍 Lade Stellenausschreibung...";
pub const GENERATING: &str = "✍️ Generiere Anschreiben... (20–30 Sek.)";
pub const ALERT_DISABLED: &str = "🔕 Täglicher Job-Alert deaktiviert.";
pub const FAILURE: &str = "❌ Da ist etwas schiefgelaufen. Bitte später erneut versuchen.";

pub fn alert_enabled(hour: u8, minute: u8) -> String {
    format!(
        "🔔 Täglicher Job-Alert aktiviert!\nDu bekommst jeden Tag um {:02}:{:02} UTC deine Job-Vorschläge.",
        hour, minute
    )
}

pub fn writing_for(title: &str, company: &str) -> String {
    format!("✍️ Erstelle Anschreiben für {} bei {}...", title, company)
}

pub fn status(profile: &UserProfile, hour: u8, minute: u8) -> String {
    let check = |present: bool| if present { "✅" } else { "❌" };
    let preference = match &profile.search_preference {
        Some(p) => format!("✅ {} in {}", p.role_title, p.location),
        None => "❌ nicht gesetzt".to_string(),
    };
    let alert = if profile.alert_enabled {
        "✅ aktiv"
    } else {
        "❌ inaktiv"
    };

    format!(
        "📊 Dein Status:\n\n\
         {} Lebenslauf\n\
         {} Muster-Anschreiben\n\
         🔍 Job-Präferenzen: {}\n\
         🔔 Täglicher Alert: {}\n\n\
         ⏰ Alert-Uhrzeit: täglich {:02}:{:02} UTC",
        check(profile.reference_document.is_some()),
        check(profile.style_sample.is_some()),
        preference,
        alert,
        hour,
        minute
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::complete_profile;

    #[test]
    fn test_status_of_empty_profile() {
        let text = status(&UserProfile::default(), 6, 0);
        assert!(text.contains("❌ Lebenslauf"));
        assert!(text.contains("❌ Muster-Anschreiben"));
        assert!(text.contains("Job-Präferenzen: ❌ nicht gesetzt"));
        assert!(text.contains("Alert: ❌ inaktiv"));
        assert!(text.ends_with("täglich 06:00 UTC"));
    }

    #[test]
    fn test_status_of_complete_profile() {
        let text = status(&complete_profile(), 7, 30);
        assert!(text.contains("✅ Lebenslauf"));
        assert!(text.contains("✅ Data Analyst in Berlin"));
        assert!(text.contains("Alert: ✅ aktiv"));
        assert!(text.ends_with("07:30 UTC"));
    }
}
