//! Slash command parsing

/// Bot commands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    Status,
    Alert,
    SearchNow,
    Setup,
    JobSetup,
    Cancel,
    Unknown(String),
}

impl Command {
    /// Parse the leading `/command` of a message. `@botname` suffixes and
    /// case are ignored; anything after the command word is dropped.
    pub fn parse(text: &str) -> Option<Self> {
        let word = text.trim().split_whitespace().next()?;
        let name = word.strip_prefix('/')?;
        let name = name.split('@').next().unwrap_or("").to_lowercase();
        if name.is_empty() {
            return None;
        }

        Some(match name.as_str() {
            "start" => Command::Start,
            "help" | "hilfe" => Command::Help,
            "status" => Command::Status,
            "alert" => Command::Alert,
            "suchenow" => Command::SearchNow,
            "setup" => Command::Setup,
            "jobsetup" => Command::JobSetup,
            "abbrechen" | "cancel" => Command::Cancel,
            _ => Command::Unknown(name),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse("/start"), Some(Command::Start));
        assert_eq!(Command::parse("  /SucheNow  "), Some(Command::SearchNow));
        assert_eq!(Command::parse("/jobsetup@JobPilotBot"), Some(Command::JobSetup));
        assert_eq!(Command::parse("/abbrechen bitte"), Some(Command::Cancel));
        assert_eq!(Command::parse("/cancel"), Some(Command::Cancel));
        assert_eq!(
            Command::parse("/foo"),
            Some(Command::Unknown("foo".to_string()))
        );
    }

    #[test]
    fn test_plain_text_is_not_a_command() {
        assert_eq!(Command::parse("Data Analyst"), None);
        assert_eq!(Command::parse("https://jobs.example.com/1"), None);
        assert_eq!(Command::parse("/"), None);
        assert_eq!(Command::parse(""), None);
    }
}
