//! Command-line arguments.

use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "kiosk-voice", version, about = "Continuous voice dialogue for the civic-services kiosk")]
pub struct Cli {
    /// Session language as a BCP-47 tag (e.g. en-IN, hi-IN)
    #[arg(long, env = "KIOSK_LANGUAGE")]
    pub language: Option<String>,

    /// Send the current screen with every remote request
    #[arg(long)]
    pub accessibility: bool,

    /// JSON file with voice settings
    #[arg(long, env = "KIOSK_SETTINGS")]
    pub settings: Option<PathBuf>,

    /// JSON file with local knowledge entries (defaults to the built-in catalogue)
    #[arg(long, env = "KIOSK_KNOWLEDGE")]
    pub knowledge: Option<PathBuf>,

    /// Remote dialogue service endpoint; offline replies only when unset
    #[arg(long, env = "KIOSK_DIALOGUE_ENDPOINT")]
    pub endpoint: Option<String>,

    /// API keys for the dialogue service, tried in rotation
    #[arg(long = "key", env = "KIOSK_DIALOGUE_KEYS", value_delimiter = ',', hide_env_values = true)]
    pub keys: Vec<String>,

    /// Model tiers, tried in order
    #[arg(
        long = "tier",
        env = "KIOSK_DIALOGUE_TIERS",
        value_delimiter = ',',
        default_value = "standard,lite"
    )]
    pub tiers: Vec<String>,

    /// Screen shown when the session starts
    #[arg(long, default_value = "home")]
    pub screen: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["kiosk-voice"]).unwrap();
        assert_eq!(cli.tiers, ["standard", "lite"]);
        assert_eq!(cli.screen, "home");
        assert!(!cli.accessibility);
    }

    #[test]
    fn test_comma_delimited_keys_and_tiers() {
        let cli = Cli::try_parse_from([
            "kiosk-voice",
            "--key",
            "k1,k2,k3",
            "--tier",
            "pro",
            "--language",
            "hi-IN",
            "--accessibility",
        ])
        .unwrap();
        assert_eq!(cli.keys, ["k1", "k2", "k3"]);
        assert_eq!(cli.tiers, ["pro"]);
        assert_eq!(cli.language.as_deref(), Some("hi-IN"));
        assert!(cli.accessibility);
    }
}
