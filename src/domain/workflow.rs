use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Named operation selected for a run, also used as the action name passed to executors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Workflow {
    /// Repeating tap loop signed by the secondary keypair
    Click,
    /// Points/status refresh
    Points,
    /// Fund the secondary keypair's clicker account
    Deposit,
    /// Claim a domain and onboard to the leaderboard
    MintDomain,
}

impl Workflow {
    pub const ALL: [Workflow; 4] = [
        Workflow::Click,
        Workflow::Points,
        Workflow::Deposit,
        Workflow::MintDomain,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Workflow::Click => "Click",
            Workflow::Points => "Points",
            Workflow::Deposit => "Deposit",
            Workflow::MintDomain => "MintDomain",
        }
    }

    /// Workflows that may not run without a secondary secret supplied in this run's input
    pub fn requires_secondary_secret(&self) -> bool {
        matches!(
            self,
            Workflow::Click | Workflow::Deposit | Workflow::MintDomain
        )
    }

    /// Repeating workflows loop for the account's active duration; the rest run once
    pub fn is_repeating(&self) -> bool {
        matches!(self, Workflow::Click)
    }

    /// Numbered menu labels, in selection order
    pub fn menu_labels() -> Vec<String> {
        Self::ALL
            .iter()
            .enumerate()
            .map(|(i, w)| format!("{}. {}", i + 1, w))
            .collect()
    }
}

impl fmt::Display for Workflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Workflow {
    type Err = String;

    /// Accepts bare names (`click`), menu labels (`1. Click`) and menu numbers (`1`)
    fn from_str(raw: &str) -> std::result::Result<Self, Self::Err> {
        let trimmed = raw.trim();
        let name = trimmed
            .trim_start_matches(|c: char| c.is_ascii_digit())
            .trim_start_matches('.')
            .trim();

        if name.is_empty() {
            if let Ok(n) = trimmed.parse::<usize>() {
                if (1..=Self::ALL.len()).contains(&n) {
                    return Ok(Self::ALL[n - 1]);
                }
            }
            return Err(format!("invalid workflow selection: '{}'", raw));
        }

        match name.to_ascii_lowercase().as_str() {
            "click" => Ok(Workflow::Click),
            "points" => Ok(Workflow::Points),
            "deposit" => Ok(Workflow::Deposit),
            "mintdomain" | "mint_domain" | "mint-domain" => Ok(Workflow::MintDomain),
            _ => Err(format!(
                "unknown workflow '{}'; expected Click|Points|Deposit|MintDomain",
                raw
            )),
        }
    }
}
