use clap::Parser;
use std::path::PathBuf;

use crate::domain::Workflow;

#[derive(Parser, Debug)]
#[command(name = "tapfleet")]
#[command(version)]
#[command(about = "Concurrent multi-account runner for the Eclipse tap service", long_about = None)]
pub struct Cli {
    /// Workflow to run (Click, Points, Deposit, MintDomain); shows the menu when omitted
    #[arg(short, long, env = "TAPFLEET_WORKFLOW")]
    pub workflow: Option<Workflow>,

    /// Directory holding default.toml
    #[arg(long, default_value = "config")]
    pub config_dir: PathBuf,

    /// Directory holding key files, proxies, credential map and statistics
    #[arg(long, default_value = "data")]
    pub data_dir: PathBuf,

    /// Simulate on-chain workflows instead of submitting them
    #[arg(long)]
    pub dry_run: bool,

    /// Emit JSON formatted logs
    #[arg(long)]
    pub json_logs: bool,
}

/// What the operator picked from the menu
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    Run(Workflow),
    Exit,
}

/// Interpret one menu line; `None` means the input was not understood
pub fn parse_menu_choice(line: &str) -> Option<MenuChoice> {
    let line = line.trim();
    match line.to_ascii_lowercase().as_str() {
        "0" | "0. exit" | "exit" | "quit" | "q" => Some(MenuChoice::Exit),
        _ => line.parse::<Workflow>().ok().map(MenuChoice::Run),
    }
}

/// Show the workflow menu until a valid choice is entered
pub fn prompt_workflow() -> anyhow::Result<MenuChoice> {
    use rustyline::error::ReadlineError;
    use rustyline::DefaultEditor;

    let mut rl = DefaultEditor::new()?;

    loop {
        println!("\x1b[36mSelect a workflow:\x1b[0m");
        for label in Workflow::menu_labels() {
            println!("  {}", label);
        }
        println!("  0. Exit");

        match rl.readline("\x1b[36m>\x1b[0m ") {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(line.as_str());
                match parse_menu_choice(&line) {
                    Some(choice) => return Ok(choice),
                    None => eprintln!("Unknown choice: {}", line.trim()),
                }
            }
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => return Ok(MenuChoice::Exit),
            Err(e) => return Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_menu_choice() {
        assert_eq!(parse_menu_choice("0"), Some(MenuChoice::Exit));
        assert_eq!(parse_menu_choice(" exit "), Some(MenuChoice::Exit));
        assert_eq!(
            parse_menu_choice("1. Click"),
            Some(MenuChoice::Run(Workflow::Click))
        );
        assert_eq!(parse_menu_choice("2"), Some(MenuChoice::Run(Workflow::Points)));
        assert_eq!(parse_menu_choice("9"), None);
        assert_eq!(parse_menu_choice("dance"), None);
    }

    #[test]
    fn test_cli_parses_workflow_flag() {
        let cli = Cli::try_parse_from(["tapfleet", "--workflow", "mint-domain", "--dry-run"]).unwrap();
        assert_eq!(cli.workflow, Some(Workflow::MintDomain));
        assert!(cli.dry_run);
        assert_eq!(cli.data_dir, PathBuf::from("data"));
    }

    #[test]
    fn test_cli_rejects_unknown_workflow() {
        assert!(Cli::try_parse_from(["tapfleet", "-w", "dance"]).is_err());
    }
}
