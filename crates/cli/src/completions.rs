use clap::CommandFactory;
use clap_complete::{generate, Shell};

use crate::Cli;

const BIN_NAME: &str = "storefront";

pub fn generate_completions(shell: Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, BIN_NAME, &mut std::io::stdout());
}

pub fn print_install_hint() {
    print!("{}", install_hint(Shell::from_env()));
}

/// Setup instructions for the user's shell, as taken from `$SHELL`
fn install_hint(shell: Option<Shell>) -> String {
    let rc_line = match shell {
        Some(Shell::Zsh) => format!("source <({BIN_NAME} completions zsh)"),
        Some(Shell::Bash) => format!("source <({BIN_NAME} completions bash)"),
        Some(Shell::Fish) => format!("{BIN_NAME} completions fish | source"),
        Some(Shell::Elvish) => format!("eval ({BIN_NAME} completions elvish | slurp)"),
        Some(Shell::PowerShell) => {
            format!("{BIN_NAME} completions powershell | Out-String | Invoke-Expression")
        }
        _ => {
            return format!(
                "Could not detect shell. Generate completions manually:\n  {BIN_NAME} completions <shell>\n\nAvailable shells: bash, zsh, fish, powershell, elvish\n"
            )
        }
    };
    let name = shell.map(|s| s.to_string()).unwrap_or_default();
    format!("For {name} completions, add this to your shell rc:\n\n  {rc_line}\n")
}
