//! Interactive shell with idle auto-lock

use anyhow::Result;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

use memoir_core::{SessionState, Vault};

use crate::commands;

const HELP: &str = "\
Commands:
  list [all]    list credentials (first page, or every page)
  show [all]    same as list with passwords revealed
  lock          drop the key from memory
  unlock        unlock again with the master key file
  status        print the lock state
  help          this message
  quit          leave the shell";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ShellCommand {
    List { all: bool, reveal: bool },
    Lock,
    Unlock,
    Status,
    Help,
    Quit,
}

fn parse(line: &str) -> Option<ShellCommand> {
    let mut words = line.split_whitespace();
    let command = match words.next()? {
        "list" | "ls" => ShellCommand::List {
            all: words.next() == Some("all"),
            reveal: false,
        },
        "show" => ShellCommand::List {
            all: words.next() == Some("all"),
            reveal: true,
        },
        "lock" => ShellCommand::Lock,
        "unlock" => ShellCommand::Unlock,
        "status" => ShellCommand::Status,
        "help" | "?" => ShellCommand::Help,
        "quit" | "exit" => ShellCommand::Quit,
        _ => return None,
    };
    Some(command)
}

/// Read commands from stdin until EOF or `quit`
///
/// The idle watchdog runs alongside and locks the vault once the auto-lock
/// timeout passes without a command.
pub async fn run(vault: &Vault, key_file: Option<&Path>, show_passwords: bool) -> Result<()> {
    let watchdog = tokio::spawn(vault.session().run_idle_watchdog());
    info!("Shell started");

    let result = read_loop(vault, key_file, show_passwords).await;

    watchdog.abort();
    vault.lock().await;
    result
}

async fn read_loop(vault: &Vault, key_file: Option<&Path>, show_passwords: bool) -> Result<()> {
    let mut reader = BufReader::new(tokio::io::stdin());
    let mut stdout = tokio::io::stdout();
    let mut line = String::new();

    println!("{}", HELP);

    loop {
        stdout.write_all(b"memoir> ").await?;
        stdout.flush().await?;

        line.clear();
        if reader.read_line(&mut line).await? == 0 {
            debug!("EOF on stdin");
            break;
        }

        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        let Some(command) = parse(input) else {
            println!("Unknown command: {} (type `help`)", input);
            continue;
        };

        if vault.state().await == SessionState::Unlocked {
            vault.session().touch().await;
        }

        let outcome = match command {
            ShellCommand::Quit => break,
            ShellCommand::Help => {
                println!("{}", HELP);
                Ok(())
            }
            ShellCommand::Status => {
                println!("{:?}", vault.state().await);
                Ok(())
            }
            ShellCommand::Lock => {
                vault.lock().await;
                println!("Locked.");
                Ok(())
            }
            ShellCommand::Unlock => commands::unlock(vault, key_file).await,
            ShellCommand::List { all, reveal } => {
                if vault.state().await != SessionState::Unlocked {
                    println!("Vault is locked. Type `unlock`.");
                    continue;
                }
                commands::list(vault, 0, all, reveal || show_passwords).await
            }
        };

        if let Err(e) = outcome {
            warn!("Command failed: {:#}", e);
            println!("Error: {:#}", e);
        }
    }

    Ok(())
}
