//! List available commands.

use clap::Args;
use hostdb::command::CommandRegistry;

/// Print the command registry with help text.
#[derive(Args, Debug)]
pub struct CommandsCmd {
    /// Print the full help text of each command.
    #[arg(short, long)]
    pub verbose: bool,
}

impl CommandsCmd {
    pub fn run(&self) -> hostdb::Result<()> {
        let registry = CommandRegistry::new();
        for command in registry.commands() {
            println!("{:<12} {}", command.name, command.help_short);
            if self.verbose {
                println!();
                for line in command.help.lines() {
                    println!("    {}", line);
                }
                let items: Vec<_> = registry.list_command_names().into_iter().collect();
                println!("    Completions: {}", items.join(", "));
                println!();
            }
        }
        Ok(())
    }
}
