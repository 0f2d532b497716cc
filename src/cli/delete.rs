//! Delete command implementation.

use clap::Args;
use hostdb::auth::Principal;
use hostdb::command;
use hostdb::config::HostdbConfig;
use hostdb::delete::{self, DeleteContext, DeleteError};
use hostdb::error::Error;
use hostdb::virt::BackendRegistry;
use hostdb_protocol::Response;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Delete an item from the local database.
#[derive(Args, Debug)]
pub struct DeleteCmd {
    /// Item to delete (machine, serialconsole, remotepower).
    pub item: String,

    /// Fqdn of the machine.
    pub fqdn: String,

    /// Force deletion without confirmation.
    #[arg(short, long)]
    pub force: bool,
}

impl DeleteCmd {
    /// Execute the delete command.
    pub fn run(&self, config: &HostdbConfig) -> hostdb::Result<()> {
        let item = command::dispatch(Some(&self.item)).map_err(|e| Error::Rejected(e.to_string()))?;

        // Confirm deletion unless --force
        if !self.force {
            eprint!("Delete {} of '{}'? [y/N] ", item, self.fqdn);
            let mut input = String::new();
            if std::io::stdin().read_line(&mut input).is_ok() {
                let input = input.trim().to_lowercase();
                if input != "y" && input != "yes" {
                    println!("Cancelled");
                    return Ok(());
                }
            } else {
                println!("Cancelled");
                return Ok(());
            }
        }

        let repository = super::open_repository(config)?;
        let backends = BackendRegistry::from_config(&config.backends)?;
        let ctx = DeleteContext::new(Arc::new(repository), backends);

        let mut form = Map::new();
        form.insert("fqdn".into(), Value::String(self.fqdn.clone()));

        let response = delete::execute_form(delete::handler(item), &ctx, &Principal::operator(), &form)
            .map_err(|e| match e {
                DeleteError::Internal(inner) => inner,
                rejected => Error::Rejected(rejected.to_string()),
            })?;

        print_table(&response);
        Ok(())
    }
}

fn print_table(response: &Response) {
    let Response::Table { header, data } = response else {
        return;
    };

    let titles: Vec<&str> = header.iter().map(|c| c.title.as_str()).collect();
    println!("{}", titles.join("\t"));
    for row in data {
        let cells: Vec<String> = header
            .iter()
            .map(|column| match row.get(&column.key) {
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
                None => String::new(),
            })
            .collect();
        println!("{}", cells.join("\t"));
    }
}
