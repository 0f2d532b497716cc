//! Inventory import command.

use clap::Args;
use hostdb::config::HostdbConfig;
use hostdb::error::Error;
use hostdb::model::{Annotation, Machine, NetworkInterface, RemotePower, SerialConsole};
use hostdb::storage::ResourceRepository;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Load machines and their records from a JSON inventory file.
#[derive(Args, Debug)]
pub struct ImportCmd {
    /// Inventory file.
    pub file: PathBuf,
}

/// Inventory file layout. Records are upserted by key.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Inventory {
    pub machines: Vec<Machine>,
    pub serial_consoles: Vec<SerialConsole>,
    pub remote_powers: Vec<RemotePower>,
    pub network_interfaces: Vec<NetworkInterface>,
    pub annotations: Vec<Annotation>,
}

impl Inventory {
    pub fn from_file(path: &Path) -> hostdb::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Write all records. Machines go first so owned records can reference them.
    pub fn apply(&self, repository: &dyn ResourceRepository) -> hostdb::Result<usize> {
        for machine in &self.machines {
            repository.put_machine(machine)?;
        }
        for console in &self.serial_consoles {
            repository.put_serial_console(console)?;
        }
        for power in &self.remote_powers {
            repository.put_remote_power(power)?;
        }
        for interface in &self.network_interfaces {
            repository.put_network_interface(interface)?;
        }
        for annotation in &self.annotations {
            repository.put_annotation(annotation)?;
        }

        Ok(self.machines.len()
            + self.serial_consoles.len()
            + self.remote_powers.len()
            + self.network_interfaces.len()
            + self.annotations.len())
    }
}

impl ImportCmd {
    pub fn run(&self, config: &HostdbConfig) -> hostdb::Result<()> {
        if !self.file.exists() {
            return Err(Error::Rejected(format!(
                "inventory file not found: {}",
                self.file.display()
            )));
        }

        let inventory = Inventory::from_file(&self.file)?;
        let repository = super::open_repository(config)?;
        let written = inventory.apply(&repository)?;

        tracing::info!(file = %self.file.display(), records = written, "imported inventory");
        println!(
            "Imported {} records ({} machines) from {}",
            written,
            inventory.machines.len(),
            self.file.display()
        );
        Ok(())
    }
}
