//! Persistent inventory storage.
//!
//! This module defines the [`ResourceRepository`] contract used by the
//! command handlers and [`RedbRepository`], its redb-backed implementation.
//!
//! # Cascade semantics
//!
//! Deleting a machine removes, in one write transaction:
//!
//! - the machine record itself
//! - its serial console and remote power
//! - its network interfaces and annotations
//! - serial consoles that use it as console server or management BMC
//! - remote power entries that use it as power device
//!
//! Virtual machines hosted on a deleted hypervisor keep their record; their
//! hypervisor reference is cleared and they are not counted.
//!
//! Existence is checked inside the write transaction, so of two concurrent
//! deletes of the same machine exactly one succeeds and the other observes
//! [`Error::MachineNotFound`].

use crate::error::{Error, Result};
use crate::model::{
    fqdn_key, Annotation, Machine, NetworkInterface, RecordKind, RemotePower, SerialConsole,
};
use redb::{Database, ReadableTable, Table, TableDefinition, WriteTransaction};
use serde::{de::DeserializeOwned, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Tables of JSON-encoded records keyed by lowercase fqdn.
type RecordTableDef = TableDefinition<'static, &'static str, &'static [u8]>;
type RecordTable<'txn> = Table<'txn, &'static str, &'static [u8]>;

const MACHINES: RecordTableDef = TableDefinition::new("machines");
const SERIAL_CONSOLES: RecordTableDef = TableDefinition::new("serial_consoles");
const REMOTE_POWERS: RecordTableDef = TableDefinition::new("remote_powers");
const NETWORK_INTERFACES: RecordTableDef = TableDefinition::new("network_interfaces");
const ANNOTATIONS: RecordTableDef = TableDefinition::new("annotations");
const META: TableDefinition<&str, u64> = TableDefinition::new("meta");

/// Key of the annotation id sequence in the meta table.
const ANNOTATION_SEQ: &str = "annotation_seq";

/// Per-kind counts of records removed by one delete.
///
/// Kind names carry the storage namespace (`data.Machine`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeletionResult {
    removed: BTreeMap<String, u64>,
}

impl DeletionResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `count` removed records of `kind`. Zero counts are not recorded.
    pub fn add(&mut self, kind: RecordKind, count: u64) {
        if count > 0 {
            *self.removed.entry(kind.qualified_name()).or_default() += count;
        }
    }

    /// Count for a qualified kind name.
    pub fn count(&self, qualified_name: &str) -> u64 {
        self.removed.get(qualified_name).copied().unwrap_or(0)
    }

    /// Total number of removed records.
    pub fn total(&self) -> u64 {
        self.removed.values().sum()
    }

    /// Iterate `(qualified kind name, count)` ordered by kind name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.removed.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

/// Key lookup and cascading delete over persisted inventory records.
///
/// Every delete must be atomic: either all affected records are removed and
/// counted, or none are.
pub trait ResourceRepository: Send + Sync {
    /// Look up a machine by case-insensitive fqdn.
    fn get_machine(&self, fqdn: &str) -> Result<Option<Machine>>;

    /// List all machines ordered by lookup key.
    fn list_machines(&self) -> Result<Vec<Machine>>;

    /// Serial console of a machine, if any.
    fn serial_console(&self, fqdn: &str) -> Result<Option<SerialConsole>>;

    /// Remote power of a machine, if any.
    fn remote_power(&self, fqdn: &str) -> Result<Option<RemotePower>>;

    /// Insert or replace a machine.
    fn put_machine(&self, machine: &Machine) -> Result<()>;

    /// Insert or replace the serial console of an existing machine.
    fn put_serial_console(&self, console: &SerialConsole) -> Result<()>;

    /// Insert or replace the remote power of an existing machine.
    fn put_remote_power(&self, power: &RemotePower) -> Result<()>;

    /// Insert or replace a network interface of an existing machine.
    fn put_network_interface(&self, interface: &NetworkInterface) -> Result<()>;

    /// Attach an annotation to an existing machine.
    fn put_annotation(&self, annotation: &Annotation) -> Result<()>;

    /// Delete a machine and everything that depends on it.
    fn delete_machine(&self, fqdn: &str) -> Result<DeletionResult>;

    /// Delete the serial console of a machine.
    fn delete_serial_console(&self, fqdn: &str) -> Result<DeletionResult>;

    /// Delete the remote power of a machine.
    fn delete_remote_power(&self, fqdn: &str) -> Result<DeletionResult>;
}

/// redb-backed repository.
pub struct RedbRepository {
    db: Database,
}

impl RedbRepository {
    /// Open (or create) the database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::storage("create database directory", e.to_string()))?;
        }

        let db = Database::create(path)?;

        // Read transactions fail on tables that were never created.
        let txn = db.begin_write()?;
        {
            txn.open_table(MACHINES)?;
            txn.open_table(SERIAL_CONSOLES)?;
            txn.open_table(REMOTE_POWERS)?;
            txn.open_table(NETWORK_INTERFACES)?;
            txn.open_table(ANNOTATIONS)?;
            txn.open_table(META)?;
        }
        txn.commit()?;

        tracing::debug!(path = %path.display(), "opened inventory database");
        Ok(Self { db })
    }

    fn get<T: DeserializeOwned>(
        &self,
        table: RecordTableDef,
        key: &str,
    ) -> Result<Option<T>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(table)?;
        match table.get(key)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Insert a record owned by `machine`, failing if the machine or any of
    /// the `references` is unknown.
    fn put_owned<T: Serialize>(
        &self,
        table: RecordTableDef,
        machine: &str,
        references: &[&str],
        key: impl FnOnce(&WriteTransaction) -> Result<String>,
        record: &T,
    ) -> Result<()> {
        let txn = self.db.begin_write()?;
        {
            ensure_machine(&txn, machine)?;
            for reference in references {
                ensure_machine(&txn, reference)?;
            }
            let key = key(&txn)?;
            let bytes = serde_json::to_vec(record)?;
            let mut table = txn.open_table(table)?;
            table.insert(key.as_str(), bytes.as_slice())?;
        }
        txn.commit()?;
        Ok(())
    }

    fn delete_owned(
        &self,
        table: RecordTableDef,
        kind: RecordKind,
        fqdn: &str,
    ) -> Result<DeletionResult> {
        let key = fqdn_key(fqdn);
        let txn = self.db.begin_write()?;
        let mut result = DeletionResult::new();
        {
            ensure_machine(&txn, &key)?;
            let mut table = txn.open_table(table)?;
            let removed = table.remove(key.as_str())?.is_some();
            if !removed {
                return Err(Error::RecordNotFound {
                    kind: kind.name().to_string(),
                    fqdn: fqdn.to_string(),
                });
            }
            result.add(kind, 1);
        }
        txn.commit()?;

        tracing::info!(fqdn = %fqdn, kind = kind.name(), "deleted record");
        Ok(result)
    }
}

fn ensure_machine(txn: &WriteTransaction, fqdn: &str) -> Result<()> {
    let key = fqdn_key(fqdn);
    let machines = txn.open_table(MACHINES)?;
    if machines.get(key.as_str())?.is_none() {
        return Err(Error::MachineNotFound(fqdn.to_string()));
    }
    Ok(())
}

/// Collect keys of records matching `pred`.
fn matching_keys<T, F>(table: &RecordTable<'_>, pred: F) -> Result<Vec<String>>
where
    T: DeserializeOwned,
    F: Fn(&str, &T) -> bool,
{
    let mut keys = Vec::new();
    for entry in table.iter()? {
        let (key, value) = entry?;
        let record: T = serde_json::from_slice(value.value())?;
        if pred(key.value(), &record) {
            keys.push(key.value().to_string());
        }
    }
    Ok(keys)
}

fn remove_keys(table: &mut RecordTable<'_>, keys: &[String]) -> Result<u64> {
    let mut removed = 0;
    for key in keys {
        if table.remove(key.as_str())?.is_some() {
            removed += 1;
        }
    }
    Ok(removed)
}

/// Key prefix for records owned by a machine in multi-record tables.
fn owned_prefix(machine_key: &str) -> String {
    format!("{}/", machine_key)
}

impl ResourceRepository for RedbRepository {
    fn get_machine(&self, fqdn: &str) -> Result<Option<Machine>> {
        self.get(MACHINES, &fqdn_key(fqdn))
    }

    fn list_machines(&self) -> Result<Vec<Machine>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(MACHINES)?;
        let mut machines = Vec::new();
        for entry in table.iter()? {
            let (_, value) = entry?;
            machines.push(serde_json::from_slice(value.value())?);
        }
        Ok(machines)
    }

    fn serial_console(&self, fqdn: &str) -> Result<Option<SerialConsole>> {
        self.get(SERIAL_CONSOLES, &fqdn_key(fqdn))
    }

    fn remote_power(&self, fqdn: &str) -> Result<Option<RemotePower>> {
        self.get(REMOTE_POWERS, &fqdn_key(fqdn))
    }

    fn put_machine(&self, machine: &Machine) -> Result<()> {
        let key = machine.key();
        if key.is_empty() {
            return Err(Error::storage("insert machine", "fqdn cannot be empty"));
        }
        let bytes = serde_json::to_vec(machine)?;
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(MACHINES)?;
            table.insert(key.as_str(), bytes.as_slice())?;
        }
        txn.commit()?;
        Ok(())
    }

    fn put_serial_console(&self, console: &SerialConsole) -> Result<()> {
        console.validate().map_err(Error::InvalidRecord)?;
        let key = fqdn_key(&console.machine);
        let references: Vec<&str> = console.references().collect();
        self.put_owned(SERIAL_CONSOLES, &console.machine, &references, |_| Ok(key), console)
    }

    fn put_remote_power(&self, power: &RemotePower) -> Result<()> {
        let key = fqdn_key(&power.machine);
        let references: Vec<&str> = power.device.as_deref().into_iter().collect();
        self.put_owned(REMOTE_POWERS, &power.machine, &references, |_| Ok(key), power)
    }

    fn put_network_interface(&self, interface: &NetworkInterface) -> Result<()> {
        let key = format!(
            "{}{}",
            owned_prefix(&fqdn_key(&interface.machine)),
            interface.mac_address.to_ascii_lowercase()
        );
        self.put_owned(NETWORK_INTERFACES, &interface.machine, &[], |_| Ok(key), interface)
    }

    fn put_annotation(&self, annotation: &Annotation) -> Result<()> {
        let prefix = owned_prefix(&fqdn_key(&annotation.machine));
        self.put_owned(
            ANNOTATIONS,
            &annotation.machine,
            &[],
            |txn| {
                let mut meta = txn.open_table(META)?;
                let next = meta.get(ANNOTATION_SEQ)?.map(|v| v.value()).unwrap_or(0) + 1;
                meta.insert(ANNOTATION_SEQ, next)?;
                Ok(format!("{}{:020}", prefix, next))
            },
            annotation,
        )
    }

    fn delete_machine(&self, fqdn: &str) -> Result<DeletionResult> {
        let key = fqdn_key(fqdn);
        let prefix = owned_prefix(&key);
        let mut result = DeletionResult::new();

        let txn = self.db.begin_write()?;
        {
            let mut machines = txn.open_table(MACHINES)?;
            if machines.remove(key.as_str())?.is_none() {
                return Err(Error::MachineNotFound(fqdn.to_string()));
            }
            result.add(RecordKind::Machine, 1);

            // Guests lose their hypervisor reference but are kept.
            let mut guests = Vec::new();
            for entry in machines.iter()? {
                let (guest_key, value) = entry?;
                let guest: Machine = serde_json::from_slice(value.value())?;
                if guest.hypervisor.as_deref().map(fqdn_key).as_deref() == Some(key.as_str()) {
                    guests.push((guest_key.value().to_string(), guest));
                }
            }
            for (guest_key, mut guest) in guests {
                guest.hypervisor = None;
                let bytes = serde_json::to_vec(&guest)?;
                machines.insert(guest_key.as_str(), bytes.as_slice())?;
                tracing::debug!(guest = %guest.fqdn, "cleared hypervisor reference");
            }

            let mut consoles = txn.open_table(SERIAL_CONSOLES)?;
            let keys = matching_keys(&consoles, |k, c: &SerialConsole| {
                k == key || c.depends_on(&key)
            })?;
            result.add(RecordKind::SerialConsole, remove_keys(&mut consoles, &keys)?);

            let mut powers = txn.open_table(REMOTE_POWERS)?;
            let keys = matching_keys(&powers, |k, p: &RemotePower| k == key || p.depends_on(&key))?;
            result.add(RecordKind::RemotePower, remove_keys(&mut powers, &keys)?);

            let mut interfaces = txn.open_table(NETWORK_INTERFACES)?;
            let keys = matching_keys(&interfaces, |k, _: &NetworkInterface| k.starts_with(&prefix))?;
            result.add(RecordKind::NetworkInterface, remove_keys(&mut interfaces, &keys)?);

            let mut annotations = txn.open_table(ANNOTATIONS)?;
            let keys = matching_keys(&annotations, |k, _: &Annotation| k.starts_with(&prefix))?;
            result.add(RecordKind::Annotation, remove_keys(&mut annotations, &keys)?);
        }
        txn.commit()?;

        tracing::info!(fqdn = %fqdn, removed = result.total(), "deleted machine");
        Ok(result)
    }

    fn delete_serial_console(&self, fqdn: &str) -> Result<DeletionResult> {
        self.delete_owned(SERIAL_CONSOLES, RecordKind::SerialConsole, fqdn)
    }

    fn delete_remote_power(&self, fqdn: &str) -> Result<DeletionResult> {
        self.delete_owned(REMOTE_POWERS, RecordKind::RemotePower, fqdn)
    }
}
