//! Inventory records.
//!
//! A [`Machine`] is identified by its fully qualified domain name, compared
//! case-insensitively. Serial consoles, remote power and the dependent
//! records are keyed by the owning machine's fqdn.

use serde::{Deserialize, Serialize};

/// Storage namespace shared by every record kind.
pub const NAMESPACE: &str = "data";

/// Kinds of persisted records, as reported in deletion results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RecordKind {
    Machine,
    SerialConsole,
    RemotePower,
    NetworkInterface,
    Annotation,
}

impl RecordKind {
    /// Bare entity name.
    pub fn name(self) -> &'static str {
        match self {
            RecordKind::Machine => "Machine",
            RecordKind::SerialConsole => "SerialConsole",
            RecordKind::RemotePower => "RemotePower",
            RecordKind::NetworkInterface => "NetworkInterface",
            RecordKind::Annotation => "Annotation",
        }
    }

    /// Namespace-qualified name, e.g. `data.Machine`.
    pub fn qualified_name(self) -> String {
        format!("{}.{}", NAMESPACE, self.name())
    }
}

/// Normalize an fqdn into its lookup key.
pub fn fqdn_key(fqdn: &str) -> String {
    fqdn.trim().to_ascii_lowercase()
}

/// A machine in the inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Machine {
    /// Fully qualified domain name, as entered.
    pub fqdn: String,

    /// Whether this machine is a virtual instance.
    #[serde(default)]
    pub is_virtual: bool,

    /// Fqdn of the hypervisor hosting this machine (virtual machines only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hypervisor: Option<String>,

    /// Backend kind able to manage guests on this machine (hypervisors only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub virtualization_api: Option<String>,

    /// Free-form comment.
    #[serde(default)]
    pub comment: String,
}

impl Machine {
    /// Create a physical machine record.
    pub fn new(fqdn: impl Into<String>) -> Self {
        Self {
            fqdn: fqdn.into(),
            is_virtual: false,
            hypervisor: None,
            virtualization_api: None,
            comment: String::new(),
        }
    }

    /// Create a virtual machine hosted on `hypervisor`.
    pub fn new_virtual(fqdn: impl Into<String>, hypervisor: impl Into<String>) -> Self {
        Self {
            is_virtual: true,
            hypervisor: Some(hypervisor.into()),
            ..Self::new(fqdn)
        }
    }

    /// Mark this machine as a hypervisor managed through `api`.
    pub fn with_virtualization_api(mut self, api: impl Into<String>) -> Self {
        self.virtualization_api = Some(api.into());
        self
    }

    /// Lookup key of this machine.
    pub fn key(&self) -> String {
        fqdn_key(&self.fqdn)
    }

    /// First label of the fqdn.
    pub fn hostname(&self) -> &str {
        self.fqdn.split('.').next().unwrap_or(&self.fqdn)
    }

    pub fn is_virtual_machine(&self) -> bool {
        self.is_virtual
    }
}

/// Baud rates a serial console line can run at.
pub const BAUD_RATES: [u32; 7] = [2400, 4800, 9600, 19200, 38400, 57600, 115200];

/// Highest kernel serial device index (`ttyS<n>`).
pub const KERNEL_DEVICE_MAX: u16 = 1024;

/// Serial console access for a machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerialConsole {
    /// Owning machine.
    pub machine: String,

    /// Console type, e.g. `IPMI` or `Telnet`.
    pub console_type: String,

    /// Machine running cscreen for this console.
    pub cscreen_server: String,

    /// Dedicated console server machine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub console_server: Option<String>,

    /// Management BMC machine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub management_bmc: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    /// Kernel serial device index.
    #[serde(default)]
    pub kernel_device: u16,
}

fn default_baud_rate() -> u32 {
    57600
}

impl SerialConsole {
    /// Create a serial console record with default line settings.
    pub fn new(
        machine: impl Into<String>,
        console_type: impl Into<String>,
        cscreen_server: impl Into<String>,
    ) -> Self {
        Self {
            machine: machine.into(),
            console_type: console_type.into(),
            cscreen_server: cscreen_server.into(),
            console_server: None,
            management_bmc: None,
            device: None,
            baud_rate: default_baud_rate(),
            kernel_device: 0,
        }
    }

    /// Machines this console references besides its owner.
    pub fn references(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.cscreen_server.as_str())
            .chain(self.console_server.as_deref())
            .chain(self.management_bmc.as_deref())
    }

    /// Whether this console depends on `fqdn` as its cscreen server,
    /// console server or BMC.
    pub fn depends_on(&self, fqdn: &str) -> bool {
        let key = fqdn_key(fqdn);
        self.references().any(|m| fqdn_key(m) == key)
    }

    /// Check the line settings.
    pub fn validate(&self) -> Result<(), String> {
        if !BAUD_RATES.contains(&self.baud_rate) {
            return Err(format!("unsupported baud rate {}", self.baud_rate));
        }
        if self.kernel_device > KERNEL_DEVICE_MAX {
            return Err(format!(
                "kernel device {} out of range (0..={})",
                self.kernel_device, KERNEL_DEVICE_MAX
            ));
        }
        Ok(())
    }
}

/// Remote power control for a machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemotePower {
    /// Owning machine.
    pub machine: String,

    /// Fence agent name, e.g. `ipmilanplus`.
    pub fence_name: String,

    /// Power device machine, if the fence agent talks to a separate device.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,
}

impl RemotePower {
    pub fn new(machine: impl Into<String>, fence_name: impl Into<String>) -> Self {
        Self {
            machine: machine.into(),
            fence_name: fence_name.into(),
            device: None,
            port: None,
        }
    }

    /// Whether this remote power uses `fqdn` as its power device.
    pub fn depends_on(&self, fqdn: &str) -> bool {
        self.device
            .as_deref()
            .is_some_and(|d| fqdn_key(d) == fqdn_key(fqdn))
    }
}

/// A network interface of a machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkInterface {
    pub machine: String,
    pub mac_address: String,
    #[serde(default)]
    pub primary: bool,
}

/// A free-form note attached to a machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    pub machine: String,
    pub text: String,
    #[serde(default)]
    pub reporter: String,
}
