//! Predefined commands.
//!
//! A plain label → command table the front end offers alongside free-form
//! input. Each preset may carry a help command used in help mode. The
//! built-in table can be extended or overridden from a user file (see
//! [`store`]).

pub mod store;

use serde::{Deserialize, Serialize};

/// One predefined command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preset {
    pub label: String,
    pub command: String,
    /// Command shown in help mode. Falls back to `help <command>`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
}

impl Preset {
    pub fn new(label: &str, command: &str, help: &str) -> Self {
        Self {
            label: label.to_string(),
            command: command.to_string(),
            help: Some(help.to_string()),
        }
    }

    /// Command to run for this preset in the given mode.
    pub fn command_for(&self, help_mode: bool) -> String {
        if !help_mode {
            return self.command.clone();
        }
        match &self.help {
            Some(help) => help.clone(),
            None => help_command(&self.command),
        }
    }
}

/// `help <input>`, the PowerShell alias for `Get-Help`.
pub fn help_command(input: &str) -> String {
    format!("help {}", input.trim())
}

/// Ordered table of presets; labels are unique ignoring ASCII case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresetTable {
    entries: Vec<Preset>,
}

impl Default for PresetTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl PresetTable {
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// System inspection commands shipped with the application.
    pub fn builtin() -> Self {
        let entries = vec![
            Preset::new(
                "System Information",
                "Get-CimInstance -ClassName Win32_ComputerSystem | Format-List *",
                "Get-Help Get-CimInstance",
            ),
            Preset::new(
                "List Disk Drives",
                "Get-WmiObject -Class Win32_DiskDrive | Select-Object DeviceID, Model, Size, MediaType",
                "Get-Help Get-WmiObject",
            ),
            Preset::new(
                "List Network Adapters",
                "Get-NetAdapter | Select-Object Name, InterfaceDescription, Status, MacAddress",
                "Get-Help Get-NetAdapter",
            ),
            Preset::new(
                "List Active Network Connections",
                "Get-NetTCPConnection | Select-Object LocalAddress, LocalPort, RemoteAddress, RemotePort, State",
                "Get-Help Get-NetTCPConnection",
            ),
            Preset::new(
                "List Printers",
                "Get-Printer | Select-Object Name, DriverName, PortName, Shared",
                "Get-Help Get-Printer",
            ),
            Preset::new(
                "List Installed Software",
                "Get-WmiObject -Class Win32_Product | Select-Object Name, Vendor, Version, InstallDate",
                "Get-Help Get-WmiObject",
            ),
            Preset::new(
                "List Processes",
                "Get-Process | Select-Object Name, Id, CPU, Responding, Path",
                "Get-Help Get-Process",
            ),
            Preset::new(
                "List Services",
                "Get-Service | Select-Object DisplayName, Status, ServiceType, StartType",
                "Get-Help Get-Service",
            ),
            Preset::new(
                "Check System Uptime",
                "Get-CimInstance Win32_OperatingSystem | Select-Object LastBootUpTime, @{Name='Uptime';Expression={[DateTime]::Now - [Management.ManagementDateTimeConverter]::ToDateTime($_.LastBootUpTime)}}",
                "Get-Help Get-CimInstance",
            ),
        ];
        Self { entries }
    }

    pub fn entries(&self) -> &[Preset] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Find a preset by label, ignoring surrounding whitespace and ASCII case.
    pub fn get(&self, label: &str) -> Option<&Preset> {
        let label = label.trim();
        self.entries
            .iter()
            .find(|preset| preset.label.eq_ignore_ascii_case(label))
    }

    /// Add a preset, replacing any existing one with the same label in place.
    pub fn upsert(&mut self, preset: Preset) {
        match self
            .entries
            .iter_mut()
            .find(|existing| existing.label.eq_ignore_ascii_case(preset.label.trim()))
        {
            Some(existing) => *existing = preset,
            None => self.entries.push(preset),
        }
    }

    /// Merge `other` over this table.
    pub fn extend(&mut self, other: impl IntoIterator<Item = Preset>) {
        for preset in other {
            self.upsert(preset);
        }
    }

    /// Turn user input into the command line to run.
    ///
    /// A preset label resolves to its command (or its help command in help
    /// mode). Anything else is taken as typed, or wrapped in `help` in help
    /// mode. Blank input stays blank in either mode.
    pub fn resolve(&self, input: &str, help_mode: bool) -> String {
        let input = input.trim();
        if input.is_empty() {
            return String::new();
        }
        match self.get(input) {
            Some(preset) => preset.command_for(help_mode),
            None if help_mode => help_command(input),
            None => input.to_string(),
        }
    }
}
