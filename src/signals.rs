//! Named bit store for the two signal groups mirrored over the link.
//!
//! Indices are assigned at load time from an ordered name source and are
//! the sole key routing decoded wire data to a signal. The table rejects
//! out-of-range indices at this boundary instead of trusting the caller.

use crate::error::LinkError;
use log::trace;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;

/// The two disjoint signal groups on the link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalGroup {
    /// Read-only bit reported by the device.
    Probe,
    /// Bit whose desired value the host asserts to the device.
    Switch,
}

impl fmt::Display for SignalGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalGroup::Probe => write!(f, "probe"),
            SignalGroup::Switch => write!(f, "switch"),
        }
    }
}

/// One named bit of device state.
#[derive(Debug, Clone)]
pub struct Signal {
    name: String,
    index: u8,
    data: u8,
}

impl Signal {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn index(&self) -> u8 {
        self.index
    }

    pub fn data(&self) -> u8 {
        self.data
    }
}

/// Indexed storage for both signal groups.
#[derive(Debug, Default)]
pub struct SignalTable {
    probes: Vec<Signal>,
    switches: Vec<Signal>,
}

impl SignalTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Populate one group from an ordered `(index, name)` sequence.
    /// Duplicate indices within a group are rejected.
    pub fn load<I>(&mut self, group: SignalGroup, pairs: I) -> Result<(), LinkError>
    where
        I: IntoIterator<Item = (u8, String)>,
    {
        for (index, name) in pairs {
            let slots = self.group_mut(group);
            if slots.iter().any(|s| s.index == index) {
                return Err(LinkError::DuplicateSignal { group, index });
            }
            trace!("loaded {group} signal {index}: {name}");
            slots.push(Signal {
                name,
                index,
                data: 0,
            });
        }
        Ok(())
    }

    pub fn len(&self, group: SignalGroup) -> usize {
        self.group(group).len()
    }

    pub fn is_empty(&self, group: SignalGroup) -> bool {
        self.group(group).is_empty()
    }

    /// Whether the group's index space is fully populated, i.e. every
    /// index in `0..len` came out of the name source. Bounds any
    /// full-table scan.
    pub fn all_loaded(&self, group: SignalGroup) -> bool {
        let slots = self.group(group);
        (0..slots.len()).all(|i| slots.iter().any(|s| s.index as usize == i))
    }

    /// Current data bit of a signal, `None` when the index is unknown.
    pub fn get(&self, group: SignalGroup, index: u8) -> Option<u8> {
        self.group(group)
            .iter()
            .find(|s| s.index == index)
            .map(|s| s.data)
    }

    pub fn name(&self, group: SignalGroup, index: u8) -> Option<&str> {
        self.group(group)
            .iter()
            .find(|s| s.index == index)
            .map(|s| s.name.as_str())
    }

    pub fn set(&mut self, group: SignalGroup, index: u8, bit: u8) -> Result<(), LinkError> {
        match self.group_mut(group).iter_mut().find(|s| s.index == index) {
            Some(signal) => {
                signal.data = bit & 1;
                Ok(())
            }
            None => Err(LinkError::SignalOutOfRange { group, index }),
        }
    }

    pub fn iter(&self, group: SignalGroup) -> impl Iterator<Item = &Signal> {
        self.group(group).iter()
    }

    /// Data bits of a group in index order, as a compact digit string.
    pub fn render(&self, group: SignalGroup) -> String {
        let mut slots: Vec<&Signal> = self.group(group).iter().collect();
        slots.sort_by_key(|s| s.index);
        slots
            .iter()
            .map(|s| if s.data == 0 { '0' } else { '1' })
            .collect()
    }

    fn group(&self, group: SignalGroup) -> &Vec<Signal> {
        match group {
            SignalGroup::Probe => &self.probes,
            SignalGroup::Switch => &self.switches,
        }
    }

    fn group_mut(&mut self, group: SignalGroup) -> &mut Vec<Signal> {
        match group {
            SignalGroup::Probe => &mut self.probes,
            SignalGroup::Switch => &mut self.switches,
        }
    }
}

/// Parse signal definitions: one `index name` pair per line, `#` starts a
/// comment, blank lines are skipped. The format of the probe/switch list
/// files shipped with the FPGA design.
pub fn parse_signal_text(text: &str, origin: &str) -> Result<Vec<(u8, String)>, LinkError> {
    let mut pairs = Vec::new();
    for (line_no, raw) in text.lines().enumerate() {
        let line = raw.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        let mut fields = line.split_whitespace();
        let index = fields
            .next()
            .and_then(|f| f.parse::<u8>().ok())
            .ok_or_else(|| LinkError::SignalFile {
                origin: origin.to_string(),
                line: line_no + 1,
                reason: format!("expected a numeric index, got {raw:?}"),
            })?;
        let name = fields.next().ok_or_else(|| LinkError::SignalFile {
            origin: origin.to_string(),
            line: line_no + 1,
            reason: "missing signal name".to_string(),
        })?;
        pairs.push((index, name.to_string()));
    }
    Ok(pairs)
}

/// Read and parse a signal file from disk.
pub fn read_signal_file(path: &Path) -> Result<Vec<(u8, String)>, LinkError> {
    let text = fs::read_to_string(path)?;
    parse_signal_text(&text, &path.display().to_string())
}
