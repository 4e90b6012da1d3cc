//! Swath product container format.
//!
//! Layout: 4-byte magic `SWTH`, one version byte, a little-endian u32 header
//! length, a JSON header, then a data section of little-endian f32 arrays.
//! Array locations in the header are offsets into the data section.
//!
//! Two header layouts exist in the wild. Instrument-native products organize
//! variables into named groups (`geolocation`, `product`, `support_data`);
//! some reprocessed products store every variable flat at the top level.
//! [`SwathProduct::open`] detects which layout is present and records it, so
//! callers can tell which access path was taken instead of guessing from
//! failures.

use crate::{Result, SwathError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::Path;

const MAGIC: &[u8; 4] = b"SWTH";
const VERSION: u8 = 1;

/// Location of one variable's array within the data section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariableEntry {
    /// Byte offset from the start of the data section.
    pub offset: u64,
    /// Number of f32 elements.
    pub len: u64,
}

/// JSON header of a swath product.
///
/// Exactly one of `groups` / `variables` is expected to be present.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ProductHeader {
    rows: usize,
    cols: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    groups: Option<BTreeMap<String, BTreeMap<String, VariableEntry>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    variables: Option<BTreeMap<String, VariableEntry>>,
}

/// Which header layout a product used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwathLayout {
    /// Variables nested under named groups.
    Grouped,
    /// All variables at the top level.
    Flat,
}

/// An opened swath product with its data section in memory.
pub struct SwathProduct {
    header: ProductHeader,
    layout: SwathLayout,
    data: Vec<u8>,
}

impl SwathProduct {
    /// Open and validate a product file.
    pub fn open(path: &Path) -> Result<Self> {
        let raw = fs::read(path).map_err(|e| SwathError::Io(path.display().to_string(), e))?;
        Self::from_bytes(&raw)
    }

    /// Parse a product from raw bytes.
    pub fn from_bytes(raw: &[u8]) -> Result<Self> {
        if raw.len() < 9 {
            return Err(SwathError::Format("truncated product file".to_string()));
        }
        if &raw[0..4] != MAGIC {
            return Err(SwathError::Format("bad magic, not a swath product".to_string()));
        }
        if raw[4] != VERSION {
            return Err(SwathError::Format(format!(
                "unsupported product version {}",
                raw[4]
            )));
        }

        let header_len = u32::from_le_bytes([raw[5], raw[6], raw[7], raw[8]]) as usize;
        let header_end = 9 + header_len;
        if raw.len() < header_end {
            return Err(SwathError::Format("truncated product header".to_string()));
        }

        let header: ProductHeader = serde_json::from_slice(&raw[9..header_end])
            .map_err(|e| SwathError::Format(format!("invalid product header: {}", e)))?;

        // Structured access first; flat is the explicit fallback when the
        // grouped layout is not present.
        let layout = if header.groups.is_some() {
            SwathLayout::Grouped
        } else if header.variables.is_some() {
            SwathLayout::Flat
        } else {
            return Err(SwathError::Format(
                "product header has neither groups nor variables".to_string(),
            ));
        };

        Ok(Self {
            header,
            layout,
            data: raw[header_end..].to_vec(),
        })
    }

    /// Scan line count of the swath.
    pub fn rows(&self) -> usize {
        self.header.rows
    }

    /// Pixels per scan line.
    pub fn cols(&self) -> usize {
        self.header.cols
    }

    /// Which header layout this product used.
    pub fn layout(&self) -> SwathLayout {
        self.layout
    }

    /// Names of all variables in the product, regardless of layout.
    pub fn variable_names(&self) -> Vec<String> {
        match (&self.header.groups, &self.header.variables) {
            (Some(groups), _) => groups
                .values()
                .flat_map(|vars| vars.keys().cloned())
                .collect(),
            (None, Some(vars)) => vars.keys().cloned().collect(),
            (None, None) => Vec::new(),
        }
    }

    /// Read one variable as f32 values.
    ///
    /// For grouped products the variable is looked up inside `group`; for flat
    /// products the group name is ignored and the variable is looked up at the
    /// top level.
    pub fn read_variable(&self, group: &str, name: &str) -> Result<Vec<f32>> {
        let entry = match self.layout {
            SwathLayout::Grouped => self
                .header
                .groups
                .as_ref()
                .and_then(|g| g.get(group))
                .and_then(|vars| vars.get(name)),
            SwathLayout::Flat => self
                .header
                .variables
                .as_ref()
                .and_then(|vars| vars.get(name)),
        }
        .ok_or_else(|| SwathError::MissingVariable(format!("{}/{}", group, name)))?;

        let start = entry.offset as usize;
        let byte_len = entry.len as usize * 4;
        let end = start
            .checked_add(byte_len)
            .ok_or_else(|| SwathError::Format("variable extent overflows".to_string()))?;
        if end > self.data.len() {
            return Err(SwathError::Format(format!(
                "variable {}/{} extends past the data section",
                group, name
            )));
        }

        let values = self.data[start..end]
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        Ok(values)
    }
}

/// Writer used to produce swath product files (test fixtures and repackaged
/// instrument granules).
pub struct SwathProductWriter {
    rows: usize,
    cols: usize,
    grouped: bool,
    entries: Vec<(String, String, Vec<f32>)>,
}

impl SwathProductWriter {
    pub fn grouped(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            grouped: true,
            entries: Vec::new(),
        }
    }

    pub fn flat(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            grouped: false,
            entries: Vec::new(),
        }
    }

    /// Add a variable. The group name is recorded only for grouped products.
    pub fn variable(mut self, group: &str, name: &str, values: Vec<f32>) -> Self {
        self.entries.push((group.to_string(), name.to_string(), values));
        self
    }

    /// Serialize the product to bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut data: Vec<u8> = Vec::new();
        let mut located: Vec<(String, String, VariableEntry)> = Vec::new();

        for (group, name, values) in &self.entries {
            let entry = VariableEntry {
                offset: data.len() as u64,
                len: values.len() as u64,
            };
            for v in values {
                data.extend_from_slice(&v.to_le_bytes());
            }
            located.push((group.clone(), name.clone(), entry));
        }

        let header = if self.grouped {
            let mut groups: BTreeMap<String, BTreeMap<String, VariableEntry>> = BTreeMap::new();
            for (group, name, entry) in located {
                groups.entry(group).or_default().insert(name, entry);
            }
            ProductHeader {
                rows: self.rows,
                cols: self.cols,
                groups: Some(groups),
                variables: None,
            }
        } else {
            let mut vars: BTreeMap<String, VariableEntry> = BTreeMap::new();
            for (_, name, entry) in located {
                vars.insert(name, entry);
            }
            ProductHeader {
                rows: self.rows,
                cols: self.cols,
                groups: None,
                variables: Some(vars),
            }
        };

        let header_json = serde_json::to_vec(&header)
            .map_err(|e| SwathError::Format(format!("header serialization: {}", e)))?;

        let mut out = Vec::with_capacity(9 + header_json.len() + data.len());
        out.extend_from_slice(MAGIC);
        out.push(VERSION);
        out.extend_from_slice(&(header_json.len() as u32).to_le_bytes());
        out.extend_from_slice(&header_json);
        out.extend_from_slice(&data);
        Ok(out)
    }

    /// Write the product to a file.
    pub fn write(&self, path: &Path) -> Result<()> {
        let bytes = self.to_bytes()?;
        let mut file =
            fs::File::create(path).map_err(|e| SwathError::Io(path.display().to_string(), e))?;
        file.write_all(&bytes)
            .map_err(|e| SwathError::Io(path.display().to_string(), e))?;
        Ok(())
    }
}
