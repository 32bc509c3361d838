// 🔎 Code Lookup - Agency codes (ORI style) → full agency names
//
// Some datasets identify agencies by code instead of name. A lookup table
// maps each code to a name; a code must resolve to exactly one row.

use crate::error::LookupError;
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

pub const DEFAULT_CODE_COLUMN: &str = "ORI";
pub const DEFAULT_NAME_COLUMN: &str = "AGENCY_NAME";

#[derive(Debug, Clone, Default)]
pub struct CodeLookup {
    /// Code → every name listed for it (more than one is a mismatch)
    names: HashMap<String, Vec<String>>,
    rows: usize,
}

impl CodeLookup {
    pub fn from_path(path: &Path, code_column: &str, name_column: &str) -> Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("Failed to open lookup file: {}", path.display()))?;

        Self::from_reader(file, code_column, name_column)
            .with_context(|| format!("Failed to load lookup file: {}", path.display()))
    }

    pub fn from_reader<R: Read>(reader: R, code_column: &str, name_column: &str) -> Result<Self> {
        let mut rdr = csv::Reader::from_reader(reader);

        let headers = rdr.headers().context("Failed to read lookup header")?.clone();
        let column = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim() == name)
                .ok_or_else(|| LookupError::MissingColumn {
                    column: name.to_string(),
                })
        };
        let code_idx = column(code_column)?;
        let name_idx = column(name_column)?;

        let mut lookup = CodeLookup::default();
        for result in rdr.records() {
            let record = result.context("Failed to read lookup row")?;
            let code = record.get(code_idx).unwrap_or_default().trim();
            let name = record.get(name_idx).unwrap_or_default().trim();
            if code.is_empty() {
                continue;
            }

            lookup.insert(code, name);
        }

        Ok(lookup)
    }

    pub fn insert(&mut self, code: &str, name: &str) {
        self.names
            .entry(code.to_string())
            .or_default()
            .push(name.to_string());
        self.rows += 1;
    }

    /// Name for a code, when exactly one row carries it
    pub fn resolve(&self, code: &str) -> Result<&str, LookupError> {
        let code = code.trim();
        match self.names.get(code).map(Vec::as_slice) {
            Some([name]) => Ok(name.as_str()),
            Some(names) => Err(LookupError::Mismatch {
                code: code.to_string(),
                matches: names.len(),
            }),
            None => Err(LookupError::Mismatch {
                code: code.to_string(),
                matches: 0,
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = "\
ORI,AGENCY_NAME,COUNTY
CA0010000,Alameda County Sheriff's Department,Alameda
CA0010100,Alameda Police Department,Alameda
CA0019999,Old Name,Alameda
CA0019999,New Name,Alameda
";

    fn lookup() -> CodeLookup {
        CodeLookup::from_reader(TABLE.as_bytes(), DEFAULT_CODE_COLUMN, DEFAULT_NAME_COLUMN).unwrap()
    }

    #[test]
    fn test_resolve_single_row() {
        let lookup = lookup();
        assert_eq!(lookup.len(), 4);
        assert_eq!(lookup.resolve("CA0010100").unwrap(), "Alameda Police Department");
        assert_eq!(lookup.resolve(" CA0010000 ").unwrap(), "Alameda County Sheriff's Department");
    }

    #[test]
    fn test_resolve_mismatch() {
        let lookup = lookup();
        assert_eq!(
            lookup.resolve("CA0019999"),
            Err(LookupError::Mismatch {
                code: "CA0019999".to_string(),
                matches: 2
            })
        );
        assert_eq!(
            lookup.resolve("XX"),
            Err(LookupError::Mismatch {
                code: "XX".to_string(),
                matches: 0
            })
        );
    }

    #[test]
    fn test_custom_columns() {
        let table = "Agency,ORI_Number\nBerkeley Police Department,CA0010300\n";
        let lookup = CodeLookup::from_reader(table.as_bytes(), "ORI_Number", "Agency").unwrap();
        assert_eq!(lookup.resolve("CA0010300").unwrap(), "Berkeley Police Department");
    }

    #[test]
    fn test_missing_column() {
        let err = CodeLookup::from_reader(TABLE.as_bytes(), "ORI_Number", DEFAULT_NAME_COLUMN).unwrap_err();
        assert_eq!(
            err.downcast_ref::<LookupError>(),
            Some(&LookupError::MissingColumn {
                column: "ORI_Number".to_string()
            })
        );
    }
}
