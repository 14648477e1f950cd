//! JSON translation documents.
//!
//! ```json
//! {
//!   "units": [
//!     { "id": "greeting", "source": ["Hello"], "target": ["Jambo"],
//!       "alternates": [{ "target": ["Habari"], "origin": "amina" }] }
//!   ]
//! }
//! ```
//!
//! Suggestions are stored as `alternates` on the unit itself.

use super::{FormatError, TranslationFormat};
use crate::model::{ParsedFile, Unit};
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Serialize, Deserialize)]
struct JsonDocument {
    #[serde(default)]
    units: Vec<Unit>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFormat;

impl TranslationFormat for JsonFormat {
    fn name(&self) -> &'static str {
        "json"
    }

    fn parse(&self, bytes: &[u8]) -> Result<ParsedFile, FormatError> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(ParsedFile::default());
        }
        let doc: JsonDocument = serde_json::from_slice(bytes)?;
        Ok(ParsedFile::new(doc.units))
    }

    fn serialize(&self, units: &[Unit]) -> Result<Vec<u8>, FormatError> {
        #[derive(Serialize)]
        struct Borrowed<'a> {
            units: &'a [Unit],
        }
        let mut bytes = serde_json::to_vec_pretty(&Borrowed { units })?;
        bytes.push(b'\n');
        Ok(bytes)
    }

    fn supports_alternates(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Alternate, MultiString};

    #[test]
    fn test_parse_minimal_document() {
        let bytes = br#"{"units": [{"id": "greeting", "source": ["Hello"], "target": ["Jambo"]}]}"#;
        let units = JsonFormat.parse(bytes).unwrap().units;
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].id(), "greeting");
        assert_eq!(units[0].target.first(), "Jambo");
        assert!(!units[0].fuzzy);
    }

    #[test]
    fn test_alternates_round_trip() {
        let mut unit = Unit::new("Hello").with_target("Jambo");
        unit.explicit_id = Some("greeting".to_string());
        unit.alternates.push(Alternate {
            target: MultiString::new("Habari"),
            origin: Some("amina".to_string()),
        });

        let bytes = JsonFormat.serialize(&[unit.clone()]).unwrap();
        assert!(bytes.ends_with(b"\n"));
        assert_eq!(JsonFormat.parse(&bytes).unwrap().units, vec![unit]);
        assert_eq!(JsonFormat.serialize(&JsonFormat.parse(&bytes).unwrap().units).unwrap(), bytes);
    }

    #[test]
    fn test_empty_and_malformed_input() {
        assert!(JsonFormat.parse(b"  \n").unwrap().units.is_empty());
        assert!(matches!(
            JsonFormat.parse(b"{\"units\": [").unwrap_err(),
            FormatError::Json(_)
        ));
    }
}
