//! Address model and parser.
//!
//! Two address forms are accepted:
//!
//! ```text
//! direct:    <area>/<byteOffset>[/<bitOffset>]     e.g. INPUTS/0, DATA_BLOCKS/4/3
//! symbolic:  segment('.'segment)*                  e.g. Main.byByte[0], GVL.matrix[1][2]
//!            segment = identifier('['digits']')*
//! ```
//!
//! Parsing is pure. Direct addresses render back to their normalized text, so
//! `parse(addr.to_string()) == addr` holds for every direct address.

use crate::error::AddressFormatError;
use crate::value::DataType;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Highest valid bit offset inside a byte.
pub const MAX_BIT_OFFSET: u8 = 7;

/// A device memory area identifier.
///
/// The identifier is protocol-neutral: it only has to consist of ASCII
/// letters, digits and underscores. It is stored upper-cased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MemoryArea(String);

impl MemoryArea {
    pub fn new(name: &str) -> Result<Self, AddressFormatError> {
        if name.is_empty() {
            return Err(AddressFormatError::new(name, "empty memory area"));
        }
        if let Some(c) = name
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '_'))
        {
            return Err(AddressFormatError::new(
                name,
                format!("invalid character '{}' in memory area", c),
            ));
        }
        Ok(Self(name.to_ascii_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for MemoryArea {
    type Error = AddressFormatError;

    fn try_from(name: String) -> Result<Self, Self::Error> {
        MemoryArea::new(&name)
    }
}

impl From<MemoryArea> for String {
    fn from(area: MemoryArea) -> Self {
        area.0
    }
}

impl fmt::Display for MemoryArea {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A fully resolved device memory location.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DirectAddress {
    pub area: MemoryArea,
    pub byte_offset: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bit_offset: Option<u8>,
}

impl DirectAddress {
    pub fn new(area: MemoryArea, byte_offset: u32) -> Self {
        Self {
            area,
            byte_offset,
            bit_offset: None,
        }
    }

    pub fn with_bit(mut self, bit_offset: u8) -> Result<Self, AddressFormatError> {
        if bit_offset > MAX_BIT_OFFSET {
            return Err(AddressFormatError::new(
                self.to_string(),
                format!("bit offset {} out of range 0..={}", bit_offset, MAX_BIT_OFFSET),
            ));
        }
        self.bit_offset = Some(bit_offset);
        Ok(self)
    }
}

impl fmt::Display for DirectAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.area, self.byte_offset)?;
        if let Some(bit) = self.bit_offset {
            write!(f, "/{}", bit)?;
        }
        Ok(())
    }
}

/// A named device symbol that must be resolved before use on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SymbolicAddress {
    name: String,
}

impl SymbolicAddress {
    pub fn new(name: &str) -> Result<Self, AddressFormatError> {
        validate_symbol(name)?;
        Ok(Self {
            name: name.to_string(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl TryFrom<String> for SymbolicAddress {
    type Error = AddressFormatError;

    fn try_from(name: String) -> Result<Self, Self::Error> {
        validate_symbol(&name)?;
        Ok(Self { name })
    }
}

impl From<SymbolicAddress> for String {
    fn from(symbol: SymbolicAddress) -> Self {
        symbol.name
    }
}

impl fmt::Display for SymbolicAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// A parsed address expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Address {
    Direct(DirectAddress),
    Symbolic(SymbolicAddress),
}

impl Address {
    /// Parses an address expression.
    pub fn parse(text: &str) -> Result<Self, AddressFormatError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(AddressFormatError::new(text, "empty address"));
        }

        if trimmed.contains('/') {
            parse_direct(trimmed).map(Address::Direct)
        } else {
            SymbolicAddress::new(trimmed).map(Address::Symbolic)
        }
    }

    pub fn is_symbolic(&self) -> bool {
        matches!(self, Address::Symbolic(_))
    }

    pub fn as_direct(&self) -> Option<&DirectAddress> {
        match self {
            Address::Direct(direct) => Some(direct),
            Address::Symbolic(_) => None,
        }
    }

    pub fn as_symbolic(&self) -> Option<&SymbolicAddress> {
        match self {
            Address::Direct(_) => None,
            Address::Symbolic(symbolic) => Some(symbolic),
        }
    }
}

impl FromStr for Address {
    type Err = AddressFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Address::parse(s)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Direct(direct) => direct.fmt(f),
            Address::Symbolic(symbolic) => symbolic.fmt(f),
        }
    }
}

impl From<DirectAddress> for Address {
    fn from(direct: DirectAddress) -> Self {
        Address::Direct(direct)
    }
}

impl From<SymbolicAddress> for Address {
    fn from(symbolic: SymbolicAddress) -> Self {
        Address::Symbolic(symbolic)
    }
}

/// One element of a batch: where to read, how to interpret it, how many.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemSpec {
    pub address: Address,
    pub data_type: DataType,
    pub count: u16,
}

impl ItemSpec {
    pub fn new(address: Address, data_type: DataType) -> Self {
        Self {
            address,
            data_type,
            count: 1,
        }
    }

    /// Sets the element count. Connections refuse to send a zero count.
    pub fn with_count(mut self, count: u16) -> Self {
        self.count = count;
        self
    }
}

fn parse_direct(text: &str) -> Result<DirectAddress, AddressFormatError> {
    let parts: Vec<&str> = text.split('/').collect();
    if parts.len() < 2 || parts.len() > 3 {
        return Err(AddressFormatError::new(
            text,
            "expected <area>/<byteOffset>[/<bitOffset>]",
        ));
    }

    let area = MemoryArea::new(parts[0]).map_err(|e| AddressFormatError::new(text, e.reason))?;
    let byte_offset = parse_number::<u32>(text, parts[1], "byte offset")?;
    let direct = DirectAddress::new(area, byte_offset);

    match parts.get(2) {
        Some(bit) => {
            let bit = parse_number::<u8>(text, bit, "bit offset")?;
            direct
                .with_bit(bit)
                .map_err(|e| AddressFormatError::new(text, e.reason))
        }
        None => Ok(direct),
    }
}

fn parse_number<T: FromStr>(
    input: &str,
    digits: &str,
    what: &str,
) -> Result<T, AddressFormatError> {
    if digits.is_empty() {
        return Err(AddressFormatError::new(input, format!("empty {}", what)));
    }
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AddressFormatError::new(
            input,
            format!("{} '{}' is not a decimal number", what, digits),
        ));
    }
    digits
        .parse()
        .map_err(|_| AddressFormatError::new(input, format!("{} '{}' out of range", what, digits)))
}

fn validate_symbol(name: &str) -> Result<(), AddressFormatError> {
    if name.is_empty() {
        return Err(AddressFormatError::new(name, "empty symbol"));
    }
    for segment in name.split('.') {
        validate_segment(name, segment)?;
    }
    Ok(())
}

fn validate_segment(name: &str, segment: &str) -> Result<(), AddressFormatError> {
    let bytes = segment.as_bytes();
    let mut pos = 0;

    match bytes.first() {
        Some(b) if b.is_ascii_alphabetic() || *b == b'_' => pos += 1,
        Some(_) => {
            return Err(AddressFormatError::new(
                name,
                format!("segment '{}' must start with a letter or '_'", segment),
            ))
        }
        None => return Err(AddressFormatError::new(name, "empty symbol segment")),
    }

    while pos < bytes.len() && (bytes[pos].is_ascii_alphanumeric() || bytes[pos] == b'_') {
        pos += 1;
    }

    // Zero or more [digits] indices may follow the identifier.
    while pos < bytes.len() {
        if bytes[pos] != b'[' {
            return Err(AddressFormatError::new(
                name,
                format!("unexpected character '{}' in segment '{}'", bytes[pos] as char, segment),
            ));
        }
        pos += 1;
        let start = pos;
        while pos < bytes.len() && bytes[pos].is_ascii_digit() {
            pos += 1;
        }
        if pos == start {
            return Err(AddressFormatError::new(
                name,
                format!("empty or non-numeric index in segment '{}'", segment),
            ));
        }
        if pos >= bytes.len() || bytes[pos] != b']' {
            return Err(AddressFormatError::new(
                name,
                format!("unterminated index in segment '{}'", segment),
            ));
        }
        pos += 1;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_direct() {
        let addr = Address::parse("INPUTS/0").unwrap();
        let direct = addr.as_direct().unwrap();
        assert_eq!(direct.area.as_str(), "INPUTS");
        assert_eq!(direct.byte_offset, 0);
        assert_eq!(direct.bit_offset, None);

        let addr = Address::parse("DATA_BLOCKS/4/3").unwrap();
        let direct = addr.as_direct().unwrap();
        assert_eq!(direct.byte_offset, 4);
        assert_eq!(direct.bit_offset, Some(3));
    }

    #[test]
    fn test_parse_numeric_area() {
        let addr = Address::parse("0/0").unwrap();
        assert_eq!(addr.to_string(), "0/0");
        assert!(!addr.is_symbolic());
    }

    #[test]
    fn test_parse_normalizes() {
        let addr = Address::parse("  outputs/007 ").unwrap();
        assert_eq!(addr.to_string(), "OUTPUTS/7");
    }

    #[test]
    fn test_parse_symbolic() {
        let addr = Address::parse("Main.byByte[0]").unwrap();
        let symbolic = addr.as_symbolic().unwrap();
        assert_eq!(symbolic.name(), "Main.byByte[0]");

        assert!(Address::parse("GVL.matrix[1][2]").unwrap().is_symbolic());
        assert!(Address::parse("_private").unwrap().is_symbolic());
        assert!(Address::parse("a.b.c").unwrap().is_symbolic());
    }

    #[test]
    fn test_parse_malformed() {
        for bad in [
            "",
            "   ",
            "INPUTS/",
            "/0",
            "INPUTS/x",
            "INPUTS/+1",
            "INPUTS/0/8",
            "INPUTS/0/1/2",
            "IN-PUTS/0",
            "INPUTS/99999999999",
            "Main..x",
            "Main.",
            ".Main",
            "9lives",
            "Main.arr[",
            "Main.arr[]",
            "Main.arr[x]",
            "Main.arr[1]x",
            "Main arr",
        ] {
            let result = Address::parse(bad);
            assert!(result.is_err(), "expected '{}' to be rejected", bad);
        }
    }

    #[test]
    fn test_from_str() {
        let addr: Address = "MERKERS/10/2".parse().unwrap();
        assert_eq!(addr.to_string(), "MERKERS/10/2");
    }

    #[test]
    fn test_with_bit_range() {
        let direct = DirectAddress::new(MemoryArea::new("I").unwrap(), 1);
        assert!(direct.clone().with_bit(7).is_ok());
        assert!(direct.with_bit(8).is_err());
    }

    #[test]
    fn test_item_spec_defaults() {
        let spec = ItemSpec::new(Address::parse("INPUTS/0").unwrap(), DataType::Byte);
        assert_eq!(spec.count, 1);
        assert_eq!(spec.with_count(4).count, 4);
    }

    #[test]
    fn test_deserialize_validates() {
        let area: MemoryArea = serde_json::from_str("\"inputs\"").unwrap();
        assert_eq!(area.as_str(), "INPUTS");
        assert_eq!(serde_json::to_string(&area).unwrap(), "\"INPUTS\"");
        assert!(serde_json::from_str::<MemoryArea>("\"in-puts\"").is_err());
        assert!(serde_json::from_str::<MemoryArea>("\"\"").is_err());

        let symbol: SymbolicAddress = serde_json::from_str("\"Main.speed\"").unwrap();
        assert_eq!(serde_json::to_string(&symbol).unwrap(), "\"Main.speed\"");
        assert!(serde_json::from_str::<SymbolicAddress>("\"\"").is_err());
    }

    proptest! {
        #[test]
        fn prop_direct_roundtrip(
            area in "[A-Za-z0-9_]{1,12}",
            byte_offset in any::<u32>(),
            bit in proptest::option::of(0u8..=7),
        ) {
            let text = match bit {
                Some(bit) => format!("{}/{}/{}", area, byte_offset, bit),
                None => format!("{}/{}", area, byte_offset),
            };
            let parsed = Address::parse(&text).unwrap();
            let rendered = parsed.to_string();
            prop_assert_eq!(Address::parse(&rendered).unwrap(), parsed);
            prop_assert_eq!(rendered, text.to_ascii_uppercase());
        }

        #[test]
        fn prop_bad_bit_offset_rejected(bit in 8u32..1000) {
            let text = format!("INPUTS/0/{}", bit);
            prop_assert!(Address::parse(&text).is_err());
        }
    }
}
