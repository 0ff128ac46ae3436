//! Element data types and decoded values.

use crate::error::ValueTypeError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Element type of a read or write item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataType {
    Bool,
    Byte,
    Word,
    DWord,
    Int,
    DInt,
    Real,
    LReal,
    String,
}

impl DataType {
    /// Size of one element on the device, `None` for variable-length types.
    pub fn size(&self) -> Option<usize> {
        match self {
            DataType::Bool | DataType::Byte => Some(1),
            DataType::Word | DataType::Int => Some(2),
            DataType::DWord | DataType::DInt | DataType::Real => Some(4),
            DataType::LReal => Some(8),
            DataType::String => None,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::Bool => "BOOL",
            DataType::Byte => "BYTE",
            DataType::Word => "WORD",
            DataType::DWord => "DWORD",
            DataType::Int => "INT",
            DataType::DInt => "DINT",
            DataType::Real => "REAL",
            DataType::LReal => "LREAL",
            DataType::String => "STRING",
        };
        f.write_str(name)
    }
}

/// A single decoded value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlcValue {
    Bool(bool),
    Byte(u8),
    Word(u16),
    DWord(u32),
    Int(i16),
    DInt(i32),
    Real(f32),
    LReal(f64),
    String(String),
}

impl PlcValue {
    pub fn data_type(&self) -> DataType {
        match self {
            PlcValue::Bool(_) => DataType::Bool,
            PlcValue::Byte(_) => DataType::Byte,
            PlcValue::Word(_) => DataType::Word,
            PlcValue::DWord(_) => DataType::DWord,
            PlcValue::Int(_) => DataType::Int,
            PlcValue::DInt(_) => DataType::DInt,
            PlcValue::Real(_) => DataType::Real,
            PlcValue::LReal(_) => DataType::LReal,
            PlcValue::String(_) => DataType::String,
        }
    }

    /// Converts the value into plain JSON, dropping the type tag.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            PlcValue::Bool(v) => (*v).into(),
            PlcValue::Byte(v) => (*v).into(),
            PlcValue::Word(v) => (*v).into(),
            PlcValue::DWord(v) => (*v).into(),
            PlcValue::Int(v) => (*v).into(),
            PlcValue::DInt(v) => (*v).into(),
            PlcValue::Real(v) => f64::from(*v).into(),
            PlcValue::LReal(v) => (*v).into(),
            PlcValue::String(v) => v.clone().into(),
        }
    }
}

impl fmt::Display for PlcValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlcValue::Bool(v) => write!(f, "{}", v),
            PlcValue::Byte(v) => write!(f, "{}", v),
            PlcValue::Word(v) => write!(f, "{}", v),
            PlcValue::DWord(v) => write!(f, "{}", v),
            PlcValue::Int(v) => write!(f, "{}", v),
            PlcValue::DInt(v) => write!(f, "{}", v),
            PlcValue::Real(v) => write!(f, "{}", v),
            PlcValue::LReal(v) => write!(f, "{}", v),
            PlcValue::String(v) => f.write_str(v),
        }
    }
}

/// A Rust type that maps to exactly one [`DataType`].
pub trait PlcType: Sized + Into<PlcValue> + TryFrom<PlcValue, Error = ValueTypeError> {
    const DATA_TYPE: DataType;

    /// Converts every value, failing on the first one of another type.
    fn from_values(values: Vec<PlcValue>) -> Result<Vec<Self>, ValueTypeError> {
        values.into_iter().map(Self::try_from).collect()
    }
}

macro_rules! plc_type {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl PlcType for $ty {
                const DATA_TYPE: DataType = DataType::$variant;
            }

            impl From<$ty> for PlcValue {
                fn from(value: $ty) -> Self {
                    PlcValue::$variant(value)
                }
            }

            impl TryFrom<PlcValue> for $ty {
                type Error = ValueTypeError;

                fn try_from(value: PlcValue) -> Result<Self, Self::Error> {
                    match value {
                        PlcValue::$variant(v) => Ok(v),
                        other => Err(ValueTypeError {
                            expected: DataType::$variant,
                            actual: other.data_type(),
                        }),
                    }
                }
            }
        )*
    };
}

plc_type! {
    bool => Bool,
    u8 => Byte,
    u16 => Word,
    u32 => DWord,
    i16 => Int,
    i32 => DInt,
    f32 => Real,
    f64 => LReal,
    String => String,
}

impl From<&str> for PlcValue {
    fn from(value: &str) -> Self {
        PlcValue::String(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_type_of_value() {
        assert_eq!(PlcValue::Byte(1).data_type(), DataType::Byte);
        assert_eq!(PlcValue::Real(1.5).data_type(), DataType::Real);
        assert_eq!(
            PlcValue::String("x".to_string()).data_type(),
            DataType::String
        );
    }

    #[test]
    fn test_data_type_size() {
        assert_eq!(DataType::Bool.size(), Some(1));
        assert_eq!(DataType::Word.size(), Some(2));
        assert_eq!(DataType::Real.size(), Some(4));
        assert_eq!(DataType::LReal.size(), Some(8));
        assert_eq!(DataType::String.size(), None);
    }

    #[test]
    fn test_value_serialization() {
        let json = serde_json::to_string(&PlcValue::Byte(7)).unwrap();
        assert_eq!(json, r#"{"type":"BYTE","value":7}"#);

        let parsed: PlcValue = serde_json::from_str(r#"{"type":"DINT","value":-5}"#).unwrap();
        assert_eq!(parsed, PlcValue::DInt(-5));
    }

    #[test]
    fn test_value_to_json() {
        assert_eq!(PlcValue::Byte(3).to_json(), serde_json::json!(3));
        assert_eq!(PlcValue::Bool(true).to_json(), serde_json::json!(true));
        assert_eq!(
            PlcValue::String("on".to_string()).to_json(),
            serde_json::json!("on")
        );
    }

    #[test]
    fn test_data_type_display() {
        assert_eq!(DataType::DWord.to_string(), "DWORD");
        assert_eq!(DataType::LReal.to_string(), "LREAL");
    }

    #[test]
    fn test_typed_conversions() {
        assert_eq!(PlcValue::from(12_i16), PlcValue::Int(12));
        assert_eq!(PlcValue::from("run"), PlcValue::String("run".to_string()));
        assert_eq!(i16::try_from(PlcValue::Int(-3)), Ok(-3));
        assert_eq!(u32::try_from(PlcValue::DWord(7)), Ok(7));
        assert_eq!(
            i16::try_from(PlcValue::DInt(3)),
            Err(ValueTypeError {
                expected: DataType::Int,
                actual: DataType::DInt,
            })
        );
        assert_eq!(<f64 as PlcType>::DATA_TYPE, DataType::LReal);
    }

    #[test]
    fn test_from_values_stops_on_mismatch() {
        let values = vec![PlcValue::Word(1), PlcValue::Word(2)];
        assert_eq!(u16::from_values(values), Ok(vec![1, 2]));

        let values = vec![PlcValue::Word(1), PlcValue::Bool(true)];
        let err = u16::from_values(values).unwrap_err();
        assert_eq!(err.actual, DataType::Bool);
    }
}
