use std::{cmp::Ordering, fmt};

use serde::{Deserialize, Serialize};

use crate::{types::error::DatabaseError, utils::hash::hash_string};

/// On-disk field type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum DataType {
    Int = 0,
    Float = 1,
    FixedChar = 2,
    VarChar = 3,
}

impl DataType {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(code: u8) -> Result<Self, DatabaseError> {
        match code {
            0 => Ok(DataType::Int),
            1 => Ok(DataType::Float),
            2 => Ok(DataType::FixedChar),
            3 => Ok(DataType::VarChar),
            other => Err(DatabaseError::SerializationError {
                details: format!("unknown data type code {}", other),
            }),
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Int => write!(f, "INT"),
            DataType::Float => write!(f, "FLOAT"),
            DataType::FixedChar => write!(f, "CHAR"),
            DataType::VarChar => write!(f, "VARCHAR"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Integer(i64),
    Float(f64),
    FixedChar(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Integer(_) => "INT",
            Value::Float(_) => "FLOAT",
            Value::FixedChar(_) => "CHAR",
        }
    }

    pub fn matches_type(&self, data_type: DataType) -> bool {
        matches!(
            (self, data_type),
            (Value::Null, _)
                | (Value::Integer(_), DataType::Int)
                | (Value::Float(_), DataType::Float)
                | (Value::FixedChar(_), DataType::FixedChar)
        )
    }

    /// 64-bit key under which this value is stored in a B+tree. The mapping is
    /// monotone with `compare` for every type except strings, which are only
    /// grouped by hash. Null has no key.
    pub fn index_key(&self) -> Option<i64> {
        match self {
            Value::Null => None,
            Value::Integer(i) => Some(*i),
            Value::Float(f) => Some(float_key(*f)),
            Value::FixedChar(s) => Some(hash_string(s)),
        }
    }

    /// Total order used for row placement: nulls first, then by type-specific
    /// order. Strings order by `(hash, text)` so that heap order agrees with
    /// index key order.
    pub fn compare(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Null, _) => Ordering::Less,
            (_, Value::Null) => Ordering::Greater,
            (Value::Integer(a), Value::Integer(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => a.total_cmp(b),
            (Value::FixedChar(a), Value::FixedChar(b)) => {
                let a = a.trim_end_matches('\0');
                let b = b.trim_end_matches('\0');
                (hash_string(a), a).cmp(&(hash_string(b), b))
            }
            _ => self.rank().cmp(&other.rank()),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Integer(_) => 1,
            Value::Float(_) => 2,
            Value::FixedChar(_) => 3,
        }
    }
}

/// Same bit transform `f64::total_cmp` uses, so the integer order of keys
/// matches the float order.
fn float_key(f: f64) -> i64 {
    let bits = f.to_bits() as i64;
    bits ^ ((((bits >> 63) as u64) >> 1) as i64)
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.compare(other))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::FixedChar(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::FixedChar(value.to_string())
    }
}
