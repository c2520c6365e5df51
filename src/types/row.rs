use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::types::{
    FieldId, PAGE_SIZE,
    error::{DatabaseError, Result},
    value::{DataType, Value},
};

/// Fixed header of a row page: next, prev and row count.
pub const ROW_PAGE_HEADER_SIZE: usize = 12;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub values: Vec<Value>,
}

impl Row {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    pub fn get_value(&self, column_index: usize) -> Option<&Value> {
        self.values.get(column_index)
    }

    pub fn set_value(&mut self, column_index: usize, value: Value) -> Result<()> {
        if column_index >= self.values.len() {
            return Err(DatabaseError::ColumnIndexOutOfBounds {
                index: column_index,
            });
        }
        self.values[column_index] = value;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Encodes the row as `null bitmap | field_0 | ... | field_n`.
    pub fn encode(&self, meta: &RowMeta) -> Result<Vec<u8>> {
        meta.check_shape(self)?;
        let bitmap_size = meta.null_bitmap_size();
        let mut buffer = vec![0u8; meta.size()];
        let mut offset = bitmap_size;

        for (field_id, (field, value)) in meta.fields.iter().zip(&self.values).enumerate() {
            let width = field.width as usize;
            let slot = &mut buffer[offset..offset + width];
            match value {
                Value::Null => {}
                Value::Integer(i) => encode_int(*i, field_id, slot)?,
                Value::Float(f) => encode_float(*f, field_id, slot)?,
                Value::FixedChar(s) => encode_fixed_char(s, slot),
            }
            offset += width;
        }

        for (field_id, value) in self.values.iter().enumerate() {
            if value.is_null() {
                buffer[field_id / 8] |= 1 << (field_id % 8);
            }
        }

        Ok(buffer)
    }

    pub fn decode(meta: &RowMeta, bytes: &[u8]) -> Result<Row> {
        let values = (0..meta.fields.len())
            .map(|field_id| meta.decode_field(field_id, bytes))
            .collect::<Result<Vec<_>>>()?;
        Ok(Row::new(values))
    }
}

impl From<Vec<Value>> for Row {
    fn from(values: Vec<Value>) -> Self {
        Row::new(values)
    }
}

fn encode_int(value: i64, field_id: usize, slot: &mut [u8]) -> Result<()> {
    let width = slot.len();
    let out_of_range = || DatabaseError::ValueOutOfRange {
        field: field_id,
        width,
    };
    match width {
        1 => slot.copy_from_slice(&i8::try_from(value).map_err(|_| out_of_range())?.to_le_bytes()),
        2 => slot.copy_from_slice(&i16::try_from(value).map_err(|_| out_of_range())?.to_le_bytes()),
        4 => slot.copy_from_slice(&i32::try_from(value).map_err(|_| out_of_range())?.to_le_bytes()),
        8 => slot.copy_from_slice(&value.to_le_bytes()),
        _ => {
            return Err(DatabaseError::InvalidSchema {
                reason: format!("integer width {} is not 1, 2, 4 or 8", width),
            });
        }
    }
    Ok(())
}

fn encode_float(value: f64, field_id: usize, slot: &mut [u8]) -> Result<()> {
    match slot.len() {
        4 => {
            let narrowed = value as f32;
            if value.is_finite() && !narrowed.is_finite() {
                return Err(DatabaseError::ValueOutOfRange {
                    field: field_id,
                    width: 4,
                });
            }
            slot.copy_from_slice(&narrowed.to_le_bytes());
        }
        8 => slot.copy_from_slice(&value.to_le_bytes()),
        width => {
            return Err(DatabaseError::InvalidSchema {
                reason: format!("float width {} is not 4 or 8", width),
            });
        }
    }
    Ok(())
}

fn encode_fixed_char(value: &str, slot: &mut [u8]) {
    let mut len = value.len().min(slot.len());
    while !value.is_char_boundary(len) {
        len -= 1;
    }
    slot[..len].copy_from_slice(&value.as_bytes()[..len]);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMeta {
    pub data_type: DataType,
    pub width: u16,
    pub nullable: bool,
    pub unique: bool,
}

impl FieldMeta {
    pub fn new(data_type: DataType, width: u16) -> Self {
        Self {
            data_type,
            width,
            nullable: true,
            unique: false,
        }
    }

    pub fn int(width: u16) -> Self {
        Self::new(DataType::Int, width)
    }

    pub fn float(width: u16) -> Self {
        Self::new(DataType::Float, width)
    }

    pub fn fixed_char(width: u16) -> Self {
        Self::new(DataType::FixedChar, width)
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// NOT NULL and UNIQUE.
    pub fn primary_key(self) -> Self {
        self.not_null().unique()
    }

    pub fn without_unique(mut self) -> Self {
        self.unique = false;
        self
    }

    fn validate(&self, field_id: usize) -> Result<()> {
        let valid = match self.data_type {
            DataType::Int => matches!(self.width, 1 | 2 | 4 | 8),
            DataType::Float => matches!(self.width, 4 | 8),
            DataType::FixedChar => self.width > 0,
            DataType::VarChar => {
                return Err(DatabaseError::UnsupportedType(format!(
                    "field {} is VARCHAR; only fixed-width fields are stored",
                    field_id
                )));
            }
        };
        if !valid {
            return Err(DatabaseError::InvalidSchema {
                reason: format!(
                    "field {} has invalid width {} for {}",
                    field_id, self.width, self.data_type
                ),
            });
        }
        Ok(())
    }
}

/// Equality predicate on one field, also used to carry new values for updates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldValue {
    pub field_id: FieldId,
    pub value: Value,
}

impl FieldValue {
    pub fn new(field_id: FieldId, value: impl Into<Value>) -> Self {
        Self {
            field_id,
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowMeta {
    pub fields: Vec<FieldMeta>,
    pub cluster_field_id: FieldId,
}

impl RowMeta {
    pub fn new(fields: Vec<FieldMeta>, cluster_field_id: FieldId) -> Self {
        Self {
            fields,
            cluster_field_id,
        }
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    pub fn cluster_field(&self) -> &FieldMeta {
        &self.fields[self.cluster_field_id]
    }

    pub fn null_bitmap_size(&self) -> usize {
        self.fields.len().div_ceil(8)
    }

    /// Encoded size of every row under this schema.
    pub fn size(&self) -> usize {
        self.null_bitmap_size()
            + self
                .fields
                .iter()
                .map(|f| f.width as usize)
                .sum::<usize>()
    }

    /// Rows that fit in one data page.
    pub fn rows_per_page(&self) -> usize {
        (PAGE_SIZE - ROW_PAGE_HEADER_SIZE) / self.size().max(1)
    }

    pub fn validate(&self) -> Result<()> {
        if self.fields.is_empty() {
            return Err(DatabaseError::InvalidSchema {
                reason: "a table needs at least one field".to_string(),
            });
        }
        if self.cluster_field_id >= self.fields.len() {
            return Err(DatabaseError::InvalidSchema {
                reason: format!(
                    "cluster field {} out of range for {} fields",
                    self.cluster_field_id,
                    self.fields.len()
                ),
            });
        }
        for (field_id, field) in self.fields.iter().enumerate() {
            field.validate(field_id)?;
        }
        if self.rows_per_page() < 2 {
            return Err(DatabaseError::InvalidSchema {
                reason: format!("row size {} leaves room for fewer than two rows per page", self.size()),
            });
        }
        Ok(())
    }

    /// Checks arity and value types, not constraints.
    pub fn check_shape(&self, row: &Row) -> Result<()> {
        if row.len() != self.fields.len() {
            return Err(DatabaseError::ColumnCountMismatch {
                expected: self.fields.len(),
                actual: row.len(),
            });
        }
        for (field, value) in self.fields.iter().zip(&row.values) {
            if !value.matches_type(field.data_type) {
                return Err(DatabaseError::TypeMismatch {
                    expected: field.data_type.to_string(),
                    actual: value.type_name().to_string(),
                });
            }
        }
        Ok(())
    }

    fn field_offset(&self, field_id: FieldId) -> usize {
        self.null_bitmap_size()
            + self.fields[..field_id]
                .iter()
                .map(|f| f.width as usize)
                .sum::<usize>()
    }

    /// Decodes a single field out of an encoded row without decoding the rest.
    pub fn decode_field(&self, field_id: FieldId, bytes: &[u8]) -> Result<Value> {
        let field = self
            .fields
            .get(field_id)
            .ok_or(DatabaseError::ColumnIndexOutOfBounds { index: field_id })?;
        if bytes.len() < self.size() {
            return Err(DatabaseError::SerializationError {
                details: format!("row needs {} bytes, got {}", self.size(), bytes.len()),
            });
        }
        if bytes[field_id / 8] & (1 << (field_id % 8)) != 0 {
            return Ok(Value::Null);
        }

        let offset = self.field_offset(field_id);
        let slot = &bytes[offset..offset + field.width as usize];
        match field.data_type {
            DataType::Int => {
                let value = match slot.len() {
                    1 => i8::from_le_bytes([slot[0]]) as i64,
                    2 => i16::from_le_bytes([slot[0], slot[1]]) as i64,
                    4 => i32::from_le_bytes([slot[0], slot[1], slot[2], slot[3]]) as i64,
                    8 => {
                        let mut raw = [0u8; 8];
                        raw.copy_from_slice(slot);
                        i64::from_le_bytes(raw)
                    }
                    width => {
                        return Err(DatabaseError::InvalidSchema {
                            reason: format!("integer width {} is not 1, 2, 4 or 8", width),
                        });
                    }
                };
                Ok(Value::Integer(value))
            }
            DataType::Float => {
                let value = match slot.len() {
                    4 => f32::from_le_bytes([slot[0], slot[1], slot[2], slot[3]]) as f64,
                    8 => {
                        let mut raw = [0u8; 8];
                        raw.copy_from_slice(slot);
                        f64::from_le_bytes(raw)
                    }
                    width => {
                        return Err(DatabaseError::InvalidSchema {
                            reason: format!("float width {} is not 4 or 8", width),
                        });
                    }
                };
                Ok(Value::Float(value))
            }
            DataType::FixedChar => {
                let len = slot.iter().position(|b| *b == 0).unwrap_or(slot.len());
                let text = std::str::from_utf8(&slot[..len]).map_err(|e| {
                    DatabaseError::SerializationError {
                        details: format!("field {} is not valid UTF-8: {}", field_id, e),
                    }
                })?;
                Ok(Value::FixedChar(text.to_string()))
            }
            DataType::VarChar => panic!("VARCHAR field {} reached the fixed-width codec", field_id),
        }
    }

    /// Clustered value of an encoded row.
    pub fn decode_cluster_key(&self, bytes: &[u8]) -> Result<Value> {
        self.decode_field(self.cluster_field_id, bytes)
    }

    /// `value` as field `field_id` stores it: floats narrowed to the field's
    /// width, strings truncated. A value the field cannot hold is returned
    /// unchanged, so it matches nothing stored.
    pub fn normalize_field(&self, field_id: FieldId, value: &Value) -> Result<Value> {
        let field = self
            .fields
            .get(field_id)
            .ok_or(DatabaseError::ColumnIndexOutOfBounds { index: field_id })?;
        let single = RowMeta::new(vec![*field], 0);
        match Row::new(vec![value.clone()]).encode(&single) {
            Ok(bytes) => single.decode_field(0, &bytes),
            Err(DatabaseError::TypeMismatch { .. } | DatabaseError::ValueOutOfRange { .. }) => {
                Ok(value.clone())
            }
            Err(e) => Err(e),
        }
    }

    /// Filters with every value normalized to its field.
    pub fn normalize_filters(&self, filters: &[FieldValue]) -> Result<Vec<FieldValue>> {
        filters
            .iter()
            .map(|filter| {
                Ok(FieldValue {
                    field_id: filter.field_id,
                    value: self.normalize_field(filter.field_id, &filter.value)?,
                })
            })
            .collect()
    }

    /// True when every filter holds for `row`.
    pub fn matches_filters(&self, row: &Row, filters: &[FieldValue]) -> bool {
        filters.iter().all(|filter| {
            row.get_value(filter.field_id)
                .is_some_and(|value| value.compare(&filter.value) == Ordering::Equal)
        })
    }
}
