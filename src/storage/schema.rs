use std::fmt;

use itertools::Itertools;

use crate::error::{DbError, DbResult};

/// Width of the length prefix in front of an encoded string field.
pub const STRING_LEN_BYTES: usize = 4;

/// Default capacity of a string field when the catalog does not say
/// otherwise.
pub const DEFAULT_STRING_LEN: usize = 32;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Type {
    Int,
    /// Fixed-width string; the payload is padded to the declared capacity
    /// on disk.
    String(usize),
}

impl Type {
    /// Size on disk, in bytes.
    pub fn get_len(&self) -> usize {
        match self {
            Type::Int => 4,
            Type::String(capacity) => STRING_LEN_BYTES + capacity,
        }
    }

    pub fn parse(s: &str) -> DbResult<Self> {
        match s {
            "int" => Ok(Type::Int),
            "string" => Ok(Type::String(DEFAULT_STRING_LEN)),
            _ => Err(DbError::InvalidArgument(format!("unknown type: {}", s))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Field {
    pub name: String,
    pub t: Type,
    pub is_primary: bool,
}

impl Field {
    pub fn new(name: &str, t: Type, is_primary: bool) -> Self {
        Self {
            name: name.to_string(),
            t,
            is_primary,
        }
    }

}

impl PartialEq for Field {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.t == other.t
    }
}

impl Eq for Field {}

/// The tuple descriptor: an ordered list of typed, optionally named
/// fields. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    fields: Vec<Field>,
}

impl Schema {
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    /// Concatenation of two descriptors, left fields first.
    pub fn merge(left: &Schema, right: &Schema) -> Schema {
        let mut fields = left.fields.clone();
        fields.extend(right.fields.iter().cloned());
        Schema { fields }
    }

    /// Tuple size on disk, in bytes.
    pub fn get_size(&self) -> usize {
        self.fields.iter().map(|f| f.t.get_len()).sum()
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    pub fn get_field(&self, i: usize) -> DbResult<&Field> {
        self.fields
            .get(i)
            .ok_or_else(|| DbError::NotFound(format!("field index {} out of range", i)))
    }

    pub fn get_field_pos(&self, name: &str) -> DbResult<usize> {
        self.fields
            .iter()
            .position(|f| f.name == name)
            .ok_or_else(|| DbError::NotFound(format!("no field named {:?}", name)))
    }

    /// Layout compatibility: same types at every index, names ignored.
    pub fn same_types(&self, other: &Schema) -> bool {
        self.fields.len() == other.fields.len()
            && self
                .fields
                .iter()
                .zip(other.fields.iter())
                .all(|(a, b)| a.t == b.t)
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "({})",
            self.fields
                .iter()
                .map(|field| format!("{} {:?}", field.name, field.t))
                .join(", ")
        )
    }
}

pub fn small_int_schema(width: usize, name_prefix: &str) -> Schema {
    let fields = (0..width)
        .map(|i| Field::new(&format!("{}-{}", name_prefix, i), Type::Int, i == 0))
        .collect();
    Schema::new(fields)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_size() {
        let schema = Schema::new(vec![
            Field::new("id", Type::Int, true),
            Field::new("name", Type::String(16), false),
        ]);
        assert_eq!(schema.get_size(), 4 + 4 + 16);
    }

    #[test]
    fn test_merge_keeps_order() {
        let left = small_int_schema(2, "l");
        let right = small_int_schema(3, "r");
        let merged = Schema::merge(&left, &right);
        assert_eq!(merged.field_count(), 5);
        assert_eq!(merged.get_field(0).unwrap().name, "l-0");
        assert_eq!(merged.get_field(2).unwrap().name, "r-0");
    }

    #[test]
    fn test_same_types_ignores_names() {
        let a = small_int_schema(2, "a");
        let b = small_int_schema(2, "b");
        assert!(a != b);
        assert!(a.same_types(&b));
    }

    #[test]
    fn test_field_pos() {
        let schema = small_int_schema(3, "f");
        assert_eq!(schema.get_field_pos("f-2").unwrap(), 2);
        assert!(schema.get_field_pos("missing").is_err());
    }
}
