use std::{
    fmt,
    hash::{Hash, Hasher},
    io::Read,
};

use crate::{
    error::{DbError, DbResult},
    io::read_exact,
    storage::{
        heap::RecordId,
        schema::{Schema, Type, STRING_LEN_BYTES},
    },
};

/// A single typed value. `Null` carries no data; the aggregator uses it
/// as the key for the "no grouping" bucket.
#[derive(Debug, Clone)]
pub enum Cell {
    Null,
    Int(i32),
    String(String),
}

impl Cell {
    pub fn get_int(&self) -> DbResult<i32> {
        match self {
            Cell::Int(v) => Ok(*v),
            _ => Err(DbError::InvalidArgument(format!(
                "expect an int cell, got {:?}",
                self
            ))),
        }
    }

    pub fn get_string(&self) -> DbResult<String> {
        match self {
            Cell::String(v) => Ok(v.clone()),
            _ => Err(DbError::InvalidArgument(format!(
                "expect a string cell, got {:?}",
                self
            ))),
        }
    }

    pub fn matches_type(&self, t: &Type) -> bool {
        match (self, t) {
            (Cell::Int(_), Type::Int) => true,
            (Cell::String(s), Type::String(capacity)) => s.len() <= *capacity,
            _ => false,
        }
    }

    /// On-disk image of this cell under the given type.
    ///
    /// Ints are 4-byte big-endian two's complement; strings are a 4-byte
    /// length followed by the payload padded to the declared capacity.
    pub fn to_bytes(&self, t: &Type) -> Vec<u8> {
        match (self, t) {
            (Cell::Int(v), Type::Int) => v.to_be_bytes().to_vec(),
            (Cell::String(s), Type::String(capacity)) => {
                let mut buf = Vec::with_capacity(STRING_LEN_BYTES + capacity);
                buf.extend_from_slice(&(s.len() as u32).to_be_bytes());
                buf.extend_from_slice(s.as_bytes());
                buf.resize(STRING_LEN_BYTES + capacity, 0);
                buf
            }
            _ => panic!("cell {:?} does not conform to type {:?}", self, t),
        }
    }

    pub fn read_from<R: Read>(reader: &mut R, t: &Type) -> Self {
        match t {
            Type::Int => {
                let mut buf = [0u8; 4];
                buf.copy_from_slice(&read_exact(reader, 4));
                Cell::Int(i32::from_be_bytes(buf))
            }
            Type::String(capacity) => {
                let mut len_buf = [0u8; STRING_LEN_BYTES];
                len_buf.copy_from_slice(&read_exact(reader, STRING_LEN_BYTES));
                let len = (u32::from_be_bytes(len_buf) as usize).min(*capacity);

                let payload = read_exact(reader, *capacity);
                let s = String::from_utf8_lossy(&payload[..len]).into_owned();
                Cell::String(s)
            }
        }
    }
}

impl PartialEq for Cell {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Cell::Null, Cell::Null) => true,
            (Cell::Int(a), Cell::Int(b)) => a == b,
            (Cell::String(a), Cell::String(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Cell {}

impl PartialOrd for Cell {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        match (self, other) {
            (Cell::Int(a), Cell::Int(b)) => a.partial_cmp(b),
            (Cell::String(a), Cell::String(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

impl Hash for Cell {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Cell::Null => 0u8.hash(state),
            Cell::Int(v) => {
                1u8.hash(state);
                v.hash(state);
            }
            Cell::String(v) => {
                2u8.hash(state);
                v.hash(state);
            }
        }
    }
}

/// A fixed-arity row. Owned by whoever reads it; the record id is set
/// while the tuple lives in a page and cleared when it leaves one.
#[derive(Clone)]
pub struct Tuple {
    cells: Vec<Cell>,
    rid: Option<RecordId>,
}

impl Tuple {
    pub fn new(cells: Vec<Cell>) -> Self {
        Self { cells, rid: None }
    }

    pub fn read_from<R: Read>(reader: &mut R, schema: &Schema) -> Self {
        let cells = schema
            .fields()
            .iter()
            .map(|f| Cell::read_from(reader, &f.t))
            .collect();
        Tuple { cells, rid: None }
    }

    /// Build the on-disk image. Callers validate conformance before a
    /// tuple reaches a page, so a mismatch here is a programming error.
    pub fn to_bytes(&self, schema: &Schema) -> Vec<u8> {
        let mut buf = Vec::with_capacity(schema.get_size());
        for (cell, field) in self.cells.iter().zip(schema.fields()) {
            buf.extend_from_slice(&cell.to_bytes(&field.t));
        }
        buf
    }

    pub fn conforms_to(&self, schema: &Schema) -> bool {
        self.cells.len() == schema.field_count()
            && self
                .cells
                .iter()
                .zip(schema.fields())
                .all(|(c, f)| c.matches_type(&f.t))
    }

    pub fn get_cell(&self, i: usize) -> Cell {
        self.cells[i].clone()
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn rid(&self) -> Option<RecordId> {
        self.rid
    }

    pub fn set_rid(&mut self, rid: Option<RecordId>) {
        self.rid = rid;
    }

    pub fn from_ints(values: &[i32]) -> Self {
        Tuple::new(values.iter().map(|v| Cell::Int(*v)).collect())
    }
}

impl PartialEq for Tuple {
    fn eq(&self, other: &Self) -> bool {
        self.cells == other.cells
    }
}

impl Eq for Tuple {}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut content: String = "{".to_owned();
        for cell in &self.cells {
            content.push_str(&format!("{:?}, ", cell));
        }
        if !self.cells.is_empty() {
            content.truncate(content.len() - 2);
        }
        content.push('}');
        write!(f, "{}", content)
    }
}

impl fmt::Debug for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::storage::schema::Field;

    #[test]
    fn test_int_round_trip() {
        let schema = crate::storage::schema::small_int_schema(3, "t");
        let tuple = Tuple::from_ints(&[-7, 0, i32::MAX]);

        let bytes = tuple.to_bytes(&schema);
        assert_eq!(bytes.len(), schema.get_size());

        let decoded = Tuple::read_from(&mut Cursor::new(bytes), &schema);
        assert_eq!(decoded, tuple);
    }

    #[test]
    fn test_string_round_trip_pads() {
        let schema = Schema::new(vec![
            Field::new("id", Type::Int, true),
            Field::new("name", Type::String(8), false),
        ]);
        let tuple = Tuple::new(vec![Cell::Int(1), Cell::String("ada".to_string())]);

        let bytes = tuple.to_bytes(&schema);
        assert_eq!(bytes.len(), 4 + 4 + 8);

        let decoded = Tuple::read_from(&mut Cursor::new(bytes), &schema);
        assert_eq!(decoded.get_cell(1), Cell::String("ada".to_string()));
    }

    #[test]
    fn test_conforms_to() {
        let schema = Schema::new(vec![
            Field::new("id", Type::Int, true),
            Field::new("name", Type::String(4), false),
        ]);

        let good = Tuple::new(vec![Cell::Int(1), Cell::String("ab".to_string())]);
        assert!(good.conforms_to(&schema));

        let wrong_arity = Tuple::from_ints(&[1]);
        assert!(!wrong_arity.conforms_to(&schema));

        let too_long = Tuple::new(vec![Cell::Int(1), Cell::String("abcdef".to_string())]);
        assert!(!too_long.conforms_to(&schema));
    }
}
