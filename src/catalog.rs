use std::{
    collections::HashMap,
    path::Path,
    sync::{Arc, RwLock},
};

use log::info;

use crate::{
    error::{DbError, DbResult},
    storage::{
        heap::HeapTable,
        schema::{Field, Schema, Type},
    },
    types::{Pod, ResultPod},
    utils::HandyRwLock,
};

struct CatalogEntry {
    table: Pod<HeapTable>,
    name: String,
    primary_key: String,
}

/// The table registry: name and id both resolve to the backing heap
/// table. Built once at startup (or per test) and read-mostly after.
pub struct Catalog {
    tables: HashMap<u32, CatalogEntry>,

    name_index: HashMap<String, u32>,
}

impl Catalog {
    pub fn new() -> Self {
        Self {
            tables: HashMap::new(),
            name_index: HashMap::new(),
        }
    }

    /// Register a table. A table re-registered under an existing name
    /// replaces the old entry.
    pub fn add_table(&mut self, table_rc: Pod<HeapTable>, name: &str, primary_key: &str) {
        if let Some(old_id) = self.name_index.remove(name) {
            self.tables.remove(&old_id);
        }

        let id = table_rc.rl().get_id();
        self.name_index.insert(name.to_string(), id);
        self.tables.insert(
            id,
            CatalogEntry {
                table: table_rc,
                name: name.to_string(),
                primary_key: primary_key.to_string(),
            },
        );
    }

    pub fn get_table(&self, table_id: &u32) -> ResultPod<HeapTable> {
        self.tables
            .get(table_id)
            .map(|entry| entry.table.clone())
            .ok_or_else(|| DbError::NotFound(format!("no table with id {}", table_id)))
    }

    pub fn get_table_by_name(&self, name: &str) -> ResultPod<HeapTable> {
        let id = self
            .name_index
            .get(name)
            .ok_or_else(|| DbError::NotFound(format!("no table named {:?}", name)))?;
        self.get_table(id)
    }

    pub fn get_schema(&self, table_id: &u32) -> DbResult<Schema> {
        Ok(self.get_table(table_id)?.rl().get_schema())
    }

    pub fn get_table_name(&self, table_id: &u32) -> DbResult<String> {
        self.tables
            .get(table_id)
            .map(|entry| entry.name.clone())
            .ok_or_else(|| DbError::NotFound(format!("no table with id {}", table_id)))
    }

    pub fn get_primary_key(&self, table_id: &u32) -> DbResult<String> {
        self.tables
            .get(table_id)
            .map(|entry| entry.primary_key.clone())
            .ok_or_else(|| DbError::NotFound(format!("no table with id {}", table_id)))
    }

    pub fn table_ids(&self) -> Vec<u32> {
        self.tables.keys().cloned().collect()
    }

    /// Load a catalog description: one table per line,
    /// `name (col type [pk], ...)`, `type` one of `int` / `string`.
    /// The backing file for each table is created under `data_dir`.
    pub fn load_schema(&mut self, data_dir: &Path, description: &str) -> DbResult<Vec<u32>> {
        let mut loaded = Vec::new();

        for line in description.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let open = line.find('(').ok_or_else(|| {
                DbError::InvalidArgument(format!("malformed catalog line: {:?}", line))
            })?;
            let close = line.rfind(')').ok_or_else(|| {
                DbError::InvalidArgument(format!("malformed catalog line: {:?}", line))
            })?;

            let table_name = line[..open].trim().to_string();
            if table_name.is_empty() {
                return Err(DbError::InvalidArgument(format!(
                    "missing table name: {:?}",
                    line
                )));
            }

            let mut fields = Vec::new();
            let mut primary_key = String::new();
            for column in line[open + 1..close].split(',') {
                let parts: Vec<&str> = column.split_whitespace().collect();
                match parts.as_slice() {
                    [name, t] => fields.push(Field::new(name, Type::parse(t)?, false)),
                    [name, t, pk] if pk.eq_ignore_ascii_case("pk") => {
                        primary_key = name.to_string();
                        fields.push(Field::new(name, Type::parse(t)?, true));
                    }
                    _ => {
                        return Err(DbError::InvalidArgument(format!(
                            "malformed column: {:?}",
                            column
                        )))
                    }
                }
            }

            let schema = Schema::new(fields);
            let file_path = data_dir.join(format!("{}.dat", table_name));
            let table = HeapTable::new(&file_path, &table_name, &schema)?;
            let id = table.get_id();

            info!("loaded table {:?} with id {}", table_name, id);
            self.add_table(Arc::new(RwLock::new(table)), &table_name, &primary_key);
            loaded.push(id);
        }

        Ok(loaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::schema::DEFAULT_STRING_LEN;

    #[test]
    fn test_load_schema() {
        let dir = tempfile::tempdir().unwrap();
        let mut catalog = Catalog::new();

        let ids = catalog
            .load_schema(
                dir.path(),
                "users (id int pk, name string)\norders (id int pk, user_id int)\n",
            )
            .unwrap();
        assert_eq!(ids.len(), 2);

        let users = catalog.get_table_by_name("users").unwrap();
        let schema = catalog.get_schema(&users.rl().get_id()).unwrap();
        assert_eq!(schema.field_count(), 2);
        assert_eq!(schema.get_field(0).unwrap().t, Type::Int);
        assert_eq!(
            schema.get_field(1).unwrap().t,
            Type::String(DEFAULT_STRING_LEN)
        );
        assert_eq!(catalog.get_primary_key(&ids[0]).unwrap(), "id");
    }

    #[test]
    fn test_malformed_line_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut catalog = Catalog::new();

        assert!(catalog.load_schema(dir.path(), "users id int").is_err());
        assert!(catalog
            .load_schema(dir.path(), "users (id uuid)")
            .is_err());
    }

    #[test]
    fn test_reregistration_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let mut catalog = Catalog::new();

        catalog
            .load_schema(dir.path(), "t (a int pk)")
            .unwrap();
        let first = catalog.get_table_by_name("t").unwrap().rl().get_id();

        catalog
            .load_schema(dir.path(), "t (a int pk, b int)")
            .unwrap();
        let table = catalog.get_table_by_name("t").unwrap();
        assert_eq!(table.rl().get_schema().field_count(), 2);
        assert_eq!(table.rl().get_id(), first);
    }
}
