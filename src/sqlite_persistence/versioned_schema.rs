use anyhow::{bail, Context, Result};
use rusqlite::{params, Connection};
use std::path::Path;
use tracing::info;

pub const BASE_DB_VERSION: usize = 99999;

#[macro_export]
macro_rules! sqlite_column {
    ($name:expr, $sql_type:expr $(, $field:ident = $value:expr)*) => {
        {
            // Only mutated when optional field assignments are passed
            #[allow(unused_mut)]
            let mut column = Column {
                name: $name,
                sql_type: $sql_type,
                is_primary_key: false,
                non_null: false,
                default_value: None,
            };
            $(
                column.$field = $value;
            )*
            column
        }
    };
}

#[derive(Debug, PartialEq, Eq)]
pub enum SqlType {
    Text,
    Integer,
    Real,
}

impl SqlType {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SqlType::Text => "TEXT",
            SqlType::Integer => "INTEGER",
            SqlType::Real => "REAL",
        }
    }

    fn parse(s: &str) -> Option<&'static SqlType> {
        match s.to_ascii_uppercase().as_str() {
            "TEXT" => Some(&SqlType::Text),
            "INTEGER" => Some(&SqlType::Integer),
            "REAL" => Some(&SqlType::Real),
            _ => None,
        }
    }
}

pub struct Column {
    pub name: &'static str,
    pub sql_type: &'static SqlType,
    pub is_primary_key: bool,
    pub non_null: bool,
    pub default_value: Option<&'static str>,
}

impl Column {
    fn definition(&self) -> String {
        let mut sql = format!("{} {}", self.name, self.sql_type.as_sql());
        if self.is_primary_key {
            sql.push_str(" PRIMARY KEY");
        }
        if self.non_null {
            sql.push_str(" NOT NULL");
        }
        if let Some(default_value) = self.default_value {
            sql.push_str(&format!(" DEFAULT {}", default_value));
        }
        sql
    }
}

pub struct Table {
    pub name: &'static str,
    pub columns: &'static [Column],
    pub indices: &'static [(&'static str, &'static str)],
    /// Columns added at runtime (e.g. enrichment columns) are tolerated
    /// after the declared ones when set.
    pub allows_added_columns: bool,
}

impl Table {
    pub fn create_sql(&self) -> String {
        let columns = self
            .columns
            .iter()
            .map(Column::definition)
            .collect::<Vec<_>>()
            .join(", ");
        format!("CREATE TABLE {} ({});", self.name, columns)
    }

    pub fn create(&self, conn: &Connection) -> Result<()> {
        conn.execute(&self.create_sql(), params![])
            .with_context(|| format!("Failed to create table {}", self.name))?;
        for (index_name, columns) in self.indices {
            conn.execute(
                &format!("CREATE INDEX {} ON {}({});", index_name, self.name, columns),
                params![],
            )?;
        }
        Ok(())
    }

    pub fn validate(&self, conn: &Connection) -> Result<()> {
        let mut stmt = conn.prepare(&format!("PRAGMA table_info({});", self.name))?;
        let actual: Vec<(String, String, bool, bool)> = stmt
            .query_map(params![], |row| {
                Ok((
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i32>(3)? == 1,
                    row.get::<_, i32>(5)? >= 1,
                ))
            })?
            .collect::<rusqlite::Result<_>>()?;

        if actual.is_empty() {
            bail!("Table {} does not exist", self.name);
        }
        if actual.len() < self.columns.len()
            || (actual.len() > self.columns.len() && !self.allows_added_columns)
        {
            bail!(
                "Table {} has {} columns, expected {}. Found: {}",
                self.name,
                actual.len(),
                self.columns.len(),
                actual
                    .iter()
                    .map(|(name, ..)| name.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }

        for (expected, (name, sql_type, non_null, is_pk)) in self.columns.iter().zip(&actual) {
            if expected.name != name {
                bail!(
                    "Table {} column name mismatch: expected {}, got {}",
                    self.name,
                    expected.name,
                    name
                );
            }
            if SqlType::parse(sql_type) != Some(expected.sql_type) {
                bail!(
                    "Table {} column {} type mismatch: expected {:?}, got {}",
                    self.name,
                    expected.name,
                    expected.sql_type,
                    sql_type
                );
            }
            if *non_null != expected.non_null {
                bail!(
                    "Table {} column {} non-null mismatch: expected {}, got {}",
                    self.name,
                    expected.name,
                    expected.non_null,
                    non_null
                );
            }
            if *is_pk != expected.is_primary_key {
                bail!(
                    "Table {} column {} primary key mismatch: expected {}, got {}",
                    self.name,
                    expected.name,
                    expected.is_primary_key,
                    is_pk
                );
            }
        }

        for (index_name, _) in self.indices {
            let exists: bool = conn
                .query_row(
                    "SELECT 1 FROM sqlite_master WHERE type='index' AND name=?1 AND tbl_name=?2",
                    params![index_name, self.name],
                    |_| Ok(true),
                )
                .unwrap_or(false);
            if !exists {
                bail!("Table {} is missing index '{}'", self.name, index_name);
            }
        }
        Ok(())
    }
}

pub struct VersionedSchema {
    pub version: usize,
    pub tables: &'static [Table],
    pub migration: Option<fn(&Connection) -> Result<()>>,
}

impl VersionedSchema {
    pub fn create(&self, conn: &Connection) -> Result<()> {
        for table in self.tables {
            table.create(conn)?;
        }
        conn.pragma_update(None, "user_version", BASE_DB_VERSION + self.version)?;
        Ok(())
    }

    pub fn validate(&self, conn: &Connection) -> Result<()> {
        for table in self.tables {
            table.validate(conn)?;
        }
        Ok(())
    }
}

/// Opens (or creates) a database governed by `schemas`, migrating it to the
/// latest version and switching it to WAL mode.
///
/// `schemas` must be ordered by version, the last entry being the latest.
pub fn open_versioned<P: AsRef<Path>>(
    db_path: P,
    schemas: &[VersionedSchema],
    label: &str,
) -> Result<Connection> {
    let path = db_path.as_ref();
    let mut conn = Connection::open(path)
        .with_context(|| format!("Failed to open {} database at {:?}", label, path))?;

    let Some(latest) = schemas.last() else {
        bail!("No schema declared for {} database", label);
    };

    let table_count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
        [],
        |r| r.get(0),
    )?;

    if table_count == 0 {
        info!("Creating {} database schema at version {}", label, latest.version);
        latest.create(&conn)?;
    } else {
        let raw_version: i64 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;
        let db_version = raw_version - BASE_DB_VERSION as i64;
        let current = schemas
            .iter()
            .position(|s| s.version as i64 == db_version)
            .with_context(|| format!("Unknown {} database version {}", label, db_version))?;

        schemas[current].validate(&conn).with_context(|| {
            format!("{} database schema validation failed for version {}", label, db_version)
        })?;

        if current + 1 < schemas.len() {
            let tx = conn.transaction()?;
            for schema in &schemas[current + 1..] {
                info!("Migrating {} database to version {}", label, schema.version);
                if let Some(migration) = schema.migration {
                    migration(&tx).with_context(|| {
                        format!("Failed to migrate {} database to version {}", label, schema.version)
                    })?;
                }
            }
            tx.pragma_update(None, "user_version", BASE_DB_VERSION + latest.version)?;
            tx.commit()?;
        }
    }

    conn.pragma_update(None, "journal_mode", "WAL")
        .with_context(|| format!("Failed to set WAL mode on {} database", label))?;
    Ok(conn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite_column;
    use tempfile::TempDir;

    const PEOPLE_TABLE: Table = Table {
        name: "people",
        columns: &[
            sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
            sqlite_column!("name", &SqlType::Text, non_null = true),
        ],
        indices: &[("idx_people_name", "name")],
        allows_added_columns: false,
    };

    const OPEN_TABLE: Table = Table {
        name: "people",
        columns: &[
            sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
            sqlite_column!("name", &SqlType::Text, non_null = true),
        ],
        indices: &[],
        allows_added_columns: true,
    };

    fn add_mood_column(conn: &Connection) -> Result<()> {
        conn.execute("ALTER TABLE people ADD COLUMN mood TEXT", [])?;
        Ok(())
    }

    #[test]
    fn test_create_then_validate() {
        let conn = Connection::open_in_memory().unwrap();
        PEOPLE_TABLE.create(&conn).unwrap();
        PEOPLE_TABLE.validate(&conn).unwrap();
    }

    #[test]
    fn test_validate_detects_missing_index() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute(
            "CREATE TABLE people (id INTEGER PRIMARY KEY, name TEXT NOT NULL)",
            [],
        )
        .unwrap();

        let err = PEOPLE_TABLE.validate(&conn).unwrap_err().to_string();
        assert!(err.contains("missing index"));
        assert!(err.contains("idx_people_name"));
    }

    #[test]
    fn test_validate_detects_type_mismatch() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute(
            "CREATE TABLE people (id INTEGER PRIMARY KEY, name REAL NOT NULL)",
            [],
        )
        .unwrap();

        let err = OPEN_TABLE.validate(&conn).unwrap_err().to_string();
        assert!(err.contains("type mismatch"));
    }

    #[test]
    fn test_added_columns_only_tolerated_when_allowed() {
        let conn = Connection::open_in_memory().unwrap();
        OPEN_TABLE.create(&conn).unwrap();
        add_mood_column(&conn).unwrap();

        OPEN_TABLE.validate(&conn).unwrap();
        let err = Table {
            indices: &[],
            ..PEOPLE_TABLE
        }
        .validate(&conn)
        .unwrap_err()
        .to_string();
        assert!(err.contains("has 3 columns, expected 2"));
    }

    #[test]
    fn test_open_versioned_creates_and_migrates() {
        const V0: &[VersionedSchema] = &[VersionedSchema {
            version: 0,
            tables: &[OPEN_TABLE],
            migration: None,
        }];
        const V1: &[VersionedSchema] = &[
            VersionedSchema {
                version: 0,
                tables: &[OPEN_TABLE],
                migration: None,
            },
            VersionedSchema {
                version: 1,
                tables: &[OPEN_TABLE],
                migration: Some(add_mood_column),
            },
        ];

        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("test.db");

        drop(open_versioned(&path, V0, "test").unwrap());
        let conn = open_versioned(&path, V1, "test").unwrap();

        let version: i64 = conn
            .query_row("PRAGMA user_version", [], |r| r.get(0))
            .unwrap();
        assert_eq!(version, (BASE_DB_VERSION + 1) as i64);

        let has_mood: bool = conn
            .query_row(
                "SELECT COUNT(*) FROM pragma_table_info('people') WHERE name = 'mood'",
                [],
                |r| r.get::<_, i64>(0),
            )
            .unwrap()
            == 1;
        assert!(has_mood);
    }
}
