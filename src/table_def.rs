//! Strongly typed table definitions and `CREATE TABLE` generation.
//!
//! A [`TableDef`] is validated once, when it is built or loaded, and is
//! immutable afterwards. Definitions can be written in YAML:
//!
//! ```yaml
//! name: orders
//! if_not_exists: true
//! columns:
//!   - { name: id, data_type: integer, primary_key: true }
//!   - { name: customer, data_type: { varchar: 40 }, not_null: true }
//! foreign_keys:
//!   - { columns: [customer], ref_table: customers, ref_columns: [name] }
//! ```

use std::{collections::HashSet, fmt, fs::File, io::BufReader, path::Path};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Integer,
    BigInt,
    Float,
    Double,
    Boolean,
    Varchar(u32),
    Date,
    DateTime,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Integer => f.write_str("INTEGER"),
            DataType::BigInt => f.write_str("BIGINT"),
            DataType::Float => f.write_str("FLOAT"),
            DataType::Double => f.write_str("DOUBLE"),
            DataType::Boolean => f.write_str("BOOLEAN"),
            DataType::Varchar(size) => write!(f, "VARCHAR({size})"),
            DataType::Date => f.write_str("DATE"),
            DataType::DateTime => f.write_str("DATETIME"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    pub data_type: DataType,
    #[serde(default)]
    pub primary_key: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub not_null: bool,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            primary_key: false,
            unique: false,
            not_null: false,
        }
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKey {
    pub columns: Vec<String>,
    pub ref_table: String,
    pub ref_columns: Vec<String>,
}

/// Raw, unvalidated shape of a definition as written by a user.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TableDefSpec {
    pub name: String,
    #[serde(default)]
    pub if_not_exists: bool,
    #[serde(default)]
    pub columns: Vec<ColumnDef>,
    #[serde(default)]
    pub foreign_keys: Vec<ForeignKey>,
    #[serde(default)]
    pub primary_key: Vec<String>,
    #[serde(default)]
    pub unique: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "TableDefSpec", into = "TableDefSpec")]
pub struct TableDef {
    name: String,
    if_not_exists: bool,
    columns: Vec<ColumnDef>,
    foreign_keys: Vec<ForeignKey>,
    primary_key: Vec<String>,
    unique: Vec<String>,
}

impl TryFrom<TableDefSpec> for TableDef {
    type Error = Error;

    fn try_from(spec: TableDefSpec) -> Result<Self> {
        validate(&spec)?;
        Ok(Self {
            name: spec.name,
            if_not_exists: spec.if_not_exists,
            columns: spec.columns,
            foreign_keys: spec.foreign_keys,
            primary_key: spec.primary_key,
            unique: spec.unique,
        })
    }
}

impl From<TableDef> for TableDefSpec {
    fn from(def: TableDef) -> Self {
        Self {
            name: def.name,
            if_not_exists: def.if_not_exists,
            columns: def.columns,
            foreign_keys: def.foreign_keys,
            primary_key: def.primary_key,
            unique: def.unique,
        }
    }
}

fn validate(spec: &TableDefSpec) -> Result<()> {
    let invalid = |msg: String| Err(Error::Definition(msg));
    if spec.name.trim().is_empty() {
        return invalid("table name cannot be empty".to_string());
    }
    let mut seen = HashSet::new();
    for column in &spec.columns {
        if column.name.trim().is_empty() {
            return invalid(format!("column name cannot be empty in table {}", spec.name));
        }
        if !seen.insert(column.name.as_str()) {
            return invalid(format!("duplicate column {}", column.name));
        }
        if column.primary_key && column.unique {
            return invalid(format!(
                "Col {} specified as both PK and Uniq",
                column.name
            ));
        }
    }
    for fk in &spec.foreign_keys {
        if fk.columns.len() != fk.ref_columns.len() {
            return invalid(format!(
                "Length mismatch {:?} vs {:?}",
                fk.columns, fk.ref_columns
            ));
        }
        if fk.columns.is_empty() || fk.ref_table.trim().is_empty() {
            return invalid("foreign key needs columns and a referenced table".to_string());
        }
    }
    if let Some(missing) = spec
        .primary_key
        .iter()
        .chain(&spec.unique)
        .chain(spec.foreign_keys.iter().flat_map(|fk| &fk.columns))
        .find(|name| !seen.contains(name.as_str()))
    {
        return invalid(format!("constraint references unknown column {missing}"));
    }
    Ok(())
}

impl TableDef {
    pub fn builder(name: impl Into<String>) -> TableDefBuilder {
        TableDefBuilder {
            spec: TableDefSpec {
                name: name.into(),
                ..TableDefSpec::default()
            },
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        serde_yaml::from_reader(BufReader::new(file))
            .map_err(|err| Error::Definition(format!("{}: {err}", path.display())))
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        serde_yaml::from_str(text).map_err(|err| Error::Definition(err.to_string()))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    pub fn foreign_keys(&self) -> &[ForeignKey] {
        &self.foreign_keys
    }

    /// Renders the definition as a `CREATE TABLE` statement.
    pub fn create_statement(&self) -> String {
        let mut clauses = Vec::new();
        for column in &self.columns {
            let mut clause = format!("{} {}", column.name, column.data_type);
            if column.primary_key {
                clause.push_str(" PRIMARY KEY");
            } else if column.unique {
                clause.push_str(" UNIQUE");
            }
            if column.not_null {
                clause.push_str(" NOT NULL");
            }
            clauses.push(clause);
        }
        for fk in &self.foreign_keys {
            clauses.push(format!(
                "FOREIGN KEY({}) REFERENCES {}({})",
                fk.columns.join(", "),
                fk.ref_table,
                fk.ref_columns.join(", ")
            ));
        }
        if !self.primary_key.is_empty() {
            clauses.push(format!("PRIMARY KEY ({})", self.primary_key.join(", ")));
        }
        if !self.unique.is_empty() {
            clauses.push(format!("UNIQUE ({})", self.unique.join(", ")));
        }
        let create = if self.if_not_exists {
            "CREATE TABLE IF NOT EXISTS"
        } else {
            "CREATE TABLE"
        };
        format!("{create} {}(\n{}\n);", self.name, clauses.join(",\n"))
    }
}

#[derive(Debug, Clone)]
pub struct TableDefBuilder {
    spec: TableDefSpec,
}

impl TableDefBuilder {
    pub fn if_not_exists(mut self) -> Self {
        self.spec.if_not_exists = true;
        self
    }

    pub fn column(mut self, column: ColumnDef) -> Self {
        self.spec.columns.push(column);
        self
    }

    pub fn foreign_key(
        mut self,
        columns: &[&str],
        ref_table: impl Into<String>,
        ref_columns: &[&str],
    ) -> Self {
        self.spec.foreign_keys.push(ForeignKey {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            ref_table: ref_table.into(),
            ref_columns: ref_columns.iter().map(|c| c.to_string()).collect(),
        });
        self
    }

    pub fn primary_key(mut self, columns: &[&str]) -> Self {
        self.spec.primary_key = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn unique(mut self, columns: &[&str]) -> Self {
        self.spec.unique = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn build(self) -> Result<TableDef> {
        TableDef::try_from(self.spec)
    }
}
