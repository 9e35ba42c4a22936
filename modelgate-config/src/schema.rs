//! Column schemas for transform steps.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Scalar type of a schema column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ColumnType {
    String,
    Integer,
    Double,
}

/// One named, typed column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub column_type: ColumnType,
}

/// Ordered sequence of named columns describing a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    columns: Vec<Column>,
}

impl Schema {
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    pub fn column_type(&self, name: &str) -> Option<ColumnType> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.column_type)
    }

    pub(crate) fn into_columns(self) -> Vec<Column> {
        self.columns
    }

    pub(crate) fn from_columns(columns: Vec<Column>) -> Self {
        Self { columns }
    }
}

/// Fluent builder for [`Schema`].
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    columns: Vec<Column>,
}

impl SchemaBuilder {
    pub fn string_column(self, name: impl Into<String>) -> Self {
        self.column(name, ColumnType::String)
    }

    pub fn integer_column(self, name: impl Into<String>) -> Self {
        self.column(name, ColumnType::Integer)
    }

    pub fn double_column(self, name: impl Into<String>) -> Self {
        self.column(name, ColumnType::Double)
    }

    pub fn column(mut self, name: impl Into<String>, column_type: ColumnType) -> Self {
        self.columns.push(Column {
            name: name.into(),
            column_type,
        });
        self
    }

    pub fn build(self) -> Result<Schema, ConfigError> {
        if self.columns.is_empty() {
            return Err(ConfigError::Empty("schema columns"));
        }
        for (i, column) in self.columns.iter().enumerate() {
            if self.columns[..i].iter().any(|c| c.name == column.name) {
                return Err(ConfigError::DuplicateName {
                    kind: "column",
                    name: column.name.clone(),
                });
            }
        }
        Ok(Schema {
            columns: self.columns,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_builder() {
        let schema = Schema::builder()
            .string_column("first")
            .integer_column("count")
            .double_column("score")
            .build()
            .unwrap();

        assert_eq!(schema.columns().len(), 3);
        assert_eq!(schema.column_type("first"), Some(ColumnType::String));
        assert_eq!(schema.column_type("count"), Some(ColumnType::Integer));
        assert!(!schema.has_column("missing"));
    }

    #[test]
    fn test_column_order_preserved() {
        let schema = Schema::builder()
            .string_column("b")
            .string_column("a")
            .build()
            .unwrap();
        let names: Vec<_> = schema.names().collect();
        assert_eq!(names, ["b", "a"]);
    }

    #[test]
    fn test_empty_schema_rejected() {
        assert!(matches!(
            Schema::builder().build().unwrap_err(),
            ConfigError::Empty(_)
        ));
    }

    #[test]
    fn test_duplicate_column_rejected() {
        let err = Schema::builder()
            .string_column("x")
            .integer_column("x")
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateName { kind: "column", .. }));
    }
}
