//! Column transform definitions.
//!
//! A transform definition is an ordered list of column operations applied to
//! a record. The set is intentionally small; anything richer belongs to the
//! external transform engine. Definitions are pure data here; the serving
//! runtime executes them against live records, while
//! [`TransformDefinition::output_schema`] evolves a schema the same way so a
//! declared output schema can be checked at assembly time.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::schema::{ColumnType, Schema};

/// One column operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ColumnOp {
    /// Append a fixed suffix to a string column.
    AppendString { column: String, suffix: String },
    /// Rename a column.
    RenameColumn { from: String, to: String },
    /// Drop a column.
    RemoveColumn { column: String },
}

/// Ordered, immutable list of column operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformDefinition {
    ops: Vec<ColumnOp>,
}

impl TransformDefinition {
    pub fn builder() -> TransformDefinitionBuilder {
        TransformDefinitionBuilder::default()
    }

    pub fn ops(&self) -> &[ColumnOp] {
        &self.ops
    }

    /// Evolve `input` through every op, validating column references as the
    /// schema stands at each point of the sequence.
    pub fn output_schema(&self, input: &Schema) -> Result<Schema, ConfigError> {
        let mut columns = input.clone().into_columns();

        for op in &self.ops {
            match op {
                ColumnOp::AppendString { column, .. } => {
                    let found = columns
                        .iter()
                        .find(|c| &c.name == column)
                        .ok_or_else(|| ConfigError::UnknownColumn(column.clone()))?;
                    if found.column_type != ColumnType::String {
                        return Err(ConfigError::ColumnTypeMismatch {
                            column: column.clone(),
                            expected: ColumnType::String,
                            actual: found.column_type,
                        });
                    }
                }
                ColumnOp::RenameColumn { from, to } => {
                    if columns.iter().any(|c| &c.name == to) {
                        return Err(ConfigError::ColumnExists(to.clone()));
                    }
                    let found = columns
                        .iter_mut()
                        .find(|c| &c.name == from)
                        .ok_or_else(|| ConfigError::UnknownColumn(from.clone()))?;
                    found.name = to.clone();
                }
                ColumnOp::RemoveColumn { column } => {
                    let before = columns.len();
                    columns.retain(|c| &c.name != column);
                    if columns.len() == before {
                        return Err(ConfigError::UnknownColumn(column.clone()));
                    }
                }
            }
        }

        if columns.is_empty() {
            return Err(ConfigError::Empty("schema columns"));
        }
        Ok(Schema::from_columns(columns))
    }
}

/// Fluent builder for [`TransformDefinition`].
#[derive(Debug, Default)]
pub struct TransformDefinitionBuilder {
    ops: Vec<ColumnOp>,
}

impl TransformDefinitionBuilder {
    pub fn append_string(mut self, column: impl Into<String>, suffix: impl Into<String>) -> Self {
        self.ops.push(ColumnOp::AppendString {
            column: column.into(),
            suffix: suffix.into(),
        });
        self
    }

    pub fn rename_column(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.ops.push(ColumnOp::RenameColumn {
            from: from.into(),
            to: to.into(),
        });
        self
    }

    pub fn remove_column(mut self, column: impl Into<String>) -> Self {
        self.ops.push(ColumnOp::RemoveColumn {
            column: column.into(),
        });
        self
    }

    pub fn build(self) -> Result<TransformDefinition, ConfigError> {
        if self.ops.is_empty() {
            return Err(ConfigError::Empty("transform ops"));
        }
        Ok(TransformDefinition { ops: self.ops })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Schema {
        Schema::builder()
            .string_column("first")
            .integer_column("count")
            .build()
            .unwrap()
    }

    #[test]
    fn test_append_keeps_schema() {
        let transform = TransformDefinition::builder()
            .append_string("first", "two")
            .build()
            .unwrap();
        let out = transform.output_schema(&schema()).unwrap();
        assert_eq!(out, schema());
    }

    #[test]
    fn test_append_requires_string_column() {
        let transform = TransformDefinition::builder()
            .append_string("count", "x")
            .build()
            .unwrap();
        let err = transform.output_schema(&schema()).unwrap_err();
        assert!(matches!(err, ConfigError::ColumnTypeMismatch { .. }));
    }

    #[test]
    fn test_rename_and_remove() {
        let transform = TransformDefinition::builder()
            .rename_column("first", "greeting")
            .remove_column("count")
            .build()
            .unwrap();
        let out = transform.output_schema(&schema()).unwrap();
        let names: Vec<_> = out.names().collect();
        assert_eq!(names, ["greeting"]);
    }

    #[test]
    fn test_rename_to_existing_rejected() {
        let transform = TransformDefinition::builder()
            .rename_column("first", "count")
            .build()
            .unwrap();
        assert!(matches!(
            transform.output_schema(&schema()).unwrap_err(),
            ConfigError::ColumnExists(_)
        ));
    }

    #[test]
    fn test_ops_see_prior_renames() {
        // The append references the renamed column, so validation must track
        // the schema as it evolves.
        let transform = TransformDefinition::builder()
            .rename_column("first", "greeting")
            .append_string("greeting", "!")
            .build()
            .unwrap();
        assert!(transform.output_schema(&schema()).is_ok());

        let stale = TransformDefinition::builder()
            .rename_column("first", "greeting")
            .append_string("first", "!")
            .build()
            .unwrap();
        assert!(matches!(
            stale.output_schema(&schema()).unwrap_err(),
            ConfigError::UnknownColumn(_)
        ));
    }

    #[test]
    fn test_removing_every_column_rejected() {
        let transform = TransformDefinition::builder()
            .remove_column("first")
            .remove_column("count")
            .build()
            .unwrap();
        assert!(matches!(
            transform.output_schema(&schema()).unwrap_err(),
            ConfigError::Empty(_)
        ));
    }

    #[test]
    fn test_empty_definition_rejected() {
        assert!(TransformDefinition::builder().build().is_err());
    }

    #[test]
    fn test_op_serialization_tagged() {
        let op = ColumnOp::AppendString {
            column: "first".into(),
            suffix: "two".into(),
        };
        let json = serde_json::to_value(&op).unwrap();
        assert_eq!(json["op"], "append_string");
        assert_eq!(json["column"], "first");
    }
}
