// ❗ Load Errors - the only failures that abort a session
//
// Schema mismatches, bad dates and missing join keys are recovered inside
// the pipeline and reported through data_quality. What lands here is a
// table that cannot be read at all.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("required {table} table not found at {}", path.display())]
    MissingTable { table: String, path: PathBuf },

    #[error("failed to read {table} table at {}: {source}", path.display())]
    Io {
        table: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {table} table: {source}")]
    Csv {
        table: String,
        #[source]
        source: csv::Error,
    },

    #[error("{table} table has no header row")]
    EmptyHeader { table: String },
}

impl LoadError {
    /// Name of the table that failed to load
    pub fn table(&self) -> &str {
        match self {
            LoadError::MissingTable { table, .. } => table,
            LoadError::Io { table, .. } => table,
            LoadError::Csv { table, .. } => table,
            LoadError::EmptyHeader { table } => table,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_table_message_names_table_and_path() {
        let err = LoadError::MissingTable {
            table: "claims".to_string(),
            path: PathBuf::from("/data/claims.csv"),
        };

        let message = err.to_string();
        assert!(message.contains("claims"));
        assert!(message.contains("/data/claims.csv"));
        assert_eq!(err.table(), "claims");
    }
}
