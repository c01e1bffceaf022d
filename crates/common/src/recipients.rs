//! Recipient sources: where the list of customers to remind comes from.

use std::fs::OpenOptions;
use std::path::PathBuf;

use crate::error::AppError;
use crate::types::RecipientRecord;

/// Anything that can produce the full recipient list up front.
///
/// A failing `load` is fatal to the run.
pub trait RecipientSource: Send + Sync {
    fn load(&self) -> Result<Vec<RecipientRecord>, AppError>;
}

/// CSV file with an `email,text,schedule[,paid]` header row.
#[derive(Debug, Clone)]
pub struct CsvRecipientSource {
    path: PathBuf,
}

impl CsvRecipientSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl RecipientSource for CsvRecipientSource {
    /// A missing file is created empty and yields no recipients.
    fn load(&self) -> Result<Vec<RecipientRecord>, AppError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)
            .map_err(|source| AppError::Load {
                path: self.path.display().to_string(),
                source,
            })?;

        let mut reader = csv::Reader::from_reader(file);
        let recipients = reader
            .deserialize()
            .collect::<Result<Vec<RecipientRecord>, _>>()?;

        tracing::info!(
            path = %self.path.display(),
            count = recipients.len(),
            "Loaded recipients"
        );

        Ok(recipients)
    }
}

/// Fixed in-memory list.
#[derive(Debug, Clone, Default)]
pub struct StaticRecipientSource(pub Vec<RecipientRecord>);

impl RecipientSource for StaticRecipientSource {
    fn load(&self) -> Result<Vec<RecipientRecord>, AppError> {
        Ok(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_without_paid_column() {
        let file = write_csv(
            "email,text,schedule\n\
             alice@example.com,Invoice overdue,5s-30s\n\
             bob@example.com,Second notice,10s\n",
        );
        let recipients = CsvRecipientSource::new(file.path()).load().unwrap();

        assert_eq!(recipients.len(), 2);
        assert_eq!(recipients[0].email, "alice@example.com");
        assert_eq!(recipients[0].schedule, "5s-30s");
        assert!(!recipients[0].paid);
        assert_eq!(recipients[1].text, "Second notice");
    }

    #[test]
    fn test_load_with_paid_column() {
        let file = write_csv(
            "email,text,schedule,paid\n\
             alice@example.com,hi,1s,true\n\
             bob@example.com,hi,1s,\n",
        );
        let recipients = CsvRecipientSource::new(file.path()).load().unwrap();

        assert!(recipients[0].paid);
        assert!(!recipients[1].paid);
    }

    #[test]
    fn test_quoted_fields() {
        let file = write_csv(
            "email,text,schedule\n\
             alice@example.com,\"Hello, Alice\",1s\n",
        );
        let recipients = CsvRecipientSource::new(file.path()).load().unwrap();
        assert_eq!(recipients[0].text, "Hello, Alice");
    }

    #[test]
    fn test_missing_file_is_created_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("customers.csv");

        let recipients = CsvRecipientSource::new(&path).load().unwrap();

        assert!(recipients.is_empty());
        assert!(path.exists());
    }

    #[test]
    fn test_unopenable_path_is_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("no-such-dir").join("customers.csv");

        let err = CsvRecipientSource::new(&path).load().unwrap_err();
        assert!(matches!(err, AppError::Load { .. }));
    }

    #[test]
    fn test_short_row_is_csv_error() {
        let file = write_csv("email,text,schedule\nalice@example.com,hi\n");
        let err = CsvRecipientSource::new(file.path()).load().unwrap_err();
        assert!(matches!(err, AppError::Csv(_)));
    }

    #[test]
    fn test_static_source() {
        let source = StaticRecipientSource(vec![RecipientRecord::new("a@x", "t", "1s")]);
        assert_eq!(source.load().unwrap().len(), 1);
    }
}
