//! Turns command-line inputs into records.

use std::path::{Path, PathBuf};

use couchsink::InboundRecord;
use tokio::io::AsyncReadExt;

use crate::error::CliError;

/// Label used for the record read from standard input.
pub const STDIN_SOURCE: &str = "-";

/// Where a record came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// A file named on the command line.
    File(PathBuf),
    /// Standard input.
    Stdin,
}

impl Source {
    /// Sources for the given arguments, or stdin when there are none.
    pub fn from_args(args: impl IntoIterator<Item = String>) -> Vec<Self> {
        let files: Vec<Self> = args.into_iter().map(|a| Self::File(a.into())).collect();
        if files.is_empty() {
            vec![Self::Stdin]
        } else {
            files
        }
    }

    /// Display label for reports.
    pub fn label(&self) -> String {
        match self {
            Self::File(path) => path.display().to_string(),
            Self::Stdin => STDIN_SOURCE.to_owned(),
        }
    }

    /// Read the source into a record.
    ///
    /// File records start with a `filename` attribute holding the file's
    /// base name, so a conflict or failure report still says which file it
    /// was.
    pub async fn read(&self) -> Result<InboundRecord, CliError> {
        match self {
            Self::File(path) => {
                let payload = tokio::fs::read(path).await.map_err(|source| CliError::Read {
                    path: path.clone(),
                    source,
                })?;
                let record = InboundRecord::new(payload);
                Ok(match base_name(path) {
                    Some(name) => record.with_attribute(couchsink::record::attributes::FILENAME, name),
                    None => record,
                })
            }
            Self::Stdin => {
                let mut payload = Vec::new();
                tokio::io::stdin()
                    .read_to_end(&mut payload)
                    .await
                    .map_err(CliError::Stdin)?;
                Ok(InboundRecord::new(payload))
            }
        }
    }
}

fn base_name(path: &Path) -> Option<String> {
    path.file_name().map(|name| name.to_string_lossy().into_owned())
}
