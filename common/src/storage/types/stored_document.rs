use chrono::{DateTime, Utc};
use object_store::path::{Path as ObjPath, PathPart};
use percent_encoding::percent_decode_str;

use crate::{error::AppError, storage::store::StorageManager};

/// A document persisted under the content directory, identified by its file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredDocument {
    /// Decoded file name, as it was uploaded.
    pub file_name: String,
    /// Encoded object path, read back without re-encoding.
    pub location: ObjPath,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
}

/// Object location of `file_name` inside `content_dir`.
pub fn document_location(content_dir: &str, file_name: &str) -> String {
    let dir = content_dir.trim_matches('/');
    if dir.is_empty() {
        file_name.to_string()
    } else {
        format!("{dir}/{file_name}")
    }
}

/// The file name a path segment was created from.
fn decode_part(part: &PathPart<'_>) -> String {
    percent_decode_str(part.as_ref())
        .decode_utf8_lossy()
        .into_owned()
}

impl StoredDocument {
    /// Lists the documents directly below `content_dir`, sorted by file name.
    pub async fn list_all(
        storage: &StorageManager,
        content_dir: &str,
    ) -> Result<Vec<StoredDocument>, AppError> {
        let prefix = content_dir.trim_matches('/');
        let prefix_path = ObjPath::from(prefix);
        let objects = storage
            .list((!prefix.is_empty()).then_some(prefix))
            .await?;

        let mut documents: Vec<StoredDocument> = objects
            .into_iter()
            .filter_map(|meta| {
                // Only direct children belong to the corpus.
                let file_name = {
                    let mut rest = meta.location.prefix_match(&prefix_path)?;
                    let part = rest.next()?;
                    if rest.next().is_some() {
                        return None;
                    }
                    decode_part(&part)
                };
                Some(StoredDocument {
                    file_name,
                    location: meta.location,
                    size: meta.size as u64,
                    last_modified: meta.last_modified,
                })
            })
            .collect();

        documents.sort_by(|a, b| a.file_name.cmp(&b.file_name));
        Ok(documents)
    }

    /// Reads the document body as text, replacing invalid UTF-8 sequences.
    pub async fn read_text(&self, storage: &StorageManager) -> Result<String, AppError> {
        let bytes = storage.get_path(&self.location).await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}
