//! Append-only CSV table of positive detections.

use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Default file name of the results table.
pub const RESULTS_FILE_NAME: &str = "water_detections.csv";

/// One positive detection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DetectionRecord {
    /// Gallery subfolder of the image.
    pub folder_name: String,
    /// Image file name.
    pub image_name: String,
}

/// The results table on disk.
///
/// Rows are only ever appended, one open/write/flush per row, so rows written
/// before an interruption stay intact.
#[derive(Debug, Clone)]
pub struct ResultsTable {
    path: PathBuf,
}

impl ResultsTable {
    /// Open the table at `path`, creating it with a header if absent or empty.
    ///
    /// A non-empty file is left exactly as it is.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let needs_header = match fs::metadata(&path) {
            Ok(meta) => meta.len() == 0,
            Err(e) if e.kind() == io::ErrorKind::NotFound => true,
            Err(e) => return Err(e.into()),
        };
        if needs_header {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent)?;
                }
            }
            let mut writer = csv::Writer::from_path(&path)?;
            writer.write_record(["folder_name", "image_name"])?;
            writer.flush()?;
        }
        Ok(Self { path })
    }

    /// Path of the table.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one row.
    ///
    /// A last row without a line terminator is terminated first, so the new
    /// row never joins it.
    pub fn append(&self, record: &DetectionRecord) -> Result<()> {
        let mut file = OpenOptions::new().read(true).append(true).open(&self.path)?;
        if lacks_final_newline(&mut file)? {
            file.write_all(b"\n")?;
        }
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        writer.serialize(record)?;
        writer.flush()?;
        Ok(())
    }

    /// All rows, in file order.
    pub fn records(&self) -> Result<Vec<DetectionRecord>> {
        let mut reader = csv::Reader::from_path(&self.path)?;
        let records = reader
            .deserialize()
            .collect::<std::result::Result<Vec<DetectionRecord>, csv::Error>>()?;
        Ok(records)
    }

    /// Set of recorded rows, for skipping already-detected images.
    pub fn recorded(&self) -> Result<HashSet<DetectionRecord>> {
        Ok(self.records()?.into_iter().collect())
    }
}

fn lacks_final_newline(file: &mut File) -> io::Result<bool> {
    if file.metadata()?.len() == 0 {
        return Ok(false);
    }
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] != b'\n')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(folder: &str, image: &str) -> DetectionRecord {
        DetectionRecord {
            folder_name: folder.to_string(),
            image_name: image.to_string(),
        }
    }

    #[test]
    fn test_header_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(RESULTS_FILE_NAME);

        let table = ResultsTable::open(&path).unwrap();
        table.append(&record("preview", "a-preview.jpg")).unwrap();
        let table = ResultsTable::open(&path).unwrap();
        table.append(&record("preview", "b-preview.jpg")).unwrap();

        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "folder_name,image_name\npreview,a-preview.jpg\npreview,b-preview.jpg\n"
        );
        assert_eq!(
            table.records().unwrap(),
            vec![record("preview", "a-preview.jpg"), record("preview", "b-preview.jpg")]
        );
    }

    #[test]
    fn test_existing_table_is_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(RESULTS_FILE_NAME);
        fs::write(&path, "folder_name,image_name\nold,x.jpg\n").unwrap();

        let table = ResultsTable::open(&path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "folder_name,image_name\nold,x.jpg\n");
        assert!(table.recorded().unwrap().contains(&record("old", "x.jpg")));
    }

    #[test]
    fn test_names_with_commas_are_quoted() {
        let dir = tempfile::tempdir().unwrap();
        let table = ResultsTable::open(dir.path().join("t.csv")).unwrap();
        table.append(&record("a,b", "c.jpg")).unwrap();
        assert_eq!(table.records().unwrap(), vec![record("a,b", "c.jpg")]);
    }

    #[test]
    fn test_unterminated_last_row_is_kept_whole() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(RESULTS_FILE_NAME);
        fs::write(&path, "folder_name,image_name\nold,x.jpg").unwrap();

        let table = ResultsTable::open(&path).unwrap();
        table.append(&record("preview", "y.jpg")).unwrap();

        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "folder_name,image_name\nold,x.jpg\npreview,y.jpg\n"
        );
        assert_eq!(
            table.records().unwrap(),
            vec![record("old", "x.jpg"), record("preview", "y.jpg")]
        );
    }

    #[test]
    fn test_empty_file_gets_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(RESULTS_FILE_NAME);
        fs::write(&path, "").unwrap();

        let table = ResultsTable::open(&path).unwrap();
        table.append(&record("preview", "a.jpg")).unwrap();

        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "folder_name,image_name\npreview,a.jpg\n"
        );
    }
}
