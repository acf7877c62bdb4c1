//! Dataset split listing.
//!
//! A split lives in `<root>/<split>/` and holds one `labels.pickle` (an
//! `N x classes` matrix) plus `0.pickle` .. `{N-1}.pickle` spectrograms.

use crate::error::{Error, Result};
use crate::loader::SampleRef;
use crate::pickle::read_rows;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// File holding a split's label matrix.
pub const LABELS_FILE: &str = "labels.pickle";

const SAMPLE_EXTENSION: &str = ".pickle";

/// Named dataset partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Split {
    Train,
    Val,
}

impl Split {
    pub fn as_str(&self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Val => "val",
        }
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sample references of one split with their position-aligned labels.
#[derive(Debug, Clone)]
pub struct SplitListing {
    split: Split,
    dir: PathBuf,
    samples: Vec<SampleRef>,
    labels: Vec<Arc<[f32]>>,
    num_classes: usize,
}

impl SplitListing {
    pub fn split(&self) -> Split {
        self.split
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn samples(&self) -> &[SampleRef] {
        &self.samples
    }

    pub fn labels(&self) -> &[Arc<[f32]>] {
        &self.labels
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// `"12.pickle"` -> `Some(12)`. Anything else, including `labels.pickle`, is skipped.
fn parse_sample_id(file_name: &str) -> Option<u64> {
    let stem = file_name.strip_suffix(SAMPLE_EXTENSION)?;
    if stem.is_empty() || !stem.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    stem.parse().ok()
}

fn list_sample_files(dir: &Path) -> Result<Vec<SampleRef>> {
    let entries = std::fs::read_dir(dir).map_err(|e| Error::io(dir, e))?;

    let mut samples = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| Error::io(dir, e))?;
        let name = entry.file_name();
        let Some(id) = name.to_str().and_then(parse_sample_id) else {
            continue;
        };
        samples.push(SampleRef {
            id,
            path: entry.path(),
        });
    }

    // Directory order is arbitrary; numeric id is the canonical order.
    samples.sort_by_key(|s| s.id);
    Ok(samples)
}

/// List one split under `root`, validating it against `num_classes`.
///
/// Fails as a whole: a missing directory, an unreadable label file, a label
/// row of the wrong width, a gap in the sample ids or a count mismatch all
/// abort the listing.
pub fn list_split(root: &Path, split: Split, num_classes: usize) -> Result<SplitListing> {
    let dir = root.join(split.as_str());
    let samples = list_sample_files(&dir)?;
    let rows = read_rows(&dir.join(LABELS_FILE))?;

    if samples.is_empty() && rows.is_empty() {
        return Err(Error::EmptySplit(dir));
    }
    if samples.len() != rows.len() {
        return Err(Error::LengthMismatch {
            split: split.to_string(),
            samples: samples.len(),
            labels: rows.len(),
        });
    }

    for (position, sample) in samples.iter().enumerate() {
        if sample.id != position as u64 {
            return Err(Error::Schema(format!(
                "split '{}': expected sample id {} but found {}",
                split,
                position,
                sample.path.display()
            )));
        }
    }

    if let Some((row, width)) = rows
        .iter()
        .map(Vec::len)
        .enumerate()
        .find(|(_, width)| *width != num_classes)
    {
        return Err(Error::Schema(format!(
            "split '{}': label row {} has {} columns, expected {}",
            split, row, width, num_classes
        )));
    }

    let labels = rows.into_iter().map(Arc::from).collect();

    tracing::debug!(
        "Listed split '{}': {} samples, {} classes",
        split,
        samples.len(),
        num_classes
    );

    Ok(SplitListing {
        split,
        dir,
        samples,
        labels,
        num_classes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_pickle::SerOptions;
    use std::fs::File;

    fn write_pickle<T: serde::Serialize>(path: &Path, value: &T) {
        let mut file = File::create(path).unwrap();
        serde_pickle::to_writer(&mut file, value, SerOptions::new()).unwrap();
    }

    fn make_split(root: &Path, split: Split, ids: &[u64], labels: &[Vec<f64>]) -> PathBuf {
        let dir = root.join(split.as_str());
        std::fs::create_dir_all(&dir).unwrap();
        for id in ids {
            write_pickle(&dir.join(format!("{}.pickle", id)), &vec![vec![0.0f64; 2]; 2]);
        }
        write_pickle(&dir.join(LABELS_FILE), &labels.to_vec());
        dir
    }

    #[test]
    fn test_parse_sample_id() {
        assert_eq!(parse_sample_id("0.pickle"), Some(0));
        assert_eq!(parse_sample_id("42.pickle"), Some(42));
        assert_eq!(parse_sample_id("labels.pickle"), None);
        assert_eq!(parse_sample_id(".pickle"), None);
        assert_eq!(parse_sample_id("3.npy"), None);
        assert_eq!(parse_sample_id("-1.pickle"), None);
        assert_eq!(parse_sample_id("1a.pickle"), None);
    }

    #[test]
    fn test_list_split_sorted_by_id() {
        let root = tempfile::tempdir().unwrap();
        let labels: Vec<Vec<f64>> = (0..12).map(|i| vec![i as f64, 0.0, 1.0]).collect();
        make_split(root.path(), Split::Train, &(0..12).collect::<Vec<_>>(), &labels);

        let listing = list_split(root.path(), Split::Train, 3).unwrap();
        assert_eq!(listing.len(), 12);
        assert_eq!(listing.samples().len(), listing.labels().len());

        let ids: Vec<u64> = listing.samples().iter().map(|s| s.id).collect();
        assert_eq!(ids, (0..12).collect::<Vec<_>>());
        // Label row i belongs to sample i
        assert_eq!(listing.labels()[10][0], 10.0);
    }

    #[test]
    fn test_ignores_unrelated_files() {
        let root = tempfile::tempdir().unwrap();
        let dir = make_split(
            root.path(),
            Split::Val,
            &[0, 1],
            &[vec![0.0, 1.0], vec![1.0, 0.0]],
        );
        std::fs::write(dir.join("README.txt"), b"notes").unwrap();
        std::fs::write(dir.join("2.npy"), b"skip").unwrap();

        let listing = list_split(root.path(), Split::Val, 2).unwrap();
        assert_eq!(listing.len(), 2);
        assert_eq!(listing.split(), Split::Val);
    }

    #[test]
    fn test_missing_directory_fails() {
        let root = tempfile::tempdir().unwrap();
        assert!(matches!(
            list_split(root.path(), Split::Train, 3),
            Err(Error::Io { .. })
        ));
    }

    #[test]
    fn test_missing_label_file_fails() {
        let root = tempfile::tempdir().unwrap();
        let dir = make_split(root.path(), Split::Train, &[0], &[vec![1.0]]);
        std::fs::remove_file(dir.join(LABELS_FILE)).unwrap();

        assert!(matches!(
            list_split(root.path(), Split::Train, 1),
            Err(Error::Io { .. })
        ));
    }

    #[test]
    fn test_empty_labels_with_samples_fails() {
        let root = tempfile::tempdir().unwrap();
        make_split(root.path(), Split::Train, &[0, 1, 2], &[]);

        match list_split(root.path(), Split::Train, 3) {
            Err(Error::LengthMismatch {
                samples, labels, ..
            }) => {
                assert_eq!(samples, 3);
                assert_eq!(labels, 0);
            }
            other => panic!("expected length mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_fully_empty_split_fails() {
        let root = tempfile::tempdir().unwrap();
        make_split(root.path(), Split::Train, &[], &[]);

        assert!(matches!(
            list_split(root.path(), Split::Train, 3),
            Err(Error::EmptySplit(_))
        ));
    }

    #[test]
    fn test_gap_in_ids_fails() {
        let root = tempfile::tempdir().unwrap();
        make_split(
            root.path(),
            Split::Train,
            &[0, 2],
            &[vec![0.0], vec![1.0]],
        );

        assert!(matches!(
            list_split(root.path(), Split::Train, 1),
            Err(Error::Schema(_))
        ));
    }

    #[test]
    fn test_wrong_label_width_fails() {
        let root = tempfile::tempdir().unwrap();
        make_split(
            root.path(),
            Split::Train,
            &[0, 1],
            &[vec![0.0, 1.0], vec![1.0]],
        );

        assert!(matches!(
            list_split(root.path(), Split::Train, 2),
            Err(Error::Schema(_))
        ));
    }
}
