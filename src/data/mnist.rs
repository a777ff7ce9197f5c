//! CSV-encoded handwritten digits
//!
//! Each file starts with a header row. Every following row is
//! `label,p0,p1,...,p783` with pixel intensities in `0..=255`.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::{debug, info, instrument};

use crate::error::DataError;

pub const IMAGE_SIDE: usize = 28;
pub const IMAGE_PIXELS: usize = IMAGE_SIDE * IMAGE_SIDE;
pub const NUM_CLASSES: usize = 10;

const DEFAULT_SEED: u64 = 42;

#[derive(Debug, Clone, Default)]
struct Split {
    images: Vec<Vec<f32>>,
    labels: Vec<u8>,
}

/// Owned minibatch handed out by [`MnistCsv::next_batch`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Batch {
    pub images: Vec<Vec<f32>>,
    pub labels: Vec<u8>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Train and test splits plus a cursor for minibatch iteration
#[derive(Debug, Clone)]
pub struct MnistCsv {
    train: Split,
    test: Split,
    cursor: usize,
    rng: StdRng,
}

impl Default for MnistCsv {
    fn default() -> Self {
        Self::with_seed(DEFAULT_SEED)
    }
}

impl MnistCsv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loader whose reshuffles are driven by `seed`
    pub fn with_seed(seed: u64) -> Self {
        MnistCsv {
            train: Split::default(),
            test: Split::default(),
            cursor: 0,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Replace the training split; returns the number of samples kept
    #[instrument(skip(self, path), fields(path = %path.as_ref().display()))]
    pub fn load_train(&mut self, path: impl AsRef<Path>) -> Result<usize, DataError> {
        self.train = read_split(path.as_ref())?;
        self.cursor = 0;
        info!(samples = self.train.labels.len(), "training data loaded");
        Ok(self.train.labels.len())
    }

    /// Replace the test split; returns the number of samples kept
    #[instrument(skip(self, path), fields(path = %path.as_ref().display()))]
    pub fn load_test(&mut self, path: impl AsRef<Path>) -> Result<usize, DataError> {
        self.test = read_split(path.as_ref())?;
        info!(samples = self.test.labels.len(), "test data loaded");
        Ok(self.test.labels.len())
    }

    pub fn train_data(&self) -> (&[Vec<f32>], &[u8]) {
        (&self.train.images, &self.train.labels)
    }

    pub fn test_data(&self) -> (&[Vec<f32>], &[u8]) {
        (&self.test.images, &self.test.labels)
    }

    pub fn train_len(&self) -> usize {
        self.train.labels.len()
    }

    pub fn test_len(&self) -> usize {
        self.test.labels.len()
    }

    /// Up to `size` consecutive training samples
    ///
    /// The batch stops at the end of the split. Reaching the end rewinds the
    /// cursor and reshuffles the training split.
    pub fn next_batch(&mut self, size: usize) -> Batch {
        let end = (self.cursor + size).min(self.train.labels.len());
        let batch = Batch {
            images: self.train.images[self.cursor..end].to_vec(),
            labels: self.train.labels[self.cursor..end].to_vec(),
        };
        self.cursor = end;

        if self.cursor >= self.train.labels.len() {
            self.cursor = 0;
            self.shuffle_train();
        }
        batch
    }

    fn shuffle_train(&mut self) {
        let mut order: Vec<usize> = (0..self.train.labels.len()).collect();
        order.shuffle(&mut self.rng);

        let images = order.iter().map(|&i| self.train.images[i].clone()).collect();
        let labels = order.iter().map(|&i| self.train.labels[i]).collect();
        self.train = Split { images, labels };
        debug!(samples = self.train.labels.len(), "training data reshuffled");
    }

    /// ASCII rendering of one sample: `##` above 0.5, `..` above 0.25, blank otherwise
    pub fn render_sample(&self, index: usize, from_train: bool) -> Option<String> {
        let split = if from_train { &self.train } else { &self.test };
        let image = split.images.get(index)?;

        let mut out = String::with_capacity(IMAGE_PIXELS * 2 + IMAGE_SIDE);
        for row in image.chunks(IMAGE_SIDE) {
            for &pixel in row {
                out.push_str(if pixel > 0.5 {
                    "##"
                } else if pixel > 0.25 {
                    ".."
                } else {
                    "  "
                });
            }
            out.push('\n');
        }
        Some(out)
    }

    pub fn label(&self, index: usize, from_train: bool) -> Option<u8> {
        let split = if from_train { &self.train } else { &self.test };
        split.labels.get(index).copied()
    }
}

fn read_split(path: &Path) -> Result<Split, DataError> {
    let reader = BufReader::new(File::open(path)?);
    parse_rows(reader)
}

fn parse_rows<R: BufRead>(reader: R) -> Result<Split, DataError> {
    let mut split = Split::default();
    let mut skipped = 0usize;

    // Line 1 is the header
    for (i, line) in reader.lines().enumerate().skip(1) {
        let line = line?;
        let line_no = i + 1;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let mut fields = line.split(',');
        let label_field = fields.next().unwrap_or_default().trim();
        let label: u8 = label_field.parse().map_err(|_| DataError::Parse {
            line: line_no,
            message: format!("invalid label `{}`", label_field),
        })?;
        if label as usize >= NUM_CLASSES {
            return Err(DataError::Parse {
                line: line_no,
                message: format!("label {} is not a digit", label),
            });
        }

        let image = fields
            .map(|field| {
                let field = field.trim();
                field
                    .parse::<f32>()
                    .map(|pixel| pixel / 255.0)
                    .map_err(|_| DataError::Parse {
                        line: line_no,
                        message: format!("invalid pixel `{}`", field),
                    })
            })
            .collect::<Result<Vec<f32>, DataError>>()?;

        if image.len() != IMAGE_PIXELS {
            debug!(line = line_no, pixels = image.len(), "skipping row with wrong pixel count");
            skipped += 1;
            continue;
        }
        split.images.push(image);
        split.labels.push(label);
    }

    if skipped > 0 {
        info!(skipped, "rows without {} pixels were ignored", IMAGE_PIXELS);
    }
    Ok(split)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn row(label: &str, pixel: u32, count: usize) -> String {
        let pixels: Vec<String> = (0..count).map(|_| pixel.to_string()).collect();
        format!("{},{}\n", label, pixels.join(","))
    }

    fn write_csv(rows: &[String]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "label,pixels\n{}", rows.concat()).unwrap();
        file.flush().unwrap();
        file
    }

    // ========================================================================
    // Parsing
    // ========================================================================

    #[test]
    fn test_load_normalizes_and_skips() {
        let file = write_csv(&[
            row("3", 255, IMAGE_PIXELS),
            "\n".to_string(),
            row("7", 51, IMAGE_PIXELS),
            row("1", 0, 10),
        ]);

        let mut loader = MnistCsv::new();
        assert_eq!(loader.load_train(file.path()).unwrap(), 2);
        let (images, labels) = loader.train_data();
        assert_eq!(labels, &[3, 7]);
        assert!(images[0].iter().all(|&p| p == 1.0));
        assert!(images[1].iter().all(|&p| (p - 0.2).abs() < 1e-6));
    }

    #[test]
    fn test_test_split_is_normalized_too() {
        let file = write_csv(&[row("5", 255, IMAGE_PIXELS)]);
        let mut loader = MnistCsv::new();
        assert_eq!(loader.load_test(file.path()).unwrap(), 1);
        assert_eq!(loader.test_len(), 1);
        assert_eq!(loader.train_len(), 0);
        assert!(loader.test_data().0[0].iter().all(|&p| p == 1.0));
    }

    #[test]
    fn test_parse_errors_carry_line() {
        let file = write_csv(&[row("1", 0, IMAGE_PIXELS), row("x", 0, IMAGE_PIXELS)]);
        let err = MnistCsv::new().load_train(file.path()).unwrap_err();
        assert!(matches!(err, DataError::Parse { line: 3, .. }));

        let file = write_csv(&[row("12", 0, IMAGE_PIXELS)]);
        let err = MnistCsv::new().load_train(file.path()).unwrap_err();
        assert!(matches!(err, DataError::Parse { line: 2, .. }));

        let file = write_csv(&["4,1,2,abc\n".to_string()]);
        let err = MnistCsv::new().load_train(file.path()).unwrap_err();
        assert!(matches!(err, DataError::Parse { line: 2, ref message } if message.contains("abc")));
    }

    #[test]
    fn test_missing_file() {
        let err = MnistCsv::new().load_train("/definitely/not/here.csv").unwrap_err();
        assert!(matches!(err, DataError::Io(_)));
    }

    // ========================================================================
    // Batching
    // ========================================================================

    #[test]
    fn test_next_batch_wraps_and_reshuffles() {
        let rows: Vec<String> = (0..5).map(|d| row(&d.to_string(), 0, IMAGE_PIXELS)).collect();
        let file = write_csv(&rows);
        let mut loader = MnistCsv::with_seed(7);
        loader.load_train(file.path()).unwrap();

        let first = loader.next_batch(3);
        assert_eq!(first.labels, vec![0, 1, 2]);
        // Only two samples remain before the wrap
        let second = loader.next_batch(3);
        assert_eq!(second.labels, vec![3, 4]);

        // After the wrap the split is a permutation of the loaded labels
        let mut all = loader.next_batch(5).labels;
        assert_eq!(all.len(), 5);
        all.sort_unstable();
        assert_eq!(all, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_same_seed_same_shuffle() {
        let rows: Vec<String> = (0..10).map(|d| row(&d.to_string(), 0, IMAGE_PIXELS)).collect();
        let file = write_csv(&rows);

        let mut a = MnistCsv::with_seed(9);
        let mut b = MnistCsv::with_seed(9);
        a.load_train(file.path()).unwrap();
        b.load_train(file.path()).unwrap();
        a.next_batch(10);
        b.next_batch(10);
        assert_eq!(a.next_batch(10), b.next_batch(10));
    }

    #[test]
    fn test_empty_split_gives_empty_batch() {
        let mut loader = MnistCsv::new();
        assert!(loader.next_batch(4).is_empty());
    }

    // ========================================================================
    // Rendering
    // ========================================================================

    #[test]
    fn test_render_sample() {
        let mut pixels = vec!["0".to_string(); IMAGE_PIXELS];
        pixels[0] = "255".to_string();
        pixels[1] = "100".to_string();
        let file = write_csv(&[format!("8,{}\n", pixels.join(","))]);

        let mut loader = MnistCsv::new();
        loader.load_train(file.path()).unwrap();
        let art = loader.render_sample(0, true).unwrap();
        let lines: Vec<&str> = art.lines().collect();
        assert_eq!(lines.len(), IMAGE_SIDE);
        assert!(lines[0].starts_with("##..  "));
        assert_eq!(lines[0].len(), IMAGE_SIDE * 2);
        assert_eq!(loader.label(0, true), Some(8));

        assert!(loader.render_sample(1, true).is_none());
        assert!(loader.render_sample(0, false).is_none());
    }
}
