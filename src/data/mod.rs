//! Dataset loading and conversion into training tensors

pub mod mnist;

use crate::error::DataError;
use crate::tensor::Tensor;

pub use mnist::{Batch, MnistCsv, IMAGE_PIXELS, IMAGE_SIDE, NUM_CLASSES};

/// Stack equally sized samples into an `[n, features]` matrix
pub fn images_to_tensor(images: &[Vec<f32>]) -> Result<Tensor<2>, DataError> {
    let first = images.first().ok_or(DataError::Empty)?;
    let cols = first.len();

    let mut data = Vec::with_capacity(images.len() * cols);
    for (index, image) in images.iter().enumerate() {
        if image.len() != cols {
            return Err(DataError::Ragged {
                index,
                expected: cols,
                actual: image.len(),
            });
        }
        data.extend_from_slice(image);
    }

    Tensor::from_vec([images.len(), cols], data).map_err(|_| DataError::Empty)
}

/// One row per label with a 1.0 in the label's column
pub fn one_hot(labels: &[u8], classes: usize) -> Result<Tensor<2>, DataError> {
    let mut encoded = Tensor::new([labels.len(), classes]);
    for (row, &label) in labels.iter().enumerate() {
        let cell = encoded
            .get_mut([row, label as usize])
            .ok_or(DataError::LabelOutOfRange { label, classes })?;
        *cell = 1.0;
    }
    Ok(encoded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_images_to_tensor() {
        let images = vec![vec![0.0, 0.5], vec![1.0, 0.25]];
        let t = images_to_tensor(&images).unwrap();
        assert_eq!(t.shape(), &[2, 2]);
        assert_eq!(t.data(), &[0.0, 0.5, 1.0, 0.25]);
    }

    #[test]
    fn test_images_to_tensor_errors() {
        assert!(matches!(images_to_tensor(&[]), Err(DataError::Empty)));
        let ragged = vec![vec![0.0, 0.5], vec![1.0]];
        assert!(matches!(
            images_to_tensor(&ragged),
            Err(DataError::Ragged { index: 1, expected: 2, actual: 1 })
        ));
    }

    #[test]
    fn test_one_hot() {
        let t = one_hot(&[2, 0], 3).unwrap();
        assert_eq!(t.data(), &[0.0, 0.0, 1.0, 1.0, 0.0, 0.0]);
        assert_eq!(t.argmax_rows(), vec![2, 0]);

        assert!(matches!(
            one_hot(&[3], 3),
            Err(DataError::LabelOutOfRange { label: 3, classes: 3 })
        ));
    }
}
