//! Plain-text model files
//!
//! One record per layer, starting with its tag line. Dense records follow the
//! tag with `rows cols`, the row-major weights on one line, then `1 cols` and
//! the biases:
//!
//! ```text
//! Dense
//! 2 1
//! 0.5 -0.25
//! 1 1
//! 0.125
//! Sigmoid
//! ```
//!
//! Values are written with the shortest representation that parses back to
//! the same `f32`, so a save/load cycle reproduces the parameters exactly.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::str::FromStr;

use tracing::{info, instrument};

use super::activation::{Relu, Sigmoid};
use super::dense::Dense;
use super::layer::Layer;
use super::network::NeuralNetwork;
use crate::error::ModelError;
use crate::tensor::Tensor;

fn write_matrix<W: Write>(out: &mut W, matrix: &Tensor<2>) -> std::io::Result<()> {
    writeln!(out, "{} {}", matrix.rows(), matrix.cols())?;
    let values: Vec<String> = matrix.iter().map(|v| v.to_string()).collect();
    writeln!(out, "{}", values.join(" "))
}

/// Whitespace-separated tokens paired with their 1-based line number
struct Tokens<'a> {
    inner: Box<dyn Iterator<Item = (usize, &'a str)> + 'a>,
    line: usize,
}

impl<'a> Tokens<'a> {
    fn new(text: &'a str) -> Self {
        let inner = text
            .lines()
            .enumerate()
            .flat_map(|(i, line)| line.split_whitespace().map(move |tok| (i + 1, tok)));
        Tokens {
            inner: Box::new(inner),
            line: 1,
        }
    }

    fn next_token(&mut self) -> Option<&'a str> {
        let (line, tok) = self.inner.next()?;
        self.line = line;
        Some(tok)
    }

    fn expect<T: FromStr>(&mut self, expected: &'static str) -> Result<T, ModelError> {
        let tok = self.next_token().ok_or(ModelError::Truncated {
            line: self.line,
            expected,
        })?;
        tok.parse().map_err(|_| ModelError::InvalidNumber {
            line: self.line,
            token: tok.to_string(),
            expected,
        })
    }

    fn matrix(&mut self, what: &'static str) -> Result<Tensor<2>, ModelError> {
        let rows: usize = self.expect("dimension")?;
        let cols: usize = self.expect("dimension")?;
        let line = self.line;
        // Zero-sized matrices are valid; only an overflowing element count is not
        let numel = rows
            .checked_mul(cols)
            .ok_or(ModelError::InvalidShape { line, what, rows, cols })?;

        let mut data = Vec::with_capacity(numel.min(1 << 20));
        for _ in 0..numel {
            data.push(self.expect::<f32>(what)?);
        }
        Tensor::from_vec([rows, cols], data).map_err(|_| ModelError::InvalidShape { line, what, rows, cols })
    }
}

fn read_dense(tokens: &mut Tokens<'_>) -> Result<Dense, ModelError> {
    let weights = tokens.matrix("weight")?;
    let biases = tokens.matrix("bias")?;
    let line = tokens.line;
    let (rows, cols) = (biases.rows(), biases.cols());
    if rows != 1 || cols != weights.cols() {
        return Err(ModelError::InvalidShape {
            line,
            what: "bias",
            rows,
            cols,
        });
    }
    Dense::from_parameters(weights, biases).map_err(|_| ModelError::InvalidShape {
        line,
        what: "bias",
        rows,
        cols,
    })
}

impl NeuralNetwork {
    /// Serialize every layer to `out`
    pub fn write_to<W: Write>(&self, mut out: W) -> Result<(), ModelError> {
        for layer in &self.layers {
            writeln!(out, "{}", layer.name())?;
            if let Layer::Dense(dense) = layer {
                write_matrix(&mut out, dense.weights())?;
                write_matrix(&mut out, dense.biases())?;
            }
        }
        out.flush()?;
        Ok(())
    }

    /// Replace the layers with the ones decoded from `input`
    ///
    /// On error the current layers are left untouched.
    pub fn read_from<R: Read>(&mut self, mut input: R) -> Result<(), ModelError> {
        let mut text = String::new();
        input.read_to_string(&mut text)?;

        let mut tokens = Tokens::new(&text);
        let mut layers = Vec::new();
        while let Some(tag) = tokens.next_token() {
            let layer: Layer = match tag {
                "Dense" => read_dense(&mut tokens)?.into(),
                "ReLU" => Relu::new().into(),
                "Sigmoid" => Sigmoid::new().into(),
                other => {
                    return Err(ModelError::UnknownLayerTag {
                        line: tokens.line,
                        tag: other.to_string(),
                    })
                }
            };
            layers.push(layer);
        }

        self.layers = layers;
        Ok(())
    }

    #[instrument(skip(self, path), fields(path = %path.as_ref().display(), layers = self.layers.len()))]
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ModelError> {
        let file = File::create(path.as_ref())?;
        self.write_to(BufWriter::new(file))?;
        info!("model saved");
        Ok(())
    }

    #[instrument(skip(self, path), fields(path = %path.as_ref().display()))]
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<(), ModelError> {
        let file = File::open(path.as_ref())?;
        self.read_from(BufReader::new(file))?;
        info!(layers = self.layers.len(), "model loaded");
        Ok(())
    }
}
