//! Kernel matrix serialization and persistence
//!
//! Saved matrices are JSON documents holding the row-major values together
//! with the kernel parameters they were computed with, so a downstream
//! learner can reload a precomputed kernel without recomputing it.

use crate::core::{KernelError, KernelMatrix, KernelParameters, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// Serializable representation of a kernel matrix
#[derive(Debug, Serialize, Deserialize)]
pub struct SerializableKernelMatrix {
    /// Number of rows (left sequences)
    pub rows: usize,
    /// Number of columns (right sequences)
    pub cols: usize,
    /// Row-major values
    pub values: Vec<f64>,
    /// Optional row labels, e.g. sequence names
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub row_names: Vec<String>,
    /// Optional column labels
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub col_names: Vec<String>,
    /// Matrix metadata
    pub metadata: MatrixMetadata,
}

/// Provenance of a saved matrix
#[derive(Debug, Serialize, Deserialize)]
pub struct MatrixMetadata {
    /// Library version used to compute the matrix
    pub library_version: String,
    /// Kernel identifier
    pub kernel_type: String,
    /// Kernel parameters
    pub parameters: KernelParameters,
    /// Whether entries were normalized to a unit diagonal
    pub normalized: bool,
    /// Creation timestamp (RFC 3339)
    pub created_at: String,
}

impl SerializableKernelMatrix {
    /// Snapshot a computed matrix
    pub fn from_matrix(matrix: &KernelMatrix, parameters: KernelParameters, normalized: bool) -> Self {
        Self {
            rows: matrix.rows(),
            cols: matrix.cols(),
            values: matrix.as_slice().to_vec(),
            row_names: Vec::new(),
            col_names: Vec::new(),
            metadata: MatrixMetadata {
                library_version: env!("CARGO_PKG_VERSION").to_string(),
                kernel_type: "subsequence".to_string(),
                parameters,
                normalized,
                created_at: chrono::Utc::now().to_rfc3339(),
            },
        }
    }

    /// Attach row and column labels
    pub fn with_names(mut self, row_names: Vec<String>, col_names: Vec<String>) -> Self {
        self.row_names = row_names;
        self.col_names = col_names;
        self
    }

    /// Save to a JSON file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path).map_err(KernelError::IoError)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)
            .map_err(|e| KernelError::SerializationError(e.to_string()))?;
        Ok(())
    }

    /// Load from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path).map_err(KernelError::IoError)?;
        let reader = BufReader::new(file);
        let saved: Self = serde_json::from_reader(reader)
            .map_err(|e| KernelError::SerializationError(e.to_string()))?;
        saved.check()?;
        Ok(saved)
    }

    /// Validate shape, labels and parameters
    fn check(&self) -> Result<()> {
        let expected = self.rows.checked_mul(self.cols);
        if expected != Some(self.values.len()) {
            return Err(KernelError::SerializationError(format!(
                "Matrix declares {}x{} but holds {} values",
                self.rows,
                self.cols,
                self.values.len()
            )));
        }
        if !self.row_names.is_empty() && self.row_names.len() != self.rows {
            return Err(KernelError::SerializationError(format!(
                "Expected {} row names, found {}",
                self.rows,
                self.row_names.len()
            )));
        }
        if !self.col_names.is_empty() && self.col_names.len() != self.cols {
            return Err(KernelError::SerializationError(format!(
                "Expected {} column names, found {}",
                self.cols,
                self.col_names.len()
            )));
        }
        self.metadata.parameters.validate()
    }

    /// Rebuild the kernel matrix
    pub fn to_matrix(&self) -> Result<KernelMatrix> {
        self.check()?;
        Ok(KernelMatrix::from_vec(
            self.rows,
            self.cols,
            self.values.clone(),
        ))
    }

    /// Print matrix summary
    pub fn print_summary(&self) {
        println!("=== Kernel Matrix Summary ===");
        println!("Kernel Type: {}", self.metadata.kernel_type);
        println!("Shape: {}x{}", self.rows, self.cols);
        println!("Normalized: {}", self.metadata.normalized);
        println!("Library Version: {}", self.metadata.library_version);
        println!("Created: {}", self.metadata.created_at);
        println!("Kernel Parameters:");
        println!(
            "  Max Subsequence Length: {}",
            self.metadata.parameters.max_subsequence_length
        );
        println!(
            "  Decay Factor: {}",
            self.metadata.parameters.decay_factor
        );
    }
}
