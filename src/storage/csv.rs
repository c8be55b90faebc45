//! CSV storage for recorded simulations.
//!
//! Two files are written to the output directory: `inputs.csv` with one
//! column per simulation parameter and `outputs.csv` with one column per
//! observable element. Columns are named `name.i` with 1-based indices. Every
//! record has to have the same input length and the same observable shapes as
//! the first one.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use itertools::Itertools;

use crate::forward::Observables;
use crate::storage::{Selector, SimulationStorage};

const INPUTS_FILE: &str = "inputs.csv";
const OUTPUTS_FILE: &str = "outputs.csv";

/// Configuration for [`CsvSimulationStorage`].
#[derive(Debug, Clone)]
pub struct CsvStorageConfig {
    /// Directory where the CSV files are written
    output_dir: PathBuf,
    /// Digits after the decimal point, in scientific notation
    precision: usize,
}

impl CsvStorageConfig {
    /// # Example
    ///
    /// ```rust
    /// use siminfer::CsvStorageConfig;
    /// let config = CsvStorageConfig::new("simulations");
    /// ```
    pub fn new<P: AsRef<Path>>(output_dir: P) -> Self {
        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
            precision: 16,
        }
    }

    /// Set the number of digits after the decimal point.
    ///
    /// The default of 16 is enough for values to be read back exactly.
    pub fn with_precision(mut self, precision: usize) -> Self {
        self.precision = precision;
        self
    }

    /// Create the output directory and both files, truncating existing ones.
    pub fn create(self) -> Result<CsvSimulationStorage> {
        CsvSimulationStorage::new(self)
    }
}

/// Simulation storage backed by two CSV files.
pub struct CsvSimulationStorage {
    inputs_path: PathBuf,
    outputs_path: PathBuf,
    inputs: BufWriter<File>,
    outputs: BufWriter<File>,
    precision: usize,
    n_inputs: Option<usize>,
    shapes: Vec<(String, usize)>,        // (observable, length)
    column_mapping: Vec<(String, usize)>, // (observable, index_in_observable)
    len: usize,
    /// Set when a write fails part way; the two files may be out of step.
    poisoned: bool,
}

impl std::fmt::Debug for CsvSimulationStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CsvSimulationStorage")
            .field("inputs_path", &self.inputs_path)
            .field("outputs_path", &self.outputs_path)
            .field("len", &self.len)
            .field("poisoned", &self.poisoned)
            .finish()
    }
}

impl CsvSimulationStorage {
    fn new(config: CsvStorageConfig) -> Result<Self> {
        let output_dir = config.output_dir;
        std::fs::create_dir_all(&output_dir)
            .with_context(|| format!("Failed to create output directory: {:?}", output_dir))?;

        let inputs_path = output_dir.join(INPUTS_FILE);
        let outputs_path = output_dir.join(OUTPUTS_FILE);
        let inputs = File::create(&inputs_path)
            .with_context(|| format!("Failed to create CSV file: {:?}", inputs_path))?;
        let outputs = File::create(&outputs_path)
            .with_context(|| format!("Failed to create CSV file: {:?}", outputs_path))?;

        Ok(Self {
            inputs_path,
            outputs_path,
            inputs: BufWriter::new(inputs),
            outputs: BufWriter::new(outputs),
            precision: config.precision,
            n_inputs: None,
            shapes: Vec::new(),
            column_mapping: Vec::new(),
            len: 0,
            poisoned: false,
        })
    }

    pub fn inputs_path(&self) -> &Path {
        &self.inputs_path
    }

    pub fn outputs_path(&self) -> &Path {
        &self.outputs_path
    }

    /// Fix the column layout from the first record and write both headers.
    fn write_headers(&mut self, inputs: &[f64], outputs: &Observables) -> Result<()> {
        self.n_inputs = Some(inputs.len());
        self.shapes = outputs
            .iter()
            .map(|(name, values)| (name.clone(), values.len()))
            .collect();
        self.column_mapping = self
            .shapes
            .iter()
            .flat_map(|(name, len)| (0..*len).map(move |idx| (name.clone(), idx)))
            .collect();

        let input_header = (1..=inputs.len()).map(|i| format!("input.{i}")).join(",");
        writeln!(self.inputs, "{}", input_header)?;
        let output_header = self
            .column_mapping
            .iter()
            .map(|(name, idx)| format!("{}.{}", name, idx + 1))
            .join(",");
        writeln!(self.outputs, "{}", output_header)?;
        Ok(())
    }

    fn check_shapes(&self, inputs: &[f64], outputs: &Observables) -> Result<()> {
        if let Some(n_inputs) = self.n_inputs {
            if n_inputs != inputs.len() {
                bail!("Expected {} inputs, got {}", n_inputs, inputs.len());
            }
        }
        let matches = outputs.len() == self.shapes.len()
            && outputs
                .iter()
                .zip(self.shapes.iter())
                .all(|((name, values), (expected, len))| name == expected && values.len() == *len);
        if !matches {
            bail!(
                "Observables do not match the stored layout [{}]",
                self.shapes
                    .iter()
                    .map(|(name, len)| format!("{name}: {len}"))
                    .join(", ")
            );
        }
        Ok(())
    }

    fn write_record(&mut self, inputs: &[f64], outputs: &Observables) -> Result<()> {
        if self.n_inputs.is_none() {
            self.write_headers(inputs, outputs)?;
        }
        let input_row = inputs.iter().map(|&x| self.format_value(x)).join(",");
        let output_row = self
            .column_mapping
            .iter()
            .map(|(name, idx)| self.format_value(outputs[name.as_str()][*idx]))
            .join(",");
        writeln!(self.inputs, "{}", input_row)?;
        writeln!(self.outputs, "{}", output_row)?;

        // readers go through the files
        self.flush()
    }

    fn format_value(&self, value: f64) -> String {
        format!("{:.*e}", self.precision, value)
    }

    fn read_rows(&self, path: &Path, selector: Selector) -> Result<Vec<Vec<f64>>> {
        let range = selector.resolve(self.len)?;
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read CSV file: {:?}", path))?;
        contents
            .lines()
            .skip(1)
            .skip(range.start)
            .take(range.len())
            .map(|line| parse_row(line).with_context(|| format!("Invalid row in {:?}", path)))
            .collect()
    }
}

fn parse_row(line: &str) -> Result<Vec<f64>> {
    if line.is_empty() {
        return Ok(Vec::new());
    }
    line.split(',')
        .map(|field| {
            field
                .parse::<f64>()
                .with_context(|| format!("Failed to parse value {:?}", field))
        })
        .collect()
}

impl SimulationStorage for CsvSimulationStorage {
    fn store(&mut self, inputs: &[f64], outputs: &Observables) -> Result<()> {
        if self.poisoned {
            bail!(
                "CSV storage {:?} is unusable after a failed write",
                self.outputs_path
            );
        }
        if self.n_inputs.is_some() {
            self.check_shapes(inputs, outputs)?;
        }

        if let Err(err) = self.write_record(inputs, outputs) {
            self.poisoned = true;
            return Err(err.context("Failed to store simulation"));
        }
        self.len += 1;
        Ok(())
    }

    fn len(&self) -> usize {
        self.len
    }

    fn get_inputs(&self, selector: Selector) -> Result<Vec<Vec<f64>>> {
        self.read_rows(&self.inputs_path, selector)
    }

    fn get_outputs(&self, selector: Selector) -> Result<Vec<Observables>> {
        let rows = self.read_rows(&self.outputs_path, selector)?;
        rows.into_iter()
            .map(|row| -> Result<Observables> {
                if row.len() != self.column_mapping.len() {
                    bail!(
                        "Expected {} output columns, got {}",
                        self.column_mapping.len(),
                        row.len()
                    );
                }
                let mut values = row.into_iter();
                Ok(self
                    .shapes
                    .iter()
                    .map(|(name, len)| (name.clone(), values.by_ref().take(*len).collect()))
                    .collect())
            })
            .collect()
    }

    fn flush(&mut self) -> Result<()> {
        self.inputs.flush().context("Failed to flush inputs CSV file")?;
        self.outputs.flush().context("Failed to flush outputs CSV file")?;
        Ok(())
    }
}
