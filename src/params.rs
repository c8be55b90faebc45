//! Named parameter blocks over a flat vector.
//!
//! Samplers see a plain `&[f64]`. Priors, the forward problem and the
//! likelihoods see named blocks of that vector. [`ParamLayout`] records the
//! block names and sizes, [`ComponentVector`] pairs a layout with data.

use std::ops::Range;
use std::sync::Arc;

use crate::error::{check_len, InferenceError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
struct Block {
    name: String,
    range: Range<usize>,
}

/// Ordered, uniquely named blocks of a flat parameter vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamLayout {
    blocks: Vec<Block>,
    len: usize,
}

impl ParamLayout {
    pub fn new<N: Into<String>>(blocks: impl IntoIterator<Item = (N, usize)>) -> Result<Self> {
        let mut out: Vec<Block> = Vec::new();
        let mut offset = 0;
        for (name, size) in blocks {
            let name = name.into();
            if out.iter().any(|block| block.name == name) {
                return Err(InferenceError::DuplicateComponent(name));
            }
            out.push(Block {
                name,
                range: offset..offset + size,
            });
            offset += size;
        }
        Ok(Self {
            blocks: out,
            len: offset,
        })
    }

    /// Total number of scalar parameters.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn names(&self) -> impl ExactSizeIterator<Item = &str> {
        self.blocks.iter().map(|block| block.name.as_str())
    }

    pub fn range(&self, name: &str) -> Option<Range<usize>> {
        self.blocks
            .iter()
            .find(|block| block.name == name)
            .map(|block| block.range.clone())
    }

    pub fn blocks(&self) -> impl ExactSizeIterator<Item = (&str, Range<usize>)> {
        self.blocks
            .iter()
            .map(|block| (block.name.as_str(), block.range.clone()))
    }
}

/// A flat parameter vector with named blocks.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentVector {
    layout: Arc<ParamLayout>,
    data: Vec<f64>,
}

impl ComponentVector {
    pub fn zeros(layout: Arc<ParamLayout>) -> Self {
        let data = vec![0f64; layout.len()];
        Self { layout, data }
    }

    /// Materialize a raw vector with the given layout.
    ///
    /// Fails with [`InferenceError::ShapeMismatch`] if the length does not
    /// match, the vector is never truncated or padded.
    pub fn from_vec(layout: Arc<ParamLayout>, data: Vec<f64>) -> Result<Self> {
        check_len("parameter vector", layout.len(), data.len())?;
        Ok(Self { layout, data })
    }

    pub fn from_slice(layout: Arc<ParamLayout>, data: &[f64]) -> Result<Self> {
        Self::from_vec(layout, data.to_vec())
    }

    /// A zero vector with the same layout.
    pub fn zeros_like(&self) -> Self {
        Self::zeros(self.layout.clone())
    }

    pub fn layout(&self) -> &Arc<ParamLayout> {
        &self.layout
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<f64> {
        self.data
    }

    pub fn get(&self, name: &str) -> Option<&[f64]> {
        self.layout.range(name).map(|range| &self.data[range])
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut [f64]> {
        self.layout.range(name).map(|range| &mut self.data[range])
    }

    /// Like [`Self::get`], but a missing block is a field mismatch.
    pub fn field(&self, name: &str) -> Result<&[f64]> {
        self.get(name).ok_or_else(|| InferenceError::FieldMismatch {
            expected: vec![name.to_string()],
            found: self.layout.names().map(String::from).collect(),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[f64])> {
        self.layout
            .blocks()
            .map(move |(name, range)| (name, &self.data[range]))
    }
}
