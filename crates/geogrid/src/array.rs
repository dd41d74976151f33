//! Dense N-d float arrays and hyperslab selection.

use crate::{DimKind, Dimension, GeoGridError, GeoGridResult};

/// Per-dimension selection for a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selector {
    /// Keep one index; the dimension is dropped from the result.
    Index(usize),
    /// Keep the whole dimension.
    All,
}

/// Row-major array with its dimension metadata. Missing values are NaN.
#[derive(Debug, Clone, PartialEq)]
pub struct RawArray {
    pub dims: Vec<Dimension>,
    pub data: Vec<f32>,
}

impl RawArray {
    pub fn new(dims: Vec<Dimension>, data: Vec<f32>) -> GeoGridResult<Self> {
        let expected: usize = dims.iter().map(|d| d.len).product();
        if expected != data.len() {
            return Err(GeoGridError::InvalidFormat(format!(
                "shape {:?} needs {} values, got {}",
                dims.iter().map(|d| d.len).collect::<Vec<_>>(),
                expected,
                data.len()
            )));
        }
        Ok(Self { dims, data })
    }

    pub fn shape(&self) -> Vec<usize> {
        self.dims.iter().map(|d| d.len).collect()
    }

    pub fn ndim(&self) -> usize {
        self.dims.len()
    }

    pub fn kinds(&self) -> Vec<DimKind> {
        self.dims.iter().map(|d| d.kind).collect()
    }

    /// Extract the hyperslab described by `selectors`.
    pub fn select(&self, selectors: &[Selector]) -> GeoGridResult<RawArray> {
        let out_dims = selected_dims(&self.dims, selectors)?;

        let strides = strides(&self.shape());
        let kept: Vec<usize> = selectors
            .iter()
            .enumerate()
            .filter(|(_, s)| matches!(s, Selector::All))
            .map(|(axis, _)| axis)
            .collect();
        let out_len: usize = out_dims.iter().map(|d| d.len).product();

        let base: usize = selectors
            .iter()
            .zip(&strides)
            .map(|(s, stride)| match s {
                Selector::Index(i) => i * stride,
                Selector::All => 0,
            })
            .sum();

        let mut data = Vec::with_capacity(out_len);
        let mut counter = vec![0usize; kept.len()];
        for _ in 0..out_len {
            let offset: usize = counter
                .iter()
                .zip(&kept)
                .map(|(c, &axis)| c * strides[axis])
                .sum();
            data.push(self.data[base + offset]);

            // Odometer increment, last axis fastest
            for pos in (0..counter.len()).rev() {
                counter[pos] += 1;
                if counter[pos] < out_dims[pos].len {
                    break;
                }
                counter[pos] = 0;
            }
        }

        Ok(RawArray {
            dims: out_dims,
            data,
        })
    }

    /// Drop every dimension of length one except latitude and longitude,
    /// which stay even when a grid is a single row or column.
    pub fn squeeze(self) -> RawArray {
        let dims = self
            .dims
            .into_iter()
            .filter(|d| d.len != 1 || d.kind.is_horizontal())
            .collect();
        RawArray {
            dims,
            data: self.data,
        }
    }
}

/// Validate `selectors` against `dims` and return the dimensions a read with
/// them keeps, in order.
pub fn selected_dims(dims: &[Dimension], selectors: &[Selector]) -> GeoGridResult<Vec<Dimension>> {
    if selectors.len() != dims.len() {
        return Err(GeoGridError::InvalidSelection(format!(
            "{} selectors for {} dimensions",
            selectors.len(),
            dims.len()
        )));
    }
    let mut kept = Vec::new();
    for (sel, dim) in selectors.iter().zip(dims) {
        match sel {
            Selector::Index(i) if *i >= dim.len => {
                return Err(GeoGridError::InvalidSelection(format!(
                    "index {} out of range for dimension '{}' of length {}",
                    i, dim.name, dim.len
                )));
            }
            Selector::Index(_) => {}
            Selector::All => kept.push(dim.clone()),
        }
    }
    Ok(kept)
}

fn strides(shape: &[usize]) -> Vec<usize> {
    let mut strides = vec![1usize; shape.len()];
    for axis in (0..shape.len().saturating_sub(1)).rev() {
        strides[axis] = strides[axis + 1] * shape[axis + 1];
    }
    strides
}
