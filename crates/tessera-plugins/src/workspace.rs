use std::any::Any;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tessera_kernel::Workspace;
use thiserror::Error;

pub const WORKSPACE_2D: &str = "Workspace2D";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShapeError {
    #[error("spectrum has {y} counts but {e} errors")]
    ErrorLength { y: usize, e: usize },
    #[error("spectrum has {y} counts, so it needs {y} or {} x values, found {x}", .y + 1)]
    XLength { x: usize, y: usize },
    #[error("{len} values cannot be split evenly into {spectra} spectra")]
    Uneven { len: usize, spectra: usize },
}

/// One row of a [`Workspace2D`]: x values (bin edges or points), counts
/// and their errors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Spectrum {
    x: Vec<f64>,
    y: Vec<f64>,
    e: Vec<f64>,
}

impl Spectrum {
    pub fn new(x: Vec<f64>, y: Vec<f64>, e: Vec<f64>) -> Result<Self, ShapeError> {
        if e.len() != y.len() {
            return Err(ShapeError::ErrorLength {
                y: y.len(),
                e: e.len(),
            });
        }
        if x.len() != y.len() && x.len() != y.len() + 1 {
            return Err(ShapeError::XLength {
                x: x.len(),
                y: y.len(),
            });
        }
        Ok(Self { x, y, e })
    }

    pub fn x(&self) -> &[f64] {
        &self.x
    }

    pub fn y(&self) -> &[f64] {
        &self.y
    }

    pub fn e(&self) -> &[f64] {
        &self.e
    }

    /// Mutable counts and errors together; x values stay fixed.
    pub fn data_mut(&mut self) -> (&mut [f64], &mut [f64]) {
        (&mut self.y, &mut self.e)
    }

    /// Whether `x` holds bin edges rather than point positions.
    pub fn is_histogram(&self) -> bool {
        self.x.len() == self.y.len() + 1
    }

    pub fn total(&self) -> f64 {
        self.y.iter().sum()
    }

    fn memory_size(&self) -> usize {
        (self.x.len() + self.y.len() + self.e.len()) * std::mem::size_of::<f64>()
    }
}

/// Titled collection of spectra sharing an x unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Workspace2D {
    title: String,
    unit_x: String,
    spectra: Vec<Spectrum>,
}

impl Workspace2D {
    pub fn new(spectra: Vec<Spectrum>) -> Self {
        Self {
            spectra,
            ..Self::default()
        }
    }

    /// Splits flat arrays into `nspec` spectra. `x` is either shared by
    /// every spectrum or given per spectrum; missing errors are zero.
    pub fn from_flat(
        x: &[f64],
        y: &[f64],
        e: Option<&[f64]>,
        nspec: usize,
    ) -> Result<Self, ShapeError> {
        let nspec = nspec.max(1);
        if y.len() % nspec != 0 {
            return Err(ShapeError::Uneven {
                len: y.len(),
                spectra: nspec,
            });
        }
        let per_y = y.len() / nspec;
        let shared_x = x.len() == per_y || x.len() == per_y + 1;
        if !shared_x && x.len() % nspec != 0 {
            return Err(ShapeError::Uneven {
                len: x.len(),
                spectra: nspec,
            });
        }
        let per_x = if shared_x { x.len() } else { x.len() / nspec };
        if let Some(e) = e {
            if e.len() != y.len() {
                return Err(ShapeError::ErrorLength {
                    y: y.len(),
                    e: e.len(),
                });
            }
        }

        let spectra = (0..nspec)
            .map(|index| {
                let xs = if shared_x {
                    x.to_vec()
                } else {
                    x[index * per_x..(index + 1) * per_x].to_vec()
                };
                let range = index * per_y..(index + 1) * per_y;
                let es = match e {
                    Some(e) => e[range.clone()].to_vec(),
                    None => vec![0.0; per_y],
                };
                Spectrum::new(xs, y[range].to_vec(), es)
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(spectra))
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_unit_x(mut self, unit: impl Into<String>) -> Self {
        self.unit_x = unit.into();
        self
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn unit_x(&self) -> &str {
        &self.unit_x
    }

    pub fn spectra(&self) -> &[Spectrum] {
        &self.spectra
    }

    pub fn spectra_mut(&mut self) -> &mut [Spectrum] {
        &mut self.spectra
    }

    pub fn spectrum(&self, index: usize) -> Option<&Spectrum> {
        self.spectra.get(index)
    }

    pub fn num_spectra(&self) -> usize {
        self.spectra.len()
    }

    /// Same title and unit, different spectra.
    pub fn with_spectra(&self, spectra: Vec<Spectrum>) -> Self {
        Self {
            title: self.title.clone(),
            unit_x: self.unit_x.clone(),
            spectra,
        }
    }
}

impl Workspace for Workspace2D {
    fn id(&self) -> &'static str {
        WORKSPACE_2D
    }

    fn memory_size(&self) -> usize {
        self.title.len()
            + self.unit_x.len()
            + self.spectra.iter().map(Spectrum::memory_size).sum::<usize>()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}
