use ndarray::Array2;
use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

/// What a parameter is used for; initialisation and hooks may key on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamRole {
    /// Embedding lookup table
    Embedding,
    /// Input-to-hidden or hidden-to-hidden matrix of a recurrent cell
    RecurrentWeight,
    /// Dense projection matrix
    Weight,
    Bias,
}

/// A learnable tensor together with its gradient buffer.
#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub role: ParamRole,
    pub data: Array2<f32>,
    pub grad: Array2<f32>,
}

impl Param {
    pub fn new(name: impl Into<String>, role: ParamRole, data: Array2<f32>) -> Self {
        let grad = Array2::zeros(data.raw_dim());
        Self {
            name: name.into(),
            role,
            data,
            grad,
        }
    }

    pub fn zeros(name: impl Into<String>, role: ParamRole, shape: (usize, usize)) -> Self {
        Self::new(name, role, Array2::zeros(shape))
    }

    /// Parameter sampled element-wise from N(0, std).
    pub fn normal<R: Rng + ?Sized>(
        name: impl Into<String>,
        role: ParamRole,
        shape: (usize, usize),
        std: f32,
        rng: &mut R,
    ) -> Self {
        Self::new(name, role, normal_matrix(shape, std, rng))
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn zero_grad(&mut self) {
        self.grad.fill(0.0);
    }
}

pub fn normal_matrix<R: Rng + ?Sized>(shape: (usize, usize), std: f32, rng: &mut R) -> Array2<f32> {
    let normal = Normal::new(0.0, std).expect("std must be finite and non-negative");
    Array2::from_shape_fn(shape, |_| normal.sample(&mut *rng))
}

/// Anything that exposes learnable parameters in a stable order.
///
/// The optimizer and its hooks only ever see a model through this trait.
pub trait Parameterized {
    fn parameters(&self) -> Vec<&Param>;

    fn parameters_mut(&mut self) -> Vec<&mut Param>;

    fn num_parameters(&self) -> usize {
        self.parameters().iter().map(|p| p.len()).sum()
    }

    fn zero_grad(&mut self) {
        for param in self.parameters_mut() {
            param.zero_grad();
        }
    }
}

/// A tensor keyed by its parameter name.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct NamedTensor {
    pub name: String,
    pub data: Array2<f32>,
}

/// Snapshot of a model's parameter values, in canonical parameter order.
///
/// This is the payload written into checkpoints; gradients and recurrent
/// state are never part of it.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct ParameterSet {
    pub tensors: Vec<NamedTensor>,
}

impl ParameterSet {
    pub fn from_params<'a>(params: impl IntoIterator<Item = &'a Param>) -> Self {
        Self {
            tensors: params
                .into_iter()
                .map(|p| NamedTensor {
                    name: p.name.clone(),
                    data: p.data.clone(),
                })
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Array2<f32>> {
        self.tensors.iter().find(|t| t.name == name).map(|t| &t.data)
    }

    pub fn num_values(&self) -> usize {
        self.tensors.iter().map(|t| t.data.len()).sum()
    }
}
