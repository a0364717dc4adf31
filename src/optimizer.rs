use std::fmt;
use std::str::FromStr;

use ndarray::{Array2, Zip};
use tracing::debug;

use crate::adam::Adam;
use crate::errors::{ModelError, Result};
use crate::hooks::UpdateHook;
use crate::param::{Param, Parameterized};

const EPSILON: f32 = 1e-8;
const RMSPROP_ALPHA: f32 = 0.99;

/// Update rules selectable by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateRule {
    /// Plain SGD: `w -= lr * g`
    Sgd,
    /// Momentum SGD: `v = mu * v - lr * g; w += v`
    MomentumSgd,
    /// Nesterov accelerated gradient
    Nesterov,
    Adam,
    AdaGrad,
    RmsProp,
}

impl UpdateRule {
    pub fn name(&self) -> &'static str {
        match self {
            UpdateRule::Sgd => "sgd",
            UpdateRule::MomentumSgd => "msgd",
            UpdateRule::Nesterov => "nesterov",
            UpdateRule::Adam => "adam",
            UpdateRule::AdaGrad => "adagrad",
            UpdateRule::RmsProp => "rmsprop",
        }
    }
}

impl fmt::Display for UpdateRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for UpdateRule {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sgd" => Ok(UpdateRule::Sgd),
            "msgd" | "momentum" | "momentum_sgd" => Ok(UpdateRule::MomentumSgd),
            "nesterov" | "nag" => Ok(UpdateRule::Nesterov),
            "adam" => Ok(UpdateRule::Adam),
            "adagrad" => Ok(UpdateRule::AdaGrad),
            "rmsprop" => Ok(UpdateRule::RmsProp),
            other => Err(ModelError::InvalidConfig {
                message: format!("unknown update rule '{other}'"),
            }),
        }
    }
}

/// Per-parameter state of the update rule.
#[derive(Debug, Clone)]
enum Slot {
    Stateless,
    Velocity(Array2<f32>),
    Moments(Adam),
    SquaredSum(Array2<f32>),
}

impl Slot {
    fn for_rule(rule: UpdateRule, shape: (usize, usize)) -> Self {
        match rule {
            UpdateRule::Sgd => Slot::Stateless,
            UpdateRule::MomentumSgd | UpdateRule::Nesterov => Slot::Velocity(Array2::zeros(shape)),
            UpdateRule::Adam => Slot::Moments(Adam::new(shape)),
            UpdateRule::AdaGrad | UpdateRule::RmsProp => Slot::SquaredSum(Array2::zeros(shape)),
        }
    }
}

/// Applies a named update rule to every parameter of a bound model.
///
/// The optimizer never owns parameters: [`bind`](Optimizer::bind) sizes its
/// per-parameter state from the model and [`step`](Optimizer::step) borrows
/// the model for the duration of one update.
pub struct Optimizer {
    rule: UpdateRule,
    learning_rate: f32,
    momentum: f32,
    hooks: Vec<Box<dyn UpdateHook>>,
    slots: Vec<Slot>,
    shapes: Vec<(usize, usize)>,
    timestep: usize,
}

impl fmt::Debug for Optimizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Optimizer")
            .field("rule", &self.rule)
            .field("learning_rate", &self.learning_rate)
            .field("momentum", &self.momentum)
            .field("hooks", &self.hook_names())
            .field("tensors", &self.slots.len())
            .field("timestep", &self.timestep)
            .finish()
    }
}

impl Optimizer {
    pub fn configure(rule_name: &str, learning_rate: f32, momentum: f32) -> Result<Self> {
        let rule = rule_name.parse::<UpdateRule>()?;
        if !(learning_rate.is_finite() && learning_rate > 0.0) {
            return Err(ModelError::InvalidConfig {
                message: format!("learning rate must be positive, got {learning_rate}"),
            });
        }
        Ok(Self {
            rule,
            learning_rate,
            momentum,
            hooks: Vec::new(),
            slots: Vec::new(),
            shapes: Vec::new(),
            timestep: 0,
        })
    }

    /// Allocates update state for every parameter of `model`, discarding any previous state.
    pub fn bind<M: Parameterized + ?Sized>(&mut self, model: &M) {
        self.shapes = model.parameters().iter().map(|p| p.data.dim()).collect();
        self.slots = self
            .shapes
            .iter()
            .map(|&shape| Slot::for_rule(self.rule, shape))
            .collect();
        self.timestep = 0;
        debug!(rule = %self.rule, tensors = self.slots.len(), "Optimizer bound to model");
    }

    /// Hooks run in insertion order before the update rule.
    pub fn add_pre_update_hook(&mut self, hook: Box<dyn UpdateHook>) {
        debug!(hook = hook.name(), "Pre-update hook installed");
        self.hooks.push(hook);
    }

    pub fn hook_names(&self) -> Vec<&str> {
        self.hooks.iter().map(|h| h.name()).collect()
    }

    pub fn rule(&self) -> UpdateRule {
        self.rule
    }

    pub fn learning_rate(&self) -> f32 {
        self.learning_rate
    }

    pub fn set_learning_rate(&mut self, learning_rate: f32) {
        self.learning_rate = learning_rate;
    }

    /// Multiplies the learning rate by `factor`, never going below `final_value`.
    pub fn decrease_learning_rate(&mut self, factor: f32, final_value: f32) -> f32 {
        self.learning_rate = (self.learning_rate * factor).max(final_value);
        self.learning_rate
    }

    /// Number of updates applied since the last bind.
    pub fn update_count(&self) -> usize {
        self.timestep
    }

    /// Runs the hooks over the accumulated gradients, then updates every parameter.
    pub fn step<M: Parameterized + ?Sized>(&mut self, model: &mut M) -> Result<()> {
        let mut params = model.parameters_mut();
        let bound = params.len() == self.shapes.len()
            && params.iter().zip(&self.shapes).all(|(p, &shape)| p.data.dim() == shape);
        if !bound {
            return Err(ModelError::GradientError {
                message: "optimizer is not bound to this model; call bind() first".to_string(),
            });
        }

        for hook in &mut self.hooks {
            hook.apply(&mut params);
        }

        self.timestep += 1;
        let rule = self.rule;
        let lr = self.learning_rate;
        let momentum = self.momentum;
        for (param, slot) in params.iter_mut().zip(&mut self.slots) {
            Self::update(rule, param, slot, lr, momentum, self.timestep);
        }
        Ok(())
    }

    fn update(rule: UpdateRule, param: &mut Param, slot: &mut Slot, lr: f32, momentum: f32, timestep: usize) {
        match (rule, slot) {
            (UpdateRule::MomentumSgd, Slot::Velocity(velocity)) => {
                Zip::from(&mut param.data)
                    .and(velocity)
                    .and(&param.grad)
                    .for_each(|w, v, &g| {
                        *v = momentum * *v - lr * g;
                        *w += *v;
                    });
            }
            (UpdateRule::Nesterov, Slot::Velocity(velocity)) => {
                Zip::from(&mut param.data)
                    .and(velocity)
                    .and(&param.grad)
                    .for_each(|w, v, &g| {
                        *v = momentum * *v - lr * g;
                        *w += momentum * momentum * *v - (1.0 + momentum) * lr * g;
                    });
            }
            (_, Slot::Moments(adam)) => adam.step(&mut param.data, &param.grad, lr, timestep),
            (UpdateRule::RmsProp, Slot::SquaredSum(mean_square)) => {
                Zip::from(&mut param.data)
                    .and(mean_square)
                    .and(&param.grad)
                    .for_each(|w, ms, &g| {
                        *ms = RMSPROP_ALPHA * *ms + (1.0 - RMSPROP_ALPHA) * g * g;
                        *w -= lr * g / (ms.sqrt() + EPSILON);
                    });
            }
            (_, Slot::SquaredSum(sum)) => {
                Zip::from(&mut param.data)
                    .and(sum)
                    .and(&param.grad)
                    .for_each(|w, h, &g| {
                        *h += g * g;
                        *w -= lr * g / (h.sqrt() + EPSILON);
                    });
            }
            (_, _) => {
                param.data.zip_mut_with(&param.grad, |w, &g| *w -= lr * g);
            }
        }
    }
}
