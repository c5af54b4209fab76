use nalgebra::DVector;

/// Plain SGD with L2 shrinkage: `param += lr * (direction - reg * param)`.
///
/// `direction` is the error-weighted term of the update; the penalty is always
/// taken against the parameter's value before the step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sgd {
    learning_rate: f64,
    regularization: f64,
}

impl Sgd {
    pub fn new(learning_rate: f64, regularization: f64) -> Self {
        Self {
            learning_rate,
            regularization,
        }
    }

    pub fn step_scalar(&self, param: &mut f64, direction: f64) {
        *param += self.learning_rate * (direction - self.regularization * *param);
    }

    pub fn step(&self, params: &mut DVector<f64>, direction: &DVector<f64>) {
        let update = (direction - params.scale(self.regularization)) * self.learning_rate;
        *params += update;
    }
}
