use crate::Result;

/// An update rule for a flat buffer of parameters.
pub trait Optimizer {
    /// Takes one step over `params` given their gradient.
    ///
    /// # Errors
    /// `MlErr::SizeMismatch` if `grad` and `params` have different lengths.
    fn update_params(&mut self, params: &mut [f32], grad: &[f32]) -> Result<()>;
}
