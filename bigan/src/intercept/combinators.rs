use std::num::NonZeroUsize;

use super::{Interceptor, Iteration};
use crate::Result;

/// Calls every interceptor in order. The first error stops the chain and is returned.
pub struct Combined {
    interceptors: Vec<Box<dyn Interceptor>>,
}

impl Combined {
    pub fn new(interceptors: Vec<Box<dyn Interceptor>>) -> Self {
        Self { interceptors }
    }

    /// Appends an interceptor at the end of the chain.
    pub fn push(&mut self, interceptor: Box<dyn Interceptor>) {
        self.interceptors.push(interceptor);
    }

    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }
}

impl Interceptor for Combined {
    fn intercept(&mut self, iteration: &Iteration<'_>) -> Result<()> {
        for interceptor in &mut self.interceptors {
            interceptor.intercept(iteration)?;
        }

        Ok(())
    }
}

/// Calls the inner interceptor on the last iteration of every block of `steps`, that is when
/// `it % steps == steps - 1`.
pub struct Skip<I> {
    steps: NonZeroUsize,
    inner: I,
}

impl<I: Interceptor> Interceptor for Skip<I> {
    fn intercept(&mut self, iteration: &Iteration<'_>) -> Result<()> {
        let steps = self.steps.get();
        if iteration.it % steps >= steps - 1 {
            return self.inner.intercept(iteration);
        }

        Ok(())
    }
}

/// Calls the inner interceptor from iteration `start` onwards.
pub struct Offset<I> {
    start: usize,
    inner: I,
}

impl<I: Interceptor> Interceptor for Offset<I> {
    fn intercept(&mut self, iteration: &Iteration<'_>) -> Result<()> {
        if iteration.it >= self.start {
            return self.inner.intercept(iteration);
        }

        Ok(())
    }
}

/// Chains interceptors, see `Combined`.
pub fn combine<I>(interceptors: I) -> Combined
where
    I: IntoIterator<Item = Box<dyn Interceptor>>,
{
    Combined::new(interceptors.into_iter().collect())
}

/// Fires `inner` every `steps` iterations, see `Skip`.
pub fn skip<I: Interceptor>(steps: NonZeroUsize, inner: I) -> Skip<I> {
    Skip { steps, inner }
}

/// Fires `inner` from iteration `start` onwards, see `Offset`.
pub fn offset<I: Interceptor>(start: usize, inner: I) -> Offset<I> {
    Offset { start, inner }
}
