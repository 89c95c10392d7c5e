/// Logistic function scaled by `amp`, its image is `(0, amp)`.
#[derive(Clone, Debug)]
pub struct Sigmoid {
    amp: f32,
}

impl Sigmoid {
    pub fn new(amp: f32) -> Self {
        Self { amp }
    }

    pub fn f(&self, z: f32) -> f32 {
        self.amp / (1. + (-z).exp())
    }

    pub fn df(&self, z: f32) -> f32 {
        let s = 1. / (1. + (-z).exp());
        self.amp * s * (1. - s)
    }
}

impl Default for Sigmoid {
    fn default() -> Self {
        Self::new(1.)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sigmoid_is_centered_and_bounded() {
        let s = Sigmoid::default();
        assert_eq!(s.f(0.), 0.5);
        assert!(s.f(40.) <= 1.);
        assert!(s.f(-40.) >= 0.);
        assert!((s.df(0.) - 0.25).abs() < 1e-6);
    }
}
