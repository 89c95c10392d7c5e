mod random;

pub use random::RandWeightGen;
