//! Weight initializers
//!
//! Each initializer is a closure that fills a freshly allocated parameter
//! tensor. Randomized ones own their generator; [`split`] derives one from a
//! shared seeded `StdRng` so that several initializers of the same layer can
//! draw from a single seed reproducibly.

use rand::distributions::Uniform;
use rand::prelude::Distribution;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::tensor::Tensor;

/// Independent generator seeded from the next value of `rng`
pub fn split<G: Rng + ?Sized>(rng: &mut G) -> StdRng {
    StdRng::seed_from_u64(rng.gen())
}

/// Draw every element uniformly from `[low, high)`
pub fn uniform<G: Rng>(low: f32, high: f32, mut rng: G) -> impl FnOnce(&mut Tensor<2>) {
    move |t| {
        let dist = Uniform::new(low, high);
        t.iter_mut().for_each(|x| *x = dist.sample(&mut rng));
    }
}

/// Uniform in `[-1, 1)` scaled by `sqrt(2 / fan_in)`, where `fan_in` is the row count
pub fn he_uniform<G: Rng>(mut rng: G) -> impl FnOnce(&mut Tensor<2>) {
    move |t| {
        let fan_in = t.rows().max(1);
        let scale = (2.0 / fan_in as f32).sqrt();
        let dist = Uniform::new(-1.0f32, 1.0);
        t.iter_mut().for_each(|x| *x = dist.sample(&mut rng) * scale);
    }
}

pub fn zeros() -> impl FnOnce(&mut Tensor<2>) {
    |t| t.fill(0.0)
}

pub fn constant(value: f32) -> impl FnOnce(&mut Tensor<2>) {
    move |t| t.fill(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_range_and_seed() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut a = Tensor::new([8, 4]);
        uniform(-0.1, 0.1, &mut rng)(&mut a);
        assert!(a.iter().all(|&x| (-0.1..0.1).contains(&x)));

        let mut rng = StdRng::seed_from_u64(1);
        let mut b = Tensor::new([8, 4]);
        uniform(-0.1, 0.1, &mut rng)(&mut b);
        assert_eq!(a, b);
    }

    #[test]
    fn test_he_uniform_scale() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut w = Tensor::new([50, 10]);
        he_uniform(&mut rng)(&mut w);
        let bound = (2.0f32 / 50.0).sqrt();
        assert!(w.iter().all(|&x| x.abs() <= bound));
        assert!(w.iter().any(|&x| x != 0.0));
    }

    #[test]
    fn test_split_feeds_two_initializers_from_one_seed() {
        let draw = || {
            let mut rng = StdRng::seed_from_u64(5);
            let mut w = Tensor::new([3, 2]);
            let mut b = Tensor::new([1, 2]);
            let init_w = uniform(-1.0, 1.0, split(&mut rng));
            let init_b = uniform(-0.5, 0.5, split(&mut rng));
            init_w(&mut w);
            init_b(&mut b);
            (w, b)
        };

        let (w1, b1) = draw();
        let (w2, b2) = draw();
        assert_eq!(w1, w2);
        assert_eq!(b1, b2);
        assert!(b1.iter().all(|&x| (-0.5..0.5).contains(&x)));
        assert_ne!(w1.row(0), b1.row(0));
    }

    #[test]
    fn test_constant_and_zeros() {
        let mut t = Tensor::new([2, 2]);
        constant(0.25)(&mut t);
        assert_eq!(t.data(), &[0.25; 4]);
        zeros()(&mut t);
        assert_eq!(t.data(), &[0.0; 4]);
    }
}
