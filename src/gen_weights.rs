use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// Generate the weight vector where each vertex has the same weight
pub fn gen_uniform_weights(no_of_vertices: usize) -> Vec<f64> {
    vec![1.0; no_of_vertices]
}

/// Generate a seeded random weight vector with weights in
/// `[min_weight, max_weight)`.
pub fn gen_random_weights(
    no_of_vertices: usize,
    min_weight: f64,
    max_weight: f64,
    seed: u64,
) -> Vec<f64> {
    if max_weight <= min_weight {
        panic!("Max weight must be greater than min weight.");
    }

    if min_weight <= 0.0 {
        panic!("Min weight must be positive.");
    }
    let mut rng = SmallRng::seed_from_u64(seed);

    let random_weights: Vec<f64> = (0..no_of_vertices)
        .map(|_| rng.gen_range(min_weight..max_weight))
        .collect();

    random_weights
}
