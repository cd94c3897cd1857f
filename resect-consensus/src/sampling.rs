use rand::{seq::index, Rng};

/// Draws `size` distinct entries of `population` uniformly.
///
/// Falls back to the whole population when it is too small.
pub(crate) fn uniform_sample<R: Rng + ?Sized>(
    rng: &mut R,
    size: usize,
    population: &[usize],
    sample: &mut Vec<usize>,
) {
    sample.clear();
    if population.len() <= size {
        sample.extend_from_slice(population);
        return;
    }
    sample.extend(
        index::sample(rng, population.len(), size)
            .into_iter()
            .map(|i| population[i]),
    );
}

/// Draws `size` distinct indices in `0..total` uniformly.
pub(crate) fn uniform_indices<R: Rng + ?Sized>(
    rng: &mut R,
    size: usize,
    total: usize,
    sample: &mut Vec<usize>,
) {
    sample.clear();
    if total <= size {
        sample.extend(0..total);
        return;
    }
    sample.extend(index::sample(rng, total, size).into_iter());
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg64;

    #[test]
    fn samples_are_distinct_members() {
        let mut rng = Pcg64::seed_from_u64(3);
        let population = [4, 8, 15, 16, 23, 42];
        let mut sample = Vec::new();
        for _ in 0..50 {
            uniform_sample(&mut rng, 3, &population, &mut sample);
            assert_eq!(sample.len(), 3);
            assert!(sample.iter().all(|s| population.contains(s)));
            let mut sorted = sample.clone();
            sorted.sort_unstable();
            sorted.dedup();
            assert_eq!(sorted.len(), 3);
        }
        uniform_indices(&mut rng, 10, 4, &mut sample);
        assert_eq!(sample, vec![0, 1, 2, 3]);
    }
}
