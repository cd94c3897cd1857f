use resect_core::DescriberType;

/// Checks that a consensus is backed by enough evidence to be trusted.
///
/// Every inlier is weighted by the reliability of its describer and the total must
/// exceed `min_samples`. Natural features weigh a fraction of a sample, so they need
/// about seven times the minimal sample, while a few fiducial markers are enough.
pub fn has_strong_support(
    inliers: &[usize],
    describer_types: &[DescriberType],
    min_samples: usize,
) -> bool {
    let weight: f64 = inliers
        .iter()
        .filter_map(|&i| describer_types.get(i))
        .map(|describer| describer.support_weight())
        .sum();
    weight > min_samples as f64
}
