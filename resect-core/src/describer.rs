use core::fmt;
use core::str::FromStr;
use thiserror::Error;

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// The kind of describer an image observation was extracted with.
///
/// Natural image features are ambiguous and repeat across a scene, while fiducial
/// markers carry an identity. The difference matters when deciding whether an inlier
/// set is trustworthy, see [`DescriberType::support_weight`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub enum DescriberType {
    Sift,
    SiftFloat,
    Akaze,
    AkazeLiop,
    AkazeMldb,
    Orb,
    Cctag3,
    Cctag4,
    AprilTag16h5,
    Unknown,
}

impl DescriberType {
    /// All the known describers.
    pub const ALL: [DescriberType; 10] = [
        DescriberType::Sift,
        DescriberType::SiftFloat,
        DescriberType::Akaze,
        DescriberType::AkazeLiop,
        DescriberType::AkazeMldb,
        DescriberType::Orb,
        DescriberType::Cctag3,
        DescriberType::Cctag4,
        DescriberType::AprilTag16h5,
        DescriberType::Unknown,
    ];

    /// Returns true for fiducial markers.
    pub fn is_marker(self) -> bool {
        matches!(
            self,
            DescriberType::Cctag3 | DescriberType::Cctag4 | DescriberType::AprilTag16h5
        )
    }

    /// How much one inlier of this type counts towards strong geometric support.
    ///
    /// A marker counts as a full sample. A natural feature only counts as a fraction
    /// of one, so a few lucky feature matches cannot validate a pose.
    pub fn support_weight(self) -> f64 {
        if self.is_marker() {
            1.0
        } else {
            0.14
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DescriberType::Sift => "sift",
            DescriberType::SiftFloat => "sift_float",
            DescriberType::Akaze => "akaze",
            DescriberType::AkazeLiop => "akaze_liop",
            DescriberType::AkazeMldb => "akaze_mldb",
            DescriberType::Orb => "orb",
            DescriberType::Cctag3 => "cctag3",
            DescriberType::Cctag4 => "cctag4",
            DescriberType::AprilTag16h5 => "tag16h5",
            DescriberType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for DescriberType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown describer type: {0}")]
pub struct UnknownDescriberType(pub String);

impl FromStr for DescriberType {
    type Err = UnknownDescriberType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        DescriberType::ALL
            .iter()
            .copied()
            .find(|describer| describer.as_str() == lower)
            .ok_or(UnknownDescriberType(lower))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_name_back() {
        for describer in DescriberType::ALL {
            assert_eq!(describer.as_str().parse::<DescriberType>(), Ok(describer));
        }
        assert_eq!("CCTAG3".parse::<DescriberType>(), Ok(DescriberType::Cctag3));
        assert!("surf".parse::<DescriberType>().is_err());
    }

    #[test]
    fn markers_weigh_a_full_sample() {
        assert_eq!(DescriberType::Cctag4.support_weight(), 1.0);
        assert!(DescriberType::Sift.support_weight() < 1.0);
    }
}
