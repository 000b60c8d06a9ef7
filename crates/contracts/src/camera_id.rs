//! CameraId - validated camera slot identifier
//!
//! Camera ids come from the HAL as plain integers. They are validated once at
//! the API boundary; everything past it works with `CameraId`.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Number of camera slots a selector can address.
pub const CAMERA_ID_MAX: u8 = 8;

/// Camera slot identifier in `0..CAMERA_ID_MAX`.
///
/// # Examples
/// ```
/// use contracts::CameraId;
///
/// let master = CameraId::new(0).unwrap();
/// assert_eq!(master.index(), 0);
/// assert!(CameraId::new(8).is_none());
/// assert!(CameraId::try_from(-1).is_err());
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CameraId(u8);

impl CameraId {
    /// Main rear camera, the usual dual master.
    pub const BACK: CameraId = CameraId(0);
    pub const FRONT: CameraId = CameraId(1);
    /// Second rear camera, the usual dual slave.
    pub const BACK_1: CameraId = CameraId(2);

    /// Create a CameraId, `None` when out of range.
    #[inline]
    pub fn new(raw: u8) -> Option<Self> {
        (raw < CAMERA_ID_MAX).then_some(Self(raw))
    }

    /// Slot index.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<i32> for CameraId {
    type Error = crate::ContractError;

    fn try_from(raw: i32) -> Result<Self, Self::Error> {
        u8::try_from(raw)
            .ok()
            .and_then(CameraId::new)
            .ok_or_else(|| {
                crate::ContractError::invalid_operation(format!(
                    "camera id {raw} out of range 0..{CAMERA_ID_MAX}"
                ))
            })
    }
}

impl fmt::Display for CameraId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CAM{}", self.0)
    }
}

impl fmt::Debug for CameraId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CameraId({})", self.0)
    }
}

impl Serialize for CameraId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u8(self.0)
    }
}

impl<'de> Deserialize<'de> for CameraId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = u8::deserialize(deserializer)?;
        CameraId::new(raw).ok_or_else(|| {
            serde::de::Error::custom(format!("camera id {raw} out of range 0..{CAMERA_ID_MAX}"))
        })
    }
}
