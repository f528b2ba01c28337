// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Conversion limits - single source of truth.
//!
//! Every tunable constant of the engine lives here. **NEVER hardcode elsewhere!**
//!
//! The map-value ceiling is fixed at compile time because each rung of the
//! bucket ladder is a separate monomorphization of the generic map code.
//!
//! | Feature              | `MAX_MAP_VALUE_SIZE` |
//! |----------------------|----------------------|
//! | (default)            | 2048 bytes           |
//! | `large-map-values`   | 65536 bytes          |

/// Smallest rung of the opaque value bucket ladder (bytes).
pub const MIN_BUCKET_SIZE: usize = 8;

/// Largest map value (bytes) the engine can carry through a map field.
///
/// A map whose value layout exceeds this fails with `MapValueTooLarge`.
#[cfg(not(feature = "large-map-values"))]
pub const MAX_MAP_VALUE_SIZE: usize = 2048;

/// Largest map value (bytes) the engine can carry through a map field.
///
/// A map whose value layout exceeds this fails with `MapValueTooLarge`.
#[cfg(feature = "large-map-values")]
pub const MAX_MAP_VALUE_SIZE: usize = 65536;

/// Alignments a map value bucket may have.
///
/// Map keys are 32/64-bit integers or text, so an entry is always 4- or
/// 8-byte aligned.
pub const BUCKET_ALIGNMENTS: [usize; 2] = [4, 8];

/// Iterate the bucket ladder sizes in ascending order.
pub fn bucket_sizes() -> impl Iterator<Item = usize> {
    std::iter::successors(Some(MIN_BUCKET_SIZE), |size| size.checked_mul(2))
        .take_while(|size| *size <= MAX_MAP_VALUE_SIZE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ladder_is_power_of_two_and_bounded() {
        let sizes: Vec<usize> = bucket_sizes().collect();
        assert_eq!(sizes.first(), Some(&MIN_BUCKET_SIZE));
        assert_eq!(sizes.last(), Some(&MAX_MAP_VALUE_SIZE));
        assert!(sizes.iter().all(|s| s.is_power_of_two()));
        assert!(sizes.windows(2).all(|w| w[1] == w[0] * 2));
    }
}
