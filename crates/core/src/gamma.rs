//! Power-law tone curve tables for the gamma LUT block.
//!
//! The table is a pure function of `(size, exponent)`; nothing here touches hardware.

/// Smallest LUT the gamma block is built with.
pub const GAMMA_LUT_MIN_SIZE: usize = 16;
/// Largest LUT the gamma block is built with.
pub const GAMMA_LUT_MAX_SIZE: usize = 4096;

/// Rejected gamma table parameters.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GammaError {
    #[error(
        "gamma LUT size {0} must be a power of two in {min}..={max}",
        min = GAMMA_LUT_MIN_SIZE,
        max = GAMMA_LUT_MAX_SIZE
    )]
    InvalidSize(usize),
    #[error("gamma exponent {0} must be finite and greater than zero")]
    InvalidExponent(f64),
}

/// Tone curve table: `entry[i] = round((i / N)^gamma * N)`, clamped to `N - 1`.
///
/// An `N`-entry LUT indexes with `log2(N)` bits and stores values of the same width, so
/// `N - 1` is the largest representable entry.
///
/// # Example
/// ```rust
/// use vidpipe_core::gamma::GammaTable;
///
/// let table = GammaTable::compute(256, 0.45).unwrap();
/// assert_eq!(table.entries()[0], 0);
/// assert_eq!(table.entries()[255], table.max_value());
/// assert_eq!(table.max_value(), 255);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct GammaTable {
    entries: Vec<u16>,
    exponent: f64,
}

impl GammaTable {
    /// Compute the table for an `size`-entry LUT.
    pub fn compute(size: usize, exponent: f64) -> Result<Self, GammaError> {
        validate_size(size)?;
        validate_exponent(exponent)?;
        let n = size as f64;
        let max = (size - 1) as f64;
        let entries = (0..size)
            .map(|i| {
                let v = ((i as f64 / n).powf(exponent) * n).round();
                v.clamp(0.0, max) as u16
            })
            .collect();
        Ok(Self { entries, exponent })
    }

    pub fn entries(&self) -> &[u16] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn exponent(&self) -> f64 {
        self.exponent
    }

    /// Largest value the LUT can hold.
    pub fn max_value(&self) -> u16 {
        (self.entries.len() - 1) as u16
    }
}

pub fn validate_size(size: usize) -> Result<(), GammaError> {
    if !size.is_power_of_two() || !(GAMMA_LUT_MIN_SIZE..=GAMMA_LUT_MAX_SIZE).contains(&size) {
        return Err(GammaError::InvalidSize(size));
    }
    Ok(())
}

pub fn validate_exponent(exponent: f64) -> Result<(), GammaError> {
    if !exponent.is_finite() || exponent <= 0.0 {
        return Err(GammaError::InvalidExponent(exponent));
    }
    Ok(())
}
