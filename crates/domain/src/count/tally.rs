use super::CountError;

/// Expected versus actual quantity of one counted item.
///
/// `expected` is a snapshot taken when the line was added and is never
/// recomputed. The discrepancy is always derived, never stored here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tally {
    expected: i32,
    actual: i32,
}

impl Tally {
    pub fn new(expected: i32, actual: i32) -> Result<Self, CountError> {
        if actual < 0 {
            return Err(CountError::NegativeQuantity { quantity: actual });
        }
        Ok(Self { expected, actual })
    }

    /// Rebuilds a tally from persisted quantities, which were validated on write.
    pub fn stored(expected: i32, actual: i32) -> Self {
        Self { expected, actual }
    }

    pub fn expected(&self) -> i32 {
        self.expected
    }

    pub fn actual(&self) -> i32 {
        self.actual
    }

    /// Same expected snapshot, new actual quantity.
    pub fn with_actual(&self, actual: i32) -> Result<Self, CountError> {
        Self::new(self.expected, actual)
    }

    pub fn discrepancy(&self) -> i32 {
        self.actual - self.expected
    }

    /// More than 10% off the expected quantity, or anything found where
    /// nothing was expected.
    pub fn has_significant_discrepancy(&self) -> bool {
        if self.expected == 0 {
            return self.actual > 0;
        }
        let off = i64::from(self.discrepancy()).abs() * 10;
        off > i64::from(self.expected)
    }

    /// Absolute discrepancy as a percentage of the expected quantity.
    ///
    /// A line with nothing expected is 100% off when anything was found.
    pub fn variance_percentage(&self) -> f64 {
        if self.expected == 0 {
            return if self.actual == 0 { 0.0 } else { 100.0 };
        }
        f64::from(self.discrepancy()).abs() / f64::from(self.expected) * 100.0
    }
}
