//! Size accounting for compression results.

const MIB: f64 = 1_048_576.0;

/// Before/after sizes of a compressed document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionReport {
    pub original_size: usize,
    pub compressed_size: usize,
}

impl CompressionReport {
    pub fn new(original_size: usize, compressed_size: usize) -> Self {
        Self {
            original_size,
            compressed_size,
        }
    }

    /// `(original - compressed) / original * 100`. Negative when the output
    /// grew; zero for an empty original.
    pub fn reduction_percent(&self) -> f64 {
        if self.original_size == 0 {
            return 0.0;
        }
        let original = self.original_size as f64;
        (original - self.compressed_size as f64) / original * 100.0
    }

    pub fn original_mib(&self) -> f64 {
        self.original_size as f64 / MIB
    }

    pub fn compressed_mib(&self) -> f64 {
        self.compressed_size as f64 / MIB
    }

    /// e.g. `Reduced by 25.0% (4.00MB → 3.00MB)`.
    pub fn summary(&self) -> String {
        format!(
            "Reduced by {:.1}% ({:.2}MB → {:.2}MB)",
            self.reduction_percent(),
            self.original_mib(),
            self.compressed_mib()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quarter_reduction() {
        let r = CompressionReport::new(4 * 1_048_576, 3 * 1_048_576);
        assert_eq!(r.reduction_percent(), 25.0);
        assert_eq!(r.summary(), "Reduced by 25.0% (4.00MB → 3.00MB)");
    }

    #[test]
    fn one_decimal_rounding() {
        let r = CompressionReport::new(3000, 2000);
        assert_eq!(format!("{:.1}", r.reduction_percent()), "33.3");
        assert!(r.summary().starts_with("Reduced by 33.3% (0.00MB"));
    }

    #[test]
    fn growth_is_negative() {
        let r = CompressionReport::new(1000, 1100);
        assert!(r.reduction_percent() < 0.0);
        assert!(r.summary().contains("-10.0%"), "got: {}", r.summary());
    }

    #[test]
    fn empty_original_is_zero() {
        assert_eq!(CompressionReport::new(0, 10).reduction_percent(), 0.0);
    }
}
