use std::fmt;

/// Fixed-point currency amount with 2 decimal places (minor units),
/// stored as a scaled integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Amount(i64);

impl Amount {
    const SCALE: i64 = 100;

    pub const ZERO: Amount = Amount(0);

    /// Amount from whole currency units (e.g. naira).
    pub fn from_major(value: i64) -> Self {
        Amount(value * Self::SCALE)
    }

    /// Amount from minor units (e.g. kobo), as reported by the payment provider.
    pub fn from_minor(value: i64) -> Self {
        Amount(value)
    }

    pub fn from_float(value: f64) -> Self {
        Amount((value * Self::SCALE as f64).round() as i64)
    }

    pub fn minor_units(self) -> i64 {
        self.0
    }

    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// Split into (platform share, seller share) for a fee given in basis
    /// points. The platform share is rounded half-up; the remainder goes to
    /// the seller, so the two shares always sum back to the total.
    pub fn split_fee(self, fee_bps: u16) -> (Amount, Amount) {
        let fee = (i128::from(self.0) * i128::from(fee_bps) + 5_000) / 10_000;
        let platform = Amount(fee as i64);
        (platform, Amount(self.0 - platform.0))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.abs();
        let whole = abs / Self::SCALE;
        let frac = abs % Self::SCALE;
        write!(f, "{sign}{whole}.{frac:02}")
    }
}

impl std::ops::Add for Amount {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Amount(self.0 + rhs.0)
    }
}

impl std::ops::AddAssign for Amount {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl std::ops::SubAssign for Amount {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_major_scales_value() {
        assert_eq!(Amount::from_major(100), Amount(10_000));
        assert_eq!(Amount::from_major(0), Amount(0));
    }

    #[test]
    fn from_minor_preserves_value() {
        assert_eq!(Amount::from_minor(12_345), Amount(12_345));
    }

    #[test]
    fn from_float_rounds_correctly() {
        assert_eq!(Amount::from_float(1.005), Amount(101));
        assert_eq!(Amount::from_float(1.004), Amount(100));
        assert_eq!(Amount::from_float(-50.25), Amount(-5_025));
    }

    #[test]
    fn split_fee_fifteen_percent() {
        let (platform, seller) = Amount::from_major(10_000).split_fee(1_500);
        assert_eq!(platform, Amount::from_major(1_500));
        assert_eq!(seller, Amount::from_major(8_500));
    }

    #[test]
    fn split_fee_rounds_half_up() {
        // 15% of 0.30 = 0.045, rounds to 0.05
        let (platform, seller) = Amount::from_minor(30).split_fee(1_500);
        assert_eq!(platform, Amount::from_minor(5));
        assert_eq!(seller, Amount::from_minor(25));
    }

    #[test]
    fn split_fee_shares_sum_to_total() {
        for minor in [1, 7, 99, 10_001, 123_457] {
            let total = Amount::from_minor(minor);
            let (platform, seller) = total.split_fee(1_500);
            assert_eq!(platform + seller, total);
            assert!(platform >= Amount::ZERO);
            assert!(seller >= Amount::ZERO);
        }
    }

    #[test]
    fn split_fee_zero_rate_gives_all_to_seller() {
        let (platform, seller) = Amount::from_major(500).split_fee(0);
        assert_eq!(platform, Amount::ZERO);
        assert_eq!(seller, Amount::from_major(500));
    }

    #[test]
    fn display_formats_positive() {
        assert_eq!(Amount::from_major(100).to_string(), "100.00");
        assert_eq!(Amount::from_minor(150).to_string(), "1.50");
        assert_eq!(Amount::from_minor(1).to_string(), "0.01");
        assert_eq!(Amount::ZERO.to_string(), "0.00");
    }

    #[test]
    fn display_formats_negative() {
        assert_eq!(Amount::from_minor(-5_025).to_string(), "-50.25");
        assert_eq!(Amount::from_minor(-1).to_string(), "-0.01");
    }

    #[test]
    fn default_is_zero() {
        assert_eq!(Amount::default(), Amount::ZERO);
    }

    #[test]
    fn add_assign_and_sub_assign() {
        let mut a = Amount::from_minor(100);
        a += Amount::from_minor(50);
        assert_eq!(a, Amount::from_minor(150));
        a -= Amount::from_minor(30);
        assert_eq!(a, Amount::from_minor(120));
    }

    #[test]
    fn ordering() {
        assert!(Amount::from_minor(-100) < Amount::ZERO);
        assert!(Amount::ZERO < Amount::from_minor(100));
    }
}
