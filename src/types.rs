// 1.0: all the primitives live here. nothing in the engine works without these types.
// IDs, amounts, prices, timestamps. each is a newtype so the compiler catches type mixups.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};
use std::time::Duration;

/// Fractional digits carried by every ledger amount and price.
pub const AMOUNT_SCALE: u32 = 8;

/// Risk weights, stake risk and liquidation premium are fractions of this.
pub const FULL_WEIGHT: u8 = 255;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AccountId(pub u64);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "acct#{}", self.0)
    }
}

/// Asset identifier. `AssetId::NATIVE` is the chain's native coin, which
/// pools only see through its wrapped counterpart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AssetId(pub u32);

impl AssetId {
    pub const NATIVE: AssetId = AssetId(0);

    pub fn is_native(&self) -> bool {
        *self == Self::NATIVE
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_native() {
            write!(f, "asset#native")
        } else {
            write!(f, "asset#{}", self.0)
        }
    }
}

fn floor_to_scale(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(AMOUNT_SCALE, RoundingStrategy::ToNegativeInfinity)
}

// 1.1: signed fixed-point ledger amount. 8 fractional digits whatever the asset's
// native precision. every arithmetic result floors back to 8 digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Amount(Decimal);

impl Amount {
    pub const ZERO: Amount = Amount(Decimal::ZERO);

    pub fn new(value: Decimal) -> Self {
        Self(floor_to_scale(value))
    }

    /// From an integer count of 1e-8 units.
    pub fn from_units(units: i64) -> Self {
        Self(Decimal::new(units, AMOUNT_SCALE))
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }

    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    pub fn abs(&self) -> Self {
        Self(self.0.abs())
    }

    /// Clamps negatives to zero.
    pub fn positive_part(&self) -> Self {
        if self.is_positive() {
            *self
        } else {
            Self::ZERO
        }
    }

    /// `self * price`, floored. converts an asset amount into settlement units.
    pub fn mul_price(&self, price: Price) -> Self {
        Self::new(self.0 * price.value())
    }

    /// `floor(self / 255) * weight`. the integer haircut used for risk weights,
    /// stake risk and liquidation premium.
    pub fn haircut(&self, weight: u8) -> Self {
        let slice = floor_to_scale(self.0 / Decimal::from(FULL_WEIGHT));
        Self(slice * Decimal::from(weight))
    }

    /// `floor(self * part / whole)`. used for proportional fees.
    pub fn pro_rata(&self, part: Amount, whole: Amount) -> Self {
        if whole.is_zero() {
            return Self::ZERO;
        }
        Self::new(self.0 * part.0 / whole.0)
    }

    /// `ceil(self / price)`. the base amount needed to be worth `self`.
    pub fn div_price_ceil(&self, price: Price) -> Self {
        Self(
            (self.0 / price.value())
                .round_dp_with_strategy(AMOUNT_SCALE, RoundingStrategy::ToPositiveInfinity),
        )
    }
}

impl Add for Amount {
    type Output = Amount;
    fn add(self, rhs: Amount) -> Amount {
        Amount(self.0 + rhs.0)
    }
}

impl Sub for Amount {
    type Output = Amount;
    fn sub(self, rhs: Amount) -> Amount {
        Amount(self.0 - rhs.0)
    }
}

impl Neg for Amount {
    type Output = Amount;
    fn neg(self) -> Amount {
        Amount(-self.0)
    }
}

impl AddAssign for Amount {
    fn add_assign(&mut self, rhs: Amount) {
        self.0 += rhs.0;
    }
}

impl SubAssign for Amount {
    fn sub_assign(&mut self, rhs: Amount) {
        self.0 -= rhs.0;
    }
}

impl Sum for Amount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, |acc, a| acc + a)
    }
}

impl<'a> Sum<&'a Amount> for Amount {
    fn sum<I: Iterator<Item = &'a Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, |acc, a| acc + *a)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// 1.2: price of one unit of an asset in settlement-asset units. must be positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Price(Decimal);

impl Price {
    pub const ONE: Price = Price(Decimal::ONE);

    #[must_use]
    pub fn new(value: Decimal) -> Option<Self> {
        let value = floor_to_scale(value);
        if value > Decimal::ZERO {
            Some(Self(value))
        } else {
            None
        }
    }

    pub fn new_unchecked(value: Decimal) -> Self {
        debug_assert!(value > Decimal::ZERO);
        Self(value)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// 1.3: integer amount in an asset's own decimals. only custody sees these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct NativeAmount(pub u128);

impl NativeAmount {
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for NativeAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// 1.4: millisecond timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub fn now() -> Self {
        Self(chrono::Utc::now().timestamp_millis())
    }

    pub fn from_millis(ms: i64) -> Self {
        Self(ms)
    }

    pub fn from_secs(secs: i64) -> Self {
        Self(secs * 1000)
    }

    pub fn as_millis(&self) -> i64 {
        self.0
    }

    pub fn saturating_add(&self, duration: Duration) -> Self {
        let ms = i64::try_from(duration.as_millis()).unwrap_or(i64::MAX);
        Self(self.0.saturating_add(ms))
    }

    /// True once `self + age` is strictly in the past.
    pub fn is_older_than(&self, age: Duration, now: Timestamp) -> bool {
        self.saturating_add(age) < now
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn amount_floors_to_eight_digits() {
        let a = Amount::new(dec!(1.123456789));
        assert_eq!(a.value(), dec!(1.12345678));

        let neg = Amount::new(dec!(-1.123456781));
        assert_eq!(neg.value(), dec!(-1.12345679)); // floor, not truncation
    }

    #[test]
    fn mul_price_converts_to_settlement_units() {
        let amount = Amount::new(dec!(2.5));
        let price = Price::new(dec!(3.2)).unwrap();
        assert_eq!(amount.mul_price(price).value(), dec!(8));
    }

    #[test]
    fn haircut_uses_integer_slices() {
        // 255 units * 200/255 = 200 exactly
        assert_eq!(Amount::new(dec!(255)).haircut(200).value(), dec!(200));
        // full weight never exceeds the input
        let v = Amount::new(dec!(100));
        assert!(v.haircut(FULL_WEIGHT) <= v);
        assert_eq!(v.haircut(0), Amount::ZERO);
        // 1e-8 units below one slice floor away
        assert_eq!(Amount::from_units(254).haircut(FULL_WEIGHT), Amount::ZERO);
    }

    #[test]
    fn pro_rata_fee() {
        let fee = Amount::new(dec!(0.3));
        let part = Amount::new(dec!(1));
        let whole = Amount::new(dec!(3));
        assert_eq!(fee.pro_rata(part, whole).value(), dec!(0.1));
        assert_eq!(fee.pro_rata(part, Amount::ZERO), Amount::ZERO);
    }

    #[test]
    fn price_must_be_positive() {
        assert!(Price::new(dec!(0)).is_none());
        assert!(Price::new(dec!(-1)).is_none());
        assert!(Price::new(dec!(0.000000001)).is_none()); // floors to zero
        assert!(Price::new(dec!(0.00000001)).is_some());
    }

    #[test]
    fn timestamp_age() {
        let created = Timestamp::from_secs(100);
        let age = Duration::from_secs(10);
        assert!(!created.is_older_than(age, Timestamp::from_secs(110)));
        assert!(created.is_older_than(age, Timestamp::from_secs(111)));
    }
}
