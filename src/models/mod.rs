pub mod budget;
pub mod surgery_request;
pub mod tracking;
pub mod user;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

pub use budget::{Budget, BudgetInput, BudgetStatus, OpmeQuote, SupplierQuote};
pub use surgery_request::{NewSurgeryRequest, OpmeRequest, SurgeryRequest};
pub use tracking::{DecisionUpdate, TrackingStatus, UserBudgetTracking, UserDecision};
pub use user::{Doctor, Identity, Profile, Role};

/// Largest amount a `NUMERIC(14, 2)` column holds.
pub const MAX_AMOUNT: Decimal = dec!(999999999999.99);

pub const MAX_STAY_DAYS: i32 = 3650;

/// Entered money: non-negative, in cents, within column range.
pub(crate) fn check_amount(label: &str, value: Decimal) -> Result<(), String> {
    if value < Decimal::ZERO {
        return Err(format!("Valor de {} não pode ser negativo", label));
    }
    if value > MAX_AMOUNT {
        return Err(format!("Valor de {} excede o limite permitido", label));
    }
    if value.normalize().scale() > 2 {
        return Err(format!("Valor de {} deve ter no máximo duas casas decimais", label));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amount_bounds() {
        assert!(check_amount("x", dec!(0)).is_ok());
        assert!(check_amount("x", dec!(1500.50)).is_ok());
        assert!(check_amount("x", dec!(1500.500)).is_ok());
        assert!(check_amount("x", MAX_AMOUNT).is_ok());
        assert!(check_amount("x", dec!(-0.01)).is_err());
        assert!(check_amount("x", dec!(1000000000000)).is_err());
        assert!(check_amount("x", Decimal::MAX).is_err());
        assert!(check_amount("x", dec!(10.005)).unwrap_err().contains("duas casas"));
    }
}
