//! Budget totals.
//!
//! The total is always derived from the surgery request and the budget's
//! per-item costs; it is never edited on its own. Absent amounts and day
//! counts count as zero. Negative values are not rejected here, entry
//! forms validate them.

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::Serialize;

use crate::error::PricingError;
use crate::models::{Budget, SurgeryRequest};

/// Fallback rate. One call site historically used 2% and another 5%;
/// deployments should set `SERVICE_FEE_RATE` explicitly.
pub const DEFAULT_SERVICE_FEE_RATE: Decimal = dec!(0.02);

/// Service fee as a fraction of the subtotal, within `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ServiceFeeRate(Decimal);

impl ServiceFeeRate {
    pub fn new(rate: Decimal) -> Result<Self, String> {
        if rate < Decimal::ZERO || rate > Decimal::ONE {
            return Err(format!("service fee rate must be between 0 and 1, got {}", rate));
        }
        Ok(Self(rate))
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl Default for ServiceFeeRate {
    fn default() -> Self {
        Self(DEFAULT_SERVICE_FEE_RATE)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CostKind {
    Icu,
    Ward,
    Room,
    DoctorFee,
    Anesthetist,
    EvokedPotential,
    Opme,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostLine {
    pub kind: CostKind,
    pub label: String,
    pub amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetBreakdown {
    /// Non-zero contributions in display order.
    pub lines: Vec<CostLine>,
    pub subtotal: Decimal,
    pub service_fee_rate: Decimal,
    pub service_fee: Decimal,
    pub total: Decimal,
}

fn daily(cost: Option<Decimal>, days: Option<i32>) -> Result<Decimal, PricingError> {
    cost.unwrap_or(Decimal::ZERO)
        .checked_mul(Decimal::from(days.unwrap_or(0)))
        .ok_or(PricingError::Overflow)
}

/// Fails only when an intermediate amount leaves the `Decimal` range.
pub fn compute_budget_total(
    request: &SurgeryRequest,
    budget: &Budget,
    rate: ServiceFeeRate,
) -> Result<BudgetBreakdown, PricingError> {
    let mut contributions: Vec<(CostKind, String, Decimal)> = Vec::new();

    if request.needs_icu {
        contributions.push((
            CostKind::Icu,
            "Diárias de UTI".to_string(),
            daily(budget.icu_daily_cost, request.icu_days)?,
        ));
    }
    contributions.push((
        CostKind::Ward,
        "Diárias de enfermaria".to_string(),
        daily(budget.ward_daily_cost, request.ward_days)?,
    ));
    contributions.push((
        CostKind::Room,
        "Diárias de apartamento".to_string(),
        daily(budget.room_daily_cost, request.room_days)?,
    ));
    contributions.push((
        CostKind::DoctorFee,
        "Honorários médicos".to_string(),
        budget.doctor_fee.unwrap_or(request.doctor_fee),
    ));
    contributions.push((
        CostKind::Anesthetist,
        "Honorários do anestesista".to_string(),
        budget.anesthetist_fee.unwrap_or(Decimal::ZERO),
    ));
    if request.evoked_potential {
        contributions.push((
            CostKind::EvokedPotential,
            "Potencial evocado".to_string(),
            budget.evoked_potential_fee.unwrap_or(Decimal::ZERO),
        ));
    }

    for quote in &budget.opme_quotes {
        if let Some(price) = quote.selected_price() {
            let label = match quote.description.as_deref() {
                Some(desc) if !desc.trim().is_empty() => format!("OPME: {}", desc.trim()),
                _ => "OPME".to_string(),
            };
            contributions.push((CostKind::Opme, label, price));
        }
    }

    let subtotal = contributions
        .iter()
        .try_fold(Decimal::ZERO, |acc, (_, _, amount)| acc.checked_add(*amount))
        .ok_or(PricingError::Overflow)?;
    let service_fee = subtotal
        .checked_mul(rate.value())
        .ok_or(PricingError::Overflow)?
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let total = subtotal.checked_add(service_fee).ok_or(PricingError::Overflow)?;

    Ok(BudgetBreakdown {
        lines: contributions
            .into_iter()
            .filter(|(_, _, amount)| !amount.is_zero())
            .map(|(kind, label, amount)| CostLine { kind, label, amount })
            .collect(),
        subtotal,
        service_fee_rate: rate.value(),
        service_fee,
        total,
    })
}
