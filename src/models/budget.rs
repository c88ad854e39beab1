use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::check_amount;
use crate::utils::lenient_decimal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BudgetStatus {
    Approved,
    #[default]
    AwaitingQuote,
    AwaitingPatient,
    AwaitingPayment,
    Canceled,
}

impl BudgetStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BudgetStatus::Approved => "APPROVED",
            BudgetStatus::AwaitingQuote => "AWAITING_QUOTE",
            BudgetStatus::AwaitingPatient => "AWAITING_PATIENT",
            BudgetStatus::AwaitingPayment => "AWAITING_PAYMENT",
            BudgetStatus::Canceled => "CANCELED",
        }
    }
}

impl fmt::Display for BudgetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BudgetStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "APPROVED" => Ok(BudgetStatus::Approved),
            "AWAITING_QUOTE" => Ok(BudgetStatus::AwaitingQuote),
            "AWAITING_PATIENT" => Ok(BudgetStatus::AwaitingPatient),
            "AWAITING_PAYMENT" => Ok(BudgetStatus::AwaitingPayment),
            "CANCELED" => Ok(BudgetStatus::Canceled),
            other => Err(format!("unknown budget status: {}", other)),
        }
    }
}

/// A supplier's price for one requested material.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SupplierQuote {
    pub supplier_id: Uuid,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub price: Option<Decimal>,
}

/// Candidate prices for one requested material; at most one supplier is selected.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct OpmeQuote {
    pub opme_id: Uuid,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub selected_supplier_id: Option<Uuid>,
    #[serde(default)]
    pub quotes: Vec<SupplierQuote>,
}

impl OpmeQuote {
    /// Price of the selected supplier. `None` when nothing is selected or the selection has no quote.
    pub fn selected_price(&self) -> Option<Decimal> {
        let selected = self.selected_supplier_id?;
        self.quotes
            .iter()
            .find(|q| q.supplier_id == selected)
            .map(|q| q.price.unwrap_or(Decimal::ZERO))
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Budget {
    pub id: Uuid,
    pub surgery_request_id: Uuid,
    pub hospital_id: Uuid,
    pub icu_daily_cost: Option<Decimal>,
    pub ward_daily_cost: Option<Decimal>,
    pub room_daily_cost: Option<Decimal>,
    pub anesthetist_fee: Option<Decimal>,
    pub evoked_potential_fee: Option<Decimal>,
    /// Copy of the surgeon's fee; falls back to the request's fee when absent.
    pub doctor_fee: Option<Decimal>,
    pub opme_quotes: Vec<OpmeQuote>,
    pub total_cost: Decimal,
    pub status: BudgetStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Editable part of a budget. The total is never accepted from clients.
#[derive(Clone, Debug, Deserialize)]
pub struct BudgetInput {
    pub surgery_request_id: Uuid,
    pub hospital_id: Uuid,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub icu_daily_cost: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub ward_daily_cost: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub room_daily_cost: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub anesthetist_fee: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub evoked_potential_fee: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub doctor_fee: Option<Decimal>,
    #[serde(default)]
    pub opme_quotes: Vec<OpmeQuote>,
    #[serde(default)]
    pub status: Option<BudgetStatus>,
}

impl BudgetInput {
    pub fn validate(&self) -> Result<(), String> {
        let amounts = [
            ("diária de UTI", self.icu_daily_cost),
            ("diária de enfermaria", self.ward_daily_cost),
            ("diária de apartamento", self.room_daily_cost),
            ("honorário do anestesista", self.anesthetist_fee),
            ("potencial evocado", self.evoked_potential_fee),
            ("honorário médico", self.doctor_fee),
        ];
        for (label, value) in amounts {
            if let Some(v) = value {
                check_amount(label, v)?;
            }
        }

        for quote in &self.opme_quotes {
            for price in quote.quotes.iter().filter_map(|q| q.price) {
                if price < Decimal::ZERO {
                    return Err("Cotação de OPME não pode ser negativa".to_string());
                }
                check_amount("cotação de OPME", price)?;
            }
        }

        Ok(())
    }

    /// Copies the editable fields onto a budget. Total and timestamps are left to the caller.
    pub fn apply_to(self, budget: &mut Budget) {
        budget.surgery_request_id = self.surgery_request_id;
        budget.hospital_id = self.hospital_id;
        budget.icu_daily_cost = self.icu_daily_cost;
        budget.ward_daily_cost = self.ward_daily_cost;
        budget.room_daily_cost = self.room_daily_cost;
        budget.anesthetist_fee = self.anesthetist_fee;
        budget.evoked_potential_fee = self.evoked_potential_fee;
        budget.doctor_fee = self.doctor_fee;
        budget.opme_quotes = self.opme_quotes;
        if let Some(status) = self.status {
            budget.status = status;
        }
    }

    pub fn into_budget(self) -> Budget {
        let now = Utc::now();
        let mut budget = Budget {
            id: Uuid::new_v4(),
            surgery_request_id: self.surgery_request_id,
            hospital_id: self.hospital_id,
            icu_daily_cost: None,
            ward_daily_cost: None,
            room_daily_cost: None,
            anesthetist_fee: None,
            evoked_potential_fee: None,
            doctor_fee: None,
            opme_quotes: Vec::new(),
            total_cost: Decimal::ZERO,
            status: BudgetStatus::default(),
            created_at: now,
            updated_at: now,
        };
        self.apply_to(&mut budget);
        budget
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn selected_price_matches_supplier() {
        let chosen = Uuid::new_v4();
        let quote = OpmeQuote {
            opme_id: Uuid::new_v4(),
            description: None,
            selected_supplier_id: Some(chosen),
            quotes: vec![
                SupplierQuote { supplier_id: Uuid::new_v4(), price: Some(dec!(900)) },
                SupplierQuote { supplier_id: chosen, price: Some(dec!(1200)) },
            ],
        };
        assert_eq!(quote.selected_price(), Some(dec!(1200)));
    }

    #[test]
    fn selection_without_matching_line_has_no_price() {
        let quote = OpmeQuote {
            opme_id: Uuid::new_v4(),
            description: None,
            selected_supplier_id: Some(Uuid::new_v4()),
            quotes: vec![SupplierQuote { supplier_id: Uuid::new_v4(), price: Some(dec!(50)) }],
        };
        assert_eq!(quote.selected_price(), None);
    }

    #[test]
    fn status_uses_upper_snake_case() {
        assert_eq!(
            serde_json::to_string(&BudgetStatus::AwaitingPayment).unwrap(),
            "\"AWAITING_PAYMENT\""
        );
        assert_eq!("CANCELED".parse::<BudgetStatus>().unwrap(), BudgetStatus::Canceled);
        assert_eq!(BudgetStatus::default(), BudgetStatus::AwaitingQuote);
    }

    #[test]
    fn negative_costs_rejected_at_entry() {
        let input: BudgetInput = serde_json::from_value(serde_json::json!({
            "surgery_request_id": Uuid::new_v4(),
            "hospital_id": Uuid::new_v4(),
            "anesthetist_fee": "-10",
        }))
        .unwrap();
        assert!(input.validate().unwrap_err().contains("anestesista"));
    }

    #[test]
    fn oversized_or_sub_cent_costs_rejected() {
        let input = |field: &str, value: &str| -> BudgetInput {
            let mut body = serde_json::json!({
                "surgery_request_id": Uuid::new_v4(),
                "hospital_id": Uuid::new_v4(),
            });
            body[field] = serde_json::Value::String(value.to_string());
            serde_json::from_value(body).unwrap()
        };

        let err = input("ward_daily_cost", "79228162514264337593543950335")
            .validate()
            .unwrap_err();
        assert!(err.contains("enfermaria"));
        assert!(input("icu_daily_cost", "1000.125").validate().is_err());
        assert!(input("icu_daily_cost", "1000,12").validate().is_ok());

        let supplier = Uuid::new_v4();
        let quotes: BudgetInput = serde_json::from_value(serde_json::json!({
            "surgery_request_id": Uuid::new_v4(),
            "hospital_id": Uuid::new_v4(),
            "opme_quotes": [{
                "opme_id": Uuid::new_v4(),
                "selected_supplier_id": supplier,
                "quotes": [{ "supplier_id": supplier, "price": "1e15" }]
            }]
        }))
        .unwrap();
        assert!(quotes.validate().unwrap_err().contains("OPME"));
    }

    #[test]
    fn client_cannot_set_total() {
        let input: BudgetInput = serde_json::from_value(serde_json::json!({
            "surgery_request_id": Uuid::new_v4(),
            "hospital_id": Uuid::new_v4(),
            "total_cost": "99999",
        }))
        .unwrap();
        assert_eq!(input.into_budget().total_cost, Decimal::ZERO);
    }
}
