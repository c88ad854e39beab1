use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{check_amount, MAX_STAY_DAYS};
use crate::utils::{lenient_decimal, lenient_i32};

/// One requested OPME material on a surgery request.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct OpmeRequest {
    pub opme_id: Uuid,
    pub quantity: u32,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SurgeryRequest {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub procedure_id: Option<Uuid>,
    pub needs_icu: bool,
    pub icu_days: Option<i32>,
    pub ward_days: Option<i32>,
    pub room_days: Option<i32>,
    pub doctor_fee: Decimal,
    pub needs_blood_reserve: bool,
    pub blood_units: Option<i32>,
    pub evoked_potential: bool,
    pub opme_requests: Vec<OpmeRequest>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Body of a surgery request form. Numeric fields accept blank strings.
#[derive(Clone, Debug, Deserialize)]
pub struct NewSurgeryRequest {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    #[serde(default)]
    pub procedure_id: Option<Uuid>,
    #[serde(default)]
    pub needs_icu: bool,
    #[serde(default, deserialize_with = "lenient_i32")]
    pub icu_days: Option<i32>,
    #[serde(default, deserialize_with = "lenient_i32")]
    pub ward_days: Option<i32>,
    #[serde(default, deserialize_with = "lenient_i32")]
    pub room_days: Option<i32>,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub doctor_fee: Option<Decimal>,
    #[serde(default)]
    pub needs_blood_reserve: bool,
    #[serde(default, deserialize_with = "lenient_i32")]
    pub blood_units: Option<i32>,
    #[serde(default)]
    pub evoked_potential: bool,
    #[serde(default)]
    pub opme_requests: Vec<OpmeRequest>,
}

impl NewSurgeryRequest {
    /// Form-entry checks. Messages are shown to the user as-is.
    pub fn validate(&self) -> Result<Decimal, String> {
        let doctor_fee = self
            .doctor_fee
            .ok_or_else(|| "Honorário médico é obrigatório".to_string())?;
        if doctor_fee < Decimal::ZERO {
            return Err("Honorário médico não pode ser negativo".to_string());
        }
        check_amount("honorário médico", doctor_fee)?;

        let days = [
            ("UTI", self.icu_days),
            ("enfermaria", self.ward_days),
            ("apartamento", self.room_days),
        ];
        for (label, value) in days {
            if matches!(value, Some(d) if d < 0) {
                return Err(format!("Diárias de {} não podem ser negativas", label));
            }
            if matches!(value, Some(d) if d > MAX_STAY_DAYS) {
                return Err(format!(
                    "Diárias de {} não podem passar de {}",
                    label, MAX_STAY_DAYS
                ));
            }
        }

        if self.needs_blood_reserve && !matches!(self.blood_units, Some(u) if u > 0) {
            return Err("Informe a quantidade de bolsas de sangue".to_string());
        }

        if self.opme_requests.iter().any(|r| r.quantity == 0) {
            return Err("Quantidade de OPME deve ser maior que zero".to_string());
        }

        Ok(doctor_fee)
    }

    pub fn into_request(self, doctor_fee: Decimal, created_by: Option<Uuid>) -> SurgeryRequest {
        let now = Utc::now();
        SurgeryRequest {
            id: Uuid::new_v4(),
            patient_id: self.patient_id,
            doctor_id: self.doctor_id,
            procedure_id: self.procedure_id,
            needs_icu: self.needs_icu,
            icu_days: self.icu_days,
            ward_days: self.ward_days,
            room_days: self.room_days,
            doctor_fee,
            needs_blood_reserve: self.needs_blood_reserve,
            blood_units: if self.needs_blood_reserve { self.blood_units } else { None },
            evoked_potential: self.evoked_potential,
            opme_requests: self.opme_requests,
            created_by,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn form(extra: serde_json::Value) -> NewSurgeryRequest {
        let mut body = json!({
            "patient_id": Uuid::new_v4(),
            "doctor_id": Uuid::new_v4(),
            "doctor_fee": "5000",
        });
        if let (Some(base), Some(more)) = (body.as_object_mut(), extra.as_object()) {
            for (k, v) in more {
                base.insert(k.clone(), v.clone());
            }
        }
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn blank_days_deserialize_as_absent() {
        let request = form(json!({"icu_days": "", "ward_days": null}));
        assert_eq!(request.icu_days, None);
        assert_eq!(request.ward_days, None);
        assert_eq!(request.validate().unwrap(), dec!(5000));
    }

    #[test]
    fn doctor_fee_is_required_and_non_negative() {
        assert!(form(json!({"doctor_fee": ""})).validate().is_err());
        assert!(form(json!({"doctor_fee": -1})).validate().is_err());
        assert!(form(json!({"doctor_fee": 0})).validate().is_ok());
    }

    #[test]
    fn negative_days_are_rejected() {
        let err = form(json!({"room_days": -2})).validate().unwrap_err();
        assert!(err.contains("apartamento"));
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let err = form(json!({"ward_days": 3, "doctor_fee": "79228162514264337593543950335"}))
            .validate()
            .unwrap_err();
        assert!(err.contains("limite"));
        assert!(form(json!({"doctor_fee": "10.999"})).validate().is_err());

        let err = form(json!({"ward_days": 100000})).validate().unwrap_err();
        assert!(err.contains("enfermaria"));
        assert!(form(json!({"ward_days": MAX_STAY_DAYS})).validate().is_ok());
    }

    #[test]
    fn blood_reserve_needs_units() {
        assert!(form(json!({"needs_blood_reserve": true})).validate().is_err());
        assert!(form(json!({"needs_blood_reserve": true, "blood_units": 2}))
            .validate()
            .is_ok());
    }

    #[test]
    fn blood_units_dropped_without_reserve() {
        let request = form(json!({"needs_blood_reserve": false, "blood_units": 3}));
        let fee = request.validate().unwrap();
        let stored = request.into_request(fee, None);
        assert_eq!(stored.blood_units, None);
    }
}
