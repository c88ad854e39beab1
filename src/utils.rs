use rand::distributions::Alphanumeric;
use rand::Rng;
use rust_decimal::Decimal;
use serde::{de, Deserialize, Deserializer};
use std::str::FromStr;

pub const GENERATED_PASSWORD_LEN: usize = 12;

/// Random alphanumeric password handed back once to the admin who created the account.
pub fn generate_password() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(GENERATED_PASSWORD_LEN)
        .map(char::from)
        .collect()
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Shape check only: one `@`, non-empty local part, a dotted domain, no whitespace.
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) => !host.is_empty() && !tld.is_empty() && !domain.starts_with('.'),
        None => false,
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumericInput {
    Number(serde_json::Number),
    Text(String),
}

/// Accepts a number, a numeric string, a blank string or null. Blank and null map to `None`.
pub fn lenient_decimal<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<NumericInput>::deserialize(deserializer)?;
    let text = match raw {
        None => return Ok(None),
        Some(NumericInput::Number(n)) => n.to_string(),
        Some(NumericInput::Text(s)) => s.trim().replace(',', "."),
    };
    if text.is_empty() {
        return Ok(None);
    }
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map(Some)
        .map_err(|_| de::Error::custom(format!("valor numérico inválido: {}", text)))
}

/// Same rules as [`lenient_decimal`] for whole-number fields such as day counts.
pub fn lenient_i32<'de, D>(deserializer: D) -> Result<Option<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<NumericInput>::deserialize(deserializer)?;
    let parsed = match raw {
        None => return Ok(None),
        Some(NumericInput::Number(n)) => n.as_i64(),
        Some(NumericInput::Text(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            trimmed.parse::<i64>().ok()
        }
    };
    parsed
        .and_then(|v| i32::try_from(v).ok())
        .map(Some)
        .ok_or_else(|| de::Error::custom("número inteiro inválido"))
}
