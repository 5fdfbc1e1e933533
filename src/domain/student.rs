use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Student {
    pub id: Uuid,
    pub full_name: String,
    pub email: Option<String>,
    pub cpf: Option<String>,
    pub gateway_customer_id: Option<String>,
    pub is_active: bool,
}

impl Student {
    /// CPF with punctuation stripped, as the gateway expects it.
    pub fn cpf_digits(&self) -> Option<String> {
        self.cpf
            .as_deref()
            .map(|cpf| cpf.chars().filter(char::is_ascii_digit).collect::<String>())
            .filter(|digits| !digits.is_empty())
    }
}

/// A recurring plan a student is enrolled in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub id: Uuid,
    pub student_id: Uuid,
    pub plan_name: String,
    pub price_cents: i64,
    pub next_billing_date: Option<NaiveDate>,
    pub is_active: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cpf_digits_strips_punctuation() {
        let student = Student {
            id: Uuid::new_v4(),
            full_name: "Ana Souza".to_string(),
            email: None,
            cpf: Some("123.456.789-09".to_string()),
            gateway_customer_id: None,
            is_active: true,
        };
        assert_eq!(student.cpf_digits().as_deref(), Some("12345678909"));

        let blank = Student { cpf: Some("--".to_string()), ..student };
        assert_eq!(blank.cpf_digits(), None);
    }
}
