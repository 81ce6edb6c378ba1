use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Cents;

pub type CustomerId = Uuid;

/// A cafe customer running a tab.
///
/// `credit` is a materialized cache of the customer's ledger: it always equals the sum of
/// the signed amounts of every transaction recorded against them. Only the storage layer's
/// atomic record operation changes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub name: String,
    /// Where balance text messages go. Customers without one are skipped by notifications.
    pub phone: Option<String>,
    pub credit: Cents,
    pub created_date: NaiveDate,
}

impl Customer {
    /// A fresh customer with an empty tab, created today (UTC).
    pub fn new(name: impl Into<String>, phone: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            phone: phone.filter(|p| !p.trim().is_empty()),
            credit: 0,
            created_date: Utc::now().date_naive(),
        }
    }

    pub fn has_phone(&self) -> bool {
        self.phone.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_customer_starts_at_zero() {
        let customer = Customer::new("Asha", Some("+919800000001".into()));
        assert_eq!(customer.credit, 0);
        assert_eq!(customer.created_date, Utc::now().date_naive());
        assert!(customer.has_phone());
    }

    #[test]
    fn empty_name_is_accepted() {
        let customer = Customer::new("", None);
        assert_eq!(customer.name, "");
        assert!(!customer.has_phone());
    }

    #[test]
    fn blank_phone_is_treated_as_missing() {
        let customer = Customer::new("Ravi", Some("   ".into()));
        assert_eq!(customer.phone, None);
    }
}
