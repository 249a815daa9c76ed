//! Shipping addresses owned by a user.

use serde::{Deserialize, Serialize};

use shopfloor_core::AddressId;

/// A saved address.
///
/// At most one address per user has `is_default` set; the stores enforce it
/// whenever an address is added or updated as the default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub id: AddressId,
    pub label: String,
    pub full_name: String,
    pub street_address: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub phone_number: String,
    pub is_default: bool,
}

/// Request body for adding an address.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewAddress {
    pub label: String,
    pub full_name: String,
    pub street_address: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub phone_number: String,
    pub is_default: bool,
}

impl NewAddress {
    /// Names of required fields that are blank.
    #[must_use]
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("fullName", &self.full_name),
            ("streetAddress", &self.street_address),
            ("city", &self.city),
            ("state", &self.state),
            ("zipCode", &self.zip_code),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect()
    }
}

/// Partial update for an address.
///
/// Absent or blank fields keep their current value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AddressPatch {
    pub label: Option<String>,
    pub full_name: Option<String>,
    pub street_address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub phone_number: Option<String>,
    pub is_default: Option<bool>,
}

impl AddressPatch {
    /// Apply the patch to an existing address in place.
    pub fn apply(&self, address: &mut Address) {
        fn merge(target: &mut String, value: Option<&String>) {
            if let Some(v) = value.filter(|v| !v.trim().is_empty()) {
                target.clone_from(v);
            }
        }

        merge(&mut address.label, self.label.as_ref());
        merge(&mut address.full_name, self.full_name.as_ref());
        merge(&mut address.street_address, self.street_address.as_ref());
        merge(&mut address.city, self.city.as_ref());
        merge(&mut address.state, self.state.as_ref());
        merge(&mut address.zip_code, self.zip_code.as_ref());
        merge(&mut address.phone_number, self.phone_number.as_ref());
        if let Some(is_default) = self.is_default {
            address.is_default = is_default;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn home() -> Address {
        Address {
            id: AddressId::new(1),
            label: "Home".to_owned(),
            full_name: "Ada Lovelace".to_owned(),
            street_address: "12 Marylebone Rd".to_owned(),
            city: "London".to_owned(),
            state: "LDN".to_owned(),
            zip_code: "NW1".to_owned(),
            phone_number: String::new(),
            is_default: false,
        }
    }

    #[test]
    fn test_patch_keeps_blank_fields() {
        let mut address = home();
        let patch = AddressPatch {
            city: Some("  ".to_owned()),
            label: Some("Work".to_owned()),
            ..AddressPatch::default()
        };
        patch.apply(&mut address);
        assert_eq!(address.city, "London");
        assert_eq!(address.label, "Work");
        assert!(!address.is_default);
    }

    #[test]
    fn test_patch_sets_default_flag() {
        let mut address = home();
        AddressPatch {
            is_default: Some(true),
            ..AddressPatch::default()
        }
        .apply(&mut address);
        assert!(address.is_default);
    }

    #[test]
    fn test_missing_fields() {
        let input = NewAddress {
            full_name: "Ada".to_owned(),
            city: "London".to_owned(),
            ..NewAddress::default()
        };
        assert_eq!(
            input.missing_fields(),
            vec!["streetAddress", "state", "zipCode"]
        );
    }
}
