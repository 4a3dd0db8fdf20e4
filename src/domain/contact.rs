//! Emergency contact numbers and their normalization
//!
//! Numbers are rewritten to a country-coded canonical form before they are
//! stored, so `"98765 43210"`, `"919876543210"` and `"+91 98765-43210"` all
//! become the same contact.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContactError {
    #[error("phone number has no digits: {0:?}")]
    Empty(String),
}

/// Country calling code plus the length of a national subscriber number
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DialingPlan {
    pub country_code: String,
    pub national_len: usize,
}

impl Default for DialingPlan {
    fn default() -> Self {
        Self { country_code: "91".to_string(), national_len: 10 }
    }
}

/// A normalized phone number
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhoneNumber(String);

impl PhoneNumber {
    /// Normalize raw user input against a dialing plan
    pub fn parse(raw: &str, plan: &DialingPlan) -> Result<Self, ContactError> {
        normalize_phone_number(raw, plan).map(PhoneNumber)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Rewrite a phone number to `+<cc><national>` where it can be inferred
///
/// Everything except digits and `+` is dropped first. Numbers that already
/// carry the plan's country prefix are kept, bare national numbers get the
/// prefix, and country-coded numbers missing only the `+` get it back.
/// Anything else is returned cleaned but otherwise untouched. Applying this
/// to its own output is a no-op.
pub fn normalize_phone_number(raw: &str, plan: &DialingPlan) -> Result<String, ContactError> {
    let cleaned: String = raw.chars().filter(|c| c.is_ascii_digit() || *c == '+').collect();
    if !cleaned.chars().any(|c| c.is_ascii_digit()) {
        return Err(ContactError::Empty(raw.to_string()));
    }

    let cc = plan.country_code.as_str();
    if cleaned.starts_with('+') && cleaned[1..].starts_with(cc) {
        return Ok(cleaned);
    }
    if cleaned.len() == plan.national_len {
        return Ok(format!("+{cc}{cleaned}"));
    }
    if cleaned.len() == cc.len() + plan.national_len && cleaned.starts_with(cc) {
        return Ok(format!("+{cleaned}"));
    }
    Ok(cleaned)
}

/// Order-preserving set of normalized contacts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactList {
    numbers: Vec<PhoneNumber>,
}

impl ContactList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a number unless it is already present
    /// Returns true if the list grew
    pub fn insert(&mut self, number: PhoneNumber) -> bool {
        if self.numbers.contains(&number) {
            return false;
        }
        self.numbers.push(number);
        true
    }

    /// Returns true if the number was present
    pub fn remove(&mut self, number: &PhoneNumber) -> bool {
        let before = self.numbers.len();
        self.numbers.retain(|n| n != number);
        self.numbers.len() != before
    }

    pub fn contains(&self, number: &PhoneNumber) -> bool {
        self.numbers.contains(number)
    }

    pub fn len(&self) -> usize {
        self.numbers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.numbers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PhoneNumber> {
        self.numbers.iter()
    }

    pub fn to_vec(&self) -> Vec<PhoneNumber> {
        self.numbers.clone()
    }
}

impl FromIterator<PhoneNumber> for ContactList {
    fn from_iter<I: IntoIterator<Item = PhoneNumber>>(iter: I) -> Self {
        let mut list = ContactList::new();
        for number in iter {
            list.insert(number);
        }
        list
    }
}
