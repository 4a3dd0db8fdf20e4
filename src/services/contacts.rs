//! Emergency contact book backed by a preference store

use crate::domain::contact::{ContactError, ContactList, DialingPlan, PhoneNumber};
use crate::io::preferences::PreferenceStore;
use anyhow::Context;
use parking_lot::RwLock;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

/// Preference key holding the contact list (JSON array of strings)
pub const CONTACTS_KEY: &str = "emergency_contacts";

/// Persistent, de-duplicated list of emergency contacts
///
/// Every mutation rewrites the full list to the store.
pub struct ContactBook {
    store: Arc<dyn PreferenceStore>,
    plan: DialingPlan,
    contacts: RwLock<ContactList>,
}

impl ContactBook {
    /// Load contacts from the store, re-normalizing anything saved earlier
    pub fn load(store: Arc<dyn PreferenceStore>, plan: DialingPlan) -> anyhow::Result<Self> {
        let stored = store.get(CONTACTS_KEY).context("Failed to read emergency contacts")?;

        let mut contacts = ContactList::new();
        let mut rewritten = false;
        if let Some(Value::Array(items)) = stored {
            for item in items {
                let Some(raw) = item.as_str() else {
                    warn!(value = %item, "contact_entry_not_a_string");
                    rewritten = true;
                    continue;
                };
                match PhoneNumber::parse(raw, &plan) {
                    Ok(number) => {
                        rewritten |= number.as_str() != raw;
                        rewritten |= !contacts.insert(number);
                    }
                    Err(e) => {
                        warn!(raw = %raw, error = %e, "contact_entry_invalid");
                        rewritten = true;
                    }
                }
            }
        }

        let book = Self { store, plan, contacts: RwLock::new(contacts) };
        if rewritten {
            book.persist(&book.contacts.read())?;
        }
        info!(count = %book.len(), "contacts_loaded");
        Ok(book)
    }

    pub fn dialing_plan(&self) -> &DialingPlan {
        &self.plan
    }

    /// Normalize and add a number
    /// Returns Ok(false) if it was already present
    pub fn add(&self, raw: &str) -> anyhow::Result<bool> {
        let number = self.parse(raw)?;
        let mut contacts = self.contacts.write();
        if !contacts.insert(number.clone()) {
            info!(contact = %number, "contact_already_present");
            return Ok(false);
        }
        if let Err(e) = self.persist(&contacts) {
            contacts.remove(&number);
            return Err(e);
        }
        info!(contact = %number, count = %contacts.len(), "contact_added");
        Ok(true)
    }

    /// Normalize and remove a number
    /// Returns Ok(false) if it was not present
    pub fn remove(&self, raw: &str) -> anyhow::Result<bool> {
        let number = self.parse(raw)?;
        let mut contacts = self.contacts.write();
        let before = contacts.clone();
        if !contacts.remove(&number) {
            return Ok(false);
        }
        if let Err(e) = self.persist(&contacts) {
            *contacts = before;
            return Err(e);
        }
        info!(contact = %number, count = %contacts.len(), "contact_removed");
        Ok(true)
    }

    /// Snapshot of the current contacts in insertion order
    pub fn list(&self) -> Vec<PhoneNumber> {
        self.contacts.read().to_vec()
    }

    pub fn len(&self) -> usize {
        self.contacts.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.contacts.read().is_empty()
    }

    fn parse(&self, raw: &str) -> Result<PhoneNumber, ContactError> {
        PhoneNumber::parse(raw, &self.plan)
    }

    fn persist(&self, contacts: &ContactList) -> anyhow::Result<()> {
        let values: Vec<Value> =
            contacts.iter().map(|n| Value::String(n.as_str().to_string())).collect();
        self.store
            .put(CONTACTS_KEY, Value::Array(values))
            .context("Failed to save emergency contacts")
    }
}
