use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ConsentStore;

/// Store key of the IAB TCF v2 vendor consent bit string.
pub const VENDOR_CONSENTS_KEY: &str = "IABTCF_VendorConsents";

/// Registered vendor id whose consent bit gates metric collection.
pub const DEFAULT_VENDOR_ID: u16 = 91;

/// Whether a vendor was granted consent in a TCF v2 vendor consent string.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum VendorConsent {
    /// The vendor bit is `1`.
    Given,
    /// The vendor bit is `0`.
    NotGiven,
    /// The string is empty, malformed, or too short to contain the vendor bit.
    Unknown,
}

impl VendorConsent {
    /// Reads the consent bit of `vendor_id` from a vendor consent string.
    ///
    /// Vendor ids are 1-based, so vendor `91` is the character at index `90`. The string must
    /// consist of `'0'` and `'1'` only. Anything else yields [`Unknown`](Self::Unknown).
    ///
    /// ```
    /// use csm_privacy::VendorConsent;
    ///
    /// assert_eq!(VendorConsent::parse("", 91), VendorConsent::Unknown);
    /// assert_eq!(VendorConsent::parse("0001", 4), VendorConsent::Given);
    /// assert_eq!(VendorConsent::parse("0001", 3), VendorConsent::NotGiven);
    /// assert_eq!(VendorConsent::parse("0001", 5), VendorConsent::Unknown);
    /// ```
    pub fn parse(value: &str, vendor_id: u16) -> Self {
        let Some(index) = usize::from(vendor_id).checked_sub(1) else {
            return Self::Unknown;
        };

        let bits = value.as_bytes();
        if !bits.iter().all(|&b| b == b'0' || b == b'1') {
            return Self::Unknown;
        }

        match bits.get(index) {
            Some(b'1') => Self::Given,
            Some(b'0') => Self::NotGiven,
            _ => Self::Unknown,
        }
    }

    /// Returns the name of this state.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Given => "given",
            Self::NotGiven => "not_given",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for VendorConsent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decides whether client-side metrics may be collected.
pub trait CsmGuard: Send + Sync {
    /// Returns `true` if metric collection is currently disallowed.
    fn is_csm_disallowed(&self) -> bool;
}

impl<G> CsmGuard for std::sync::Arc<G>
where
    G: CsmGuard + ?Sized,
{
    fn is_csm_disallowed(&self) -> bool {
        (**self).is_csm_disallowed()
    }
}

/// Privacy settings.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PrivacyConfig {
    /// The vendor whose consent bit is checked.
    ///
    /// Defaults to `91`. Must be positive.
    pub vendor_id: u16,
}

impl Default for PrivacyConfig {
    fn default() -> Self {
        Self {
            vendor_id: DEFAULT_VENDOR_ID,
        }
    }
}

/// [`CsmGuard`] backed by the TCF v2 vendor consent string in a [`ConsentStore`].
///
/// The gate keeps no state of its own. Every decision reads the store again, so a changed consent
/// takes effect on the next check.
#[derive(Debug)]
pub struct ConsentGate<S> {
    store: S,
    vendor_id: u16,
}

impl<S: ConsentStore> ConsentGate<S> {
    /// Creates a gate checking [`DEFAULT_VENDOR_ID`].
    pub fn new(store: S) -> Self {
        Self::with_vendor_id(store, DEFAULT_VENDOR_ID)
    }

    /// Creates a gate checking the given vendor id.
    pub fn with_vendor_id(store: S, vendor_id: u16) -> Self {
        Self { store, vendor_id }
    }

    /// Creates a gate from configuration.
    pub fn from_config(store: S, config: &PrivacyConfig) -> Self {
        Self::with_vendor_id(store, config.vendor_id)
    }

    /// Returns the checked vendor id.
    pub fn vendor_id(&self) -> u16 {
        self.vendor_id
    }

    /// Reads and evaluates the currently stored vendor consent.
    pub fn is_vendor_consent_given(&self) -> VendorConsent {
        let value = self.store.get_string(VENDOR_CONSENTS_KEY, "");
        let consent = VendorConsent::parse(&value, self.vendor_id);
        csm_log::trace!(vendor_id = self.vendor_id, %consent, "evaluated vendor consent");
        consent
    }

    /// Returns `true` only if the vendor consent was explicitly refused.
    ///
    /// A missing or unreadable consent string does not block collection.
    pub fn is_csm_disallowed(&self) -> bool {
        match self.is_vendor_consent_given() {
            VendorConsent::NotGiven => true,
            VendorConsent::Given | VendorConsent::Unknown => false,
        }
    }
}

impl<S: ConsentStore> CsmGuard for ConsentGate<S> {
    fn is_csm_disallowed(&self) -> bool {
        ConsentGate::is_csm_disallowed(self)
    }
}
