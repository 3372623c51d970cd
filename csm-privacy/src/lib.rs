//! Consent gating for client-side metrics.
//!
//! Collection of client-side metrics is subject to the vendor consent recorded by the IAB
//! Transparency & Consent Framework v2. The consent string is persisted by the publisher's consent
//! management platform under [`VENDOR_CONSENTS_KEY`] as a string of `'0'` and `'1'` characters,
//! one per registered vendor.
//!
//! The decision is asymmetric. Only an explicit refusal disallows collection, while
//! an absent or malformed string leaves it enabled:
//!
//! | vendor consent               | [`is_csm_disallowed`](ConsentGate::is_csm_disallowed) |
//! |------------------------------|-------------------------------------------------------|
//! | [`VendorConsent::Given`]     | `false`                                               |
//! | [`VendorConsent::NotGiven`]  | `true`                                                |
//! | [`VendorConsent::Unknown`]   | `false`                                               |

#![warn(missing_docs)]

mod consent;
mod store;

pub use self::consent::*;
pub use self::store::*;
