//! Privacy score calculation
//!
//! A deterministic, pure function of the listing metadata and extracted
//! policy signals. The score starts at 100, applies independent additive
//! terms, and clamps to [0, 100]. The reputation and risk tables are static
//! configuration data so they can be tested and extended without touching
//! the scoring rule.

use crate::listing::ListingMetadata;
use crate::policy::PolicySignals;

/// Developers known for broad data collection (case-insensitive substrings)
pub const HIGH_COLLECTION_DEVELOPERS: &[&str] = &[
    "meta", "facebook", "instagram", "whatsapp",
    "google", "alphabet", "tiktok", "bytedance",
    "amazon", "microsoft", "twitter", "snap",
];

/// Categories carrying elevated privacy risk (case-insensitive substrings)
pub const HIGH_RISK_CATEGORIES: &[&str] = &["social", "communication", "entertainment", "dating"];

const MISSING_POLICY_PENALTY: i32 = 30;
const DATA_COLLECTED_PENALTY: i32 = 20;
const DATA_SHARED_PENALTY: i32 = 25;
const DEVELOPER_REPUTATION_PENALTY: i32 = 15;
const RISK_CATEGORY_PENALTY: i32 = 10;
const TRANSPORT_SECURITY_BONUS: i32 = 10;
const DELETION_SUPPORT_BONUS: i32 = 5;

/// Computes the 0-100 privacy score for an analyzed app
///
/// Re-derivable from its two inputs alone; no hidden state.
pub fn calculate_privacy_score(metadata: &ListingMetadata, signals: &PolicySignals) -> u8 {
    let mut score: i32 = 100;

    if metadata.privacy_policy_url.is_none() {
        score -= MISSING_POLICY_PENALTY;
    }
    if !signals.data_collected.is_empty() {
        score -= DATA_COLLECTED_PENALTY;
    }
    if !signals.data_shared.is_empty() {
        score -= DATA_SHARED_PENALTY;
    }

    let developer = metadata.developer.as_deref().unwrap_or("").to_lowercase();
    if HIGH_COLLECTION_DEVELOPERS.iter().any(|known| developer.contains(known)) {
        score -= DEVELOPER_REPUTATION_PENALTY;
    }

    let category = metadata.category.as_deref().unwrap_or("").to_lowercase();
    if HIGH_RISK_CATEGORIES.iter().any(|risky| category.contains(risky)) {
        score -= RISK_CATEGORY_PENALTY;
    }

    let practices = &signals.security_practices;
    if practices.encrypted_in_transit && practices.secure_connection {
        score += TRANSPORT_SECURITY_BONUS;
    }
    if practices.user_data_deletion_request && practices.developer_data_deletion_mechanism {
        score += DELETION_SUPPORT_BONUS;
    }

    score.clamp(0, 100) as u8
}
