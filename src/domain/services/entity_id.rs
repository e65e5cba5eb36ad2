//! Entity ID extraction from gateway API keys.
//!
//! Two key layouts carry a 24-character hex entity ID:
//!
//! ```text
//! vpsk_live_<entity-id><random>      current
//! vigil_<entity-id>_<random>         legacy
//! ```

const LIVE_PREFIX: &str = "vpsk_live_";
const LEGACY_PREFIX: &str = "vigil_";
const ENTITY_ID_LEN: usize = 24;

/// Extract the entity ID from an API key, optionally prefixed with `Bearer `.
///
/// Returns the ID lower-cased, or `None` when the key matches neither layout.
pub fn parse_entity_id(credential: Option<&str>) -> Option<String> {
    let key = credential?.replace("Bearer ", "");
    let key = key.trim();
    if key.is_empty() {
        return None;
    }

    if let Some(rest) = key.strip_prefix(LIVE_PREFIX) {
        let candidate: String = rest.chars().take(ENTITY_ID_LEN).collect();
        if candidate.chars().count() < ENTITY_ID_LEN {
            return None;
        }
        return is_hex_id(&candidate).then(|| candidate.to_ascii_lowercase());
    }

    if key.starts_with(LEGACY_PREFIX) {
        let parts: Vec<&str> = key.split('_').collect();
        if parts.len() < 3 {
            return None;
        }
        // Positional on purpose: parts[1] only, never a search over all parts.
        let candidate = parts[1];
        return is_hex_id(candidate).then(|| candidate.to_ascii_lowercase());
    }

    None
}

fn is_hex_id(candidate: &str) -> bool {
    candidate.len() == ENTITY_ID_LEN && candidate.chars().all(|c| c.is_ascii_hexdigit())
}
