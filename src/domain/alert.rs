//! Emergency message composition and SMS segmentation

use crate::domain::types::GeoLocation;
use smallvec::SmallVec;

const ALERT_PREFIX: &str = "EMERGENCY: Possible fall detected!";

/// Single-part limit for GSM-7 text (septets)
const GSM_SINGLE_LIMIT: usize = 160;
/// Per-part limit for concatenated GSM-7 text (UDH takes 7 septets)
const GSM_MULTI_LIMIT: usize = 153;
/// Single-part limit for UCS-2 text (UTF-16 code units)
const UCS2_SINGLE_LIMIT: usize = 70;
/// Per-part limit for concatenated UCS-2 text
const UCS2_MULTI_LIMIT: usize = 67;

/// Message parts; almost every alert fits in one or two
pub type SmsParts = SmallVec<[String; 2]>;

/// Build the alert text sent to every contact
pub fn compose_alert_message(location: Option<&GeoLocation>) -> String {
    match location {
        Some(loc) => {
            format!("{ALERT_PREFIX} Location: {:?}, {:?}", loc.latitude, loc.longitude)
        }
        None => format!("{ALERT_PREFIX} Location: Unknown"),
    }
}

/// Septet cost of a character in the GSM 03.38 alphabet, None if not encodable
fn gsm_septets(c: char) -> Option<usize> {
    match c {
        '^' | '{' | '}' | '\\' | '[' | '~' | ']' | '|' | '€' => Some(2),
        '\n' | '\r' => Some(1),
        '`' => None,
        ' '..='~' => Some(1),
        '£' | '¥' | 'è' | 'é' | 'ù' | 'ì' | 'ò' | 'Ç' | 'Ø' | 'ø' | 'Å' | 'å' | 'Δ' | 'Φ'
        | 'Γ' | 'Λ' | 'Ω' | 'Π' | 'Ψ' | 'Σ' | 'Θ' | 'Ξ' | 'Æ' | 'æ' | 'ß' | 'É' | '¤' | '¡'
        | 'Ä' | 'Ö' | 'Ñ' | 'Ü' | '§' | '¿' | 'ä' | 'ö' | 'ñ' | 'ü' | 'à' => Some(1),
        _ => None,
    }
}

/// Split a message into SMS-sized parts
///
/// GSM-7 text fits 160 septets in one part or 153 per part when
/// concatenated; escape characters cost two septets and are never split
/// across parts. Any character outside GSM-7 switches the whole message to
/// UCS-2 (70 / 67 UTF-16 units), keeping surrogate pairs together.
pub fn split_sms(message: &str) -> SmsParts {
    let gsm_costs: Option<Vec<usize>> = message.chars().map(gsm_septets).collect();

    let (costs, single, multi) = match gsm_costs {
        Some(costs) => (costs, GSM_SINGLE_LIMIT, GSM_MULTI_LIMIT),
        None => {
            (message.chars().map(char::len_utf16).collect(), UCS2_SINGLE_LIMIT, UCS2_MULTI_LIMIT)
        }
    };

    let total: usize = costs.iter().sum();
    if total <= single {
        let mut parts = SmsParts::new();
        parts.push(message.to_string());
        return parts;
    }

    let mut parts = SmsParts::new();
    let mut current = String::new();
    let mut used = 0;
    for (c, cost) in message.chars().zip(costs) {
        if used + cost > multi {
            parts.push(std::mem::take(&mut current));
            used = 0;
        }
        current.push(c);
        used += cost;
    }
    if !current.is_empty() {
        parts.push(current);
    }
    parts
}
