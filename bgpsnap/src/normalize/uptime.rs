//! Session uptime parsing.

use std::sync::LazyLock;

use regex::Regex;

static CLOCK_FORM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([0-9]+):([0-9]{2}):([0-9]{2})$").unwrap()
});

static TOKEN_FORM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:([0-9]+)y)?(?:([0-9]+)w)?(?:([0-9]+)d)?(?:([0-9]+)h)?(?:([0-9]+)m)?(?:([0-9]+)s)?$").unwrap()
});

/// Parse a device uptime token into seconds.
///
/// Devices report session uptime either as a clock (`02:13:45`) or as
/// unit tokens (`1d02h`, `2w3d`, `1y45w`). `never` and anything else
/// unrecognized map to `None` (absent, not zero).
pub fn parse_uptime(token: &str) -> Option<u64> {
    let token = token.trim();
    if token.is_empty() || token.eq_ignore_ascii_case("never") {
        return None;
    }

    if let Some(caps) = CLOCK_FORM.captures(token) {
        let hours: u64 = caps[1].parse().ok()?;
        let minutes: u64 = caps[2].parse().ok()?;
        let seconds: u64 = caps[3].parse().ok()?;
        return Some(hours * 3600 + minutes * 60 + seconds);
    }

    let caps = TOKEN_FORM.captures(token)?;
    let units: [(usize, u64); 6] = [
        (1, 365 * 86_400),
        (2, 7 * 86_400),
        (3, 86_400),
        (4, 3600),
        (5, 60),
        (6, 1),
    ];
    let mut total = 0u64;
    let mut matched = false;
    for (group, factor) in units {
        if let Some(m) = caps.get(group) {
            let value: u64 = m.as_str().parse().ok()?;
            total += value * factor;
            matched = true;
        }
    }
    matched.then_some(total)
}
