//! String canonicalization used for clustering and brand matching.
//!
//! Everything here is a pure function of its inputs.

use once_cell::sync::Lazy;
use regex::Regex;

use super::{CountryPreset, Station};

static PARENTHESIZED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\([^)]*\)").expect("parenthesized regex should compile")
});
static BRACKETED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[[^\]]*\]").expect("bracketed regex should compile")
});
static BITRATE_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b\d{2,3}\s?(k|kbps)\b").expect("bitrate token regex should compile")
});
// `aac+` cannot end on a word boundary, so the optional plus is matched
// greedily and the boundary is only required after plain tokens.
static QUALITY_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(aac\+|(aac|mp3|ogg|stream|live|hq|lq)\b)").expect("quality token regex should compile")
});

/// Lowercase, `&` to `and`, separators to spaces, runs of anything that is not
/// alphanumeric collapsed to a single space, trimmed.
pub fn normalize_name(raw: &str) -> String {
    let lowered = raw.to_lowercase().replace('&', "and");
    let mut out = String::with_capacity(lowered.len());
    let mut pending_space = false;
    for ch in lowered.chars() {
        if ch.is_alphanumeric() {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.push(ch);
        } else {
            pending_space = true;
        }
    }
    out
}

/// Key that groups bitrate/codec mirrors of one station together.
pub fn canonical_key(raw: &str) -> String {
    let lowered = raw.to_lowercase();
    let stripped = PARENTHESIZED.replace_all(&lowered, " ");
    let stripped = BRACKETED.replace_all(&stripped, " ");
    let stripped = BITRATE_TOKEN.replace_all(&stripped, " ");
    let stripped = QUALITY_TOKEN.replace_all(&stripped, " ");
    normalize_name(&stripped)
}

/// Names carrying a bitrate or codec hint look like mirrors rather than the
/// station itself.
pub fn is_variant_label(name: &str) -> bool {
    let lowered = name.to_lowercase();
    BITRATE_TOKEN.is_match(&lowered)
        || lowered.contains("aac")
        || lowered.contains("mp3")
        || lowered.contains("stream")
}

/// Substring match on normalized forms; multi-word brands also match when
/// every token is present in any order. Single-word brands get no fallback.
pub fn brand_matches(station_name: &str, brand: &str) -> bool {
    normalized_brand_matches(&normalize_name(station_name), &normalize_name(brand))
}

pub(crate) fn normalized_brand_matches(station: &str, brand: &str) -> bool {
    if station.is_empty() || brand.is_empty() {
        return false;
    }
    if station.contains(brand) {
        return true;
    }
    let mut tokens = brand.split(' ').peekable();
    let first = tokens.next();
    if tokens.peek().is_none() {
        return false;
    }
    first
        .into_iter()
        .chain(tokens)
        .all(|token| station.contains(token))
}

/// Rank of the first brand the station name matches.
pub fn matched_brand_rank(station_name: &str, brands: &[String]) -> Option<usize> {
    let normalized = normalize_name(station_name);
    brands
        .iter()
        .position(|brand| normalized_brand_matches(&normalized, &normalize_name(brand)))
}

/// Whether a station's free-text country refers to the preset.
pub fn station_belongs_to_country(station: &Station, country: &CountryPreset) -> bool {
    let own = normalize_name(&station.country);
    if own.is_empty() {
        return false;
    }
    [&country.api_name, &country.display_name]
        .into_iter()
        .map(|name| normalize_name(name))
        .filter(|name| !name.is_empty())
        .any(|name| own == name || own.contains(&name))
}

pub fn normalize_genre(raw: &str) -> String {
    raw.replace(['-', '_'], " ").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_punctuation() {
        assert_eq!(normalize_name("  Rock & Roll -- FM_UK!! "), "rock and roll fm uk");
        assert_eq!(normalize_name("RTÉ 2FM"), "rté 2fm");
        assert_eq!(normalize_name("***"), "");
    }

    #[test]
    fn canonical_key_strips_quality_markers() {
        assert_eq!(canonical_key("Heart London 128k AAC"), "heart london");
        assert_eq!(canonical_key("Heart London MP3"), "heart london");
        assert_eq!(canonical_key("Heart London (Backup) [HQ]"), "heart london");
        assert_eq!(canonical_key("Jazz FM aac+ 64 kbps stream"), "jazz fm");
        assert_eq!(canonical_key("Live 105"), "105");
    }

    #[test]
    fn variant_labels() {
        assert!(is_variant_label("Heart London 128k AAC"));
        assert!(is_variant_label("Capital 96 kbps"));
        assert!(is_variant_label("Capital Stream"));
        assert!(!is_variant_label("Heart London"));
    }

    #[test]
    fn brand_matching_examples() {
        assert!(brand_matches("Virgin Radio UK", "Virgin Radio"));
        assert!(brand_matches("Heart London", "Heart"));
        assert!(brand_matches("XFM", "FM"));
        assert!(!brand_matches("Absolute Radio", "Kiss"));
    }

    #[test]
    fn multi_word_brands_match_unordered_tokens() {
        assert!(brand_matches("Radio Virgin Italia", "Virgin Radio"));
        assert!(!brand_matches("Virgin Hits", "Virgin Radio"));
    }

    #[test]
    fn single_word_brands_have_no_token_fallback() {
        assert!(!brand_matches("Hear tLondon", "Heart"));
        assert!(!brand_matches("", "Heart"));
        assert!(!brand_matches("Heart", "--"));
    }

    #[test]
    fn matched_rank_uses_first_brand() {
        let brands: Vec<String> = ["Capital", "Heart", "Heart London"]
            .iter()
            .map(|b| b.to_string())
            .collect();
        assert_eq!(matched_brand_rank("Heart London", &brands), Some(1));
        assert_eq!(matched_brand_rank("Smooth", &brands), None);
    }

    #[test]
    fn country_membership_uses_both_names() {
        let kr = CountryPreset::new("kr", "South Korea", "Korea, Republic of", &[]);
        let by_api = Station::new("1", "KBS").with_country("Korea, Republic Of");
        let by_display = Station::new("2", "KBS").with_country("South Korea");
        let other = Station::new("3", "KBS").with_country("Japan");
        assert!(station_belongs_to_country(&by_api, &kr));
        assert!(station_belongs_to_country(&by_display, &kr));
        assert!(!station_belongs_to_country(&other, &kr));
        assert!(!station_belongs_to_country(&Station::new("4", "x"), &kr));
    }

    #[test]
    fn genre_normalization() {
        assert_eq!(normalize_genre(" hip-hop_classics "), "hip hop classics");
    }
}
