use once_cell::sync::Lazy;

use super::CountryPreset;

type PresetRow = (&'static str, &'static str, &'static str, &'static [&'static str]);

const PRESET_TABLE: &[PresetRow] = &[
    ("uk", "United Kingdom", "United Kingdom", &["BBC Radio 1", "BBC Radio 2", "BBC Radio 4", "BBC 6 Music", "Capital", "Virgin Radio UK", "Heart", "Classic FM", "LBC", "talkSPORT"]),
    ("us", "United States", "United States", &["NPR", "KIIS", "Z100", "KEXP", "Hot 97", "iHeart", "1010 WINS", "WNYC", "KROQ", "SiriusXM"]),
    ("ca", "Canada", "Canada", &["CBC Radio One", "CBC Music", "Virgin Radio", "CHUM", "CFOX", "CHFI", "Boom", "98.1 CHFI"]),
    ("au", "Australia", "Australia", &["triple j", "ABC Radio", "Nova", "KIIS", "2GB", "3AW", "Smooth FM", "Gold 104.3"]),
    ("nz", "New Zealand", "New Zealand", &["ZM", "The Edge", "Newstalk ZB", "The Rock", "More FM", "RNZ National"]),
    ("ie", "Ireland", "Ireland", &["RTÉ Radio 1", "RTÉ 2FM", "Today FM", "Newstalk", "Spin", "Classic Hits"]),
    ("de", "Germany", "Germany", &["1LIVE", "WDR", "NDR 2", "Antenne Bayern", "Bayern 3", "SWR3", "Radio Hamburg", "Deutschlandfunk"]),
    ("fr", "France", "France", &["France Inter", "RTL", "NRJ", "Europe 1", "RMC", "Skyrock", "France Info", "Nostalgie"]),
    ("es", "Spain", "Spain", &["Cadena SER", "COPE", "Los 40", "Onda Cero", "RNE", "Kiss FM", "Europa FM"]),
    ("it", "Italy", "Italy", &["RTL 102.5", "Radio Deejay", "RDS", "Radio Italia", "Radio 105", "Virgin Radio Italia", "RAI Radio 1"]),
    ("nl", "Netherlands", "Netherlands", &["NPO Radio 1", "NPO Radio 2", "Radio 538", "Sky Radio", "Qmusic", "3FM"]),
    ("be", "Belgium", "Belgium", &["Radio 2", "Qmusic", "Studio Brussel", "MNM", "Bel RTL", "Nostalgie"]),
    ("se", "Sweden", "Sweden", &["Sveriges Radio P1", "P3", "Mix Megapol", "RIX FM", "NRJ Sweden"]),
    ("no", "Norway", "Norway", &["NRK P1", "NRK P3", "P4", "Radio Norge", "NRJ Norway"]),
    ("dk", "Denmark", "Denmark", &["DR P1", "DR P3", "NOVA", "The Voice", "Radio4"]),
    ("fi", "Finland", "Finland", &["Yle Radio Suomi", "YleX", "Radio Nova", "NRJ Finland", "SuomiPop"]),
    ("pl", "Poland", "Poland", &["RMF FM", "Radio ZET", "Polskie Radio", "Eska", "TOK FM"]),
    ("pt", "Portugal", "Portugal", &["RFM", "Rádio Comercial", "Antena 1", "TSF", "M80"]),
    ("ch", "Switzerland", "Switzerland", &["SRF 1", "SRF 3", "Radio 24", "Radio Energy", "Couleur 3"]),
    ("at", "Austria", "Austria", &["Hitradio Ö3", "FM4", "Kronehit", "Radio Wien", "Antenne Steiermark"]),
    ("cz", "Czechia", "Czech Republic", &["Radiožurnál", "Evropa 2", "Frekvence 1", "ČRo Plus", "Impuls"]),
    ("jp", "Japan", "Japan", &["NHK Radio 1", "J-WAVE", "TOKYO FM", "TBS Radio", "Nippon Broadcasting"]),
    ("kr", "South Korea", "Korea, Republic of", &["KBS", "SBS Power FM", "MBC FM4U", "Arirang Radio"]),
    ("in", "India", "India", &["AIR FM Gold", "Radio Mirchi", "Red FM", "Big FM", "Radio City"]),
    ("sg", "Singapore", "Singapore", &["CNA938", "Class 95", "987", "Kiss92", "Gold 905"]),
    ("my", "Malaysia", "Malaysia", &["HITZ", "ERA", "Lite", "MIX", "Sinar"]),
    ("za", "South Africa", "South Africa", &["Metro FM", "5FM", "947", "Kaya 959", "702"]),
    ("br", "Brazil", "Brazil", &["Jovem Pan", "CBN", "BandNews FM", "Antena 1", "Transamérica"]),
    ("mx", "Mexico", "Mexico", &["Los 40", "W Radio", "Exa FM", "Radio Fórmula", "Imagen Radio"]),
    ("ar", "Argentina", "Argentina", &["Radio Mitre", "La 100", "Cadena 3", "Continental", "Metro"]),
];

/// Number of top brands reused as regional terms when a country has no
/// curated term list.
const FALLBACK_REGIONAL_TERMS: usize = 6;

static PRESETS: Lazy<Vec<CountryPreset>> = Lazy::new(|| {
    PRESET_TABLE
        .iter()
        .map(|(id, display, api, brands)| CountryPreset::new(id, display, api, brands))
        .collect()
});

/// Every curated country, in display order.
pub fn all_presets() -> &'static [CountryPreset] {
    PRESETS.as_slice()
}

pub fn find_preset(id: &str) -> Option<&'static CountryPreset> {
    let needle = id.trim();
    PRESETS
        .iter()
        .find(|preset| preset.id.eq_ignore_ascii_case(needle))
}

/// The preset selected when nothing else is known.
pub fn default_preset() -> &'static CountryPreset {
    &PRESETS[0]
}

/// Search terms used for regional discovery.
pub fn regional_search_terms(country: &CountryPreset) -> Vec<String> {
    let curated: &[&str] = match country.id.as_str() {
        "uk" => &[
            "BBC Local Radio",
            "Heart UK",
            "Virgin Radio UK",
            "Capital UK",
            "Absolute Radio",
            "Kiss UK",
            "Smooth Radio",
            "Greatest Hits Radio",
            "BBC Radio Stoke",
            "Signal 1",
            "LBC",
            "talkSPORT",
        ],
        "us" => &["iHeartRadio", "NPR", "Public Radio", "Classic Rock", "Top 40", "Hip Hop"],
        "ca" => &[
            "CBC",
            "Virgin Radio Canada",
            "CHUM",
            "Toronto Radio",
            "Vancouver Radio",
            "Montreal Radio",
        ],
        "au" => &[
            "ABC Radio",
            "triple j",
            "Nova",
            "Sydney Radio",
            "Melbourne Radio",
            "Brisbane Radio",
        ],
        "nz" => &["Newstalk ZB", "ZM", "The Edge", "Auckland Radio", "Wellington Radio"],
        _ => {
            return country
                .top_brands
                .iter()
                .take(FALLBACK_REGIONAL_TERMS)
                .cloned()
                .collect()
        }
    };
    curated.iter().map(|term| term.to_string()).collect()
}
