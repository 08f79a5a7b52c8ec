// src/tagger/tables.rs
//! Default lookup tables for the tagger. Loaded once and handed to
//! [`super::Tagger::new`]; alternate tables can come from TOML.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;

/// Location string (lower-case) -> continent bucket.
const GEOGRAPHY: &[(&str, &str)] = &[
    // Americas
    ("united states", "Americas"),
    ("new york", "Americas"),
    ("washington dc", "Americas"),
    ("washington d.c.", "Americas"),
    ("los angeles", "Americas"),
    ("san francisco", "Americas"),
    ("chicago", "Americas"),
    ("houston", "Americas"),
    ("toronto", "Americas"),
    ("mexico city", "Americas"),
    ("são paulo", "Americas"),
    ("sao paulo", "Americas"),
    ("buenos aires", "Americas"),
    ("calgary", "Americas"),
    ("austin", "Americas"),
    ("portland", "Americas"),
    ("panama city", "Americas"),
    ("san jose", "Americas"),
    ("palo alto", "Americas"),
    ("mountain view", "Americas"),
    ("seattle", "Americas"),
    ("boston", "Americas"),
    ("canada", "Americas"),
    ("mexico", "Americas"),
    ("brazil", "Americas"),
    ("argentina", "Americas"),
    ("chile", "Americas"),
    ("colombia", "Americas"),
    ("peru", "Americas"),
    ("venezuela", "Americas"),
    ("ecuador", "Americas"),
    ("bolivia", "Americas"),
    ("paraguay", "Americas"),
    ("uruguay", "Americas"),
    ("guyana", "Americas"),
    ("suriname", "Americas"),
    ("french guiana", "Americas"),
    ("cuba", "Americas"),
    ("jamaica", "Americas"),
    ("haiti", "Americas"),
    ("dominican republic", "Americas"),
    ("puerto rico", "Americas"),
    ("guatemala", "Americas"),
    ("honduras", "Americas"),
    ("el salvador", "Americas"),
    ("nicaragua", "Americas"),
    ("costa rica", "Americas"),
    ("panama", "Americas"),
    // Europe
    ("united kingdom", "Europe"),
    ("britain", "Europe"),
    ("london", "Europe"),
    ("paris", "Europe"),
    ("berlin", "Europe"),
    ("brussels", "Europe"),
    ("amsterdam", "Europe"),
    ("madrid", "Europe"),
    ("rome", "Europe"),
    ("moscow", "Europe"),
    ("warsaw", "Europe"),
    ("istanbul", "Europe"),
    ("kyiv", "Europe"),
    ("kiev", "Europe"),
    ("gibraltar", "Europe"),
    ("copenhagen", "Europe"),
    ("munich", "Europe"),
    ("barcelona", "Europe"),
    ("aberdeen", "Europe"),
    ("stavanger", "Europe"),
    ("france", "Europe"),
    ("germany", "Europe"),
    ("italy", "Europe"),
    ("spain", "Europe"),
    ("poland", "Europe"),
    ("russia", "Europe"),
    ("ukraine", "Europe"),
    ("turkey", "Europe"),
    ("netherlands", "Europe"),
    ("belgium", "Europe"),
    ("denmark", "Europe"),
    ("sweden", "Europe"),
    ("norway", "Europe"),
    ("finland", "Europe"),
    ("switzerland", "Europe"),
    ("austria", "Europe"),
    ("czech republic", "Europe"),
    ("hungary", "Europe"),
    ("romania", "Europe"),
    ("bulgaria", "Europe"),
    ("greece", "Europe"),
    ("portugal", "Europe"),
    ("ireland", "Europe"),
    ("european union", "Europe"),
    // Asia, including the Middle East / Gulf
    ("china", "Asia"),
    ("japan", "Asia"),
    ("india", "Asia"),
    ("south korea", "Asia"),
    ("singapore", "Asia"),
    ("thailand", "Asia"),
    ("indonesia", "Asia"),
    ("philippines", "Asia"),
    ("israel", "Asia"),
    ("saudi arabia", "Asia"),
    ("saudi", "Asia"),
    ("riyadh", "Asia"),
    ("qatar", "Asia"),
    ("iran", "Asia"),
    ("iraq", "Asia"),
    ("tokyo", "Asia"),
    ("beijing", "Asia"),
    ("shanghai", "Asia"),
    ("hong kong", "Asia"),
    ("seoul", "Asia"),
    ("mumbai", "Asia"),
    ("delhi", "Asia"),
    ("bangkok", "Asia"),
    ("jakarta", "Asia"),
    ("manila", "Asia"),
    ("dubai", "Asia"),
    ("abu dhabi", "Asia"),
    ("tel aviv", "Asia"),
    ("bangalore", "Asia"),
    ("shenzhen", "Asia"),
    ("baku", "Asia"),
    ("doha", "Asia"),
    ("kuwait city", "Asia"),
    ("gaza", "Asia"),
    ("gaza city", "Asia"),
    ("ramallah", "Asia"),
    ("jerusalem", "Asia"),
    ("damascus", "Asia"),
    ("beirut", "Asia"),
    ("palestine", "Asia"),
    ("west bank", "Asia"),
    ("hamas", "Asia"),
    ("south asia", "Asia"),
    ("southeast asia", "Asia"),
    ("middle east", "Asia"),
    ("asean", "Asia"),
    ("gulf states", "Asia"),
    ("persian gulf", "Asia"),
    ("south china sea", "Asia"),
    ("east asia", "Asia"),
    ("central asia", "Asia"),
    // Africa
    ("egypt", "Africa"),
    ("nigeria", "Africa"),
    ("south africa", "Africa"),
    ("kenya", "Africa"),
    ("morocco", "Africa"),
    ("ethiopia", "Africa"),
    ("cairo", "Africa"),
    ("lagos", "Africa"),
    ("johannesburg", "Africa"),
    ("nairobi", "Africa"),
    ("casablanca", "Africa"),
    ("addis ababa", "Africa"),
    ("north africa", "Africa"),
    ("sub-saharan africa", "Africa"),
    ("west africa", "Africa"),
    ("east africa", "Africa"),
    ("southern africa", "Africa"),
    // Oceania
    ("australia", "Oceania"),
    ("new zealand", "Oceania"),
    ("sydney", "Oceania"),
    ("melbourne", "Oceania"),
    ("auckland", "Oceania"),
    ("wellington", "Oceania"),
    ("pacific islands", "Oceania"),
    // Explicitly worldwide
    ("global", "Global"),
    ("worldwide", "Global"),
    ("international", "Global"),
    ("world", "Global"),
    ("earth", "Global"),
    ("planet", "Global"),
    ("suez", "Global"),
    ("suez canal", "Global"),
];

const TOPICS: &[(&str, &[&str])] = &[
    (
        "energy",
        &[
            "energy",
            "electricity",
            "renewable energy",
            "solar power",
            "wind energy",
            "battery storage",
            "smart grid",
            "microgrid",
            "electric vehicles",
            "capacity market",
            "demand response",
            "carbon pricing",
            "carbon tax",
            "feed-in tariff",
            "grid reliability",
            "transmission planning",
            "levelized cost of energy",
            "power purchase agreement",
            "green bond",
            "esg investment",
            "coal",
            "rare earth minerals",
            "lithium",
            "nuclear",
            "gas",
            "oil",
            "supply chain",
        ],
    ),
    (
        "ai",
        &[
            "artificial intelligence",
            "ai",
            "machine learning",
            "ml",
            "neural network",
            "deep learning",
            "cybersecurity",
            "digital twin",
            "predictive analytics",
        ],
    ),
    (
        "blockchain",
        &[
            "blockchain",
            "cryptocurrency",
            "bitcoin",
            "ethereum",
            "crypto",
            "defi",
            "web3",
        ],
    ),
    (
        "insurance",
        &[
            "insurance",
            "catastrophe modeling",
            "exposure data",
            "reinsurance",
            "underwriting",
            "climate risk",
        ],
    ),
    (
        "geopolitics",
        &[
            "war",
            "civil unrest",
            "protest",
            "climate risk",
            "conflict",
            "diplomacy",
            "sanctions",
            "trade war",
            "military",
            "defense",
            "security",
            "terrorism",
            "refugees",
            "migration",
        ],
    ),
];

/// Country name -> names, demonyms, capitals and leaders that point at it.
const COUNTRIES: &[(&str, &[&str])] = &[
    (
        "United States",
        &[
            "US",
            "USA",
            "U.S.",
            "United States",
            "America",
            "American",
            "Washington DC",
            "Washington D.C.",
        ],
    ),
    (
        "United Kingdom",
        &[
            "UK",
            "U.K.",
            "United Kingdom",
            "Britain",
            "British",
            "England",
            "Scotland",
            "Wales",
        ],
    ),
    ("China", &["China", "Chinese", "Beijing", "Xi Jinping"]),
    ("Russia", &["Russia", "Russian", "Moscow", "Putin", "Kremlin"]),
    ("Ukraine", &["Ukraine", "Ukrainian", "Kyiv", "Zelensky"]),
    ("Israel", &["Israel", "Israeli", "Netanyahu", "Tel Aviv", "IDF"]),
    (
        "Palestine",
        &["Palestine", "Palestinian", "Gaza", "West Bank", "Hamas"],
    ),
    ("Iran", &["Iran", "Iranian", "Tehran", "Khamenei"]),
    ("North Korea", &["North Korea", "NKorea", "Pyongyang", "Kim Jong"]),
    ("South Korea", &["South Korea", "SKorea", "Seoul"]),
    ("Taiwan", &["Taiwan", "Taiwanese", "Taipei"]),
    ("Japan", &["Japan", "Japanese", "Tokyo"]),
    ("Germany", &["Germany", "German", "Berlin", "Scholz"]),
    ("France", &["France", "French", "Paris", "Macron"]),
    ("Italy", &["Italy", "Italian", "Rome", "Meloni"]),
    ("Spain", &["Spain", "Spanish", "Madrid"]),
    ("Poland", &["Poland", "Polish", "Warsaw"]),
    (
        "Brazil",
        &["Brazil", "Brazilian", "Brasilia", "Lula", "Bolsonaro"],
    ),
    ("Mexico", &["Mexico", "Mexican", "Mexico City"]),
    ("Canada", &["Canada", "Canadian", "Ottawa", "Trudeau"]),
    (
        "Argentina",
        &["Argentina", "Argentine", "Buenos Aires", "Milei"],
    ),
    (
        "Australia",
        &["Australia", "Australian", "Canberra", "Sydney"],
    ),
    ("India", &["India", "Indian", "New Delhi", "Modi"]),
    ("Pakistan", &["Pakistan", "Pakistani", "Islamabad"]),
    ("Saudi Arabia", &["Saudi Arabia", "Saudi", "Riyadh", "MBS"]),
    ("Turkey", &["Turkey", "Turkish", "Ankara", "Erdogan"]),
    ("Egypt", &["Egypt", "Egyptian", "Cairo"]),
    (
        "South Africa",
        &["South Africa", "South African", "Pretoria", "Johannesburg"],
    ),
    ("Nigeria", &["Nigeria", "Nigerian", "Abuja", "Lagos"]),
    (
        "Venezuela",
        &["Venezuela", "Venezuelan", "Caracas", "Maduro"],
    ),
    ("Syria", &["Syria", "Syrian", "Damascus", "Assad"]),
    (
        "Afghanistan",
        &["Afghanistan", "Afghan", "Kabul", "Taliban"],
    ),
    ("Iraq", &["Iraq", "Iraqi", "Baghdad"]),
    ("Lebanon", &["Lebanon", "Lebanese", "Beirut", "Hezbollah"]),
    ("Yemen", &["Yemen", "Yemeni", "Houthi"]),
    ("European Union", &["European Union", "EU", "Brussels"]),
];

/// Abbreviations that collide with ordinary words ("us", "eu") once
/// lower-cased. Matched case-sensitively against the original text.
const ACRONYMS: &[(&str, &str)] = &[
    ("US", "Americas"),
    ("U.S.", "Americas"),
    ("USA", "Americas"),
    ("U.S.A.", "Americas"),
    ("UK", "Europe"),
    ("U.K.", "Europe"),
    ("EU", "Europe"),
    ("UAE", "Asia"),
];

/// Immutable classification data. Every section is optional in TOML so a
/// test can swap in a tiny table.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TaggingTables {
    #[serde(default)]
    pub geography: BTreeMap<String, String>,
    /// Case-sensitive location -> continent, for abbreviations.
    #[serde(default)]
    pub acronyms: BTreeMap<String, String>,
    #[serde(default)]
    pub topics: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub countries: BTreeMap<String, Vec<String>>,
}

impl Default for TaggingTables {
    fn default() -> Self {
        let owned = |xs: &[&str]| xs.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        Self {
            geography: GEOGRAPHY
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            acronyms: ACRONYMS
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            topics: TOPICS
                .iter()
                .map(|(k, v)| (k.to_string(), owned(v)))
                .collect(),
            countries: COUNTRIES
                .iter()
                .map(|(k, v)| (k.to_string(), owned(v)))
                .collect(),
        }
    }
}

impl TaggingTables {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).context("parsing tagging tables TOML")
    }

    pub fn from_path(path: &std::path::Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading tagging tables from {}", path.display()))?;
        Self::from_toml_str(&raw)
    }
}
