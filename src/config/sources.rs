// src/config/sources.rs
// Built-in source lists and keyword universes. Override any of them in
// config/collector.toml.

pub const RSS_FEEDS: &[&str] = &[
    "https://feeds.bbci.co.uk/news/rss.xml",
    "https://feeds.bbci.co.uk/news/world/rss.xml",
    "https://feeds.bbci.co.uk/news/business/rss.xml",
    "https://feeds.bbci.co.uk/news/technology/rss.xml",
    "https://feeds.bbci.co.uk/news/science_and_environment/rss.xml",
    "http://rss.cnn.com/rss/cnn_topstories.rss",
    "http://rss.cnn.com/rss/edition.rss",
    "http://rss.cnn.com/rss/cnn_world.rss",
    "http://rss.cnn.com/rss/edition_technology.rss",
    "https://www.theguardian.com/world/rss",
    "https://www.theguardian.com/business/rss",
    "https://www.theguardian.com/technology/rss",
    "https://www.theguardian.com/environment/rss",
    "https://www.aljazeera.com/xml/rss/all.xml",
    "https://feeds.arstechnica.com/arstechnica/index",
    "https://techcrunch.com/feed/",
    "https://www.wired.com/feed/rss",
    "https://www.eia.gov/rss/todayinenergy.xml",
    "https://feeds.cfr.org/feeds/site/current.xml",
];

pub const DIRECT_SITES: &[&str] = &[
    "https://techcrunch.com/",
    "https://www.theverge.com/",
    "https://arstechnica.com/",
    "https://www.wired.com/",
    "https://www.coindesk.com/",
    "https://cointelegraph.com/",
];

pub const LEGISLATION_FEEDS: &[&str] = &[
    "https://www.govinfo.gov/rss/bills.xml",
    "https://www.rollcall.com/feed/",
    "https://www.senate.gov/rss/press-releases.xml",
    "https://mg.co.za/feed/",
    "https://mg.co.za/politics/feed/",
    "https://bills.parliament.uk/RSS/AllBills.rss",
    "https://eur-lex.europa.eu/rss/en/oj_latest.xml",
    "https://www.aph.gov.au/rss/housebills",
    "https://www.aph.gov.au/rss/senatebills",
    "https://www.camara.leg.br/noticias/rss/todas-as-noticias.xml",
    "https://www12.senado.leg.br/noticias/rss",
];

pub const NEWS_KEYWORDS: &[&str] = &[
    // core topics
    "energy",
    "electricity",
    "blockchain",
    "artificial intelligence",
    "AI",
    "insurance",
    // energy technologies
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
    "ESG investment",
    "coal",
    "rare earth minerals",
    "lithium",
    "nuclear",
    "gas",
    "oil",
    "supply chain",
    // insurance / risk
    "catastrophe modeling",
    "exposure data",
    "reinsurance",
    "underwriting",
    "climate risk",
    "war",
    "civil unrest",
    "protest",
    // technology
    "cybersecurity",
    "digital twin",
    "predictive analytics",
    // agencies and regulators
    "Federal Energy Regulatory Commission",
    "FERC",
    "North American Electric Reliability Corporation",
    "NERC",
    "Department of Energy",
    "DOE",
    "Environmental Protection Agency",
    "EPA",
    "National Renewable Energy Laboratory",
    "NREL",
    "International Energy Agency",
    "IEA",
    "Commodity Futures Trading Commission",
    "CFTC",
    "Insurance Regulatory and Development Authority",
    "IRDAI",
    "Standard & Poor's",
    "Moody's",
    "Fitch",
    "Bloomberg",
];

pub const POLITICAL_KEYWORDS: &[&str] = &[
    "election",
    "president",
    "presidential",
    "congress",
    "senate",
    "governor",
    "parliament",
    "prime minister",
    "vote",
    "voter",
    "republican",
    "democrat",
    "conservative",
    "liberal",
    "trump",
    "biden",
    "desantis",
    "harris",
    "pence",
    "newsom",
    "war",
    "conflict",
    "invasion",
    "military",
    "nato",
    "sanctions",
    "tariff",
    "trade war",
    "treaty",
    "diplomacy",
    "nuclear",
    "legislation",
    "bill",
    "law",
    "policy",
    "regulation",
    "impeachment",
    "supreme court",
    "federal reserve",
    "fed rate",
    "putin",
    "zelensky",
    "xi jinping",
    "netanyahu",
    "eu",
    "european union",
];

/// Market categories that are political regardless of wording.
pub const POLITICAL_CATEGORIES: &[&str] = &["politics", "election", "government", "current-affairs"];

pub(crate) fn owned(xs: &[&str]) -> Vec<String> {
    xs.iter().map(|s| s.to_string()).collect()
}
