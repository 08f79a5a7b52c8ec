// src/tagger/mod.rs
//! Text -> tags. Continent detection, whole-word keyword matching, topic
//! buckets and country detection. Pure functions over immutable tables; no
//! input is ever an error, absence of signal is `["Unclear"]` / empty.

pub mod tables;

pub use tables::TaggingTables;

use anyhow::{Context, Result};
use regex::{RegexSet, RegexSetBuilder};
use std::collections::{BTreeSet, HashMap};

pub const UNCLEAR: &str = "Unclear";
pub const GLOBAL: &str = "Global";

/// `\b` is only meaningful next to a word character, so terms like
/// `washington d.c.` get a boundary on the left edge only.
fn word_pattern(term: &str) -> String {
    let escaped = regex::escape(term);
    let is_word = |c: Option<char>| c.is_some_and(|c| c.is_alphanumeric() || c == '_');
    let lead = if is_word(term.chars().next()) { r"\b" } else { "" };
    let trail = if is_word(term.chars().last()) { r"\b" } else { "" };
    format!("{lead}{escaped}{trail}")
}

fn build_set<'a, I>(terms: I) -> Result<RegexSet>
where
    I: IntoIterator<Item = &'a str>,
{
    build_set_with(terms, true)
}

fn build_set_with<'a, I>(terms: I, case_insensitive: bool) -> Result<RegexSet>
where
    I: IntoIterator<Item = &'a str>,
{
    RegexSetBuilder::new(terms.into_iter().map(word_pattern))
        .case_insensitive(case_insensitive)
        .build()
        .context("compiling whole-word term set")
}

/// A keyword universe compiled once. Matching is case-insensitive; hits are
/// reported in the original casing, in universe order, without duplicates.
#[derive(Debug, Clone)]
pub struct KeywordSet {
    terms: Vec<String>,
    set: RegexSet,
}

impl KeywordSet {
    pub fn new<S: AsRef<str>>(terms: &[S]) -> Result<Self> {
        let mut seen = BTreeSet::new();
        let terms: Vec<String> = terms
            .iter()
            .map(|t| t.as_ref().to_string())
            .filter(|t| !t.trim().is_empty() && seen.insert(t.to_lowercase()))
            .collect();
        let set = build_set(terms.iter().map(String::as_str))?;
        Ok(Self { terms, set })
    }

    pub fn empty() -> Self {
        Self {
            terms: Vec::new(),
            set: RegexSet::empty(),
        }
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Cheap relevance check: any keyword present as a whole word.
    pub fn is_match(&self, text: &str) -> bool {
        !text.is_empty() && self.set.is_match(&text.to_lowercase())
    }

    pub fn matches(&self, text: &str) -> Vec<String> {
        if text.is_empty() || self.terms.is_empty() {
            return Vec::new();
        }
        let lower = text.to_lowercase();
        let mut idx: Vec<usize> = self.set.matches(&lower).into_iter().collect();
        idx.sort_unstable();
        idx.into_iter().map(|i| self.terms[i].clone()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Classification {
    pub continents: Vec<String>,
    pub matched_keywords: Vec<String>,
    pub core_topics: Vec<String>,
}

pub struct Tagger {
    locations: RegexSet,
    location_continent: Vec<String>,
    acronyms: RegexSet,
    acronym_continent: Vec<String>,
    topic_index: HashMap<String, Vec<String>>,
    countries: Vec<(String, RegexSet)>,
}

impl Tagger {
    pub fn new(tables: &TaggingTables) -> Result<Self> {
        let (names, continents): (Vec<&str>, Vec<String>) = tables
            .geography
            .iter()
            .map(|(loc, cont)| (loc.as_str(), cont.clone()))
            .unzip();
        let locations = build_set(names)?;

        let (abbrevs, acronym_continent): (Vec<&str>, Vec<String>) = tables
            .acronyms
            .iter()
            .map(|(a, cont)| (a.as_str(), cont.clone()))
            .unzip();
        let acronyms = build_set_with(abbrevs, false)?;

        let mut topic_index: HashMap<String, Vec<String>> = HashMap::new();
        for (topic, keywords) in &tables.topics {
            for kw in keywords {
                let slot = topic_index.entry(kw.to_lowercase()).or_default();
                if !slot.contains(topic) {
                    slot.push(topic.clone());
                }
            }
        }

        let countries = tables
            .countries
            .iter()
            .map(|(country, pats)| Ok((country.clone(), build_set(pats.iter().map(String::as_str))?)))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            locations,
            location_continent: continents,
            acronyms,
            acronym_continent,
            topic_index,
            countries,
        })
    }

    /// 0 continents -> `Unclear`, 1 -> that one, more -> `Global`.
    pub fn detect_continents(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return vec![UNCLEAR.to_string()];
        }
        let lower = text.to_lowercase();
        let mut hit: BTreeSet<&str> = self
            .locations
            .matches(&lower)
            .into_iter()
            .map(|i| self.location_continent[i].as_str())
            .collect();
        hit.extend(
            self.acronyms
                .matches(text)
                .into_iter()
                .map(|i| self.acronym_continent[i].as_str()),
        );
        match hit.len() {
            0 => vec![UNCLEAR.to_string()],
            1 => hit.into_iter().map(str::to_string).collect(),
            _ => vec![GLOBAL.to_string()],
        }
    }

    pub fn core_topics(&self, matched: &[String]) -> Vec<String> {
        let topics: BTreeSet<&str> = matched
            .iter()
            .filter_map(|kw| self.topic_index.get(&kw.to_lowercase()))
            .flatten()
            .map(String::as_str)
            .collect();
        topics.into_iter().map(str::to_string).collect()
    }

    pub fn classify(&self, text: &str, universe: &KeywordSet) -> Classification {
        let matched_keywords = universe.matches(text);
        let core_topics = self.core_topics(&matched_keywords);
        Classification {
            continents: self.detect_continents(text),
            matched_keywords,
            core_topics,
        }
    }

    /// Country names mentioned in `text`, sorted.
    pub fn detect_countries(&self, text: &str) -> Vec<String> {
        if text.is_empty() {
            return Vec::new();
        }
        let mut out: Vec<String> = self
            .countries
            .iter()
            .filter(|(_, set)| set.is_match(text))
            .map(|(name, _)| name.clone())
            .collect();
        out.sort();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tagger() -> Tagger {
        Tagger::new(&TaggingTables::default()).unwrap()
    }

    fn kws(xs: &[&str]) -> KeywordSet {
        KeywordSet::new(xs).unwrap()
    }

    #[test]
    fn empty_text_is_unclear_and_empty() {
        let c = tagger().classify("", &kws(&["energy"]));
        assert_eq!(c.continents, vec!["Unclear"]);
        assert!(c.matched_keywords.is_empty());
        assert!(c.core_topics.is_empty());
    }

    #[test]
    fn single_continent_is_kept() {
        let t = tagger();
        assert_eq!(t.detect_continents("Talks held in Nairobi"), vec!["Africa"]);
        assert_eq!(t.detect_continents("Markets in Tokyo and Seoul"), vec!["Asia"]);
    }

    #[test]
    fn two_continents_collapse_to_global() {
        let t = tagger();
        assert_eq!(t.detect_continents("London and Sydney"), vec!["Global"]);
        assert_eq!(t.detect_continents("Cairo meets Berlin"), vec!["Global"]);
        assert_eq!(t.detect_continents("nothing here"), vec!["Unclear"]);
    }

    #[test]
    fn lagos_solar_scenario() {
        let c = tagger().classify(
            "Lagos announces solar energy initiative in Nigeria",
            &kws(&["solar energy", "energy", "bitcoin"]),
        );
        assert_eq!(c.continents, vec!["Africa"]);
        assert!(c.matched_keywords.contains(&"solar energy".to_string()));
        assert!(c.matched_keywords.contains(&"energy".to_string()));
        assert!(c.core_topics.contains(&"energy".to_string()));
    }

    #[test]
    fn pronouns_are_not_places() {
        let t = tagger();
        assert_eq!(
            t.detect_continents("Nigeria invites us to Lagos for a solar summit"),
            vec!["Africa"]
        );
        assert_eq!(t.detect_continents("Eu acho que Lisboa ganha"), vec!["Unclear"]);
        assert_eq!(t.detect_continents("US and Nigeria sign a grid deal"), vec!["Global"]);
        assert_eq!(t.detect_continents("Talks resume in the U.S. capital"), vec!["Americas"]);
        assert_eq!(t.detect_continents("UK and EU agree terms"), vec!["Europe"]);
    }

    #[test]
    fn riyadh_sao_paulo_is_global() {
        let c = tagger().classify("Riyadh and São Paulo sign energy pact", &kws(&["energy"]));
        assert_eq!(c.continents, vec!["Global"]);
    }

    #[test]
    fn whole_word_keywords_only() {
        let k = kws(&["gas", "AI"]);
        assert!(k.matches("gasoline prices rise").is_empty());
        assert_eq!(k.matches("Natural gas exports"), vec!["gas"]);
        // original casing is reported
        assert_eq!(k.matches("new ai rules"), vec!["AI"]);
        assert!(k.matches("said the chair").is_empty());
    }

    #[test]
    fn keyword_set_dedups_case_insensitively() {
        let k = kws(&["Energy", "energy", "", "Oil"]);
        assert_eq!(k.terms(), &["Energy".to_string(), "Oil".to_string()]);
    }

    #[test]
    fn punctuated_terms_match_at_edges() {
        let t = tagger();
        assert_eq!(
            t.detect_continents("Protest near Washington D.C."),
            vec!["Americas"]
        );
        let k = kws(&["Standard & Poor's"]);
        assert_eq!(k.matches("standard & poor's cut"), vec!["Standard & Poor's"]);
    }

    #[test]
    fn one_keyword_many_topics() {
        let t = tagger();
        let topics = t.core_topics(&["climate risk".to_string()]);
        assert_eq!(topics, vec!["geopolitics", "insurance"]);
        assert!(t.core_topics(&[]).is_empty());
    }

    #[test]
    fn alternate_tables_are_honoured() {
        let tables = TaggingTables::from_toml_str(
            r#"
            [geography]
            "gotham" = "Americas"
            [topics]
            heroes = ["cape"]
            "#,
        )
        .unwrap();
        let t = Tagger::new(&tables).unwrap();
        let c = t.classify("A cape seen over Gotham, London", &kws(&["cape"]));
        // london is not in this table
        assert_eq!(c.continents, vec!["Americas"]);
        assert_eq!(c.core_topics, vec!["heroes"]);
    }

    #[test]
    fn countries_are_sorted_and_case_insensitive() {
        let t = tagger();
        let c = t.detect_countries("Will PUTIN meet Zelensky before the MBS summit?");
        assert_eq!(c, vec!["Russia", "Saudi Arabia", "Ukraine"]);
        assert!(t.detect_countries("").is_empty());
    }
}
