//! Question parser
//!
//! Turns a free-form question into an [`Intent`] with its parameters. Matching
//! is heuristic and regex based; anything that fits no known phrasing becomes
//! [`Intent::Unknown`].

mod vocabulary;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use vocabulary::{CROP_EXCLUDE_TOKENS, KNOWN_STATE_NAMES, STATE_EXCLUDE_TOKENS};

/// Up to six words.
const STATE_NAME: &str = r"[A-Za-z]+(?:\s+[A-Za-z]+){0,5}";
const DEFAULT_TOP_M: u32 = 3;

fn pair_regex(prefix: &str) -> Regex {
    let pattern = format!(r"(?i){prefix}\s+({STATE_NAME})\s+(?:and|vs\.?|versus|&)\s+({STATE_NAME})\b");
    Regex::new(&pattern).unwrap()
}

static COMPARE_TO: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"(?i)in\s+({STATE_NAME})\s+compare\s+to\s+({STATE_NAME})\b")).unwrap());
static STATE_FOR: Lazy<Regex> = Lazy::new(|| pair_regex("for"));
static STATE_IN: Lazy<Regex> = Lazy::new(|| pair_regex("in"));
static STATE_BETWEEN: Lazy<Regex> = Lazy::new(|| pair_regex("between"));
static COMPARE_STATES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)compare\s+(?:.*?\s+(?:in|for)\s+)?({STATE_NAME})\s+(?:and|vs\.?|versus|&)\s+({STATE_NAME})\b"
    ))
    .unwrap()
});
static STATE_PLACEHOLDER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)state[_\s]?([A-Za-z]+)").unwrap());

static YEARS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?:last|past|previous|recent)\s+(\d+)\s+years?",
        r"over\s+(?:the\s+)?(?:last|past|previous)?\s*(\d+)\s+years?",
        r"during\s+(?:the\s+)?(?:last|past|previous)?\s*(\d+)\s+years?",
        r"for\s+(?:the\s+)?(?:last|past|previous)?\s*(\d+)\s+years?",
        r"in\s+(?:the\s+)?(?:last|past|previous)?\s*(\d+)\s+years?",
    ]
    .iter()
    .map(|p| Regex::new(&format!("(?i){p}")).unwrap())
    .collect()
});
static TOP_M: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)(?:top|first|best|leading|main)\s+(\d+)",
        r"(?i)(\d+)\s+(?:most|top|best|leading|main)",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});
static SPECIFIC_YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"most recent year|(\d{4})").unwrap());

static REGION_IN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)in\s+([A-Za-z\s]+?)(?:\s+(?:over|during|across|based|for|with)|,|\.|\?|$)").unwrap()
});
static REGION_PLACEHOLDER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)region[_\s]?([A-Za-z]+)").unwrap());

static CROP_FOR_IN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)for\s+([A-Za-z\s]+?)\s+in\s+").unwrap());
static CROP_TREND_OF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)production trend of\s+([A-Za-z\s]+?)\s+in").unwrap());
static CROP_PRODUCTION_OF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)production of\s+([A-Za-z\s]+?)(?:\s+in|\s+over|,|\.|\?|$)").unwrap());
static CROP_IN_STATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)([A-Za-z\s]+?)\s+in\s+([A-Za-z\s]+?)(?:\s+and|\s+in|\s+,|\s+\.|\s+\?|$)").unwrap()
});
static CROP_PLACEHOLDER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)crop(?:_type)?[_\s]?([A-Za-z]+)").unwrap());
static CROP_TYPE_LIST: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)crop[_\s]?type[_\s]?([A-Za-z]+)").unwrap());
static PROMOTE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)promote\s+([A-Za-z\s]+?)\s+over\s+([A-Za-z\s]+?)(?:\s+in|\s+across|\.|$)").unwrap()
});

static TOP_CROP_PAIR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)top\s+([A-Za-z\s]+?)\s+and\s+([A-Za-z\s]+?)\s+crops?").unwrap());
static CROP_PAIR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)([A-Za-z\s]+?)\s+and\s+([A-Za-z\s]+?)\s+crops?").unwrap());
static CROPS_OF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)crops of ([A-Za-z\s]+?)(?:\(|for|in|,|\.|$)").unwrap());
static CROPS_BY: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)([A-Za-z\s]+?)\s+crops?\s+by").unwrap());

static DISTRICT_STATES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)in\s+([A-Za-z\s]+?)\s+and\s+([A-Za-z\s]+?)(?:\s+in|\s+,|\s+\.|\s+\?|$)").unwrap()
});
static INLINE_STATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bin\s+([A-Za-z\s]+?)(?:\s+(?:and|with|having|showing|that|had|for)|\s*,|\s*\?|\.|$)").unwrap()
});
static DISTRICT_CROP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)for\s+([A-Za-z\s]+?)\s+in\s+([A-Za-z\s]+?)(?:\s+and|\s+,|\s+\.|\s+\?|$)").unwrap()
});
static DISTRICT_CROP_PHRASE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:production of|for)\s+([A-Za-z\s]+?)\s+in").unwrap());

/// What the question asks for, with the parameters that were recognized.
///
/// Parameters the parser could not find stay `None`; the analysis stage
/// decides which of them are required.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "intent", content = "params", rename_all = "snake_case")]
pub enum Intent {
    CompareRainfallAndCrops {
        state_a: Option<String>,
        state_b: Option<String>,
        years: Option<u32>,
        top_m: u32,
        crop_filter: Option<String>,
    },
    DistrictExtremes {
        state_a: Option<String>,
        state_b: Option<String>,
        crop: Option<String>,
        year: Option<i32>,
    },
    ProductionTrendWithClimate {
        region: Option<String>,
        crop: Option<String>,
        years: Option<u32>,
    },
    PolicyArguments {
        region: Option<String>,
        /// Crop to promote
        crop_a: Option<String>,
        /// Crop it would replace
        crop_b: Option<String>,
        years: Option<u32>,
    },
    Unknown {
        raw: String,
    },
}

impl Intent {
    pub fn name(&self) -> &'static str {
        match self {
            Intent::CompareRainfallAndCrops { .. } => "compare_rainfall_and_crops",
            Intent::DistrictExtremes { .. } => "district_extremes",
            Intent::ProductionTrendWithClimate { .. } => "production_trend_with_climate",
            Intent::PolicyArguments { .. } => "policy_arguments",
            Intent::Unknown { .. } => "unknown",
        }
    }

    /// Whether answering needs the crop production dataset
    pub fn needs_agriculture(&self) -> bool {
        !matches!(self, Intent::Unknown { .. })
    }

    /// Whether answering needs the rainfall dataset
    pub fn needs_rainfall(&self) -> bool {
        matches!(
            self,
            Intent::CompareRainfallAndCrops { .. }
                | Intent::ProductionTrendWithClimate { .. }
                | Intent::PolicyArguments { .. }
        )
    }
}

pub fn parse_question(question: &str) -> Intent {
    let text = question.trim();
    let lowered = text.to_lowercase();
    let has = |word: &str| lowered.contains(word);

    if has("rainfall") && (has("top") || has("list")) && has("crop") {
        let (state_a, state_b) = extract_state_pair(text);
        return Intent::CompareRainfallAndCrops {
            state_a,
            state_b,
            years: extract_years(&lowered),
            top_m: extract_top_m(&lowered),
            crop_filter: extract_crop_filter(text),
        };
    }

    let has_high = ["highest", "max", "maximum", "peak", "best", "top"].into_iter().any(has);
    let has_low = ["lowest", "min", "minimum", "worst", "bottom"].into_iter().any(has);
    if has("district") && (has_high || has_low) {
        return parse_district_extremes(text, &lowered);
    }

    if has("trend") || has("show") {
        if let (Some(region), Some(crop)) = (extract_region(text), extract_crop(text)) {
            return Intent::ProductionTrendWithClimate {
                region: Some(region),
                crop: Some(title_case(&crop)),
                years: extract_years(&lowered),
            };
        }
    }

    if has("policy") || has("scheme") || has("promote") {
        let mut crops = extract_crop_pair(text).into_iter();
        return Intent::PolicyArguments {
            region: extract_region(text),
            crop_a: crops.next(),
            crop_b: crops.next(),
            years: extract_years(&lowered),
        };
    }

    // Looser phrasings
    let (state_a, state_b) = extract_state_pair(text);
    let crop = extract_crop(text);

    if has("rainfall") && state_a.is_some() && state_b.is_some() {
        return Intent::CompareRainfallAndCrops {
            state_a,
            state_b,
            years: extract_years(&lowered),
            top_m: extract_top_m(&lowered),
            crop_filter: crop,
        };
    }

    if has("district") && state_a.is_some() && state_b.is_some() && crop.is_some() {
        return Intent::DistrictExtremes {
            state_a,
            state_b,
            crop,
            year: None,
        };
    }

    if has("trend") && (crop.is_some() || has("production")) {
        return Intent::ProductionTrendWithClimate {
            region: extract_region(text),
            crop: crop.map(|c| title_case(&c)),
            years: extract_years(&lowered),
        };
    }

    if (has("promote") || has("compare")) && crop.is_some() {
        let mut crops = extract_crop_pair(text).into_iter();
        return Intent::PolicyArguments {
            region: extract_region(text),
            crop_a: crops.next().or(crop),
            crop_b: crops.next(),
            years: extract_years(&lowered),
        };
    }

    Intent::Unknown {
        raw: question.to_string(),
    }
}

fn parse_district_extremes(text: &str, lowered: &str) -> Intent {
    let (mut state_a, mut state_b) = extract_state_pair(text);

    if state_a.is_none() || state_b.is_none() {
        if let Some(caps) = DISTRICT_STATES.captures(text) {
            state_a = state_a.or_else(|| sanitize_state(&caps[1]));
            state_b = state_b.or_else(|| sanitize_state(&caps[2]));
        }
    }

    if state_a.is_none() || state_b.is_none() {
        let inline: Vec<String> = INLINE_STATE
            .captures_iter(text)
            .filter_map(|caps| sanitize_state(&caps[1]))
            .collect();
        let mut inline = inline.into_iter();
        if state_a.is_none() {
            state_a = inline.next();
        }
        if state_b.is_none() {
            state_b = inline.next();
        }
    }

    let mut crop = match DISTRICT_CROP.captures(text) {
        Some(caps) => sanitize_crop(&caps[1]),
        None => extract_crop(text),
    };
    if crop.is_none() {
        crop = DISTRICT_CROP_PHRASE
            .captures(text)
            .and_then(|caps| sanitize_crop(&caps[1]));
    }

    let year = SPECIFIC_YEAR
        .captures(lowered)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok());

    Intent::DistrictExtremes {
        state_a,
        state_b,
        crop,
        year,
    }
}

fn extract_years(text: &str) -> Option<u32> {
    YEARS
        .iter()
        .find_map(|re| re.captures(text))
        .and_then(|caps| caps[1].parse().ok())
}

fn extract_top_m(text: &str) -> u32 {
    TOP_M
        .iter()
        .find_map(|re| re.captures(text))
        .and_then(|caps| caps[1].parse().ok())
        .unwrap_or(DEFAULT_TOP_M)
}

fn extract_state_pair(text: &str) -> (Option<String>, Option<String>) {
    let patterns = [&*COMPARE_TO, &*STATE_FOR, &*STATE_IN, &*STATE_BETWEEN, &*COMPARE_STATES];
    if let Some(caps) = patterns.iter().find_map(|re| re.captures(text)) {
        return (sanitize_state(&caps[1]), sanitize_state(&caps[2]));
    }

    let placeholders: Vec<&str> = STATE_PLACEHOLDER
        .captures_iter(text)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
        .collect();
    if placeholders.len() >= 2 {
        return (sanitize_state(placeholders[0]), sanitize_state(placeholders[1]));
    }

    (None, None)
}

fn extract_region(text: &str) -> Option<String> {
    if let Some(caps) = REGION_IN.captures(text) {
        let state = title_case(&clean(&caps[1]));
        let filler = ["", "the", "last", "past", "recent", "years"];
        if !filler.contains(&state.to_lowercase().as_str()) {
            return Some(state);
        }
    }
    REGION_PLACEHOLDER
        .captures(text)
        .map(|caps| title_case(&caps[1]))
}

fn extract_crop(text: &str) -> Option<String> {
    for re in [&*CROP_FOR_IN, &*CROP_TREND_OF, &*CROP_PRODUCTION_OF] {
        if let Some(crop) = re.captures(text).and_then(|caps| sanitize_crop(&caps[1])) {
            return Some(crop);
        }
    }

    // "Pearl Millet in Maharashtra"
    if let Some(caps) = CROP_IN_STATE.captures(text) {
        let potential = clean(&caps[1]);
        let next = caps[2].trim().to_lowercase();
        let state_words = ["maharashtra", "tamil", "nadu", "kerala", "karnataka", "punjab"];
        if !potential.is_empty()
            && potential.split(' ').count() <= 3
            && state_words.iter().any(|w| next.contains(w))
        {
            if let Some(crop) = sanitize_crop(&potential) {
                return Some(crop);
            }
        }
    }

    CROP_PLACEHOLDER
        .captures(text)
        .and_then(|caps| sanitize_crop(&caps[1]))
        .filter(|crop| crop.len() > 1)
}

fn extract_crop_filter(text: &str) -> Option<String> {
    if let Some(caps) = TOP_CROP_PAIR.captures(text) {
        return sanitize_crop(&caps[1]);
    }
    if let Some(caps) = CROP_PAIR.captures(text) {
        return sanitize_crop(&caps[1]);
    }
    if let Some(caps) = CROPS_OF.captures(text) {
        return sanitize_crop(&caps[1]);
    }
    if let Some(caps) = CROPS_BY.captures(text) {
        return sanitize_crop(&caps[1]);
    }
    extract_crop(text)
}

fn extract_crop_pair(text: &str) -> Vec<String> {
    let listed: Vec<&str> = CROP_TYPE_LIST
        .captures_iter(text)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
        .collect();
    if !listed.is_empty() {
        return listed.into_iter().filter_map(sanitize_crop).collect();
    }
    match PROMOTE.captures(text) {
        Some(caps) => [&caps[1], &caps[2]].into_iter().filter_map(sanitize_crop).collect(),
        None => Vec::new(),
    }
}

/// Collapse runs of whitespace.
fn clean(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

fn title_case(value: &str) -> String {
    value.split_whitespace().map(capitalize).collect::<Vec<_>>().join(" ")
}

/// Trim filler words and accept only known state or UT names.
fn sanitize_state(candidate: &str) -> Option<String> {
    let normalized = title_case(candidate);
    let mut tokens: Vec<&str> = normalized.split(' ').filter(|t| !t.is_empty()).collect();

    let is_filler = |token: &&str| STATE_EXCLUDE_TOKENS.contains(token.to_lowercase().as_str());
    while tokens.first().is_some_and(is_filler) {
        tokens.remove(0);
    }
    while tokens.last().is_some_and(is_filler) {
        tokens.pop();
    }
    if tokens.is_empty() || tokens.iter().any(is_filler) {
        return None;
    }

    let cleaned = tokens.join(" ");
    KNOWN_STATE_NAMES.contains(cleaned.as_str()).then_some(cleaned)
}

fn sanitize_crop(candidate: &str) -> Option<String> {
    let tokens: Vec<String> = candidate
        .split_whitespace()
        .filter(|t| !CROP_EXCLUDE_TOKENS.contains(t.to_lowercase().as_str()))
        .map(capitalize)
        .collect();
    (!tokens.is_empty()).then(|| tokens.join(" "))
}
