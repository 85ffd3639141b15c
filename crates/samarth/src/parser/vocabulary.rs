use std::collections::HashSet;

use once_cell::sync::Lazy;

/// Indian states and union territories, in the casing the datasets use.
pub static KNOWN_STATE_NAMES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    HashSet::from([
        "Andhra Pradesh",
        "Arunachal Pradesh",
        "Assam",
        "Bihar",
        "Chhattisgarh",
        "Goa",
        "Gujarat",
        "Haryana",
        "Himachal Pradesh",
        "Jharkhand",
        "Karnataka",
        "Kerala",
        "Madhya Pradesh",
        "Maharashtra",
        "Manipur",
        "Meghalaya",
        "Mizoram",
        "Nagaland",
        "Odisha",
        "Punjab",
        "Rajasthan",
        "Sikkim",
        "Tamil Nadu",
        "Telangana",
        "Tripura",
        "Uttar Pradesh",
        "Uttarakhand",
        "West Bengal",
        "Delhi",
        "Jammu And Kashmir",
        "Ladakh",
        "Puducherry",
        "Chandigarh",
        "Andaman And Nicobar Islands",
        "Dadra And Nagar Haveli And Daman And Diu",
        "Lakshadweep",
    ])
});

/// Words that regex captures drag along with a state name.
pub static STATE_EXCLUDE_TOKENS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    HashSet::from([
        "most", "recent", "year", "years", "available", "lowest", "highest", "district", "compare",
        "that", "with", "the", "over", "vs", "versus", "in", "for", "last", "past", "previous",
        "list", "top", "state", "states", "crop", "crops", "rainfall", "production", "yield",
        "average", "annual", "trend", "policy", "best", "worst", "performing", "performance",
        "question", "had", "having",
    ])
});

pub static CROP_EXCLUDE_TOKENS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    HashSet::from([
        "annual", "average", "best", "compare", "crops", "crop", "data", "district", "districts",
        "list", "most", "over", "past", "performance", "performing", "policy", "previous",
        "production", "question", "rainfall", "recent", "state", "states", "the", "top", "trend",
        "with", "worst", "years", "year",
    ])
});
