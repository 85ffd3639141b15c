use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use samarth_pipeline::{Metadata, StageError};

use super::analysis::{
    Analysis, DistrictExtremes, DistrictProduction, PolicyArguments, ProductionTrend, RainfallComparison,
    YearValue,
};
use super::{AnalyzedQuery, decode, encode};

const MISSING: &str = "-";

/// Final response for one question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub answer: String,
    pub tables: Vec<Table>,
    pub citations: Vec<Citation>,
    /// `{intent, params}` as parsed
    pub debug: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub title: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    fn new(title: impl Into<String>, headers: &[&str], rows: Vec<Vec<Value>>) -> Self {
        Self {
            title: title.into(),
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows,
        }
    }
}

/// Open-data resource an answer was computed from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub dataset: String,
    pub source: String,
    pub resource_id: String,
}

impl Citation {
    pub fn rainfall() -> Self {
        Self {
            dataset: "rainfall".to_string(),
            source: "https://data.gov.in/resources/rainfall-sub-division-wise-distribution".to_string(),
            resource_id: "cca5f77c-68b3-43df-bd01-beb3b69204ed".to_string(),
        }
    }

    pub fn agriculture() -> Self {
        Self {
            dataset: "agriculture".to_string(),
            source: "https://data.gov.in/resources/district-wise-crop-production-statistics".to_string(),
            resource_id: "9ef84268-d588-465a-a308-a864a43d0070".to_string(),
        }
    }
}

/// [`AnalyzedQuery`] → [`Answer`]
pub fn process(payload: &Value, _metadata: &Metadata) -> Result<Value, StageError> {
    let AnalyzedQuery { query, results, .. } = decode(payload)?;

    let (answer, tables, citations) = match &results {
        Analysis::RainfallComparison(r) => rainfall_comparison(r),
        Analysis::DistrictExtremes(r) => district_extremes(r),
        Analysis::ProductionTrend(r) => production_trend(r),
        Analysis::PolicyArguments(r) => policy_arguments(r),
    };
    tracing::debug!(intent = query.name(), tables = tables.len(), "answer formatted");

    encode(&Answer {
        answer,
        tables,
        citations,
        debug: encode(&query)?,
    })
}

type Formatted = (String, Vec<Table>, Vec<Citation>);

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

fn rainfall_comparison(r: &RainfallComparison) -> Formatted {
    let value_in = |series: &[YearValue], year: i32| {
        series
            .iter()
            .find(|p| p.year == year)
            .map_or(Value::Null, |p| json!(round_to(p.value, 1)))
    };
    let rainfall_rows = r
        .years
        .iter()
        .map(|&year| vec![json!(year), value_in(r.rainfall_a.as_slice(), year), value_in(r.rainfall_b.as_slice(), year)])
        .collect();
    let rainfall_table = Table::new(
        "Average annual rainfall (mm)",
        &["Year", r.state_a.as_str(), r.state_b.as_str()],
        rainfall_rows,
    );

    let mut crop_rows = Vec::new();
    for state in [&r.state_a, &r.state_b] {
        let ranked: Vec<_> = r.crop_rankings.iter().filter(|c| &c.state == state).collect();
        if ranked.is_empty() {
            crop_rows.push(vec![json!(state), json!("No data"), json!(MISSING)]);
        }
        for crop in ranked {
            crop_rows.push(vec![
                json!(state),
                json!(crop.crop),
                json!(round_to(crop.production_tonnes, 2)),
            ]);
        }
    }
    let mut crop_title = format!("Top {} crops by production", r.top_m);
    if let Some(filter) = &r.crop_filter {
        crop_title.push_str(&format!(" (filter: {filter})"));
    }
    let crop_table = Table::new(crop_title, &["State", "Crop", "Production (tonnes)"], crop_rows);

    let mut answer = format!(
        "Compared rainfall for {a} and {b} over {n} year(s). {a} averaged {avg_a:.1} mm while {b} averaged {avg_b:.1} mm.",
        a = r.state_a,
        b = r.state_b,
        n = r.years.len(),
        avg_a = r.avg_rainfall_a,
        avg_b = r.avg_rainfall_b,
    );
    if let Some(filter) = &r.crop_filter {
        answer.push_str(&format!(" Filtered crop category: {filter}."));
    }

    (
        answer,
        vec![rainfall_table, crop_table],
        vec![Citation::rainfall(), Citation::agriculture()],
    )
}

fn district_extremes(r: &DistrictExtremes) -> Formatted {
    let row = |state: &str, found: Option<&DistrictProduction>| match found {
        Some(d) => vec![json!(state), json!(d.district), json!(round_to(d.production_tonnes, 2))],
        None => vec![json!(state), json!("No records"), json!(MISSING)],
    };
    let unreported = |state: &str| format!("{state} did not report {} production in {}.", r.crop, r.year);

    let high = match &r.state_a_max {
        Some(d) => format!(
            "{}'s peak output came from {} with {:.1} tonnes.",
            r.state_a, d.district, d.production_tonnes
        ),
        None => unreported(r.state_a.as_str()),
    };
    let low = match &r.state_b_min {
        Some(d) => format!(
            "{}'s lowest output was {} at {:.1} tonnes.",
            r.state_b, d.district, d.production_tonnes
        ),
        None => unreported(r.state_b.as_str()),
    };

    let table = Table::new(
        format!("District extremes for {} in {}", r.crop, r.year),
        &["State", "District", "Production (tonnes)"],
        vec![
            row(r.state_a.as_str(), r.state_a_max.as_ref()),
            row(r.state_b.as_str(), r.state_b_min.as_ref()),
        ],
    );
    (format!("{high} {low}"), vec![table], vec![Citation::agriculture()])
}

/// Strength and direction of a correlation coefficient
fn describe_correlation(coefficient: Option<f64>) -> String {
    let Some(r) = coefficient else {
        return "insufficient data for correlation".to_string();
    };
    let level = match r.abs() {
        a if a >= 0.7 => "strong",
        a if a >= 0.4 => "moderate",
        _ => "weak",
    };
    let direction = if r > 0.0 { "positive" } else { "negative" };
    format!("{level} {direction} association")
}

fn production_trend(r: &ProductionTrend) -> Formatted {
    let rows = r
        .series
        .iter()
        .map(|p| {
            vec![
                json!(p.year),
                json!(round_to(p.production_tonnes, 2)),
                json!(round_to(p.annual_rainfall_mm, 1)),
            ]
        })
        .collect();
    let table = Table::new(
        format!("{} {} vs rainfall", r.state, r.crop),
        &["Year", "Production (tonnes)", "Rainfall (mm)"],
        rows,
    );

    let coefficient = r.correlation.map_or_else(|| "n/a".to_string(), |c| format!("{c:.2}"));
    let answer = format!(
        "{} recorded a {:.1}% change in {} production over {} year(s). Rainfall correlation indicates {} (r={coefficient}).",
        r.state,
        r.trend_pct,
        r.crop,
        r.years.len(),
        describe_correlation(r.correlation),
    );

    (
        answer,
        vec![table],
        vec![Citation::agriculture(), Citation::rainfall()],
    )
}

fn policy_arguments(r: &PolicyArguments) -> Formatted {
    let mut insights = Vec::new();
    let mut tables = Vec::new();

    for (crop, summary) in [(&r.current_crop, &r.current), (&r.proposed_crop, &r.proposed)] {
        let Some(summary) = summary else {
            insights.push(format!("No production records for {crop} in {}.", r.state));
            continue;
        };
        insights.push(format!(
            "{crop}: avg {:.1} tonnes over {} year(s) with {:.1}% total change.",
            summary.avg_production,
            r.years.len(),
            summary.growth_pct
        ));
        tables.push(Table::new(
            format!("{crop} production"),
            &["Year", "Production (tonnes)"],
            summary
                .series
                .iter()
                .map(|p| vec![json!(p.year), json!(round_to(p.value, 2))])
                .collect(),
        ));
    }

    if let Some(rain) = &r.rainfall {
        insights.push(format!(
            "Rainfall averaged {:.1} mm with {:.1}% change, affecting water availability for {}.",
            rain.avg_rainfall, rain.trend_pct, r.proposed_crop
        ));
        tables.push(Table::new(
            "Rainfall context",
            &["Year", "Rainfall (mm)"],
            rain.series
                .iter()
                .map(|p| vec![json!(p.year), json!(round_to(p.value, 1))])
                .collect(),
        ));
    }

    let answer = format!(
        "Supporting a shift towards {}: {}",
        r.proposed_crop,
        insights.join("; ")
    );
    (
        answer,
        tables,
        vec![Citation::agriculture(), Citation::rainfall()],
    )
}
