use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use samarth_pipeline::{Metadata, StageError};

use super::{AnalyzedQuery, LoadedQuery, decode, encode};
use crate::data::{CropRecord, Datasets, RainfallRecord};
use crate::parser::Intent;

const COMPARE_DEFAULT_YEARS: usize = 5;
const TREND_DEFAULT_YEARS: usize = 10;
const POLICY_DEFAULT_YEARS: usize = 5;

/// Analysis results, tagged by kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Analysis {
    RainfallComparison(RainfallComparison),
    DistrictExtremes(DistrictExtremes),
    ProductionTrend(ProductionTrend),
    PolicyArguments(PolicyArguments),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct YearValue {
    pub year: i32,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CropRank {
    pub state: String,
    pub crop: String,
    pub production_tonnes: f64,
    pub rank: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RainfallComparison {
    pub state_a: String,
    pub state_b: String,
    pub years: Vec<i32>,
    /// Mean rainfall per selected year
    pub rainfall_a: Vec<YearValue>,
    pub rainfall_b: Vec<YearValue>,
    pub avg_rainfall_a: f64,
    pub avg_rainfall_b: f64,
    /// Top crops of state A, then of state B
    pub crop_rankings: Vec<CropRank>,
    pub crop_filter: Option<String>,
    pub top_m: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistrictProduction {
    pub district: String,
    pub production_tonnes: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistrictExtremes {
    pub state_a: String,
    pub state_b: String,
    pub crop: String,
    pub year: i32,
    /// Highest producing district of state A
    pub state_a_max: Option<DistrictProduction>,
    /// Lowest producing district of state B
    pub state_b_min: Option<DistrictProduction>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub year: i32,
    pub production_tonnes: f64,
    pub annual_rainfall_mm: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionTrend {
    pub state: String,
    pub crop: String,
    pub years: Vec<i32>,
    /// Years with both production and rainfall
    pub series: Vec<TrendPoint>,
    /// Pearson r between production and rainfall; `None` when undefined
    pub correlation: Option<f64>,
    pub trend_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CropSummary {
    pub crop: String,
    pub series: Vec<YearValue>,
    pub growth_pct: f64,
    pub avg_production: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RainfallSummary {
    pub series: Vec<YearValue>,
    pub avg_rainfall: f64,
    pub trend_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyArguments {
    pub state: String,
    pub current_crop: String,
    pub proposed_crop: String,
    pub years: Vec<i32>,
    pub current: Option<CropSummary>,
    pub proposed: Option<CropSummary>,
    pub rainfall: Option<RainfallSummary>,
}

/// [`LoadedQuery`] → [`AnalyzedQuery`]
pub fn process(payload: &Value, _metadata: &Metadata) -> Result<Value, StageError> {
    let LoadedQuery {
        question,
        query,
        datasets,
    } = decode(payload)?;

    tracing::debug!(intent = query.name(), "analyzing");
    let results = analyze(&query, &datasets)?;

    encode(&AnalyzedQuery {
        question,
        query,
        results,
    })
}

pub fn analyze(query: &Intent, datasets: &Datasets) -> Result<Analysis, StageError> {
    match query {
        Intent::CompareRainfallAndCrops {
            state_a,
            state_b,
            years,
            top_m,
            crop_filter,
        } => {
            let state_a = required(state_a, "first state")?;
            let state_b = required(state_b, "second state")?;
            compare_rainfall_and_crops(
                state_a,
                state_b,
                *years,
                *top_m,
                crop_filter.as_deref(),
                agriculture(datasets)?,
                rainfall(datasets)?,
            )
            .map(Analysis::RainfallComparison)
        }
        Intent::DistrictExtremes {
            state_a,
            state_b,
            crop,
            year,
        } => {
            let state_a = required(state_a, "first state")?;
            let state_b = required(state_b, "second state")?;
            let crop = required(crop, "crop")?;
            district_extremes(state_a, state_b, crop, *year, agriculture(datasets)?)
                .map(Analysis::DistrictExtremes)
        }
        Intent::ProductionTrendWithClimate {
            region,
            crop,
            years,
        } => {
            let state = required(region, "region")?;
            let crop = required(crop, "crop")?;
            production_trend(state, crop, *years, agriculture(datasets)?, rainfall(datasets)?)
                .map(Analysis::ProductionTrend)
        }
        Intent::PolicyArguments {
            region,
            crop_a,
            crop_b,
            years,
        } => {
            // "promote A over B": A is proposed, B is what it would replace
            let state = required(region, "region")?;
            let proposed = required(crop_a, "crop to promote")?;
            let current = required(crop_b, "crop it would replace")?;
            Ok(Analysis::PolicyArguments(policy_arguments(
                state,
                current,
                proposed,
                *years,
                agriculture(datasets)?,
                rainfall(datasets)?,
            )?))
        }
        Intent::Unknown { raw } => Err(StageError::Unsupported(format!(
            "no analysis matches the question '{raw}'"
        ))),
    }
}

fn required<'a>(value: &'a Option<String>, what: &str) -> Result<&'a str, StageError> {
    value
        .as_deref()
        .ok_or_else(|| StageError::InvalidInput(format!("could not find the {what} in the question")))
}

fn agriculture(datasets: &Datasets) -> Result<&[CropRecord], StageError> {
    datasets
        .agriculture
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("agriculture dataset was not loaded").into())
}

fn rainfall(datasets: &Datasets) -> Result<&[RainfallRecord], StageError> {
    datasets
        .rainfall
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("rainfall dataset was not loaded").into())
}

fn compare_rainfall_and_crops(
    state_a: &str,
    state_b: &str,
    years: Option<u32>,
    top_m: u32,
    crop_filter: Option<&str>,
    agriculture: &[CropRecord],
    rainfall: &[RainfallRecord],
) -> Result<RainfallComparison, StageError> {
    let in_states = |state: &str| state == state_a || state == state_b;
    let rows: Vec<&RainfallRecord> = rainfall.iter().filter(|r| in_states(r.state.as_str())).collect();
    let years = select_years(rows.iter().map(|r| r.year), years, COMPARE_DEFAULT_YEARS);

    let for_state = |state: &str| -> Result<(Vec<YearValue>, f64), StageError> {
        let values: Vec<(i32, f64)> = rows
            .iter()
            .filter(|r| r.state == state && years.contains(&r.year))
            .map(|r| (r.year, r.annual_rainfall_mm))
            .collect();
        let avg = mean(values.iter().map(|(_, v)| *v))
            .ok_or_else(|| StageError::NoData(format!("no rainfall records for {state}")))?;
        Ok((mean_by_year(values), avg))
    };
    let (rainfall_a, avg_rainfall_a) = for_state(state_a)?;
    let (rainfall_b, avg_rainfall_b) = for_state(state_b)?;

    let filter = crop_filter.map(str::to_lowercase);
    let mut totals: BTreeMap<(&str, &str), f64> = BTreeMap::new();
    for record in agriculture {
        if !in_states(record.state.as_str()) || !years.contains(&record.year) {
            continue;
        }
        if let Some(filter) = &filter {
            if !record.crop.to_lowercase().contains(filter.as_str()) {
                continue;
            }
        }
        *totals.entry((record.state.as_str(), record.crop.as_str())).or_default() += record.production_tonnes;
    }

    let mut crop_rankings = Vec::new();
    for state in [state_a, state_b] {
        let mut ranked: Vec<(&str, f64)> = totals
            .iter()
            .filter(|((s, _), _)| *s == state)
            .map(|((_, crop), total)| (*crop, *total))
            .collect();
        // Stable: equal totals keep alphabetical order
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        crop_rankings.extend(ranked.into_iter().take(top_m as usize).zip(1..).map(
            |((crop, total), rank)| CropRank {
                state: state.to_string(),
                crop: crop.to_string(),
                production_tonnes: total,
                rank,
            },
        ));
    }

    Ok(RainfallComparison {
        state_a: state_a.to_string(),
        state_b: state_b.to_string(),
        years,
        rainfall_a,
        rainfall_b,
        avg_rainfall_a,
        avg_rainfall_b,
        crop_rankings,
        crop_filter: crop_filter.map(str::to_string),
        top_m,
    })
}

fn district_extremes(
    state_a: &str,
    state_b: &str,
    crop: &str,
    year: Option<i32>,
    agriculture: &[CropRecord],
) -> Result<DistrictExtremes, StageError> {
    let subset: Vec<&CropRecord> = agriculture
        .iter()
        .filter(|r| r.crop == crop && year.is_none_or(|y| r.year == y))
        .collect();

    let Some(year) = year.or_else(|| subset.iter().map(|r| r.year).max()) else {
        return Err(StageError::NoData(format!("no production records for {crop}")));
    };
    if subset.is_empty() {
        return Err(StageError::NoData(format!("no production records for {crop} in {year}")));
    }

    let rows_for = |state: &str| -> Vec<&CropRecord> {
        subset
            .iter()
            .filter(|r| r.year == year && r.state == state)
            .copied()
            .collect()
    };
    // First district wins ties
    let max = rows_for(state_a).into_iter().fold(None::<&CropRecord>, |best, r| match best {
        Some(b) if b.production_tonnes >= r.production_tonnes => Some(b),
        _ => Some(r),
    });
    let min = rows_for(state_b).into_iter().fold(None::<&CropRecord>, |best, r| match best {
        Some(b) if b.production_tonnes <= r.production_tonnes => Some(b),
        _ => Some(r),
    });

    let to_district = |r: &CropRecord| DistrictProduction {
        district: r.district.clone(),
        production_tonnes: r.production_tonnes,
    };

    Ok(DistrictExtremes {
        state_a: state_a.to_string(),
        state_b: state_b.to_string(),
        crop: crop.to_string(),
        year,
        state_a_max: max.map(to_district),
        state_b_min: min.map(to_district),
    })
}

fn production_trend(
    state: &str,
    crop: &str,
    years: Option<u32>,
    agriculture: &[CropRecord],
    rainfall: &[RainfallRecord],
) -> Result<ProductionTrend, StageError> {
    let crops: Vec<&CropRecord> = agriculture
        .iter()
        .filter(|r| r.state == state && r.crop == crop)
        .collect();
    if crops.is_empty() {
        return Err(StageError::NoData(format!("no {crop} production records for {state}")));
    }
    let rain: Vec<&RainfallRecord> = rainfall.iter().filter(|r| r.state == state).collect();
    if rain.is_empty() {
        return Err(StageError::NoData(format!("no rainfall records for {state}")));
    }

    let years = select_years(crops.iter().map(|r| r.year), years, TREND_DEFAULT_YEARS);
    let production = sum_by_year(
        crops
            .iter()
            .filter(|r| years.contains(&r.year))
            .map(|r| (r.year, r.production_tonnes)),
    );
    let rain = mean_by_year(
        rain.iter()
            .filter(|r| years.contains(&r.year))
            .map(|r| (r.year, r.annual_rainfall_mm)),
    );

    let series: Vec<TrendPoint> = production
        .iter()
        .filter_map(|p| {
            rain.iter().find(|r| r.year == p.year).map(|r| TrendPoint {
                year: p.year,
                production_tonnes: p.value,
                annual_rainfall_mm: r.value,
            })
        })
        .collect();
    let correlation = pearson(
        &series.iter().map(|p| p.production_tonnes).collect::<Vec<_>>(),
        &series.iter().map(|p| p.annual_rainfall_mm).collect::<Vec<_>>(),
    );

    Ok(ProductionTrend {
        state: state.to_string(),
        crop: crop.to_string(),
        years,
        series,
        correlation,
        trend_pct: growth_pct(&production),
    })
}

fn policy_arguments(
    state: &str,
    current_crop: &str,
    proposed_crop: &str,
    years: Option<u32>,
    agriculture: &[CropRecord],
    rainfall: &[RainfallRecord],
) -> Result<PolicyArguments, StageError> {
    let relevant: Vec<&CropRecord> = agriculture.iter().filter(|r| r.state == state).collect();
    if relevant.is_empty() {
        return Err(StageError::NoData(format!("no production records for {state}")));
    }
    let years = select_years(relevant.iter().map(|r| r.year), years, POLICY_DEFAULT_YEARS);

    let summarize = |crop: &str| -> Option<CropSummary> {
        let series = sum_by_year(
            relevant
                .iter()
                .filter(|r| r.crop == crop && years.contains(&r.year))
                .map(|r| (r.year, r.production_tonnes)),
        );
        let avg_production = mean(series.iter().map(|p| p.value))?;
        Some(CropSummary {
            crop: crop.to_string(),
            growth_pct: growth_pct(&series),
            avg_production,
            series,
        })
    };

    let rain = mean_by_year(
        rainfall
            .iter()
            .filter(|r| r.state == state && years.contains(&r.year))
            .map(|r| (r.year, r.annual_rainfall_mm)),
    );
    let rainfall = mean(rain.iter().map(|p| p.value)).map(|avg_rainfall| RainfallSummary {
        avg_rainfall,
        trend_pct: growth_pct(&rain),
        series: rain,
    });

    Ok(PolicyArguments {
        state: state.to_string(),
        current_crop: current_crop.to_string(),
        proposed_crop: proposed_crop.to_string(),
        current: summarize(current_crop),
        proposed: summarize(proposed_crop),
        years,
        rainfall,
    })
}

/// The most recent `requested` years (or up to `default_cap` when unset),
/// ascending.
fn select_years(available: impl Iterator<Item = i32>, requested: Option<u32>, default_cap: usize) -> Vec<i32> {
    let distinct: BTreeSet<i32> = available.collect();
    let take = match requested {
        Some(n) if n > 0 => n as usize,
        _ => distinct.len().min(default_cap),
    };
    let mut years: Vec<i32> = distinct.into_iter().rev().take(take).collect();
    years.reverse();
    years
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}

fn sum_by_year(values: impl Iterator<Item = (i32, f64)>) -> Vec<YearValue> {
    let mut totals: BTreeMap<i32, f64> = BTreeMap::new();
    for (year, value) in values {
        *totals.entry(year).or_default() += value;
    }
    totals.into_iter().map(|(year, value)| YearValue { year, value }).collect()
}

fn mean_by_year(values: impl IntoIterator<Item = (i32, f64)>) -> Vec<YearValue> {
    let mut groups: BTreeMap<i32, Vec<f64>> = BTreeMap::new();
    for (year, value) in values {
        groups.entry(year).or_default().push(value);
    }
    groups
        .into_iter()
        .filter_map(|(year, values)| mean(values.into_iter()).map(|value| YearValue { year, value }))
        .collect()
}

/// Percent change from the first to the last value; 0 when undefined.
fn growth_pct(series: &[YearValue]) -> f64 {
    match (series.first(), series.last()) {
        (Some(first), Some(last)) if series.len() >= 2 && first.value != 0.0 => {
            (last.value - first.value) / first.value * 100.0
        }
        _ => 0.0,
    }
}

/// Pearson correlation; `None` for fewer than two points or zero variance.
fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    if xs.len() != ys.len() || xs.len() < 2 {
        return None;
    }
    let mx = mean(xs.iter().copied())?;
    let my = mean(ys.iter().copied())?;
    let (mut cov, mut vx, mut vy) = (0.0, 0.0, 0.0);
    for (x, y) in xs.iter().zip(ys) {
        cov += (x - mx) * (y - my);
        vx += (x - mx).powi(2);
        vy += (y - my).powi(2);
    }
    let denom = (vx * vy).sqrt();
    (denom > 0.0).then(|| cov / denom)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn crop(state: &str, district: &str, crop: &str, year: i32, tonnes: f64) -> CropRecord {
        CropRecord {
            state: state.into(),
            district: district.into(),
            crop: crop.into(),
            year,
            production_tonnes: tonnes,
        }
    }

    fn rain(state: &str, year: i32, mm: f64) -> RainfallRecord {
        RainfallRecord {
            state: state.into(),
            year,
            annual_rainfall_mm: mm,
        }
    }

    fn datasets(agriculture: Vec<CropRecord>, rainfall: Vec<RainfallRecord>) -> Datasets {
        Datasets {
            agriculture: Some(agriculture),
            rainfall: Some(rainfall),
        }
    }

    #[test]
    fn test_compare_selects_recent_years_and_ranks_crops() {
        let data = datasets(
            vec![
                crop("Kerala", "Thrissur", "Rice", 2021, 10.0),
                crop("Kerala", "Thrissur", "Banana", 2021, 30.0),
                crop("Kerala", "Wayanad", "Rice", 2020, 25.0),
                crop("Kerala", "Wayanad", "Pepper", 2019, 500.0),
                crop("Punjab", "Ludhiana", "Wheat", 2021, 90.0),
            ],
            vec![
                rain("Kerala", 2019, 3000.0),
                rain("Kerala", 2020, 2800.0),
                rain("Kerala", 2021, 2900.0),
                rain("Punjab", 2020, 600.0),
                rain("Punjab", 2021, 700.0),
            ],
        );
        let query = Intent::CompareRainfallAndCrops {
            state_a: Some("Kerala".into()),
            state_b: Some("Punjab".into()),
            years: Some(2),
            top_m: 1,
            crop_filter: None,
        };

        let Analysis::RainfallComparison(result) = analyze(&query, &data).unwrap() else {
            panic!("wrong analysis kind");
        };

        assert_eq!(result.years, vec![2020, 2021]);
        assert_eq!(result.avg_rainfall_a, 2850.0);
        assert_eq!(result.avg_rainfall_b, 650.0);
        assert_eq!(result.rainfall_a.len(), 2);
        // Pepper is outside the selected years; Rice totals 35
        assert_eq!(
            result.crop_rankings,
            vec![
                CropRank {
                    state: "Kerala".into(),
                    crop: "Rice".into(),
                    production_tonnes: 35.0,
                    rank: 1
                },
                CropRank {
                    state: "Punjab".into(),
                    crop: "Wheat".into(),
                    production_tonnes: 90.0,
                    rank: 1
                },
            ]
        );
    }

    #[test]
    fn test_compare_crop_filter_is_case_insensitive_substring() {
        let data = datasets(
            vec![
                crop("Kerala", "Thrissur", "Rice", 2021, 10.0),
                crop("Kerala", "Thrissur", "Wild Rice", 2021, 5.0),
                crop("Kerala", "Thrissur", "Banana", 2021, 30.0),
            ],
            vec![rain("Kerala", 2021, 2900.0), rain("Punjab", 2021, 700.0)],
        );
        let query = Intent::CompareRainfallAndCrops {
            state_a: Some("Kerala".into()),
            state_b: Some("Punjab".into()),
            years: None,
            top_m: 3,
            crop_filter: Some("rice".into()),
        };

        let Analysis::RainfallComparison(result) = analyze(&query, &data).unwrap() else {
            panic!("wrong analysis kind");
        };
        let crops: Vec<&str> = result.crop_rankings.iter().map(|r| r.crop.as_str()).collect();
        assert_eq!(crops, vec!["Rice", "Wild Rice"]);
    }

    #[test]
    fn test_compare_without_rainfall_is_no_data() {
        let data = datasets(Vec::new(), vec![rain("Kerala", 2021, 2900.0)]);
        let query = Intent::CompareRainfallAndCrops {
            state_a: Some("Kerala".into()),
            state_b: Some("Goa".into()),
            years: None,
            top_m: 3,
            crop_filter: None,
        };
        assert_eq!(analyze(&query, &data).unwrap_err().kind(), "no_data");
    }

    #[test]
    fn test_district_extremes_defaults_to_latest_year() {
        let data = datasets(
            vec![
                crop("Punjab", "Ludhiana", "Rice", 2020, 50.0),
                crop("Punjab", "Amritsar", "Rice", 2021, 40.0),
                crop("Punjab", "Bathinda", "Rice", 2021, 45.0),
                crop("Kerala", "Thrissur", "Rice", 2021, 12.0),
                crop("Kerala", "Wayanad", "Rice", 2021, 8.0),
            ],
            Vec::new(),
        );
        let query = Intent::DistrictExtremes {
            state_a: Some("Punjab".into()),
            state_b: Some("Kerala".into()),
            crop: Some("Rice".into()),
            year: None,
        };

        let Analysis::DistrictExtremes(result) = analyze(&query, &data).unwrap() else {
            panic!("wrong analysis kind");
        };
        assert_eq!(result.year, 2021);
        assert_eq!(result.state_a_max.unwrap().district, "Bathinda");
        assert_eq!(result.state_b_min.unwrap().district, "Wayanad");
    }

    #[test]
    fn test_district_extremes_missing_state_rows() {
        let data = datasets(vec![crop("Punjab", "Ludhiana", "Rice", 2020, 50.0)], Vec::new());
        let query = Intent::DistrictExtremes {
            state_a: Some("Punjab".into()),
            state_b: Some("Goa".into()),
            crop: Some("Rice".into()),
            year: Some(2020),
        };

        let Analysis::DistrictExtremes(result) = analyze(&query, &data).unwrap() else {
            panic!("wrong analysis kind");
        };
        assert!(result.state_a_max.is_some());
        assert!(result.state_b_min.is_none());

        let query = Intent::DistrictExtremes {
            state_a: Some("Punjab".into()),
            state_b: Some("Goa".into()),
            crop: Some("Rice".into()),
            year: Some(1999),
        };
        assert_eq!(analyze(&query, &data).unwrap_err().kind(), "no_data");
    }

    #[test]
    fn test_production_trend_correlation_and_growth() {
        let data = datasets(
            vec![
                crop("Punjab", "Ludhiana", "Wheat", 2019, 100.0),
                crop("Punjab", "Amritsar", "Wheat", 2019, 100.0),
                crop("Punjab", "Ludhiana", "Wheat", 2020, 250.0),
                crop("Punjab", "Ludhiana", "Wheat", 2021, 300.0),
            ],
            vec![
                rain("Punjab", 2019, 500.0),
                rain("Punjab", 2020, 625.0),
                rain("Punjab", 2021, 750.0),
            ],
        );
        let query = Intent::ProductionTrendWithClimate {
            region: Some("Punjab".into()),
            crop: Some("Wheat".into()),
            years: None,
        };

        let Analysis::ProductionTrend(result) = analyze(&query, &data).unwrap() else {
            panic!("wrong analysis kind");
        };
        assert_eq!(result.years, vec![2019, 2020, 2021]);
        assert_eq!(result.series[0].production_tonnes, 200.0);
        assert_eq!(result.trend_pct, 50.0);
        // Production is an exact linear function of rainfall
        assert!((result.correlation.unwrap() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_policy_arguments_summaries() {
        let data = datasets(
            vec![
                crop("Karnataka", "Mysuru", "Ragi", 2020, 10.0),
                crop("Karnataka", "Mysuru", "Ragi", 2021, 15.0),
                crop("Karnataka", "Mysuru", "Maize", 2021, 40.0),
            ],
            Vec::new(),
        );
        let query = Intent::PolicyArguments {
            region: Some("Karnataka".into()),
            crop_a: Some("Ragi".into()),
            crop_b: Some("Maize".into()),
            years: None,
        };

        let Analysis::PolicyArguments(result) = analyze(&query, &data).unwrap() else {
            panic!("wrong analysis kind");
        };
        let proposed = result.proposed.unwrap();
        assert_eq!(proposed.growth_pct, 50.0);
        assert_eq!(proposed.avg_production, 12.5);
        assert_eq!(result.current.unwrap().series.len(), 1);
        assert!(result.rainfall.is_none());
    }

    #[test]
    fn test_missing_parameters_and_unknown_intent() {
        let data = datasets(Vec::new(), Vec::new());
        let query = Intent::ProductionTrendWithClimate {
            region: None,
            crop: Some("Wheat".into()),
            years: None,
        };
        assert_eq!(analyze(&query, &data).unwrap_err().kind(), "invalid_input");

        let query = Intent::Unknown { raw: "hello".into() };
        assert_eq!(analyze(&query, &data).unwrap_err().kind(), "unsupported");
    }

    #[test]
    fn test_pearson_undefined_cases() {
        assert_eq!(pearson(&[1.0], &[2.0]), None);
        assert_eq!(pearson(&[1.0, 1.0], &[2.0, 3.0]), None);
        assert!((pearson(&[1.0, 2.0, 3.0], &[3.0, 2.0, 1.0]).unwrap() + 1.0).abs() < 1e-12);
    }
}
