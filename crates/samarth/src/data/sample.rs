use super::{CropRecord, RainfallRecord};

const YEARS: std::ops::RangeInclusive<i32> = 2017..=2021;

/// Year-to-year swing applied to every series
const WOBBLE: [f64; 5] = [0.0, 0.06, -0.04, 0.09, 0.02];

struct StateProfile {
    state: &'static str,
    rainfall_mm: f64,
    districts: [(&'static str, f64); 3],
    crops: [(&'static str, f64); 3],
}

const PROFILES: [StateProfile; 4] = [
    StateProfile {
        state: "Kerala",
        rainfall_mm: 2900.0,
        districts: [("Thrissur", 1.0), ("Palakkad", 1.35), ("Wayanad", 0.55)],
        crops: [("Rice", 180_000.0), ("Coconut", 240_000.0), ("Banana", 95_000.0)],
    },
    StateProfile {
        state: "Punjab",
        rainfall_mm: 650.0,
        districts: [("Ludhiana", 1.4), ("Amritsar", 1.0), ("Bathinda", 0.7)],
        crops: [("Wheat", 1_650_000.0), ("Rice", 1_200_000.0), ("Maize", 110_000.0)],
    },
    StateProfile {
        state: "Maharashtra",
        rainfall_mm: 1150.0,
        districts: [("Pune", 0.9), ("Nagpur", 1.1), ("Nashik", 1.25)],
        crops: [("Jowar", 420_000.0), ("Pearl Millet", 310_000.0), ("Soybean", 560_000.0)],
    },
    StateProfile {
        state: "Karnataka",
        rainfall_mm: 1250.0,
        districts: [("Mysuru", 1.05), ("Belagavi", 1.3), ("Dharwad", 0.8)],
        crops: [("Ragi", 380_000.0), ("Soybean", 150_000.0), ("Maize", 640_000.0)],
    },
];

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

pub(super) fn rainfall() -> Vec<RainfallRecord> {
    PROFILES
        .iter()
        .flat_map(|profile| {
            YEARS.zip(WOBBLE).map(move |(year, wobble)| RainfallRecord {
                state: profile.state.to_string(),
                year,
                annual_rainfall_mm: round_to(profile.rainfall_mm * (1.0 + wobble), 1),
            })
        })
        .collect()
}

pub(super) fn agriculture() -> Vec<CropRecord> {
    let mut records = Vec::new();
    for profile in &PROFILES {
        for (crop_index, (crop, base)) in profile.crops.iter().enumerate() {
            for (year_index, (year, wobble)) in YEARS.zip(WOBBLE).enumerate() {
                // Crops drift apart over time so trends differ per crop
                let growth = 1.0 + (year_index as f64) * 0.03 * (crop_index as f64 - 0.5);
                for (district, share) in &profile.districts {
                    records.push(CropRecord {
                        state: profile.state.to_string(),
                        district: district.to_string(),
                        crop: crop.to_string(),
                        year,
                        production_tonnes: round_to(base / 3.0 * share * growth * (1.0 + wobble / 2.0), 2),
                    });
                }
            }
        }
    }
    records
}
