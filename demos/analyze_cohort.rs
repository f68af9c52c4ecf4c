//! Analyze a small synthetic cohort under both flavors, then fit a ridge
//! model of composite score from the metric vector.

use engagement_flux::predictor::{
    blend, FeatureMatrix, Predictor, RidgePredictor, TWO_MODEL_BLEND,
};
use engagement_flux::report::render_summary;
use engagement_flux::{AnalysisConfig, EngagementPipeline, ReportEncoder};
use serde_json::{json, Value};

fn synthetic_cohort() -> Value {
    let creators = [
        ("steady_sam", 1_000u64, 20i64, 3u64),
        ("rising_rita", 400, 90, 5),
        ("fading_fred", 3_000, -120, 2),
        ("spiky_sue", 800, 0, 40),
        ("tiny_tom", 50, 2, 1),
        ("viral_vic", 200, 300, 25),
    ];

    let mut cohort = serde_json::Map::new();
    for (name, base_views, trend, noise) in creators {
        let posts: Vec<Value> = (0..12u64)
            .map(|day| {
                let wobble = if day % 3 == 0 { noise * 10 } else { 0 };
                let views = (base_views as i64 + trend * day as i64).max(10) as u64 + wobble;
                json!({
                    "timestamp": format!("2024-03-{:02}T18:00:00Z", day + 1),
                    "title": format!("{name} post {day}"),
                    "views": views,
                    "likes": views / 12 + day,
                    "comments": views / 90 + noise / 4,
                    "shares": views / 200 + day % 4,
                })
            })
            .collect();
        cohort.insert(name.to_string(), Value::Array(posts));
    }
    Value::Object(cohort)
}

fn main() {
    let cohort = synthetic_cohort().to_string();

    for config in [
        AnalysisConfig::engagement_default(),
        AnalysisConfig::content_default(),
    ] {
        let pipeline = match EngagementPipeline::new(config) {
            Ok(p) => p,
            Err(e) => {
                eprintln!("Error: {e}");
                return;
            }
        };
        let analysis = match pipeline.analyze_json(&cohort) {
            Ok(a) => a,
            Err(e) => {
                eprintln!("Error: {e}");
                return;
            }
        };

        let report = ReportEncoder::new().encode(&analysis, pipeline.config());
        println!("{}", render_summary(&report));

        let results: Vec<_> = analysis.scored().cloned().collect();
        let features = FeatureMatrix::from_results(&results, &pipeline.config().flavor);
        let targets: Vec<f64> = results.iter().map(|r| r.composite_score).collect();

        let predictions: Vec<(Vec<f64>, f64)> = [0.5, 5.0]
            .into_iter()
            .zip(TWO_MODEL_BLEND)
            .filter_map(|(lambda, weight)| {
                let ridge = RidgePredictor { lambda };
                let model = ridge.fit(&features, &targets).ok()?;
                ridge.predict(&model, &features).ok().map(|p| (p, weight))
            })
            .collect();

        match blend(&predictions) {
            Ok(blended) => {
                println!("Ridge fit of composite score:");
                for (result, predicted) in results.iter().zip(&blended) {
                    println!(
                        "  {:<12} actual {:.4}  predicted {:.4}",
                        result.id, result.composite_score, predicted
                    );
                }
            }
            Err(e) => eprintln!("Ridge fit skipped: {e}"),
        }
        println!();
    }
}
