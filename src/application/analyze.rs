use crate::application::classifier::{ClassifierThresholds, VolatilityClassifier};
use crate::application::indicators::{IndicatorEngine, IndicatorParams};
use crate::domain::entities::signal::Signal;
use crate::domain::values::indicator_set::IndicatorSet;
use crate::domain::values::price_series::PriceSeries;
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct Analysis {
    pub instrument: String,
    pub indicators: IndicatorSet,
    pub signal: Option<Signal>,
}

pub struct AnalyzeUseCase {
    engine: IndicatorEngine,
    classifier: VolatilityClassifier,
}

impl AnalyzeUseCase {
    pub fn new(params: IndicatorParams, thresholds: ClassifierThresholds) -> Self {
        Self {
            engine: IndicatorEngine::new(params),
            classifier: VolatilityClassifier::new(thresholds),
        }
    }

    pub fn classifier(&self) -> &VolatilityClassifier {
        &self.classifier
    }

    pub fn analyze(&self, series: &PriceSeries, now: DateTime<Utc>) -> Analysis {
        let indicators = self.engine.compute(series);
        let signal = self.classifier.classify(&series.instrument, &indicators, now);
        Analysis {
            instrument: series.instrument.clone(),
            indicators,
            signal,
        }
    }

    /// Classifies every series before anything acts on the results.
    pub fn analyze_batch(&self, batch: &[PriceSeries], now: DateTime<Utc>) -> Vec<Analysis> {
        batch.iter().map(|s| self.analyze(s, now)).collect()
    }
}
