// Prediction scoring
//
// Pure and deterministic: no clock, no I/O, no shared state. Safe to call from
// any number of threads at once.

use fanpredict_models::{
    Event, EventResult, EventType, PointsConfig, Prediction, PredictionData, ScoringError,
    ScoringResult,
};
use serde::{Deserialize, Serialize};

/// Accuracy at or above which an accuracy-based numeric answer counts as correct.
pub const NEAR_PERFECT_ACCURACY: f64 = 95.0;
/// Band scoring tolerance, as a fraction of the actual value.
pub const BAND_TOLERANCE: f64 = 0.10;
/// Accuracy reported for an answer inside the band.
pub const BAND_ACCURACY: f64 = 90.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreOutcome {
    pub points: i64,
    pub correct: bool,
    /// 0..=100
    pub accuracy: f64,
}

struct Scored {
    points: i64,
    correct: bool,
    accuracy: f64,
    penalized: bool,
}

impl Scored {
    fn exact(config: &PointsConfig) -> Self {
        Self {
            points: config.base_points + config.bonus(),
            correct: true,
            accuracy: 100.0,
            penalized: false,
        }
    }

    fn miss(config: &PointsConfig) -> Self {
        match config.penalty() {
            Some(penalty) => Self {
                points: -penalty,
                correct: false,
                accuracy: 0.0,
                penalized: true,
            },
            None => Self {
                points: 0,
                correct: false,
                accuracy: 0.0,
                penalized: false,
            },
        }
    }

    /// Negative points only ever come from the configured penalty branch.
    fn finish(self) -> ScoreOutcome {
        let points = if self.penalized {
            self.points
        } else {
            self.points.max(0)
        };
        ScoreOutcome {
            points,
            correct: self.correct,
            accuracy: self.accuracy,
        }
    }
}

/// Score one prediction against a verified result.
///
/// Callers must only pass results the lifecycle has verified; an unverified
/// result is refused rather than scored.
pub fn score(
    event: &Event,
    prediction: &Prediction,
    result: &EventResult,
) -> ScoringResult<ScoreOutcome> {
    if !result.verified {
        return Err(ScoringError::ResultNotVerified {
            event_id: event.id.clone(),
        });
    }
    let config = &event.points_config;
    config.validate()?;

    let scored = match &event.event_type {
        EventType::ChoiceSelection => score_choice(event, prediction, result)?,
        EventType::NumericPrediction => score_numeric(event, prediction, result)?,
        EventType::DraftSelection => score_draft(event, prediction)?,
        EventType::Unsupported(other) => {
            return Err(ScoringError::UnsupportedEventType {
                event_type: other.clone(),
            })
        }
    };

    Ok(scored.finish())
}

/// Score against whatever verified result the event currently carries.
pub fn score_prediction(event: &Event, prediction: &Prediction) -> ScoringResult<ScoreOutcome> {
    let result = event
        .verified_result()
        .ok_or_else(|| ScoringError::ResultNotVerified {
            event_id: event.id.clone(),
        })?;
    score(event, prediction, result)
}

/// Score independent (event, prediction) pairs. One failure never affects
/// another item.
pub fn score_batch(pairs: &[(&Event, &Prediction)]) -> Vec<ScoringResult<ScoreOutcome>> {
    pairs
        .iter()
        .map(|(event, prediction)| score_prediction(event, prediction))
        .collect()
}

fn wrong_shape(event: &Event, prediction: &Prediction) -> ScoringError {
    ScoringError::InvalidPredictionFormat {
        event_id: event.id.clone(),
        reason: format!(
            "expected a {} answer, got {}",
            event.event_type,
            prediction.prediction_data.kind()
        ),
    }
}

fn score_choice(
    event: &Event,
    prediction: &Prediction,
    result: &EventResult,
) -> ScoringResult<Scored> {
    let PredictionData::ChoiceSelection { selected_choice } = &prediction.prediction_data else {
        return Err(wrong_shape(event, prediction));
    };

    if *selected_choice == result.outcome.as_text() {
        Ok(Scored::exact(&event.points_config))
    } else {
        Ok(Scored::miss(&event.points_config))
    }
}

fn score_numeric(
    event: &Event,
    prediction: &Prediction,
    result: &EventResult,
) -> ScoringResult<Scored> {
    let PredictionData::NumericPrediction { predicted_value } = &prediction.prediction_data else {
        return Err(wrong_shape(event, prediction));
    };
    let predicted = predicted_value
        .as_f64()
        .ok_or_else(|| ScoringError::InvalidPredictionFormat {
            event_id: event.id.clone(),
            reason: "predicted value is not a number".to_string(),
        })?;
    let actual = result
        .outcome
        .as_f64()
        .ok_or_else(|| ScoringError::InvalidResultFormat {
            event_id: event.id.clone(),
            reason: format!("outcome {:?} is not a number", result.outcome.as_text()),
        })?;

    let config = &event.points_config;
    if predicted == actual {
        return Ok(Scored::exact(config));
    }

    let diff = (predicted - actual).abs();

    if config.accuracy_based {
        let accuracy = accuracy_percent(predicted, actual);
        let mut points = (config.base_points as f64 * accuracy / 100.0).round() as i64;
        let correct = accuracy >= NEAR_PERFECT_ACCURACY;
        if correct {
            points = points.saturating_add(config.bonus());
        }
        return Ok(Scored {
            points,
            correct,
            accuracy,
            penalized: false,
        });
    }

    if diff <= actual * BAND_TOLERANCE {
        Ok(Scored {
            points: (config.base_points as f64 * 0.5).round() as i64,
            correct: true,
            accuracy: BAND_ACCURACY,
            penalized: false,
        })
    } else {
        Ok(Scored::miss(config))
    }
}

/// Distance relative to half the larger value, floored at zero.
fn accuracy_percent(predicted: f64, actual: f64) -> f64 {
    let diff = (predicted - actual).abs();
    let max_diff = predicted.max(actual) * 0.5;
    if max_diff <= 0.0 {
        return 0.0;
    }
    (100.0 - diff / max_diff * 100.0).max(0.0)
}

/// Full points whenever a result exists. Per-role correctness and captain
/// multipliers are not scored yet; `DraftTeam` already carries the picks and
/// captain they would need.
fn score_draft(event: &Event, prediction: &Prediction) -> ScoringResult<Scored> {
    if !matches!(prediction.prediction_data, PredictionData::DraftSelection(_)) {
        return Err(wrong_shape(event, prediction));
    }
    Ok(Scored {
        points: event.points_config.base_points,
        correct: true,
        accuracy: 100.0,
        penalized: false,
    })
}
