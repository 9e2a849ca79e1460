use serde::Serialize;

use crate::classifier::ClassifierError;
use crate::config::MLConfig;
use crate::types::UNCERTAIN_LABEL;

/// Umbrales de aceptación: ambos deben cumplirse a la vez
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecisionThresholds {
    /// Probabilidad mínima de la clase ganadora
    pub confidence: f32,
    /// Ventaja mínima sobre la segunda clase
    pub margin: f32,
}

impl From<&MLConfig> for DecisionThresholds {
    fn from(config: &MLConfig) -> Self {
        Self {
            confidence: config.confidence_threshold,
            margin: config.margin_threshold,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabelProbability {
    pub label: String,
    pub probability: f32,
}

/// Resultado final de una ventana
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationResult {
    /// Palabra predicha, o "UNCERTAIN" si no pasa los umbrales
    pub label: String,
    pub confidence: f32,
    pub margin: f32,
    pub accepted: bool,
    /// Probabilidades en el orden del vocabulario
    pub probabilities: Vec<LabelProbability>,
}

/// Convierte las probabilidades del modelo en una decisión aceptar/rechazar
pub fn decide(
    probabilities: &[f32],
    labels: &[String],
    thresholds: DecisionThresholds,
) -> Result<ClassificationResult, ClassifierError> {
    if probabilities.is_empty() || probabilities.len() != labels.len() {
        return Err(ClassifierError::OutputLength {
            expected: labels.len(),
            actual: probabilities.len(),
        });
    }

    // Orden estable: en empate gana la primera etiqueta y el margen queda en 0
    let mut ranked: Vec<usize> = (0..probabilities.len()).collect();
    ranked.sort_by(|&a, &b| probabilities[b].total_cmp(&probabilities[a]));

    let top_idx = ranked[0];
    let top = probabilities[top_idx];
    let runner_up = ranked.get(1).map(|&idx| probabilities[idx]).unwrap_or(0.0);
    let margin = top - runner_up;

    // Un empate nunca se acepta, aunque el umbral de margen sea 0
    let tied = ranked.len() > 1 && runner_up >= top;
    let accepted = !tied && top >= thresholds.confidence && margin >= thresholds.margin;
    let label = if accepted {
        labels[top_idx].clone()
    } else {
        UNCERTAIN_LABEL.to_string()
    };

    let probabilities = labels
        .iter()
        .zip(probabilities)
        .map(|(label, &probability)| LabelProbability {
            label: label.clone(),
            probability,
        })
        .collect();

    Ok(ClassificationResult {
        label,
        confidence: top,
        margin,
        accepted,
        probabilities,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::test_labels;

    const THRESHOLDS: DecisionThresholds = DecisionThresholds {
        confidence: 0.6,
        margin: 0.1,
    };

    #[test]
    fn confident_prediction_is_accepted() {
        let probs = [0.02, 0.85, 0.03, 0.02, 0.03, 0.02, 0.03];
        let result = decide(&probs, &test_labels(), THRESHOLDS).unwrap();
        assert_eq!(result.label, "hello");
        assert!(result.accepted);
        assert!((result.confidence - 0.85).abs() < 1e-6);
        assert!((result.margin - 0.82).abs() < 1e-5);
        assert_eq!(result.probabilities.len(), 7);
        assert_eq!(result.probabilities[1].label, "hello");
    }

    #[test]
    fn near_uniform_is_uncertain() {
        let probs = [0.15, 0.16, 0.14, 0.15, 0.13, 0.14, 0.13];
        let result = decide(&probs, &test_labels(), THRESHOLDS).unwrap();
        assert_eq!(result.label, UNCERTAIN_LABEL);
        assert!(!result.accepted);
        assert!((result.confidence - 0.16).abs() < 1e-6);
        assert!((result.margin - 0.01).abs() < 1e-5);
    }

    #[test]
    fn high_score_with_tiny_margin_is_rejected() {
        let labels = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let result = decide(&[0.48, 0.5, 0.02], &labels, DecisionThresholds { confidence: 0.45, margin: 0.1 }).unwrap();
        assert!(!result.accepted);
        assert_eq!(result.label, UNCERTAIN_LABEL);
    }

    #[test]
    fn large_margin_with_low_confidence_is_rejected() {
        let labels = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let result = decide(&[0.55, 0.05, 0.4], &labels, DecisionThresholds { confidence: 0.9, margin: 0.1 }).unwrap();
        assert!(!result.accepted);
        assert_eq!(result.label, UNCERTAIN_LABEL);
    }

    #[test]
    fn tie_has_zero_margin() {
        let labels = vec!["a".to_string(), "b".to_string()];
        let result = decide(&[0.5, 0.5], &labels, DecisionThresholds { confidence: 0.1, margin: 0.01 }).unwrap();
        assert_eq!(result.margin, 0.0);
        assert!(!result.accepted);
    }

    #[test]
    fn tie_is_rejected_even_with_zero_margin_threshold() {
        let labels = vec!["a".to_string(), "b".to_string()];
        let thresholds = DecisionThresholds { confidence: 0.4, margin: 0.0 };
        let result = decide(&[0.5, 0.5], &labels, thresholds).unwrap();
        assert!(!result.accepted);
        assert_eq!(result.label, UNCERTAIN_LABEL);

        let result = decide(&[0.51, 0.49], &labels, thresholds).unwrap();
        assert!(result.accepted);
        assert_eq!(result.label, "a");
    }

    #[test]
    fn single_label_uses_zero_runner_up() {
        let labels = vec!["hello".to_string()];
        let result = decide(&[0.9], &labels, THRESHOLDS).unwrap();
        assert!((result.margin - 0.9).abs() < 1e-6);
        assert!(result.accepted);
    }

    #[test]
    fn accept_iff_both_thresholds() {
        let labels = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        // (probabilidades, aceptada, margen esperado)
        let cases: [([f32; 3], bool, f32); 6] = [
            ([0.7, 0.2, 0.1], true, 0.5),
            ([0.6, 0.35, 0.05], true, 0.25),
            ([0.1, 0.25, 0.65], true, 0.4),
            ([0.62, 0.55, 0.0], false, 0.07),
            ([0.4, 0.3, 0.3], false, 0.1),
            ([0.34, 0.33, 0.33], false, 0.01),
        ];
        for (probs, accepted, margin) in cases {
            let result = decide(&probs, &labels, THRESHOLDS).unwrap();
            assert_eq!(result.accepted, accepted, "probs={:?}", probs);
            assert!((result.margin - margin).abs() < 1e-5, "probs={:?} margin={}", probs, result.margin);
            assert_eq!(result.accepted, result.label != UNCERTAIN_LABEL);
        }
    }

    #[test]
    fn wrong_length_output_is_classifier_error() {
        let err = decide(&[0.5, 0.5], &test_labels(), THRESHOLDS).unwrap_err();
        assert!(matches!(err, ClassifierError::OutputLength { expected: 7, actual: 2 }));
        assert!(decide(&[], &test_labels(), THRESHOLDS).is_err());
    }
}
