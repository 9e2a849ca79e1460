use crate::error::{PipelineError, Result};
use crate::types::{write_flat, FeatureVector, NUM_FEATURES};

/// Ajusta la secuencia a exactamente `target_len` frames.
/// Corta: repite el último frame (la postura final lleva información).
/// Larga: conserva los primeros frames (el inicio del gesto).
pub fn shape_window(mut frames: Vec<FeatureVector>, target_len: usize) -> Result<Vec<FeatureVector>> {
    let last = *frames
        .last()
        .ok_or_else(|| PipelineError::InvalidInput("cannot shape an empty window".to_string()))?;

    if frames.len() < target_len {
        frames.resize(target_len, last);
    } else if frames.len() > target_len {
        frames.truncate(target_len);
    }
    Ok(frames)
}

/// Devuelve la ventana aplanada en formato [t * 15 + canal]
pub fn flatten_window(frames: &[FeatureVector]) -> Vec<f32> {
    let mut flat = vec![0.0; frames.len() * NUM_FEATURES];
    for (t, frame) in frames.iter().enumerate() {
        write_flat(frame, &mut flat, t);
    }
    flat
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(value: f32) -> FeatureVector {
        [value; NUM_FEATURES]
    }

    #[test]
    fn pads_by_repeating_last_frame() {
        let first: FeatureVector = std::array::from_fn(|i| i as f32 + 1.0);
        let second: FeatureVector = std::array::from_fn(|i| i as f32 + 2.0);
        let shaped = shape_window(vec![first, second], 30).unwrap();
        assert_eq!(shaped.len(), 30);
        assert_eq!(shaped[0], first);
        assert!(shaped[1..].iter().all(|f| *f == second));
    }

    #[test]
    fn truncates_keeping_onset() {
        let frames: Vec<_> = (0..50).map(|i| frame(i as f32)).collect();
        let shaped = shape_window(frames.clone(), 30).unwrap();
        assert_eq!(shaped.len(), 30);
        assert_eq!(shaped.as_slice(), &frames[..30]);
        assert_eq!(shaped[29], frame(29.0));
    }

    #[test]
    fn exact_length_unchanged() {
        let frames: Vec<_> = (0..30).map(|i| frame(i as f32)).collect();
        assert_eq!(shape_window(frames.clone(), 30).unwrap(), frames);
    }

    #[test]
    fn empty_window_is_invalid_input() {
        let err = shape_window(Vec::new(), 30).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidInput(_)));
    }

    #[test]
    fn flatten_is_row_major() {
        let frames = vec![frame(1.0), frame(2.0), frame(3.0)];
        let flat = flatten_window(&frames);
        assert_eq!(flat.len(), 3 * NUM_FEATURES);
        assert_eq!(flat[0], 1.0);
        assert_eq!(flat[NUM_FEATURES - 1], 1.0);
        assert_eq!(flat[NUM_FEATURES], 2.0);
        assert_eq!(flat[3 * NUM_FEATURES - 1], 3.0);
    }
}
