//! Decoding of YOLO-style prediction rows.
//!
//! Each row is `[x1, y1, x2, y2, confidence, class_id, ...]`. Extra trailing
//! columns are ignored. Class ids index into the model's label table; ids
//! outside the table decode as `class<N>`.

use anyhow::{anyhow, Result};

use super::result::{Detection, DetectionResult};

const ROW_LEN: usize = 6;

pub fn decode_predictions(
    rows: &[Vec<f32>],
    labels: &[String],
    min_confidence: f32,
) -> Result<DetectionResult> {
    let mut detections = Vec::with_capacity(rows.len());
    for (i, row) in rows.iter().enumerate() {
        if row.len() < ROW_LEN {
            return Err(anyhow!(
                "prediction row {} has {} columns, expected at least {}",
                i,
                row.len(),
                ROW_LEN
            ));
        }
        let confidence = row[4];
        if confidence < min_confidence {
            continue;
        }
        let class_id = row[5];
        if !class_id.is_finite() || class_id < 0.0 {
            return Err(anyhow!("prediction row {} has invalid class id {}", i, class_id));
        }
        let class_id = class_id as usize;
        let label = labels
            .get(class_id)
            .cloned()
            .unwrap_or_else(|| format!("class{}", class_id));
        detections.push(Detection {
            label,
            confidence,
            bbox: [row[0], row[1], row[2], row[3]],
        });
    }
    Ok(DetectionResult { detections })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels() -> Vec<String> {
        vec!["dog".to_string(), "poop".to_string()]
    }

    #[test]
    fn maps_class_ids_to_labels() {
        let rows = vec![
            vec![10.0, 20.0, 50.0, 80.0, 0.91, 1.0],
            vec![0.0, 0.0, 5.0, 5.0, 0.40, 0.0],
            vec![0.0, 0.0, 5.0, 5.0, 0.80, 7.0],
        ];
        let result = decode_predictions(&rows, &labels(), 0.0).unwrap();

        let names: Vec<_> = result.detections.iter().map(|d| d.label.as_str()).collect();
        assert_eq!(names, ["poop", "dog", "class7"]);
        assert_eq!(result.detections[0].bbox, [10.0, 20.0, 50.0, 80.0]);
    }

    #[test]
    fn drops_low_confidence_rows() {
        let rows = vec![
            vec![0.0, 0.0, 1.0, 1.0, 0.2, 1.0],
            vec![0.0, 0.0, 1.0, 1.0, 0.6, 1.0],
        ];
        let result = decode_predictions(&rows, &labels(), 0.5).unwrap();
        assert_eq!(result.detections.len(), 1);
        assert_eq!(result.class_counts().get("poop"), Some(&1));
    }

    #[test]
    fn rejects_short_or_negative_rows() {
        assert!(decode_predictions(&[vec![0.0; 5]], &labels(), 0.0).is_err());
        assert!(decode_predictions(&[vec![0.0, 0.0, 1.0, 1.0, 0.9, -1.0]], &labels(), 0.0).is_err());
    }
}
