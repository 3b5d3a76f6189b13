//! BlazeFace short-range face detector using ONNX Runtime via `ort`.
//!
//! Yields the primary face with its six keypoints (eyes, nose tip, mouth,
//! ear tragions), all normalized to the frame.

use std::path::Path;

use crate::detection::domain::detection::{BoundingBox, Detection, Keypoint};
use crate::detection::domain::face_detector::FaceDetector;
use crate::shared::frame::Frame;

/// BlazeFace model input resolution.
const INPUT_SIZE: u32 = 128;

/// Candidates overlapping the best one above this IoU are blended into it.
const BLEND_IOU_THRESH: f64 = 0.3;

/// Number of BlazeFace anchors (short-range model).
const NUM_ANCHORS: usize = 896;

const NUM_KEYPOINTS: usize = 6;

/// Box (4) plus `NUM_KEYPOINTS` (x, y) pairs per anchor.
const REGRESSOR_STRIDE: usize = 4 + NUM_KEYPOINTS * 2;

pub struct OnnxBlazefaceDetector {
    session: ort::session::Session,
    confidence: f64,
    anchors: Vec<[f32; 2]>,
}

impl OnnxBlazefaceDetector {
    pub fn new(model_path: &Path, confidence: f64) -> Result<Self, Box<dyn std::error::Error>> {
        let session = ort::session::Session::builder()?.commit_from_file(model_path)?;
        log::info!(
            "Loaded BlazeFace model from {} (min confidence {confidence})",
            model_path.display()
        );
        Ok(Self {
            session,
            confidence,
            anchors: generate_anchors(),
        })
    }
}

impl FaceDetector for OnnxBlazefaceDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Option<Detection>, Box<dyn std::error::Error>> {
        if frame.channels() < 3 {
            return Err(format!("BlazeFace needs RGB input, got {} channels", frame.channels()).into());
        }
        let input_tensor = preprocess(frame, INPUT_SIZE);

        let input_value = ort::value::Tensor::from_array(input_tensor)?;
        let outputs = self.session.run(ort::inputs![input_value])?;

        // regressors: [1, 896, 16], classificators: [1, 896, 1]
        if outputs.len() < 2 {
            return Err(
                format!("BlazeFace model expected 2 outputs, got {}", outputs.len()).into(),
            );
        }

        let regressors = outputs[0].try_extract_array::<f32>()?;
        let scores = outputs[1].try_extract_array::<f32>()?;
        let reg_data = regressors.as_slice().ok_or("Cannot get regressor slice")?;
        let score_data = scores.as_slice().ok_or("Cannot get score slice")?;

        let mut candidates =
            decode_candidates(reg_data, score_data, &self.anchors, self.confidence as f32);
        Ok(primary_detection(&mut candidates))
    }
}

/// Resize frame to `size × size` and normalize to [0,1] NCHW float32.
fn preprocess(frame: &Frame, size: u32) -> ndarray::Array4<f32> {
    let src = frame.as_ndarray();
    let src_h = frame.height() as usize;
    let src_w = frame.width() as usize;
    let s = size as usize;

    let mut tensor = ndarray::Array4::<f32>::zeros((1, 3, s, s));

    for y in 0..s {
        let src_y = (((y as f64 + 0.5) * src_h as f64 / s as f64) as usize).min(src_h - 1);
        for x in 0..s {
            let src_x = (((x as f64 + 0.5) * src_w as f64 / s as f64) as usize).min(src_w - 1);
            for c in 0..3 {
                tensor[[0, c, y, x]] = src[[src_y, src_x, c]] as f32 / 255.0;
            }
        }
    }

    tensor
}

/// Generate BlazeFace anchors for the short-range model.
///
/// Two feature maps, 16×16 and 8×8, with 2 and 6 anchors per cell.
fn generate_anchors() -> Vec<[f32; 2]> {
    let strides = [(8, 2), (16, 6)]; // (stride, anchors_per_cell)
    let mut anchors = Vec::with_capacity(NUM_ANCHORS);

    for &(stride, num) in &strides {
        let grid_size = INPUT_SIZE as usize / stride;
        for y in 0..grid_size {
            for x in 0..grid_size {
                let cx = (x as f32 + 0.5) / grid_size as f32;
                let cy = (y as f32 + 0.5) / grid_size as f32;
                for _ in 0..num {
                    anchors.push([cx, cy]);
                }
            }
        }
    }

    anchors
}

/// A decoded anchor above the confidence threshold, normalized coordinates.
#[derive(Clone, Debug, PartialEq)]
struct Candidate {
    cx: f64,
    cy: f64,
    w: f64,
    h: f64,
    keypoints: [[f64; 2]; NUM_KEYPOINTS],
    score: f64,
}

impl Candidate {
    fn corners(&self) -> (f64, f64, f64, f64) {
        (
            self.cx - self.w / 2.0,
            self.cy - self.h / 2.0,
            self.cx + self.w / 2.0,
            self.cy + self.h / 2.0,
        )
    }
}

fn decode_candidates(
    reg_data: &[f32],
    score_data: &[f32],
    anchors: &[[f32; 2]],
    confidence: f32,
) -> Vec<Candidate> {
    let scale = INPUT_SIZE as f32;
    let mut candidates = Vec::new();

    for (i, &raw_score) in score_data.iter().enumerate().take(anchors.len()) {
        let score = sigmoid(raw_score);
        if score < confidence {
            continue;
        }

        let offset = i * REGRESSOR_STRIDE;
        let Some(reg) = reg_data.get(offset..offset + REGRESSOR_STRIDE) else {
            break;
        };
        let [ax, ay] = anchors[i];

        let mut keypoints = [[0.0; 2]; NUM_KEYPOINTS];
        for (k, kp) in keypoints.iter_mut().enumerate() {
            kp[0] = (ax + reg[4 + k * 2] / scale) as f64;
            kp[1] = (ay + reg[5 + k * 2] / scale) as f64;
        }

        candidates.push(Candidate {
            cx: (ax + reg[0] / scale) as f64,
            cy: (ay + reg[1] / scale) as f64,
            w: (reg[2] / scale) as f64,
            h: (reg[3] / scale) as f64,
            keypoints,
            score: score as f64,
        });
    }

    candidates
}

/// Best-scoring face, with overlapping candidates blended in by score.
///
/// BlazeFace fires on several neighbouring anchors for one face; a weighted
/// average of that cluster is steadier frame-to-frame than the single top
/// anchor.
fn primary_detection(candidates: &mut [Candidate]) -> Option<Detection> {
    candidates.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let (best, rest) = candidates.split_first()?;

    // A degenerate best box has zero IoU with itself; it still anchors the blend.
    let cluster: Vec<&Candidate> = std::iter::once(best)
        .chain(rest.iter().filter(|c| iou(best, c) > BLEND_IOU_THRESH))
        .collect();
    let total: f64 = cluster.iter().map(|c| c.score).sum();

    let weighted = |f: &dyn Fn(&Candidate) -> f64| -> f64 {
        cluster.iter().map(|c| f(*c) * c.score).sum::<f64>() / total
    };

    let bounding_box = BoundingBox {
        x_center: weighted(&|c| c.cx),
        y_center: weighted(&|c| c.cy),
        width: weighted(&|c| c.w),
        height: weighted(&|c| c.h),
    };
    let keypoints = (0..NUM_KEYPOINTS)
        .map(|k| Keypoint::new(weighted(&|c| c.keypoints[k][0]), weighted(&|c| c.keypoints[k][1])))
        .collect();

    Some(Detection::new(bounding_box, keypoints, best.score))
}

fn iou(a: &Candidate, b: &Candidate) -> f64 {
    let (ax1, ay1, ax2, ay2) = a.corners();
    let (bx1, by1, bx2, by2) = b.corners();

    let inter = (ax2.min(bx2) - ax1.max(bx1)).max(0.0) * (ay2.min(by2) - ay1.max(by1)).max(0.0);
    if inter == 0.0 {
        return 0.0;
    }
    inter / (a.w * a.h + b.w * b.h - inter)
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn candidate(cx: f64, cy: f64, size: f64, score: f64) -> Candidate {
        Candidate {
            cx,
            cy,
            w: size,
            h: size,
            keypoints: [[cx, cy]; NUM_KEYPOINTS],
            score,
        }
    }

    #[test]
    fn test_preprocess_shape() {
        let frame = Frame::new(vec![128u8; 200 * 100 * 3], 200, 100, 3, 0);
        let tensor = preprocess(&frame, 128);
        assert_eq!(tensor.shape(), &[1, 3, 128, 128]);
    }

    #[test]
    fn test_preprocess_normalized() {
        let frame = Frame::new(vec![255u8; 50 * 50 * 3], 50, 50, 3, 0);
        let tensor = preprocess(&frame, 128);
        assert!((tensor[[0, 0, 0, 0]] - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_generate_anchors_count() {
        // 16×16 × 2 + 8×8 × 6 = 512 + 384
        assert_eq!(generate_anchors().len(), NUM_ANCHORS);
    }

    #[test]
    fn test_anchors_in_unit_range() {
        for a in generate_anchors() {
            assert!(a[0] > 0.0 && a[0] < 1.0);
            assert!(a[1] > 0.0 && a[1] < 1.0);
        }
    }

    #[test]
    fn test_sigmoid() {
        assert!((sigmoid(0.0) - 0.5).abs() < 1e-6);
        assert!((sigmoid(10.0) - 1.0).abs() < 0.001);
        assert!(sigmoid(-10.0) < 0.001);
    }

    #[test]
    fn test_decode_applies_anchor_offsets_to_box_and_keypoints() {
        let anchors = vec![[0.25f32, 0.5f32], [0.75, 0.5]];
        let mut reg = vec![0.0f32; 2 * REGRESSOR_STRIDE];
        // anchor 0: box shifted by +16px in x, 64px square
        reg[0] = 16.0;
        reg[2] = 64.0;
        reg[3] = 64.0;
        // left eye 32px left and 32px up of the anchor
        reg[4] = -32.0;
        reg[5] = -32.0;
        let scores = vec![5.0f32, -5.0];

        let candidates = decode_candidates(&reg, &scores, &anchors, 0.7);
        assert_eq!(candidates.len(), 1);
        let c = &candidates[0];
        assert_relative_eq!(c.cx, 0.375, epsilon = 1e-6);
        assert_relative_eq!(c.cy, 0.5, epsilon = 1e-6);
        assert_relative_eq!(c.w, 0.5, epsilon = 1e-6);
        assert_relative_eq!(c.keypoints[0][0], 0.0, epsilon = 1e-6);
        assert_relative_eq!(c.keypoints[0][1], 0.25, epsilon = 1e-6);
        assert_relative_eq!(c.keypoints[2][0], 0.25, epsilon = 1e-6);
    }

    #[test]
    fn test_decode_stops_at_truncated_regressors() {
        let anchors = vec![[0.5f32, 0.5f32]; 2];
        let reg = vec![0.0f32; REGRESSOR_STRIDE + 3];
        let candidates = decode_candidates(&reg, &[5.0, 5.0], &anchors, 0.5);
        assert_eq!(candidates.len(), 1);
    }

    #[test]
    fn test_no_candidates_yields_none() {
        assert!(primary_detection(&mut []).is_none());
    }

    #[test]
    fn test_primary_blends_overlapping_cluster_by_score() {
        let mut candidates = vec![
            candidate(0.50, 0.5, 0.4, 0.9),
            candidate(0.54, 0.5, 0.4, 0.3),
            // far away: excluded from the blend
            candidate(0.10, 0.1, 0.1, 0.8),
        ];
        let detection = primary_detection(&mut candidates).unwrap();

        // (0.50·0.9 + 0.54·0.3) / 1.2 = 0.51
        assert_relative_eq!(detection.bounding_box.x_center, 0.51, epsilon = 1e-9);
        assert_relative_eq!(detection.bounding_box.y_center, 0.5, epsilon = 1e-9);
        assert_relative_eq!(detection.score, 0.9);
        assert_eq!(detection.keypoints.len(), NUM_KEYPOINTS);
        assert!(detection.is_well_formed());
    }

    #[test]
    fn test_primary_picks_highest_score_among_separate_faces() {
        let mut candidates = vec![
            candidate(0.2, 0.2, 0.1, 0.75),
            candidate(0.8, 0.8, 0.1, 0.95),
        ];
        let detection = primary_detection(&mut candidates).unwrap();
        assert_relative_eq!(detection.bounding_box.x_center, 0.8, epsilon = 1e-9);
    }

    #[test]
    fn test_zero_area_best_candidate_blends_to_its_own_position() {
        let mut candidates = vec![
            candidate(0.4, 0.6, 0.0, 0.9),
            candidate(0.8, 0.8, 0.1, 0.5),
        ];
        let detection = primary_detection(&mut candidates).unwrap();

        assert_relative_eq!(detection.bounding_box.x_center, 0.4, epsilon = 1e-12);
        assert_relative_eq!(detection.bounding_box.y_center, 0.6, epsilon = 1e-12);
        assert_eq!(detection.bounding_box.width, 0.0);
        assert!(detection
            .keypoints
            .iter()
            .all(|k| k.x.is_finite() && k.y.is_finite()));
    }

    #[test]
    fn test_iou_of_disjoint_boxes_is_zero() {
        let a = candidate(0.2, 0.2, 0.1, 1.0);
        let b = candidate(0.8, 0.8, 0.1, 1.0);
        assert_eq!(iou(&a, &b), 0.0);
        assert_relative_eq!(iou(&a, &a), 1.0, epsilon = 1e-12);
    }
}
