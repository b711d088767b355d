//! GIMP v1.2 gradient files
//!
//! ```text
//! GIMP Gradient
//! <nrsegments>
//! left middle right  lR lG lB lA  rR rG rB rA  type color
//! ...
//! ```
//! Only linear blending in RGB (`type == 0`, `color == 0`) is accepted.

use super::ClutError;

const HEADER: &str = "GIMP Gradient";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradientSegment {
    pub left: f32,
    pub middle: f32,
    pub right: f32,
    pub left_rgba: [f32; 4],
    pub right_rgba: [f32; 4],
}

#[derive(Debug, Clone, PartialEq)]
pub struct GimpGradient {
    pub segments: Vec<GradientSegment>,
}

pub fn parse_gimp_gradient(text: &str) -> Result<GimpGradient, ClutError> {
    let mut lines = text.lines().map(str::trim).filter(|l| !l.is_empty());

    if lines.next() != Some(HEADER) {
        return Err(ClutError::Gradient("missing 'GIMP Gradient' header".to_string()));
    }
    let count: usize = lines
        .next()
        .and_then(|l| l.parse().ok())
        .ok_or_else(|| ClutError::Gradient("missing segment count".to_string()))?;
    if count == 0 {
        return Err(ClutError::Gradient("gradient has no segments".to_string()));
    }

    let mut segments = Vec::with_capacity(count);
    for index in 0..count {
        let line = lines
            .next()
            .ok_or_else(|| ClutError::Gradient(format!("segment {} missing", index)))?;
        segments.push(parse_segment(index, line)?);
    }
    Ok(GimpGradient { segments })
}

fn parse_segment(index: usize, line: &str) -> Result<GradientSegment, ClutError> {
    let values: Vec<f32> = line
        .split_whitespace()
        .map(|v| v.parse::<f32>())
        .collect::<Result<_, _>>()
        .map_err(|e| ClutError::Gradient(format!("segment {}: {}", index, e)))?;
    if values.len() != 13 {
        return Err(ClutError::Gradient(format!(
            "segment {} has {} values, expected 13",
            index,
            values.len()
        )));
    }
    if values[11] != 0.0 || values[12] != 0.0 {
        return Err(ClutError::Gradient(format!(
            "segment {} uses unsupported blending",
            index
        )));
    }

    let segment = GradientSegment {
        left: values[0],
        middle: values[1],
        right: values[2],
        left_rgba: [values[3], values[4], values[5], values[6]],
        right_rgba: [values[7], values[8], values[9], values[10]],
    };
    let in_unit = |v: f32| (0.0..=1.0).contains(&v);
    if !(segment.left < segment.middle && segment.middle < segment.right)
        || !in_unit(segment.left)
        || !in_unit(segment.right)
        || !segment.left_rgba.iter().chain(segment.right_rgba.iter()).all(|c| in_unit(*c))
    {
        return Err(ClutError::Gradient(format!(
            "segment {} has out-of-range values",
            index
        )));
    }
    Ok(segment)
}

/// Sample the gradient at `i / 256` for 256 entries. The middle point of
/// each segment carries the average of its end colors.
pub fn gradient_to_rgba(gradient: &GimpGradient) -> Result<Vec<u8>, ClutError> {
    let mut out = Vec::with_capacity(256 * 4);
    let mut next_segment = 0;
    let mut current: Option<(GradientSegment, [f32; 4])> = None;

    for i in 0..256 {
        let pos = i as f32 / 256.0;

        loop {
            match current {
                Some((segment, _)) if pos <= segment.right => break,
                _ => {
                    let segment = *gradient.segments.get(next_segment).ok_or_else(|| {
                        ClutError::Gradient(format!("no segment covers position {}", pos))
                    })?;
                    next_segment += 1;
                    let mut middle = [0.0f32; 4];
                    for (k, m) in middle.iter_mut().enumerate() {
                        *m = (segment.right_rgba[k] - segment.left_rgba[k]) / 2.0
                            + segment.left_rgba[k];
                    }
                    current = Some((segment, middle));
                }
            }
        }

        if let Some((segment, middle)) = current {
            let (left, right, left_rgba, right_rgba) = if pos < segment.middle {
                (segment.left, segment.middle, segment.left_rgba, middle)
            } else {
                (segment.middle, segment.right, middle, segment.right_rgba)
            };
            for k in 0..4 {
                let slope = (right_rgba[k] - left_rgba[k]) / (right - left);
                let value = left_rgba[k] + slope * (pos - left);
                out.push((value * 255.0) as u8);
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLACK_TO_WHITE: &str = "GIMP Gradient\n1\n\
        0.000000 0.500000 1.000000 0.0 0.0 0.0 1.0 1.0 1.0 1.0 1.0 0 0\n";

    #[test]
    fn test_parse_single_segment() {
        let gradient = parse_gimp_gradient(BLACK_TO_WHITE).expect("valid gradient");
        assert_eq!(gradient.segments.len(), 1);
        assert_eq!(gradient.segments[0].right_rgba, [1.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_linear_ramp() {
        let gradient = parse_gimp_gradient(BLACK_TO_WHITE).expect("valid gradient");
        let rgba = gradient_to_rgba(&gradient).expect("covers [0, 1)");
        assert_eq!(rgba.len(), 1024);
        assert_eq!(&rgba[0..4], &[0, 0, 0, 255]);
        // pos 128/256 = 0.5 exactly at the middle
        assert_eq!(rgba[128 * 4], 127);
        let reds: Vec<u8> = rgba.chunks_exact(4).map(|c| c[0]).collect();
        assert!(reds.windows(2).all(|w| w[0] <= w[1]));
        assert!(reds[255] >= 253);
    }

    #[test]
    fn test_bad_header() {
        assert!(parse_gimp_gradient("GIMP Palette\n1\n").is_err());
    }

    #[test]
    fn test_unsupported_blending() {
        let text = "GIMP Gradient\n1\n0 0.5 1 0 0 0 1 1 1 1 1 1 0\n";
        assert!(parse_gimp_gradient(text).is_err());
    }

    #[test]
    fn test_gap_in_coverage() {
        let text = "GIMP Gradient\n1\n0 0.25 0.5 0 0 0 1 1 1 1 1 0 0\n";
        let gradient = parse_gimp_gradient(text).expect("parses");
        assert!(gradient_to_rgba(&gradient).is_err());
    }
}
