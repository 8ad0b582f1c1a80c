//! Linear gap filling between frames whose sequence indices are not adjacent

use crate::capture::Frame;
use crate::error::{Result, VigilError};

/// Expand `frames` (sorted by index) into an evenly spaced run, synthesizing
/// each missing index by blending its neighbours.
///
/// Stops once `limit` frames have been produced, so a huge index jump cannot
/// allocate past what the caller keeps anyway. Returns the frames and how
/// many of them were synthesized.
pub fn fill_gaps(frames: &[(i64, Frame)], limit: usize) -> Result<(Vec<Frame>, usize)> {
    let Some((_, first)) = frames.first() else {
        return Ok((Vec::new(), 0));
    };
    if let Some((idx, odd)) = frames.iter().find(|(_, f)| !f.same_geometry(first)) {
        return Err(VigilError::MalformedInput(format!(
            "frame {idx} is {}x{}x{}, sequence started with {}x{}x{}",
            odd.width(),
            odd.height(),
            odd.channels(),
            first.width(),
            first.height(),
            first.channels()
        )));
    }

    let mut out = Vec::with_capacity(frames.len().min(limit));
    let mut synthesized = 0;
    for (pos, (idx_a, frame_a)) in frames.iter().enumerate() {
        if out.len() >= limit {
            break;
        }
        out.push(frame_a.clone());

        let Some((idx_b, frame_b)) = frames.get(pos + 1) else {
            break;
        };
        let span = idx_b.saturating_sub(*idx_a);
        for missing in 1..span {
            if out.len() >= limit {
                break;
            }
            let alpha = missing as f64 / span as f64;
            out.push(blend(frame_a, frame_b, alpha));
            synthesized += 1;
        }
    }
    Ok((out, synthesized))
}

/// Per-channel `(1 - alpha) * a + alpha * b`, rounded back to 8 bits.
pub fn blend(a: &Frame, b: &Frame, alpha: f64) -> Frame {
    let data: Vec<u8> = a
        .data
        .iter()
        .zip(b.data.iter())
        .map(|(&pa, &pb)| {
            let v = (1.0 - alpha) * f64::from(pa) + alpha * f64::from(pb);
            v.round().clamp(0.0, 255.0) as u8
        })
        .collect();
    Frame {
        data: data.into(),
        meta: a.meta,
    }
}
