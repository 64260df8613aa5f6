use crate::error::{TrajError, TrajResult};

/// Geometric center, or mass-weighted center when `masses` is given.
pub fn center_of_coords(coords: &[[f64; 3]], masses: Option<&[f64]>) -> [f64; 3] {
    let mut sum = [0.0f64; 3];
    let mut weight_sum = 0.0f64;
    for (i, p) in coords.iter().enumerate() {
        let w = masses.map_or(1.0, |m| m[i]);
        sum[0] += p[0] * w;
        sum[1] += p[1] * w;
        sum[2] += p[2] * w;
        weight_sum += w;
    }
    if weight_sum == 0.0 {
        return [0.0, 0.0, 0.0];
    }
    [sum[0] / weight_sum, sum[1] / weight_sum, sum[2] / weight_sum]
}

pub fn radius_of_gyration(coords: &[[f64; 3]], masses: Option<&[f64]>) -> f64 {
    let center = center_of_coords(coords, masses);
    let mut acc = 0.0f64;
    let mut weight_sum = 0.0f64;
    for (i, p) in coords.iter().enumerate() {
        let w = masses.map_or(1.0, |m| m[i]);
        acc += w * distance_sq(*p, center);
        weight_sum += w;
    }
    if weight_sum == 0.0 {
        return 0.0;
    }
    (acc / weight_sum).sqrt()
}

pub fn distance_sq(a: [f64; 3], b: [f64; 3]) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    let dz = a[2] - b[2];
    dx * dx + dy * dy + dz * dz
}

pub fn distance(a: [f64; 3], b: [f64; 3]) -> f64 {
    distance_sq(a, b).sqrt()
}

/// Root-mean-square deviation without superposition.
pub fn rms_deviation(a: &[[f64; 3]], b: &[[f64; 3]]) -> TrajResult<f64> {
    if a.len() != b.len() {
        return Err(TrajError::Shape(format!(
            "rms deviation over {} vs {} atoms",
            a.len(),
            b.len()
        )));
    }
    if a.is_empty() {
        return Ok(0.0);
    }
    let sum: f64 = a.iter().zip(b).map(|(p, q)| distance_sq(*p, *q)).sum();
    Ok((sum / a.len() as f64).sqrt())
}
