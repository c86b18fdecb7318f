use serde::{
    Deserialize,
    Serialize,
};

use crate::peaks::Spectrum;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArrayKind {
    Cosine,
    Pearson,
    Lp,
    Dot,
}

/// Compares two spectra channel by channel, channels being masses binned
/// to `mass_bin_width`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArraySimilarity {
    pub kind: ArrayKind,
    pub mass_bin_width: f64,
    pub lp_exponent: f64,
}

impl ArraySimilarity {
    pub fn new(
        kind: ArrayKind,
        mass_bin_width: f64,
    ) -> Self {
        ArraySimilarity {
            kind,
            mass_bin_width,
            lp_exponent: 2.,
        }
    }

    /// NaN when either spectrum is empty or the measure is undefined
    /// (zero norm, zero variance).
    pub fn score(
        &self,
        a: &Spectrum,
        b: &Spectrum,
    ) -> f64 {
        if a.is_empty() || b.is_empty() {
            return f64::NAN;
        }
        let a = bin_spectrum(a, self.mass_bin_width);
        let b = bin_spectrum(b, self.mass_bin_width);

        match self.kind {
            ArrayKind::Cosine => cosine(&a, &b),
            ArrayKind::Pearson => pearson(&a, &b),
            ArrayKind::Lp => 1. / (1. + lp_distance(&a, &b, self.lp_exponent)),
            ArrayKind::Dot => dot(&a, &b),
        }
    }
}

/// Sums intensities into integer mass channels. Input masses are sorted,
/// so the output channels are sorted as well.
pub fn bin_spectrum(
    spectrum: &Spectrum,
    mass_bin_width: f64,
) -> Vec<(i64, f64)> {
    let mut out: Vec<(i64, f64)> = Vec::with_capacity(spectrum.len());
    for (mass, intensity) in spectrum.iter() {
        let channel = (mass / mass_bin_width).round() as i64;
        match out.last_mut() {
            Some((last, acc)) if *last == channel => *acc += intensity,
            _ => out.push((channel, intensity)),
        }
    }
    out
}

/// Walks the union of channels of two binned spectra, calling `f` with the
/// intensity on each side (0 where a channel is missing).
fn merge_channels(
    a: &[(i64, f64)],
    b: &[(i64, f64)],
    mut f: impl FnMut(f64, f64),
) {
    let (mut i, mut j) = (0, 0);
    while i < a.len() || j < b.len() {
        match (a.get(i), b.get(j)) {
            (Some(x), Some(y)) if x.0 == y.0 => {
                f(x.1, y.1);
                i += 1;
                j += 1;
            },
            (Some(x), Some(y)) if x.0 < y.0 => {
                f(x.1, 0.);
                i += 1;
            },
            (Some(_), Some(y)) => {
                f(0., y.1);
                j += 1;
            },
            (Some(x), None) => {
                f(x.1, 0.);
                i += 1;
            },
            (None, Some(y)) => {
                f(0., y.1);
                j += 1;
            },
            (None, None) => break,
        }
    }
}

fn dot(
    a: &[(i64, f64)],
    b: &[(i64, f64)],
) -> f64 {
    let mut out = 0.;
    merge_channels(a, b, |x, y| out += x * y);
    out
}

fn cosine(
    a: &[(i64, f64)],
    b: &[(i64, f64)],
) -> f64 {
    let mut dot = 0.;
    let mut mag_a = 0.;
    let mut mag_b = 0.;
    merge_channels(a, b, |x, y| {
        dot += x * y;
        mag_a += x * x;
        mag_b += y * y;
    });
    if mag_a == 0. || mag_b == 0. {
        return f64::NAN;
    }
    dot / (mag_a.sqrt() * mag_b.sqrt())
}

fn pearson(
    a: &[(i64, f64)],
    b: &[(i64, f64)],
) -> f64 {
    let mut pairs = Vec::new();
    merge_channels(a, b, |x, y| pairs.push((x, y)));
    if pairs.len() < 2 {
        return f64::NAN;
    }

    let n = pairs.len() as f64;
    let mean_a = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_b = pairs.iter().map(|p| p.1).sum::<f64>() / n;
    let mut cov = 0.;
    let mut var_a = 0.;
    let mut var_b = 0.;
    for (x, y) in pairs {
        cov += (x - mean_a) * (y - mean_b);
        var_a += (x - mean_a) * (x - mean_a);
        var_b += (y - mean_b) * (y - mean_b);
    }
    if var_a == 0. || var_b == 0. {
        return f64::NAN;
    }
    (cov / (var_a.sqrt() * var_b.sqrt())).clamp(-1., 1.)
}

fn lp_distance(
    a: &[(i64, f64)],
    b: &[(i64, f64)],
    p: f64,
) -> f64 {
    let mut acc = 0.;
    merge_channels(a, b, |x, y| acc += (x - y).abs().powf(p));
    acc.powf(1. / p)
}
