//! Keyframe evaluation and easing curves.
//!
//! A keyframe list is evaluated by locating the segment `[kf0, kf1]` that
//! contains `t`, normalizing `t` over that segment, shaping it with the easing
//! of `kf1` and blending the two values component-wise.

use std::f64::consts::PI;

/// Every easing name accepted by the `easing` parameter of keyframe nodes.
pub const EASING_NAMES: &[&str] = &[
    "linear",
    "quadratic_in",
    "quadratic_out",
    "quadratic_in_out",
    "quadratic_out_in",
    "cubic_in",
    "cubic_out",
    "cubic_in_out",
    "cubic_out_in",
    "quartic_in",
    "quartic_out",
    "quartic_in_out",
    "quartic_out_in",
    "quintic_in",
    "quintic_out",
    "quintic_in_out",
    "quintic_out_in",
    "sinus_in",
    "sinus_out",
    "sinus_in_out",
    "sinus_out_in",
    "exp_in",
    "exp_out",
    "exp_in_out",
    "exp_out_in",
    "circular_in",
    "circular_out",
    "circular_in_out",
    "circular_out_in",
    "back_in",
    "back_out",
    "back_in_out",
    "back_out_in",
    "elastic_in",
    "elastic_out",
    "elastic_in_out",
    "elastic_out_in",
    "bounce_in",
    "bounce_out",
    "bounce_in_out",
    "bounce_out_in",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EasingFamily {
    Linear,
    Quadratic,
    Cubic,
    Quartic,
    Quintic,
    Sinus,
    Exp,
    Circular,
    Back,
    Elastic,
    Bounce,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EasingMode {
    In,
    Out,
    InOut,
    OutIn,
}

/// An easing curve mapping normalized time `[0, 1]` to a blend factor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Easing {
    pub family: EasingFamily,
    pub mode: EasingMode,
}

impl Default for Easing {
    fn default() -> Self {
        Self::LINEAR
    }
}

impl Easing {
    pub const LINEAR: Easing = Easing {
        family: EasingFamily::Linear,
        mode: EasingMode::In,
    };

    pub fn from_name(name: &str) -> Option<Self> {
        if name == "linear" {
            return Some(Self::LINEAR);
        }
        let (family, mode) = name.split_once('_')?;
        let family = match family {
            "quadratic" => EasingFamily::Quadratic,
            "cubic" => EasingFamily::Cubic,
            "quartic" => EasingFamily::Quartic,
            "quintic" => EasingFamily::Quintic,
            "sinus" => EasingFamily::Sinus,
            "exp" => EasingFamily::Exp,
            "circular" => EasingFamily::Circular,
            "back" => EasingFamily::Back,
            "elastic" => EasingFamily::Elastic,
            "bounce" => EasingFamily::Bounce,
            _ => return None,
        };
        let mode = match mode {
            "in" => EasingMode::In,
            "out" => EasingMode::Out,
            "in_out" => EasingMode::InOut,
            "out_in" => EasingMode::OutIn,
            _ => return None,
        };
        Some(Self { family, mode })
    }

    pub fn apply(&self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        if self.family == EasingFamily::Linear {
            return t;
        }
        let ease_in = |t: f64| self.ease_in(t);
        let ease_out = |t: f64| 1.0 - self.ease_in(1.0 - t);
        match self.mode {
            EasingMode::In => ease_in(t),
            EasingMode::Out => ease_out(t),
            EasingMode::InOut => {
                if t < 0.5 {
                    ease_in(2.0 * t) / 2.0
                } else {
                    (1.0 + ease_out(2.0 * t - 1.0)) / 2.0
                }
            }
            EasingMode::OutIn => {
                if t < 0.5 {
                    ease_out(2.0 * t) / 2.0
                } else {
                    (1.0 + ease_in(2.0 * t - 1.0)) / 2.0
                }
            }
        }
    }

    fn ease_in(&self, t: f64) -> f64 {
        match self.family {
            EasingFamily::Linear => t,
            EasingFamily::Quadratic => t * t,
            EasingFamily::Cubic => t * t * t,
            EasingFamily::Quartic => t * t * t * t,
            EasingFamily::Quintic => t * t * t * t * t,
            EasingFamily::Sinus => 1.0 - (t * PI / 2.0).cos(),
            EasingFamily::Exp => {
                if t == 0.0 {
                    0.0
                } else {
                    2.0_f64.powf(10.0 * t - 10.0)
                }
            }
            EasingFamily::Circular => 1.0 - (1.0 - t * t).sqrt(),
            EasingFamily::Back => {
                let c1 = 1.70158;
                let c3 = c1 + 1.0;
                c3 * t * t * t - c1 * t * t
            }
            EasingFamily::Elastic => {
                let c4 = (2.0 * PI) / 3.0;
                if t == 0.0 {
                    0.0
                } else if t == 1.0 {
                    1.0
                } else {
                    -(2.0_f64.powf(10.0 * t - 10.0)) * ((t * 10.0 - 10.75) * c4).sin()
                }
            }
            EasingFamily::Bounce => 1.0 - bounce_out(1.0 - t),
        }
    }
}

fn bounce_out(t: f64) -> f64 {
    let n1 = 7.5625;
    let d1 = 2.75;

    if t < 1.0 / d1 {
        n1 * t * t
    } else if t < 2.0 / d1 {
        let t = t - 1.5 / d1;
        n1 * t * t + 0.75
    } else if t < 2.5 / d1 {
        let t = t - 2.25 / d1;
        n1 * t * t + 0.9375
    } else {
        let t = t - 2.625 / d1;
        n1 * t * t + 0.984375
    }
}

/// A resolved keyframe. Scalars use the first component only.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct KeyFrame {
    pub time: f64,
    pub value: [f64; 4],
    pub easing: Easing,
}

/// Keyframe times must never go backwards.
pub fn check_times(kfs: &[KeyFrame]) -> Result<(), String> {
    for pair in kfs.windows(2) {
        if pair[1].time < pair[0].time {
            return Err(format!(
                "key frame time {} is before the previous one ({})",
                pair[1].time, pair[0].time
            ));
        }
    }
    Ok(())
}

/// Evaluates `kfs` at `t`.
///
/// `cursor` remembers the segment used by the previous evaluation so a
/// forward-moving clock does not rescan the whole list.
pub fn evaluate(kfs: &[KeyFrame], cursor: &mut usize, t: f64) -> [f64; 4] {
    let (first, last) = match (kfs.first(), kfs.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => return [0.0; 4],
    };
    if t <= first.time {
        *cursor = 0;
        return first.value;
    }
    if t >= last.time {
        *cursor = kfs.len() - 1;
        return last.value;
    }

    let mut i = *cursor;
    if i >= kfs.len() - 1 || kfs[i].time > t {
        i = 0;
    }
    // kfs[len - 1].time > t, so this stops before the end
    while kfs[i + 1].time <= t {
        i += 1;
    }
    *cursor = i;

    let kf0 = &kfs[i];
    let kf1 = &kfs[i + 1];
    let tnorm = (t - kf0.time) / (kf1.time - kf0.time);
    let ratio = kf1.easing.apply(tnorm);
    let mut value = [0.0; 4];
    for (k, v) in value.iter_mut().enumerate() {
        *v = kf0.value[k] + (kf1.value[k] - kf0.value[k]) * ratio;
    }
    value
}
