//! Junction-voltage limiting and safe exponentials.
//!
//! Shared by the diode and BJT models. Newton iterates on pn junctions can
//! overshoot far into the exponential; these helpers compress the step the
//! way SPICE does so the linearization stays finite.

/// Hard clamp on exponent arguments: exp(±40) bounds every junction
/// evaluation.
const EXP_ARG_LIMIT: f64 = 40.0;

/// Default hard clamp on a single junction-voltage step (V).
pub const MAX_JUNCTION_STEP: f64 = 0.2;

/// Exponential with the argument clamped to ±40.
pub fn safe_exp(x: f64) -> f64 {
    x.clamp(-EXP_ARG_LIMIT, EXP_ARG_LIMIT).exp()
}

/// Critical junction voltage `v_crit = nVt · ln(nVt / (√2 · Is))` above
/// which log compression kicks in.
pub fn critical_voltage(nvt: f64, is: f64) -> f64 {
    nvt * (nvt / (std::f64::consts::SQRT_2 * is)).ln()
}

/// PN-junction limiting.
///
/// Given the candidate junction voltage `v_new` and the previous iterate's
/// `v_old`:
///
/// 1. Forward steps past `v_crit` are compressed logarithmically:
///    `v ← v_old + nvt·ln(1 + (v_new − v_old)/nvt)`.
/// 2. A symmetric hard clamp of `max_step` bounds the result either way.
pub fn pnjlim(v_new: f64, v_old: f64, nvt: f64, vcrit: f64, max_step: f64) -> f64 {
    let mut v = v_new;

    if v_new > vcrit && v_new > v_old {
        let arg = (v_new - v_old) / nvt;
        v = v_old + nvt * arg.ln_1p();
    }

    v.clamp(v_old - max_step, v_old + max_step)
}
