//! Fixed progress bands reported while a job is processing.
//!
//! Model load and finalization occupy fixed points; the generation step is
//! mapped linearly onto `GENERATION_START..=GENERATION_END`.

/// Worker picked the job up and is loading the model.
pub const MODEL_LOADING: f64 = 5.0;
/// Model is resident, preparing inputs.
pub const MODEL_READY: f64 = 20.0;
/// First and last points of the generation band.
pub const GENERATION_START: f64 = 30.0;
pub const GENERATION_END: f64 = 85.0;
/// Writing the output artifact.
pub const FINALIZING: f64 = 90.0;
pub const COMPLETE: f64 = 100.0;

/// Map `(completed_steps, total_steps)` onto the generation band.
///
/// A zero `total_steps` maps to the start of the band. Steps beyond the total
/// are clamped to the end of the band.
pub fn generation_progress(completed_steps: u32, total_steps: u32) -> f64 {
    if total_steps == 0 {
        return GENERATION_START;
    }
    let fraction = (completed_steps.min(total_steps) as f64) / (total_steps as f64);
    GENERATION_START + fraction * (GENERATION_END - GENERATION_START)
}

/// Clamp an arbitrary value into `0..=100`, treating NaN as zero.
pub fn clamp_percent(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, COMPLETE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn band_endpoints() {
        assert_eq!(generation_progress(0, 40), GENERATION_START);
        assert_eq!(generation_progress(40, 40), GENERATION_END);
    }

    #[test]
    fn midpoint_is_linear() {
        let mid = generation_progress(20, 40);
        assert!((mid - 57.5).abs() < f64::EPSILON);
    }

    #[test]
    fn zero_total_does_not_divide() {
        assert_eq!(generation_progress(3, 0), GENERATION_START);
    }

    #[test]
    fn overshoot_clamped() {
        assert_eq!(generation_progress(50, 40), GENERATION_END);
    }

    #[test]
    fn mapping_is_monotonic() {
        let mut last = 0.0;
        for step in 0..=25 {
            let p = generation_progress(step, 25);
            assert!(p >= last);
            last = p;
        }
    }

    #[test]
    fn clamp_percent_bounds() {
        assert_eq!(clamp_percent(-3.0), 0.0);
        assert_eq!(clamp_percent(140.0), 100.0);
        assert_eq!(clamp_percent(f64::NAN), 0.0);
    }
}
