//! Slider controls on top of a browser session.
//!
//! ARIA sliders move one granularity step per arrow key. Current values
//! are read from `aria-valuenow`.

use std::time::Duration;

use super::session::{BrowserError, BrowserResult, BrowserSession, ElementHandle, Key};

/// Attribute holding a slider's current value.
pub const VALUE_ATTRIBUTE: &str = "aria-valuenow";

/// Absorbs floating-point noise in `distance / granularity`.
const STEP_EPSILON: f64 = 1e-9;

/// Number of granularity steps needed to go from `current` to `target`.
///
/// `ceil(|target - current| / granularity)`, without overshooting when the
/// quotient is an integer that floating point lands just above.
pub fn step_count(current: f64, target: f64, granularity: f64) -> u32 {
    if granularity <= 0.0 {
        return 0;
    }
    let steps = ((target - current).abs() / granularity - STEP_EPSILON).ceil();
    if steps <= 0.0 {
        0
    } else {
        steps as u32
    }
}

/// Session wrapper exposing the two slider primitives.
pub struct Sliders<'s> {
    session: &'s mut dyn BrowserSession,
    timeout: Duration,
}

impl<'s> Sliders<'s> {
    /// `timeout` bounds the wait for each slider to appear.
    pub fn new(session: &'s mut dyn BrowserSession, timeout: Duration) -> Self {
        Self { session, timeout }
    }

    /// Move a slider by a fixed number of steps (negative moves left).
    pub async fn nudge(&mut self, selector: &str, steps: i32) -> BrowserResult<()> {
        let slider = self.session.wait_for(selector, self.timeout).await?;
        let key = if steps > 0 { Key::ArrowRight } else { Key::ArrowLeft };

        self.session.click(&slider).await?;
        self.session
            .press_key(&slider, key, steps.unsigned_abs())
            .await
    }

    /// Move a slider to `target` in `granularity` steps.
    ///
    /// Returns the number of key presses sent.
    pub async fn set_value(
        &mut self,
        selector: &str,
        target: f64,
        granularity: f64,
    ) -> BrowserResult<u32> {
        let slider = self.session.wait_for(selector, self.timeout).await?;
        let current = self.current_value(&slider).await?;

        let steps = step_count(current, target, granularity);
        let key = if target > current {
            Key::ArrowRight
        } else {
            Key::ArrowLeft
        };

        self.session.click(&slider).await?;
        if steps > 0 {
            self.session.press_key(&slider, key, steps).await?;
        }
        Ok(steps)
    }

    async fn current_value(&mut self, slider: &ElementHandle) -> BrowserResult<f64> {
        let unusable = |message: &str| BrowserError::Attribute {
            selector: slider.selector().to_string(),
            name: VALUE_ATTRIBUTE.to_string(),
            message: message.to_string(),
        };

        let raw = self
            .session
            .read_attribute(slider, VALUE_ATTRIBUTE)
            .await?
            .ok_or_else(|| unusable("missing"))?;
        parse_value(&raw).ok_or_else(|| unusable(&format!("'{}' is not a finite number", raw)))
    }
}

/// Parse a slider value, rejecting `inf` and `NaN`.
fn parse_value(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_quotients_do_not_overshoot() {
        assert_eq!(step_count(1.0, 1.3, 0.01), 30);
        assert_eq!(step_count(1.0, 0.7, 0.01), 30);
        assert_eq!(step_count(0.5, 2.0, 0.01), 150);
        assert_eq!(step_count(1.0, 1.0, 0.01), 0);
    }

    #[test]
    fn partial_steps_round_up() {
        // reverb 5 targets 0.51 from a default of 0.3
        assert_eq!(step_count(0.3, 0.51, 0.05), 5);
        assert_eq!(step_count(0.0, 0.011, 0.01), 2);
    }

    #[test]
    fn every_speed_target_is_reachable_from_baseline() {
        for speed in 50..=200u32 {
            let target = speed as f64 / 100.0;
            let expected = (speed as i64 - 100).unsigned_abs() as u32;
            assert_eq!(step_count(1.0, target, 0.01), expected, "speed {speed}");
        }
    }

    #[test]
    fn slider_values_must_be_finite() {
        assert_eq!(parse_value(" 1.25 "), Some(1.25));
        assert_eq!(parse_value("-0.5"), Some(-0.5));
        assert_eq!(parse_value("inf"), None);
        assert_eq!(parse_value("-Infinity"), None);
        assert_eq!(parse_value("NaN"), None);
        assert_eq!(parse_value("1,0"), None);
    }

    #[test]
    fn degenerate_granularity_means_no_steps() {
        assert_eq!(step_count(0.0, 1.0, 0.0), 0);
    }
}
