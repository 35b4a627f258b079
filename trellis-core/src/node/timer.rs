//! Timer Nodes
//!
//! A timer publishes a time ticker in microseconds. Timers are executed on
//! every tick regardless of input changes.
//!
//! If the `ticker_us` input is zero the wall clock is used; otherwise the
//! input is passed through, which lets callers drive time explicitly.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::property::{Inputs, Outputs, PropertyKind, PropertyTree, TypeSpec};

pub(crate) const TICKER: &str = "ticker_us";

/// Node state of a timer.
#[derive(Debug, Clone, Default)]
pub struct TimerNode {
    /// Last user-provided ticker value, used to reject time going backwards.
    last_ticker: Option<i64>,
}

impl TimerNode {
    /// A timer continuing from a previously seen ticker value.
    pub(crate) fn resumed(last_ticker: Option<i64>) -> Self {
        Self { last_ticker }
    }

    pub(crate) fn last_ticker(&self) -> Option<i64> {
        self.last_ticker
    }

    pub(crate) fn interface() -> (TypeSpec, TypeSpec) {
        let ticker = TypeSpec::structure([(TICKER, TypeSpec::leaf(PropertyKind::Int64))]);
        (ticker.clone(), ticker)
    }

    pub(crate) fn update(
        &mut self,
        inputs: Option<&PropertyTree>,
        outputs: Option<&mut PropertyTree>,
    ) -> Result<(), String> {
        let inputs = Inputs::new(inputs);
        let mut outputs = Outputs::new(outputs);

        let provided: i64 = inputs.get(TICKER)?;
        let ticker = if provided == 0 {
            self.last_ticker = None;
            wall_clock_us()?
        } else {
            if let Some(last) = self.last_ticker {
                if provided < last {
                    return Err(format!(
                        "ticker went backwards from {last} to {provided} microseconds"
                    ));
                }
            }
            self.last_ticker = Some(provided);
            provided
        };
        outputs.set(TICKER, ticker)
    }
}

fn wall_clock_us() -> Result<i64, String> {
    let elapsed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| format!("system clock is before the UNIX epoch: {e}"))?;
    i64::try_from(elapsed.as_micros()).map_err(|e| e.to_string())
}
