//! # Engine worker
//!
//! Background thread running the control cycle of one engine at a fixed
//! period until instructed to stop.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{error, info, warn};
use std::{
    sync::{atomic::Ordering, Arc},
    thread,
    time::{Duration, Instant},
};

use super::state::Shared;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Number of consecutive overruns after which a warning is logged.
const OVERRUN_WARN_CYCLES: u32 = 10;

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Worker loop, returns once `shared.run` is cleared.
pub(crate) fn run(name: String, shared: Arc<Shared>, period: Duration) {
    info!("{}: worker started, period {} ms", name, period.as_millis());

    let mut next_cycle = Instant::now() + period;
    let mut num_consec_overruns = 0u32;

    while shared.run.load(Ordering::Acquire) {
        if let Err(e) = shared.with_core(|core| core.step()) {
            error!("{}: stopping worker: {}", name, e);
            break;
        }

        // ---- CYCLE MANAGEMENT ----

        // Sleep until the next boundary so that the period does not drift
        let now = Instant::now();
        match next_cycle.checked_duration_since(now) {
            Some(d) => {
                num_consec_overruns = 0;
                thread::sleep(d);
                next_cycle += period;
            }
            None => {
                num_consec_overruns += 1;
                if num_consec_overruns % OVERRUN_WARN_CYCLES == 0 {
                    warn!(
                        "{}: {} consecutive cycle overruns, last by {:.3} ms",
                        name,
                        num_consec_overruns,
                        (now - next_cycle).as_secs_f64() * 1000.0
                    );
                }
                next_cycle = now + period;
            }
        }
    }

    info!("{}: worker stopped", name);
}
