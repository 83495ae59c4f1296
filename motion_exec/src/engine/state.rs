//! # Engine state
//!
//! Runtime state of one motor control engine, shared between the periodic
//! worker and the callers of the [`super::Engine`] handle.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

// External
use log::{debug, error, info, trace, warn};
use serde::Serialize;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    mpsc::{self, Receiver, Sender},
    Mutex,
};

// Internal
use super::{EngineError, EngineParams};
use crate::actuator::{Direction, DriverError, MotorDriver};
use crate::ctrl::{Feedback, Pipeline, StageStatus};
use crate::loc::OdometrySource;
use util::{maths::clamp_sym, time::millis_to_cycles};

// ------------------------------------------------------------------------------------------------
// TYPES
// ------------------------------------------------------------------------------------------------

/// Safety interlock evaluated once per cycle before actuation. Returning true
/// disables the engine.
pub type DisableCheck = Box<dyn FnMut(&Feedback) -> bool + Send>;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Snapshot of the engine state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EngineStatus {
    pub mode: EngineMode,

    /// Fault which caused the last transition to `Disabled`, cleared by the next command
    pub fault: Option<Fault>,

    /// Units: axis units
    pub target: f64,

    /// Last signed duty cycle written to the driver.
    ///
    /// Units: percent
    pub command_percent: f64,

    /// True while the target is held
    pub reached: bool,

    /// Cycles left before a timeout, `None` if the command has no deadline
    pub remaining_cycles: Option<u32>,
}

/// Data shared between the engine handle and its worker.
pub(crate) struct Shared {
    pub(crate) core: Mutex<Core>,

    /// Lock free mirrors of the core state
    pub(crate) enabled: AtomicBool,
    pub(crate) blocked: AtomicBool,

    /// Cleared to stop the worker
    pub(crate) run: AtomicBool,
}

/// Engine state, only accessed under the lock of [`Shared`].
pub(crate) struct Core {
    name: String,
    params: EngineParams,

    pipeline: Pipeline,
    driver: Box<dyn MotorDriver>,
    odometry: Box<dyn OdometrySource>,
    disable_check: Option<DisableCheck>,
    subscribers: Vec<Sender<EngineEvent>>,

    mode: EngineMode,
    fault: Option<Fault>,
    target: f64,
    reached: bool,
    command_percent: f64,

    /// Deadline of the current command, re-armed while the target is held
    armed_cycles: Option<u32>,
    remaining_cycles: Option<u32>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EngineMode {
    /// No command is written, the motor is braked. Initial state.
    Disabled,

    /// The control loop runs each period.
    Enabled,
}

/// Reasons for the engine to disable itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Fault {
    /// The deadline elapsed before the target was reached
    Timeout,

    /// The anti-blocking stage detected a stall
    Blocked,

    /// The disable check vetoed the motion
    SafetyVeto,

    /// The driver rejected a command
    HardwareAbsent,
}

/// Notifications sent to the subscribers of an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineEvent {
    /// The target has been reached, the engine now holds it
    Reached,

    /// The engine disabled itself
    Faulted(Fault),

    /// The engine was disabled on request
    Disabled,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Shared {
    pub(crate) fn new(core: Core) -> Self {
        Self {
            core: Mutex::new(core),
            enabled: AtomicBool::new(false),
            blocked: AtomicBool::new(false),
            run: AtomicBool::new(false),
        }
    }

    /// Run `f` with the core locked, then refresh the lock free flags.
    pub(crate) fn with_core<R>(&self, f: impl FnOnce(&mut Core) -> R) -> Result<R, EngineError> {
        let mut core = self.core.lock()?;
        let result = f(&mut core);

        self.enabled
            .store(core.mode == EngineMode::Enabled, Ordering::Release);
        self.blocked
            .store(core.fault == Some(Fault::Blocked), Ordering::Release);

        Ok(result)
    }
}

impl Core {
    pub(crate) fn new(
        name: &str,
        params: EngineParams,
        driver: Box<dyn MotorDriver>,
        odometry: Box<dyn OdometrySource>,
    ) -> Self {
        Self {
            name: name.to_string(),
            pipeline: Pipeline::from_params(&params.pipeline),
            params,
            driver,
            odometry,
            disable_check: None,
            subscribers: Vec::new(),
            mode: EngineMode::Disabled,
            fault: None,
            target: 0.0,
            reached: false,
            command_percent: 0.0,
            armed_cycles: None,
            remaining_cycles: None,
        }
    }

    pub(crate) fn params(&self) -> &EngineParams {
        &self.params
    }

    pub(crate) fn set_disable_check(&mut self, check: DisableCheck) {
        self.disable_check = Some(check);
    }

    pub(crate) fn subscribe(&mut self) -> Receiver<EngineEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.push(tx);
        rx
    }

    /// Start moving to a new target.
    pub(crate) fn actuate(&mut self, target: f64, timeout_ms: Option<u32>) -> Result<(), EngineError> {
        if !target.is_finite() {
            warn!("{}: rejected target {}", self.name, target);
            return Err(EngineError::InvalidTarget(target));
        }

        // The previous command stands until the driver accepts the new one
        if let Err(e) = self.driver.enable() {
            return Err(self.driver_enable_failed(e));
        }

        self.mode = EngineMode::Enabled;
        self.pipeline.reset();
        self.target = target;
        self.arm_deadline(timeout_ms);
        self.fault = None;
        self.reached = false;

        debug!(
            "{}: actuate to {:.3}, deadline {:?} cycles",
            self.name, target, self.remaining_cycles
        );

        Ok(())
    }

    /// Resume moving to the current target.
    pub(crate) fn enable(&mut self) -> Result<(), EngineError> {
        if self.mode == EngineMode::Enabled {
            return Ok(());
        }

        if let Err(e) = self.driver.enable() {
            return Err(self.driver_enable_failed(e));
        }

        self.pipeline.reset();
        self.remaining_cycles = self.armed_cycles;
        self.fault = None;
        self.reached = false;
        self.mode = EngineMode::Enabled;

        debug!("{}: enabled, target {:.3}", self.name, self.target);

        Ok(())
    }

    pub(crate) fn disable(&mut self) {
        self.shutdown(None);
    }

    /// Evaluate the disable check out of the control loop.
    pub(crate) fn check_disable(&mut self) -> bool {
        let measured = self.measure();

        if self.veto(&measured) {
            if self.mode == EngineMode::Enabled {
                self.shutdown(Some(Fault::SafetyVeto));
            }
            true
        } else {
            false
        }
    }

    pub(crate) fn set_speed_ratio(&mut self, ratio: f64) {
        self.pipeline.set_speed_ratio(ratio);
    }

    pub(crate) fn set_bypass_anti_blocking(&mut self, bypass: bool) {
        self.pipeline.set_bypass_anti_blocking(bypass);
    }

    pub(crate) fn status(&self) -> EngineStatus {
        EngineStatus {
            mode: self.mode,
            fault: self.fault,
            target: self.target,
            command_percent: self.command_percent,
            reached: self.reached,
            remaining_cycles: self.remaining_cycles,
        }
    }

    /// Run one control cycle.
    pub(crate) fn step(&mut self) -> EngineStatus {
        if self.mode == EngineMode::Disabled {
            return self.status();
        }

        let measured = self.measure();

        if self.veto(&measured) {
            self.shutdown(Some(Fault::SafetyVeto));
            return self.status();
        }

        let output = self.pipeline.compute(self.target, &measured);

        match output.status {
            StageStatus::Blocked => {
                self.shutdown(Some(Fault::Blocked));
                return self.status();
            }
            StageStatus::Reached => {
                if !self.reached {
                    debug!("{}: target {:.3} reached", self.name, self.target);
                    self.emit(EngineEvent::Reached);
                }
                self.reached = true;
                self.remaining_cycles = self.armed_cycles;
            }
            StageStatus::Moving => {
                self.reached = false;

                if let Some(remaining) = self.remaining_cycles {
                    let remaining = remaining.saturating_sub(1);
                    self.remaining_cycles = Some(remaining);

                    if remaining == 0 {
                        self.shutdown(Some(Fault::Timeout));
                        return self.status();
                    }
                }
            }
        }

        let percent = clamp_sym(output.command, self.params.max_duty_percent);
        let (duty_cycle, direction) = Direction::from_percent(percent);

        if let Err(e) = self.driver.set(duty_cycle, direction) {
            error!("{}: driver rejected the command: {}", self.name, e);
            self.shutdown(Some(Fault::HardwareAbsent));
            return self.status();
        }
        self.command_percent = percent;

        trace!(
            "{}: measured {:.3}/{:.3}, command {:.1} %",
            self.name,
            measured.position,
            measured.speed,
            percent
        );

        self.status()
    }

    fn measure(&self) -> Feedback {
        Feedback {
            position: self.odometry.get_position(),
            speed: self.odometry.get_speed(),
        }
    }

    fn veto(&mut self, measured: &Feedback) -> bool {
        match self.disable_check.as_mut() {
            Some(check) => check(measured),
            None => false,
        }
    }

    fn arm_deadline(&mut self, timeout_ms: Option<u32>) {
        let timeout_ms = timeout_ms
            .filter(|t| *t != 0)
            .unwrap_or(self.params.default_timeout_ms);

        self.armed_cycles = match timeout_ms {
            0 => None,
            t => Some(millis_to_cycles(t, self.params.period_ms).max(1)),
        };
        self.remaining_cycles = self.armed_cycles;
    }

    /// Handle a driver refusing to power up. A running engine is shut down on
    /// `HardwareAbsent`, a disabled one is left untouched.
    fn driver_enable_failed(&mut self, e: DriverError) -> EngineError {
        error!("{}: could not enable the driver: {}", self.name, e);

        if self.mode == EngineMode::Enabled {
            self.shutdown(Some(Fault::HardwareAbsent));
        }

        EngineError::Driver(e)
    }

    /// Go to `Disabled`, brake, and notify the subscribers.
    fn shutdown(&mut self, fault: Option<Fault>) {
        let was_enabled = self.mode == EngineMode::Enabled;

        self.mode = EngineMode::Disabled;
        self.command_percent = 0.0;
        self.reached = false;

        if let Err(e) = self.driver.brake() {
            error!("{}: could not brake: {}", self.name, e);
        }

        match fault {
            Some(f) => {
                error!(
                    "{}: disabled on {:?} fault, target {:.3}",
                    self.name, f, self.target
                );
                self.fault = Some(f);
                self.emit(EngineEvent::Faulted(f));
            }
            None if was_enabled => {
                info!("{}: disabled", self.name);
                self.emit(EngineEvent::Disabled);
            }
            None => (),
        }
    }

    fn emit(&mut self, event: EngineEvent) {
        // Dropped receivers are forgotten
        self.subscribers.retain(|tx| tx.send(event).is_ok());
    }
}

impl Drop for Core {
    fn drop(&mut self) {
        if self.mode == EngineMode::Enabled {
            self.shutdown(None);
        }
    }
}
