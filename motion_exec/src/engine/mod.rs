//! # Motor control engine
//!
//! An engine closes the loop of one motor axis: each period it samples the
//! odometry, runs the position error through its [`Pipeline`](crate::ctrl::Pipeline)
//! and writes the resulting duty cycle to the motor driver.
//!
//! The engine is either `Disabled` (initial state, braked) or `Enabled`. It
//! disables itself when the pipeline reports a stall, when the command
//! deadline elapses, when the disable check vetoes the motion or when the
//! driver fails. These faults are never returned to the caller of `actuate`,
//! they are observed through [`Engine::status`] or the events channel.
//!
//! The control cycle is available as [`Engine::step`] so that it can be driven
//! from a test with a simulated time base, [`Engine::start`] runs it in a
//! background thread instead.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod params;
mod state;
mod worker;

pub use params::*;
pub use state::{DisableCheck, EngineEvent, EngineMode, EngineStatus, Fault};

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

// External
use log::{error, info};
use std::{
    sync::{atomic::Ordering, mpsc::Receiver, Arc, PoisonError},
    thread::{self, JoinHandle},
    time::Duration,
};

// Internal
use crate::actuator::{DriverError, MotorDriver};
use crate::loc::OdometrySource;
use state::{Core, Shared};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Handle on a motor control engine.
pub struct Engine {
    name: String,
    period: Duration,
    shared: Arc<Shared>,
    bg_jh: Option<JoinHandle<()>>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Invalid engine parameters: {0}")]
    InvalidParams(String),

    #[error("Target must be a finite number, found {0}")]
    InvalidTarget(f64),

    #[error("The engine worker is already running")]
    AlreadyRunning,

    #[error("Could not spawn the engine worker: {0}")]
    SpawnError(std::io::Error),

    #[error("The engine worker panicked")]
    WorkerPanicked,

    #[error("The engine state lock was poisoned")]
    LockPoisoned,

    #[error("Motor driver error: {0}")]
    Driver(DriverError),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl<T> From<PoisonError<T>> for EngineError {
    fn from(_: PoisonError<T>) -> Self {
        EngineError::LockPoisoned
    }
}

impl Engine {
    /// Create a new engine, initially disabled and without a worker.
    pub fn new(
        name: &str,
        params: EngineParams,
        driver: Box<dyn MotorDriver>,
        odometry: Box<dyn OdometrySource>,
    ) -> Result<Self, EngineError> {
        if params.period_ms == 0 {
            return Err(EngineError::InvalidParams(
                "period_ms must be greater than 0".into(),
            ));
        }
        if !(params.max_duty_percent > 0.0 && params.max_duty_percent <= 100.0) {
            return Err(EngineError::InvalidParams(format!(
                "max_duty_percent must be in (0, 100], found {}",
                params.max_duty_percent
            )));
        }
        if params.pipeline.is_empty() {
            return Err(EngineError::InvalidParams("the pipeline has no stage".into()));
        }

        info!(
            "{}: new engine, {} stages, period {} ms, default timeout {} ms",
            name,
            params.pipeline.len(),
            params.period_ms,
            params.default_timeout_ms
        );

        Ok(Self {
            name: name.to_string(),
            period: Duration::from_millis(params.period_ms as u64),
            shared: Arc::new(Shared::new(Core::new(name, params, driver, odometry))),
            bg_jh: None,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Install the safety interlock evaluated before each actuation.
    pub fn set_disable_check(&self, check: DisableCheck) -> Result<(), EngineError> {
        self.shared.with_core(|core| core.set_disable_check(check))
    }

    /// Get a receiver for the events of this engine.
    pub fn subscribe(&self) -> Result<Receiver<EngineEvent>, EngineError> {
        self.shared.with_core(|core| core.subscribe())
    }

    /// Spawn the periodic worker.
    pub fn start(&mut self) -> Result<(), EngineError> {
        if self.bg_jh.is_some() {
            return Err(EngineError::AlreadyRunning);
        }

        self.shared.run.store(true, Ordering::Release);

        let name = self.name.clone();
        let shared = self.shared.clone();
        let period = self.period;

        let jh = thread::Builder::new()
            .name(self.name.clone())
            .spawn(move || worker::run(name, shared, period))
            .map_err(|e| {
                self.shared.run.store(false, Ordering::Release);
                EngineError::SpawnError(e)
            })?;

        self.bg_jh = Some(jh);

        Ok(())
    }

    /// Stop the worker, if any, and disable the engine.
    pub fn stop(&mut self) -> Result<(), EngineError> {
        self.shared.run.store(false, Ordering::Release);

        if let Some(jh) = self.bg_jh.take() {
            jh.join().map_err(|_| EngineError::WorkerPanicked)?;
        }

        self.disable()
    }

    /// Move to `target`, disabling the engine if it is not reached within
    /// `timeout_ms`. `None` or 0 uses the default timeout.
    ///
    /// Only invalid targets or a failing driver are reported here.
    pub fn actuate(&self, target: f64, timeout_ms: Option<u32>) -> Result<(), EngineError> {
        self.shared
            .with_core(|core| core.actuate(target, timeout_ms))?
    }

    /// Resume moving to the last target.
    pub fn enable(&self) -> Result<(), EngineError> {
        self.shared.with_core(|core| core.enable())?
    }

    /// Disable the engine. Takes effect before the next cycle.
    pub fn disable(&self) -> Result<(), EngineError> {
        self.shared.with_core(|core| core.disable())
    }

    /// Evaluate the disable check now, disabling the engine if it vetoes.
    pub fn check_disable(&self) -> Result<bool, EngineError> {
        self.shared.with_core(|core| core.check_disable())
    }

    /// Run exactly one control cycle.
    pub fn step(&self) -> Result<EngineStatus, EngineError> {
        self.shared.with_core(|core| core.step())
    }

    pub fn status(&self) -> Result<EngineStatus, EngineError> {
        self.shared.with_core(|core| core.status())
    }

    /// Fraction of the maximum speed allowed, forwarded to the rate shaping stages.
    pub fn set_speed_ratio(&self, ratio: f64) -> Result<(), EngineError> {
        self.shared.with_core(|core| core.set_speed_ratio(ratio))
    }

    pub fn set_bypass_anti_blocking(&self, bypass: bool) -> Result<(), EngineError> {
        self.shared
            .with_core(|core| core.set_bypass_anti_blocking(bypass))
    }

    /// Default timeout of the engine.
    ///
    /// Units: milliseconds
    pub fn default_timeout_ms(&self) -> Result<u32, EngineError> {
        self.shared
            .with_core(|core| core.params().default_timeout_ms)
    }

    pub fn is_enabled(&self) -> bool {
        self.shared.enabled.load(Ordering::Acquire)
    }

    pub fn is_blocked(&self) -> bool {
        self.shared.blocked.load(Ordering::Acquire)
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            error!("{}: error while stopping: {}", self.name, e);
        }
    }
}

#[cfg(all(test, feature = "sim"))]
mod test {
    use super::*;
    use crate::actuator::Direction;
    use crate::sim::{SimMotor, SimMotorParams};
    use std::sync::atomic::AtomicBool;

    const PARAMS: &str = r#"
        period_ms = 20
        default_timeout_ms = 2000
        max_duty_percent = 100.0

        [[pipeline]]
        kind = "PoseReached"
        threshold = 1.0

        [[pipeline]]
        kind = "Pid"
        kp = 0.5
        ki = 0.0
        kd = 0.0

        [[pipeline]]
        kind = "RateShaping"
        max_acceleration = 0.5
        max_speed = 5.0

        [[pipeline]]
        kind = "AntiBlocking"
        speed_threshold = 0.2
        error_threshold = 0.5
        blocked_cycles_threshold = 5

        [[pipeline]]
        kind = "Pid"
        kp = 10.0
        ki = 0.0
        kd = 0.0
        input = "SpeedOrder"
    "#;

    /// Simulated motor whose power stage can be made to fail on demand.
    #[derive(Clone)]
    struct FailingDriver {
        motor: SimMotor,
        fail_enable: Arc<AtomicBool>,
        fail_set: Arc<AtomicBool>,
    }

    impl MotorDriver for FailingDriver {
        fn set(&mut self, duty_cycle: f64, direction: Direction) -> Result<(), DriverError> {
            if self.fail_set.load(Ordering::Relaxed) {
                return Err(DriverError::Io("write failed".into()));
            }
            self.motor.set(duty_cycle, direction)
        }

        fn enable(&mut self) -> Result<(), DriverError> {
            if self.fail_enable.load(Ordering::Relaxed) {
                return Err(DriverError::Io("no power stage".into()));
            }
            self.motor.enable()
        }

        fn brake(&mut self) -> Result<(), DriverError> {
            self.motor.brake()
        }
    }

    fn failing_engine() -> (Engine, FailingDriver) {
        let motor = SimMotor::new(SimMotorParams {
            max_speed: 10.0,
            response: 0.5,
        });
        let driver = FailingDriver {
            motor: motor.clone(),
            fail_enable: Arc::new(AtomicBool::new(false)),
            fail_set: Arc::new(AtomicBool::new(false)),
        };
        let engine = Engine::new(
            "failing_engine",
            util::params::from_str(PARAMS).unwrap(),
            Box::new(driver.clone()),
            Box::new(motor),
        )
        .unwrap();

        (engine, driver)
    }

    fn engine_with(params: EngineParams) -> (Engine, SimMotor) {
        let motor = SimMotor::new(SimMotorParams {
            max_speed: 10.0,
            response: 0.5,
        });
        let engine = Engine::new(
            "test_engine",
            params,
            Box::new(motor.clone()),
            Box::new(motor.clone()),
        )
        .unwrap();

        (engine, motor)
    }

    fn engine() -> (Engine, SimMotor) {
        engine_with(util::params::from_str(PARAMS).unwrap())
    }

    #[test]
    fn test_actuate_enables() {
        let (engine, _motor) = engine();
        assert!(!engine.is_enabled());
        assert_eq!(engine.status().unwrap().mode, EngineMode::Disabled);

        engine.actuate(100.0, None).unwrap();

        let status = engine.status().unwrap();
        assert!(engine.is_enabled());
        assert_eq!(status.mode, EngineMode::Enabled);
        assert_eq!(status.target, 100.0);
        // 2000 ms at 20 ms per cycle
        assert_eq!(status.remaining_cycles, Some(100));

        engine.actuate(100.0, Some(30)).unwrap();
        assert_eq!(engine.status().unwrap().remaining_cycles, Some(1));
    }

    #[test]
    fn test_converges_and_holds() {
        let (engine, motor) = engine();
        let rx = engine.subscribe().unwrap();

        engine.actuate(100.0, None).unwrap();
        for _ in 0..300 {
            engine.step().unwrap();
        }

        // Three times the timeout later the target is still held
        let status = engine.status().unwrap();
        assert_eq!(status.mode, EngineMode::Enabled);
        assert_eq!(status.fault, None);
        assert!((motor.position() - 100.0).abs() <= 1.0, "{}", motor.position());

        // Overshooting the threshold may report Reached more than once
        let events: Vec<EngineEvent> = rx.try_iter().collect();
        assert!(!events.is_empty());
        assert!(events.iter().all(|e| *e == EngineEvent::Reached), "{:?}", events);
    }

    #[test]
    fn test_converges_backwards() {
        let (engine, motor) = engine();

        engine.actuate(-50.0, None).unwrap();
        for _ in 0..100 {
            engine.step().unwrap();
        }

        assert!(engine.is_enabled());
        assert!((motor.position() + 50.0).abs() <= 1.0, "{}", motor.position());
    }

    #[test]
    fn test_jam_blocked() {
        let (engine, motor) = engine();
        let rx = engine.subscribe().unwrap();
        motor.set_jammed(true);

        engine.actuate(100.0, None).unwrap();
        for _ in 0..20 {
            engine.step().unwrap();
        }

        let status = engine.status().unwrap();
        assert_eq!(status.mode, EngineMode::Disabled);
        assert_eq!(status.fault, Some(Fault::Blocked));
        assert!(engine.is_blocked());
        assert!(!engine.is_enabled());
        assert!(motor.is_braked());
        assert_eq!(
            rx.try_iter().collect::<Vec<_>>(),
            vec![EngineEvent::Faulted(Fault::Blocked)]
        );

        // A new command clears the fault
        motor.set_jammed(false);
        engine.actuate(10.0, None).unwrap();
        assert!(!engine.is_blocked());
        assert_eq!(engine.status().unwrap().fault, None);
    }

    #[test]
    fn test_jam_timeout() {
        let (engine, motor) = engine();
        motor.set_jammed(true);
        engine.set_bypass_anti_blocking(true).unwrap();

        // 200 ms is 10 cycles
        engine.actuate(100.0, Some(200)).unwrap();
        for _ in 0..9 {
            engine.step().unwrap();
        }
        assert!(engine.is_enabled());

        let status = engine.step().unwrap();
        assert_eq!(status.mode, EngineMode::Disabled);
        assert_eq!(status.fault, Some(Fault::Timeout));
        assert!(!engine.is_blocked());
    }

    #[test]
    fn test_no_default_timeout() {
        let mut params: EngineParams = util::params::from_str(PARAMS).unwrap();
        params.default_timeout_ms = 0;
        let (engine, motor) = engine_with(params);
        motor.set_jammed(true);
        engine.set_bypass_anti_blocking(true).unwrap();

        engine.actuate(100.0, None).unwrap();
        assert_eq!(engine.status().unwrap().remaining_cycles, None);
        for _ in 0..500 {
            engine.step().unwrap();
        }

        assert!(engine.is_enabled());
    }

    #[test]
    fn test_safety_veto() {
        let (engine, motor) = engine();
        let rx = engine.subscribe().unwrap();
        engine
            .set_disable_check(Box::new(|measured| measured.position >= 0.0))
            .unwrap();

        engine.actuate(100.0, None).unwrap();
        let status = engine.step().unwrap();

        assert_eq!(status.mode, EngineMode::Disabled);
        assert_eq!(status.fault, Some(Fault::SafetyVeto));
        assert_eq!(motor.writes(), 0);
        assert_eq!(
            rx.try_iter().collect::<Vec<_>>(),
            vec![EngineEvent::Faulted(Fault::SafetyVeto)]
        );
        assert!(engine.check_disable().unwrap());
    }

    #[test]
    fn test_disabled_writes_nothing() {
        let (engine, motor) = engine();
        let rx = engine.subscribe().unwrap();

        for _ in 0..5 {
            engine.step().unwrap();
        }
        assert_eq!(motor.writes(), 0);

        engine.actuate(100.0, None).unwrap();
        engine.step().unwrap();
        assert_eq!(motor.writes(), 1);

        engine.disable().unwrap();
        for _ in 0..5 {
            engine.step().unwrap();
        }
        assert_eq!(motor.writes(), 1);
        assert_eq!(rx.try_iter().collect::<Vec<_>>(), vec![EngineEvent::Disabled]);

        // Resuming keeps the target
        engine.enable().unwrap();
        engine.step().unwrap();
        assert_eq!(motor.writes(), 2);
        assert_eq!(engine.status().unwrap().target, 100.0);
    }

    #[test]
    fn test_invalid_target() {
        let (engine, _motor) = engine();

        assert!(matches!(
            engine.actuate(f64::NAN, None),
            Err(EngineError::InvalidTarget(_))
        ));
        let status = engine.status().unwrap();
        assert_eq!(status.mode, EngineMode::Disabled);
        assert_eq!(status.target, 0.0);
    }

    #[test]
    fn test_invalid_params() {
        let mut params: EngineParams = util::params::from_str(PARAMS).unwrap();
        params.period_ms = 0;

        let motor = SimMotor::new(SimMotorParams::default());
        assert!(matches!(
            Engine::new("bad", params, Box::new(motor.clone()), Box::new(motor)),
            Err(EngineError::InvalidParams(_))
        ));
    }

    #[test]
    fn test_worker() {
        let mut params: EngineParams = util::params::from_str(PARAMS).unwrap();
        params.period_ms = 2;
        let (mut engine, motor) = engine_with(params);
        let rx = engine.subscribe().unwrap();

        engine.start().unwrap();
        assert!(matches!(engine.start(), Err(EngineError::AlreadyRunning)));

        engine.actuate(100.0, Some(10_000)).unwrap();
        assert_eq!(
            rx.recv_timeout(Duration::from_secs(10)).unwrap(),
            EngineEvent::Reached
        );

        engine.stop().unwrap();
        assert!(!engine.is_enabled());
        assert!(motor.is_braked());
    }

    #[test]
    fn test_enable_failure_while_running() {
        let (engine, driver) = failing_engine();
        let rx = engine.subscribe().unwrap();

        engine.actuate(50.0, None).unwrap();
        engine.step().unwrap();
        assert!(!driver.motor.is_braked());

        // The new command is rejected and the running one stopped
        driver.fail_enable.store(true, Ordering::Relaxed);
        assert!(matches!(
            engine.actuate(-80.0, Some(100)),
            Err(EngineError::Driver(_))
        ));

        let status = engine.status().unwrap();
        assert_eq!(status.mode, EngineMode::Disabled);
        assert_eq!(status.fault, Some(Fault::HardwareAbsent));
        assert_eq!(status.target, 50.0);
        assert_eq!(status.remaining_cycles, Some(99));
        assert!(driver.motor.is_braked());
        assert_eq!(
            rx.try_iter().collect::<Vec<_>>(),
            vec![EngineEvent::Faulted(Fault::HardwareAbsent)]
        );

        // Nothing is written until the driver comes back
        let writes = driver.motor.writes();
        assert!(engine.enable().is_err());
        engine.step().unwrap();
        assert_eq!(driver.motor.writes(), writes);
        assert_eq!(engine.status().unwrap().fault, Some(Fault::HardwareAbsent));

        driver.fail_enable.store(false, Ordering::Relaxed);
        engine.enable().unwrap();
        engine.step().unwrap();
        assert_eq!(driver.motor.writes(), writes + 1);
        assert_eq!(engine.status().unwrap().target, 50.0);
    }

    #[test]
    fn test_enable_failure_while_disabled() {
        let (engine, driver) = failing_engine();
        let rx = engine.subscribe().unwrap();
        driver.fail_enable.store(true, Ordering::Relaxed);

        assert!(engine.actuate(100.0, None).is_err());

        let status = engine.status().unwrap();
        assert_eq!(status.mode, EngineMode::Disabled);
        assert_eq!(status.fault, None);
        assert_eq!(status.target, 0.0);
        assert_eq!(status.remaining_cycles, None);
        assert_eq!(rx.try_iter().count(), 0);
    }

    #[test]
    fn test_write_failure() {
        let (engine, driver) = failing_engine();

        engine.actuate(100.0, None).unwrap();
        engine.step().unwrap();

        driver.fail_set.store(true, Ordering::Relaxed);
        let status = engine.step().unwrap();

        assert_eq!(status.mode, EngineMode::Disabled);
        assert_eq!(status.fault, Some(Fault::HardwareAbsent));
        assert_eq!(status.command_percent, 0.0);
        assert!(driver.motor.is_braked());
    }

    #[test]
    fn test_disable_while_worker_runs() {
        let mut params: EngineParams = util::params::from_str(PARAMS).unwrap();
        params.period_ms = 2;
        let (mut engine, motor) = engine_with(params);
        let rx = engine.subscribe().unwrap();

        engine.start().unwrap();
        engine.actuate(100.0, Some(10_000)).unwrap();

        // Let the worker write a few commands, mid-motion
        let started = std::time::Instant::now();
        while motor.writes() < 5 {
            assert!(started.elapsed() < Duration::from_secs(10));
            thread::sleep(Duration::from_millis(1));
        }

        engine.disable().unwrap();
        let writes = motor.writes();

        thread::sleep(engine.period() * 2);

        assert_eq!(motor.writes(), writes);
        assert!(!engine.is_enabled());
        assert!(motor.is_braked());
        assert!(rx.try_iter().any(|e| e == EngineEvent::Disabled));

        engine.stop().unwrap();
    }
}
