//! # Simulation
//!
//! Simulated plants standing in for the hardware, for development and tests.
//!
//! Plants only move when commanded: each `set` on a motor integrates one
//! control period, so an engine stepped by hand runs in simulated time.
//! Handles are cheap to clone, clones share the same plant.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::Deserialize;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex, MutexGuard, PoisonError,
};

use crate::actuator::{check_duty_cycle, Direction, DriverError, MotorDriver, OutputPin, ServoDriver};
use crate::loc::{Odometry, OdometrySource};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Parameters of a first order motor plant.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct SimMotorParams {
    /// Speed reached at full duty cycle.
    ///
    /// Units: axis units per period
    pub max_speed: f64,

    /// Fraction of the speed error corrected each period, in (0, 1]
    pub response: f64,
}

/// A motor and its encoder.
#[derive(Clone)]
pub struct SimMotor {
    plant: Arc<Mutex<MotorPlant>>,
}

/// A binary output.
#[derive(Clone, Default)]
pub struct SimPin {
    level: Arc<AtomicBool>,
}

/// A servo driver board.
#[derive(Clone)]
pub struct SimServoDriver {
    channels: Arc<Mutex<Vec<Option<f64>>>>,
}

/// A differential drive base.
///
/// The linear and angular engines each drive one axis of the base, the base
/// mixes them into wheel speeds and feeds the resulting encoder pulses to the
/// odometry on every `tick`.
#[derive(Clone)]
pub struct SimDrive {
    base: Arc<Mutex<DrivePlant>>,
    odometry: Arc<Odometry>,
}

/// One axis of a [`SimDrive`], seen as a motor driver.
pub struct SimDriveAxis {
    base: Arc<Mutex<DrivePlant>>,
    angular: bool,
}

#[derive(Debug, Default)]
struct MotorPlant {
    params: SimMotorParams,
    position: f64,
    speed: f64,
    jammed: bool,
    braked: bool,
    writes: u64,
}

#[derive(Debug, Default)]
struct DrivePlant {
    params: SimDriveParams,

    /// Signed duty cycles of the linear and angular axes
    linear_duty: f64,
    angular_duty: f64,

    /// Wheel speeds, in millimetres per period
    left_speed: f64,
    right_speed: f64,

    /// Fractions of pulses not yet reported to the odometry
    left_remainder: f64,
    right_remainder: f64,
}

/// Parameters of a differential drive plant.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct SimDriveParams {
    /// Wheel speed at full duty cycle.
    ///
    /// Units: millimetres per period
    pub max_wheel_speed_mm: f64,

    /// Fraction of the speed error corrected each period, in (0, 1]
    pub response: f64,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for SimMotorParams {
    fn default() -> Self {
        Self {
            max_speed: 10.0,
            response: 0.5,
        }
    }
}

impl Default for SimDriveParams {
    fn default() -> Self {
        Self {
            max_wheel_speed_mm: 20.0,
            response: 0.5,
        }
    }
}

impl SimMotor {
    pub fn new(params: SimMotorParams) -> Self {
        Self {
            plant: Arc::new(Mutex::new(MotorPlant {
                params,
                braked: true,
                ..Default::default()
            })),
        }
    }

    fn plant(&self) -> MutexGuard<'_, MotorPlant> {
        // The plant holds plain numbers, a panic while locked leaves it usable
        self.plant.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block the motor, it no longer moves whatever the command.
    pub fn set_jammed(&self, jammed: bool) {
        self.plant().jammed = jammed;
    }

    pub fn set_position(&self, position: f64) {
        self.plant().position = position;
    }

    pub fn position(&self) -> f64 {
        self.plant().position
    }

    pub fn is_braked(&self) -> bool {
        self.plant().braked
    }

    /// Number of commands written to the motor.
    pub fn writes(&self) -> u64 {
        self.plant().writes
    }
}

impl MotorDriver for SimMotor {
    fn set(&mut self, duty_cycle: f64, direction: Direction) -> Result<(), DriverError> {
        let duty_cycle = check_duty_cycle(duty_cycle)?;
        let mut plant = self.plant();

        plant.writes += 1;
        plant.braked = false;

        if plant.jammed {
            plant.speed = 0.0;
        } else {
            let demand = duty_cycle * direction.sign() * plant.params.max_speed;
            plant.speed += plant.params.response * (demand - plant.speed);
            plant.position += plant.speed;
        }

        Ok(())
    }

    fn enable(&mut self) -> Result<(), DriverError> {
        self.plant().braked = false;
        Ok(())
    }

    fn brake(&mut self) -> Result<(), DriverError> {
        let mut plant = self.plant();
        plant.braked = true;
        plant.speed = 0.0;
        Ok(())
    }
}

impl OdometrySource for SimMotor {
    fn get_position(&self) -> f64 {
        self.plant().position
    }

    fn get_speed(&self) -> f64 {
        self.plant().speed
    }
}

impl SimPin {
    pub fn is_high(&self) -> bool {
        self.level.load(Ordering::Acquire)
    }
}

impl OutputPin for SimPin {
    fn set(&mut self, on: bool) -> Result<(), DriverError> {
        self.level.store(on, Ordering::Release);
        Ok(())
    }
}

impl SimServoDriver {
    pub fn new(num_channels: u8) -> Self {
        Self {
            channels: Arc::new(Mutex::new(vec![None; num_channels as usize])),
        }
    }

    /// The board as shared by the servos plugged on it.
    pub fn shared(&self) -> Arc<Mutex<dyn ServoDriver>> {
        Arc::new(Mutex::new(self.clone()))
    }

    /// Duty cycle generated on a channel, `None` if disabled or absent.
    pub fn duty_cycle(&self, channel: u8) -> Option<f64> {
        self.channels
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(channel as usize)
            .copied()
            .flatten()
    }
}

impl ServoDriver for SimServoDriver {
    fn set_duty_cycle(&mut self, channel: u8, duty_cycle: f64) -> Result<(), DriverError> {
        let duty_cycle = check_duty_cycle(duty_cycle)?;
        let mut channels = self.channels.lock().map_err(|_| DriverError::LockPoisoned)?;

        match channels.get_mut(channel as usize) {
            Some(c) => {
                *c = Some(duty_cycle);
                Ok(())
            }
            None => Err(DriverError::ChannelMissing(channel)),
        }
    }

    fn disable(&mut self, channel: u8) -> Result<(), DriverError> {
        let mut channels = self.channels.lock().map_err(|_| DriverError::LockPoisoned)?;

        match channels.get_mut(channel as usize) {
            Some(c) => {
                *c = None;
                Ok(())
            }
            None => Err(DriverError::ChannelMissing(channel)),
        }
    }
}

impl SimDrive {
    pub fn new(params: SimDriveParams, odometry: Arc<Odometry>) -> Self {
        Self {
            base: Arc::new(Mutex::new(DrivePlant {
                params,
                ..Default::default()
            })),
            odometry,
        }
    }

    /// Driver of the linear axis.
    pub fn linear(&self) -> SimDriveAxis {
        SimDriveAxis {
            base: self.base.clone(),
            angular: false,
        }
    }

    /// Driver of the angular axis.
    pub fn angular(&self) -> SimDriveAxis {
        SimDriveAxis {
            base: self.base.clone(),
            angular: true,
        }
    }

    /// Integrate one period and report the encoder pulses to the odometry.
    pub fn tick(&self) {
        let mm_per_pulse = self.odometry.params().mm_per_pulse;
        let (left_pulses, right_pulses) = {
            let mut base = self.base.lock().unwrap_or_else(PoisonError::into_inner);

            let max_speed = base.params.max_wheel_speed_mm;
            let response = base.params.response;
            let left_demand = (base.linear_duty - base.angular_duty) * max_speed;
            let right_demand = (base.linear_duty + base.angular_duty) * max_speed;

            base.left_speed += response * (left_demand - base.left_speed);
            base.right_speed += response * (right_demand - base.right_speed);

            let left = base.left_remainder + base.left_speed / mm_per_pulse;
            let right = base.right_remainder + base.right_speed / mm_per_pulse;
            base.left_remainder = left.fract();
            base.right_remainder = right.fract();

            (left.trunc() as i32, right.trunc() as i32)
        };

        self.odometry.update_from_encoders(left_pulses, right_pulses);
    }

    pub fn odometry(&self) -> &Arc<Odometry> {
        &self.odometry
    }
}

impl MotorDriver for SimDriveAxis {
    fn set(&mut self, duty_cycle: f64, direction: Direction) -> Result<(), DriverError> {
        let duty = check_duty_cycle(duty_cycle)? * direction.sign();
        let mut base = self.base.lock().map_err(|_| DriverError::LockPoisoned)?;

        if self.angular {
            base.angular_duty = duty;
        } else {
            base.linear_duty = duty;
        }

        Ok(())
    }

    fn enable(&mut self) -> Result<(), DriverError> {
        Ok(())
    }

    fn brake(&mut self) -> Result<(), DriverError> {
        self.set(0.0, Direction::Forward)
    }
}
