//! # Control pipeline
//!
//! A pipeline is an ordered chain of stages. It is seeded with the position
//! error of the axis, each stage's output is the next stage's input and the
//! output of the last stage is the actuation command.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::trace;
use serde::{Deserialize, Serialize};

// Internal
use super::{
    AntiBlockingFilter, AntiBlockingParams, DecelerationFilter, DecelerationParams, Feedback,
    PidParams, PidStage, PoseReachedFilter, PoseReachedParams, RateShapingFilter,
    RateShapingParams, StageStatus,
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Ordered stage parameters, from which a pipeline is built.
pub type PipelineParams = Vec<StageParams>;

/// An ordered chain of control stages.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

/// Result of one pass through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PipelineOutput {
    /// Output of the last stage
    pub command: f64,

    /// Most severe status raised by any stage during the pass
    pub status: StageStatus,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// A single stage of a pipeline.
#[derive(Debug, Clone)]
pub enum Stage {
    Pid(PidStage),
    AntiBlocking(AntiBlockingFilter),
    RateShaping(RateShapingFilter),
    PoseReached(PoseReachedFilter),
    Deceleration(DecelerationFilter),
}

/// Parameters of a single stage, tagged by stage kind.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "kind")]
pub enum StageParams {
    Pid(PidParams),
    AntiBlocking(AntiBlockingParams),
    RateShaping(RateShapingParams),
    PoseReached(PoseReachedParams),
    Deceleration(DecelerationParams),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Stage {
    /// Compute the output of the stage. `position_error` is the seed of the
    /// pipeline pass, read by the stages which need the remaining distance.
    pub fn compute(&mut self, input: f64, position_error: f64, measured: &Feedback) -> f64 {
        match self {
            Stage::Pid(s) => s.compute(input, measured),
            Stage::AntiBlocking(s) => s.compute(input, measured),
            Stage::RateShaping(s) => s.compute(input),
            Stage::PoseReached(s) => s.compute(input),
            Stage::Deceleration(s) => s.compute(input, position_error, measured),
        }
    }

    pub fn reset(&mut self) {
        match self {
            Stage::Pid(s) => s.reset(),
            Stage::AntiBlocking(s) => s.reset(),
            Stage::RateShaping(s) => s.reset(),
            Stage::PoseReached(s) => s.reset(),
            Stage::Deceleration(s) => s.reset(),
        }
    }

    pub fn status(&self) -> StageStatus {
        match self {
            Stage::AntiBlocking(s) => s.status(),
            Stage::PoseReached(s) => s.status(),
            Stage::Pid(_) | Stage::RateShaping(_) | Stage::Deceleration(_) => StageStatus::Moving,
        }
    }
}

impl From<&StageParams> for Stage {
    fn from(params: &StageParams) -> Self {
        match params {
            StageParams::Pid(p) => Stage::Pid(PidStage::new(*p)),
            StageParams::AntiBlocking(p) => Stage::AntiBlocking(AntiBlockingFilter::new(*p)),
            StageParams::RateShaping(p) => Stage::RateShaping(RateShapingFilter::new(*p)),
            StageParams::PoseReached(p) => Stage::PoseReached(PoseReachedFilter::new(*p)),
            StageParams::Deceleration(p) => Stage::Deceleration(DecelerationFilter::new(*p)),
        }
    }
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a pipeline with one stage per parameter block, in order.
    pub fn from_params(params: &[StageParams]) -> Self {
        Self {
            stages: params.iter().map(Stage::from).collect(),
        }
    }

    /// Append a stage at the end of the chain.
    pub fn add_stage(&mut self, stage: Stage) -> &mut Self {
        self.stages.push(stage);
        self
    }

    /// Run one pass of the chain, seeded with `target - measured.position`.
    pub fn compute(&mut self, target: f64, measured: &Feedback) -> PipelineOutput {
        let position_error = target - measured.position;
        let mut value = position_error;
        let mut status = StageStatus::Moving;

        for stage in self.stages.iter_mut() {
            value = stage.compute(value, position_error, measured);
            status = status.max(stage.status());
        }

        trace!(
            "Pipeline: target {:.3}, measured {:.3}/{:.3}, output {:.3} ({:?})",
            target,
            measured.position,
            measured.speed,
            value,
            status
        );

        PipelineOutput {
            command: value,
            status,
        }
    }

    /// Reset the state of every stage.
    pub fn reset(&mut self) {
        self.stages.iter_mut().for_each(Stage::reset);
    }

    /// Forward a speed ratio to every rate shaping stage.
    pub fn set_speed_ratio(&mut self, ratio: f64) {
        for stage in self.stages.iter_mut() {
            if let Stage::RateShaping(s) = stage {
                s.set_speed_ratio(ratio);
            }
        }
    }

    /// Bypass every anti-blocking stage until cleared.
    pub fn set_bypass_anti_blocking(&mut self, bypass: bool) {
        for stage in self.stages.iter_mut() {
            if let Stage::AntiBlocking(s) = stage {
                s.set_bypass(bypass);
            }
        }
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ctrl::PidInput;

    const CASCADE: &str = r#"
        [[stages]]
        kind = "PoseReached"
        threshold = 1.0

        [[stages]]
        kind = "Pid"
        kp = 0.5
        ki = 0.0
        kd = 0.0

        [[stages]]
        kind = "RateShaping"
        max_acceleration = 1.0
        max_speed = 10.0

        [[stages]]
        kind = "AntiBlocking"
        speed_threshold = 0.2
        error_threshold = 0.5
        blocked_cycles_threshold = 2

        [[stages]]
        kind = "Pid"
        kp = 4.0
        ki = 0.0
        kd = 0.0
        input = "SpeedOrder"
    "#;

    #[derive(Deserialize)]
    struct Cascade {
        stages: PipelineParams,
    }

    fn cascade() -> Pipeline {
        let params: Cascade = util::params::from_str(CASCADE).unwrap();
        Pipeline::from_params(&params.stages)
    }

    #[test]
    fn test_from_params() {
        let pipeline = cascade();

        assert_eq!(pipeline.len(), 5);
        assert!(matches!(pipeline.stages()[0], Stage::PoseReached(_)));
        match &pipeline.stages()[4] {
            Stage::Pid(s) => assert_eq!(s.pid().params().input, PidInput::SpeedOrder),
            s => panic!("Expected a PID stage, found {:?}", s),
        }
    }

    #[test]
    fn test_output_chaining() {
        let mut pipeline = Pipeline::new();
        pipeline
            .add_stage(Stage::Pid(PidStage::new(PidParams::new(2.0, 0.0, 0.0))))
            .add_stage(Stage::RateShaping(RateShapingFilter::new(RateShapingParams {
                max_acceleration: 3.0,
                max_speed: 100.0,
                min_speed: 0.0,
            })));

        let measured = Feedback {
            position: 5.0,
            speed: 0.0,
        };

        // error 10, pid 20, ramp limited to 3
        let out = pipeline.compute(15.0, &measured);
        assert_eq!(out.command, 3.0);
        assert_eq!(out.status, StageStatus::Moving);

        assert_eq!(pipeline.compute(15.0, &measured).command, 6.0);

        pipeline.reset();
        assert_eq!(pipeline.compute(15.0, &measured).command, 3.0);
    }

    #[test]
    fn test_reached_and_blocked() {
        let mut pipeline = cascade();

        let at_target = Feedback {
            position: 99.5,
            speed: 0.0,
        };
        let out = pipeline.compute(100.0, &at_target);
        assert_eq!(out.status, StageStatus::Reached);
        assert_eq!(out.command, 0.0);

        // Far from target with no motion trips the stall detection
        pipeline.reset();
        let jammed = Feedback {
            position: 0.0,
            speed: 0.0,
        };
        let statuses: Vec<StageStatus> =
            (0..6).map(|_| pipeline.compute(100.0, &jammed).status).collect();
        assert_eq!(statuses[0], StageStatus::Moving);
        assert_eq!(statuses[5], StageStatus::Blocked);

        pipeline.set_bypass_anti_blocking(true);
        pipeline.reset();
        for _ in 0..20 {
            assert_eq!(pipeline.compute(100.0, &jammed).status, StageStatus::Moving);
        }
    }

    #[test]
    fn test_deceleration_stage() {
        let params: Cascade = util::params::from_str(
            r#"
            [[stages]]
            kind = "Pid"
            kp = 10.0
            ki = 0.0
            kd = 0.0

            [[stages]]
            kind = "Deceleration"
            deceleration = 0.5
            "#,
        )
        .unwrap();
        let mut pipeline = Pipeline::from_params(&params.stages);
        assert!(matches!(pipeline.stages()[1], Stage::Deceleration(_)));

        // Far from the target the order passes through
        let far = Feedback {
            position: 0.0,
            speed: 2.0,
        };
        assert_eq!(pipeline.compute(100.0, &far).command, 1000.0);

        // Within the braking distance it is capped to sqrt(2 * 0.5 * 1)
        let near = Feedback {
            position: 99.0,
            speed: 2.0,
        };
        assert_eq!(pipeline.compute(100.0, &near).command, 1.0);
    }
}
