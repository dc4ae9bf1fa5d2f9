use crate::conditions::TrialList;
use crate::config::{nanos, ExperimentConfig};
use crate::dots::{generate_dots, random_mask};
use crate::error::ExperimentError;
use crate::results::ResultSink;
use crate::trial::{ActiveTrial, TrialDurations};
use numag_core::{
    judge, ExperimentPhase, FeedbackKind, Key, ParticipantInfo, Scene, Side, TrialRecord,
    TrialState,
};
use numag_timing::Timer;
use rand::Rng;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    PhaseChanged(ExperimentPhase),
    /// Cue for the fixation tone
    FixationStarted { order: usize },
    StimulusShown { order: usize },
    StimulusHidden { order: usize },
    TrialRecorded { order: usize, feedback: FeedbackKind },
    Aborted,
}

/// Drives a session from instructions to farewell.
///
/// Time only moves through `update` and the timestamps handed to
/// `handle_input_at`; deadlines chain from scheduled times, so the sequence
/// is the same however coarsely it is polled.
pub struct TrialSequencer<T, R, S>
where
    T: Timer,
    R: Rng,
    S: ResultSink,
{
    pub timer: T,
    pub rng: R,
    config: ExperimentConfig,
    durations: TrialDurations,
    participant: ParticipantInfo,
    trials: TrialList,
    sink: S,
    phase: ExperimentPhase,
    phase_start: u64,
    position: usize,
    current: Option<ActiveTrial>,
    records: Vec<TrialRecord>,
}

impl<T, R, S> TrialSequencer<T, R, S>
where
    T: Timer,
    R: Rng,
    S: ResultSink,
{
    pub fn new(
        config: ExperimentConfig,
        participant: ParticipantInfo,
        trials: TrialList,
        timer: T,
        rng: R,
        sink: S,
    ) -> Self {
        let phase_start = timer.now();
        Self {
            durations: TrialDurations::from(&config.timing),
            timer,
            rng,
            config,
            participant,
            trials,
            sink,
            phase: ExperimentPhase::default(),
            phase_start,
            position: 0,
            current: None,
            records: Vec::new(),
        }
    }

    pub fn update(&mut self) -> Result<Vec<SessionEvent>, ExperimentError> {
        let now = self.timer.now();
        let mut events = Vec::new();
        self.advance(now, &mut events)?;
        Ok(events)
    }

    pub fn handle_input(&mut self, key: Key) -> Result<Vec<SessionEvent>, ExperimentError> {
        let at = self.timer.now();
        self.handle_input_at(key, at)
    }

    /// Handles a key received at timer reading `at`. Deadlines that passed
    /// before `at` are applied first.
    pub fn handle_input_at(
        &mut self,
        key: Key,
        at: u64,
    ) -> Result<Vec<SessionEvent>, ExperimentError> {
        let mut events = Vec::new();
        if self.phase.is_terminal() {
            return Ok(events);
        }
        if key == Key::Abort {
            self.abort(&mut events);
            return Ok(events);
        }

        self.advance(at, &mut events)?;
        match self.phase {
            ExperimentPhase::Instructions if key == Key::Continue => {
                self.enter_trials(at, &mut events)?;
            }
            ExperimentPhase::Trials => {
                if let Some(side) = key.side() {
                    self.record_response(side, at, &mut events)?;
                }
            }
            ExperimentPhase::Farewell => {
                self.set_phase(ExperimentPhase::Finished, at, &mut events);
            }
            _ => {}
        }
        Ok(events)
    }

    /// Stamps stimulus onset with the time the first dot frame reached the
    /// screen.
    pub fn frame_presented(&mut self, at: u64) {
        if let Some(trial) = self.current.as_mut() {
            if trial.state == TrialState::StimulusVisible {
                trial.timestamps.onset = Some(at);
                trial.state = TrialState::AwaitingResponseWhileVisible;
            }
        }
    }

    pub fn scene(&self) -> Scene<'_> {
        self.scene_at(self.timer.now())
    }

    pub fn scene_at(&self, now: u64) -> Scene<'_> {
        let d = &self.durations;
        match self.phase {
            ExperimentPhase::Instructions => Scene::Instructions,
            ExperimentPhase::Farewell => Scene::Farewell,
            ExperimentPhase::Finished | ExperimentPhase::Aborted => Scene::Blank,
            ExperimentPhase::Trials => {
                let Some(trial) = &self.current else {
                    return Scene::Blank;
                };
                match trial.state {
                    TrialState::Fixation => {
                        if now < trial.timestamps.fixation_start + d.fixation {
                            Scene::Fixation
                        } else {
                            Scene::Blank
                        }
                    }
                    state if state.shows_dots() => Scene::Dots(&trial.dots),
                    TrialState::Feedback => match (trial.feedback, trial.timestamps.feedback_start)
                    {
                        (Some(kind), Some(start)) if now < start + d.feedback => {
                            Scene::Feedback(kind)
                        }
                        _ => Scene::Blank,
                    },
                    TrialState::Mask => trial.mask.as_ref().map_or(Scene::Blank, Scene::Mask),
                    _ => Scene::Blank,
                }
            }
        }
    }

    fn advance(&mut self, now: u64, events: &mut Vec<SessionEvent>) -> Result<(), ExperimentError> {
        while self.step(now, events)? {}
        Ok(())
    }

    /// Applies at most one due transition. Returns whether one happened.
    fn step(&mut self, now: u64, events: &mut Vec<SessionEvent>) -> Result<bool, ExperimentError> {
        match self.phase {
            ExperimentPhase::Trials => self.step_trial(now, events),
            ExperimentPhase::Farewell => {
                let due = self.phase_start + nanos(self.config.timing.farewell_secs);
                if now < due {
                    return Ok(false);
                }
                self.set_phase(ExperimentPhase::Finished, due, events);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn step_trial(
        &mut self,
        now: u64,
        events: &mut Vec<SessionEvent>,
    ) -> Result<bool, ExperimentError> {
        let d = self.durations;
        let Some(trial) = self.current.as_mut() else {
            return Ok(false);
        };
        let order = trial.record.order;

        match trial.state {
            TrialState::Fixation => {
                let due = trial.timestamps.fixation_start + d.fixation + d.pre_stimulus_blank;
                if now < due {
                    return Ok(false);
                }
                let colors = (trial.record.l_color, trial.record.r_color);
                trial.dots = generate_dots(
                    trial.record.counts(),
                    colors,
                    &self.config.geometry,
                    &mut self.rng,
                )?;
                trial.state = TrialState::StimulusVisible;
                trial.timestamps.onset = Some(due);
                events.push(SessionEvent::StimulusShown { order });
                debug!("Trial {order}: stimulus due at {due} ns");
            }
            TrialState::StimulusVisible | TrialState::AwaitingResponseWhileVisible => {
                // Inclusive: a key exactly at the limit still counts as seen
                if trial.since_onset(now) <= d.dots_wait {
                    return Ok(false);
                }
                trial.state = TrialState::AwaitingResponseAfterHidden;
                events.push(SessionEvent::StimulusHidden { order });
                debug!("Trial {order}: stimulus hidden, still waiting");
            }
            TrialState::AwaitingResponseAfterHidden => {
                if trial.since_onset(now) <= d.max_wait {
                    return Ok(false);
                }
                let deadline = trial.timestamps.onset.unwrap_or(now) + d.max_wait;
                self.complete_response(None, deadline, events)?;
            }
            TrialState::Feedback => {
                let start = trial.timestamps.feedback_start.unwrap_or(now);
                let due = start + d.feedback + d.post_feedback_blank;
                if now < due {
                    return Ok(false);
                }
                trial.state = TrialState::Mask;
                trial.timestamps.mask_start = Some(due);
                trial.mask = Some(random_mask(self.config.mask_size, &mut self.rng));
            }
            TrialState::Mask => {
                let due = trial.timestamps.mask_start.unwrap_or(now) + d.mask;
                if now < due {
                    return Ok(false);
                }
                trial.state = TrialState::Done;
                self.next_trial(due, events)?;
            }
            TrialState::Done => return Ok(false),
        }
        Ok(true)
    }

    fn record_response(
        &mut self,
        side: Side,
        at: u64,
        events: &mut Vec<SessionEvent>,
    ) -> Result<(), ExperimentError> {
        let awaiting = self
            .current
            .as_ref()
            .is_some_and(|t| t.state.awaits_response());
        if awaiting {
            self.complete_response(Some(side), at, events)?;
        }
        Ok(())
    }

    /// Fills in the outcome, appends the record to the sink and starts
    /// feedback.
    fn complete_response(
        &mut self,
        response: Option<Side>,
        at: u64,
        events: &mut Vec<SessionEvent>,
    ) -> Result<(), ExperimentError> {
        let Some(trial) = self.current.as_mut() else {
            return Ok(());
        };

        let rt_ns = trial.since_onset(at);
        let record = &mut trial.record;
        let counts = record.counts();
        record.response = response;
        record.resp_time = response.map(|_| rt_ns as f64 / 1e9);
        record.correct = response.and_then(|side| judge(side, counts));

        let feedback = FeedbackKind::from_outcome(trial.record.correct, response.is_some());
        trial.feedback = Some(feedback);
        trial.state = TrialState::Feedback;
        trial.timestamps.feedback_start = Some(at);

        let record = trial.record.clone();
        if record.is_no_response() {
            info!("Trial {}: no response", record.order);
        } else {
            info!(
                "Trial {}: response {:?}, RT {:?} s, correct {:?}",
                record.order, record.response, record.resp_time, record.correct
            );
        }
        self.sink.append(&record)?;
        events.push(SessionEvent::TrialRecorded {
            order: record.order,
            feedback,
        });
        self.records.push(record);
        Ok(())
    }

    fn enter_trials(&mut self, at: u64, events: &mut Vec<SessionEvent>) -> Result<(), ExperimentError> {
        self.set_phase(ExperimentPhase::Trials, at, events);
        if self.trials.is_empty() {
            return self.finish_trials(at, events);
        }
        self.start_trial(0, at, events)
    }

    /// Resolves the stimulus parameters and starts the fixation cue. The dot
    /// layout waits for stimulus onset.
    fn start_trial(
        &mut self,
        position: usize,
        at: u64,
        events: &mut Vec<SessionEvent>,
    ) -> Result<(), ExperimentError> {
        let (index, counts, colors) = self.trials.resolve(position, &self.config, &mut self.rng)?;
        let record = TrialRecord::pending(position, index, &self.participant, counts, colors);

        info!(
            "Trial {}/{} (condition {index}): {} left, {} right",
            position + 1,
            self.trials.len(),
            counts.left,
            counts.right
        );
        self.position = position;
        self.current = Some(ActiveTrial::new(record, Vec::new(), at));
        events.push(SessionEvent::FixationStarted { order: position });
        Ok(())
    }

    fn next_trial(&mut self, at: u64, events: &mut Vec<SessionEvent>) -> Result<(), ExperimentError> {
        let next = self.position + 1;
        if next < self.trials.len() {
            self.start_trial(next, at, events)
        } else {
            self.current = None;
            self.finish_trials(at, events)
        }
    }

    fn finish_trials(&mut self, at: u64, events: &mut Vec<SessionEvent>) -> Result<(), ExperimentError> {
        self.sink.finish(&self.participant, &self.records)?;
        self.set_phase(ExperimentPhase::Farewell, at, events);
        Ok(())
    }

    fn set_phase(&mut self, phase: ExperimentPhase, at: u64, events: &mut Vec<SessionEvent>) {
        info!("Entering {:?} phase", phase);
        self.phase = phase;
        self.phase_start = at;
        events.push(SessionEvent::PhaseChanged(phase));
    }

    fn abort(&mut self, events: &mut Vec<SessionEvent>) {
        warn!(
            "Session aborted by participant after {} of {} trials",
            self.records.len(),
            self.trials.len()
        );
        self.phase = ExperimentPhase::Aborted;
        self.current = None;
        events.push(SessionEvent::Aborted);
    }

    pub fn phase(&self) -> ExperimentPhase {
        self.phase
    }

    pub fn current(&self) -> Option<&ActiveTrial> {
        self.current.as_ref()
    }

    pub fn current_trial_state(&self) -> Option<TrialState> {
        self.current.as_ref().map(|t| t.state)
    }

    pub fn records(&self) -> &[TrialRecord] {
        &self.records
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn participant(&self) -> &ParticipantInfo {
        &self.participant
    }

    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    /// `(current, total)`, 1-based, while trials run
    pub fn trial_progress(&self) -> Option<(usize, usize)> {
        self.phase
            .accepts_responses()
            .then(|| (self.position + 1, self.trials.len()))
    }
}
