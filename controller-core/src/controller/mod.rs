//! Resumable power-state controller.
//!
//! Each iteration fires the trigger pulse, loads the cursor, commits the
//! successor state and only then performs the state's work. Committing first
//! means a reset anywhere inside the work resumes at the successor, which is
//! what lets deep sleep and restart act as ordinary transitions.
//!
//! The iteration is split into [`PowerController::prepare`] and
//! [`PowerController::dispatch`] so hosts can inject a fault between the
//! commit and the work.

use crate::{
    clock::{Clock, elapsed_ms},
    config::BenchConfig,
    cursor::{CursorStore, ResumePoint},
    network::{
        Transport, WifiLink, associate,
        probe::{download, upload},
    },
    sequence::{PowerState, STATE_COUNT, SleepDepth, StateAction, StateStep},
    stress::run_stress,
    telemetry::{BenchEvent, TelemetrySink},
    transition::{Halt, PowerControl},
    trigger::{TriggerLine, pulse},
};

/// Hardware bindings the controller drives.
pub struct Board<C, T, L, N, P> {
    pub clock: C,
    pub trigger: T,
    pub link: L,
    pub transport: N,
    pub power: P,
}

impl<C, T, L, N, P> Board<C, T, L, N, P> {
    pub const fn new(clock: C, trigger: T, link: L, transport: N, power: P) -> Self {
        Self {
            clock,
            trigger,
            link,
            transport,
            power,
        }
    }
}

/// A state whose cursor update has been committed but whose work has not run.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Dispatch {
    pub step: StateStep,
    /// Value written to the cursor before the work starts.
    pub committed: PowerState,
}

impl Dispatch {
    pub const fn state(&self) -> PowerState {
        self.step.state
    }
}

/// Result of one iteration.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Step {
    /// The state returned; the loop continues in this boot.
    Continue(PowerState),
    /// The caller must hand this to [`PowerControl::enter`].
    Halt(Halt),
}

pub struct PowerController<'a, S, C, T, L, N, P> {
    config: BenchConfig<'a>,
    table: [StateStep; STATE_COUNT],
    cursor: S,
    board: Board<C, T, L, N, P>,
}

impl<'a, S, C, T, L, N, P> PowerController<'a, S, C, T, L, N, P>
where
    S: CursorStore,
    C: Clock,
    T: TriggerLine,
    L: WifiLink,
    N: Transport,
    P: PowerControl,
{
    pub fn new(config: BenchConfig<'a>, cursor: S, board: Board<C, T, L, N, P>) -> Self {
        Self {
            table: config.state_table(),
            config,
            cursor,
            board,
        }
    }

    pub const fn board(&self) -> &Board<C, T, L, N, P> {
        &self.board
    }

    pub fn board_mut(&mut self) -> &mut Board<C, T, L, N, P> {
        &mut self.board
    }

    /// Releases the cursor store and the board bindings.
    pub fn into_parts(self) -> (S, Board<C, T, L, N, P>) {
        (self.cursor, self.board)
    }

    /// Reports where this boot resumes.
    pub fn boot<K: TelemetrySink + ?Sized>(&mut self, telemetry: &mut K) -> ResumePoint {
        let resume = self.cursor.resume_point();
        telemetry.record(
            BenchEvent::Boot {
                resumed_at: resume.state,
                cold: resume.cold,
            },
            self.board.clock.now_ms(),
        );
        resume
    }

    /// Pulses the trigger and commits the successor of the current state.
    pub async fn prepare<K: TelemetrySink + ?Sized>(&mut self, telemetry: &mut K) -> Dispatch {
        pulse(
            &mut self.board.trigger,
            &mut self.board.clock,
            self.config.pulse_width,
        )
        .await;

        let state = self.cursor.load_cursor();
        let committed = self.config.restart_policy.committed_after(state);
        self.cursor.store_cursor(committed);

        telemetry.record(BenchEvent::StateEntered(state), self.board.clock.now_ms());

        Dispatch {
            step: self.table[state.as_index()],
            committed,
        }
    }

    /// Performs the work of a prepared state.
    pub async fn dispatch<K: TelemetrySink + ?Sized>(
        &mut self,
        dispatch: Dispatch,
        telemetry: &mut K,
    ) -> Step {
        let board = &mut self.board;
        let config = &self.config;

        match dispatch.step.action {
            StateAction::Dwell(duration) => board.clock.delay(duration).await,
            StateAction::Compute(duration) => {
                let report = run_stress(&board.clock, duration);
                telemetry.record(BenchEvent::ComputeFinished(report), board.clock.now_ms());
            }
            StateAction::Associate => {
                let outcome = associate(
                    &mut board.link,
                    &board.clock,
                    config.credentials,
                    config.association,
                )
                .await;
                let event = match outcome {
                    Ok(elapsed_ms) => BenchEvent::Associated { elapsed_ms },
                    Err(error) => BenchEvent::AssociationTimedOut(error),
                };
                telemetry.record(event, board.clock.now_ms());
            }
            StateAction::Download => {
                let report = download(
                    &mut board.transport,
                    &board.clock,
                    telemetry,
                    config.download_peer,
                    config.transfer_budget,
                )
                .await;
                telemetry.record(BenchEvent::ProbeFinished(report), board.clock.now_ms());
            }
            StateAction::Upload => {
                let report = upload(
                    &mut board.transport,
                    &board.clock,
                    telemetry,
                    config.upload_peer,
                    config.transfer_budget,
                )
                .await;
                telemetry.record(BenchEvent::ProbeFinished(report), board.clock.now_ms());
            }
            StateAction::Disassociate => {
                board.link.disconnect().await;
                telemetry.record(BenchEvent::Disassociated, board.clock.now_ms());
            }
            StateAction::Sleep {
                depth: SleepDepth::Light,
                wake,
            } => {
                let started = board.clock.now_ms();
                telemetry.record(BenchEvent::LightSleep(wake), started);
                telemetry.flush();
                board.power.light_sleep(wake).await;
                let now = board.clock.now_ms();
                telemetry.record(
                    BenchEvent::Woke {
                        slept_ms: elapsed_ms(started, now),
                    },
                    now,
                );
            }
            StateAction::Sleep {
                depth: SleepDepth::Deep,
                wake,
            } => return halt(board, telemetry, Halt::DeepSleep(wake)),
            StateAction::Restart => return halt(board, telemetry, Halt::Restart),
        }

        Step::Continue(dispatch.state())
    }

    /// One full iteration.
    pub async fn step<K: TelemetrySink + ?Sized>(&mut self, telemetry: &mut K) -> Step {
        let dispatch = self.prepare(telemetry).await;
        self.dispatch(dispatch, telemetry).await
    }

    /// Runs the benchmark until the device halts.
    pub async fn run<K: TelemetrySink + ?Sized>(mut self, telemetry: &mut K) -> ! {
        self.boot(telemetry);
        loop {
            if let Step::Halt(halt) = self.step(telemetry).await {
                self.board.power.enter(halt);
            }
        }
    }
}

fn halt<C, T, L, N, P, K>(board: &Board<C, T, L, N, P>, telemetry: &mut K, halt: Halt) -> Step
where
    C: Clock,
    K: TelemetrySink + ?Sized,
{
    telemetry.record(BenchEvent::Halting(halt), board.clock.now_ms());
    telemetry.flush();
    Step::Halt(halt)
}
