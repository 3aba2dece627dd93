use std::io::{self, ErrorKind};
use std::rc::Rc;
use std::thread;
use std::time::Instant;

use controller_core::network::{Endpoint, WifiCredentials};
use controller_core::telemetry::BenchEvent;
use controller_core::transition::{Halt, PowerControl};
use controller_core::{BenchConfig, Board, PowerController, Step};
use embassy_futures::block_on;

use crate::host::{
    ConsoleTrigger, HostClock, HostPower, SIMULATED_ASSOCIATION, SimulatedLink, TcpTransport,
};
use crate::options::EmulatorOptions;
use crate::peers::{spawn_chargen, spawn_discard};
use crate::retained::{FileCursor, Launch, open_cursor};
use crate::transcript::{SharedTranscript, Transcript, TranscriptRole, TranscriptSink};

const EMULATOR_SSID: &str = "power-bench-emulator";
const EMULATOR_PASSWORD: &str = "emulated";

pub type HostBoard = Board<HostClock, ConsoleTrigger, SimulatedLink, TcpTransport, HostPower>;

pub struct Session {
    options: EmulatorOptions,
    transcript: SharedTranscript,
    started_at: Instant,
}

impl Session {
    pub fn new(options: EmulatorOptions) -> io::Result<Self> {
        let started_at = Instant::now();
        let transcript = Transcript::open(&options.transcript_path, started_at)?.shared();
        Ok(Self {
            options,
            transcript,
            started_at,
        })
    }

    pub fn run(&mut self) -> io::Result<()> {
        let config = self.config()?;
        let launch = Launch::detect(self.options.resume);
        let mut cursor = open_cursor(&self.options.cursor_path, launch)?;
        let mut sink = TranscriptSink::new(Rc::clone(&self.transcript));
        let board = self.board();

        self.note(&format!(
            "{launch:?} launch, cursor {} ({} restart policy), download {}, upload {}",
            cursor.cell().path().display(),
            config.restart_policy,
            config.download_peer,
            config.upload_peer,
        ));

        if self.options.runs_forever() {
            let mut controller = PowerController::new(config, cursor, board);
            controller.boot(&mut sink);
            loop {
                if let Step::Halt(halt) = block_on(controller.step(&mut sink)) {
                    controller.board_mut().power.enter(halt);
                }
            }
        }

        self.run_cycles(config, &mut cursor, board, &mut sink)?;
        self.summarize(&sink);
        self.transcript.borrow_mut().flush()
    }

    fn config(&self) -> io::Result<BenchConfig<'static>> {
        let download = match self.options.download {
            Some(endpoint) => endpoint,
            None => self.start_peer("chargen", spawn_chargen)?,
        };
        let upload = match self.options.upload {
            Some(endpoint) => endpoint,
            None => self.start_peer("discard", spawn_discard)?,
        };

        let config = BenchConfig::new(WifiCredentials::new(EMULATOR_SSID, EMULATOR_PASSWORD))
            .with_dwell(self.options.dwell)
            .with_transfer_budget(self.options.budget)
            .with_download_peer(download)
            .with_upload_peer(upload)
            .with_restart_policy(self.options.restart_policy);
        config
            .validate()
            .map_err(|err| io::Error::new(ErrorKind::InvalidInput, err.to_string()))?;
        Ok(config)
    }

    fn start_peer(&self, name: &str, spawn: fn() -> io::Result<Endpoint>) -> io::Result<Endpoint> {
        let endpoint = spawn()?;
        self.note(&format!("loopback {name} peer listening on {endpoint}"));
        Ok(endpoint)
    }

    fn board(&self) -> HostBoard {
        Board::new(
            HostClock::new(self.started_at),
            ConsoleTrigger::new(Rc::clone(&self.transcript)),
            SimulatedLink::new(Rc::clone(&self.transcript), SIMULATED_ASSOCIATION),
            TcpTransport::new(),
            HostPower::new(Rc::clone(&self.transcript)),
        )
    }

    /// Runs boots back to back until `cycles` restarts have happened.
    ///
    /// Deep sleep and restart drop the controller and rebuild it from the
    /// cursor file, the same way a real boot would.
    fn run_cycles(
        &self,
        config: BenchConfig<'_>,
        cursor: &mut FileCursor,
        mut board: HostBoard,
        sink: &mut TranscriptSink,
    ) -> io::Result<()> {
        let mut completed = 0;
        let mut boots = 0u32;

        while completed < self.options.cycles {
            let mut controller = PowerController::new(config, &mut *cursor, board);
            controller.boot(sink);
            let halt = loop {
                if let Step::Halt(halt) = block_on(controller.step(sink)) {
                    break halt;
                }
            };
            board = controller.into_parts().1;
            boots += 1;

            match halt {
                Halt::DeepSleep(wake) => {
                    self.note(&format!("simulated deep sleep, {wake}"));
                    thread::sleep(wake.duration());
                }
                Halt::Restart => {
                    completed += 1;
                    self.note(&format!("simulated restart ({completed}/{})", self.options.cycles));
                }
            }

            if let Some(err) = cursor.cell_mut().take_error() {
                return Err(err);
            }
            if let Some(err) = self.transcript.borrow_mut().take_error() {
                return Err(err);
            }
        }

        self.note(&format!("{completed} cycle(s) over {boots} boot(s)"));
        Ok(())
    }

    fn summarize(&self, sink: &TranscriptSink) {
        for event in sink.history().events() {
            if let BenchEvent::ProbeFinished(report) = event {
                self.note(&format!(
                    "{} summary: {} bytes in {} ms, {}",
                    report.kind,
                    report.transferred,
                    report.elapsed_ms,
                    report.throughput()
                ));
            }
        }
    }

    fn note(&self, line: &str) {
        self.transcript.borrow_mut().note(TranscriptRole::Host, line);
    }
}
