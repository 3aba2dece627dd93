use std::path::PathBuf;
use std::time::Duration;

use controller_core::RestartPolicy;
use controller_core::config::DEFAULT_DWELL;
use controller_core::network::Endpoint;
use controller_core::network::probe::TRANSFER_BUDGET;

pub const USAGE: &str = "Usage: power-bench-emulator [--cycles <n>] [--cursor <path>] \
[--download <ip:port>] [--upload <ip:port>] [--restart-policy <hold|wrap>] \
[--dwell-ms <ms>] [--budget <bytes>] [--transcript <path>] [--resume]";

const DEFAULT_CURSOR_PATH: &str = "target/power-bench/cursor.bin";
const DEFAULT_TRANSCRIPT_PATH: &str = "target/power-bench/emulator.log";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EmulatorOptions {
    /// Number of passes through `Reset` before exiting; zero runs forever.
    pub cycles: u32,
    pub cursor_path: PathBuf,
    /// `None` starts a loopback character generator.
    pub download: Option<Endpoint>,
    /// `None` starts a loopback discard sink.
    pub upload: Option<Endpoint>,
    pub restart_policy: RestartPolicy,
    pub dwell: Duration,
    pub budget: usize,
    pub transcript_path: PathBuf,
    /// Continue from the cursor file instead of powering on fresh.
    pub resume: bool,
}

impl Default for EmulatorOptions {
    fn default() -> Self {
        Self {
            cycles: 1,
            cursor_path: PathBuf::from(DEFAULT_CURSOR_PATH),
            download: None,
            upload: None,
            restart_policy: RestartPolicy::default(),
            dwell: DEFAULT_DWELL,
            budget: TRANSFER_BUDGET,
            transcript_path: PathBuf::from(DEFAULT_TRANSCRIPT_PATH),
            resume: false,
        }
    }
}

impl EmulatorOptions {
    pub fn runs_forever(&self) -> bool {
        self.cycles == 0
    }
}

pub fn parse_args<I>(args: I) -> Result<EmulatorOptions, String>
where
    I: IntoIterator<Item = String>,
{
    let mut options = EmulatorOptions::default();
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        let (flag, inline) = match arg.split_once('=') {
            Some((flag, value)) => (flag.to_string(), Some(value.to_string())),
            None => (arg, None),
        };
        let mut value = || {
            inline
                .clone()
                .or_else(|| args.next())
                .ok_or_else(|| format!("Expected value after {flag}"))
        };

        match flag.as_str() {
            "--resume" if inline.is_none() => options.resume = true,
            "--cycles" => options.cycles = parse_number(&flag, &value()?)?,
            "--cursor" => options.cursor_path = PathBuf::from(value()?),
            "--download" => options.download = Some(parse_endpoint(&flag, &value()?)?),
            "--upload" => options.upload = Some(parse_endpoint(&flag, &value()?)?),
            "--restart-policy" => {
                options.restart_policy = value()?
                    .parse::<RestartPolicy>()
                    .map_err(|err| format!("{flag}: {err}"))?;
            }
            "--dwell-ms" => options.dwell = Duration::from_millis(parse_number(&flag, &value()?)?),
            "--budget" => options.budget = parse_number(&flag, &value()?)?,
            "--transcript" => options.transcript_path = PathBuf::from(value()?),
            other => return Err(format!("Unknown argument `{other}`")),
        }
    }

    Ok(options)
}

fn parse_number<T: std::str::FromStr>(flag: &str, value: &str) -> Result<T, String> {
    value
        .parse()
        .map_err(|_| format!("{flag}: expected a number, got `{value}`"))
}

fn parse_endpoint(flag: &str, value: &str) -> Result<Endpoint, String> {
    value.parse().map_err(|err| format!("{flag}: {err}"))
}
