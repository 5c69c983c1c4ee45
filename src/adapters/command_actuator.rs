//! Actuator that shells out to an external program.
//!
//! The setting is substituted for every `{setting}` placeholder in the
//! arguments. Exit status 0 means the setting was changed; the configured
//! "unchanged" status means it was already in place.

use crate::domain::decision::Setting;
use crate::domain::error::PriceGateError;
use crate::ports::actuator::{Actuator, ApplyOutcome};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{info, warn};

const PLACEHOLDER: &str = "{setting}";
const POLL_INTERVAL: Duration = Duration::from_millis(100);

pub struct CommandActuator {
    program: String,
    args: Vec<String>,
    timeout: Duration,
    unchanged_exit_code: i32,
}

impl CommandActuator {
    pub fn new(
        program: impl Into<String>,
        args: Vec<String>,
        timeout: Duration,
        unchanged_exit_code: i32,
    ) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
            unchanged_exit_code,
        }
    }

    fn render_args(&self, setting: &Setting) -> Vec<String> {
        let rendered = setting.to_string();
        self.args
            .iter()
            .map(|a| a.replace(PLACEHOLDER, &rendered))
            .collect()
    }
}

impl Actuator for CommandActuator {
    fn apply(&self, setting: &Setting) -> Result<ApplyOutcome, PriceGateError> {
        let args = self.render_args(setting);
        info!(program = %self.program, ?args, "running actuator");

        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .spawn()
            .map_err(|e| PriceGateError::Actuator {
                reason: format!("cannot start {}: {e}", self.program),
            })?;

        let started = Instant::now();
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if started.elapsed() > self.timeout => {
                    warn!(program = %self.program, "actuator timed out, killing");
                    reap(&mut child);
                    return Err(PriceGateError::Actuator {
                        reason: format!(
                            "{} did not finish within {}s",
                            self.program,
                            self.timeout.as_secs_f64()
                        ),
                    });
                }
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(e) => {
                    reap(&mut child);
                    return Err(PriceGateError::Actuator {
                        reason: format!("cannot wait for {}: {e}", self.program),
                    });
                }
            }
        };

        match status.code() {
            Some(0) => Ok(ApplyOutcome::Changed),
            Some(code) if code == self.unchanged_exit_code => Ok(ApplyOutcome::AlreadyApplied),
            Some(code) => Err(PriceGateError::Actuator {
                reason: format!("{} exited with status {code}", self.program),
            }),
            None => Err(PriceGateError::Actuator {
                reason: format!("{} was terminated by a signal", self.program),
            }),
        }
    }
}

/// Kills `child` and collects its exit status.
fn reap(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str, timeout: Duration) -> CommandActuator {
        CommandActuator::new(
            "sh",
            vec!["-c".into(), script.into(), "{setting}".into()],
            timeout,
            3,
        )
    }

    #[test]
    fn exit_zero_is_changed() {
        let actuator = sh("exit 0", Duration::from_secs(5));
        assert_eq!(
            actuator.apply(&Setting::NoLimit).unwrap(),
            ApplyOutcome::Changed
        );
    }

    #[test]
    fn unchanged_code_is_already_applied() {
        let actuator = sh("exit 3", Duration::from_secs(5));
        assert_eq!(
            actuator.apply(&Setting::Limit(5.0)).unwrap(),
            ApplyOutcome::AlreadyApplied
        );
    }

    #[test]
    fn other_codes_fail() {
        let actuator = sh("exit 1", Duration::from_secs(5));
        let err = actuator.apply(&Setting::Limit(5.0)).unwrap_err();
        assert!(matches!(err, PriceGateError::Actuator { reason } if reason.contains("status 1")));
    }

    #[test]
    fn setting_is_substituted() {
        // $0 is the first argument after the script
        let actuator = sh("test \"$0\" = 5.000", Duration::from_secs(5));
        assert_eq!(
            actuator.apply(&Setting::Limit(5.0)).unwrap(),
            ApplyOutcome::Changed
        );
        assert!(actuator.apply(&Setting::NoLimit).is_err());
    }

    #[test]
    fn slow_command_times_out() {
        let actuator = sh("sleep 5", Duration::from_millis(200));
        let err = actuator.apply(&Setting::NoLimit).unwrap_err();
        assert!(matches!(err, PriceGateError::Actuator { reason } if reason.contains("did not finish")));
    }

    #[test]
    fn missing_program_fails() {
        let actuator = CommandActuator::new(
            "/nonexistent/pricegate-actuator",
            vec![],
            Duration::from_secs(1),
            3,
        );
        assert!(matches!(
            actuator.apply(&Setting::NoLimit),
            Err(PriceGateError::Actuator { .. })
        ));
    }

    #[test]
    fn reap_leaves_no_running_child() {
        let mut child = Command::new("sleep").arg("30").spawn().unwrap();
        reap(&mut child);
        let status = child.try_wait().unwrap().expect("child should be collected");
        assert!(!status.success());
    }
}
