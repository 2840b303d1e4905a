use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;

use settled::exec::{forced, CommandOutcome, CommandRunner, ForceSignal, Invocation};

/// How the fake reacts to every invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behaviour {
    Succeed,
    /// Exit with the given non-zero code.
    Fail(i32),
    /// Never finish on its own; only a forced drain ends it.
    Hang,
    /// Succeed after sleeping.
    SucceedAfter(Duration),
}

/// One recorded invocation.
#[derive(Debug, Clone)]
pub struct RecordedRun {
    pub invocation: Invocation,
    pub started: Instant,
    /// Bytes of the file named by the first argument, read when the run
    /// started (if it existed).
    pub input: Option<Vec<u8>>,
}

#[derive(Debug)]
struct State {
    behaviour: Behaviour,
    runs: Vec<RecordedRun>,
}

/// A fake `CommandRunner` that:
/// - records every invocation with its start time and input bytes
/// - answers with a scripted outcome instead of spawning a process.
#[derive(Debug, Clone)]
pub struct FakeRunner {
    state: Arc<Mutex<State>>,
}

impl FakeRunner {
    pub fn new(behaviour: Behaviour) -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                behaviour,
                runs: Vec::new(),
            })),
        }
    }

    pub fn succeeding() -> Self {
        Self::new(Behaviour::Succeed)
    }

    pub fn runs(&self) -> Vec<RecordedRun> {
        self.state.lock().unwrap().runs.clone()
    }

    pub fn run_count(&self) -> usize {
        self.state.lock().unwrap().runs.len()
    }
}

impl CommandRunner for FakeRunner {
    fn run(
        &self,
        invocation: Invocation,
        mut force: ForceSignal,
    ) -> Pin<Box<dyn Future<Output = CommandOutcome> + Send + '_>> {
        let input = invocation
            .args
            .first()
            .and_then(|arg| std::fs::read(Path::new(arg)).ok());

        let behaviour = {
            let mut state = self.state.lock().unwrap();
            state.runs.push(RecordedRun {
                invocation,
                started: Instant::now(),
                input,
            });
            state.behaviour
        };

        Box::pin(async move {
            match behaviour {
                Behaviour::Succeed => CommandOutcome::Success,
                Behaviour::Fail(code) => CommandOutcome::Failed(code),
                Behaviour::Hang => {
                    forced(&mut force).await;
                    CommandOutcome::Cancelled
                }
                Behaviour::SucceedAfter(delay) => {
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => CommandOutcome::Success,
                        _ = forced(&mut force) => CommandOutcome::Cancelled,
                    }
                }
            }
        })
    }
}
