//! Sandbox execution on a dedicated thread. The interpreter polls the
//! deadline and cancel token itself; the channel timeout here is a backstop
//! in case the sandbox thread wedges entirely.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use scene_script::interp::{ExecError, ExecFailure, ExecLimits};
use scene_script::{Program, SandboxOutput, SceneBounds, execute};

use crate::GenerateError;

/// Extra slack past the deadline before the backstop fires.
const RECV_GRACE: Duration = Duration::from_secs(2);

pub(crate) fn run_sandbox(
    program: Program,
    seed: u32,
    scene_bounds: SceneBounds,
    timeout: Duration,
    cancel: Arc<AtomicBool>,
) -> Result<SandboxOutput, GenerateError> {
    let (tx, rx) = mpsc::channel();
    let limits = ExecLimits {
        deadline: Some(Instant::now() + timeout),
        cancel: Some(Arc::clone(&cancel)),
    };

    thread::Builder::new()
        .name("scene-sandbox".to_string())
        .spawn(move || {
            let result = execute(&program, seed, scene_bounds, limits);
            // The receiver may be gone after a backstop timeout.
            let _ = tx.send(result);
        })
        .map_err(|err| GenerateError::Runtime {
            message: format!("failed to spawn sandbox thread: {err}"),
            line: None,
            vertices_so_far: 0,
        })?;

    match rx.recv_timeout(timeout + RECV_GRACE) {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(failure)) => Err(map_failure(failure, timeout)),
        Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
            // Ask the wedged sandbox to stop as soon as it next ticks.
            cancel.store(true, std::sync::atomic::Ordering::Relaxed);
            Err(GenerateError::Timeout(timeout))
        }
    }
}

fn map_failure(failure: ExecFailure, timeout: Duration) -> GenerateError {
    match failure.error {
        ExecError::Runtime { message, line } => GenerateError::Runtime {
            message,
            // No prologue is injected around user code, so interpreter lines
            // are already user-relative.
            line: Some(line),
            vertices_so_far: failure.vertices_so_far,
        },
        ExecError::Timeout => GenerateError::Timeout(timeout),
        ExecError::Cancelled => GenerateError::Cancelled,
    }
}
