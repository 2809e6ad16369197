//! Termination channel for errors with no safe default

use sdswap_common::SwapError;
use std::io::{self, Write};
use tracing::error;

/// Receives fatal errors (empty registry, missing codec) before they are returned.
///
/// The production implementation ends the process; embedders and tests can record
/// the error instead and let it propagate as a normal `Err`.
pub trait FatalExit {
    fn terminate(&self, err: &SwapError);
}

/// Reports the error on stderr and exits with its exit code.
///
/// The report is written directly as well as logged, so the searched locations reach
/// the user even when no subscriber is installed.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessExit;

impl ProcessExit {
    /// Write the fatal report to `out`.
    pub fn report(err: &SwapError, out: &mut impl Write) -> io::Result<()> {
        writeln!(out, "{}", fatal_message(err))
    }
}

impl FatalExit for ProcessExit {
    fn terminate(&self, err: &SwapError) {
        error!("{}", fatal_message(err));
        let _ = Self::report(err, &mut io::stderr().lock());
        std::process::exit(err.exit_code());
    }
}

fn fatal_message(err: &SwapError) -> String {
    format!("Fatal: {err}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdswap_common::ModelError;

    #[test]
    fn report_lists_searched_locations() {
        let err = SwapError::from(ModelError::NoCheckpoints {
            searched: vec!["file /m/model.ckpt".to_string(), "directory /m".to_string()],
        });
        let mut out = Vec::new();
        ProcessExit::report(&err, &mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "Fatal: Model error: No checkpoints found. Searched: file /m/model.ckpt, directory /m\n"
        );
    }
}
