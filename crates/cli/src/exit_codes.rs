//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract; scripts rely on them.
//!
//! # Exit Code Ranges
//!
//! | Range   | Domain    | Description                                  |
//! |---------|-----------|----------------------------------------------|
//! | 0       | Universal | Success                                      |
//! | 1       | Universal | General error (unspecified)                  |
//! | 2       | Universal | CLI usage error (bad args, missing path)     |
//! | 3-9     | run       | Configuration, input and artifact failures   |
//! | 10-19   | oracle    | Oracle credentials and client setup          |

use concord_io::IoError;
use concord_recon::ReconError;

// =============================================================================
// Universal (0-2)
// =============================================================================

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, missing required options.
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// Run (3-9)
// =============================================================================

/// Invalid config, or inputs that cannot be reconciled (no text column,
/// no merge keys, nothing to expand with). Always raised before any oracle call.
pub const EXIT_CONFIG: u8 = 3;

/// Input file missing, unreadable, or of an unsupported type.
pub const EXIT_INPUT: u8 = 4;

/// An artifact or rendered table could not be written.
pub const EXIT_WRITE: u8 = 5;

// =============================================================================
// Oracle (10-19)
// =============================================================================

/// No API key from `--api-key`, `OPENAI_API_KEY` or `CONCORD_OPENAI_KEY`.
pub const EXIT_ORACLE_MISSING_KEY: u8 = 10;

/// HTTP client could not be constructed.
pub const EXIT_ORACLE_SETUP: u8 = 11;

/// Every engine error is a configuration error.
pub fn recon_exit_code(_err: &ReconError) -> u8 {
    EXIT_CONFIG
}

pub fn io_exit_code(err: &IoError) -> u8 {
    match err {
        IoError::Write { .. } => EXIT_WRITE,
        _ => EXIT_INPUT,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_distinct() {
        let codes = [
            EXIT_SUCCESS,
            EXIT_ERROR,
            EXIT_USAGE,
            EXIT_CONFIG,
            EXIT_INPUT,
            EXIT_WRITE,
            EXIT_ORACLE_MISSING_KEY,
            EXIT_ORACLE_SETUP,
        ];
        let mut sorted = codes.to_vec();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), codes.len());
    }

    #[test]
    fn io_errors_split_read_and_write() {
        let write = IoError::Write {
            path: "out.csv".into(),
            source: std::io::Error::other("disk full"),
        };
        let open = IoError::Open {
            path: "raw.xlsx".into(),
            message: "not found".into(),
        };
        assert_eq!(io_exit_code(&write), EXIT_WRITE);
        assert_eq!(io_exit_code(&open), EXIT_INPUT);
    }
}
