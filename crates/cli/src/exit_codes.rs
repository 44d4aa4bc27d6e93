//! CLI Exit Code Registry
//!
//! Single source of truth for `lfuse` exit codes. Scripts rely on them.
//!
//! | Code | Meaning                                            |
//! |------|----------------------------------------------------|
//! | 0    | Success                                            |
//! | 1    | General error                                      |
//! | 2    | Usage error (bad arguments)                        |
//! | 3    | Invalid config or reference tables                 |
//! | 4    | Source could not be read or parsed                 |
//! | 5    | Reconciliation outside tolerance                   |
//! | 6    | Configured years missing from the output           |
//! | 7    | Sanity failure (floor, ceiling, invariants)        |
//! | 8    | Duplicate (entity, year) rows in expense output    |
//! | 9    | `--partial` run kept no year                       |

use ledgerfuse_fusion::FusionError;

pub const EXIT_SUCCESS: u8 = 0;

pub const EXIT_ERROR: u8 = 1;

/// Argument errors reported by clap; `main` maps them here.
pub const EXIT_USAGE: u8 = 2;

pub const EXIT_INVALID_CONFIG: u8 = 3;

/// Missing file, missing column, unparseable amount or year.
pub const EXIT_SOURCE: u8 = 4;

pub const EXIT_RECONCILIATION: u8 = 5;

pub const EXIT_COVERAGE: u8 = 6;

pub const EXIT_SANITY: u8 = 7;

pub const EXIT_DUPLICATE: u8 = 8;

pub const EXIT_NOTHING_ACCEPTED: u8 = 9;

pub fn fusion_exit_code(err: &FusionError) -> u8 {
    match err {
        FusionError::ConfigParse(_) | FusionError::ConfigValidation(_) => EXIT_INVALID_CONFIG,
        FusionError::MissingColumn { .. }
        | FusionError::AmountParse { .. }
        | FusionError::YearParse { .. }
        | FusionError::Io(_) => EXIT_SOURCE,
        FusionError::Reconciliation { .. } => EXIT_RECONCILIATION,
        FusionError::Coverage { .. } => EXIT_COVERAGE,
        FusionError::Sanity { .. } => EXIT_SANITY,
        FusionError::DuplicateKey { .. } => EXIT_DUPLICATE,
    }
}
