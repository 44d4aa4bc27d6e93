use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum FusionError {
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Config or reference-table validation error.
    ConfigValidation(String),
    /// Missing required column in a source table.
    MissingColumn { table: String, column: String },
    /// Amount cell that is neither numeric nor a recognized zero marker.
    AmountParse { table: String, line: u64, value: String },
    /// Year cell that is not an integer.
    YearParse { table: String, line: u64, value: String },
    /// IO error (file read, CSV decode).
    Io(String),
    /// Fused total outside the reconciliation tolerance for a year.
    Reconciliation {
        year: i32,
        fused_cents: i64,
        source_cents: i64,
        deviation_pct: f64,
        tolerance_pct: f64,
    },
    /// Configured years absent from the fused output.
    Coverage { missing: Vec<i32> },
    /// Implausible totals or broken invariants for a year.
    Sanity { year: i32, reason: String },
    /// More than one fused expense row for an (entity, year) key.
    DuplicateKey { entity: String, year: i32 },
}

impl fmt::Display for FusionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "config validation error: {msg}"),
            Self::MissingColumn { table, column } => {
                write!(f, "table '{table}': missing column '{column}'")
            }
            Self::AmountParse { table, line, value } => {
                write!(f, "table '{table}', line {line}: cannot parse amount '{value}'")
            }
            Self::YearParse { table, line, value } => {
                write!(f, "table '{table}', line {line}: cannot parse year '{value}'")
            }
            Self::Io(msg) => write!(f, "IO error: {msg}"),
            Self::Reconciliation {
                year,
                fused_cents,
                source_cents,
                deviation_pct,
                tolerance_pct,
            } => write!(
                f,
                "{year}: fused total {} differs from reported {} by {deviation_pct:.2}% (tolerance {tolerance_pct:.2}%)",
                format_cents(*fused_cents),
                format_cents(*source_cents),
            ),
            Self::Coverage { missing } => {
                let years: Vec<String> = missing.iter().map(|y| y.to_string()).collect();
                write!(f, "missing years: {}", years.join(", "))
            }
            Self::Sanity { year, reason } => write!(f, "{year}: {reason}"),
            Self::DuplicateKey { entity, year } => {
                write!(f, "{year}: duplicate fused row for entity '{entity}'")
            }
        }
    }
}

impl std::error::Error for FusionError {}

/// Render minor units as a major-unit figure with two decimals.
pub fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{sign}{}.{:02}", abs / 100, abs % 100)
}
