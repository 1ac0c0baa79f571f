//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract; scripts rely on them.
//!
//! # Exit Code Ranges
//!
//! | Range   | Domain           | Description                                  |
//! |---------|------------------|----------------------------------------------|
//! | 0       | Universal        | Success                                      |
//! | 1       | Universal        | General error (unspecified)                  |
//! | 2       | Universal        | CLI usage error (bad args, missing values)   |
//! | 3       | Input            | Source workbook unreadable or sheet missing  |
//! | 10-19   | ai               | AI provider/keychain codes                   |
//! | 60-69   | process          | Completed with degraded outcome              |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant in the appropriate range
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Wire it into the relevant command's error handling

// =============================================================================
// Universal (0-2)
// =============================================================================

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, empty instruction, missing column name.
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// Input (3)
// =============================================================================

/// Source file unreadable, unsupported format, or requested sheet missing.
pub const EXIT_INPUT: u8 = 3;

// =============================================================================
// AI (10-19)
// =============================================================================

/// AI disabled (provider=none). Informational, not a failure.
pub const EXIT_AI_DISABLED: u8 = 10;

/// AI provider configured but API key missing.
pub const EXIT_AI_MISSING_KEY: u8 = 11;

/// Settings file present but unreadable or invalid.
pub const EXIT_AI_CONFIG: u8 = 12;

// =============================================================================
// Process (60-69)
// =============================================================================
//
// The response is still printed; these flag runs that did not fully succeed.

/// Processing finished but produced no artifact (empty result or write failure).
pub const EXIT_PROCESS_NO_ARTIFACT: u8 = 60;

/// The model call failed; the response carries the failure text.
pub const EXIT_PROCESS_MODEL: u8 = 61;
