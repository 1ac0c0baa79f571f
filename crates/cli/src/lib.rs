// SheetPilot CLI library
//
// The binary is a thin shell over `pipeline`, which is also what the
// integration tests drive.

pub mod pipeline;
