// Module exports for CLI subcommands
//
// Each module handles one subcommand. main.rs dispatches to these handlers and
// stays focused on argument parsing.

pub mod init;
pub mod routes;
