// doorkey-cli: command line surface for the doorkey engine.
//
// One state directory per device. `setup`, `unlock` and friends work on the
// local session; `serve` and `pull` pair a primary with a secondary device.

pub mod app;
pub mod cli;
pub mod commands;
pub mod error;
pub mod logging;
pub mod output;
pub mod peer;
pub mod settings;
