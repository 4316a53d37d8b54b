//! Tasks of the standard test run
//!
//! | Task | Resumable | Writes |
//! |------|-----------|--------|
//! | [`ClassifyModulesTask`] | yes | `classification` |
//! | [`CreateBootstrapTask`] | no | `bootstrap`, `runner_settings`, `controller` |
//! | [`PlayerRunTask`] | yes | `build_options` |
//! | [`CleanupTask`] | no | - |

mod bootstrap;
mod classify;
mod cleanup;
mod player;

pub use bootstrap::CreateBootstrapTask;
pub use classify::ClassifyModulesTask;
pub use cleanup::CleanupTask;
pub use player::{PlayerRunTask, DEFAULT_PRODUCT_NAME};
