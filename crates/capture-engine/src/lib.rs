//! Demoreel Capture Engine
//!
//! Drives one recording pass of a scripted scenario:
//! - **Driver:** the narrow browser-automation contract with a no-op
//!   implementation (dry-run, tests) and a subprocess bridge implementation
//! - **Clock:** the virtual frame clock that is the single source of truth
//!   for source time
//! - **Capture:** the cooperative screenshot loop with frame dedup and
//!   pipelined disk writes
//! - **Stage:** the instrumentation API exposed to scenarios
//! - **Scenario:** the scenario contract plus declarative JSON scripts

pub mod bridge;
pub mod capture;
pub mod clock;
pub mod driver;
pub mod scenario;
pub mod stage;

pub use capture::{CaptureConfig, CaptureHandle, CaptureStats};
pub use clock::VirtualClock;
pub use driver::{BrowserDriver, LaunchOptions, NullDriver, SharedDriver};
pub use scenario::{Scenario, ScriptScenario};
pub use stage::{
    ActionOptions, QueuedNarration, SceneOptions, Stage, StageMode, TransitionOptions,
};
