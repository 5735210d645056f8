// Game automation module
// Drives one update run: recognise the screen, wait for the next expected
// screen with a bounded poller, press the button that moves the game along.

pub mod fsm;
pub mod match_image;
pub mod poller;
pub mod types;


// Re-export the main types and functions for easy access
pub use fsm::{RunController, RunOutcome, RunReport, plan_stages, required_states};
pub use match_image::{Classification, ScreenClassifier, TemplateLibrary};
pub use poller::{Clock, Poller, StopHandle, StopSignal, TokioClock, stop_channel};
pub use types::{RunStage, ScreenState, TapTarget};
