//! Busy flags for the stages that hold the reader.

use serde::Serialize;

use crate::state_machine::Stage;

/// One busy flag per stage that talks to a connected reader.
///
/// A flag is true only while that stage's terminal call is outstanding.
/// Discovery has no flag: it runs in the background and is cancelled rather
/// than awaited.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StageFlags {
    pub connecting: bool,
    pub creating_intent: bool,
    pub collecting: bool,
    pub confirming: bool,
}

impl StageFlags {
    /// The stage currently holding the workflow, if any.
    ///
    /// # Examples
    ///
    /// ```
    /// use tapline_workflow::{Stage, StageFlags};
    ///
    /// let mut flags = StageFlags::default();
    /// assert_eq!(flags.active(), None);
    ///
    /// flags.set(Stage::Collect, true);
    /// assert_eq!(flags.active(), Some(Stage::Collect));
    /// ```
    pub fn active(&self) -> Option<Stage> {
        [
            (self.connecting, Stage::Connect),
            (self.creating_intent, Stage::CreateIntent),
            (self.collecting, Stage::Collect),
            (self.confirming, Stage::Confirm),
        ]
        .into_iter()
        .find_map(|(busy, stage)| busy.then_some(stage))
    }

    pub fn is_busy(&self) -> bool {
        self.active().is_some()
    }

    /// Whether `stage` is in flight. Always false for discovery.
    pub fn get(&self, stage: Stage) -> bool {
        match stage {
            Stage::Discovery => false,
            Stage::Connect => self.connecting,
            Stage::CreateIntent => self.creating_intent,
            Stage::Collect => self.collecting,
            Stage::Confirm => self.confirming,
        }
    }

    /// Set or clear the flag of `stage`. Discovery is ignored.
    pub fn set(&mut self, stage: Stage, busy: bool) {
        match stage {
            Stage::Discovery => {}
            Stage::Connect => self.connecting = busy,
            Stage::CreateIntent => self.creating_intent = busy,
            Stage::Collect => self.collecting = busy,
            Stage::Confirm => self.confirming = busy,
        }
    }
}
