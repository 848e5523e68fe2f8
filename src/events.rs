/*!
Structured event sink that gets injected into every pipeline stage.
Stages never log through global state directly; they emit events tagged with the gene and stage so that concurrent genes stay attributable.
The default [`LogSink`] forwards everything to the `log` facade.
*/

use std::sync::Mutex;

use log::Level;

use crate::errors::Stage;

/// Receiver for per-gene pipeline events
pub trait EventSink: Send + Sync {
    /// Records a single event
    /// # Arguments
    /// * `level` - severity of the event
    /// * `gene_id` - the gene being processed when the event happened
    /// * `stage` - the pipeline stage that emitted the event
    /// * `message` - free form message
    fn event(&self, level: Level, gene_id: &str, stage: Stage, message: &str);
}

/// Forwards events to the `log` facade with a per-stage target, e.g. `alleleome::alignment`
#[derive(Clone, Copy, Debug, Default)]
pub struct LogSink;

impl EventSink for LogSink {
    fn event(&self, level: Level, gene_id: &str, stage: Stage, message: &str) {
        if level > log::max_level() {
            return;
        }
        let target = format!("alleleome::{}", stage.label());
        log::log!(target: target.as_str(), level, "[{gene_id}] {message}");
    }
}

/// A single captured event
#[derive(Clone, Debug, PartialEq)]
pub struct RecordedEvent {
    pub level: Level,
    pub gene_id: String,
    pub stage: Stage,
    pub message: String
}

/// Keeps every event in memory, mostly useful for tests that check attribution
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<RecordedEvent>>
}

impl RecordingSink {
    /// Returns a copy of all events recorded so far
    pub fn events(&self) -> Vec<RecordedEvent> {
        match self.events.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone()
        }
    }
}

impl EventSink for RecordingSink {
    fn event(&self, level: Level, gene_id: &str, stage: Stage, message: &str) {
        let event = RecordedEvent {
            level,
            gene_id: gene_id.to_string(),
            stage,
            message: message.to_string()
        };
        match self.events.lock() {
            Ok(mut guard) => guard.push(event),
            Err(poisoned) => poisoned.into_inner().push(event)
        }
    }
}

/// A sink bound to one gene and one stage; this is what each stage receives
#[derive(Clone, Copy)]
pub struct StageEvents<'a> {
    sink: &'a dyn EventSink,
    gene_id: &'a str,
    stage: Stage
}

impl<'a> StageEvents<'a> {
    /// Constructor
    pub fn new(sink: &'a dyn EventSink, gene_id: &'a str, stage: Stage) -> StageEvents<'a> {
        StageEvents {
            sink,
            gene_id,
            stage
        }
    }

    /// Re-binds the same sink and gene to a different stage
    pub fn with_stage(&self, stage: Stage) -> StageEvents<'a> {
        StageEvents {
            stage,
            ..*self
        }
    }

    pub fn trace(&self, message: &str) {
        self.emit(Level::Trace, message);
    }

    pub fn debug(&self, message: &str) {
        self.emit(Level::Debug, message);
    }

    pub fn info(&self, message: &str) {
        self.emit(Level::Info, message);
    }

    pub fn warn(&self, message: &str) {
        self.emit(Level::Warn, message);
    }

    pub fn error(&self, message: &str) {
        self.emit(Level::Error, message);
    }

    fn emit(&self, level: Level, message: &str) {
        self.sink.event(level, self.gene_id, self.stage, message);
    }

    // getters
    pub fn gene_id(&self) -> &'a str {
        self.gene_id
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }
}
