use chrono::Utc;
use tracing::{info_span, Span};

/// Per-run diagnostic context.
///
/// Every log line emitted while a run is driven carries the run id and the
/// persona through this span, so concurrent runs in one process stay
/// distinguishable without any process-wide state.
#[derive(Debug, Clone)]
pub struct RunContext {
    run_id: String,
    span: Span,
}

impl RunContext {
    pub fn new(run_id: impl Into<String>, persona: &str) -> Self {
        let run_id = run_id.into();
        let span = info_span!("simulation_run", run_id = %run_id, persona = %persona);
        Self { run_id, span }
    }

    /// Context with a fresh id of the form `sim_<utc timestamp>_<persona slug>`.
    pub fn generate(persona: &str) -> Self {
        let slug: String = persona
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_lowercase()
                } else {
                    '_'
                }
            })
            .collect();
        let slug = slug.trim_matches('_');
        let slug = if slug.is_empty() { "agent" } else { slug };
        let stamp = Utc::now().format("%Y%m%dT%H%M%S%.6f");
        Self::new(format!("sim_{stamp}_{slug}"), persona)
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn span(&self) -> &Span {
        &self.span
    }
}

impl Default for RunContext {
    fn default() -> Self {
        Self::generate("agent")
    }
}
