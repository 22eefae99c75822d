use tracing::info;

use adscope_domain::services::EventGenerator;

use crate::{AppError, AppState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerateSummary {
    pub rows: usize,
    pub injected: usize,
}

/// Draws the synthetic event table and persists it through the event repository.
pub fn generate_events(state: &AppState) -> Result<GenerateSummary, AppError> {
    let mut generator = EventGenerator::new(state.generator.clone())?;
    let events = generator.generate()?;
    let injected = events.iter().filter(|e| e.is_injected()).count();
    info!(
        rows = events.len(),
        injected,
        seed = state.generator.seed,
        days = state.generator.days,
        "generated events"
    );

    state.event_repo.save_events(&events)?;
    state.metrics.record_generated(events.len(), injected);
    state.metrics.record_file_written();

    Ok(GenerateSummary {
        rows: events.len(),
        injected,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{memory_state, small_generator};

    #[test]
    fn persists_generated_events() {
        let (state, events, _) = memory_state(small_generator(1_000));
        let summary = generate_events(&state).unwrap();
        assert_eq!((summary.rows, summary.injected), (1_000, 10));

        let saved = events.snapshot();
        assert_eq!(saved.len(), 1_000);
        let injected = saved.iter().filter(|e| e.is_injected()).count();
        assert_eq!(injected, 10);
        assert_eq!(state.metrics.files_written(), 1);
    }

    #[test]
    fn invalid_config_writes_nothing() {
        let mut config = small_generator(100);
        config.campaign_id_max = config.campaign_id_min;
        let (state, events, _) = memory_state(config);
        assert!(matches!(generate_events(&state), Err(AppError::InvalidConfig(_))));
        assert!(events.snapshot().is_empty());
    }
}
