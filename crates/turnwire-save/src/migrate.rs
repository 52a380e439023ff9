//! Version-specific state migrations.
//!
//! A save written by the tolerated legacy engine version may need its
//! snapshot patched before the rest of the load proceeds. Steps are
//! registered against the exact version they patch and run in
//! registration order, right after the snapshot is read and before any
//! delegate record is touched.

use crate::{EngineVersion, GameState};

type MigrationFn = Box<dyn Fn(&mut GameState) + Send + Sync>;

struct Step {
    applies_to: EngineVersion,
    patch: MigrationFn,
}

/// Ordered set of version-keyed patch rules.
#[derive(Default)]
pub struct MigrationSet {
    steps: Vec<Step>,
}

impl MigrationSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a patch applied to saves written by exactly
    /// `applies_to`.
    pub fn register<F>(&mut self, applies_to: EngineVersion, patch: F)
    where
        F: Fn(&mut GameState) + Send + Sync + 'static,
    {
        self.steps.push(Step {
            applies_to,
            patch: Box::new(patch),
        });
    }

    /// Runs every step registered for `loaded_version`, in registration
    /// order. Returns how many steps ran.
    pub fn apply(&self, loaded_version: EngineVersion, state: &mut GameState) -> usize {
        let mut applied = 0;
        for step in &self.steps {
            if step.applies_to == loaded_version {
                (step.patch)(state);
                applied += 1;
            }
        }
        if applied > 0 {
            tracing::info!(
                from = %loaded_version,
                steps = applied,
                "applied save migrations"
            );
        }
        applied
    }
}

impl std::fmt::Debug for MigrationSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationSet")
            .field("steps", &self.steps.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_steps_apply_only_to_their_version() {
        let mut migrations = MigrationSet::new();
        migrations.register(EngineVersion::new(1, 9, 0), |state| {
            state
                .properties
                .insert("low_luck".into(), "false".into());
        });

        let mut state = GameState::new("g", "id-1");
        assert_eq!(migrations.apply(EngineVersion::new(2, 0, 0), &mut state), 0);
        assert!(state.properties.is_empty());

        assert_eq!(migrations.apply(EngineVersion::new(1, 9, 0), &mut state), 1);
        assert_eq!(state.properties.get("low_luck").unwrap(), "false");
    }

    #[test]
    fn test_steps_run_in_registration_order() {
        let mut migrations = MigrationSet::new();
        let v = EngineVersion::new(1, 9, 0);
        migrations.register(v, |state| {
            state.properties.insert("key".into(), "first".into());
        });
        migrations.register(v, |state| {
            state.properties.insert("key".into(), "second".into());
        });

        let mut state = GameState::new("g", "id-1");
        migrations.apply(v, &mut state);
        assert_eq!(state.properties.get("key").unwrap(), "second");
    }
}
