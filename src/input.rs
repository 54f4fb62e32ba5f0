use nalgebra::Vector2;

/// Identity token for one human controller device.
///
/// Identities are stable across frames; a player stays bound to the same
/// source for its whole life.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct InputSourceId(pub usize);

/// Per-frame input snapshot sampled from one controller.
#[derive(Debug, Clone, Default)]
pub struct ControlInput {
    /// Movement stick deflection. Each axis is in the -1 to 1 range.
    pub movement: Vector2<f32>,
}

/// Enumerates currently connected human input sources.
///
/// The simulation loop refreshes this once per tick; it reports new
/// identities but never mutates existing bindings.
pub trait ControllerRegistry {
    /// True when a controller attached since the last call.
    fn has_new_controllers(&mut self) -> bool;

    /// All currently connected sources, in attachment order.
    fn input_sources(&self) -> &[InputSourceId];

    /// Samples the current input state of one source.
    fn sample(&self, source: InputSourceId) -> ControlInput;
}

impl<T> ControllerRegistry for Box<T>
where
    T: ControllerRegistry + ?Sized,
{
    fn has_new_controllers(&mut self) -> bool {
        self.as_mut().has_new_controllers()
    }

    fn input_sources(&self) -> &[InputSourceId] {
        self.as_ref().input_sources()
    }

    fn sample(&self, source: InputSourceId) -> ControlInput {
        self.as_ref().sample(source)
    }
}

/// A fixed set of idle virtual controllers, used by the headless binary and
/// in tests.
pub struct StaticControllerRegistry {
    sources: Vec<InputSourceId>,
    announced: bool,
}

impl StaticControllerRegistry {
    pub fn new(count: usize) -> Self {
        Self {
            sources: (0..count).map(InputSourceId).collect(),
            announced: false,
        }
    }

    /// Attaches one more virtual controller.
    pub fn attach(&mut self) -> InputSourceId {
        let source = InputSourceId(self.sources.len());
        self.sources.push(source);
        self.announced = false;
        source
    }
}

impl ControllerRegistry for StaticControllerRegistry {
    fn has_new_controllers(&mut self) -> bool {
        let new = !self.announced && !self.sources.is_empty();
        self.announced = true;
        new
    }

    fn input_sources(&self) -> &[InputSourceId] {
        &self.sources
    }

    fn sample(&self, _source: InputSourceId) -> ControlInput {
        ControlInput::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_registry_reports_attachments_once() {
        let mut registry = StaticControllerRegistry::new(2);
        assert_eq!(registry.input_sources().len(), 2);
        assert!(registry.has_new_controllers());
        assert!(!registry.has_new_controllers());

        let source = registry.attach();
        assert_eq!(source, InputSourceId(2));
        assert!(registry.has_new_controllers());
        assert!(!registry.has_new_controllers());
    }

    #[test]
    fn empty_registry_never_reports_new_controllers() {
        let mut registry = StaticControllerRegistry::new(0);
        assert!(!registry.has_new_controllers());
    }
}
