//! Ordered stage lists.

use crate::core::StageKind;
use crate::errors::{ContractErrorInfo, RecipeValidationError};
use crate::stages::{Emitter, Filter};
use std::fmt;

/// An emitter at an attachment point, and whether it has been detached for
/// the rest of the run.
#[derive(Debug)]
pub(crate) struct AttachedEmitter {
    pub(crate) emitter: Box<dyn Emitter>,
    pub(crate) detached: bool,
}

/// One position in the stage list.
#[derive(Debug)]
pub(crate) enum Slot {
    Filter(Box<dyn Filter>),
    /// Every emitter here sees each record, in attachment order.
    Emitters(Vec<AttachedEmitter>),
}

/// Description of one stage list position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageInfo {
    /// Index in the stage list.
    pub index: usize,
    /// Filter or emitter point.
    pub kind: StageKind,
    /// The filter name, or the emitter names in attachment order.
    pub names: Vec<String>,
}

/// A reusable, ordered list of filters and emitter attachment points.
///
/// Consecutive [`Chain::emitter`] calls attach to the same point; a filter
/// between them starts a new one.
///
/// ```
/// use sluice::pipeline::Chain;
/// use sluice::stages::{filters::FieldRemover, emitters::CollectingEmitter};
///
/// let chain = Chain::new()
///     .filter(FieldRemover::new(["password"]))
///     .emitter(CollectingEmitter::new("audit"))
///     .emitter(CollectingEmitter::new("warehouse"));
///
/// assert_eq!(chain.len(), 2);
/// assert_eq!(chain.emitter_count(), 2);
/// ```
#[derive(Default)]
pub struct Chain {
    pub(crate) slots: Vec<Slot>,
}

impl Chain {
    /// Creates an empty chain.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a filter.
    #[must_use]
    pub fn filter(self, filter: impl Filter + 'static) -> Self {
        self.boxed_filter(Box::new(filter))
    }

    /// Appends a boxed filter.
    #[must_use]
    pub fn boxed_filter(mut self, filter: Box<dyn Filter>) -> Self {
        self.slots.push(Slot::Filter(filter));
        self
    }

    /// Attaches an emitter, joining the previous attachment point if the
    /// last stage is one.
    #[must_use]
    pub fn emitter(self, emitter: impl Emitter + 'static) -> Self {
        self.boxed_emitter(Box::new(emitter))
    }

    /// Attaches a boxed emitter.
    #[must_use]
    pub fn boxed_emitter(mut self, emitter: Box<dyn Emitter>) -> Self {
        let attached = AttachedEmitter {
            emitter,
            detached: false,
        };
        match self.slots.last_mut() {
            Some(Slot::Emitters(point)) => point.push(attached),
            _ => self.slots.push(Slot::Emitters(vec![attached])),
        }
        self
    }

    /// Appends a new attachment point holding the given emitters.
    #[must_use]
    pub fn fan_out(mut self, emitters: Vec<Box<dyn Emitter>>) -> Self {
        self.slots.push(Slot::Emitters(
            emitters
                .into_iter()
                .map(|emitter| AttachedEmitter {
                    emitter,
                    detached: false,
                })
                .collect(),
        ));
        self
    }

    /// Splices another chain's stages onto the end of this one.
    #[must_use]
    pub fn include(mut self, other: Self) -> Self {
        self.slots.extend(other.slots);
        self
    }

    /// Attaches an emitter to an existing attachment point.
    ///
    /// # Errors
    ///
    /// Returns an error if `point` is out of range or names a filter.
    pub fn attach(&mut self, point: usize, emitter: impl Emitter + 'static) -> Result<(), RecipeValidationError> {
        let len = self.slots.len();
        match self.slots.get_mut(point) {
            Some(Slot::Emitters(emitters)) => {
                emitters.push(AttachedEmitter {
                    emitter: Box::new(emitter),
                    detached: false,
                });
                Ok(())
            }
            Some(Slot::Filter(filter)) => Err(RecipeValidationError::new(format!(
                "Stage {point} is the filter '{}', not an emitter point",
                filter.name()
            ))
            .with_error_info(
                ContractErrorInfo::new("RECIPE-NOT-EMITTER-POINT", "Emitters can only attach to emitter points")
                    .with_fix_hint("Attach to the index of an existing emitter point, or use Chain::fan_out to create one.")
                    .with_context_entry("stage_index", point.to_string()),
            )),
            None => Err(RecipeValidationError::new(format!(
                "Unknown stage {point}: chain has {len} stages"
            ))
            .with_error_info(
                ContractErrorInfo::new("RECIPE-UNKNOWN-STAGE", format!("No stage at index {point}"))
                    .with_context_entry("stage_index", point.to_string())
                    .with_context_entry("stage_count", len.to_string()),
            )),
        }
    }

    /// Returns the number of stage list positions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns true if the chain has no stages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Returns the total number of attached emitters.
    #[must_use]
    pub fn emitter_count(&self) -> usize {
        self.slots
            .iter()
            .map(|slot| match slot {
                Slot::Filter(_) => 0,
                Slot::Emitters(emitters) => emitters.len(),
            })
            .sum()
    }

    /// Describes every position in the chain.
    #[must_use]
    pub fn describe(&self) -> Vec<StageInfo> {
        self.slots
            .iter()
            .enumerate()
            .map(|(index, slot)| match slot {
                Slot::Filter(filter) => StageInfo {
                    index,
                    kind: StageKind::Filter,
                    names: vec![filter.name().to_string()],
                },
                Slot::Emitters(emitters) => StageInfo {
                    index,
                    kind: StageKind::Emitter,
                    names: emitters.iter().map(|a| a.emitter.name().to_string()).collect(),
                },
            })
            .collect()
    }

    /// Fails on any attachment point without emitters.
    pub(crate) fn check_fan_out_points(&self) -> Result<(), RecipeValidationError> {
        for (index, slot) in self.slots.iter().enumerate() {
            if matches!(slot, Slot::Emitters(emitters) if emitters.is_empty()) {
                return Err(RecipeValidationError::new(format!(
                    "Emitter point at stage {index} has no emitters"
                ))
                .with_error_info(
                    ContractErrorInfo::new("RECIPE-EMPTY-FANOUT", "Empty fan-out point")
                        .with_fix_hint("Pass at least one emitter to Chain::fan_out.")
                        .with_context_entry("stage_index", index.to_string()),
                ));
            }
        }
        Ok(())
    }

    /// Clears per-run state on every stage and reattaches detached emitters.
    pub(crate) fn reset(&mut self) {
        for slot in &mut self.slots {
            match slot {
                Slot::Filter(filter) => filter.reset(),
                Slot::Emitters(emitters) => {
                    for attached in emitters {
                        attached.detached = false;
                        attached.emitter.reset();
                    }
                }
            }
        }
    }

    /// Finalizes attached emitters in order, skipping detached ones.
    pub(crate) fn finalize(&mut self, failures: &mut Vec<(String, String)>) {
        for slot in &mut self.slots {
            let Slot::Emitters(emitters) = slot else {
                continue;
            };
            for attached in emitters.iter_mut().filter(|a| !a.detached) {
                if let Err(err) = attached.emitter.finalize() {
                    tracing::warn!(emitter = attached.emitter.name(), error = %err, "Emitter finalize failed");
                    failures.push((attached.emitter.name().to_string(), err.message));
                }
            }
        }
    }
}

impl fmt::Debug for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.describe()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::emitters::CollectingEmitter;
    use crate::stages::{FnFilter, NoOpFilter};
    use pretty_assertions::assert_eq;

    fn sample() -> Chain {
        Chain::new()
            .filter(NoOpFilter::new("a"))
            .emitter(CollectingEmitter::new("x"))
            .emitter(CollectingEmitter::new("y"))
            .filter(NoOpFilter::new("b"))
            .emitter(CollectingEmitter::new("z"))
    }

    #[test]
    fn test_consecutive_emitters_share_a_point() {
        let kinds: Vec<(StageKind, Vec<String>)> =
            sample().describe().into_iter().map(|s| (s.kind, s.names)).collect();
        assert_eq!(
            kinds,
            vec![
                (StageKind::Filter, vec!["a".to_string()]),
                (StageKind::Emitter, vec!["x".to_string(), "y".to_string()]),
                (StageKind::Filter, vec!["b".to_string()]),
                (StageKind::Emitter, vec!["z".to_string()]),
            ]
        );
    }

    #[test]
    fn test_fan_out_creates_new_point() {
        let chain = Chain::new()
            .emitter(CollectingEmitter::new("x"))
            .fan_out(vec![Box::new(CollectingEmitter::new("y")), Box::new(CollectingEmitter::new("z"))]);
        assert_eq!(chain.len(), 2);
        assert_eq!(chain.emitter_count(), 3);
    }

    #[test]
    fn test_attach() {
        let mut chain = sample();
        chain.attach(3, CollectingEmitter::new("late")).unwrap();
        assert_eq!(chain.describe()[3].names, vec!["z", "late"]);

        let err = chain.attach(0, CollectingEmitter::new("nope")).unwrap_err();
        assert_eq!(err.code(), Some("RECIPE-NOT-EMITTER-POINT"));

        let err = chain.attach(9, CollectingEmitter::new("nope")).unwrap_err();
        assert_eq!(err.code(), Some("RECIPE-UNKNOWN-STAGE"));
    }

    #[test]
    fn test_include_preserves_order() {
        let head = Chain::new().filter(FnFilter::retain("keep", |_| true));
        let chain = head.include(sample());
        let names: Vec<String> = chain.describe().into_iter().flat_map(|s| s.names).collect();
        assert_eq!(names, vec!["keep", "a", "x", "y", "b", "z"]);
    }

    #[test]
    fn test_empty_fan_out_rejected() {
        let chain = Chain::new().fan_out(Vec::new());
        let err = chain.check_fan_out_points().unwrap_err();
        assert_eq!(err.code(), Some("RECIPE-EMPTY-FANOUT"));
        assert!(sample().check_fan_out_points().is_ok());
    }
}
