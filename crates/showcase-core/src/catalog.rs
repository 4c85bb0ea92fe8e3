//! The ordered stage catalog and its validation rules.

use std::collections::BTreeSet;

use showcase_types::{LayerId, SignalId, Stage, StageAction};

use crate::config::{FixtureConfig, ShowcaseConfig};

/// Terminal milestone at which the presentation completes.
pub const COMPLETE_MILESTONE: f64 = 100.0;

/// Reasons a stage list is rejected.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CatalogError {
    /// The list has no stages.
    #[error("stage catalog is empty")]
    Empty,

    /// The first stage must be entered at progress zero.
    #[error("first stage must have milestone 0, got {milestone}")]
    FirstMilestoneNotZero {
        /// The offending milestone.
        milestone: f64,
    },

    /// A milestone lies outside `0..=100` or is not a number.
    #[error("stage {index} has milestone {milestone} outside 0..=100")]
    MilestoneOutOfRange {
        /// Stage index.
        index: usize,
        /// The offending milestone.
        milestone: f64,
    },

    /// A milestone is lower than its predecessor's.
    #[error("stage {index} milestone {milestone} is below the previous stage's {previous}")]
    MilestoneDecreasing {
        /// Stage index.
        index: usize,
        /// The offending milestone.
        milestone: f64,
        /// The previous stage's milestone.
        previous: f64,
    },

    /// More than one non-overlay layer is visible in one stage.
    #[error("stage {index} shows {count} primary layers; at most one is allowed")]
    TooManyPrimaryLayers {
        /// Stage index.
        index: usize,
        /// Number of primary layers.
        count: usize,
    },

    /// Two stages share an id.
    #[error("duplicate stage id {id:?}")]
    DuplicateId {
        /// The repeated id.
        id: String,
    },
}

/// An immutable, validated, ordered list of stages.
#[derive(Debug, Clone, PartialEq)]
pub struct StageCatalog {
    stages: Vec<Stage>,
}

impl StageCatalog {
    /// Validate and wrap a stage list.
    ///
    /// # Errors
    ///
    /// Returns a [`CatalogError`] naming the first rule the list breaks.
    pub fn new(stages: Vec<Stage>) -> Result<Self, CatalogError> {
        if stages.is_empty() {
            return Err(CatalogError::Empty);
        }

        let mut ids = BTreeSet::new();
        let mut previous = 0.0_f64;
        for (index, stage) in stages.iter().enumerate() {
            if !(0.0..=COMPLETE_MILESTONE).contains(&stage.milestone) {
                return Err(CatalogError::MilestoneOutOfRange {
                    index,
                    milestone: stage.milestone,
                });
            }
            if index == 0 && stage.milestone > 0.0 {
                return Err(CatalogError::FirstMilestoneNotZero {
                    milestone: stage.milestone,
                });
            }
            if stage.milestone < previous {
                return Err(CatalogError::MilestoneDecreasing {
                    index,
                    milestone: stage.milestone,
                    previous,
                });
            }
            previous = stage.milestone;

            let count = stage
                .visible_layers
                .iter()
                .filter(|layer| !layer.is_overlay())
                .count();
            if count > 1 {
                return Err(CatalogError::TooManyPrimaryLayers { index, count });
            }

            if !ids.insert(stage.id.as_str()) {
                return Err(CatalogError::DuplicateId {
                    id: stage.id.clone(),
                });
            }
        }

        Ok(Self { stages })
    }

    /// Build the catalog from configuration: the `stages` override when
    /// present, otherwise the five default stages.
    ///
    /// # Errors
    ///
    /// Returns a [`CatalogError`] if the override is invalid.
    pub fn from_config(config: &ShowcaseConfig) -> Result<Self, CatalogError> {
        match &config.stages {
            Some(stages) => Self::new(stages.clone()),
            None => Self::new(default_stages(&config.fixtures)),
        }
    }

    /// Stage at `index`, if any.
    pub fn get(&self, index: usize) -> Option<&Stage> {
        self.stages.get(index)
    }

    /// Number of stages.
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Always false for a validated catalog.
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Index of the last stage.
    pub fn last_index(&self) -> usize {
        self.stages.len().saturating_sub(1)
    }

    /// Iterate stages in order.
    pub fn iter(&self) -> impl Iterator<Item = &Stage> {
        self.stages.iter()
    }
}

/// The five stages of the audience presentation.
pub fn default_stages(fixtures: &FixtureConfig) -> Vec<Stage> {
    vec![
        Stage {
            id: "database".to_owned(),
            label: "A vast consumer database".to_owned(),
            tech_label: "Powered by Predictive AI".to_owned(),
            description: "AI Audience starts from millions of consumer profiles and builds \
                          a vast database. Predictive AI anticipates what each person may need."
                .to_owned(),
            milestone: 0.0,
            visible_layers: BTreeSet::from([LayerId::Sphere]),
            action: StageAction::ShowDatabase {
                particle_count: fixtures.audience_particle_count,
                audience_target: fixtures.max_audience_count,
            },
            completion_gate: Some(SignalId::SphereComplete),
        },
        Stage {
            id: "knowledge_base".to_owned(),
            label: "Proposals and case studies enriched with RAG".to_owned(),
            tech_label: "RAG - Retrieval-Augmented Generation".to_owned(),
            description: "Past proposals, campaign wrap-ups and industry white papers feed \
                          the knowledge base, so AI Audience understands markets and clients."
                .to_owned(),
            milestone: 25.0,
            visible_layers: BTreeSet::from([LayerId::Cube]),
            action: StageAction::BuildKnowledgeBase {
                particle_count: fixtures.document_particle_count,
            },
            completion_gate: Some(SignalId::CubeComplete),
        },
        Stage {
            id: "data_fusion".to_owned(),
            label: "Client data integrated with TNL MG Tag".to_owned(),
            tech_label: "Data Fusion with TNL MG Tag".to_owned(),
            description: "The TNL MG Tag merges the client's first-party data into the \
                          database, bringing it closer to the client's needs."
                .to_owned(),
            milestone: 45.0,
            visible_layers: BTreeSet::from([LayerId::DataFusion]),
            action: StageAction::FuseClientData {
                particle_count: fixtures.client_particle_count,
                merge_ratio: fixtures.merge_ratio,
            },
            completion_gate: Some(SignalId::DataFusionComplete),
        },
        Stage {
            id: "matching".to_owned(),
            label: "Precise audience matching".to_owned(),
            tech_label: "AI Agent + Predictive AI".to_owned(),
            description: "With internal and external data combined, AI Audience quickly finds \
                          the most precise audience for any product."
                .to_owned(),
            milestone: 65.0,
            visible_layers: BTreeSet::from([LayerId::Matching]),
            action: StageAction::MatchAudience {
                particle_count: fixtures.audience_particle_count,
                match_ratio: fixtures.match_ratio,
            },
            completion_gate: Some(SignalId::MatchingComplete),
        },
        Stage {
            id: "report".to_owned(),
            label: "A complete audience analysis report".to_owned(),
            tech_label: "Generative AI".to_owned(),
            description: "Finally, AI Audience generates a full audience report covering \
                          gender, age, interests and purchase behaviour."
                .to_owned(),
            milestone: 80.0,
            visible_layers: BTreeSet::from([LayerId::Report]),
            action: StageAction::GenerateReport,
            completion_gate: Some(SignalId::ReportComplete),
        },
    ]
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn stages() -> Vec<Stage> {
        default_stages(&FixtureConfig::default())
    }

    #[test]
    fn default_catalog_is_valid() {
        let catalog = StageCatalog::new(stages()).unwrap();
        assert_eq!(catalog.len(), 5);
        assert_eq!(catalog.last_index(), 4);
        let milestones: Vec<f64> = catalog.iter().map(|s| s.milestone).collect();
        assert_eq!(milestones, vec![0.0, 25.0, 45.0, 65.0, 80.0]);
    }

    #[test]
    fn default_stages_gate_on_their_own_layer() {
        for stage in stages() {
            assert_eq!(stage.visible_layers.len(), 1);
            let layer = stage.visible_layers.iter().copied().next().unwrap();
            assert_eq!(stage.completion_gate, Some(layer.signal()));
        }
    }

    #[test]
    fn report_stage_shows_only_the_report() {
        let list = stages();
        let report = list.last().unwrap();
        assert_eq!(report.visible_layers, BTreeSet::from([LayerId::Report]));
        assert!(!report.visible_layers.contains(&LayerId::Matching));
    }

    #[test]
    fn rejects_empty() {
        assert_eq!(StageCatalog::new(Vec::new()), Err(CatalogError::Empty));
    }

    #[test]
    fn rejects_nonzero_first_milestone() {
        let mut list = stages();
        list[0].milestone = 5.0;
        assert!(matches!(
            StageCatalog::new(list),
            Err(CatalogError::FirstMilestoneNotZero { .. })
        ));
    }

    #[test]
    fn rejects_decreasing_milestones() {
        let mut list = stages();
        list[2].milestone = 10.0;
        assert!(matches!(
            StageCatalog::new(list),
            Err(CatalogError::MilestoneDecreasing { index: 2, .. })
        ));
    }

    #[test]
    fn rejects_milestone_above_complete() {
        let mut list = stages();
        list[4].milestone = 120.0;
        assert!(matches!(
            StageCatalog::new(list),
            Err(CatalogError::MilestoneOutOfRange { index: 4, .. })
        ));
    }

    #[test]
    fn rejects_two_primary_layers() {
        let mut list = stages();
        list[1].visible_layers.insert(LayerId::Sphere);
        assert!(matches!(
            StageCatalog::new(list),
            Err(CatalogError::TooManyPrimaryLayers { index: 1, count: 2 })
        ));
    }

    #[test]
    fn rejects_duplicate_ids() {
        let mut list = stages();
        list[3].id = "database".to_owned();
        assert!(matches!(
            StageCatalog::new(list),
            Err(CatalogError::DuplicateId { .. })
        ));
    }

    #[test]
    fn config_override_replaces_defaults() {
        let mut config = ShowcaseConfig::default();
        config.stages = Some(stages().into_iter().take(2).collect());
        let catalog = StageCatalog::from_config(&config).unwrap();
        assert_eq!(catalog.len(), 2);
    }
}
