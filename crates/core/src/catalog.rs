use std::collections::HashSet;

use thiserror::Error;

use crate::domain::actor::Actor;
use crate::domain::group::{ApprovalGroup, GroupId, SUSTAINABILITY_GROUP_ID};

/// Immutable catalog of approval groups, injected into the workflow engine.
///
/// Construction validates the invariants the rest of the engine relies on,
/// so lookups of the sustainability group never fail at call sites.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupCatalog {
    groups: Vec<ApprovalGroup>,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("duplicate group id `{0}` in catalog")]
    DuplicateGroupId(GroupId),
    #[error("catalog is missing the required `{SUSTAINABILITY_GROUP_ID}` group")]
    MissingSustainabilityGroup,
    #[error("group `{0}` may not use sequence index 0; it is reserved for `{SUSTAINABILITY_GROUP_ID}`")]
    ReservedSequenceIndex(GroupId),
    #[error("the `{SUSTAINABILITY_GROUP_ID}` group must use sequence index 0, found {0}")]
    SustainabilityNotFirst(u32),
    #[error("the `{SUSTAINABILITY_GROUP_ID}` group may not carry a conditional service")]
    SustainabilityConditional,
    #[error("the `{SUSTAINABILITY_GROUP_ID}` group must keep plan-upload permission")]
    SustainabilityCannotUpload,
}

impl GroupCatalog {
    pub fn new(mut groups: Vec<ApprovalGroup>) -> Result<Self, CatalogError> {
        let mut seen = HashSet::new();
        for group in &groups {
            if !seen.insert(group.id.clone()) {
                return Err(CatalogError::DuplicateGroupId(group.id.clone()));
            }
        }

        let sustainability = groups
            .iter()
            .find(|group| group.id.is_sustainability())
            .ok_or(CatalogError::MissingSustainabilityGroup)?;
        if sustainability.sequence_index != 0 {
            return Err(CatalogError::SustainabilityNotFirst(sustainability.sequence_index));
        }
        if sustainability.conditional_service.is_some() {
            return Err(CatalogError::SustainabilityConditional);
        }
        if !sustainability.can_upload_plans {
            return Err(CatalogError::SustainabilityCannotUpload);
        }

        if let Some(clash) = groups
            .iter()
            .find(|group| !group.id.is_sustainability() && group.sequence_index == 0)
        {
            return Err(CatalogError::ReservedSequenceIndex(clash.id.clone()));
        }

        groups.sort_by(|left, right| {
            left.sequence_index.cmp(&right.sequence_index).then_with(|| left.id.cmp(&right.id))
        });

        Ok(Self { groups })
    }

    /// The convention center's default group set.
    pub fn builtin() -> Self {
        let groups = vec![
            ApprovalGroup {
                id: GroupId::sustainability(),
                name: "Áreas y Sostenibilidad".to_string(),
                roles: vec!["sostenibilidad".to_string()],
                emails: vec!["sostenibilidad@centroconvenciones.example".to_string()],
                sequence_index: 0,
                conditional_service: None,
                can_upload_plans: true,
            },
            ApprovalGroup {
                id: GroupId("seguridad".to_string()),
                name: "Seguridad".to_string(),
                roles: vec!["seguridad".to_string()],
                emails: vec!["seguridad@centroconvenciones.example".to_string()],
                sequence_index: 1,
                conditional_service: Some("seguridad".to_string()),
                can_upload_plans: false,
            },
            ApprovalGroup {
                id: GroupId("montajes".to_string()),
                name: "Montajes".to_string(),
                roles: vec!["montajes".to_string()],
                emails: vec!["montajes@centroconvenciones.example".to_string()],
                sequence_index: 2,
                conditional_service: Some("montajes".to_string()),
                can_upload_plans: false,
            },
            ApprovalGroup {
                id: GroupId("audiovisuales".to_string()),
                name: "Audiovisuales".to_string(),
                roles: vec!["audiovisuales".to_string()],
                emails: vec!["audiovisuales@centroconvenciones.example".to_string()],
                sequence_index: 3,
                conditional_service: Some("audiovisuales".to_string()),
                can_upload_plans: false,
            },
            ApprovalGroup {
                id: GroupId("gastronomia".to_string()),
                name: "Gastronomía".to_string(),
                roles: vec!["gastronomia".to_string()],
                emails: vec!["gastronomia@centroconvenciones.example".to_string()],
                sequence_index: 4,
                conditional_service: Some("gastronomia".to_string()),
                can_upload_plans: false,
            },
        ];

        Self::new(groups).expect("builtin catalog satisfies its own invariants")
    }

    pub fn groups(&self) -> &[ApprovalGroup] {
        &self.groups
    }

    pub fn group(&self, id: &GroupId) -> Option<&ApprovalGroup> {
        self.groups.iter().find(|group| &group.id == id)
    }

    pub fn sustainability(&self) -> &ApprovalGroup {
        self.groups
            .iter()
            .find(|group| group.id.is_sustainability())
            .expect("validated at construction")
    }

    pub fn is_member(&self, actor: &Actor, id: &GroupId) -> bool {
        self.group(id)
            .map(|group| group.roles.iter().any(|role| actor.has_role(role)))
            .unwrap_or(false)
    }

    pub fn groups_for(&self, actor: &Actor) -> Vec<&ApprovalGroup> {
        self.groups
            .iter()
            .filter(|group| group.roles.iter().any(|role| actor.has_role(role)))
            .collect()
    }
}
