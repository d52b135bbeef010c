use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

/// The four sequential generation steps of the documentation pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    BusinessAnalysis,
    EngineeringStandards,
    Architecture,
    ImplementationPlanning,
}

impl Stage {
    pub fn all() -> &'static [Stage] {
        &[
            Stage::BusinessAnalysis,
            Stage::EngineeringStandards,
            Stage::Architecture,
            Stage::ImplementationPlanning,
        ]
    }

    /// 1-based stage number as used by the public API.
    pub fn number(self) -> u8 {
        self as u8 + 1
    }

    pub fn from_number(n: u8) -> crate::error::Result<Stage> {
        match n {
            1 => Ok(Stage::BusinessAnalysis),
            2 => Ok(Stage::EngineeringStandards),
            3 => Ok(Stage::Architecture),
            4 => Ok(Stage::ImplementationPlanning),
            _ => Err(crate::error::DocforgeError::InvalidStage(n)),
        }
    }

    pub fn next(self) -> Option<Stage> {
        let all = Stage::all();
        all.get(self as usize + 1).copied()
    }

    pub fn is_final(self) -> bool {
        self.next().is_none()
    }

    /// The document type a successful run of this stage produces.
    pub fn document_kind(self) -> DocumentKind {
        match self {
            Stage::BusinessAnalysis => DocumentKind::BusinessAnalysis,
            Stage::EngineeringStandards => DocumentKind::EngineeringStandards,
            Stage::Architecture => DocumentKind::Architecture,
            Stage::ImplementationPlanning => DocumentKind::ImplementationPlan,
        }
    }

    /// Stages whose output feeds this stage's generation input.
    pub fn predecessors(self) -> &'static [Stage] {
        match self {
            Stage::BusinessAnalysis => &[],
            Stage::EngineeringStandards => &[Stage::BusinessAnalysis],
            Stage::Architecture => &[Stage::BusinessAnalysis, Stage::EngineeringStandards],
            Stage::ImplementationPlanning => &[
                Stage::BusinessAnalysis,
                Stage::EngineeringStandards,
                Stage::Architecture,
            ],
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Stage::BusinessAnalysis => "Business Analysis",
            Stage::EngineeringStandards => "Engineering Standards",
            Stage::Architecture => "Architecture",
            Stage::ImplementationPlanning => "Implementation Planning",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::BusinessAnalysis => "business_analysis",
            Stage::EngineeringStandards => "engineering_standards",
            Stage::Architecture => "architecture",
            Stage::ImplementationPlanning => "implementation_planning",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Stage {
    type Err = crate::error::DocforgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "business_analysis" => Ok(Stage::BusinessAnalysis),
            "engineering_standards" => Ok(Stage::EngineeringStandards),
            "architecture" => Ok(Stage::Architecture),
            "implementation_planning" => Ok(Stage::ImplementationPlanning),
            _ => Err(crate::error::DocforgeError::InvalidStageName(
                s.to_string(),
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// DocumentKind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    BusinessAnalysis,
    EngineeringStandards,
    Architecture,
    ImplementationPlan,
}

impl DocumentKind {
    pub fn all() -> &'static [DocumentKind] {
        &[
            DocumentKind::BusinessAnalysis,
            DocumentKind::EngineeringStandards,
            DocumentKind::Architecture,
            DocumentKind::ImplementationPlan,
        ]
    }

    /// Stable single-byte code used in storage keys. Never reorder.
    pub fn code(self) -> u8 {
        match self {
            DocumentKind::BusinessAnalysis => 1,
            DocumentKind::EngineeringStandards => 2,
            DocumentKind::Architecture => 3,
            DocumentKind::ImplementationPlan => 4,
        }
    }

    pub fn from_code(code: u8) -> Option<DocumentKind> {
        match code {
            1 => Some(DocumentKind::BusinessAnalysis),
            2 => Some(DocumentKind::EngineeringStandards),
            3 => Some(DocumentKind::Architecture),
            4 => Some(DocumentKind::ImplementationPlan),
            _ => None,
        }
    }

    /// Whether this kind may own epic sub-documents.
    pub fn supports_epics(self) -> bool {
        matches!(self, DocumentKind::ImplementationPlan)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DocumentKind::BusinessAnalysis => "business_analysis",
            DocumentKind::EngineeringStandards => "engineering_standards",
            DocumentKind::Architecture => "architecture",
            DocumentKind::ImplementationPlan => "implementation_plan",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DocumentKind {
    type Err = crate::error::DocforgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "business_analysis" => Ok(DocumentKind::BusinessAnalysis),
            "engineering_standards" => Ok(DocumentKind::EngineeringStandards),
            "architecture" => Ok(DocumentKind::Architecture),
            "implementation_plan" => Ok(DocumentKind::ImplementationPlan),
            _ => Err(crate::error::DocforgeError::InvalidDocumentKind(
                s.to_string(),
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// ProjectStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Draft,
    Processing,
    Completed,
    Failed,
}

impl ProjectStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ProjectStatus::Draft => "draft",
            ProjectStatus::Processing => "processing",
            ProjectStatus::Completed => "completed",
            ProjectStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProjectStatus {
    type Err = crate::error::DocforgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(ProjectStatus::Draft),
            "processing" => Ok(ProjectStatus::Processing),
            "completed" => Ok(ProjectStatus::Completed),
            "failed" => Ok(ProjectStatus::Failed),
            _ => Err(crate::error::DocforgeError::InvalidProjectStatus(
                s.to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_numbers() {
        assert_eq!(Stage::BusinessAnalysis.number(), 1);
        assert_eq!(Stage::ImplementationPlanning.number(), 4);
        for stage in Stage::all() {
            assert_eq!(Stage::from_number(stage.number()).unwrap(), *stage);
        }
        assert!(Stage::from_number(0).is_err());
        assert!(Stage::from_number(5).is_err());
    }

    #[test]
    fn stage_next() {
        assert_eq!(
            Stage::BusinessAnalysis.next(),
            Some(Stage::EngineeringStandards)
        );
        assert_eq!(Stage::ImplementationPlanning.next(), None);
        assert!(Stage::ImplementationPlanning.is_final());
    }

    #[test]
    fn stage_predecessors_ordered() {
        assert!(Stage::BusinessAnalysis.predecessors().is_empty());
        assert_eq!(
            Stage::ImplementationPlanning.predecessors().len(),
            3,
            "final stage consumes all three prior documents"
        );
    }

    #[test]
    fn stage_roundtrip() {
        use std::str::FromStr;
        for stage in Stage::all() {
            assert_eq!(Stage::from_str(stage.as_str()).unwrap(), *stage);
        }
    }

    #[test]
    fn document_kind_codes() {
        for kind in DocumentKind::all() {
            assert_eq!(DocumentKind::from_code(kind.code()), Some(*kind));
        }
        assert_eq!(DocumentKind::from_code(0), None);
        assert_eq!(DocumentKind::from_code(9), None);
    }

    #[test]
    fn only_implementation_plan_supports_epics() {
        assert!(DocumentKind::ImplementationPlan.supports_epics());
        assert!(!DocumentKind::BusinessAnalysis.supports_epics());
        assert!(!DocumentKind::Architecture.supports_epics());
    }

    #[test]
    fn stage_document_kind_mapping() {
        assert_eq!(
            Stage::BusinessAnalysis.document_kind(),
            DocumentKind::BusinessAnalysis
        );
        assert_eq!(
            Stage::ImplementationPlanning.document_kind(),
            DocumentKind::ImplementationPlan
        );
    }

    #[test]
    fn project_status_roundtrip() {
        use std::str::FromStr;
        for s in ["draft", "processing", "completed", "failed"] {
            assert_eq!(ProjectStatus::from_str(s).unwrap().as_str(), s);
        }
        assert!(ProjectStatus::from_str("archived").is_err());
    }
}
