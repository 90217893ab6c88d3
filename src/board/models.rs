use std::collections::{BTreeMap, HashSet};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Value above which a project is treated as high priority.
pub const HIGH_PRIORITY_THRESHOLD: f64 = 50_000.0;

/// Value above which a project is treated as medium priority.
pub const MEDIUM_PRIORITY_THRESHOLD: f64 = 25_000.0;

/// One of the ten fixed production stages, in pipeline order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Orcamento,
    Aprovado,
    Projeto,
    Corte,
    Usinagem,
    Montagem,
    Acabamento,
    Embalagem,
    Entrega,
    Finalizado,
}

impl Stage {
    pub const ALL: [Stage; 10] = [
        Stage::Orcamento,
        Stage::Aprovado,
        Stage::Projeto,
        Stage::Corte,
        Stage::Usinagem,
        Stage::Montagem,
        Stage::Acabamento,
        Stage::Embalagem,
        Stage::Entrega,
        Stage::Finalizado,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Orcamento => "orcamento",
            Self::Aprovado => "aprovado",
            Self::Projeto => "projeto",
            Self::Corte => "corte",
            Self::Usinagem => "usinagem",
            Self::Montagem => "montagem",
            Self::Acabamento => "acabamento",
            Self::Embalagem => "embalagem",
            Self::Entrega => "entrega",
            Self::Finalizado => "finalizado",
        }
    }

    /// Column title shown on the board.
    pub fn title(&self) -> &'static str {
        match self {
            Self::Orcamento => "Orçamento",
            Self::Aprovado => "Aprovado",
            Self::Projeto => "Projeto",
            Self::Corte => "Corte",
            Self::Usinagem => "Usinagem",
            Self::Montagem => "Montagem",
            Self::Acabamento => "Acabamento",
            Self::Embalagem => "Embalagem",
            Self::Entrega => "Entrega",
            Self::Finalizado => "Finalizado",
        }
    }

    /// Map a free-text status label from the project source to a stage.
    ///
    /// The lookup is exact. Anything unrecognised lands in `Orcamento`, the
    /// first stage of the pipeline.
    pub fn from_label(label: &str) -> Self {
        match label {
            "Orçamento" => Self::Orcamento,
            "Aprovado" => Self::Aprovado,
            "Em Projeto" => Self::Projeto,
            "Corte" => Self::Corte,
            "Usinagem" => Self::Usinagem,
            "Montagem" => Self::Montagem,
            "Acabamento" => Self::Acabamento,
            "Embalagem" => Self::Embalagem,
            "Entrega" => Self::Entrega,
            "Finalizado" => Self::Finalizado,
            _ => Self::Orcamento,
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Stage::ALL
            .iter()
            .find(|stage| stage.as_str() == s)
            .copied()
            .ok_or_else(|| format!("Invalid stage: {}", s))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    /// Derive priority from the project's final value.
    pub fn from_value(value: f64) -> Self {
        if value > HIGH_PRIORITY_THRESHOLD {
            Self::High
        } else if value > MEDIUM_PRIORITY_THRESHOLD {
            Self::Medium
        } else {
            Self::Low
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Self::High => 3,
            Self::Medium => 2,
            Self::Low => 1,
        }
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            _ => Err(format!("Invalid priority: {}", s)),
        }
    }
}

/// A project row as delivered by the project source.
///
/// Every field is optional or defaulted; the source is a hand-maintained
/// spreadsheet and rows are frequently incomplete.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProjectRecord {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub project_code: Option<String>,
    #[serde(default)]
    pub client: Option<String>,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub delivery_date: Option<String>,
    #[serde(default)]
    pub responsible: Option<String>,
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProjectCard {
    pub id: String,
    pub project_code: String,
    pub client: String,
    pub value: f64,
    pub start_date: String,
    pub delivery_date: String,
    pub priority: Priority,
    pub responsible: String,
    pub stage: Stage,
}

impl ProjectCard {
    /// Build a card from the `index`-th record of the source list.
    pub fn from_record(record: &ProjectRecord, index: usize) -> Self {
        let value = record.value.unwrap_or(0.0);
        Self {
            id: non_empty(record.id.as_deref()).unwrap_or_else(|| index.to_string()),
            project_code: non_empty(record.project_code.as_deref())
                .unwrap_or_else(|| format!("Projeto-{}", index + 1)),
            client: non_empty(record.client.as_deref())
                .unwrap_or_else(|| "Cliente não informado".to_string()),
            value,
            start_date: record.start_date.clone().unwrap_or_default(),
            delivery_date: record.delivery_date.clone().unwrap_or_default(),
            priority: Priority::from_value(value),
            responsible: non_empty(record.responsible.as_deref())
                .unwrap_or_else(|| "Não atribuído".to_string()),
            stage: Stage::from_label(record.status.trim()),
        }
    }

    /// Build the cards for a whole source list, preserving its order.
    pub fn from_records(records: &[ProjectRecord]) -> Vec<Self> {
        records
            .iter()
            .enumerate()
            .map(|(index, record)| Self::from_record(record, index))
            .collect()
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Cards partitioned by stage. Every stage is always present, possibly empty.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BoardState {
    columns: BTreeMap<Stage, Vec<ProjectCard>>,
}

impl Default for BoardState {
    fn default() -> Self {
        Self::empty()
    }
}

impl BoardState {
    pub fn empty() -> Self {
        Self {
            columns: Stage::ALL.iter().map(|stage| (*stage, Vec::new())).collect(),
        }
    }

    pub fn column(&self, stage: Stage) -> &[ProjectCard] {
        self.columns.get(&stage).map(Vec::as_slice).unwrap_or(&[])
    }

    pub(crate) fn column_mut(&mut self, stage: Stage) -> &mut Vec<ProjectCard> {
        self.columns.entry(stage).or_default()
    }

    /// Ids of the cards in `stage`, in board order.
    pub fn ids(&self, stage: Stage) -> Vec<&str> {
        self.column(stage).iter().map(|card| card.id.as_str()).collect()
    }

    /// Locate a card by id: its stage and index within that stage.
    pub fn locate(&self, card_id: &str) -> Option<(Stage, usize)> {
        self.columns.iter().find_map(|(stage, cards)| {
            cards
                .iter()
                .position(|card| card.id == card_id)
                .map(|index| (*stage, index))
        })
    }

    pub fn card(&self, card_id: &str) -> Option<&ProjectCard> {
        self.locate(card_id)
            .and_then(|(stage, index)| self.column(stage).get(index))
    }

    pub fn len(&self) -> usize {
        self.columns.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True when no card id appears twice and every card's stage matches
    /// the column it sits in.
    pub fn is_partitioned(&self) -> bool {
        let mut seen = HashSet::new();
        self.columns.iter().all(|(stage, cards)| {
            cards
                .iter()
                .all(|card| card.stage == *stage && seen.insert(card.id.as_str()))
        })
    }

    /// The stage and order of every card, for the local placement store.
    pub fn placement(&self) -> PlacementRecord {
        PlacementRecord {
            columns: self
                .columns
                .iter()
                .map(|(stage, cards)| (*stage, cards.iter().map(|c| c.id.clone()).collect()))
                .collect(),
        }
    }

    /// Columns in pipeline order, ready for display.
    pub fn column_views(&self) -> Vec<ColumnView> {
        Stage::ALL
            .iter()
            .map(|stage| ColumnView {
                stage: *stage,
                title: stage.title().to_string(),
                count: self.column(*stage).len(),
                cards: self.column(*stage).to_vec(),
            })
            .collect()
    }
}

/// Persisted stage -> ordered card ids. Serialized as a flat JSON object.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct PlacementRecord {
    pub columns: BTreeMap<Stage, Vec<String>>,
}

impl PlacementRecord {
    pub fn ids(&self, stage: Stage) -> &[String] {
        self.columns.get(&stage).map(Vec::as_slice).unwrap_or(&[])
    }
}

impl FromIterator<(Stage, Vec<String>)> for PlacementRecord {
    fn from_iter<T: IntoIterator<Item = (Stage, Vec<String>)>>(iter: T) -> Self {
        Self {
            columns: iter.into_iter().collect(),
        }
    }
}

// API view types
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ColumnView {
    pub stage: Stage,
    pub title: String,
    pub count: usize,
    pub cards: Vec<ProjectCard>,
}

impl ColumnView {
    /// Cards ordered high priority first. Ties keep board order.
    pub fn by_priority(&self) -> Vec<ProjectCard> {
        let mut cards = self.cards.clone();
        cards.sort_by(|a, b| b.priority.rank().cmp(&a.priority.rank()));
        cards
    }
}

/// A single drag of one card, from the moment it is dropped until it is
/// committed or rolled back.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PendingMove {
    pub move_id: Uuid,
    pub card_id: String,
    pub from: Stage,
    pub to: Stage,
    pub to_index: usize,
}

impl PendingMove {
    pub fn new(card_id: impl Into<String>, from: Stage, to: Stage, to_index: usize) -> Self {
        Self {
            move_id: Uuid::new_v4(),
            card_id: card_id.into(),
            from,
            to,
            to_index,
        }
    }
}

/// Lifecycle of one move.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MovePhase {
    Idle,
    OptimisticallyApplied,
    Committed,
    RolledBack,
}

impl MovePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::OptimisticallyApplied => "optimistically_applied",
            Self::Committed => "committed",
            Self::RolledBack => "rolled_back",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Committed | Self::RolledBack)
    }
}

impl std::fmt::Display for MovePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a move may go from `from` to `to`.
pub fn is_valid_transition(from: &MovePhase, to: &MovePhase) -> bool {
    use MovePhase::*;
    matches!(
        (from, to),
        (Idle, OptimisticallyApplied)
            | (OptimisticallyApplied, Committed)
            | (OptimisticallyApplied, RolledBack)
            | (Committed, Idle)
            | (RolledBack, Idle)
    )
}
