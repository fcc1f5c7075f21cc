use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::hash::Hash;

/// A closed, ordered set of pipeline stages.
///
/// `ALL` fixes both the set of valid values and the column order of a board.
/// The first entry is the stage every new entity starts in.
pub trait StageSet: Copy + Eq + Hash + Debug + 'static {
    const ALL: &'static [Self];

    fn as_str(&self) -> &'static str;

    /// Human-readable column title
    fn label(&self) -> &'static str;

    fn from_str(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|stage| stage.as_str() == s)
    }

    fn initial() -> Self {
        Self::ALL[0]
    }

    fn is_terminal(&self) -> bool;

    /// Position in `ALL`
    fn position(&self) -> usize {
        Self::ALL.iter().position(|s| s == self).unwrap_or(Self::ALL.len())
    }
}

/// Lead pipeline stage for contacts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactStage {
    Nouveau,
    Qualification,
    RendezVous,
    Mandat,
    Client,
    Perdu,
}

impl StageSet for ContactStage {
    const ALL: &'static [Self] = &[
        ContactStage::Nouveau,
        ContactStage::Qualification,
        ContactStage::RendezVous,
        ContactStage::Mandat,
        ContactStage::Client,
        ContactStage::Perdu,
    ];

    fn as_str(&self) -> &'static str {
        match self {
            ContactStage::Nouveau => "nouveau",
            ContactStage::Qualification => "qualification",
            ContactStage::RendezVous => "rendez_vous",
            ContactStage::Mandat => "mandat",
            ContactStage::Client => "client",
            ContactStage::Perdu => "perdu",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            ContactStage::Nouveau => "Nouveau",
            ContactStage::Qualification => "Qualification",
            ContactStage::RendezVous => "Rendez-vous",
            ContactStage::Mandat => "Mandat",
            ContactStage::Client => "Client",
            ContactStage::Perdu => "Perdu",
        }
    }

    fn is_terminal(&self) -> bool {
        matches!(self, ContactStage::Client | ContactStage::Perdu)
    }
}

/// Sales pipeline stage for deals. `Vendu` is won, `Perdu` is lost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DealStage {
    Nouveau,
    Qualification,
    Visite,
    Offre,
    Negociation,
    Compromis,
    Vendu,
    Perdu,
}

impl StageSet for DealStage {
    const ALL: &'static [Self] = &[
        DealStage::Nouveau,
        DealStage::Qualification,
        DealStage::Visite,
        DealStage::Offre,
        DealStage::Negociation,
        DealStage::Compromis,
        DealStage::Vendu,
        DealStage::Perdu,
    ];

    fn as_str(&self) -> &'static str {
        match self {
            DealStage::Nouveau => "nouveau",
            DealStage::Qualification => "qualification",
            DealStage::Visite => "visite",
            DealStage::Offre => "offre",
            DealStage::Negociation => "negociation",
            DealStage::Compromis => "compromis",
            DealStage::Vendu => "vendu",
            DealStage::Perdu => "perdu",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            DealStage::Nouveau => "Nouveau",
            DealStage::Qualification => "Qualification",
            DealStage::Visite => "Visite",
            DealStage::Offre => "Offre",
            DealStage::Negociation => "Négociation",
            DealStage::Compromis => "Compromis",
            DealStage::Vendu => "Vendu",
            DealStage::Perdu => "Perdu",
        }
    }

    fn is_terminal(&self) -> bool {
        matches!(self, DealStage::Vendu | DealStage::Perdu)
    }
}

impl DealStage {
    /// Probability forced by entering this stage, if any
    pub fn forced_probability(&self) -> Option<i64> {
        match self {
            DealStage::Vendu => Some(100),
            DealStage::Perdu => Some(0),
            _ => None,
        }
    }
}
