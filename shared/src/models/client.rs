//! Client models

use serde::{Deserialize, Serialize};

/// Legal nature of a client, which decides the document kind (CPF or CNPJ)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersonType {
    Individual,
    Company,
}

impl PersonType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PersonType::Individual => "individual",
            PersonType::Company => "company",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "individual" => Some(PersonType::Individual),
            "company" => Some(PersonType::Company),
            _ => None,
        }
    }

    /// Name of the taxpayer document for this person type
    pub fn document_label(&self) -> &'static str {
        match self {
            PersonType::Individual => "CPF",
            PersonType::Company => "CNPJ",
        }
    }
}
