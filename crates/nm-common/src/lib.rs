pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod matching;
pub mod normalize;
pub mod similarity;
pub mod store;

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Profile snapshot shared by the scorer, the retriever and the stores.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub skills: BTreeSet<String>,
    #[serde(default)]
    pub interests: BTreeSet<String>,
    #[serde(default)]
    pub preferences: Preferences,
    #[serde(default)]
    pub connections: u32,
}

/// What a user is looking for on the network. Every flag defaults to `false`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    /// Wants to be mentored.
    pub mentor: bool,
    /// Wants to invest.
    pub invest: bool,
    /// Wants discussion partners.
    pub discuss: bool,
    /// Wants collaborators.
    pub collaborate: bool,
    /// Is hiring.
    pub hire: bool,
}
