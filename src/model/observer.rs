//! Observers

use std::collections::BTreeMap;

use serde::Serialize;

use super::Identified;
use crate::document::Element;
use crate::error::Result;

/// A person who observes or co-observes
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Observer {
    pub id: String,
    pub surname: String,
    pub given_name: String,
    pub contacts: Vec<String>,
    /// Account name (e.g. an online service) → account id
    pub accounts: BTreeMap<String, String>,
    /// Offset between the faintest star seen and the star's catalog magnitude
    pub fst_offset: Option<f64>,
}

impl Observer {
    pub fn from_element(node: &Element) -> Result<Self> {
        let mut accounts = BTreeMap::new();
        for account in node.children_named("account") {
            let name = account
                .attribute("name")
                .ok_or_else(|| node.missing("account/@name"))?;
            accounts.insert(name.to_string(), account.text());
        }

        Ok(Self {
            id: node.id()?.to_string(),
            surname: node.required_text("surname")?,
            given_name: node.required_text("name")?,
            contacts: node.texts("contact"),
            accounts,
            fst_offset: node.parse_optional("fstOffset")?,
        })
    }

    pub fn display_name(&self) -> String {
        format!("{} {}", self.given_name, self.surname)
    }
}

impl Identified for Observer {
    fn id(&self) -> &str {
        &self.id
    }
}
