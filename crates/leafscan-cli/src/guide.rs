//! Care guide: static remediation content keyed by canonical label.
//!
//! Loaded once from a JSON file of the form
//!
//! ```json
//! {
//!   "Potato___Early_blight": {
//!     "description": "### Early Blight ...",
//!     "image": "images/potato-early-blight-leaves.jpg",
//!     "links": [{ "title": "UMN Extension", "url": "https://..." }]
//!   }
//! }
//! ```

use std::collections::HashMap;
use std::io::{self, Write};
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Link {
    pub title: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuideEntry {
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default)]
    pub links: Vec<Link>,
}

/// Immutable label → guide entry table.
#[derive(Debug, Clone, Default)]
pub struct CareGuide {
    entries: HashMap<String, GuideEntry>,
}

impl CareGuide {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading care guide {}", path.display()))?;
        let entries = serde_json::from_str(&text)
            .with_context(|| format!("parsing care guide {}", path.display()))?;
        Ok(Self { entries })
    }

    pub fn get(&self, label: &str) -> Option<&GuideEntry> {
        self.entries.get(label)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Labels in the guide that the model can never emit.
    pub fn unknown_labels<'a>(&'a self, known: &'a [String]) -> Vec<&'a str> {
        let mut out: Vec<&str> = self
            .entries
            .keys()
            .filter(|k| !known.contains(k))
            .map(String::as_str)
            .collect();
        out.sort_unstable();
        out
    }

    /// Text block for a predicted label.
    pub fn write_entry(&self, w: &mut impl Write, label: &str) -> io::Result<()> {
        let Some(entry) = self.get(label) else {
            return writeln!(w, "No extended info available for this class.");
        };
        writeln!(w, "Diagnosis & care recommendations")?;
        writeln!(w, "--------------------------------")?;
        if let Some(image) = &entry.image {
            writeln!(w, "Example image: {image}")?;
        }
        writeln!(w, "{}", entry.description.trim())?;
        if !entry.links.is_empty() {
            writeln!(w)?;
            writeln!(w, "Useful resources:")?;
            for link in &entry.links {
                writeln!(w, "  - {}: {}", link.title, link.url)?;
            }
        }
        Ok(())
    }
}
