use std::collections::HashMap;
use std::path::{Path, PathBuf};
use csv::Writer;
use log::info;
use serde::Serialize;
use crate::library::inventory::Inventory;
use crate::library::links::LinkStatus;
use crate::library::pipeline::RunSummary;
use crate::Result;

#[derive(Debug, Serialize)]
struct InventoryRow<'a> {
    path: String,
    format: &'static str,
    identifier: Option<&'a str>,
    state: &'static str,
    link_status: Option<LinkStatus>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct ActionRow {
    action: &'static str,
    path: String,
    detail: String,
}

pub struct Reporter;

impl Reporter {
    pub fn new() -> Self {
        Self
    }

    /// One row per scanned file, with its link status when a mirror was given.
    pub fn generate_inventory_report(
        &self,
        inventory: &Inventory,
        statuses: Option<&HashMap<PathBuf, LinkStatus>>,
        output_path: impl AsRef<Path>,
    ) -> Result<()> {
        let output_path_ref = output_path.as_ref();
        let mut writer = Writer::from_path(output_path_ref)?;

        for file in inventory.files() {
            writer.serialize(InventoryRow {
                path: file.path.display().to_string(),
                format: file.format.as_str(),
                identifier: file.identifier.raw(),
                state: file.identifier.label(),
                link_status: statuses.and_then(|s| s.get(&file.path).copied()),
            })?;
        }

        writer.flush()?;
        info!("Inventory report generated: {}", output_path_ref.display());
        Ok(())
    }

    pub fn generate_run_report(&self, summary: &RunSummary, output_path: impl AsRef<Path>) -> Result<()> {
        let output_path_ref = output_path.as_ref();
        let mut writer = Writer::from_path(output_path_ref)?;

        for row in Self::action_rows(summary) {
            writer.serialize(row)?;
        }

        writer.flush()?;
        info!("Run report generated: {}", output_path_ref.display());
        Ok(())
    }

    fn action_rows(summary: &RunSummary) -> Vec<ActionRow> {
        let mut rows = Vec::new();

        for write in &summary.written {
            rows.push(ActionRow {
                action: "identified",
                path: write.path.display().to_string(),
                detail: format!("{} ({})", write.identifier, write.reason),
            });
        }
        let links = &summary.links;
        for (action, paths) in [
            ("linked", &links.created),
            ("relinked", &links.replaced),
            ("unlinked", &links.removed),
        ] {
            for path in paths {
                rows.push(ActionRow {
                    action,
                    path: path.display().to_string(),
                    detail: String::new(),
                });
            }
        }
        for skip in summary.all_skipped() {
            rows.push(ActionRow {
                action: "skipped",
                path: skip.path.display().to_string(),
                detail: skip.reason.clone(),
            });
        }

        rows
    }
}

impl Default for Reporter {
    fn default() -> Self {
        Self::new()
    }
}
