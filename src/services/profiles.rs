//! CMP overlays: local character profiles attached to Oras by token ID
//!
//! Overlays never travel through the ownership fetch. They are edited one at a
//! time or imported in bulk from an export file; imported token IDs the wallet
//! fetch did not return become synthetic "imported" Oras so the overlay has
//! something to hang on.

use chrono::NaiveDate;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use crate::config::CollectionConfig;
use crate::error::OraError;
use crate::models::ora::Ora;
use crate::models::profile::{CmpProfile, ImportReport, ProfileExportEntry};
use crate::services::normalizer::display_id;
use crate::services::persistence::{StatePort, PROFILES_KEY};

pub struct ProfileBook {
    overlays: BTreeMap<String, CmpProfile>,
    imported: Vec<Ora>,
    port: Arc<dyn StatePort>,
    collection: CollectionConfig,
}

impl ProfileBook {
    pub fn open(port: Arc<dyn StatePort>, collection: CollectionConfig) -> Result<Self, OraError> {
        let overlays = match port.read(PROFILES_KEY)? {
            None => BTreeMap::new(),
            Some(raw) => match serde_json::from_str::<BTreeMap<String, CmpProfile>>(&raw) {
                Ok(overlays) => overlays,
                Err(e) => {
                    tracing::warn!("Stored CMP overlays are malformed, resetting: {}", e);
                    BTreeMap::new()
                }
            },
        };

        tracing::debug!("Opened profile book with {} overlays", overlays.len());

        Ok(Self {
            overlays,
            imported: Vec::new(),
            port,
            collection,
        })
    }

    pub fn overlays(&self) -> &BTreeMap<String, CmpProfile> {
        &self.overlays
    }

    pub fn profile(&self, token_id: &str) -> Option<&CmpProfile> {
        self.overlays.get(token_id)
    }

    /// Overlay for `token_id`, or the default profile; the flag is true for defaults
    pub fn profile_or_default(&self, token_id: &str) -> (CmpProfile, bool) {
        match self.overlays.get(token_id) {
            Some(profile) => (profile.clone(), false),
            None => (CmpProfile::default(), true),
        }
    }

    pub fn set_profile(&mut self, token_id: &str, profile: CmpProfile) -> Result<(), OraError> {
        let token_id = token_id.trim();
        if token_id.is_empty() {
            return Err(OraError::InvalidInput("tokenId must not be empty".to_string()));
        }
        if let Some(slider) = profile.tone.out_of_range() {
            return Err(OraError::InvalidInput(format!(
                "tone.{} must be between 0 and 100",
                slider
            )));
        }

        let previous = self.overlays.insert(token_id.to_string(), profile);
        if let Err(e) = self.persist() {
            match previous {
                Some(p) => self.overlays.insert(token_id.to_string(), p),
                None => self.overlays.remove(token_id),
            };
            return Err(e);
        }
        Ok(())
    }

    /// Returns false when there was no overlay to remove
    pub fn remove_profile(&mut self, token_id: &str) -> Result<bool, OraError> {
        let Some(previous) = self.overlays.remove(token_id) else {
            return Ok(false);
        };
        if let Err(e) = self.persist() {
            self.overlays.insert(token_id.to_string(), previous);
            return Err(e);
        }
        Ok(true)
    }

    /// Imported records that the live fetch did not return
    pub fn imported(&self) -> &[Ora] {
        &self.imported
    }

    /// Live collection followed by imported records not present in it
    pub fn visible_oras(&self, live: &[Ora]) -> Vec<Ora> {
        let live_ids: HashSet<&str> = live.iter().map(|o| o.id.as_str()).collect();
        live.iter()
            .chain(self.imported.iter().filter(|o| !live_ids.contains(o.id.as_str())))
            .cloned()
            .collect()
    }

    /// Merge an export file into the overlays
    ///
    /// Elements with a problem are skipped and listed in the report; only a
    /// non-array top level fails the whole import.
    pub fn import_profiles(&mut self, json: &str, fetched: &[Ora]) -> Result<ImportReport, OraError> {
        let value: Value = serde_json::from_str(json)
            .map_err(|e| OraError::MalformedImport(format!("Invalid JSON: {}", e)))?;
        let Value::Array(elements) = value else {
            return Err(OraError::MalformedImport(
                "Import file must contain a JSON array".to_string(),
            ));
        };

        let fetched_ids: HashSet<&str> = fetched.iter().map(|o| o.token_id.as_str()).collect();
        let mut overlays = self.overlays.clone();
        let mut imported = self.imported.clone();
        let mut report = ImportReport::default();

        for (index, element) in elements.iter().enumerate() {
            let (token_id, overlay) = match parse_element(element) {
                Ok(parsed) => parsed,
                Err(message) => {
                    report.skipped_count += 1;
                    report.errors.push(format!("Entry {}: {}", index, message));
                    continue;
                }
            };

            if fetched_ids.contains(token_id.as_str()) {
                report.matched_count += 1;
            } else {
                let ora = self.synthesize(&token_id, element, &overlay);
                match imported.iter_mut().find(|o| o.id == ora.id) {
                    Some(existing) => {
                        *existing = ora;
                        report.matched_count += 1;
                    }
                    None => {
                        imported.push(ora);
                        report.new_records_count += 1;
                    }
                }
            }

            overlays.insert(token_id, overlay);
        }

        let previous_overlays = std::mem::replace(&mut self.overlays, overlays);
        let previous_imported = std::mem::replace(&mut self.imported, imported);
        if let Err(e) = self.persist() {
            self.overlays = previous_overlays;
            self.imported = previous_imported;
            return Err(e);
        }

        tracing::info!(
            "Imported profiles: {} matched, {} new, {} skipped",
            report.matched_count,
            report.new_records_count,
            report.skipped_count
        );

        Ok(report)
    }

    pub fn export(&self, oras: &[Ora]) -> Result<String, OraError> {
        export_profiles(oras, &self.overlays)
    }

    fn synthesize(&self, token_id: &str, element: &Value, overlay: &CmpProfile) -> Ora {
        let name = if overlay.custom_name.trim().is_empty() {
            self.collection.fallback_name(token_id)
        } else {
            overlay.custom_name.clone()
        };
        let image = element
            .get("image")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let traits = element.get("traits").map(traits_from_object).unwrap_or_default();

        Ora::new(
            self.collection.primary_contract(),
            token_id,
            display_id(self.collection.display_id, &name, token_id),
            name,
            image,
            traits,
        )
    }

    fn persist(&self) -> Result<(), OraError> {
        let raw = serde_json::to_string(&self.overlays).map_err(|e| OraError::Storage(e.to_string()))?;
        self.port.write(PROFILES_KEY, &raw)
    }
}

fn parse_element(element: &Value) -> Result<(String, CmpProfile), String> {
    let token_id = match element.get("tokenId") {
        Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
        Some(Value::Number(n)) if n.is_u64() => n.to_string(),
        Some(_) => return Err("tokenId must be a non-empty string or integer".to_string()),
        None => return Err("missing tokenId".to_string()),
    };

    let overlay = element
        .get("overlay")
        .ok_or_else(|| format!("token {}: missing overlay", token_id))?;
    let overlay: CmpProfile = serde_json::from_value(overlay.clone())
        .map_err(|e| format!("token {}: invalid overlay: {}", token_id, e))?;

    if let Some(slider) = overlay.tone.out_of_range() {
        return Err(format!("token {}: tone.{} is outside 0-100", token_id, slider));
    }

    Ok((token_id, overlay))
}

fn traits_from_object(value: &Value) -> BTreeMap<String, String> {
    let Some(obj) = value.as_object() else {
        return BTreeMap::new();
    };
    obj.iter()
        .filter_map(|(k, v)| {
            let v = match v {
                Value::String(s) => s.trim().to_string(),
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                _ => return None,
            };
            (!v.is_empty()).then(|| (k.clone(), v))
        })
        .collect()
}

/// Pretty-printed export of every Ora (in the given order) that has an overlay
pub fn export_profiles(oras: &[Ora], overlays: &BTreeMap<String, CmpProfile>) -> Result<String, OraError> {
    let entries: Vec<ProfileExportEntry> = oras
        .iter()
        .filter_map(|ora| {
            overlays.get(&ora.token_id).map(|overlay| ProfileExportEntry {
                token_id: ora.token_id.clone(),
                image: ora.image.clone(),
                traits: ora.traits.clone(),
                overlay: overlay.clone(),
            })
        })
        .collect();

    serde_json::to_string_pretty(&entries).map_err(|e| OraError::Storage(e.to_string()))
}

/// `<slug>-cmp-export-<YYYY-MM-DD>.json`
pub fn export_file_name(slug: &str, date: NaiveDate) -> String {
    format!("{}-cmp-export-{}.json", slug, date.format("%Y-%m-%d"))
}
