//! Enum merging
//!
//! Definitions are first grouped by logical path. Groups sharing a simple
//! name whose every definition has the same (member name, code) set are then
//! collapsed into one logical enum, whatever their nesting depth: a nested
//! `Order.TaxType` in v1 and a top-level `TaxType` in v2 become one
//! definition. The survivor is the shallowest path, preferring one present in
//! the latest version.

use std::collections::BTreeMap;
use tracing::debug;

use crate::diagnostics::{DiagnosticCode, DiagnosticItem, Diagnostics};
use crate::merged::{MergedEnum, MergedEnumValue};
use crate::schema::{simple_name, EnumDef, VersionSchema};
use crate::version::VersionId;

/// Result of merging every enum across versions
#[derive(Debug, Clone, Default)]
pub struct EnumMerge {
    /// Merged enums in first-seen order
    pub enums: Vec<MergedEnum>,
    /// Collapsed path -> surviving path
    pub aliases: BTreeMap<String, String>,
}

impl EnumMerge {
    /// Surviving path for any enum path
    pub fn resolve<'a>(&'a self, path: &'a str) -> &'a str {
        self.aliases.get(path).map(String::as_str).unwrap_or(path)
    }

    pub fn get(&self, path: &str) -> Option<&MergedEnum> {
        let path = self.resolve(path);
        self.enums.iter().find(|e| e.path == path)
    }

    /// Smallest and largest member code of an enum
    pub fn range(&self, path: &str) -> Option<(i32, i32)> {
        self.get(path).map(|e| (e.min_number(), e.max_number()))
    }

    /// Enums whose surviving path sits directly under `parent` ("" = top level)
    pub fn children_of(&self, parent: &str) -> Vec<MergedEnum> {
        self.enums
            .iter()
            .filter(|e| match e.path.rsplit_once('.') {
                Some((p, _)) => p == parent,
                None => parent.is_empty(),
            })
            .cloned()
            .collect()
    }
}

struct PathGroup<'a> {
    path: String,
    defs: Vec<(&'a VersionId, &'a EnumDef)>,
}

impl PathGroup<'_> {
    /// Member signature shared by every definition, if they all agree
    fn uniform_signature(&self) -> Option<Vec<(String, i32)>> {
        let first = self.defs.first()?.1.signature();
        self.defs
            .iter()
            .all(|(_, d)| d.signature() == first)
            .then_some(first)
    }

    fn depth(&self) -> usize {
        self.path.matches('.').count()
    }
}

/// Merge every enum of every version
pub fn merge_enums(versions: &[VersionSchema], diagnostics: &mut Diagnostics) -> EnumMerge {
    let order: Vec<&VersionId> = versions.iter().map(|v| &v.version).collect();
    let latest = order.last().copied();

    // Group by logical path, first-seen order
    let mut groups: Vec<PathGroup<'_>> = Vec::new();
    for schema in versions {
        for (path, def) in schema.all_enums() {
            match groups.iter_mut().find(|g| g.path == path) {
                Some(group) => group.defs.push((&schema.version, def)),
                None => groups.push(PathGroup { path, defs: vec![(&schema.version, def)] }),
            }
        }
    }

    // Cluster structurally equivalent groups
    let mut clusters: Vec<Vec<usize>> = Vec::new();
    for (index, group) in groups.iter().enumerate() {
        let signature = group.uniform_signature();
        let target = signature.as_ref().and_then(|sig| {
            clusters.iter().position(|cluster| {
                let head = &groups[cluster[0]];
                simple_name(&head.path) == simple_name(&group.path)
                    && head.uniform_signature().as_ref() == Some(sig)
            })
        });
        match target {
            Some(c) => clusters[c].push(index),
            None => clusters.push(vec![index]),
        }
    }

    let mut result = EnumMerge::default();
    for cluster in clusters {
        let survivor = cluster
            .iter()
            .copied()
            .min_by_key(|&i| {
                let group = &groups[i];
                let in_latest = latest.map(|l| group.defs.iter().any(|(v, _)| *v == l)).unwrap_or(false);
                (group.depth(), !in_latest, i)
            })
            .unwrap_or(cluster[0]);
        let survivor_path = groups[survivor].path.clone();

        let mut defs: Vec<(&VersionId, &EnumDef)> =
            cluster.iter().flat_map(|&i| groups[i].defs.iter().copied()).collect();
        defs.sort_by_key(|(v, _)| order.iter().position(|o| o == v));

        let collapsed: Vec<String> = cluster
            .iter()
            .filter(|&&i| i != survivor)
            .map(|&i| groups[i].path.clone())
            .collect();

        if !collapsed.is_empty() {
            debug!(enum_path = %survivor_path, collapsed = ?collapsed, "Collapsed equivalent enums");
            let mut item = DiagnosticItem::new(
                survivor_path.clone(),
                DiagnosticCode::EnumCollapsed,
                format!("{} equivalent definition(s) collapsed into '{}'", collapsed.len(), survivor_path),
            );
            for path in &collapsed {
                item = item.with_context(format!("collapsed: {}", path));
                result.aliases.insert(path.clone(), survivor_path.clone());
            }
            diagnostics.push(item);
        }

        result.enums.push(MergedEnum {
            name: simple_name(&survivor_path).to_string(),
            path: survivor_path,
            values: merge_values(&defs),
            versions: dedup_versions(defs.iter().map(|(v, _)| *v)),
            collapsed_from: collapsed,
        });
    }

    result
}

/// Union of members keyed by code; the earliest name wins, later names
/// become aliases
fn merge_values(defs: &[(&VersionId, &EnumDef)]) -> Vec<MergedEnumValue> {
    let mut values: Vec<MergedEnumValue> = Vec::new();
    for (version, def) in defs {
        for value in &def.values {
            match values.iter_mut().find(|v| v.number == value.number) {
                Some(existing) => {
                    if !existing.versions.contains(version) {
                        existing.versions.push((*version).clone());
                    }
                    if existing.name != value.name && !existing.aliases.contains(&value.name) {
                        existing.aliases.push(value.name.clone());
                    }
                }
                None => values.push(MergedEnumValue {
                    name: value.name.clone(),
                    number: value.number,
                    versions: vec![(*version).clone()],
                    aliases: Vec::new(),
                }),
            }
        }
    }
    values.sort_by_key(|v| v.number);
    values
}

fn dedup_versions<'a>(versions: impl Iterator<Item = &'a VersionId>) -> Vec<VersionId> {
    let mut out: Vec<VersionId> = Vec::new();
    for version in versions {
        if !out.contains(version) {
            out.push(version.clone());
        }
    }
    out
}
