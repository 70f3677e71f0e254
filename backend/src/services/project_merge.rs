//! Project model ancestry merge.
//!
//! Every merge is a pure function producing a fresh model: the main (local)
//! model wins field by field and the parent fills the gaps. Keyed
//! collections are unioned by `groupId:artifactId[:classifier]:type`, with
//! parent-only entries flagged `from_parent`.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::error::{AppError, Result};
use crate::models::project::{
    ArchivaProjectModel, CiManagement, Dependency, Exclusion, Individual, IssueManagement,
    License, MailingList, Organization, PluginReference, ProjectRepository, Scm,
};

/// Merge a project model with its parent. Both inputs are required.
pub fn merge_project_models(
    main: Option<&ArchivaProjectModel>,
    parent: Option<&ArchivaProjectModel>,
) -> Result<ArchivaProjectModel> {
    let main = main.ok_or_else(|| {
        AppError::Merge("Cannot merge with an absent main project model".to_string())
    })?;
    let parent = parent.ok_or_else(|| {
        AppError::Merge("Cannot merge with an absent parent project model".to_string())
    })?;

    Ok(ArchivaProjectModel {
        group_id: merge_string(&main.group_id, &parent.group_id),
        artifact_id: merge_string(&main.artifact_id, &parent.artifact_id),
        version: merge_string(&main.version, &parent.version),
        name: merge_string(&main.name, &parent.name),
        description: merge_string(&main.description, &parent.description),
        url: merge_string(&main.url, &parent.url),
        packaging: merge_string(&main.packaging, &parent.packaging),
        parent_project: main
            .parent_project
            .clone()
            .or_else(|| parent.parent_project.clone()),
        ci_management: merge_structured(&main.ci_management, &parent.ci_management, merge_ci),
        issue_management: merge_structured(
            &main.issue_management,
            &parent.issue_management,
            merge_issue_management,
        ),
        organization: merge_structured(&main.organization, &parent.organization, merge_organization),
        scm: merge_structured(&main.scm, &parent.scm, merge_scm),
        individuals: merge_by_equality(&main.individuals, &parent.individuals),
        dependencies: merge_dependencies(&main.dependencies, &parent.dependencies),
        dependency_management: merge_dependencies(
            &main.dependency_management,
            &parent.dependency_management,
        ),
        licenses: merge_licenses(&main.licenses, &parent.licenses),
        repositories: merge_repositories(&main.repositories, &parent.repositories),
        plugins: merge_plugins(&main.plugins, &parent.plugins),
        reports: merge_plugins(&main.reports, &parent.reports),
        mailing_lists: merge_by_equality::<MailingList>(&main.mailing_lists, &parent.mailing_lists),
        properties: merge_properties(&main.properties, &parent.properties),
    })
}

// ---------------------------------------------------------------------------
// Scalars and structured fields
// ---------------------------------------------------------------------------

/// `main` unless it is absent or blank, then `parent`.
pub fn merge_string(main: &Option<String>, parent: &Option<String>) -> Option<String> {
    match main {
        Some(value) if !value.trim().is_empty() => Some(value.clone()),
        _ => parent.clone(),
    }
}

/// Whichever side is present, or the field-wise merge of both.
fn merge_structured<T: Clone>(
    main: &Option<T>,
    parent: &Option<T>,
    merge: fn(&T, &T) -> T,
) -> Option<T> {
    match (main, parent) {
        (Some(m), Some(p)) => Some(merge(m, p)),
        (Some(m), None) => Some(m.clone()),
        (None, Some(p)) => Some(p.clone()),
        (None, None) => None,
    }
}

fn merge_ci(main: &CiManagement, parent: &CiManagement) -> CiManagement {
    CiManagement {
        system: merge_string(&main.system, &parent.system),
        url: merge_string(&main.url, &parent.url),
    }
}

fn merge_issue_management(main: &IssueManagement, parent: &IssueManagement) -> IssueManagement {
    IssueManagement {
        system: merge_string(&main.system, &parent.system),
        url: merge_string(&main.url, &parent.url),
    }
}

fn merge_organization(main: &Organization, parent: &Organization) -> Organization {
    Organization {
        name: merge_string(&main.name, &parent.name),
        url: merge_string(&main.url, &parent.url),
        favicon_url: merge_string(&main.favicon_url, &parent.favicon_url),
    }
}

fn merge_scm(main: &Scm, parent: &Scm) -> Scm {
    Scm {
        connection: merge_string(&main.connection, &parent.connection),
        developer_connection: merge_string(&main.developer_connection, &parent.developer_connection),
        url: merge_string(&main.url, &parent.url),
    }
}

/// Property union; each value follows the scalar rule.
pub fn merge_properties(
    main: &BTreeMap<String, String>,
    parent: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let mut merged = parent.clone();
    for (key, value) in main {
        if !value.trim().is_empty() || !merged.contains_key(key) {
            merged.insert(key.clone(), value.clone());
        }
    }
    merged
}

// ---------------------------------------------------------------------------
// Collections
// ---------------------------------------------------------------------------

/// Union keyed by `key`, in main order followed by parent-only entries.
fn merge_keyed<T: Clone>(
    main: &[T],
    parent: &[T],
    key: impl Fn(&T) -> String,
    on_collision: impl Fn(&T, &T) -> T,
    parent_only: impl Fn(&T) -> T,
) -> Vec<T> {
    let mut parent_by_key: HashMap<String, &T> = HashMap::new();
    for item in parent {
        parent_by_key.entry(key(item)).or_insert(item);
    }

    let mut seen = HashSet::new();
    let mut merged = Vec::with_capacity(main.len() + parent.len());
    for item in main {
        let k = key(item);
        match parent_by_key.get(&k) {
            Some(p) => merged.push(on_collision(item, p)),
            None => merged.push(item.clone()),
        }
        seen.insert(k);
    }
    for item in parent {
        let k = key(item);
        if seen.insert(k) {
            merged.push(parent_only(item));
        }
    }
    merged
}

fn merge_by_equality<T: Clone + PartialEq>(main: &[T], parent: &[T]) -> Vec<T> {
    let mut merged = main.to_vec();
    for item in parent {
        if !merged.contains(item) {
            merged.push(item.clone());
        }
    }
    merged
}

pub fn merge_dependencies(main: &[Dependency], parent: &[Dependency]) -> Vec<Dependency> {
    merge_keyed(main, parent, Dependency::key, merge_dependency, |p| Dependency {
        from_parent: true,
        ..p.clone()
    })
}

fn merge_dependency(main: &Dependency, parent: &Dependency) -> Dependency {
    Dependency {
        group_id: main.group_id.clone(),
        artifact_id: main.artifact_id.clone(),
        version: merge_string(&main.version, &parent.version),
        classifier: merge_string(&main.classifier, &parent.classifier),
        dependency_type: if main.dependency_type.trim().is_empty() {
            parent.dependency_type.clone()
        } else {
            main.dependency_type.clone()
        },
        scope: merge_string(&main.scope, &parent.scope),
        system_path: merge_string(&main.system_path, &parent.system_path),
        url: merge_string(&main.url, &parent.url),
        // Optional is sticky: once an ancestor marks it, it stays optional.
        optional: main.optional || parent.optional,
        from_parent: main.from_parent,
        exclusions: merge_exclusions(&main.exclusions, &parent.exclusions),
    }
}

/// Exclusions keyed by `groupId:artifactId`. On collision the parent's
/// exclusion is taken as is.
pub fn merge_exclusions(main: &[Exclusion], parent: &[Exclusion]) -> Vec<Exclusion> {
    merge_keyed(
        main,
        parent,
        Exclusion::key,
        |_, p| p.clone(),
        |p| Exclusion {
            from_parent: true,
            ..p.clone()
        },
    )
}

pub fn merge_plugins(main: &[PluginReference], parent: &[PluginReference]) -> Vec<PluginReference> {
    merge_keyed(
        main,
        parent,
        PluginReference::key,
        |m, p| PluginReference {
            group_id: m.group_id.clone(),
            artifact_id: m.artifact_id.clone(),
            version: merge_string(&m.version, &p.version),
            classifier: merge_string(&m.classifier, &p.classifier),
            plugin_type: m.plugin_type.clone(),
            from_parent: m.from_parent,
        },
        |p| PluginReference {
            from_parent: true,
            ..p.clone()
        },
    )
}

pub fn merge_licenses(main: &[License], parent: &[License]) -> Vec<License> {
    merge_keyed(main, parent, License::key, |m, _| m.clone(), License::clone)
}

pub fn merge_repositories(
    main: &[ProjectRepository],
    parent: &[ProjectRepository],
) -> Vec<ProjectRepository> {
    merge_keyed(
        main,
        parent,
        |r| r.id.clone(),
        |m, _| m.clone(),
        ProjectRepository::clone,
    )
}
