//! Release scaffolding: turns a release context into a draft branch, an
//! editable manifest + notes, and a draft pull request.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use tracing::info;

use crate::context::{build_release_context, PackageContext};
use crate::error::Result;
use crate::forge::{ForgeClient, NewFile};
use crate::ident::{random_id, short_sha};
use crate::releases::{self, ManifestEntry, DRAFT_BRANCH_PREFIX};
use crate::router::RepoInfo;

/// Scaffolds a release for `sha` on `branch` and opens a draft pull
/// request, returning its number.
///
/// Returns `Ok(None)` without side effects when the context builder
/// declines (already released, no snapshot, or stale branch tip).
pub async fn scaffold_release(
    forge: &Arc<dyn ForgeClient>,
    repo: &RepoInfo,
    sha: &str,
    branch: &str,
) -> Result<Option<u64>> {
    let context = match build_release_context(forge, sha, branch).await? {
        Some(context) => context,
        None => {
            info!(sha, branch, "no release context, skipping scaffold");
            return Ok(None);
        }
    };

    let manifest = render_manifest(&context.packages)?;
    let notes = render_release_notes(&context.packages);

    let existing_ids: HashSet<String> = context
        .existing_releases
        .values()
        .filter_map(|tag| releases::id_from_tag_name(tag))
        .map(str::to_string)
        .collect();
    let id = random_id(&existing_ids)?;

    let shorthash = short_sha(sha);
    let commit_sha = forge
        .commit_files(
            &context.tree_sha,
            sha,
            &format!("Scaffold release for {shorthash}"),
            &[
                NewFile {
                    path: releases::manifest_path(&id),
                    content: manifest,
                },
                NewFile {
                    path: releases::notes_path(&id),
                    content: notes,
                },
            ],
        )
        .await?;

    // A short commit-derived suffix keeps repeated scaffolds for the same
    // commit from colliding on the branch name.
    let uid = short_sha(&commit_sha).chars().take(4).collect::<String>();
    let draft_branch = format!("{DRAFT_BRANCH_PREFIX}{shorthash}/{id}/{uid}");
    forge.create_branch(&draft_branch, &commit_sha).await?;

    let number = forge
        .create_pull(&format!("Release {shorthash} ({id})"), &draft_branch, branch)
        .await?;
    let body = pull_request_body(
        repo,
        &id,
        number,
        &draft_branch,
        context.prior_release_sha.as_deref(),
        sha,
    );
    forge.update_pull_body(number, &body).await?;

    info!(sha, id, number, "scaffolded draft release");
    Ok(Some(number))
}

/// Renders the editable manifest, grouping packages to publish (versions
/// left as `TODO` for the reviewer) before intentionally unchanged ones.
pub fn render_manifest(packages: &BTreeMap<String, PackageContext>) -> Result<String> {
    let mut changed_parts = Vec::new();
    let mut unchanged_parts = Vec::new();

    for (pkg, data) in packages {
        if data.publish {
            let mut table = BTreeMap::new();
            table.insert(
                pkg.clone(),
                ManifestEntry {
                    version: "TODO".to_string(),
                    publish: None,
                },
            );
            let rendered = toml::to_string(&table)?;
            let mut lines: Vec<String> = rendered.trim_end().lines().map(str::to_string).collect();
            if let Some(prior) = &data.prior_version {
                lines.insert(1, format!("# prior : \"{prior}\""));
            }
            changed_parts.push(lines.join("\n"));
        } else {
            let mut table = BTreeMap::new();
            table.insert(
                pkg.clone(),
                ManifestEntry {
                    version: data.prior_version.clone().unwrap_or_else(|| "TODO".to_string()),
                    publish: Some(false),
                },
            );
            unchanged_parts.push(toml::to_string(&table)?.trim_end().to_string());
        }
    }

    let mut content = format!(
        "# ===== Packages to publish =====\n\n{}\n",
        changed_parts.join("\n\n")
    );
    if !unchanged_parts.is_empty() {
        content.push_str(&format!(
            "\n# ===== Unchanged packages =====\n\n{}\n",
            unchanged_parts.join("\n\n")
        ));
    }
    Ok(content)
}

/// Renders release notes: one heading per published package with its
/// attributed commit messages.
pub fn render_release_notes(packages: &BTreeMap<String, PackageContext>) -> String {
    let mut sections = Vec::new();
    for (pkg, data) in packages {
        if !data.publish {
            continue;
        }
        let mut lines = vec![format!("# {pkg}")];
        if let Some(prior) = &data.prior_version {
            lines.push(format!("> *Changes since v{prior}*\n"));
        }
        for change in &data.changes {
            if !change.is_empty() {
                lines.push(format!(" - {change}"));
            }
        }
        sections.push(lines.join("\n"));
    }
    sections.join("\n\n") + "\n"
}

fn pull_request_body(
    repo: &RepoInfo,
    id: &str,
    number: u64,
    branch: &str,
    prior_release_sha: Option<&str>,
    head_sha: &str,
) -> String {
    let manifest_path = releases::manifest_path(id);
    let notes_path = releases::notes_path(id);
    let pr_path = encode_uri_component(&format!("/{}/pull/{}", repo.full_name, number));
    let html_url = &repo.html_url;

    let edit_versions = format!("{html_url}/edit/{branch}/{manifest_path}?pr={pr_path}");
    let view_notes = format!("{html_url}/blob/{branch}/{notes_path}");
    let edit_notes = format!("{html_url}/edit/{branch}/{notes_path}?pr={pr_path}");

    let prior_item = match prior_release_sha {
        Some(prior) => format!(
            "[Changes since prior release]({html_url}/compare/{prior}...{head_sha})"
        ),
        None => "No prior release found.".to_string(),
    };

    format!(
        "\n[Edit versions]({edit_versions})\n[View release notes]({view_notes})\n[Edit release notes]({edit_notes})\n{prior_item}\n"
    )
}

/// Percent-encodes everything outside the RFC 3986 unreserved set.
fn encode_uri_component(value: &str) -> String {
    let mut encoded = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                encoded.push(byte as char)
            }
            _ => encoded.push_str(&format!("%{byte:02X}")),
        }
    }
    encoded
}

#[cfg(test)]
mod tests {
    use super::*;

    fn package(publish: bool, prior: Option<&str>, changes: &[&str]) -> PackageContext {
        PackageContext {
            publish,
            prior_version: prior.map(str::to_string),
            changes: changes.iter().map(|c| c.to_string()).collect(),
        }
    }

    #[test]
    fn manifest_groups_changed_and_unchanged() {
        let mut packages = BTreeMap::new();
        packages.insert("pkg-a".to_string(), package(true, Some("1.0.0"), &[]));
        packages.insert("pkg-b".to_string(), package(false, Some("0.3.0"), &[]));

        let manifest = render_manifest(&packages).unwrap();
        assert!(manifest.contains("# ===== Packages to publish ====="));
        assert!(manifest.contains("[pkg-a]"));
        assert!(manifest.contains("# prior : \"1.0.0\""));
        assert!(manifest.contains("version = \"TODO\""));
        assert!(manifest.contains("# ===== Unchanged packages ====="));
        assert!(manifest.contains("version = \"0.3.0\""));
        assert!(manifest.contains("publish = false"));
    }

    #[test]
    fn scoped_package_names_are_quoted() {
        let mut packages = BTreeMap::new();
        packages.insert("@scope/pkg".to_string(), package(true, None, &[]));
        let manifest = render_manifest(&packages).unwrap();
        assert!(manifest.contains("[\"@scope/pkg\"]"));
    }

    #[test]
    fn notes_skip_unpublished_packages() {
        let mut packages = BTreeMap::new();
        packages.insert(
            "pkg-a".to_string(),
            package(true, Some("1.0.0"), &["fix parser", "add docs"]),
        );
        packages.insert("pkg-b".to_string(), package(false, Some("0.3.0"), &["noise"]));

        let notes = render_release_notes(&packages);
        assert!(notes.contains("# pkg-a"));
        assert!(notes.contains("> *Changes since v1.0.0*"));
        assert!(notes.contains(" - fix parser"));
        assert!(!notes.contains("pkg-b"));
    }

    #[test]
    fn uri_component_encoding() {
        assert_eq!(encode_uri_component("/org/repo/pull/7"), "%2Forg%2Frepo%2Fpull%2F7");
    }
}
