//! CLI command implementations.

use std::collections::BTreeMap;
use std::io::{self, BufRead, Write};

use anyhow::{bail, Context, Result};

use pubflow_adapters::{GithubClient, YarnWorkspaces};
use pubflow_core::dispatch::create_canary_deployment;
use pubflow_core::graph::PackageGraph;
use pubflow_core::workspace::WorkspaceAdapter;

/// Requests a canary publish for a commit by creating a deployment record
/// on the forge. The publishing itself happens wherever the webhook server
/// is running.
pub async fn cmd_canary(repo: &str, sha: &str, yes: bool) -> Result<()> {
    let (owner, name) = repo
        .split_once('/')
        .context("repository must be OWNER/NAME")?;
    let token = std::env::var("GH_TOKEN").context("GH_TOKEN must be set")?;

    if !yes && !confirm(&format!("Publish a canary of {repo}@{sha}? [y/N] "))? {
        println!("Aborted.");
        return Ok(());
    }

    let forge = GithubClient::new(owner, name, &token)?;
    let id = create_canary_deployment(&forge, sha).await?;

    println!("Created canary deployment {id} for {repo}@{sha}");
    Ok(())
}

/// Prints the order packages would publish in, dependencies first.
pub async fn cmd_order(repo_root: &str, json: bool) -> Result<()> {
    let workspace = YarnWorkspaces::new(repo_root).list_packages().await?;
    let deps: BTreeMap<String, Vec<String>> = workspace
        .into_iter()
        .map(|(name, pkg)| (name, pkg.local_dependencies))
        .collect();
    let order = PackageGraph::new(&deps).publish_order()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&order)?);
    } else {
        for (position, name) in order.iter().enumerate() {
            println!("{:>3}. {name}", position + 1);
        }
    }
    Ok(())
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{prompt}");
    io::stdout().flush()?;
    let mut answer = String::new();
    if io::stdin().lock().read_line(&mut answer)? == 0 {
        bail!("no confirmation received");
    }
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}
