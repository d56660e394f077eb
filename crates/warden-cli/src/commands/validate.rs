use anyhow::{Context as _, Result, bail};
use colored::Colorize;
use serde::Serialize;
use warden_policy::{DatabasePolicy, MergedPolicyView, PolicyDocument, PolicyError};

use super::Context;
use crate::cli::ValidateArgs;
use crate::output::{print_json, print_success, print_table, print_warning};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ValidationReport {
    root: String,
    fingerprint: String,
    documents: Vec<DocumentReport>,
    warnings: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DocumentReport {
    scope: String,
    locator: String,
    status: String,
    groups: usize,
    roles: usize,
    permissions: usize,
    dropped: usize,
}

impl DocumentReport {
    fn loaded(scope: String, locator: &str, document: &PolicyDocument, dropped: usize) -> Self {
        Self {
            scope,
            locator: locator.to_string(),
            status: "ok".into(),
            groups: document.groups().len(),
            roles: document.roles().len(),
            permissions: document.permission_count(),
            dropped,
        }
    }
}

fn report(view: &MergedPolicyView) -> ValidationReport {
    let mut documents = vec![DocumentReport::loaded(
        "root".into(),
        view.root_locator().as_str(),
        view.root(),
        0,
    )];
    let mut warnings: Vec<String> = view
        .unknown_role_references()
        .into_iter()
        .map(|(scope, reference)| format!("{scope}: {reference}"))
        .collect();

    for (name, policy) in view.databases() {
        let scope = format!("db:{name}");
        match policy {
            DatabasePolicy::Loaded {
                locator,
                document,
                dropped,
                ..
            } => {
                if *dropped > 0 {
                    warnings.push(format!(
                        "{scope}: {dropped} permission(s) outside database {name} were dropped"
                    ));
                }
                documents.push(DocumentReport::loaded(scope, locator, document, *dropped));
            }
            DatabasePolicy::Unavailable { locator, reason } => {
                warnings.push(format!("{scope}: unavailable: {reason}"));
                documents.push(DocumentReport {
                    scope,
                    locator: locator.clone(),
                    status: "unavailable".into(),
                    groups: 0,
                    roles: 0,
                    permissions: 0,
                    dropped: 0,
                });
            }
        }
    }

    ValidationReport {
        root: view.root_locator().to_string(),
        fingerprint: view.fingerprint().to_string(),
        documents,
        warnings,
    }
}

/// Fails on the first undefined role reference, then on any other warning.
fn strict_check(view: &MergedPolicyView, report: &ValidationReport) -> Result<()> {
    if report.warnings.is_empty() {
        return Ok(());
    }
    let failed = format!(
        "Strict validation failed with {} warning(s)",
        report.warnings.len()
    );
    if let Some((scope, reference)) = view.unknown_role_references().into_iter().next() {
        return Err(anyhow::Error::new(PolicyError::from(reference)))
            .context(format!("{failed} ({scope})"));
    }
    bail!(failed)
}

pub async fn run(ctx: &Context, args: &ValidateArgs) -> Result<()> {
    let view = ctx
        .distributor()
        .load(&ctx.root)
        .await
        .with_context(|| format!("Policy {} is invalid", ctx.root))?;
    let report = report(&view);

    if ctx.is_json() {
        print_json(&report)?;
    } else {
        let rows = report
            .documents
            .iter()
            .map(|doc| {
                [
                    doc.scope.clone(),
                    doc.locator.clone(),
                    doc.status.clone(),
                    doc.groups.to_string(),
                    doc.roles.to_string(),
                    doc.permissions.to_string(),
                ]
            })
            .collect();
        print_table(
            ["Scope", "Locator", "Status", "Groups", "Roles", "Permissions"],
            rows,
        );
        println!("{}: {}", "Fingerprint".cyan(), report.fingerprint);
        for warning in &report.warnings {
            print_warning(warning);
        }
    }

    if args.strict {
        strict_check(&view, &report)?;
    }
    if !ctx.is_json() {
        print_success(&format!("Policy {} is valid", ctx.root));
    }
    Ok(())
}
